//! `docqa-server` exposes the docqa-rag pipeline over HTTP.
//! Every route except `/health` requires `Authorization: Bearer <DOCQA_API_KEY>`.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod server;

pub use config::ServerConfig;
pub use error::ApiError;
pub use server::{AppState, app_router, build_pipeline, run_server};
