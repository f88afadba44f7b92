//! Prompt templates and sentinel answers.

use crate::retriever::DEFAULT_SEPARATOR;

/// Returned when retrieval produced no context; generation is not called.
pub const NOT_FOUND_ANSWER: &str = "Could not find relevant information in the document.";

/// Returned when the hybrid path filtered out every passage.
pub const NO_RELEVANT_ANSWER: &str = "No sufficiently relevant content was found for this query.";

/// Returned when generation failed for a question.
pub const FAILED_ANSWER: &str = "Failed to get an answer from the API after multiple retries.";

/// Returned for batch questions skipped after cancellation.
pub const CANCELLED_ANSWER: &str = "Request cancelled before this question was answered.";

const GROUNDED_HEADER: &str = "Based only on the context provided, answer the question concisely. \
If the answer is not in the context, say \"I could not find the answer in the document.\"\n\nContext:";

const SIMULATION_HEADER: &str = "You are analysing a hypothetical scenario. Using only the facts \
in the context, explain concisely how the outcome would change under the scenario. State any \
assumption you have to make.\n\nContext:";

/// Build a grounding prompt from `context` and `question` that fits in `max_chars`.
///
/// When the prompt would be too long, the context is cut; the question is
/// always kept whole.
pub fn grounded_prompt(context: &str, question: &str, max_chars: usize) -> String {
    fill(GROUNDED_HEADER, context, "Question", question, "Answer:", max_chars)
}

/// Build a scenario-simulation prompt that fits in `max_chars`, cutting the
/// context first.
pub fn simulation_prompt(context: &str, scenario: &str, max_chars: usize) -> String {
    fill(SIMULATION_HEADER, context, "Scenario", scenario, "Analysis:", max_chars)
}

fn fill(
    header: &str,
    context: &str,
    label: &str,
    query: &str,
    footer: &str,
    max_chars: usize,
) -> String {
    let render = |context: &str| {
        format!(
            "{header}{DEFAULT_SEPARATOR}{context}{DEFAULT_SEPARATOR}\n{label}: {query}\n\n{footer}"
        )
    };

    let fixed = render("").chars().count();
    let budget = max_chars.saturating_sub(fixed);
    if context.chars().count() <= budget {
        return render(context);
    }
    let cut: String = context.chars().take(budget).collect();
    render(&cut)
}
