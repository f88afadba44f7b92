//! Property tests for the chunkers.

use std::collections::HashMap;

use docqa_rag::chunking::{split, split_with_overlap};
use proptest::prelude::*;

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Prose-like text: words, sentence terminators, spaces and paragraph breaks.
fn arb_prose() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            4 => "[A-Za-zé]{1,12}",
            2 => Just(" ".to_string()),
            1 => Just(". ".to_string()),
            1 => Just("? ".to_string()),
            1 => Just("\n\n".to_string()),
        ],
        0..120,
    )
    .prop_map(|parts| parts.concat())
}

/// Text in which every letter occurs once, so a chunk's letters tell where
/// in the text it was cut from.
fn arb_distinct_letters() -> impl Strategy<Value = String> {
    proptest::collection::vec(0u8..10, 0..400).prop_map(|kinds| {
        let mut next = 0x4E00u32;
        kinds
            .into_iter()
            .map(|kind| match kind {
                0..=5 => {
                    let c = char::from_u32(next).unwrap();
                    next += 1;
                    c
                }
                6 | 7 => ' ',
                8 => '.',
                _ => '\n',
            })
            .collect()
    })
}

fn is_letter(c: char) -> bool {
    !c.is_whitespace() && c != '.'
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Concatenating the chunks gives back the text, ignoring whitespace.
    #[test]
    fn sentence_chunks_cover_the_text(text in arb_prose(), chunk_size in 1usize..200) {
        let chunks = split(&text, chunk_size);
        prop_assert_eq!(strip_whitespace(&chunks.concat()), strip_whitespace(&text));
    }

    /// Only a single sentence may exceed the chunk size.
    #[test]
    fn oversize_chunks_are_single_sentences(text in arb_prose(), chunk_size in 1usize..200) {
        for chunk in split(&text, chunk_size) {
            if chunk.chars().count() > chunk_size {
                let inner: Vec<char> = chunk.chars().collect();
                let has_boundary = inner
                    .windows(2)
                    .any(|w| matches!(w[0], '.' | '!' | '?') && w[1].is_whitespace());
                prop_assert!(!has_boundary, "oversize chunk spans sentences: {:?}", chunk);
            }
        }
    }

    /// Text that fits comes back unchanged as the only chunk.
    #[test]
    fn fitting_text_is_a_single_chunk(text in arb_prose()) {
        let size = text.chars().count();
        prop_assert_eq!(split(&text, size), vec![text.clone()]);
    }

    /// Overlapping chunks respect the window size and preserve every
    /// non-whitespace char in order.
    #[test]
    fn overlap_chunks_are_bounded_and_ordered(
        text in arb_prose(),
        chunk_size in 20usize..300,
        overlap_ratio in 0.0f64..0.9,
    ) {
        let overlap = (chunk_size as f64 * overlap_ratio) as usize;
        let chunks = split_with_overlap(&text, chunk_size, overlap);

        if text.chars().count() > chunk_size {
            for chunk in &chunks {
                prop_assert!(chunk.chars().count() <= chunk_size);
            }
        }

        // Every chunk is a contiguous slice of the text.
        for chunk in &chunks {
            prop_assert!(text.contains(chunk.as_str()));
        }

        // The first chunk starts where the text does.
        if let Some(first) = chunks.first() {
            prop_assert!(text.trim_start().starts_with(first.as_str()));
        }
    }

    /// Sentence snapping never leaves text between two windows: every letter
    /// is in some chunk, and consecutive chunks are separated by whitespace
    /// and terminators at most.
    #[test]
    fn overlap_chunks_lose_no_text(
        text in arb_distinct_letters(),
        chunk_size in 5usize..250,
        overlap_ratio in 0.0f64..0.9,
    ) {
        let overlap = (chunk_size as f64 * overlap_ratio) as usize;
        let chunks = split_with_overlap(&text, chunk_size, overlap);

        for c in text.chars().filter(|&c| is_letter(c)) {
            prop_assert!(chunks.iter().any(|chunk| chunk.contains(c)), "{:?} is in no chunk", c);
        }

        let chars: Vec<char> = text.chars().collect();
        let position: HashMap<char, usize> =
            chars.iter().enumerate().filter(|(_, c)| is_letter(**c)).map(|(i, c)| (*c, i)).collect();
        let spans: Vec<(usize, usize)> = chunks
            .iter()
            .filter_map(|chunk| {
                let (offset, c) = chunk.chars().enumerate().find(|(_, c)| is_letter(*c))?;
                let start = position[&c] - offset;
                Some((start, start + chunk.chars().count()))
            })
            .collect();

        for pair in spans.windows(2) {
            let ((prev_start, prev_end), (next_start, _)) = (pair[0], pair[1]);
            prop_assert!(next_start >= prev_start);
            if next_start > prev_end {
                let gap = &chars[prev_end..next_start];
                prop_assert!(
                    gap.iter().all(|c| !is_letter(*c)),
                    "letters {:?} fall between two chunks",
                    gap.iter().collect::<String>()
                );
            }
        }
    }
}
