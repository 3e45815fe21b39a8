//! Instruction prompts for the completion-backed stages.

use super::types::{SummaryLength, SummaryStyle, TranslationRequest};

/// Number of characters of the document shown to the language detector.
pub const DETECTION_PREFIX_CHARS: usize = 300;

/// Instruction preceding the text of a bullet-point summary.
pub const BULLET_INSTRUCTION: &str = "Summarize into bullet points:";

fn sentence_instruction(length: SummaryLength) -> &'static str {
    match length {
        SummaryLength::Short => "Summarize in 2-4 sentences.",
        SummaryLength::Medium => "Summarize in 6-9 sentences.",
        SummaryLength::Long => "Summarize in 12-16 sentences.",
    }
}

/// Build the summarization prompt for `text`.
pub fn summary_prompt(text: &str, style: SummaryStyle) -> String {
    match style {
        SummaryStyle::Bullets => format!("{BULLET_INSTRUCTION}\n{text}"),
        SummaryStyle::Sentences(length) => {
            format!("{}\nText:\n{text}", sentence_instruction(length))
        }
    }
}

/// Build the translation prompt. Language tags are used verbatim.
pub fn translation_prompt(request: &TranslationRequest) -> String {
    format!(
        "Translate from {} to {}:\n{}",
        request.source_lang, request.target_lang, request.text
    )
}

/// Build the language detection prompt from the first [`DETECTION_PREFIX_CHARS`] characters.
pub fn detection_prompt(text: &str) -> String {
    let prefix = match text.char_indices().nth(DETECTION_PREFIX_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    };
    format!("Detect language ISO code. Example: en, es, fr, hi.\n{prefix}")
}
