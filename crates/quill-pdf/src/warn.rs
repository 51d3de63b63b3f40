use serde::{Deserialize, Serialize};

use crate::span::Span;

/// Recoverable malformation report. Warnings never halt the parse on their
/// own; the orchestrator keeps advancing so downstream tools can inspect as
/// much as was parsed.
///
/// `code` is a stable, colon-separated tag under the `pdf:` prefix
/// (e.g. `pdf:tokenizer:unexpected_eof:string`) and is contract for
/// consumers. `message` is for humans and may change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    pub code: String,
    pub message: String,
    pub span: Option<Span>,
    pub note: Option<String>,
    pub cause: Option<String>,
}

impl Warning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            span: None,
            note: None,
            cause: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}
