use thiserror::Error;

/// A template that cannot be tokenized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
  #[error("unterminated reference starting at byte {position}")]
  Unterminated { position: usize },

  #[error("empty reference at byte {position}")]
  EmptyReference { position: usize },

  #[error("invalid reference '{reference}'")]
  InvalidReference { reference: String },
}
