use thiserror::Error;

/// Ошибка чтения листинга. Все варианты несут смещение в символах
/// от начала текста, а не в байтах.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListingError {
    #[error("{message}")]
    Lexical { offset: usize, message: String },

    #[error("{message}")]
    Syntax { offset: usize, message: String },

    #[error("{message}")]
    UnresolvedReference { offset: usize, message: String },
}

impl ListingError {
    pub fn lexical(offset: usize, message: impl Into<String>) -> Self {
        Self::Lexical { offset, message: message.into() }
    }

    pub fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Self::Syntax { offset, message: message.into() }
    }

    pub fn unresolved(offset: usize, message: impl Into<String>) -> Self {
        Self::UnresolvedReference { offset, message: message.into() }
    }

    pub fn offset(&self) -> usize {
        match self {
            Self::Lexical { offset, .. }
            | Self::Syntax { offset, .. }
            | Self::UnresolvedReference { offset, .. } => *offset,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Lexical { message, .. }
            | Self::Syntax { message, .. }
            | Self::UnresolvedReference { message, .. } => message,
        }
    }
}
