use thiserror::Error;

/// A non-fatal finding surfaced to the caller alongside a pass result.
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    Parse,
    Structure,
    Induction,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Parse, message)
    }

    pub fn structure(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Structure, message)
    }

    pub fn induction(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Induction, message)
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Parse failed: {0:#?}")]
    Parse(Vec<Warning>),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),
}
