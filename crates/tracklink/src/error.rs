use thiserror::Error;

pub type Result<T> = std::result::Result<T, BindError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("calling set_state inside a data fetch would cause an endless loop")]
    ReentrantMutation,

    #[error("data fetch must return a mapping, got {found}")]
    NotAMapping { found: &'static str },

    #[error("data fetch failed: {message}")]
    Fetch { message: String },

    #[error("tracking runtime did not run the data fetch")]
    FetchNotRun,

    #[error("invalid value for {key}: {value:?}")]
    InvalidConfig { key: &'static str, value: String },
}

impl BindError {
    /// Build a fetch failure from a message.
    #[must_use]
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
        }
    }

    /// Whether the error signals a dependency cycle rather than bad data.
    #[must_use]
    pub fn is_reentrant(&self) -> bool {
        matches!(self, Self::ReentrantMutation)
    }
}
