use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackerError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("flush called while a flush is already running")]
    ReentrantFlush,

    #[error("flush did not settle after {rounds} recomputations")]
    FlushLimitExceeded { rounds: usize },
}
