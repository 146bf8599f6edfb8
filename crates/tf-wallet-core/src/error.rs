use thiserror::Error;

/// Failure of a user-initiated feature action.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("{0}")]
    Validation(String),
    #[error("MEMO_TOO_LONG: memo is {0} bytes, at most 32 are allowed")]
    MemoTooLong(usize),
    #[error("Insufficient balance")]
    InsufficientBalance,
    #[error("No liquidity pool")]
    NoLiquidity,
    #[error("another submission is already in progress")]
    Busy,
    #[error(transparent)]
    Chain(#[from] anyhow::Error),
}

impl FlowError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
