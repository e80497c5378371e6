#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("malformed request input: {0}")]
    Refinement(String),

    #[error("backend lookup failure: {0}")]
    Backend(String),

    #[error("off-chain store write failure: {0}")]
    Store(String),
}
