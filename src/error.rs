use thiserror::Error;

/// Errors raised while constructing or growing a tree.
///
/// Proof generation and verification never produce one of these: a missing
/// record or a bad index degrades to the `-1` sentinel, a bad proof verifies
/// to `false`.
#[derive(Debug, Error)]
pub enum MerkleError {
    /// Malformed `records` or `options` argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A record could not be serialized to its canonical form.
    ///
    /// A `serde_json::Value` is acyclic and always serializes, so the built-in
    /// input hashes never produce this today; it is kept so canonicalization
    /// stays fallible at the API boundary.
    #[error("failed to canonicalize record: {0}")]
    Canonicalization(#[from] serde_json::Error),
}

impl MerkleError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        MerkleError::InvalidArgument(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, MerkleError>;
