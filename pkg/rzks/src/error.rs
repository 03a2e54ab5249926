use rzks_primitives::{Position, Seqno};

/// Invalid parameters passed to [`Tree::init`].
///
/// [`Tree::init`]: crate::Tree::init
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The digest length is not the supported `L = 32`.
    #[error("unsupported digest length {0}, only 32 is supported")]
    DigestLength(usize),

    /// The rebuild step granularity must be at least 1.
    #[error("step granularity must be at least 1")]
    StepZero,
}

/// An error from the node store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No record exists under the requested key.
    #[error("no record at epoch {epoch} position {position}")]
    NotFound {
        /// The epoch of the requested record.
        epoch: Seqno,
        /// The position of the requested record.
        position: Position,
    },

    /// A record was already written under this key; records are append-only.
    #[error("duplicate write at epoch {epoch} position {position}")]
    DuplicatePut {
        /// The epoch of the rejected write.
        epoch: Seqno,
        /// The position of the rejected write.
        position: Position,
    },

    /// A stored record failed to decode.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// The operation's context was cancelled at a store boundary.
    #[error("operation cancelled")]
    Cancelled,

    /// An error from the rocksdb engine.
    #[cfg(feature = "storage")]
    #[error("rocksdb error: {0}")]
    Rocksdb(#[from] rocksdb::Error),
}

/// A VRF failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VrfError {
    /// The public key bytes do not decode to a valid key.
    #[error("malformed VRF public key")]
    MalformedKey,

    /// The proof bytes do not decode to a valid proof.
    #[error("malformed VRF evaluation proof")]
    MalformedProof,

    /// The proof does not verify, or the claimed image does not match the
    /// proven output.
    #[error("invalid VRF evaluation proof")]
    InvalidProof,

    /// The queried epoch predates the current VRF key; its labels can no
    /// longer be derived.
    #[error("epoch {queried} predates the key rotation at epoch {rotated_at}")]
    KeyMismatch {
        /// The epoch the caller asked about.
        queried: Seqno,
        /// The epoch of the rotation that retired the needed key.
        rotated_at: Seqno,
    },
}

/// A classified verification failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProofError {
    /// The proof is structurally malformed for the claim being checked.
    #[error("malformed proof: {0}")]
    BadStructure(&'static str),

    /// An intermediate digest check failed.
    #[error("digest mismatch inside the proof")]
    DigestMismatch,

    /// An epoch carried by the proof contradicts the claim.
    #[error("epoch mismatch inside the proof")]
    EpochMismatch,

    /// The recomputed root does not equal the supplied commitment.
    #[error("proof does not match the supplied commitment")]
    WrongCommitment,

    /// The embedded VRF evaluation failed to verify.
    #[error(transparent)]
    Vrf(#[from] VrfError),
}

/// Any failure of a directory operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A node store failure; the in-progress transaction was aborted.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A VRF failure.
    #[error(transparent)]
    Vrf(#[from] VrfError),

    /// A proof could not be produced or checked.
    #[error(transparent)]
    Proof(#[from] ProofError),

    /// An internal invariant was violated. This is a bug; the operation is
    /// terminated and nothing is published.
    #[error("invariant violation: {0}")]
    Invariant(String),
}
