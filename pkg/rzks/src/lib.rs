#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::match_bool)]
#![deny(missing_docs)]

//! # rzks
//!
//! An append-only, history-preserving authenticated key-value directory: a
//! sparse prefix tree over VRF-derived labels, with versioned node storage
//! and compact proofs of membership, absence, and history extension.
//!
//! A server maintains a [`Tree`] and publishes a commitment (the root
//! [`TransparencyDigest`]) after every transaction. Clients holding a
//! commitment verify with a stateless [`Verifier`]:
//!
//! ```rust
//! # use rzks::*;
//! let cfg = Config::generate_parameters();
//! let mut tree = Tree::init(cfg, MemoryStore::new()).unwrap();
//! let ctx = Context::new();
//!
//! let (com, seqno) = tree
//!     .update(&ctx, batch! { "alice" => "pk-1", "bob" => "pk-2" })
//!     .unwrap();
//!
//! let answer = tree.query(&ctx, seqno, b"alice").unwrap();
//! let verifier = tree.verifier();
//!
//! let outcome = verifier.verify(
//!     &com,
//!     b"alice",
//!     answer.value.as_deref(),
//!     answer.added_at,
//!     &answer.proof,
//! );
//! assert_eq!(outcome, VerifyOutcome::Included);
//! ```
//!
//! ## Epochs
//!
//! Node records are never overwritten: each transaction writes fresh records
//! keyed by the new epoch, so every historical tree state stays queryable
//! and one commitment can be proven a strict extension of an earlier one
//! ([`Tree::extension_proof`] / [`Verifier::verify_extension`]).
//!
//! ## Rotation
//!
//! [`Tree::rotate`] replaces the VRF secret and rebuilds the directory under
//! fresh labels, preserving every stored binding. A compromise of the old
//! secret stops mattering for commitments published after the rotation; the
//! published [`RotationProof`] transcript lets clients bridge commitments
//! across the key change.

mod config;
mod context;
mod empty;
mod error;
mod macros;
/// Proof envelopes exchanged between server and verifiers
pub mod proof;
/// The pluggable node store and its reference implementations
pub mod store;
mod tree;
mod verify;
mod vrf;

pub use config::{Config, RootVersion};
pub use context::Context;
pub use empty::empty_subtree_digest;
pub use error::{ConfigError, Error, ProofError, StorageError, VrfError};
pub use proof::{
    CopathEntry, ExtensionNode, ExtensionProof, MembershipProof, MembershipTerminal, QueryAnswer,
    RotationProof,
};
pub use store::{ChildRef, MemoryStore, NodeRecord, NodeStore};
#[cfg(feature = "storage")]
pub use store::RocksStore;
pub use tree::Tree;
pub use verify::{Verifier, VerifyOutcome};
pub use vrf::{VrfProof, VrfPublicKey, VrfSecret};

pub use rzks_primitives::{hash, Digest, Position, Seqno};

/// The published commitment to a tree state at an epoch.
pub type TransparencyDigest = Digest;
