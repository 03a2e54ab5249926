//! Proof envelopes exchanged between the server and stateless verifiers.
//!
//! All envelopes are borsh-encoded and round-trip byte-identically. A
//! [`MembershipProof`] answers both membership and absence claims, with the
//! [`MembershipTerminal`] discriminating; an [`ExtensionProof`] links two
//! commitments; a [`RotationProof`] bridges commitments across a VRF key
//! rotation.

use borsh::{BorshDeserialize, BorshSerialize};
use rzks_primitives::{hash, Digest, Position, Seqno};

use crate::store::NodeRecord;
use crate::vrf::{VrfProof, VrfPublicKey};

/// One copath entry: the digest of the sibling subtree alongside the path,
/// paired with the epoch of the sibling's most recent record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct CopathEntry {
    /// The sibling's subtree digest.
    pub sibling: Digest,
    /// The epoch of the sibling's most recent record ([`Seqno::NONE`] for a
    /// canonical empty sibling).
    pub epoch: Seqno,
}

/// What the proof's tree walk terminated at.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum MembershipTerminal {
    /// The queried label's own leaf: a membership claim. Carries the
    /// blinding nonce so a verifier can recompute the value commitment from
    /// the claimed value.
    Leaf {
        /// The blinding nonce of the stored value commitment.
        nonce: [u8; hash::NONCE_SIZE],
        /// The epoch the binding was inserted (or last re-bound) at.
        insert_epoch: Seqno,
        /// The epoch the leaf record was last written. Exceeds
        /// `insert_epoch` when a later split relocated the leaf.
        record_epoch: Seqno,
    },
    /// A canonical empty slot where the label's leaf would live: an absence
    /// claim.
    Empty,
    /// A leaf for a different VRF image occupying a prefix of the label's
    /// path: an absence claim.
    OtherLeaf {
        /// The occupying leaf's VRF image.
        vrf_image: Digest,
        /// The occupying leaf's value commitment.
        value_commit: Digest,
        /// The occupying leaf's insert epoch.
        insert_epoch: Seqno,
        /// The epoch the occupying leaf's record was last written.
        record_epoch: Seqno,
    },
}

/// A proof that a label is present at (or absent from) a committed tree
/// state.
///
/// Produced by [`Tree::query`], checked by [`Verifier::verify`].
///
/// [`Tree::query`]: crate::Tree::query
/// [`Verifier::verify`]: crate::Verifier::verify
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct MembershipProof {
    /// The VRF image of the queried label.
    pub vrf_image: Digest,
    /// The proof that `vrf_image` is the label's image under the era key.
    pub vrf_proof: VrfProof,
    /// The sibling digests along the path, ordered root to terminal.
    pub copath: Vec<CopathEntry>,
    /// What the walk terminated at.
    pub terminal: MembershipTerminal,
}

/// The answer to a query: the proof, plus the stored value and its insert
/// seqno when the label is bound ([`None`] / [`Seqno::NONE`] otherwise).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryAnswer {
    /// The membership (or absence) proof.
    pub proof: MembershipProof,
    /// The stored value, if the label was bound at the queried epoch.
    pub value: Option<Vec<u8>>,
    /// The seqno the binding was inserted at, or [`Seqno::NONE`].
    pub added_at: Seqno,
}

/// One changed position inside an [`ExtensionProof`]: the record as of the
/// newer epoch, plus the state as of the older epoch (`None` = canonical
/// empty).
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ExtensionNode {
    /// The position this node describes.
    pub position: Position,
    /// The epoch of the newest record at this position.
    pub new_epoch: Seqno,
    /// The newest record at this position.
    pub new_record: NodeRecord,
    /// The record (and its epoch) as of the older endpoint, or `None` if
    /// the position was canonically empty then.
    pub old: Option<(Seqno, NodeRecord)>,
}

/// A proof that one commitment is a strict extension of an earlier one.
///
/// Carries every position whose subtree digest changed in `(from, to]`,
/// sorted by position and prefix-closed up to the root; the unchanged child
/// digests stored inside the internal records let a verifier reassemble both
/// roots.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ExtensionProof {
    /// The older endpoint.
    pub from: Seqno,
    /// The newer endpoint.
    pub to: Seqno,
    /// The changed positions, sorted lexicographically.
    pub nodes: Vec<ExtensionNode>,
}

/// The public transcript of a VRF key rotation.
///
/// Binds the pre-rotation root, the successor public key and the rebuilt
/// root into one digest, so clients can link the commitment lineage across
/// the key change and roll their verifier forward to `next_public_key`.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct RotationProof {
    /// The epoch the rotation published.
    pub seqno: Seqno,
    /// The root commitment immediately before the rotation.
    pub prev_root: Digest,
    /// The successor VRF public key.
    pub next_public_key: VrfPublicKey,
    /// The root commitment the rotation published.
    pub next_root: Digest,
    /// `H(tag_rotation ∥ prev_root ∥ next_public_key ∥ next_root)`.
    pub transcript: Digest,
}
