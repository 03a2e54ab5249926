//! Domain-separated hash constructions.
//!
//! Every digest in the directory is produced by a single SHA-512/256
//! construction prefixed with a one-byte domain tag, so digests from
//! different roles can never collide with each other.

use sha2::{Digest as _, Sha512_256};

use crate::{Digest, Seqno};

/// The one-byte domain tags.
pub mod tag {
    /// An internal tree node.
    pub const INTERNAL: u8 = 0x01;
    /// A leaf tree node.
    pub const LEAF: u8 = 0x02;
    /// A canonical empty subtree.
    pub const EMPTY: u8 = 0x03;
    /// A commitment to a value and its blinding nonce.
    pub const VALUE_COMMIT: u8 = 0x04;
    /// Reserved for extension transcripts.
    pub const EXTENSION: u8 = 0x05;
    /// A key-rotation transcript.
    pub const ROTATION: u8 = 0x06;
}

/// The byte length of the blinding nonce drawn per stored value.
pub const NONCE_SIZE: usize = 32;

fn digest_of(domain: u8, parts: &[&[u8]]) -> Digest {
    let mut hasher = Sha512_256::new();
    hasher.update([domain]);
    for part in parts {
        hasher.update(part);
    }
    Digest::new(hasher.finalize().into())
}

/// The digest of an internal node from its child digests and child epochs.
///
/// ```rust
/// # use rzks_primitives::{hash, Digest, Seqno};
/// let left = Digest::new([1; 32]);
/// let right = Digest::new([2; 32]);
/// let a = hash::internal_digest(&left, Seqno::new(1), &right, Seqno::new(2));
/// let b = hash::internal_digest(&right, Seqno::new(2), &left, Seqno::new(1));
/// assert_ne!(a, b);
/// ```
#[must_use]
pub fn internal_digest(
    left: &Digest,
    left_epoch: Seqno,
    right: &Digest,
    right_epoch: Seqno,
) -> Digest {
    digest_of(
        tag::INTERNAL,
        &[
            left.as_bytes(),
            right.as_bytes(),
            &left_epoch.to_be_bytes(),
            &right_epoch.to_be_bytes(),
        ],
    )
}

/// The digest of a leaf node from its VRF image, value commitment and the
/// epoch the binding was inserted at.
#[must_use]
pub fn leaf_digest(vrf_image: &Digest, value_commit: &Digest, insert_epoch: Seqno) -> Digest {
    digest_of(
        tag::LEAF,
        &[
            vrf_image.as_bytes(),
            value_commit.as_bytes(),
            &insert_epoch.to_be_bytes(),
        ],
    )
}

/// The digest of the canonical empty slot at the maximum tree depth.
///
/// Empty subtrees at shallower depths are derived by repeatedly folding this
/// value through [`internal_digest`] with seqno 0 children.
#[must_use]
pub fn empty_slot_digest() -> Digest {
    digest_of(tag::EMPTY, &[])
}

/// The hiding commitment stored in a leaf in place of the raw value.
///
/// ```rust
/// # use rzks_primitives::hash;
/// let a = hash::value_commitment(b"v", &[0; 32]);
/// let b = hash::value_commitment(b"v", &[1; 32]);
/// assert_ne!(a, b);
/// ```
#[must_use]
pub fn value_commitment(value: &[u8], nonce: &[u8; NONCE_SIZE]) -> Digest {
    digest_of(tag::VALUE_COMMIT, &[value, nonce])
}

/// The transcript digest binding a key rotation to the roots and the
/// successor public key.
#[must_use]
pub fn rotation_transcript(
    prev_root: &Digest,
    next_public_key: &[u8],
    next_root: &Digest,
) -> Digest {
    digest_of(
        tag::ROTATION,
        &[prev_root.as_bytes(), next_public_key, next_root.as_bytes()],
    )
}
