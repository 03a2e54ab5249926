use std::fmt::Display;

use borsh::{BorshDeserialize, BorshSerialize};

/// The monotone epoch counter of the directory.
///
/// `Seqno(0)` is reserved and means "none": a fresh tree sits at seqno 0, an
/// absent child of an internal node carries seqno 0, and a query answer for
/// an absent label reports seqno 0. Every published commitment advances the
/// counter by exactly one.
///
/// ```rust
/// # use rzks_primitives::Seqno;
/// let s = Seqno::NONE;
/// assert!(s.is_none());
/// assert_eq!(s.next(), Seqno::new(1));
/// ```
#[derive(
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    BorshSerialize,
    BorshDeserialize,
)]
pub struct Seqno(pub u64);

impl Seqno {
    /// The reserved "none" value.
    pub const NONE: Self = Self(0);

    /// Create a seqno from a raw counter value.
    #[inline]
    #[must_use]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw counter value.
    #[inline]
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Whether this is the reserved "none" value.
    #[inline]
    #[must_use]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// The successor seqno.
    #[inline]
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Big-endian bytes, as absorbed by the digest rules.
    #[inline]
    #[must_use]
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl From<u64> for Seqno {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Display for Seqno {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
