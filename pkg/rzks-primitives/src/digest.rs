use std::fmt::{Debug, Display};

use borsh::{BorshDeserialize, BorshSerialize};
use subtle::ConstantTimeEq;

/// An `L = 32` byte hash output.
///
/// Every node digest, value commitment, VRF image and published commitment
/// in the directory is a `Digest`. The derived equality is
/// variable-time and intended for data-structure bookkeeping; verifiers must
/// use [`Digest::ct_eq`] instead.
///
/// ```rust
/// # use rzks_primitives::Digest;
/// let d = Digest::new([7; 32]);
/// assert_eq!(d.to_hex().len(), 64);
/// assert!(d.ct_eq(&d));
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
    BorshSerialize,
    BorshDeserialize,
)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// The digest length in bytes (the `L` parameter of the directory).
    pub const SIZE: usize = 32;

    /// The digest length in bits, which is also the maximum tree depth.
    pub const BITS: usize = Self::SIZE * 8;

    /// Create a digest from raw bytes.
    #[inline]
    #[must_use]
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Consume the digest, returning the raw bytes.
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> [u8; 32] {
        self.0
    }

    /// The bit at `index`, most significant bit first.
    ///
    /// Bit `0` is the top-level left/right choice of the tree path derived
    /// from this digest: `false` = left, `true` = right.
    ///
    /// ```rust
    /// # use rzks_primitives::Digest;
    /// let mut bytes = [0; 32];
    /// bytes[0] = 0b1010_0000;
    /// let d = Digest::new(bytes);
    /// assert!(d.bit(0));
    /// assert!(!d.bit(1));
    /// assert!(d.bit(2));
    /// ```
    #[inline]
    #[must_use]
    pub fn bit(&self, index: usize) -> bool {
        assert!(index < Self::BITS);
        (self.0[index / 8] >> (7 - index % 8)) & 1 == 1
    }

    /// Constant-time equality.
    #[inline]
    #[must_use]
    pub fn ct_eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }

    /// Hex-encode the digest.
    #[inline]
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Debug for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use test_strategy::proptest;

    use super::*;

    #[test]
    fn bit_indexing_is_msb_first() {
        let mut bytes = [0; 32];
        bytes[0] = 0x80;
        bytes[31] = 0x01;
        let d = Digest::new(bytes);

        assert!(d.bit(0));
        assert!(!d.bit(1));
        assert!(!d.bit(254));
        assert!(d.bit(255));
    }

    #[test]
    fn ct_eq_matches_eq() {
        let a = Digest::new([1; 32]);
        let b = Digest::new([2; 32]);

        assert!(a.ct_eq(&a));
        assert!(!a.ct_eq(&b));
    }

    #[proptest]
    fn borsh_round_trip(bytes: [u8; 32]) {
        let digest = Digest::new(bytes);
        let encoded = borsh::to_vec(&digest).unwrap();

        assert_eq!(encoded.len(), Digest::SIZE);
        assert_eq!(Digest::try_from_slice(&encoded).unwrap(), digest);
    }
}
