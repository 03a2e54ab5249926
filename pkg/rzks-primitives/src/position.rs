use std::cmp::Ordering;
use std::fmt::{Debug, Display};
use std::io;

use bitvec::{order::Msb0, vec::BitVec};
use borsh::{BorshDeserialize, BorshSerialize};

use crate::Digest;

/// A bit-string prefix addressing a node in the binary tree.
///
/// The root is the empty prefix; appending a `false` bit descends into the
/// left child and a `true` bit into the right child. Positions are ordered
/// lexicographically on the bit string, so a prefix sorts immediately before
/// every position underneath it, the property the node store's range scans
/// rely on.
///
/// ```rust
/// # use rzks_primitives::Position;
/// let root = Position::root();
/// let left = root.child(false);
/// let right = root.child(true);
///
/// assert!(root < left);
/// assert!(left < left.child(false));
/// assert!(left.child(true) < right);
/// assert!(left.is_prefix_of(&left.child(true)));
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Position {
    bits: BitVec<u8, Msb0>,
}

impl Position {
    /// The root position (the empty prefix).
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Whether this is the root position.
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.bits.is_empty()
    }

    /// The depth of the position, i.e. the number of bits in the prefix.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.bits.len()
    }

    /// The bit at `index` (0 = the top-level choice).
    #[inline]
    #[must_use]
    pub fn bit(&self, index: usize) -> bool {
        self.bits[index]
    }

    /// The child position reached by appending `bit`.
    #[must_use]
    pub fn child(&self, bit: bool) -> Self {
        let mut bits = self.bits.clone();
        bits.push(bit);
        Self { bits }
    }

    /// The parent position, or `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.bits.is_empty() {
            return None;
        }
        let mut bits = self.bits.clone();
        bits.pop();
        Some(Self { bits })
    }

    /// Whether `self` is a (non-strict) prefix of `other`.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        other.bits.len() >= self.bits.len() && other.bits[..self.bits.len()] == self.bits[..]
    }

    /// The path prefix of `digest`, taking its first `depth` bits.
    ///
    /// This is how a VRF image is turned into the tree location of its leaf.
    #[must_use]
    pub fn from_digest(digest: &Digest, depth: usize) -> Self {
        let mut bits = BitVec::with_capacity(depth);
        for index in 0..depth {
            bits.push(digest.bit(index));
        }
        Self { bits }
    }

    /// The first position after every position prefixed by `self`, or `None`
    /// if no such position exists (the all-ones prefix, or the root).
    ///
    /// Used as the exclusive upper bound of a prefix range scan.
    #[must_use]
    pub fn range_end(&self) -> Option<Self> {
        let mut bits = self.bits.clone();
        while bits.last().as_deref() == Some(&true) {
            bits.pop();
        }
        if bits.is_empty() {
            return None;
        }
        let last = bits.len() - 1;
        bits.set(last, true);
        Some(Self { bits })
    }
}

impl PartialOrd for Position {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.bits.iter().by_vals().zip(other.bits.iter().by_vals()) {
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        self.bits.len().cmp(&other.bits.len())
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.is_root() {
            return write!(f, "(root)");
        }
        for bit in self.bits.iter().by_vals() {
            write!(f, "{}", u8::from(bit))?;
        }
        Ok(())
    }
}

impl Debug for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Position({self})")
    }
}

impl BorshSerialize for Position {
    fn serialize<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        let len = u16::try_from(self.bits.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "position too deep"))?;
        len.serialize(writer)?;

        let mut bytes = vec![0u8; (self.bits.len() + 7) / 8];
        for (index, bit) in self.bits.iter().by_vals().enumerate() {
            if bit {
                bytes[index / 8] |= 0x80 >> (index % 8);
            }
        }
        writer.write_all(&bytes)
    }
}

impl BorshDeserialize for Position {
    fn deserialize_reader<R: io::Read>(reader: &mut R) -> io::Result<Self> {
        let len = u16::deserialize_reader(reader)? as usize;
        if len > Digest::BITS {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "position too deep",
            ));
        }

        let mut bytes = vec![0u8; (len + 7) / 8];
        reader.read_exact(&mut bytes)?;

        let mut bits = BitVec::with_capacity(len);
        for index in 0..len {
            bits.push(bytes[index / 8] & (0x80 >> (index % 8)) != 0);
        }

        // reject non-canonical encodings with garbage in the trailing bits
        for index in len..bytes.len() * 8 {
            if bytes[index / 8] & (0x80 >> (index % 8)) != 0 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "trailing position bits must be zero",
                ));
            }
        }

        Ok(Self { bits })
    }
}
