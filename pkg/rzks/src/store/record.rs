use std::io;

use borsh::{BorshDeserialize, BorshSerialize};
use rzks_primitives::{hash, Digest, Seqno};

use crate::empty::empty_subtree_digest;

const TAG_INTERNAL: u8 = 0x01;
const TAG_LEAF: u8 = 0x02;
const TAG_EMPTY: u8 = 0x03;

/// A reference to a child subtree held inside an internal record: the
/// child's digest and the epoch of the child's most recent record
/// ([`Seqno::NONE`] for a canonical empty child).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildRef {
    /// The child's subtree digest.
    pub digest: Digest,
    /// The epoch of the child's most recent record.
    pub epoch: Seqno,
}

impl ChildRef {
    /// The reference to a canonical empty subtree rooted at `depth`.
    #[must_use]
    pub fn empty(depth: usize) -> Self {
        Self {
            digest: empty_subtree_digest(depth),
            epoch: Seqno::NONE,
        }
    }

    /// Whether this reference points at a canonical empty subtree.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.epoch.is_none()
    }
}

/// The body of an internal node record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternalRecord {
    /// The left (0-bit) child.
    pub left: ChildRef,
    /// The right (1-bit) child.
    pub right: ChildRef,
}

impl InternalRecord {
    /// The child reached by `bit`.
    #[inline]
    #[must_use]
    pub fn child(&self, bit: bool) -> &ChildRef {
        match bit {
            false => &self.left,
            true => &self.right,
        }
    }
}

/// The body of a leaf node record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafRecord {
    /// The VRF image whose path terminates at this leaf.
    pub vrf_image: Digest,
    /// The hiding commitment to the stored value.
    pub value_commit: Digest,
    /// The epoch the binding was inserted (or last re-bound) at.
    pub insert_epoch: Seqno,
}

/// A persisted node record, keyed in the store by `(epoch, position)`.
///
/// The wire format is fixed-width: a one-byte kind tag, then for internal
/// records the two child digests followed by the two child epochs
/// (big-endian), for leaf records the VRF image, value commitment and insert
/// epoch, and for the empty tombstone nothing.
///
/// ```rust
/// # use rzks::{ChildRef, NodeRecord};
/// let record = NodeRecord::Internal(rzks::store::InternalRecord {
///     left: ChildRef::empty(1),
///     right: ChildRef::empty(1),
/// });
/// let bytes = borsh::to_vec(&record).unwrap();
/// assert_eq!(bytes.len(), 1 + 32 + 32 + 8 + 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRecord {
    /// An internal node with two children.
    Internal(InternalRecord),
    /// A leaf holding one binding.
    Leaf(LeafRecord),
    /// An empty tombstone: the position holds nothing as of the record's
    /// epoch. Persisted for the root of a tree that publishes epochs while
    /// holding no bindings, and for every position a rotation's rebuild
    /// vacates.
    Empty,
}

impl NodeRecord {
    /// Build an internal record from its children.
    #[must_use]
    pub fn internal(left: ChildRef, right: ChildRef) -> Self {
        Self::Internal(InternalRecord { left, right })
    }

    /// Build a leaf record.
    #[must_use]
    pub fn leaf(vrf_image: Digest, value_commit: Digest, insert_epoch: Seqno) -> Self {
        Self::Leaf(LeafRecord {
            vrf_image,
            value_commit,
            insert_epoch,
        })
    }

    /// The digest of this record when it sits at `depth`.
    ///
    /// Only the empty tombstone actually depends on the depth; internal and
    /// leaf digests are functions of the record alone.
    #[must_use]
    pub fn digest(&self, depth: usize) -> Digest {
        match self {
            Self::Internal(internal) => hash::internal_digest(
                &internal.left.digest,
                internal.left.epoch,
                &internal.right.digest,
                internal.right.epoch,
            ),
            Self::Leaf(leaf) => {
                hash::leaf_digest(&leaf.vrf_image, &leaf.value_commit, leaf.insert_epoch)
            }
            Self::Empty => empty_subtree_digest(depth),
        }
    }
}

fn write_digest<W: io::Write>(writer: &mut W, digest: &Digest) -> io::Result<()> {
    writer.write_all(digest.as_bytes())
}

fn write_epoch<W: io::Write>(writer: &mut W, epoch: Seqno) -> io::Result<()> {
    writer.write_all(&epoch.to_be_bytes())
}

fn read_digest<R: io::Read>(reader: &mut R) -> io::Result<Digest> {
    let mut bytes = [0u8; Digest::SIZE];
    reader.read_exact(&mut bytes)?;
    Ok(Digest::new(bytes))
}

fn read_epoch<R: io::Read>(reader: &mut R) -> io::Result<Seqno> {
    let mut bytes = [0u8; 8];
    reader.read_exact(&mut bytes)?;
    Ok(Seqno::new(u64::from_be_bytes(bytes)))
}

impl BorshSerialize for NodeRecord {
    fn serialize<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            Self::Internal(internal) => {
                writer.write_all(&[TAG_INTERNAL])?;
                write_digest(writer, &internal.left.digest)?;
                write_digest(writer, &internal.right.digest)?;
                write_epoch(writer, internal.left.epoch)?;
                write_epoch(writer, internal.right.epoch)
            }
            Self::Leaf(leaf) => {
                writer.write_all(&[TAG_LEAF])?;
                write_digest(writer, &leaf.vrf_image)?;
                write_digest(writer, &leaf.value_commit)?;
                write_epoch(writer, leaf.insert_epoch)
            }
            Self::Empty => writer.write_all(&[TAG_EMPTY]),
        }
    }
}

impl BorshDeserialize for NodeRecord {
    fn deserialize_reader<R: io::Read>(reader: &mut R) -> io::Result<Self> {
        let mut tag = [0u8; 1];
        reader.read_exact(&mut tag)?;

        match tag[0] {
            TAG_INTERNAL => {
                let left_digest = read_digest(reader)?;
                let right_digest = read_digest(reader)?;
                let left_epoch = read_epoch(reader)?;
                let right_epoch = read_epoch(reader)?;
                Ok(Self::Internal(InternalRecord {
                    left: ChildRef {
                        digest: left_digest,
                        epoch: left_epoch,
                    },
                    right: ChildRef {
                        digest: right_digest,
                        epoch: right_epoch,
                    },
                }))
            }
            TAG_LEAF => Ok(Self::Leaf(LeafRecord {
                vrf_image: read_digest(reader)?,
                value_commit: read_digest(reader)?,
                insert_epoch: read_epoch(reader)?,
            })),
            TAG_EMPTY => Ok(Self::Empty),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown node record tag {other:#04x}"),
            )),
        }
    }
}
