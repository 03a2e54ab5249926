//! The pluggable persistent map of node records.
//!
//! Records are keyed by `(epoch, position)` and append-only: once written, a
//! key is never overwritten; later epochs write fresh records under their
//! own keys. [`MemoryStore`] is the reference implementation; `RocksStore`
//! (behind the `storage` feature) persists the same contract to disk.

use rzks_primitives::{Position, Seqno};

use crate::context::Context;
use crate::error::StorageError;

mod memory;
mod record;
#[cfg(feature = "storage")]
mod rocks;

pub use memory::MemoryStore;
pub use record::{ChildRef, InternalRecord, LeafRecord, NodeRecord};
#[cfg(feature = "storage")]
pub use rocks::RocksStore;

/// A record yielded by a range scan: the position, the epoch of the selected
/// record, and the record itself.
pub type RangeItem = (Position, Seqno, NodeRecord);

/// An iterator over range-scan results.
pub type RangeIter<'a> = Box<dyn Iterator<Item = Result<RangeItem, StorageError>> + 'a>;

/// The storage capability required by the tree.
///
/// Implementations must uphold the append-only contract: [`NodeStore::put`]
/// rejects a key that was already written with
/// [`StorageError::DuplicatePut`]. At most one writer issues puts at a time;
/// reads may proceed concurrently.
pub trait NodeStore {
    /// Fetch the record written at exactly `(epoch, position)`.
    fn get(
        &self,
        ctx: &Context,
        epoch: Seqno,
        position: &Position,
    ) -> Result<NodeRecord, StorageError>;

    /// Write a record at `(epoch, position)`, rejecting duplicates.
    fn put(
        &mut self,
        ctx: &Context,
        epoch: Seqno,
        position: &Position,
        record: &NodeRecord,
    ) -> Result<(), StorageError>;

    /// For every position under `prefix` that has any record at an epoch
    /// `<= upper`, yield the most recent such record. Results are ordered by
    /// position, lexicographic on the bit string.
    fn range_latest<'a>(
        &'a self,
        ctx: &Context,
        prefix: &Position,
        upper: Seqno,
    ) -> Result<RangeIter<'a>, StorageError>;

    /// The highest epoch any record was written under, or [`Seqno::NONE`]
    /// for an empty store.
    fn latest_epoch(&self, ctx: &Context) -> Result<Seqno, StorageError>;
}
