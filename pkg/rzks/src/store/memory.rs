use std::collections::BTreeMap;
use std::ops::Bound;

use rzks_primitives::{Position, Seqno};

use crate::context::Context;
use crate::error::StorageError;

use super::{NodeRecord, NodeStore, RangeIter};

/// The reference in-memory node store.
///
/// Records live in an ordered map keyed by `(position, epoch)`, so a range
/// scan is a prefix scan followed by a per-position selection of the most
/// recent epoch; a second map keyed by epoch keeps write-count bookkeeping.
///
/// ```rust
/// # use rzks::*;
/// let mut store = MemoryStore::new();
/// let ctx = Context::new();
///
/// let record = NodeRecord::Empty;
/// store.put(&ctx, Seqno::new(1), &Position::root(), &record).unwrap();
///
/// // the same key can never be written twice
/// let err = store.put(&ctx, Seqno::new(1), &Position::root(), &record);
/// assert!(err.is_err());
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    records: BTreeMap<(Position, Seqno), NodeRecord>,
    epochs: BTreeMap<Seqno, usize>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl NodeStore for MemoryStore {
    fn get(
        &self,
        ctx: &Context,
        epoch: Seqno,
        position: &Position,
    ) -> Result<NodeRecord, StorageError> {
        ctx.check()?;
        self.records
            .get(&(position.clone(), epoch))
            .copied()
            .ok_or(StorageError::NotFound {
                epoch,
                position: position.clone(),
            })
    }

    fn put(
        &mut self,
        ctx: &Context,
        epoch: Seqno,
        position: &Position,
        record: &NodeRecord,
    ) -> Result<(), StorageError> {
        ctx.check()?;
        let key = (position.clone(), epoch);
        if self.records.contains_key(&key) {
            return Err(StorageError::DuplicatePut {
                epoch,
                position: position.clone(),
            });
        }
        self.records.insert(key, *record);
        *self.epochs.entry(epoch).or_insert(0) += 1;
        Ok(())
    }

    fn range_latest<'a>(
        &'a self,
        ctx: &Context,
        prefix: &Position,
        upper: Seqno,
    ) -> Result<RangeIter<'a>, StorageError> {
        ctx.check()?;

        let start = Bound::Included((prefix.clone(), Seqno::NONE));
        let end = match prefix.range_end() {
            Some(end) => Bound::Excluded((end, Seqno::NONE)),
            None => Bound::Unbounded,
        };

        let mut selected = Vec::new();
        let mut current: Option<(Position, Seqno, NodeRecord)> = None;

        for ((position, epoch), record) in self.records.range((start, end)) {
            if *epoch > upper {
                continue;
            }
            // epochs ascend within a position, so the newest survivor wins
            if !matches!(&current, Some((held, _, _)) if held == position) {
                selected.extend(current.take());
            }
            current = Some((position.clone(), *epoch, *record));
        }
        selected.extend(current);

        Ok(Box::new(selected.into_iter().map(Ok)))
    }

    fn latest_epoch(&self, ctx: &Context) -> Result<Seqno, StorageError> {
        ctx.check()?;
        Ok(self
            .epochs
            .keys()
            .next_back()
            .copied()
            .unwrap_or(Seqno::NONE))
    }
}

#[cfg(test)]
mod tests {
    use rzks_primitives::Digest;

    use super::*;

    fn pos(bits: &str) -> Position {
        let mut p = Position::root();
        for c in bits.chars() {
            p = p.child(c == '1');
        }
        p
    }

    fn leaf(byte: u8, epoch: u64) -> NodeRecord {
        NodeRecord::leaf(
            Digest::new([byte; 32]),
            Digest::new([byte; 32]),
            Seqno::new(epoch),
        )
    }

    #[test]
    fn get_returns_what_was_put() {
        let mut store = MemoryStore::new();
        let ctx = Context::new();
        let record = leaf(7, 1);

        store.put(&ctx, Seqno::new(1), &pos("01"), &record).unwrap();
        assert_eq!(store.get(&ctx, Seqno::new(1), &pos("01")).unwrap(), record);

        assert!(matches!(
            store.get(&ctx, Seqno::new(2), &pos("01")),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn duplicate_puts_are_rejected() {
        let mut store = MemoryStore::new();
        let ctx = Context::new();
        let record = leaf(7, 1);

        store.put(&ctx, Seqno::new(1), &pos("0"), &record).unwrap();
        assert!(matches!(
            store.put(&ctx, Seqno::new(1), &pos("0"), &record),
            Err(StorageError::DuplicatePut { .. })
        ));

        // a later epoch is a fresh key
        store.put(&ctx, Seqno::new(2), &pos("0"), &record).unwrap();
    }

    #[test]
    fn range_latest_selects_newest_at_or_below_upper() {
        let mut store = MemoryStore::new();
        let ctx = Context::new();

        store.put(&ctx, Seqno::new(1), &pos("0"), &leaf(1, 1)).unwrap();
        store.put(&ctx, Seqno::new(3), &pos("0"), &leaf(3, 3)).unwrap();
        store.put(&ctx, Seqno::new(2), &pos("01"), &leaf(2, 2)).unwrap();
        store.put(&ctx, Seqno::new(4), &pos("1"), &leaf(4, 4)).unwrap();

        let items: Vec<_> = store
            .range_latest(&ctx, &Position::root(), Seqno::new(2))
            .unwrap()
            .map(Result::unwrap)
            .collect();

        assert_eq!(
            items,
            vec![
                (pos("0"), Seqno::new(1), leaf(1, 1)),
                (pos("01"), Seqno::new(2), leaf(2, 2)),
            ]
        );
    }

    #[test]
    fn range_latest_respects_the_prefix() {
        let mut store = MemoryStore::new();
        let ctx = Context::new();

        store.put(&ctx, Seqno::new(1), &pos("0"), &leaf(1, 1)).unwrap();
        store.put(&ctx, Seqno::new(1), &pos("00"), &leaf(2, 1)).unwrap();
        store.put(&ctx, Seqno::new(1), &pos("1"), &leaf(3, 1)).unwrap();

        let items: Vec<_> = store
            .range_latest(&ctx, &pos("0"), Seqno::new(9))
            .unwrap()
            .map(Result::unwrap)
            .collect();

        let positions: Vec<_> = items.iter().map(|(p, _, _)| p.clone()).collect();
        assert_eq!(positions, vec![pos("0"), pos("00")]);
    }

    #[test]
    fn latest_epoch_tracks_the_high_water_mark() {
        let mut store = MemoryStore::new();
        let ctx = Context::new();

        assert_eq!(store.latest_epoch(&ctx).unwrap(), Seqno::NONE);

        store.put(&ctx, Seqno::new(5), &pos("0"), &leaf(1, 5)).unwrap();
        store.put(&ctx, Seqno::new(3), &pos("1"), &leaf(2, 3)).unwrap();

        assert_eq!(store.latest_epoch(&ctx).unwrap(), Seqno::new(5));
    }

    #[test]
    fn cancelled_context_aborts_every_call() {
        let mut store = MemoryStore::new();
        let ctx = Context::new();
        ctx.cancel();

        assert!(matches!(
            store.get(&ctx, Seqno::new(1), &Position::root()),
            Err(StorageError::Cancelled)
        ));
        assert!(matches!(
            store.put(&ctx, Seqno::new(1), &Position::root(), &NodeRecord::Empty),
            Err(StorageError::Cancelled)
        ));
        assert!(store.latest_epoch(&ctx).is_err());
    }
}
