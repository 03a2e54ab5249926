use std::path::Path;

use borsh::BorshDeserialize;
use rocksdb::{Direction, IteratorMode, DB};
use rzks_primitives::{Position, Seqno};

use crate::context::Context;
use crate::error::StorageError;

use super::{NodeRecord, NodeStore, RangeIter};

// each path bit becomes one byte so that rocksdb's bytewise key order is the
// lexicographic bit-string order; the terminator sorts a position before
// every position underneath it
const BIT_ZERO: u8 = 0x01;
const BIT_ONE: u8 = 0x02;
const TERMINATOR: u8 = 0x00;
const META_LATEST: [u8; 1] = [0xFF];

/// A node store persisted to a rocksdb instance.
///
/// Same contract as [`MemoryStore`], different durability. The key encoding
/// preserves the position-lexicographic scan order the trait requires.
///
/// [`MemoryStore`]: super::MemoryStore
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Open (or create) a store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = DB::open_default(path)?;
        Ok(Self { db })
    }

    fn encode_key(position: &Position, epoch: Seqno) -> Vec<u8> {
        let mut key = Self::encode_prefix(position);
        key.push(TERMINATOR);
        key.extend_from_slice(&epoch.to_be_bytes());
        key
    }

    fn encode_prefix(position: &Position) -> Vec<u8> {
        (0..position.depth())
            .map(|index| match position.bit(index) {
                false => BIT_ZERO,
                true => BIT_ONE,
            })
            .collect()
    }

    fn decode_key(key: &[u8]) -> Result<(Position, Seqno), StorageError> {
        let corrupt = || StorageError::Corrupt("malformed record key".into());

        let terminator = key
            .iter()
            .position(|byte| *byte == TERMINATOR)
            .ok_or_else(corrupt)?;

        let mut position = Position::root();
        for byte in &key[..terminator] {
            match *byte {
                BIT_ZERO => position = position.child(false),
                BIT_ONE => position = position.child(true),
                _ => return Err(corrupt()),
            }
        }

        let epoch: [u8; 8] = key[terminator + 1..].try_into().map_err(|_| corrupt())?;
        Ok((position, Seqno::new(u64::from_be_bytes(epoch))))
    }

    fn decode_record(value: &[u8]) -> Result<NodeRecord, StorageError> {
        NodeRecord::try_from_slice(value)
            .map_err(|err| StorageError::Corrupt(format!("undecodable node record: {err}")))
    }
}

impl NodeStore for RocksStore {
    fn get(
        &self,
        ctx: &Context,
        epoch: Seqno,
        position: &Position,
    ) -> Result<NodeRecord, StorageError> {
        ctx.check()?;
        let key = Self::encode_key(position, epoch);
        match self.db.get_pinned(&key)? {
            Some(value) => Self::decode_record(&value),
            None => Err(StorageError::NotFound {
                epoch,
                position: position.clone(),
            }),
        }
    }

    fn put(
        &mut self,
        ctx: &Context,
        epoch: Seqno,
        position: &Position,
        record: &NodeRecord,
    ) -> Result<(), StorageError> {
        ctx.check()?;
        let key = Self::encode_key(position, epoch);
        if self.db.get_pinned(&key)?.is_some() {
            return Err(StorageError::DuplicatePut {
                epoch,
                position: position.clone(),
            });
        }

        let bytes = borsh::to_vec(record)
            .map_err(|err| StorageError::Corrupt(format!("unencodable node record: {err}")))?;
        self.db.put(&key, bytes)?;

        if epoch > self.latest_epoch(ctx)? {
            self.db.put(META_LATEST, epoch.to_be_bytes())?;
        }
        Ok(())
    }

    fn range_latest<'a>(
        &'a self,
        ctx: &Context,
        prefix: &Position,
        upper: Seqno,
    ) -> Result<RangeIter<'a>, StorageError> {
        ctx.check()?;
        let scan_prefix = Self::encode_prefix(prefix);

        let mut selected: Vec<(Position, Seqno, NodeRecord)> = Vec::new();
        let mut current: Option<(Position, Seqno, NodeRecord)> = None;
        let mode = IteratorMode::From(&scan_prefix, Direction::Forward);

        for entry in self.db.iterator(mode) {
            let (key, value) = entry?;
            if key.as_ref() == META_LATEST || !key.starts_with(&scan_prefix) {
                break;
            }

            let (position, epoch) = Self::decode_key(&key)?;
            if epoch > upper {
                continue;
            }
            let record = Self::decode_record(&value)?;

            // keys ascend by (position, epoch), so the newest survivor wins
            if !matches!(&current, Some((held, _, _)) if *held == position) {
                selected.extend(current.take());
            }
            current = Some((position, epoch, record));
        }
        selected.extend(current);

        Ok(Box::new(selected.into_iter().map(Ok)))
    }

    fn latest_epoch(&self, ctx: &Context) -> Result<Seqno, StorageError> {
        ctx.check()?;
        match self.db.get_pinned(META_LATEST)? {
            None => Ok(Seqno::NONE),
            Some(value) => {
                let bytes: [u8; 8] = value
                    .as_ref()
                    .try_into()
                    .map_err(|_| StorageError::Corrupt("malformed latest-epoch marker".into()))?;
                Ok(Seqno::new(u64::from_be_bytes(bytes)))
            }
        }
    }
}
