//! Extension-proof assembly: a merged scan over two epochs' worth of
//! latest records.

use std::collections::BTreeMap;

use rzks_primitives::{Position, Seqno};

use crate::context::Context;
use crate::error::{Error, ProofError};
use crate::proof::{ExtensionNode, ExtensionProof};
use crate::store::{NodeRecord, NodeStore};

use super::Tree;

impl<S: NodeStore> Tree<S> {
    /// Produce a proof that the commitment at `to` extends the commitment
    /// at `from`.
    ///
    /// Requires `from < to <= seqno()`. The range may span key rotations: a
    /// rotation is just a large batch of changes to the scan, with the
    /// positions it vacated surfacing as empty tombstone records.
    pub fn extension_proof(
        &self,
        ctx: &Context,
        from: Seqno,
        to: Seqno,
    ) -> Result<ExtensionProof, Error> {
        if from >= to || to > self.seqno {
            return Err(ProofError::EpochMismatch.into());
        }

        let old_states: BTreeMap<Position, (Seqno, NodeRecord)> = self
            .store
            .range_latest(ctx, &Position::root(), from)?
            .map(|item| item.map(|(position, epoch, record)| (position, (epoch, record))))
            .collect::<Result<_, _>>()?;

        let mut nodes = Vec::new();
        for item in self.store.range_latest(ctx, &Position::root(), to)? {
            let (position, epoch, record) = item?;
            if epoch <= from {
                continue;
            }
            let old = old_states.get(&position).cloned();
            nodes.push(ExtensionNode {
                position,
                new_epoch: epoch,
                new_record: record,
                old,
            });
        }

        tracing::debug!(
            from = from.as_u64(),
            to = to.as_u64(),
            changed = nodes.len(),
            "assembled extension proof"
        );
        Ok(ExtensionProof { from, to, nodes })
    }
}
