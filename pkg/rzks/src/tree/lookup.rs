//! The read path: walking the tree at a named epoch and assembling a
//! membership (or absence) proof from the copath.

use rzks_primitives::{Position, Seqno};

use crate::context::Context;
use crate::error::{Error, StorageError, VrfError};
use crate::proof::{CopathEntry, MembershipProof, MembershipTerminal, QueryAnswer};
use crate::store::{NodeRecord, NodeStore};

use super::Tree;

impl<S: NodeStore> Tree<S> {
    /// Query `label` at `epoch`, returning a proof of membership or absence
    /// plus the stored value when present.
    ///
    /// The epoch must have been published (`epoch <= seqno()`) and must not
    /// predate the current VRF key era: labels of pre-rotation epochs can no
    /// longer be derived (that is the right-to-be-forgotten property), and
    /// asking for one fails with [`VrfError::KeyMismatch`]. Epoch 0 (the
    /// empty directory) is always queryable.
    pub fn query(&self, ctx: &Context, epoch: Seqno, label: &[u8]) -> Result<QueryAnswer, Error> {
        if epoch > self.seqno {
            return Err(StorageError::NotFound {
                epoch,
                position: Position::root(),
            }
            .into());
        }
        let era_start = self.era_start();
        if !epoch.is_none() && epoch < era_start {
            return Err(VrfError::KeyMismatch {
                queried: epoch,
                rotated_at: era_start,
            }
            .into());
        }

        let (vrf_image, vrf_proof) = self.secret.evaluate(label);

        let mut copath = Vec::new();
        let mut terminal = MembershipTerminal::Empty;
        let mut matched_leaf = None;

        if !epoch.is_none() {
            let mut position = Position::root();
            let mut record = self.store.get(ctx, epoch, &position)?;
            // the epoch the current record was written at; the root is
            // re-issued every epoch, so it starts at the queried epoch
            let mut record_epoch = epoch;

            loop {
                match record {
                    NodeRecord::Empty => break,
                    NodeRecord::Leaf(leaf) => {
                        if leaf.vrf_image == vrf_image {
                            terminal = MembershipTerminal::Leaf {
                                nonce: self.nonce_for(label, &leaf)?,
                                insert_epoch: leaf.insert_epoch,
                                record_epoch,
                            };
                            matched_leaf = Some(leaf);
                        } else {
                            terminal = MembershipTerminal::OtherLeaf {
                                vrf_image: leaf.vrf_image,
                                value_commit: leaf.value_commit,
                                insert_epoch: leaf.insert_epoch,
                                record_epoch,
                            };
                        }
                        break;
                    }
                    NodeRecord::Internal(internal) => {
                        let bit = vrf_image.bit(position.depth());
                        let ahead = internal.child(bit);
                        let sibling = internal.child(!bit);

                        copath.push(CopathEntry {
                            sibling: sibling.digest,
                            epoch: sibling.epoch,
                        });
                        position = position.child(bit);

                        if ahead.is_empty() {
                            break;
                        }
                        record_epoch = ahead.epoch;
                        record = self.store.get(ctx, ahead.epoch, &position)?;
                    }
                }
            }
        }

        let (value, added_at) = match matched_leaf {
            Some(leaf) => (Some(self.value_for(label, &leaf)?), leaf.insert_epoch),
            None => (None, Seqno::NONE),
        };

        Ok(QueryAnswer {
            proof: MembershipProof {
                vrf_image,
                vrf_proof,
                copath,
                terminal,
            },
            value,
            added_at,
        })
    }

    fn nonce_for(
        &self,
        label: &[u8],
        leaf: &crate::store::LeafRecord,
    ) -> Result<[u8; 32], Error> {
        Ok(self.version_for(label, leaf)?.nonce)
    }

    fn value_for(
        &self,
        label: &[u8],
        leaf: &crate::store::LeafRecord,
    ) -> Result<Vec<u8>, Error> {
        Ok(self.version_for(label, leaf)?.value.clone())
    }

    /// The ledger version whose commitment a walked leaf carries.
    fn version_for(
        &self,
        label: &[u8],
        leaf: &crate::store::LeafRecord,
    ) -> Result<&super::BindingVersion, Error> {
        self.bindings
            .get(label)
            .and_then(|versions| {
                versions
                    .iter()
                    .rev()
                    .find(|version| version.commit == leaf.value_commit)
            })
            .ok_or_else(|| {
                Error::Invariant(format!(
                    "no ledger version matches the stored commitment {}",
                    leaf.value_commit
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use crate::{batch, Config, MemoryStore};

    use super::*;

    fn fresh_tree() -> Tree<MemoryStore> {
        Tree::init(Config::generate_parameters(), MemoryStore::new()).unwrap()
    }

    #[test]
    fn query_on_the_empty_directory_is_an_absence_proof() {
        let tree = fresh_tree();
        let ctx = Context::new();

        let answer = tree.query(&ctx, Seqno::NONE, b"x").unwrap();
        assert_eq!(answer.value, None);
        assert_eq!(answer.added_at, Seqno::NONE);
        assert!(answer.proof.copath.is_empty());
        assert_eq!(answer.proof.terminal, MembershipTerminal::Empty);
    }

    #[test]
    fn present_and_absent_labels_are_distinguished() {
        let mut tree = fresh_tree();
        let ctx = Context::new();

        let (_, seqno) = tree.update(&ctx, batch! { "a" => "1" }).unwrap();

        let present = tree.query(&ctx, seqno, b"a").unwrap();
        assert_eq!(present.value.as_deref(), Some(b"1".as_slice()));
        assert_eq!(present.added_at, seqno);

        let absent = tree.query(&ctx, seqno, b"b").unwrap();
        assert_eq!(absent.value, None);
        assert_eq!(absent.added_at, Seqno::NONE);
    }

    #[test]
    fn historical_epochs_stay_queryable() {
        let mut tree = fresh_tree();
        let ctx = Context::new();

        let (_, seq_1) = tree.update(&ctx, batch! { "a" => "1" }).unwrap();
        let (_, seq_2) = tree.update(&ctx, batch! { "b" => "2" }).unwrap();

        // at epoch 1, "b" did not exist yet
        let answer = tree.query(&ctx, seq_1, b"b").unwrap();
        assert_eq!(answer.value, None);

        // at epoch 2, "a" still reports its original insert seqno
        let answer = tree.query(&ctx, seq_2, b"a").unwrap();
        assert_eq!(answer.added_at, seq_1);
    }

    #[test]
    fn unpublished_epochs_are_not_found() {
        let tree = fresh_tree();
        let ctx = Context::new();

        let err = tree.query(&ctx, Seqno::new(1), b"a").unwrap_err();
        assert!(matches!(
            err,
            Error::Storage(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn pre_rotation_epochs_are_forgotten() {
        let mut tree = fresh_tree();
        let ctx = Context::new();

        let (_, seq_1) = tree.update(&ctx, batch! { "a" => "1" }).unwrap();
        tree.rotate(&ctx).unwrap();

        let err = tree.query(&ctx, seq_1, b"a").unwrap_err();
        assert!(matches!(err, Error::Vrf(VrfError::KeyMismatch { .. })));

        // epoch 0 stays reachable
        tree.query(&ctx, Seqno::NONE, b"a").unwrap();
    }
}
