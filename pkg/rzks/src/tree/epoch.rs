//! The write transactions: `update`, `rotate`, and their shared commit step.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::OsRng;
use rand::RngCore;
use rzks_primitives::{hash, Position, Seqno};

use crate::context::Context;
use crate::empty::empty_subtree_digest;
use crate::error::{Error, StorageError};
use crate::proof::RotationProof;
use crate::store::{ChildRef, NodeRecord, NodeStore};
use crate::vrf::VrfSecret;
use crate::TransparencyDigest;

use super::build::{build_fresh, build_node, Existing, Staging};
use super::{BindingVersion, BuildItem, Tree};

impl<S: NodeStore> Tree<S> {
    /// Insert (or re-bind) a batch of (label, value) pairs, publishing a new
    /// commitment at the next seqno.
    ///
    /// Duplicate labels inside one batch are de-duplicated last-wins before
    /// anything is derived from them. Each accepted pair draws a fresh
    /// blinding nonce, so re-binding the same value still changes the leaf.
    ///
    /// An empty batch still publishes: the root record is re-issued under
    /// the new epoch with its digest unchanged.
    pub fn update<I, K, V>(
        &mut self,
        ctx: &Context,
        batch: I,
    ) -> Result<(TransparencyDigest, Seqno), Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        let epoch = self.seqno.next();

        // last-wins de-duplication by label
        let mut deduped: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        for (label, value) in batch {
            deduped.insert(label.into(), value.into());
        }

        tracing::debug!(
            epoch = epoch.as_u64(),
            entries = deduped.len(),
            "starting update"
        );

        let mut items = Vec::with_capacity(deduped.len());
        let mut staged_bindings = Vec::with_capacity(deduped.len());
        for (label, value) in deduped {
            let (image, _) = self.secret.evaluate(&label);

            let mut nonce = [0u8; hash::NONCE_SIZE];
            OsRng.fill_bytes(&mut nonce);
            let commit = hash::value_commitment(&value, &nonce);

            items.push(BuildItem {
                image,
                commit,
                insert_epoch: epoch,
            });
            staged_bindings.push((
                label,
                BindingVersion {
                    value,
                    nonce,
                    commit,
                    added_at: epoch,
                },
            ));
        }
        items.sort_by(|a, b| a.image.cmp(&b.image));
        check_distinct_images(&items)?;

        let mut out = Staging::new(self.cfg.step);
        let new_root = if items.is_empty() {
            self.reissue_root(ctx, epoch, &mut out)?
        } else {
            let existing = self.existing_root();
            build_node(
                &self.store,
                ctx,
                &Position::root(),
                &existing,
                &items,
                epoch,
                &mut out,
            )?
            .digest
        };

        self.commit_epoch(ctx, out.into_writes(), new_root, epoch)?;
        for (label, version) in staged_bindings {
            self.bindings.entry(label).or_default().push(version);
        }

        tracing::debug!(root = %self.root, seqno = self.seqno.as_u64(), "published epoch");
        Ok((self.root, self.seqno))
    }

    /// Replace the VRF secret and rebuild the directory under fresh labels,
    /// publishing a new commitment at the next seqno.
    ///
    /// Every stored binding survives with its value, nonce, commitment and
    /// insert seqno intact; only the tree locations change. Positions the
    /// rebuild vacates receive empty tombstone records, so range scans (and
    /// the extension proofs built from them) see the relocation as an
    /// ordinary set of changes. The published [`RotationProof`] transcript
    /// binds the pre-rotation root, the successor public key and the
    /// rebuilt root so clients can also roll their verifier key forward.
    pub fn rotate(&mut self, ctx: &Context) -> Result<(TransparencyDigest, Seqno), Error> {
        let epoch = self.seqno.next();
        tracing::debug!(
            epoch = epoch.as_u64(),
            bindings = self.bindings.len(),
            "starting rotation"
        );

        let next_secret = VrfSecret::generate();
        let next_public = next_secret.public_key();

        let mut items: Vec<BuildItem> = self
            .bindings
            .iter()
            .map(|(label, versions)| {
                let current = versions
                    .last()
                    .expect("every bound label has at least one version");
                let (image, _) = next_secret.evaluate(label);
                BuildItem {
                    image,
                    commit: current.commit,
                    insert_epoch: current.added_at,
                }
            })
            .collect();
        items.sort_by(|a, b| a.image.cmp(&b.image));
        check_distinct_images(&items)?;

        let mut out = Staging::new(self.cfg.step);
        let new_root = if items.is_empty() {
            out.push(Position::root(), NodeRecord::Empty);
            empty_subtree_digest(0)
        } else {
            build_fresh(&Position::root(), &items, epoch, &mut out)?.digest
        };

        // tombstone every materialised position the rebuild vacated, so the
        // old locations read as empty from this epoch on
        let mut writes = out.into_writes();
        let rebuilt: BTreeSet<Position> = writes
            .iter()
            .map(|(position, _)| position.clone())
            .collect();
        for item in self.store.range_latest(ctx, &Position::root(), self.seqno)? {
            let (position, _, record) = item?;
            if matches!(record, NodeRecord::Empty) || rebuilt.contains(&position) {
                continue;
            }
            writes.push((position, NodeRecord::Empty));
        }

        let prev_root = self.root;
        self.commit_epoch(ctx, writes, new_root, epoch)?;

        let transcript = hash::rotation_transcript(&prev_root, next_public.as_bytes(), &self.root);
        self.rotations.push(RotationProof {
            seqno: epoch,
            prev_root,
            next_public_key: next_public,
            next_root: self.root,
            transcript,
        });
        self.key_history.push((epoch, next_public));
        self.secret = next_secret;

        tracing::debug!(root = %self.root, seqno = self.seqno.as_u64(), "published rotation");
        Ok((self.root, self.seqno))
    }

    /// Insert a batch and immediately rotate the VRF key: the
    /// post-compromise-security update. Consumes two seqnos and returns the
    /// post-rotation commitment.
    pub fn pcs_update<I, K, V>(
        &mut self,
        ctx: &Context,
        batch: I,
    ) -> Result<(TransparencyDigest, Seqno), Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        self.update(ctx, batch)?;
        self.rotate(ctx)
    }

    /// The existing root as seen by the rebuild.
    pub(crate) fn existing_root(&self) -> Existing {
        if self.seqno.is_none() {
            Existing::Empty
        } else {
            Existing::Stored(ChildRef {
                digest: self.root,
                epoch: self.seqno,
            })
        }
    }

    /// Re-issue the current root record under `epoch` without changing its
    /// digest. Keeps the "every published epoch has a root record"
    /// invariant alive across content-free transactions.
    fn reissue_root(
        &self,
        ctx: &Context,
        epoch: Seqno,
        out: &mut Staging,
    ) -> Result<TransparencyDigest, Error> {
        let record = if self.seqno.is_none() {
            NodeRecord::Empty
        } else {
            self.store.get(ctx, self.seqno, &Position::root())?
        };
        let digest = record.digest(0);
        out.push(Position::root(), record);
        Ok(digest)
    }

    /// Flush the staged records and publish the new commitment. This is the
    /// single commit step: before it completes, nothing observable changes;
    /// a failure mid-flush leaves the handle on its previous committed
    /// state.
    fn commit_epoch(
        &mut self,
        ctx: &Context,
        writes: Vec<(Position, NodeRecord)>,
        new_root: TransparencyDigest,
        epoch: Seqno,
    ) -> Result<(), Error> {
        tracing::trace!(
            epoch = epoch.as_u64(),
            records = writes.len(),
            "flushing epoch records"
        );

        for (position, record) in &writes {
            self.store
                .put(ctx, epoch, position, record)
                .map_err(|err| match err {
                    StorageError::DuplicatePut { epoch, position } => Error::Invariant(format!(
                        "duplicate record write at epoch {epoch} position {position}"
                    )),
                    other => Error::Storage(other),
                })?;
        }

        self.root = new_root;
        self.seqno = epoch;
        Ok(())
    }
}

fn check_distinct_images(items: &[BuildItem]) -> Result<(), Error> {
    for pair in items.windows(2) {
        if pair[0].image == pair[1].image {
            return Err(Error::Invariant(format!(
                "VRF image collision at {}",
                pair[0].image
            )));
        }
    }
    Ok(())
}
