//! Stateless verification of membership, absence, extension and rotation
//! claims against published commitments.

use std::collections::BTreeMap;

use rzks_primitives::{hash, Digest, Position, Seqno};

use crate::config::Config;
use crate::empty::empty_subtree_digest;
use crate::error::ProofError;
use crate::proof::{CopathEntry, ExtensionNode, ExtensionProof, MembershipProof, MembershipTerminal, RotationProof};
use crate::store::{ChildRef, NodeRecord};
use crate::vrf::VrfPublicKey;
use crate::TransparencyDigest;

/// The tri-valued answer of [`Verifier::verify`].
///
/// `Included` and `Excluded` are positive results ("proven present" /
/// "proven absent"); `Invalid` means the proof established nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The label is proven to map to the claimed value at the claimed epoch.
    Included,
    /// The label is proven absent.
    Excluded,
    /// The proof did not verify.
    Invalid,
}

/// A stateless verifier for one VRF key era.
///
/// Holds only public material: the directory configuration and the era's
/// VRF public key. After a rotation, clients roll forward by checking the
/// [`RotationProof`] and constructing a fresh verifier from its
/// `next_public_key`. All digest comparisons are constant-time.
#[derive(Debug, Clone, Copy)]
pub struct Verifier {
    cfg: Config,
    public_key: VrfPublicKey,
}

impl Verifier {
    /// Build a verifier from the published parameters and era key.
    #[must_use]
    pub fn new(cfg: Config, public_key: VrfPublicKey) -> Self {
        Self { cfg, public_key }
    }

    /// The era key this verifier checks VRF evaluations against.
    #[inline]
    #[must_use]
    pub fn public_key(&self) -> &VrfPublicKey {
        &self.public_key
    }

    /// Check a query answer against a commitment: membership when `epoch`
    /// is non-zero (the seqno the binding was reportedly inserted at),
    /// absence when it is zero.
    ///
    /// Never errors: failures classify as [`VerifyOutcome::Invalid`], so
    /// callers can distinguish "proven absent" from "unable to prove
    /// anything".
    #[must_use]
    pub fn verify(
        &self,
        commitment: &TransparencyDigest,
        label: &[u8],
        value: Option<&[u8]>,
        epoch: Seqno,
        proof: &MembershipProof,
    ) -> VerifyOutcome {
        if epoch.is_none() {
            match self.verify_exclusion(commitment, label, proof) {
                Ok(()) => VerifyOutcome::Excluded,
                Err(_) => VerifyOutcome::Invalid,
            }
        } else {
            let Some(value) = value else {
                return VerifyOutcome::Invalid;
            };
            match self.verify_inclusion(commitment, label, value, epoch, proof) {
                Ok(()) => VerifyOutcome::Included,
                Err(_) => VerifyOutcome::Invalid,
            }
        }
    }

    /// Check that `label` maps to `value`, inserted at `epoch`, under
    /// `commitment`.
    pub fn verify_inclusion(
        &self,
        commitment: &TransparencyDigest,
        label: &[u8],
        value: &[u8],
        epoch: Seqno,
        proof: &MembershipProof,
    ) -> Result<(), ProofError> {
        let MembershipTerminal::Leaf {
            nonce,
            insert_epoch,
            record_epoch,
        } = &proof.terminal
        else {
            return Err(ProofError::BadStructure(
                "membership claims terminate at the label's own leaf",
            ));
        };

        self.check_copath_shape(proof, false)?;
        self.public_key
            .verify(label, &proof.vrf_image, &proof.vrf_proof)?;

        if epoch != *insert_epoch || *record_epoch < *insert_epoch {
            return Err(ProofError::EpochMismatch);
        }

        let value_commit = hash::value_commitment(value, nonce);
        let leaf = hash::leaf_digest(&proof.vrf_image, &value_commit, *insert_epoch);
        let folded = fold_copath(&proof.vrf_image, &proof.copath, leaf, *record_epoch);

        if !folded.ct_eq(commitment) {
            return Err(ProofError::WrongCommitment);
        }
        Ok(())
    }

    /// Check that `label` is absent under `commitment`.
    pub fn verify_exclusion(
        &self,
        commitment: &TransparencyDigest,
        label: &[u8],
        proof: &MembershipProof,
    ) -> Result<(), ProofError> {
        self.check_copath_shape(proof, true)?;
        self.public_key
            .verify(label, &proof.vrf_image, &proof.vrf_proof)?;

        let depth = proof.copath.len();
        let (terminal_digest, terminal_epoch) = match &proof.terminal {
            MembershipTerminal::Empty => (empty_subtree_digest(depth), Seqno::NONE),
            MembershipTerminal::OtherLeaf {
                vrf_image,
                value_commit,
                insert_epoch,
                record_epoch,
            } => {
                if vrf_image.ct_eq(&proof.vrf_image) {
                    return Err(ProofError::BadStructure(
                        "occupying leaf carries the queried image",
                    ));
                }
                // the occupying leaf must actually live on the label's path
                for index in 0..depth {
                    if vrf_image.bit(index) != proof.vrf_image.bit(index) {
                        return Err(ProofError::BadStructure(
                            "occupying leaf is off the label's path",
                        ));
                    }
                }
                (
                    hash::leaf_digest(vrf_image, value_commit, *insert_epoch),
                    *record_epoch,
                )
            }
            MembershipTerminal::Leaf { .. } => {
                return Err(ProofError::BadStructure(
                    "absence claims cannot terminate at the label's own leaf",
                ));
            }
        };

        let folded = fold_copath(&proof.vrf_image, &proof.copath, terminal_digest, terminal_epoch);
        if !folded.ct_eq(commitment) {
            return Err(ProofError::WrongCommitment);
        }
        Ok(())
    }

    /// Check that the commitment at `to` is a strict extension of the
    /// commitment at `from`.
    pub fn verify_extension(
        &self,
        proof: &ExtensionProof,
        from: Seqno,
        com_from: &TransparencyDigest,
        to: Seqno,
        com_to: &TransparencyDigest,
    ) -> Result<(), ProofError> {
        if from >= to || proof.from != from || proof.to != to {
            return Err(ProofError::EpochMismatch);
        }

        let nodes = &proof.nodes;
        if nodes.is_empty() {
            return Err(ProofError::BadStructure("empty change set"));
        }
        if !nodes[0].position.is_root() {
            return Err(ProofError::BadStructure("change set must include the root"));
        }
        for pair in nodes.windows(2) {
            if pair[0].position >= pair[1].position {
                return Err(ProofError::BadStructure("positions must strictly ascend"));
            }
        }

        let index: BTreeMap<&Position, &ExtensionNode> =
            nodes.iter().map(|node| (&node.position, node)).collect();

        for node in nodes {
            self.check_extension_node(node, from, to, &index)?;
        }

        let root = &nodes[0];
        if !root.new_record.digest(0).ct_eq(com_to) {
            return Err(ProofError::WrongCommitment);
        }
        let old_root = match &root.old {
            Some((_, record)) => record.digest(0),
            None => empty_subtree_digest(0),
        };
        if !old_root.ct_eq(com_from) {
            return Err(ProofError::WrongCommitment);
        }
        Ok(())
    }

    /// Check a rotation transcript against the commitments on either side
    /// of the key change.
    pub fn verify_rotation(
        &self,
        proof: &RotationProof,
        com_before: &TransparencyDigest,
        com_after: &TransparencyDigest,
    ) -> Result<(), ProofError> {
        if !proof.prev_root.ct_eq(com_before) || !proof.next_root.ct_eq(com_after) {
            return Err(ProofError::WrongCommitment);
        }

        let transcript = hash::rotation_transcript(
            &proof.prev_root,
            proof.next_public_key.as_bytes(),
            &proof.next_root,
        );
        if !transcript.ct_eq(&proof.transcript) {
            return Err(ProofError::DigestMismatch);
        }
        Ok(())
    }

    fn check_copath_shape(
        &self,
        proof: &MembershipProof,
        allow_empty: bool,
    ) -> Result<(), ProofError> {
        if proof.copath.len() > self.cfg.max_depth() {
            return Err(ProofError::BadStructure("copath deeper than the tree"));
        }
        if !allow_empty && proof.copath.is_empty() {
            return Err(ProofError::BadStructure("membership needs a copath"));
        }
        Ok(())
    }

    fn check_extension_node(
        &self,
        node: &ExtensionNode,
        from: Seqno,
        to: Seqno,
        index: &BTreeMap<&Position, &ExtensionNode>,
    ) -> Result<(), ProofError> {
        if node.position.depth() > self.cfg.max_depth() {
            return Err(ProofError::BadStructure("position deeper than the tree"));
        }
        if node.position.depth() == self.cfg.max_depth()
            && (matches!(node.new_record, NodeRecord::Internal(_))
                || matches!(node.old, Some((_, NodeRecord::Internal(_)))))
        {
            return Err(ProofError::BadStructure("internal record at leaf depth"));
        }
        if node.new_epoch <= from || node.new_epoch > to {
            return Err(ProofError::EpochMismatch);
        }
        if let Some((old_epoch, _)) = &node.old {
            if *old_epoch > from {
                return Err(ProofError::EpochMismatch);
            }
        }

        if let Some(parent) = node.position.parent() {
            let parent_node = index
                .get(&parent)
                .ok_or(ProofError::BadStructure("change set is not prefix-closed"))?;
            // an empty tombstone may sit below any parent (a rotation can
            // vacate a whole subtree under what is now a leaf); anything
            // else must hang off an internal node
            if !matches!(parent_node.new_record, NodeRecord::Internal(_))
                && !matches!(node.new_record, NodeRecord::Empty)
            {
                return Err(ProofError::BadStructure(
                    "changed node hangs off a non-internal parent",
                ));
            }
        }

        // new side: each child is either part of the change set or pinned
        // to its digest at `from`; a tombstoned child reads as canonical
        // empty
        if let NodeRecord::Internal(internal) = &node.new_record {
            for bit in [false, true] {
                let child_ref = internal.child(bit);
                let child_pos = node.position.child(bit);
                let child_depth = child_pos.depth();

                match index.get(&child_pos) {
                    Some(child) => {
                        let expected = match &child.new_record {
                            NodeRecord::Empty => ChildRef::empty(child_depth),
                            record => ChildRef {
                                digest: record.digest(child_depth),
                                epoch: child.new_epoch,
                            },
                        };
                        if !child_ref.digest.ct_eq(&expected.digest) {
                            return Err(ProofError::DigestMismatch);
                        }
                        if child_ref.epoch != expected.epoch {
                            return Err(ProofError::EpochMismatch);
                        }
                    }
                    None => {
                        let pinned = match &node.old {
                            Some((_, NodeRecord::Internal(old_internal))) => {
                                *old_internal.child(bit)
                            }
                            // a leaf or empty old state has nothing below it
                            _ => ChildRef::empty(child_depth),
                        };
                        if !child_ref.digest.ct_eq(&pinned.digest) {
                            return Err(ProofError::DigestMismatch);
                        }
                        if child_ref.epoch != pinned.epoch {
                            return Err(ProofError::EpochMismatch);
                        }
                    }
                }
            }
        }

        // old side: changed children must agree with their recorded old
        // state; unchanged children are already bound through the parent's
        // own digest
        if let Some((_, NodeRecord::Internal(old_internal))) = &node.old {
            for bit in [false, true] {
                let child_ref = old_internal.child(bit);
                let child_pos = node.position.child(bit);
                let child_depth = child_pos.depth();

                if let Some(child) = index.get(&child_pos) {
                    let expected = match &child.old {
                        Some((old_epoch, old_record)) => match old_record {
                            NodeRecord::Empty => ChildRef::empty(child_depth),
                            record => ChildRef {
                                digest: record.digest(child_depth),
                                epoch: *old_epoch,
                            },
                        },
                        None => ChildRef::empty(child_depth),
                    };
                    if !child_ref.digest.ct_eq(&expected.digest) {
                        return Err(ProofError::DigestMismatch);
                    }
                    if child_ref.epoch != expected.epoch {
                        return Err(ProofError::EpochMismatch);
                    }
                }
            }
        }

        Ok(())
    }
}

/// Fold a terminal digest up the copath to a root digest.
///
/// The epoch of each path node is the maximum of its children's epochs, so
/// the fold carries the running epoch upward alongside the digest.
fn fold_copath(
    image: &Digest,
    copath: &[CopathEntry],
    terminal_digest: Digest,
    terminal_epoch: Seqno,
) -> Digest {
    let mut digest = terminal_digest;
    let mut epoch = terminal_epoch;

    for (depth, entry) in copath.iter().enumerate().rev() {
        digest = match image.bit(depth) {
            // path child on the right, sibling on the left
            true => hash::internal_digest(&entry.sibling, entry.epoch, &digest, epoch),
            false => hash::internal_digest(&digest, epoch, &entry.sibling, entry.epoch),
        };
        epoch = epoch.max(entry.epoch);
    }
    digest
}

#[cfg(test)]
mod tests;
