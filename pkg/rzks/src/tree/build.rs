//! The batched rebuild: a merged recursion over the existing tree and a
//! sorted batch of (VRF image, value commitment) inserts.

use rzks_primitives::{Digest, Position, Seqno};

use crate::context::Context;
use crate::error::Error;
use crate::store::{ChildRef, NodeRecord, NodeStore};

/// One insert handed to the rebuild, sorted by image.
#[derive(Debug, Clone)]
pub(crate) struct BuildItem {
    pub image: Digest,
    pub commit: Digest,
    pub insert_epoch: Seqno,
}

/// The staging buffer for an epoch's node writes.
///
/// Nothing reaches the store until the whole epoch has been assembled; the
/// configured step controls the depth granularity at which finished subtree
/// records move from the recursion's scratch space into the staged list.
/// Neither affects the resulting digests.
pub(crate) struct Staging {
    step: usize,
    scratch: Vec<(Position, NodeRecord)>,
    staged: Vec<(Position, NodeRecord)>,
}

impl Staging {
    pub fn new(step: usize) -> Self {
        Self {
            step,
            scratch: Vec::new(),
            staged: Vec::new(),
        }
    }

    pub fn push(&mut self, position: Position, record: NodeRecord) {
        let depth = position.depth();
        self.scratch.push((position, record));
        if depth % self.step == 0 {
            self.staged.append(&mut self.scratch);
        }
    }

    pub fn into_writes(mut self) -> Vec<(Position, NodeRecord)> {
        self.staged.append(&mut self.scratch);
        self.staged
    }
}

/// What the parent knows about the subtree being rebuilt.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Existing {
    Empty,
    Stored(ChildRef),
}

impl Existing {
    pub fn from_child(child: &ChildRef) -> Self {
        if child.is_empty() {
            Self::Empty
        } else {
            Self::Stored(*child)
        }
    }
}

/// Rebuild the subtree at `position`, merging `items` into whatever the
/// store holds there, and return the reference the parent should record.
///
/// Only subtrees with live inserts are visited; a side without inserts keeps
/// its stored child reference untouched.
pub(crate) fn build_node<S: NodeStore>(
    store: &S,
    ctx: &Context,
    position: &Position,
    existing: &Existing,
    items: &[BuildItem],
    epoch: Seqno,
    out: &mut Staging,
) -> Result<ChildRef, Error> {
    if items.is_empty() {
        return Ok(match existing {
            Existing::Empty => ChildRef::empty(position.depth()),
            Existing::Stored(child) => *child,
        });
    }

    let stored = match existing {
        Existing::Empty => None,
        Existing::Stored(child) => Some(store.get(ctx, child.epoch, position)?),
    };

    match stored {
        None | Some(NodeRecord::Empty) => build_fresh(position, items, epoch, out),

        Some(NodeRecord::Leaf(leaf)) => {
            if let [item] = items {
                if item.image == leaf.vrf_image {
                    // same image: re-bind in place
                    return Ok(write_leaf(position, item, epoch, out));
                }
            }

            // the occupying leaf joins the batch and everything is pushed
            // down to where the images diverge; a moved leaf keeps its
            // original insert epoch, so its digest is unchanged
            let mut merged = items.to_vec();
            if !items.iter().any(|item| item.image == leaf.vrf_image) {
                merged.push(BuildItem {
                    image: leaf.vrf_image,
                    commit: leaf.value_commit,
                    insert_epoch: leaf.insert_epoch,
                });
                merged.sort_by(|a, b| a.image.cmp(&b.image));
            }
            build_fresh(position, &merged, epoch, out)
        }

        Some(NodeRecord::Internal(internal)) => {
            let split = items.partition_point(|item| !item.image.bit(position.depth()));
            let (left_items, right_items) = items.split_at(split);

            let left = build_node(
                store,
                ctx,
                &position.child(false),
                &Existing::from_child(&internal.left),
                left_items,
                epoch,
                out,
            )?;
            let right = build_node(
                store,
                ctx,
                &position.child(true),
                &Existing::from_child(&internal.right),
                right_items,
                epoch,
                out,
            )?;

            let record = NodeRecord::internal(left, right);
            let digest = record.digest(position.depth());
            out.push(position.clone(), record);
            Ok(ChildRef { digest, epoch })
        }
    }
}

/// Rebuild a subtree known to hold nothing below `position`.
///
/// A single item lands as a leaf; several items split by the next path bit
/// until each sits alone. The root is always internal (or empty), so even a
/// lone item at the root descends one level.
pub(crate) fn build_fresh(
    position: &Position,
    items: &[BuildItem],
    epoch: Seqno,
    out: &mut Staging,
) -> Result<ChildRef, Error> {
    if items.is_empty() {
        return Ok(ChildRef::empty(position.depth()));
    }

    if let [item] = items {
        if !position.is_root() {
            return Ok(write_leaf(position, item, epoch, out));
        }
    }

    if position.depth() >= Digest::BITS {
        return Err(Error::Invariant(format!(
            "VRF images collide along the full path to {position}"
        )));
    }

    let split = items.partition_point(|item| !item.image.bit(position.depth()));
    let (left_items, right_items) = items.split_at(split);

    let left = build_fresh(&position.child(false), left_items, epoch, out)?;
    let right = build_fresh(&position.child(true), right_items, epoch, out)?;

    let record = NodeRecord::internal(left, right);
    let digest = record.digest(position.depth());
    out.push(position.clone(), record);
    Ok(ChildRef { digest, epoch })
}

fn write_leaf(
    position: &Position,
    item: &BuildItem,
    epoch: Seqno,
    out: &mut Staging,
) -> ChildRef {
    let record = NodeRecord::leaf(item.image, item.commit, item.insert_epoch);
    let digest = record.digest(position.depth());
    out.push(position.clone(), record);
    ChildRef { digest, epoch }
}
