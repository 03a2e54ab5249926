use std::sync::OnceLock;

use rzks_primitives::{hash, Digest, Seqno};

/// The digest of the canonical empty subtree rooted at `depth`.
///
/// This function can be defined recursively:
///  - `empty_subtree_digest(256) = H(tag_empty)`
///  - `empty_subtree_digest(d) = H(tag_internal ∥ e ∥ e ∥ 0 ∥ 0)` where
///    `e = empty_subtree_digest(d + 1)`
///
/// All 257 values are computed once and cached, so calls are essentially
/// free after the initial setup.
///
/// # Panics
///
/// Panics if `depth` exceeds the maximum tree depth of 256.
#[inline]
#[must_use]
pub fn empty_subtree_digest(depth: usize) -> Digest {
    let cache = get_cache();
    assert!(depth < cache.len(), "depth {depth} exceeds the tree height");
    cache[depth]
}

fn get_cache() -> &'static [Digest] {
    static CACHE: OnceLock<Vec<Digest>> = OnceLock::new();

    CACHE.get_or_init(|| {
        let mut digests = vec![hash::empty_slot_digest()];

        for _ in 0..Digest::BITS {
            let child = *digests.last().unwrap();
            digests.push(hash::internal_digest(
                &child,
                Seqno::NONE,
                &child,
                Seqno::NONE,
            ));
        }

        digests.reverse();
        digests
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deepest_slot_is_the_tagged_empty_hash() {
        assert_eq!(empty_subtree_digest(256), hash::empty_slot_digest());
    }

    #[test]
    fn each_level_folds_its_children() {
        for depth in 0..256 {
            let child = empty_subtree_digest(depth + 1);
            let expected = hash::internal_digest(&child, Seqno::NONE, &child, Seqno::NONE);
            assert_eq!(empty_subtree_digest(depth), expected);
        }
    }

    #[test]
    #[should_panic(expected = "exceeds the tree height")]
    fn depth_beyond_the_leaves_panics() {
        let _ = empty_subtree_digest(257);
    }
}
