use std::collections::BTreeMap;

use borsh::BorshDeserialize;
use proptest::prelude::*;
use test_strategy::proptest;

use crate::{batch, Config, Context, MemoryStore, ProofError, Tree, VerifyOutcome};

use super::*;

fn fresh_tree() -> Tree<MemoryStore> {
    Tree::init(Config::generate_parameters(), MemoryStore::new()).unwrap()
}

#[test]
fn empty_tree_proves_any_label_absent() {
    let tree = fresh_tree();
    let ctx = Context::new();
    let com_0 = tree.root();

    let answer = tree.query(&ctx, Seqno::NONE, b"x").unwrap();
    let outcome = tree
        .verifier()
        .verify(&com_0, b"x", None, answer.added_at, &answer.proof);

    assert_eq!(outcome, VerifyOutcome::Excluded);
}

#[test]
fn single_insert_splits_membership_from_absence() {
    let mut tree = fresh_tree();
    let ctx = Context::new();

    let (com, seqno) = tree.update(&ctx, batch! { "a" => "1" }).unwrap();
    let verifier = tree.verifier();

    let a = tree.query(&ctx, seqno, b"a").unwrap();
    assert_eq!(
        verifier.verify(&com, b"a", a.value.as_deref(), a.added_at, &a.proof),
        VerifyOutcome::Included
    );

    let b = tree.query(&ctx, seqno, b"b").unwrap();
    assert_eq!(
        verifier.verify(&com, b"b", None, b.added_at, &b.proof),
        VerifyOutcome::Excluded
    );
}

#[test]
fn split_leaves_verify_and_sit_as_siblings() {
    let mut tree = fresh_tree();
    let ctx = Context::new();

    let (com, seqno) = tree
        .update(&ctx, batch! { "u1" => "v1", "u2" => "v2" })
        .unwrap();
    let verifier = tree.verifier();

    let u1 = tree.query(&ctx, seqno, b"u1").unwrap();
    let u2 = tree.query(&ctx, seqno, b"u2").unwrap();

    for (label, answer) in [(b"u1".as_slice(), &u1), (b"u2", &u2)] {
        assert_eq!(
            verifier.verify(&com, label, answer.value.as_deref(), answer.added_at, &answer.proof),
            VerifyOutcome::Included
        );
    }

    // the two leaves diverge at the same depth, so the copaths have equal
    // length and each one's deepest sibling is the other leaf
    assert_eq!(u1.proof.copath.len(), u2.proof.copath.len());

    let MembershipTerminal::Leaf {
        nonce,
        insert_epoch,
        ..
    } = &u2.proof.terminal
    else {
        panic!("u2 is present");
    };
    let u2_leaf = hash::leaf_digest(
        &u2.proof.vrf_image,
        &hash::value_commitment(b"v2", nonce),
        *insert_epoch,
    );
    assert_eq!(u1.proof.copath.last().unwrap().sibling, u2_leaf);
}

#[test]
fn earlier_inserts_verify_against_later_commitments() {
    let mut tree = fresh_tree();
    let ctx = Context::new();

    let (_, seq_1) = tree.update(&ctx, batch! { "a" => "1" }).unwrap();
    let (com_2, seq_2) = tree.update(&ctx, batch! { "b" => "2" }).unwrap();

    let answer = tree.query(&ctx, seq_2, b"a").unwrap();
    assert_eq!(answer.added_at, seq_1);

    let outcome = tree.verifier().verify(
        &com_2,
        b"a",
        answer.value.as_deref(),
        answer.added_at,
        &answer.proof,
    );
    assert_eq!(outcome, VerifyOutcome::Included);
}

#[test]
fn extension_links_two_commitments() {
    let mut tree = fresh_tree();
    let ctx = Context::new();

    let (com_1, seq_1) = tree.update(&ctx, batch! { "a" => "1" }).unwrap();
    let (com_2, seq_2) = tree.update(&ctx, batch! { "b" => "2" }).unwrap();

    let proof = tree.extension_proof(&ctx, seq_1, seq_2).unwrap();
    let verifier = tree.verifier();

    verifier
        .verify_extension(&proof, seq_1, &com_1, seq_2, &com_2)
        .unwrap();

    // swapping the new commitment for anything else fails
    let err = verifier
        .verify_extension(&proof, seq_1, &com_1, seq_2, &com_1)
        .unwrap_err();
    assert_eq!(err, ProofError::WrongCommitment);

    let bogus = Digest::new([0xAB; 32]);
    assert!(verifier
        .verify_extension(&proof, seq_1, &bogus, seq_2, &com_2)
        .is_err());

    // and so does lying about the endpoints
    assert_eq!(
        verifier
            .verify_extension(&proof, seq_1, &com_1, Seqno::new(9), &com_2)
            .unwrap_err(),
        ProofError::EpochMismatch
    );
}

#[test]
fn extension_from_the_empty_directory() {
    let mut tree = fresh_tree();
    let ctx = Context::new();
    let com_0 = tree.root();

    let (com_1, seq_1) = tree.update(&ctx, batch! { "a" => "1" }).unwrap();

    let proof = tree.extension_proof(&ctx, Seqno::NONE, seq_1).unwrap();
    tree.verifier()
        .verify_extension(&proof, Seqno::NONE, &com_0, seq_1, &com_1)
        .unwrap();
}

#[test]
fn extension_spans_a_rotation() {
    let mut tree = fresh_tree();
    let ctx = Context::new();

    let (com_1, seq_1) = tree
        .update(&ctx, batch! { "a" => "1", "b" => "2" })
        .unwrap();
    let (com_2, seq_2) = tree.rotate(&ctx).unwrap();
    let (com_3, seq_3) = tree.update(&ctx, batch! { "c" => "3" }).unwrap();
    let verifier = tree.verifier();

    // across the rotation epoch itself
    let proof = tree.extension_proof(&ctx, seq_1, seq_2).unwrap();
    verifier
        .verify_extension(&proof, seq_1, &com_1, seq_2, &com_2)
        .unwrap();

    // and across the rotation plus a later update
    let proof = tree.extension_proof(&ctx, seq_1, seq_3).unwrap();
    verifier
        .verify_extension(&proof, seq_1, &com_1, seq_3, &com_3)
        .unwrap();

    // lying about either endpoint still fails
    assert_eq!(
        verifier
            .verify_extension(&proof, seq_1, &com_1, seq_3, &com_1)
            .unwrap_err(),
        ProofError::WrongCommitment
    );
}

#[test]
fn rotation_preserves_membership_under_the_new_commitment() {
    let mut tree = fresh_tree();
    let ctx = Context::new();

    tree.update(&ctx, batch! { "a" => "1", "b" => "2", "c" => "3" })
        .unwrap();
    let com_before = tree.root();

    let (com_after, seqno) = tree.rotate(&ctx).unwrap();
    let verifier = tree.verifier();

    for (label, value) in [(b"a".as_slice(), b"1".as_slice()), (b"b", b"2"), (b"c", b"3")] {
        let answer = tree.query(&ctx, seqno, label).unwrap();
        assert_eq!(answer.value.as_deref(), Some(value));
        assert_eq!(
            verifier.verify(&com_after, label, answer.value.as_deref(), answer.added_at, &answer.proof),
            VerifyOutcome::Included
        );
    }

    // the rotation transcript bridges the two commitments
    let rotation = tree.rotations().last().unwrap();
    verifier
        .verify_rotation(rotation, &com_before, &com_after)
        .unwrap();

    let mut tampered = rotation.clone();
    tampered.transcript = Digest::new([0; 32]);
    assert_eq!(
        verifier
            .verify_rotation(&tampered, &com_before, &com_after)
            .unwrap_err(),
        ProofError::DigestMismatch
    );
    assert!(verifier
        .verify_rotation(rotation, &com_after, &com_after)
        .is_err());
}

#[test]
fn wrong_value_is_invalid() {
    let mut tree = fresh_tree();
    let ctx = Context::new();

    let (com, seqno) = tree.update(&ctx, batch! { "a" => "1" }).unwrap();
    let answer = tree.query(&ctx, seqno, b"a").unwrap();

    let outcome = tree
        .verifier()
        .verify(&com, b"a", Some(b"2"), answer.added_at, &answer.proof);
    assert_eq!(outcome, VerifyOutcome::Invalid);
}

#[test]
fn wrong_label_is_invalid() {
    let mut tree = fresh_tree();
    let ctx = Context::new();

    let (com, seqno) = tree.update(&ctx, batch! { "a" => "1" }).unwrap();
    let answer = tree.query(&ctx, seqno, b"a").unwrap();

    // the VRF proof binds the proof to "a", not "b"
    let outcome = tree
        .verifier()
        .verify(&com, b"b", answer.value.as_deref(), answer.added_at, &answer.proof);
    assert_eq!(outcome, VerifyOutcome::Invalid);
}

#[test]
fn tampered_copath_is_invalid() {
    let mut tree = fresh_tree();
    let ctx = Context::new();

    let (com, seqno) = tree
        .update(&ctx, batch! { "a" => "1", "b" => "2" })
        .unwrap();
    let mut answer = tree.query(&ctx, seqno, b"a").unwrap();

    let entry = answer.proof.copath.last_mut().unwrap();
    let mut bytes = entry.sibling.into_inner();
    bytes[0] ^= 0x01;
    entry.sibling = Digest::new(bytes);

    let outcome = tree
        .verifier()
        .verify(&com, b"a", answer.value.as_deref(), answer.added_at, &answer.proof);
    assert_eq!(outcome, VerifyOutcome::Invalid);
}

#[test]
fn membership_proof_cannot_claim_absence() {
    let mut tree = fresh_tree();
    let ctx = Context::new();

    let (com, seqno) = tree.update(&ctx, batch! { "a" => "1" }).unwrap();
    let answer = tree.query(&ctx, seqno, b"a").unwrap();

    // replaying the membership proof as an absence claim fails
    let outcome = tree
        .verifier()
        .verify(&com, b"a", None, Seqno::NONE, &answer.proof);
    assert_eq!(outcome, VerifyOutcome::Invalid);
}

#[test]
fn membership_claim_without_a_value_is_invalid() {
    let mut tree = fresh_tree();
    let ctx = Context::new();

    let (com, seqno) = tree.update(&ctx, batch! { "a" => "1" }).unwrap();
    let answer = tree.query(&ctx, seqno, b"a").unwrap();

    let outcome = tree
        .verifier()
        .verify(&com, b"a", None, answer.added_at, &answer.proof);
    assert_eq!(outcome, VerifyOutcome::Invalid);
}

#[test]
fn a_retired_era_key_rejects_fresh_proofs() {
    let mut tree = fresh_tree();
    let ctx = Context::new();

    tree.update(&ctx, batch! { "a" => "1" }).unwrap();
    let old_verifier = tree.verifier();

    let (com, seqno) = tree.rotate(&ctx).unwrap();
    let answer = tree.query(&ctx, seqno, b"a").unwrap();

    let outcome =
        old_verifier.verify(&com, b"a", answer.value.as_deref(), answer.added_at, &answer.proof);
    assert_eq!(outcome, VerifyOutcome::Invalid);
}

#[test]
fn proofs_survive_their_wire_encoding() {
    let mut tree = fresh_tree();
    let ctx = Context::new();

    let (com_1, seq_1) = tree.update(&ctx, batch! { "a" => "1" }).unwrap();
    let (com_2, seq_2) = tree.update(&ctx, batch! { "b" => "2" }).unwrap();
    let verifier = tree.verifier();

    let answer = tree.query(&ctx, seq_2, b"a").unwrap();
    let bytes = borsh::to_vec(&answer.proof).unwrap();
    let decoded = MembershipProof::try_from_slice(&bytes).unwrap();
    assert_eq!(decoded, answer.proof);
    assert_eq!(
        verifier.verify(&com_2, b"a", answer.value.as_deref(), answer.added_at, &decoded),
        VerifyOutcome::Included
    );

    let extension = tree.extension_proof(&ctx, seq_1, seq_2).unwrap();
    let bytes = borsh::to_vec(&extension).unwrap();
    let decoded = ExtensionProof::try_from_slice(&bytes).unwrap();
    assert_eq!(decoded, extension);
    verifier
        .verify_extension(&decoded, seq_1, &com_1, seq_2, &com_2)
        .unwrap();
}

#[proptest(cases = 16)]
fn every_inserted_pair_verifies_included(
    #[strategy(proptest::collection::btree_map(
        any::<Vec<u8>>(),
        any::<Vec<u8>>(),
        1..6usize,
    ))]
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
) {
    let mut tree = fresh_tree();
    let ctx = Context::new();

    let (com, seqno) = tree.update(&ctx, entries.clone()).unwrap();
    let verifier = tree.verifier();

    for (label, value) in &entries {
        let answer = tree.query(&ctx, seqno, label).unwrap();
        prop_assert_eq!(answer.value.as_deref(), Some(value.as_slice()));
        prop_assert_eq!(
            verifier.verify(&com, label, answer.value.as_deref(), answer.added_at, &answer.proof),
            VerifyOutcome::Included
        );
    }
}

#[proptest(cases = 16)]
fn absent_labels_verify_excluded(
    #[strategy(proptest::collection::btree_map(
        any::<Vec<u8>>(),
        any::<Vec<u8>>(),
        1..5usize,
    ))]
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    absent: Vec<u8>,
) {
    prop_assume!(!entries.contains_key(&absent));

    let mut tree = fresh_tree();
    let ctx = Context::new();

    let (com, seqno) = tree.update(&ctx, entries).unwrap();
    let answer = tree.query(&ctx, seqno, &absent).unwrap();

    prop_assert_eq!(answer.value, None);
    prop_assert_eq!(
        tree.verifier()
            .verify(&com, &absent, None, answer.added_at, &answer.proof),
        VerifyOutcome::Excluded
    );
}

#[proptest(cases = 8)]
fn extensions_verify_between_every_epoch_pair(
    #[strategy(proptest::collection::vec(
        proptest::collection::btree_map(any::<Vec<u8>>(), any::<Vec<u8>>(), 0..4usize),
        2..4usize,
    ))]
    batches: Vec<BTreeMap<Vec<u8>, Vec<u8>>>,
) {
    let mut tree = fresh_tree();
    let ctx = Context::new();

    // a rotation after the first batch, so the pair loop below also covers
    // every rotation-spanning range
    let mut commitments = vec![tree.root()];
    for (index, entries) in batches.into_iter().enumerate() {
        let (com, _) = tree.update(&ctx, entries).unwrap();
        commitments.push(com);
        if index == 0 {
            let (com, _) = tree.rotate(&ctx).unwrap();
            commitments.push(com);
        }
    }
    let verifier = tree.verifier();

    for from in 0..commitments.len() {
        for to in from + 1..commitments.len() {
            let proof = tree
                .extension_proof(&ctx, Seqno::new(from as u64), Seqno::new(to as u64))
                .unwrap();
            verifier
                .verify_extension(
                    &proof,
                    Seqno::new(from as u64),
                    &commitments[from],
                    Seqno::new(to as u64),
                    &commitments[to],
                )
                .unwrap();
        }
    }
}
