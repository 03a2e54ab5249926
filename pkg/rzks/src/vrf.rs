//! The verifiable random function deriving tree paths from labels.
//!
//! Labels never appear in the tree; each label is mapped to a pseudorandom
//! image by an ECVRF-RISTRETTO255-SHA512 evaluation under the tree's secret
//! key, and the evaluation proof rides inside membership proofs so verifiers
//! need not trust the server's path claim.

use std::fmt::Debug;

use borsh::{BorshDeserialize, BorshSerialize};
use rand::rngs::OsRng;
use rzks_primitives::Digest;

use crate::error::VrfError;

/// The serialized length of a VRF evaluation proof.
pub const PROOF_SIZE: usize = 80;

/// The tree's VRF secret. Owned exclusively by the tree handle; replaced
/// wholesale by a rotation.
pub struct VrfSecret {
    secret: vrf_r255::SecretKey,
    public: VrfPublicKey,
}

impl VrfSecret {
    /// Generate a fresh secret from the operating system's entropy source.
    #[must_use]
    pub fn generate() -> Self {
        let secret = vrf_r255::SecretKey::generate(OsRng);
        let public = VrfPublicKey(vrf_r255::PublicKey::from(secret).to_bytes());
        Self { secret, public }
    }

    /// The matching public key.
    #[must_use]
    pub fn public_key(&self) -> VrfPublicKey {
        self.public
    }

    /// Evaluate the VRF on `label`, yielding the image that determines the
    /// label's tree path plus the proof of correct evaluation.
    #[must_use]
    pub fn evaluate(&self, label: &[u8]) -> (Digest, VrfProof) {
        let proof = self.secret.prove(label);
        let public = vrf_r255::PublicKey::from(self.secret);
        let output = Option::<[u8; 64]>::from(public.verify(label, &proof))
            .expect("freshly generated proof must verify under its own key");

        let mut image = [0u8; Digest::SIZE];
        image.copy_from_slice(&output[..Digest::SIZE]);

        (Digest::new(image), VrfProof(proof.to_bytes()))
    }
}

impl Debug for VrfSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        // never print the secret scalar
        f.debug_struct("VrfSecret")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// A VRF public key, as published to verifiers.
#[derive(Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct VrfPublicKey(pub [u8; 32]);

impl VrfPublicKey {
    /// Borrow the raw key bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check that `proof` proves `image` to be the VRF image of `label`
    /// under this key.
    pub fn verify(&self, label: &[u8], image: &Digest, proof: &VrfProof) -> Result<(), VrfError> {
        let key = Option::<vrf_r255::PublicKey>::from(vrf_r255::PublicKey::from_bytes(self.0))
            .ok_or(VrfError::MalformedKey)?;
        let proof = Option::<vrf_r255::Proof>::from(vrf_r255::Proof::from_bytes(proof.0))
            .ok_or(VrfError::MalformedProof)?;

        let output =
            Option::<[u8; 64]>::from(key.verify(label, &proof)).ok_or(VrfError::InvalidProof)?;

        let mut derived = [0u8; Digest::SIZE];
        derived.copy_from_slice(&output[..Digest::SIZE]);

        if !Digest::new(derived).ct_eq(image) {
            return Err(VrfError::InvalidProof);
        }
        Ok(())
    }
}

impl Debug for VrfPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "VrfPublicKey({})", hex::encode(self.0))
    }
}

/// A serialized VRF evaluation proof, embedded in membership proofs.
#[derive(Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct VrfProof(pub [u8; PROOF_SIZE]);

impl Debug for VrfProof {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "VrfProof({})", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluation_round_trips() {
        let secret = VrfSecret::generate();
        let (image, proof) = secret.evaluate(b"some label");

        secret.public_key().verify(b"some label", &image, &proof).unwrap();
    }

    #[test]
    fn evaluation_is_deterministic_per_key() {
        let secret = VrfSecret::generate();

        let (a, _) = secret.evaluate(b"label");
        let (b, _) = secret.evaluate(b"label");
        assert_eq!(a, b);

        let (c, _) = secret.evaluate(b"other label");
        assert_ne!(a, c);
    }

    #[test]
    fn distinct_keys_give_distinct_images() {
        let (a, _) = VrfSecret::generate().evaluate(b"label");
        let (b, _) = VrfSecret::generate().evaluate(b"label");
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_label_is_rejected() {
        let secret = VrfSecret::generate();
        let (image, proof) = secret.evaluate(b"label");

        let err = secret
            .public_key()
            .verify(b"other", &image, &proof)
            .unwrap_err();
        assert_eq!(err, VrfError::InvalidProof);
    }

    #[test]
    fn wrong_image_is_rejected() {
        let secret = VrfSecret::generate();
        let (_, proof) = secret.evaluate(b"label");

        let err = secret
            .public_key()
            .verify(b"label", &Digest::new([0; 32]), &proof)
            .unwrap_err();
        assert_eq!(err, VrfError::InvalidProof);
    }

    #[test]
    fn foreign_key_is_rejected() {
        let secret = VrfSecret::generate();
        let (image, proof) = secret.evaluate(b"label");

        let other = VrfSecret::generate();
        assert!(other.public_key().verify(b"label", &image, &proof).is_err());
    }

    #[test]
    fn public_key_round_trips_through_borsh() {
        let key = VrfSecret::generate().public_key();
        let encoded = borsh::to_vec(&key).unwrap();
        assert_eq!(VrfPublicKey::try_from_slice(&encoded).unwrap(), key);
    }
}
