use std::collections::BTreeMap;

use rzks_primitives::{Digest, Seqno};

use crate::config::{Config, RootVersion};
use crate::empty::empty_subtree_digest;
use crate::error::Error;
use crate::proof::RotationProof;
use crate::store::NodeStore;
use crate::verify::Verifier;
use crate::vrf::{VrfPublicKey, VrfSecret};
use crate::{Context, TransparencyDigest};

mod build;
mod epoch;
mod extension;
mod lookup;

pub(crate) use build::BuildItem;

/// One version of a label's binding, as held in the server-side ledger.
#[derive(Debug, Clone)]
pub(crate) struct BindingVersion {
    pub value: Vec<u8>,
    pub nonce: [u8; 32],
    pub commit: Digest,
    pub added_at: Seqno,
}

/// The server-side handle to an authenticated directory.
///
/// A `Tree` bundles the configuration, the node store, the VRF secret, and
/// the current published root. It is created by [`Tree::init`], mutated only
/// by [`Tree::update`] and [`Tree::rotate`], and read by [`Tree::query`] and
/// [`Tree::extension_proof`].
///
/// ```rust
/// # use rzks::*;
/// let mut tree = Tree::init(Config::generate_parameters(), MemoryStore::new()).unwrap();
/// assert_eq!(tree.seqno(), Seqno::NONE);
///
/// let ctx = Context::new();
/// let (com, seqno) = tree.update(&ctx, batch! { "k" => "v" }).unwrap();
/// assert_eq!(seqno, Seqno::new(1));
/// assert_eq!(com, tree.root());
/// ```
pub struct Tree<S> {
    pub(crate) cfg: Config,
    pub(crate) store: S,
    pub(crate) secret: VrfSecret,
    pub(crate) root: Digest,
    pub(crate) seqno: Seqno,
    version: RootVersion,
    /// label -> binding versions, oldest first. Serves values to queries and
    /// drives the full re-imaging a rotation performs.
    pub(crate) bindings: BTreeMap<Vec<u8>, Vec<BindingVersion>>,
    /// (first epoch of the key era, public key), oldest first.
    pub(crate) key_history: Vec<(Seqno, VrfPublicKey)>,
    pub(crate) rotations: Vec<RotationProof>,
}

impl<S: NodeStore> Tree<S> {
    /// Create a fresh directory at seqno 0 over an empty store.
    pub fn init(cfg: Config, store: S) -> Result<Self, Error> {
        cfg.validate()?;

        let latest = store.latest_epoch(&Context::new())?;
        if !latest.is_none() {
            return Err(Error::Invariant(format!(
                "init requires an empty store, found records up to epoch {latest}"
            )));
        }

        let secret = VrfSecret::generate();
        let public = secret.public_key();

        Ok(Self {
            cfg,
            store,
            secret,
            root: empty_subtree_digest(0),
            seqno: Seqno::NONE,
            version: RootVersion::V1,
            bindings: BTreeMap::new(),
            key_history: vec![(Seqno::NONE, public)],
            rotations: Vec::new(),
        })
    }

    /// The configuration the directory was initialised with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// The current published commitment.
    #[inline]
    #[must_use]
    pub fn root(&self) -> TransparencyDigest {
        self.root
    }

    /// The current seqno ([`Seqno::NONE`] for a fresh tree).
    #[inline]
    #[must_use]
    pub fn seqno(&self) -> Seqno {
        self.seqno
    }

    /// The root commitment format version.
    #[inline]
    #[must_use]
    pub fn version(&self) -> RootVersion {
        self.version
    }

    /// The current VRF public key.
    #[must_use]
    pub fn public_key(&self) -> VrfPublicKey {
        self.secret.public_key()
    }

    /// The VRF public key that was active at `epoch`.
    #[must_use]
    pub fn public_key_at(&self, epoch: Seqno) -> VrfPublicKey {
        self.key_history
            .iter()
            .rev()
            .find(|(start, _)| *start <= epoch)
            .map(|(_, key)| *key)
            .expect("key history always starts at seqno 0")
    }

    /// The transcripts of every rotation performed so far, oldest first.
    #[inline]
    #[must_use]
    pub fn rotations(&self) -> &[RotationProof] {
        &self.rotations
    }

    /// The number of labels currently bound.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether no labels are bound.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Whether `label` is currently bound.
    #[must_use]
    pub fn contains_label(&self, label: &[u8]) -> bool {
        self.bindings.contains_key(label)
    }

    /// A stateless verifier for the current key era.
    #[must_use]
    pub fn verifier(&self) -> Verifier {
        Verifier::new(self.cfg, self.public_key())
    }

    /// The first epoch served by the current VRF key.
    pub(crate) fn era_start(&self) -> Seqno {
        self.key_history
            .last()
            .map(|(start, _)| *start)
            .expect("key history is never empty")
    }
}
