use rzks_primitives::Digest;

use crate::error::ConfigError;

/// The process-wide parameters of a directory.
///
/// ```rust
/// # use rzks::Config;
/// let cfg = Config::generate_parameters();
/// assert_eq!(cfg.digest_len, 32);
/// assert_eq!(cfg.max_depth(), 256);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// The digest byte length `L`. Must equal [`Digest::SIZE`]; the VRF
    /// output bit length (and the maximum tree depth) is `8 * L`.
    pub digest_len: usize,
    /// The depth granularity at which a batched rebuild flushes pending
    /// node writes into the staging buffer. Never affects digests.
    pub step: usize,
}

impl Config {
    /// The fan-out of internal nodes. The tree is binary.
    pub const MAX_FANOUT: usize = 2;

    /// The standard parameters: `L = 32`, `step = 2`.
    #[must_use]
    pub fn generate_parameters() -> Self {
        Self {
            digest_len: 32,
            step: 2,
        }
    }

    /// The maximum tree depth in bits.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.digest_len * 8
    }

    /// Validate the parameters, as done by [`Tree::init`].
    ///
    /// [`Tree::init`]: crate::Tree::init
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.digest_len != Digest::SIZE {
            return Err(ConfigError::DigestLength(self.digest_len));
        }
        if self.step == 0 {
            return Err(ConfigError::StepZero);
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::generate_parameters()
    }
}

/// The version tag of the root commitment format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RootVersion {
    /// The initial format.
    #[default]
    V1,
}
