use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{MerkleError, Result};

pub mod md5;
pub mod sha256;

use self::md5::Md5Method;
use self::sha256::Sha256Method;

pub trait HashMethod {
    /// Digest `data` into raw bytes.
    fn digest(data: &[u8]) -> Vec<u8>;

    /// Digest `data` into a lowercase hex string.
    fn digest_hex(data: &[u8]) -> String {
        hex::encode(Self::digest(data))
    }
}

/// Built-in digest algorithms, addressed by name in tree options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Algorithm {
    #[default]
    Sha256,
    Md5,
}

impl Algorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Sha256 => "sha256",
            Algorithm::Md5 => "md5",
        }
    }

    pub fn digest_hex(&self, data: &[u8]) -> String {
        match self {
            Algorithm::Sha256 => Sha256Method::digest_hex(data),
            Algorithm::Md5 => Md5Method::digest_hex(data),
        }
    }
}

impl FromStr for Algorithm {
    type Err = MerkleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sha256" => Ok(Algorithm::Sha256),
            "md5" => Ok(Algorithm::Md5),
            other => Err(MerkleError::invalid(format!(
                "unknown hash algorithm {other:?}, expected \"sha256\" or \"md5\""
            ))),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a hash function comes from: a named built-in or a caller closure.
pub enum HashSource<F: ?Sized> {
    Named(Algorithm),
    Custom(Arc<F>),
}

/// Caller-supplied combine hash: concatenated child digests in, parent digest out.
pub type CombineFn = dyn Fn(&str) -> String + Send + Sync;

/// Caller-supplied input hash: raw record in, leaf digest out.
pub type InputFn = dyn Fn(&Value) -> String + Send + Sync;

pub type CombineHash = HashSource<CombineFn>;
pub type InputHash = HashSource<InputFn>;

/// Combine hash after resolution; called once per tree node.
pub(crate) type ResolvedCombine = Arc<CombineFn>;

/// Input hash after resolution. Named algorithms canonicalize first, which may fail.
pub(crate) type ResolvedInput = Arc<dyn Fn(&Value) -> Result<String> + Send + Sync>;

impl<F: ?Sized> HashSource<F> {
    /// Name shown in option dumps; closures have none.
    pub fn label(&self) -> &'static str {
        match self {
            HashSource::Named(algorithm) => algorithm.name(),
            HashSource::Custom(_) => "custom",
        }
    }
}

impl CombineHash {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        HashSource::Custom(Arc::new(f))
    }

    pub(crate) fn resolve(&self) -> ResolvedCombine {
        match self {
            HashSource::Named(algorithm) => {
                let algorithm = *algorithm;
                Arc::new(move |data: &str| algorithm.digest_hex(data.as_bytes()))
            }
            HashSource::Custom(f) => Arc::clone(f),
        }
    }
}

impl InputHash {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        HashSource::Custom(Arc::new(f))
    }

    pub(crate) fn resolve(&self) -> ResolvedInput {
        match self {
            HashSource::Named(algorithm) => {
                let algorithm = *algorithm;
                Arc::new(move |record: &Value| crate::domain::leaf::hash_record(record, algorithm))
            }
            HashSource::Custom(f) => {
                let f = Arc::clone(f);
                Arc::new(move |record: &Value| Ok(f(record)))
            }
        }
    }
}

impl<F: ?Sized> Clone for HashSource<F> {
    fn clone(&self) -> Self {
        match self {
            HashSource::Named(algorithm) => HashSource::Named(*algorithm),
            HashSource::Custom(f) => HashSource::Custom(Arc::clone(f)),
        }
    }
}

impl<F: ?Sized> Default for HashSource<F> {
    fn default() -> Self {
        HashSource::Named(Algorithm::default())
    }
}

impl<F: ?Sized> From<Algorithm> for HashSource<F> {
    fn from(algorithm: Algorithm) -> Self {
        HashSource::Named(algorithm)
    }
}

impl<F: ?Sized> fmt::Debug for HashSource<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashSource::Named(algorithm) => f.debug_tuple("Named").field(algorithm).finish(),
            HashSource::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
