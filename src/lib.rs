#![deny(clippy::all)]

//! Binary hash tree over arbitrary JSON records, with inclusion proofs that
//! verify against the tree's root digest.

pub mod domain;
pub mod error;
pub mod interfaces;

pub use domain::hash::{Algorithm, CombineHash, HashSource, InputHash};
pub use domain::options::TreeOptions;
pub use domain::proof::MerkleProof;
pub use domain::tree::MerkleTree;
pub use error::{MerkleError, Result};
