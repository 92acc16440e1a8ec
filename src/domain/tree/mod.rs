use std::fmt;
use std::time::Instant;

use itertools::Itertools;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde_json::Value;

use super::hash::{ResolvedCombine, ResolvedInput};
use super::options::{json_type, TreeOptions};
use crate::error::{MerkleError, Result};

/// Binary hash tree over an ordered list of records.
///
/// `levels[0]` holds the root alone and the last level holds one node per
/// record. Every insertion rebuilds all levels from the leaf digests.
///
/// Mutation goes through `&mut self`. To share a tree between threads, wrap it
/// in a lock; a reader must never observe a half-rebuilt tree.
pub struct MerkleTree {
    records: Vec<Value>,
    leaf_digests: Vec<String>,
    levels: Vec<Vec<String>>,
    options: TreeOptions,
    combine: ResolvedCombine,
    input: ResolvedInput,
}

impl MerkleTree {
    pub fn new(records: Vec<Value>, options: TreeOptions) -> Result<Self> {
        let combine = options.hash.resolve();
        let input = options.input_hash.resolve();
        let mut tree = Self {
            records: Vec::new(),
            leaf_digests: Vec::new(),
            levels: Vec::new(),
            options,
            combine,
            input,
        };
        tree.extend(records)?;
        Ok(tree)
    }

    /// Tree over `records` with sha256 for both hashes.
    pub fn from_records(records: Vec<Value>) -> Result<Self> {
        Self::new(records, TreeOptions::default())
    }

    /// Build from loosely typed arguments. `records` must be an array and
    /// `options`, when given, an object.
    pub fn from_json(records: &Value, options: Option<&Value>) -> Result<Self> {
        let records = match records {
            Value::Array(items) => items.clone(),
            other => {
                warn!("rejecting tree records of type {}", json_type(other));
                return Err(MerkleError::invalid(format!(
                    "records must be an array, got {}",
                    json_type(other)
                )));
            }
        };
        Self::new(records, TreeOptions::from_json(options)?)
    }

    /// Append one record and rebuild the tree.
    pub fn add_node(&mut self, record: Value) -> Result<()> {
        self.extend(std::iter::once(record))
    }

    /// Append several records, rebuilding once. Same result as calling
    /// [`add_node`](Self::add_node) for each of them.
    pub fn extend<I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = Value>,
    {
        let records: Vec<Value> = records.into_iter().collect();
        let input = &self.input;
        let digests = records
            .par_iter()
            .map(|record| input(record))
            .collect::<Result<Vec<String>>>()?;

        self.records.extend(records);
        self.leaf_digests.extend(digests);
        self.levels = build_levels(&self.leaf_digests, &self.combine);
        Ok(())
    }

    pub fn root(&self) -> Option<&str> {
        self.levels
            .first()
            .and_then(|level| level.first())
            .map(String::as_str)
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[Value] {
        &self.records
    }

    /// Input-hash output per record, parallel to [`records`](Self::records).
    pub fn leaf_digests(&self) -> &[String] {
        &self.leaf_digests
    }

    /// All levels, root first.
    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    /// Index of the leaf level, 0 for a single-record tree. `None` when empty.
    pub fn height(&self) -> Option<usize> {
        self.levels.len().checked_sub(1)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    pub(crate) fn combine(&self, data: &str) -> String {
        (self.combine)(data)
    }

    pub(crate) fn leaf_node(&self, record: &Value) -> Option<String> {
        match (self.input)(record) {
            Ok(digest) => Some(self.combine(&digest)),
            Err(err) => {
                debug!("cannot hash candidate record: {err}");
                None
            }
        }
    }
}

/// Reduce leaf digests to the full list of levels, root first.
///
/// Each leaf digest goes through `combine` once to form the leaf level. Then
/// adjacent pairs are combined as `combine(left || right)` until one node is
/// left; the last node of an odd level is paired with itself.
pub(crate) fn build_levels(leaf_digests: &[String], combine: &ResolvedCombine) -> Vec<Vec<String>> {
    if leaf_digests.is_empty() {
        return Vec::new();
    }
    let total_start = Instant::now();

    let mut current: Vec<String> = leaf_digests
        .par_iter()
        .map(|digest| combine(digest))
        .collect();
    let mut levels = Vec::new();

    while current.len() > 1 {
        let round_start = Instant::now();
        let next: Vec<String> = current
            .par_chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                combine(&format!("{left}{right}"))
            })
            .collect();
        debug!(
            "Reduced level of {} nodes to {} in {:?}",
            current.len(),
            next.len(),
            round_start.elapsed()
        );
        levels.push(current);
        current = next;
    }
    levels.push(current);
    levels.reverse();

    info!(
        "Built {} levels over {} leaves in {:?}",
        levels.len(),
        leaf_digests.len(),
        total_start.elapsed()
    );
    levels
}

impl fmt::Debug for MerkleTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MerkleTree")
            .field("records", &self.records)
            .field("root", &self.root())
            .field("options", &self.options)
            .finish()
    }
}

impl fmt::Display for MerkleTree {
    /// One line per level, root first.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (depth, level) in self.levels.iter().enumerate() {
            writeln!(f, "{depth}: {}", level.iter().join(","))?;
        }
        Ok(())
    }
}
