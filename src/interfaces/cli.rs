use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use itertools::Itertools;
use log::debug;
use serde_json::{json, Value};

use crate::domain::hash::Algorithm;
use crate::domain::proof::MerkleProof;
use crate::domain::tree::MerkleTree;

#[derive(Parser, Debug)]
#[command(name = "merkle-proof-tree")]
#[command(about = "Build a Merkle tree over JSON records, then issue and check inclusion proofs")]
pub struct Cli {
    /// Records as a JSON array
    #[arg(long)]
    pub records: String,

    /// Hash used to combine child digests (sha256 or md5)
    #[arg(long, env = "MERKLE_HASH", default_value_t = Algorithm::Sha256)]
    pub hash: Algorithm,

    /// Hash applied to each record to form its leaf (sha256 or md5)
    #[arg(long, env = "MERKLE_INPUT_HASH", default_value_t = Algorithm::Sha256)]
    pub input_hash: Algorithm,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the root digest; nothing for an empty tree
    Root,
    /// Print every level, root first
    Levels,
    /// Print the effective hash options
    Options,
    /// Print the inclusion proof of a record as JSON
    Proof {
        /// Record to prove; text that is not JSON is taken as a string
        record: String,
        /// Leaf index to prove at, as JSON
        #[arg(long, allow_hyphen_values = true)]
        index: Option<String>,
    },
    /// Check a proof (as printed by `proof`) against the tree
    Verify {
        proof: String,
    },
}

/// Parse a record argument: JSON when it parses, a plain string otherwise.
pub fn parse_record(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

impl Cli {
    pub fn build_tree(&self) -> Result<MerkleTree> {
        let records: Value =
            serde_json::from_str(&self.records).context("--records is not valid JSON")?;
        let options = json!({
            "hash": self.hash.name(),
            "inputHash": self.input_hash.name(),
        });
        let tree = MerkleTree::from_json(&records, Some(&options))
            .context("failed to build the tree")?;
        debug!("built tree over {} records", tree.len());
        Ok(tree)
    }

    /// Run the selected command and return what it prints.
    pub fn run(&self) -> Result<String> {
        let tree = self.build_tree()?;
        let out = match &self.command {
            Command::Root => tree.root().unwrap_or_default().to_string(),
            Command::Levels => tree
                .levels()
                .iter()
                .map(|level| level.iter().join(","))
                .join("\n"),
            Command::Options => tree.options().describe().to_string(),
            Command::Proof { record, index } => {
                let record = parse_record(record);
                let index = index.as_deref().map(parse_record);
                let proof = tree.get_proof(Some(&record), index.as_ref());
                serde_json::to_string(&proof)?
            }
            Command::Verify { proof } => {
                let proof: MerkleProof =
                    serde_json::from_str(proof).context("proof is not valid JSON")?;
                tree.verify(&proof).to_string()
            }
        };
        Ok(out)
    }
}
