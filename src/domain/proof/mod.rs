use log::debug;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::leaf::same_record;
use super::tree::MerkleTree;

/// Inclusion proof for one record.
///
/// `path` lists `(level, sibling)` coordinates from the leaf level up to the
/// level just below the root. Sibling digests are not carried: they are looked
/// up in the tree at verification time, so a proof only verifies against the
/// tree state it was drawn from.
///
/// Serializes as `{"node": .., "index": n | -1, "path": [[level, sibling], ..]}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MerkleProof {
    #[serde(default)]
    pub node: Option<Value>,
    /// Leaf position of `node`; `None` is the "not found" sentinel (`-1`).
    #[serde(serialize_with = "ser_index", deserialize_with = "de_index")]
    pub index: Option<usize>,
    #[serde(default)]
    pub path: Vec<(usize, usize)>,
}

impl MerkleProof {
    fn not_found(node: Option<Value>) -> Self {
        Self {
            node,
            index: None,
            path: Vec::new(),
        }
    }
}

fn ser_index<S: Serializer>(index: &Option<usize>, serializer: S) -> Result<S::Ok, S::Error> {
    match index {
        Some(i) => serializer.serialize_u64(*i as u64),
        None => serializer.serialize_i64(-1),
    }
}

fn de_index<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<usize>, D::Error> {
    let raw = i64::deserialize(deserializer)?;
    Ok(usize::try_from(raw).ok())
}

impl MerkleTree {
    /// Build a proof for `record`.
    ///
    /// Without `index` the first record deep-equal to `record` is used;
    /// numbers compare by value, so `2.0` finds `2`. An
    /// explicit `index` is taken as-is, without comparing the record stored
    /// there, but only if it is a non-negative integer below `len()`; any other
    /// value yields the not-found sentinel.
    pub fn get_proof(&self, record: Option<&Value>, index: Option<&Value>) -> MerkleProof {
        let Some(record) = record else {
            return MerkleProof::not_found(None);
        };
        let resolved = match index {
            Some(index) => self.checked_index(index),
            None => self.position_of(record),
        };
        match resolved {
            Some(index) => self.proof_at(record, index),
            None => {
                debug!("no leaf for proof of {record}");
                MerkleProof::not_found(Some(record.clone()))
            }
        }
    }

    /// Proof for the first record deep-equal to `record`.
    pub fn proof_of(&self, record: &Value) -> MerkleProof {
        self.get_proof(Some(record), None)
    }

    /// Proof for `record` claimed at leaf `index`.
    pub fn proof_at(&self, record: &Value, index: usize) -> MerkleProof {
        let Some(height) = self.height().filter(|_| index < self.len()) else {
            return MerkleProof::not_found(Some(record.clone()));
        };

        let mut path = Vec::with_capacity(height);
        let mut cur = index;
        for level in (1..=height).rev() {
            path.push((level, cur ^ 1));
            cur /= 2;
        }

        MerkleProof {
            node: Some(record.clone()),
            index: Some(index),
            path,
        }
    }

    /// Recompute the root from `proof.node` and the siblings at `proof.path`,
    /// and compare it with this tree's root.
    pub fn verify(&self, proof: &MerkleProof) -> bool {
        let (Some(root), Some(mut position), Some(node)) =
            (self.root(), proof.index, proof.node.as_ref())
        else {
            return false;
        };
        let Some(mut candidate) = self.leaf_node(node) else {
            return false;
        };

        for &(level, sibling) in &proof.path {
            let Some(nodes) = self.levels().get(level) else {
                debug!("proof references missing level {level}");
                return false;
            };
            let sibling = match nodes.get(sibling) {
                Some(digest) => digest.as_str(),
                // One past the end of an odd level: the node pairs with itself.
                None if sibling == nodes.len() => candidate.as_str(),
                None => {
                    debug!("proof references missing node {sibling} on level {level}");
                    return false;
                }
            };
            let joined = if position % 2 == 0 {
                format!("{candidate}{sibling}")
            } else {
                format!("{sibling}{candidate}")
            };
            candidate = self.combine(&joined);
            position /= 2;
        }

        candidate == root
    }

    fn position_of(&self, record: &Value) -> Option<usize> {
        self.records().iter().position(|r| same_record(r, record))
    }

    fn checked_index(&self, index: &Value) -> Option<usize> {
        let Value::Number(n) = index else {
            return None;
        };
        let index = match n.as_u64() {
            Some(i) => usize::try_from(i).ok()?,
            None => {
                let f = n.as_f64()?;
                if f < 0.0 || f.fract() != 0.0 || f >= self.len() as f64 {
                    return None;
                }
                f as usize
            }
        };
        (index < self.len()).then_some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::hash::Algorithm;
    use crate::domain::options::TreeOptions;
    use rand::Rng;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;

    fn tree_of(items: &[&str]) -> MerkleTree {
        MerkleTree::from_records(items.iter().map(|s| json!(s)).collect()).unwrap()
    }

    fn proof(node: Value, index: usize, path: &[(usize, usize)]) -> MerkleProof {
        MerkleProof {
            node: Some(node),
            index: Some(index),
            path: path.to_vec(),
        }
    }

    #[test]
    fn test_single_record_proof() {
        let tree = tree_of(&["1"]);
        let p = tree.proof_of(&json!("1"));
        assert_eq!(p, proof(json!("1"), 0, &[]));
        assert!(tree.verify(&p), "Single-record proof must verify");
    }

    #[test]
    fn test_literal_paths() {
        let tree = tree_of(&["a", "b", "c", "d", "e", "f", "g"]);
        assert_eq!(
            tree.proof_of(&json!("b")),
            proof(json!("b"), 1, &[(3, 0), (2, 1), (1, 1)])
        );
        assert_eq!(
            tree.proof_of(&json!("d")),
            proof(json!("d"), 3, &[(3, 2), (2, 0), (1, 1)])
        );
        assert_eq!(
            tree.proof_of(&json!("g")),
            proof(json!("g"), 6, &[(3, 7), (2, 2), (1, 0)])
        );
    }

    #[test]
    fn test_explicit_index_is_not_checked_against_record() {
        let tree = tree_of(&["a", "b", "c", "d", "e"]);
        assert_eq!(
            tree.get_proof(Some(&json!("a")), Some(&json!(3))),
            proof(json!("a"), 3, &[(3, 2), (2, 0), (1, 1)])
        );
        assert_eq!(
            tree.get_proof(Some(&json!("d")), Some(&json!(3.0))).index,
            Some(3),
            "Integral floats are valid indices"
        );
    }

    #[test]
    fn test_missing_record() {
        let tree = tree_of(&["a", "b", "c", "d", "e"]);
        assert_eq!(tree.get_proof(None, None), MerkleProof::default());
        assert_eq!(tree.get_proof(None, Some(&json!(1))), MerkleProof::default());
        for absent in [json!("1"), json!(1)] {
            assert_eq!(
                tree.proof_of(&absent),
                MerkleProof::not_found(Some(absent.clone()))
            );
        }
    }

    #[test]
    fn test_invalid_index() {
        let tree = tree_of(&["a", "b", "c", "d", "e"]);
        for bad in [
            json!(9.123),
            json!({}),
            json!("abc"),
            json!([]),
            json!(-2),
            json!(999),
            json!(5),
            json!(null),
            json!(-0.5),
        ] {
            assert_eq!(
                tree.get_proof(Some(&json!("a")), Some(&bad)),
                MerkleProof::not_found(Some(json!("a"))),
                "Index {bad} must resolve to -1"
            );
        }
        assert_eq!(tree.proof_at(&json!("a"), 5).index, None);
    }

    #[test]
    fn test_empty_tree() {
        let tree = MerkleTree::from_records(vec![]).unwrap();
        for record in [json!("1"), json!(1)] {
            let p = tree.proof_of(&record);
            assert_eq!(p, MerkleProof::not_found(Some(record)));
            assert!(!tree.verify(&p), "Nothing verifies against an empty tree");
        }
        assert!(!tree.verify(&proof(json!("1"), 0, &[])));
    }

    #[test]
    fn test_duplicates_resolve_to_first() {
        let tree = MerkleTree::from_records(vec![json!({"k": 1}), json!(2), json!({"k": 1})]).unwrap();
        assert_eq!(tree.proof_of(&json!({"k": 1})).index, Some(0));
        assert!(tree.verify(&tree.proof_at(&json!({"k": 1}), 2)));
    }

    #[test]
    fn test_lookup_ignores_number_spelling() {
        let tree = MerkleTree::from_records(vec![json!(1), json!(2), json!({"n": 3})]).unwrap();
        let p = tree.proof_of(&json!(2.0));
        assert_eq!(p.index, Some(1), "2.0 must find the record 2");
        assert!(tree.verify(&p));
        assert_eq!(tree.proof_of(&json!({"n": 3.0})).index, Some(2));
        assert_eq!(tree.proof_of(&json!(2.5)).index, None);
    }

    #[test]
    fn test_verify_matches() {
        let tree = tree_of(&["a", "b", "c", "d", "e"]);
        assert!(tree.verify(&tree.proof_of(&json!("d"))));
        assert!(tree.verify(&tree.get_proof(Some(&json!("a")), Some(&json!(0)))));

        let single = tree_of(&["a"]);
        assert!(single.verify(&single.proof_of(&json!("a"))));
    }

    #[test]
    fn test_verify_last_node_of_odd_levels() {
        let tree = tree_of(&["a", "b", "c", "d", "e", "f", "g"]);
        assert!(tree.verify(&tree.proof_of(&json!("g"))));
        let tree = tree_of(&["a", "b", "c", "d", "e"]);
        assert!(tree.verify(&tree.proof_of(&json!("e"))));
    }

    #[test]
    fn test_verify_not_found() {
        let tree = tree_of(&["a", "b", "c", "d", "e"]);
        let single = tree_of(&["a"]);
        assert!(!tree.verify(&tree.proof_of(&json!("f"))));
        assert!(!single.verify(&single.get_proof(None, None)));
        assert!(!single.verify(&single.proof_of(&json!(1))));
    }

    #[test]
    fn test_verify_wrong_position() {
        let tree = tree_of(&["a", "b", "c", "d", "e"]);
        let b = json!("b");
        assert!(!tree.verify(&tree.get_proof(Some(&b), Some(&json!(4)))));
        assert!(!tree.verify(&tree.get_proof(Some(&b), Some(&json!(10)))));
        assert!(!tree.verify(&tree.get_proof(Some(&b), Some(&json!(-1)))));
    }

    #[test]
    fn test_verify_other_tree() {
        let five = tree_of(&["a", "b", "c", "d", "e"]);
        let four = tree_of(&["a", "b", "c", "d"]);
        let p = five.proof_at(&json!("b"), 1);
        assert!(five.verify(&p));
        assert!(!four.verify(&p), "A proof from another tree must not verify");
    }

    #[test]
    fn test_verify_rejects_forged_coordinates() {
        let tree = tree_of(&["a", "b", "c", "d"]);
        let mut p = tree.proof_of(&json!("c"));
        p.path[0].1 = 9;
        assert!(!tree.verify(&p));

        let mut p = tree.proof_of(&json!("c"));
        p.path.push((7, 0));
        assert!(!tree.verify(&p));

        let p = proof(json!("c"), 2, &[]);
        assert!(!tree.verify(&p));
    }

    #[test]
    fn test_stale_proof_after_insert() {
        let mut tree = tree_of(&["a", "b", "c", "d"]);
        let p = tree.proof_of(&json!("a"));
        assert!(tree.verify(&p));
        tree.add_node(json!("e")).unwrap();
        assert!(!tree.verify(&p), "Proof from the smaller tree must fail after growth");
        assert!(tree.verify(&tree.proof_of(&json!("a"))));
    }

    #[test]
    fn test_round_trip_every_index() {
        let mut rng = rand::rng();
        for n in [1usize, 2, 3, 5, 7, 8, 9, 16, 33] {
            let records: Vec<Value> = (0..n)
                .map(|i| json!({"i": i, "salt": rng.random::<u32>()}))
                .collect();
            for options in [
                TreeOptions::default(),
                TreeOptions::default().with_hash(Algorithm::Md5),
                TreeOptions::default().with_input_hash(Algorithm::Md5),
            ] {
                let tree = MerkleTree::new(records.clone(), options).unwrap();
                for (i, record) in records.iter().enumerate() {
                    let p = tree.proof_at(record, i);
                    assert_eq!(p.path.len(), tree.height().unwrap());
                    assert!(tree.verify(&p), "Record {i} of {n} must verify");
                }
            }
        }
    }

    #[test]
    fn test_custom_hashes_verify() {
        let tree = MerkleTree::new(
            (0..6).map(|i| json!(i)).collect(),
            TreeOptions::default()
                .with_custom_input_hash(|v| format!("leaf:{v}"))
                .with_custom_hash(|data| Algorithm::Md5.digest_hex(data.as_bytes())),
        )
        .unwrap();
        for i in 0..6 {
            assert!(tree.verify(&tree.proof_of(&json!(i))));
        }
    }

    #[test]
    fn test_serde_shape() {
        let tree = tree_of(&["a", "b", "c", "d", "e", "f", "g"]);
        let encoded = serde_json::to_value(tree.proof_of(&json!("b"))).unwrap();
        assert_eq!(
            encoded,
            json!({"node": "b", "index": 1, "path": [[3, 0], [2, 1], [1, 1]]})
        );

        let missing = serde_json::to_value(tree.proof_of(&json!("z"))).unwrap();
        assert_eq!(missing, json!({"node": "z", "index": -1, "path": []}));

        let decoded: MerkleProof =
            serde_json::from_value(json!({"node": "g", "index": 6, "path": [[3, 7], [2, 2], [1, 0]]}))
                .unwrap();
        assert!(tree.verify(&decoded));

        let decoded: MerkleProof = serde_json::from_value(json!({"index": -1})).unwrap();
        assert_eq!(decoded, MerkleProof::default());
    }

    #[test]
    fn test_concurrent_readers() {
        let tree = Arc::new(tree_of(&["a", "b", "c", "d", "e", "f", "g", "h", "i"]));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let tree = Arc::clone(&tree);
                thread::spawn(move || {
                    let record = tree.records()[t * 2].clone();
                    tree.verify(&tree.proof_of(&record))
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
