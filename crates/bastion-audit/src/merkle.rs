//! Binary Merkle tree over record signatures.
//!
//! Leaves are the 32-byte decoded record signatures, in batch order. At each
//! level an odd node count is padded by duplicating the last node, so that
//! node becomes its own sibling. Parents are `SHA-256(left || right)`.
//!
//! Special cases:
//!   - no leaves: the root is `SHA-256("")`
//!   - one leaf:  the root is the leaf itself, and its proof is empty

use chrono::Utc;
use sha2::{Digest, Sha256};

use bastion_contracts::{
    batch::{Batch, Hash32, InclusionProof, ProofStep, Side},
    error::{BastionError, BastionResult},
    record::AuditRecord,
};

use crate::signer::require_valid_signature;

pub fn hash_pair(left: &Hash32, right: &Hash32) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Hash the next level up, duplicating the last node of an odd level.
fn next_level(level: &[Hash32]) -> Vec<Hash32> {
    level
        .chunks(2)
        .map(|pair| {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            hash_pair(left, right)
        })
        .collect()
}

/// Merkle root of `leaves`.
pub fn compute_root(leaves: &[Hash32]) -> Hash32 {
    if leaves.is_empty() {
        return Sha256::digest(b"").into();
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

/// Sibling path for the leaf at `index`, bottom level first.
///
/// Returns `None` when `index` is out of range.
pub fn compute_proof(index: usize, leaves: &[Hash32]) -> Option<Vec<ProofStep>> {
    if index >= leaves.len() {
        return None;
    }

    let mut path = Vec::new();
    let mut level = leaves.to_vec();
    let mut idx = index;

    while level.len() > 1 {
        let sibling_idx = idx ^ 1;
        // The duplicated last node of an odd level is its own sibling.
        let sibling = level.get(sibling_idx).copied().unwrap_or(level[idx]);
        let side = if idx % 2 == 0 { Side::Right } else { Side::Left };
        path.push(ProofStep { sibling, side });

        level = next_level(&level);
        idx /= 2;
    }

    Some(path)
}

/// Replay `path` from `leaf` and compare the result with `root` byte for byte.
pub fn verify_proof(leaf: &Hash32, path: &[ProofStep], root: &Hash32) -> bool {
    let computed = path.iter().fold(*leaf, |current, step| match step.side {
        Side::Right => hash_pair(&current, &step.sibling),
        Side::Left => hash_pair(&step.sibling, &current),
    });
    &computed == root
}

/// Decode a 64-char hex digest.
pub fn decode_hash(hex_str: &str) -> Option<Hash32> {
    let bytes = hex::decode(hex_str).ok()?;
    bytes.try_into().ok()
}

/// Leaves for `records`: each signature decoded from hex.
///
/// Fails with `InvalidRecordField` on a signature that is not 64 hex chars.
pub fn leaf_hashes(records: &[AuditRecord]) -> BastionResult<Vec<Hash32>> {
    records
        .iter()
        .map(|record| {
            decode_hash(&record.signature).ok_or_else(|| BastionError::InvalidRecordField {
                field: "signature".to_string(),
                reason: format!(
                    "record '{}' signature is not a 64-char hex digest",
                    record.record_id
                ),
            })
        })
        .collect()
}

/// Seal `records` (in this order) into a new batch.
pub fn seal_batch(records: Vec<AuditRecord>) -> BastionResult<Batch> {
    let leaves = leaf_hashes(&records)?;
    let root = hex::encode(compute_root(&leaves));
    Ok(Batch::from_sealed_parts(
        Batch::new_id(),
        records,
        root,
        Utc::now(),
    ))
}

/// Check a batch that did not come straight from `seal_batch`.
///
/// Every record signature must match its content and the records must
/// reproduce `merkle_root`.
pub fn verify_batch(batch: &Batch) -> BastionResult<()> {
    for record in batch.records() {
        require_valid_signature(record)?;
    }
    let root = hex::encode(compute_root(&leaf_hashes(batch.records())?));
    if root != batch.merkle_root() {
        return Err(BastionError::InvalidRecordField {
            field: "merkle_root".to_string(),
            reason: format!(
                "batch '{}' records do not reproduce its root",
                batch.batch_id()
            ),
        });
    }
    Ok(())
}

/// Inclusion proof for `record_id` within `batch`, or `None` when the record
/// is not part of it.
pub fn prove_record(batch: &Batch, record_id: &str) -> Option<InclusionProof> {
    let index = batch
        .records()
        .iter()
        .position(|r| r.record_id == record_id)?;
    let leaves = leaf_hashes(batch.records()).ok()?;
    let path = compute_proof(index, &leaves)?;

    Some(InclusionProof {
        record_id: record_id.to_string(),
        record_signature: batch.records()[index].signature.clone(),
        path,
        merkle_root: batch.merkle_root().to_string(),
        batch_id: batch.batch_id().to_string(),
        anchor_reference: None,
    })
}

/// Check a self-contained proof. Undecodable hex is simply invalid.
pub fn verify_inclusion(proof: &InclusionProof) -> bool {
    match (
        decode_hash(&proof.record_signature),
        decode_hash(&proof.merkle_root),
    ) {
        (Some(leaf), Some(root)) => verify_proof(&leaf, &proof.path, &root),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: usize) -> Vec<Hash32> {
        (0..n)
            .map(|i| Sha256::digest(format!("leaf-{i}").as_bytes()).into())
            .collect()
    }

    #[test]
    fn empty_root_is_hash_of_nothing() {
        assert_eq!(
            hex::encode(compute_root(&[])),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn single_leaf_is_its_own_root() {
        let l = leaves(1);
        assert_eq!(compute_root(&l), l[0]);
        assert_eq!(compute_proof(0, &l), Some(vec![]));
        assert!(verify_proof(&l[0], &[], &l[0]));
    }

    #[test]
    fn odd_level_duplicates_last_node() {
        let l = leaves(3);
        let expected = hash_pair(&hash_pair(&l[0], &l[1]), &hash_pair(&l[2], &l[2]));
        assert_eq!(compute_root(&l), expected);

        let proof = compute_proof(2, &l).unwrap();
        assert_eq!(proof[0], ProofStep { sibling: l[2], side: Side::Right });
        assert_eq!(proof[1].side, Side::Left);
    }

    #[test]
    fn every_proof_verifies() {
        for n in [1, 2, 3, 4, 5, 7, 8, 9, 13, 16, 31, 64, 97, 100, 997] {
            let l = leaves(n);
            let root = compute_root(&l);
            for (i, leaf) in l.iter().enumerate() {
                let proof = compute_proof(i, &l).unwrap();
                assert!(verify_proof(leaf, &proof, &root), "n={n} i={i}");
            }
        }
    }

    #[test]
    fn proof_length_is_logarithmic() {
        let l = leaves(997);
        // ceil(log2(997)) = 10
        assert_eq!(compute_proof(500, &l).unwrap().len(), 10);
    }

    #[test]
    fn tampered_proofs_rejected() {
        let l = leaves(13);
        let root = compute_root(&l);
        let proof = compute_proof(6, &l).unwrap();

        let mut bad_root = root;
        bad_root[0] ^= 0x80;
        assert!(!verify_proof(&l[6], &proof, &bad_root));

        for step in 0..proof.len() {
            let mut bad = proof.clone();
            bad[step].sibling[31] ^= 0x01;
            assert!(!verify_proof(&l[6], &bad, &root), "step {step}");
        }

        let mut flipped = proof.clone();
        flipped[0].side = match flipped[0].side {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        };
        assert!(!verify_proof(&l[6], &flipped, &root));

        assert!(!verify_proof(&l[7], &proof, &root));
    }

    #[test]
    fn out_of_range_index_has_no_proof() {
        assert_eq!(compute_proof(5, &leaves(5)), None);
        assert_eq!(compute_proof(0, &[]), None);
    }

    #[test]
    fn root_is_order_dependent() {
        let mut l = leaves(4);
        let root = compute_root(&l);
        l.swap(0, 1);
        assert_ne!(compute_root(&l), root);
    }

    #[test]
    fn decode_hash_rejects_bad_input() {
        assert!(decode_hash(&"ab".repeat(32)).is_some());
        assert!(decode_hash("abcd").is_none());
        assert!(decode_hash(&"zz".repeat(32)).is_none());
    }
}
