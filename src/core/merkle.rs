// Merkle tree commitment over transaction digests

use crate::core::{Digest, sha256_pair};

/// Fold an ordered list of digests into a single root.
///
/// Adjacent digests are paired left to right and each pair is hashed with
/// SHA256 over the 64-byte concatenation. A level with an odd count pairs
/// its last digest with itself. An empty list yields the all-zero digest.
pub fn merkle_root(leaves: &[Digest]) -> Digest {
    if leaves.is_empty() {
        return Digest::zero();
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                sha256_pair(left, right)
            })
            .collect();
    }

    level[0]
}
