//! SHA-256 Merkle tree over byte chunks
//!
//! Nodes live in a flat arena and reference each other by index; build,
//! proof generation and validation are all iterative, so tree depth never
//! touches the call stack.
//!
//! Leaves hash `0x00 || chunk`, interior nodes hash `0x01 || left || right`.
//! An odd node at the end of a level is promoted unchanged.

use sha2::{Digest, Sha256};

pub type Digest32 = [u8; 32];

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    hash: Digest32,
    parent: Option<usize>,
    left: Option<usize>,
    right: Option<usize>,
}

/// One sibling on the path from a leaf to the root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofStep {
    pub sibling: Digest32,
    /// Whether the sibling sits to the left of the running hash
    pub sibling_is_left: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MerkleTree {
    nodes: Vec<Node>,
    leaf_count: usize,
    root: Option<usize>,
}

pub fn hash_leaf(chunk: &[u8]) -> Digest32 {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(chunk);
    hasher.finalize().into()
}

pub fn hash_node(left: &Digest32, right: &Digest32) -> Digest32 {
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

impl MerkleTree {
    /// Build a tree from leaf chunks. Leaves occupy arena slots `0..n`.
    pub fn build<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        let mut nodes: Vec<Node> = chunks
            .into_iter()
            .map(|chunk| Node {
                hash: hash_leaf(chunk.as_ref()),
                parent: None,
                left: None,
                right: None,
            })
            .collect();
        let leaf_count = nodes.len();
        if leaf_count == 0 {
            return MerkleTree::default();
        }

        let mut level: Vec<usize> = (0..leaf_count).collect();
        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            for pair in level.chunks(2) {
                match *pair {
                    [left, right] => {
                        let id = nodes.len();
                        let hash = hash_node(&nodes[left].hash, &nodes[right].hash);
                        nodes.push(Node {
                            hash,
                            parent: None,
                            left: Some(left),
                            right: Some(right),
                        });
                        nodes[left].parent = Some(id);
                        nodes[right].parent = Some(id);
                        next.push(id);
                    }
                    [odd] => next.push(odd),
                    _ => unreachable!("chunks(2) yields one or two items"),
                }
            }
            level = next;
        }

        MerkleTree {
            nodes,
            leaf_count,
            root: level.first().copied(),
        }
    }

    pub fn root(&self) -> Option<Digest32> {
        self.root.map(|id| self.nodes[id].hash)
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    pub fn leaf_hash(&self, index: usize) -> Option<Digest32> {
        (index < self.leaf_count).then(|| self.nodes[index].hash)
    }

    /// Sibling path from leaf `index` up to the root
    pub fn proof(&self, index: usize) -> Option<Vec<ProofStep>> {
        if index >= self.leaf_count {
            return None;
        }

        let mut steps = Vec::new();
        let mut current = index;
        while let Some(parent) = self.nodes[current].parent {
            let node = &self.nodes[parent];
            let (sibling, sibling_is_left) = if node.left == Some(current) {
                (node.right?, false)
            } else {
                (node.left?, true)
            };
            steps.push(ProofStep {
                sibling: self.nodes[sibling].hash,
                sibling_is_left,
            });
            current = parent;
        }
        Some(steps)
    }

    /// Fold a proof over a leaf chunk and compare against `root`
    pub fn verify_proof(chunk: &[u8], proof: &[ProofStep], root: &Digest32) -> bool {
        let hash = proof.iter().fold(hash_leaf(chunk), |acc, step| {
            if step.sibling_is_left {
                hash_node(&step.sibling, &acc)
            } else {
                hash_node(&acc, &step.sibling)
            }
        });
        &hash == root
    }

    /// Recompute every interior hash from its children
    pub fn validate(&self) -> bool {
        let Some(root) = self.root else {
            return self.nodes.is_empty();
        };

        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            match (node.left, node.right) {
                (None, None) => {}
                (Some(left), Some(right)) => {
                    if hash_node(&self.nodes[left].hash, &self.nodes[right].hash) != node.hash {
                        return false;
                    }
                    stack.push(left);
                    stack.push(right);
                }
                _ => return false,
            }
        }
        true
    }

    /// Longest root-to-leaf edge count
    pub fn depth(&self) -> usize {
        let Some(root) = self.root else {
            return 0;
        };

        let mut max = 0;
        let mut stack = vec![(root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let node = &self.nodes[id];
            max = max.max(depth);
            stack.extend(node.left.map(|l| (l, depth + 1)));
            stack.extend(node.right.map(|r| (r, depth + 1)));
        }
        max
    }
}
