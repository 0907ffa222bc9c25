//! Generalized (radix-r) Huffman code builder.
//!
//! Turns the weighted set of currently-legal operations plus an ordered key
//! alphabet into a prefix-free map from key sequence to operation. Rebuilt
//! from scratch on every dispatch; holds no state between calls.
//!
//! Merge order for equal weights is fully specified (see [`build_code_tree`])
//! so that two builds over identical inputs produce identical maps.

use crate::frequency::LegalWeightedSet;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashSet};
use std::ops::Bound;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeError {
    /// No operation is legal — a terminal stack state.
    EmptyOperationSet,
    /// Fewer than two symbols, or duplicate symbols.
    InvalidAlphabet,
}

impl std::fmt::Display for CodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodeError::EmptyOperationSet => write!(f, "no legal operations to encode"),
            CodeError::InvalidAlphabet => {
                write!(f, "alphabet must hold at least two distinct symbols")
            }
        }
    }
}

/// Node of the code tree. Leaves carry `operation: Some(..)` except for the
/// zero-weight padding leaves that complete the last branch point; internal
/// nodes carry exactly `alphabet.len()` children, lightest first.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeNode {
    pub weight: u64,
    pub operation: Option<String>,
    pub children: Vec<CodeNode>,
}

impl CodeNode {
    fn leaf(operation: &str, weight: u64) -> Self {
        Self {
            weight,
            operation: Some(operation.to_string()),
            children: Vec::new(),
        }
    }

    fn padding() -> Self {
        Self {
            weight: 0,
            operation: None,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeEntry {
    pub operation: String,
    pub weight: u64,
}

/// Prefix-free map from key sequence to operation. Entries live in a
/// `BTreeMap` so iteration order — and therefore any rendering of the map —
/// is identical across rebuilds from identical inputs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CodeMap {
    entries: BTreeMap<String, CodeEntry>,
}

impl CodeMap {
    pub fn get(&self, key: &str) -> Option<&CodeEntry> {
        self.entries.get(key)
    }

    /// Does any key start with `buf`? Keys sharing a prefix are contiguous in
    /// the BTreeMap's order, so inspecting the first key at or after `buf`
    /// answers the question.
    pub fn has_prefix(&self, buf: &str) -> bool {
        self.entries
            .range::<str, _>((Bound::Included(buf), Bound::Unbounded))
            .next()
            .is_some_and(|(key, _)| key.starts_with(buf))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CodeEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// `ceil((n - 1) / (r - 1))`: merges needed to reduce n leaves to one root.
pub fn branch_points(n: usize, r: usize) -> usize {
    if n == 0 {
        return 0;
    }
    (n - 1).div_ceil(r - 1)
}

/// Zero-weight leaves required to make the node count collapse to exactly one
/// root under r-way merges. Always in `[0, r - 2]`.
pub fn padding_leaves(n: usize, r: usize) -> usize {
    1 + (r - 1) * branch_points(n, r) - n
}

// Secondary ordering for equal-weight heap nodes: padding leaves merge first,
// then operation leaves by name, then previously-merged nodes in creation
// order. The derived enum Ord gives exactly that ranking.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum TieKey {
    Padding(usize),
    Operation(String),
    Merged(usize),
}

struct HeapEntry {
    weight: u64,
    tie: TieKey,
    node: CodeNode,
}

impl HeapEntry {
    fn key(&self) -> (u64, &TieKey) {
        (self.weight, &self.tie)
    }
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

fn check_alphabet(alphabet: &[char]) -> Result<(), CodeError> {
    if alphabet.len() < 2 {
        return Err(CodeError::InvalidAlphabet);
    }
    let distinct: HashSet<char> = alphabet.iter().copied().collect();
    if distinct.len() != alphabet.len() {
        return Err(CodeError::InvalidAlphabet);
    }
    Ok(())
}

/// Build the complete r-ary code tree over the weighted set.
///
/// Merge rule: repeatedly remove the `min(r, remaining)` smallest nodes in
/// ascending `(weight, tie)` order and fuse them into an internal node whose
/// children keep that removal order. With the padding leaves added up front,
/// every merge is a full r-way branch point and exactly one root remains.
pub fn build_code_tree(
    weights: &LegalWeightedSet,
    alphabet: &[char],
) -> Result<CodeNode, CodeError> {
    if weights.is_empty() {
        return Err(CodeError::EmptyOperationSet);
    }
    check_alphabet(alphabet)?;

    let r = alphabet.len();
    let n = weights.len();

    let mut heap: BinaryHeap<Reverse<HeapEntry>> = BinaryHeap::with_capacity(n + r);
    for (name, &weight) in weights {
        heap.push(Reverse(HeapEntry {
            weight,
            tie: TieKey::Operation(name.clone()),
            node: CodeNode::leaf(name, weight),
        }));
    }
    for i in 0..padding_leaves(n, r) {
        heap.push(Reverse(HeapEntry {
            weight: 0,
            tie: TieKey::Padding(i),
            node: CodeNode::padding(),
        }));
    }

    let mut merged_seq = 0usize;
    while heap.len() > 1 {
        let group = heap.len().min(r);
        let mut weight = 0u64;
        let mut children = Vec::with_capacity(group);
        for _ in 0..group {
            let Some(Reverse(entry)) = heap.pop() else {
                break;
            };
            weight += entry.weight;
            children.push(entry.node);
        }
        heap.push(Reverse(HeapEntry {
            weight,
            tie: TieKey::Merged(merged_seq),
            node: CodeNode {
                weight,
                operation: None,
                children,
            },
        }));
        merged_seq += 1;
    }

    let Some(Reverse(root)) = heap.pop() else {
        return Err(CodeError::EmptyOperationSet);
    };
    let mut root = root.node;

    // Degenerate n = 1: no merge happened and the root is the lone leaf,
    // which would receive the empty key sequence. Root it under one branch
    // point so every operation costs at least one key press.
    if root.operation.is_some() {
        let mut children: Vec<CodeNode> = (1..alphabet.len()).map(|_| CodeNode::padding()).collect();
        let weight = root.weight;
        children.push(root);
        root = CodeNode {
            weight,
            operation: None,
            children,
        };
    }

    Ok(root)
}

/// Walk the tree into the prefix-free map. Symbols assign in reverse alphabet
/// order: within each branch point the child removed first (lightest) takes
/// the last symbol and the child removed last (heaviest) takes the first,
/// so the most-preferred symbol always leads to the heaviest subtree.
pub fn encoding_map(root: &CodeNode, alphabet: &[char]) -> CodeMap {
    let reversed: Vec<char> = alphabet.iter().rev().copied().collect();
    let mut entries = BTreeMap::new();
    let mut path = String::new();
    walk(root, &reversed, &mut path, &mut entries);
    CodeMap { entries }
}

fn walk(
    node: &CodeNode,
    reversed: &[char],
    path: &mut String,
    entries: &mut BTreeMap<String, CodeEntry>,
) {
    if let Some(operation) = &node.operation {
        if !path.is_empty() {
            entries.insert(
                path.clone(),
                CodeEntry {
                    operation: operation.clone(),
                    weight: node.weight,
                },
            );
        }
        return;
    }
    for (i, child) in node.children.iter().enumerate() {
        let Some(&symbol) = reversed.get(i) else {
            break;
        };
        path.push(symbol);
        walk(child, reversed, path, entries);
        path.pop();
    }
}

/// Validate, build the tree, emit the map.
pub fn build_code_map(
    weights: &LegalWeightedSet,
    alphabet: &[char],
) -> Result<CodeMap, CodeError> {
    let root = build_code_tree(weights, alphabet)?;
    Ok(encoding_map(&root, alphabet))
}
