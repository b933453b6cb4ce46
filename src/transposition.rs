use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::BuildHasherDefault;
use std::mem;

use crate::movegen::Move;
use crate::search::{Value, MAX_PLY, VALUE_MATE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Exact,
    LowerBound,
    UpperBound,
}

#[derive(Debug, Clone, Copy)]
pub struct TranspositionEntry {
    pub depth: u32,
    pub score: Value,
    pub node_type: NodeType,
    pub best_move: Move,
}

// Fixed hasher: replacement order, hence search results, must not change
// between runs.
type EntryMap = HashMap<u64, TranspositionEntry, BuildHasherDefault<DefaultHasher>>;

pub struct TranspositionTable {
    table: EntryMap,
    capacity: usize,
}

/// Mate scores are stored relative to the node, not the root.
fn value_to_tt(score: Value, ply: usize) -> Value {
    if score >= VALUE_MATE - MAX_PLY {
        score + ply as Value
    } else if score <= -VALUE_MATE + MAX_PLY {
        score - ply as Value
    } else {
        score
    }
}

fn value_from_tt(score: Value, ply: usize) -> Value {
    if score >= VALUE_MATE - MAX_PLY {
        score - ply as Value
    } else if score <= -VALUE_MATE + MAX_PLY {
        score + ply as Value
    } else {
        score
    }
}

fn entries_for(megabytes: usize) -> usize {
    let per_entry = mem::size_of::<(u64, TranspositionEntry)>() * 2;
    (megabytes.max(1) * 1024 * 1024 / per_entry).max(1)
}

impl TranspositionTable {
    pub fn new(megabytes: usize) -> Self {
        let capacity = entries_for(megabytes);
        Self {
            table: EntryMap::with_capacity_and_hasher(capacity, Default::default()),
            capacity,
        }
    }

    pub fn resize(&mut self, megabytes: usize) {
        *self = Self::new(megabytes);
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permill of the table in use, as reported by `info hashfull`.
    pub fn hashfull(&self) -> usize {
        self.table.len() * 1000 / self.capacity
    }

    pub fn store(
        &mut self,
        key: u64,
        depth: u32,
        score: Value,
        node_type: NodeType,
        best_move: Move,
        ply: usize,
    ) {
        if self.table.len() >= self.capacity && !self.table.contains_key(&key) {
            // Evict an arbitrary entry when full
            if let Some(&victim) = self.table.keys().next() {
                self.table.remove(&victim);
            }
        }
        let best_move = match (best_move, self.table.get(&key)) {
            (Move::NONE, Some(old)) => old.best_move,
            (m, _) => m,
        };
        self.table.insert(
            key,
            TranspositionEntry {
                depth,
                score: value_to_tt(score, ply),
                node_type,
                best_move,
            },
        );
    }

    pub fn probe(
        &self,
        key: u64,
        depth: u32,
        alpha: Value,
        beta: Value,
        ply: usize,
    ) -> Option<Value> {
        let entry = self.table.get(&key)?;
        if entry.depth < depth {
            return None;
        }
        let score = value_from_tt(entry.score, ply);
        match entry.node_type {
            NodeType::Exact => Some(score),
            NodeType::LowerBound if score >= beta => Some(score),
            NodeType::UpperBound if score <= alpha => Some(score),
            _ => None,
        }
    }

    pub fn best_move(&self, key: u64) -> Move {
        self.table.get(&key).map_or(Move::NONE, |entry| entry.best_move)
    }
}
