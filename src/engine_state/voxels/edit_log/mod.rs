//! # Edit Log
//!
//! The authoritative, sparse record of every block a player (local or remote)
//! has placed or removed. Procedural terrain is regenerated from seeds at will;
//! the edit log is what makes a world *this* world.
//!
//! ## Layout
//!
//! Three ordered levels keyed by coordinate:
//!
//! * `x` → splay tree of rows
//! * `z` → splay tree of columns within a row
//! * `y` → hash map of edits within a column
//!
//! The two ordered levels make rectangular `(x, z)` range scans a pair of
//! lower-bound descents followed by successor walks. Because the trees splay,
//! the area a player is working in stays near the roots.
//!
//! ## Invariants
//!
//! * At most one edit per `(x, y, z)`. Inserting again overwrites.
//! * Nothing is ever deleted. A removal is itself an edit with no block type,
//!   which is what lets it override procedural terrain.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::engine_state::voxels::block::block_type::BlockType;
use crate::error::WorldResult;

pub mod splay;

use splay::SplayTree;

/// A single block change at an integer world coordinate.
///
/// `block_type == None` records a removal (the cell is air), `Some` a placement.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockEdit {
    /// World x.
    pub x: i32,
    /// World y.
    pub y: i32,
    /// World z.
    pub z: i32,
    /// The placed block, or `None` for a removal.
    #[serde(rename = "type")]
    pub block_type: Option<BlockType>,
}

impl BlockEdit {
    /// A placement of `block_type` at `(x, y, z)`.
    pub fn place(x: i32, y: i32, z: i32, block_type: BlockType) -> Self {
        BlockEdit {
            x,
            y,
            z,
            block_type: Some(block_type),
        }
    }

    /// A removal at `(x, y, z)`.
    pub fn remove(x: i32, y: i32, z: i32) -> Self {
        BlockEdit {
            x,
            y,
            z,
            block_type: None,
        }
    }

    /// Whether this edit is a removal.
    pub fn is_removal(&self) -> bool {
        self.block_type.is_none()
    }
}

/// Edits within one `(x, z)` column, keyed by `y`.
pub type Column = HashMap<i32, BlockEdit>;

/// Columns within one `x` row, ordered by `z`.
pub type Row = SplayTree<i32, Column>;

/// Ordered sparse store of block edits.
///
/// Lookups take `&mut self` because every access restructures the splay trees.
#[derive(Debug, Clone, Default)]
pub struct EditLog {
    rows: SplayTree<i32, Row>,
    len: usize,
}

impl EditLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        EditLog::default()
    }

    /// Builds a log by replaying `edits` in order.
    pub fn from_edits<I: IntoIterator<Item = BlockEdit>>(edits: I) -> Self {
        let mut log = EditLog::new();
        log.load(edits);
        log
    }

    /// Replays persisted edits. Later entries win ties at the same coordinate.
    pub fn load<I: IntoIterator<Item = BlockEdit>>(&mut self, edits: I) {
        for edit in edits {
            self.insert(edit);
        }
    }

    /// Number of distinct coordinates with an edit.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no edit has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Upserts `edit` at its coordinate.
    pub fn insert(&mut self, edit: BlockEdit) {
        let column = self
            .rows
            .get_or_insert_with(edit.x, SplayTree::new)
            .get_or_insert_with(edit.z, HashMap::new);
        if column.insert(edit.y, edit).is_none() {
            self.len += 1;
        }
    }

    /// Exact lookup at `(x, y, z)`.
    pub fn query(&mut self, x: i32, y: i32, z: i32) -> Option<&BlockEdit> {
        self.query_column(x, z)?.get(&y)
    }

    /// All edits in the `(x, z)` column, keyed by `y`.
    pub fn query_column(&mut self, x: i32, z: i32) -> Option<&Column> {
        self.rows.get_mut(x)?.get(z)
    }

    /// The whole `x` row, ordered by `z`. Read-only: edits go through
    /// [`insert`](Self::insert).
    pub fn query_row(&mut self, x: i32) -> Option<&Row> {
        self.rows.get(x)
    }

    /// Every edit whose `(x, z)` lies in the closed rectangle
    /// `[x0, x1] × [z0, z1]`, regardless of `y`.
    ///
    /// Results are ordered by `x`, then `z`, then `y`.
    pub fn query_area(&mut self, x0: i32, x1: i32, z0: i32, z1: i32) -> Vec<BlockEdit> {
        let mut result = Vec::new();
        let mut row = self.rows.lower_bound(x0);
        while let Some(row_node) = row {
            if self.rows.key(row_node) > x1 {
                break;
            }
            let columns = self.rows.value_mut(row_node);
            let mut column = columns.lower_bound(z0);
            while let Some(column_node) = column {
                if columns.key(column_node) > z1 {
                    break;
                }
                push_sorted_column(&mut result, columns.value(column_node));
                column = columns.successor(column_node);
            }
            row = self.rows.successor(row_node);
        }
        result
    }

    /// Smallest row key strictly greater than `x`.
    pub fn next_x(&mut self, x: i32) -> Option<i32> {
        let node = self.rows.upper_bound(x)?;
        Some(self.rows.key(node))
    }

    /// Largest row key strictly less than `x`.
    pub fn prev_x(&mut self, x: i32) -> Option<i32> {
        let node = self.rows.strict_predecessor(x)?;
        Some(self.rows.key(node))
    }

    /// Smallest column key strictly greater than `z` within row `x`.
    pub fn next_z(&mut self, x: i32, z: i32) -> Option<i32> {
        let row = self.rows.get_mut(x)?;
        let node = row.upper_bound(z)?;
        Some(row.key(node))
    }

    /// Largest column key strictly less than `z` within row `x`.
    pub fn prev_z(&mut self, x: i32, z: i32) -> Option<i32> {
        let row = self.rows.get_mut(x)?;
        let node = row.strict_predecessor(z)?;
        Some(row.key(node))
    }

    /// Full ordered traversal for persistence.
    pub fn export(&self) -> Vec<BlockEdit> {
        let mut result = Vec::with_capacity(self.len);
        for (_, row) in self.rows.iter() {
            for (_, column) in row.iter() {
                push_sorted_column(&mut result, column);
            }
        }
        result
    }

    /// Serializes [`export`](Self::export) as JSON.
    pub fn to_json(&self) -> WorldResult<String> {
        Ok(serde_json::to_string(&self.export())?)
    }

    /// Rebuilds a log from its JSON persisted form.
    pub fn from_json(json: &str) -> WorldResult<Self> {
        let edits: Vec<BlockEdit> = serde_json::from_str(json)?;
        debug!("Loaded {} persisted block edits", edits.len());
        Ok(EditLog::from_edits(edits))
    }
}

fn push_sorted_column(out: &mut Vec<BlockEdit>, column: &Column) {
    let start = out.len();
    out.extend(column.values().copied());
    out[start..].sort_by_key(|edit| edit.y);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn random_edits(count: usize, seed: u64) -> Vec<BlockEdit> {
        let mut rng = fastrand::Rng::with_seed(seed);
        (0..count)
            .map(|_| {
                let x = rng.i32(-20..20);
                let y = rng.i32(-5..15);
                let z = rng.i32(-20..20);
                if rng.bool() {
                    BlockEdit::remove(x, y, z)
                } else {
                    BlockEdit::place(x, y, z, BlockType::ALL[rng.usize(..BlockType::COUNT)])
                }
            })
            .collect()
    }

    #[test]
    fn insert_is_an_upsert() {
        let mut log = EditLog::new();
        log.insert(BlockEdit::place(1, 2, 3, BlockType::STONE));
        log.insert(BlockEdit::place(1, 2, 3, BlockType::GLASS));
        assert_eq!(log.len(), 1);
        assert_eq!(
            log.query(1, 2, 3).and_then(|e| e.block_type),
            Some(BlockType::GLASS)
        );
        log.insert(BlockEdit::remove(1, 2, 3));
        assert_eq!(log.len(), 1);
        assert!(log.query(1, 2, 3).unwrap().is_removal());
    }

    #[test]
    fn absent_keys_are_not_found() {
        let mut log = EditLog::new();
        assert!(log.query(0, 0, 0).is_none());
        assert!(log.query_area(-100, 100, -100, 100).is_empty());
        log.insert(BlockEdit::remove(4, 0, 4));
        assert!(log.query(4, 1, 4).is_none());
        assert!(log.query(4, 0, 5).is_none());
        assert!(log.query(5, 0, 4).is_none());
        assert!(log.query_column(4, 4).is_some());
    }

    #[test]
    fn rows_list_their_columns_in_order() {
        let mut log = EditLog::from_edits([
            BlockEdit::remove(2, 0, 9),
            BlockEdit::remove(2, 1, -3),
            BlockEdit::remove(2, 5, -3),
            BlockEdit::remove(3, 0, 0),
        ]);
        let row = log.query_row(2).unwrap();
        let columns: Vec<(i32, usize)> = row.iter().map(|(z, column)| (z, column.len())).collect();
        assert_eq!(columns, vec![(-3, 2), (9, 1)]);
        assert!(log.query_row(7).is_none());
        assert_eq!(log.len(), 4);
    }

    #[test]
    fn area_query_returns_exactly_the_contained_edits() {
        for seed in 0..5 {
            let edits = random_edits(400, seed);
            let mut log = EditLog::from_edits(edits.clone());

            let mut latest = std::collections::HashMap::new();
            for edit in &edits {
                latest.insert((edit.x, edit.y, edit.z), *edit);
            }

            let (x0, x1, z0, z1) = (-7, 3, -2, 11);
            let got: HashSet<BlockEdit> = log.query_area(x0, x1, z0, z1).into_iter().collect();
            let expected: HashSet<BlockEdit> = latest
                .values()
                .filter(|e| x0 <= e.x && e.x <= x1 && z0 <= e.z && e.z <= z1)
                .copied()
                .collect();
            assert_eq!(got, expected, "seed {seed}");
        }
    }

    #[test]
    fn area_query_is_inclusive_on_both_bounds() {
        let mut log = EditLog::new();
        log.insert(BlockEdit::place(0, 0, 0, BlockType::DIRT));
        log.insert(BlockEdit::place(2, 9, 2, BlockType::DIRT));
        log.insert(BlockEdit::place(3, 0, 2, BlockType::DIRT));
        log.insert(BlockEdit::place(2, 0, 3, BlockType::DIRT));
        let got = log.query_area(0, 2, 0, 2);
        assert_eq!(got.len(), 2);
        assert!(log.query_area(3, 2, 0, 2).is_empty());
    }

    #[test]
    fn export_and_reload_reconstructs_the_mapping() {
        let edits = random_edits(300, 42);
        let log = EditLog::from_edits(edits);
        let exported = log.export();
        assert_eq!(exported.len(), log.len());

        let sorted = exported
            .windows(2)
            .all(|w| (w[0].x, w[0].z, w[0].y) < (w[1].x, w[1].z, w[1].y));
        assert!(sorted);

        let json = log.to_json().unwrap();
        let mut reloaded = EditLog::from_json(&json).unwrap();
        assert_eq!(reloaded.len(), log.len());
        for edit in &exported {
            assert_eq!(reloaded.query(edit.x, edit.y, edit.z), Some(edit));
        }
    }

    #[test]
    fn row_and_column_neighbours() {
        let mut log = EditLog::new();
        for (x, z) in [(0, 0), (0, 5), (0, -3), (4, 1), (-2, 2)] {
            log.insert(BlockEdit::place(x, 0, z, BlockType::BRICK));
        }
        assert_eq!(log.next_x(0), Some(4));
        assert_eq!(log.prev_x(0), Some(-2));
        assert_eq!(log.next_x(4), None);
        assert_eq!(log.next_z(0, 0), Some(5));
        assert_eq!(log.prev_z(0, 0), Some(-3));
        assert_eq!(log.prev_z(0, -3), None);
        assert_eq!(log.next_z(7, 0), None);
    }
}
