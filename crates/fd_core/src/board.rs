//! Board geometry: bounds, base, spawn edge, terrain and growth.
//!
//! The board only grows. When a placement needs room near (or beyond) an
//! edge, [`BoardState::planned_expansion`] computes per-side insets rounded up
//! to the growth step, and [`BoardState::apply_expansion`] shifts every
//! positional field by the left/top insets so existing content keeps its
//! relative layout.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::components::GridPosition;
use crate::data::BoardDef;

/// How and when the board grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardGrowthPolicy {
    /// Maximum width in cells.
    pub max_width: u32,
    /// Maximum height in cells.
    pub max_height: u32,
    /// Placements closer than this to an edge trigger growth.
    pub trigger_margin: u32,
    /// Growth granularity per side.
    pub step: u32,
}

impl Default for BoardGrowthPolicy {
    fn default() -> Self {
        Self {
            max_width: 512,
            max_height: 512,
            trigger_margin: 8,
            step: 16,
        }
    }
}

/// Cells added on each side by a growth step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct ExpansionInsets {
    /// Columns added on the west side.
    pub left: u32,
    /// Rows added on the north side.
    pub top: u32,
    /// Columns added on the east side.
    pub right: u32,
    /// Rows added on the south side.
    pub bottom: u32,
}

impl ExpansionInsets {
    /// Whether the insets change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.left == 0 && self.top == 0 && self.right == 0 && self.bottom == 0
    }

    /// Offset applied to existing positions.
    #[must_use]
    pub const fn shift(&self) -> (i32, i32) {
        (self.left as i32, self.top as i32)
    }
}

/// Board bounds and static terrain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoardState {
    /// Width in cells.
    pub width: u32,
    /// Height in cells.
    pub height: u32,
    /// HQ anchor and enemy goal.
    pub base: GridPosition,
    /// Column enemies spawn on.
    pub spawn_edge_x: i32,
    /// First spawn row.
    pub spawn_y_min: i32,
    /// Last spawn row.
    pub spawn_y_max: i32,
    /// Terrain-blocked cells (z = 0).
    pub blocked: BTreeSet<GridPosition>,
    /// Cells no structure may occupy (z = 0).
    pub restricted: BTreeSet<GridPosition>,
    /// Elevation keyed by ground cell.
    pub ramps: BTreeMap<GridPosition, i32>,
}

impl BoardState {
    /// Open board with the given geometry and no terrain.
    #[must_use]
    pub fn new(width: u32, height: u32, base: GridPosition, spawn_edge_x: i32, spawn_y: (i32, i32)) -> Self {
        Self {
            width,
            height,
            base: base.flattened(),
            spawn_edge_x,
            spawn_y_min: spawn_y.0,
            spawn_y_max: spawn_y.1,
            blocked: BTreeSet::new(),
            restricted: BTreeSet::new(),
            ramps: BTreeMap::new(),
        }
    }

    /// Build from a content layout.
    #[must_use]
    pub fn from_def(def: &BoardDef) -> Self {
        let cell = |&(x, y): &(i32, i32)| GridPosition::new(x, y);
        let mut board = Self::new(
            def.width,
            def.height,
            GridPosition::new(def.base.0, def.base.1),
            def.spawn_edge_x,
            (def.spawn_y_min, def.spawn_y_max),
        );
        board.blocked = def.blocked.iter().map(cell).collect();
        board.restricted = def.restricted.iter().map(cell).collect();
        board.ramps = def
            .ramps
            .iter()
            .map(|ramp| (GridPosition::new(ramp.x, ramp.y), ramp.elevation))
            .collect();
        // The goal and the spawn column must stay open.
        board.blocked.remove(&board.base);
        for y in board.spawn_y_min..=board.spawn_y_max {
            board.blocked.remove(&GridPosition::new(board.spawn_edge_x, y));
        }
        board
    }

    /// Whether `(x, y)` lies on the board.
    #[must_use]
    pub fn contains(&self, cell: GridPosition) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as u32) < self.width && (cell.y as u32) < self.height
    }

    /// Whether terrain blocks `(x, y)`.
    #[must_use]
    pub fn is_blocked(&self, cell: GridPosition) -> bool {
        self.blocked.contains(&cell.flattened())
    }

    /// Whether structures are forbidden on `(x, y)`.
    #[must_use]
    pub fn is_restricted(&self, cell: GridPosition) -> bool {
        self.restricted.contains(&cell.flattened())
    }

    /// Add `(x, y)` to the restricted set.
    pub fn restrict(&mut self, cell: GridPosition) {
        self.restricted.insert(cell.flattened());
    }

    /// Elevation at `(x, y)`: the ramp level, else 0.
    #[must_use]
    pub fn elevation_at(&self, x: i32, y: i32) -> i32 {
        self.ramps.get(&GridPosition::new(x, y)).copied().unwrap_or(0)
    }

    /// `(x, y)` with the board elevation applied.
    #[must_use]
    pub fn elevated(&self, x: i32, y: i32) -> GridPosition {
        GridPosition::with_z(x, y, self.elevation_at(x, y))
    }

    /// Spawn cells on the spawn edge, north to south.
    #[must_use]
    pub fn spawn_cells(&self) -> Vec<GridPosition> {
        (self.spawn_y_min..=self.spawn_y_max)
            .map(|y| GridPosition::new(self.spawn_edge_x, y))
            .filter(|&cell| self.contains(cell))
            .collect()
    }

    /// Board perimeter clockwise: top row west to east, right column,
    /// bottom row east to west, left column south to north.
    #[must_use]
    pub fn spawn_positions(&self) -> Vec<GridPosition> {
        let (w, h) = (self.width as i32, self.height as i32);
        if w == 0 || h == 0 {
            return Vec::new();
        }
        let mut cells = Vec::new();
        cells.extend((0..w).map(|x| GridPosition::new(x, 0)));
        cells.extend((1..h).map(|y| GridPosition::new(w - 1, y)));
        if h > 1 {
            cells.extend((0..w - 1).rev().map(|x| GridPosition::new(x, h - 1)));
        }
        if w > 1 {
            cells.extend((1..h - 1).rev().map(|y| GridPosition::new(0, y)));
        }
        cells
    }

    /// Insets needed so every cell in `cells` keeps `trigger_margin + 1`
    /// cells of room to each edge.
    ///
    /// Returns `Some(empty)` when no growth is needed and `None` when growth
    /// would exceed the policy's maximum size.
    #[must_use]
    pub fn planned_expansion(
        &self,
        cells: &[GridPosition],
        policy: &BoardGrowthPolicy,
    ) -> Option<ExpansionInsets> {
        let Some(first) = cells.first() else {
            return Some(ExpansionInsets::default());
        };
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
        for cell in cells {
            min_x = min_x.min(cell.x);
            max_x = max_x.max(cell.x);
            min_y = min_y.min(cell.y);
            max_y = max_y.max(cell.y);
        }

        let margin = i64::from(policy.trigger_margin) + 1;
        let step = i64::from(policy.step.max(1));
        let inset = |distance: i64| -> u32 {
            let needed = (margin - distance).max(0);
            let rounded = (needed + step - 1) / step * step;
            u32::try_from(rounded).unwrap_or(u32::MAX)
        };

        let insets = ExpansionInsets {
            left: inset(i64::from(min_x)),
            top: inset(i64::from(min_y)),
            right: inset(i64::from(self.width) - 1 - i64::from(max_x)),
            bottom: inset(i64::from(self.height) - 1 - i64::from(max_y)),
        };
        let new_width = u64::from(self.width) + u64::from(insets.left) + u64::from(insets.right);
        let new_height = u64::from(self.height) + u64::from(insets.top) + u64::from(insets.bottom);
        if new_width > u64::from(policy.max_width) || new_height > u64::from(policy.max_height) {
            return None;
        }
        Some(insets)
    }

    /// Grow the board and shift its own positional fields.
    ///
    /// Callers holding positions elsewhere (entities, patches) must shift
    /// them by [`ExpansionInsets::shift`] too.
    pub fn apply_expansion(&mut self, insets: &ExpansionInsets) {
        if insets.is_empty() {
            return;
        }
        let (dx, dy) = insets.shift();
        self.width += insets.left + insets.right;
        self.height += insets.top + insets.bottom;
        self.base = self.base.translated(dx, dy);
        self.spawn_edge_x += dx;
        self.spawn_y_min += dy;
        self.spawn_y_max += dy;
        self.blocked = self.blocked.iter().map(|c| c.translated(dx, dy)).collect();
        self.restricted = self.restricted.iter().map(|c| c.translated(dx, dy)).collect();
        self.ramps = self
            .ramps
            .iter()
            .map(|(c, level)| (c.translated(dx, dy), *level))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_board() -> BoardState {
        BoardState::new(40, 40, GridPosition::new(20, 20), 39, (18, 22))
    }

    #[test]
    fn test_starter_board_from_def() {
        let board = BoardState::from_def(&BoardDef::starter());
        assert_eq!((board.width, board.height), (96, 64));
        assert!(board.is_restricted(GridPosition::new(39, 31)));
        assert_eq!(board.elevation_at(47, 32), 1);
        assert_eq!(board.elevation_at(46, 32), 0);
        assert_eq!(board.spawn_cells().len(), 10);
    }

    #[test]
    fn test_no_expansion_in_interior() {
        let board = small_board();
        let insets = board
            .planned_expansion(&[GridPosition::new(20, 20)], &BoardGrowthPolicy::default())
            .unwrap();
        assert!(insets.is_empty());
    }

    #[test]
    fn test_expansion_rounds_to_step() {
        let board = small_board();
        let insets = board
            .planned_expansion(&[GridPosition::new(6, 1)], &BoardGrowthPolicy::default())
            .unwrap();
        assert_eq!(insets.left, 16);
        assert_eq!(insets.top, 16);
        assert_eq!(insets.right, 0);
        assert_eq!(insets.bottom, 0);
    }

    #[test]
    fn test_expansion_covers_negative_cells() {
        let board = small_board();
        let insets = board
            .planned_expansion(&[GridPosition::new(-20, 20)], &BoardGrowthPolicy::default())
            .unwrap();
        // 9 cells of margin plus 20 cells outside the board.
        assert_eq!(insets.left, 32);
    }

    #[test]
    fn test_expansion_beyond_max_is_refused() {
        let board = small_board();
        let policy = BoardGrowthPolicy {
            max_width: 48,
            ..BoardGrowthPolicy::default()
        };
        assert!(board.planned_expansion(&[GridPosition::new(1, 20)], &policy).is_none());
    }

    #[test]
    fn test_apply_expansion_shifts_everything() {
        let mut board = small_board();
        board.blocked.insert(GridPosition::new(5, 5));
        board.restrict(GridPosition::new(6, 6));
        board.ramps.insert(GridPosition::new(7, 7), 2);
        let insets = ExpansionInsets {
            left: 16,
            top: 16,
            right: 0,
            bottom: 16,
        };
        board.apply_expansion(&insets);
        assert_eq!((board.width, board.height), (56, 72));
        assert_eq!(board.base, GridPosition::new(36, 36));
        assert_eq!(board.spawn_edge_x, 55);
        assert_eq!((board.spawn_y_min, board.spawn_y_max), (34, 38));
        assert!(board.is_blocked(GridPosition::new(21, 21)));
        assert!(board.is_restricted(GridPosition::new(22, 22)));
        assert_eq!(board.elevation_at(23, 23), 2);
    }

    #[test]
    fn test_spawn_positions_clockwise_perimeter() {
        let board = BoardState::new(3, 3, GridPosition::new(1, 1), 2, (0, 2));
        let expected = vec![
            GridPosition::new(0, 0),
            GridPosition::new(1, 0),
            GridPosition::new(2, 0),
            GridPosition::new(2, 1),
            GridPosition::new(2, 2),
            GridPosition::new(1, 2),
            GridPosition::new(0, 2),
            GridPosition::new(0, 1),
        ];
        assert_eq!(board.spawn_positions(), expected);
    }
}
