//! Grid navigation: flood-fill reachability and A* over the board.
//!
//! All costs are integers and every tie is broken on `(f, g, x, y)`, so two
//! runs over the same grid always return the same path.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::components::{Direction, GridPosition};
use crate::structures::StructureType;
use crate::world::WorldState;

/// Cell types for the navigation grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellType {
    /// Open ground (cost: 1).
    #[default]
    Walkable,
    /// Terrain nothing can cross.
    Blocked,
    /// A movement-blocking structure. Impassable for reachability; enemies
    /// may path through it at a breach cost.
    Structure,
}

impl CellType {
    /// Movement cost for entering this cell. `None` when impassable.
    #[must_use]
    pub const fn movement_cost(self, breach_cost: Option<u32>) -> Option<u32> {
        match self {
            Self::Walkable => Some(1),
            Self::Blocked => None,
            Self::Structure => match breach_cost {
                Some(extra) => Some(1 + extra),
                None => None,
            },
        }
    }

    /// Whether this cell is open ground.
    #[must_use]
    pub const fn is_walkable(self) -> bool {
        matches!(self, Self::Walkable)
    }
}

/// Navigation grid, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavGrid {
    width: u32,
    height: u32,
    cells: Vec<CellType>,
}

impl NavGrid {
    /// Create a grid with every cell walkable.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let cell_count = (width as usize) * (height as usize);
        Self {
            width,
            height,
            cells: vec![CellType::Walkable; cell_count],
        }
    }

    /// Grid for the current world: terrain is blocked, movement-blocking
    /// structures are marked, HQ cells stay walkable as the goal.
    #[must_use]
    pub fn from_world(world: &WorldState) -> Self {
        let mut grid = Self::new(world.board.width, world.board.height);
        for &cell in &world.board.blocked {
            grid.set_cell(cell, CellType::Blocked);
        }
        for structure in world.entities.structures() {
            let Some(structure_type) = structure.structure_type else {
                continue;
            };
            if !structure_type.blocks_movement() || structure_type == StructureType::Hq {
                continue;
            }
            for cell in structure.covered_cells() {
                if grid.get_cell(cell) == Some(CellType::Walkable) {
                    grid.set_cell(cell, CellType::Structure);
                }
            }
        }
        grid.set_cell(world.board.base, CellType::Walkable);
        grid
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, cell: GridPosition) -> Option<usize> {
        if cell.x < 0 || cell.y < 0 || cell.x as u32 >= self.width || cell.y as u32 >= self.height {
            return None;
        }
        Some((cell.y as usize) * (self.width as usize) + (cell.x as usize))
    }

    fn position(&self, index: usize) -> GridPosition {
        let width = self.width as usize;
        GridPosition::new((index % width) as i32, (index / width) as i32)
    }

    /// Cell type at `cell`. `None` if out of bounds.
    #[must_use]
    pub fn get_cell(&self, cell: GridPosition) -> Option<CellType> {
        self.index(cell).map(|index| self.cells[index])
    }

    /// Set the cell type at `cell`. Returns `false` if out of bounds.
    pub fn set_cell(&mut self, cell: GridPosition, cell_type: CellType) -> bool {
        match self.index(cell) {
            Some(index) => {
                self.cells[index] = cell_type;
                true
            }
            None => false,
        }
    }

    /// Whether `cell` is in bounds and walkable.
    #[must_use]
    pub fn is_walkable(&self, cell: GridPosition) -> bool {
        self.get_cell(cell).is_some_and(CellType::is_walkable)
    }

    /// Flood fill from `start` over walkable cells; `true` as soon as any of
    /// `targets` is reached.
    #[must_use]
    pub fn reaches_any(&self, start: GridPosition, targets: &[GridPosition]) -> bool {
        let Some(start_index) = self.index(start) else {
            return false;
        };
        if !self.cells[start_index].is_walkable() {
            return false;
        }
        let mut wanted = vec![false; self.cells.len()];
        let mut any_target = false;
        for &target in targets {
            if let Some(index) = self.index(target) {
                wanted[index] = true;
                any_target = true;
            }
        }
        if !any_target {
            return false;
        }

        let mut visited = vec![false; self.cells.len()];
        let mut queue = VecDeque::new();
        visited[start_index] = true;
        queue.push_back(start_index);
        while let Some(index) = queue.pop_front() {
            if wanted[index] {
                return true;
            }
            let cell = self.position(index);
            for direction in Direction::ALL {
                let Some(next) = self.index(cell.neighbor(direction)) else {
                    continue;
                };
                if !visited[next] && self.cells[next].is_walkable() {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }
        false
    }
}

/// A node in the A* open set.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    f_score: u32,
    g_score: u32,
    x: i32,
    y: i32,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse for lowest (f, g, x, y) first.
        (other.f_score, other.g_score, other.x, other.y).cmp(&(self.f_score, self.g_score, self.x, self.y))
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Find a 4-neighbour path from `start` to `goal`.
///
/// With `breach_cost` set, structure cells are passable at `1 + breach_cost`.
/// The returned path excludes `start` and ends at `goal`. Returns `None`
/// when the goal is unreachable or either end is out of bounds.
#[must_use]
pub fn find_path(
    grid: &NavGrid,
    start: GridPosition,
    goal: GridPosition,
    breach_cost: Option<u32>,
) -> Option<Vec<GridPosition>> {
    let start = start.flattened();
    let goal = goal.flattened();
    let start_index = grid.index(start)?;
    let goal_index = grid.index(goal)?;
    if start_index == goal_index {
        return Some(Vec::new());
    }

    let mut g_score = vec![u32::MAX; grid.cells.len()];
    let mut came_from: Vec<Option<usize>> = vec![None; grid.cells.len()];
    let mut open_set = BinaryHeap::new();

    g_score[start_index] = 0;
    open_set.push(AStarNode {
        f_score: start.manhattan_distance(goal),
        g_score: 0,
        x: start.x,
        y: start.y,
    });

    while let Some(current) = open_set.pop() {
        let cell = GridPosition::new(current.x, current.y);
        let Some(current_index) = grid.index(cell) else {
            continue;
        };
        if current_index == goal_index {
            return Some(reconstruct_path(grid, &came_from, goal_index));
        }
        if current.g_score > g_score[current_index] {
            continue;
        }

        for direction in Direction::ALL {
            let next = cell.neighbor(direction);
            let Some(next_index) = grid.index(next) else {
                continue;
            };
            let Some(cost) = grid.cells[next_index].movement_cost(breach_cost) else {
                continue;
            };
            let tentative = current.g_score.saturating_add(cost);
            if tentative < g_score[next_index] {
                g_score[next_index] = tentative;
                came_from[next_index] = Some(current_index);
                open_set.push(AStarNode {
                    f_score: tentative.saturating_add(next.manhattan_distance(goal)),
                    g_score: tentative,
                    x: next.x,
                    y: next.y,
                });
            }
        }
    }
    None
}

fn reconstruct_path(grid: &NavGrid, came_from: &[Option<usize>], goal_index: usize) -> Vec<GridPosition> {
    let mut path = vec![grid.position(goal_index)];
    let mut current = goal_index;
    while let Some(previous) = came_from[current] {
        if came_from[previous].is_none() {
            break;
        }
        path.push(grid.position(previous));
        current = previous;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall_column(grid: &mut NavGrid, x: i32, gap: Option<i32>) {
        for y in 0..grid.height() as i32 {
            if Some(y) != gap {
                grid.set_cell(GridPosition::new(x, y), CellType::Blocked);
            }
        }
    }

    #[test]
    fn test_straight_path() {
        let grid = NavGrid::new(10, 10);
        let path = find_path(&grid, GridPosition::new(0, 0), GridPosition::new(3, 0), None).unwrap();
        assert_eq!(
            path,
            vec![GridPosition::new(1, 0), GridPosition::new(2, 0), GridPosition::new(3, 0)]
        );
    }

    #[test]
    fn test_path_through_gap() {
        let mut grid = NavGrid::new(10, 10);
        wall_column(&mut grid, 5, Some(7));
        let path = find_path(&grid, GridPosition::new(0, 7), GridPosition::new(9, 7), None).unwrap();
        assert!(path.contains(&GridPosition::new(5, 7)));
        assert_eq!(path.len(), 9);
    }

    #[test]
    fn test_no_path_when_sealed() {
        let mut grid = NavGrid::new(10, 10);
        wall_column(&mut grid, 5, None);
        assert!(find_path(&grid, GridPosition::new(0, 0), GridPosition::new(9, 9), None).is_none());
        assert!(!grid.reaches_any(GridPosition::new(0, 0), &[GridPosition::new(9, 9)]));
    }

    #[test]
    fn test_breach_cost_allows_siege_path() {
        let mut grid = NavGrid::new(10, 3);
        for y in 0..3 {
            grid.set_cell(GridPosition::new(5, y), CellType::Structure);
        }
        assert!(find_path(&grid, GridPosition::new(0, 1), GridPosition::new(9, 1), None).is_none());
        let path = find_path(&grid, GridPosition::new(0, 1), GridPosition::new(9, 1), Some(6)).unwrap();
        assert!(path.contains(&GridPosition::new(5, 1)));
    }

    #[test]
    fn test_path_is_deterministic() {
        let mut grid = NavGrid::new(16, 16);
        wall_column(&mut grid, 8, Some(3));
        let a = find_path(&grid, GridPosition::new(0, 15), GridPosition::new(15, 0), None);
        let b = find_path(&grid, GridPosition::new(0, 15), GridPosition::new(15, 0), None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_reaches_any_target() {
        let mut grid = NavGrid::new(6, 6);
        wall_column(&mut grid, 3, Some(0));
        assert!(grid.reaches_any(
            GridPosition::new(0, 5),
            &[GridPosition::new(5, 5), GridPosition::new(99, 99)]
        ));
    }
}
