//! Square board geometry and cell storage

use serde::{Deserialize, Serialize};

/// Board width and height in cells
pub const BOARD_SIZE: usize = 20;

/// Number of seats (and colors) in a session
pub const SEAT_COUNT: usize = 4;

/// Empty cell marker
pub const EMPTY: u8 = 0;

/// Edge-adjacent offsets (dx, dy)
pub const ORTHOGONAL: [(i8, i8); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// Corner-adjacent offsets (dx, dy)
pub const DIAGONAL: [(i8, i8); 4] = [(-1, -1), (1, -1), (1, 1), (-1, 1)];

/// Board coordinates, `x` is the column and `y` the row
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub x: i8,
    pub y: i8,
}

impl Pos {
    pub const fn new(x: i8, y: i8) -> Self {
        Self { x, y }
    }

    /// Check if this position is on the board
    pub fn is_valid(&self) -> bool {
        self.x >= 0 && self.y >= 0 && (self.x as usize) < BOARD_SIZE && (self.y as usize) < BOARD_SIZE
    }

    /// Position shifted by an offset; saturates, so off-board stays off-board
    pub fn offset(&self, dx: i8, dy: i8) -> Pos {
        Pos::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }

    /// Manhattan distance between two positions
    pub fn manhattan(&self, other: Pos) -> i32 {
        (self.x as i32 - other.x as i32).abs() + (self.y as i32 - other.y as i32).abs()
    }

    /// Euclidean distance from the board's geometric center
    pub fn distance_to_center(&self) -> f32 {
        let c = (BOARD_SIZE as f32 - 1.0) / 2.0;
        let dx = self.x as f32 - c;
        let dy = self.y as f32 - c;
        (dx * dx + dy * dy).sqrt()
    }

    /// Edge-adjacent neighbors that lie on the board
    pub fn orthogonal_neighbors(&self) -> impl Iterator<Item = Pos> + '_ {
        ORTHOGONAL
            .iter()
            .map(move |&(dx, dy)| self.offset(dx, dy))
            .filter(Pos::is_valid)
    }

    /// Corner-adjacent neighbors that lie on the board
    pub fn diagonal_neighbors(&self) -> impl Iterator<Item = Pos> + '_ {
        DIAGONAL
            .iter()
            .map(move |&(dx, dy)| self.offset(dx, dy))
            .filter(Pos::is_valid)
    }
}

/// Starting corner for a color index (1-4)
pub fn starting_corner(color: u8) -> Pos {
    let far = (BOARD_SIZE - 1) as i8;
    match color {
        1 => Pos::new(0, 0),
        2 => Pos::new(far, 0),
        3 => Pos::new(0, far),
        _ => Pos::new(far, far),
    }
}

/// All four starting corners
pub fn starting_corners() -> [Pos; SEAT_COUNT] {
    [
        starting_corner(1),
        starting_corner(2),
        starting_corner(3),
        starting_corner(4),
    ]
}

/// A single cell write produced by a move or an effect
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellDelta {
    pub pos: Pos,
    pub color: u8,
}

/// Fixed 20x20 grid; 0 is empty, 1-4 the owning color
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    cells: [[u8; BOARD_SIZE]; BOARD_SIZE],
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Self {
            cells: [[EMPTY; BOARD_SIZE]; BOARD_SIZE],
        }
    }

    /// Cell value, `None` when off the board
    pub fn get(&self, pos: Pos) -> Option<u8> {
        if pos.is_valid() {
            Some(self.cells[pos.y as usize][pos.x as usize])
        } else {
            None
        }
    }

    /// Whether the cell is on the board and empty
    pub fn is_empty(&self, pos: Pos) -> bool {
        self.get(pos) == Some(EMPTY)
    }

    /// Whether the cell is on the board and holds `color`
    pub fn is_color(&self, pos: Pos, color: u8) -> bool {
        self.get(pos) == Some(color)
    }

    pub fn set(&mut self, pos: Pos, value: u8) {
        if pos.is_valid() {
            self.cells[pos.y as usize][pos.x as usize] = value;
        }
    }

    /// Write every delta's color
    pub fn apply(&mut self, deltas: &[CellDelta]) {
        for delta in deltas {
            self.set(delta.pos, delta.color);
        }
    }

    /// Clear every delta's cell back to empty
    pub fn revert(&mut self, deltas: &[CellDelta]) {
        for delta in deltas {
            self.set(delta.pos, EMPTY);
        }
    }

    /// Number of cells owned by `color`
    pub fn count(&self, color: u8) -> usize {
        self.cells
            .iter()
            .flat_map(|row| row.iter())
            .filter(|&&c| c == color)
            .count()
    }

    /// Iterate all positions row by row
    pub fn positions() -> impl Iterator<Item = Pos> {
        (0..BOARD_SIZE as i8).flat_map(|y| (0..BOARD_SIZE as i8).map(move |x| Pos::new(x, y)))
    }

    /// Raw rows, for rendering
    pub fn rows(&self) -> &[[u8; BOARD_SIZE]; BOARD_SIZE] {
        &self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_saturates_at_extremes() {
        assert_eq!(Pos::new(127, 0).offset(2, 1), Pos::new(127, 1));
        assert_eq!(Pos::new(-128, 3).offset(-1, 0), Pos::new(-128, 3));
        assert!(!Pos::new(126, 0).offset(1, 0).is_valid());
        assert_eq!(Pos::new(4, 4).offset(-1, 1), Pos::new(3, 5));
    }

    #[test]
    fn test_pos_validity() {
        assert!(Pos::new(0, 0).is_valid());
        assert!(Pos::new(19, 19).is_valid());
        assert!(!Pos::new(20, 0).is_valid());
        assert!(!Pos::new(-1, 5).is_valid());
    }

    #[test]
    fn test_corners() {
        assert_eq!(starting_corner(1), Pos::new(0, 0));
        assert_eq!(starting_corner(2), Pos::new(19, 0));
        assert_eq!(starting_corner(3), Pos::new(0, 19));
        assert_eq!(starting_corner(4), Pos::new(19, 19));
    }

    #[test]
    fn test_apply_and_revert() {
        let mut board = Board::new();
        let deltas = vec![
            CellDelta { pos: Pos::new(3, 4), color: 2 },
            CellDelta { pos: Pos::new(4, 4), color: 2 },
        ];
        board.apply(&deltas);
        assert_eq!(board.count(2), 2);
        assert_eq!(board.get(Pos::new(4, 4)), Some(2));
        board.revert(&deltas);
        assert_eq!(board, Board::new());
    }

    #[test]
    fn test_neighbors_clip_to_board() {
        assert_eq!(Pos::new(0, 0).orthogonal_neighbors().count(), 2);
        assert_eq!(Pos::new(0, 0).diagonal_neighbors().count(), 1);
        assert_eq!(Pos::new(5, 5).diagonal_neighbors().count(), 4);
    }
}
