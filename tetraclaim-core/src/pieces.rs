//! Polyomino piece catalog and shape transforms

use serde::{Deserialize, Serialize};

/// Occupancy matrix, rows top to bottom; 1 marks an occupied cell
pub type Shape = Vec<Vec<u8>>;

/// Largest piece that stays playable under a big-piece ban
pub const SMALL_PIECE_MAX_CELLS: u8 = 4;

/// Static piece shape definition
#[derive(Clone, Debug)]
pub struct PieceKind {
    pub id: &'static str,
    pub name: &'static str,
    pub rows: &'static [&'static [u8]],
}

impl PieceKind {
    const fn new(id: &'static str, name: &'static str, rows: &'static [&'static [u8]]) -> Self {
        Self { id, name, rows }
    }

    /// Owned copy of the occupancy matrix
    pub fn shape(&self) -> Shape {
        self.rows.iter().map(|row| row.to_vec()).collect()
    }

    /// Number of occupied cells (the piece-type rank)
    pub fn size(&self) -> u8 {
        self.rows
            .iter()
            .flat_map(|row| row.iter())
            .filter(|&&c| c != 0)
            .count() as u8
    }
}

/// All 21 piece kinds each seat receives
pub static PIECE_KINDS: [PieceKind; 21] = [
    // Size 1-3
    PieceKind::new("I1", "Monomino", &[&[1]]),
    PieceKind::new("I2", "Domino", &[&[1, 1]]),
    PieceKind::new("I3", "Straight Tromino", &[&[1, 1, 1]]),
    PieceKind::new("L3", "Corner Tromino", &[&[1, 0], &[1, 1]]),
    // Size 4
    PieceKind::new("I4", "Straight Tetromino", &[&[1, 1, 1, 1]]),
    PieceKind::new("L4", "L Tetromino", &[&[1, 0], &[1, 0], &[1, 1]]),
    PieceKind::new("T4", "T Tetromino", &[&[1, 1, 1], &[0, 1, 0]]),
    PieceKind::new("O4", "Square Tetromino", &[&[1, 1], &[1, 1]]),
    PieceKind::new("Z4", "Skew Tetromino", &[&[1, 1, 0], &[0, 1, 1]]),
    // Size 5
    PieceKind::new("F5", "F Pentomino", &[&[0, 1, 1], &[1, 1, 0], &[0, 1, 0]]),
    PieceKind::new("I5", "I Pentomino", &[&[1, 1, 1, 1, 1]]),
    PieceKind::new("L5", "L Pentomino", &[&[1, 0], &[1, 0], &[1, 0], &[1, 1]]),
    PieceKind::new("N5", "N Pentomino", &[&[0, 1], &[1, 1], &[1, 0], &[1, 0]]),
    PieceKind::new("P5", "P Pentomino", &[&[1, 1], &[1, 1], &[1, 0]]),
    PieceKind::new("T5", "T Pentomino", &[&[1, 1, 1], &[0, 1, 0], &[0, 1, 0]]),
    PieceKind::new("U5", "U Pentomino", &[&[1, 0, 1], &[1, 1, 1]]),
    PieceKind::new("V5", "V Pentomino", &[&[1, 0, 0], &[1, 0, 0], &[1, 1, 1]]),
    PieceKind::new("W5", "W Pentomino", &[&[1, 0, 0], &[1, 1, 0], &[0, 1, 1]]),
    PieceKind::new("X5", "X Pentomino", &[&[0, 1, 0], &[1, 1, 1], &[0, 1, 0]]),
    PieceKind::new("Y5", "Y Pentomino", &[&[0, 1], &[1, 1], &[0, 1], &[0, 1]]),
    PieceKind::new("Z5", "Z Pentomino", &[&[1, 1, 0], &[0, 1, 0], &[0, 1, 1]]),
];

/// Look up a piece kind by id
pub fn piece_kind(id: &str) -> Option<&'static PieceKind> {
    PIECE_KINDS.iter().find(|k| k.id == id)
}

/// A seat's copy of a piece
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub id: String,
    pub size: u8,
    pub shape: Shape,
    pub color: u8,
    pub used: bool,
}

impl Piece {
    pub fn from_kind(kind: &PieceKind, color: u8) -> Self {
        Self {
            id: kind.id.to_string(),
            size: kind.size(),
            shape: kind.shape(),
            color,
            used: false,
        }
    }

    /// Whether `shape` is one of this piece's rotations/reflections
    pub fn accepts_shape(&self, shape: &Shape) -> bool {
        let normalized = normalize(shape);
        unique_transforms(&self.shape).iter().any(|t| *t == normalized)
    }
}

/// Fresh, unused catalog for one color
pub fn player_catalog(color: u8) -> Vec<Piece> {
    PIECE_KINDS.iter().map(|k| Piece::from_kind(k, color)).collect()
}

// ============================================================================
// SHAPE TRANSFORMS
// ============================================================================

/// Occupied cells as (dx, dy) offsets from the matrix origin
pub fn shape_cells(shape: &Shape) -> Vec<(i8, i8)> {
    let mut cells = Vec::new();
    for (dy, row) in shape.iter().enumerate() {
        for (dx, &c) in row.iter().enumerate() {
            if c != 0 {
                cells.push((dx as i8, dy as i8));
            }
        }
    }
    cells
}

/// Number of occupied cells
pub fn cell_count(shape: &Shape) -> usize {
    shape.iter().flat_map(|row| row.iter()).filter(|&&c| c != 0).count()
}

/// Rotate 90 degrees clockwise
pub fn rotate(shape: &Shape) -> Shape {
    let h = shape.len();
    let w = shape.first().map_or(0, |r| r.len());
    (0..w)
        .map(|r| (0..h).map(|c| shape[h - 1 - c][r]).collect())
        .collect()
}

/// Mirror left to right
pub fn reflect(shape: &Shape) -> Shape {
    shape
        .iter()
        .map(|row| row.iter().rev().copied().collect())
        .collect()
}

/// Strip empty border rows/columns and coerce cells to 0/1
pub fn normalize(shape: &Shape) -> Shape {
    let cells = shape_cells(shape);
    if cells.is_empty() {
        return Vec::new();
    }
    let min_x = cells.iter().map(|c| c.0).min().unwrap_or(0);
    let min_y = cells.iter().map(|c| c.1).min().unwrap_or(0);
    let max_x = cells.iter().map(|c| c.0).max().unwrap_or(0);
    let max_y = cells.iter().map(|c| c.1).max().unwrap_or(0);
    let mut out = vec![vec![0u8; (max_x - min_x + 1) as usize]; (max_y - min_y + 1) as usize];
    for (x, y) in cells {
        out[(y - min_y) as usize][(x - min_x) as usize] = 1;
    }
    out
}

/// Distinct orientations (1 to 8) under rotation and reflection
pub fn unique_transforms(shape: &Shape) -> Vec<Shape> {
    let mut out: Vec<Shape> = Vec::with_capacity(8);
    let mut current = normalize(shape);
    for _ in 0..4 {
        let mirrored = reflect(&current);
        for candidate in [current.clone(), mirrored] {
            if !out.contains(&candidate) {
                out.push(candidate);
            }
        }
        current = rotate(&current);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_totals() {
        let total: u32 = PIECE_KINDS.iter().map(|k| k.size() as u32).sum();
        assert_eq!(total, 89);
        assert_eq!(PIECE_KINDS.iter().filter(|k| k.size() == 5).count(), 12);
        assert_eq!(PIECE_KINDS.iter().filter(|k| k.size() == 4).count(), 5);
    }

    #[test]
    fn test_piece_lookup() {
        assert_eq!(piece_kind("X5").map(|k| k.size()), Some(5));
        assert!(piece_kind("Q9").is_none());
    }

    #[test]
    fn test_transform_counts() {
        let count = |id: &str| unique_transforms(&piece_kind(id).unwrap().shape()).len();
        assert_eq!(count("I1"), 1);
        assert_eq!(count("O4"), 1);
        assert_eq!(count("X5"), 1);
        assert_eq!(count("I5"), 2);
        assert_eq!(count("T4"), 4);
        assert_eq!(count("F5"), 8);
        assert_eq!(count("L5"), 8);
    }

    #[test]
    fn test_rotate_four_times_is_identity() {
        let shape = piece_kind("F5").unwrap().shape();
        let back = rotate(&rotate(&rotate(&rotate(&shape))));
        assert_eq!(back, shape);
    }

    #[test]
    fn test_accepts_shape() {
        let piece = Piece::from_kind(piece_kind("L4").unwrap(), 1);
        assert!(piece.accepts_shape(&vec![vec![1, 1, 1], vec![1, 0, 0]]));
        // Padded with an empty row still matches
        assert!(piece.accepts_shape(&vec![vec![0, 0, 0], vec![0, 0, 1], vec![1, 1, 1]]));
        assert!(!piece.accepts_shape(&vec![vec![1, 1], vec![1, 1]]));
    }
}
