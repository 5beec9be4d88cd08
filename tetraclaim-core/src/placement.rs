//! Placement legality rules
//!
//! All functions are pure over a borrowed board and safe to call from any
//! session concurrently.

use crate::board::{starting_corner, Board, CellDelta, Pos, BOARD_SIZE, EMPTY};
use crate::pieces::{shape_cells, Shape};

/// Cells covered by `shape` anchored at `origin`, `None` if any fall off the board
pub fn footprint(shape: &Shape, origin: Pos) -> Option<Vec<Pos>> {
    let mut cells = Vec::new();
    for (dx, dy) in shape_cells(shape) {
        let pos = origin.offset(dx, dy);
        if !pos.is_valid() {
            return None;
        }
        cells.push(pos);
    }
    Some(cells)
}

/// Footprint expressed as board writes for `color`
pub fn cell_deltas(shape: &Shape, origin: Pos, color: u8) -> Option<Vec<CellDelta>> {
    footprint(shape, origin).map(|cells| {
        cells
            .into_iter()
            .map(|pos| CellDelta { pos, color })
            .collect()
    })
}

/// Whether `color` has not claimed any cell yet
pub fn is_first_placement(board: &Board, color: u8) -> bool {
    board.count(color) == 0
}

/// Decide whether `shape` may be placed at `origin` for `color`
pub fn is_legal(board: &Board, shape: &Shape, origin: Pos, color: u8) -> bool {
    let Some(cells) = footprint(shape, origin) else {
        return false;
    };
    if cells.is_empty() {
        return false;
    }
    is_legal_footprint(board, &cells, color, is_first_placement(board, color))
}

/// Legality over an already computed footprint
fn is_legal_footprint(board: &Board, cells: &[Pos], color: u8, first: bool) -> bool {
    // No overlap with any color
    if cells.iter().any(|&p| board.get(p) != Some(EMPTY)) {
        return false;
    }

    // No shared edge with the same color
    let touches_edge = cells
        .iter()
        .any(|p| p.orthogonal_neighbors().any(|n| board.is_color(n, color)));
    if touches_edge {
        return false;
    }

    if first {
        let corner = starting_corner(color);
        cells.contains(&corner)
    } else {
        cells
            .iter()
            .any(|p| p.diagonal_neighbors().any(|n| board.is_color(n, color)))
    }
}

/// Every origin at which `shape` is legal for `color`, scanned row by row
pub fn legal_positions(board: &Board, shape: &Shape, color: u8) -> Vec<Pos> {
    let first = is_first_placement(board, color);
    let mut out = Vec::new();
    for y in 0..BOARD_SIZE as i8 {
        for x in 0..BOARD_SIZE as i8 {
            let origin = Pos::new(x, y);
            if let Some(cells) = footprint(shape, origin) {
                if !cells.is_empty() && is_legal_footprint(board, &cells, color, first) {
                    out.push(origin);
                }
            }
        }
    }
    out
}
