//! Plain-text board rendering

use tetraclaim_core::board::EMPTY;
use tetraclaim_core::creative::{SpecialTile, TileKind};
use tetraclaim_core::Pos;

/// Glyph for an unused special tile on an empty cell
pub fn tile_glyph(kind: TileKind) -> char {
    match kind {
        TileKind::Gold => '$',
        TileKind::Purple => '?',
        TileKind::Red => '!',
        TileKind::Barrier => '#',
    }
}

/// One line per row: colors as digits, unused tiles as glyphs, empty as '.'
pub fn render_board(board: &tetraclaim_core::Board, tiles: &[SpecialTile]) -> String {
    let mut out = String::new();
    for (y, row) in board.rows().iter().enumerate() {
        for (x, &cell) in row.iter().enumerate() {
            let pos = Pos::new(x as i8, y as i8);
            let glyph = if cell != EMPTY {
                char::from(b'0' + cell)
            } else {
                tiles
                    .iter()
                    .find(|t| !t.used && t.pos == pos)
                    .map(|t| tile_glyph(t.kind))
                    .unwrap_or('.')
            };
            out.push(glyph);
            out.push(' ');
        }
        out.pop();
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tetraclaim_core::{Board, BOARD_SIZE};

    #[test]
    fn test_render_empty_board() {
        let text = render_board(&Board::new(), &[]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), BOARD_SIZE);
        assert_eq!(lines[0].len(), BOARD_SIZE * 2 - 1);
        assert!(lines.iter().all(|l| l.chars().all(|c| c == '.' || c == ' ')));
    }

    #[test]
    fn test_render_colors_and_tiles() {
        let mut board = Board::new();
        board.set(Pos::new(0, 0), 1);
        board.set(Pos::new(19, 19), 4);
        let tiles = [
            SpecialTile { pos: Pos::new(5, 5), kind: TileKind::Barrier, used: false },
            SpecialTile { pos: Pos::new(6, 5), kind: TileKind::Gold, used: true },
        ];
        let text = render_board(&board, &tiles);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with('1'));
        assert!(lines[19].ends_with('4'));
        assert_eq!(lines[5].chars().nth(10), Some('#'));
        assert_eq!(lines[5].chars().nth(12), Some('.'));
    }
}
