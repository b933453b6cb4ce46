use std::fmt::Write as _;

use crate::board::{file_of, rank_of, square_bb, Bitboard, Color, Piece, Position, Square, Squares};
use crate::movegen::{bishop_attacks, king_attacks, knight_attacks, pawn_attacks, rook_attacks};
use crate::search::Value;

// Piece-square tables as seen from white, a8 first.
#[rustfmt::skip]
const PAWN_TABLE: [i32; 64] = [
     0,  0,   0,   0,   0,   0,  0,  0,
    50, 50,  50,  50,  50,  50, 50, 50,
    10, 10,  20,  30,  30,  20, 10, 10,
     5,  5,  10,  25,  25,  10,  5,  5,
     0,  0,   0,  20,  20,   0,  0,  0,
     5, -5, -10,   0,   0, -10, -5,  5,
     5, 10,  10, -20, -20,  10, 10,  5,
     0,  0,   0,   0,   0,   0,  0,  0,
];

#[rustfmt::skip]
const KNIGHT_TABLE: [i32; 64] = [
    -50, -40, -30, -30, -30, -30, -40, -50,
    -40, -20,   0,   0,   0,   0, -20, -40,
    -30,   0,  10,  15,  15,  10,   0, -30,
    -30,   5,  15,  20,  20,  15,   5, -30,
    -30,   0,  15,  20,  20,  15,   0, -30,
    -30,   5,  10,  15,  15,  10,   5, -30,
    -40, -20,   0,   5,   5,   0, -20, -40,
    -50, -40, -30, -30, -30, -30, -40, -50,
];

#[rustfmt::skip]
const BISHOP_TABLE: [i32; 64] = [
    -20, -10, -10, -10, -10, -10, -10, -20,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -10,   0,   5,  10,  10,   5,   0, -10,
    -10,   5,   5,  10,  10,   5,   5, -10,
    -10,   0,  10,  10,  10,  10,   0, -10,
    -10,  10,  10,  10,  10,  10,  10, -10,
    -10,   5,   0,   0,   0,   0,   5, -10,
    -20, -10, -10, -10, -10, -10, -10, -20,
];

#[rustfmt::skip]
const ROOK_TABLE: [i32; 64] = [
     0,  0,  0,  0,  0,  0,  0,  0,
     5, 10, 10, 10, 10, 10, 10,  5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
     0,  0,  0,  5,  5,  0,  0,  0,
];

#[rustfmt::skip]
const QUEEN_TABLE: [i32; 64] = [
    -20, -10, -10, -5, -5, -10, -10, -20,
    -10,   0,   0,  0,  0,   0,   0, -10,
    -10,   0,   5,  5,  5,   5,   0, -10,
     -5,   0,   5,  5,  5,   5,   0,  -5,
      0,   0,   5,  5,  5,   5,   0,  -5,
    -10,   5,   5,  5,  5,   5,   0, -10,
    -10,   0,   5,  0,  0,   0,   0, -10,
    -20, -10, -10, -5, -5, -10, -10, -20,
];

#[rustfmt::skip]
const KING_MIDDLEGAME_TABLE: [i32; 64] = [
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -20, -30, -30, -40, -40, -30, -30, -20,
    -10, -20, -20, -20, -20, -20, -20, -10,
     20,  20,   0,   0,   0,   0,  20,  20,
     20,  30,  10,   0,   0,  10,  30,  20,
];

#[rustfmt::skip]
const KING_ENDGAME_TABLE: [i32; 64] = [
    -50, -40, -30, -20, -20, -30, -40, -50,
    -30, -20, -10,   0,   0, -10, -20, -30,
    -30, -10,  20,  30,  30,  20, -10, -30,
    -30, -10,  30,  40,  40,  30, -10, -30,
    -30, -10,  30,  40,  40,  30, -10, -30,
    -30, -10,  20,  30,  30,  20, -10, -30,
    -30, -30,   0,   0,   0,   0, -30, -30,
    -50, -30, -30, -30, -30, -30, -30, -50,
];

const FILE_A_BB: Bitboard = 0x0101_0101_0101_0101;

fn file_bb(file: u8) -> Bitboard {
    FILE_A_BB << file
}

fn adjacent_files_bb(file: u8) -> Bitboard {
    let left = if file > 0 { file_bb(file - 1) } else { 0 };
    let right = if file < 7 { file_bb(file + 1) } else { 0 };
    left | right
}

/// Squares strictly in front of `sq` from `color`'s point of view.
fn forward_ranks_bb(color: Color, sq: Square) -> Bitboard {
    let rank = rank_of(sq);
    match color {
        Color::White if rank < 7 => !0u64 << ((rank + 1) * 8),
        Color::Black if rank > 0 => !0u64 >> ((8 - rank) * 8),
        _ => 0,
    }
}

/// Per-colour breakdown of one evaluation, used by `trace`.
#[derive(Debug, Default, Clone, Copy)]
struct Terms {
    material: [i32; 2],
    placement: [i32; 2],
    mobility: [i32; 2],
    pawns: [i32; 2],
    king_safety: [i32; 2],
}

impl Terms {
    fn rows(&self) -> [(&'static str, [i32; 2]); 5] {
        [
            ("Material", self.material),
            ("Placement", self.placement),
            ("Mobility", self.mobility),
            ("Pawns", self.pawns),
            ("King safety", self.king_safety),
        ]
    }

    fn white_minus_black(&self) -> i32 {
        self.rows().iter().map(|(_, [w, b])| w - b).sum()
    }
}

pub struct Evaluator {
    pub pawn_value: i32,
    pub knight_value: i32,
    pub bishop_value: i32,
    pub rook_value: i32,
    pub queen_value: i32,
    pub king_value: i32,

    // Mobility weights per reachable square
    pub knight_mobility_weight: i32,
    pub bishop_mobility_weight: i32,
    pub rook_mobility_weight: i32,
    pub queen_mobility_weight: i32,

    // Pawn structure weights
    pub doubled_pawn_penalty: i32,
    pub isolated_pawn_penalty: i32,
    pub passed_pawn_bonus: i32,
    pub connected_pawn_bonus: i32,

    // King safety weights
    pub pawn_shield_bonus: i32,
    pub open_file_penalty: i32,
    pub semi_open_file_penalty: i32,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            pawn_value: 100,
            knight_value: 320,
            bishop_value: 330,
            rook_value: 500,
            queen_value: 900,
            king_value: 20000,

            knight_mobility_weight: 4,
            bishop_mobility_weight: 5,
            rook_mobility_weight: 3,
            queen_mobility_weight: 1,

            doubled_pawn_penalty: -10,
            isolated_pawn_penalty: -20,
            passed_pawn_bonus: 20,
            connected_pawn_bonus: 10,

            pawn_shield_bonus: 5,
            open_file_penalty: -15,
            semi_open_file_penalty: -10,
        }
    }

    pub fn piece_value(&self, piece: Piece) -> i32 {
        match piece {
            Piece::Pawn => self.pawn_value,
            Piece::Knight => self.knight_value,
            Piece::Bishop => self.bishop_value,
            Piece::Rook => self.rook_value,
            Piece::Queen => self.queen_value,
            Piece::King => self.king_value,
        }
    }

    /// Static evaluation from the side to move's point of view.
    pub fn evaluate(&self, pos: &Position) -> Value {
        let score = self.terms(pos).white_minus_black();
        match pos.side_to_move() {
            Color::White => score,
            Color::Black => -score,
        }
    }

    /// Human readable breakdown of the evaluation, in pawns.
    pub fn trace(&self, pos: &Position) -> String {
        let terms = self.terms(pos);
        let pawns = |v: i32| v as f64 / self.pawn_value as f64;

        let mut out = String::new();
        out.push_str("      Term    |    White    |    Black    |    Total   \n");
        out.push_str(" -------------+-------------+-------------+------------\n");
        for (name, [white, black]) in terms.rows() {
            let _ = writeln!(
                out,
                " {name:>12} | {:>11.2} | {:>11.2} | {:>10.2}",
                pawns(white),
                pawns(black),
                pawns(white - black)
            );
        }
        out.push_str(" -------------+-------------+-------------+------------\n");
        let _ = write!(
            out,
            "\nFinal evaluation: {:+.2} (white side)",
            pawns(terms.white_minus_black())
        );
        out
    }

    fn terms(&self, pos: &Position) -> Terms {
        let endgame = self.is_endgame(pos);
        let mut terms = Terms::default();
        for color in Color::ALL {
            let c = color.index();
            for piece in Piece::ALL {
                for sq in Squares(pos.pieces_of(color, piece)) {
                    if piece != Piece::King {
                        terms.material[c] += self.piece_value(piece);
                    }
                    terms.placement[c] += self.placement(piece, color, sq, endgame);
                }
            }
            terms.mobility[c] = self.mobility(pos, color);
            terms.pawns[c] = self.pawn_structure(pos, color);
            terms.king_safety[c] = self.king_safety(pos, color);
        }
        terms
    }

    fn placement(&self, piece: Piece, color: Color, sq: Square, endgame: bool) -> i32 {
        // Tables are laid out a8 first; mirror for black.
        let index = match color {
            Color::White => (sq ^ 56) as usize,
            Color::Black => sq as usize,
        };
        let table = match piece {
            Piece::Pawn => &PAWN_TABLE,
            Piece::Knight => &KNIGHT_TABLE,
            Piece::Bishop => &BISHOP_TABLE,
            Piece::Rook => &ROOK_TABLE,
            Piece::Queen => &QUEEN_TABLE,
            Piece::King if endgame => &KING_ENDGAME_TABLE,
            Piece::King => &KING_MIDDLEGAME_TABLE,
        };
        table[index]
    }

    fn is_endgame(&self, pos: &Position) -> bool {
        let major_pieces: u32 = Color::ALL
            .iter()
            .map(|&c| (pos.pieces_of(c, Piece::Queen) | pos.pieces_of(c, Piece::Rook)).count_ones())
            .sum();
        major_pieces <= 2
    }

    /// Squares attacked by each piece that are not occupied by friendly
    /// pieces nor controlled by enemy pawns.
    fn mobility(&self, pos: &Position, color: Color) -> i32 {
        let occupied = pos.occupied();
        let them = color.opposite();
        let enemy_pawn_attacks = Squares(pos.pieces_of(them, Piece::Pawn))
            .fold(0, |acc, sq| acc | pawn_attacks(them, sq));
        let area = !pos.color_occupancy(color) & !enemy_pawn_attacks;

        let mut score = 0;
        for (piece, weight) in [
            (Piece::Knight, self.knight_mobility_weight),
            (Piece::Bishop, self.bishop_mobility_weight),
            (Piece::Rook, self.rook_mobility_weight),
            (Piece::Queen, self.queen_mobility_weight),
        ] {
            for sq in Squares(pos.pieces_of(color, piece)) {
                let attacks = match piece {
                    Piece::Knight => knight_attacks(sq),
                    Piece::Bishop => bishop_attacks(sq, occupied),
                    Piece::Rook => rook_attacks(sq, occupied),
                    _ => bishop_attacks(sq, occupied) | rook_attacks(sq, occupied),
                };
                score += (attacks & area).count_ones() as i32 * weight;
            }
        }
        score
    }

    fn pawn_structure(&self, pos: &Position, color: Color) -> i32 {
        let ours = pos.pieces_of(color, Piece::Pawn);
        let theirs = pos.pieces_of(color.opposite(), Piece::Pawn);
        let mut score = 0;

        for file in 0..8 {
            let count = (ours & file_bb(file)).count_ones() as i32;
            if count > 1 {
                score += self.doubled_pawn_penalty * (count - 1);
            }
        }

        for sq in Squares(ours) {
            let file = file_of(sq);
            if ours & adjacent_files_bb(file) == 0 {
                score += self.isolated_pawn_penalty;
            }
            let span = forward_ranks_bb(color, sq) & (file_bb(file) | adjacent_files_bb(file));
            if theirs & span == 0 {
                score += self.passed_pawn_bonus;
            }
            // Supported by or side by side with a friendly pawn.
            let neighbours = pawn_attacks(color.opposite(), sq)
                | ((square_bb(sq) << 1) & !FILE_A_BB)
                | ((square_bb(sq) >> 1) & !file_bb(7));
            if ours & neighbours != 0 {
                score += self.connected_pawn_bonus;
            }
        }
        score
    }

    fn king_safety(&self, pos: &Position, color: Color) -> i32 {
        let Some(ksq) = pos.king_square(color) else {
            return 0;
        };
        let ours = pos.pieces_of(color, Piece::Pawn);
        let theirs = pos.pieces_of(color.opposite(), Piece::Pawn);

        let shield = king_attacks(ksq) & forward_ranks_bb(color, ksq);
        let mut score = (ours & shield).count_ones() as i32 * self.pawn_shield_bonus;

        let file = file_bb(file_of(ksq));
        if ours & file == 0 {
            score += if theirs & file == 0 {
                self.open_file_penalty
            } else {
                self.semi_open_file_penalty
            };
        }
        score
    }
}
