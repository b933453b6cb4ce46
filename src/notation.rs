use crate::board::{file_of, make_square, rank_of, Position, Square, FILE_C, FILE_G};
use crate::movegen::{Move, MoveGenerator, MoveType};
use crate::search::{Value, MAX_PLY, PAWN_VALUE_EG, VALUE_INFINITE, VALUE_MATE};

const PIECE_TO_CHAR: &[u8; 7] = b" pnbrqk";

pub fn square(sq: Square) -> String {
    let file = (b'a' + file_of(sq)) as char;
    let rank = (b'1' + rank_of(sq)) as char;
    format!("{file}{rank}")
}

pub fn parse_square(text: &str) -> Option<Square> {
    let bytes = text.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let file = bytes[0].wrapping_sub(b'a');
    let rank = bytes[1].wrapping_sub(b'1');
    (file < 8 && rank < 8).then(|| make_square(file, rank))
}

/// Long algebraic notation. Castling is printed as king to g/c file unless
/// `chess960` is set, in which case the king "captures" its rook.
pub fn move_to_uci(m: Move, chess960: bool) -> String {
    if m == Move::NONE {
        return "(none)".to_string();
    }
    if m == Move::NULL {
        return "0000".to_string();
    }

    let from = m.from_sq();
    let mut to = m.to_sq();
    if m.move_type() == MoveType::Castling && !chess960 {
        let file = if to > from { FILE_G } else { FILE_C };
        to = make_square(file, rank_of(from));
    }

    let mut text = square(from) + &square(to);
    if let Some(piece) = m.promotion_piece() {
        text.push(PIECE_TO_CHAR[piece.index() + 1] as char);
    }
    text
}

/// Finds the legal move spelled by `token`, or `Move::NONE`.
pub fn to_move(pos: &Position, token: &str) -> Move {
    let token = if token.len() == 5 && token.is_char_boundary(4) {
        let (head, promo) = token.split_at(4);
        format!("{head}{}", promo.to_ascii_lowercase())
    } else {
        token.to_string()
    };

    MoveGenerator::new()
        .generate_moves(pos)
        .into_iter()
        .find(|&m| move_to_uci(m, pos.is_chess960()) == token)
        .unwrap_or(Move::NONE)
}

/// Score in protocol units: `cp <centipawns>` or `mate <moves>`, negative
/// when the engine is getting mated.
pub fn value(v: Value) -> String {
    assert!(-VALUE_INFINITE < v && v < VALUE_INFINITE, "score {v} out of bounds");

    if v.abs() < VALUE_MATE - MAX_PLY {
        format!("cp {}", v * 100 / PAWN_VALUE_EG)
    } else if v > 0 {
        format!("mate {}", (VALUE_MATE - v + 1) / 2)
    } else {
        format!("mate {}", (-VALUE_MATE - v) / 2)
    }
}
