use thiserror::Error;

use crate::board::{
    file_of, make_square, rank_of, square_bb, CastlingRights, Color, Flank, Piece, Position, Square,
    StateInfo,
};
use crate::movegen;
use crate::notation;

/// FEN string of the initial position, normal chess.
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FenError {
    #[error("empty FEN")]
    Empty,
    #[error("invalid piece placement '{0}'")]
    Placement(String),
    #[error("invalid side to move '{0}'")]
    SideToMove(String),
    #[error("invalid castling field '{0}'")]
    Castling(String),
    #[error("invalid en passant square '{0}'")]
    EnPassant(String),
    #[error("invalid move counter '{0}'")]
    Counter(String),
}

fn parse_placement(pos: &mut Position, field: &str) -> Result<(), FenError> {
    let bad = || FenError::Placement(field.to_string());
    let ranks: Vec<&str> = field.split('/').collect();
    if ranks.len() != 8 {
        return Err(bad());
    }
    for (i, rank_text) in ranks.iter().enumerate() {
        let rank = 7 - i as u8;
        let mut file = 0u8;
        for c in rank_text.chars() {
            if let Some(skip) = c.to_digit(10) {
                if !(1..=8).contains(&skip) {
                    return Err(bad());
                }
                file += skip as u8;
            } else {
                let (piece, color) = Piece::from_char(c).ok_or_else(bad)?;
                if file > 7 {
                    return Err(bad());
                }
                pos.put_piece(make_square(file, rank), piece, color);
                file += 1;
            }
            if file > 8 {
                return Err(bad());
            }
        }
        if file != 8 {
            return Err(bad());
        }
    }
    Ok(())
}

/// Resolves one castling character to the rook it refers to. `K`/`Q` pick
/// the outermost rook on that flank, a file letter names the rook directly.
fn castling_rook(pos: &Position, color: Color, c: char) -> Option<(Flank, Square)> {
    let ksq = pos.king_square(color)?;
    let rank = color.back_rank();
    if rank_of(ksq) != rank {
        return None;
    }
    let rooks = pos.pieces_of(color, Piece::Rook);
    let is_rook = |file: u8| rooks & square_bb(make_square(file, rank)) != 0;

    match c.to_ascii_lowercase() {
        'k' => (file_of(ksq) + 1..8)
            .rev()
            .find(|&f| is_rook(f))
            .map(|f| (Flank::King, make_square(f, rank))),
        'q' => (0..file_of(ksq))
            .find(|&f| is_rook(f))
            .map(|f| (Flank::Queen, make_square(f, rank))),
        l @ 'a'..='h' => {
            let file = l as u8 - b'a';
            if !is_rook(file) || file == file_of(ksq) {
                return None;
            }
            let flank = if file > file_of(ksq) { Flank::King } else { Flank::Queen };
            Some((flank, make_square(file, rank)))
        }
        _ => None,
    }
}

impl Position {
    /// Initializes the position from a FEN string. Missing trailing fields
    /// take their usual defaults. On error the position is left cleared, so
    /// callers parse into a scratch position first.
    pub fn set(&mut self, fen: &str, chess960: bool, st: &mut StateInfo) -> Result<(), FenError> {
        *self = Position::empty();
        self.chess960 = chess960;

        let mut fields = fen.split_whitespace();
        let placement = fields.next().ok_or(FenError::Empty)?;
        parse_placement(self, placement)?;

        self.side_to_move = match fields.next().unwrap_or("w") {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(FenError::SideToMove(other.to_string())),
        };

        let castling = fields.next().unwrap_or("-");
        if castling != "-" {
            for c in castling.chars() {
                let color = if c.is_ascii_uppercase() { Color::White } else { Color::Black };
                if !c.is_ascii_alphabetic() {
                    return Err(FenError::Castling(castling.to_string()));
                }
                if let Some((flank, rook)) = castling_rook(self, color, c) {
                    self.castling_rights.insert(color, flank);
                    self.castling_rooks[color.index()][flank.index()] = Some(rook);
                }
            }
        }

        let ep = fields.next().unwrap_or("-");
        if ep != "-" {
            let sq = notation::parse_square(ep).ok_or_else(|| FenError::EnPassant(ep.to_string()))?;
            let us = self.side_to_move;
            let them = us.opposite();
            let expected_rank = if us == Color::White { 5 } else { 2 };
            // Kept only when a capture is actually possible.
            if rank_of(sq) == expected_rank {
                let pushed = if us == Color::White { sq - 8 } else { sq + 8 };
                if movegen::pawn_attacks(them, sq) & self.pieces_of(us, Piece::Pawn) != 0
                    && self.pieces_of(them, Piece::Pawn) & square_bb(pushed) != 0
                {
                    self.en_passant_square = Some(sq);
                }
            }
        }

        if let Some(text) = fields.next() {
            self.halfmove_clock = text.parse().map_err(|_| FenError::Counter(text.to_string()))?;
        }
        if let Some(text) = fields.next() {
            let n: u32 = text.parse().map_err(|_| FenError::Counter(text.to_string()))?;
            self.fullmove_number = n.max(1);
        }

        self.key = self.compute_key();
        *st = StateInfo {
            key: self.key,
            ..StateInfo::default()
        };
        Ok(())
    }

    pub fn fen(&self) -> String {
        self.fen_with_rights(self.castling_rights)
    }

    /// FEN of this position with `rights` in place of the recorded castling
    /// rights. Rights without a known rook square are skipped.
    pub fn fen_with_rights(&self, rights: CastlingRights) -> String {
        let mut fen = String::new();
        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                match self.piece_at(make_square(file, rank)) {
                    Some((piece, color)) => {
                        if empty > 0 {
                            fen.push_str(&empty.to_string());
                            empty = 0;
                        }
                        fen.push(piece.to_char(color));
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                fen.push_str(&empty.to_string());
            }
            if rank > 0 {
                fen.push('/');
            }
        }

        fen.push_str(if self.side_to_move == Color::White { " w " } else { " b " });

        let mut castling = String::new();
        for (color, flank) in rights.iter() {
            let Some(rook) = self.castling_rook_square(color, flank) else {
                continue;
            };
            let c = if self.chess960 {
                (b'a' + file_of(rook)) as char
            } else if flank == Flank::King {
                'k'
            } else {
                'q'
            };
            castling.push(if color == Color::White { c.to_ascii_uppercase() } else { c });
        }
        if castling.is_empty() {
            castling.push('-');
        }
        fen.push_str(&castling);

        match self.en_passant_square {
            Some(sq) => fen.push_str(&format!(" {} ", notation::square(sq))),
            None => fen.push_str(" - "),
        }
        fen.push_str(&format!("{} {}", self.halfmove_clock, self.fullmove_number));
        fen
    }
}
