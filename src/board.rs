use std::fmt;
use std::sync::OnceLock;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::movegen::{self, Move, MoveType};
use crate::notation;

pub type Square = u8;
pub type Bitboard = u64;

pub const FILE_C: u8 = 2;
pub const FILE_D: u8 = 3;
pub const FILE_F: u8 = 5;
pub const FILE_G: u8 = 6;

pub fn file_of(sq: Square) -> u8 {
    sq % 8
}

pub fn rank_of(sq: Square) -> u8 {
    sq / 8
}

pub fn make_square(file: u8, rank: u8) -> Square {
    rank * 8 + file
}

pub fn square_bb(sq: Square) -> Bitboard {
    1u64 << sq
}

/// Iterates the set squares of a bitboard, lowest first.
pub struct Squares(pub Bitboard);

impl Iterator for Squares {
    type Item = Square;

    fn next(&mut self) -> Option<Square> {
        if self.0 == 0 {
            return None;
        }
        let sq = self.0.trailing_zeros() as Square;
        self.0 &= self.0 - 1;
        Some(sq)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Piece {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl Piece {
    pub const ALL: [Piece; 6] = [
        Piece::Pawn,
        Piece::Knight,
        Piece::Bishop,
        Piece::Rook,
        Piece::Queen,
        Piece::King,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn to_char(self, color: Color) -> char {
        let c = match self {
            Piece::Pawn => 'p',
            Piece::Knight => 'n',
            Piece::Bishop => 'b',
            Piece::Rook => 'r',
            Piece::Queen => 'q',
            Piece::King => 'k',
        };
        match color {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        }
    }

    pub fn from_char(c: char) -> Option<(Piece, Color)> {
        let piece = match c.to_ascii_lowercase() {
            'p' => Piece::Pawn,
            'n' => Piece::Knight,
            'b' => Piece::Bishop,
            'r' => Piece::Rook,
            'q' => Piece::Queen,
            'k' => Piece::King,
            _ => return None,
        };
        let color = if c.is_ascii_uppercase() { Color::White } else { Color::Black };
        Some((piece, color))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub const ALL: [Color; 2] = [Color::White, Color::Black];

    pub fn opposite(&self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Rank of this side's pieces before any move is made.
    pub fn back_rank(self) -> u8 {
        match self {
            Color::White => 0,
            Color::Black => 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flank {
    King,
    Queen,
}

impl Flank {
    pub const ALL: [Flank; 2] = [Flank::King, Flank::Queen];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Landing squares `(king, rook)` of a castling move. The same in standard
/// chess and in the 960 variant.
pub fn castling_destinations(color: Color, flank: Flank) -> (Square, Square) {
    let rank = color.back_rank();
    match flank {
        Flank::King => (make_square(FILE_G, rank), make_square(FILE_F, rank)),
        Flank::Queen => (make_square(FILE_C, rank), make_square(FILE_D, rank)),
    }
}

/// Castling rights as four independent flags keyed by side and flank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CastlingRights {
    flags: [[bool; 2]; 2],
}

impl CastlingRights {
    pub const NONE: CastlingRights = CastlingRights { flags: [[false; 2]; 2] };
    pub const ALL: CastlingRights = CastlingRights { flags: [[true; 2]; 2] };

    pub fn has(&self, color: Color, flank: Flank) -> bool {
        self.flags[color.index()][flank.index()]
    }

    pub fn insert(&mut self, color: Color, flank: Flank) {
        self.flags[color.index()][flank.index()] = true;
    }

    pub fn remove(&mut self, color: Color, flank: Flank) {
        self.flags[color.index()][flank.index()] = false;
    }

    pub fn remove_side(&mut self, color: Color) {
        self.flags[color.index()] = [false; 2];
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }

    /// Rights in FEN order: white kingside, white queenside, black kingside,
    /// black queenside.
    pub fn iter(&self) -> impl Iterator<Item = (Color, Flank)> + '_ {
        Color::ALL
            .into_iter()
            .flat_map(|c| Flank::ALL.into_iter().map(move |f| (c, f)))
            .filter(move |&(c, f)| self.has(c, f))
    }

    /// Index into a 16 entry table, one bit per right.
    pub fn bits(&self) -> usize {
        let mut bits = 0;
        for (i, (c, f)) in Color::ALL
            .into_iter()
            .flat_map(|c| Flank::ALL.into_iter().map(move |f| (c, f)))
            .enumerate()
        {
            if self.has(c, f) {
                bits |= 1 << i;
            }
        }
        bits
    }
}

impl fmt::Display for CastlingRights {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "-");
        }
        for (color, flank) in self.iter() {
            let c = match flank {
                Flank::King => 'k',
                Flank::Queen => 'q',
            };
            let c = if color == Color::White { c.to_ascii_uppercase() } else { c };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

/// Undo record for one ply. The record pushed by `do_move` holds the key of
/// the position reached and the fields needed to restore the previous one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateInfo {
    pub key: u64,
    pub castling_rights: CastlingRights,
    pub en_passant_square: Option<Square>,
    pub halfmove_clock: u32,
    pub captured: Option<Piece>,
}

/// Per-ply history since the last `position` command. Never empty.
pub type StateList = Vec<StateInfo>;

pub fn new_state_list() -> StateList {
    vec![StateInfo::default()]
}

struct Zobrist {
    psq: [[[u64; 64]; 6]; 2],
    castling: [u64; 16],
    en_passant: [u64; 8],
    side: u64,
}

fn zobrist() -> &'static Zobrist {
    static KEYS: OnceLock<Zobrist> = OnceLock::new();
    KEYS.get_or_init(|| {
        let mut rng = StdRng::seed_from_u64(1_070_372);
        let mut keys = Zobrist {
            psq: [[[0; 64]; 6]; 2],
            castling: [0; 16],
            en_passant: [0; 8],
            side: 0,
        };
        for color in keys.psq.iter_mut() {
            for piece in color.iter_mut() {
                for key in piece.iter_mut() {
                    *key = rng.gen();
                }
            }
        }
        for key in keys.castling.iter_mut().chain(keys.en_passant.iter_mut()) {
            *key = rng.gen();
        }
        keys.side = rng.gen();
        keys
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub(crate) white_pieces: [Bitboard; 6], // Pawn, Knight, Bishop, Rook, Queen, King
    pub(crate) black_pieces: [Bitboard; 6],
    pub(crate) side_to_move: Color,
    pub(crate) castling_rights: CastlingRights,
    pub(crate) castling_rooks: [[Option<Square>; 2]; 2], // [color][flank]
    pub(crate) en_passant_square: Option<Square>,
    pub(crate) halfmove_clock: u32,
    pub(crate) fullmove_number: u32,
    pub(crate) chess960: bool,
    pub(crate) key: u64,
}

impl Default for Position {
    fn default() -> Self {
        Self::new()
    }
}

impl Position {
    /// The standard starting position.
    pub fn new() -> Self {
        let mut pos = Self {
            white_pieces: [
                0x000000000000FF00, // Pawns
                0x0000000000000042, // Knights
                0x0000000000000024, // Bishops
                0x0000000000000081, // Rooks
                0x0000000000000008, // Queen
                0x0000000000000010, // King
            ],
            black_pieces: [
                0x00FF000000000000,
                0x4200000000000000,
                0x2400000000000000,
                0x8100000000000000,
                0x0800000000000000,
                0x1000000000000000,
            ],
            side_to_move: Color::White,
            castling_rights: CastlingRights::ALL,
            castling_rooks: [[Some(7), Some(0)], [Some(63), Some(56)]],
            en_passant_square: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            chess960: false,
            key: 0,
        };
        pos.key = pos.compute_key();
        pos
    }

    pub(crate) fn empty() -> Self {
        Self {
            white_pieces: [0; 6],
            black_pieces: [0; 6],
            side_to_move: Color::White,
            castling_rights: CastlingRights::NONE,
            castling_rooks: [[None; 2]; 2],
            en_passant_square: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            chess960: false,
            key: 0,
        }
    }

    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    pub fn is_chess960(&self) -> bool {
        self.chess960
    }

    pub fn castling_rights(&self) -> CastlingRights {
        self.castling_rights
    }

    pub fn castling_rook_square(&self, color: Color, flank: Flank) -> Option<Square> {
        self.castling_rooks[color.index()][flank.index()]
    }

    pub fn en_passant_square(&self) -> Option<Square> {
        self.en_passant_square
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn pieces(&self, color: Color) -> &[Bitboard; 6] {
        match color {
            Color::White => &self.white_pieces,
            Color::Black => &self.black_pieces,
        }
    }

    pub fn pieces_of(&self, color: Color, piece: Piece) -> Bitboard {
        self.pieces(color)[piece.index()]
    }

    pub fn color_occupancy(&self, color: Color) -> Bitboard {
        self.pieces(color).iter().fold(0, |acc, bb| acc | bb)
    }

    pub fn occupied(&self) -> Bitboard {
        self.color_occupancy(Color::White) | self.color_occupancy(Color::Black)
    }

    pub fn piece_at(&self, square: Square) -> Option<(Piece, Color)> {
        let mask = square_bb(square);
        for color in Color::ALL {
            for piece in Piece::ALL {
                if self.pieces_of(color, piece) & mask != 0 {
                    return Some((piece, color));
                }
            }
        }
        None
    }

    pub fn king_square(&self, color: Color) -> Option<Square> {
        Squares(self.pieces_of(color, Piece::King)).next()
    }

    /// Enemy pieces giving check to the side to move.
    pub fn checkers(&self) -> Bitboard {
        let us = self.side_to_move;
        match self.king_square(us) {
            Some(ksq) => {
                movegen::attackers_to(self, ksq, self.occupied())
                    & self.color_occupancy(us.opposite())
            }
            None => 0,
        }
    }

    pub fn in_check(&self) -> bool {
        self.checkers() != 0
    }

    pub(crate) fn put_piece(&mut self, square: Square, piece: Piece, color: Color) {
        let bb = match color {
            Color::White => &mut self.white_pieces,
            Color::Black => &mut self.black_pieces,
        };
        bb[piece.index()] |= square_bb(square);
    }

    pub(crate) fn remove_piece(&mut self, square: Square, piece: Piece, color: Color) {
        let bb = match color {
            Color::White => &mut self.white_pieces,
            Color::Black => &mut self.black_pieces,
        };
        bb[piece.index()] &= !square_bb(square);
    }

    /// Moves the pieces of `m` for the side to move without touching any
    /// other state. Returns the captured piece, if any.
    pub(crate) fn move_pieces(&mut self, m: Move) -> Option<Piece> {
        let us = self.side_to_move;
        let them = us.opposite();
        let from = m.from_sq();
        let to = m.to_sq();

        match m.move_type() {
            MoveType::Castling => {
                let flank = if to > from { Flank::King } else { Flank::Queen };
                let (king_to, rook_to) = castling_destinations(us, flank);
                // Remove both first: in 960 the landing squares may overlap.
                self.remove_piece(from, Piece::King, us);
                self.remove_piece(to, Piece::Rook, us);
                self.put_piece(king_to, Piece::King, us);
                self.put_piece(rook_to, Piece::Rook, us);
                None
            }
            MoveType::EnPassant => {
                let captured_square = if us == Color::White { to - 8 } else { to + 8 };
                self.remove_piece(captured_square, Piece::Pawn, them);
                self.remove_piece(from, Piece::Pawn, us);
                self.put_piece(to, Piece::Pawn, us);
                Some(Piece::Pawn)
            }
            MoveType::Normal | MoveType::Promotion => {
                let captured = self.piece_at(to).map(|(piece, _)| piece);
                if let Some(piece) = captured {
                    self.remove_piece(to, piece, them);
                }
                let moved = self.piece_at(from).map_or(Piece::Pawn, |(piece, _)| piece);
                self.remove_piece(from, moved, us);
                let placed = m.promotion_piece().unwrap_or(moved);
                self.put_piece(to, placed, us);
                captured
            }
        }
    }

    /// Plays a legal move and appends its undo record to `states`.
    pub fn do_move(&mut self, m: Move, states: &mut StateList) {
        let us = self.side_to_move;
        let them = us.opposite();
        let from = m.from_sq();
        let to = m.to_sq();
        let moved = match self.piece_at(from) {
            Some((piece, _)) => piece,
            None => unreachable!("do_move from empty square {}", notation::square(from)),
        };

        let mut st = StateInfo {
            key: 0,
            castling_rights: self.castling_rights,
            en_passant_square: self.en_passant_square,
            halfmove_clock: self.halfmove_clock,
            captured: None,
        };

        st.captured = self.move_pieces(m);

        self.halfmove_clock += 1;
        if moved == Piece::Pawn || st.captured.is_some() {
            self.halfmove_clock = 0;
        }

        self.en_passant_square = None;
        if moved == Piece::Pawn && (to as i8 - from as i8).abs() == 16 {
            let ep = if us == Color::White { from + 8 } else { from - 8 };
            if movegen::pawn_attacks(us, ep) & self.pieces_of(them, Piece::Pawn) != 0 {
                self.en_passant_square = Some(ep);
            }
        }

        if moved == Piece::King {
            self.castling_rights.remove_side(us);
        }
        for color in Color::ALL {
            for flank in Flank::ALL {
                let rook = self.castling_rook_square(color, flank);
                if rook == Some(from) || rook == Some(to) {
                    self.castling_rights.remove(color, flank);
                }
            }
        }

        if us == Color::Black {
            self.fullmove_number += 1;
        }
        self.side_to_move = them;
        self.key = self.compute_key();
        st.key = self.key;
        states.push(st);
    }

    /// Takes back `m`, which must be the move that produced the last record
    /// of `states`.
    pub fn undo_move(&mut self, m: Move, states: &mut StateList) {
        let st = match states.pop() {
            Some(st) => st,
            None => unreachable!("undo_move with an empty state chain"),
        };
        self.side_to_move = self.side_to_move.opposite();
        let us = self.side_to_move;
        let them = us.opposite();
        let from = m.from_sq();
        let to = m.to_sq();

        match m.move_type() {
            MoveType::Castling => {
                let flank = if to > from { Flank::King } else { Flank::Queen };
                let (king_to, rook_to) = castling_destinations(us, flank);
                self.remove_piece(king_to, Piece::King, us);
                self.remove_piece(rook_to, Piece::Rook, us);
                self.put_piece(from, Piece::King, us);
                self.put_piece(to, Piece::Rook, us);
            }
            MoveType::EnPassant => {
                let captured_square = if us == Color::White { to - 8 } else { to + 8 };
                self.remove_piece(to, Piece::Pawn, us);
                self.put_piece(from, Piece::Pawn, us);
                self.put_piece(captured_square, Piece::Pawn, them);
            }
            MoveType::Normal | MoveType::Promotion => {
                let placed = self.piece_at(to).map_or(Piece::Pawn, |(piece, _)| piece);
                self.remove_piece(to, placed, us);
                let moved = if m.move_type() == MoveType::Promotion { Piece::Pawn } else { placed };
                self.put_piece(from, moved, us);
                if let Some(captured) = st.captured {
                    self.put_piece(to, captured, them);
                }
            }
        }

        self.castling_rights = st.castling_rights;
        self.en_passant_square = st.en_passant_square;
        self.halfmove_clock = st.halfmove_clock;
        if us == Color::Black {
            self.fullmove_number -= 1;
        }
        self.key = self.compute_key();
    }

    /// Mirrors the position vertically and swaps the colours.
    pub fn flip(&mut self) {
        let white = self.white_pieces;
        for (i, bb) in self.black_pieces.iter().enumerate() {
            self.white_pieces[i] = bb.swap_bytes();
        }
        for (i, bb) in white.iter().enumerate() {
            self.black_pieces[i] = bb.swap_bytes();
        }

        let mut rights = CastlingRights::NONE;
        for (color, flank) in self.castling_rights.iter() {
            rights.insert(color.opposite(), flank);
        }
        self.castling_rights = rights;
        self.castling_rooks.swap(0, 1);
        for rook in self.castling_rooks.iter_mut().flatten() {
            *rook = rook.map(|sq| sq ^ 56);
        }

        self.en_passant_square = self.en_passant_square.map(|sq| sq ^ 56);
        self.side_to_move = self.side_to_move.opposite();
        self.key = self.compute_key();
    }

    pub fn compute_key(&self) -> u64 {
        let keys = zobrist();
        let mut key = 0u64;
        for color in Color::ALL {
            for piece in Piece::ALL {
                for sq in Squares(self.pieces_of(color, piece)) {
                    key ^= keys.psq[color.index()][piece.index()][sq as usize];
                }
            }
        }
        key ^= keys.castling[self.castling_rights.bits()];
        if let Some(ep) = self.en_passant_square {
            key ^= keys.en_passant[file_of(ep) as usize];
        }
        if self.side_to_move == Color::Black {
            key ^= keys.side;
        }
        key
    }

    /// Internal consistency check of the whole position.
    pub fn pos_is_ok(&self) -> bool {
        let us = self.side_to_move;
        let them = us.opposite();

        for color in Color::ALL {
            if self.pieces_of(color, Piece::King).count_ones() != 1 {
                return false;
            }
            if self.color_occupancy(color).count_ones() > 16
                || self.pieces_of(color, Piece::Pawn).count_ones() > 8
            {
                return false;
            }
        }

        let total: u32 = Color::ALL
            .iter()
            .flat_map(|&c| self.pieces(c).iter())
            .map(|bb| bb.count_ones())
            .sum();
        if total != self.occupied().count_ones() {
            return false;
        }

        let pawns =
            self.pieces_of(Color::White, Piece::Pawn) | self.pieces_of(Color::Black, Piece::Pawn);
        if pawns & 0xFF000000000000FF != 0 {
            return false;
        }

        if let Some(ksq) = self.king_square(them) {
            if movegen::attackers_to(self, ksq, self.occupied()) & self.color_occupancy(us) != 0 {
                return false;
            }
        }

        if let Some(ep) = self.en_passant_square {
            let expected_rank = if us == Color::White { 5 } else { 2 };
            if rank_of(ep) != expected_rank {
                return false;
            }
        }

        for (color, flank) in self.castling_rights.iter() {
            let rook_ok = self
                .castling_rook_square(color, flank)
                .is_some_and(|sq| self.pieces_of(color, Piece::Rook) & square_bb(sq) != 0);
            let king_ok =
                self.king_square(color).is_some_and(|sq| rank_of(sq) == color.back_rank());
            if !rook_ok || !king_ok {
                return false;
            }
        }

        self.key == self.compute_key()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "\n +---+---+---+---+---+---+---+---+")?;
        for rank in (0..8).rev() {
            for file in 0..8 {
                let c = match self.piece_at(make_square(file, rank)) {
                    Some((piece, color)) => piece.to_char(color),
                    None => ' ',
                };
                write!(f, " | {c}")?;
            }
            writeln!(f, " | {}\n +---+---+---+---+---+---+---+---+", rank + 1)?;
        }
        writeln!(f, "   a   b   c   d   e   f   g   h\n")?;
        writeln!(f, "Fen: {}", self.fen())?;
        writeln!(f, "Key: {:016X}", self.key)?;
        write!(f, "Checkers:")?;
        for sq in Squares(self.checkers()) {
            write!(f, " {}", notation::square(sq))?;
        }
        Ok(())
    }
}
