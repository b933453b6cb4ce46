use std::sync::OnceLock;

use crate::board::{
    castling_destinations, file_of, rank_of, square_bb, Bitboard, Color, Flank, Piece, Position,
    Square, Squares, StateList,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveType {
    Normal,
    Promotion,
    EnPassant,
    Castling,
}

/// A move packed into 16 bits: destination (bits 0-5), origin (6-11),
/// promotion piece counted from the knight (12-13) and move type (14-15).
///
/// Castling is stored as "king captures own rook": the destination is the
/// rook's square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Move(u16);

impl Move {
    pub const NONE: Move = Move(0);
    pub const NULL: Move = Move(65);

    pub fn new(from: Square, to: Square) -> Self {
        Move(((from as u16) << 6) | to as u16)
    }

    fn with_type(from: Square, to: Square, move_type: MoveType, promotion: Piece) -> Self {
        let promo = (promotion.index() as u16).saturating_sub(1) & 3;
        Move(((move_type as u16) << 14) | (promo << 12) | ((from as u16) << 6) | to as u16)
    }

    pub fn new_promotion(from: Square, to: Square, promotion: Piece) -> Self {
        Self::with_type(from, to, MoveType::Promotion, promotion)
    }

    pub fn new_en_passant(from: Square, to: Square) -> Self {
        Self::with_type(from, to, MoveType::EnPassant, Piece::Knight)
    }

    pub fn new_castling(king_from: Square, rook_from: Square) -> Self {
        Self::with_type(king_from, rook_from, MoveType::Castling, Piece::Knight)
    }

    pub fn from_sq(self) -> Square {
        ((self.0 >> 6) & 0x3F) as Square
    }

    pub fn to_sq(self) -> Square {
        (self.0 & 0x3F) as Square
    }

    pub fn move_type(self) -> MoveType {
        match self.0 >> 14 {
            0 => MoveType::Normal,
            1 => MoveType::Promotion,
            2 => MoveType::EnPassant,
            _ => MoveType::Castling,
        }
    }

    pub fn promotion_piece(self) -> Option<Piece> {
        match self.move_type() {
            MoveType::Promotion => Some(Piece::ALL[((self.0 >> 12) & 3) as usize + 1]),
            _ => None,
        }
    }

    /// False for both sentinels.
    pub fn is_ok(self) -> bool {
        self.from_sq() != self.to_sq()
    }
}

struct AttackTables {
    knight: [Bitboard; 64],
    king: [Bitboard; 64],
    pawn: [[Bitboard; 64]; 2],
}

fn offsets_to_bb(square: Square, offsets: &[(i8, i8)]) -> Bitboard {
    let rank = rank_of(square) as i8;
    let file = file_of(square) as i8;
    let mut attacks = 0u64;
    for &(dr, df) in offsets {
        let r = rank + dr;
        let f = file + df;
        if (0..8).contains(&r) && (0..8).contains(&f) {
            attacks |= 1u64 << (r * 8 + f);
        }
    }
    attacks
}

fn tables() -> &'static AttackTables {
    static TABLES: OnceLock<AttackTables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let knight_moves = [(-2, -1), (-2, 1), (-1, -2), (-1, 2), (1, -2), (1, 2), (2, -1), (2, 1)];
        let king_moves = [(-1, -1), (-1, 0), (-1, 1), (0, -1), (0, 1), (1, -1), (1, 0), (1, 1)];
        let mut t = AttackTables {
            knight: [0; 64],
            king: [0; 64],
            pawn: [[0; 64]; 2],
        };
        for sq in 0..64u8 {
            t.knight[sq as usize] = offsets_to_bb(sq, &knight_moves);
            t.king[sq as usize] = offsets_to_bb(sq, &king_moves);
            t.pawn[Color::White.index()][sq as usize] = offsets_to_bb(sq, &[(1, -1), (1, 1)]);
            t.pawn[Color::Black.index()][sq as usize] = offsets_to_bb(sq, &[(-1, -1), (-1, 1)]);
        }
        t
    })
}

pub fn knight_attacks(square: Square) -> Bitboard {
    tables().knight[square as usize]
}

pub fn king_attacks(square: Square) -> Bitboard {
    tables().king[square as usize]
}

/// Squares a pawn of `color` standing on `square` attacks.
pub fn pawn_attacks(color: Color, square: Square) -> Bitboard {
    tables().pawn[color.index()][square as usize]
}

fn slider_attacks(square: Square, occupied: Bitboard, directions: &[(i8, i8)]) -> Bitboard {
    let mut attacks = 0u64;
    let rank = rank_of(square) as i8;
    let file = file_of(square) as i8;
    for &(dr, df) in directions {
        let mut r = rank + dr;
        let mut f = file + df;
        while (0..8).contains(&r) && (0..8).contains(&f) {
            let target_mask = 1u64 << (r * 8 + f);
            attacks |= target_mask;
            if occupied & target_mask != 0 {
                break;
            }
            r += dr;
            f += df;
        }
    }
    attacks
}

pub fn bishop_attacks(square: Square, occupied: Bitboard) -> Bitboard {
    slider_attacks(square, occupied, &[(1, 1), (1, -1), (-1, 1), (-1, -1)])
}

pub fn rook_attacks(square: Square, occupied: Bitboard) -> Bitboard {
    slider_attacks(square, occupied, &[(1, 0), (-1, 0), (0, 1), (0, -1)])
}

/// Pieces of both colours attacking `square` given `occupied`.
pub fn attackers_to(pos: &Position, square: Square, occupied: Bitboard) -> Bitboard {
    let w = pos.pieces(Color::White);
    let b = pos.pieces(Color::Black);
    let of = |piece: Piece| w[piece.index()] | b[piece.index()];

    (pawn_attacks(Color::Black, square) & w[Piece::Pawn.index()])
        | (pawn_attacks(Color::White, square) & b[Piece::Pawn.index()])
        | (knight_attacks(square) & of(Piece::Knight))
        | (king_attacks(square) & of(Piece::King))
        | (bishop_attacks(square, occupied) & (of(Piece::Bishop) | of(Piece::Queen)))
        | (rook_attacks(square, occupied) & (of(Piece::Rook) | of(Piece::Queen)))
}

/// Squares from `a` to `b` inclusive on one rank.
fn rank_span(a: Square, b: Square) -> Bitboard {
    (a.min(b)..=a.max(b)).fold(0, |acc, sq| acc | square_bb(sq))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MoveGenerator;

impl MoveGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn is_square_under_attack(
        &self,
        pos: &Position,
        square: Square,
        attacker_color: Color,
    ) -> bool {
        attackers_to(pos, square, pos.occupied()) & pos.color_occupancy(attacker_color) != 0
    }

    pub fn is_king_in_check(&self, pos: &Position, color: Color) -> bool {
        match pos.king_square(color) {
            Some(ksq) => self.is_square_under_attack(pos, ksq, color.opposite()),
            None => false,
        }
    }

    /// All legal moves of the side to move.
    pub fn generate_moves(&self, pos: &Position) -> Vec<Move> {
        let mut moves = Vec::with_capacity(64);
        self.generate_pseudo_legal(pos, &mut moves);
        moves.retain(|&m| self.leaves_king_safe(pos, m));
        moves
    }

    fn leaves_king_safe(&self, pos: &Position, m: Move) -> bool {
        let us = pos.side_to_move();
        let mut copy = pos.clone();
        copy.move_pieces(m);
        !self.is_king_in_check(&copy, us)
    }

    fn generate_pseudo_legal(&self, pos: &Position, moves: &mut Vec<Move>) {
        let us = pos.side_to_move();
        let them = us.opposite();
        let own = pos.color_occupancy(us);
        let enemy = pos.color_occupancy(them);
        let occupied = own | enemy;

        let (push, start_rank, last_rank): (i8, u8, u8) = match us {
            Color::White => (8, 1, 7),
            Color::Black => (-8, 6, 0),
        };

        let mut add_pawn_move = |from: Square, to: Square| {
            if rank_of(to) == last_rank {
                for promotion in [Piece::Queen, Piece::Rook, Piece::Bishop, Piece::Knight] {
                    moves.push(Move::new_promotion(from, to, promotion));
                }
            } else {
                moves.push(Move::new(from, to));
            }
        };

        for from in Squares(pos.pieces_of(us, Piece::Pawn)) {
            if rank_of(from) == last_rank {
                continue;
            }
            let to = (from as i8 + push) as Square;
            if occupied & square_bb(to) == 0 {
                add_pawn_move(from, to);
                if rank_of(from) == start_rank {
                    let to2 = (to as i8 + push) as Square;
                    if occupied & square_bb(to2) == 0 {
                        add_pawn_move(from, to2);
                    }
                }
            }
            for to in Squares(pawn_attacks(us, from) & enemy) {
                add_pawn_move(from, to);
            }
        }

        if let Some(ep) = pos.en_passant_square() {
            for from in Squares(pawn_attacks(them, ep) & pos.pieces_of(us, Piece::Pawn)) {
                moves.push(Move::new_en_passant(from, ep));
            }
        }

        for piece in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen, Piece::King] {
            for from in Squares(pos.pieces_of(us, piece)) {
                let attacks = match piece {
                    Piece::Knight => knight_attacks(from),
                    Piece::Bishop => bishop_attacks(from, occupied),
                    Piece::Rook => rook_attacks(from, occupied),
                    Piece::Queen => bishop_attacks(from, occupied) | rook_attacks(from, occupied),
                    _ => king_attacks(from),
                };
                for to in Squares(attacks & !own) {
                    moves.push(Move::new(from, to));
                }
            }
        }

        self.generate_castling(pos, moves);
    }

    fn generate_castling(&self, pos: &Position, moves: &mut Vec<Move>) {
        let us = pos.side_to_move();
        let Some(king_from) = pos.king_square(us) else {
            return;
        };
        if pos.in_check() {
            return;
        }

        for flank in Flank::ALL {
            if !pos.castling_rights().has(us, flank) {
                continue;
            }
            let Some(rook_from) = pos.castling_rook_square(us, flank) else {
                continue;
            };
            if pos.pieces_of(us, Piece::Rook) & square_bb(rook_from) == 0 {
                continue;
            }

            let (king_to, rook_to) = castling_destinations(us, flank);
            let must_be_empty = (rank_span(king_from, king_to) | rank_span(rook_from, rook_to))
                & !(square_bb(king_from) | square_bb(rook_from));
            if pos.occupied() & must_be_empty != 0 {
                continue;
            }
            let king_path_attacked = Squares(rank_span(king_from, king_to))
                .any(|sq| self.is_square_under_attack(pos, sq, us.opposite()));
            if king_path_attacked {
                continue;
            }
            moves.push(Move::new_castling(king_from, rook_from));
        }
    }
}

/// Counts leaf nodes of the legal move tree, exercising do/undo.
pub fn perft(pos: &mut Position, states: &mut StateList, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let moves = MoveGenerator::new().generate_moves(pos);
    if depth == 1 {
        return moves.len() as u64;
    }

    let mut nodes = 0;
    for m in moves {
        pos.do_move(m, states);
        nodes += perft(pos, states, depth - 1);
        pos.undo_move(m, states);
    }
    nodes
}

/// Per-root-move leaf counts.
pub fn perft_divide(pos: &mut Position, states: &mut StateList, depth: u32) -> Vec<(Move, u64)> {
    let moves = MoveGenerator::new().generate_moves(pos);
    moves
        .into_iter()
        .map(|m| {
            pos.do_move(m, states);
            let nodes = perft(pos, states, depth.saturating_sub(1));
            pos.undo_move(m, states);
            (m, nodes)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{new_state_list, StateInfo};

    fn from_fen(fen: &str, chess960: bool) -> Position {
        let mut pos = Position::new();
        let mut st = StateInfo::default();
        pos.set(fen, chess960, &mut st).expect("valid fen");
        pos
    }

    fn perft_of(fen: &str, chess960: bool, depth: u32) -> u64 {
        let mut pos = from_fen(fen, chess960);
        let mut states = new_state_list();
        perft(&mut pos, &mut states, depth)
    }

    #[test]
    fn move_packing() {
        let m = Move::new_promotion(48, 56, Piece::Queen);
        assert_eq!(m.from_sq(), 48);
        assert_eq!(m.to_sq(), 56);
        assert_eq!(m.move_type(), MoveType::Promotion);
        assert_eq!(m.promotion_piece(), Some(Piece::Queen));

        let c = Move::new_castling(4, 7);
        assert_eq!(c.move_type(), MoveType::Castling);
        assert_eq!(c.promotion_piece(), None);

        assert!(!Move::NONE.is_ok());
        assert!(!Move::NULL.is_ok());
        assert!(Move::new(12, 28).is_ok());
    }

    #[test]
    fn test_initial_position() {
        let pos = Position::new();
        let moves = MoveGenerator::new().generate_moves(&pos);
        // White should have 20 legal moves in the initial position
        assert_eq!(moves.len(), 20);
    }

    #[test]
    fn test_perft_initial_position() {
        let fen = crate::fen::START_FEN;
        assert_eq!(perft_of(fen, false, 1), 20);
        assert_eq!(perft_of(fen, false, 2), 400);
        assert_eq!(perft_of(fen, false, 3), 8902);
    }

    #[test]
    fn perft_kiwipete() {
        let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        assert_eq!(perft_of(fen, false, 1), 48);
        assert_eq!(perft_of(fen, false, 2), 2039);
    }

    #[test]
    fn perft_rook_endgame_with_en_passant_pins() {
        let fen = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
        assert_eq!(perft_of(fen, false, 1), 14);
        assert_eq!(perft_of(fen, false, 2), 191);
        assert_eq!(perft_of(fen, false, 3), 2812);
    }

    #[test]
    fn perft_chess960() {
        let fen = "bqnb1rkr/pp3ppp/3ppn2/2p5/5P2/P2P4/NPP1P1PP/BQ1BNRKR w HFhf - 2 9";
        assert_eq!(perft_of(fen, true, 1), 21);
        assert_eq!(perft_of(fen, true, 2), 528);
    }

    #[test]
    fn test_castling() {
        let pos = from_fen("4k3/8/8/8/8/8/8/R3K2R w KQ - 0 1", false);
        let moves = MoveGenerator::new().generate_moves(&pos);
        assert!(moves.contains(&Move::new_castling(4, 7)));
        assert!(moves.contains(&Move::new_castling(4, 0)));

        // f1 attacked: no kingside castling.
        let pos = from_fen("4kr2/8/8/8/8/8/8/R3K2R w KQ - 0 1", false);
        let moves = MoveGenerator::new().generate_moves(&pos);
        assert!(!moves.contains(&Move::new_castling(4, 7)));
        assert!(moves.contains(&Move::new_castling(4, 0)));
    }

    #[test]
    fn test_en_passant() {
        let mut pos = Position::new();
        let mut states = new_state_list();
        pos.do_move(Move::new(12, 28), &mut states); // e2-e4
        pos.do_move(Move::new(51, 35), &mut states); // d7-d5
        pos.do_move(Move::new(28, 36), &mut states); // e4-e5
        pos.do_move(Move::new(53, 37), &mut states); // f7-f5

        let moves = MoveGenerator::new().generate_moves(&pos);
        assert!(moves.contains(&Move::new_en_passant(36, 45)));
    }

    #[test]
    fn test_promotion() {
        let pos = from_fen("4k3/P7/8/8/8/8/8/4K3 w - - 0 1", false);
        let promotions = MoveGenerator::new()
            .generate_moves(&pos)
            .into_iter()
            .filter(|m| m.move_type() == MoveType::Promotion)
            .count();
        // Should have 4 promotion options (Queen, Rook, Bishop, Knight)
        assert_eq!(promotions, 4);
    }

    #[test]
    fn test_checkmate_and_stalemate() {
        let generator = MoveGenerator::new();

        let cornered = from_fen("k7/8/1K6/8/8/8/8/1Q6 b - - 0 1", false);
        assert!(!generator.is_king_in_check(&cornered, Color::Black));
        assert_eq!(generator.generate_moves(&cornered).len(), 1);

        let mated = from_fen("k7/1Q6/1K6/8/8/8/8/8 b - - 0 1", false);
        assert!(generator.is_king_in_check(&mated, Color::Black));
        assert!(generator.generate_moves(&mated).is_empty());

        let stalemate = from_fen("k7/8/1Q6/8/8/8/8/7K b - - 0 1", false);
        assert!(!generator.is_king_in_check(&stalemate, Color::Black));
        assert!(generator.generate_moves(&stalemate).is_empty());
    }

    #[test]
    fn pinned_piece_cannot_move_off_the_line() {
        let pos = from_fen("4k3/4r3/8/8/8/8/4N3/4K3 w - - 0 1", false);
        let moves = MoveGenerator::new().generate_moves(&pos);
        assert!(moves.iter().all(|m| m.from_sq() != 12));
    }
}
