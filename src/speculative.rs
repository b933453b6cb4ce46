use log::{debug, warn};

use crate::board::{CastlingRights, Color, Position, StateList};
use crate::movegen::{Move, MoveGenerator, MoveType};
use crate::notation;
use crate::setup;

/// Result of the `move` debug command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The side to move is mated already.
    Checkmate { winner: Color },
    /// No legal moves and not in check.
    Stalemate,
    /// The token does not name a legal move.
    IllegalMove,
    /// The trial move produced a broken position.
    Inconsistent,
    /// Castling rights of the live position were replaced.
    RightsUpdated(CastlingRights),
}

impl Outcome {
    /// Text shown to the GUI, if any. Illegal input and a broken trial both
    /// read as a plain game over.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            Outcome::Checkmate { winner: Color::White } => Some("Game over: white wins"),
            Outcome::Checkmate { winner: Color::Black } => Some("Game over: black wins"),
            Outcome::Stalemate => Some("Game over: draw"),
            Outcome::IllegalMove | Outcome::Inconsistent => Some("Game over"),
            Outcome::RightsUpdated(_) => None,
        }
    }
}

/// Tries `token` on a scratch copy of `pos` and keeps only its effect on the
/// castling rights. The board of the live position never changes; the
/// position is re-seeded from its own FEN carrying the new rights, which
/// resets `states`.
pub fn make_move(
    pos: &mut Position,
    states: &mut StateList,
    token: &str,
    chess960: bool,
) -> Outcome {
    if MoveGenerator::new().generate_moves(pos).is_empty() {
        return if pos.in_check() {
            Outcome::Checkmate {
                winner: pos.side_to_move().opposite(),
            }
        } else {
            Outcome::Stalemate
        };
    }

    let m = notation::to_move(pos, token);
    if m == Move::NONE {
        debug!("speculative move '{token}' is not legal here");
        return Outcome::IllegalMove;
    }

    let us = pos.side_to_move();
    let mut trial = pos.clone();
    let mut trial_states = states.clone();
    trial.do_move(m, &mut trial_states);
    if !trial.pos_is_ok() {
        warn!("position after '{token}' failed the consistency check");
        return Outcome::Inconsistent;
    }

    let mut rights = trial.castling_rights();
    if m.move_type() == MoveType::Castling {
        rights.remove_side(us);
    }

    let fen = pos.fen_with_rights(rights);
    let tokens: Vec<&str> = std::iter::once("fen").chain(fen.split_whitespace()).collect();
    if let Err(e) = setup::apply_position_command(pos, states, &tokens, chess960) {
        warn!("cannot re-seed position from '{fen}': {e}");
        return Outcome::Inconsistent;
    }
    Outcome::RightsUpdated(rights)
}
