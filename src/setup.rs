use log::debug;

use crate::board::{new_state_list, Position, StateList};
use crate::fen::{FenError, START_FEN};
use crate::movegen::Move;
use crate::notation;

/// Applies the arguments of a `position` command:
/// `startpos [moves m1 m2 ...]` or `fen <fields> [moves m1 m2 ...]`.
///
/// The state chain is reset to a single record and grows by one per replayed
/// move. Replay stops at the first token that is not a legal move. A bad FEN
/// leaves both `pos` and `states` untouched.
pub fn apply_position_command(
    pos: &mut Position,
    states: &mut StateList,
    tokens: &[&str],
    chess960: bool,
) -> Result<(), FenError> {
    let (fen, moves) = match tokens.split_first() {
        // The token after `startpos` is taken to be `moves`.
        Some((&"startpos", rest)) => (START_FEN.to_string(), rest.get(1..).unwrap_or(&[])),
        Some((&"fen", rest)) => {
            let end = rest.iter().position(|&t| t == "moves").unwrap_or(rest.len());
            (rest[..end].join(" "), rest.get(end + 1..).unwrap_or(&[]))
        }
        _ => return Ok(()),
    };

    let mut new_pos = Position::new();
    let mut new_states = new_state_list();
    new_pos.set(&fen, chess960, &mut new_states[0])?;
    *pos = new_pos;
    *states = new_states;

    for &token in moves {
        let m = notation::to_move(pos, token);
        if m == Move::NONE {
            debug!("stopping move replay at '{token}'");
            break;
        }
        pos.do_move(m, states);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(tokens: &str, chess960: bool) -> (Position, StateList, Result<(), FenError>) {
        let mut pos = Position::new();
        let mut states = new_state_list();
        let tokens: Vec<&str> = tokens.split_whitespace().collect();
        let result = apply_position_command(&mut pos, &mut states, &tokens, chess960);
        (pos, states, result)
    }

    #[test]
    fn startpos_with_moves_matches_fen() {
        let (a, a_states, _) = apply("startpos moves e2e4 e7e5", false);
        let (b, b_states, _) = apply(
            "fen rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2",
            false,
        );
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
        assert_eq!(a_states.len(), 3);
        assert_eq!(b_states.len(), 1);
        assert_eq!(a_states.last().unwrap().key, a.key());
    }

    #[test]
    fn replay_stops_at_first_bad_token() {
        let (pos, states, result) = apply("startpos moves e2e4 e2e4 e7e5", false);
        assert!(result.is_ok());
        assert_eq!(states.len(), 2);
        assert_eq!(pos.fen(), "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1");
    }

    #[test]
    fn fen_with_moves() {
        let (pos, states, _) = apply("fen 4k3/8/8/8/8/8/8/R3K2R w KQ - 0 1 moves e1g1", false);
        assert_eq!(states.len(), 2);
        assert_eq!(pos.fen(), "4k3/8/8/8/8/8/8/R4RK1 b - - 1 1");
    }

    #[test]
    fn unknown_subcommand_is_a_no_op() {
        let mut pos = Position::new();
        let mut states = new_state_list();
        pos.do_move(notation::to_move(&pos, "d2d4"), &mut states);
        let before = pos.clone();
        assert!(apply_position_command(&mut pos, &mut states, &["middlegame"], false).is_ok());
        assert!(apply_position_command(&mut pos, &mut states, &[], false).is_ok());
        assert_eq!(pos, before);
        assert_eq!(states.len(), 2);
    }

    #[test]
    fn bad_fen_keeps_the_old_position() {
        let mut pos = Position::new();
        let mut states = new_state_list();
        let result = apply_position_command(&mut pos, &mut states, &["fen", "not/a/fen"], false);
        assert!(matches!(result, Err(FenError::Placement(_))));
        assert_eq!(pos, Position::new());
        let result = apply_position_command(&mut pos, &mut states, &["fen"], false);
        assert_eq!(result, Err(FenError::Empty));
    }

    #[test]
    fn chess960_flag_comes_from_the_caller() {
        let (pos, _, _) = apply(
            "fen bqnb1rkr/pp3ppp/3ppn2/2p5/5P2/P2P4/NPP1P1PP/BQ1BNRKR w HFhf - 2 9",
            true,
        );
        assert!(pos.is_chess960());
        assert_eq!(pos.fen(), "bqnb1rkr/pp3ppp/3ppn2/2p5/5P2/P2P4/NPP1P1PP/BQ1BNRKR w HFhf - 2 9");
    }
}
