use std::cmp::Reverse;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error};

use crate::board::{Piece, Position, StateList};
use crate::evaluation::Evaluator;
use crate::io::Printer;
use crate::learning::SharedExperience;
use crate::limits::{self, SearchLimits, TimeConfig};
use crate::movegen::{self, Move, MoveGenerator, MoveType};
use crate::notation;
use crate::transposition::{NodeType, TranspositionTable};

pub type Value = i32;

pub const VALUE_DRAW: Value = 0;
pub const VALUE_MATE: Value = 32000;
pub const VALUE_INFINITE: Value = 32001;
pub const MAX_PLY: Value = 128;
pub const PAWN_VALUE_EG: Value = 100;

pub fn mate_in(ply: i32) -> Value {
    VALUE_MATE - ply
}

pub fn mated_in(ply: i32) -> Value {
    -VALUE_MATE + ply
}

const MAX_PLY_USIZE: usize = MAX_PLY as usize;

/// Flags and counters shared by the dispatcher and the search thread.
#[derive(Debug, Default)]
pub struct SearchSignals {
    pub stop: AtomicBool,
    pub ponder: AtomicBool,
    pub stop_on_ponderhit: AtomicBool,
    nodes: AtomicU64,
    searching: Mutex<bool>,
    finished: Condvar,
}

impl SearchSignals {
    fn finish(&self) {
        let mut searching = self.searching.lock().unwrap_or_else(PoisonError::into_inner);
        *searching = false;
        self.finished.notify_all();
    }
}

/// Marks the search finished even if the worker unwinds.
struct FinishGuard(Arc<SearchSignals>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Everything one search run needs, moved onto the worker thread.
struct Worker {
    pos: Position,
    states: StateList,
    limits: SearchLimits,
    signals: Arc<SearchSignals>,
    tt: Arc<Mutex<TranspositionTable>>,
    experience: SharedExperience,
    printer: Printer,
    time_config: TimeConfig,
}

impl Worker {
    fn run(mut self) {
        if let Some(depth) = self.limits.perft {
            self.run_perft(depth);
            return;
        }

        let root = self.pos.clone();
        let experience_move = {
            let book = self.experience.lock().unwrap_or_else(PoisonError::into_inner);
            book.lookup(&root)
                .map_or(Move::NONE, |e| notation::to_move(&root, &e.best_move))
        };
        let deadline = limits::allocate(&self.limits, root.side_to_move(), self.time_config);

        let result = {
            let mut tt = self.tt.lock().unwrap_or_else(PoisonError::into_inner);
            let mut search =
                Search::new(&mut tt, &self.signals, &self.limits, deadline, &self.printer);
            search.experience_move = experience_move;
            search.iterative_deepening(&mut self.pos, &mut self.states)
        };

        // While pondering or in infinite mode the best move is only sent
        // after `stop` or `ponderhit`.
        while !self.signals.stop.load(Ordering::SeqCst)
            && (self.signals.ponder.load(Ordering::SeqCst) || self.limits.infinite)
        {
            self.signals.stop_on_ponderhit.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(1));
        }

        if result.best_move.is_ok() {
            let mut book = self.experience.lock().unwrap_or_else(PoisonError::into_inner);
            let text = notation::move_to_uci(result.best_move, root.is_chess960());
            book.record(&root, &text, result.score, result.depth);
        }

        let chess960 = root.is_chess960();
        let mut line = format!("bestmove {}", notation::move_to_uci(result.best_move, chess960));
        if result.ponder_move.is_ok() {
            let ponder = notation::move_to_uci(result.ponder_move, chess960);
            line.push_str(&format!(" ponder {ponder}"));
        }
        self.printer.line(line);
    }

    fn run_perft(&mut self, depth: u32) {
        let chess960 = self.pos.is_chess960();
        let mut total = 0;
        for (m, nodes) in movegen::perft_divide(&mut self.pos, &mut self.states, depth) {
            self.printer.line(format!("{}: {nodes}", notation::move_to_uci(m, chess960)));
            total += nodes;
        }
        self.printer.line("");
        self.printer.line(format!("Nodes searched: {total}"));
        self.signals.nodes.store(total, Ordering::SeqCst);
    }
}

struct SearchResult {
    best_move: Move,
    ponder_move: Move,
    score: Value,
    depth: u32,
}

/// One iterative deepening run on the worker thread.
struct Search<'a> {
    evaluator: Evaluator,
    move_generator: MoveGenerator,
    tt: &'a mut TranspositionTable,
    signals: &'a SearchSignals,
    limits: &'a SearchLimits,
    deadline: Option<Duration>,
    printer: &'a Printer,
    nodes: u64,
    seldepth: usize,
    stopped: bool,
    pv: Vec<Vec<Move>>,
    root_moves: Vec<Move>,
    experience_move: Move,
}

impl<'a> Search<'a> {
    fn new(
        tt: &'a mut TranspositionTable,
        signals: &'a SearchSignals,
        limits: &'a SearchLimits,
        deadline: Option<Duration>,
        printer: &'a Printer,
    ) -> Self {
        Self {
            evaluator: Evaluator::new(),
            move_generator: MoveGenerator::new(),
            tt,
            signals,
            limits,
            deadline,
            printer,
            nodes: 0,
            seldepth: 0,
            stopped: false,
            pv: vec![Vec::new(); MAX_PLY_USIZE + 2],
            root_moves: Vec::new(),
            experience_move: Move::NONE,
        }
    }

    fn iterative_deepening(&mut self, pos: &mut Position, states: &mut StateList) -> SearchResult {
        let mut result = SearchResult {
            best_move: Move::NONE,
            ponder_move: Move::NONE,
            score: VALUE_DRAW,
            depth: 0,
        };

        self.root_moves = self.move_generator.generate_moves(pos);
        let limits = self.limits;
        if !limits.searchmoves.is_empty() {
            self.root_moves.retain(|m| limits.searchmoves.contains(m));
        }
        if self.root_moves.is_empty() {
            let score = if pos.in_check() { mated_in(0) } else { VALUE_DRAW };
            self.printer.line(format!("info depth 0 score {}", notation::value(score)));
            return result;
        }

        let hint = self.tt.best_move(pos.key());
        let mut root_moves = std::mem::take(&mut self.root_moves);
        self.order_moves(pos, &mut root_moves, hint, self.experience_move);
        self.root_moves = root_moves;
        result.best_move = self.root_moves[0];

        let max_depth = self
            .limits
            .depth
            .unwrap_or(MAX_PLY as u32 - 1)
            .clamp(1, MAX_PLY as u32 - 1);
        let chess960 = pos.is_chess960();

        for depth in 1..=max_depth {
            self.seldepth = 0;
            let score = self.negamax(pos, states, depth, -VALUE_INFINITE, VALUE_INFINITE, 0);
            if self.stopped {
                break;
            }

            let pv = self.pv[0].clone();
            if let Some(&best) = pv.first() {
                result.best_move = best;
                self.root_moves.retain(|&m| m != best);
                self.root_moves.insert(0, best);
            }
            result.ponder_move = pv.get(1).copied().unwrap_or(Move::NONE);
            result.score = score;
            result.depth = depth;

            let elapsed = self.limits.start_time.elapsed();
            let ms = elapsed.as_millis() as u64;
            let pv_text: Vec<String> =
                pv.iter().map(|&m| notation::move_to_uci(m, chess960)).collect();
            self.printer.line(format!(
                "info depth {depth} seldepth {} score {} nodes {} nps {} hashfull {} time {ms} pv {}",
                self.seldepth,
                notation::value(score),
                self.nodes,
                self.nodes * 1000 / ms.max(1),
                self.tt.hashfull(),
                pv_text.join(" ")
            ));

            if let Some(mate) = self.limits.mate {
                if score >= VALUE_MATE - 2 * mate.min(MAX_PLY as u32) as Value {
                    break;
                }
            }
            // Not worth starting an iteration that cannot finish.
            if let Some(deadline) = self.deadline {
                if !self.signals.ponder.load(Ordering::Relaxed) && elapsed > deadline / 2 {
                    break;
                }
            }
        }

        if !result.ponder_move.is_ok() {
            result.ponder_move = self.ponder_from_tt(pos, states, result.best_move);
        }
        self.signals.nodes.store(self.nodes, Ordering::SeqCst);
        debug!("search finished after {} nodes", self.nodes);
        result
    }

    /// Reply to `best` remembered by the table, if still legal.
    fn ponder_from_tt(&self, pos: &mut Position, states: &mut StateList, best: Move) -> Move {
        if !best.is_ok() {
            return Move::NONE;
        }
        pos.do_move(best, states);
        let reply = self.tt.best_move(pos.key());
        let legal = reply.is_ok() && self.move_generator.generate_moves(pos).contains(&reply);
        pos.undo_move(best, states);
        if legal {
            reply
        } else {
            Move::NONE
        }
    }

    /// Counts a node and decides whether the search must unwind.
    fn enter_node(&mut self) -> bool {
        self.nodes += 1;
        if self.stopped {
            return false;
        }
        if self.limits.nodes.is_some_and(|limit| self.nodes >= limit) {
            self.stopped = true;
        }
        if self.nodes % 1024 == 0 {
            self.signals.nodes.store(self.nodes, Ordering::Relaxed);
            if self.signals.stop.load(Ordering::Relaxed) {
                self.stopped = true;
            }
            if let Some(deadline) = self.deadline {
                if !self.signals.ponder.load(Ordering::Relaxed)
                    && self.limits.start_time.elapsed() >= deadline
                {
                    self.stopped = true;
                }
            }
        }
        !self.stopped
    }

    fn is_draw(&self, pos: &Position, states: &StateList) -> bool {
        if pos.halfmove_clock() >= 100 {
            return true;
        }
        let key = pos.key();
        let n = states.len();
        let reach = (pos.halfmove_clock() as usize).min(n - 1);
        (4..=reach).step_by(2).any(|i| states[n - 1 - i].key == key)
    }

    fn negamax(
        &mut self,
        pos: &mut Position,
        states: &mut StateList,
        depth: u32,
        mut alpha: Value,
        mut beta: Value,
        ply: usize,
    ) -> Value {
        self.pv[ply].clear();
        let in_check = pos.in_check();
        if depth == 0 && !in_check {
            return self.quiescence(pos, states, alpha, beta, ply);
        }
        let depth = depth.max(1);

        if !self.enter_node() {
            return VALUE_DRAW;
        }
        self.seldepth = self.seldepth.max(ply);

        if ply > 0 {
            if self.is_draw(pos, states) {
                return VALUE_DRAW;
            }
            // Mate distance pruning
            alpha = alpha.max(mated_in(ply as i32));
            beta = beta.min(mate_in(ply as i32 + 1));
            if alpha >= beta {
                return alpha;
            }
        }
        if ply >= MAX_PLY_USIZE - 1 {
            return self.evaluator.evaluate(pos);
        }

        let key = pos.key();
        if ply > 0 {
            if let Some(score) = self.tt.probe(key, depth, alpha, beta, ply) {
                return score;
            }
        }

        // Root moves keep the previous iteration's best first.
        let moves = if ply == 0 {
            self.root_moves.clone()
        } else {
            let mut moves = self.move_generator.generate_moves(pos);
            self.order_moves(pos, &mut moves, self.tt.best_move(key), Move::NONE);
            moves
        };
        if moves.is_empty() {
            return if in_check { mated_in(ply as i32) } else { VALUE_DRAW };
        }

        let original_alpha = alpha;
        let mut best_score = -VALUE_INFINITE;
        let mut best_move = Move::NONE;

        for m in moves {
            pos.do_move(m, states);
            let score = -self.negamax(pos, states, depth - 1, -beta, -alpha, ply + 1);
            pos.undo_move(m, states);

            if self.stopped {
                return VALUE_DRAW;
            }

            if score > best_score {
                best_score = score;
                best_move = m;
                if score > alpha {
                    alpha = score;
                    self.update_pv(ply, m);
                    if alpha >= beta {
                        break;
                    }
                }
            }
        }

        let node_type = if best_score <= original_alpha {
            NodeType::UpperBound
        } else if best_score >= beta {
            NodeType::LowerBound
        } else {
            NodeType::Exact
        };
        self.tt.store(key, depth, best_score, node_type, best_move, ply);

        best_score
    }

    fn quiescence(
        &mut self,
        pos: &mut Position,
        states: &mut StateList,
        mut alpha: Value,
        beta: Value,
        ply: usize,
    ) -> Value {
        self.pv[ply].clear();
        if !self.enter_node() {
            return VALUE_DRAW;
        }
        self.seldepth = self.seldepth.max(ply);
        if ply >= MAX_PLY_USIZE - 1 {
            return self.evaluator.evaluate(pos);
        }

        let in_check = pos.in_check();
        let mut moves = self.move_generator.generate_moves(pos);
        if moves.is_empty() {
            return if in_check { mated_in(ply as i32) } else { VALUE_DRAW };
        }

        if !in_check {
            let stand_pat = self.evaluator.evaluate(pos);
            if stand_pat >= beta {
                return stand_pat;
            }
            alpha = alpha.max(stand_pat);
            // Only consider captures and promotions
            moves.retain(|&m| is_capture(&*pos, m) || m.move_type() == MoveType::Promotion);
        }
        self.order_moves(pos, &mut moves, Move::NONE, Move::NONE);

        for m in moves {
            pos.do_move(m, states);
            let score = -self.quiescence(pos, states, -beta, -alpha, ply + 1);
            pos.undo_move(m, states);

            if self.stopped {
                return VALUE_DRAW;
            }
            if score >= beta {
                return score;
            }
            if score > alpha {
                alpha = score;
                self.update_pv(ply, m);
            }
        }

        alpha
    }

    fn update_pv(&mut self, ply: usize, m: Move) {
        let (head, tail) = self.pv.split_at_mut(ply + 1);
        let line = &mut head[ply];
        line.clear();
        line.push(m);
        line.extend_from_slice(&tail[0]);
    }

    /// Hash move, then the learned move, then captures by MVV/LVA and
    /// promotions; quiet moves keep generation order.
    fn order_moves(&self, pos: &Position, moves: &mut [Move], hash_move: Move, learned: Move) {
        moves.sort_by_cached_key(|&m| {
            if m == hash_move {
                return Reverse(i32::MAX);
            }
            if m == learned {
                return Reverse(i32::MAX - 1);
            }
            let mut score = 0;
            if let Some(victim) = captured_piece(pos, m) {
                let attacker = pos.piece_at(m.from_sq()).map_or(0, |(p, _)| p.index() as i32);
                score += 1_000_000 + self.evaluator.piece_value(victim) * 8 - attacker;
            }
            if let Some(promotion) = m.promotion_piece() {
                score += self.evaluator.piece_value(promotion);
            }
            Reverse(score)
        });
    }
}

fn captured_piece(pos: &Position, m: Move) -> Option<Piece> {
    match m.move_type() {
        MoveType::Castling => None,
        MoveType::EnPassant => Some(Piece::Pawn),
        _ => pos.piece_at(m.to_sq()).map(|(piece, _)| piece),
    }
}

fn is_capture(pos: &Position, m: Move) -> bool {
    captured_piece(pos, m).is_some()
}

/// Owner of the search thread and of the state it shares with it.
pub struct SearchManager {
    signals: Arc<SearchSignals>,
    tt: Arc<Mutex<TranspositionTable>>,
    experience: SharedExperience,
    printer: Printer,
    time_config: TimeConfig,
    handle: Option<JoinHandle<()>>,
    unbounded: bool,
}

impl SearchManager {
    pub fn new(hash_mb: usize, printer: Printer, experience: SharedExperience) -> Self {
        Self {
            signals: Arc::new(SearchSignals::default()),
            tt: Arc::new(Mutex::new(TranspositionTable::new(hash_mb))),
            experience,
            printer,
            time_config: TimeConfig::default(),
            handle: None,
            unbounded: false,
        }
    }

    /// Starts searching a snapshot of `pos` in the background and returns
    /// immediately. A search still running is waited for first.
    pub fn start_thinking(
        &mut self,
        pos: &Position,
        states: &StateList,
        limits: SearchLimits,
        ponder_mode: bool,
    ) {
        self.wait_for_search_finished();

        let signals = &self.signals;
        signals.stop.store(false, Ordering::SeqCst);
        signals.ponder.store(ponder_mode, Ordering::SeqCst);
        signals.stop_on_ponderhit.store(false, Ordering::SeqCst);
        signals.nodes.store(0, Ordering::SeqCst);
        *signals.searching.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.unbounded = limits.infinite || ponder_mode;

        debug!("starting search, ponder: {ponder_mode}, limits: {limits:?}");
        let worker = Worker {
            pos: pos.clone(),
            states: states.clone(),
            limits,
            signals: Arc::clone(&self.signals),
            tt: Arc::clone(&self.tt),
            experience: Arc::clone(&self.experience),
            printer: self.printer.clone(),
            time_config: self.time_config,
        };
        let guard = FinishGuard(Arc::clone(&self.signals));
        let spawned = thread::Builder::new().name("search".into()).spawn(move || {
            let _guard = guard;
            worker.run();
        });
        match spawned {
            Ok(handle) => self.handle = Some(handle),
            Err(e) => error!("cannot start search thread: {e}"),
        }
    }

    pub fn wait_for_search_finished(&mut self) {
        {
            let signals = &self.signals;
            let mut searching = signals.searching.lock().unwrap_or_else(PoisonError::into_inner);
            while *searching {
                searching = signals
                    .finished
                    .wait(searching)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("search thread panicked");
            }
        }
    }

    pub fn is_searching(&self) -> bool {
        *self.signals.searching.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stop(&self) {
        self.signals.stop.store(true, Ordering::SeqCst);
    }

    /// Switches a pondering search to normal mode.
    pub fn ponderhit(&self) {
        self.signals.ponder.store(false, Ordering::SeqCst);
    }

    pub fn stop_on_ponderhit(&self) -> bool {
        self.signals.stop_on_ponderhit.load(Ordering::SeqCst)
    }

    pub fn nodes_searched(&self) -> u64 {
        self.signals.nodes.load(Ordering::SeqCst)
    }

    /// Ends the current search for teardown. Searches that only end on
    /// `stop` are stopped, the others run to completion.
    pub fn finish(&mut self) {
        if self.unbounded {
            self.stop();
        }
        self.wait_for_search_finished();
    }

    /// Forgets everything learned in previous searches.
    pub fn clear(&mut self) {
        self.wait_for_search_finished();
        self.tt.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn resize_hash(&mut self, megabytes: usize) {
        self.wait_for_search_finished();
        let mut tt = self.tt.lock().unwrap_or_else(PoisonError::into_inner);
        tt.resize(megabytes);
        debug!("transposition table holds up to {} entries", tt.capacity());
    }

    pub fn set_time_config(&mut self, config: TimeConfig) {
        self.time_config = config;
    }
}

impl Drop for SearchManager {
    fn drop(&mut self) {
        self.stop();
        self.wait_for_search_finished();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{new_state_list, StateInfo};
    use crate::io::CaptureBuffer;
    use crate::learning::ExperienceBook;
    use std::time::Instant;

    fn setup(fen: &str) -> (Position, StateList) {
        let mut pos = Position::new();
        let mut states = new_state_list();
        pos.set(fen, false, &mut states[0]).expect("valid fen");
        (pos, states)
    }

    fn manager() -> (SearchManager, CaptureBuffer, SharedExperience) {
        let buffer = CaptureBuffer::default();
        let experience = ExperienceBook::shared();
        let manager = SearchManager::new(1, Printer::new(buffer.clone()), Arc::clone(&experience));
        (manager, buffer, experience)
    }

    fn depth_limit(depth: u32) -> SearchLimits {
        let mut limits = SearchLimits::new(Instant::now());
        limits.depth = Some(depth);
        limits
    }

    #[test]
    fn finds_mate_in_one() {
        let (mut manager, buffer, _) = manager();
        let (pos, states) = setup("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1");
        manager.start_thinking(&pos, &states, depth_limit(3), false);
        manager.wait_for_search_finished();

        let output = buffer.contents();
        assert!(output.contains("score mate 1"), "{output}");
        assert!(output.lines().last().unwrap().starts_with("bestmove a1a8"), "{output}");
        assert!(manager.nodes_searched() > 0);
    }

    #[test]
    fn reports_no_move_without_legal_moves() {
        let (mut manager, buffer, _) = manager();
        let (pos, states) = setup("k7/8/1Q6/8/8/8/8/7K b - - 0 1");
        manager.start_thinking(&pos, &states, depth_limit(3), false);
        manager.wait_for_search_finished();
        assert_eq!(buffer.contents(), "info depth 0 score cp 0\nbestmove (none)\n");

        let (pos, states) = setup("k7/1Q6/1K6/8/8/8/8/8 b - - 0 1");
        buffer.take();
        manager.start_thinking(&pos, &states, depth_limit(3), false);
        manager.wait_for_search_finished();
        assert_eq!(buffer.contents(), "info depth 0 score mate 0\nbestmove (none)\n");
    }

    #[test]
    fn searchmoves_restricts_the_root() {
        let (mut manager, buffer, _) = manager();
        let (pos, states) = setup(crate::fen::START_FEN);
        let mut limits = depth_limit(2);
        limits.searchmoves = vec![notation::to_move(&pos, "a2a3")];
        manager.start_thinking(&pos, &states, limits, false);
        manager.wait_for_search_finished();
        assert!(buffer.contents().contains("bestmove a2a3"));
    }

    #[test]
    fn node_limit_is_exact() {
        let (mut manager, _, _) = manager();
        let (pos, states) = setup(crate::fen::START_FEN);
        let mut limits = SearchLimits::new(Instant::now());
        limits.nodes = Some(500);
        manager.start_thinking(&pos, &states, limits, false);
        manager.wait_for_search_finished();
        assert_eq!(manager.nodes_searched(), 500);
    }

    #[test]
    fn infinite_search_waits_for_stop() {
        let (mut manager, buffer, _) = manager();
        let (pos, states) = setup(crate::fen::START_FEN);
        let mut limits = depth_limit(1);
        limits.infinite = true;
        manager.start_thinking(&pos, &states, limits, false);

        thread::sleep(Duration::from_millis(50));
        assert!(manager.is_searching());
        assert!(!buffer.contents().contains("bestmove"));

        manager.stop();
        manager.wait_for_search_finished();
        assert!(!manager.is_searching());
        assert!(buffer.contents().contains("bestmove"));
    }

    #[test]
    fn ponderhit_after_completion_stops() {
        let (mut manager, buffer, _) = manager();
        let (pos, states) = setup(crate::fen::START_FEN);
        manager.start_thinking(&pos, &states, depth_limit(1), true);

        let start = Instant::now();
        while !manager.stop_on_ponderhit() && start.elapsed() < Duration::from_secs(10) {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(manager.stop_on_ponderhit());
        assert!(!buffer.contents().contains("bestmove"));

        // What the dispatcher does on `ponderhit` in this state.
        manager.stop();
        manager.wait_for_search_finished();
        assert!(buffer.contents().contains("bestmove"));
    }

    #[test]
    fn perft_prints_divide_and_counts_nodes() {
        let (mut manager, buffer, _) = manager();
        let (pos, states) = setup(crate::fen::START_FEN);
        let mut limits = SearchLimits::new(Instant::now());
        limits.perft = Some(2);
        manager.start_thinking(&pos, &states, limits, false);
        manager.wait_for_search_finished();

        let output = buffer.contents();
        assert!(output.contains("e2e4: 20"));
        assert!(output.ends_with("\nNodes searched: 400\n"));
        assert!(!output.contains("bestmove"));
        assert_eq!(manager.nodes_searched(), 400);
    }

    #[test]
    fn records_experience_while_learning() {
        let (mut manager, _, experience) = manager();
        experience.lock().unwrap().start();
        let (pos, states) = setup("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1");
        manager.start_thinking(&pos, &states, depth_limit(2), false);
        manager.wait_for_search_finished();

        let book = experience.lock().unwrap();
        let entry = book.lookup(&pos).expect("recorded");
        assert_eq!(entry.best_move, "a1a8");
        assert_eq!(entry.depth, 2);
    }

    #[test]
    fn repetition_is_a_draw() {
        let (mut pos, mut states) = setup("7k/8/8/8/8/8/8/R6K w - - 0 1");
        for text in ["a1a2", "h8g8", "a2a1", "g8h8"] {
            let m = notation::to_move(&pos, text);
            pos.do_move(m, &mut states);
        }
        let signals = SearchSignals::default();
        let limits = depth_limit(1);
        let printer = Printer::new(CaptureBuffer::default());
        let mut tt = TranspositionTable::new(1);
        let search = Search::new(&mut tt, &signals, &limits, None, &printer);
        assert!(search.is_draw(&pos, &states));

        let mut st = StateInfo::default();
        pos.set("7k/8/8/8/8/8/8/R6K w - - 0 1", false, &mut st).unwrap();
        assert!(!search.is_draw(&pos, &new_state_list()));
    }
}
