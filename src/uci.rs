use std::io::BufRead;
use std::path::Path;
use std::str::FromStr;
use std::sync::{MutexGuard, PoisonError};
use std::time::Instant;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::bench::{self, BenchReport};
use crate::board::{new_state_list, Position, StateList};
use crate::evaluation::Evaluator;
use crate::io::Printer;
use crate::learning::{ExperienceBook, SharedExperience};
use crate::limits::SearchLimits;
use crate::movegen::Move;
use crate::notation;
use crate::options::{OnChange, OptionError, OptionTable};
use crate::search::SearchManager;
use crate::setup;
use crate::speculative;

/// Whether the command loop keeps reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Engine context owned by the command loop.
pub struct UciHandler {
    pos: Position,
    states: StateList,
    options: OptionTable,
    search: SearchManager,
    experience: SharedExperience,
    evaluator: Evaluator,
    out: Printer,
}

impl Default for UciHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl UciHandler {
    pub fn new() -> Self {
        Self::with_printer(Printer::stdout())
    }

    pub fn with_printer(out: Printer) -> Self {
        let options = OptionTable::new();
        let experience = ExperienceBook::shared();
        let mut search = SearchManager::new(options.hash_mb(), out.clone(), experience.clone());
        search.set_time_config(options.time_config());
        UciHandler {
            pos: Position::new(),
            states: new_state_list(),
            options,
            search,
            experience,
            evaluator: Evaluator::new(),
            out,
        }
    }

    pub fn position(&self) -> &Position {
        &self.pos
    }

    pub fn options(&self) -> &OptionTable {
        &self.options
    }

    /// Runs the command loop. With `args` present they form one command that
    /// is executed on its own and `input` is never read. End of input counts
    /// as `quit`.
    pub fn run<R: BufRead>(&mut self, input: R, args: &[String]) -> Result<()> {
        if !args.is_empty() {
            self.handle_command(&args.join(" "));
            self.search.finish();
            return Ok(());
        }

        let mut quit = false;
        for line in input.lines() {
            let line = line.context("failed to read command")?;
            if self.handle_command(&line) == Flow::Quit {
                quit = true;
                break;
            }
        }
        if !quit {
            debug!("end of input");
            self.handle_command("quit");
        }
        self.search.wait_for_search_finished();
        Ok(())
    }

    pub fn handle_command(&mut self, line: &str) -> Flow {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let (command, args) = match tokens.split_first() {
            Some((command, args)) => (*command, args),
            None => ("", &[][..]),
        };
        debug!("command: {line}");

        match command {
            "quit" | "stop" => {
                self.stop();
                if command == "quit" {
                    return Flow::Quit;
                }
            }
            // A search that completed while pondering only waits for this.
            "ponderhit" => {
                if self.search.stop_on_ponderhit() {
                    self.stop();
                } else {
                    self.search.ponderhit();
                }
            }
            "uci" => {
                self.out.line(crate::engine_info(true));
                for option in self.options.iter() {
                    self.out.line(option.to_string());
                }
                self.out.line("uciok");
            }
            "setoption" => self.setoption(args),
            "go" => self.go(args),
            "position" => self.set_position(args),
            "ucinewgame" => self.search.clear(),
            "isready" => self.out.line("readyok"),
            "flip" => self.flip(),
            "bench" => {
                self.bench(args);
            }
            "d" => self.out.line(self.pos.to_string()),
            "eval" => self.out.line(self.evaluator.trace(&self.pos)),
            "move" => self.speculative_move(args),
            "learning" => self.learning(args),
            _ => {
                warn!("unknown command '{line}'");
                self.out.line(format!("Unknown command: {line}"));
            }
        }
        Flow::Continue
    }

    fn experience(&self) -> MutexGuard<'_, ExperienceBook> {
        self.experience.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stop(&mut self) {
        self.search.stop();
        self.experience().exit();
    }

    fn setoption(&mut self, args: &[&str]) {
        let mut tokens = args.iter().copied();
        // Skips "name".
        tokens.next();
        let name: Vec<&str> = tokens.by_ref().take_while(|&t| t != "value").collect();
        let value: Vec<&str> = tokens.collect();
        let (name, value) = (name.join(" "), value.join(" "));

        match self.options.set(&name, &value) {
            Ok(Some(change)) => self.apply_option_change(change),
            Ok(None) => debug!("option {name} set to '{value}'"),
            Err(e @ OptionError::NoSuchOption(_)) => {
                warn!("{e}");
                self.out.line(e.to_string());
            }
            Err(e) => {
                warn!("{e}");
                self.out.info_string(e.to_string());
            }
        }
    }

    fn apply_option_change(&mut self, change: OnChange) {
        match change {
            OnChange::ResizeHash(mb) => {
                self.search.resize_hash(mb);
                info!("hash resized to {mb} MB");
            }
            OnChange::ClearHash => self.search.clear(),
            OnChange::Timing(config) => self.search.set_time_config(config),
        }
    }

    fn go(&mut self, args: &[&str]) {
        let mut limits = SearchLimits::new(Instant::now());
        let mut ponder_mode = false;

        fn next<T: FromStr>(tokens: &mut std::slice::Iter<'_, &str>) -> Option<T> {
            tokens.next().and_then(|t| t.parse().ok())
        }

        let mut tokens = args.iter();
        while let Some(&token) = tokens.next() {
            match token {
                "searchmoves" => {
                    for &t in tokens.by_ref() {
                        let m = notation::to_move(&self.pos, t);
                        if m != Move::NONE {
                            limits.searchmoves.push(m);
                        }
                    }
                }
                "wtime" => limits.time[0] = next(&mut tokens),
                "btime" => limits.time[1] = next(&mut tokens),
                "winc" => limits.inc[0] = next(&mut tokens),
                "binc" => limits.inc[1] = next(&mut tokens),
                "movestogo" => limits.movestogo = next(&mut tokens),
                "depth" => limits.depth = next(&mut tokens),
                "nodes" => limits.nodes = next(&mut tokens),
                "movetime" => limits.movetime = next(&mut tokens),
                "mate" => limits.mate = next(&mut tokens),
                "perft" => limits.perft = next(&mut tokens),
                "infinite" => limits.infinite = true,
                "ponder" => ponder_mode = true,
                other => debug!("ignoring go token '{other}'"),
            }
        }

        self.search.start_thinking(&self.pos, &self.states, limits, ponder_mode);
    }

    fn set_position(&mut self, args: &[&str]) {
        let chess960 = self.options.chess960();
        let result = setup::apply_position_command(&mut self.pos, &mut self.states, args, chess960);
        if let Err(e) = result {
            warn!("rejected position: {e}");
            self.out.info_string(format!("Invalid position: {e}"));
        }
    }

    fn flip(&mut self) {
        self.pos.flip();
        self.states = new_state_list();
        self.states[0].key = self.pos.key();
    }

    fn speculative_move(&mut self, args: &[&str]) {
        let token = args.first().copied().unwrap_or("");
        let chess960 = self.options.chess960();
        let outcome = speculative::make_move(&mut self.pos, &mut self.states, token, chess960);
        debug!("move {token}: {outcome:?}");
        if let Some(message) = outcome.message() {
            self.out.line(message);
        }
    }

    fn learning(&mut self, args: &[&str]) {
        let path = self.options.experience_file().to_string();
        for &token in args {
            let result = match token {
                "start" => {
                    self.experience().start();
                    Ok(())
                }
                "end" => {
                    self.experience().end();
                    Ok(())
                }
                "clear" => {
                    self.experience().clear();
                    Ok(())
                }
                "save" => self.experience().save(Path::new(&path)).map(|n| {
                    self.out.info_string(format!("saved {n} positions to {path}"));
                }),
                "load" => self.experience().load(Path::new(&path)).map(|n| {
                    self.out.info_string(format!("loaded {n} positions from {path}"));
                }),
                other => {
                    debug!("ignoring learning token '{other}'");
                    Ok(())
                }
            };
            if let Err(e) = result {
                warn!("{e}");
                self.out.info_string(e.to_string());
            }
        }
        let book = self.experience();
        debug!("learning session active: {}, {} positions", book.is_active(), book.len());
    }

    /// Runs the bench script through the regular handlers, one search at a
    /// time. Progress and totals go to stderr.
    pub fn bench(&mut self, args: &[&str]) -> Option<BenchReport> {
        let list = match bench::setup_bench(&self.pos, args) {
            Ok(list) => list,
            Err(e) => {
                warn!("cannot set up bench: {e}");
                self.out.info_string(format!("Unable to open bench file: {e}"));
                return None;
            }
        };

        let total = list.iter().filter(|c| c.starts_with("go ")).count();
        let mut count = 0;
        let mut nodes = 0;
        let start = Instant::now();

        for command in &list {
            let tokens: Vec<&str> = command.split_whitespace().collect();
            let Some((&token, args)) = tokens.split_first() else {
                continue;
            };
            match token {
                "go" => {
                    count += 1;
                    eprintln!("\nPosition: {count}/{total}");
                    self.go(args);
                    self.search.wait_for_search_finished();
                    nodes += self.search.nodes_searched();
                }
                "setoption" => self.setoption(args),
                "position" => self.set_position(args),
                "ucinewgame" => self.search.clear(),
                "eval" => self.out.line(self.evaluator.trace(&self.pos)),
                _ => {}
            }
        }

        let report = BenchReport::new(start.elapsed().as_millis() as u64, nodes);
        eprintln!("{report}");
        info!("bench: {} nodes in {} ms", report.nodes, report.elapsed_ms);
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::CaptureBuffer;
    use std::io::Cursor;

    fn handler() -> (UciHandler, CaptureBuffer) {
        let buffer = CaptureBuffer::default();
        (UciHandler::with_printer(Printer::new(buffer.clone())), buffer)
    }

    #[test]
    fn uci_lists_identity_and_options() {
        let (mut uci, out) = handler();
        uci.handle_command("uci");
        let text = out.take();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("id name Salmon"));
        assert!(lines[1].starts_with("id author "));
        assert!(lines.contains(&"option name Hash type spin default 16 min 1 max 1024"));
        assert_eq!(lines.last(), Some(&"uciok"));
    }

    #[test]
    fn isready_and_unknown_commands() {
        let (mut uci, out) = handler();
        assert_eq!(uci.handle_command("isready"), Flow::Continue);
        assert_eq!(uci.handle_command("castle please"), Flow::Continue);
        assert_eq!(uci.handle_command(""), Flow::Continue);
        assert_eq!(out.take(), "readyok\nUnknown command: castle please\nUnknown command: \n");
        assert_eq!(uci.handle_command("quit"), Flow::Quit);
    }

    #[test]
    fn startpos_moves_print_like_fen() {
        let (mut uci, out) = handler();
        uci.handle_command("position startpos moves e2e4 e7e5");
        uci.handle_command("d");
        let by_moves = out.take();
        let fen = "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2";
        uci.handle_command(&format!("position fen {fen}"));
        uci.handle_command("d");
        assert_eq!(by_moves, out.take());
    }

    #[test]
    fn bad_fen_is_reported() {
        let (mut uci, out) = handler();
        uci.handle_command("position fen 9/8/8/8/8/8/8/8 w - - 0 1");
        assert!(out.take().starts_with("info string Invalid position:"));
        assert_eq!(uci.position(), &Position::new());
    }

    #[test]
    fn setoption_joins_names_and_values() {
        let (mut uci, out) = handler();
        uci.handle_command("setoption name Experience File value my games.json");
        uci.handle_command("setoption name Move Overhead value 100");
        assert_eq!(uci.options().experience_file(), "my games.json");
        assert_eq!(uci.options().get("Move Overhead").map(|o| o.value()), Some("100"));
        assert!(out.take().is_empty());
    }

    #[test]
    fn setoption_rejects_unknown_names() {
        let (mut uci, out) = handler();
        let before: Vec<String> = uci.options().iter().map(|o| o.value().to_string()).collect();
        uci.handle_command("setoption name NoSuchOption value 1");
        assert_eq!(out.take(), "No such option: NoSuchOption\n");
        let after: Vec<String> = uci.options().iter().map(|o| o.value().to_string()).collect();
        assert_eq!(before, after);

        uci.handle_command("setoption name Hash value huge");
        assert!(out.take().starts_with("info string Invalid value 'huge'"));
    }

    #[test]
    fn go_depth_reports_bestmove() {
        let (mut uci, out) = handler();
        uci.handle_command("position startpos");
        uci.handle_command("go depth 2");
        uci.search.wait_for_search_finished();
        let text = out.take();
        assert!(text.contains("info depth 2 "));
        assert!(text.lines().last().is_some_and(|l| l.starts_with("bestmove ")));
    }

    #[test]
    fn go_searchmoves_restricts_root() {
        let (mut uci, out) = handler();
        uci.handle_command("go depth 2 searchmoves a2a3 bogus");
        uci.search.wait_for_search_finished();
        assert!(out.take().lines().any(|l| l.starts_with("bestmove a2a3")));
    }

    #[test]
    fn stop_ends_infinite_search() {
        let (mut uci, out) = handler();
        uci.handle_command("go infinite");
        assert!(uci.search.is_searching());
        uci.handle_command("isready");
        uci.handle_command("stop");
        uci.search.wait_for_search_finished();
        let text = out.take();
        assert!(text.contains("readyok"));
        assert!(text.lines().last().is_some_and(|l| l.starts_with("bestmove ")));
    }

    #[test]
    fn ponderhit_switches_to_normal_search() {
        let (mut uci, out) = handler();
        uci.handle_command("go ponder depth 1");
        uci.handle_command("ponderhit");
        uci.search.wait_for_search_finished();
        assert!(out.take().contains("bestmove "));
    }

    #[test]
    fn oversized_go_values_still_answer() {
        let (mut uci, out) = handler();
        uci.handle_command("go depth 2 mate 2000000000");
        uci.search.wait_for_search_finished();
        assert!(out.take().lines().any(|l| l.starts_with("bestmove ")));

        uci.handle_command("go depth 2 wtime 1000 winc 18446744073709551615");
        uci.search.wait_for_search_finished();
        assert!(out.take().lines().any(|l| l.starts_with("bestmove ")));
    }

    #[test]
    fn stop_and_quit_end_learning() {
        let (mut uci, _) = handler();
        uci.handle_command("learning start");
        assert!(uci.experience().is_active());
        uci.handle_command("stop");
        assert!(!uci.experience().is_active());

        uci.handle_command("learning start");
        assert_eq!(uci.handle_command("quit"), Flow::Quit);
        assert!(!uci.experience().is_active());
    }

    #[test]
    fn ponderhit_after_finished_ponder_search_ends_learning() {
        let (mut uci, out) = handler();
        uci.handle_command("learning start");
        uci.handle_command("go ponder depth 1");
        while !uci.search.stop_on_ponderhit() {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert!(uci.experience().is_active());
        uci.handle_command("ponderhit");
        assert!(!uci.experience().is_active());
        uci.search.wait_for_search_finished();
        assert!(out.take().contains("bestmove "));
    }

    #[test]
    fn speculative_castling_only_touches_rights() {
        let (mut uci, out) = handler();
        uci.handle_command("position fen r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        uci.handle_command("move e1g1");
        assert!(out.take().is_empty());
        assert_eq!(uci.position().fen(), "r3k2r/8/8/8/8/8/8/R3K2R w kq - 0 1");

        uci.handle_command("move e1e3");
        assert_eq!(out.take(), "Game over\n");
    }

    #[test]
    fn flip_and_eval() {
        let (mut uci, out) = handler();
        uci.handle_command("position startpos moves e2e4");
        uci.handle_command("flip");
        assert_eq!(
            uci.position().fen(),
            "rnbqkbnr/pppp1ppp/8/4p3/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
        );
        assert_eq!(uci.states.len(), 1);
        assert_eq!(uci.states[0].key, uci.position().key());

        uci.handle_command("eval");
        assert!(out.take().contains("Final evaluation"));
    }

    #[test]
    fn learning_session_save_and_load() {
        let (mut uci, out) = handler();
        let path = std::env::temp_dir().join(format!("salmon-uci-{}.json", std::process::id()));
        uci.handle_command(&format!("setoption name Experience File value {}", path.display()));
        uci.handle_command("learning start");
        uci.handle_command("go depth 2");
        uci.search.wait_for_search_finished();
        uci.handle_command("learning end save clear load");
        let text = out.take();
        assert!(text.contains("info string saved 1 positions"));
        assert!(text.contains("info string loaded 1 positions"));
        assert!(uci.experience().lookup(&Position::new()).is_some());
        let _ = std::fs::remove_file(&path);

        uci.handle_command("setoption name Experience File value /no/such/dir/experience.json");
        uci.handle_command("learning load");
        assert!(out.take().starts_with("info string cannot access experience file"));
    }

    #[test]
    fn bench_counts_nodes_of_every_search() {
        let (mut uci, out) = handler();
        let report = uci.bench(&["16", "1", "2", "current", "depth"]).unwrap();
        assert!(report.nodes > 0);
        assert!(report.elapsed_ms >= 1);
        assert_eq!(out.take().lines().filter(|l| l.starts_with("bestmove ")).count(), 1);

        assert!(uci.bench(&["16", "1", "2", "/no/such/bench/file"]).is_none());
    }

    #[test]
    fn run_reads_until_quit() {
        let (mut uci, out) = handler();
        let input = Cursor::new("isready\nquit\nisready\n");
        uci.run(input, &[]).unwrap();
        assert_eq!(out.take(), "readyok\n");
    }

    #[test]
    fn run_treats_eof_as_quit() {
        let (mut uci, out) = handler();
        uci.run(Cursor::new("go infinite\n"), &[]).unwrap();
        assert!(!uci.search.is_searching());
        assert!(out.take().contains("bestmove "));
    }

    #[test]
    fn one_shot_ignores_input() {
        let (mut uci, out) = handler();
        let args = vec!["go".to_string(), "depth".to_string(), "1".to_string()];
        uci.run(Cursor::new("isready\n"), &args).unwrap();
        let text = out.take();
        assert!(!text.contains("readyok"));
        assert!(text.contains("bestmove "));
    }
}
