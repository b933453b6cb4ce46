use std::fmt;
use std::fs;
use std::io;

use crate::board::Position;

const DEFAULTS: &[&str] = &[
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 10",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 11",
    "4rrk1/pp1n3p/3q2pQ/2p1pb2/2PP4/2P3N1/P2B2PP/4RRK1 b - - 7 19",
    "rq3rk1/ppp2ppp/1bnpb3/3N2B1/3NP3/7P/PPPQ1PP1/2KR3R w - - 7 14 moves d4e6",
    "r1bq1r1k/1pp1n1pp/1p1p4/4p2Q/4Pp2/1BNP4/PPP2PPP/3R1RK1 w - - 2 14 moves g2g4",
    "r3r1k1/2p2ppp/p1p1bn2/8/1q2P3/2NPQN2/PPP3PP/R4RK1 b - - 2 15",
    "r1bbk1nr/pp3p1p/2n5/1N4p1/2Np1B2/8/PPP2PPP/2KR1B1R w kq - 0 13",
    "r1bq1rk1/ppp1nppp/4n3/3p3Q/3P4/1BP1B3/PP1N2PP/R4RK1 w - - 1 16",
    "4r1k1/r1q2ppp/ppp2n2/4P3/5Rb1/1N1BQ3/PPP3PP/R5K1 w - - 1 17",
    "2rqkb1r/ppp2p2/2npb1p1/1N1Nn2p/2P1PP2/8/PP2B1PP/R1BQK2R b KQ - 0 11",
    "r1bq1r1k/b1p1npp1/p2p3p/1p6/3PP3/1B2NN2/PP3PPP/R2Q1RK1 w - - 1 16",
    "3r1rk1/p5pp/bpp1pp2/8/q1PP1P2/b3P3/P2NQRBP/3R2K1 b - - 1 20",
    "8/8/8/8/5kp1/P7/8/1K1N4 w - - 0 80",
    "6k1/6p1/6Pp/ppp5/3pn2P/1P3K2/1PP2P2/8 b - - 0 54",
    // 960 castling
    "setoption name UCI_Chess960 value true",
    "bbqnnrkr/pppppppp/8/8/8/8/PPPPPPPP/BBQNNRKR w HFhf - 0 1 moves g2g3 d7d5 d2d4 c8h3 c1g5 e8d6 g5e7 f7f6",
    "setoption name UCI_Chess960 value false",
];

/// Totals of one bench run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchReport {
    pub elapsed_ms: u64,
    pub nodes: u64,
}

impl BenchReport {
    /// `elapsed_ms` is taken as at least one.
    pub fn new(elapsed_ms: u64, nodes: u64) -> Self {
        Self {
            elapsed_ms: elapsed_ms.max(1),
            nodes,
        }
    }

    pub fn nps(&self) -> u64 {
        1000 * self.nodes / self.elapsed_ms
    }
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n===========================")?;
        writeln!(f, "Total time (ms) : {}", self.elapsed_ms)?;
        writeln!(f, "Nodes searched  : {}", self.nodes)?;
        write!(f, "Nodes/second    : {}", self.nps())
    }
}

/// Builds the command script for `bench [hash] [threads] [limit] [fens] [limit type]`.
///
/// `fens` is `default`, `current` or a file with one FEN per line. The limit
/// type is one of `depth`, `perft`, `nodes`, `movetime`, or `eval` which
/// replaces each search by a static evaluation.
pub fn setup_bench(current: &Position, args: &[&str]) -> io::Result<Vec<String>> {
    let arg = |i: usize, default: &'static str| args.get(i).copied().unwrap_or(default);
    let tt_size = arg(0, "16");
    let threads = arg(1, "1");
    let limit = arg(2, "4");
    let fen_file = arg(3, "default");
    let limit_type = arg(4, "depth");

    let go = if limit_type == "eval" {
        "eval".to_string()
    } else {
        format!("go {limit_type} {limit}")
    };

    let fens: Vec<String> = match fen_file {
        "default" => DEFAULTS.iter().map(|s| s.to_string()).collect(),
        "current" => vec![current.fen()],
        path => fs::read_to_string(path)?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect(),
    };

    let mut list = vec![
        format!("setoption name Threads value {threads}"),
        format!("setoption name Hash value {tt_size}"),
        "ucinewgame".to_string(),
    ];
    for fen in fens {
        if fen.contains("setoption") {
            list.push(fen);
        } else {
            list.push(format!("position fen {fen}"));
            list.push(go.clone());
        }
    }
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_script() {
        let list = setup_bench(&Position::new(), &[]).unwrap();
        assert_eq!(list[0], "setoption name Threads value 1");
        assert_eq!(list[1], "setoption name Hash value 16");
        assert_eq!(list[2], "ucinewgame");
        assert_eq!(list[3], format!("position fen {}", DEFAULTS[0]));
        assert_eq!(list[4], "go depth 4");

        let searches = list.iter().filter(|c| c.starts_with("go ")).count();
        assert_eq!(searches, DEFAULTS.len() - 2);
        assert!(list.contains(&"setoption name UCI_Chess960 value true".to_string()));
    }

    #[test]
    fn current_position_and_limit_type() {
        let list = setup_bench(&Position::new(), &["32", "1", "1000", "current", "nodes"]).unwrap();
        assert_eq!(
            list,
            vec![
                "setoption name Threads value 1",
                "setoption name Hash value 32",
                "ucinewgame",
                "position fen rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
                "go nodes 1000",
            ]
        );

        let list = setup_bench(&Position::new(), &["16", "1", "1", "current", "eval"]).unwrap();
        assert_eq!(list.last().map(String::as_str), Some("eval"));
    }

    #[test]
    fn fens_from_file() {
        let path = std::env::temp_dir().join(format!("salmon-bench-{}.txt", std::process::id()));
        let text = "8/8/8/8/8/8/8/K6k w - - 0 1\n\n4k3/8/8/8/8/8/8/4K2R w K - 0 1\n";
        fs::write(&path, text).unwrap();
        let path_arg = path.to_string_lossy().into_owned();
        let list = setup_bench(&Position::new(), &["16", "1", "2", &path_arg]).unwrap();
        assert_eq!(list.iter().filter(|c| c.starts_with("position fen ")).count(), 2);
        assert_eq!(list.last().map(String::as_str), Some("go depth 2"));
        let _ = fs::remove_file(&path);

        assert!(setup_bench(&Position::new(), &["16", "1", "2", "/no/such/bench/file"]).is_err());
    }

    #[test]
    fn report_never_divides_by_zero() {
        let report = BenchReport::new(0, 5000);
        assert_eq!(report.elapsed_ms, 1);
        assert_eq!(report.nps(), 5_000_000);
        assert_eq!(BenchReport::new(3000, 10_000).nps(), 3333);
        assert!(report.to_string().ends_with("Nodes/second    : 5000000"));
    }
}
