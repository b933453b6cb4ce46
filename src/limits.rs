use std::time::{Duration, Instant};

use crate::board::Color;
use crate::movegen::Move;

/// Constraints of one `go` command. Absent fields mean unbounded.
#[derive(Debug, Clone)]
pub struct SearchLimits {
    pub searchmoves: Vec<Move>,
    pub time: [Option<u64>; 2], // milliseconds, indexed by colour
    pub inc: [Option<u64>; 2],
    pub movestogo: Option<u32>,
    pub depth: Option<u32>,
    pub nodes: Option<u64>,
    pub movetime: Option<u64>,
    pub mate: Option<u32>,
    pub perft: Option<u32>,
    pub infinite: bool,
    pub start_time: Instant,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}

impl SearchLimits {
    pub fn new(start_time: Instant) -> Self {
        Self {
            searchmoves: Vec::new(),
            time: [None; 2],
            inc: [None; 2],
            movestogo: None,
            depth: None,
            nodes: None,
            movetime: None,
            mate: None,
            perft: None,
            infinite: false,
            start_time,
        }
    }

    pub fn use_time_management(&self) -> bool {
        self.time.iter().any(Option::is_some)
    }
}

/// Engine side timing settings, taken from the option table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeConfig {
    pub move_overhead: u64,
    pub min_thinking_time: u64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            move_overhead: 30,
            min_thinking_time: 20,
        }
    }
}

const DEFAULT_MOVES_TO_GO: u64 = 30;

/// Wall time the search may spend on this move, or `None` when only
/// depth/nodes/stop end it.
pub fn allocate(limits: &SearchLimits, us: Color, config: TimeConfig) -> Option<Duration> {
    if let Some(movetime) = limits.movetime {
        return Some(Duration::from_millis(movetime.saturating_sub(config.move_overhead).max(1)));
    }
    if !limits.use_time_management() {
        return None;
    }

    // Missing clock for our side: treat as a flagged clock.
    let remaining = limits.time[us.index()].unwrap_or(0);
    let inc = limits.inc[us.index()].unwrap_or(0);
    let moves_to_go = limits.movestogo.map_or(DEFAULT_MOVES_TO_GO, |m| u64::from(m.max(1)));

    let budget = (remaining / moves_to_go)
        .saturating_add(inc.saturating_mul(3) / 4)
        .saturating_sub(config.move_overhead)
        .max(config.min_thinking_time);
    let ceiling = remaining.saturating_sub(config.move_overhead).max(1);
    Some(Duration::from_millis(budget.min(ceiling)))
}
