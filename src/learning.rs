use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::Position;
use crate::search::Value;

#[derive(Debug, Error)]
pub enum LearningError {
    #[error("cannot access experience file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed experience file {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Result of one finished search, keyed by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experience {
    pub best_move: String,
    pub score: Value,
    pub depth: u32,
}

/// Position identity for the book: FEN without the move counters.
pub fn position_id(pos: &Position) -> String {
    pos.fen().split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}

/// Search results collected while a learning session is active.
#[derive(Debug, Default)]
pub struct ExperienceBook {
    active: bool,
    entries: BTreeMap<String, Experience>,
}

pub type SharedExperience = Arc<Mutex<ExperienceBook>>;

impl ExperienceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedExperience {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn start(&mut self) {
        self.active = true;
        debug!("learning session started");
    }

    pub fn end(&mut self) {
        self.active = false;
        debug!("learning session ended with {} entries", self.entries.len());
    }

    /// Teardown on stop/quit.
    pub fn exit(&mut self) {
        if self.active {
            self.end();
        }
    }

    /// Keeps the deepest result per position. Ignored outside a session.
    pub fn record(&mut self, pos: &Position, best_move: &str, score: Value, depth: u32) {
        if !self.active || depth == 0 {
            return;
        }
        let id = position_id(pos);
        if self.entries.get(&id).is_some_and(|old| old.depth > depth) {
            return;
        }
        self.entries.insert(
            id,
            Experience {
                best_move: best_move.to_string(),
                score,
                depth,
            },
        );
    }

    pub fn lookup(&self, pos: &Position) -> Option<&Experience> {
        self.entries.get(&position_id(pos))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn save(&self, path: &Path) -> Result<usize, LearningError> {
        let text =
            serde_json::to_string_pretty(&self.entries).map_err(|source| LearningError::Format {
                path: path.to_path_buf(),
                source,
            })?;
        fs::write(path, text).map_err(|source| LearningError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("saved {} experience entries to {}", self.entries.len(), path.display());
        Ok(self.entries.len())
    }

    /// Merges the entries of `path` into the book, deeper results winning.
    pub fn load(&mut self, path: &Path) -> Result<usize, LearningError> {
        let text = fs::read_to_string(path).map_err(|source| LearningError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let loaded: BTreeMap<String, Experience> =
            serde_json::from_str(&text).map_err(|source| LearningError::Format {
                path: path.to_path_buf(),
                source,
            })?;
        let count = loaded.len();
        for (id, experience) in loaded {
            match self.entries.get(&id) {
                Some(old) if old.depth > experience.depth => {}
                _ => {
                    self.entries.insert(id, experience);
                }
            }
        }
        info!("loaded {count} experience entries from {}", path.display());
        Ok(count)
    }
}
