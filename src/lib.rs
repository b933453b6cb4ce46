pub mod bench;
pub mod board;
pub mod evaluation;
pub mod fen;
pub mod io;
pub mod learning;
pub mod limits;
pub mod movegen;
pub mod notation;
pub mod options;
pub mod search;
pub mod setup;
pub mod speculative;
pub mod transposition;
pub mod uci;

/// Engine name and author, either as the `uci` identity lines or as a
/// single banner line.
pub fn engine_info(to_uci: bool) -> String {
    let name = format!("Salmon {}", env!("CARGO_PKG_VERSION"));
    let author = env!("CARGO_PKG_AUTHORS");
    if to_uci {
        format!("id name {name}\nid author {author}")
    } else {
        format!("{name} by {author}")
    }
}
