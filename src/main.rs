use std::io::{self, Write};

use clap::Parser;
use salmon::uci::UciHandler;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging on stderr
    #[arg(long)]
    debug: bool,

    /// Run a single command, e.g. `salmon bench` or `salmon go depth 8`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn main() {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "warn" };
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, log_level),
    );
    builder
        .format(|buf, record| {
            writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args())
        })
        .write_style(env_logger::WriteStyle::Never)
        .target(env_logger::Target::Stderr)
        .init();

    println!("{}", salmon::engine_info(false));

    let mut uci = UciHandler::new();
    let stdin = io::stdin();
    if let Err(e) = uci.run(stdin.lock(), &args.command) {
        log::error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}
