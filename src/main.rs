#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::module_name_repetitions)]

//! Parallax, a UCI chess engine with a parallel split-point search.

use anyhow::Context;

#[macro_use]
mod macros;

mod chess;
mod cli;
mod errors;
mod evaluation;
mod historytable;
mod movepicker;
mod perft;
mod search;
mod searchcontrol;
mod searchinfo;
mod splitpoint;
mod stack;
mod threadlocal;
mod threadpool;
mod timemgmt;
mod transpositiontable;
mod uci;
mod util;

/// The name of the engine.
pub static NAME: &str = "Parallax";
/// The version of the engine.
pub static VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    if std::env::args_os().len() == 1 {
        // fast path to UCI:
        return uci::main_loop();
    }

    let cli = <cli::Cli as clap::Parser>::parse();

    match cli.subcommand {
        Some(cli::Subcommands::Perft { depth, fen }) => {
            let mut pos = match fen {
                Some(fen) => chess::board::Board::from_fen(&fen).with_context(|| format!("invalid FEN \"{fen}\""))?,
                None => chess::board::Board::new(),
            };
            perft::divide(&mut pos, depth);
            Ok(())
        }
        Some(cli::Subcommands::Bench { depth, threads, no_pruning }) => {
            let mut options = search::SearchOptions::default();
            options.pool.threads = threads.clamp(1, threadpool::MAX_THREADS);
            let conf = if no_pruning {
                search::parameters::Config::without_pruning()
            } else {
                search::parameters::Config::default()
            };
            uci::bench(&conf, &options, depth.max(1))?;
            Ok(())
        }
        Some(cli::Subcommands::Uci) | None => uci::main_loop(),
    }
}
