use clap::{Parser, Subcommand};

use crate::uci::BENCH_DEPTH;

#[derive(Parser)]
#[clap(author, version, about)]
pub struct Cli {
    #[clap(subcommand)]
    pub subcommand: Option<Subcommands>,
}

#[derive(Subcommand)]
pub enum Subcommands {
    /// Count the leaf nodes of the legal move tree, listed per root move.
    Perft {
        /// Depth of the move tree, in plies.
        #[clap(short, long, default_value = "5")]
        depth: usize,
        /// Position to count from; the start position if omitted.
        #[clap(short, long)]
        fen: Option<String>,
    },
    /// Search a fixed set of positions and report the node count and speed.
    Bench {
        /// Depth to search each position to, in plies.
        #[clap(short, long, default_value_t = BENCH_DEPTH)]
        depth: i32,
        /// Number of search threads.
        #[clap(short, long, default_value = "1")]
        threads: usize,
        /// Search with every pruning technique and reduction switched off.
        #[clap(long)]
        no_pruning: bool,
    },
    /// Talk the Universal Chess Interface on stdin and stdout. The default.
    Uci,
}
