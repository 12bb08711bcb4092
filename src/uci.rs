use std::{
    io::Write,
    sync::mpsc,
    time::Instant,
};

use anyhow::Context;
use thiserror::Error;

use crate::{
    NAME, VERSION,
    chess::{board::Board, piece::Colour},
    errors::{FenParseError, MoveParseError},
    search::{SearchOptions, parameters::Config, search_position},
    searchcontrol::SearchControl,
    threadpool::MAX_THREADS,
    timemgmt::SearchLimits,
    transpositiontable::TT,
    util::{MAX_DEPTH, MEGABYTE, depth::ONE_PLY},
};

const DEFAULT_HASH_MB: usize = 32;
const MAX_HASH_MB: usize = 1 << 20;
/// Longer mates than this cannot be seen within the maximum search depth.
#[allow(clippy::cast_sign_loss)]
const MAX_MATE_MOVES: u32 = MAX_DEPTH as u32 / 2;

#[derive(Debug, Error)]
pub enum UciError {
    #[error("failed to parse go: {0}")]
    ParseGo(String),
    #[error("failed to parse setoption: {0}")]
    ParseOption(String),
    #[error("invalid FEN: {0}")]
    ParseFen(#[from] FenParseError),
    #[error("invalid move: {0}")]
    ParseMove(#[from] MoveParseError),
    #[error("unexpected end of command: {0}")]
    UnexpectedCommandTermination(String),
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

/// Everything that persists between `go` commands.
pub struct Engine {
    pub pos: Board,
    pub tt: TT,
    pub conf: Config,
    pub options: SearchOptions,
    pub control: SearchControl,
    hash_mb: usize,
}

impl Engine {
    pub fn new() -> Self {
        let mut tt = TT::new();
        tt.resize(DEFAULT_HASH_MB * MEGABYTE);
        Self {
            pos: Board::new(),
            tt,
            conf: Config::default(),
            options: SearchOptions { print_to_stdout: true, ..SearchOptions::default() },
            control: SearchControl::new(),
            hash_mb: DEFAULT_HASH_MB,
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

// position fen <fen> [moves ...]
// position startpos [moves e2e4 e7e5 b7b8q]
fn parse_position(text: &str, pos: &mut Board) -> Result<(), UciError> {
    let mut parts = text.split_ascii_whitespace();
    let command = parts
        .next()
        .ok_or_else(|| UciError::UnexpectedCommandTermination("no command in parse_position".into()))?;
    if command != "position" {
        return Err(UciError::InvalidFormat("expected \"position\"".into()));
    }
    let determiner = parts
        .next()
        .ok_or_else(|| UciError::UnexpectedCommandTermination("no determiner after \"position\"".into()))?;
    let mut new_pos = if determiner == "startpos" {
        let moves = parts.next();
        if !matches!(moves, Some("moves") | None) {
            return Err(UciError::InvalidFormat(
                "expected either \"moves\" or nothing to follow \"startpos\"".into(),
            ));
        }
        Board::new()
    } else {
        if determiner != "fen" {
            return Err(UciError::InvalidFormat(format!("unknown term after \"position\": {determiner}")));
        }
        let mut fen = String::new();
        for part in &mut parts {
            if part == "moves" {
                break;
            }
            fen.push_str(part);
            fen.push(' ');
        }
        Board::from_fen(fen.trim_end())?
    };
    for text in parts {
        let m = new_pos.parse_uci(text)?;
        new_pos.make_move(m);
    }
    *pos = new_pos;
    Ok(())
}

fn next_number<'a, T: std::str::FromStr>(
    parts: &mut impl Iterator<Item = &'a str>,
    term: &str,
) -> Result<T, UciError>
where
    T::Err: std::fmt::Display,
{
    parts
        .next()
        .ok_or_else(|| UciError::ParseGo(format!("nothing after \"{term}\"")))?
        .parse()
        .map_err(|e| UciError::ParseGo(format!("value for {term} is not a number: {e}")))
}

/// Parse a `go` command. A `go` with no limits at all searches until `stop`.
fn parse_go(text: &str, pos: &Board) -> Result<SearchLimits, UciError> {
    let mut limits = SearchLimits::default();
    let mut parts = text.split_ascii_whitespace().peekable();
    let command = parts
        .next()
        .ok_or_else(|| UciError::UnexpectedCommandTermination("no command in parse_go".into()))?;
    if command != "go" {
        return Err(UciError::InvalidFormat("expected \"go\"".into()));
    }

    while let Some(part) = parts.next() {
        match part {
            "depth" => limits.depth = Some(next_number(&mut parts, part)?),
            "nodes" => limits.nodes = Some(next_number(&mut parts, part)?),
            "movetime" => limits.movetime = Some(next_number(&mut parts, part)?),
            "mate" => limits.mate = Some(next_number(&mut parts, part).map(|n: u32| n.min(MAX_MATE_MOVES))?),
            "movestogo" => limits.moves_to_go = Some(next_number(&mut parts, part)?),
            "wtime" => limits.time[Colour::White.index()] = Some(next_number(&mut parts, part)?),
            "btime" => limits.time[Colour::Black.index()] = Some(next_number(&mut parts, part)?),
            "winc" => limits.inc[Colour::White.index()] = next_number(&mut parts, part)?,
            "binc" => limits.inc[Colour::Black.index()] = next_number(&mut parts, part)?,
            "infinite" => limits.infinite = true,
            "ponder" => limits.ponder = true,
            "searchmoves" => {
                while let Some(m) = parts.peek().and_then(|text| pos.parse_uci(text).ok()) {
                    limits.search_moves.push(m);
                    parts.next();
                }
            }
            other => log::warn!("ignoring term in go: {other}"),
        }
    }

    if limits.depth.is_some_and(|d| d <= 0) {
        return Err(UciError::ParseGo("depth must be positive".into()));
    }

    let limited = limits.depth.is_some()
        || limits.nodes.is_some()
        || limits.movetime.is_some()
        || limits.mate.is_some()
        || limits.time.iter().any(Option::is_some);
    if !limited {
        limits.infinite = true;
    }

    Ok(limits)
}

fn parse_bool(name: &str, value: &str) -> Result<bool, UciError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(UciError::ParseOption(format!("expected true or false for {name}, got \"{value}\""))),
    }
}

fn parse_spin(name: &str, value: &str, min: usize, max: usize) -> Result<usize, UciError> {
    let v: usize = value.parse().map_err(|e| UciError::ParseOption(format!("bad value for {name}: {e}")))?;
    if !(min..=max).contains(&v) {
        return Err(UciError::ParseOption(format!("{name} must be between {min} and {max}, got {v}")));
    }
    Ok(v)
}

// setoption name <name, possibly with spaces> [value <value>]
fn parse_setoption(text: &str, engine: &mut Engine) -> Result<(), UciError> {
    let rest = text
        .strip_prefix("setoption")
        .ok_or_else(|| UciError::InvalidFormat("expected \"setoption\"".into()))?
        .trim_start();
    let rest = rest
        .strip_prefix("name")
        .ok_or_else(|| UciError::UnexpectedCommandTermination("no name after \"setoption\"".into()))?
        .trim();
    let (name, value) = match rest.split_once(" value ") {
        Some((name, value)) => (name.trim(), value.trim()),
        None => (rest.strip_suffix(" value").unwrap_or(rest).trim(), ""),
    };
    if name.is_empty() {
        return Err(UciError::UnexpectedCommandTermination("no option name given".into()));
    }

    let pool = &mut engine.options.pool;
    match name.to_ascii_lowercase().as_str() {
        "hash" => {
            let mb = parse_spin(name, value, 1, MAX_HASH_MB)?;
            engine.tt.resize(mb * MEGABYTE);
            engine.hash_mb = mb;
        }
        "clear hash" => engine.tt.clear(pool.threads),
        "threads" => pool.threads = parse_spin(name, value, 1, MAX_THREADS)?,
        "minimum split depth" => {
            let plies = parse_spin(name, value, 4, 12)?;
            pool.min_split_depth = i32::try_from(plies).unwrap_or(4) * ONE_PLY;
        }
        "max threads per split point" => pool.max_threads_per_split_point = parse_spin(name, value, 4, 8)?,
        "use sleeping threads" => pool.use_sleeping_threads = parse_bool(name, value)?,
        "fake split" => pool.fake_split = parse_bool(name, value)?,
        "ponder" => engine.options.ponder_enabled = parse_bool(name, value)?,
        _ => match engine.conf.set_by_name(name, value) {
            Ok(true) => (),
            Ok(false) => return Err(UciError::ParseOption(format!("unknown option \"{name}\""))),
            Err(e) => return Err(UciError::ParseOption(e)),
        },
    }
    log::debug!("set option {name} to {value:?}");
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn print_uci_response(engine: &Engine) {
    let pool = &engine.options.pool;
    println!("id name {NAME} {VERSION}");
    println!("id author the {NAME} developers");
    println!("option name Hash type spin default {} min 1 max {MAX_HASH_MB}", engine.hash_mb);
    println!("option name Clear Hash type button");
    println!("option name Threads type spin default {} min 1 max {MAX_THREADS}", pool.threads);
    println!("option name Minimum Split Depth type spin default {} min 4 max 12", pool.min_split_depth / ONE_PLY);
    println!("option name Max Threads per Split Point type spin default {} min 4 max 8", pool.max_threads_per_split_point);
    println!("option name Use Sleeping Threads type check default {}", pool.use_sleeping_threads);
    println!("option name Fake Split type check default {}", pool.fake_split);
    println!("option name Ponder type check default {}", engine.options.ponder_enabled);
    for (id, default, min, max) in engine.conf.tunables() {
        println!("option name {id} type spin default {} min {} max {}", default as i64, min as i64, max as i64);
    }
    for (id, default) in engine.conf.switches() {
        println!("option name {id} type check default {default}");
    }
    println!("uciok");
}

/// Read stdin on its own thread, so that the search can poll for `stop`
/// and `ponderhit` while it runs.
fn stdin_reader() -> anyhow::Result<mpsc::Receiver<String>> {
    let (sender, receiver) = mpsc::channel();
    std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || stdin_reader_worker(&sender))
        .with_context(|| "couldn't start stdin reader worker thread")?;
    Ok(receiver)
}

fn stdin_reader_worker(sender: &mpsc::Sender<String>) {
    let mut linebuf = String::with_capacity(128);
    loop {
        linebuf.clear();
        match std::io::stdin().read_line(&mut linebuf) {
            Ok(0) | Err(_) => break,
            Ok(_) => (),
        }
        let cmd = linebuf.trim();
        if cmd.is_empty() {
            continue;
        }
        if sender.send(cmd.to_owned()).is_err() {
            break;
        }
    }
}

pub fn main_loop() -> anyhow::Result<()> {
    let mut engine = Engine::new();
    let stdin = stdin_reader()?;
    log::info!("{NAME} {VERSION} ready");

    loop {
        std::io::stdout().flush().with_context(|| "couldn't flush stdout")?;
        let Ok(line) = stdin.recv() else {
            break;
        };
        let input = line.trim();

        let res = match input {
            "uci" => {
                print_uci_response(&engine);
                Ok(())
            }
            "isready" => {
                println!("readyok");
                Ok(())
            }
            "quit" => break,
            "ucinewgame" => {
                engine.pos = Board::new();
                engine.tt.clear(engine.options.pool.threads);
                Ok(())
            }
            // only meaningful during a search, which handles them itself.
            "stop" | "ponderhit" => Ok(()),
            "d" | "show" => {
                println!("{}", engine.pos.fen());
                Ok(())
            }
            "config" => {
                print!("{}", engine.conf);
                Ok(())
            }
            input if input.starts_with("setoption") => parse_setoption(input, &mut engine),
            input if input.starts_with("position") => parse_position(input, &mut engine.pos),
            input if input.starts_with("go") => match parse_go(input, &engine.pos) {
                Ok(limits) => {
                    search_position(
                        &engine.pos,
                        &engine.tt,
                        &engine.conf,
                        &engine.options,
                        &limits,
                        &engine.control,
                        Some(&stdin),
                    )?;
                    Ok(())
                }
                Err(e) => Err(e),
            },
            input if input.starts_with("bench") => {
                let depth = input.split_ascii_whitespace().nth(1).and_then(|d| d.parse().ok()).unwrap_or(BENCH_DEPTH);
                bench(&engine.conf, &engine.options, depth)?;
                Ok(())
            }
            _ => Err(UciError::UnknownCommand(input.to_string())),
        };

        if let Err(e) = res {
            println!("info string {e}");
            log::warn!("{e}");
        }

        if engine.control.quit.load(std::sync::atomic::Ordering::SeqCst) {
            break;
        }
    }

    Ok(())
}

pub const BENCH_DEPTH: i32 = 10;

const BENCH_POSITIONS: [&str; 12] = [
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 10",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 11",
    "4rrk1/pp1n3p/3q2pQ/2p1pb2/2PP4/2P3N1/P2B2PP/4RRK1 b - - 7 19",
    "rq3rk1/ppp2ppp/1bnpb3/3N2B1/3NP3/7P/PPPQ1PP1/2KR3R w - - 7 14",
    "r1bq1r1k/1pp1n1pp/1p1p4/4p2Q/4Pp2/1BNP4/PPP2PPP/3R1RK1 w - - 2 14",
    "r3r1k1/2p2ppp/p1p1bn2/8/1q2P3/2NPQN2/PPP3PP/R4RK1 b - - 2 15",
    "r1bbk1nr/pp3p1p/2n5/1N4p1/2Np1B2/8/PPP2PPP/2KR1B1R w kq - 0 13",
    "r1bq1rk1/ppp1nppp/4n3/3p3Q/3P4/1BP1B3/PP1N2PP/R4RK1 w - - 1 16",
    "4r1k1/r1q2ppp/ppp2n2/4P3/5Rb1/1N1BQ3/PPP3PP/R5K1 w - - 1 17",
    "2rqkb1r/ppp2p2/2npb1p1/1N1Nn2p/2P1PP2/8/PP2B1PP/R1BQK2R b KQ - 0 11",
    "8/8/8/4k3/3p4/3K4/8/8 w - - 0 1",
];

/// Search a fixed set of positions to a fixed depth, printing the node count
/// and speed. The node count is a signature of the search: with one thread,
/// any change to it means the search itself changed.
pub fn bench(conf: &Config, options: &SearchOptions, depth: i32) -> anyhow::Result<u64> {
    let options = SearchOptions { print_to_stdout: false, ..options.clone() };
    let mut tt = TT::new();
    tt.resize(16 * MEGABYTE);
    let control = SearchControl::new();
    let limits = SearchLimits::depth(depth);
    let start = Instant::now();
    let mut total = 0;
    for fen in BENCH_POSITIONS {
        let pos = Board::from_fen(fen).with_context(|| format!("bad bench position {fen}"))?;
        tt.clear(options.pool.threads);
        let result = search_position(&pos, &tt, conf, &options, &limits, &control, None)?;
        log::info!("{fen}: {} nodes, best move {:?}", result.nodes, result.best_move.map(|m| m.to_string()));
        total += result.nodes;
    }
    let elapsed = start.elapsed();
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let nps = (total as f64 / elapsed.as_secs_f64().max(1e-9)) as u64;
    println!("{total} nodes {nps} nps");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_with_moves() {
        let mut pos = Board::new();
        parse_position("position startpos moves e2e4 e7e5 g1f3", &mut pos).unwrap();
        assert_eq!(pos.fen(), "rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2");
        parse_position("position fen 8/8/8/4k3/3p4/3K4/8/8 w - - 0 1 moves d3d4", &mut pos).unwrap_err();
        parse_position("position fen 8/8/8/4k3/3p4/3K4/8/8 w - - 0 1 moves d3e2", &mut pos).unwrap();
        assert_eq!(pos.fen(), "8/8/8/4k3/3p4/8/4K3/8 b - - 1 1");
    }

    #[test]
    fn bad_position_leaves_the_board_alone() {
        let mut pos = Board::new();
        assert!(parse_position("position startpos moves e2e5", &mut pos).is_err());
        assert!(parse_position("position fen not/a/fen w - - 0 1", &mut pos).is_err());
        assert!(parse_position("position somewhere", &mut pos).is_err());
        assert_eq!(pos.fen(), Board::new().fen());
    }

    #[test]
    fn go_with_clocks() {
        let pos = Board::new();
        let limits = parse_go("go wtime 60000 btime 50000 winc 1000 binc 500 movestogo 20", &pos).unwrap();
        assert_eq!(limits.time, [Some(60_000), Some(50_000)]);
        assert_eq!(limits.inc, [1000, 500]);
        assert_eq!(limits.moves_to_go, Some(20));
        assert!(!limits.infinite);
        assert!(limits.use_time_management(Colour::White));
    }

    #[test]
    fn plain_go_is_infinite() {
        let pos = Board::new();
        assert!(parse_go("go", &pos).unwrap().infinite);
        assert!(parse_go("go ponder", &pos).unwrap().infinite);
        assert!(!parse_go("go depth 6", &pos).unwrap().infinite);
    }

    #[test]
    fn go_limits_and_searchmoves() {
        let pos = Board::new();
        let limits = parse_go("go depth 8 nodes 1000 searchmoves e2e4 d2d4 movetime 300", &pos).unwrap();
        assert_eq!(limits.depth, Some(8));
        assert_eq!(limits.nodes, Some(1000));
        assert_eq!(limits.movetime, Some(300));
        let moves: Vec<String> = limits.search_moves.iter().map(ToString::to_string).collect();
        assert_eq!(moves, ["e2e4", "d2d4"]);
        assert!(parse_go("go depth", &pos).is_err());
        assert!(parse_go("go depth x", &pos).is_err());
        assert!(parse_go("go depth 0", &pos).is_err());
    }

    #[test]
    fn huge_mate_limits_are_clamped() {
        let pos = Board::new();
        assert_eq!(parse_go("go mate 3", &pos).unwrap().mate, Some(3));
        let limits = parse_go("go mate 4294967295", &pos).unwrap();
        assert_eq!(limits.mate, Some(MAX_MATE_MOVES));
        assert!(!limits.infinite);
    }

    #[test]
    fn setoption_names_with_spaces() {
        let mut engine = Engine::new();
        parse_setoption("setoption name Threads value 4", &mut engine).unwrap();
        parse_setoption("setoption name Minimum Split Depth value 6", &mut engine).unwrap();
        parse_setoption("setoption name Max Threads per Split Point value 8", &mut engine).unwrap();
        parse_setoption("setoption name Use Sleeping Threads value false", &mut engine).unwrap();
        parse_setoption("setoption name Fake Split value true", &mut engine).unwrap();
        parse_setoption("setoption name Ponder value true", &mut engine).unwrap();
        parse_setoption("setoption name PROBCUT_MARGIN value 300", &mut engine).unwrap();
        parse_setoption("setoption name Clear Hash", &mut engine).unwrap();
        let pool = &engine.options.pool;
        assert_eq!(pool.threads, 4);
        assert_eq!(pool.min_split_depth, 6 * ONE_PLY);
        assert_eq!(pool.max_threads_per_split_point, 8);
        assert!(!pool.use_sleeping_threads);
        assert!(pool.fake_split);
        assert!(engine.options.ponder_enabled);
        assert_eq!(engine.conf.probcut_margin, 300);
    }

    #[test]
    fn setoption_rejects_bad_input() {
        let mut engine = Engine::new();
        assert!(parse_setoption("setoption name Threads value 0", &mut engine).is_err());
        assert!(parse_setoption("setoption name Threads value 65", &mut engine).is_err());
        assert!(parse_setoption("setoption name Fake Split value maybe", &mut engine).is_err());
        assert!(parse_setoption("setoption name No Such Option value 1", &mut engine).is_err());
        assert!(parse_setoption("setoption value 1", &mut engine).is_err());
        assert_eq!(engine.options.pool, crate::threadpool::PoolOptions::default());
    }

    #[test]
    fn bench_is_deterministic_on_one_thread() {
        let conf = Config::default();
        let options = SearchOptions::default();
        let first = bench(&conf, &options, 5).unwrap();
        let second = bench(&conf, &options, 5).unwrap();
        assert!(first > 0);
        assert_eq!(first, second);
    }
}
