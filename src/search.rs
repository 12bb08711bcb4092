#![allow(clippy::too_many_arguments)]

pub mod parameters;
pub mod pv;
pub mod rootmoves;

use std::{
    mem, panic,
    sync::{
        atomic::Ordering,
        mpsc::{Receiver, RecvTimeoutError},
    },
    thread,
    time::Duration,
};

use arrayvec::ArrayVec;

use crate::{
    chess::{
        attacks::{RAY_BETWEEN, king_attacks},
        board::Board,
        chessmove::Move,
        piece::{Colour, PieceType},
        squareset::SquareSet,
        types::Rank,
    },
    evaluation::evaluate,
    movepicker::MovePicker,
    searchcontrol::SearchControl,
    searchinfo::SearchInfo,
    splitpoint::{MAX_QUIETS, SplitKind, SplitPoint, SplitPointId},
    stack::SearchStack,
    threadlocal::ThreadData,
    threadpool::{Attachment, PoolOptions, SplitRequest, ThreadPool},
    timemgmt::{SearchLimits, TIMER_RESOLUTION, TimeManager},
    transpositiontable::{Bound, TT, TTHit},
    util::{
        DRAW, INFINITY, MAX_DEPTH, MAX_PLY, MEGABYTE, MINIMUM_MATE_SCORE, PAWN_VALUE_EG, PAWN_VALUE_MG, ROOK_VALUE_MG,
        VALUE_KNOWN_WIN, VALUE_NONE,
        depth::{DEPTH_NONE, DEPTH_QS_CHECKS, DEPTH_QS_NO_CHECKS, DEPTH_ZERO, Depth, ONE_PLY},
        eg_value, mate_in, mated_in, mg_value, uci_score,
    },
};

use self::{
    parameters::Config,
    rootmoves::{RootMove, RootMoves},
};

/// Search threads recurse deeply and keep move lists on the stack.
const SEARCH_STACK_SIZE: usize = 64 * MEGABYTE;
/// Start reporting the move being searched at the root after this many milliseconds.
const CURRMOVE_INFO_DELAY: u64 = 3000;
/// Keep printing fail-high and fail-low lines once the search is this old.
const BOUND_INFO_DELAY: u64 = 2000;

// Nodes come in three kinds, each with a split-point twin. A split-point node
// is entered by every participant of a split point: it skips everything up to
// the move loop and takes its moves and bounds from the shared job instead.

pub trait NodeType {
    /// Whether this node is on the principal variation.
    const PV: bool;
    /// Whether this node is the root of the search tree.
    const ROOT: bool;
    /// Whether this node is being searched cooperatively at a split point.
    const SPLIT: bool;
    /// The kind of split point this node opens.
    const KIND: SplitKind;
}

/// The root node of the search tree.
struct Root;
/// A node with a non-null window.
struct Pv;
/// A node with a null window.
struct NonPv;
struct SplitRoot;
struct SplitPv;
struct SplitNonPv;

impl NodeType for Root {
    const PV: bool = true;
    const ROOT: bool = true;
    const SPLIT: bool = false;
    const KIND: SplitKind = SplitKind::Root;
}
impl NodeType for Pv {
    const PV: bool = true;
    const ROOT: bool = false;
    const SPLIT: bool = false;
    const KIND: SplitKind = SplitKind::Pv;
}
impl NodeType for NonPv {
    const PV: bool = false;
    const ROOT: bool = false;
    const SPLIT: bool = false;
    const KIND: SplitKind = SplitKind::NonPv;
}
impl NodeType for SplitRoot {
    const PV: bool = true;
    const ROOT: bool = true;
    const SPLIT: bool = true;
    const KIND: SplitKind = SplitKind::Root;
}
impl NodeType for SplitPv {
    const PV: bool = true;
    const ROOT: bool = false;
    const SPLIT: bool = true;
    const KIND: SplitKind = SplitKind::Pv;
}
impl NodeType for SplitNonPv {
    const PV: bool = false;
    const ROOT: bool = false;
    const SPLIT: bool = true;
    const KIND: SplitKind = SplitKind::NonPv;
}

/// How a search should run, beyond what the GUI asked for in `go`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub pool: PoolOptions,
    /// The GUI may ponder, so budget a little more time per move.
    pub ponder_enabled: bool,
    pub print_to_stdout: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchResult {
    pub best_move: Option<Move>,
    pub ponder_move: Option<Move>,
    pub score: i32,
    /// The last fully completed iteration, in plies.
    pub depth: i32,
    pub nodes: u64,
}

/// Searches `pos` within `limits` and returns the best move found.
///
/// Worker 0 runs iterative deepening and the other workers wait for split
/// points to help with. The calling thread keeps an eye on the clock and on
/// `input`, where it handles `stop`, `ponderhit`, `quit`, and `isready`.
pub fn search_position(
    pos: &Board,
    tt: &TT,
    conf: &Config,
    options: &SearchOptions,
    limits: &SearchLimits,
    control: &SearchControl,
    input: Option<&Receiver<String>>,
) -> anyhow::Result<SearchResult> {
    control.reset(limits.ponder);
    tt.increase_age();

    let mut root_moves = RootMoves::new(pos, &limits.search_moves);
    if root_moves.is_empty() && !limits.search_moves.is_empty() {
        log::warn!("no legal move among the searchmoves, searching every move");
        root_moves = RootMoves::new(pos, &[]);
    }
    if root_moves.is_empty() {
        let score = if pos.in_check() { mated_in(0) } else { DRAW };
        if options.print_to_stdout {
            println!("info depth 0 score {}", if pos.in_check() { "mate 0" } else { "cp 0" });
            println!("bestmove (none)");
        }
        return Ok(SearchResult { best_move: None, ponder_move: None, score, depth: 0, nodes: 0 });
    }

    let root_move_count = root_moves.len();
    let pool = ThreadPool::new(options.pool.clone());
    let time_manager = TimeManager::new(limits, pos.turn(), pos.game_ply(), options.ponder_enabled);
    let info = SearchInfo::new(tt.view(), conf, &pool, control, limits, time_manager, root_moves, options.print_to_stdout);
    let may_wait = input.is_some();
    log::debug!("searching {} ({root_move_count} root moves) with {} threads", pos.fen(), pool.threads());

    let depth = thread::scope(|s| -> anyhow::Result<i32> {
        let info = &info;
        info.pool.set_searching(0, true);
        let main = thread::Builder::new()
            .name("search-0".into())
            .stack_size(SEARCH_STACK_SIZE)
            .spawn_scoped(s, move || {
                let mut t = ThreadData::new(0, &info.control.nodes);
                let mut board = pos.clone();
                let depth = iterative_deepening(&mut board, &mut t, info);
                if may_wait {
                    wait_for_stop_or_ponderhit(info);
                }
                t.nodes.flush();
                info.pool.set_searching(0, false);
                info.control.search_finished.store(true, Ordering::Release);
                info.pool.finish();
                log::debug!("worker 0 opened {} split points, joined {}", t.stats.splits, t.stats.joins);
                depth
            })
            .inspect_err(|_| info.control.search_finished.store(true, Ordering::Release))?;

        let mut helpers = Vec::with_capacity(info.pool.threads() - 1);
        for id in 1..info.pool.threads() {
            let handle = thread::Builder::new()
                .name(format!("search-{id}"))
                .stack_size(SEARCH_STACK_SIZE)
                .spawn_scoped(s, move || {
                    let mut t = ThreadData::new(id, &info.control.nodes);
                    info.pool.idle_loop(&mut t, info, None);
                    t.nodes.flush();
                    log::debug!("worker {id} opened {} split points, joined {}", t.stats.splits, t.stats.joins);
                })
                .inspect_err(|_| info.control.request_stop())?;
            helpers.push(handle);
        }

        timer_loop(info, input, pos.turn());

        for handle in helpers {
            if let Err(payload) = handle.join() {
                panic::resume_unwind(payload);
            }
        }
        match main.join() {
            Ok(depth) => Ok(depth),
            Err(payload) => panic::resume_unwind(payload),
        }
    })?;

    let root_moves = info.root_moves();
    let best = root_moves.best();
    let best_move = best.map(RootMove::mov);
    let ponder_move = best.and_then(|rm| rm.pv.moves().get(1).copied());
    let score = best.map_or(DRAW, |rm| match (rm.score, rm.prev_score) {
        (s, _) if s != -INFINITY => s,
        (_, prev) if prev != -INFINITY => prev,
        _ => DRAW,
    });
    let nodes = control.nodes();
    if options.print_to_stdout {
        match (best_move, ponder_move) {
            (Some(bm), Some(pm)) => println!("bestmove {bm} ponder {pm}"),
            (Some(bm), None) => println!("bestmove {bm}"),
            (None, _) => println!("bestmove (none)"),
        }
    }
    Ok(SearchResult { best_move, ponder_move, score, depth, nodes })
}

/// When the depth limit is reached while pondering or in an infinite search,
/// the best move must not be sent before the GUI says so.
fn wait_for_stop_or_ponderhit(info: &SearchInfo) {
    let control = info.control;
    if control.stopped() || !(control.ponder.load(Ordering::SeqCst) || info.limits.infinite) {
        return;
    }
    control.stop_on_ponderhit.store(true, Ordering::SeqCst);
    while !control.stopped() {
        if !control.ponder.load(Ordering::SeqCst) && !info.limits.infinite {
            break;
        }
        thread::sleep(Duration::from_millis(TIMER_RESOLUTION));
    }
}

/// Runs on the calling thread for the whole search.
fn timer_loop(info: &SearchInfo, mut input: Option<&Receiver<String>>, side: Colour) {
    let resolution = Duration::from_millis(TIMER_RESOLUTION);
    while !info.control.search_finished.load(Ordering::Acquire) {
        match input {
            Some(rx) => match rx.recv_timeout(resolution) {
                Ok(line) => handle_input_during_search(info, line.trim()),
                Err(RecvTimeoutError::Timeout) => (),
                Err(RecvTimeoutError::Disconnected) => {
                    info.control.quit.store(true, Ordering::SeqCst);
                    info.control.request_stop();
                    input = None;
                }
            },
            None => thread::sleep(resolution),
        }
        check_time(info, side);
    }
}

fn handle_input_during_search(info: &SearchInfo, line: &str) {
    match line {
        "stop" => info.control.request_stop(),
        "ponderhit" => info.control.ponderhit(),
        "quit" => {
            info.control.quit.store(true, Ordering::SeqCst);
            info.control.request_stop();
        }
        "isready" => println!("readyok"),
        "" => (),
        other => log::warn!("ignoring \"{other}\" during search"),
    }
}

fn check_time(info: &SearchInfo, side: Colour) {
    let control = info.control;
    if control.ponder.load(Ordering::SeqCst) {
        return;
    }
    let (elapsed, available, maximum) = {
        let tm = info.time_manager();
        (tm.elapsed_millis(), tm.available_time(), tm.maximum_time())
    };
    let still_at_first_move = control.first_root_move.load(Ordering::Relaxed)
        && !control.failed_low_at_root.load(Ordering::Relaxed)
        && elapsed > available;
    let no_more_time = elapsed > maximum.saturating_sub(2 * TIMER_RESOLUTION) || still_at_first_move;
    if (info.limits.use_time_management(side) && no_more_time)
        || info.limits.movetime.is_some_and(|movetime| elapsed >= movetime)
        || info.limits.nodes.is_some_and(|nodes| control.nodes() >= nodes)
    {
        control.request_stop();
    }
}

/// The search window around the previous iteration's score, widened
/// geometrically on each fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AspirationWindow {
    pub alpha: i32,
    pub beta: i32,
    delta: i32,
}

impl AspirationWindow {
    pub const fn infinite() -> Self {
        Self { alpha: -INFINITY, beta: INFINITY, delta: 0 }
    }

    /// `depth` is in plies.
    pub fn around(prev_score: i32, depth: i32, conf: &Config) -> Self {
        if conf.use_aspiration && depth >= 5 && prev_score.abs() < VALUE_KNOWN_WIN {
            let delta = conf.aspiration_delta;
            Self { alpha: (prev_score - delta).max(-INFINITY), beta: (prev_score + delta).min(INFINITY), delta }
        } else {
            Self::infinite()
        }
    }

    pub fn widen_up(&mut self, value: i32, conf: &Config) {
        if value.abs() >= VALUE_KNOWN_WIN {
            *self = Self::infinite();
            return;
        }
        self.beta = if self.delta > conf.aspiration_max_delta { INFINITY } else { (self.beta + self.delta).min(INFINITY) };
        self.delta += self.delta / 2;
    }

    pub fn widen_down(&mut self, value: i32, conf: &Config) {
        if value.abs() >= VALUE_KNOWN_WIN {
            *self = Self::infinite();
            return;
        }
        self.alpha = if self.delta > conf.aspiration_max_delta { -INFINITY } else { (self.alpha - self.delta).max(-INFINITY) };
        self.delta += self.delta / 2;
    }
}

/// Deepens the root search one ply at a time until stopped or out of
/// depth. Returns the last depth that was completed.
fn iterative_deepening(pos: &mut Board, t: &mut ThreadData, info: &SearchInfo) -> i32 {
    let control = info.control;
    let conf = info.conf;
    let use_time_management = info.limits.use_time_management(pos.turn());
    let max_depth = info.limits.depth.map_or(MAX_DEPTH - 1, |d| d.clamp(1, MAX_DEPTH - 1));
    let mut best_move_never_changed = true;
    let mut completed = 0;

    for depth in 1..=max_depth {
        if control.stopped() {
            break;
        }
        let prev_score = {
            let mut root_moves = info.root_moves();
            root_moves.save_scores();
            root_moves.best().map_or(-INFINITY, |rm| rm.prev_score)
        };
        let prev_changes = control.best_move_changes.swap(0, Ordering::SeqCst);
        let mut window = AspirationWindow::around(prev_score, depth, conf);

        let best_value = loop {
            let value = pos.alpha_beta::<Root>(t, info, 0, window.alpha, window.beta, depth * ONE_PLY);

            // the sort is stable, so only the new best move moves.
            {
                let mut root_moves = info.root_moves();
                root_moves.sort();
                if let Some(best) = root_moves.best() {
                    best.insert_pv_in_tt(pos, info.tt, &mut t.pawn_cache);
                }
            }

            if control.stopped() {
                break value;
            }
            if (value > window.alpha && value < window.beta) || info.elapsed_millis() > BOUND_INFO_DELAY {
                readout_info(info, depth, window.alpha, window.beta);
            }

            if value >= window.beta {
                window.widen_up(value, conf);
            } else if value <= window.alpha {
                control.failed_low_at_root.store(true, Ordering::SeqCst);
                control.stop_on_ponderhit.store(false, Ordering::SeqCst);
                window.widen_down(value, conf);
            } else {
                break value;
            }
        };

        if control.stopped() {
            break;
        }
        completed = depth;

        let changes = control.best_move_changes.load(Ordering::SeqCst);
        if depth > 2 && changes > 0 {
            best_move_never_changed = false;
        }

        if let Some(mate) = info.limits.mate {
            if best_value >= mate_in((mate as usize).saturating_mul(2).min(MAX_PLY)) {
                control.request_stop();
            }
        }

        if !control.stopped() && !control.stop_on_ponderhit.load(Ordering::SeqCst) && use_time_management {
            let mut stop = false;
            let (elapsed, available) = {
                let mut tm = info.time_manager();
                if depth > 4 && depth < 50 {
                    tm.pv_instability(changes, prev_changes);
                }
                (tm.elapsed_millis(), tm.available_time())
            };

            // the first move of the next iteration would not finish anyway.
            if elapsed > available / 100 * 62 {
                stop = true;
            }

            // one move much better than the rest: play it.
            if depth >= 12
                && !stop
                && best_value.abs() < VALUE_KNOWN_WIN
                && ((best_move_never_changed && pos.captured_piece_type().is_some()) || elapsed > available / 100 * 40)
            {
                let best = info.root_moves().best().map(RootMove::mov);
                if let Some(best) = best {
                    let r_beta = best_value - conf.easy_move_margin;
                    {
                        let ss = t.ss.at_mut(0);
                        ss.excluded_move = Some(best);
                        ss.skip_null_move = true;
                    }
                    let v = pos.alpha_beta::<NonPv>(t, info, 0, r_beta - 1, r_beta, (depth - 3) * ONE_PLY);
                    {
                        let ss = t.ss.at_mut(0);
                        ss.excluded_move = None;
                        ss.skip_null_move = false;
                    }
                    if v < r_beta {
                        log::debug!("easy move {best} at depth {depth}");
                        stop = true;
                    }
                }
            }

            if stop {
                control.stop_or_defer();
            }
        }
    }

    completed
}

/// Print the result of an iteration, or of one aspiration attempt.
fn readout_info(info: &SearchInfo, depth: i32, alpha: i32, beta: i32) {
    if !info.print_to_stdout {
        return;
    }
    let elapsed = info.elapsed_millis();
    let nodes = info.control.nodes();
    let root_moves = info.root_moves();
    let Some(rm) = root_moves.best() else {
        return;
    };
    let bound = if rm.score >= beta {
        " lowerbound"
    } else if rm.score <= alpha {
        " upperbound"
    } else {
        ""
    };
    println!(
        "info depth {depth} seldepth {} score {}{bound} nodes {nodes} nps {} hashfull {} time {elapsed} {}",
        info.seldepth.load(Ordering::Relaxed),
        uci_score(rm.score),
        nodes * 1000 / elapsed.max(1),
        info.tt.hashfull(),
        rm.pv,
    );
}

/// Search a split node with the search routine of its kind.
pub fn search_split_node(
    pos: &mut Board,
    t: &mut ThreadData,
    info: &SearchInfo,
    kind: SplitKind,
    ply: usize,
    alpha: i32,
    beta: i32,
    depth: Depth,
) {
    match kind {
        SplitKind::Root => pos.alpha_beta::<SplitRoot>(t, info, ply, alpha, beta, depth),
        SplitKind::Pv => pos.alpha_beta::<SplitPv>(t, info, ply, alpha, beta, depth),
        SplitKind::NonPv => pos.alpha_beta::<SplitNonPv>(t, info, ply, alpha, beta, depth),
    };
}

/// Help with someone else's split point: on a copy of the split position,
/// with a fresh stack seeded from the master's frames around the split ply.
pub fn search_as_helper(t: &mut ThreadData, info: &SearchInfo, id: SplitPointId, attachment: Attachment) {
    let Attachment { mut board, frames, ply, depth, alpha, beta, kind, chain } = attachment;
    let own_stack = mem::replace(&mut t.ss, SearchStack::boxed_with_window(ply, &frames));
    let own_chain = mem::replace(&mut t.sp_chain, chain);
    search_split_node(&mut board, t, info, kind, ply, alpha, beta, depth);
    t.ss = own_stack;
    t.sp_chain = own_chain;
    info.pool.detach(id, t.id);
}

impl Board {
    /// Search a child node, dropping into quiescence search below one ply.
    fn child_search<NT: NodeType>(
        &mut self,
        t: &mut ThreadData,
        info: &SearchInfo,
        ply: usize,
        alpha: i32,
        beta: i32,
        depth: Depth,
    ) -> i32 {
        if depth < ONE_PLY {
            self.quiescence::<NT>(t, info, ply, alpha, beta, DEPTH_ZERO)
        } else {
            self.alpha_beta::<NT>(t, info, ply, alpha, beta, depth)
        }
    }

    /// The next move to search that is legal, not excluded, and, at the
    /// root, among the root moves.
    fn next_legal_move<NT: NodeType>(
        &self,
        picker: &mut MovePicker,
        info: &SearchInfo,
        excluded_move: Option<Move>,
        pinned: SquareSet,
    ) -> Option<Move> {
        loop {
            let m = picker.next(self, &info.history)?;
            if Some(m) == excluded_move {
                continue;
            }
            if NT::ROOT && !info.root_moves().contains(m) {
                continue;
            }
            if !self.is_legal(m, pinned) {
                continue;
            }
            return Some(m);
        }
    }

    /// Principal variation search with the pruning of a mature alpha-beta
    /// engine, splitting its move loop with idle workers when it is deep enough.
    #[allow(clippy::too_many_lines, clippy::cognitive_complexity)]
    fn alpha_beta<NT: NodeType>(
        &mut self,
        t: &mut ThreadData,
        info: &SearchInfo,
        ply: usize,
        mut alpha: i32,
        mut beta: i32,
        depth: Depth,
    ) -> i32 {
        debug_assert!(-INFINITY <= alpha && alpha < beta && beta <= INFINITY);
        debug_assert!(NT::PV || alpha == beta - 1);
        debug_assert!(depth > DEPTH_ZERO);

        let pool = info.pool;
        let conf = info.conf;
        let in_check = self.in_check();
        let old_alpha = alpha;
        let split_point: Option<&SplitPoint> =
            if NT::SPLIT { t.sp_chain.last().map(|&id| pool.split_point(id)) } else { None };

        let mut quiets = ArrayVec::<Move, MAX_QUIETS>::new();
        let mut tt_hit: Option<TTHit> = None;
        let mut tt_move: Option<Move>;
        let excluded_move: Option<Move>;
        let mut threat_move: Option<Move> = None;
        let mut best_value: i32;
        let mut best_move: Option<Move>;
        let mut move_count: usize;

        if NT::SPLIT {
            let Some(sp) = split_point else {
                return alpha;
            };
            let guard = sp.lock();
            let Some(job) = guard.as_ref() else {
                return alpha;
            };
            tt_move = job.tt_move;
            excluded_move = job.excluded_move;
            threat_move = job.threat_move;
            best_value = job.best_value;
            best_move = job.best_move;
            move_count = job.move_count;
        } else {
            t.nodes.increment();
            if t.nodes.just_ticked_over() && info.limits.nodes.is_some_and(|limit| t.nodes.get_global() >= limit) {
                info.control.request_stop();
            }
            if ply > t.seldepth {
                t.seldepth = ply;
                info.update_seldepth(ply);
            }

            // Step 1. Aborted search and immediate draws.
            if !NT::ROOT && (info.control.stopped() || t.cutoff_occurred(pool) || ply >= MAX_PLY || self.is_draw(false)) {
                return DRAW;
            }

            // Step 2. Mate distance pruning: even mating at the next move
            // cannot beat a shorter mate found elsewhere.
            if !NT::ROOT {
                alpha = alpha.max(mated_in(ply));
                beta = beta.min(mate_in(ply + 1));
                if alpha >= beta {
                    return alpha;
                }
            }

            {
                let ss = t.ss.at_mut(ply);
                ss.ply = ply;
                ss.current_move = None;
                ss.best_move = None;
                excluded_move = ss.excluded_move;
            }
            {
                let child = t.ss.at_mut(ply + 1);
                child.excluded_move = None;
                child.skip_null_move = false;
                child.reduction = DEPTH_ZERO;
            }
            t.ss.at_mut(ply + 2).killers = [None; 2];

            // Step 3. Transposition table lookup. A search with an excluded
            // move uses a different key, so that it neither reads nor
            // overwrites the full search of this position.
            let pos_key = if excluded_move.is_some() { self.exclusion_key() } else { self.key() };
            tt_hit = info.tt.probe(pos_key, ply);
            tt_move = if NT::ROOT { info.root_moves().best().map(RootMove::mov) } else { tt_hit.and_then(|hit| hit.mov) };

            if !NT::ROOT {
                if let Some(hit) = tt_hit {
                    let usable =
                        if NT::PV { hit.bound == Bound::Exact && hit.depth >= depth } else { can_return_tt(&hit, depth, beta) };
                    if usable {
                        t.ss.at_mut(ply).best_move = tt_move;
                        if hit.value >= beta {
                            if let Some(m) = tt_move {
                                if !self.is_capture_or_promotion(m) {
                                    t.ss.at_mut(ply).add_killer(m);
                                }
                            }
                        }
                        return hit.value;
                    }
                }
            }

            // Step 4. Static evaluation, refined by the hash value when it is a
            // bound on the right side.
            let refined_value = if in_check {
                let ss = t.ss.at_mut(ply);
                ss.eval = VALUE_NONE;
                ss.eval_margin = VALUE_NONE;
                VALUE_NONE
            } else if let Some(hit) = tt_hit.filter(|hit| hit.static_value != VALUE_NONE) {
                let ss = t.ss.at_mut(ply);
                ss.eval = hit.static_value;
                ss.eval_margin = hit.static_margin;
                refine_eval(&hit, hit.static_value)
            } else {
                let eval = evaluate(self, &mut t.pawn_cache);
                let ss = t.ss.at_mut(ply);
                ss.eval = eval.value;
                ss.eval_margin = eval.margin;
                if tt_hit.is_none() {
                    info.tt.store(pos_key, ply, None, VALUE_NONE, Bound::None, DEPTH_NONE, eval.value, eval.margin);
                }
                eval.value
            };

            // learn how much the quiet move that led here changed the evaluation.
            let parent = *t.ss.parent(ply);
            let eval = t.ss.at(ply).eval;
            if let Some(prev) = parent.current_move {
                if !prev.is_null()
                    && !prev.is_special()
                    && parent.eval != VALUE_NONE
                    && eval != VALUE_NONE
                    && self.captured_piece_type().is_none()
                {
                    if let Some(piece) = self.piece_at(prev.to()) {
                        info.history.update_gain(piece, prev.to(), -parent.eval - eval);
                    }
                }
            }

            let us = self.turn();
            let skip_null_move = t.ss.at(ply).skip_null_move;

            // Step 5. Razoring: far below beta at low depth, check with a
            // quiescence search whether anything can save us.
            if !NT::PV
                && conf.use_razoring
                && depth < conf.razor_depth
                && !in_check
                && refined_value + conf.razor_margin(depth) < beta
                && tt_move.is_none()
                && beta.abs() < MINIMUM_MATE_SCORE
                && !self.has_pawn_on_seventh(us)
            {
                let r_beta = beta - conf.razor_margin(depth);
                let v = self.quiescence::<NonPv>(t, info, ply, r_beta - 1, r_beta, DEPTH_ZERO);
                if v < r_beta {
                    return v;
                }
            }

            // Step 6. Static null move pruning: far enough above beta that no
            // quiet reply will bring the score back down.
            if !NT::PV
                && conf.use_static_null_move
                && !skip_null_move
                && depth < conf.razor_depth
                && !in_check
                && refined_value - conf.tables.futility_margin(depth, 0) >= beta
                && beta.abs() < MINIMUM_MATE_SCORE
                && self.non_pawn_material(us) > 0
            {
                return refined_value - conf.tables.futility_margin(depth, 0);
            }

            // Step 7. Null move search.
            if !NT::PV
                && conf.use_null_move
                && !skip_null_move
                && depth > ONE_PLY
                && !in_check
                && refined_value >= beta
                && beta.abs() < MINIMUM_MATE_SCORE
                && self.non_pawn_material(us) > 0
            {
                let mut r = 3 + if depth >= 5 * ONE_PLY { depth / 8 } else { 0 };
                if refined_value - PAWN_VALUE_MG > beta {
                    r += 1;
                }
                let reduced = depth - r * ONE_PLY;

                t.ss.at_mut(ply).current_move = Some(Move::NULL);
                self.make_nullmove();
                t.ss.at_mut(ply + 1).skip_null_move = true;
                let mut null_value = -self.child_search::<NonPv>(t, info, ply + 1, -beta, -alpha, reduced);
                t.ss.at_mut(ply + 1).skip_null_move = false;
                self.unmake_nullmove();

                if null_value >= beta {
                    // do not return unproven mates.
                    if null_value >= MINIMUM_MATE_SCORE {
                        null_value = beta;
                    }
                    if depth < 6 * ONE_PLY {
                        return null_value;
                    }
                    // verify at high depth, without null move.
                    t.ss.at_mut(ply).skip_null_move = true;
                    let v = self.child_search::<NonPv>(t, info, ply, alpha, beta, reduced);
                    t.ss.at_mut(ply).skip_null_move = false;
                    if v >= beta {
                        return null_value;
                    }
                } else {
                    // the move that refuted the null move is a threat. If the
                    // move that led here was reduced and is connected to the
                    // threat, fail low so that it gets searched to full depth.
                    threat_move = t.ss.at(ply + 1).best_move.filter(|m| !m.is_null());
                    if let (Some(threat), Some(prev)) = (threat_move, parent.current_move) {
                        if depth < conf.threat_depth && parent.reduction != DEPTH_ZERO && connected_moves(self, prev, threat) {
                            return beta - 1;
                        }
                    }
                }
            }

            // Step 8. ProbCut: a good capture that beats beta by a margin at
            // reduced depth will very likely beat beta at full depth too.
            if !NT::PV
                && conf.use_probcut
                && depth >= conf.razor_depth + ONE_PLY
                && !in_check
                && !skip_null_move
                && excluded_move.is_none()
                && beta.abs() < MINIMUM_MATE_SCORE
            {
                let r_beta = beta + conf.probcut_margin;
                let r_depth = depth - conf.probcut_reduction;
                let threshold = self.captured_piece_type().map_or(0, mg_value);
                let pinned = self.pinned_pieces();
                let mut picker = MovePicker::probcut(self, tt_move, threshold);
                while let Some(m) = picker.next(self, &info.history) {
                    if !self.is_legal(m, pinned) {
                        continue;
                    }
                    t.ss.at_mut(ply).current_move = Some(m);
                    self.make_move(m);
                    let value = -self.child_search::<NonPv>(t, info, ply + 1, -r_beta, -r_beta + 1, r_depth);
                    self.unmake_move(m);
                    if value >= r_beta {
                        return value;
                    }
                }
            }

            // Step 9. Internal iterative deepening: find a move to search first.
            let iid_depth = if NT::PV { depth - 2 * ONE_PLY } else { depth / 2 };
            if conf.use_iid
                && depth >= conf.iid_depth(NT::PV)
                && iid_depth >= ONE_PLY
                && tt_move.is_none()
                && (NT::PV || (!in_check && t.ss.at(ply).eval + conf.iid_margin >= beta))
            {
                t.ss.at_mut(ply).skip_null_move = true;
                if NT::PV {
                    self.alpha_beta::<Pv>(t, info, ply, alpha, beta, iid_depth);
                } else {
                    self.alpha_beta::<NonPv>(t, info, ply, alpha, beta, iid_depth);
                }
                t.ss.at_mut(ply).skip_null_move = false;
                tt_hit = info.tt.probe(pos_key, ply);
                tt_move = tt_hit.and_then(|hit| hit.mov);
            }

            best_value = -INFINITY;
            best_move = None;
            move_count = 0;
        }

        // Step 10. The move loop.
        let ci = self.check_info();
        let futility_base = {
            let ss = t.ss.at(ply);
            ss.eval + ss.eval_margin
        };
        let singular_extension_node = !NT::ROOT
            && !NT::SPLIT
            && conf.use_singular_extension
            && depth >= conf.singular_depth(NT::PV)
            && depth / 2 >= ONE_PLY
            && excluded_move.is_none()
            && tt_move.is_some()
            && tt_hit.is_some_and(|hit| hit.bound.is_lower() && hit.depth >= depth - 3 * ONE_PLY);
        let mut picker =
            if NT::SPLIT { MovePicker::default() } else { MovePicker::new(self, tt_move, depth, t.ss.at(ply).killers) };
        if !NT::SPLIT {
            t.ss.at_mut(ply).best_move = None;
        }

        loop {
            if info.control.stopped() || t.cutoff_occurred(pool) {
                break;
            }
            let next = if let Some(sp) = split_point {
                let mut guard = sp.lock();
                let Some(job) = guard.as_mut() else {
                    break;
                };
                best_value = job.best_value;
                alpha = job.alpha;
                if best_value >= beta {
                    None
                } else {
                    let m = self.next_legal_move::<NT>(&mut job.picker, info, excluded_move, ci.pinned);
                    if m.is_some() {
                        job.move_count += 1;
                        move_count = job.move_count;
                    }
                    m
                }
            } else if best_value >= beta {
                None
            } else {
                let m = self.next_legal_move::<NT>(&mut picker, info, excluded_move, ci.pinned);
                if m.is_some() {
                    move_count += 1;
                }
                m
            };
            let Some(m) = next else {
                break;
            };

            let capture_or_promotion = self.is_capture_or_promotion(m);
            let gives_check = self.gives_check(m, &ci);
            let dangerous = gives_check || is_dangerous(self, m, capture_or_promotion);
            let is_pv_move = NT::PV && move_count == 1;

            if NT::ROOT {
                info.control.first_root_move.store(move_count == 1, Ordering::Relaxed);
                if t.is_main_thread() && info.print_to_stdout && info.elapsed_millis() > CURRMOVE_INFO_DELAY {
                    println!("info depth {} currmove {m} currmovenumber {move_count}", depth / ONE_PLY);
                }
            }

            // Step 11. Extensions.
            let mut ext = DEPTH_ZERO;
            if NT::PV && dangerous {
                ext = ONE_PLY;
            } else if gives_check && self.see_sign(m) >= 0 {
                ext = ONE_PLY / 2;
            }

            // singular extension: extend the hash move if every other move
            // fails low against a bound just under its value.
            if singular_extension_node && Some(m) == tt_move && ext == DEPTH_ZERO {
                if let Some(hit) = tt_hit.filter(|hit| hit.value.abs() < VALUE_KNOWN_WIN) {
                    let r_beta = hit.value - depth;
                    {
                        let ss = t.ss.at_mut(ply);
                        ss.excluded_move = Some(m);
                        ss.skip_null_move = true;
                    }
                    let value = self.alpha_beta::<NonPv>(t, info, ply, r_beta - 1, r_beta, depth / 2);
                    {
                        let ss = t.ss.at_mut(ply);
                        ss.excluded_move = None;
                        ss.skip_null_move = false;
                        ss.best_move = None;
                    }
                    if value < r_beta {
                        ext = ONE_PLY;
                    }
                }
            }

            let new_depth = depth - ONE_PLY + ext;

            // Step 12. Futility pruning of quiet moves.
            if !NT::PV
                && !in_check
                && !capture_or_promotion
                && !dangerous
                && Some(m) != tt_move
                && !m.is_castle()
                && (best_value > -MINIMUM_MATE_SCORE || best_value == -INFINITY)
            {
                // move count based pruning
                if conf.use_move_count_pruning
                    && move_count >= conf.tables.futility_move_count(depth)
                    && threat_move.is_none_or(|threat| !connected_threat(self, m, threat))
                {
                    continue;
                }

                let predicted_depth = new_depth - conf.tables.reduction(NT::PV, depth, move_count);

                // value based pruning
                if conf.use_futility_pruning {
                    let gain = self.moved_piece(m).map_or(0, |piece| info.history.gain(piece, m.to()));
                    let futility_value = futility_base + conf.tables.futility_margin(predicted_depth, move_count) + gain;
                    if futility_value < beta {
                        if let Some(sp) = split_point {
                            let mut guard = sp.lock();
                            if let Some(job) = guard.as_mut() {
                                if futility_value > job.best_value {
                                    job.best_value = futility_value;
                                    best_value = futility_value;
                                }
                            }
                        } else if futility_value > best_value {
                            best_value = futility_value;
                        }
                        continue;
                    }
                }

                // losing quiet moves near the horizon
                if conf.use_see_pruning && predicted_depth < 2 * ONE_PLY && self.see_sign(m) < 0 {
                    continue;
                }
            }

            // Step 13. Make the move.
            if !NT::SPLIT && !capture_or_promotion && !quiets.is_full() {
                quiets.push(m);
            }
            t.ss.at_mut(ply).current_move = Some(m);
            self.make_move(m);
            info.tt.prefetch(self.key());

            // Step 14. Late move reductions, re-searched at full depth on a fail high.
            let lmr = conf.use_lmr
                && depth > 3 * ONE_PLY
                && !is_pv_move
                && !capture_or_promotion
                && !dangerous
                && !m.is_castle()
                && !t.ss.at(ply).killers.contains(&Some(m));
            let mut value = if lmr {
                let reduction = conf.tables.reduction(NT::PV, depth, move_count);
                t.ss.at_mut(ply).reduction = reduction;
                if let Some(a) = split_point.and_then(shared_alpha) {
                    alpha = a;
                }
                let v = -self.child_search::<NonPv>(t, info, ply + 1, -(alpha + 1), -alpha, new_depth - reduction);
                t.ss.at_mut(ply).reduction = DEPTH_ZERO;
                v
            } else {
                -INFINITY
            };
            let do_full_depth_search = if lmr { value > alpha } else { !is_pv_move };

            // Step 15. Full depth null window search.
            if do_full_depth_search {
                if let Some(a) = split_point.and_then(shared_alpha) {
                    alpha = a;
                }
                value = -self.child_search::<NonPv>(t, info, ply + 1, -(alpha + 1), -alpha, new_depth);
            }

            // full window search for the first move of a PV node, and for
            // moves that beat alpha but not beta.
            if NT::PV && (is_pv_move || (value > alpha && (NT::ROOT || value < beta))) {
                value = -self.child_search::<Pv>(t, info, ply + 1, -beta, -alpha, new_depth);
            }

            // Step 16. Unmake the move.
            self.unmake_move(m);
            debug_assert!(value > -INFINITY && value < INFINITY);

            // Step 17. New best move?
            let mut guard = split_point.map(SplitPoint::lock);
            let mut job = guard.as_deref_mut().and_then(Option::as_mut);
            if let Some(job) = job.as_deref_mut() {
                best_value = job.best_value;
                alpha = job.alpha;
                if !capture_or_promotion && !job.quiets.is_full() {
                    job.quiets.push(m);
                }
            }

            // a stopped search returns garbage, so the root moves keep the
            // results of the last iteration.
            if NT::ROOT && !info.control.stopped() {
                let mut root_moves = info.root_moves();
                if let Some(rm) = root_moves.find_mut(m) {
                    if is_pv_move || value > alpha {
                        rm.score = value;
                        rm.extract_pv_from_tt(self, info.tt);
                        if !is_pv_move {
                            info.control.best_move_changes.fetch_add(1, Ordering::SeqCst);
                        }
                    } else {
                        // the sort is stable, so this keeps the move order.
                        rm.score = -INFINITY;
                    }
                }
            }

            if value > best_value {
                best_value = value;
                best_move = Some(m);
                t.ss.at_mut(ply).best_move = Some(m);
                if NT::PV && value > alpha && value < beta {
                    alpha = value;
                }
                if let Some(job) = job.as_deref_mut() {
                    if !t.cutoff_occurred(pool) {
                        job.best_value = value;
                        job.best_move = Some(m);
                        job.alpha = alpha;
                        if value >= beta {
                            if let Some(sp) = split_point {
                                sp.mark_cutoff(job);
                            }
                        }
                    }
                }
            }
            drop(guard);

            // Step 18. Hand the remaining moves to idle workers.
            if !NT::SPLIT
                && best_value < beta
                && !info.control.stopped()
                && !t.cutoff_occurred(pool)
                && pool.should_split(t.id, depth)
            {
                let request = SplitRequest {
                    ply,
                    depth,
                    alpha,
                    beta,
                    kind: NT::KIND,
                    tt_move,
                    excluded_move,
                    threat_move,
                    best_value,
                    best_move,
                    move_count,
                };
                if let Some(outcome) = pool.split(self, t, info, request, &mut picker) {
                    best_value = outcome.best_value;
                    best_move = outcome.best_move;
                    move_count = outcome.move_count;
                    for q in outcome.quiets {
                        if quiets.is_full() {
                            break;
                        }
                        quiets.push(q);
                    }
                    t.ss.at_mut(ply).best_move = best_move;
                    break;
                }
            }
        }

        if NT::SPLIT {
            return best_value;
        }

        // Step 19. Mate and stalemate. In a search with an excluded move,
        // having no other move just means failing low.
        if move_count == 0 {
            return if excluded_move.is_some() {
                old_alpha
            } else if in_check {
                mated_in(ply)
            } else {
                DRAW
            };
        }

        // every move was pruned without being searched.
        if best_value == -INFINITY {
            best_value = old_alpha;
        }

        // Step 20. Update the hash table, killers, and history.
        if !info.control.stopped() && !t.cutoff_occurred(pool) {
            let pos_key = if excluded_move.is_some() { self.exclusion_key() } else { self.key() };
            let (mov, bound) = if best_value <= old_alpha {
                (None, Bound::Upper)
            } else if best_value >= beta {
                (best_move, Bound::Lower)
            } else {
                (best_move, Bound::Exact)
            };
            let ss = *t.ss.at(ply);
            info.tt.store(pos_key, ply, mov, best_value, bound, depth, ss.eval, ss.eval_margin);

            if best_value >= beta && !in_check {
                if let Some(best) = best_move.filter(|&m| !self.is_capture_or_promotion(m)) {
                    t.ss.at_mut(ply).add_killer(best);
                    let bonus = depth * depth;
                    if let Some(piece) = self.moved_piece(best) {
                        info.history.add(piece, best.to(), bonus);
                    }
                    for &q in quiets.iter().filter(|&&q| q != best) {
                        if let Some(piece) = self.moved_piece(q) {
                            info.history.add(piece, q.to(), -bonus);
                        }
                    }
                }
            }
        }

        best_value
    }

    /// Quiescence search: only captures, queen promotions, and near the
    /// horizon quiet checks, until the position is quiet enough to stand pat.
    #[allow(clippy::too_many_lines)]
    fn quiescence<NT: NodeType>(
        &mut self,
        t: &mut ThreadData,
        info: &SearchInfo,
        ply: usize,
        mut alpha: i32,
        beta: i32,
        depth: Depth,
    ) -> i32 {
        debug_assert!(-INFINITY <= alpha && alpha < beta && beta <= INFINITY);
        debug_assert!(NT::PV || alpha == beta - 1);
        debug_assert!(depth <= DEPTH_ZERO);

        t.nodes.increment();
        if ply > t.seldepth {
            t.seldepth = ply;
            info.update_seldepth(ply);
        }

        if ply >= MAX_PLY || self.is_draw(true) {
            return DRAW;
        }

        let conf = info.conf;
        let in_check = self.in_check();
        let old_alpha = alpha;
        {
            let ss = t.ss.at_mut(ply);
            ss.ply = ply;
            ss.current_move = None;
            ss.best_move = None;
        }

        // the depth at which the table entry of this node is stored: with or
        // without quiet checks.
        let tt_depth = if in_check || depth >= DEPTH_QS_CHECKS { DEPTH_QS_CHECKS } else { DEPTH_QS_NO_CHECKS };
        let key = self.key();
        let tt_hit = info.tt.probe(key, ply);
        let tt_move = tt_hit.and_then(|hit| hit.mov);

        if !NT::PV {
            if let Some(hit) = tt_hit {
                if can_return_tt(&hit, tt_depth, beta) {
                    t.ss.at_mut(ply).best_move = tt_move;
                    return hit.value;
                }
            }
        }

        let mut best_value;
        let futility_base;
        let mut enough_material = false;
        if in_check {
            let ss = t.ss.at_mut(ply);
            ss.eval = VALUE_NONE;
            ss.eval_margin = VALUE_NONE;
            best_value = -INFINITY;
            futility_base = -INFINITY;
        } else {
            let (eval, margin) = match tt_hit.filter(|hit| hit.static_value != VALUE_NONE) {
                Some(hit) => (hit.static_value, hit.static_margin),
                None => {
                    let eval = evaluate(self, &mut t.pawn_cache);
                    (eval.value, eval.margin)
                }
            };
            let ss = t.ss.at_mut(ply);
            ss.eval = eval;
            ss.eval_margin = margin;
            best_value = eval;

            // stand pat
            if best_value >= beta {
                if tt_hit.is_none() {
                    info.tt.store(key, ply, None, best_value, Bound::Lower, DEPTH_NONE, eval, margin);
                }
                return best_value;
            }
            if NT::PV && best_value > alpha {
                alpha = best_value;
            }
            futility_base = eval + margin + conf.qs_futility_margin;
            enough_material = self.non_pawn_material(self.turn()) > ROOK_VALUE_MG;
        }

        let ci = self.check_info();
        let eval = t.ss.at(ply).eval;
        let recapture_sq = t.ss.parent(ply).current_move.filter(|m| !m.is_null()).map(Move::to);
        let mut picker = MovePicker::qsearch(self, tt_move, depth, recapture_sq);
        let prune = conf.use_qs_pruning;

        while best_value < beta {
            let Some(m) = picker.next(self, &info.history) else {
                break;
            };
            if !self.is_legal(m, ci.pinned) {
                continue;
            }
            let gives_check = self.gives_check(m, &ci);

            // futility and delta pruning
            if prune
                && !NT::PV
                && !in_check
                && !gives_check
                && Some(m) != tt_move
                && enough_material
                && !m.is_promo()
                && !self.is_passed_pawn_push(m)
            {
                let victim = self.piece_at(m.to()).map_or(0, |p| eg_value(p.piece_type()));
                let futility_value = futility_base + victim + if m.is_ep() { PAWN_VALUE_EG } else { 0 };
                if futility_value < beta {
                    best_value = best_value.max(futility_value);
                    continue;
                }
                // captures that do not win material cannot lift us to beta.
                if futility_base < beta && depth < DEPTH_ZERO && self.static_exchange_eval(m) <= 0 {
                    continue;
                }
            }

            // losing evasions are pruned once a non-mated score is known.
            let evasion_prunable = in_check
                && best_value > -MINIMUM_MATE_SCORE
                && !self.is_capture(m)
                && !self.castling_rights().any(self.turn());

            if prune
                && !NT::PV
                && (!in_check || evasion_prunable)
                && Some(m) != tt_move
                && !m.is_promo()
                && self.see_sign(m) < 0
            {
                continue;
            }

            // quiet checks that are neither near beta nor dangerous
            if prune
                && !NT::PV
                && !in_check
                && gives_check
                && Some(m) != tt_move
                && !self.is_capture_or_promotion(m)
                && eval + PAWN_VALUE_MG / 4 < beta
                && !check_is_dangerous(self, m, futility_base, beta, &mut best_value)
            {
                best_value = best_value.max(eval + PAWN_VALUE_MG / 4);
                continue;
            }

            t.ss.at_mut(ply).current_move = Some(m);
            self.make_move(m);
            let value = -self.quiescence::<NT>(t, info, ply + 1, -beta, -alpha, depth - ONE_PLY);
            self.unmake_move(m);

            if value > best_value {
                best_value = value;
                t.ss.at_mut(ply).best_move = Some(m);
                if NT::PV && value > alpha && value < beta {
                    alpha = value;
                }
            }
        }

        if in_check && best_value == -INFINITY {
            return mated_in(ply);
        }

        let ss = *t.ss.at(ply);
        let (mov, bound) = if best_value <= old_alpha {
            (None, Bound::Upper)
        } else if best_value >= beta {
            (ss.best_move, Bound::Lower)
        } else {
            (ss.best_move, Bound::Exact)
        };
        info.tt.store(key, ply, mov, best_value, bound, tt_depth, ss.eval, ss.eval_margin);

        best_value
    }
}

/// The alpha of the split point `sp`, which other participants may have raised.
fn shared_alpha(sp: &SplitPoint) -> Option<i32> {
    sp.lock().as_ref().map(|job| job.alpha)
}

/// Whether a hash entry settles the node without searching: deep enough, or
/// a mate score that no search can improve, and a bound on the right side of beta.
fn can_return_tt(hit: &TTHit, depth: Depth, beta: i32) -> bool {
    let v = hit.value;
    (hit.depth >= depth || v >= MINIMUM_MATE_SCORE.max(beta) || v < (-MINIMUM_MATE_SCORE).min(beta))
        && ((hit.bound.is_lower() && v >= beta) || (hit.bound.is_upper() && v < beta))
}

/// The static evaluation, replaced by the hash value when that is a better estimate.
fn refine_eval(hit: &TTHit, eval: i32) -> i32 {
    let v = hit.value;
    if (hit.bound.is_lower() && v >= eval) || (hit.bound.is_upper() && v < eval) { v } else { eval }
}

/// Whether `second` is made possible by `first`, where `first` is the move
/// that led to this position and `second` is the move that refuted a null
/// move here. Both are moves of the side not to move.
fn connected_moves(pos: &Board, first: Move, second: Move) -> bool {
    if first.is_null() || second.is_null() {
        return false;
    }
    let (f1, t1) = (first.from(), first.to());
    let (f2, t2) = (second.from(), second.to());

    // the same piece moves twice
    if f2 == t1 {
        return true;
    }
    // the second move goes where the first came from
    if t2 == f1 {
        return true;
    }
    // the second move slides through the square the first vacated
    if pos.piece_at(f2).is_some_and(|p| p.piece_type().is_slider()) && RAY_BETWEEN[f2][t2].contains_square(f1) {
        return true;
    }
    let Some(p1) = pos.piece_at(t1) else {
        return false;
    };
    // the first move defends the destination of the second
    if pos.attacks_from(p1, t1, pos.occupied()).contains_square(t2) {
        return true;
    }
    // the second move uncovers a check by the piece that made the first
    let ksq = pos.king_sq(pos.turn());
    if p1.piece_type().is_slider() && RAY_BETWEEN[t1][ksq].contains_square(f2) {
        let occupied = pos.occupied().remove_square(f2);
        if pos.attacks_from(p1, t1, occupied).contains_square(ksq) {
            return true;
        }
    }
    false
}

/// Whether the quiet move `m` is a reply to `threat`, the opponent's best
/// move after a null move, and so must not be pruned.
fn connected_threat(pos: &Board, m: Move, threat: Move) -> bool {
    let (m_to, t_from, t_to) = (m.to(), threat.from(), threat.to());

    // moving the threatened piece away
    if m.from() == t_to {
        return true;
    }
    // defending a piece worth at least as much as its attacker
    if pos.is_capture(threat) {
        let attacker = pos.piece_at(t_from).map(|p| p.piece_type());
        let victim = pos.piece_at(t_to).map_or(0, |p| mg_value(p.piece_type()));
        if attacker.is_some_and(|a| a == PieceType::King || mg_value(a) >= victim) && pos.move_attacks_square(m, t_to) {
            return true;
        }
    }
    // safely blocking the ray of a sliding attacker
    if pos.piece_at(t_from).is_some_and(|p| p.piece_type().is_slider())
        && RAY_BETWEEN[t_from][t_to].contains_square(m_to)
        && pos.see_sign(m) >= 0
    {
        return true;
    }
    false
}

/// Pawn pushes to the seventh rank or of passed pawns, and captures that
/// leave a pure pawn ending.
fn is_dangerous(pos: &Board, m: Move, capture_or_promotion: bool) -> bool {
    let us = pos.turn();
    if pos.moved_piece(m).is_some_and(|p| p.piece_type() == PieceType::Pawn) {
        if m.to().rank().relative_to(us) == Rank::Seven {
            return true;
        }
        if pos.pawn_is_passed(us, m.to()) {
            return true;
        }
    }
    if capture_or_promotion && !m.is_special() {
        let victim = pos.piece_at(m.to()).map(|p| p.piece_type());
        if victim != Some(PieceType::Pawn) {
            let material = pos.non_pawn_material(Colour::White) + pos.non_pawn_material(Colour::Black);
            if material - victim.map_or(0, mg_value) == 0 {
                return true;
            }
        }
    }
    false
}

/// Whether the quiet check `m` is too dangerous to prune in quiescence.
/// If it is not, `best_value` is raised to what the pruned move would have
/// been worth at most.
fn check_is_dangerous(pos: &Board, m: Move, futility_base: i32, beta: i32, best_value: &mut i32) -> bool {
    let (from, to) = (m.from(), m.to());
    let Some(piece) = pos.piece_at(from) else {
        return false;
    };
    let them = !pos.turn();
    let ksq = pos.king_sq(them);
    let king_att = king_attacks(ksq);
    let occupied = pos.occupied() - from.as_set() - ksq.as_set();
    let old_att = pos.attacks_from(piece, from, occupied);
    let new_att = pos.attacks_from(piece, to, occupied);

    // at most one escape square left
    let escapes = king_att - (pos.colour(them) | new_att | to.as_set());
    if !escapes.many() {
        return true;
    }

    // queen contact check
    if piece.piece_type() == PieceType::Queen && king_att.contains_square(to) {
        return true;
    }

    // a check that also attacks another piece
    let mut bv = *best_value;
    for victim_sq in pos.colour(them) & new_att & !old_att & !ksq.as_set() {
        let futility_value = futility_base + pos.piece_at(victim_sq).map_or(0, |p| eg_value(p.piece_type()));
        if futility_value >= beta && pos.see_sign(Move::new(from, victim_sq)) >= 0 {
            return true;
        }
        bv = bv.max(futility_value);
    }
    *best_value = bv;
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess::types::Square;

    fn run(fen: &str, depth: i32, conf: &Config, pool: PoolOptions) -> SearchResult {
        let pos = Board::from_fen(fen).unwrap();
        let mut tt = TT::new();
        tt.resize(MEGABYTE);
        let options = SearchOptions { pool, ponder_enabled: false, print_to_stdout: false };
        let limits = SearchLimits::depth(depth);
        let control = SearchControl::new();
        search_position(&pos, &tt, conf, &options, &limits, &control, None).unwrap()
    }

    const MIDDLEGAME: &str = "r1bqkb1r/pppp1ppp/2n2n2/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4";

    #[test]
    fn finds_back_rank_mate() {
        let result = run("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1", 4, &Config::default(), PoolOptions::default());
        assert_eq!(result.best_move.map(|m| m.to_string()), Some("a1a8".to_string()));
        assert_eq!(result.score, mate_in(1));
    }

    #[test]
    fn checkmated_root_has_no_move() {
        let result = run(
            "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3",
            3,
            &Config::default(),
            PoolOptions::default(),
        );
        assert_eq!(result.best_move, None);
        assert_eq!(result.score, mated_in(0));
    }

    #[test]
    fn stalemated_root_is_a_draw() {
        let result = run("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1", 3, &Config::default(), PoolOptions::default());
        assert_eq!(result.best_move, None);
        assert_eq!(result.score, DRAW);
    }

    /// Run a PV node search on `fen` as if it sat `ply` plies below the root.
    fn search_inside_tree(fen: &str, ply: usize, depth: i32) -> i32 {
        let mut pos = Board::from_fen(fen).unwrap();
        let mut tt = TT::new();
        tt.resize(MEGABYTE);
        let conf = Config::default();
        let pool = ThreadPool::new(PoolOptions::default());
        let control = SearchControl::new();
        let limits = SearchLimits::depth(depth);
        let time_manager = TimeManager::new(&limits, pos.turn(), pos.game_ply(), false);
        let root_moves = RootMoves::new(&pos, &[]);
        let info = SearchInfo::new(tt.view(), &conf, &pool, &control, &limits, time_manager, root_moves, false);
        let mut t = ThreadData::new(0, &control.nodes);
        pos.alpha_beta::<Pv>(&mut t, &info, ply, -INFINITY, INFINITY, depth * ONE_PLY)
    }

    #[test]
    fn mate_inside_the_tree_is_scored_by_distance() {
        let fen = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3";
        for depth in 1..=3 {
            assert_eq!(search_inside_tree(fen, 3, depth), mated_in(3));
        }
        assert_eq!(search_inside_tree(fen, 5, 2), mated_in(5));
    }

    #[test]
    fn stalemate_inside_the_tree_is_a_draw() {
        let fen = "7k/5Q2/6K1/8/8/8/8/8 b - - 0 1";
        for depth in 1..=3 {
            assert_eq!(search_inside_tree(fen, 2, depth), DRAW);
        }
    }

    #[test]
    fn mate_limit_stops_once_the_mate_is_found() {
        let pos = Board::from_fen("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1").unwrap();
        let mut tt = TT::new();
        tt.resize(MEGABYTE);
        let options = SearchOptions { pool: PoolOptions::default(), ponder_enabled: false, print_to_stdout: false };
        for mate in [1, u32::MAX] {
            let limits = SearchLimits { depth: Some(6), mate: Some(mate), ..SearchLimits::default() };
            let control = SearchControl::new();
            let result = search_position(&pos, &tt, &Config::default(), &options, &limits, &control, None).unwrap();
            assert_eq!(result.score, mate_in(1));
        }
    }

    #[test]
    fn pruning_keeps_a_forced_mate() {
        // 1. Kb6 Kb8 2. Rh8#
        let fen = "k7/8/2K5/8/8/8/8/7R w - - 0 1";
        let plain = run(fen, 5, &Config::without_pruning(), PoolOptions::default());
        let pruned = run(fen, 5, &Config::default(), PoolOptions::default());
        assert_eq!(plain.score, mate_in(3));
        assert_eq!(pruned.score, mate_in(3));
    }

    #[test]
    fn defends_against_a_mate_threat() {
        // white threatens Qxf7#.
        let fen = "r1bqkbnr/pppp1ppp/2n5/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR b KQkq - 3 3";
        let result = run(fen, 5, &Config::default(), PoolOptions::default());
        assert!(result.score > -MINIMUM_MATE_SCORE);
        let mut pos = Board::from_fen(fen).unwrap();
        let best = result.best_move.unwrap();
        pos.make_move(best);
        if let Ok(qxf7) = pos.parse_uci("h5f7") {
            if pos.legal_moves().iter_moves().any(|&m| m == qxf7) {
                pos.make_move(qxf7);
                assert!(!pos.legal_moves().is_empty(), "{best} allowed mate");
            }
        }
    }

    #[test]
    fn fake_split_searches_the_same_tree() {
        let conf = Config::default();
        let plain = run(MIDDLEGAME, 7, &conf, PoolOptions::default());
        let fake = run(MIDDLEGAME, 7, &conf, PoolOptions { fake_split: true, ..PoolOptions::default() });
        assert_eq!(plain.best_move, fake.best_move);
        assert_eq!(plain.score, fake.score);
        assert_eq!(plain.depth, fake.depth);
    }

    #[test]
    fn parallel_search_returns_a_legal_move() {
        let pos = Board::from_fen(MIDDLEGAME).unwrap();
        let pool = PoolOptions { threads: 4, min_split_depth: 2 * ONE_PLY, ..PoolOptions::default() };
        let result = run(MIDDLEGAME, 7, &Config::default(), pool);
        let best = result.best_move.unwrap();
        assert!(pos.legal_moves().iter_moves().any(|&m| m == best));
        assert_eq!(result.depth, 7);
        assert!(result.nodes > 0);
    }

    #[test]
    fn node_limit_stops_the_search() {
        let pos = Board::from_fen(MIDDLEGAME).unwrap();
        let mut tt = TT::new();
        tt.resize(MEGABYTE);
        let limits = SearchLimits { nodes: Some(20_000), ..SearchLimits::default() };
        let control = SearchControl::new();
        let result =
            search_position(&pos, &tt, &Config::default(), &SearchOptions::default(), &limits, &control, None).unwrap();
        assert!(result.best_move.is_some());
        assert!(result.depth < MAX_DEPTH - 1);
    }

    #[test]
    fn aspiration_window_widens_geometrically() {
        let conf = Config::default();
        let mut window = AspirationWindow::around(40, 6, &conf);
        assert_eq!((window.alpha, window.beta), (40 - conf.aspiration_delta, 40 + conf.aspiration_delta));
        window.widen_up(80, &conf);
        assert_eq!(window.beta, 40 + 2 * conf.aspiration_delta);
        window.widen_down(-80, &conf);
        assert_eq!(window.alpha, 40 - conf.aspiration_delta - conf.aspiration_delta * 3 / 2);
        window.widen_up(VALUE_KNOWN_WIN, &conf);
        assert_eq!(window, AspirationWindow::infinite());

        assert_eq!(AspirationWindow::around(40, 4, &conf), AspirationWindow::infinite());
        assert_eq!(AspirationWindow::around(VALUE_KNOWN_WIN + 1, 9, &conf), AspirationWindow::infinite());
    }

    #[test]
    fn tt_cutoffs_respect_bounds() {
        let hit = |bound, value, depth| TTHit {
            mov: None,
            depth,
            bound,
            value,
            static_value: VALUE_NONE,
            static_margin: VALUE_NONE,
        };
        assert!(can_return_tt(&hit(Bound::Lower, 50, 8), 8, 40));
        assert!(!can_return_tt(&hit(Bound::Lower, 30, 8), 8, 40));
        assert!(!can_return_tt(&hit(Bound::Lower, 50, 6), 8, 40));
        assert!(can_return_tt(&hit(Bound::Upper, 30, 8), 8, 40));
        // mate scores are trusted at any depth.
        assert!(can_return_tt(&hit(Bound::Lower, mate_in(3), 2), 20, 40));
        assert!(!can_return_tt(&hit(Bound::None, VALUE_NONE, DEPTH_NONE), 2, 40));

        assert_eq!(refine_eval(&hit(Bound::Lower, 90, 4), 60), 90);
        assert_eq!(refine_eval(&hit(Bound::Upper, 90, 4), 60), 60);
        assert_eq!(refine_eval(&hit(Bound::Exact, 20, 4), 60), 20);
    }

    #[test]
    fn dangerous_moves() {
        let pos = Board::from_fen("4k3/8/8/8/8/8/1P6/4K3 w - - 0 1").unwrap();
        assert!(is_dangerous(&pos, pos.parse_uci("b2b4").unwrap(), false));
        let pos = Board::from_fen("4k3/pp6/8/8/8/8/1P6/4K3 w - - 0 1").unwrap();
        assert!(!is_dangerous(&pos, pos.parse_uci("b2b3").unwrap(), false));
        // the king takes the last piece: a pawn ending follows.
        let pos = Board::from_fen("4k3/p7/8/8/8/8/P2n4/4K3 w - - 0 1").unwrap();
        assert!(is_dangerous(&pos, pos.parse_uci("e1d2").unwrap(), true));
        let pos = Board::from_fen("4k3/p7/8/8/8/8/P2n4/4K2R w - - 0 1").unwrap();
        assert!(!is_dangerous(&pos, pos.parse_uci("e1d2").unwrap(), true));
    }

    #[test]
    fn moves_connected_to_a_threat() {
        // black threatens Bxf3.
        let pos = Board::from_fen("4k3/8/8/7b/8/5N2/8/4K3 w - - 0 1").unwrap();
        let threat = Move::new(Square::H5, Square::F3);
        assert!(connected_threat(&pos, pos.parse_uci("f3d4").unwrap(), threat));
        assert!(connected_threat(&pos, pos.parse_uci("e1e2").unwrap(), threat));
        assert!(!connected_threat(&pos, pos.parse_uci("e1d1").unwrap(), threat));
    }

    #[test]
    fn moves_connected_to_each_other() {
        let pos = Board::new();
        assert!(connected_moves(&pos, Move::new(Square::E2, Square::E4), Move::new(Square::E4, Square::E5)));
        assert!(!connected_moves(&pos, Move::new(Square::G1, Square::F3), Move::new(Square::E7, Square::E5)));
        assert!(!connected_moves(&pos, Move::NULL, Move::new(Square::E7, Square::E5)));
    }
}
