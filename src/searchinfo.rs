use std::sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use crate::{
    historytable::HistoryTable,
    search::{parameters::Config, rootmoves::RootMoves},
    searchcontrol::SearchControl,
    threadpool::ThreadPool,
    timemgmt::{SearchLimits, TimeManager},
    transpositiontable::TTView,
};

/// Everything the workers of one search share.
pub struct SearchInfo<'a> {
    pub tt: TTView<'a>,
    pub conf: &'a Config,
    pub pool: &'a ThreadPool,
    pub control: &'a SearchControl,
    pub limits: &'a SearchLimits,
    pub time_manager: Mutex<TimeManager>,
    /// History and gain statistics, fresh for each search and shared by every worker.
    pub history: HistoryTable,
    /// Guarded separately from any split point; always taken after a split-point lock.
    pub root_moves: Mutex<RootMoves>,
    pub seldepth: AtomicUsize,
    /// Whether to emit UCI `info` and `bestmove` lines.
    pub print_to_stdout: bool,
}

impl<'a> SearchInfo<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tt: TTView<'a>,
        conf: &'a Config,
        pool: &'a ThreadPool,
        control: &'a SearchControl,
        limits: &'a SearchLimits,
        time_manager: TimeManager,
        root_moves: RootMoves,
        print_to_stdout: bool,
    ) -> Self {
        Self {
            tt,
            conf,
            pool,
            control,
            limits,
            time_manager: Mutex::new(time_manager),
            history: HistoryTable::new(),
            root_moves: Mutex::new(root_moves),
            seldepth: AtomicUsize::new(0),
            print_to_stdout,
        }
    }

    pub fn root_moves(&self) -> MutexGuard<'_, RootMoves> {
        self.root_moves.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn time_manager(&self) -> MutexGuard<'_, TimeManager> {
        self.time_manager.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn elapsed_millis(&self) -> u64 {
        self.time_manager().elapsed_millis()
    }

    pub fn update_seldepth(&self, seldepth: usize) {
        self.seldepth.fetch_max(seldepth, Ordering::Relaxed);
    }
}
