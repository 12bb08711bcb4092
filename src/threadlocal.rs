use std::sync::atomic::AtomicU64;

use arrayvec::ArrayVec;

use crate::{
    evaluation::PawnCache,
    splitpoint::{MAX_SPLIT_CHAIN, SplitPointId},
    stack::SearchStack,
    threadpool::ThreadPool,
    util::BatchedAtomicCounter,
};

/// Counters kept for the log at the end of a search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SplitStats {
    /// Split points this worker opened as a master.
    pub splits: u64,
    /// Split points this worker joined as a helper.
    pub joins: u64,
}

/// The state a worker owns for the duration of one search.
#[repr(align(64))]
pub struct ThreadData<'a> {
    pub id: usize,
    pub ss: Box<SearchStack>,
    pub pawn_cache: PawnCache,
    pub nodes: BatchedAtomicCounter<'a>,
    /// The split points this worker is currently searching inside, outermost first.
    pub sp_chain: ArrayVec<SplitPointId, MAX_SPLIT_CHAIN>,
    pub seldepth: usize,
    pub stats: SplitStats,
}

impl<'a> ThreadData<'a> {
    pub fn new(id: usize, nodes: &'a AtomicU64) -> Self {
        Self {
            id,
            ss: SearchStack::boxed(),
            pawn_cache: PawnCache::new(),
            nodes: BatchedAtomicCounter::new(nodes),
            sp_chain: ArrayVec::new(),
            seldepth: 0,
            stats: SplitStats::default(),
        }
    }

    pub const fn is_main_thread(&self) -> bool {
        self.id == 0
    }

    /// Whether some split point this worker is inside has failed high, which
    /// makes everything below it pointless.
    pub fn cutoff_occurred(&self, pool: &ThreadPool) -> bool {
        self.sp_chain.iter().any(|&id| pool.split_point(id).cutoff())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        movepicker::MovePicker,
        splitpoint::{SplitJob, SplitKind},
        stack::{SPLIT_FRAME_WINDOW, SearchFrame},
        threadpool::PoolOptions,
        chess::board::Board,
    };

    #[test]
    fn cutoff_anywhere_up_the_chain_is_seen() {
        let pool = ThreadPool::new(PoolOptions { threads: 2, ..PoolOptions::default() });
        let nodes = AtomicU64::new(0);
        let mut t = ThreadData::new(1, &nodes);
        assert!(!t.cutoff_occurred(&pool));

        let id = SplitPointId { worker: 0, slot: 0 };
        let sp = pool.split_point(id);
        sp.open(
            SplitJob {
                board: Board::new(),
                frames: [SearchFrame::EMPTY; SPLIT_FRAME_WINDOW],
                ply: 1,
                depth: 10,
                beta: 1,
                kind: SplitKind::NonPv,
                tt_move: None,
                excluded_move: None,
                threat_move: None,
                ancestors: ArrayVec::new(),
                picker: MovePicker::default(),
                alpha: 0,
                best_value: -5,
                best_move: None,
                move_count: 1,
                cutoff: false,
                quiets: ArrayVec::new(),
            },
            0,
            true,
        );
        t.sp_chain.push(id);
        t.sp_chain.push(SplitPointId { worker: 1, slot: 0 });
        assert!(!t.cutoff_occurred(&pool));
        {
            let mut guard = sp.lock();
            if let Some(job) = guard.as_mut() {
                sp.mark_cutoff(job);
            }
        }
        assert!(t.cutoff_occurred(&pool));
    }
}
