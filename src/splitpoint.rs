use std::sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use arrayvec::ArrayVec;

use crate::{
    chess::{board::Board, chessmove::Move},
    movepicker::MovePicker,
    stack::{SPLIT_FRAME_WINDOW, SearchFrame},
    util::depth::Depth,
};

/// Split points a single worker can own at once.
pub const MAX_SPLITPOINTS_PER_THREAD: usize = 8;
/// Longest chain of nested split points a worker can be inside.
pub const MAX_SPLIT_CHAIN: usize = 64;
/// Quiet moves remembered per node for history updates.
pub const MAX_QUIETS: usize = 64;

/// Names one split-point slot: the owning worker and the slot in its stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SplitPointId {
    pub worker: usize,
    pub slot: usize,
}

impl SplitPointId {
    /// Packs the id into a non-zero integer, so that zero can mean "none".
    pub const fn encode(self) -> usize {
        self.worker * MAX_SPLITPOINTS_PER_THREAD + self.slot + 1
    }

    pub const fn decode(bits: usize) -> Option<Self> {
        if bits == 0 {
            return None;
        }
        let bits = bits - 1;
        Some(Self { worker: bits / MAX_SPLITPOINTS_PER_THREAD, slot: bits % MAX_SPLITPOINTS_PER_THREAD })
    }
}

/// Which kind of node was split, so that participants search it the same way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitKind {
    Root,
    Pv,
    NonPv,
}

/// The shared state of one split node, guarded by the split point's lock.
#[derive(Debug)]
pub struct SplitJob {
    pub board: Board,
    pub frames: [SearchFrame; SPLIT_FRAME_WINDOW],
    pub ply: usize,
    pub depth: Depth,
    pub beta: i32,
    pub kind: SplitKind,
    pub tt_move: Option<Move>,
    pub excluded_move: Option<Move>,
    pub threat_move: Option<Move>,
    /// The split points the master was inside when it split, outermost first.
    pub ancestors: ArrayVec<SplitPointId, MAX_SPLIT_CHAIN>,
    pub picker: MovePicker,
    pub alpha: i32,
    pub best_value: i32,
    pub best_move: Option<Move>,
    pub move_count: usize,
    /// Set once, when some participant fails high.
    pub cutoff: bool,
    pub quiets: ArrayVec<Move, MAX_QUIETS>,
}

/// A slot in a worker's split-point stack.
#[derive(Debug, Default)]
pub struct SplitPoint {
    job: Mutex<Option<SplitJob>>,
    /// Mirror of `SplitJob::cutoff`, written under the lock and polled without it.
    cutoff: AtomicBool,
    /// Whether idle workers may attach.
    published: AtomicBool,
    /// One bit per worker currently searching here, master included.
    slaves_mask: AtomicU64,
}

impl SplitPoint {
    pub fn lock(&self) -> MutexGuard<'_, Option<SplitJob>> {
        self.job.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cutoff(&self) -> bool {
        self.cutoff.load(Ordering::Acquire)
    }

    /// Record a fail high. Must be called with the lock held, on the job it guards.
    pub fn mark_cutoff(&self, job: &mut SplitJob) {
        job.cutoff = true;
        self.cutoff.store(true, Ordering::Release);
    }

    pub fn is_published(&self) -> bool {
        self.published.load(Ordering::Acquire)
    }

    pub fn participants(&self) -> u32 {
        self.slaves_mask.load(Ordering::Acquire).count_ones()
    }

    pub fn has_participant(&self, worker: usize) -> bool {
        self.slaves_mask.load(Ordering::Acquire) & (1u64 << worker) != 0
    }

    /// Fill the slot with a new job whose only participant is the master.
    pub fn open(&self, job: SplitJob, master: usize, publish: bool) {
        let mut guard = self.lock();
        *guard = Some(job);
        self.cutoff.store(false, Ordering::Release);
        self.slaves_mask.store(1u64 << master, Ordering::Release);
        self.published.store(publish, Ordering::Release);
    }

    /// Add a helper. Must be called with the lock held.
    pub fn attach(&self, worker: usize) {
        self.slaves_mask.fetch_or(1u64 << worker, Ordering::AcqRel);
    }

    /// Remove a participant, returning true if it was the last one.
    pub fn detach(&self, worker: usize) -> bool {
        let _guard = self.lock();
        let before = self.slaves_mask.fetch_and(!(1u64 << worker), Ordering::AcqRel);
        before & !(1u64 << worker) == 0
    }

    /// Stop accepting helpers and drop the master's own participation bit.
    pub fn close(&self, master: usize) -> bool {
        let _guard = self.lock();
        self.published.store(false, Ordering::Release);
        let before = self.slaves_mask.fetch_and(!(1u64 << master), Ordering::AcqRel);
        before & !(1u64 << master) == 0
    }

    /// Empty the slot once every participant has left.
    pub fn release(&self) -> Option<SplitJob> {
        debug_assert_eq!(self.participants(), 0);
        self.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> SplitJob {
        SplitJob {
            board: Board::new(),
            frames: [SearchFrame::EMPTY; SPLIT_FRAME_WINDOW],
            ply: 3,
            depth: 10,
            beta: 50,
            kind: SplitKind::NonPv,
            tt_move: None,
            excluded_move: None,
            threat_move: None,
            ancestors: ArrayVec::new(),
            picker: MovePicker::default(),
            alpha: 49,
            best_value: 12,
            best_move: None,
            move_count: 1,
            cutoff: false,
            quiets: ArrayVec::new(),
        }
    }

    #[test]
    fn ids_encode_without_zero() {
        for worker in 0..64 {
            for slot in 0..MAX_SPLITPOINTS_PER_THREAD {
                let id = SplitPointId { worker, slot };
                assert_ne!(id.encode(), 0);
                assert_eq!(SplitPointId::decode(id.encode()), Some(id));
            }
        }
        assert_eq!(SplitPointId::decode(0), None);
    }

    #[test]
    fn lifecycle_tracks_participants() {
        let sp = SplitPoint::default();
        sp.open(job(), 2, true);
        assert!(sp.is_published());
        assert!(sp.has_participant(2));
        sp.attach(5);
        assert_eq!(sp.participants(), 2);
        assert!(!sp.close(2));
        assert!(!sp.is_published());
        assert!(sp.detach(5));
        let job = sp.release().unwrap();
        assert_eq!(job.best_value, 12);
        assert!(sp.lock().is_none());
    }

    #[test]
    fn cutoff_is_mirrored() {
        let sp = SplitPoint::default();
        sp.open(job(), 0, false);
        assert!(!sp.cutoff());
        {
            let mut guard = sp.lock();
            let job = guard.as_mut().unwrap();
            sp.mark_cutoff(job);
            assert!(job.cutoff);
        }
        assert!(sp.cutoff());
        sp.close(0);
        sp.release();
        sp.open(job(), 0, false);
        assert!(!sp.cutoff());
    }
}
