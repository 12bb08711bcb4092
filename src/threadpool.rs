use std::{
    mem,
    sync::{
        Condvar, Mutex, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use arrayvec::ArrayVec;

use crate::{
    chess::{board::Board, chessmove::Move},
    movepicker::MovePicker,
    search,
    searchinfo::SearchInfo,
    splitpoint::{
        MAX_QUIETS, MAX_SPLIT_CHAIN, MAX_SPLITPOINTS_PER_THREAD, SplitJob, SplitKind, SplitPoint, SplitPointId,
    },
    stack::{SPLIT_FRAME_WINDOW, SearchFrame},
    threadlocal::ThreadData,
    util::depth::{Depth, ONE_PLY},
};

/// One bit of the participant mask per worker.
pub const MAX_THREADS: usize = 64;

/// How long a sleeping worker naps before looking for work again.
const SLEEP_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct PoolOptions {
    pub threads: usize,
    /// Nodes shallower than this are never split.
    pub min_split_depth: Depth,
    pub max_threads_per_split_point: usize,
    /// Park idle workers on a condition variable instead of spinning.
    pub use_sleeping_threads: bool,
    /// Go through the split machinery without publishing split points.
    pub fake_split: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            min_split_depth: 4 * ONE_PLY,
            max_threads_per_split_point: 5,
            use_sleeping_threads: true,
            fake_split: false,
        }
    }
}

/// The part of a worker that other workers can see.
#[derive(Debug, Default)]
pub struct WorkerSlot {
    is_searching: AtomicBool,
    asked_to_sleep: AtomicBool,
    /// Encoded id of the split point this worker is waiting to finish, or zero.
    waiting_on: AtomicUsize,
    split_points: [SplitPoint; MAX_SPLITPOINTS_PER_THREAD],
    active_split_points: AtomicUsize,
}

impl WorkerSlot {
    fn waiting_on(&self) -> Option<SplitPointId> {
        SplitPointId::decode(self.waiting_on.load(Ordering::Acquire))
    }

    fn set_waiting_on(&self, id: Option<SplitPointId>) {
        self.waiting_on.store(id.map_or(0, SplitPointId::encode), Ordering::Release);
    }
}

/// A node's state at the moment it is split.
#[derive(Debug)]
pub struct SplitRequest {
    pub ply: usize,
    pub depth: Depth,
    pub alpha: i32,
    pub beta: i32,
    pub kind: SplitKind,
    pub tt_move: Option<Move>,
    pub excluded_move: Option<Move>,
    pub threat_move: Option<Move>,
    pub best_value: i32,
    pub best_move: Option<Move>,
    pub move_count: usize,
}

/// What the participants found, handed back to the master.
#[derive(Debug)]
pub struct SplitOutcome {
    pub best_value: i32,
    pub best_move: Option<Move>,
    pub move_count: usize,
    pub quiets: ArrayVec<Move, MAX_QUIETS>,
}

/// Everything a helper copies out of a split point to start working on it.
#[derive(Debug)]
pub struct Attachment {
    pub board: Board,
    pub frames: [SearchFrame; SPLIT_FRAME_WINDOW],
    pub ply: usize,
    pub depth: Depth,
    pub alpha: i32,
    pub beta: i32,
    pub kind: SplitKind,
    /// The helper's new chain: the split point's ancestors, then the split point itself.
    pub chain: ArrayVec<SplitPointId, MAX_SPLIT_CHAIN>,
}

/// The workers of one search and the split points they publish.
#[derive(Debug)]
pub struct ThreadPool {
    workers: Vec<WorkerSlot>,
    options: PoolOptions,
    sleep_lock: Mutex<()>,
    wakeup: Condvar,
}

impl ThreadPool {
    pub fn new(options: PoolOptions) -> Self {
        let threads = options.threads.clamp(1, MAX_THREADS);
        let workers = (0..threads).map(|_| WorkerSlot::default()).collect();
        Self { workers, options: PoolOptions { threads, ..options }, sleep_lock: Mutex::new(()), wakeup: Condvar::new() }
    }

    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    pub fn split_point(&self, id: SplitPointId) -> &SplitPoint {
        &self.workers[id.worker].split_points[id.slot]
    }

    pub fn set_searching(&self, worker: usize, searching: bool) {
        self.workers[worker].is_searching.store(searching, Ordering::Release);
    }

    /// Whether `worker` could help `master` right now: it must be idle, and if
    /// it is waiting on a split point of its own, `master` must be working for it.
    pub fn available_to(&self, worker: usize, master: usize) -> bool {
        let slot = &self.workers[worker];
        if worker == master || slot.is_searching.load(Ordering::Acquire) {
            return false;
        }
        slot.waiting_on().is_none_or(|id| self.split_point(id).has_participant(master))
    }

    pub fn helper_available(&self, master: usize) -> bool {
        (0..self.workers.len()).any(|w| self.available_to(w, master))
    }

    /// Whether a node of this depth may be handed to the pool at all.
    pub fn should_split(&self, master: usize, depth: Depth) -> bool {
        depth >= self.options.min_split_depth && (self.options.fake_split || self.helper_available(master))
    }

    fn wake_sleepers(&self) {
        if self.workers.iter().any(|w| w.asked_to_sleep.load(Ordering::Acquire)) {
            let _guard = self.sleep_lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.wakeup.notify_all();
        }
    }

    /// Wait briefly for something to change.
    fn pause(&self, worker: usize) {
        if self.options.use_sleeping_threads {
            let slot = &self.workers[worker];
            let guard = self.sleep_lock.lock().unwrap_or_else(PoisonError::into_inner);
            slot.asked_to_sleep.store(true, Ordering::Release);
            let _unused = self.wakeup.wait_timeout(guard, SLEEP_INTERVAL).unwrap_or_else(PoisonError::into_inner);
            slot.asked_to_sleep.store(false, Ordering::Release);
        } else {
            std::thread::yield_now();
        }
    }

    /// Called by workers when the root driver is done, so that parked ones notice.
    pub fn finish(&self) {
        let _guard = self.sleep_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.wakeup.notify_all();
    }

    /// Hand the rest of a node's moves to the pool. The master searches them
    /// too, then waits for its helpers, and returns the merged result.
    /// Returns `None` when the master has no free split-point slot, in which
    /// case the caller keeps searching on its own and `picker` is untouched.
    pub fn split(
        &self,
        pos: &mut Board,
        t: &mut ThreadData,
        info: &SearchInfo,
        request: SplitRequest,
        picker: &mut MovePicker,
    ) -> Option<SplitOutcome> {
        let master = &self.workers[t.id];
        let slot = master.active_split_points.load(Ordering::Acquire);
        if slot >= MAX_SPLITPOINTS_PER_THREAD || t.sp_chain.is_full() {
            return None;
        }
        let id = SplitPointId { worker: t.id, slot };
        let sp = &master.split_points[slot];
        let job = SplitJob {
            board: pos.clone(),
            frames: t.ss.window(request.ply),
            ply: request.ply,
            depth: request.depth,
            beta: request.beta,
            kind: request.kind,
            tt_move: request.tt_move,
            excluded_move: request.excluded_move,
            threat_move: request.threat_move,
            ancestors: t.sp_chain.clone(),
            picker: mem::take(picker),
            alpha: request.alpha,
            best_value: request.best_value,
            best_move: request.best_move,
            move_count: request.move_count,
            cutoff: false,
            quiets: ArrayVec::new(),
        };
        let publish = !self.options.fake_split;
        sp.open(job, t.id, publish);
        master.active_split_points.store(slot + 1, Ordering::Release);
        t.sp_chain.push(id);
        t.stats.splits += 1;
        if publish {
            self.wake_sleepers();
        }

        search::search_split_node(pos, t, info, request.kind, request.ply, request.alpha, request.beta, request.depth);

        if !sp.close(t.id) {
            // the helpers are still busy: help them out until they are done.
            self.idle_loop(t, info, Some(id));
        }

        t.sp_chain.pop();
        let job = sp.release();
        master.active_split_points.store(slot, Ordering::Release);
        let job = job?;
        Some(SplitOutcome {
            best_value: job.best_value,
            best_move: job.best_move,
            move_count: job.move_count,
            quiets: job.quiets,
        })
    }

    /// Look for a published split point to help with. A master waiting on
    /// `waiting_on` only takes work below that split point.
    fn try_attach(&self, worker: usize, waiting_on: Option<SplitPointId>) -> Option<(SplitPointId, Attachment)> {
        for (owner, slot) in self.workers.iter().enumerate() {
            if owner == worker {
                continue;
            }
            let active = slot.active_split_points.load(Ordering::Acquire).min(MAX_SPLITPOINTS_PER_THREAD);
            for (index, sp) in slot.split_points[..active].iter().enumerate() {
                if !sp.is_published() || sp.participants() as usize >= self.options.max_threads_per_split_point {
                    continue;
                }
                let id = SplitPointId { worker: owner, slot: index };
                let guard = sp.lock();
                let Some(job) = guard.as_ref() else {
                    continue;
                };
                if !sp.is_published()
                    || job.cutoff
                    || sp.participants() as usize >= self.options.max_threads_per_split_point
                    || job.ancestors.is_full()
                    || waiting_on.is_some_and(|w| !job.ancestors.contains(&w))
                    || job.ancestors.iter().any(|&a| self.split_point(a).cutoff())
                {
                    continue;
                }
                sp.attach(worker);
                let mut chain = job.ancestors.clone();
                chain.push(id);
                return Some((
                    id,
                    Attachment {
                        board: job.board.clone(),
                        frames: job.frames,
                        ply: job.ply,
                        depth: job.depth,
                        alpha: job.alpha,
                        beta: job.beta,
                        kind: job.kind,
                        chain,
                    },
                ));
            }
        }
        None
    }

    /// Leave a split point after searching it as a helper.
    pub fn detach(&self, id: SplitPointId, worker: usize) {
        if self.split_point(id).detach(worker) {
            self.wake_sleepers();
        }
    }

    /// Where workers wait for work. Idle workers (`waiting_on` is `None`) stay
    /// until the search is over; a master waiting on its split point stays
    /// until all of that split point's helpers have left.
    pub fn idle_loop(&self, t: &mut ThreadData, info: &SearchInfo, waiting_on: Option<SplitPointId>) {
        let me = &self.workers[t.id];
        let previous = me.waiting_on();
        me.set_waiting_on(waiting_on);
        me.is_searching.store(false, Ordering::Release);
        loop {
            let done = match waiting_on {
                Some(id) => self.split_point(id).participants() == 0,
                None => info.control.search_finished.load(Ordering::Acquire),
            };
            if done {
                break;
            }
            if let Some((id, attachment)) = self.try_attach(t.id, waiting_on) {
                me.is_searching.store(true, Ordering::Release);
                t.stats.joins += 1;
                search::search_as_helper(t, info, id, attachment);
                me.is_searching.store(false, Ordering::Release);
                continue;
            }
            self.pause(t.id);
        }
        me.set_waiting_on(previous);
        me.is_searching.store(waiting_on.is_some(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(threads: usize) -> ThreadPool {
        ThreadPool::new(PoolOptions { threads, ..PoolOptions::default() })
    }

    #[test]
    fn idle_workers_help_anyone() {
        let pool = pool(3);
        pool.set_searching(0, true);
        assert!(pool.available_to(1, 0));
        assert!(!pool.available_to(0, 1));
        assert!(!pool.available_to(1, 1));
        assert!(pool.helper_available(0));
        pool.set_searching(1, true);
        pool.set_searching(2, true);
        assert!(!pool.helper_available(0));
    }

    #[test]
    fn waiting_master_only_helps_its_own_helpers() {
        let pool = pool(4);
        // worker 1 split and is waiting; worker 2 is helping it, worker 3 is not.
        let id = SplitPointId { worker: 1, slot: 0 };
        let sp = pool.split_point(id);
        let job = SplitJob {
            board: Board::new(),
            frames: [SearchFrame::EMPTY; SPLIT_FRAME_WINDOW],
            ply: 2,
            depth: 12,
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
        };
        sp.open(job, 1, true);
        sp.attach(2);
        sp.close(1);
        pool.workers[1].set_waiting_on(Some(id));
        pool.set_searching(2, true);
        pool.set_searching(3, true);
        assert!(pool.available_to(1, 2));
        assert!(!pool.available_to(1, 3));
    }

    #[test]
    fn helpful_master_only_joins_descendants() {
        let pool = pool(3);
        let root_id = SplitPointId { worker: 0, slot: 0 };
        let make_job = |ancestors: ArrayVec<SplitPointId, MAX_SPLIT_CHAIN>| SplitJob {
            board: Board::new(),
            frames: [SearchFrame::EMPTY; SPLIT_FRAME_WINDOW],
            ply: 1,
            depth: 10,
            beta: 1,
            kind: SplitKind::NonPv,
            tt_move: None,
            excluded_move: None,
            threat_move: None,
            ancestors,
            picker: MovePicker::default(),
            alpha: 0,
            best_value: -5,
            best_move: None,
            move_count: 1,
            cutoff: false,
            quiets: ArrayVec::new(),
        };
        // worker 1 opens a split point unrelated to worker 0's.
        pool.workers[1].split_points[0].open(make_job(ArrayVec::new()), 1, true);
        pool.workers[1].active_split_points.store(1, Ordering::Release);
        assert!(pool.try_attach(0, Some(root_id)).is_none());
        assert!(pool.try_attach(2, None).is_some());

        // worker 2 opens one below worker 0's split point.
        let mut chain = ArrayVec::new();
        chain.push(root_id);
        pool.workers[2].split_points[0].open(make_job(chain), 2, true);
        pool.workers[2].active_split_points.store(1, Ordering::Release);
        let (id, attachment) = pool.try_attach(0, Some(root_id)).unwrap();
        assert_eq!(id, SplitPointId { worker: 2, slot: 0 });
        assert_eq!(attachment.chain.as_slice(), &[root_id, id]);
        assert!(pool.split_point(id).has_participant(0));
    }

    #[test]
    fn cut_split_points_are_not_joined() {
        let pool = pool(2);
        let sp = &pool.workers[1].split_points[0];
        sp.open(
            SplitJob {
                board: Board::new(),
                frames: [SearchFrame::EMPTY; SPLIT_FRAME_WINDOW],
                ply: 1,
                depth: 10,
                beta: 1,
                kind: SplitKind::Pv,
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
            1,
            true,
        );
        pool.workers[1].active_split_points.store(1, Ordering::Release);
        {
            let mut guard = sp.lock();
            sp.mark_cutoff(guard.as_mut().unwrap());
        }
        assert!(pool.try_attach(0, None).is_none());
    }
}
