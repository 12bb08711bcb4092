use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Signals shared by every thread taking part in one search.
#[derive(Debug, Default)]
pub struct SearchControl {
    /// Abort as soon as possible; the current iteration is discarded.
    pub stop: AtomicBool,
    /// Turn into `stop` when the GUI sends `ponderhit`.
    pub stop_on_ponderhit: AtomicBool,
    /// The root is still searching its first move.
    pub first_root_move: AtomicBool,
    /// The current iteration failed low at the root.
    pub failed_low_at_root: AtomicBool,
    /// The search runs on the opponent's time.
    pub ponder: AtomicBool,
    /// The root driver is done; idle workers and the timer may exit.
    pub search_finished: AtomicBool,
    /// The GUI asked us to quit while searching.
    pub quit: AtomicBool,
    /// Changes of best move at the root in the current iteration.
    pub best_move_changes: AtomicU64,
    pub nodes: AtomicU64,
}

impl SearchControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset every signal for a new search.
    pub fn reset(&self, ponder: bool) {
        self.stop.store(false, Ordering::SeqCst);
        self.stop_on_ponderhit.store(false, Ordering::SeqCst);
        self.first_root_move.store(false, Ordering::SeqCst);
        self.failed_low_at_root.store(false, Ordering::SeqCst);
        self.ponder.store(ponder, Ordering::SeqCst);
        self.search_finished.store(false, Ordering::SeqCst);
        self.quit.store(false, Ordering::SeqCst);
        self.best_move_changes.store(0, Ordering::SeqCst);
        self.nodes.store(0, Ordering::SeqCst);
    }

    pub fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// The GUI played the move we were pondering on: from now on the clock is ours.
    pub fn ponderhit(&self) {
        self.ponder.store(false, Ordering::SeqCst);
        if self.stop_on_ponderhit.load(Ordering::SeqCst) {
            self.request_stop();
        }
    }

    /// Stop now, or once the GUI lets us stop when we are pondering.
    pub fn stop_or_defer(&self) {
        if self.ponder.load(Ordering::SeqCst) {
            self.stop_on_ponderhit.store(true, Ordering::SeqCst);
        } else {
            self.request_stop();
        }
    }

    pub fn nodes(&self) -> u64 {
        self.nodes.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ponderhit_releases_a_deferred_stop() {
        let control = SearchControl::new();
        control.reset(true);
        control.stop_or_defer();
        assert!(!control.stopped());
        assert!(control.stop_on_ponderhit.load(Ordering::SeqCst));
        control.ponderhit();
        assert!(control.stopped());
    }

    #[test]
    fn ponderhit_without_deferred_stop_keeps_searching() {
        let control = SearchControl::new();
        control.reset(true);
        control.ponderhit();
        assert!(!control.stopped());
        assert!(!control.ponder.load(Ordering::SeqCst));
        control.stop_or_defer();
        assert!(control.stopped());
    }
}
