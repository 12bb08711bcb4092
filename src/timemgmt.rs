use std::time::Instant;

use crate::{
    chess::{chessmove::Move, piece::Colour},
    util::depth::Depth,
};

/// Plan time management at most this many moves ahead.
const MOVE_HORIZON: u64 = 50;
/// When in trouble, we can step over reserved time with this ratio.
const MAX_RATIO: f64 = 7.0;
/// However we must not steal time from remaining moves over this ratio.
const STEAL_RATIO: f64 = 0.33;

const EMERGENCY_MOVE_HORIZON: u64 = 40;
const EMERGENCY_BASE_TIME: u64 = 200;
const EMERGENCY_MOVE_TIME: u64 = 70;
const MINIMUM_THINKING_TIME: u64 = 20;

/// How often the timer thread wakes up, in milliseconds.
pub const TIMER_RESOLUTION: u64 = 5;

/// What the GUI asked for in `go`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchLimits {
    pub depth: Option<Depth>,
    pub nodes: Option<u64>,
    pub movetime: Option<u64>,
    pub mate: Option<u32>,
    pub time: [Option<u64>; 2],
    pub inc: [u64; 2],
    pub moves_to_go: Option<u64>,
    pub infinite: bool,
    pub ponder: bool,
    pub search_moves: Vec<Move>,
}

impl SearchLimits {
    pub fn depth(depth: Depth) -> Self {
        Self { depth: Some(depth), ..Self::default() }
    }

    /// Whether the clock decides when to stop, rather than a fixed budget.
    pub const fn use_time_management(&self, side: Colour) -> bool {
        self.time[side.index()].is_some()
            && self.movetime.is_none()
            && self.depth.is_none()
            && self.nodes.is_none()
            && self.mate.is_none()
            && !self.infinite
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TimeType {
    Optimum,
    Maximum,
}

/// Weight of a move at game ply `ply` in the time allocation.
/// Early middlegame moves matter the most.
fn move_importance(ply: u64) -> f64 {
    const X_SCALE: f64 = 9.3;
    const X_SHIFT: f64 = 59.8;
    const SKEW: f64 = 0.172;
    #[allow(clippy::cast_precision_loss)]
    let ply = ply as f64;
    (1.0 + ((ply - X_SHIFT) / X_SCALE).exp()).powf(-SKEW) + f64::MIN_POSITIVE
}

fn remaining(my_time: u64, moves_to_go: u64, game_ply: u64, tt: TimeType) -> u64 {
    #![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (max_ratio, steal_ratio) = match tt {
        TimeType::Optimum => (1.0, 0.0),
        TimeType::Maximum => (MAX_RATIO, STEAL_RATIO),
    };
    let this_move = move_importance(game_ply);
    let other_moves: f64 = (1..moves_to_go).map(|i| move_importance(game_ply + 2 * i)).sum();
    let ratio1 = (max_ratio * this_move) / (max_ratio * this_move + other_moves);
    let ratio2 = (this_move + steal_ratio * other_moves) / (this_move + other_moves);
    (my_time as f64 * ratio1.min(ratio2)).floor() as u64
}

/// Decides how long a search may run.
#[derive(Clone, Debug)]
pub struct TimeManager {
    start: Instant,
    optimum: u64,
    maximum: u64,
    unstable_pv_extra: u64,
}

impl TimeManager {
    /// Plans the time for a move at `game_ply` for `side`, from the clock in `limits`.
    /// Tries every hypothetical moves-to-go up to the horizon and keeps the tightest plan.
    pub fn new(limits: &SearchLimits, side: Colour, game_ply: usize, ponder_enabled: bool) -> Self {
        let start = Instant::now();
        let Some(my_time) = limits.time[side.index()] else {
            return Self { start, optimum: u64::MAX, maximum: u64::MAX, unstable_pv_extra: 0 };
        };
        let inc = limits.inc[side.index()];
        let game_ply = game_ply as u64;
        let mut optimum = my_time;
        let mut maximum = my_time;
        let horizon = limits.moves_to_go.map_or(MOVE_HORIZON, |mtg| mtg.clamp(1, MOVE_HORIZON));
        for hyp_mtg in 1..=horizon {
            let hyp_my_time = (my_time + inc * (hyp_mtg - 1))
                .saturating_sub(EMERGENCY_BASE_TIME)
                .saturating_sub(EMERGENCY_MOVE_TIME * hyp_mtg.min(EMERGENCY_MOVE_HORIZON));
            let t1 = MINIMUM_THINKING_TIME + remaining(hyp_my_time, hyp_mtg, game_ply, TimeType::Optimum);
            let t2 = MINIMUM_THINKING_TIME + remaining(hyp_my_time, hyp_mtg, game_ply, TimeType::Maximum);
            optimum = optimum.min(t1);
            maximum = maximum.min(t2);
        }
        if ponder_enabled {
            optimum += optimum / 4;
        }
        optimum = optimum.min(maximum);
        log::debug!("time plan: optimum {optimum}ms, maximum {maximum}ms");
        Self { start, optimum, maximum, unstable_pv_extra: 0 }
    }

    /// Grant extra time when the best move keeps changing between iterations.
    pub const fn pv_instability(&mut self, cur_changes: u64, prev_changes: u64) {
        self.unstable_pv_extra = cur_changes * (self.optimum / 2) + prev_changes * (self.optimum / 3);
    }

    pub const fn available_time(&self) -> u64 {
        self.optimum.saturating_add(self.unstable_pv_extra)
    }

    pub const fn maximum_time(&self) -> u64 {
        self.maximum
    }

    pub fn elapsed_millis(&self) -> u64 {
        // this cast is safe to do, because u64::MAX milliseconds is 585K centuries.
        #[allow(clippy::cast_possible_truncation)]
        let elapsed = self.start.elapsed().as_millis() as u64;
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(ms: u64, inc: u64, mtg: Option<u64>) -> SearchLimits {
        SearchLimits { time: [Some(ms), Some(ms)], inc: [inc, inc], moves_to_go: mtg, ..SearchLimits::default() }
    }

    #[test]
    fn optimum_is_a_small_slice_of_the_clock() {
        let tm = TimeManager::new(&clock(60_000, 0, None), Colour::White, 20, false);
        assert!(tm.available_time() < 60_000 / 10, "{}", tm.available_time());
        assert!(tm.available_time() > 60_000 / 200, "{}", tm.available_time());
        assert!(tm.maximum_time() >= tm.available_time());
        assert!(tm.maximum_time() < 60_000);
    }

    #[test]
    fn increment_and_moves_to_go_buy_time() {
        let base = TimeManager::new(&clock(60_000, 0, None), Colour::White, 20, false);
        let with_inc = TimeManager::new(&clock(60_000, 2_000, None), Colour::White, 20, false);
        assert!(with_inc.available_time() > base.available_time());
        let last_move = TimeManager::new(&clock(10_000, 0, Some(1)), Colour::White, 80, false);
        assert!(last_move.available_time() > 5_000);
        assert!(last_move.maximum_time() <= 10_000);
    }

    #[test]
    fn ponder_and_instability_extend_the_plan() {
        let plain = TimeManager::new(&clock(60_000, 0, None), Colour::Black, 20, false);
        let ponder = TimeManager::new(&clock(60_000, 0, None), Colour::Black, 20, true);
        assert!(ponder.available_time() > plain.available_time());
        let mut unstable = plain.clone();
        unstable.pv_instability(2, 1);
        assert!(unstable.available_time() > plain.available_time());
        unstable.pv_instability(0, 0);
        assert_eq!(unstable.available_time(), plain.available_time());
    }

    #[test]
    fn fixed_limits_disable_time_management() {
        assert!(clock(1_000, 0, None).use_time_management(Colour::White));
        let mut limits = clock(1_000, 0, None);
        limits.depth = Some(6);
        assert!(!limits.use_time_management(Colour::White));
        assert!(!SearchLimits::default().use_time_management(Colour::White));
    }
}
