use std::sync::atomic::{AtomicI32, Ordering};

use crate::chess::{piece::Piece, types::Square};

/// Bound on the absolute value of a history score.
pub const HISTORY_MAX: i32 = 2000;

/// Quiet-move history and the positional gain each move has shown.
/// Both are indexed by the moving piece and its destination.
///
/// One table is shared by every worker of a search. Updates are relaxed
/// load-then-store pairs, so a racing write may be lost, which only costs
/// move ordering.
pub struct HistoryTable {
    history: [[AtomicI32; 64]; 12],
    gains: [[AtomicI32; 64]; 12],
}

impl HistoryTable {
    pub const fn new() -> Self {
        Self {
            history: [const { [const { AtomicI32::new(0) }; 64] }; 12],
            gains: [const { [const { AtomicI32::new(0) }; 64] }; 12],
        }
    }

    pub fn value(&self, piece: Piece, to: Square) -> i32 {
        self.history[piece.index()][to.index()].load(Ordering::Relaxed)
    }

    /// Adjust a history score, ignoring bonuses that would leave it outside `HISTORY_MAX`.
    pub fn add(&self, piece: Piece, to: Square, bonus: i32) {
        let slot = &self.history[piece.index()][to.index()];
        let val = slot.load(Ordering::Relaxed);
        if (val + bonus).abs() < HISTORY_MAX {
            slot.store(val + bonus, Ordering::Relaxed);
        }
    }

    pub fn gain(&self, piece: Piece, to: Square) -> i32 {
        self.gains[piece.index()][to.index()].load(Ordering::Relaxed)
    }

    /// Record the eval swing of a quiet move; old maxima decay by one per update.
    pub fn update_gain(&self, piece: Piece, to: Square, gain: i32) {
        let slot = &self.gains[piece.index()][to.index()];
        let val = slot.load(Ordering::Relaxed);
        slot.store(gain.max(val - 1), Ordering::Relaxed);
    }
}

impl Default for HistoryTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::chess::piece::{Colour, PieceType};

    #[test]
    fn history_is_clamped() {
        let h = HistoryTable::new();
        let knight = Piece::new(Colour::White, PieceType::Knight);
        for _ in 0..100 {
            h.add(knight, Square::F3, 100);
        }
        assert!(h.value(knight, Square::F3) < HISTORY_MAX);
        assert!(h.value(knight, Square::F3) >= HISTORY_MAX - 100);
        for _ in 0..100 {
            h.add(knight, Square::F3, -400);
        }
        assert!(h.value(knight, Square::F3) > -HISTORY_MAX);
        assert_eq!(h.value(knight, Square::C3), 0);
    }

    #[test]
    fn gain_decays_towards_new_values() {
        let h = HistoryTable::new();
        let pawn = Piece::new(Colour::Black, PieceType::Pawn);
        h.update_gain(pawn, Square::E5, 50);
        assert_eq!(h.gain(pawn, Square::E5), 50);
        h.update_gain(pawn, Square::E5, 10);
        assert_eq!(h.gain(pawn, Square::E5), 49);
        h.update_gain(pawn, Square::E5, 80);
        assert_eq!(h.gain(pawn, Square::E5), 80);
    }

    #[test]
    fn updates_from_other_threads_are_visible() {
        let h = HistoryTable::new();
        let bishop = Piece::new(Colour::White, PieceType::Bishop);
        thread::scope(|s| {
            s.spawn(|| h.add(bishop, Square::C4, 64));
            s.spawn(|| h.update_gain(bishop, Square::G5, 30));
        });
        assert_eq!(h.value(bishop, Square::C4), 64);
        assert_eq!(h.gain(bishop, Square::G5), 30);
    }
}
