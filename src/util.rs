pub mod depth;

use std::sync::atomic::{AtomicU64, Ordering};

use crate::chess::piece::PieceType;

pub const MAX_DEPTH: i32 = 128;
pub const MAX_PLY: usize = MAX_DEPTH as usize;
pub const MEGABYTE: usize = 1024 * 1024;

pub const DRAW: i32 = 0;
pub const MATE_SCORE: i32 = 30_000;
pub const INFINITY: i32 = MATE_SCORE + 1;
pub const VALUE_NONE: i32 = INFINITY + 1;
pub const VALUE_KNOWN_WIN: i32 = 15_000;
/// Scores beyond this magnitude encode a forced mate.
pub const MINIMUM_MATE_SCORE: i32 = MATE_SCORE - 2 * MAX_PLY as i32;

pub const PAWN_VALUE_MG: i32 = 198;
pub const PAWN_VALUE_EG: i32 = 258;
pub const KNIGHT_VALUE_MG: i32 = 817;
pub const BISHOP_VALUE_MG: i32 = 836;
pub const ROOK_VALUE_MG: i32 = 1270;
pub const QUEEN_VALUE_MG: i32 = 2521;

/// Midgame material values, indexed by piece type. Kings are worth nothing.
pub const PIECE_VALUE_MG: [i32; 6] = [PAWN_VALUE_MG, KNIGHT_VALUE_MG, BISHOP_VALUE_MG, ROOK_VALUE_MG, QUEEN_VALUE_MG, 0];
/// Endgame material values, indexed by piece type.
pub const PIECE_VALUE_EG: [i32; 6] = [PAWN_VALUE_EG, 846, 857, 1278, 2558, 0];

pub const fn mg_value(pt: PieceType) -> i32 {
    PIECE_VALUE_MG[pt as usize]
}

pub const fn eg_value(pt: PieceType) -> i32 {
    PIECE_VALUE_EG[pt as usize]
}

pub const fn mate_in(ply: usize) -> i32 {
    #![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    MATE_SCORE - ply as i32
}

pub const fn mated_in(ply: usize) -> i32 {
    #![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    -MATE_SCORE + ply as i32
}

pub const fn is_mate_score(score: i32) -> bool {
    score.abs() >= MINIMUM_MATE_SCORE
}

/// Internal score units to UCI centipawns.
pub const fn to_centipawns(score: i32) -> i32 {
    score * 100 / PAWN_VALUE_MG
}

/// Formats a score the way UCI `info` lines expect it.
pub fn uci_score(score: i32) -> String {
    if is_mate_score(score) {
        let plies = MATE_SCORE - score.abs();
        let moves = (plies + 1) / 2;
        if score > 0 { format!("mate {moves}") } else { format!("mate -{moves}") }
    } else {
        format!("cp {}", to_centipawns(score))
    }
}

/// A node counter that only touches the shared atomic once per batch.
#[derive(Debug)]
pub struct BatchedAtomicCounter<'a> {
    buffer: u64,
    global: &'a AtomicU64,
}

impl<'a> BatchedAtomicCounter<'a> {
    const GRANULARITY: u64 = 1024;

    pub const fn new(global: &'a AtomicU64) -> Self {
        Self { buffer: 0, global }
    }

    pub fn increment(&mut self) {
        self.buffer += 1;
        if self.buffer >= Self::GRANULARITY {
            self.flush();
        }
    }

    /// Push buffered counts to the shared total.
    pub fn flush(&mut self) {
        self.global.fetch_add(self.buffer, Ordering::Relaxed);
        self.buffer = 0;
    }

    pub fn get_global(&self) -> u64 {
        self.global.load(Ordering::Relaxed) + self.buffer
    }

    pub const fn just_ticked_over(&self) -> bool {
        self.buffer == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mate_scores_are_recognised() {
        assert!(is_mate_score(mate_in(5)));
        assert!(is_mate_score(mated_in(0)));
        assert!(!is_mate_score(VALUE_KNOWN_WIN));
        assert_eq!(uci_score(mate_in(1)), "mate 1");
        assert_eq!(uci_score(mated_in(2)), "mate -1");
        assert_eq!(uci_score(PAWN_VALUE_MG), "cp 100");
    }

    #[test]
    fn counter_batches() {
        let global = AtomicU64::new(0);
        let mut counter = BatchedAtomicCounter::new(&global);
        for _ in 0..1500 {
            counter.increment();
        }
        assert_eq!(global.load(Ordering::Relaxed), 1024);
        assert_eq!(counter.get_global(), 1500);
        counter.flush();
        assert_eq!(global.load(Ordering::Relaxed), 1500);
    }
}
