use crate::{
    chess::chessmove::Move,
    util::{MAX_PLY, VALUE_NONE, depth::Depth},
};

/// Frames a split point hands to each participant: ply-1 through ply+2.
pub const SPLIT_FRAME_WINDOW: usize = 4;

/// Per-ply bookkeeping of one worker's walk down the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(clippy::module_name_repetitions)]
pub struct SearchFrame {
    pub ply: usize,
    pub current_move: Option<Move>,
    pub excluded_move: Option<Move>,
    pub killers: [Option<Move>; 2],
    pub reduction: Depth,
    pub eval: i32,
    pub eval_margin: i32,
    pub skip_null_move: bool,
    pub best_move: Option<Move>,
}

impl SearchFrame {
    pub const EMPTY: Self = Self {
        ply: 0,
        current_move: None,
        excluded_move: None,
        killers: [None; 2],
        reduction: 0,
        eval: VALUE_NONE,
        eval_margin: VALUE_NONE,
        skip_null_move: false,
        best_move: None,
    };

    pub fn add_killer(&mut self, m: Move) {
        if self.killers[0] != Some(m) {
            self.killers[1] = self.killers[0];
            self.killers[0] = Some(m);
        }
    }
}

impl Default for SearchFrame {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Frames for every ply a worker can reach, plus one before the root and
/// two past the deepest ply so that a node can always touch its parent and
/// grandchild.
#[derive(Clone, Debug)]
pub struct SearchStack {
    frames: [SearchFrame; MAX_PLY + 4],
}

impl SearchStack {
    pub fn boxed() -> Box<Self> {
        Box::new(Self { frames: [SearchFrame::EMPTY; MAX_PLY + 4] })
    }

    /// A fresh stack seeded with a split point's frame window around `ply`.
    pub fn boxed_with_window(ply: usize, window: &[SearchFrame; SPLIT_FRAME_WINDOW]) -> Box<Self> {
        let mut ss = Self::boxed();
        ss.frames[ply..ply + SPLIT_FRAME_WINDOW].copy_from_slice(window);
        ss
    }

    /// The frame of the node at `ply`.
    pub fn at(&self, ply: usize) -> &SearchFrame {
        &self.frames[ply + 1]
    }

    pub fn at_mut(&mut self, ply: usize) -> &mut SearchFrame {
        &mut self.frames[ply + 1]
    }

    /// The frame of the parent of the node at `ply`. At the root this is a blank sentinel.
    pub fn parent(&self, ply: usize) -> &SearchFrame {
        &self.frames[ply]
    }

    pub fn window(&self, ply: usize) -> [SearchFrame; SPLIT_FRAME_WINDOW] {
        let mut window = [SearchFrame::EMPTY; SPLIT_FRAME_WINDOW];
        window.copy_from_slice(&self.frames[ply..ply + SPLIT_FRAME_WINDOW]);
        window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess::types::Square;

    #[test]
    fn killers_shift_without_duplicates() {
        let mut frame = SearchFrame::EMPTY;
        let a = Move::new(Square::E2, Square::E4);
        let b = Move::new(Square::D2, Square::D4);
        frame.add_killer(a);
        frame.add_killer(a);
        assert_eq!(frame.killers, [Some(a), None]);
        frame.add_killer(b);
        assert_eq!(frame.killers, [Some(b), Some(a)]);
    }

    #[test]
    fn window_round_trips_through_a_fresh_stack() {
        let mut ss = SearchStack::boxed();
        let m = Move::new(Square::G1, Square::F3);
        ss.at_mut(5).current_move = Some(m);
        ss.at_mut(6).killers[0] = Some(m);
        ss.at_mut(4).eval = 42;
        let copy = SearchStack::boxed_with_window(5, &ss.window(5));
        assert_eq!(copy.parent(5).eval, 42);
        assert_eq!(copy.at(5).current_move, Some(m));
        assert_eq!(copy.at(6).killers[0], Some(m));
        assert_eq!(copy.at(7), &SearchFrame::EMPTY);
    }
}
