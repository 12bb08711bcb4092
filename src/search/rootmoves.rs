use crate::{
    chess::{board::Board, chessmove::Move},
    evaluation::{PawnCache, evaluate},
    search::pv::PVariation,
    transpositiontable::{Bound, TTView},
    util::{INFINITY, MAX_PLY, VALUE_NONE, depth::DEPTH_NONE},
};

/// A legal move at the root, with the score and line of its latest search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootMove {
    pub score: i32,
    pub prev_score: i32,
    pub pv: PVariation,
}

impl RootMove {
    pub fn new(m: Move) -> Self {
        let mut pv = PVariation::new();
        pv.push(m);
        Self { score: -INFINITY, prev_score: -INFINITY, pv }
    }

    pub fn mov(&self) -> Move {
        self.pv.moves()[0]
    }

    /// Rebuild the line after our move by following hash moves, stopping at
    /// the first missing or illegal one, or at a draw past the second ply.
    pub fn extract_pv_from_tt(&mut self, pos: &mut Board, tt: TTView) {
        let first = self.mov();
        self.pv.truncate(0);
        self.pv.push(first);
        pos.make_move(first);
        let mut ply = 1;
        while let Some(m) = tt.probe_move(pos.key()) {
            if ply >= MAX_PLY
                || !pos.is_pseudo_legal(m)
                || !pos.is_legal(m, pos.pinned_pieces())
                || (pos.is_draw(false) && ply >= 2)
            {
                break;
            }
            self.pv.push(m);
            pos.make_move(m);
            ply += 1;
        }
        for &m in self.pv.moves()[..ply].iter().rev() {
            pos.unmake_move(m);
        }
    }

    /// Write the line back into the hash table so that the next iteration
    /// starts by searching it, even if its entries were overwritten.
    pub fn insert_pv_in_tt(&self, pos: &mut Board, tt: TTView, pawn_cache: &mut PawnCache) {
        for &m in self.pv.moves() {
            if tt.probe_move(pos.key()) != Some(m) {
                let (value, margin) = if pos.in_check() {
                    (VALUE_NONE, VALUE_NONE)
                } else {
                    let eval = evaluate(pos, pawn_cache);
                    (eval.value, eval.margin)
                };
                tt.store(pos.key(), 0, Some(m), VALUE_NONE, Bound::None, DEPTH_NONE, value, margin);
            }
            pos.make_move(m);
        }
        for &m in self.pv.moves().iter().rev() {
            pos.unmake_move(m);
        }
    }
}

/// The moves searched at the root, best first.
#[derive(Clone, Debug, Default)]
pub struct RootMoves {
    moves: Vec<RootMove>,
}

impl RootMoves {
    /// Every legal move, or only those in `search_moves` when it is non-empty.
    pub fn new(pos: &Board, search_moves: &[Move]) -> Self {
        let moves = pos
            .legal_moves()
            .iter_moves()
            .copied()
            .filter(|m| search_moves.is_empty() || search_moves.contains(m))
            .map(RootMove::new)
            .collect();
        Self { moves }
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn contains(&self, m: Move) -> bool {
        self.iter().any(|rm| rm.mov() == m)
    }

    pub fn find_mut(&mut self, m: Move) -> Option<&mut RootMove> {
        self.moves.iter_mut().find(|rm| rm.mov() == m)
    }

    pub fn best(&self) -> Option<&RootMove> {
        self.moves.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RootMove> {
        self.moves.iter()
    }

    /// Remember the scores of the finished iteration before the next one overwrites them.
    pub fn save_scores(&mut self) {
        for rm in &mut self.moves {
            rm.prev_score = rm.score;
        }
    }

    /// Best first. The sort is stable: moves that were not improved keep
    /// `-INFINITY` and their relative order.
    pub fn sort(&mut self) {
        self.moves.sort_by(|a, b| b.score.cmp(&a.score));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{chess::types::Square, transpositiontable::TT, util::MEGABYTE};

    #[test]
    fn search_moves_restrict_the_root() {
        let pos = Board::new();
        assert_eq!(RootMoves::new(&pos, &[]).len(), 20);
        let e4 = Move::new(Square::E2, Square::E4);
        let restricted = RootMoves::new(&pos, &[e4]);
        assert_eq!(restricted.len(), 1);
        assert!(restricted.contains(e4));
    }

    #[test]
    fn sort_is_stable_for_unsearched_moves() {
        let pos = Board::new();
        let mut rms = RootMoves::new(&pos, &[]);
        let order: Vec<Move> = rms.iter().map(RootMove::mov).collect();
        let promoted = order[7];
        if let Some(rm) = rms.find_mut(promoted) {
            rm.score = 35;
        }
        rms.sort();
        let after: Vec<Move> = rms.iter().map(RootMove::mov).collect();
        assert_eq!(after[0], promoted);
        let rest: Vec<Move> = order.iter().copied().filter(|&m| m != promoted).collect();
        assert_eq!(&after[1..], &rest[..]);
    }

    #[test]
    fn pv_round_trips_through_the_table() {
        let mut tt = TT::new();
        tt.resize(MEGABYTE);
        let mut pos = Board::new();
        let line = ["e2e4", "e7e5", "g1f3", "b8c6", "f1b5"];
        let mut rm = RootMove::new(pos.parse_uci(line[0]).unwrap());
        {
            let mut walker = pos.clone();
            walker.make_move(rm.mov());
            for uci in &line[1..] {
                let m = walker.parse_uci(uci).unwrap();
                rm.pv.push(m);
                walker.make_move(m);
            }
        }
        assert_eq!(rm.pv.moves().len(), line.len());
        let before = pos.fen();
        rm.insert_pv_in_tt(&mut pos, tt.view(), &mut PawnCache::new());
        assert_eq!(pos.fen(), before);

        let mut extracted = RootMove::new(rm.mov());
        extracted.extract_pv_from_tt(&mut pos, tt.view());
        assert_eq!(pos.fen(), before);
        assert_eq!(extracted.pv.moves(), rm.pv.moves());
    }
}
