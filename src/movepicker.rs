use crate::{
    chess::{
        board::{
            Board,
            movegen::{GenKind, MoveList, MoveListEntry},
        },
        chessmove::Move,
        piece::PieceType,
        types::Square,
    },
    historytable::{HISTORY_MAX, HistoryTable},
    util::{
        depth::{DEPTH_QS_NO_CHECKS, DEPTH_QS_RECAPTURES, Depth, ONE_PLY},
        mg_value,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    TTMove,
    GoodCaptures,
    Killers,
    QuietsPositive,
    QuietsRest,
    BadCaptures,
    Evasions,
    QCaptures,
    QChecks,
    Recaptures,
    ProbCutCaptures,
    Done,
}

const MAIN_SEARCH: &[Stage] = &[
    Stage::TTMove,
    Stage::GoodCaptures,
    Stage::Killers,
    Stage::QuietsPositive,
    Stage::QuietsRest,
    Stage::BadCaptures,
    Stage::Done,
];
const EVASIONS: &[Stage] = &[Stage::TTMove, Stage::Evasions, Stage::Done];
const QSEARCH_WITH_CHECKS: &[Stage] = &[Stage::TTMove, Stage::QCaptures, Stage::QChecks, Stage::Done];
const QSEARCH_WITHOUT_CHECKS: &[Stage] = &[Stage::TTMove, Stage::QCaptures, Stage::Done];
const RECAPTURES: &[Stage] = &[Stage::TTMove, Stage::Recaptures, Stage::Done];
const PROBCUT: &[Stage] = &[Stage::TTMove, Stage::ProbCutCaptures, Stage::Done];

/// Lazily serves the moves of one node, best first, one category at a time.
///
/// The hash move and killers are validated before being yielded and are
/// skipped when they turn up again in a generated batch.
#[derive(Clone, Debug)]
pub struct MovePicker {
    movelist: MoveList,
    bad_captures: MoveList,
    index: usize,
    end: usize,
    stages: &'static [Stage],
    stage_index: usize,
    tt_move: Option<Move>,
    killers: [Option<Move>; 2],
    recapture_sq: Option<Square>,
    capture_threshold: i32,
    depth: Depth,
}

/// An exhausted picker, left behind when a node hands its picker to a split point.
impl Default for MovePicker {
    fn default() -> Self {
        Self::with_stages(&[Stage::Done], None, 0)
    }
}

impl MovePicker {
    fn with_stages(stages: &'static [Stage], tt_move: Option<Move>, depth: Depth) -> Self {
        Self {
            movelist: MoveList::new(),
            bad_captures: MoveList::new(),
            index: 0,
            end: 0,
            stages,
            stage_index: 0,
            tt_move,
            killers: [None; 2],
            recapture_sq: None,
            capture_threshold: 0,
            depth,
        }
    }

    /// Picker for the main search. In check, only evasions are served.
    pub fn new(pos: &Board, tt_move: Option<Move>, depth: Depth, killers: [Option<Move>; 2]) -> Self {
        debug_assert!(depth > 0);
        let tt_move = tt_move.filter(|&m| pos.is_pseudo_legal(m));
        if pos.in_check() {
            return Self::with_stages(EVASIONS, tt_move, depth);
        }
        let mut mp = Self::with_stages(MAIN_SEARCH, tt_move, depth);
        mp.killers = killers;
        mp
    }

    /// Picker for quiescence. The depth band chooses whether quiet checks are
    /// tried and whether only recaptures onto `recapture_sq` are.
    pub fn qsearch(pos: &Board, tt_move: Option<Move>, depth: Depth, recapture_sq: Option<Square>) -> Self {
        debug_assert!(depth <= 0);
        let tt_move = tt_move.filter(|&m| pos.is_pseudo_legal(m));
        if pos.in_check() {
            return Self::with_stages(EVASIONS, tt_move, depth);
        }
        if depth > DEPTH_QS_NO_CHECKS {
            return Self::with_stages(QSEARCH_WITH_CHECKS, tt_move, depth);
        }
        if depth > DEPTH_QS_RECAPTURES {
            // quiet hash moves are useless once checks are no longer searched.
            let tt_move = tt_move.filter(|&m| pos.is_capture_or_promotion(m));
            return Self::with_stages(QSEARCH_WITHOUT_CHECKS, tt_move, depth);
        }
        let mut mp = Self::with_stages(RECAPTURES, None, depth);
        mp.recapture_sq = recapture_sq;
        mp
    }

    /// Picker for ProbCut: captures that win more than `threshold` by SEE.
    pub fn probcut(pos: &Board, tt_move: Option<Move>, threshold: i32) -> Self {
        debug_assert!(!pos.in_check());
        let tt_move = tt_move.filter(|&m| {
            pos.is_pseudo_legal(m) && pos.is_capture(m) && pos.static_exchange_eval(m) > threshold
        });
        let mut mp = Self::with_stages(PROBCUT, tt_move, 0);
        mp.capture_threshold = threshold;
        mp
    }

    pub fn stage(&self) -> Stage {
        self.stages[self.stage_index]
    }

    fn is_lazy(&self, m: Move) -> bool {
        Some(m) == self.tt_move || Some(m) == self.killers[0] || Some(m) == self.killers[1]
    }

    /// Generate and score the batch for the next stage.
    fn next_stage(&mut self, pos: &Board, history: &HistoryTable) {
        self.stage_index += 1;
        self.index = 0;
        match self.stage() {
            Stage::GoodCaptures | Stage::QCaptures | Stage::ProbCutCaptures | Stage::Recaptures => {
                self.movelist.clear();
                pos.generate_pseudo(&mut self.movelist, GenKind::Captures);
                Self::score_captures(pos, &mut self.movelist);
                self.end = self.movelist.len();
            }
            Stage::Killers => {
                self.end = 0;
            }
            Stage::QuietsPositive => {
                self.movelist.clear();
                pos.generate_pseudo(&mut self.movelist, GenKind::Quiets);
                Self::score_quiets(pos, history, &mut self.movelist);
                // partition: positive history first, those fully sorted.
                let mut split = 0;
                for i in 0..self.movelist.len() {
                    if self.movelist[i].score > 0 {
                        self.movelist.swap(i, split);
                        split += 1;
                    }
                }
                sort_descending(&mut self.movelist[..split]);
                self.end = split;
            }
            Stage::QuietsRest => {
                self.index = self.end;
                self.end = self.movelist.len();
                if self.depth >= 3 * ONE_PLY {
                    sort_descending(&mut self.movelist[self.index..self.end]);
                }
            }
            Stage::BadCaptures => {
                self.end = self.bad_captures.len();
            }
            Stage::Evasions => {
                self.movelist.clear();
                pos.generate_pseudo(&mut self.movelist, GenKind::Evasions);
                Self::score_evasions(pos, history, &mut self.movelist);
                self.end = self.movelist.len();
            }
            Stage::QChecks => {
                self.movelist.clear();
                pos.generate_pseudo(&mut self.movelist, GenKind::QuietChecks);
                self.end = self.movelist.len();
            }
            Stage::TTMove | Stage::Done => {}
        }
    }

    /// Select the next move to try. Returns None if there are no more moves to try.
    /// Moves are pseudo-legal; legality is left to the caller.
    pub fn next(&mut self, pos: &Board, history: &HistoryTable) -> Option<Move> {
        loop {
            match self.stage() {
                Stage::Done => return None,
                Stage::TTMove => {
                    if let Some(tt_move) = self.tt_move.filter(|_| self.index == 0) {
                        self.index = 1;
                        return Some(tt_move);
                    }
                    self.next_stage(pos, history);
                }
                Stage::GoodCaptures => {
                    if let Some(m) = self.pick_best() {
                        if Some(m) == self.tt_move {
                            continue;
                        }
                        if pos.see_sign(m) >= 0 {
                            return Some(m);
                        }
                        // losing capture, played after the quiets in the order picked.
                        self.bad_captures.push(m);
                        continue;
                    }
                    self.next_stage(pos, history);
                }
                Stage::Killers => {
                    if self.index < 2 {
                        let slot = self.index;
                        self.index += 1;
                        if let Some(killer) = self.killers[slot] {
                            let duplicate = Some(killer) == self.tt_move || (slot == 1 && self.killers[0] == Some(killer));
                            if !duplicate && pos.is_pseudo_legal(killer) && !pos.is_capture_or_promotion(killer) {
                                return Some(killer);
                            }
                            // only killers actually served are skipped later.
                            self.killers[slot] = None;
                        }
                        continue;
                    }
                    self.next_stage(pos, history);
                }
                Stage::QuietsPositive | Stage::QuietsRest => {
                    if self.index < self.end {
                        let m = self.movelist[self.index].mov;
                        self.index += 1;
                        if !self.is_lazy(m) {
                            return Some(m);
                        }
                        continue;
                    }
                    self.next_stage(pos, history);
                }
                Stage::BadCaptures => {
                    if self.index < self.end {
                        let m = self.bad_captures[self.index].mov;
                        self.index += 1;
                        return Some(m);
                    }
                    self.next_stage(pos, history);
                }
                Stage::Evasions | Stage::QCaptures => {
                    if let Some(m) = self.pick_best() {
                        if Some(m) != self.tt_move {
                            return Some(m);
                        }
                        continue;
                    }
                    self.next_stage(pos, history);
                }
                Stage::QChecks => {
                    if self.index < self.end {
                        let m = self.movelist[self.index].mov;
                        self.index += 1;
                        if Some(m) != self.tt_move {
                            return Some(m);
                        }
                        continue;
                    }
                    self.next_stage(pos, history);
                }
                Stage::Recaptures => {
                    if let Some(m) = self.pick_best() {
                        if Some(m.to()) == self.recapture_sq {
                            return Some(m);
                        }
                        continue;
                    }
                    self.next_stage(pos, history);
                }
                Stage::ProbCutCaptures => {
                    if let Some(m) = self.pick_best() {
                        if Some(m) != self.tt_move && pos.static_exchange_eval(m) > self.capture_threshold {
                            return Some(m);
                        }
                        continue;
                    }
                    self.next_stage(pos, history);
                }
            }
        }
    }

    /// One step of selection sort: swap the best remaining move to the front.
    fn pick_best(&mut self) -> Option<Move> {
        if self.index >= self.end {
            return None;
        }
        let mut best = self.index;
        for i in self.index + 1..self.end {
            if self.movelist[i].score > self.movelist[best].score {
                best = i;
            }
        }
        self.movelist.swap(self.index, best);
        let m = self.movelist[self.index].mov;
        self.index += 1;
        Some(m)
    }

    fn mvv_lva(pos: &Board, m: Move) -> i32 {
        #![allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
        let victim = if m.is_ep() {
            mg_value(PieceType::Pawn)
        } else {
            pos.piece_at(m.to()).map_or(0, |p| mg_value(p.piece_type()))
        };
        let attacker = pos.moved_piece(m).map_or(0, |p| p.piece_type().index() as i32 + 1);
        let promo = m.promotion_type().map_or(0, mg_value);
        victim - attacker + promo
    }

    fn score_captures(pos: &Board, moves: &mut [MoveListEntry]) {
        for e in moves {
            e.score = Self::mvv_lva(pos, e.mov);
        }
    }

    fn score_quiets(pos: &Board, history: &HistoryTable, moves: &mut [MoveListEntry]) {
        for e in moves {
            e.score = pos.moved_piece(e.mov).map_or(0, |p| history.value(p, e.mov.to()));
        }
    }

    /// Good captures above safe quiets above anything that loses material.
    fn score_evasions(pos: &Board, history: &HistoryTable, moves: &mut [MoveListEntry]) {
        if moves.len() < 2 {
            return;
        }
        for e in moves {
            let see = pos.see_sign(e.mov);
            e.score = if see < 0 {
                see - HISTORY_MAX
            } else if pos.is_capture(e.mov) {
                Self::mvv_lva(pos, e.mov) + HISTORY_MAX
            } else {
                pos.moved_piece(e.mov).map_or(0, |p| history.value(p, e.mov.to()))
            };
        }
    }
}

fn sort_descending(moves: &mut [MoveListEntry]) {
    moves.sort_by(|a, b| b.score.cmp(&a.score));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess::board::STARTING_FEN;
    use crate::util::depth::{DEPTH_QS_CHECKS, DEPTH_QS_NO_CHECKS};

    const FENS: [&str; 6] = [
        STARTING_FEN,
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
        "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
        "r1bqkbnr/pppp1ppp/2n5/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 2 3",
    ];

    fn drain(mut mp: MovePicker, pos: &Board, history: &HistoryTable) -> Vec<Move> {
        let mut out = Vec::new();
        while let Some(m) = mp.next(pos, history) {
            out.push(m);
        }
        out
    }

    fn sorted(mut v: Vec<Move>) -> Vec<u16> {
        let mut raw: Vec<u16> = v.drain(..).map(Move::inner).collect();
        raw.sort_unstable();
        raw
    }

    #[test]
    fn main_search_yields_every_legal_move_once() {
        let history = HistoryTable::new();
        for fen in FENS {
            let pos = Board::from_fen(fen).unwrap();
            let legal: Vec<Move> = pos.legal_moves().iter_moves().copied().collect();
            let pinned = pos.pinned_pieces();
            // a hash move and killers taken from the legal moves, plus a bogus killer.
            let tt_move = legal.last().copied();
            let killers = [legal.get(3).copied(), Some(Move::new(Square::A3, Square::H7))];
            let yielded = drain(MovePicker::new(&pos, tt_move, 8, killers), &pos, &history);
            assert_eq!(yielded.first().copied(), tt_move, "{fen}");
            let legal_yielded: Vec<Move> = yielded.into_iter().filter(|&m| pos.is_legal(m, pinned)).collect();
            assert_eq!(sorted(legal_yielded), sorted(legal.clone()), "{fen}");
        }
    }

    #[test]
    fn evasions_yield_every_legal_move_once() {
        let history = HistoryTable::new();
        for fen in [
            "rnbqkbnr/ppp2ppp/8/1B1pp3/4P3/8/PPPP1PPP/RNBQK1NR b KQkq - 1 3",
            "4k3/8/8/8/8/5n2/8/R3K2R w KQ - 0 1",
        ] {
            let pos = Board::from_fen(fen).unwrap();
            assert!(pos.in_check());
            let legal: Vec<Move> = pos.legal_moves().iter_moves().copied().collect();
            let pinned = pos.pinned_pieces();
            let yielded = drain(MovePicker::new(&pos, legal.first().copied(), 4, [None; 2]), &pos, &history);
            let legal_yielded: Vec<Move> = yielded.into_iter().filter(|&m| pos.is_legal(m, pinned)).collect();
            assert_eq!(sorted(legal_yielded), sorted(legal), "{fen}");
        }
    }

    #[test]
    fn qsearch_serves_captures_then_checks() {
        let history = HistoryTable::new();
        for fen in FENS {
            let pos = Board::from_fen(fen).unwrap();
            // in check the picker serves evasions instead.
            if pos.in_check() {
                continue;
            }
            let mut expected = MoveList::new();
            pos.generate_pseudo(&mut expected, GenKind::Captures);
            let captures: Vec<Move> = expected.iter_moves().copied().collect();
            pos.generate_pseudo(&mut expected, GenKind::QuietChecks);
            let with_checks = drain(MovePicker::qsearch(&pos, None, DEPTH_QS_CHECKS, None), &pos, &history);
            assert_eq!(sorted(with_checks), sorted(expected.iter_moves().copied().collect()), "{fen}");
            let without = drain(MovePicker::qsearch(&pos, None, DEPTH_QS_NO_CHECKS, None), &pos, &history);
            assert_eq!(sorted(without), sorted(captures), "{fen}");
        }
    }

    #[test]
    fn captures_come_most_valuable_victim_first() {
        let history = HistoryTable::new();
        // the pawn on d4 can take a knight on c5 or a queen on e5.
        let pos = Board::from_fen("4k3/8/8/2n1q3/3P4/8/8/K7 w - - 0 1").unwrap();
        let yielded = drain(MovePicker::qsearch(&pos, None, DEPTH_QS_NO_CHECKS, None), &pos, &history);
        assert_eq!(yielded[0], pos.parse_uci("d4e5").unwrap());
        assert_eq!(yielded[1], pos.parse_uci("d4c5").unwrap());
    }

    #[test]
    fn losing_captures_come_last() {
        let history = HistoryTable::new();
        // queen takes a defended pawn: a bad capture, tried after every quiet move.
        let pos = Board::from_fen("4k3/8/2p5/3p4/8/8/8/3QK3 w - - 0 1").unwrap();
        let yielded = drain(MovePicker::new(&pos, None, 6, [None; 2]), &pos, &history);
        assert_eq!(yielded.last().copied(), Some(pos.parse_uci("d1d5").unwrap()));
        assert_eq!(yielded.iter().filter(|&&m| pos.is_capture(m)).count(), 1);
    }

    #[test]
    fn losing_captures_keep_victim_order() {
        let history = HistoryTable::new();
        // both queen captures lose material; the knight is the bigger victim.
        let pos = Board::from_fen("4k3/8/2p5/3p3p/6n1/8/8/3QK3 w - - 0 1").unwrap();
        let yielded = drain(MovePicker::new(&pos, None, 6, [None; 2]), &pos, &history);
        let n = yielded.len();
        assert_eq!(yielded[n - 2..], [pos.parse_uci("d1g4").unwrap(), pos.parse_uci("d1d5").unwrap()]);
        assert_eq!(yielded.iter().filter(|&&m| pos.is_capture(m)).count(), 2);
    }

    #[test]
    fn recaptures_only_target_the_square() {
        let history = HistoryTable::new();
        let pos = Board::from_fen(FENS[1]).unwrap();
        let target = Square::E6;
        let yielded = drain(MovePicker::qsearch(&pos, None, DEPTH_QS_RECAPTURES, Some(target)), &pos, &history);
        assert!(!yielded.is_empty());
        assert!(yielded.iter().all(|m| m.to() == target));
    }

    #[test]
    fn probcut_respects_threshold() {
        let history = HistoryTable::new();
        let pos = Board::from_fen(FENS[1]).unwrap();
        let threshold = mg_value(PieceType::Pawn);
        let yielded = drain(MovePicker::probcut(&pos, None, threshold), &pos, &history);
        assert!(yielded.iter().all(|&m| pos.static_exchange_eval(m) > threshold));
    }

    #[test]
    fn quiets_follow_history() {
        let history = HistoryTable::new();
        let pos = Board::new();
        let favourite = pos.parse_uci("b1a3").unwrap();
        let piece = pos.moved_piece(favourite).unwrap();
        history.add(piece, favourite.to(), 500);
        let yielded = drain(MovePicker::new(&pos, None, 2, [None; 2]), &pos, &history);
        assert_eq!(yielded[0], favourite);
    }
}
