use std::{
    fmt::{Display, Formatter},
    ops::{Deref, DerefMut},
};

use arrayvec::ArrayVec;

use crate::chess::{
    attacks::{RAY_BETWEEN, attacks_by_type, king_attacks, pawn_attacks},
    board::Board,
    chessmove::{Move, MoveFlags},
    piece::PieceType,
    squareset::SquareSet,
    types::{Rank, Square},
};

/// Pseudo-legal move counts stay well under this.
pub const MAX_POSITION_MOVES: usize = 256;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveListEntry {
    pub score: i32,
    pub mov: Move,
}

#[derive(Clone, Debug, Default)]
pub struct MoveList {
    inner: ArrayVec<MoveListEntry, MAX_POSITION_MOVES>,
}

impl MoveList {
    pub fn new() -> Self {
        Self { inner: ArrayVec::new() }
    }

    pub fn push(&mut self, m: Move) {
        self.inner.push(MoveListEntry { mov: m, score: 0 });
    }

    pub fn iter_moves(&self) -> impl Iterator<Item = &Move> {
        self.inner.iter().map(|e| &e.mov)
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

impl Deref for MoveList {
    type Target = [MoveListEntry];

    fn deref(&self) -> &[MoveListEntry] {
        &self.inner
    }
}

impl DerefMut for MoveList {
    fn deref_mut(&mut self) -> &mut [MoveListEntry] {
        &mut self.inner
    }
}

impl Display for MoveList {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "MoveList: ({}) [", self.inner.len())?;
        for (i, e) in self.inner.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", e.mov)?;
        }
        write!(f, "]")
    }
}

/// Which slice of the pseudo-legal moves to generate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenKind {
    /// Captures and queen promotions.
    Captures,
    /// Non-captures, under-promotions, and castling.
    Quiets,
    /// Every move that may resolve a check. Only valid when in check.
    Evasions,
    /// Quiet moves (no promotions) that give check.
    QuietChecks,
    /// Captures and quiets together, when not in check.
    All,
}

const PROMO_ORDER: [PieceType; 4] = [PieceType::Queen, PieceType::Knight, PieceType::Rook, PieceType::Bishop];

impl Board {
    pub fn generate_pseudo(&self, list: &mut MoveList, kind: GenKind) {
        if kind == GenKind::QuietChecks {
            let mut quiets = MoveList::new();
            self.generate_pseudo(&mut quiets, GenKind::Quiets);
            let ci = self.check_info();
            for &m in quiets.iter_moves() {
                if !m.is_promo() && self.gives_check(m, &ci) {
                    list.push(m);
                }
            }
            return;
        }

        let us = self.turn();
        let ours = self.colour(us);
        let theirs = self.colour(!us);
        let empty = !self.occupied();
        let ksq = self.king_sq(us);

        let target = match kind {
            GenKind::Captures => theirs,
            GenKind::Quiets => empty,
            GenKind::All => !ours,
            GenKind::Evasions => {
                debug_assert!(self.in_check());
                for to in king_attacks(ksq) - ours {
                    list.push(Move::new(ksq, to));
                }
                if self.checkers().many() {
                    return;
                }
                let Some(checker) = self.checkers().first() else {
                    return;
                };
                RAY_BETWEEN[checker][ksq] | checker.as_set()
            }
            GenKind::QuietChecks => unreachable!(),
        };

        self.generate_pawn_moves(list, kind, target);

        let occupied = self.occupied();
        for pt in [PieceType::Knight, PieceType::Bishop, PieceType::Rook, PieceType::Queen] {
            for from in self.pieces_of(us, pt) {
                for to in attacks_by_type(pt, from, occupied) & target {
                    list.push(Move::new(from, to));
                }
            }
        }

        if kind != GenKind::Evasions {
            for to in king_attacks(ksq) & target {
                list.push(Move::new(ksq, to));
            }
        }

        if matches!(kind, GenKind::Quiets | GenKind::All) && !self.in_check() {
            self.generate_castling(list);
        }
    }

    fn generate_pawn_moves(&self, list: &mut MoveList, kind: GenKind, target: SquareSet) {
        let us = self.turn();
        let theirs = self.colour(!us);
        let empty = !self.occupied();
        let evading = kind == GenKind::Evasions;
        let (queen_promos, under_promos) = match kind {
            GenKind::Captures => (true, false),
            GenKind::Quiets => (false, true),
            _ => (true, true),
        };
        let may_land = |to: Square| !evading || target.contains_square(to);

        for from in self.pieces_of(us, PieceType::Pawn) {
            let Some(push) = from.pawn_push(us) else {
                continue;
            };
            let captures = pawn_attacks(from, us) & theirs;

            if push.rank().relative_to(us) == Rank::Eight {
                let mut destinations = captures;
                if empty.contains_square(push) {
                    destinations = destinations.add_square(push);
                }
                for to in destinations {
                    if !may_land(to) {
                        continue;
                    }
                    for promo in PROMO_ORDER {
                        let wanted = if promo == PieceType::Queen { queen_promos } else { under_promos };
                        if wanted {
                            list.push(Move::new_with_promo(from, to, promo));
                        }
                    }
                }
                continue;
            }

            if kind != GenKind::Quiets {
                for to in captures & target {
                    list.push(Move::new(from, to));
                }
            }

            if !matches!(kind, GenKind::Captures) && empty.contains_square(push) {
                if may_land(push) {
                    list.push(Move::new(from, push));
                }
                if from.rank().relative_to(us) == Rank::Two {
                    if let Some(double) = push.pawn_push(us).filter(|&sq| empty.contains_square(sq)) {
                        if may_land(double) {
                            list.push(Move::new(from, double));
                        }
                    }
                }
            }
        }

        if kind != GenKind::Quiets {
            if let Some(ep) = self.ep_sq() {
                let capsq = ep.pawn_push(!us);
                let resolves = !evading || target.contains_square(ep) || capsq.is_some_and(|sq| target.contains_square(sq));
                if resolves {
                    for from in pawn_attacks(ep, !us) & self.pieces_of(us, PieceType::Pawn) {
                        list.push(Move::new_with_flags(from, ep, MoveFlags::EnPassant));
                    }
                }
            }
        }
    }

    fn generate_castling(&self, list: &mut MoveList) {
        let us = self.turn();
        let rights = self.castling_rights();
        let occupied = self.occupied();
        let king_from = Square::E1.relative_to(us);
        let rel = |sq: Square| sq.relative_to(us);
        let free = |squares: &[Square]| squares.iter().all(|&sq| !occupied.contains_square(rel(sq)));
        let safe = |squares: &[Square]| squares.iter().all(|&sq| !self.sq_attacked(rel(sq), !us));

        if rights.kingside(us) && free(&[Square::F1, Square::G1]) && safe(&[Square::F1, Square::G1]) {
            list.push(Move::new_with_flags(king_from, rel(Square::G1), MoveFlags::Castle));
        }
        if rights.queenside(us)
            && free(&[Square::B1, Square::C1, Square::D1])
            && safe(&[Square::D1, Square::C1])
        {
            list.push(Move::new_with_flags(king_from, rel(Square::C1), MoveFlags::Castle));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legal_count(fen: &str) -> usize {
        Board::from_fen(fen).unwrap().legal_moves().len()
    }

    #[test]
    fn start_position_has_twenty_moves() {
        assert_eq!(Board::new().legal_moves().len(), 20);
    }

    #[test]
    fn captures_and_quiets_partition_all_moves() {
        let board = Board::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1").unwrap();
        let mut all = MoveList::new();
        board.generate_pseudo(&mut all, GenKind::All);
        let mut caps = MoveList::new();
        board.generate_pseudo(&mut caps, GenKind::Captures);
        let mut quiets = MoveList::new();
        board.generate_pseudo(&mut quiets, GenKind::Quiets);
        assert_eq!(caps.len() + quiets.len(), all.len());
        for m in all.iter_moves() {
            assert!(caps.iter_moves().any(|c| c == m) != quiets.iter_moves().any(|q| q == m));
        }
        assert!(caps.iter_moves().all(|&m| board.is_capture_or_promotion(m)));
    }

    #[test]
    fn promotions_split_between_captures_and_quiets() {
        let board = Board::from_fen("1n2k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let mut caps = MoveList::new();
        board.generate_pseudo(&mut caps, GenKind::Captures);
        let promos = caps.iter_moves().filter(|m| m.is_promo()).count();
        // queen promotions by push and by capture.
        assert_eq!(promos, 2);
        let mut quiets = MoveList::new();
        board.generate_pseudo(&mut quiets, GenKind::Quiets);
        assert_eq!(quiets.iter_moves().filter(|m| m.is_promo()).count(), 6);
    }

    #[test]
    fn evasions_cover_every_legal_reply() {
        for fen in [
            "4k3/8/8/8/8/8/8/r3K1N1 w - - 0 1",
            "4k3/8/8/8/1b6/8/8/R3K3 w - - 0 1",
            "8/8/8/2k5/3Pp3/8/8/4K3 b - d3 0 1",
        ] {
            let board = Board::from_fen(fen).unwrap();
            assert!(board.in_check(), "{fen}");
            let mut evasions = MoveList::new();
            board.generate_pseudo(&mut evasions, GenKind::Evasions);
            let mut all = MoveList::new();
            board.generate_pseudo(&mut all, GenKind::All);
            let pinned = board.pinned_pieces();
            for m in all.iter_moves().copied().filter(|&m| board.is_legal(m, pinned)) {
                let mut child = board.clone();
                child.make_move(m);
                let resolves = !child.sq_attacked(child.king_sq(!child.turn()), child.turn());
                assert_eq!(resolves, evasions.iter_moves().any(|&e| e == m), "{fen}: {m}");
            }
        }
    }

    #[test]
    fn quiet_checks_are_quiet_and_checking() {
        let board = Board::from_fen("4k3/8/8/8/8/8/3N4/R3K3 w Q - 0 1").unwrap();
        let mut checks = MoveList::new();
        board.generate_pseudo(&mut checks, GenKind::QuietChecks);
        let ci = board.check_info();
        assert!(!checks.is_empty());
        for &m in checks.iter_moves() {
            assert!(!board.is_capture(m));
            assert!(board.gives_check(m, &ci));
        }
        assert!(checks.iter_moves().any(|m| m.to_string() == "a1a8"));
    }

    #[test]
    fn castling_needs_safe_path() {
        // the f1 square is covered by the bishop on c4.
        assert_eq!(legal_count("4k3/8/8/8/2b5/8/8/4K2R w K - 0 1"), 3 + 9);
        assert_eq!(legal_count("r3k3/8/8/8/8/8/8/4K3 b q - 0 1"), 5 + 10 + 1);
    }
}
