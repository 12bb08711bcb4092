use std::fmt::Display;

use arrayvec::ArrayVec;

use crate::{chess::chessmove::Move, util::MAX_PLY};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PVariation {
    moves: ArrayVec<Move, MAX_PLY>,
}

impl PVariation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    /// Append a move; moves past the maximum length are dropped.
    pub fn push(&mut self, m: Move) {
        if !self.moves.is_full() {
            self.moves.push(m);
        }
    }

    pub fn truncate(&mut self, len: usize) {
        self.moves.truncate(len);
    }
}

impl Display for PVariation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.moves.is_empty() {
            write!(f, "pv")?;
        }
        for &m in self.moves() {
            write!(f, " {m}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess::types::Square;

    #[test]
    fn displays_as_uci_pv() {
        let mut pv = PVariation::new();
        assert_eq!(pv.to_string(), "");
        pv.push(Move::new(Square::E2, Square::E4));
        pv.push(Move::new(Square::E7, Square::E5));
        assert_eq!(pv.moves()[0], Move::new(Square::E2, Square::E4));
        assert_eq!(pv.to_string(), "pv e2e4 e7e5");
        pv.truncate(1);
        assert_eq!(pv.to_string(), "pv e2e4");
    }
}
