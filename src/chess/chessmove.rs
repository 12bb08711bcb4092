use std::{
    fmt::{Debug, Display, Formatter},
    num::NonZeroU16,
};

use crate::chess::{piece::PieceType, types::Square};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[repr(u16)]
pub enum MoveFlags {
    Promotion = 0b01 << 14,
    EnPassant = 0b10 << 14,
    Castle = 0b11 << 14,
}

/// A move, packed into sixteen bits:
/// six bits of origin, six of destination, two of promotion piece, two of flags.
/// Castling is encoded as the king's two-square move.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Move {
    data: NonZeroU16,
}

const _MOVE_ASSERT: () = assert!(size_of::<Move>() == size_of::<Option<Move>>());

impl Move {
    const SQ_MASK: u16 = 0b11_1111;
    const TO_SHIFT: u16 = 6;
    const PROMO_SHIFT: u16 = 12;
    const FLAG_MASK: u16 = 0b1100_0000_0000_0000;

    /// The "pass" played by null-move search. Its origin equals its destination,
    /// which no real move can have.
    pub const NULL: Self = Self::from_raw(Square::B1.inner() as u16 | (Square::B1.inner() as u16) << 6);

    const fn from_raw(data: u16) -> Self {
        match NonZeroU16::new(data) {
            Some(data) => Self { data },
            None => panic!("encoded move must be non-zero"),
        }
    }

    pub const fn new(from: Square, to: Square) -> Self {
        Self::from_raw(from.inner() as u16 | (to.inner() as u16) << Self::TO_SHIFT)
    }

    pub const fn new_with_promo(from: Square, to: Square, promo: PieceType) -> Self {
        debug_assert!(promo.legal_promo());
        let promo_bits = (promo as u16 - PieceType::Knight as u16) << Self::PROMO_SHIFT;
        Self::from_raw(
            from.inner() as u16
                | (to.inner() as u16) << Self::TO_SHIFT
                | promo_bits
                | MoveFlags::Promotion as u16,
        )
    }

    pub const fn new_with_flags(from: Square, to: Square, flags: MoveFlags) -> Self {
        Self::from_raw(from.inner() as u16 | (to.inner() as u16) << Self::TO_SHIFT | flags as u16)
    }

    pub const fn inner(self) -> u16 {
        self.data.get()
    }

    /// Rebuilds a move from its packed form, as stored in the hash table.
    pub const fn from_u16(data: u16) -> Option<Self> {
        match NonZeroU16::new(data) {
            Some(data) => Some(Self { data }),
            None => None,
        }
    }

    pub const fn from(self) -> Square {
        #[allow(clippy::cast_possible_truncation)]
        match Square::new((self.data.get() & Self::SQ_MASK) as u8) {
            Some(sq) => sq,
            None => unreachable!(),
        }
    }

    pub const fn to(self) -> Square {
        #[allow(clippy::cast_possible_truncation)]
        match Square::new((self.data.get() >> Self::TO_SHIFT & Self::SQ_MASK) as u8) {
            Some(sq) => sq,
            None => unreachable!(),
        }
    }

    const fn flags(self) -> u16 {
        self.data.get() & Self::FLAG_MASK
    }

    pub const fn is_promo(self) -> bool {
        self.flags() == MoveFlags::Promotion as u16
    }

    pub const fn is_ep(self) -> bool {
        self.flags() == MoveFlags::EnPassant as u16
    }

    pub const fn is_castle(self) -> bool {
        self.flags() == MoveFlags::Castle as u16
    }

    /// Promotions, en passant, and castling.
    pub const fn is_special(self) -> bool {
        self.flags() != 0
    }

    pub const fn is_null(self) -> bool {
        self.data.get() == Self::NULL.data.get()
    }

    pub const fn promotion_type(self) -> Option<PieceType> {
        if !self.is_promo() {
            return None;
        }
        #[allow(clippy::cast_possible_truncation)]
        PieceType::new((self.data.get() >> Self::PROMO_SHIFT & 0b11) as u8 + PieceType::Knight as u8)
    }
}

impl Display for Move {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.is_null() {
            return write!(f, "0000");
        }
        write!(f, "{}{}", self.from(), self.to())?;
        if let Some(c) = self.promotion_type().and_then(PieceType::promo_char) {
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl Debug for Move {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Move({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_move_fields() {
        let m = Move::new(Square::E2, Square::E4);
        assert_eq!(m.from(), Square::E2);
        assert_eq!(m.to(), Square::E4);
        assert!(!m.is_special());
        assert_eq!(m.promotion_type(), None);
        assert_eq!(m.to_string(), "e2e4");
        assert_eq!(Move::from_u16(m.inner()), Some(m));
    }

    #[test]
    fn special_move_fields() {
        let promo = Move::new_with_promo(Square::A7, Square::A8, PieceType::Queen);
        assert!(promo.is_promo());
        assert_eq!(promo.promotion_type(), Some(PieceType::Queen));
        assert_eq!(promo.to_string(), "a7a8q");
        let under = Move::new_with_promo(Square::H2, Square::H1, PieceType::Knight);
        assert_eq!(under.promotion_type(), Some(PieceType::Knight));
        let ep = Move::new_with_flags(Square::E5, Square::D6, MoveFlags::EnPassant);
        assert!(ep.is_ep() && !ep.is_castle() && !ep.is_promo());
        let castle = Move::new_with_flags(Square::E1, Square::G1, MoveFlags::Castle);
        assert!(castle.is_castle() && castle.is_special());
    }

    #[test]
    fn null_move_is_distinct() {
        assert!(Move::NULL.is_null());
        assert_eq!(Move::NULL.to_string(), "0000");
        assert!(!Move::new(Square::B1, Square::C3).is_null());
        assert_eq!(Move::from_u16(0), None);
    }
}
