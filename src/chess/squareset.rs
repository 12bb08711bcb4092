use std::{
    fmt::Display,
    ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign, Not, Sub},
};

use crate::chess::{piece::Colour, types::Square};

/// A set of squares, with support for very fast set operations and in-order iteration.
/// Most chess engines call this type `Bitboard`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct SquareSet {
    inner: u64,
}

impl SquareSet {
    pub const EMPTY: Self = Self { inner: 0 };

    pub const RANK_1: Self = Self::from_inner(0x0000_0000_0000_00FF);
    pub const RANK_2: Self = Self::from_inner(0x0000_0000_0000_FF00);
    pub const RANK_7: Self = Self::from_inner(0x00FF_0000_0000_0000);
    pub const FILE_A: Self = Self::from_inner(0x0101_0101_0101_0101);
    pub const FILE_H: Self = Self::from_inner(0x8080_8080_8080_8080);

    pub const fn from_inner(inner: u64) -> Self {
        Self { inner }
    }

    pub const fn inner(self) -> u64 {
        self.inner
    }

    pub const fn file(index: usize) -> Self {
        Self::from_inner(Self::FILE_A.inner << index)
    }

    pub const fn rank(index: usize) -> Self {
        Self::from_inner(Self::RANK_1.inner << (8 * index))
    }

    pub const fn count(self) -> u32 {
        self.inner.count_ones()
    }

    pub const fn is_empty(self) -> bool {
        self.inner == 0
    }

    pub const fn non_empty(self) -> bool {
        self.inner != 0
    }

    pub const fn contains_square(self, square: Square) -> bool {
        (self.inner & (1 << square.index())) != 0
    }

    pub const fn add_square(self, square: Square) -> Self {
        Self::from_inner(self.inner | (1 << square.index()))
    }

    pub const fn remove_square(self, square: Square) -> Self {
        Self::from_inner(self.inner & !(1 << square.index()))
    }

    pub const fn first(self) -> Option<Square> {
        if self.inner == 0 {
            return None;
        }
        #[allow(clippy::cast_possible_truncation)]
        Square::new(self.inner.trailing_zeros() as u8)
    }

    /// More than one square is set.
    pub const fn many(self) -> bool {
        self.inner & self.inner.wrapping_sub(1) != 0
    }

    pub const fn one(self) -> bool {
        self.inner != 0 && !self.many()
    }

    pub const fn north_one(self) -> Self {
        Self::from_inner(self.inner << 8)
    }

    pub const fn south_one(self) -> Self {
        Self::from_inner(self.inner >> 8)
    }

    pub const fn east_one(self) -> Self {
        Self::from_inner((self.inner << 1) & !Self::FILE_A.inner)
    }

    pub const fn west_one(self) -> Self {
        Self::from_inner((self.inner >> 1) & !Self::FILE_H.inner)
    }

    /// Shift one rank towards `side`'s promotion rank.
    pub const fn forward(self, side: Colour) -> Self {
        match side {
            Colour::White => self.north_one(),
            Colour::Black => self.south_one(),
        }
    }

    /// All squares strictly in front of `self`, from `side`'s point of view.
    pub const fn front_span(self, side: Colour) -> Self {
        let mut bb = self.inner;
        match side {
            Colour::White => {
                bb |= bb << 8;
                bb |= bb << 16;
                bb |= bb << 32;
                Self::from_inner(bb << 8)
            }
            Colour::Black => {
                bb |= bb >> 8;
                bb |= bb >> 16;
                bb |= bb >> 32;
                Self::from_inner(bb >> 8)
            }
        }
    }

    pub fn iter(self) -> SquareIter {
        SquareIter { value: self.inner }
    }
}

pub struct SquareIter {
    value: u64,
}

impl Iterator for SquareIter {
    type Item = Square;

    fn next(&mut self) -> Option<Self::Item> {
        if self.value == 0 {
            return None;
        }
        #[allow(clippy::cast_possible_truncation)]
        let sq = Square::new(self.value.trailing_zeros() as u8);
        self.value &= self.value - 1;
        sq
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.value.count_ones() as usize;
        (n, Some(n))
    }
}

impl IntoIterator for SquareSet {
    type Item = Square;
    type IntoIter = SquareIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl BitOr for SquareSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::from_inner(self.inner | rhs.inner)
    }
}

impl BitOrAssign for SquareSet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.inner |= rhs.inner;
    }
}

impl BitAnd for SquareSet {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self::from_inner(self.inner & rhs.inner)
    }
}

impl BitAndAssign for SquareSet {
    fn bitand_assign(&mut self, rhs: Self) {
        self.inner &= rhs.inner;
    }
}

impl BitXor for SquareSet {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self::Output {
        Self::from_inner(self.inner ^ rhs.inner)
    }
}

impl BitXorAssign for SquareSet {
    fn bitxor_assign(&mut self, rhs: Self) {
        self.inner ^= rhs.inner;
    }
}

impl Sub for SquareSet {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::from_inner(self.inner & !rhs.inner)
    }
}

impl Not for SquareSet {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self::from_inner(!self.inner)
    }
}

impl Display for SquareSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for rank in (0..8).rev() {
            for file in 0..8 {
                let bit = 1u64 << (rank * 8 + file);
                let c = if self.inner & bit == 0 { '.' } else { 'X' };
                write!(f, "{c}")?;
                if file < 7 {
                    write!(f, " ")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_is_in_square_order() {
        let set = Square::E4.as_set() | Square::A1.as_set() | Square::H8.as_set();
        let squares = set.iter().collect::<Vec<_>>();
        assert_eq!(squares, [Square::A1, Square::E4, Square::H8]);
        assert_eq!(set.count(), 3);
        assert!(set.many());
        assert!(Square::C3.as_set().one());
    }

    #[test]
    fn shifts_do_not_wrap_files() {
        assert_eq!(Square::H4.as_set().east_one(), SquareSet::EMPTY);
        assert_eq!(Square::A4.as_set().west_one(), SquareSet::EMPTY);
        assert_eq!(Square::E4.as_set().forward(Colour::Black), Square::E3.as_set());
    }

    #[test]
    fn front_spans() {
        let span = Square::D6.as_set().front_span(Colour::White);
        assert_eq!(span, Square::D7.as_set() | Square::D8.as_set());
        let span = Square::D2.as_set().front_span(Colour::Black);
        assert_eq!(span, Square::D1.as_set());
    }
}
