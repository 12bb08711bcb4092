//! Attack tables: precomputed leaper attacks, classical ray-based slider attacks,
//! and the between/line tables used for pins and check evasion.

use crate::chess::{
    piece::{Colour, PieceType},
    squareset::SquareSet,
    types::Square,
};

/// (file delta, rank delta) for the eight ray directions.
/// Indices 0..4 run towards higher squares, 4..8 towards lower squares.
const DIRECTIONS: [(i8, i8); 8] = [
    (0, 1),   // N
    (1, 1),   // NE
    (1, 0),   // E
    (-1, 1),  // NW
    (0, -1),  // S
    (-1, -1), // SW
    (-1, 0),  // W
    (1, -1),  // SE
];

const fn offset_square(sq: usize, df: i8, dr: i8) -> Option<usize> {
    #![allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    let file = (sq % 8) as i8 + df;
    let rank = (sq / 8) as i8 + dr;
    if file < 0 || file > 7 || rank < 0 || rank > 7 {
        None
    } else {
        Some((rank * 8 + file) as usize)
    }
}

const fn leaper_table(deltas: &[(i8, i8)]) -> [SquareSet; 64] {
    let mut table = [SquareSet::EMPTY; 64];
    cfor!(let mut sq = 0; sq < 64; sq += 1; {
        let mut bb = 0u64;
        cfor!(let mut i = 0; i < deltas.len(); i += 1; {
            if let Some(to) = offset_square(sq, deltas[i].0, deltas[i].1) {
                bb |= 1 << to;
            }
        });
        table[sq] = SquareSet::from_inner(bb);
    });
    table
}

static KNIGHT_ATTACKS: [SquareSet; 64] = leaper_table(&[
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
]);

static KING_ATTACKS: [SquareSet; 64] = leaper_table(&[
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
]);

static PAWN_ATTACKS: [[SquareSet; 64]; 2] = [
    leaper_table(&[(-1, 1), (1, 1)]),
    leaper_table(&[(-1, -1), (1, -1)]),
];

/// `RAYS[dir][sq]` holds every square in direction `dir` from `sq`, excluding `sq`.
static RAYS: [[SquareSet; 64]; 8] = {
    let mut rays = [[SquareSet::EMPTY; 64]; 8];
    cfor!(let mut dir = 0; dir < 8; dir += 1; {
        cfor!(let mut sq = 0; sq < 64; sq += 1; {
            let mut bb = 0u64;
            let mut cur = sq;
            while let Some(next) = offset_square(cur, DIRECTIONS[dir].0, DIRECTIONS[dir].1) {
                bb |= 1 << next;
                cur = next;
            }
            rays[dir][sq] = SquareSet::from_inner(bb);
        });
    });
    rays
};

/// Squares strictly between two squares on a shared line, or empty.
pub static RAY_BETWEEN: [[SquareSet; 64]; 64] = {
    let mut res = [[SquareSet::EMPTY; 64]; 64];
    cfor!(let mut dir = 0; dir < 8; dir += 1; {
        cfor!(let mut from = 0; from < 64; from += 1; {
            let mut bb = 0u64;
            let mut cur = from;
            while let Some(next) = offset_square(cur, DIRECTIONS[dir].0, DIRECTIONS[dir].1) {
                res[from][next] = SquareSet::from_inner(bb);
                bb |= 1 << next;
                cur = next;
            }
        });
    });
    res
};

/// The full line through two aligned squares (edge to edge), or empty.
pub static RAY_FULL: [[SquareSet; 64]; 64] = {
    let mut res = [[SquareSet::EMPTY; 64]; 64];
    cfor!(let mut dir = 0; dir < 4; dir += 1; {
        cfor!(let mut from = 0; from < 64; from += 1; {
            let line = RAYS[dir][from].inner() | RAYS[dir + 4][from].inner() | 1 << from;
            let mut cur = from;
            while let Some(next) = offset_square(cur, DIRECTIONS[dir].0, DIRECTIONS[dir].1) {
                res[from][next] = SquareSet::from_inner(line);
                res[next][from] = SquareSet::from_inner(line);
                cur = next;
            }
        });
    });
    res
};

fn ray_attacks(sq: Square, occupied: SquareSet, dir: usize) -> SquareSet {
    let ray = RAYS[dir][sq];
    let blockers = ray & occupied;
    if blockers.is_empty() {
        return ray;
    }
    // positive directions find the nearest blocker in the low bits, negative in the high bits.
    let nearest = if dir < 4 {
        blockers.inner().trailing_zeros()
    } else {
        63 - blockers.inner().leading_zeros()
    };
    #[allow(clippy::cast_possible_truncation)]
    match Square::new(nearest as u8) {
        Some(blocker) => ray - RAYS[dir][blocker],
        None => ray,
    }
}

pub fn bishop_attacks(sq: Square, occupied: SquareSet) -> SquareSet {
    ray_attacks(sq, occupied, 1)
        | ray_attacks(sq, occupied, 3)
        | ray_attacks(sq, occupied, 5)
        | ray_attacks(sq, occupied, 7)
}

pub fn rook_attacks(sq: Square, occupied: SquareSet) -> SquareSet {
    ray_attacks(sq, occupied, 0)
        | ray_attacks(sq, occupied, 2)
        | ray_attacks(sq, occupied, 4)
        | ray_attacks(sq, occupied, 6)
}

pub fn queen_attacks(sq: Square, occupied: SquareSet) -> SquareSet {
    bishop_attacks(sq, occupied) | rook_attacks(sq, occupied)
}

pub fn knight_attacks(sq: Square) -> SquareSet {
    KNIGHT_ATTACKS[sq]
}

pub fn king_attacks(sq: Square) -> SquareSet {
    KING_ATTACKS[sq]
}

/// Squares attacked by a pawn of colour `side` standing on `sq`.
pub fn pawn_attacks(sq: Square, side: Colour) -> SquareSet {
    PAWN_ATTACKS[side][sq]
}

/// Squares attacked by every pawn in `pawns`, all of colour `side`.
pub const fn pawn_attacks_by(pawns: SquareSet, side: Colour) -> SquareSet {
    let fwd = pawns.forward(side);
    SquareSet::from_inner(fwd.east_one().inner() | fwd.west_one().inner())
}

/// Attacks of a non-pawn piece type from `sq` given an occupancy.
pub fn attacks_by_type(pt: PieceType, sq: Square, occupied: SquareSet) -> SquareSet {
    match pt {
        PieceType::Bishop => bishop_attacks(sq, occupied),
        PieceType::Rook => rook_attacks(sq, occupied),
        PieceType::Queen => queen_attacks(sq, occupied),
        PieceType::Knight => knight_attacks(sq),
        PieceType::King => king_attacks(sq),
        PieceType::Pawn => panic!("pawn attacks depend on colour; use pawn_attacks"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaper_counts() {
        assert_eq!(knight_attacks(Square::A1).count(), 2);
        assert_eq!(knight_attacks(Square::D4).count(), 8);
        assert_eq!(king_attacks(Square::H8).count(), 3);
        assert_eq!(pawn_attacks(Square::E4, Colour::White), Square::D5.as_set() | Square::F5.as_set());
        assert_eq!(pawn_attacks(Square::A7, Colour::Black), Square::B6.as_set());
    }

    #[test]
    fn sliders_stop_at_blockers() {
        let occ = Square::D6.as_set() | Square::F4.as_set();
        let rook = rook_attacks(Square::D4, occ);
        assert!(rook.contains_square(Square::D6));
        assert!(!rook.contains_square(Square::D7));
        assert!(rook.contains_square(Square::F4));
        assert!(!rook.contains_square(Square::G4));
        assert!(rook.contains_square(Square::A4));
        assert_eq!(bishop_attacks(Square::A1, SquareSet::EMPTY).count(), 7);
        assert_eq!(queen_attacks(Square::D4, SquareSet::EMPTY).count(), 27);
    }

    #[test]
    fn between_and_line_tables() {
        assert_eq!(RAY_BETWEEN[Square::A1][Square::D1], Square::B1.as_set() | Square::C1.as_set());
        assert_eq!(RAY_BETWEEN[Square::B5][Square::E8], Square::C6.as_set() | Square::D7.as_set());
        assert_eq!(RAY_BETWEEN[Square::A1][Square::B3], SquareSet::EMPTY);
        for from in Square::all() {
            for to in Square::all() {
                assert_eq!(RAY_BETWEEN[from][to], RAY_BETWEEN[to][from]);
            }
        }
        assert_eq!(RAY_FULL[Square::C3][Square::E5].count(), 8);
        assert!(RAY_FULL[Square::C3][Square::E5].contains_square(Square::H8));
        assert_eq!(RAY_FULL[Square::A1][Square::B3], SquareSet::EMPTY);
    }
}
