//! Static evaluation. Scores are from the side to move's point of view,
//! in the same units as the material values in `util`.

pub mod pst;
pub mod score;

use score::S;

use crate::{
    chess::{
        attacks::{attacks_by_type, king_attacks, pawn_attacks_by},
        board::Board,
        piece::{Colour, PieceType},
        squareset::SquareSet,
        types::{File, Rank},
    },
    evaluation::pst::pst_value,
    util::{BISHOP_VALUE_MG, PIECE_VALUE_EG, PIECE_VALUE_MG},
};

/// The hand-tuned terms below are in centipawns; engine units are about twice that.
const TERM_SCALE: i32 = 2;

/// The malus applied when a pawn has no pawns of its own colour on adjacent files.
pub const ISOLATED_PAWN_MALUS: S = S(26, 22);
/// The malus applied for each extra pawn of a colour on the same file.
pub const DOUBLED_PAWN_MALUS: S = S(29, 9);
pub const BISHOP_PAIR_BONUS: S = S(43, 74);
pub const ROOK_OPEN_FILE_BONUS: S = S(51, 0);
pub const ROOK_HALF_OPEN_FILE_BONUS: S = S(31, 0);
pub const QUEEN_OPEN_FILE_BONUS: S = S(-1, 0);
pub const QUEEN_HALF_OPEN_FILE_BONUS: S = S(7, 0);

#[rustfmt::skip]
const KNIGHT_MOBILITY_BONUS: [S; 9] = [S(-103, -120), S(-37, -26), S(3, -24), S(13, 24), S(1, 48), S(-8, 54), S(9, 57), S(25, 62), S(38, 65)];
#[rustfmt::skip]
const BISHOP_MOBILITY_BONUS: [S; 14] = [S(-59, -100), S(-37, -16), S(-3, -45), S(7, 9), S(24, 22), S(36, 35), S(47, 53), S(56, 66), S(62, 73), S(69, 71), S(75, 72), S(89, 50), S(117, 82), S(71, 57)];
#[rustfmt::skip]
const ROOK_MOBILITY_BONUS: [S; 15] = [S(-101, -123), S(-65, -56), S(0, 13), S(-12, 32), S(-9, 97), S(-1, 90), S(6, 106), S(9, 121), S(14, 127), S(25, 135), S(33, 144), S(49, 149), S(55, 152), S(64, 148), S(39, 180)];
#[rustfmt::skip]
const QUEEN_MOBILITY_BONUS: [S; 28] = [S(-29, -49), S(-16, -29), S(-49, -49), S(20, 20), S(8, 0), S(48, 16), S(47, 73), S(49, 39), S(46, 78), S(49, 118), S(54, 113), S(65, 117), S(74, 125), S(84, 126), S(84, 150), S(87, 159), S(92, 165), S(85, 163), S(90, 173), S(95, 158), S(101, 153), S(114, 145), S(111, 150), S(121, 144), S(139, 145), S(87, 144), S(111, 150), S(84, 180)];

/// Passed pawn bonus by relative rank, second through seventh.
pub static PASSED_PAWN_BONUS: [S; 6] = [S(-11, 18), S(-7, 34), S(-2, 60), S(36, 76), S(101, 101), S(113, 134)];

#[rustfmt::skip]
static KING_DANGER_VALUES: [i32; 100] = [
      0,   0,   1,   2,   3,   5,   7,   9,  12,  15,
     18,  22,  26,  30,  35,  39,  44,  50,  56,  62,
     68,  75,  82,  85,  89,  97, 105, 113, 122, 131,
    140, 150, 169, 180, 191, 202, 213, 225, 237, 248,
    260, 272, 283, 295, 307, 319, 330, 342, 354, 366,
    377, 389, 401, 412, 424, 436, 448, 459, 471, 483,
    494, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
];

const PAWN_PHASE: i32 = 1;
const KNIGHT_PHASE: i32 = 10;
const BISHOP_PHASE: i32 = 10;
const ROOK_PHASE: i32 = 20;
const QUEEN_PHASE: i32 = 40;
const TOTAL_PHASE: i32 = 16 * PAWN_PHASE + 4 * KNIGHT_PHASE + 4 * BISHOP_PHASE + 4 * ROOK_PHASE + 2 * QUEEN_PHASE;

/// The output of the evaluator: a score and the uncertainty attached to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Evaluation {
    pub value: i32,
    /// How much the king-safety part of `value` could be off by, always non-negative.
    /// Pruning decisions add this to the static value before comparing with bounds.
    pub margin: i32,
}

#[derive(Clone, Copy, Debug, Default)]
struct PawnEntry {
    key: u64,
    score: S,
}

/// Per-worker cache of pawn-structure scores, keyed by the pawn-only hash.
pub struct PawnCache {
    entries: Vec<PawnEntry>,
}

impl PawnCache {
    const DEFAULT_SIZE: usize = 1 << 14;

    pub fn new() -> Self {
        Self::with_size(Self::DEFAULT_SIZE)
    }

    pub fn with_size(size: usize) -> Self {
        Self { entries: vec![PawnEntry::default(); size.next_power_of_two()] }
    }

    fn probe(&mut self, pos: &Board) -> S {
        let key = pos.pawn_key();
        #[allow(clippy::cast_possible_truncation)]
        let idx = key as usize & (self.entries.len() - 1);
        let entry = &mut self.entries[idx];
        // a zero key with a zero score is indistinguishable from an empty slot,
        // which is harmless because recomputation gives the same answer.
        if entry.key != key || key == 0 {
            *entry = PawnEntry { key, score: pawn_structure_term(pos) };
        }
        entry.score
    }
}

impl Default for PawnCache {
    fn default() -> Self {
        Self::new()
    }
}

/// `phase` runs from 0 in the opening to 256 when only kings remain.
pub fn game_phase(pos: &Board) -> i32 {
    #![allow(clippy::cast_possible_wrap)]
    let count = |pt| pos.pieces(pt).count() as i32;
    let phase = TOTAL_PHASE
        - PAWN_PHASE * count(PieceType::Pawn)
        - KNIGHT_PHASE * count(PieceType::Knight)
        - BISHOP_PHASE * count(PieceType::Bishop)
        - ROOK_PHASE * count(PieceType::Rook)
        - QUEEN_PHASE * count(PieceType::Queen);
    phase.max(0)
}

/// Computes a score for the position from the side to move's point of view,
/// along with the margin of its king-safety component.
pub fn evaluate(pos: &Board, pawn_cache: &mut PawnCache) -> Evaluation {
    let mut score = material_and_placement(pos);
    score += pawn_cache.probe(pos) * TERM_SCALE;
    score += bishop_pair_term(pos) * TERM_SCALE;
    score += open_file_terms(pos) * TERM_SCALE;
    let (mobility, danger) = mobility_and_king_danger(pos);
    score += mobility * TERM_SCALE;

    // king danger is part of the score, and the side to move's exposure is its uncertainty.
    #[allow(clippy::cast_sign_loss)]
    let danger_on = |side: Colour| KING_DANGER_VALUES[danger[side].clamp(0, 99) as usize] * TERM_SCALE;
    let relative_danger = danger_on(Colour::Black) - danger_on(Colour::White);
    score += S(relative_danger, relative_danger / 2);

    let mut value = score.value(game_phase(pos));
    if (value > 0 && unwinnable_for(pos, Colour::White)) || (value < 0 && unwinnable_for(pos, Colour::Black)) {
        value = 0;
    }

    let us = pos.turn();
    Evaluation { value: value * us.sign(), margin: danger_on(us) }
}

/// Without pawns, a lone minor piece cannot force mate.
fn unwinnable_for(pos: &Board, side: Colour) -> bool {
    pos.pieces_of(side, PieceType::Pawn).is_empty() && pos.non_pawn_material(side) <= BISHOP_VALUE_MG
}

fn material_and_placement(pos: &Board) -> S {
    let mut score = S::NULL;
    for sq in pos.occupied() {
        let Some(piece) = pos.piece_at(sq) else {
            continue;
        };
        let pt = piece.piece_type();
        let material = S(PIECE_VALUE_MG[pt], PIECE_VALUE_EG[pt]);
        let placement = pst_value(piece, sq) * TERM_SCALE;
        match piece.colour() {
            Colour::White => score += material + placement,
            // black tables are already negated.
            Colour::Black => score += placement - material,
        }
    }
    score
}

fn file_set(file: File) -> SquareSet {
    SquareSet::file(file.index())
}

fn pawn_structure_term(pos: &Board) -> S {
    let mut score = S::NULL;
    for side in Colour::all() {
        let ours = pos.pieces_of(side, PieceType::Pawn);
        let mut side_score = S::NULL;
        for sq in ours {
            let file = file_set(sq.file());
            let neighbours = file.east_one() | file.west_one();
            if (neighbours & ours).is_empty() {
                side_score -= ISOLATED_PAWN_MALUS;
            }
            if pos.pawn_is_passed(side, sq) {
                let rank = sq.rank().relative_to(side);
                if rank != Rank::One && rank != Rank::Eight {
                    side_score += PASSED_PAWN_BONUS[rank.index() - 1];
                }
            }
        }
        for file in File::all() {
            #[allow(clippy::cast_possible_wrap)]
            let on_file = (file_set(file) & ours).count() as i32;
            if on_file > 1 {
                side_score -= DOUBLED_PAWN_MALUS * (on_file - 1);
            }
        }
        score += side_score * side.sign();
    }
    score
}

fn bishop_pair_term(pos: &Board) -> S {
    let white = pos.pieces_of(Colour::White, PieceType::Bishop).count();
    let black = pos.pieces_of(Colour::Black, PieceType::Bishop).count();
    match (white >= 2, black >= 2) {
        (true, false) => BISHOP_PAIR_BONUS,
        (false, true) => -BISHOP_PAIR_BONUS,
        _ => S::NULL,
    }
}

fn open_file_terms(pos: &Board) -> S {
    let all_pawns = pos.pieces(PieceType::Pawn);
    let mut score = S::NULL;
    for side in Colour::all() {
        let own_pawns = pos.pieces_of(side, PieceType::Pawn);
        for (pt, open, half_open) in [
            (PieceType::Rook, ROOK_OPEN_FILE_BONUS, ROOK_HALF_OPEN_FILE_BONUS),
            (PieceType::Queen, QUEEN_OPEN_FILE_BONUS, QUEEN_HALF_OPEN_FILE_BONUS),
        ] {
            for sq in pos.pieces_of(side, pt) {
                let file = file_set(sq.file());
                if (file & all_pawns).is_empty() {
                    score += open * side.sign();
                } else if (file & own_pawns).is_empty() {
                    score += half_open * side.sign();
                }
            }
        }
    }
    score
}

fn king_area(pos: &Board, side: Colour) -> SquareSet {
    let ring = king_attacks(pos.king_sq(side));
    ring | ring.forward(side)
}

/// Mobility (white-relative) and the attack units aimed at each king.
fn mobility_and_king_danger(pos: &Board) -> (S, [i32; 2]) {
    #![allow(clippy::cast_possible_wrap)]
    let occupied = pos.occupied();
    let mut mobility = S::NULL;
    let mut units = [0i32; 2];
    let mut attackers = [0i32; 2];
    let areas = [king_area(pos, Colour::White), king_area(pos, Colour::Black)];

    for side in Colour::all() {
        let them = !side;
        let safe = !pawn_attacks_by(pos.pieces_of(them, PieceType::Pawn), them);
        for (pt, attack_weight, defence_weight) in [
            (PieceType::Knight, 2, 1),
            (PieceType::Bishop, 2, 1),
            (PieceType::Rook, 3, 1),
            (PieceType::Queen, 5, 2),
        ] {
            for sq in pos.pieces_of(side, pt) {
                let attacks = attacks_by_type(pt, sq, occupied);
                let on_enemy_king = attacks & areas[them];
                attackers[them] += i32::from(on_enemy_king.non_empty());
                units[them] += on_enemy_king.count() as i32 * attack_weight;
                units[side] -= (attacks & areas[side]).count() as i32 * defence_weight;
                let moves = (attacks & safe).count() as usize;
                let bonus = match pt {
                    PieceType::Knight => KNIGHT_MOBILITY_BONUS[moves],
                    PieceType::Bishop => BISHOP_MOBILITY_BONUS[moves],
                    PieceType::Rook => ROOK_MOBILITY_BONUS[moves],
                    _ => QUEEN_MOBILITY_BONUS[moves],
                };
                mobility += bonus * side.sign();
            }
        }
    }
    // a single attacker is not an attack.
    for side in Colour::all() {
        if attackers[side] < 2 {
            units[side] = 0;
        }
    }
    (mobility, units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess::board::STARTING_FEN;

    fn eval(fen: &str) -> Evaluation {
        evaluate(&Board::from_fen(fen).unwrap(), &mut PawnCache::with_size(64))
    }

    #[test]
    fn startpos_is_balanced() {
        assert_eq!(eval(STARTING_FEN).value, 0);
        let black = STARTING_FEN.replace(" w ", " b ");
        assert_eq!(eval(&black).value, 0);
    }

    #[test]
    fn evaluation_is_side_relative() {
        let fen = "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3";
        let white = eval(fen).value;
        let black = eval(&fen.replace(" w ", " b ")).value;
        assert_eq!(white, -black);
    }

    #[test]
    fn extra_material_is_good() {
        assert!(eval("4k3/8/8/8/8/8/8/3QK3 w - - 0 1").value > 2000);
        assert!(eval("4k3/8/8/8/8/8/8/3QK3 b - - 0 1").value < -2000);
    }

    #[test]
    fn unwinnable_material_is_drawn() {
        assert_eq!(eval("8/8/8/8/2K2k2/2n2P2/8/8 b - - 1 1").value, 0);
    }

    #[test]
    fn passers_should_be_pushed() {
        let starting_rank = eval("8/k7/8/8/8/8/K6P/8 w - - 0 1").value;
        let end_rank = eval("8/k6P/8/8/8/8/K7/8 w - - 0 1").value;
        assert!(end_rank > starting_rank, "{end_rank} <= {starting_rank}");
    }

    #[test]
    fn doubled_pawns_are_penalised() {
        let pos = Board::from_fen("rnbqkbnr/pppppppp/8/8/8/5P2/PPPP1PPP/RNBQKBNR w KQkq - 0 1").unwrap();
        assert_eq!(pawn_structure_term(&pos), -DOUBLED_PAWN_MALUS);
    }

    #[test]
    fn margin_reflects_king_exposure() {
        assert_eq!(eval(STARTING_FEN).margin, 0);
        // queen and rook bearing down on the white king.
        let exposed = eval("4k3/8/8/8/8/5q2/5r2/6K1 w - - 0 1");
        assert!(exposed.margin > 0);
        assert_eq!(eval("4k3/8/8/8/8/5q2/5r2/6K1 b - - 0 1").margin, 0);
    }

    #[test]
    fn pawn_cache_is_transparent() {
        let pos = Board::from_fen("4k3/pp3p2/8/3P4/8/8/PP4P1/4K3 w - - 0 1").unwrap();
        let mut cache = PawnCache::with_size(16);
        let first = evaluate(&pos, &mut cache);
        let second = evaluate(&pos, &mut cache);
        assert_eq!(first, second);
        assert_eq!(evaluate(&pos, &mut PawnCache::with_size(16)), first);
    }
}
