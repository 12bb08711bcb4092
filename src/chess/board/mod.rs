pub mod movegen;
pub mod see;

use std::fmt::{self, Debug, Display, Formatter, Write};

use crate::{
    chess::{
        attacks::{
            RAY_BETWEEN, RAY_FULL, attacks_by_type, bishop_attacks, king_attacks, knight_attacks, pawn_attacks,
            rook_attacks,
        },
        board::movegen::{GenKind, MoveList},
        chessmove::Move,
        fen::Fen,
        piece::{Colour, Piece, PieceType},
        squareset::SquareSet,
        types::{CastlingRights, Rank, Square},
        zobrist::KEYS,
    },
    errors::{FenParseError, MoveParseError},
    util::{BISHOP_VALUE_MG, mg_value},
};

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Everything that make/unmake cannot cheaply recompute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct State {
    castling: CastlingRights,
    ep: Option<Square>,
    fifty: u8,
    plies_from_null: u16,
    key: u64,
    pawn_key: u64,
    checkers: SquareSet,
    captured: Option<PieceType>,
}

impl State {
    const EMPTY: Self = Self {
        castling: CastlingRights::NONE,
        ep: None,
        fifty: 0,
        plies_from_null: 0,
        key: 0,
        pawn_key: 0,
        checkers: SquareSet::EMPTY,
        captured: None,
    };
}

/// Precomputed information for fast `gives_check` queries on one position.
#[derive(Clone, Copy, Debug)]
pub struct CheckInfo {
    /// The enemy king.
    pub ksq: Square,
    /// Our pieces pinned to our own king.
    pub pinned: SquareSet,
    /// Our pieces whose departure uncovers a check on the enemy king.
    pub dc_candidates: SquareSet,
    /// Squares from which each of our piece types would attack the enemy king.
    pub check_squares: [SquareSet; 6],
}

#[derive(Clone, PartialEq, Eq)]
pub struct Board {
    pieces: [SquareSet; 6],
    colours: [SquareSet; 2],
    mailbox: [Option<Piece>; 64],
    /// Midgame value of non-pawn material per side.
    npm: [i32; 2],
    side: Colour,
    game_ply: usize,
    state: State,
    history: Vec<State>,
}

impl Debug for Board {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Board")
            .field("fen", &self.fen())
            .field("key", &format_args!("{:016X}", self.state.key))
            .field("history_len", &self.history.len())
            .finish()
    }
}

impl Board {
    pub fn new() -> Self {
        let mut out = Self {
            pieces: [SquareSet::EMPTY; 6],
            colours: [SquareSet::EMPTY; 2],
            mailbox: [None; 64],
            npm: [0; 2],
            side: Colour::White,
            game_ply: 0,
            state: State::EMPTY,
            history: Vec::new(),
        };
        out.set_startpos();
        out
    }

    pub fn from_fen(fen: &str) -> Result<Self, FenParseError> {
        let mut out = Self::new();
        out.set_from_fen(fen)?;
        Ok(out)
    }

    pub fn set_startpos(&mut self) {
        match Fen::parse(STARTING_FEN) {
            Ok(fen) => self.set_from_parsed(&fen),
            Err(_) => unreachable!("the starting position is valid"),
        }
    }

    pub fn set_from_fen(&mut self, fen: &str) -> Result<(), FenParseError> {
        let parsed = Fen::parse(fen)?;
        let mut candidate = self.clone();
        candidate.set_from_parsed(&parsed);
        let waiting_king = candidate.king_sq(!candidate.side);
        if candidate.sq_attacked(waiting_king, candidate.side) {
            return Err(FenParseError::WaitingInCheck);
        }
        *self = candidate;
        Ok(())
    }

    fn set_from_parsed(&mut self, fen: &Fen) {
        self.pieces = [SquareSet::EMPTY; 6];
        self.colours = [SquareSet::EMPTY; 2];
        self.mailbox = [None; 64];
        self.npm = [0; 2];
        self.history.clear();
        self.state = State::EMPTY;
        self.side = fen.turn;
        for sq in Square::all() {
            if let Some(piece) = fen.mailbox[sq] {
                self.add_piece(sq, piece);
            }
        }
        self.state.castling = fen.castling;
        self.state.key ^= KEYS.castling[fen.castling.index()];
        if self.side == Colour::Black {
            self.state.key ^= KEYS.side;
        }
        // only record an en passant square that can actually be captured on.
        if let Some(ep) = fen.ep.filter(|&ep| self.ep_capturable(ep, self.side)) {
            self.state.ep = Some(ep);
            self.state.key ^= KEYS.ep[ep.file()];
        }
        self.state.fifty = fen.halfmove;
        self.game_ply = 2 * (usize::from(fen.fullmove) - 1) + usize::from(self.side == Colour::Black);
        self.state.checkers = self.attackers_to(self.king_sq(self.side), self.occupied()) & self.colours[!self.side];
    }

    pub fn fen(&self) -> String {
        let mut out = String::with_capacity(90);
        for rank in Rank::all().rev() {
            let mut gap = 0;
            for sq in Square::all().filter(|sq| sq.rank() == rank) {
                match self.mailbox[sq] {
                    Some(piece) => {
                        if gap > 0 {
                            let _ = write!(out, "{gap}");
                            gap = 0;
                        }
                        out.push(piece.char());
                    }
                    None => gap += 1,
                }
            }
            if gap > 0 {
                let _ = write!(out, "{gap}");
            }
            if rank != Rank::One {
                out.push('/');
            }
        }
        let side = if self.side == Colour::White { 'w' } else { 'b' };
        let ep = self.state.ep.map_or_else(|| "-".to_string(), |sq| sq.to_string());
        let _ = write!(
            out,
            " {side} {} {ep} {} {}",
            self.state.castling,
            self.state.fifty,
            self.game_ply / 2 + 1
        );
        out
    }

    // ---- piece placement ----

    fn add_piece(&mut self, sq: Square, piece: Piece) {
        let (colour, pt) = (piece.colour(), piece.piece_type());
        self.pieces[pt] |= sq.as_set();
        self.colours[colour] |= sq.as_set();
        self.mailbox[sq] = Some(piece);
        self.state.key ^= KEYS.pieces[piece][sq];
        match pt {
            PieceType::Pawn => self.state.pawn_key ^= KEYS.pieces[piece][sq],
            PieceType::King => {}
            _ => self.npm[colour] += mg_value(pt),
        }
    }

    fn remove_piece(&mut self, sq: Square) -> Option<Piece> {
        let piece = self.mailbox[sq]?;
        let (colour, pt) = (piece.colour(), piece.piece_type());
        self.pieces[pt] ^= sq.as_set();
        self.colours[colour] ^= sq.as_set();
        self.mailbox[sq] = None;
        self.state.key ^= KEYS.pieces[piece][sq];
        match pt {
            PieceType::Pawn => self.state.pawn_key ^= KEYS.pieces[piece][sq],
            PieceType::King => {}
            _ => self.npm[colour] -= mg_value(pt),
        }
        Some(piece)
    }

    fn move_piece(&mut self, from: Square, to: Square) {
        if let Some(piece) = self.remove_piece(from) {
            self.add_piece(to, piece);
        }
    }

    // ---- queries ----

    pub const fn turn(&self) -> Colour {
        self.side
    }

    pub const fn key(&self) -> u64 {
        self.state.key
    }

    /// The key used while a move is excluded from the search of this position.
    pub const fn exclusion_key(&self) -> u64 {
        self.state.key ^ KEYS.exclusion
    }

    pub const fn pawn_key(&self) -> u64 {
        self.state.pawn_key
    }

    pub const fn ep_sq(&self) -> Option<Square> {
        self.state.ep
    }

    pub const fn castling_rights(&self) -> CastlingRights {
        self.state.castling
    }

    pub const fn game_ply(&self) -> usize {
        self.game_ply
    }

    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.mailbox[sq]
    }

    pub fn pieces(&self, pt: PieceType) -> SquareSet {
        self.pieces[pt]
    }

    pub fn colour(&self, side: Colour) -> SquareSet {
        self.colours[side]
    }

    pub fn pieces_of(&self, side: Colour, pt: PieceType) -> SquareSet {
        self.pieces[pt] & self.colours[side]
    }

    pub fn occupied(&self) -> SquareSet {
        self.colours[Colour::White] | self.colours[Colour::Black]
    }

    fn diagonal_sliders(&self) -> SquareSet {
        self.pieces[PieceType::Bishop] | self.pieces[PieceType::Queen]
    }

    fn orthogonal_sliders(&self) -> SquareSet {
        self.pieces[PieceType::Rook] | self.pieces[PieceType::Queen]
    }

    pub fn king_sq(&self, side: Colour) -> Square {
        match self.pieces_of(side, PieceType::King).first() {
            Some(sq) => sq,
            None => unreachable!("every legal position has both kings"),
        }
    }

    pub fn non_pawn_material(&self, side: Colour) -> i32 {
        self.npm[side]
    }

    pub const fn captured_piece_type(&self) -> Option<PieceType> {
        self.state.captured
    }

    pub const fn checkers(&self) -> SquareSet {
        self.state.checkers
    }

    pub const fn in_check(&self) -> bool {
        self.state.checkers.non_empty()
    }

    /// All pieces of either colour attacking `sq`, given an occupancy.
    pub fn attackers_to(&self, sq: Square, occupied: SquareSet) -> SquareSet {
        (pawn_attacks(sq, Colour::Black) & self.pieces_of(Colour::White, PieceType::Pawn))
            | (pawn_attacks(sq, Colour::White) & self.pieces_of(Colour::Black, PieceType::Pawn))
            | (knight_attacks(sq) & self.pieces[PieceType::Knight])
            | (king_attacks(sq) & self.pieces[PieceType::King])
            | (bishop_attacks(sq, occupied) & self.diagonal_sliders())
            | (rook_attacks(sq, occupied) & self.orthogonal_sliders())
    }

    pub fn sq_attacked(&self, sq: Square, by: Colour) -> bool {
        (self.attackers_to(sq, self.occupied()) & self.colours[by]).non_empty()
    }

    /// Squares attacked by the piece standing on `sq`.
    pub fn attacks_from(&self, piece: Piece, sq: Square, occupied: SquareSet) -> SquareSet {
        match piece.piece_type() {
            PieceType::Pawn => pawn_attacks(sq, piece.colour()),
            pt => attacks_by_type(pt, sq, occupied),
        }
    }

    /// Pieces of colour `blockers` that are the lone obstacle between `target`
    /// and a slider of colour `sliders`.
    fn slider_blockers(&self, target: Square, sliders: Colour, blockers: Colour) -> SquareSet {
        let snipers = ((rook_attacks(target, SquareSet::EMPTY) & self.orthogonal_sliders())
            | (bishop_attacks(target, SquareSet::EMPTY) & self.diagonal_sliders()))
            & self.colours[sliders];
        let occupied = self.occupied();
        let mut result = SquareSet::EMPTY;
        for sniper in snipers {
            let between = RAY_BETWEEN[target][sniper] & occupied;
            if between.one() {
                result |= between & self.colours[blockers];
            }
        }
        result
    }

    /// Pieces of the side to move that are pinned to their own king.
    pub fn pinned_pieces(&self) -> SquareSet {
        self.slider_blockers(self.king_sq(self.side), !self.side, self.side)
    }

    pub fn discovered_check_candidates(&self) -> SquareSet {
        self.slider_blockers(self.king_sq(!self.side), self.side, self.side)
    }

    pub fn check_info(&self) -> CheckInfo {
        let ksq = self.king_sq(!self.side);
        let occupied = self.occupied();
        let bishop = bishop_attacks(ksq, occupied);
        let rook = rook_attacks(ksq, occupied);
        CheckInfo {
            ksq,
            pinned: self.pinned_pieces(),
            dc_candidates: self.discovered_check_candidates(),
            check_squares: [
                pawn_attacks(ksq, !self.side),
                knight_attacks(ksq),
                bishop,
                rook,
                bishop | rook,
                SquareSet::EMPTY,
            ],
        }
    }

    pub fn is_capture(&self, m: Move) -> bool {
        self.mailbox[m.to()].is_some() || m.is_ep()
    }

    pub fn is_capture_or_promotion(&self, m: Move) -> bool {
        m.is_promo() || self.is_capture(m)
    }

    pub fn moved_piece(&self, m: Move) -> Option<Piece> {
        self.mailbox[m.from()]
    }

    /// The squares in front of a pawn on `sq` (own and adjacent files)
    /// that must hold no enemy pawn for it to be passed.
    pub fn passed_pawn_mask(side: Colour, sq: Square) -> SquareSet {
        let s = sq.as_set();
        (s | s.east_one() | s.west_one()).front_span(side)
    }

    pub fn pawn_is_passed(&self, side: Colour, sq: Square) -> bool {
        (self.pieces_of(!side, PieceType::Pawn) & Self::passed_pawn_mask(side, sq)).is_empty()
    }

    pub fn is_passed_pawn_push(&self, m: Move) -> bool {
        self.mailbox[m.from()].is_some_and(|p| p.piece_type() == PieceType::Pawn)
            && self.pawn_is_passed(self.side, m.to())
    }

    pub fn has_pawn_on_seventh(&self, side: Colour) -> bool {
        let seventh = match side {
            Colour::White => SquareSet::RANK_7,
            Colour::Black => SquareSet::RANK_2,
        };
        (self.pieces_of(side, PieceType::Pawn) & seventh).non_empty()
    }

    /// Whether the piece played by `m` attacks `sq` once the move is made,
    /// either directly or by uncovering a slider of its own colour.
    pub fn move_attacks_square(&self, m: Move, sq: Square) -> bool {
        let (from, to) = (m.from(), m.to());
        let Some(piece) = self.mailbox[from] else {
            return false;
        };
        let occupied = (self.occupied() - from.as_set()) | to.as_set();
        if self.attacks_from(piece, to, occupied).contains_square(sq) {
            return true;
        }
        let xray = ((rook_attacks(sq, occupied) & self.orthogonal_sliders())
            | (bishop_attacks(sq, occupied) & self.diagonal_sliders()))
            & self.colours[piece.colour()];
        let previously = attacks_by_type(PieceType::Queen, sq, self.occupied());
        (xray - previously).non_empty()
    }

    fn ep_capturable(&self, ep: Square, capturer: Colour) -> bool {
        (pawn_attacks(ep, !capturer) & self.pieces_of(capturer, PieceType::Pawn)).non_empty()
    }

    /// Rook origin and destination for a castling king move.
    const fn castling_rook_squares(king_to: Square) -> (Square, Square) {
        match king_to {
            Square::G1 => (Square::H1, Square::F1),
            Square::C1 => (Square::A1, Square::D1),
            Square::G8 => (Square::H8, Square::F8),
            _ => (Square::A8, Square::D8),
        }
    }

    fn ep_capture_square(&self, to: Square) -> Square {
        match to.pawn_push(!self.side) {
            Some(sq) => sq,
            None => unreachable!("en passant target squares are never on the edge ranks"),
        }
    }

    // ---- legality ----

    /// Cheap validation of moves that did not come from the generator
    /// (hash moves and killers). Pseudo-legal moves still need `is_legal`.
    pub fn is_pseudo_legal(&self, m: Move) -> bool {
        let (from, to) = (m.from(), m.to());
        let us = self.side;
        if m.is_null() {
            return false;
        }
        let Some(piece) = self.mailbox[from] else {
            return false;
        };
        if piece.colour() != us {
            return false;
        }
        if m.is_special() {
            let mut list = MoveList::new();
            self.generate_pseudo(&mut list, if self.in_check() { GenKind::Evasions } else { GenKind::All });
            return list.iter_moves().any(|&lm| lm == m);
        }
        if self.colours[us].contains_square(to) {
            return false;
        }
        let pt = piece.piece_type();
        if pt == PieceType::Pawn {
            if to.rank().relative_to(us) == Rank::Eight {
                return false;
            }
            let capture = (pawn_attacks(from, us) & self.colours[!us]).contains_square(to);
            let single = from.pawn_push(us);
            let push = single == Some(to) && self.mailbox[to].is_none();
            let double = from.rank().relative_to(us) == Rank::Two
                && single.is_some_and(|mid| self.mailbox[mid].is_none() && mid.pawn_push(us) == Some(to))
                && self.mailbox[to].is_none();
            if !(capture || push || double) {
                return false;
            }
        } else if !attacks_by_type(pt, from, self.occupied()).contains_square(to) {
            return false;
        }
        if self.in_check() && pt != PieceType::King {
            if self.state.checkers.many() {
                return false;
            }
            let Some(checker) = self.state.checkers.first() else {
                return false;
            };
            let target = RAY_BETWEEN[checker][self.king_sq(us)] | checker.as_set();
            if !target.contains_square(to) {
                return false;
            }
        }
        true
    }

    /// Full legality of a pseudo-legal move, given the pins of the side to move.
    pub fn is_legal(&self, m: Move, pinned: SquareSet) -> bool {
        let (from, to) = (m.from(), m.to());
        let us = self.side;
        let ksq = self.king_sq(us);
        if m.is_ep() {
            let capsq = self.ep_capture_square(to);
            let occupied = (self.occupied() - from.as_set() - capsq.as_set()) | to.as_set();
            let them = self.colours[!us];
            return (rook_attacks(ksq, occupied) & self.orthogonal_sliders() & them).is_empty()
                && (bishop_attacks(ksq, occupied) & self.diagonal_sliders() & them).is_empty();
        }
        if from == ksq {
            // castling paths are verified by the generator.
            return m.is_castle()
                || (self.attackers_to(to, self.occupied() - from.as_set()) & self.colours[!us]).is_empty();
        }
        !pinned.contains_square(from) || RAY_FULL[from][to].contains_square(ksq)
    }

    pub fn gives_check(&self, m: Move, ci: &CheckInfo) -> bool {
        let (from, to) = (m.from(), m.to());
        let Some(piece) = self.mailbox[from] else {
            return false;
        };
        let pt = piece.piece_type();
        if !m.is_promo() && ci.check_squares[pt].contains_square(to) {
            return true;
        }
        if ci.dc_candidates.contains_square(from) && !RAY_FULL[from][to].contains_square(ci.ksq) {
            return true;
        }
        if !m.is_special() {
            return false;
        }
        let us = self.side;
        let occupied = self.occupied() - from.as_set();
        if let Some(promo) = m.promotion_type() {
            return attacks_by_type(promo, to, occupied | to.as_set()).contains_square(ci.ksq);
        }
        if m.is_ep() {
            let capsq = self.ep_capture_square(to);
            let occupied = (occupied - capsq.as_set()) | to.as_set();
            let ours = self.colours[us];
            return (rook_attacks(ci.ksq, occupied) & self.orthogonal_sliders() & ours).non_empty()
                || (bishop_attacks(ci.ksq, occupied) & self.diagonal_sliders() & ours).non_empty();
        }
        // castling
        let (rook_from, rook_to) = Self::castling_rook_squares(to);
        let occupied = (occupied - rook_from.as_set()) | to.as_set() | rook_to.as_set();
        rook_attacks(rook_to, occupied).contains_square(ci.ksq)
    }

    // ---- make / unmake ----

    pub fn make_move(&mut self, m: Move) {
        let (from, to) = (m.from(), m.to());
        let us = self.side;
        let them = !us;
        debug_assert!(self.mailbox[from].is_some_and(|p| p.colour() == us), "no piece of ours on {from} in {self:?}");

        self.history.push(self.state);
        self.state.captured = None;
        self.state.fifty += 1;
        self.state.plies_from_null += 1;
        if let Some(ep) = self.state.ep.take() {
            self.state.key ^= KEYS.ep[ep.file()];
        }

        if m.is_castle() {
            let (rook_from, rook_to) = Self::castling_rook_squares(to);
            self.move_piece(from, to);
            self.move_piece(rook_from, rook_to);
        } else {
            let capsq = if m.is_ep() { self.ep_capture_square(to) } else { to };
            if let Some(captured) = self.remove_piece(capsq) {
                self.state.captured = Some(captured.piece_type());
                self.state.fifty = 0;
            }
            self.move_piece(from, to);
            if self.mailbox[to].is_some_and(|p| p.piece_type() == PieceType::Pawn) {
                self.state.fifty = 0;
                if let Some(promo) = m.promotion_type() {
                    self.remove_piece(to);
                    self.add_piece(to, Piece::new(us, promo));
                } else if from.rank().abs_diff(to.rank()) == 2 {
                    if let Some(ep) = from.pawn_push(us).filter(|&ep| self.ep_capturable(ep, them)) {
                        self.state.ep = Some(ep);
                        self.state.key ^= KEYS.ep[ep.file()];
                    }
                }
            }
        }

        let old_rights = self.state.castling;
        self.state.castling.update_for_square(from);
        self.state.castling.update_for_square(to);
        self.state.key ^= KEYS.castling[old_rights.index()] ^ KEYS.castling[self.state.castling.index()];

        self.side = them;
        self.state.key ^= KEYS.side;
        self.game_ply += 1;
        self.state.checkers = self.attackers_to(self.king_sq(them), self.occupied()) & self.colours[us];
    }

    pub fn unmake_move(&mut self, m: Move) {
        let (from, to) = (m.from(), m.to());
        self.side = !self.side;
        let us = self.side;

        if m.is_castle() {
            let (rook_from, rook_to) = Self::castling_rook_squares(to);
            self.move_piece(rook_to, rook_from);
            self.move_piece(to, from);
        } else {
            if m.is_promo() {
                self.remove_piece(to);
                self.add_piece(to, Piece::new(us, PieceType::Pawn));
            }
            self.move_piece(to, from);
            if let Some(captured) = self.state.captured {
                let capsq = if m.is_ep() { self.ep_capture_square(to) } else { to };
                self.add_piece(capsq, Piece::new(!us, captured));
            }
        }

        if let Some(prev) = self.history.pop() {
            self.state = prev;
        }
        self.game_ply -= 1;
    }

    pub fn make_nullmove(&mut self) {
        debug_assert!(!self.in_check());
        self.history.push(self.state);
        if let Some(ep) = self.state.ep.take() {
            self.state.key ^= KEYS.ep[ep.file()];
        }
        self.state.key ^= KEYS.side;
        self.state.fifty += 1;
        self.state.plies_from_null = 0;
        self.state.captured = None;
        self.state.checkers = SquareSet::EMPTY;
        self.side = !self.side;
        self.game_ply += 1;
    }

    pub fn unmake_nullmove(&mut self) {
        self.side = !self.side;
        if let Some(prev) = self.history.pop() {
            self.state = prev;
        }
        self.game_ply -= 1;
    }

    /// Draw by the fifty-move rule, insufficient material, or repetition.
    /// Repetition is checked only when `skip_repetition` is false.
    pub fn is_draw(&self, skip_repetition: bool) -> bool {
        if self.pieces[PieceType::Pawn].is_empty()
            && self.npm[Colour::White] + self.npm[Colour::Black] <= BISHOP_VALUE_MG
        {
            return true;
        }
        if self.state.fifty >= 100 && (!self.in_check() || !self.legal_moves().is_empty()) {
            return true;
        }
        if !skip_repetition {
            let window = usize::from(self.state.fifty).min(usize::from(self.state.plies_from_null));
            let len = self.history.len();
            let mut back = 4;
            while back <= window && back <= len {
                if self.history[len - back].key == self.state.key {
                    return true;
                }
                back += 2;
            }
        }
        false
    }

    pub fn legal_moves(&self) -> MoveList {
        let mut pseudo = MoveList::new();
        self.generate_pseudo(&mut pseudo, if self.in_check() { GenKind::Evasions } else { GenKind::All });
        let pinned = self.pinned_pieces();
        let mut legal = MoveList::new();
        for &m in pseudo.iter_moves() {
            if self.is_legal(m, pinned) {
                legal.push(m);
            }
        }
        legal
    }

    /// Parse a move in UCI long algebraic notation, accepting only legal moves.
    pub fn parse_uci(&self, uci: &str) -> Result<Move, MoveParseError> {
        if !(4..=5).contains(&uci.len()) || !uci.is_ascii() {
            return Err(MoveParseError::InvalidLength(uci.len()));
        }
        let from = uci[0..2].parse::<Square>().map_err(|_| MoveParseError::InvalidFromSquare(uci.to_string()))?;
        let to = uci[2..4].parse::<Square>().map_err(|_| MoveParseError::InvalidToSquare(uci.to_string()))?;
        let promo = match uci.chars().nth(4) {
            Some(c) => Some(PieceType::from_promo_char(c).ok_or(MoveParseError::InvalidPromotionPiece(c))?),
            None => None,
        };
        self.legal_moves()
            .iter_moves()
            .copied()
            .find(|m| m.from() == from && m.to() == to && m.promotion_type() == promo)
            .ok_or_else(|| MoveParseError::IllegalMove(uci.to_string()))
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Board {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for rank in Rank::all().rev() {
            for sq in Square::all().filter(|sq| sq.rank() == rank) {
                let c = self.mailbox[sq].map_or('.', Piece::char);
                write!(f, "{c} ")?;
            }
            writeln!(f)?;
        }
        write!(f, "{}", self.fen())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

    #[test]
    fn fen_round_trip() {
        for fen in [
            STARTING_FEN,
            KIWIPETE,
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "rnbqkbnr/pp1ppppp/8/2pP4/8/8/PPP1PPPP/RNBQKBNR w KQkq c6 0 3",
        ] {
            let board = Board::from_fen(fen).unwrap();
            assert_eq!(board.fen(), fen);
        }
    }

    #[test]
    fn uncapturable_ep_square_is_dropped() {
        let board = Board::from_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1").unwrap();
        assert_eq!(board.ep_sq(), None);
    }

    #[test]
    fn make_unmake_restores_everything() {
        let mut board = Board::from_fen(KIWIPETE).unwrap();
        let original = board.clone();
        for m in original.legal_moves().iter_moves().copied() {
            board.make_move(m);
            board.unmake_move(m);
            assert_eq!(board, original, "make/unmake of {m} corrupted the board");
        }
        board.make_nullmove();
        assert_eq!(board.turn(), Colour::Black);
        board.unmake_nullmove();
        assert_eq!(board, original);
    }

    #[test]
    fn incremental_key_matches_fresh_key() {
        let mut board = Board::new();
        for uci in ["e2e4", "d7d5", "e4d5", "g8f6", "f1b5", "c7c6", "d5c6", "d8a5", "c6b7", "a5b5", "b7a8q"] {
            let m = board.parse_uci(uci).unwrap();
            board.make_move(m);
            let fresh = Board::from_fen(&board.fen()).unwrap();
            assert_eq!(board.key(), fresh.key(), "key drift after {uci}");
            assert_eq!(board.pawn_key(), fresh.pawn_key());
        }
    }

    #[test]
    fn pins_and_checks() {
        // the d2 knight is pinned by the bishop on b4.
        let board = Board::from_fen("4k3/8/8/8/1b6/8/3N4/4K3 w - - 0 1").unwrap();
        assert_eq!(board.pinned_pieces(), Square::D2.as_set());
        let pinned_move = Move::new(Square::D2, Square::F3);
        assert!(board.is_pseudo_legal(pinned_move));
        assert!(!board.is_legal(pinned_move, board.pinned_pieces()));

        let board = Board::from_fen("8/7k/8/8/8/8/4R3/4K2B w - - 0 1").unwrap();
        assert!(!board.in_check());
        let ci = board.check_info();
        assert!(board.gives_check(Move::new(Square::E2, Square::E7), &ci));
        assert!(!board.gives_check(Move::new(Square::H1, Square::G2), &ci));
        assert!(!board.gives_check(Move::new(Square::E2, Square::A2), &ci));
    }

    #[test]
    fn discovered_and_special_checks() {
        // moving the d4 knight uncovers the d1 rook.
        let board = Board::from_fen("3k4/8/8/8/3N4/8/8/3RK3 w - - 0 1").unwrap();
        let ci = board.check_info();
        assert!(board.gives_check(Move::new(Square::D4, Square::F5), &ci));
        // castling with the rook landing on the king's file.
        let board = Board::from_fen("5k2/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
        let ci = board.check_info();
        let castle = board.parse_uci("e1g1").unwrap();
        assert!(castle.is_castle());
        assert!(board.gives_check(castle, &ci));
        // under-promotion to a knight that forks.
        let board = Board::from_fen("8/4P1k1/8/8/8/8/8/K7 w - - 0 1").unwrap();
        let ci = board.check_info();
        assert!(board.gives_check(board.parse_uci("e7e8n").unwrap(), &ci));
        assert!(!board.gives_check(board.parse_uci("e7e8b").unwrap(), &ci));
    }

    #[test]
    fn draw_detection() {
        let mut board = Board::new();
        for uci in ["g1f3", "g8f6", "f3g1", "f6g8"] {
            let m = board.parse_uci(uci).unwrap();
            board.make_move(m);
        }
        assert!(board.is_draw(false));
        assert!(!board.is_draw(true));
        assert!(Board::from_fen("4k3/8/8/8/8/8/8/3BK3 w - - 0 1").unwrap().is_draw(true));
        assert!(!Board::from_fen("4k3/8/8/8/8/8/8/3RK3 w - - 0 1").unwrap().is_draw(true));
        assert!(Board::from_fen("4k3/8/8/8/8/8/8/3RK3 w - - 100 80").unwrap().is_draw(true));
    }

    #[test]
    fn pseudo_legality_rejects_foreign_moves() {
        let board = Board::new();
        assert!(board.is_pseudo_legal(Move::new(Square::E2, Square::E4)));
        assert!(board.is_pseudo_legal(Move::new(Square::G1, Square::F3)));
        assert!(!board.is_pseudo_legal(Move::new(Square::E2, Square::E5)));
        assert!(!board.is_pseudo_legal(Move::new(Square::F1, Square::C4)));
        assert!(!board.is_pseudo_legal(Move::new(Square::E7, Square::E5)));
        assert!(!board.is_pseudo_legal(Move::NULL));
        // in check, only evasions are pseudo-legal.
        let board = Board::from_fen("4k3/8/8/8/8/8/8/r3K1N1 w - - 0 1").unwrap();
        assert!(!board.is_pseudo_legal(Move::new(Square::G1, Square::F3)));
        assert!(board.is_pseudo_legal(Move::new(Square::E1, Square::E2)));
    }

    #[test]
    fn passed_pawns_and_sevenths() {
        let board = Board::from_fen("4k3/1P6/8/8/3p4/8/2P5/4K3 w - - 0 1").unwrap();
        assert!(board.has_pawn_on_seventh(Colour::White));
        assert!(!board.has_pawn_on_seventh(Colour::Black));
        assert!(!board.is_passed_pawn_push(Move::new(Square::C2, Square::C3)));
        assert!(board.is_passed_pawn_push(Move::new(Square::B7, Square::B8)));
    }

    #[test]
    fn move_attacks_square_sees_discoveries() {
        let board = Board::from_fen("4k3/8/8/8/8/2N5/8/B3K3 w - - 0 1").unwrap();
        // the knight leaving c3 opens the a1 bishop onto h8.
        assert!(board.move_attacks_square(Move::new(Square::C3, Square::E2), Square::H8));
        assert!(board.move_attacks_square(Move::new(Square::C3, Square::D5), Square::F6));
        assert!(!board.move_attacks_square(Move::new(Square::E1, Square::F1), Square::H8));
    }
}
