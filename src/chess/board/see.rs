use arrayvec::ArrayVec;

use crate::{
    chess::{
        attacks::{bishop_attacks, rook_attacks},
        board::Board,
        chessmove::Move,
        piece::PieceType,
    },
    util::{QUEEN_VALUE_MG, mg_value},
};

impl Board {
    /// Static exchange evaluation: the material balance of the capture
    /// sequence on the destination square, each side recapturing with its
    /// least valuable attacker and free to stop when it is ahead.
    pub fn static_exchange_eval(&self, m: Move) -> i32 {
        if m.is_castle() {
            return 0;
        }
        let (from, to) = (m.from(), m.to());
        let Some(mover) = self.piece_at(from) else {
            return 0;
        };
        let mut occupied = self.occupied();
        let mut captured = self.piece_at(to).map(|p| p.piece_type());
        if m.is_ep() {
            if let Some(capsq) = to.pawn_push(!mover.colour()) {
                occupied = occupied.remove_square(capsq);
                captured = Some(PieceType::Pawn);
            }
        }

        occupied = occupied.remove_square(from);
        let mut attackers = self.attackers_to(to, occupied) & occupied;
        let mut stm = !mover.colour();
        let mut stm_attackers = attackers & self.colour(stm);
        let first_gain = captured.map_or(0, mg_value);
        if stm_attackers.is_empty() {
            return first_gain;
        }

        let diagonal = self.pieces(PieceType::Bishop) | self.pieces(PieceType::Queen);
        let orthogonal = self.pieces(PieceType::Rook) | self.pieces(PieceType::Queen);

        let mut swap_list = ArrayVec::<i32, 32>::new();
        swap_list.push(first_gain);
        let mut on_square = mover.piece_type();

        loop {
            let gain = -swap_list[swap_list.len() - 1] + mg_value(on_square);
            swap_list.push(gain);

            // find the least valuable attacker of the side to move.
            let Some((pt, sq)) = PieceType::all()
                .find_map(|pt| (stm_attackers & self.pieces(pt)).first().map(|sq| (pt, sq)))
            else {
                break;
            };
            occupied = occupied.remove_square(sq);
            // uncover x-ray attackers standing behind the one that moved.
            attackers |= (bishop_attacks(to, occupied) & diagonal) | (rook_attacks(to, occupied) & orthogonal);
            attackers &= occupied;
            on_square = pt;
            stm = !stm;
            stm_attackers = attackers & self.colour(stm);

            // a king may only recapture when nothing defends the square.
            if pt == PieceType::King && stm_attackers.non_empty() {
                swap_list.push(QUEEN_VALUE_MG * 16);
                break;
            }
            if stm_attackers.is_empty() || swap_list.is_full() {
                break;
            }
        }

        // negamax the swap list back to the root.
        let mut idx = swap_list.len() - 1;
        while idx > 0 {
            swap_list[idx - 1] = (-swap_list[idx]).min(swap_list[idx - 1]);
            idx -= 1;
        }
        swap_list[0]
    }

    /// Like `static_exchange_eval`, but only the sign is reliable.
    /// Captures of an equal or more valuable piece return early.
    pub fn see_sign(&self, m: Move) -> i32 {
        let Some(mover) = self.piece_at(m.from()) else {
            return 0;
        };
        let victim = self.piece_at(m.to()).map_or(0, |p| mg_value(p.piece_type()));
        if !m.is_castle() && victim >= mg_value(mover.piece_type()) {
            return 1;
        }
        self.static_exchange_eval(m)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        chess::board::Board,
        util::{BISHOP_VALUE_MG, KNIGHT_VALUE_MG, PAWN_VALUE_MG, ROOK_VALUE_MG},
    };

    fn see(fen: &str, uci: &str) -> i32 {
        let board = Board::from_fen(fen).unwrap();
        let m = board.parse_uci(uci).unwrap();
        board.static_exchange_eval(m)
    }

    #[test]
    fn undefended_capture_wins_the_victim() {
        assert_eq!(see("1k1r4/1pp4p/p7/4p3/8/P5P1/1PP4P/2K1R3 w - - 0 1", "e1e5"), PAWN_VALUE_MG);
    }

    #[test]
    fn defended_capture_loses_the_attacker() {
        // knight takes a pawn defended by a pawn.
        assert_eq!(see("4k3/8/3p4/4p3/8/5N2/8/4K3 w - - 0 1", "f3e5"), PAWN_VALUE_MG - KNIGHT_VALUE_MG);
    }

    #[test]
    fn xray_attackers_join_the_exchange() {
        // rook takes rook, backed by a second rook behind it.
        assert_eq!(see("3rk3/8/8/8/8/8/3R4/3RK3 w - - 0 1", "d2d8"), ROOK_VALUE_MG);
        // bishop takes a knight defended by a pawn, with the queen behind the bishop.
        assert_eq!(
            see("4k3/8/4p3/3n4/8/8/6B1/4K2Q w - - 0 1", "g2d5"),
            KNIGHT_VALUE_MG - BISHOP_VALUE_MG + PAWN_VALUE_MG
        );
    }

    #[test]
    fn see_sign_shortcut() {
        let board = Board::from_fen("4k3/8/3p4/4q3/8/5N2/8/4K3 w - - 0 1").unwrap();
        let m = board.parse_uci("f3e5").unwrap();
        assert_eq!(board.see_sign(m), 1);
        let board = Board::from_fen("4k3/8/3p4/4p3/8/5N2/8/4K3 w - - 0 1").unwrap();
        let m = board.parse_uci("f3e5").unwrap();
        assert!(board.see_sign(m) < 0);
    }
}
