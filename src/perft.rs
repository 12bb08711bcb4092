use std::time::Instant;

use crate::chess::board::{
    Board,
    movegen::{GenKind, MoveList},
};

pub fn perft(pos: &mut Board, depth: usize) -> u64 {
    if depth == 0 {
        return 1;
    }

    let mut ml = MoveList::new();
    pos.generate_pseudo(&mut ml, if pos.in_check() { GenKind::Evasions } else { GenKind::All });
    let pinned = pos.pinned_pieces();

    let mut count = 0;
    for &m in ml.iter_moves() {
        if !pos.is_legal(m, pinned) {
            continue;
        }
        if depth == 1 {
            count += 1;
            continue;
        }
        pos.make_move(m);
        count += perft(pos, depth - 1);
        pos.unmake_move(m);
    }

    count
}

/// Perft with the node count of each root move listed, for debugging move generators.
pub fn divide(pos: &mut Board, depth: usize) -> u64 {
    let start = Instant::now();
    let mut total = 0;
    for &m in pos.legal_moves().iter_moves() {
        pos.make_move(m);
        let nodes = if depth > 1 { perft(pos, depth - 1) } else { 1 };
        pos.unmake_move(m);
        println!("{m}: {nodes}");
        total += nodes;
    }
    let elapsed = start.elapsed();
    #[allow(clippy::cast_precision_loss)]
    let nps = total as f64 / elapsed.as_secs_f64().max(1e-9);
    println!("\nnodes {total} time {}ms nps {nps:.0}", elapsed.as_millis());
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess::board::STARTING_FEN;

    fn check(fen: &str, expected: &[u64]) {
        let mut pos = Board::from_fen(fen).unwrap();
        for (depth, &nodes) in expected.iter().enumerate() {
            assert_eq!(perft(&mut pos, depth + 1), nodes, "{fen} at depth {}", depth + 1);
        }
        assert_eq!(pos.fen(), Board::from_fen(fen).unwrap().fen());
    }

    #[test]
    fn perft_start_position() {
        check(STARTING_FEN, &[20, 400, 8902, 197_281]);
    }

    #[test]
    fn perft_kiwipete() {
        check(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            &[48, 2039, 97_862],
        );
    }

    #[test]
    fn perft_en_passant_and_pins() {
        check("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1", &[14, 191, 2812, 43_238]);
    }

    #[test]
    fn perft_promotions_and_castling() {
        check("r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1", &[6, 264, 9467]);
        check("rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8", &[44, 1486, 62_379]);
    }
}
