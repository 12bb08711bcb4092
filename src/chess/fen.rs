use std::str::SplitWhitespace;

use crate::{
    chess::{
        piece::{Colour, Piece, PieceType},
        types::{CastlingRights, File, Rank, Square},
    },
    errors::FenParseError,
};

/// A parsed FEN record, before any board state is derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fen {
    pub mailbox: [Option<Piece>; 64],
    pub turn: Colour,
    pub castling: CastlingRights,
    pub ep: Option<Square>,
    pub halfmove: u8,
    pub fullmove: u16,
}

impl Fen {
    /// Parse a FEN string. The board and side fields are required; the
    /// castling, en passant, and move-counter fields default to `- - 0 1`.
    pub fn parse(fen: &str) -> Result<Self, FenParseError> {
        let mut tokens = fen.split_whitespace();
        Self::parse_tokens(&mut tokens)
    }

    fn parse_tokens(tokens: &mut SplitWhitespace<'_>) -> Result<Self, FenParseError> {
        let board_str = tokens.next().ok_or(FenParseError::MissingBoard)?;
        let mailbox = Self::parse_board(board_str)?;

        let turn = match tokens.next() {
            Some("w") => Colour::White,
            Some("b") => Colour::Black,
            Some(other) => return Err(FenParseError::InvalidSide(other.to_string())),
            None => return Err(FenParseError::MissingSide),
        };

        let castling = tokens.next().map_or(Ok(CastlingRights::NONE), |s| Self::parse_castling(s, &mailbox))?;
        let ep = tokens.next().map_or(Ok(None), |s| Self::parse_ep(s, turn))?;
        let halfmove = tokens.next().map_or(Ok(0), |s| {
            s.parse::<u8>().map_err(|_| FenParseError::InvalidHalfmoveClock(s.to_string()))
        })?;
        let fullmove = tokens.next().map_or(Ok(1), |s| match s.parse::<u16>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(FenParseError::InvalidFullmoveNumber(s.to_string())),
        })?;

        Ok(Self { mailbox, turn, castling, ep, halfmove, fullmove })
    }

    fn parse_board(board_str: &str) -> Result<[Option<Piece>; 64], FenParseError> {
        let mut mailbox = [None; 64];
        let segments = board_str.split('/').collect::<Vec<_>>();
        if segments.len() != 8 {
            return Err(FenParseError::BoardSegments(segments.len()));
        }

        for (rank_str, rank) in segments.iter().zip(Rank::all().rev()) {
            let mut file_idx = 0u8;
            for c in rank_str.chars() {
                if let Some(skip) = c.to_digit(10) {
                    #[allow(clippy::cast_possible_truncation)]
                    let skip = skip as u8;
                    if skip == 0 || skip > 8 {
                        return Err(FenParseError::UnexpectedCharacter(c));
                    }
                    file_idx += skip;
                } else {
                    let piece = Piece::from_fen_char(c).ok_or(FenParseError::UnexpectedCharacter(c))?;
                    let file = File::from_index(file_idx)
                        .ok_or_else(|| FenParseError::BadSquaresInSegment((*rank_str).to_string()))?;
                    mailbox[Square::from_rank_file(rank, file)] = Some(piece);
                    file_idx += 1;
                }
                if file_idx > 8 {
                    return Err(FenParseError::BadSquaresInSegment((*rank_str).to_string()));
                }
            }
            if file_idx != 8 {
                return Err(FenParseError::BadSquaresInSegment((*rank_str).to_string()));
            }
        }

        for colour in Colour::all() {
            let king = Piece::new(colour, PieceType::King);
            if mailbox.iter().filter(|&&p| p == Some(king)).count() != 1 {
                return Err(FenParseError::BadKingCount(colour));
            }
        }
        let pawn_on_back_rank = Square::all()
            .filter(|sq| matches!(sq.rank(), Rank::One | Rank::Eight))
            .any(|sq| mailbox[sq].is_some_and(|p| p.piece_type() == PieceType::Pawn));
        if pawn_on_back_rank {
            return Err(FenParseError::PawnsOnBackRank);
        }

        Ok(mailbox)
    }

    /// Rights whose king or rook is not on its home square are dropped.
    fn parse_castling(s: &str, mailbox: &[Option<Piece>; 64]) -> Result<CastlingRights, FenParseError> {
        let mut rights = CastlingRights::NONE;
        if s == "-" {
            return Ok(rights);
        }
        for c in s.chars() {
            let (bit, king_sq, rook_sq, colour) = match c {
                'K' => (CastlingRights::WK, Square::E1, Square::H1, Colour::White),
                'Q' => (CastlingRights::WQ, Square::E1, Square::A1, Colour::White),
                'k' => (CastlingRights::BK, Square::E8, Square::H8, Colour::Black),
                'q' => (CastlingRights::BQ, Square::E8, Square::A8, Colour::Black),
                _ => return Err(FenParseError::InvalidCastling(s.to_string())),
            };
            if mailbox[king_sq] == Some(Piece::new(colour, PieceType::King))
                && mailbox[rook_sq] == Some(Piece::new(colour, PieceType::Rook))
            {
                rights.set(bit);
            }
        }
        Ok(rights)
    }

    fn parse_ep(s: &str, turn: Colour) -> Result<Option<Square>, FenParseError> {
        if s == "-" {
            return Ok(None);
        }
        let sq = s.parse::<Square>().map_err(|_| FenParseError::InvalidEnPassant(s.to_string()))?;
        let expected_rank = match turn {
            Colour::White => Rank::Six,
            Colour::Black => Rank::Three,
        };
        if sq.rank() != expected_rank {
            return Err(FenParseError::InvalidEnPassant(s.to_string()));
        }
        Ok(Some(sq))
    }
}
