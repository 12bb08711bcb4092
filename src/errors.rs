use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveParseError {
    #[error("invalid move length {0}")]
    InvalidLength(usize),
    #[error("invalid from-square in {0}")]
    InvalidFromSquare(String),
    #[error("invalid to-square in {0}")]
    InvalidToSquare(String),
    #[error("invalid promotion piece {0}")]
    InvalidPromotionPiece(char),
    #[error("illegal move {0}")]
    IllegalMove(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FenParseError {
    #[error("FEN string is missing the board field")]
    MissingBoard,
    #[error("FEN string is missing the side to move")]
    MissingSide,
    #[error("FEN board has {0} rank segments, expected 8")]
    BoardSegments(usize),
    #[error("FEN rank \"{0}\" does not describe exactly 8 squares")]
    BadSquaresInSegment(String),
    #[error("unexpected character '{0}' in FEN board")]
    UnexpectedCharacter(char),
    #[error("invalid side to move \"{0}\"")]
    InvalidSide(String),
    #[error("invalid castling field \"{0}\"")]
    InvalidCastling(String),
    #[error("invalid en passant square \"{0}\"")]
    InvalidEnPassant(String),
    #[error("invalid halfmove clock \"{0}\"")]
    InvalidHalfmoveClock(String),
    #[error("invalid fullmove number \"{0}\"")]
    InvalidFullmoveNumber(String),
    #[error("{0} must have exactly one king")]
    BadKingCount(crate::chess::piece::Colour),
    #[error("pawns may not stand on the first or last rank")]
    PawnsOnBackRank,
    #[error("the side not to move is in check")]
    WaitingInCheck,
}
