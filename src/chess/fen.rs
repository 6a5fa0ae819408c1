use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Standard initial position.
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Colour of a side of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Moves first.
    White,
    /// Moves second.
    Black,
}

impl Side {
    /// Side to move encoded in the second FEN field, `None` when the field is missing or invalid.
    pub fn from_fen(fen: &str) -> Option<Self> {
        match fen.split_whitespace().nth(1)? {
            "w" => Some(Side::White),
            "b" => Some(Side::Black),
            _ => None,
        }
    }

    /// The other side.
    pub fn opposite(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// Lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Side::White => "white",
            Side::Black => "black",
        }
    }
}

/// Reduce a FEN to piece placement and side to move.
///
/// Castling rights, en passant square and clocks are dropped so that transpositions reaching
/// the same position share one key.
pub fn normalize(fen: &str) -> String {
    fen.split_whitespace().take(2).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transpositions_share_a_key() {
        let a = normalize("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1");
        let b = normalize("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b - - 4 7");
        assert_eq!(a, b);
        assert_eq!(a, "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b");
    }

    #[test]
    fn side_to_move_is_read_from_second_field() {
        assert_eq!(Side::from_fen(START_FEN), Some(Side::White));
        assert_eq!(
            Side::from_fen("8/8/8/8/8/8/8/K6k b - - 0 1"),
            Some(Side::Black)
        );
        assert_eq!(Side::from_fen("8/8/8/8/8/8/8/K6k"), None);
        assert_eq!(Side::from_fen("8/8/8/8/8/8/8/K6k x - - 0 1"), None);
    }
}
