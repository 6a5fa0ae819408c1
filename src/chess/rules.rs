use shakmaty::{
    CastlingMode, Chess, EnPassantMode, Move, Position, fen::Fen, san::San, uci::Uci,
};
use thiserror::Error;

use super::fen::Side;

/// Failures raised while loading positions or applying moves.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesError {
    #[error("invalid position `{0}`")]
    InvalidFen(String),
    #[error("`{0}` is not a move in UCI notation")]
    InvalidNotation(String),
    #[error("`{0}` is not legal in this position")]
    IllegalMove(String),
}

/// Positions as seen by the live game state machine.
pub trait Board: Send {
    fn side_to_move(&self) -> Side;
    /// Legal moves in UCI notation.
    fn legal_moves(&self) -> Vec<String>;
    fn contains(&self, mv: &str) -> bool;
    /// Play a UCI move and return the resulting FEN.
    fn apply_move(&mut self, mv: &str) -> Result<String, RulesError>;
    fn is_check(&self) -> bool;
    fn is_mate(&self) -> bool;
    fn is_stalemate(&self) -> bool;
    /// Draw by insufficient material or the fifty-move rule.
    fn is_draw(&self) -> bool;
    fn fen(&self) -> String;
}

/// Factory for [`Board`]s plus notation conversion for finished games.
pub trait RulesEngine: Send + Sync {
    fn load_position(&self, fen: &str) -> Result<Box<dyn Board>, RulesError>;
    /// Convert UCI moves played from `start_fen` into SAN, with `+` and `#` suffixes.
    fn render_san(&self, start_fen: &str, moves: &[String]) -> Result<Vec<String>, RulesError>;
}

/// [`RulesEngine`] backed by shakmaty.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShakmatyRules;

fn parse_position(fen: &str) -> Result<Chess, RulesError> {
    let parsed: Fen = fen
        .parse()
        .map_err(|_| RulesError::InvalidFen(fen.to_owned()))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|_| RulesError::InvalidFen(fen.to_owned()))
}

fn parse_move(position: &Chess, mv: &str) -> Result<Move, RulesError> {
    let uci: Uci = mv
        .parse()
        .map_err(|_| RulesError::InvalidNotation(mv.to_owned()))?;
    let m = uci
        .to_move(position)
        .map_err(|_| RulesError::IllegalMove(mv.to_owned()))?;
    if !position.is_legal(&m) {
        return Err(RulesError::IllegalMove(mv.to_owned()));
    }
    Ok(m)
}

impl RulesEngine for ShakmatyRules {
    fn load_position(&self, fen: &str) -> Result<Box<dyn Board>, RulesError> {
        Ok(Box::new(ShakmatyBoard {
            position: parse_position(fen)?,
        }))
    }

    fn render_san(&self, start_fen: &str, moves: &[String]) -> Result<Vec<String>, RulesError> {
        let mut position = parse_position(start_fen)?;
        let mut rendered = Vec::with_capacity(moves.len());
        for mv in moves {
            let m = parse_move(&position, mv)?;
            let mut san = San::from_move(&position, &m).to_string();
            position = position
                .play(&m)
                .map_err(|_| RulesError::IllegalMove(mv.clone()))?;
            if position.is_checkmate() {
                san.push('#');
            } else if position.is_check() {
                san.push('+');
            }
            rendered.push(san);
        }
        Ok(rendered)
    }
}

struct ShakmatyBoard {
    position: Chess,
}

impl Board for ShakmatyBoard {
    fn side_to_move(&self) -> Side {
        if self.position.turn().is_white() {
            Side::White
        } else {
            Side::Black
        }
    }

    fn legal_moves(&self) -> Vec<String> {
        self.position
            .legal_moves()
            .iter()
            .map(|m| Uci::from_move(m, CastlingMode::Standard).to_string())
            .collect()
    }

    fn contains(&self, mv: &str) -> bool {
        parse_move(&self.position, mv).is_ok()
    }

    fn apply_move(&mut self, mv: &str) -> Result<String, RulesError> {
        let m = parse_move(&self.position, mv)?;
        self.position = self
            .position
            .clone()
            .play(&m)
            .map_err(|_| RulesError::IllegalMove(mv.to_owned()))?;
        Ok(self.fen())
    }

    fn is_check(&self) -> bool {
        self.position.is_check()
    }

    fn is_mate(&self) -> bool {
        self.position.is_checkmate()
    }

    fn is_stalemate(&self) -> bool {
        self.position.is_stalemate()
    }

    fn is_draw(&self) -> bool {
        self.position.is_insufficient_material() || self.position.halfmoves() >= 100
    }

    fn fen(&self) -> String {
        Fen::from_position(self.position.clone(), EnPassantMode::Legal).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess::START_FEN;

    #[test]
    fn applies_legal_moves_and_flips_turn() {
        let mut board = ShakmatyRules.load_position(START_FEN).unwrap();
        assert_eq!(board.side_to_move(), Side::White);
        assert_eq!(board.legal_moves().len(), 20);

        let fen = board.apply_move("e2e4").unwrap();
        assert_eq!(Side::from_fen(&fen), Some(Side::Black));
        assert_eq!(board.side_to_move(), Side::Black);
    }

    #[test]
    fn lists_promotions_and_castling_in_uci() {
        let mut board = ShakmatyRules
            .load_position("4k3/P7/8/8/8/8/8/4K2R w K - 0 1")
            .unwrap();
        let moves = board.legal_moves();
        assert!(moves.iter().any(|m| m == "a7a8q"));
        assert!(moves.iter().any(|m| m == "e1g1"));
        assert!(board.contains("a7a8n"));

        board.apply_move("e1g1").unwrap();
        assert_eq!(board.side_to_move(), Side::Black);
    }

    #[test]
    fn rejects_bad_moves_without_changing_position() {
        let mut board = ShakmatyRules.load_position(START_FEN).unwrap();
        assert_eq!(
            board.apply_move("e2e5"),
            Err(RulesError::IllegalMove("e2e5".into()))
        );
        assert_eq!(
            board.apply_move("castle"),
            Err(RulesError::InvalidNotation("castle".into()))
        );
        assert_eq!(board.fen(), START_FEN);
    }

    #[test]
    fn detects_mate() {
        let mut board = ShakmatyRules.load_position(START_FEN).unwrap();
        for mv in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            board.apply_move(mv).unwrap();
        }
        assert!(board.is_check());
        assert!(board.is_mate());
        assert!(!board.is_stalemate());
    }

    #[test]
    fn bare_kings_are_a_draw() {
        let board = ShakmatyRules
            .load_position("8/8/8/4k3/8/8/8/4K3 w - - 0 1")
            .unwrap();
        assert!(board.is_draw());
    }

    #[test]
    fn renders_san() {
        let moves: Vec<String> = ["e2e4", "e7e5", "g1f3"].map(String::from).to_vec();
        let san = ShakmatyRules.render_san(START_FEN, &moves).unwrap();
        assert_eq!(san, vec!["e4", "e5", "Nf3"]);
    }

    #[test]
    fn san_marks_mate() {
        let moves: Vec<String> = ["f2f3", "e7e5", "g2g4", "d8h4"].map(String::from).to_vec();
        let san = ShakmatyRules.render_san(START_FEN, &moves).unwrap();
        assert_eq!(san.last().map(String::as_str), Some("Qh4#"));
    }
}
