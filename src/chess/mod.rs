//! Chess rules seam: position encoding helpers and the rules engine used by live games.

mod fen;
mod rules;

pub use fen::{Side, START_FEN, normalize};
pub use rules::{Board, RulesEngine, RulesError, ShakmatyRules};
