//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a move is written in UCI notation: `e2e4`, or `e7e8q` for promotions.
///
/// # Examples
///
/// ```ignore
/// validate_uci_move("e2e4")  // Ok
/// validate_uci_move("e7e8q") // Ok
/// validate_uci_move("Nf3")   // Err - too short
/// validate_uci_move("e2e9")  // Err - no ninth rank
/// ```
pub fn validate_uci_move(mv: &str) -> Result<(), ValidationError> {
    if !(4..=5).contains(&mv.len()) {
        let mut err = ValidationError::new("move_length");
        err.message = Some(format!("Move must be 4 or 5 characters (got {})", mv.len()).into());
        return Err(err);
    }

    let bytes = mv.as_bytes();
    let square = |file: u8, rank: u8| (b'a'..=b'h').contains(&file) && (b'1'..=b'8').contains(&rank);
    let promotion = bytes
        .get(4)
        .is_none_or(|piece| matches!(piece, b'q' | b'r' | b'b' | b'n'));

    if !square(bytes[0], bytes[1]) || !square(bytes[2], bytes[3]) || !promotion {
        let mut err = ValidationError::new("move_format");
        err.message = Some("Move must use UCI notation such as e2e4 or e7e8q".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_uci_move_valid() {
        assert!(validate_uci_move("e2e4").is_ok());
        assert!(validate_uci_move("g1f3").is_ok());
        assert!(validate_uci_move("e7e8q").is_ok());
        assert!(validate_uci_move("a2a1n").is_ok());
    }

    #[test]
    fn test_validate_uci_move_invalid_length() {
        assert!(validate_uci_move("e4").is_err());
        assert!(validate_uci_move("e7e8qq").is_err());
        assert!(validate_uci_move("").is_err());
    }

    #[test]
    fn test_validate_uci_move_invalid_format() {
        assert!(validate_uci_move("E2E4").is_err()); // uppercase
        assert!(validate_uci_move("e2e9").is_err()); // no ninth rank
        assert!(validate_uci_move("e7e8k").is_err()); // cannot promote to king
        assert!(validate_uci_move("Nf3+").is_err());
    }
}
