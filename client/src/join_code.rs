//! Join code checks done before any packet is sent

use shared::{JOIN_CODE_ALPHABET, JOIN_CODE_LENGTH};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinCodeError {
    #[error("join code is empty")]
    Empty,
    #[error("join code must be {expected} characters, got {actual}")]
    WrongLength { expected: usize, actual: usize },
    #[error("join code contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Trims and upper-cases user input, rejecting anything the host could never accept
pub fn normalize(input: &str) -> Result<String, JoinCodeError> {
    let code = input.trim();
    if code.is_empty() {
        return Err(JoinCodeError::Empty);
    }

    let actual = code.chars().count();
    if actual != JOIN_CODE_LENGTH {
        return Err(JoinCodeError::WrongLength {
            expected: JOIN_CODE_LENGTH,
            actual,
        });
    }

    let code = code.to_ascii_uppercase();
    if let Some(c) = code.chars().find(|c| !JOIN_CODE_ALPHABET.contains(*c)) {
        return Err(JoinCodeError::InvalidCharacter(c));
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_accepts_mixed_case() {
        assert_eq!(normalize("  ab12cd "), Ok("AB12CD".to_string()));
    }

    #[test]
    fn test_normalize_rejections() {
        assert_eq!(normalize("   "), Err(JoinCodeError::Empty));
        assert_eq!(
            normalize("ABC"),
            Err(JoinCodeError::WrongLength {
                expected: 6,
                actual: 3
            })
        );
        assert_eq!(normalize("AB-12C"), Err(JoinCodeError::InvalidCharacter('-')));
    }
}
