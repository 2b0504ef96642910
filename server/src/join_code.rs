//! Join codes: generation, format checks and the session's published code

use crate::replicated::{Replicated, SubscriptionId};
use log::info;
use rand::Rng;
use shared::{JOIN_CODE_ALPHABET, JOIN_CODE_LENGTH};

/// Generates a random code of `JOIN_CODE_LENGTH` characters from the alphabet
pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> String {
    let alphabet = JOIN_CODE_ALPHABET.as_bytes();
    (0..JOIN_CODE_LENGTH)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}

/// True for exactly `JOIN_CODE_LENGTH` alphabet characters, in any case
pub fn is_valid_format(code: &str) -> bool {
    if code.trim().is_empty() || code.chars().count() != JOIN_CODE_LENGTH {
        return false;
    }
    code.chars()
        .all(|c| JOIN_CODE_ALPHABET.contains(c.to_ascii_uppercase()))
}

/// Holds the code clients must present to join this session
#[derive(Debug)]
pub struct JoinCodeManager {
    code: Replicated<String>,
}

impl JoinCodeManager {
    /// Publishes `pre_generated` (usually from the relay) or a fresh random code
    pub fn spawn<R: Rng + ?Sized>(pre_generated: Option<String>, rng: &mut R) -> Self {
        let code = match pre_generated {
            Some(code) if !code.trim().is_empty() => {
                info!("Using pre-generated join code: {}", code);
                code
            }
            _ => {
                let code = generate(rng);
                info!("Generated join code: {}", code);
                code
            }
        };

        Self {
            code: Replicated::new(code),
        }
    }

    pub fn code(&self) -> &str {
        self.code.get()
    }

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&String, &String) + Send + 'static,
    {
        self.code.subscribe(observer)
    }

    /// Case-insensitive exact match against the published code
    pub fn validate(&self, candidate: &str) -> bool {
        is_valid_format(candidate) && candidate.eq_ignore_ascii_case(self.code())
    }
}
