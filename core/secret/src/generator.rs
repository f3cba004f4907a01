//! Random password generation.
//!
//! All randomness comes from `OsRng`. Characters are drawn uniformly and
//! independently from the policy's set; no class is forced into the output.

use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use passdeck_common::{Error, Result, SecretValue};

/// Default generated password length.
pub const DEFAULT_LENGTH: usize = 20;

/// Maximum generated password length.
pub const MAX_LENGTH: usize = 4096;

const LETTERS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";
const PUNCTUATION: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Character set a password is drawn from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharsetPolicy {
    /// Letters, digits and ASCII punctuation.
    #[default]
    All,
    /// ASCII letters only.
    Letters,
    /// Decimal digits only.
    Digits,
    /// Letters and digits.
    Alphanumeric,
    /// Caller-supplied characters; duplicates are ignored.
    Custom(String),
}

impl CharsetPolicy {
    /// Distinct characters of this policy, in first-seen order.
    pub fn charset(&self) -> Vec<char> {
        let raw: String = match self {
            CharsetPolicy::All => [LETTERS, DIGITS, PUNCTUATION].concat(),
            CharsetPolicy::Letters => LETTERS.to_string(),
            CharsetPolicy::Digits => DIGITS.to_string(),
            CharsetPolicy::Alphanumeric => [LETTERS, DIGITS].concat(),
            CharsetPolicy::Custom(set) => set.clone(),
        };

        let mut chars: Vec<char> = Vec::with_capacity(raw.len());
        for c in raw.chars() {
            if !chars.contains(&c) {
                chars.push(c);
            }
        }
        chars
    }
}

/// Generate a password of exactly `length` characters.
///
/// # Errors
/// - `InvalidLength` if `length` is 0 or above `MAX_LENGTH`
/// - `InvalidInput` if the policy has no characters
pub fn generate(length: usize, policy: &CharsetPolicy) -> Result<SecretValue> {
    if length == 0 || length > MAX_LENGTH {
        return Err(Error::InvalidLength(format!(
            "length must be between 1 and {}, got {}",
            MAX_LENGTH, length
        )));
    }

    let charset = policy.charset();
    if charset.is_empty() {
        return Err(Error::InvalidInput(
            "character set must not be empty".to_string(),
        ));
    }

    let mut rng = OsRng;
    let password: String = (0..length)
        .map(|_| charset[rng.gen_range(0..charset.len())])
        .collect();

    Ok(SecretValue::from(password))
}
