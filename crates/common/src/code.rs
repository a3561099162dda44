//! Trip join codes
//!
//! Codes are six characters drawn from an alphabet without the easily
//! confused glyphs `0`, `O`, `1` and `I`.

use crate::error::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Characters a join code may contain
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a join code
pub const CODE_LENGTH: usize = 6;

/// Six-character code used to find and join a trip
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JoinCode(String);

impl JoinCode {
    /// Generate a random code
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    /// Generate a code from the given RNG
    pub fn generate_with<R: Rng>(rng: &mut R) -> Self {
        let code = (0..CODE_LENGTH)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// The code as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for JoinCode {
    type Err = Error;

    /// Parse user input; surrounding whitespace and case are ignored
    fn from_str(s: &str) -> Result<Self> {
        let code = s.trim().to_ascii_uppercase();
        if code.len() != CODE_LENGTH {
            return Err(Error::InvalidCode(format!(
                "expected {} characters, got {}",
                CODE_LENGTH,
                code.len()
            )));
        }
        if let Some(bad) = code.bytes().find(|b| !CODE_ALPHABET.contains(b)) {
            return Err(Error::InvalidCode(format!(
                "character '{}' is not allowed",
                bad as char
            )));
        }
        Ok(Self(code))
    }
}

impl TryFrom<String> for JoinCode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<JoinCode> for String {
    fn from(code: JoinCode) -> Self {
        code.0
    }
}

impl std::fmt::Display for JoinCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_normalizes_case() {
        let code: JoinCode = " abc234 ".parse().unwrap();
        assert_eq!(code.as_str(), "ABC234");
    }

    #[test]
    fn test_parse_rejects_ambiguous_chars() {
        assert!("ABC0EF".parse::<JoinCode>().is_err());
        assert!("ABCOEF".parse::<JoinCode>().is_err());
        assert!("ABC1EF".parse::<JoinCode>().is_err());
        assert!("ABCIEF".parse::<JoinCode>().is_err());
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!("ABCDE".parse::<JoinCode>().is_err());
        assert!("ABCDEFG".parse::<JoinCode>().is_err());
    }

    #[test]
    fn test_serde_validates() {
        assert!(serde_json::from_str::<JoinCode>("\"ABCDEF\"").is_ok());
        assert!(serde_json::from_str::<JoinCode>("\"ABCDE0\"").is_err());
    }

    proptest! {
        #[test]
        fn generated_codes_parse_back(seed in any::<u64>()) {
            use rand::SeedableRng;
            let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
            let code = JoinCode::generate_with(&mut rng);
            prop_assert_eq!(code.as_str().len(), CODE_LENGTH);
            let parsed: JoinCode = code.as_str().parse().unwrap();
            prop_assert_eq!(parsed, code);
        }
    }
}
