//! Printed sample labels: three base36 pairs, e.g. `1Z-4I-6T`.
//!
//! Each pair encodes one byte (`00`..`73`), so an id carries 24 bits.
//! Parsing is case-insensitive; the canonical form is upper case.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

const RADIX: u32 = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleId([u8; 3]);

impl SampleId {
    /// A fresh random id. Callers must still check for collisions.
    pub fn generate() -> Self {
        let random = Uuid::new_v4();
        let bytes = random.as_bytes();
        Self([bytes[0], bytes[1], bytes[2]])
    }

    pub fn bytes(&self) -> [u8; 3] {
        self.0
    }
}

impl From<[u8; 3]> for SampleId {
    fn from(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }
}

/// Rejected sample label.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected three base36 pairs like 1Z-4I-6T")]
pub struct ParseSampleIdError;

impl FromStr for SampleId {
    type Err = ParseSampleIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 3];
        let mut parts = s.trim().split('-');
        for byte in bytes.iter_mut() {
            let part = parts.next().ok_or(ParseSampleIdError)?;
            if part.len() != 2 {
                return Err(ParseSampleIdError);
            }
            // from_str_radix accepts a leading sign; a pair never has one
            if !part.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(ParseSampleIdError);
            }
            *byte = u8::from_str_radix(part, RADIX).map_err(|_| ParseSampleIdError)?;
        }
        if parts.next().is_some() {
            return Err(ParseSampleIdError);
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{}-{}-{}", pair(a), pair(b), pair(c))
    }
}

fn pair(byte: u8) -> String {
    let byte = u32::from(byte);
    [byte / RADIX, byte % RADIX]
        .into_iter()
        .filter_map(|digit| char::from_digit(digit, RADIX))
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
