//! Line transforms applied by the worker.
//!
//! A transform is a deterministic, total function from a validated line to
//! its coded form. The worker never sees the terminator.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Available line transforms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transform {
    /// Reverse the character sequence.
    #[default]
    Reverse,
    /// Convert to uppercase.
    Upcase,
    /// Rotate ASCII letters by 13 places.
    Rot13,
}

impl Transform {
    /// Apply the transform to a line.
    pub fn apply(self, line: &str) -> String {
        match self {
            Self::Reverse => line.chars().rev().collect(),
            Self::Upcase => line.to_uppercase(),
            Self::Rot13 => line.chars().map(rot13).collect(),
        }
    }

    /// Whether applying the transform twice yields the input.
    pub fn is_involution(self) -> bool {
        matches!(self, Self::Reverse | Self::Rot13)
    }
}

impl std::fmt::Display for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reverse => write!(f, "reverse"),
            Self::Upcase => write!(f, "upcase"),
            Self::Rot13 => write!(f, "rot13"),
        }
    }
}

fn rot13(c: char) -> char {
    match c {
        'a'..='z' => (((c as u8 - b'a') + 13) % 26 + b'a') as char,
        'A'..='Z' => (((c as u8 - b'A') + 13) % 26 + b'A') as char,
        _ => c,
    }
}
