//! Fixed-width bit packing for traversal and outcome codes.
//!
//! A traversal stores one field per [`Step`] at consecutive offsets inside a
//! single `u64`; an outcome packs the spared mask, the loyal mask and the
//! crew-survival level into a `u32`. The codec only moves bits around; what a
//! field value means is the engine's business.

use crate::tree::Step;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Bits used by a traversal code.
pub const TRAVERSAL_BITS: u32 = Step::ALL_WIDTHS;
/// Bits used by an outcome code.
pub const OUTCOME_BITS: u32 = 27;

/// Errors raised while packing or unpacking codes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("traversal code {code:#x} sets bits above bit {}", TRAVERSAL_BITS - 1)]
    TraversalOverflow { code: u64 },
    #[error("outcome code {code:#x} sets bits above bit {}", OUTCOME_BITS - 1)]
    OutcomeOverflow { code: u32 },
    #[error("value {value} does not fit the {width}-bit {step} field")]
    FieldOverflow { step: Step, value: u16, width: u32 },
    #[error("'{input}' is not a hexadecimal code")]
    NotHex { input: String },
}

/// Packed form of one complete traversal.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TraversalCode(u64);

impl TraversalCode {
    /// Wraps a raw code, rejecting bits above the layout.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::TraversalOverflow` when the high bits are set.
    pub const fn new(raw: u64) -> Result<Self, CodecError> {
        if raw >> TRAVERSAL_BITS == 0 {
            Ok(Self(raw))
        } else {
            Err(CodecError::TraversalOverflow { code: raw })
        }
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TraversalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

impl FromStr for TraversalCode {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(parse_hex(s)?)
    }
}

/// Packed form of one end state.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OutcomeCode(u32);

impl OutcomeCode {
    /// Wraps a raw code, rejecting bits above the layout.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::OutcomeOverflow` when the high bits are set.
    pub const fn new(raw: u32) -> Result<Self, CodecError> {
        if raw >> OUTCOME_BITS == 0 {
            Ok(Self(raw))
        } else {
            Err(CodecError::OutcomeOverflow { code: raw })
        }
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for OutcomeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#09x}", self.0)
    }
}

impl FromStr for OutcomeCode {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = parse_hex(s)?;
        let raw = u32::try_from(raw).map_err(|_| CodecError::NotHex {
            input: s.to_string(),
        })?;
        Self::new(raw)
    }
}

fn parse_hex(s: &str) -> Result<u64, CodecError> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u64::from_str_radix(digits, 16).map_err(|_| CodecError::NotHex {
        input: s.to_string(),
    })
}

/// Unpacked traversal: one field value per step, `0` meaning skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Traversal {
    fields: [u16; Step::COUNT],
}

impl Traversal {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fields: [0; Step::COUNT],
        }
    }

    #[must_use]
    pub const fn get(&self, step: Step) -> u16 {
        self.fields[step.position()]
    }

    /// Stores a field value.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::FieldOverflow` when `value` is wider than the field.
    pub const fn set(&mut self, step: Step, value: u16) -> Result<(), CodecError> {
        let width = step.width();
        if (value as u32) >> width != 0 {
            return Err(CodecError::FieldOverflow { step, value, width });
        }
        self.fields[step.position()] = value;
        Ok(())
    }

    /// Packs every field at its offset.
    #[must_use]
    pub fn encode(&self) -> TraversalCode {
        let raw = Step::ALL.iter().fold(0u64, |acc, &step| {
            acc | (u64::from(self.get(step)) << step.offset())
        });
        TraversalCode(raw)
    }

    /// Unpacks every field. Any code accepted by [`TraversalCode::new`]
    /// decodes; the engine decides whether the values make sense.
    #[must_use]
    pub fn decode(code: TraversalCode) -> Self {
        let mut traversal = Self::new();
        for step in Step::ALL {
            let mask = (1u64 << step.width()) - 1;
            // Masked to at most 13 bits.
            traversal.fields[step.position()] = ((code.0 >> step.offset()) & mask) as u16;
        }
        traversal
    }
}
