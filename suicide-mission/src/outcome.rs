//! End states of the mission and their packed form.

use crate::ally::Ally;
use crate::codec::{CodecError, OutcomeCode};
use serde::{Deserialize, Serialize};
use std::fmt;

const SPARED_SHIFT: u32 = 0;
const LOYAL_SHIFT: u32 = 13;
const CREW_SHIFT: u32 = 25;
const SPARED_MASK: u32 = 0x1FFF;
const LOYAL_MASK: u32 = 0x0FFF;
const CREW_MASK: u32 = 0x3;

/// How many of the abducted crew make it home.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrewSurvival {
    /// No rescue was sent.
    Lost,
    ChakwasOnly,
    Half,
    All,
}

impl CrewSurvival {
    pub const ALL_LEVELS: [Self; 4] = [Self::Lost, Self::ChakwasOnly, Self::Half, Self::All];

    /// Survival for a crew-delay field value; `0` means no rescue.
    #[must_use]
    pub const fn from_delay(delay: u16) -> Self {
        match delay {
            1 => Self::All,
            2 => Self::Half,
            3 => Self::ChakwasOnly,
            _ => Self::Lost,
        }
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self as u32
    }

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        match bits & CREW_MASK {
            0 => Self::Lost,
            1 => Self::ChakwasOnly,
            2 => Self::Half,
            _ => Self::All,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Lost => "none",
            Self::ChakwasOnly => "Chakwas only",
            Self::Half => "half",
            Self::All => "all",
        }
    }
}

impl fmt::Display for CrewSurvival {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Who survived, who among them was loyal, and what became of the crew.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Outcome {
    pub spared: Ally,
    pub loyal: Ally,
    pub crew: CrewSurvival,
}

impl Outcome {
    /// Builds an outcome, keeping only the loyalty of survivors that have a
    /// loyalty mission.
    #[must_use]
    pub fn new(spared: Ally, loyalty: Ally, crew: CrewSurvival) -> Self {
        Self {
            spared,
            loyal: spared & loyalty & Ally::LOYALTY,
            crew,
        }
    }

    /// Allies who did not survive, given everyone who took part.
    #[must_use]
    pub fn dead(&self, team: Ally) -> Ally {
        team - self.spared
    }

    /// The commander lives when at least two squad members survive.
    #[must_use]
    pub const fn commander_survives(&self) -> bool {
        self.spared.len() >= 2
    }

    #[must_use]
    pub fn encode(&self) -> OutcomeCode {
        let raw = (u32::from(self.spared.bits()) & SPARED_MASK) << SPARED_SHIFT
            | (u32::from(self.loyal.bits()) & LOYAL_MASK) << LOYAL_SHIFT
            | self.crew.bits() << CREW_SHIFT;
        // Every field is masked to its width, so the high bits stay clear.
        OutcomeCode::new(raw).unwrap_or_default()
    }

    #[must_use]
    pub fn decode(code: OutcomeCode) -> Self {
        let raw = code.raw();
        let field = |shift: u32, mask: u32| ((raw >> shift) & mask) as u16;
        Self {
            spared: Ally::from_bits_truncate(field(SPARED_SHIFT, SPARED_MASK)),
            loyal: Ally::from_bits_truncate(field(LOYAL_SHIFT, LOYAL_MASK)),
            crew: CrewSurvival::from_bits(raw >> CREW_SHIFT),
        }
    }

    /// Decodes a raw `u32`.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::OutcomeOverflow` when bits above the layout are set.
    pub fn decode_raw(raw: u32) -> Result<Self, CodecError> {
        OutcomeCode::new(raw).map(Self::decode)
    }
}
