//! Restricting the walk to a subtree.

use super::step::{Candidates, Step, compress_recruits};
use crate::ally::Ally;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A step fixed to one field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pin {
    pub step: Step,
    pub value: u16,
}

/// The subtree a run covers: every step not pinned is searched in full.
///
/// A pin whose value is not a legal candidate at some node prunes that node,
/// so pins may be combined freely. Pins are kept sorted by step with at most
/// one pin per step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Pin>", into = "Vec<Pin>")]
pub struct Scope {
    pins: Vec<Pin>,
}

impl Scope {
    /// The whole tree.
    #[must_use]
    pub const fn full() -> Self {
        Self { pins: Vec::new() }
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.pins.is_empty()
    }

    #[must_use]
    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    #[must_use]
    pub fn pinned(&self, step: Step) -> Option<u16> {
        self.pins
            .binary_search_by_key(&step, |pin| pin.step)
            .ok()
            .map(|i| self.pins[i].value)
    }

    /// Pins `step` to `value`, replacing any earlier pin for that step.
    #[must_use]
    pub fn pin(mut self, step: Step, value: u16) -> Self {
        let pin = Pin { step, value };
        match self.pins.binary_search_by_key(&step, |p| p.step) {
            Ok(i) => self.pins[i] = pin,
            Err(i) => self.pins.insert(i, pin),
        }
        self
    }

    /// Only the given optional recruits join.
    #[must_use]
    pub fn with_recruits(self, recruits: Ally) -> Self {
        self.pin(Step::Recruitment, compress_recruits(recruits))
    }

    /// Exactly these allies are loyal. Naming an ally who was not recruited
    /// leaves no traversal in scope for that recruitment.
    #[must_use]
    pub fn with_loyalty(self, loyal: Ally) -> Self {
        self.pin(Step::Loyalty, (loyal & Ally::LOYALTY).bits())
    }

    /// Fixes the three ship upgrades.
    #[must_use]
    pub fn with_upgrades(self, armor: bool, shield: bool, weapon: bool) -> Self {
        self.pin(Step::Armor, u16::from(armor))
            .pin(Step::Shield, u16::from(shield))
            .pin(Step::Weapon, u16::from(weapon))
    }

    /// Narrows a step's candidates to the pinned value, or to nothing when
    /// the pin is not among them.
    #[must_use]
    pub fn filter(&self, step: Step, candidates: Candidates) -> Candidates {
        match self.pinned(step) {
            None => candidates,
            Some(value) if candidates.contains(&value) => Candidates::from_slice(&[value]),
            Some(_) => Candidates::new(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pins.is_empty() {
            return f.write_str("full search");
        }
        for (i, pin) in self.pins.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", pin.step, pin.value)?;
        }
        Ok(())
    }
}

impl From<Vec<Pin>> for Scope {
    fn from(pins: Vec<Pin>) -> Self {
        pins.into_iter()
            .fold(Self::full(), |scope, pin| scope.pin(pin.step, pin.value))
    }
}

impl From<Scope> for Vec<Pin> {
    fn from(scope: Scope) -> Self {
        scope.pins
    }
}
