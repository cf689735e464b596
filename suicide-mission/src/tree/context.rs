//! Accumulated state carried down one branch of the tree.

use super::EngineError;
use super::step::{Step, expand_recruits};
use crate::ally::Ally;
use crate::casualty::{self, Fate};
use crate::codec::Traversal;
use crate::outcome::{CrewSurvival, Outcome};

/// Where every ally currently stands. The three sets are disjoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Team {
    /// Still fighting, fate undecided.
    pub active: Ally,
    pub dead: Ally,
    /// Guaranteed to survive.
    pub spared: Ally,
}

impl Team {
    /// Moves the fate's allies out of the active team.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InactiveAlly` if the fate names anyone who is not
    /// active.
    pub fn apply(&mut self, step: Step, fate: Fate) -> Result<(), EngineError> {
        let touched = fate.dead | fate.spared;
        if !self.active.contains(touched) {
            return Err(EngineError::InactiveAlly {
                step,
                ally: touched - self.active,
            });
        }
        self.active -= touched;
        self.dead |= fate.dead;
        self.spared |= fate.spared;
        Ok(())
    }
}

/// Read-only input to the candidate generator and the casualty resolver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Context {
    pub team: Team,
    /// Loyal allies. Morinth is included once loyalty has been decided.
    pub loyal: Ally,
    /// Choices made so far; later fields are still zero.
    pub traversal: Traversal,
}

impl Context {
    /// State before the first decision: nobody has joined yet.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            team: Team {
                active: Ally::NOBODY,
                dead: Ally::NOBODY,
                spared: Ally::NOBODY,
            },
            loyal: Ally::NOBODY,
            traversal: Traversal::new(),
        }
    }

    #[must_use]
    pub const fn choice(&self, step: Step) -> u16 {
        self.traversal.get(step)
    }

    /// The ally picked at an index-valued step, if any.
    #[must_use]
    pub const fn chosen_ally(&self, step: Step) -> Option<Ally> {
        Ally::from_index(self.choice(step))
    }

    #[must_use]
    pub const fn is_loyal(&self, ally: Ally) -> bool {
        self.loyal.contains(ally)
    }

    /// The biotic specialist and the second fireteam leader.
    #[must_use]
    pub fn specialists(&self) -> Ally {
        [Step::Biotic, Step::SecondLeader]
            .into_iter()
            .filter_map(|step| self.chosen_ally(step))
            .collect()
    }

    /// The state after choosing `value` at `step`.
    ///
    /// # Errors
    ///
    /// Propagates casualty and codec errors; see [`EngineError`].
    pub fn advance(&self, step: Step, value: u16) -> Result<Self, EngineError> {
        let fate = casualty::resolve(step, self, value)?;
        let mut next = *self;
        next.traversal.set(step, value)?;
        match step {
            Step::Recruitment => next.team.active = Ally::REQUIRED | expand_recruits(value),
            Step::Loyalty => {
                next.loyal = Ally::from_bits_truncate(value) | Ally::MORINTH;
            }
            Step::Morinth if value == 1 => next.team.active |= Ally::MORINTH,
            _ => {}
        }
        next.team.apply(step, fate)?;
        Ok(next)
    }

    /// The outcome of a fully decided traversal.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Unresolved` while anyone is still active.
    pub fn finish(&self) -> Result<Outcome, EngineError> {
        if !self.team.active.is_empty() {
            return Err(EngineError::Unresolved {
                remaining: self.team.active,
            });
        }
        let crew = CrewSurvival::from_delay(self.choice(Step::CrewDelay));
        Ok(Outcome::new(self.team.spared, self.loyal, crew))
    }
}
