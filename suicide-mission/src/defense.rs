//! Losses among the allies left behind to hold the line.
//!
//! Each defender contributes an innate score, one less when disloyal. The
//! toll depends on the team size and the mean score; means are compared as
//! exact fractions so no floating point is involved.

use crate::ally::Ally;
use thiserror::Error;

/// Order in which defenders fall, within the disloyal group and then within
/// the loyal group.
pub const DEFENSE_PRIORITY: [Ally; 13] = [
    Ally::MORDIN,
    Ally::TALI,
    Ally::KASUMI,
    Ally::JACK,
    Ally::MIRANDA,
    Ally::JACOB,
    Ally::GARRUS,
    Ally::SAMARA,
    Ally::MORINTH,
    Ally::LEGION,
    Ally::THANE,
    Ally::ZAEED,
    Ally::GRUNT,
];

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum DefenseError {
    #[error("nobody was left behind to defend")]
    NoDefenders,
}

/// Score 4 when holding the line.
const STRONG_DEFENDERS: Ally =
    Ally::from_bits_truncate(Ally::GARRUS.bits() | Ally::GRUNT.bits() | Ally::ZAEED.bits());

/// Score 2. Everyone else scores 1.
const STEADY_DEFENDERS: Ally = Ally::from_bits_truncate(
    Ally::JACOB.bits()
        | Ally::MIRANDA.bits()
        | Ally::LEGION.bits()
        | Ally::SAMARA.bits()
        | Ally::THANE.bits()
        | Ally::MORINTH.bits(),
);

/// Innate defensive score of a single ally.
#[must_use]
pub const fn base_score(ally: Ally) -> u32 {
    if STRONG_DEFENDERS.contains(ally) {
        4
    } else if STEADY_DEFENDERS.contains(ally) {
        2
    } else {
        1
    }
}

/// Sum of the defenders' scores.
#[must_use]
pub fn total_score(team: Ally, loyal: Ally) -> u32 {
    team.iter()
        .map(|ally| base_score(ally) - u32::from(!loyal.contains(ally)))
        .sum()
}

/// Number of defenders who die.
///
/// # Errors
///
/// Returns `DefenseError::NoDefenders` for an empty team.
pub fn toll(team: Ally, loyal: Ally) -> Result<usize, DefenseError> {
    let n = u32::try_from(team.len()).unwrap_or(u32::MAX);
    if n == 0 {
        return Err(DefenseError::NoDefenders);
    }
    let s = total_score(team, loyal);
    // mean < k  <=>  s < k * n
    let below = |num: u32, den: u32| s * den < num * n;
    let toll = match n {
        1 => usize::from(below(2, 1)),
        2 => {
            if s == 0 {
                2
            } else {
                usize::from(below(2, 1))
            }
        }
        3 => {
            if s == 0 {
                3
            } else if below(1, 1) {
                2
            } else {
                usize::from(below(2, 1))
            }
        }
        4 => {
            if s == 0 {
                4
            } else if below(1, 2) {
                3
            } else if s <= n {
                2
            } else {
                usize::from(below(2, 1))
            }
        }
        _ => {
            if below(1, 2) {
                3
            } else if below(3, 2) {
                2
            } else {
                usize::from(below(2, 1))
            }
        }
    };
    Ok(toll)
}

/// The defenders who die: disloyal ones first, each group in
/// [`DEFENSE_PRIORITY`] order.
///
/// # Errors
///
/// Returns `DefenseError::NoDefenders` for an empty team.
pub fn victims(team: Ally, loyal: Ally) -> Result<Ally, DefenseError> {
    let toll = toll(team, loyal)?;
    let disloyal = team - loyal;
    let faithful = team & loyal;
    let ordered = DEFENSE_PRIORITY
        .iter()
        .filter(|ally| disloyal.contains(**ally))
        .chain(DEFENSE_PRIORITY.iter().filter(|ally| faithful.contains(**ally)));
    Ok(ordered.take(toll).copied().collect())
}
