//! Who dies, and who is guaranteed to live, for each decision.
//!
//! [`resolve`] is a pure function of the step, the state before it and the
//! chosen field value. All ordering comes from the fixed priority lists below.

use crate::ally::Ally;
use crate::defense;
use crate::tree::{Context, EngineError, Step};

/// Killed when the hull is left unarmored.
pub const ARMOR_PRIORITY: [Ally; 1] = [Ally::JACK];

/// Killed in the cargo bay when the shields were not upgraded.
pub const SHIELD_PRIORITY: [Ally; 9] = [
    Ally::KASUMI,
    Ally::LEGION,
    Ally::TALI,
    Ally::THANE,
    Ally::GARRUS,
    Ally::ZAEED,
    Ally::GRUNT,
    Ally::SAMARA,
    Ally::MORINTH,
];

/// Killed when the main gun was not upgraded.
pub const WEAPON_PRIORITY: [Ally; 7] = [
    Ally::THANE,
    Ally::GARRUS,
    Ally::ZAEED,
    Ally::GRUNT,
    Ally::JACK,
    Ally::SAMARA,
    Ally::MORINTH,
];

/// Killed by the swarms when the biotic barrier fails.
pub const LONG_WALK_PRIORITY: [Ally; 12] = [
    Ally::THANE,
    Ally::JACK,
    Ally::GARRUS,
    Ally::LEGION,
    Ally::GRUNT,
    Ally::SAMARA,
    Ally::JACOB,
    Ally::MORDIN,
    Ally::TALI,
    Ally::KASUMI,
    Ally::ZAEED,
    Ally::MORINTH,
];

/// Newly decided allies for one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fate {
    pub dead: Ally,
    pub spared: Ally,
}

impl Fate {
    pub const NONE: Self = Self {
        dead: Ally::NOBODY,
        spared: Ally::NOBODY,
    };

    #[must_use]
    pub const fn killed(dead: Ally) -> Self {
        Self {
            dead,
            spared: Ally::NOBODY,
        }
    }

    #[must_use]
    pub const fn saved(spared: Ally) -> Self {
        Self {
            dead: Ally::NOBODY,
            spared,
        }
    }
}

/// Resolves the casualties of choosing `value` at `step`.
///
/// # Errors
///
/// Returns an `EngineError` when the choice or the state is inconsistent:
/// an inactive or unknown ally, a priority list with no eligible victim, or
/// an empty defense team.
pub fn resolve(step: Step, ctx: &Context, value: u16) -> Result<Fate, EngineError> {
    let active = ctx.team.active;
    match step {
        Step::Recruitment | Step::Loyalty | Step::Shield | Step::Rescue | Step::CrewDelay => {
            Ok(Fate::NONE)
        }
        Step::Morinth => {
            if value == 0 {
                return Ok(Fate::NONE);
            }
            if !(active.contains(Ally::SAMARA) && ctx.is_loyal(Ally::SAMARA)) {
                return Err(EngineError::IllegalChoice { step, value });
            }
            Ok(Fate::killed(Ally::SAMARA))
        }
        Step::Armor => upgrade(step, value, &ARMOR_PRIORITY, active),
        Step::Weapon => upgrade(step, value, &WEAPON_PRIORITY, active),
        Step::CargoBay => {
            if value == 0 {
                return Ok(Fate::NONE);
            }
            nth_victim(step, &SHIELD_PRIORITY, active, value).map(Fate::killed)
        }
        Step::Tech => {
            let tech = selected(step, ctx, value)?;
            if ctx.is_loyal(tech) && Ally::IDEAL_TECHS.contains(tech) {
                Ok(Fate::NONE)
            } else {
                Ok(Fate::killed(tech))
            }
        }
        Step::FirstLeader => match value {
            0 | 1 => Ok(Fate::NONE),
            2 => {
                let tech = earlier_choice(ctx, Step::Tech)?;
                Ok(Fate::killed(tech))
            }
            _ => Err(EngineError::IllegalChoice { step, value }),
        },
        Step::Biotic | Step::SecondLeader => selected(step, ctx, value).map(|_| Fate::NONE),
        Step::Escort => {
            if value == 0 {
                return Ok(Fate::NONE);
            }
            let escort = selected(step, ctx, value)?;
            if ctx.is_loyal(escort) {
                Ok(Fate::saved(escort))
            } else {
                Ok(Fate::killed(escort))
            }
        }
        Step::LongWalk => long_walk(ctx, value),
        Step::FinalSquad => final_squad(ctx, value),
    }
}

fn upgrade(step: Step, value: u16, priority: &[Ally], active: Ally) -> Result<Fate, EngineError> {
    match value {
        1 => Ok(Fate::NONE),
        0 => nth_victim(step, priority, active, 1).map(Fate::killed),
        _ => Err(EngineError::IllegalChoice { step, value }),
    }
}

/// The `rank`-th (1-based) member of `pool` in priority order.
fn nth_victim(step: Step, priority: &[Ally], pool: Ally, rank: u16) -> Result<Ally, EngineError> {
    let skip = usize::from(rank.saturating_sub(1));
    priority
        .iter()
        .copied()
        .filter(|ally| pool.contains(*ally))
        .nth(skip)
        .ok_or(EngineError::NoVictim { step })
}

/// The active ally named by an index-valued choice.
fn selected(step: Step, ctx: &Context, value: u16) -> Result<Ally, EngineError> {
    let ally = Ally::from_index(value).ok_or(EngineError::IllegalChoice { step, value })?;
    if ctx.team.active.contains(ally) {
        Ok(ally)
    } else {
        Err(EngineError::InactiveAlly { step, ally })
    }
}

fn earlier_choice(ctx: &Context, step: Step) -> Result<Ally, EngineError> {
    ctx.chosen_ally(step)
        .ok_or(EngineError::MissingChoice { step })
}

fn long_walk(ctx: &Context, value: u16) -> Result<Fate, EngineError> {
    let step = Step::LongWalk;
    let active = ctx.team.active;
    let leader = earlier_choice(ctx, Step::SecondLeader)?;

    let mut dead = Ally::NOBODY;
    if value > 0 {
        let pool = active - ctx.specialists();
        dead = nth_victim(step, &LONG_WALK_PRIORITY, pool, value)?;
    }

    let survivors = active - dead;
    let leader_lives = (ctx.is_loyal(leader) && Ally::IDEAL_LEADERS.contains(leader))
        || Ally::IMMORTAL_LEADERS.contains(leader)
        || survivors.len() < 4;
    if !leader_lives {
        dead |= leader;
    }
    Ok(Fate::killed(dead))
}

fn final_squad(ctx: &Context, value: u16) -> Result<Fate, EngineError> {
    let step = Step::FinalSquad;
    let active = ctx.team.active;
    let squad = Ally::from_bits(value)
        .filter(|squad| squad.len() == 2)
        .ok_or(EngineError::IllegalChoice { step, value })?;
    if !active.contains(squad) {
        return Err(EngineError::InactiveAlly {
            step,
            ally: squad - active,
        });
    }

    let defenders = active - squad;
    let fallen =
        defense::victims(defenders, ctx.loyal).map_err(|_| EngineError::EmptyDefense)?;
    let dead = fallen | (squad - ctx.loyal);
    Ok(Fate {
        dead,
        spared: active - dead,
    })
}
