//! The sixteen decisions, their field layout and their candidate sets.

use super::context::Context;
use crate::ally::Ally;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Candidate field values for one step, in canonical order.
pub type Candidates = SmallVec<[u16; 16]>;

/// Smallest number of optional recruits that can finish the mission.
pub const MIN_RECRUITS: usize = 3;

/// One decision point. Declaration order is traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Recruitment,
    Loyalty,
    Morinth,
    Armor,
    Shield,
    CargoBay,
    Weapon,
    Tech,
    FirstLeader,
    Biotic,
    SecondLeader,
    Rescue,
    Escort,
    CrewDelay,
    LongWalk,
    FinalSquad,
}

impl Step {
    pub const COUNT: usize = 16;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Recruitment,
        Self::Loyalty,
        Self::Morinth,
        Self::Armor,
        Self::Shield,
        Self::CargoBay,
        Self::Weapon,
        Self::Tech,
        Self::FirstLeader,
        Self::Biotic,
        Self::SecondLeader,
        Self::Rescue,
        Self::Escort,
        Self::CrewDelay,
        Self::LongWalk,
        Self::FinalSquad,
    ];

    /// Total width of every field.
    pub const ALL_WIDTHS: u32 = {
        let mut total = 0;
        let mut i = 0;
        while i < Self::COUNT {
            total += Self::ALL[i].width();
            i += 1;
        }
        total
    };

    /// Zero-based position in traversal order.
    #[must_use]
    pub const fn position(self) -> usize {
        self as usize
    }

    /// Bits reserved for this step's field value.
    #[must_use]
    pub const fn width(self) -> u32 {
        match self {
            Self::Recruitment => 8,
            Self::Loyalty => 12,
            Self::Morinth | Self::Armor | Self::Shield | Self::Weapon | Self::Rescue => 1,
            Self::CargoBay | Self::FirstLeader | Self::CrewDelay | Self::LongWalk => 2,
            Self::Tech | Self::Biotic | Self::SecondLeader | Self::Escort => 4,
            Self::FinalSquad => 13,
        }
    }

    /// Bit offset of this step's field inside a traversal code.
    #[must_use]
    pub const fn offset(self) -> u32 {
        let mut offset = 0;
        let mut i = 0;
        while i < self.position() {
            offset += Self::ALL[i].width();
            i += 1;
        }
        offset
    }

    /// The step after this one, `None` after the final squad.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        let i = self.position() + 1;
        if i < Self::COUNT {
            Some(Self::ALL[i])
        } else {
            None
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Recruitment => "recruitment",
            Self::Loyalty => "loyalty",
            Self::Morinth => "morinth",
            Self::Armor => "armor",
            Self::Shield => "shield",
            Self::CargoBay => "cargo_bay",
            Self::Weapon => "weapon",
            Self::Tech => "tech",
            Self::FirstLeader => "first_leader",
            Self::Biotic => "biotic",
            Self::SecondLeader => "second_leader",
            Self::Rescue => "rescue",
            Self::Escort => "escort",
            Self::CrewDelay => "crew_delay",
            Self::LongWalk => "long_walk",
            Self::FinalSquad => "final_squad",
        }
    }

    /// Every legal field value for this step given the state before it.
    ///
    /// A step whose precondition does not hold yields the single skip value
    /// `0`. An empty list means the state is inconsistent.
    #[must_use]
    pub fn candidates(self, ctx: &Context) -> Candidates {
        let active = ctx.team.active;
        match self {
            Self::Recruitment => (MIN_RECRUITS..=Ally::RECRUITABLE.len())
                .flat_map(|k| Ally::RECRUITABLE.combinations(k))
                .map(compress_recruits)
                .collect(),
            Self::Loyalty => (active & Ally::LOYALTY)
                .subsets()
                .map(Ally::bits)
                .collect(),
            Self::Morinth => {
                let mut values = Candidates::from_slice(&[0]);
                if active.contains(Ally::SAMARA) && ctx.is_loyal(Ally::SAMARA) {
                    values.push(1);
                }
                values
            }
            Self::Armor | Self::Shield | Self::Weapon => Candidates::from_slice(&[1, 0]),
            Self::CargoBay => {
                if ctx.choice(Self::Shield) == 1 {
                    return Candidates::from_slice(&[0]);
                }
                let exposed = (active & shield_exposed()).len().min(3);
                (1..=exposed as u16).collect()
            }
            Self::Tech => indices(active & Ally::TECHS),
            Self::FirstLeader => {
                let Some(tech) = ctx.chosen_ally(Self::Tech) else {
                    return Candidates::new();
                };
                if !(ctx.is_loyal(tech) && Ally::IDEAL_TECHS.contains(tech)) {
                    return Candidates::from_slice(&[0]);
                }
                let others = active - tech;
                let ideal = others & ctx.loyal & Ally::IDEAL_LEADERS;
                let mut values = Candidates::new();
                if !ideal.is_empty() {
                    values.push(1);
                }
                if !(others - ideal).is_empty() {
                    values.push(2);
                }
                values
            }
            Self::Biotic => indices(active & Ally::BIOTICS),
            Self::SecondLeader => match ctx.chosen_ally(Self::Biotic) {
                Some(biotic) => indices(active - biotic),
                None => Candidates::new(),
            },
            Self::Rescue => {
                let mut values = Candidates::from_slice(&[0]);
                if active.len() > 4 {
                    values.push(1);
                }
                values
            }
            Self::Escort => {
                if ctx.choice(Self::Rescue) == 0 {
                    return Candidates::from_slice(&[0]);
                }
                indices((active & Ally::ESCORTS) - ctx.specialists())
            }
            Self::CrewDelay => {
                if ctx.choice(Self::Rescue) == 0 {
                    Candidates::from_slice(&[0])
                } else {
                    Candidates::from_slice(&[1, 2, 3])
                }
            }
            Self::LongWalk => {
                let Some(biotic) = ctx.chosen_ally(Self::Biotic) else {
                    return Candidates::new();
                };
                if ctx.is_loyal(biotic) && Ally::IDEAL_BIOTICS.contains(biotic) {
                    return Candidates::from_slice(&[0]);
                }
                let pool = (active - ctx.specialists()).len();
                if pool < 3 {
                    Candidates::from_slice(&[1])
                } else {
                    (1..=(pool - 1).min(3) as u16).collect()
                }
            }
            Self::FinalSquad => active.combinations(2).map(Ally::bits).collect(),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Recruitment field value for a set of optional recruits.
#[must_use]
pub const fn compress_recruits(recruits: Ally) -> u16 {
    (recruits.bits() & Ally::RECRUITABLE.bits()) >> 5
}

/// Inverse of [`compress_recruits`].
#[must_use]
pub const fn expand_recruits(value: u16) -> Ally {
    Ally::from_bits_truncate((value << 5) & Ally::RECRUITABLE.bits())
}

const fn shield_exposed() -> Ally {
    Ally::from_bits_truncate(
        Ally::KASUMI.bits()
            | Ally::LEGION.bits()
            | Ally::TALI.bits()
            | Ally::THANE.bits()
            | Ally::GARRUS.bits()
            | Ally::ZAEED.bits()
            | Ally::GRUNT.bits()
            | Ally::SAMARA.bits()
            | Ally::MORINTH.bits(),
    )
}

fn indices(set: Ally) -> Candidates {
    set.iter()
        .filter_map(Ally::index)
        .map(u16::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Traversal;
    use crate::tree::context::Team;

    fn ctx_with(active: Ally, loyal: Ally, choices: &[(Step, u16)]) -> Context {
        let mut traversal = Traversal::new();
        for &(step, value) in choices {
            traversal.set(step, value).unwrap();
        }
        Context {
            team: Team {
                active,
                ..Team::default()
            },
            loyal,
            traversal,
        }
    }

    #[test]
    fn offsets_follow_widths() {
        assert_eq!(Step::Recruitment.offset(), 0);
        assert_eq!(Step::Loyalty.offset(), 8);
        assert_eq!(Step::Tech.offset(), 26);
        assert_eq!(Step::FinalSquad.offset(), 49);
        assert_eq!(Step::ALL_WIDTHS, 62);
        assert_eq!(Step::FinalSquad.next(), None);
        assert_eq!(Step::Recruitment.next(), Some(Step::Loyalty));
    }

    #[test]
    fn recruitment_covers_every_viable_subset() {
        let values = Step::Recruitment.candidates(&Context::root());
        assert_eq!(values.len(), 99);
        assert_eq!(values[0], compress_recruits(Ally::GRUNT | Ally::KASUMI | Ally::LEGION));
        assert_eq!(*values.last().unwrap(), 0x7F);
        assert_eq!(expand_recruits(0x7F), Ally::RECRUITABLE);
    }

    #[test]
    fn loyalty_enumerates_active_subsets() {
        let active = Ally::REQUIRED | Ally::GRUNT | Ally::TALI | Ally::ZAEED;
        let values = Step::Loyalty.candidates(&ctx_with(active, Ally::NOBODY, &[]));
        assert_eq!(values.len(), 256);
        assert_eq!(values[0], 0);
        assert_eq!(*values.last().unwrap(), active.bits());
    }

    #[test]
    fn morinth_needs_a_loyal_samara() {
        let active = Ally::REQUIRED | Ally::SAMARA | Ally::TALI | Ally::ZAEED;
        let disloyal = ctx_with(active, Ally::MORINTH, &[]);
        assert_eq!(Step::Morinth.candidates(&disloyal).as_slice(), &[0]);
        let loyal = ctx_with(active, Ally::SAMARA | Ally::MORINTH, &[]);
        assert_eq!(Step::Morinth.candidates(&loyal).as_slice(), &[0, 1]);
    }

    #[test]
    fn cargo_bay_only_without_shields() {
        let active = Ally::REQUIRED | Ally::GRUNT | Ally::TALI | Ally::ZAEED;
        let shielded = ctx_with(active, Ally::NOBODY, &[(Step::Shield, 1)]);
        assert_eq!(Step::CargoBay.candidates(&shielded).as_slice(), &[0]);
        let exposed = ctx_with(active, Ally::NOBODY, &[(Step::Shield, 0)]);
        assert_eq!(Step::CargoBay.candidates(&exposed).as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn first_leader_depends_on_the_tech() {
        let active = Ally::REQUIRED | Ally::GRUNT | Ally::TALI | Ally::ZAEED;
        let tali = u16::from(Ally::TALI.index().unwrap());
        let disloyal = ctx_with(active, Ally::MORINTH, &[(Step::Tech, tali)]);
        assert_eq!(Step::FirstLeader.candidates(&disloyal).as_slice(), &[0]);

        let loyal = ctx_with(active, Ally::TALI | Ally::GARRUS, &[(Step::Tech, tali)]);
        assert_eq!(Step::FirstLeader.candidates(&loyal).as_slice(), &[1, 2]);

        let no_leaders = ctx_with(active, Ally::TALI, &[(Step::Tech, tali)]);
        assert_eq!(Step::FirstLeader.candidates(&no_leaders).as_slice(), &[2]);
    }

    #[test]
    fn escort_excludes_specialists_and_miranda() {
        let active = Ally::REQUIRED | Ally::GRUNT;
        let jack = u16::from(Ally::JACK.index().unwrap());
        let garrus = u16::from(Ally::GARRUS.index().unwrap());
        let ctx = ctx_with(
            active,
            Ally::NOBODY,
            &[
                (Step::Biotic, jack),
                (Step::SecondLeader, garrus),
                (Step::Rescue, 1),
            ],
        );
        let expected: Vec<u16> = [Ally::JACOB, Ally::MORDIN, Ally::GRUNT]
            .iter()
            .map(|a| u16::from(a.index().unwrap()))
            .collect();
        assert_eq!(Step::Escort.candidates(&ctx).to_vec(), expected);
        assert_eq!(Step::CrewDelay.candidates(&ctx).as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn long_walk_ranks_shrink_with_the_pool() {
        let jacob = u16::from(Ally::JACOB.index().unwrap());
        let garrus = u16::from(Ally::GARRUS.index().unwrap());
        let choices = [(Step::Biotic, jacob), (Step::SecondLeader, garrus)];

        let big = ctx_with(Ally::EVERYONE - Ally::MORINTH, Ally::NOBODY, &choices);
        assert_eq!(Step::LongWalk.candidates(&big).as_slice(), &[1, 2, 3]);

        let three = Ally::GARRUS | Ally::JACOB | Ally::MIRANDA | Ally::JACK | Ally::MORDIN;
        let ctx = ctx_with(three, Ally::NOBODY, &choices);
        assert_eq!(Step::LongWalk.candidates(&ctx).as_slice(), &[1, 2]);

        let two = Ally::GARRUS | Ally::JACOB | Ally::MIRANDA | Ally::JACK;
        let ctx = ctx_with(two, Ally::NOBODY, &choices);
        assert_eq!(Step::LongWalk.candidates(&ctx).as_slice(), &[1]);

        let jack = u16::from(Ally::JACK.index().unwrap());
        let ideal = ctx_with(three, Ally::JACK, &[(Step::Biotic, jack)]);
        assert_eq!(Step::LongWalk.candidates(&ideal).as_slice(), &[0]);
    }

    #[test]
    fn final_squad_pairs() {
        let active = Ally::GARRUS | Ally::TALI | Ally::ZAEED;
        let values = Step::FinalSquad.candidates(&ctx_with(active, Ally::NOBODY, &[]));
        assert_eq!(values.as_slice(), &[0x201, 0x801, 0xA00]);
    }
}
