//! The thirteen squad members as a compact bitset.
//!
//! Every team, loyalty assignment and priority lookup in the engine is an
//! [`Ally`] value. A single ally is a set with exactly one bit; bit order is
//! the canonical numbering used for iteration, 1-based indices and masks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not, Sub, SubAssign};
use std::str::FromStr;
use thiserror::Error;

/// Number of distinct allies.
pub const ALLY_COUNT: usize = 13;

const NAMES: [&str; ALLY_COUNT] = [
    "Garrus", "Jacob", "Miranda", "Jack", "Mordin", "Grunt", "Kasumi", "Legion", "Samara", "Tali",
    "Thane", "Zaeed", "Morinth",
];

/// A set of allies. Bits above [`Ally::EVERYONE`] are never set.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Ally(u16);

impl Ally {
    pub const GARRUS: Self = Self(1 << 0);
    pub const JACOB: Self = Self(1 << 1);
    pub const MIRANDA: Self = Self(1 << 2);
    pub const JACK: Self = Self(1 << 3);
    pub const MORDIN: Self = Self(1 << 4);
    pub const GRUNT: Self = Self(1 << 5);
    pub const KASUMI: Self = Self(1 << 6);
    pub const LEGION: Self = Self(1 << 7);
    pub const SAMARA: Self = Self(1 << 8);
    pub const TALI: Self = Self(1 << 9);
    pub const THANE: Self = Self(1 << 10);
    pub const ZAEED: Self = Self(1 << 11);
    pub const MORINTH: Self = Self(1 << 12);

    pub const NOBODY: Self = Self(0);
    pub const EVERYONE: Self = Self(0x1FFF);

    /// Always part of the team.
    pub const REQUIRED: Self = Self(0x001F);
    /// May or may not join, Morinth included.
    pub const OPTIONAL: Self = Self(0x1FE0);
    /// Chosen during recruitment. Morinth only ever replaces Samara.
    pub const RECRUITABLE: Self = Self(0x0FE0);
    /// Allies with a loyalty mission. Morinth is implicitly loyal.
    pub const LOYALTY: Self = Self(0x0FFF);

    /// Garrus, Jacob, Miranda.
    pub const IDEAL_LEADERS: Self = Self(0x0007);
    /// Kasumi, Legion, Tali.
    pub const IDEAL_TECHS: Self = Self(0x02C0);
    /// Jack, Samara, Morinth.
    pub const IDEAL_BIOTICS: Self = Self(0x1108);
    /// Everyone who can be sent through the ventilation shafts.
    pub const TECHS: Self = Self(0x06D3);
    /// Everyone who can hold the biotic barrier.
    pub const BIOTICS: Self = Self(0x150E);
    /// Everyone but Miranda.
    pub const ESCORTS: Self = Self(0x1FFB);
    /// Second fireteam leaders who never die leading.
    pub const IMMORTAL_LEADERS: Self = Self::MIRANDA;

    /// Builds a set from raw bits, rejecting bits above the thirteenth.
    #[must_use]
    pub const fn from_bits(bits: u16) -> Option<Self> {
        if bits & !Self::EVERYONE.0 == 0 {
            Some(Self(bits))
        } else {
            None
        }
    }

    /// Builds a set from raw bits, dropping anything above the thirteenth.
    #[must_use]
    pub const fn from_bits_truncate(bits: u16) -> Self {
        Self(bits & Self::EVERYONE.0)
    }

    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every member of `other` is in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[must_use]
    pub const fn is_single(self) -> bool {
        self.0.count_ones() == 1
    }

    /// The lowest-numbered member.
    #[must_use]
    pub const fn first(self) -> Option<Self> {
        if self.0 == 0 {
            None
        } else {
            Some(Self(self.0 & self.0.wrapping_neg()))
        }
    }

    /// 1-based index of a single ally, `None` for any other set.
    #[must_use]
    pub const fn index(self) -> Option<u8> {
        if self.is_single() {
            Some(self.0.trailing_zeros() as u8 + 1)
        } else {
            None
        }
    }

    /// Inverse of [`Ally::index`].
    #[must_use]
    pub const fn from_index(index: u16) -> Option<Self> {
        if index >= 1 && index as usize <= ALLY_COUNT {
            Some(Self(1 << (index - 1)))
        } else {
            None
        }
    }

    /// Display name of a single ally.
    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        self.index().map(|i| NAMES[usize::from(i) - 1])
    }

    /// Single allies in bit order.
    #[must_use]
    pub const fn iter(self) -> Members {
        Members { rest: self.0 }
    }

    /// Every `k`-member subset, in lexicographic order of bit positions.
    #[must_use]
    pub fn combinations(self, k: usize) -> Combinations {
        Combinations::new(self, k)
    }

    /// Every subset, in ascending numeric order, starting with the empty set.
    #[must_use]
    pub const fn subsets(self) -> Subsets {
        Subsets {
            mask: self.0,
            next: Some(0),
        }
    }

    /// Parses a comma-separated list of names. `none`/`nobody` and the empty
    /// string are the empty set; `all`/`everyone` is every ally.
    ///
    /// # Errors
    ///
    /// Returns `AllyParseError` for the first name that is not an ally.
    pub fn parse_list(input: &str) -> Result<Self, AllyParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case("none")
            || trimmed.eq_ignore_ascii_case("nobody")
        {
            return Ok(Self::NOBODY);
        }
        if trimmed.eq_ignore_ascii_case("all") || trimmed.eq_ignore_ascii_case("everyone") {
            return Ok(Self::EVERYONE);
        }
        trimmed
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .try_fold(Self::NOBODY, |acc, part| Ok(acc | part.parse::<Self>()?))
    }
}

impl BitOr for Ally {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Ally {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Ally {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for Ally {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl Not for Ally {
    type Output = Self;
    fn not(self) -> Self {
        Self(!self.0 & Self::EVERYONE.0)
    }
}

/// Set difference.
impl Sub for Ally {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 & !rhs.0)
    }
}

impl SubAssign for Ally {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 &= !rhs.0;
    }
}

impl IntoIterator for Ally {
    type Item = Self;
    type IntoIter = Members;
    fn into_iter(self) -> Members {
        self.iter()
    }
}

impl FromIterator<Self> for Ally {
    fn from_iter<I: IntoIterator<Item = Self>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NOBODY, |acc, ally| acc | ally)
    }
}

impl fmt::Display for Ally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("nobody");
        }
        for (i, ally) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(ally.name().unwrap_or("?"))?;
        }
        Ok(())
    }
}

/// Error returned when a name does not match any ally.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown ally '{name}'")]
pub struct AllyParseError {
    pub name: String,
}

impl FromStr for Ally {
    type Err = AllyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        NAMES
            .iter()
            .position(|candidate| candidate.eq_ignore_ascii_case(name))
            .map(|i| Self(1 << i))
            .ok_or_else(|| AllyParseError {
                name: name.to_string(),
            })
    }
}

/// Iterator over the single members of a set.
#[derive(Debug, Clone)]
pub struct Members {
    rest: u16,
}

impl Iterator for Members {
    type Item = Ally;

    fn next(&mut self) -> Option<Ally> {
        if self.rest == 0 {
            return None;
        }
        let low = self.rest & self.rest.wrapping_neg();
        self.rest &= !low;
        Some(Ally(low))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.rest.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Members {}

/// Iterator over fixed-size subsets; see [`Ally::combinations`].
#[derive(Debug, Clone)]
pub struct Combinations {
    members: [u16; ALLY_COUNT],
    n: usize,
    k: usize,
    picks: [usize; ALLY_COUNT],
    done: bool,
}

impl Combinations {
    fn new(set: Ally, k: usize) -> Self {
        let mut members = [0u16; ALLY_COUNT];
        let mut n = 0;
        for ally in set {
            members[n] = ally.0;
            n += 1;
        }
        let mut picks = [0usize; ALLY_COUNT];
        for (i, pick) in picks.iter_mut().enumerate().take(k.min(ALLY_COUNT)) {
            *pick = i;
        }
        Self {
            members,
            n,
            k,
            picks,
            done: k > n,
        }
    }
}

impl Iterator for Combinations {
    type Item = Ally;

    fn next(&mut self) -> Option<Ally> {
        if self.done {
            return None;
        }
        let k = self.k;
        let current = self.picks[..k]
            .iter()
            .fold(0u16, |acc, &i| acc | self.members[i]);

        // Advance to the next index tuple: bump the rightmost index that still
        // has room, then reset everything after it.
        let mut slot = k;
        loop {
            if slot == 0 {
                self.done = true;
                break;
            }
            slot -= 1;
            if self.picks[slot] < self.n - k + slot {
                self.picks[slot] += 1;
                for j in slot + 1..k {
                    self.picks[j] = self.picks[j - 1] + 1;
                }
                break;
            }
        }
        Some(Ally(current))
    }
}

/// Iterator over all submasks; see [`Ally::subsets`].
#[derive(Debug, Clone)]
pub struct Subsets {
    mask: u16,
    next: Option<u16>,
}

impl Iterator for Subsets {
    type Item = Ally;

    fn next(&mut self) -> Option<Ally> {
        let current = self.next?;
        let following = current.wrapping_sub(self.mask) & self.mask;
        self.next = (following != 0).then_some(following);
        Some(Ally(current))
    }
}
