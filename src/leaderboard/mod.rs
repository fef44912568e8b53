pub mod client;
pub mod diff;
pub mod render;

use core::fmt;
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Substituted for members who haven't set a public name
pub const ANONYMOUS: &str = "Anonymous";

/// Whole private leaderboard as returned by a single fetch.
///
/// Mirrors the remote JSON so that a snapshot can be written back out to the cache in the same
/// shape it was received in. `fetched_at` is ours and never leaves the process as part of the
/// body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(skip)]
    pub fetched_at: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<u64>,

    /// `<member_id, member>`
    pub members: BTreeMap<String, Member>,
}

impl Snapshot {
    /// Members with at least one star
    pub fn active_members(&self) -> impl Iterator<Item = (&String, &Member)> {
        self.members.iter().filter(|(_, member)| member.stars > 0)
    }

    /// Highest day number any active member has a completion entry for
    pub fn max_active_day(&self) -> u32 {
        self.active_members()
            .filter_map(|(_, member)| member.completion_day_level.keys().next_back().copied())
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// `null` for anonymous users
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub stars: u32,

    #[serde(default)]
    pub local_score: i64,

    /// `<day, completion>`
    #[serde(default)]
    pub completion_day_level: BTreeMap<u32, DayCompletion>,
}

impl Member {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(ANONYMOUS)
    }

    /// A day with part 2 counts as complete even when part 1 is missing from the data
    pub fn day_status(&self, day: u32) -> DayStatus {
        match self.completion_day_level.get(&day) {
            Some(day) if day.parts.contains_key(&2) => DayStatus::Both,
            Some(day) if day.earned() > 0 => DayStatus::One,
            _ => DayStatus::None,
        }
    }
}

/// Stars earned on a single day, keyed by part number
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayCompletion {
    pub parts: BTreeMap<u8, Star>,
}

impl DayCompletion {
    pub fn earned(&self) -> usize {
        self.parts.len()
    }

    /// `(part, earned_at)` pairs in ascending part order
    pub fn timestamps(&self) -> impl Iterator<Item = (u8, i64)> + '_ {
        self.parts.iter().map(|(part, star)| (*part, star.get_star_ts))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Star {
    /// Seconds since the epoch. The API has sent this both as a number and as a string of
    /// digits, so both are accepted.
    #[serde(deserialize_with = "de_star_ts")]
    pub get_star_ts: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub star_index: Option<u64>,
}

impl Star {
    pub fn at(get_star_ts: i64) -> Self {
        Self {
            get_star_ts,
            star_index: None,
        }
    }
}

fn de_star_ts<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTs {
        Int(i64),
        Text(String),
    }

    match RawTs::deserialize(deserializer)? {
        RawTs::Int(ts) => Ok(ts),
        RawTs::Text(text) => text.trim().parse::<i64>().map_err(|e| {
            serde::de::Error::custom(format_args!("{e}: while parsing get_star_ts '{text}'"))
        }),
    }
}

/// Completion state of one day for one member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayStatus {
    Both,
    One,
    None,
}

/// One member finishing one part of one day after the last checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Achievement {
    pub member_id: String,
    pub name: String,
    pub day: u32,
    pub part: u8,
    pub earned_at: i64,
}

impl Achievement {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Achievement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} completed Day {} Part {} at {}!",
            self.name, self.day, self.part, self.earned_at
        )
    }
}
