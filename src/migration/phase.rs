use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// The four operator-selected migration operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Seed,
    Sync,
    Reconcile,
    Mirror,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Seed, Phase::Sync, Phase::Reconcile, Phase::Mirror];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Seed => "SEED",
            Phase::Sync => "SYNC",
            Phase::Reconcile => "RECONCILE",
            Phase::Mirror => "MIRROR",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        Phase::ALL
            .into_iter()
            .find(|phase| phase.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| "expected one of SEED, SYNC, RECONCILE, MIRROR".to_string())
    }

    /// RECONCILE copies back from the destination to the source.
    pub fn is_reversed(self) -> bool {
        self == Phase::Reconcile
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::parse(s)
    }
}

impl Serialize for Phase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Phase {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Phase::parse(&raw).map_err(|err| D::Error::custom(format!("invalid phase `{raw}`: {err}")))
    }
}
