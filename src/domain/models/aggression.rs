//! Aggression tiers for the transformation stage.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::DomainError;

/// How hard the transformation stage is allowed to push.
///
/// Tiers are ordinal: `gentle` (1) through `nuclear` (5). Which concrete
/// strategy runs at each tier is configuration; the loop only guarantees
/// the tier never decreases within a unit's lifetime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum AggressionLevel {
    /// Tier 1: light lexical substitution.
    #[default]
    Gentle,
    /// Tier 2: sentence restructuring.
    Moderate,
    /// Tier 3: extensive rewriting.
    Aggressive,
    /// Tier 4: multi-layered transformation.
    Intensive,
    /// Tier 5: cross-language round trip.
    Nuclear,
}

impl AggressionLevel {
    /// The highest configured tier.
    pub const MAX: Self = Self::Nuclear;

    /// All levels in escalation order.
    pub const ALL: [Self; 5] = [
        Self::Gentle,
        Self::Moderate,
        Self::Aggressive,
        Self::Intensive,
        Self::Nuclear,
    ];

    /// One-based ordinal of the tier.
    pub const fn tier(self) -> u8 {
        match self {
            Self::Gentle => 1,
            Self::Moderate => 2,
            Self::Aggressive => 3,
            Self::Intensive => 4,
            Self::Nuclear => 5,
        }
    }

    /// Level for a one-based ordinal, if in range.
    pub const fn from_tier(tier: u8) -> Option<Self> {
        match tier {
            1 => Some(Self::Gentle),
            2 => Some(Self::Moderate),
            3 => Some(Self::Aggressive),
            4 => Some(Self::Intensive),
            5 => Some(Self::Nuclear),
            _ => None,
        }
    }

    /// The next tier up, or `None` at the ceiling.
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Gentle => Some(Self::Moderate),
            Self::Moderate => Some(Self::Aggressive),
            Self::Aggressive => Some(Self::Intensive),
            Self::Intensive => Some(Self::Nuclear),
            Self::Nuclear => None,
        }
    }

    /// Stable string form used in storage and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gentle => "gentle",
            Self::Moderate => "moderate",
            Self::Aggressive => "aggressive",
            Self::Intensive => "intensive",
            Self::Nuclear => "nuclear",
        }
    }
}

impl fmt::Display for AggressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AggressionLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gentle" => Ok(Self::Gentle),
            "moderate" => Ok(Self::Moderate),
            "aggressive" => Ok(Self::Aggressive),
            "intensive" => Ok(Self::Intensive),
            "nuclear" => Ok(Self::Nuclear),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown aggression level: {other}"
            ))),
        }
    }
}
