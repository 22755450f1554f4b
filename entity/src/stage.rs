use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline stage of a deal. Variant order is the board's column order.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Prospecting,
    Qualification,
    NeedsAnalysis,
    Proposal,
    Negotiation,
    ClosedWon,
    ClosedLost,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown pipeline stage `{0}`")]
pub struct ParseStageError(pub String);

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Prospecting,
        Stage::Qualification,
        Stage::NeedsAnalysis,
        Stage::Proposal,
        Stage::Negotiation,
        Stage::ClosedWon,
        Stage::ClosedLost,
    ];

    /// Wire name used by the opportunity API.
    pub fn key(self) -> &'static str {
        match self {
            Stage::Prospecting => "PROSPECTING",
            Stage::Qualification => "QUALIFICATION",
            Stage::NeedsAnalysis => "NEEDS_ANALYSIS",
            Stage::Proposal => "PROPOSAL",
            Stage::Negotiation => "NEGOTIATION",
            Stage::ClosedWon => "CLOSED_WON",
            Stage::ClosedLost => "CLOSED_LOST",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Prospecting => "Prospecting",
            Stage::Qualification => "Qualification",
            Stage::NeedsAnalysis => "Needs Analysis",
            Stage::Proposal => "Proposal",
            Stage::Negotiation => "Negotiation",
            Stage::ClosedWon => "Closed Won",
            Stage::ClosedLost => "Closed Lost",
        }
    }

    /// Column index in [`Stage::ALL`].
    pub fn position(self) -> usize {
        self as usize
    }

    pub fn is_won(self) -> bool {
        matches!(self, Stage::ClosedWon)
    }

    pub fn is_closed(self) -> bool {
        matches!(self, Stage::ClosedWon | Stage::ClosedLost)
    }

    /// Probability the opportunity API assigns when a deal enters the stage.
    pub fn default_probability(self) -> u8 {
        match self {
            Stage::Prospecting => 10,
            Stage::Qualification => 20,
            Stage::NeedsAnalysis => 40,
            Stage::Proposal => 60,
            Stage::Negotiation => 80,
            Stage::ClosedWon => 100,
            Stage::ClosedLost => 0,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Stage {
    type Err = ParseStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Stage::ALL
            .into_iter()
            .find(|stage| stage.key() == normalized)
            .ok_or_else(|| ParseStageError(s.to_string()))
    }
}
