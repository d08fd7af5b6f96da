//! Conversation session identifiers and allocation strategies.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Integer id threading every message between one buyer and one seller
/// about one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl SessionId {
    /// The id following this one in the legacy global sequence.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// How a new session id is chosen when the server has none for a triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAllocation {
    /// Deterministic id derived from the (product, buyer, seller) triple.
    #[default]
    Derived,
    /// Read the global maximum and propose `max + 1`. Racy: two clients
    /// allocating at once can receive the same id for different triples.
    GlobalMaxPlusOne,
}

impl fmt::Display for SessionAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionAllocation::Derived => write!(f, "derived"),
            SessionAllocation::GlobalMaxPlusOne => write!(f, "global_max_plus_one"),
        }
    }
}

impl FromStr for SessionAllocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "derived" => Ok(SessionAllocation::Derived),
            "global_max_plus_one" => Ok(SessionAllocation::GlobalMaxPlusOne),
            other => Err(format!("invalid session allocation: '{other}'")),
        }
    }
}
