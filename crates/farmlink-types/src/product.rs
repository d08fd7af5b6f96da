//! Product listing and annotated quantity types.
//!
//! Listings store their stock as a single annotated string such as `"50 kg"`.
//! [`Quantity::parse`] splits it defensively into a magnitude and a unit.

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::{ProductId, UserId};

/// A product listing as seen by a buyer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    /// Annotated stock string, e.g. `"50 kg"` or `"12 crates"`.
    pub quantity: String,
    pub price: f64,
    /// Remote image reference (path or URL) for the listing photo.
    #[serde(default)]
    pub image: Option<String>,
    /// The seller who owns the listing.
    #[serde(alias = "user_id")]
    pub owner_id: UserId,
}

impl Product {
    /// Parsed view of the annotated stock string.
    pub fn parsed_quantity(&self) -> Quantity {
        Quantity::parse(&self.quantity)
    }
}

/// A stock amount split into magnitude and free-text unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity {
    pub magnitude: u32,
    pub unit: String,
}

impl Quantity {
    pub fn new(magnitude: u32, unit: impl Into<String>) -> Self {
        Self {
            magnitude,
            unit: unit.into(),
        }
    }

    /// Parse an annotated quantity string.
    ///
    /// The magnitude is the first run of ASCII digits (0 when there is none,
    /// saturating at `u32::MAX`); the unit is the trailing run of ASCII
    /// letters (empty when there is none). Never fails.
    pub fn parse(raw: &str) -> Self {
        let magnitude = raw
            .trim_start()
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .fold(0u32, |acc, c| {
                acc.saturating_mul(10)
                    .saturating_add(c.to_digit(10).unwrap_or(0))
            });

        let trimmed = raw.trim_end();
        let unit_start = trimmed
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_alphabetic())
            .last()
            .map(|(i, _)| i)
            .unwrap_or(trimmed.len());

        Self {
            magnitude,
            unit: trimmed[unit_start..].to_string(),
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit.is_empty() {
            write!(f, "{}", self.magnitude)
        } else {
            write!(f, "{} {}", self.magnitude, self.unit)
        }
    }
}
