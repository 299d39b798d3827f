//! Rotation angles accepted by the rotate operation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::ImageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    #[serde(rename = "-90")]
    CounterClockwise,
    #[serde(rename = "90")]
    Clockwise,
    #[serde(rename = "180")]
    HalfTurn,
}

impl Rotation {
    /// Degrees as passed to `-rotate`.
    pub fn degrees(self) -> i32 {
        match self {
            Rotation::CounterClockwise => -90,
            Rotation::Clockwise => 90,
            Rotation::HalfTurn => 180,
        }
    }

    pub fn transform_args(self) -> Vec<String> {
        vec!["-rotate".to_string(), self.degrees().to_string()]
    }

    /// Whether width and height are swapped.
    pub fn is_quarter_turn(self) -> bool {
        !matches!(self, Rotation::HalfTurn)
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Rotation::Clockwise
    }
}

impl FromStr for Rotation {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "-90" => Ok(Rotation::CounterClockwise),
            "90" => Ok(Rotation::Clockwise),
            "180" => Ok(Rotation::HalfTurn),
            other => Err(ImageError::InvalidParameter(format!(
                "rotation must be -90, 90 or 180, got {other}"
            ))),
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.degrees())
    }
}
