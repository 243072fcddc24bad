//! Anchor positions and compositing gravity

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Symbolic position of the watermark on the photo
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    MiddleCenter,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    #[default]
    BottomRight,
}

/// Alignment of the overlay inside the base image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gravity {
    NorthWest,
    North,
    NorthEast,
    West,
    Center,
    East,
    SouthWest,
    South,
    SouthEast,
}

/// Anchor to gravity lookup table
pub const ANCHOR_GRAVITY: [(Anchor, Gravity); 9] = [
    (Anchor::TopLeft, Gravity::NorthWest),
    (Anchor::TopCenter, Gravity::North),
    (Anchor::TopRight, Gravity::NorthEast),
    (Anchor::MiddleLeft, Gravity::West),
    (Anchor::MiddleCenter, Gravity::Center),
    (Anchor::MiddleRight, Gravity::East),
    (Anchor::BottomLeft, Gravity::SouthWest),
    (Anchor::BottomCenter, Gravity::South),
    (Anchor::BottomRight, Gravity::SouthEast),
];

impl Anchor {
    /// All nine anchors, row by row from the top-left
    pub const ALL: [Anchor; 9] = [
        Anchor::TopLeft,
        Anchor::TopCenter,
        Anchor::TopRight,
        Anchor::MiddleLeft,
        Anchor::MiddleCenter,
        Anchor::MiddleRight,
        Anchor::BottomLeft,
        Anchor::BottomCenter,
        Anchor::BottomRight,
    ];

    /// Settings key, e.g. `top-left`
    pub fn key(&self) -> &'static str {
        match self {
            Anchor::TopLeft => "top-left",
            Anchor::TopCenter => "top-center",
            Anchor::TopRight => "top-right",
            Anchor::MiddleLeft => "middle-left",
            Anchor::MiddleCenter => "middle-center",
            Anchor::MiddleRight => "middle-right",
            Anchor::BottomLeft => "bottom-left",
            Anchor::BottomCenter => "bottom-center",
            Anchor::BottomRight => "bottom-right",
        }
    }

    /// Look up an anchor by its settings key
    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|anchor| anchor.key() == key)
    }

    /// Look up an anchor by key, falling back to bottom-right
    pub fn from_key_or_default(key: &str) -> Self {
        Self::parse(key).unwrap_or_default()
    }

    /// Gravity this anchor resolves to
    pub fn gravity(&self) -> Gravity {
        ANCHOR_GRAVITY
            .iter()
            .find(|(anchor, _)| anchor == self)
            .map(|(_, gravity)| *gravity)
            .unwrap_or(Gravity::SouthEast)
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Anchor {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown anchor: {s}"))
    }
}

/// Place an overlay along one axis
///
/// `start` is flush with the origin, `end` is flush with the far edge and
/// `middle` centers it, rounding toward the origin.
fn axis_offset(base: u32, overlay: u32, start: bool, end: bool) -> i64 {
    let free = i64::from(base) - i64::from(overlay);
    match (start, end) {
        (true, _) => 0,
        (_, true) => free,
        _ => free.div_euclid(2),
    }
}

impl Gravity {
    /// Top-left pixel of an overlay aligned by this gravity
    ///
    /// # Arguments
    /// * `base_width`, `base_height` - Base image size in pixels
    /// * `overlay_width`, `overlay_height` - Overlay size in pixels
    ///
    /// # Returns
    /// (x, y) in pixels; negative when the overlay is larger than the base
    pub fn offset(
        &self,
        base_width: u32,
        base_height: u32,
        overlay_width: u32,
        overlay_height: u32,
    ) -> (i64, i64) {
        let west = matches!(self, Gravity::NorthWest | Gravity::West | Gravity::SouthWest);
        let east = matches!(self, Gravity::NorthEast | Gravity::East | Gravity::SouthEast);
        let north = matches!(self, Gravity::NorthWest | Gravity::North | Gravity::NorthEast);
        let south = matches!(self, Gravity::SouthWest | Gravity::South | Gravity::SouthEast);

        (
            axis_offset(base_width, overlay_width, west, east),
            axis_offset(base_height, overlay_height, north, south),
        )
    }
}
