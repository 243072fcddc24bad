//! Font color parsing

use serde::{Deserialize, Serialize};

/// RGB color with 8-bit components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Fallback color for anything that is not a six digit hex code
    pub const WHITE: Rgb = Rgb {
        r: 255,
        g: 255,
        b: 255,
    };

    /// Create a color from 0-255 components
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// CSS functional notation, e.g. `rgb(255,0,128)`
    pub fn css(&self) -> String {
        format!("rgb({},{},{})", self.r, self.g, self.b)
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Parse a `#RRGGBB` (or bare `RRGGBB`) color code
///
/// One leading `#` is stripped. Anything that is not then exactly six
/// hexadecimal digits resolves to white instead of failing.
pub fn parse_hex_color(input: &str) -> Rgb {
    let hex = input.strip_prefix('#').unwrap_or(input);

    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Rgb::WHITE;
    }

    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    match (channel(0..2), channel(2..4), channel(4..6)) {
        (Some(r), Some(g), Some(b)) => Rgb::new(r, g, b),
        _ => Rgb::WHITE,
    }
}
