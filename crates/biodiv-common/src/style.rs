//! Colour definitions and continuous colour ramps for map rendering.
//!
//! Colours are written in config files as hex strings, RGB(A) arrays or
//! a handful of names; ramps are either built-in palettes or explicit stops.

use serde::{Deserialize, Serialize};

use crate::{BiodivError, BiodivResult};

/// Color representation supporting multiple formats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Color {
    /// Hex string: "#RRGGBB" or "#RRGGBBAA", or a named colour
    Hex(String),

    /// RGB array: [r, g, b] or [r, g, b, a]
    Array(Vec<u8>),

    /// Explicit RGBA
    Rgba { r: u8, g: u8, b: u8, a: u8 },
}

impl Color {
    pub fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Color::Rgba { r, g, b, a }
    }

    pub fn transparent() -> Self {
        Color::rgba(0, 0, 0, 0)
    }

    /// Convert to RGBA tuple.
    pub fn to_rgba(&self) -> (u8, u8, u8, u8) {
        match self {
            Color::Hex(s) if s.starts_with('#') => parse_hex_color(s),
            Color::Hex(name) => named_color(name).unwrap_or((0, 0, 0, 255)),
            Color::Array(arr) => {
                let r = arr.first().copied().unwrap_or(0);
                let g = arr.get(1).copied().unwrap_or(0);
                let b = arr.get(2).copied().unwrap_or(0);
                let a = arr.get(3).copied().unwrap_or(255);
                (r, g, b, a)
            }
            Color::Rgba { r, g, b, a } => (*r, *g, *b, *a),
        }
    }

    /// Check that the colour parses; unparseable colours otherwise render black.
    pub fn validate(&self) -> BiodivResult<()> {
        let ok = match self {
            Color::Hex(s) if s.starts_with('#') => {
                let digits = &s[1..];
                matches!(digits.len(), 6 | 8) && digits.chars().all(|c| c.is_ascii_hexdigit())
            }
            Color::Hex(name) => named_color(name).is_some(),
            Color::Array(arr) => matches!(arr.len(), 3 | 4),
            Color::Rgba { .. } => true,
        };
        if ok {
            Ok(())
        } else {
            Err(BiodivError::RenderError(format!("invalid colour {:?}", self)))
        }
    }

    /// "#rrggbb" form for SVG output (alpha dropped).
    pub fn to_hex(&self) -> String {
        let (r, g, b, _) = self.to_rgba();
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    }

    /// Linear interpolation between two colors.
    pub fn lerp(&self, other: &Color, t: f64) -> Color {
        let (r1, g1, b1, a1) = self.to_rgba();
        let (r2, g2, b2, a2) = other.to_rgba();

        let t = t.clamp(0.0, 1.0);

        let lerp_u8 = |a: u8, b: u8, t: f64| -> u8 {
            ((a as f64) * (1.0 - t) + (b as f64) * t).round() as u8
        };

        Color::rgba(
            lerp_u8(r1, r2, t),
            lerp_u8(g1, g2, t),
            lerp_u8(b1, b2, t),
            lerp_u8(a1, a2, t),
        )
    }
}

fn parse_hex_color(s: &str) -> (u8, u8, u8, u8) {
    let s = s.trim_start_matches('#');
    if !s.is_ascii() {
        return (0, 0, 0, 255);
    }
    let channel = |i: usize| u8::from_str_radix(&s[i..i + 2], 16).unwrap_or(0);

    match s.len() {
        6 => (channel(0), channel(2), channel(4), 255),
        8 => (channel(0), channel(2), channel(4), channel(6)),
        _ => (0, 0, 0, 255),
    }
}

fn named_color(name: &str) -> Option<(u8, u8, u8, u8)> {
    let rgba = match name.to_lowercase().as_str() {
        "transparent" => (0, 0, 0, 0),
        "black" => (0, 0, 0, 255),
        "white" => (255, 255, 255, 255),
        "red" => (255, 0, 0, 255),
        "green" => (0, 128, 0, 255),
        "blue" => (0, 0, 255, 255),
        "orange" => (255, 165, 0, 255),
        "purple" => (128, 0, 128, 255),
        "gray" | "grey" => (128, 128, 128, 255),
        "lightgray" | "lightgrey" => (211, 211, 211, 255),
        _ => return None,
    };
    Some(rgba)
}

/// A color stop in a ramp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    /// Position of this stop; either a data value or a 0..1 fraction
    pub value: f64,

    /// The color at this stop
    pub color: Color,
}

/// Names of the palettes bundled with the renderer.
pub const BUILTIN_PALETTES: &[&str] = &["viridis", "magma", "spectral", "blues"];

/// Continuous colour ramp between ascending stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorRamp {
    pub stops: Vec<ColorStop>,
}

impl ColorRamp {
    /// Build a ramp from explicit stops, which must ascend strictly.
    pub fn new(stops: Vec<ColorStop>) -> Result<Self, String> {
        let ramp = Self { stops };
        ramp.validate()?;
        Ok(ramp)
    }

    /// One of the bundled palettes, with stops spread over 0..1.
    pub fn builtin(name: &str) -> Option<Self> {
        let hexes: &[&str] = match name.to_lowercase().as_str() {
            "viridis" => &["#440154", "#3b528b", "#21918c", "#5ec962", "#fde725"],
            "magma" => &["#000004", "#51127c", "#b73779", "#fc8961", "#fcfdbf"],
            // Reversed so high values are warm
            "spectral" => &["#3288bd", "#99d594", "#e6f598", "#fee08b", "#fc8d59", "#d53e4f"],
            "blues" => &["#f7fbff", "#c6dbef", "#6baed6", "#2171b5", "#08306b"],
            _ => return None,
        };

        let last = (hexes.len() - 1) as f64;
        let stops = hexes
            .iter()
            .enumerate()
            .map(|(i, hex)| ColorStop {
                value: i as f64 / last,
                color: Color::Hex(hex.to_string()),
            })
            .collect();
        Some(Self { stops })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.stops.len() < 2 {
            return Err("Color ramp must have at least 2 color stops".to_string());
        }

        for pair in self.stops.windows(2) {
            if pair[1].value <= pair[0].value {
                return Err("Color stops must be in ascending value order".to_string());
            }
        }

        Ok(())
    }

    /// Map the stop positions linearly onto [min, max].
    pub fn rescaled(&self, min: f64, max: f64) -> Self {
        let (Some(first), Some(last)) = (self.stops.first(), self.stops.last()) else {
            return self.clone();
        };
        let span = last.value - first.value;
        // Degenerate data range: widen it so every value maps to the low end
        let max = if max > min { max } else { min + 1.0 };

        let stops = self
            .stops
            .iter()
            .map(|stop| ColorStop {
                value: min + (stop.value - first.value) / span * (max - min),
                color: stop.color.clone(),
            })
            .collect();
        Self { stops }
    }

    /// Interpolate color for a given value, clamping outside the stops.
    pub fn color_for(&self, value: f64) -> Color {
        let (Some(first), Some(last)) = (self.stops.first(), self.stops.last()) else {
            return Color::transparent();
        };

        if value <= first.value {
            return first.color.clone();
        }
        if value >= last.value {
            return last.color.clone();
        }

        for pair in self.stops.windows(2) {
            let (low, high) = (&pair[0], &pair[1]);
            if value <= high.value {
                let t = (value - low.value) / (high.value - low.value);
                return low.color.lerp(&high.color, t);
            }
        }

        last.color.clone()
    }
}
