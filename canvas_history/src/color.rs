//! Stroke colour and its `"r;g;b;a"` text encoding.
//!
//! Saved canvases store colours as four semicolon-joined decimal components
//! in `0.0..=1.0`.  Decoding never fails: a component that is missing or
//! does not parse becomes `0.0`, except a missing alpha, which becomes `1.0`.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Rgba { r, g, b, a }
    }

    /// Decode `"r;g;b;a"`.
    pub fn parse(text: &str) -> Self {
        let parts: Vec<f64> = text
            .split(';')
            .map(|p| p.trim().parse::<f64>().unwrap_or(0.0))
            .collect();
        let at = |i: usize, missing: f64| parts.get(i).copied().unwrap_or(missing);
        Rgba {
            r: at(0, 0.0),
            g: at(1, 0.0),
            b: at(2, 0.0),
            a: at(3, 1.0),
        }
    }

    /// Encode as `"r;g;b;a"`.
    pub fn to_rgba_string(&self) -> String {
        format!("{:?};{:?};{:?};{:?}", self.r, self.g, self.b, self.a)
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Rgba::BLACK
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rgba_string())
    }
}

impl From<String> for Rgba {
    fn from(text: String) -> Self {
        Rgba::parse(&text)
    }
}

impl From<Rgba> for String {
    fn from(c: Rgba) -> Self {
        c.to_rgba_string()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
