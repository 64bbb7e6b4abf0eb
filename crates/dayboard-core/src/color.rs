use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An sRGB fill value. The layout code carries it around untouched; only the
/// renderer ever looks inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Color {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(hex) = trimmed.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(|| anyhow!("invalid hex color: {trimmed}"));
        }

        named_color(&trimmed.to_ascii_lowercase())
            .ok_or_else(|| anyhow!("unknown color name: {trimmed}"))
    }
}

impl Serialize for Color {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    match hex.len() {
        6 => Some(Color::rgb(
            u8::from_str_radix(&hex[0..2], 16).ok()?,
            u8::from_str_radix(&hex[2..4], 16).ok()?,
            u8::from_str_radix(&hex[4..6], 16).ok()?,
        )),
        // #RGB shorthand, each nibble doubled
        3 => {
            let mut parts = hex.chars().map(|c| c.to_digit(16).map(|d| (d * 17) as u8));
            Some(Color::rgb(parts.next()??, parts.next()??, parts.next()??))
        }
        _ => None,
    }
}

fn named_color(name: &str) -> Option<Color> {
    let color = match name {
        "black" => Color::BLACK,
        "white" => Color::WHITE,
        "red" => Color::rgb(255, 0, 0),
        "green" => Color::rgb(0, 128, 0),
        "blue" => Color::rgb(0, 0, 255),
        "yellow" => Color::rgb(255, 255, 0),
        "orange" => Color::rgb(255, 165, 0),
        "gray" | "grey" => Color::rgb(128, 128, 128),
        "lightgray" | "lightgrey" => Color::rgb(211, 211, 211),
        "darkgray" | "darkgrey" => Color::rgb(169, 169, 169),
        _ => return None,
    };
    Some(color)
}

#[cfg(test)]
mod tests {
    use super::Color;

    #[test]
    fn parses_long_and_short_hex() {
        assert_eq!(
            "#FEE29B".parse::<Color>().expect("long hex"),
            Color::rgb(0xFE, 0xE2, 0x9B)
        );
        assert_eq!(
            "#fff".parse::<Color>().expect("short hex"),
            Color::WHITE
        );
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!(
            "LightGray".parse::<Color>().expect("named"),
            Color::rgb(211, 211, 211)
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!("#12345".parse::<Color>().is_err());
        assert!("#GGGGGG".parse::<Color>().is_err());
        assert!("chartreuse-ish".parse::<Color>().is_err());
    }
}
