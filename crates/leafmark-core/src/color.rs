//! Highlight color normalization.
//!
//! Settings store the highlight color as a CSS hex string, but older data
//! files and hand-edited configs carry every shape a color picker or a user
//! might produce. Everything is folded to lowercase `#rrggbb`.

pub const DEFAULT_HIGHLIGHT_COLOR: &str = "#ffeb3b";
pub const MIN_HIGHLIGHT_OPACITY: u32 = 10;
pub const MAX_HIGHLIGHT_OPACITY: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Parse any supported color notation, `None` when unrecognized.
pub fn parse_color(input: &str) -> Option<Rgb> {
    let value = input.trim().to_ascii_lowercase();
    if value.is_empty() {
        return None;
    }
    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex);
    }
    if let Some(args) = value
        .strip_prefix("rgba(")
        .or_else(|| value.strip_prefix("rgb("))
    {
        return parse_rgb_args(args.strip_suffix(')')?);
    }
    named_color(&value).and_then(parse_hex)
}

/// Normalize to lowercase `#rrggbb`.
pub fn normalize_color(input: &str) -> Option<String> {
    parse_color(input).map(Rgb::to_hex)
}

/// CSS `rgba()` for the highlight layer. Invalid colors use the default.
pub fn highlight_rgba(color: &str, opacity_percent: u32) -> String {
    let rgb = parse_color(color)
        .or_else(|| parse_color(DEFAULT_HIGHLIGHT_COLOR))
        .unwrap_or(Rgb {
            r: 0xff,
            g: 0xeb,
            b: 0x3b,
        });
    let opacity = opacity_percent.clamp(MIN_HIGHLIGHT_OPACITY, MAX_HIGHLIGHT_OPACITY);
    let alpha = opacity as f32 / 100.0;
    format!("rgba({}, {}, {}, {})", rgb.r, rgb.g, rgb.b, alpha)
}

fn parse_hex(hex: &str) -> Option<Rgb> {
    if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    let expanded: String = match hex.len() {
        // #rgb and #rgba: alpha is dropped.
        3 | 4 => hex.chars().take(3).flat_map(|ch| [ch, ch]).collect(),
        6 | 8 => hex[..6].to_string(),
        _ => return None,
    };
    let channel = |idx: usize| u8::from_str_radix(&expanded[idx..idx + 2], 16).ok();
    Some(Rgb {
        r: channel(0)?,
        g: channel(2)?,
        b: channel(4)?,
    })
}

fn parse_rgb_args(args: &str) -> Option<Rgb> {
    let parts: Vec<&str> = args
        .split(|ch: char| ch == ',' || ch == '/' || ch.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let channel = |raw: &str| -> Option<u8> {
        let value = if let Some(pct) = raw.strip_suffix('%') {
            pct.parse::<f32>().ok()? * 2.55
        } else {
            raw.parse::<f32>().ok()?
        };
        if !value.is_finite() {
            return None;
        }
        Some(value.round().clamp(0.0, 255.0) as u8)
    };
    Some(Rgb {
        r: channel(parts[0])?,
        g: channel(parts[1])?,
        b: channel(parts[2])?,
    })
}

fn named_color(name: &str) -> Option<&'static str> {
    let hex = match name {
        "yellow" => "ffff00",
        "gold" => "ffd700",
        "orange" => "ffa500",
        "red" => "ff0000",
        "pink" => "ffc0cb",
        "green" => "008000",
        "lime" => "00ff00",
        "cyan" | "aqua" => "00ffff",
        "blue" => "0000ff",
        "purple" => "800080",
        "white" => "ffffff",
        "black" => "000000",
        "gray" | "grey" => "808080",
        _ => return None,
    };
    Some(hex)
}
