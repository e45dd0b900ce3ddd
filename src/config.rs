use glam::Vec3;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::error::{BackdropError, Result};
use crate::variant::Variant;

/// Wireframe and point color shared by every variant.
pub const MATERIAL_COLOR: u32 = 0x2186eb;
/// Page color behind the transparent surface of the full-page variants.
pub const PAGE_COLOR: u32 = 0x111827;

/// Converts a `0xRRGGBB` literal to linear-ish RGB in `[0, 1]`.
pub fn hex_color(hex: u32) -> Vec3 {
    Vec3::new(
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    )
}

/// Parses `#RRGGBB`, `RRGGBB` or `0xRRGGBB`.
pub fn parse_hex_color(text: &str) -> Result<Vec3> {
    let digits = text
        .trim()
        .trim_start_matches('#')
        .trim_start_matches("0x");
    if digits.len() != 6 {
        return Err(BackdropError::Config(format!(
            "color `{text}` is not a 6 digit hex value"
        )));
    }
    u32::from_str_radix(digits, 16)
        .map(hex_color)
        .map_err(|err| BackdropError::Config(format!("color `{text}`: {err}")))
}

/// Height field parameters of the wave-plane variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaveSettings {
    pub amplitude: f32,
    pub period: f32,
}

impl Default for WaveSettings {
    fn default() -> Self {
        Self {
            amplitude: 20.0,
            period: 50.0,
        }
    }
}

impl WaveSettings {
    /// Height of the plane at local `(x, y)` after `time` seconds.
    pub fn height(&self, x: f32, y: f32, time: f32) -> f32 {
        self.amplitude * (x / self.period + time).sin()
            + self.amplitude * (y / self.period + time).sin()
    }
}

/// Dark/light swatches applied to the particle-field hero background.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AppearancePalette {
    pub accent: Vec3,
    pub dark_opacity: f32,
    pub light_opacity: f32,
    pub dark_background: Vec3,
    pub light_background: Vec3,
}

impl Default for AppearancePalette {
    fn default() -> Self {
        Self {
            accent: hex_color(0x0ea5e9),
            dark_opacity: 0.3,
            light_opacity: 0.8,
            dark_background: hex_color(0x1f2937),
            light_background: hex_color(0xf0f9ff),
        }
    }
}

/// Everything a layout collaborator passes when mounting a background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundOptions {
    pub variant: Variant,
    /// Surface width in pixels; the viewport width when absent.
    #[serde(default)]
    pub width: Option<u32>,
    /// Surface height in pixels; the viewport height when absent.
    #[serde(default)]
    pub height: Option<u32>,
    /// Fixed seed for reproducible scenes; platform entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub wave: WaveSettings,
    #[serde(default)]
    pub palette: AppearancePalette,
}

impl BackgroundOptions {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            width: None,
            height: None,
            seed: None,
            wave: WaveSettings::default(),
            palette: AppearancePalette::default(),
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Whether both dimensions were given explicitly.
    pub fn has_fixed_size(&self) -> bool {
        self.width.is_some() && self.height.is_some()
    }

    /// Resolves the surface size, filling gaps from the viewport.
    pub fn resolve_size(&self, viewport: (u32, u32)) -> Result<(u32, u32)> {
        let width = self.width.unwrap_or(viewport.0);
        let height = self.height.unwrap_or(viewport.1);
        if width == 0 || height == 0 {
            return Err(BackdropError::Config(format!(
                "surface size must be positive, got {width}x{height}"
            )));
        }
        Ok((width, height))
    }

    /// Parses a `<background>` document.
    ///
    /// ```xml
    /// <background>
    ///     <variant>bg2</variant>
    ///     <width>800</width>
    ///     <height>600</height>
    ///     <wave amplitude="20" period="50"/>
    ///     <palette accent="#0EA5E9" dark-opacity="0.3"/>
    /// </background>
    /// ```
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml)?;
        let root = document.root_element();
        if !root.has_tag_name("background") {
            return Err(BackdropError::Config(format!(
                "expected <background> root, found <{}>",
                root.tag_name().name()
            )));
        }

        let variant_name = optional_text(&root, "variant")
            .ok_or_else(|| BackdropError::Config("<variant> tag is missing".into()))?;
        let variant = Variant::from_id(&variant_name).ok_or_else(|| {
            BackdropError::Config(format!("unknown variant `{variant_name}`"))
        })?;

        let mut options = Self::new(variant);
        options.width = parse_number(optional_text(&root, "width"), "width")?;
        options.height = parse_number(optional_text(&root, "height"), "height")?;
        options.seed = parse_number(optional_text(&root, "seed"), "seed")?;

        if let Some(wave) = child(&root, "wave") {
            let defaults = options.wave;
            options.wave = WaveSettings {
                amplitude: parse_number(wave.attribute("amplitude"), "amplitude")?
                    .unwrap_or(defaults.amplitude),
                period: parse_number(wave.attribute("period"), "period")?
                    .unwrap_or(defaults.period),
            };
            if options.wave.period == 0.0 {
                return Err(BackdropError::Config("wave period must be non-zero".into()));
            }
        }

        if let Some(palette) = child(&root, "palette") {
            let defaults = options.palette;
            options.palette = AppearancePalette {
                accent: parse_color(palette.attribute("accent"), defaults.accent)?,
                dark_opacity: parse_number(palette.attribute("dark-opacity"), "dark-opacity")?
                    .unwrap_or(defaults.dark_opacity),
                light_opacity: parse_number(palette.attribute("light-opacity"), "light-opacity")?
                    .unwrap_or(defaults.light_opacity),
                dark_background: parse_color(
                    palette.attribute("dark-background"),
                    defaults.dark_background,
                )?,
                light_background: parse_color(
                    palette.attribute("light-background"),
                    defaults.light_background,
                )?,
            };
        }

        Ok(options)
    }
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| child.has_tag_name(tag))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_number<T, S>(value: Option<S>, what: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    S: AsRef<str>,
{
    match value {
        Some(value) => value
            .as_ref()
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| BackdropError::Config(format!("failed to parse {what}: {err}"))),
        None => Ok(None),
    }
}

fn parse_color(value: Option<&str>, default: Vec3) -> Result<Vec3> {
    match value {
        Some(value) => parse_hex_color(value),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_parse_with_or_without_prefix() {
        assert_eq!(parse_hex_color("#FF0000").unwrap(), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(parse_hex_color("0x00ff00").unwrap(), Vec3::new(0.0, 1.0, 0.0));
        assert!(parse_hex_color("#FFF").is_err());
        assert!(parse_hex_color("zzzzzz").is_err());
    }

    #[test]
    fn xml_overrides_defaults() {
        let xml = r##"
        <background>
            <variant>bg2</variant>
            <width>800</width>
            <height>600</height>
            <seed>9</seed>
            <wave amplitude="10" period="25"/>
            <palette accent="#FF0000" dark-opacity="0.1"/>
        </background>
        "##;
        let options = BackgroundOptions::from_xml(xml).unwrap();
        assert_eq!(options.variant, Variant::WavePlane);
        assert_eq!(options.width, Some(800));
        assert_eq!(options.height, Some(600));
        assert_eq!(options.seed, Some(9));
        assert_eq!(options.wave.amplitude, 10.0);
        assert_eq!(options.wave.period, 25.0);
        assert_eq!(options.palette.accent, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(options.palette.dark_opacity, 0.1);
        assert_eq!(options.palette.light_opacity, 0.8);
    }

    #[test]
    fn xml_without_variant_is_an_error() {
        assert!(BackgroundOptions::from_xml("<background/>").is_err());
        assert!(BackgroundOptions::from_xml("<background><variant>nope</variant></background>").is_err());
        assert!(BackgroundOptions::from_xml("<scene/>").is_err());
    }

    #[test]
    fn missing_dimensions_come_from_viewport() {
        let options = BackgroundOptions::new(Variant::WireframeSolid);
        assert_eq!(options.resolve_size((1280, 720)).unwrap(), (1280, 720));
        let fixed = options.with_size(200, 200);
        assert!(fixed.has_fixed_size());
        assert_eq!(fixed.resolve_size((1280, 720)).unwrap(), (200, 200));
        assert!(BackgroundOptions::new(Variant::Cluster)
            .resolve_size((0, 720))
            .is_err());
    }

    #[test]
    fn wave_height_sums_two_sines() {
        let wave = WaveSettings::default();
        let expected = 20.0 * (100.0_f32 / 50.0 + 1.5).sin() + 20.0 * (-50.0_f32 / 50.0 + 1.5).sin();
        assert!((wave.height(100.0, -50.0, 1.5) - expected).abs() < 1e-4);
    }
}
