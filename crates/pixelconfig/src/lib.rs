use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How the frame is scaled onto the output surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gravity {
    /// Keep aspect ratio, letterbox.
    #[default]
    Fit,
    /// Keep aspect ratio, crop.
    Fill,
    Stretch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    #[default]
    Rgba8888,
    Rgbx8888,
    Rgb888,
    Rgb565,
    Yuv420,
}

/// Clockwise quarter turn, written as degrees (`90`) or a name (`"right"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(into = "u32")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

impl From<Rotation> for u32 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl<'de> Deserialize<'de> for Rotation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            Str(String),
            Num(i64),
        }

        match Helper::deserialize(deserializer)? {
            Helper::Str(raw) => raw.parse().map_err(de::Error::custom),
            Helper::Num(value) => value.to_string().parse().map_err(de::Error::custom),
        }
    }
}

impl FromStr for Rotation {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "0" | "up" => Ok(Rotation::Deg0),
            "90" | "right" => Ok(Rotation::Deg90),
            "180" | "down" => Ok(Rotation::Deg180),
            "270" | "left" => Ok(Rotation::Deg270),
            other => Err(format!(
                "invalid rotation '{other}'; expected 0/90/180/270 or up/right/down/left"
            )),
        }
    }
}

impl FromStr for Gravity {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fit" | "aspect" => Ok(Gravity::Fit),
            "fill" | "aspect-fill" => Ok(Gravity::Fill),
            "stretch" | "resize" => Ok(Gravity::Stretch),
            other => Err(format!("invalid gravity '{other}'; expected fit, fill, or stretch")),
        }
    }
}

impl FromStr for Filter {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(Filter::Nearest),
            "linear" => Ok(Filter::Linear),
            other => Err(format!("invalid filter '{other}'; expected nearest or linear")),
        }
    }
}

impl fmt::Display for Gravity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Gravity::Fit => "fit",
            Gravity::Fill => "fill",
            Gravity::Stretch => "stretch",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub clock: ClockConfig,
}

/// The presentation surface.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub width: u32,
    pub height: u32,
    pub device_orientation: Rotation,
    pub synchronize_orientation: bool,
    pub swapchain_images: u32,
}

/// The producer writing frames into the pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
    /// Frames per second the producer writes.
    pub fps: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Cap on drawn frames per second; 0 draws on every refresh.
    pub frame_rate: u32,
    pub gravity: Gravity,
    pub orientation: Rotation,
    pub filter: Filter,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClockConfig {
    pub refresh_rate: u32,
    #[serde(
        deserialize_with = "deserialize_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub run_for: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            output: OutputConfig::default(),
            input: InputConfig::default(),
            render: RenderConfig::default(),
            clock: ClockConfig::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            device_orientation: Rotation::Deg0,
            synchronize_orientation: false,
            swapchain_images: 3,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            format: FrameFormat::Rgba8888,
            fps: 30.0,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frame_rate: 0,
            gravity: Gravity::Fit,
            orientation: Rotation::Deg0,
            filter: Filter::Linear,
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            refresh_rate: 60,
            run_for: Some(default_run_for()),
        }
    }
}

fn default_version() -> u32 {
    1
}

fn default_run_for() -> Duration {
    Duration::from_secs(2)
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if matches!(v.trim(), "forever" | "none") {
                return Ok(None);
            }
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }
    }

    deserializer.deserialize_any(Visitor)
}

/// Parses `WIDTHxHEIGHT`, e.g. `1280x720`.
pub fn parse_size(raw: &str) -> Result<(u32, u32), String> {
    let (width, height) = raw
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid size '{raw}'; expected WIDTHxHEIGHT"))?;
    let parse = |value: &str| {
        value
            .trim()
            .parse::<u32>()
            .map_err(|err| format!("invalid size '{raw}': {err}"))
    };
    Ok((parse(width)?, parse(height)?))
}

impl PipelineConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: PipelineConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.output.width == 0 || self.output.height == 0 {
            return Err(ConfigError::Invalid(
                "output width and height must be greater than zero".into(),
            ));
        }

        if !(1..=8).contains(&self.output.swapchain_images) {
            return Err(ConfigError::Invalid(format!(
                "output.swapchain_images must be between 1 and 8, got {}",
                self.output.swapchain_images
            )));
        }

        if self.input.width == 0 || self.input.height == 0 {
            return Err(ConfigError::Invalid(
                "input width and height must be greater than zero".into(),
            ));
        }

        if !self.input.fps.is_finite() || self.input.fps <= 0.0 {
            return Err(ConfigError::Invalid("input.fps must be > 0".into()));
        }

        if !(1..=1000).contains(&self.clock.refresh_rate) {
            return Err(ConfigError::Invalid(format!(
                "clock.refresh_rate must be between 1 and 1000, got {}",
                self.clock.refresh_rate
            )));
        }

        if let Some(run_for) = self.clock.run_for {
            if run_for.is_zero() {
                return Err(ConfigError::Invalid(
                    "clock.run_for must be greater than zero".into(),
                ));
            }
        }

        Ok(())
    }
}
