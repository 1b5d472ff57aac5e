use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use pixelconfig::{Filter, Gravity, Rotation};

#[derive(Parser, Debug)]
#[command(
    name = "pixeld",
    author,
    version,
    about = "Runs the pixel transform pipeline headless",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Pipeline configuration TOML file.
    #[arg(long, value_name = "FILE", env = "PIXELD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output surface size (e.g. `1080x1920`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Size of the frames the synthetic producer writes.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub input_size: Option<(u32, u32)>,

    /// Frames per second the synthetic producer writes.
    #[arg(long, value_name = "FPS")]
    pub input_fps: Option<f32>,

    /// Cap on drawn frames per second (0=uncapped).
    #[arg(long, value_name = "FPS")]
    pub frame_rate: Option<u32>,

    /// Display refresh rate the frame clock ticks at.
    #[arg(long, value_name = "HZ")]
    pub refresh_rate: Option<u32>,

    /// How frames map onto the surface: `fit`, `fill`, or `stretch`.
    #[arg(long, value_name = "MODE")]
    pub gravity: Option<Gravity>,

    /// Clockwise rotation applied to each frame (`0`/`90`/`180`/`270`).
    #[arg(long, value_name = "DEGREES")]
    pub orientation: Option<Rotation>,

    /// Physical display rotation reported to the kernel.
    #[arg(long, value_name = "DEGREES")]
    pub device_orientation: Option<Rotation>,

    /// Pre-rotate content to follow the display rotation.
    #[arg(long)]
    pub synchronize_orientation: bool,

    /// Sampling filter: `nearest` or `linear`.
    #[arg(long, value_name = "FILTER")]
    pub filter: Option<Filter>,

    /// How long to run before printing statistics (e.g. `2s`, `500ms`).
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the kernel's device report and whether the platform is supported.
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Pipeline configuration TOML file.
    #[arg(long, value_name = "FILE", env = "PIXELD_CONFIG")]
    pub config: Option<PathBuf>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = pixelconfig::parse_size(value)?;
    if width == 0 || height == 0 {
        return Err(format!("size '{value}' must be non-zero in both dimensions"));
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_overrides() {
        let cli = Cli::try_parse_from([
            "pixeld",
            "--size",
            "640x360",
            "--gravity",
            "fill",
            "--orientation",
            "90",
            "--duration",
            "250ms",
        ])
        .unwrap();
        assert_eq!(cli.run.size, Some((640, 360)));
        assert_eq!(cli.run.gravity, Some(Gravity::Fill));
        assert_eq!(cli.run.orientation, Some(Rotation::Deg90));
        assert_eq!(cli.run.duration, Some(Duration::from_millis(250)));
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_inspect_subcommand() {
        let cli = Cli::try_parse_from(["pixeld", "inspect"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Inspect(_))));
    }

    #[test]
    fn rejects_zero_size() {
        assert!(parse_size("0x720").is_err());
        assert!(Cli::try_parse_from(["pixeld", "--gravity", "sideways"]).is_err());
    }
}
