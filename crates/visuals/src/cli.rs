use std::path::PathBuf;

use clap::{Parser, Subcommand};
use renderer::Size;

#[derive(Parser, Debug)]
#[command(
    name = "visuals",
    author,
    version,
    about = "GPU playground for cellular automata, fractals and live-edited shaders",
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
    /// Program to start with (see `visuals list`).
    #[arg(long, value_name = "NAME")]
    pub program: Option<String>,

    /// Window size in pixels (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<Size>,

    /// Session configuration file; defaults to `<config dir>/config.toml`.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Frame rate for locked pacing instead of the monitor refresh rate.
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Start with unlocked pacing (render as fast as possible).
    #[arg(long)]
    pub unlocked: bool,

    /// Vertex shader watched by the live-edit program.
    #[arg(long, value_name = "FILE")]
    pub vertex: Option<PathBuf>,

    /// Fragment shader watched by the live-edit program.
    #[arg(long, value_name = "FILE")]
    pub fragment: Option<PathBuf>,

    /// Directory receiving screenshots and GIF recordings.
    #[arg(long, value_name = "DIR")]
    pub capture_dir: Option<PathBuf>,

    /// Life rule in B/S notation (e.g. `B36/S23`).
    #[arg(long, value_name = "RULE")]
    pub rule: Option<String>,

    /// Seed for the randomised programs.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the program catalogue in switching order.
    List,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<Size, String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WIDTHxHEIGHT, e.g. 1280x720".to_string())?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in size '{trimmed}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in size '{trimmed}'"))?;
    if width == 0 || height == 0 {
        return Err("window dimensions must be greater than zero".into());
    }
    Ok(Size::new(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_size_variants() {
        assert_eq!(parse_size("1280x720").unwrap(), Size::new(1280, 720));
        assert_eq!(parse_size(" 64 X 32 ").unwrap(), Size::new(64, 32));
        assert_eq!(parse_size("800×600").unwrap(), Size::new(800, 600));
    }

    #[test]
    fn rejects_bad_sizes() {
        assert!(parse_size("1280").is_err());
        assert!(parse_size("0x720").is_err());
        assert!(parse_size("widexhigh").is_err());
    }

    #[test]
    fn run_flags_parse_alongside_subcommand() {
        let cli = Cli::try_parse_from([
            "visuals",
            "--program",
            "julia",
            "--size",
            "640x480",
            "--rule",
            "B36/S23",
            "--unlocked",
        ])
        .unwrap();
        assert_eq!(cli.run.program.as_deref(), Some("julia"));
        assert_eq!(cli.run.size, Some(Size::new(640, 480)));
        assert_eq!(cli.run.rule.as_deref(), Some("B36/S23"));
        assert!(cli.run.unlocked);
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["visuals", "list"]).unwrap();
        assert!(matches!(cli.command, Some(Command::List)));
    }
}
