use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "overlay-kit",
    version = overlay_kit_core::version(),
    about = "OverlayKit - open, close and unmount overlays from a shell",
)]
pub struct Args {
    /// Specify custom configuration file path
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        help = "Specify custom configuration file path"
    )]
    pub config_path: Option<PathBuf>,

    /// Validate configuration and exit without starting
    #[arg(
        long = "dry-run",
        help = "Validate configuration and exit without starting"
    )]
    pub dry_run: bool,

    /// Use default configuration and ignore config files
    #[arg(
        long = "defaults",
        help = "Use default configuration and ignore config files"
    )]
    pub use_defaults: bool,

    /// Run commands from a file instead of reading them interactively
    #[arg(short = 's', long = "script", value_name = "FILE")]
    pub script: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log everything, including registry traces
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

pub fn parse_args() -> Args {
    Args::parse()
}
