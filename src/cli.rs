// Command line interface module

use clap::Parser;
use std::path::PathBuf;

/// gifpin - A desktop animated GIF overlay for Wayland
#[derive(Parser, Debug)]
#[command(name = "gifpin")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to a GIF to pin (overrides the remembered one)
    #[arg(value_name = "GIF")]
    pub gif_path: Option<PathBuf>,

    /// Ignore persisted geometry and start at the image's natural size
    #[arg(long, default_value = "false")]
    pub reset: bool,
}

pub fn parse_args() -> Args {
    Args::parse()
}
