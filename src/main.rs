// gifpin - A desktop animated GIF overlay for Wayland
// Displays a looping GIF in a floating, always-on-top window with a tray icon

mod animation;
mod cli;
mod config;
mod dialogs;
mod library;
mod state;
mod text;
mod tray;
mod wayland;

use anyhow::Result;
use config::ConfigPaths;
use log::info;

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let args = cli::parse_args();

    let paths = ConfigPaths::resolve();
    info!("Config dir: {}", paths.config_dir.display());

    // A path on the command line starts fresh at natural size; otherwise the
    // remembered image comes back with its persisted geometry.
    let initial = match args.gif_path {
        Some(path) => Some((path, true)),
        None => paths.load_last_path().map(|path| (path, args.reset)),
    };

    match &initial {
        Some((path, reset)) => info!("Starting with image: {} (reset: {})", path.display(), reset),
        None => info!("Starting without an image"),
    }

    wayland::run(paths, initial)
}
