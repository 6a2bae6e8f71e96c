// SPDX-License-Identifier: MPL-2.0-only

mod draw;
mod engine;
#[cfg(feature = "video")]
mod host;
mod scaler;
mod select;
mod video;
#[cfg(feature = "video")]
mod watch;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use motion_bg_config::{RonStore, selected_video};
use tracing_subscriber::EnvFilter;

/// Plays a looping video as the desktop wallpaper.
#[derive(Debug, Parser)]
#[command(name = "motion-bg", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the wallpaper daemon (default)
    Run,
    /// Select the video to play
    Set {
        /// Video file
        path: PathBuf,
    },
    /// Print the selected video
    Get,
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = Cli::parse();
    let store = RonStore::open_default()?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(store),
        Command::Set { path } => {
            let video = select::select(&store, &path)?;
            #[cfg(feature = "video")]
            if !video::can_play_video(&video) {
                tracing::warn!(%video, "no decoder on this system can play the selected video");
            } else if video::hardware_decoders().is_empty() {
                tracing::info!(%video, "the video will be decoded in software");
            }
            println!("{video}");
            Ok(())
        }
        Command::Get => {
            match selected_video(&store) {
                Some(video) => println!("{video}"),
                None => tracing::info!("no video selected"),
            }
            Ok(())
        }
    }
}

#[cfg(feature = "video")]
fn run(store: RonStore) -> eyre::Result<()> {
    host::run(store)
}

#[cfg(not(feature = "video"))]
fn run(_store: RonStore) -> eyre::Result<()> {
    eyre::bail!("motion-bg was built without video support")
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
