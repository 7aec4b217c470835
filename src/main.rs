// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use keypiano::audio;
use keypiano::config::Config;
use keypiano::controller::Driver;
use keypiano::engine::VoiceEngine;
use keypiano::input::KeyRouter;
use keypiano::keymap::{KeyMap, DEFAULT_BASE_OCTAVE};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A computer keyboard piano."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Prints the keyboard layout.
    Layout {
        /// The octave of the first key.
        #[arg(short, long)]
        base_octave: Option<i32>,
    },
    /// Plays keys typed on the terminal.
    Play {
        /// The path to the keypiano config.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// The device name to play through. Overrides the config.
        #[arg(short, long)]
        device: Option<String>,
        /// The directory to load samples from. Overrides the config.
        #[arg(short, long)]
        samples: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Layout { base_octave } => {
            let keymap = KeyMap::with_default_bindings(base_octave.unwrap_or(DEFAULT_BASE_OCTAVE))?;

            println!("{:<6} {:<6} {:>10}", "Key", "Note", "Frequency");
            for note in keymap.notes() {
                println!(
                    "{:<6} {:<6} {:>10.2}",
                    note.keyboard_label(),
                    note.display_label(),
                    note.frequency()
                );
            }
        }
        Commands::Play {
            config,
            device,
            samples,
        } => {
            let mut config = Config::load(config.as_deref())?;
            if let Some(device) = device {
                config = config.with_device(&device);
            }
            if let Some(samples) = samples {
                config = config.with_samples(samples);
            }

            let engine = Arc::new(VoiceEngine::from_config(&config)?);
            if !engine.is_running() {
                println!("Audio output is unavailable, notes will not sound.");
            }
            println!(
                "Loaded {} samples, other notes are synthesized.",
                engine.sample_count()
            );

            let keymap = Arc::new(KeyMap::with_default_bindings(
                config.keyboard().base_octave(),
            )?);
            let note_duration = config.keyboard().note_duration()?.as_secs_f64();
            let router = KeyRouter::new(keymap, engine.clone(), note_duration);

            Driver::new(router, config.keyboard().hold()?).run()?;
            engine.stop_all();
        }
    }

    Ok(())
}
