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

use clap::{crate_version, Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use keypiano::audio;
use keypiano::config::{self, ConfigError, Overrides, Piano};
use keypiano::controller::script::{self, ScriptSource};
use keypiano::controller::{self, keyboard};
use keypiano::engine::{EngineSettings, PlaybackEngine};
use keypiano::keymap::KeyMap;
use keypiano::samples::{probe_sample_rate, SampleBankGenerator, SampleLoader};
use keypiano::scale::{chromatic_scale, NoteName};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A piano played from the computer keyboard, built from a single sound."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

/// Flags shared by every command that reads the configuration.
#[derive(Args)]
struct Shared {
    /// The config file. Defaults to keypiano.yaml in the working directory, if present.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// The sound the notes are generated from.
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// The folder the notes are written to and played from.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// The number of octaves to generate.
    #[arg(long)]
    octaves: Option<u32>,
    /// The keys bound to the scale, lowest note first.
    #[arg(short, long)]
    layout: Option<String>,
    /// The audio output device.
    #[arg(short, long)]
    device: Option<String>,
}

impl Shared {
    fn load(&self) -> Result<Piano, ConfigError> {
        config::load(
            self.config.as_deref(),
            &Overrides {
                keyboard_layout: self.layout.clone(),
                input_sound: self.input.clone(),
                output_folder: self.output.clone(),
                octaves: self.octaves,
                device: self.device.clone(),
            },
        )
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generates the notes from the input sound, then plays them.
    Start {
        #[command(flatten)]
        shared: Shared,
        /// Reads key events from the given file (or - for stdin) instead of the keyboard.
        #[arg(short, long)]
        events: Option<String>,
    },
    /// Generates the notes from the input sound and writes them to the output folder.
    Generate {
        #[command(flatten)]
        shared: Shared,
    },
    /// Plays notes that were generated earlier.
    Play {
        #[command(flatten)]
        shared: Shared,
        /// Reads key events from the given file (or - for stdin) instead of the keyboard.
        #[arg(short, long)]
        events: Option<String>,
    },
    /// Prints which note each key plays.
    Keys {
        #[command(flatten)]
        shared: Shared,
    },
    /// Lists the available audio output devices.
    Devices {},
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(keyboard::LogWriter::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { shared, events } => {
            let piano = shared.load()?;
            let scale = chromatic_scale(piano.octaves());
            let bank = SampleBankGenerator::new().generate_from_file(piano.input_sound(), &scale)?;
            bank.write_to(piano.output_folder())?;

            let mut loader = SampleLoader::new(bank.sample_rate());
            bank.seed(piano.output_folder(), &mut loader);
            play(&piano, &scale, bank.sample_rate(), loader, events)?;
        }
        Commands::Generate { shared } => {
            let piano = shared.load()?;
            let scale = chromatic_scale(piano.octaves());
            let bank = SampleBankGenerator::new().generate_from_file(piano.input_sound(), &scale)?;
            let paths = bank.write_to(piano.output_folder())?;

            println!(
                "Wrote {} notes to {}.",
                paths.len(),
                piano.output_folder().display()
            );
        }
        Commands::Play { shared, events } => {
            let piano = shared.load()?;
            let scale = chromatic_scale(piano.octaves());
            let sample_rate =
                probe_sample_rate(piano.output_folder(), &scale).ok_or_else(|| {
                    format!(
                        "No generated notes found in {}",
                        piano.output_folder().display()
                    )
                })?;
            play(
                &piano,
                &scale,
                sample_rate,
                SampleLoader::new(sample_rate),
                events,
            )?;
        }
        Commands::Keys { shared } => {
            let piano = shared.load()?;
            let scale = chromatic_scale(piano.octaves());
            let (key_map, warning) = KeyMap::from_layout(piano.keyboard_layout(), &scale);

            println!("Keys (count: {}):", key_map.len());
            for (key, note) in key_map.iter() {
                println!("- {} => {}", key, note);
            }
            if let Some(warning) = warning {
                println!("\nWarning: {}", warning);
            }
        }
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
    }

    Ok(())
}

/// Opens the device, preloads the notes and runs the engine until it is told to stop.
fn play(
    piano: &Piano,
    scale: &[NoteName],
    sample_rate: u32,
    mut loader: SampleLoader,
    events: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let (key_map, warning) = KeyMap::from_layout(piano.keyboard_layout(), scale);
    if let Some(warning) = warning {
        warn!(warning = %warning, "Keyboard layout is longer than the scale");
    }

    let device = audio::open_device(piano.audio(), sample_rate, key_map.len())?;
    let engine = PlaybackEngine::new(
        device,
        &key_map,
        piano.output_folder(),
        &mut loader,
        EngineSettings {
            fade_in: piano.fade_in(),
            fade_out: piano.fade_out(),
        },
    );
    if engine.loaded_keys() == 0 {
        warn!(folder = ?piano.output_folder(), "No notes could be loaded, nothing will sound");
    }

    let driver: Box<dyn controller::Driver> = match events {
        Some(arg) => Box::new(script::Driver::new(ScriptSource::from_arg(&arg))),
        None => {
            println!("Play with the keys in your layout. Press Esc to quit.");
            Box::new(keyboard::Driver::new()?)
        }
    };

    // The driver thread is left behind on exit; it may be blocked reading input.
    let (events_rx, _handle) = controller::spawn(driver.as_ref());
    let outcome = engine.run(&events_rx);
    drop(driver);

    info!(reason = %outcome.reason, events = outcome.events, "Done");
    Ok(())
}
