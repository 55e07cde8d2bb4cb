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
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use duration_string::DurationString;

use mstage::catalog::{build_catalog, DecodePool};
use mstage::config::SamplerConfig;
use mstage::{audition, library};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "An SFZ instrument sampler."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the SFZ instruments found under the given directory.
    Instruments {
        /// The path to the instrument library on disk.
        path: String,
    },
    /// Loads an instrument definition and prints its catalog.
    Inspect {
        /// The path to the instrument definition.
        path: String,
        /// Print the catalog summary as JSON.
        #[arg(short, long)]
        json: bool,
    },
    /// Plays an instrument through the default audio output device.
    Play {
        /// The path to the instrument definition.
        path: String,
        /// The path to the sampler config.
        #[arg(short, long)]
        config: Option<String>,
        /// How long to audition for, e.g. 10s or 2m.
        #[arg(short, long)]
        duration: Option<String>,
        /// The MIDI input device to take events from instead of the built-in
        /// arpeggio.
        #[arg(short, long)]
        midi_device: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Instruments { path } => {
            let instruments = library::discover(&PathBuf::from(&path))?;

            if instruments.is_empty() {
                println!("No instruments found in {}.", path.as_str());
                return Ok(());
            }

            println!("Instruments (count: {}):", instruments.len());
            for instrument in instruments {
                println!("- {} ({})", instrument.name(), instrument.path().display());
            }
        }
        Commands::Inspect { path, json } => {
            let pool = DecodePool::new()?;
            let build = build_catalog(&PathBuf::from(&path), &pool)?;
            let summary = build.catalog.summary();

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "summary": summary,
                        "skipped_regions": build.skipped_regions,
                        "failures": build
                            .errors
                            .iter()
                            .map(|error| error.to_string())
                            .collect::<Vec<String>>(),
                    }))?
                );
                return Ok(());
            }

            println!("{} ({})", summary.name(), summary.path().display());
            println!("Programs (count: {}):", build.catalog.programs().len());
            for program in build.catalog.programs() {
                let region = program.region();
                print!(
                    "- {}: keys {}-{}, velocities {}-{}",
                    region.sample().unwrap_or("?"),
                    region.lokey(),
                    region.hikey(),
                    region.lovel(),
                    region.hivel()
                );
                if let Some((lo, hi)) = region.key_switch_range() {
                    print!(", key switches {}-{}", lo, hi);
                }
                if let Some(last) = region.sw_last() {
                    print!(", selected by switch {}", last);
                }
                println!();
            }
            if build.skipped_regions > 0 {
                println!("\nRegions without samples: {}", build.skipped_regions);
            }
            if !build.errors.is_empty() {
                println!("\nFailures (count: {}):", build.errors.len());
                for error in build.errors.iter() {
                    println!("- {}", error);
                }
            }
        }
        Commands::Play {
            path,
            config,
            duration,
            midi_device,
        } => {
            let config = match config {
                Some(config) => SamplerConfig::from_file(&PathBuf::from(config))?,
                None => SamplerConfig::default(),
            };
            let duration: Duration = match duration {
                Some(duration) => DurationString::from_string(duration)?.into(),
                None => config.audition_duration()?,
            };
            let midi_device = midi_device.as_deref().or(config.midi_device());

            audition::run(
                &PathBuf::from(&path),
                config.voices(),
                config.master_volume(),
                duration,
                midi_device,
            )
            .await?;
        }
    }

    Ok(())
}
