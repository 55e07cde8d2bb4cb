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
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use crate::engine::{DEFAULT_MASTER_GAIN, DEFAULT_VOICES};

/// Default audition length when none is configured.
const DEFAULT_AUDITION_DURATION: Duration = Duration::from_secs(10);

/// A YAML representation of the sampler configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct SamplerConfig {
    /// Maximum number of simultaneous playback voices.
    #[serde(default = "default_voices")]
    voices: usize,

    /// Gain applied to the mixed output block.
    #[serde(default = "default_master_volume")]
    master_volume: f32,

    /// Directory scanned for instrument definitions.
    instruments: Option<String>,

    /// How long `play` auditions an instrument, e.g. "10s" or "500ms".
    audition_duration: Option<String>,

    /// The MIDI input device to take audition events from.
    midi_device: Option<String>,
}

fn default_voices() -> usize {
    DEFAULT_VOICES
}

fn default_master_volume() -> f32 {
    DEFAULT_MASTER_GAIN
}

impl Default for SamplerConfig {
    fn default() -> SamplerConfig {
        SamplerConfig {
            voices: default_voices(),
            master_volume: default_master_volume(),
            instruments: None,
            audition_duration: None,
            midi_device: None,
        }
    }
}

impl SamplerConfig {
    /// Loads the configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<SamplerConfig, Box<dyn Error>> {
        Ok(serde_yml::from_str(&fs::read_to_string(path)?)?)
    }

    /// Gets the voice capacity.
    pub fn voices(&self) -> usize {
        self.voices
    }

    /// Gets the master output volume.
    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Gets the configured instruments directory.
    pub fn instruments(&self) -> Option<PathBuf> {
        self.instruments.as_ref().map(PathBuf::from)
    }

    /// Gets how long an audition plays before stopping.
    pub fn audition_duration(&self) -> Result<Duration, Box<dyn Error>> {
        match &self.audition_duration {
            Some(duration) => Ok(DurationString::from_string(duration.clone())?.into()),
            None => Ok(DEFAULT_AUDITION_DURATION),
        }
    }

    /// Gets the MIDI input device to audition with.
    pub fn midi_device(&self) -> Option<&str> {
        self.midi_device.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::fs;
    use std::time::Duration;

    use config::{Config, File, FileFormat};

    use super::*;

    #[test]
    fn test_sampler_config_deserialize() {
        let yaml = r#"
            voices: 8
            master_volume: 0.5
            instruments: /lib/instruments
            audition_duration: 2s
            midi_device: mock-midi
        "#;

        let config: SamplerConfig = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.voices(), 8);
        assert_eq!(config.master_volume(), 0.5);
        assert_eq!(
            config.instruments(),
            Some(PathBuf::from("/lib/instruments"))
        );
        assert_eq!(config.audition_duration().unwrap(), Duration::from_secs(2));
        assert_eq!(config.midi_device(), Some("mock-midi"));
    }

    #[test]
    fn test_sampler_config_defaults() {
        let config: SamplerConfig = Config::builder()
            .add_source(File::from_str("{}", FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.voices(), 16);
        assert_eq!(config.master_volume(), 0.8);
        assert_eq!(config.instruments(), None);
        assert_eq!(config.audition_duration().unwrap(), Duration::from_secs(10));
        assert_eq!(config.midi_device(), None);
    }

    #[test]
    fn test_from_file() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sampler.yaml");
        fs::write(&path, "voices: 4\nmaster_volume: 1.0\n")?;

        let config = SamplerConfig::from_file(&path)?;
        assert_eq!(config.voices(), 4);
        assert_eq!(config.master_volume(), 1.0);
        Ok(())
    }

    #[test]
    fn test_bad_audition_duration_fails() {
        let config: SamplerConfig = Config::builder()
            .add_source(File::from_str(
                "audition_duration: whenever",
                FileFormat::Yaml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert!(config.audition_duration().is_err());
    }
}
