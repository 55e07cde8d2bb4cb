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

#[cfg(test)]
use std::{
    error::Error,
    fs::File,
    path::Path,
    thread,
    time::{Duration, SystemTime},
};

#[cfg(test)]
use hound::{SampleFormat, WavSpec, WavWriter};

/// Wait for the given predicate to return true or fail.
#[inline]
#[cfg(test)]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = SystemTime::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        let elapsed = start.elapsed();
        if elapsed.is_err() {
            panic!("System time error");
        }
        let elapsed = elapsed.unwrap();

        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(tick);
    }
}

/// Writes the given channel planes to a 32-bit float wav file, interleaving
/// frames the way the format expects. All planes must be the same length.
#[cfg(test)]
pub fn write_wav(path: &Path, sample_rate: u32, planes: &[Vec<f32>]) -> Result<(), Box<dyn Error>> {
    let tempwav = File::create(path)?;

    let num_channels = planes.len();
    assert!(num_channels <= u16::MAX.into(), "Too many channels!");
    let mut writer = WavWriter::new(
        tempwav,
        WavSpec {
            channels: num_channels as u16,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )?;

    let frames = planes.iter().map(|plane| plane.len()).min().unwrap_or(0);
    for frame in 0..frames {
        for plane in planes {
            writer.write_sample(plane[frame])?;
        }
    }
    writer.finalize()?;

    Ok(())
}

/// Writes the given channel planes to a 16-bit integer wav file.
#[cfg(test)]
pub fn write_wav_16bit(
    path: &Path,
    sample_rate: u32,
    planes: &[Vec<f32>],
) -> Result<(), Box<dyn Error>> {
    let tempwav = File::create(path)?;

    let num_channels = planes.len();
    assert!(num_channels <= u16::MAX.into(), "Too many channels!");
    let mut writer = WavWriter::new(
        tempwav,
        WavSpec {
            channels: num_channels as u16,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        },
    )?;

    let frames = planes.iter().map(|plane| plane.len()).min().unwrap_or(0);
    for frame in 0..frames {
        for plane in planes {
            let quantized = (plane[frame].clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            writer.write_sample(quantized)?;
        }
    }
    writer.finalize()?;

    Ok(())
}

/// Writes a single-region instrument definition next to a generated mono wav
/// sample and returns the definition path.
#[cfg(test)]
pub fn write_instrument(
    dir: &Path,
    name: &str,
    opcodes: &str,
) -> Result<std::path::PathBuf, Box<dyn Error>> {
    write_wav(&dir.join("sample.wav"), 44100, &[vec![0.5; 64]])?;
    let path = dir.join(name);
    std::fs::write(&path, format!("<region> sample=sample.wav {}\n", opcodes))?;
    Ok(path)
}
