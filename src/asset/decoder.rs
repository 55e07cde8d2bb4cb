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
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::get_codecs;
use symphonia::default::get_probe;

use super::error::AssetError;

/// A fully decoded audio asset held in memory as planar `f32` samples.
/// Voices read straight out of these planes while rendering, so no further
/// decoding happens on the audio thread.
pub struct DecodedAsset {
    channels: usize,
    frames: usize,
    sample_rate: u32,
    data: Vec<Vec<f32>>,
}

impl DecodedAsset {
    /// The number of audio channels.
    pub fn channel_count(&self) -> usize {
        self.channels
    }

    /// The number of frames per channel.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// The sample rate the audio was encoded at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The duration of the decoded audio.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames as f64 / self.sample_rate as f64)
    }

    /// Returns the samples for the given channel. Requests beyond the last
    /// channel are mapped onto the last one, so mono assets can feed every
    /// output channel.
    pub fn plane(&self, channel: usize) -> &[f32] {
        &self.data[channel.min(self.channels - 1)]
    }
}

#[cfg(test)]
impl DecodedAsset {
    /// Creates an asset directly from sample planes.
    pub(crate) fn from_planes(data: Vec<Vec<f32>>, sample_rate: u32) -> DecodedAsset {
        let channels = data.len();
        let frames = data.iter().map(|plane| plane.len()).min().unwrap_or(0);
        DecodedAsset {
            channels,
            frames,
            sample_rate,
            data,
        }
    }
}

/// Decodes an entire audio file into memory.
/// Supports WAV, FLAC, OGG and the other formats symphonia can read.
pub fn decode_file(path: &Path) -> Result<DecodedAsset, AssetError> {
    // Open the file (include path in error so user sees which file failed).
    let file = File::open(path).map_err(|e| {
        AssetError::IoError(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Create a hint to help the format registry guess the format.
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();
    let probed = get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(|e| decode_error(path, e))?;

    let mut format_reader = probed.format;

    // Find the first audio track.
    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AssetError::DecodeError {
            path: path.to_path_buf(),
            message: "no audio track found".to_string(),
        })?;

    let track_id = track.id;
    let params = &track.codec_params;

    let sample_rate = params.sample_rate.ok_or_else(|| AssetError::DecodeError {
        path: path.to_path_buf(),
        message: "sample rate not specified".to_string(),
    })?;

    let decoder_opts: DecoderOptions = Default::default();
    let mut decoder = get_codecs()
        .make(params, &decoder_opts)
        .map_err(|e| decode_error(path, e))?;

    // Read and decode every packet for our track. The channel planes are
    // sized from the first decoded buffer, which also covers codecs that
    // omit a channel count from their parameters.
    let mut data: Vec<Vec<f32>> = Vec::new();
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            // Some decoders return DecodeError at EOF instead of IoError.
            Err(SymphoniaError::DecodeError(_)) => break,
            Err(e) => return Err(decode_error(path, e)),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                decoder.decode(&packet).map_err(|e| decode_error(path, e))?
            }
            Err(e) => return Err(decode_error(path, e)),
        };
        append_decoded(&mut data, decoded);
    }

    let frames = data.iter().map(|plane| plane.len()).min().unwrap_or(0);
    if frames == 0 {
        return Err(AssetError::DecodeError {
            path: path.to_path_buf(),
            message: "no audio data decoded".to_string(),
        });
    }

    Ok(DecodedAsset {
        channels: data.len(),
        frames,
        sample_rate,
        data,
    })
}

fn decode_error(path: &Path, err: SymphoniaError) -> AssetError {
    AssetError::DecodeError {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

/// Appends a decoded AudioBufferRef to the channel planes, converting each
/// symphonia sample format to f32.
fn append_decoded(data: &mut Vec<Vec<f32>>, decoded: AudioBufferRef) {
    match decoded {
        AudioBufferRef::F32(buf) => append_planar(data, &buf, |sample| sample),
        AudioBufferRef::F64(buf) => append_planar(data, &buf, |sample| sample as f32),
        AudioBufferRef::S8(buf) => append_planar(data, &buf, scale_s8),
        AudioBufferRef::S16(buf) => append_planar(data, &buf, scale_s16),
        AudioBufferRef::S24(buf) => append_planar(data, &buf, |sample| scale_s24(sample.inner())),
        AudioBufferRef::S32(buf) => append_planar(data, &buf, scale_s32),
        AudioBufferRef::U8(buf) => append_planar(data, &buf, scale_u8),
        AudioBufferRef::U16(buf) => append_planar(data, &buf, scale_u16),
        AudioBufferRef::U24(buf) => append_planar(data, &buf, |sample| scale_u24(sample.inner())),
        AudioBufferRef::U32(buf) => append_planar(data, &buf, scale_u32),
    }
}

/// Helper to append planar samples from a generic AudioBuffer.
/// The closure receives a single sample value and returns the f32 sample value.
fn append_planar<T, F>(data: &mut Vec<Vec<f32>>, buf: &AudioBuffer<T>, convert: F)
where
    T: symphonia::core::sample::Sample,
    F: Fn(T) -> f32,
{
    let frames = buf.frames();
    let channels = buf.spec().channels.count();
    if data.is_empty() {
        data.resize_with(channels, Vec::new);
    }
    let planes = buf.planes();
    for (plane_out, plane_in) in data.iter_mut().zip(planes.planes().iter()) {
        for frame_idx in 0..frames {
            plane_out.push(convert(plane_in[frame_idx]));
        }
    }
}

// Scaling helpers for all integer formats. These are `pub(crate)` so they can
// be validated directly in unit tests.

#[inline]
pub(crate) fn scale_s8(sample: i8) -> f32 {
    sample as f32 / (1i64 << 7) as f32
}

#[inline]
pub(crate) fn scale_s16(sample: i16) -> f32 {
    sample as f32 / (1i64 << 15) as f32
}

#[inline]
pub(crate) fn scale_s24(sample: i32) -> f32 {
    sample as f32 / (1i64 << 23) as f32
}

#[inline]
pub(crate) fn scale_s32(sample: i32) -> f32 {
    sample as f32 / (1i64 << 31) as f32
}

#[inline]
pub(crate) fn scale_u8(sample: u8) -> f32 {
    (sample as f32 / u8::MAX as f32) * 2.0 - 1.0
}

#[inline]
pub(crate) fn scale_u16(sample: u16) -> f32 {
    (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
}

#[inline]
pub(crate) fn scale_u24(sample: u32) -> f32 {
    let max = (1u32 << 24) - 1;
    (sample as f32 / max as f32) * 2.0 - 1.0
}

#[inline]
pub(crate) fn scale_u32(sample: u32) -> f32 {
    (sample as f32 / u32::MAX as f32) * 2.0 - 1.0
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::time::Duration;

    use super::*;
    use crate::testutil;

    #[test]
    fn test_decode_stereo_wav() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("stereo.wav");
        testutil::write_wav_16bit(
            &path,
            44100,
            &[vec![0.0, 0.25, 0.5, -0.5], vec![0.0, -0.25, -0.5, 0.5]],
        )?;

        let asset = decode_file(&path)?;
        assert_eq!(2, asset.channel_count());
        assert_eq!(4, asset.frames());
        assert_eq!(44100, asset.sample_rate());
        // 16-bit quantization keeps us within half a step of the original.
        for (expected, actual) in [0.0f32, 0.25, 0.5, -0.5].iter().zip(asset.plane(0)) {
            assert!((expected - actual).abs() < 1.0 / 32768.0);
        }
        for (expected, actual) in [0.0f32, -0.25, -0.5, 0.5].iter().zip(asset.plane(1)) {
            assert!((expected - actual).abs() < 1.0 / 32768.0);
        }
        Ok(())
    }

    #[test]
    fn test_decode_mono_maps_extra_channels() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("mono.wav");
        testutil::write_wav(&path, 44100, &[vec![0.5, -0.5]])?;

        let asset = decode_file(&path)?;
        assert_eq!(1, asset.channel_count());
        assert_eq!(asset.plane(0), asset.plane(1));
        assert_eq!(asset.plane(0), asset.plane(7));
        Ok(())
    }

    #[test]
    fn test_decode_duration() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("second.wav");
        testutil::write_wav(&path, 22050, &[vec![0.1; 22050]])?;

        let asset = decode_file(&path)?;
        assert_eq!(Duration::from_secs(1), asset.duration());
        Ok(())
    }

    #[test]
    fn test_decode_garbage_fails() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"this is not audio data at all")?;

        assert!(decode_file(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_decode_missing_file_fails() {
        let result = decode_file(std::path::Path::new("/nonexistent/na.wav"));
        assert!(result.is_err());
    }

    #[test]
    fn test_scaling() {
        assert_eq!(-1.0, scale_s8(i8::MIN));
        assert_eq!(0.0, scale_s8(0));
        assert_eq!(-1.0, scale_s16(i16::MIN));
        assert_eq!(0.0, scale_s16(0));
        assert!((scale_s16(i16::MAX) - 1.0).abs() < 1e-4);
        assert_eq!(-1.0, scale_s24(-(1 << 23)));
        assert_eq!(-1.0, scale_s32(i32::MIN));
        assert_eq!(-1.0, scale_u8(0));
        assert_eq!(1.0, scale_u8(u8::MAX));
        assert_eq!(-1.0, scale_u16(0));
        assert_eq!(1.0, scale_u16(u16::MAX));
        assert_eq!(-1.0, scale_u24(0));
        assert_eq!(1.0, scale_u24((1 << 24) - 1));
        assert_eq!(-1.0, scale_u32(0));
        assert_eq!(1.0, scale_u32(u32::MAX));
    }
}
