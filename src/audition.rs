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

//! Auditions an instrument through the default audio output device.
//!
//! The sampler is moved into the cpal output callback and fed either a
//! built-in arpeggio or live events from a named MIDI input. Only the
//! default output device is used; device selection belongs to the caller's
//! environment, not to this crate.

use std::error::Error;
use std::path::Path;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{unbounded, Sender};
use midir::{MidiInput, MidiInputConnection};
use tracing::{error, info, warn};

use crate::engine::{Event, Sampler};

/// The block size hint handed to the sampler before rendering.
const BLOCK_SIZE_HINT: usize = 512;

/// The canned audition sequence: a rising arpeggio around middle C.
const ARPEGGIO_NOTES: [u8; 4] = [60, 64, 67, 72];
const ARPEGGIO_VELOCITY: u8 = 100;
const ARPEGGIO_STEP_SECONDS: f32 = 0.3;

/// Loads the given instrument and plays it through the default output
/// device for the given duration, driven by a MIDI input when one is named
/// and by the built-in arpeggio otherwise.
pub async fn run(
    instrument: &Path,
    voices: usize,
    master_volume: f32,
    duration: Duration,
    midi_device: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    let mut sampler = Sampler::new(voices, master_volume)?;

    let result_rx = sampler.request_load(instrument);
    let outcome = tokio::task::spawn_blocking(move || result_rx.recv()).await??;
    let result = outcome?;
    for error in &result.errors {
        warn!(err = error.to_string(), "Region failed during load");
    }
    info!(
        name = result.name,
        programs = result.programs,
        skipped = result.skipped_regions,
        "Instrument ready"
    );

    let device = default_output_device()?;
    let supported = device.default_output_config()?;
    if supported.sample_format() != cpal::SampleFormat::F32 {
        return Err(format!(
            "unsupported output sample format: {:?}",
            supported.sample_format()
        )
        .into());
    }
    let config = cpal::StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate as f32;
    sampler.prepare(sample_rate, BLOCK_SIZE_HINT);

    let (event_tx, event_rx) = unbounded();
    let _connection = match midi_device {
        Some(name) => Some(connect_midi(name, event_tx)?),
        None => None,
    };
    let mut arpeggio = match midi_device {
        Some(_) => None,
        None => Some(Arpeggio::new(sample_rate)),
    };

    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let mut events: Vec<Event> = Vec::new();
            // Live events land at the start of the block they arrive in.
            while let Ok(event) = event_rx.try_recv() {
                events.push(event);
            }
            if let Some(arpeggio) = arpeggio.as_mut() {
                events.extend(arpeggio.events_for_block(data.len() / channels));
            }
            sampler.render_block(data, channels, &events);
        },
        |err| error!("CPAL output stream error: {}", err),
        None,
    )?;
    stream.play()?;
    info!(seconds = duration.as_secs_f64(), "Audition started");

    tokio::time::sleep(duration).await;
    Ok(())
}

/// Gets the default audio output device.
fn default_output_device() -> Result<cpal::Device, Box<dyn Error>> {
    // Suppress noisy output here.
    let _shh_stdout = shh::stdout()?;
    let _shh_stderr = shh::stderr()?;

    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| "no default audio output device".into())
}

/// Connects to the first MIDI input port whose name contains the given
/// device name and forwards its events to the sampler.
fn connect_midi(
    name: &str,
    event_tx: Sender<Event>,
) -> Result<MidiInputConnection<()>, Box<dyn Error>> {
    let input = MidiInput::new("mstage audition input")?;
    let port = input
        .ports()
        .into_iter()
        .find(|port| {
            input
                .port_name(port)
                .is_ok_and(|port_name| port_name.contains(name))
        })
        .ok_or_else(|| format!("MIDI input device not found: {name}"))?;

    info!(device = name, "Watching MIDI events");
    Ok(input.connect(
        &port,
        "mstage audition watcher",
        move |_, raw_event, _| {
            if let Some(event) = Event::from_midi(0, raw_event) {
                if let Err(e) = event_tx.send(event) {
                    error!(err = e.to_string(), "Error sending MIDI event to sampler");
                }
            }
        },
        (),
    )?)
}

/// Generates the built-in audition sequence as frame-stamped events, one
/// block at a time. Each step releases the previous note and starts the
/// next one.
struct Arpeggio {
    step_frames: usize,
    until_next: usize,
    next_note: usize,
    sounding: Option<u8>,
}

impl Arpeggio {
    fn new(sample_rate: f32) -> Arpeggio {
        Arpeggio {
            step_frames: ((sample_rate * ARPEGGIO_STEP_SECONDS) as usize).max(1),
            until_next: 0,
            next_note: 0,
            sounding: None,
        }
    }

    /// Emits the events falling inside the next block of the given length,
    /// in ascending frame order.
    fn events_for_block(&mut self, frames: usize) -> Vec<Event> {
        let mut events = Vec::new();
        let mut frame = 0;
        while frame + self.until_next < frames {
            frame += self.until_next;
            if let Some(note) = self.sounding.take() {
                events.push(Event::note_off(frame, 0, note));
            }
            let note = ARPEGGIO_NOTES[self.next_note % ARPEGGIO_NOTES.len()];
            events.push(Event::note_on(frame, 0, note, ARPEGGIO_VELOCITY));
            self.sounding = Some(note);
            self.next_note += 1;
            self.until_next = self.step_frames;
        }
        self.until_next -= frames - frame;
        events
    }
}

#[cfg(test)]
mod test {
    use super::{Arpeggio, ARPEGGIO_VELOCITY};
    use crate::engine::Event;

    #[test]
    fn test_arpeggio_steps_through_block() {
        // 100 frames/s with a 0.3s step: notes land every 30 frames.
        let mut arpeggio = Arpeggio::new(100.0);

        let events = arpeggio.events_for_block(100);
        assert_eq!(
            vec![
                Event::note_on(0, 0, 60, ARPEGGIO_VELOCITY),
                Event::note_off(30, 0, 60),
                Event::note_on(30, 0, 64, ARPEGGIO_VELOCITY),
                Event::note_off(60, 0, 64),
                Event::note_on(60, 0, 67, ARPEGGIO_VELOCITY),
                Event::note_off(90, 0, 67),
                Event::note_on(90, 0, 72, ARPEGGIO_VELOCITY),
            ],
            events
        );
    }

    #[test]
    fn test_arpeggio_spacing_spans_blocks() {
        let mut arpeggio = Arpeggio::new(100.0);
        arpeggio.events_for_block(100);

        // The last note of the previous block landed at frame 90; the next
        // step is due 20 frames into this block, wrapping the sequence.
        let events = arpeggio.events_for_block(100);
        assert_eq!(Event::note_off(20, 0, 72), events[0]);
        assert_eq!(Event::note_on(20, 0, 60, ARPEGGIO_VELOCITY), events[1]);
    }

    #[test]
    fn test_arpeggio_empty_block() {
        let mut arpeggio = Arpeggio::new(100.0);
        assert!(arpeggio.events_for_block(0).is_empty());
    }
}
