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

//! The polyphonic sampler engine.
//!
//! The [`Sampler`] sits on the render path: an audio callback hands it an
//! interleaved output block and the frame-stamped events that fall inside
//! it, and the sampler matches those events against the active catalog,
//! starts and stops voices, and mixes their audio into the block. All
//! blocking work (parsing, decoding) happens on the load path; the sampler
//! only ever picks up finished catalogs from a channel at the start of a
//! block.

mod envelope;
mod events;
mod voice;

use std::path::Path;
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver};
use tracing::debug;

use crate::catalog::{Catalog, CatalogSummary, SampleProgram};
use crate::loader::{LoadError, LoadResult, Loader};
use crate::sfz::{RegionRecord, Trigger};
use voice::{Voice, VoicePool};

pub use events::{Event, EventKind};

/// The default number of simultaneous playback voices.
pub const DEFAULT_VOICES: usize = 16;

/// The default gain applied to the mixed output block.
pub const DEFAULT_MASTER_GAIN: f32 = 0.8;

/// The MIDI controller number of the sustain pedal.
const CC_SUSTAIN: u8 = 64;

/// How many published catalogs may queue up between render callbacks.
const CATALOG_QUEUE: usize = 16;

/// The sampler engine: a fixed pool of voices playing programs from the
/// most recently adopted catalog.
///
/// The sampler is meant to be moved into the audio callback and owned by it
/// exclusively. Grab a [`Loader`] handle with [`Sampler::loader`] first;
/// loads requested through the handle reach the sampler over an internal
/// channel drained at the start of each rendered block.
pub struct Sampler {
    sample_rate: f32,
    master_gain: f32,
    /// Last seen sustain pedal value.
    cc64: u8,
    pool: VoicePool,
    catalog: Option<Arc<Catalog>>,
    /// Ticket of the catalog currently in use.
    applied_epoch: u64,
    catalog_rx: Receiver<(u64, Arc<Catalog>)>,
    loader: Loader,
    /// Per-note round-robin counters, advanced once per note-on.
    note_counters: [u32; 128],
    /// Per-note velocity of the last note-on, for release-triggered
    /// programs.
    remembered_velocity: [u8; 128],
}

impl Sampler {
    /// Creates a sampler with the given voice capacity and master gain.
    pub fn new(voices: usize, master_gain: f32) -> Result<Sampler, String> {
        let (catalog_tx, catalog_rx) = bounded(CATALOG_QUEUE);
        let loader = Loader::new(catalog_tx)?;

        Ok(Sampler {
            sample_rate: 44100.0,
            master_gain,
            cc64: 0,
            pool: VoicePool::new(voices),
            catalog: None,
            applied_epoch: 0,
            catalog_rx,
            loader,
            note_counters: [0; 128],
            remembered_velocity: [0; 128],
        })
    }

    /// A cloneable handle for requesting loads and reading catalog
    /// summaries from other threads.
    pub fn loader(&self) -> Loader {
        self.loader.clone()
    }

    /// Tells the sampler the stream's sample rate before rendering starts.
    /// The block size hint is accepted for symmetry with audio backends;
    /// rendering adapts to whatever block length it is handed.
    pub fn prepare(&mut self, sample_rate: f32, _block_size_hint: usize) {
        self.sample_rate = sample_rate.max(1.0);
    }

    /// Requests a background load of the instrument definition at the given
    /// path. The returned receiver yields the load outcome; the catalog
    /// itself arrives on the render path at the start of a later block.
    pub fn request_load(&self, path: &Path) -> Receiver<Result<LoadResult, LoadError>> {
        self.loader.request_load(path)
    }

    /// The summary of the most recently published catalog, if any.
    pub fn catalog_summary(&self) -> Option<CatalogSummary> {
        self.loader.catalog_summary()
    }

    /// Renders one interleaved block, handling each event at its frame
    /// offset. Events are expected in ascending frame order; offsets past
    /// the end of the block are clamped to it.
    pub fn render_block(&mut self, output: &mut [f32], channels: usize, events: &[Event]) {
        self.adopt_latest_catalog();

        output.fill(0.0);
        if channels == 0 {
            return;
        }

        let frames = output.len() / channels;
        let mut cursor = 0;
        for event in events {
            let frame = event.frame.min(frames);
            if frame > cursor {
                self.pool
                    .render_into(&mut output[cursor * channels..frame * channels], channels);
                cursor = frame;
            }
            self.handle_event(event);
        }
        if cursor < frames {
            self.pool
                .render_into(&mut output[cursor * channels..frames * channels], channels);
        }

        for sample in output.iter_mut() {
            *sample *= self.master_gain;
        }
    }

    /// Swaps in the newest complete catalog published since the last block,
    /// if any. Voices keep their own program references, so a swap never
    /// interrupts audio that is already sounding.
    fn adopt_latest_catalog(&mut self) {
        let mut newest: Option<(u64, Arc<Catalog>)> = None;
        while let Ok((ticket, catalog)) = self.catalog_rx.try_recv() {
            if ticket > self.applied_epoch
                && newest
                    .as_ref()
                    .map(|(newest_ticket, _)| ticket > *newest_ticket)
                    .unwrap_or(true)
            {
                newest = Some((ticket, catalog));
            }
        }
        if let Some((ticket, catalog)) = newest {
            debug!(
                name = catalog.name(),
                programs = catalog.programs().len(),
                "Adopting instrument catalog"
            );
            self.applied_epoch = ticket;
            self.catalog = Some(catalog);
        }
    }

    fn handle_event(&mut self, event: &Event) {
        match event.kind {
            // MIDI convention: a note-on at velocity zero is a note-off.
            EventKind::NoteOn {
                channel,
                note,
                velocity: 0,
            } => self.note_off(channel, note),
            EventKind::NoteOn {
                channel,
                note,
                velocity,
            } => self.note_on(channel, note, velocity),
            EventKind::NoteOff { channel, note } => self.note_off(channel, note),
            EventKind::Controller {
                controller, value, ..
            } => self.controller(controller, value),
        }
    }

    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        self.remembered_velocity[note as usize] = velocity;
        let Some(catalog) = self.catalog.clone() else {
            return;
        };

        // Trigger eligibility looks at pool activity before this note-on
        // adds voices of its own.
        let any_active = self.pool.any_active();
        let counter = self.note_counters[note as usize];

        for program in catalog.programs() {
            let region = program.region();
            let eligible = match region.trigger() {
                Trigger::Attack => true,
                Trigger::First => !any_active,
                Trigger::Legato => any_active,
                Trigger::Release => false,
            };
            if eligible
                && region.matches_note(note)
                && region.matches_velocity(velocity)
                && region.matches_sustain_cc(self.cc64)
                && seq_allows(region, counter)
            {
                self.start_program(program.clone(), channel, note, velocity);
            }
        }

        self.note_counters[note as usize] = counter.wrapping_add(1);
    }

    fn note_off(&mut self, channel: u8, note: u8) {
        let sustained = self.cc64 >= 64;
        for voice in self.pool.voices_mut() {
            if voice.channel() == channel
                && voice.note() == note
                && voice.trigger() != Trigger::Release
            {
                if sustained {
                    voice.defer_release();
                } else {
                    voice.release();
                }
            }
        }
        self.start_release_programs(channel, note);
    }

    /// Starts the release-triggered programs matching a note going up, at
    /// the velocity remembered from its note-on.
    fn start_release_programs(&mut self, channel: u8, note: u8) {
        let Some(catalog) = self.catalog.clone() else {
            return;
        };
        let velocity = self.remembered_velocity[note as usize];
        let counter = self.note_counters[note as usize];

        for program in catalog.programs() {
            let region = program.region();
            if region.trigger() == Trigger::Release
                && region.matches_note(note)
                && region.matches_velocity(velocity)
                && region.matches_sustain_cc(self.cc64)
                && seq_allows(region, counter)
            {
                self.start_program(program.clone(), channel, note, velocity);
            }
        }
    }

    fn controller(&mut self, controller: u8, value: u8) {
        if controller != CC_SUSTAIN {
            return;
        }
        self.cc64 = value;
        if value < 64 {
            // Pedal up: releases every voice whose note-off was deferred.
            for voice in self.pool.voices_mut() {
                if voice.take_sustained() {
                    voice.release();
                }
            }
        }
    }

    /// Chokes competing voices and starts one voice for the program.
    fn start_program(&mut self, program: Arc<SampleProgram>, channel: u8, note: u8, velocity: u8) {
        let group = program.region().group();
        if group != 0 {
            self.pool.stop_choked_by(group);
        }
        let voice = Voice::start(program, channel, note, velocity, self.sample_rate);
        self.pool.start(voice);
    }
}

/// Round-robin gate: with a sequence declared, a program only sounds when
/// the note's counter lands on its position.
fn seq_allows(region: &RegionRecord, counter: u32) -> bool {
    region.seq_length() <= 1 || (counter % region.seq_length()) + 1 == region.seq_position()
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use super::{Event, EventKind, Sampler};
    use crate::asset::DecodedAsset;
    use crate::catalog::{Catalog, SampleProgram};
    use crate::sfz::{RegionRecord, Trigger};
    use crate::testutil;

    /// Gain of a full-velocity, 0dB, center-panned voice on either channel.
    const CENTER_GAIN: f32 = std::f32::consts::FRAC_1_SQRT_2;

    fn program(opcodes: &[(&str, &str)]) -> Arc<SampleProgram> {
        let mut region = RegionRecord::default();
        for (key, value) in opcodes {
            region.apply(key, value);
        }
        region.normalize();
        let asset = DecodedAsset::from_planes(vec![vec![1.0; 2048]], 44100);
        Arc::new(SampleProgram::new(region, Arc::new(asset)))
    }

    fn sampler_with(voices: usize, programs: Vec<Arc<SampleProgram>>) -> Sampler {
        let mut sampler = Sampler::new(voices, 1.0).expect("sampler should build");
        sampler.catalog = Some(Arc::new(Catalog::new(
            "Test".to_string(),
            PathBuf::from("test.sfz"),
            programs,
        )));
        sampler
    }

    fn sounding_notes(sampler: &Sampler) -> Vec<u8> {
        sampler.pool.voices().map(|voice| voice.note()).collect()
    }

    #[test]
    fn test_note_on_layers_every_matching_program() {
        let mut sampler = sampler_with(
            8,
            vec![
                program(&[("lokey", "60"), ("hikey", "62")]),
                program(&[]),
                program(&[("lokey", "70"), ("hikey", "80")]),
            ],
        );

        sampler.note_on(0, 60, 100);
        assert_eq!(vec![60, 60], sounding_notes(&sampler));
    }

    #[test]
    fn test_note_and_velocity_ranges_gate_note_on() {
        let programs = vec![program(&[
            ("lokey", "60"),
            ("hikey", "62"),
            ("lovel", "10"),
            ("hivel", "100"),
        ])];

        let mut sampler = sampler_with(8, programs);
        sampler.note_on(0, 59, 50);
        sampler.note_on(0, 63, 50);
        sampler.note_on(0, 60, 9);
        sampler.note_on(0, 60, 101);
        assert_eq!(0, sampler.pool.active_count());

        sampler.note_on(0, 60, 10);
        sampler.note_on(0, 62, 100);
        assert_eq!(vec![60, 62], sounding_notes(&sampler));
    }

    #[test]
    fn test_single_voice_steal_stops_first_note() {
        let mut sampler = sampler_with(1, vec![program(&[])]);

        let mut block = vec![0.0f32; 16];
        sampler.render_block(&mut block, 1, &[Event::note_on(0, 0, 60, 127)]);
        assert!(block.iter().all(|sample| *sample > 0.0));

        sampler.render_block(&mut block, 1, &[Event::note_on(0, 0, 62, 127)]);
        assert_eq!(vec![62], sounding_notes(&sampler));
        assert_eq!(1, sampler.pool.capacity());
    }

    #[test]
    fn test_zero_attack_and_release_are_instant() {
        let programs = vec![program(&[("ampeg_attack", "0"), ("ampeg_release", "0")])];
        let mut sampler = sampler_with(4, programs);

        // Full amplitude on the very first rendered sample after note-on.
        let mut block = vec![0.0f32; 8];
        sampler.render_block(&mut block, 1, &[Event::note_on(0, 0, 60, 127)]);
        assert!((block[0] - CENTER_GAIN).abs() < 1e-6);

        // Silence from the very first rendered sample after note-off.
        sampler.render_block(&mut block, 1, &[Event::note_off(0, 0, 60)]);
        assert!(block.iter().all(|sample| *sample == 0.0));
        assert_eq!(0, sampler.pool.active_count());
    }

    #[test]
    fn test_round_robin_alternates_per_note() {
        let programs = vec![
            program(&[("seq_length", "2"), ("seq_position", "1")]),
            program(&[("seq_length", "2"), ("seq_position", "2")]),
        ];
        let mut sampler = sampler_with(8, programs);

        let positions = |sampler: &Sampler| -> Vec<u32> {
            let mut positions: Vec<u32> = sampler
                .pool
                .voices()
                .map(|voice| voice.program().region().seq_position())
                .collect();
            positions.sort_unstable();
            positions
        };

        sampler.note_on(0, 60, 100);
        assert_eq!(vec![1], positions(&sampler));
        sampler.note_on(0, 60, 100);
        assert_eq!(vec![1, 2], positions(&sampler));
        sampler.note_on(0, 60, 100);
        assert_eq!(vec![1, 1, 2], positions(&sampler));

        // Counters are per note: a different note starts at position 1.
        sampler.note_on(0, 64, 100);
        assert_eq!(vec![1, 1, 1, 2], positions(&sampler));
    }

    #[test]
    fn test_choke_group_silences_off_by_voice() {
        let programs = vec![
            program(&[("lokey", "60"), ("hikey", "60"), ("off_by", "5")]),
            program(&[("lokey", "62"), ("hikey", "62"), ("group", "5")]),
        ];
        let mut sampler = sampler_with(8, programs);

        sampler.note_on(0, 60, 100);
        assert_eq!(vec![60], sounding_notes(&sampler));

        sampler.note_on(0, 62, 100);
        assert_eq!(vec![62], sounding_notes(&sampler));
    }

    #[test]
    fn test_sustain_pedal_defers_release() {
        let programs = vec![program(&[("ampeg_release", "10")])];
        let mut sampler = sampler_with(4, programs);

        sampler.note_on(0, 60, 100);
        sampler.controller(64, 127);
        sampler.note_off(0, 60);
        assert!(sampler.pool.voices().all(|voice| !voice.is_releasing()));

        sampler.controller(64, 0);
        assert!(sampler.pool.voices().all(|voice| voice.is_releasing()));
    }

    #[test]
    fn test_cc64_range_gates_matching() {
        // A pedal-down region: only matches while the pedal is held.
        let programs = vec![program(&[("locc64", "64")])];
        let mut sampler = sampler_with(4, programs);

        sampler.note_on(0, 60, 100);
        assert_eq!(0, sampler.pool.active_count());

        sampler.controller(64, 127);
        sampler.note_on(0, 60, 100);
        assert_eq!(1, sampler.pool.active_count());
    }

    #[test]
    fn test_first_and_legato_triggers() {
        let programs = vec![
            program(&[("trigger", "first")]),
            program(&[("trigger", "legato")]),
        ];
        let mut sampler = sampler_with(8, programs);

        sampler.note_on(0, 60, 100);
        let triggers: Vec<Trigger> = sampler.pool.voices().map(|voice| voice.trigger()).collect();
        assert_eq!(vec![Trigger::First], triggers);

        sampler.note_on(0, 62, 100);
        let triggers: Vec<Trigger> = sampler.pool.voices().map(|voice| voice.trigger()).collect();
        assert_eq!(vec![Trigger::First, Trigger::Legato], triggers);
    }

    #[test]
    fn test_release_trigger_uses_remembered_velocity() {
        let programs = vec![
            program(&[]),
            program(&[("trigger", "release"), ("lovel", "100")]),
        ];
        let mut sampler = sampler_with(8, programs);

        // Loud note: the release program matches its remembered velocity.
        sampler.note_on(0, 60, 120);
        assert_eq!(1, sampler.pool.active_count());
        sampler.note_off(0, 60);
        let triggers: Vec<Trigger> = sampler.pool.voices().map(|voice| voice.trigger()).collect();
        assert!(triggers.contains(&Trigger::Release));

        // Quiet note: no release sample.
        let release_only = vec![program(&[("trigger", "release"), ("lovel", "100")])];
        let mut sampler = sampler_with(8, release_only);
        sampler.note_on(0, 60, 50);
        sampler.note_off(0, 60);
        assert_eq!(0, sampler.pool.active_count());
    }

    #[test]
    fn test_note_off_matches_channel() {
        let mut sampler = sampler_with(8, vec![program(&[])]);

        sampler.note_on(0, 60, 100);
        sampler.note_on(1, 60, 100);
        sampler.note_off(0, 60);

        for voice in sampler.pool.voices() {
            assert_eq!(voice.channel() == 0, voice.is_releasing());
        }
    }

    #[test]
    fn test_velocity_zero_note_on_is_note_off() {
        let mut sampler = sampler_with(8, vec![program(&[])]);

        sampler.note_on(0, 60, 100);
        sampler.handle_event(&Event {
            frame: 0,
            kind: EventKind::NoteOn {
                channel: 0,
                note: 60,
                velocity: 0,
            },
        });
        assert!(sampler.pool.voices().all(|voice| voice.is_releasing()));
    }

    #[test]
    fn test_event_offsets_split_the_block() {
        let mut sampler = sampler_with(4, vec![program(&[])]);

        let mut block = vec![0.0f32; 16];
        sampler.render_block(&mut block, 1, &[Event::note_on(8, 0, 60, 127)]);
        assert!(block[..8].iter().all(|sample| *sample == 0.0));
        assert!((block[8] - CENTER_GAIN).abs() < 1e-6);
    }

    #[test]
    fn test_master_gain_scales_output() {
        let mut sampler = sampler_with(4, vec![program(&[])]);
        sampler.master_gain = 0.5;

        let mut block = vec![0.0f32; 8];
        sampler.render_block(&mut block, 1, &[Event::note_on(0, 0, 60, 127)]);
        assert!((block[0] - CENTER_GAIN * 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_renders_silence_without_catalog() {
        let mut sampler = Sampler::new(4, 1.0).expect("sampler should build");

        let mut block = vec![0.5f32; 16];
        sampler.render_block(&mut block, 2, &[Event::note_on(0, 0, 60, 127)]);
        assert!(block.iter().all(|sample| *sample == 0.0));

        // Degenerate shapes must not panic.
        sampler.render_block(&mut [], 2, &[]);
        sampler.render_block(&mut block, 0, &[Event::note_on(0, 0, 60, 127)]);
    }

    #[test]
    fn test_render_adopts_published_catalog() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let instrument_dir = dir.path().join("Warm Piano");
        std::fs::create_dir_all(&instrument_dir)?;
        let path = testutil::write_instrument(&instrument_dir, "inst.sfz", "")?;

        let mut sampler = Sampler::new(4, 1.0)?;
        let result = sampler
            .request_load(&path)
            .recv_timeout(Duration::from_secs(5))?
            .expect("load should succeed");
        assert!(!result.superseded);

        // The catalog is published before the load result is delivered, so
        // the next block can already play it.
        let mut block = vec![0.0f32; 64];
        sampler.render_block(&mut block, 2, &[Event::note_on(0, 0, 60, 127)]);
        assert!(block.iter().any(|sample| *sample != 0.0));
        assert_eq!(
            "Warm Piano",
            sampler.catalog_summary().expect("summary should be set").name()
        );
        Ok(())
    }
}
