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
use std::f32::consts::FRAC_PI_4;
use std::sync::Arc;

use super::envelope::Envelope;
use crate::catalog::SampleProgram;
use crate::sfz::Trigger;

/// A single playback voice: one program sounding one note.
///
/// The voice holds its own `Arc` to the program it plays, so it keeps
/// rendering correctly even after the catalog it came from has been
/// replaced.
pub(crate) struct Voice {
    program: Arc<SampleProgram>,
    channel: u8,
    note: u8,
    cursor: f64,
    ratio: f64,
    gain_left: f32,
    gain_right: f32,
    envelope: Envelope,
    ordinal: u64,
    sustained: bool,
}

impl Voice {
    /// Starts a voice for the given program and note. The pitch ratio and
    /// gains are fixed for the life of the voice.
    pub(crate) fn start(
        program: Arc<SampleProgram>,
        channel: u8,
        note: u8,
        velocity: u8,
        sample_rate: f32,
    ) -> Voice {
        let region = program.region();

        let semitones = note as f64 - region.pitch_keycenter() as f64
            + region.transpose() as f64
            + region.tune() as f64 / 100.0;
        let ratio = (semitones / 12.0).exp2();

        let velocity_gain = velocity as f32 / 127.0;
        let volume_gain = 10f32.powf(region.volume() / 20.0);
        // Constant-power pan: equal gains at center, full attenuation of
        // the far side at the extremes.
        let theta = (region.pan() / 100.0 + 1.0) * FRAC_PI_4;
        let gain = velocity_gain * volume_gain;

        let envelope = Envelope::start(
            sample_rate,
            region.ampeg_attack(),
            region.ampeg_decay(),
            region.ampeg_sustain() / 100.0,
            region.ampeg_release(),
        );

        Voice {
            channel,
            note,
            cursor: 0.0,
            ratio,
            gain_left: gain * theta.cos(),
            gain_right: gain * theta.sin(),
            envelope,
            ordinal: 0,
            sustained: false,
            program,
        }
    }

    /// Renders this voice additively into an interleaved output block.
    /// Returns false once the voice has finished (end of sample data or
    /// envelope done) and should be freed.
    pub(crate) fn render(&mut self, out: &mut [f32], channels: usize) -> bool {
        let asset = self.program.asset();
        let total = asset.frames();
        // Too short to interpolate: empty or single-frame assets are freed
        // silently.
        if total < 2 {
            return false;
        }

        let frames = out.len() / channels;
        for frame in 0..frames {
            let pos = self.cursor as usize;
            if pos + 1 >= total {
                return false;
            }
            let alpha = (self.cursor - pos as f64) as f32;
            let inv_alpha = 1.0 - alpha;

            let envelope = self.envelope.next_sample();
            for channel in 0..channels {
                let plane = asset.plane(channel);
                // Simple linear interpolation between the bracketing frames.
                let sample = plane[pos] * inv_alpha + plane[pos + 1] * alpha;
                let gain = if channel % 2 == 0 {
                    self.gain_left
                } else {
                    self.gain_right
                };
                out[frame * channels + channel] += sample * envelope * gain;
            }

            self.cursor += self.ratio;
            if !self.envelope.is_active() {
                return false;
            }
        }
        true
    }

    /// Moves the voice into its envelope release stage.
    pub(crate) fn release(&mut self) {
        self.sustained = false;
        self.envelope.note_off();
    }

    /// Defers this voice's release until the sustain pedal lifts.
    pub(crate) fn defer_release(&mut self) {
        self.sustained = true;
    }

    /// Clears and returns whether this voice had a deferred release.
    pub(crate) fn take_sustained(&mut self) -> bool {
        std::mem::take(&mut self.sustained)
    }

    /// The program this voice is playing.
    pub(crate) fn program(&self) -> &Arc<SampleProgram> {
        &self.program
    }

    /// The trigger mode of the program this voice is playing.
    pub(crate) fn trigger(&self) -> Trigger {
        self.program.region().trigger()
    }

    /// The MIDI channel this voice is sounding on.
    pub(crate) fn channel(&self) -> u8 {
        self.channel
    }

    /// The note this voice is sounding.
    pub(crate) fn note(&self) -> u8 {
        self.note
    }

    /// Whether this voice is in its release stage.
    pub(crate) fn is_releasing(&self) -> bool {
        self.envelope.is_releasing()
    }

    #[cfg(test)]
    pub(crate) fn ordinal(&self) -> u64 {
        self.ordinal
    }
}

/// A fixed-capacity pool of playback voices.
///
/// When every slot is busy, new voices steal one: first the oldest voice in
/// its release stage, otherwise the oldest voice outright. Stolen voices
/// are hard-stopped with no fade.
pub(crate) struct VoicePool {
    voices: Vec<Option<Voice>>,
    next_ordinal: u64,
}

impl VoicePool {
    /// Creates a pool with the given number of voice slots.
    pub(crate) fn new(capacity: usize) -> VoicePool {
        let mut voices = Vec::with_capacity(capacity.max(1));
        voices.resize_with(capacity.max(1), || None);
        VoicePool {
            voices,
            next_ordinal: 0,
        }
    }

    /// The number of voice slots.
    pub(crate) fn capacity(&self) -> usize {
        self.voices.len()
    }

    /// The number of voices currently sounding.
    pub(crate) fn active_count(&self) -> usize {
        self.voices.iter().flatten().count()
    }

    /// Whether any voice is currently sounding.
    pub(crate) fn any_active(&self) -> bool {
        self.voices.iter().any(|slot| slot.is_some())
    }

    /// Places a started voice in the pool, stealing a slot if necessary.
    pub(crate) fn start(&mut self, mut voice: Voice) {
        voice.ordinal = self.next_ordinal;
        self.next_ordinal = self.next_ordinal.wrapping_add(1);
        let slot = self.allocate();
        self.voices[slot] = Some(voice);
    }

    /// Hard-stops every voice whose program is choked by the given group.
    pub(crate) fn stop_choked_by(&mut self, group: i64) {
        for slot in self.voices.iter_mut() {
            if slot
                .as_ref()
                .is_some_and(|voice| voice.program.region().off_by() == group)
            {
                *slot = None;
            }
        }
    }

    /// Iterates over the sounding voices.
    pub(crate) fn voices(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter().flatten()
    }

    /// Iterates mutably over the sounding voices.
    pub(crate) fn voices_mut(&mut self) -> impl Iterator<Item = &mut Voice> {
        self.voices.iter_mut().flatten()
    }

    /// Renders every voice additively into the block, freeing voices that
    /// finish.
    pub(crate) fn render_into(&mut self, out: &mut [f32], channels: usize) {
        for slot in self.voices.iter_mut() {
            let finished = match slot {
                Some(voice) => !voice.render(out, channels),
                None => false,
            };
            if finished {
                *slot = None;
            }
        }
    }

    /// Picks the slot for a new voice: a free one if available, else the
    /// oldest releasing voice, else the oldest voice overall.
    fn allocate(&self) -> usize {
        if let Some(free) = self.voices.iter().position(|slot| slot.is_none()) {
            return free;
        }
        let releasing = self
            .voices
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|voice| (index, voice)))
            .filter(|(_, voice)| voice.is_releasing())
            .min_by_key(|(_, voice)| voice.ordinal)
            .map(|(index, _)| index);
        if let Some(index) = releasing {
            return index;
        }
        self.voices
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|voice| (index, voice)))
            .min_by_key(|(_, voice)| voice.ordinal)
            .map(|(index, _)| index)
            .unwrap_or(0)
    }
}
