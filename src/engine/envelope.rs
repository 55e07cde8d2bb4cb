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

/// The stage an envelope is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// A linear amplitude envelope, advanced one value per rendered frame.
///
/// Stages run Attack (0 to 1), Decay (1 down to the sustain level), Sustain
/// (hold) and Release (current value down to 0). A release always starts
/// from the current value, whatever stage it interrupts, so there is never
/// a jump in amplitude. Zero-length stages take effect on the first
/// rendered frame.
#[derive(Debug)]
pub(crate) struct Envelope {
    sample_rate: f32,
    sustain_level: f32,
    decay_seconds: f32,
    release_seconds: f32,
    stage: Stage,
    value: f32,
    step: f32,
}

impl Envelope {
    /// Creates an envelope and starts its attack stage. Times are in
    /// seconds; `sustain_level` is a gain in [0, 1].
    pub(crate) fn start(
        sample_rate: f32,
        attack: f32,
        decay: f32,
        sustain_level: f32,
        release: f32,
    ) -> Envelope {
        let sample_rate = sample_rate.max(1.0);
        let mut envelope = Envelope {
            sample_rate,
            sustain_level: sustain_level.clamp(0.0, 1.0),
            decay_seconds: decay.max(0.0),
            release_seconds: release.max(0.0),
            stage: Stage::Attack,
            value: 0.0,
            step: 0.0,
        };
        if attack > 0.0 {
            envelope.step = 1.0 / (attack * sample_rate);
        } else {
            envelope.value = 1.0;
            envelope.enter_decay();
        }
        envelope
    }

    fn enter_decay(&mut self) {
        if self.decay_seconds > 0.0 {
            self.stage = Stage::Decay;
            self.step = (1.0 - self.sustain_level) / (self.decay_seconds * self.sample_rate);
        } else {
            self.stage = Stage::Sustain;
            self.value = self.sustain_level;
        }
    }

    /// Begins the release stage from the current value. Idle envelopes stay
    /// idle.
    pub(crate) fn note_off(&mut self) {
        if self.stage == Stage::Idle || self.stage == Stage::Release {
            return;
        }
        if self.release_seconds > 0.0 && self.value > 0.0 {
            self.stage = Stage::Release;
            self.step = self.value / (self.release_seconds * self.sample_rate);
        } else {
            self.stage = Stage::Idle;
            self.value = 0.0;
        }
    }

    /// Advances the envelope by one frame and returns the new value.
    pub(crate) fn next_sample(&mut self) -> f32 {
        match self.stage {
            Stage::Idle => 0.0,
            Stage::Attack => {
                self.value += self.step;
                if self.value >= 1.0 {
                    self.value = 1.0;
                    self.enter_decay();
                }
                self.value
            }
            Stage::Decay => {
                self.value -= self.step;
                if self.value <= self.sustain_level {
                    self.value = self.sustain_level;
                    self.stage = Stage::Sustain;
                }
                self.value
            }
            Stage::Sustain => self.value,
            Stage::Release => {
                self.value -= self.step;
                if self.value <= 0.0 {
                    self.value = 0.0;
                    self.stage = Stage::Idle;
                }
                self.value
            }
        }
    }

    /// Whether the envelope still produces signal.
    pub(crate) fn is_active(&self) -> bool {
        self.stage != Stage::Idle
    }

    /// Whether the envelope is in its release stage.
    pub(crate) fn is_releasing(&self) -> bool {
        self.stage == Stage::Release
    }
}
