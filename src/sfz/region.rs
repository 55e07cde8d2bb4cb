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

/// How a region is started by incoming events.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Started by note-on. The default.
    #[default]
    Attack,
    /// Started by note-off (release samples).
    Release,
    /// Started by note-on only when no other voice is sounding.
    First,
    /// Started by note-on only when at least one voice is sounding.
    Legato,
}

impl Trigger {
    /// Parses a trigger opcode value. Unknown values fall back to the
    /// default, in the same spirit as numeric clamping.
    pub fn parse(value: &str) -> Trigger {
        match value {
            "attack" => Trigger::Attack,
            "release" => Trigger::Release,
            "first" => Trigger::First,
            "legato" => Trigger::Legato,
            _ => Trigger::Attack,
        }
    }

    /// The opcode spelling of this trigger mode.
    pub fn name(&self) -> &'static str {
        match self {
            Trigger::Attack => "attack",
            Trigger::Release => "release",
            Trigger::First => "first",
            Trigger::Legato => "legato",
        }
    }
}

/// One region with inheritance applied and every opcode converted to its
/// typed, clamped form. This is the playable description the catalog builder
/// turns into a sample program.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionRecord {
    /// Raw sample path as written in the instrument (after variable
    /// substitution). None when the region declared no sample.
    sample: Option<String>,
    lokey: u8,
    hikey: u8,
    lovel: u8,
    hivel: u8,
    /// The MIDI note at which the sample plays back at recorded pitch.
    pitch_keycenter: u8,
    /// Region gain in dB.
    volume: f32,
    /// Pan position, -100 (left) to 100 (right).
    pan: f32,
    /// Fine tuning in cents.
    tune: i32,
    /// Coarse tuning in semitones.
    transpose: i32,
    ampeg_attack: f32,
    ampeg_decay: f32,
    /// Sustain level as a percentage of full scale.
    ampeg_sustain: f32,
    ampeg_release: f32,
    trigger: Trigger,
    seq_length: u32,
    seq_position: u32,
    /// Sustain-controller (CC64) range gating this region.
    locc64: u8,
    hicc64: u8,
    sw_lokey: Option<u8>,
    sw_hikey: Option<u8>,
    sw_last: Option<u8>,
    /// Choke group this region belongs to. 0 means unassigned.
    group: i64,
    /// Choke group that silences this region. 0 means unassigned.
    off_by: i64,
}

impl Default for RegionRecord {
    fn default() -> Self {
        RegionRecord {
            sample: None,
            lokey: 0,
            hikey: 127,
            lovel: 0,
            hivel: 127,
            pitch_keycenter: 60,
            volume: 0.0,
            pan: 0.0,
            tune: 0,
            transpose: 0,
            ampeg_attack: 0.0,
            ampeg_decay: 0.0,
            ampeg_sustain: 100.0,
            ampeg_release: 0.1,
            trigger: Trigger::Attack,
            seq_length: 1,
            seq_position: 1,
            locc64: 0,
            hicc64: 127,
            sw_lokey: None,
            sw_hikey: None,
            sw_last: None,
            group: 0,
            off_by: 0,
        }
    }
}

impl RegionRecord {
    /// Applies one opcode, converting and clamping its value. Unknown keys
    /// are ignored. `key` is shorthand for lokey, hikey and pitch_keycenter
    /// at once.
    pub(crate) fn apply(&mut self, key: &str, value: &str) {
        match key {
            "sample" => self.sample = Some(value.to_string()),
            "lokey" => self.lokey = clamp_midi(parse_int(value)),
            "hikey" => self.hikey = clamp_midi(parse_int(value)),
            "key" => {
                let key = clamp_midi(parse_int(value));
                self.lokey = key;
                self.hikey = key;
                self.pitch_keycenter = key;
            }
            "lovel" => self.lovel = clamp_midi(parse_int(value)),
            "hivel" => self.hivel = clamp_midi(parse_int(value)),
            "pitch_keycenter" => self.pitch_keycenter = clamp_midi(parse_int(value)),
            "volume" => self.volume = parse_float(value).clamp(-144.0, 6.0),
            "pan" => self.pan = parse_float(value).clamp(-100.0, 100.0),
            "tune" => self.tune = parse_int(value).clamp(-100, 100) as i32,
            "transpose" => self.transpose = parse_int(value).clamp(-127, 127) as i32,
            "ampeg_attack" => self.ampeg_attack = parse_float(value).max(0.0),
            "ampeg_decay" => self.ampeg_decay = parse_float(value).max(0.0),
            "ampeg_sustain" => self.ampeg_sustain = parse_float(value).clamp(0.0, 100.0),
            "ampeg_release" => self.ampeg_release = parse_float(value).max(0.0),
            "trigger" => self.trigger = Trigger::parse(value),
            "seq_length" => self.seq_length = parse_int(value).max(1) as u32,
            "seq_position" => self.seq_position = parse_int(value).max(1) as u32,
            "locc64" => self.locc64 = clamp_midi(parse_int(value)),
            "hicc64" => self.hicc64 = clamp_midi(parse_int(value)),
            "sw_lokey" => self.sw_lokey = Some(clamp_midi(parse_int(value))),
            "sw_hikey" => self.sw_hikey = Some(clamp_midi(parse_int(value))),
            "sw_last" => self.sw_last = Some(clamp_midi(parse_int(value))),
            "group" => self.group = parse_int(value),
            "off_by" => self.off_by = parse_int(value),
            _ => {}
        }
    }

    /// Restores the range invariants after all opcodes have been applied:
    /// low bounds never exceed high bounds.
    pub(crate) fn normalize(&mut self) {
        if self.lokey > self.hikey {
            std::mem::swap(&mut self.lokey, &mut self.hikey);
        }
        if self.lovel > self.hivel {
            std::mem::swap(&mut self.lovel, &mut self.hivel);
        }
        if self.locc64 > self.hicc64 {
            std::mem::swap(&mut self.locc64, &mut self.hicc64);
        }
    }

    /// Returns true if the note falls inside this region's key range.
    pub fn matches_note(&self, note: u8) -> bool {
        self.lokey <= note && note <= self.hikey
    }

    /// Returns true if the velocity falls inside this region's velocity range.
    pub fn matches_velocity(&self, velocity: u8) -> bool {
        self.lovel <= velocity && velocity <= self.hivel
    }

    /// Returns true if the current sustain-controller value falls inside
    /// this region's CC64 range. The defaults of 0..=127 accept everything.
    pub fn matches_sustain_cc(&self, value: u8) -> bool {
        self.locc64 <= value && value <= self.hicc64
    }

    /// Gets the raw sample path, if the region declared one.
    pub fn sample(&self) -> Option<&str> {
        self.sample.as_deref()
    }

    /// Gets the low end of the key range.
    pub fn lokey(&self) -> u8 {
        self.lokey
    }

    /// Gets the high end of the key range.
    pub fn hikey(&self) -> u8 {
        self.hikey
    }

    /// Gets the low end of the velocity range.
    pub fn lovel(&self) -> u8 {
        self.lovel
    }

    /// Gets the high end of the velocity range.
    pub fn hivel(&self) -> u8 {
        self.hivel
    }

    /// Gets the root note.
    pub fn pitch_keycenter(&self) -> u8 {
        self.pitch_keycenter
    }

    /// Gets the region gain in dB.
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Gets the pan position.
    pub fn pan(&self) -> f32 {
        self.pan
    }

    /// Gets the fine tuning in cents.
    pub fn tune(&self) -> i32 {
        self.tune
    }

    /// Gets the coarse tuning in semitones.
    pub fn transpose(&self) -> i32 {
        self.transpose
    }

    /// Gets the envelope attack time in seconds.
    pub fn ampeg_attack(&self) -> f32 {
        self.ampeg_attack
    }

    /// Gets the envelope decay time in seconds.
    pub fn ampeg_decay(&self) -> f32 {
        self.ampeg_decay
    }

    /// Gets the envelope sustain level as a percentage.
    pub fn ampeg_sustain(&self) -> f32 {
        self.ampeg_sustain
    }

    /// Gets the envelope release time in seconds.
    pub fn ampeg_release(&self) -> f32 {
        self.ampeg_release
    }

    /// Gets the trigger mode.
    pub fn trigger(&self) -> Trigger {
        self.trigger
    }

    /// Gets the round-robin sequence length.
    pub fn seq_length(&self) -> u32 {
        self.seq_length
    }

    /// Gets this region's 1-based position in the round-robin sequence.
    pub fn seq_position(&self) -> u32 {
        self.seq_position
    }

    /// Gets the key-switch range, if declared.
    pub fn key_switch_range(&self) -> Option<(u8, u8)> {
        match (self.sw_lokey, self.sw_hikey) {
            (Some(lo), Some(hi)) => Some((lo, hi)),
            _ => None,
        }
    }

    /// Gets the key switch selected by default, if declared.
    pub fn sw_last(&self) -> Option<u8> {
        self.sw_last
    }

    /// Gets the choke group id. 0 means unassigned.
    pub fn group(&self) -> i64 {
        self.group
    }

    /// Gets the choke group that silences this region. 0 means unassigned.
    pub fn off_by(&self) -> i64 {
        self.off_by
    }
}

/// Parses an integer opcode value. Unparseable text evaluates as 0, which
/// is then clamped like any other value.
fn parse_int(value: &str) -> i64 {
    value.trim().parse::<i64>().unwrap_or(0)
}

/// Parses a float opcode value. Unparseable text evaluates as 0.
fn parse_float(value: &str) -> f32 {
    value.trim().parse::<f32>().unwrap_or(0.0)
}

/// Clamps an integer to the MIDI data range.
fn clamp_midi(value: i64) -> u8 {
    value.clamp(0, 127) as u8
}
