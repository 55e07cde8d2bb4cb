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
use midly::live::LiveEvent;
use midly::MidiMessage;

/// A note or controller event positioned within a render block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// The frame offset of this event within the block.
    pub frame: usize,
    pub kind: EventKind,
}

/// The kinds of events the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    Controller { channel: u8, controller: u8, value: u8 },
}

impl Event {
    /// Creates a note-on event. A velocity of zero is a note-off, per MIDI
    /// convention.
    pub fn note_on(frame: usize, channel: u8, note: u8, velocity: u8) -> Event {
        let kind = if velocity == 0 {
            EventKind::NoteOff { channel, note }
        } else {
            EventKind::NoteOn {
                channel,
                note,
                velocity,
            }
        };
        Event { frame, kind }
    }

    /// Creates a note-off event.
    pub fn note_off(frame: usize, channel: u8, note: u8) -> Event {
        Event {
            frame,
            kind: EventKind::NoteOff { channel, note },
        }
    }

    /// Creates a controller change event.
    pub fn controller(frame: usize, channel: u8, controller: u8, value: u8) -> Event {
        Event {
            frame,
            kind: EventKind::Controller {
                channel,
                controller,
                value,
            },
        }
    }

    /// Parses a raw MIDI message into an engine event at the given frame
    /// offset. Messages the engine does not react to yield None.
    pub fn from_midi(frame: usize, raw: &[u8]) -> Option<Event> {
        let event = LiveEvent::parse(raw).ok()?;
        let LiveEvent::Midi { channel, message } = event else {
            return None;
        };
        let channel = channel.as_int();
        match message {
            MidiMessage::NoteOn { key, vel } => {
                Some(Event::note_on(frame, channel, key.as_int(), vel.as_int()))
            }
            MidiMessage::NoteOff { key, .. } => Some(Event::note_off(frame, channel, key.as_int())),
            MidiMessage::Controller { controller, value } => Some(Event::controller(
                frame,
                channel,
                controller.as_int(),
                value.as_int(),
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Event, EventKind};

    #[test]
    fn test_from_midi_note_on() {
        let event = Event::from_midi(3, &[0x90, 60, 100]).expect("expected an event");
        assert_eq!(3, event.frame);
        assert_eq!(
            EventKind::NoteOn {
                channel: 0,
                note: 60,
                velocity: 100
            },
            event.kind
        );
    }

    #[test]
    fn test_from_midi_note_on_zero_velocity_is_note_off() {
        let event = Event::from_midi(0, &[0x91, 64, 0]).expect("expected an event");
        assert_eq!(
            EventKind::NoteOff {
                channel: 1,
                note: 64
            },
            event.kind
        );
    }

    #[test]
    fn test_from_midi_note_off() {
        let event = Event::from_midi(0, &[0x80, 60, 0]).expect("expected an event");
        assert_eq!(
            EventKind::NoteOff {
                channel: 0,
                note: 60
            },
            event.kind
        );
    }

    #[test]
    fn test_from_midi_sustain_pedal() {
        let event = Event::from_midi(7, &[0xB0, 64, 127]).expect("expected an event");
        assert_eq!(
            EventKind::Controller {
                channel: 0,
                controller: 64,
                value: 127
            },
            event.kind
        );
    }

    #[test]
    fn test_from_midi_ignores_other_messages() {
        // Program change.
        assert_eq!(None, Event::from_midi(0, &[0xC0, 5]));
        // System realtime clock.
        assert_eq!(None, Event::from_midi(0, &[0xF8]));
        // Garbage.
        assert_eq!(None, Event::from_midi(0, &[0x01]));
    }
}
