//! MIDI output collaborator
//!
//! A dedicated thread owns the midir connection and a queue of timed
//! messages; the collaborator only sends it commands. Every note on is
//! queued together with its note off, so stopping a sequence never leaves
//! a note hanging.

use super::{feedback_cue, parse_note};
use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use midir::{MidiOutput, MidiOutputConnection};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tonetrail_core::audio::{AudioCollaborator, AudioError, SequenceOptions, SequenceStop};
use tracing::{debug, info, warn};

const CLIENT_NAME: &str = "Tonetrail";
const DEFAULT_VELOCITY: f32 = 0.8;
/// Longest the thread sleeps with nothing queued
const IDLE_WAIT: Duration = Duration::from_secs(3600);

pub fn note_on(channel: u8, note: u8, velocity: u8) -> [u8; 3] {
    [0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
}

pub fn note_off(channel: u8, note: u8) -> [u8; 3] {
    [0x80 | (channel & 0x0F), note & 0x7F, 0]
}

/// Controller 123: all notes off.
pub fn all_notes_off(channel: u8) -> [u8; 3] {
    [0xB0 | (channel & 0x0F), 123, 0]
}

fn velocity_byte(velocity: f32) -> u8 {
    (velocity.clamp(0.0, 1.0) * 127.0).round() as u8
}

fn is_note_off(message: &[u8; 3]) -> bool {
    message[0] & 0xF0 == 0x80
}

/// A message waiting for its time.
#[derive(Debug, Clone)]
pub struct Timed {
    pub at: Instant,
    pub message: [u8; 3],
    pub stop: Option<SequenceStop>,
}

/// Time-ordered outgoing messages.
#[derive(Debug, Default)]
pub struct MidiQueue {
    pending: Vec<Timed>,
}

impl MidiQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn push(&mut self, timed: Timed) {
        let index = self.pending.partition_point(|t| t.at <= timed.at);
        self.pending.insert(index, timed);
    }

    pub fn next_at(&self) -> Option<Instant> {
        self.pending.first().map(|t| t.at)
    }

    /// Messages due by `now`. Notes of a stopped sequence are dropped,
    /// except their note offs which go out at once.
    pub fn take_due(&mut self, now: Instant) -> Vec<[u8; 3]> {
        let mut out = Vec::new();
        self.pending.retain(|t| {
            let stopped = t.stop.as_ref().is_some_and(SequenceStop::is_stopped);
            if stopped {
                if is_note_off(&t.message) {
                    out.push(t.message);
                }
                false
            } else if t.at <= now {
                out.push(t.message);
                false
            } else {
                true
            }
        });
        out
    }

    /// Drop everything, returning the note offs still owed.
    pub fn silence(&mut self) -> Vec<[u8; 3]> {
        self.pending
            .drain(..)
            .filter(|t| is_note_off(&t.message))
            .map(|t| t.message)
            .collect()
    }
}

enum MidiCommand {
    Schedule(Vec<Timed>),
    Silence,
    Shutdown,
}

/// Owns the connection on the MIDI thread.
struct MidiOutputInternal {
    connection: MidiOutputConnection,
    command_rx: Receiver<MidiCommand>,
    queue: MidiQueue,
    channel: u8,
}

impl MidiOutputInternal {
    fn send(&mut self, message: &[u8; 3]) {
        if let Err(e) = self.connection.send(message) {
            warn!(error = %e, "MIDI send failed");
        }
    }

    fn run(&mut self) {
        loop {
            let wait = self
                .queue
                .next_at()
                .map(|at| at.saturating_duration_since(Instant::now()))
                .unwrap_or(IDLE_WAIT);

            match self.command_rx.recv_timeout(wait) {
                Ok(MidiCommand::Schedule(messages)) => {
                    for timed in messages {
                        self.queue.push(timed);
                    }
                }
                Ok(MidiCommand::Silence) => {
                    for message in self.queue.silence() {
                        self.send(&message);
                    }
                    self.send(&all_notes_off(self.channel));
                }
                Ok(MidiCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }

            for message in self.queue.take_due(Instant::now()) {
                self.send(&message);
            }
        }

        for message in self.queue.silence() {
            self.send(&message);
        }
        for ch in 0..16u8 {
            self.send(&all_notes_off(ch));
        }
    }
}

pub struct MidiAudio {
    command_tx: Sender<MidiCommand>,
    thread: Option<JoinHandle<()>>,
    channel: u8,
    port_name: String,
}

impl MidiAudio {
    /// List available MIDI output ports.
    /// Creating a MIDI client occasionally fails on macOS, so this retries.
    pub fn list_ports() -> Result<Vec<String>> {
        let mut last_err = None;
        for attempt in 0..3 {
            if attempt > 0 {
                thread::sleep(Duration::from_millis(100));
            }
            match MidiOutput::new(CLIENT_NAME) {
                Ok(midi_out) => {
                    return Ok(midi_out
                        .ports()
                        .iter()
                        .filter_map(|p| midi_out.port_name(p).ok())
                        .collect());
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(anyhow!(
            "MIDI initialization failed after 3 attempts: {:?}",
            last_err
        ))
    }

    /// Connect to the first port whose name contains `port`, or the first
    /// port at all. `channel` counts from 1.
    pub fn open(port: Option<&str>, channel: u8) -> Result<Self> {
        if !(1..=16).contains(&channel) {
            return Err(anyhow!("MIDI channel must be 1-16, got {}", channel));
        }
        let channel = channel - 1;

        let wanted = port.map(str::to_string);
        let (command_tx, command_rx) = unbounded();
        let (ready_tx, ready_rx) = bounded(1);
        let thread = thread::Builder::new()
            .name("tonetrail-midi".into())
            .spawn(move || match Self::connect(wanted.as_deref()) {
                Ok((connection, name)) => {
                    let _ = ready_tx.send(Ok(name));
                    let mut internal = MidiOutputInternal {
                        connection,
                        command_rx,
                        queue: MidiQueue::new(),
                        channel,
                    };
                    internal.run();
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                }
            })?;
        let port_name = match ready_rx.recv() {
            Ok(Ok(name)) => name,
            Ok(Err(e)) => return Err(anyhow!(e)),
            Err(_) => return Err(anyhow!("MIDI thread exited during startup")),
        };

        info!(port = %port_name, channel = channel + 1, "MIDI output connected");
        Ok(Self {
            command_tx,
            thread: Some(thread),
            channel,
            port_name,
        })
    }

    fn connect(port: Option<&str>) -> Result<(MidiOutputConnection, String)> {
        let midi_out = MidiOutput::new(CLIENT_NAME)?;
        let ports = midi_out.ports();
        let selected = match port {
            Some(wanted) => ports.iter().find(|p| {
                midi_out
                    .port_name(p)
                    .map(|name| name.contains(wanted))
                    .unwrap_or(false)
            }),
            None => ports.first(),
        }
        .ok_or_else(|| anyhow!("MIDI port '{}' not found", port.unwrap_or("any")))?;

        let name = midi_out.port_name(selected)?;
        let connection = midi_out
            .connect(selected, "tonetrail-out")
            .map_err(|e| anyhow!("Failed to connect to '{}': {}", name, e))?;
        Ok((connection, name))
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn schedule(&self, messages: Vec<Timed>) -> Result<(), AudioError> {
        self.command_tx
            .send(MidiCommand::Schedule(messages))
            .map_err(|_| AudioError::Unavailable("MIDI thread stopped".to_string()))
    }

    /// Note on now plus note off after `secs`.
    fn note_pair(
        &self,
        note: u8,
        start: Instant,
        secs: f32,
        velocity: f32,
        stop: Option<SequenceStop>,
    ) -> [Timed; 2] {
        let end = start + Duration::from_secs_f32(secs.max(0.0));
        [
            Timed {
                at: start,
                message: note_on(self.channel, note, velocity_byte(velocity)),
                stop: stop.clone(),
            },
            Timed {
                at: end,
                message: note_off(self.channel, note),
                stop,
            },
        ]
    }
}

impl AudioCollaborator for MidiAudio {
    fn play_note(
        &mut self,
        note: &str,
        duration_secs: f32,
        velocity: Option<f32>,
    ) -> Result<(), AudioError> {
        let midi = parse_note(note)?.midi_number();
        let messages = self.note_pair(
            midi,
            Instant::now(),
            duration_secs,
            velocity.unwrap_or(DEFAULT_VELOCITY),
            None,
        );
        self.schedule(messages.to_vec())
    }

    fn play_note_sequence(
        &mut self,
        notes: &[String],
        options: SequenceOptions,
    ) -> Result<SequenceStop, AudioError> {
        let numbers = notes
            .iter()
            .map(|n| parse_note(n).map(|t| t.midi_number()))
            .collect::<Result<Vec<_>, _>>()?;
        let stop = SequenceStop::new();
        let start = Instant::now();
        let step = Duration::from_secs_f32(options.step_secs().max(0.0));

        let mut messages = Vec::with_capacity(numbers.len() * 2);
        for (i, note) in numbers.into_iter().enumerate() {
            messages.extend(self.note_pair(
                note,
                start + step * i as u32,
                options.note_duration_secs,
                DEFAULT_VELOCITY,
                Some(stop.clone()),
            ));
        }
        self.schedule(messages)?;
        debug!(notes = notes.len(), "MIDI sequence queued");
        Ok(stop)
    }

    fn stop_all(&mut self) {
        let _ = self.command_tx.send(MidiCommand::Silence);
    }

    fn play_feedback(&mut self, success: bool) {
        let mut start = Instant::now();
        let mut messages = Vec::new();
        for (note, secs) in feedback_cue(success) {
            if let Ok(token) = parse_note(note) {
                messages.extend(self.note_pair(token.midi_number(), start, *secs, 0.6, None));
            }
            start += Duration::from_secs_f32(*secs);
        }
        let _ = self.schedule(messages);
    }
}

impl Drop for MidiAudio {
    fn drop(&mut self) {
        let _ = self.command_tx.send(MidiCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timed(at: Instant, message: [u8; 3], stop: Option<SequenceStop>) -> Timed {
        Timed { at, message, stop }
    }

    #[test]
    fn test_message_bytes() {
        assert_eq!(note_on(0, 60, 100), [0x90, 60, 100]);
        assert_eq!(note_on(17, 200, 200), [0x91, 72, 72]);
        assert_eq!(note_off(9, 69), [0x89, 69, 0]);
        assert_eq!(all_notes_off(15), [0xBF, 123, 0]);
        assert_eq!(velocity_byte(0.8), 102);
        assert_eq!(velocity_byte(3.0), 127);
    }

    #[test]
    fn test_queue_releases_in_time_order() {
        let t0 = Instant::now();
        let mut queue = MidiQueue::new();
        queue.push(timed(t0 + Duration::from_millis(20), note_off(0, 60), None));
        queue.push(timed(t0, note_on(0, 60, 100), None));
        queue.push(timed(t0 + Duration::from_millis(10), note_on(0, 62, 100), None));

        assert_eq!(queue.next_at(), Some(t0));
        assert_eq!(queue.take_due(t0), vec![note_on(0, 60, 100)]);
        assert_eq!(
            queue.take_due(t0 + Duration::from_millis(25)),
            vec![note_on(0, 62, 100), note_off(0, 60)]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_stopped_sequence_keeps_only_note_offs() {
        let t0 = Instant::now();
        let stop = SequenceStop::new();
        let mut queue = MidiQueue::new();
        queue.push(timed(t0 + Duration::from_secs(1), note_off(0, 60), Some(stop.clone())));
        queue.push(timed(t0 + Duration::from_secs(1), note_on(0, 62, 90), Some(stop.clone())));
        queue.push(timed(t0 + Duration::from_secs(1), note_on(0, 64, 90), None));

        stop.stop();
        assert_eq!(queue.take_due(t0), vec![note_off(0, 60)]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_silence_returns_owed_note_offs() {
        let t0 = Instant::now();
        let mut queue = MidiQueue::new();
        queue.push(timed(t0, note_on(0, 60, 90), None));
        queue.push(timed(t0 + Duration::from_secs(1), note_off(0, 60), None));
        assert_eq!(queue.silence(), vec![note_off(0, 60)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_list_ports() {
        // Ports depend on the machine; this only checks nothing panics
        let _ = MidiAudio::list_ports();
    }

    #[test]
    fn test_channel_out_of_range() {
        assert!(MidiAudio::open(None, 0).is_err());
        assert!(MidiAudio::open(None, 17).is_err());
    }
}
