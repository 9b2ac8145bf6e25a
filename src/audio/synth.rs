//! Minimal cpal synthesizer
//!
//! The output stream lives on its own thread (cpal streams are not `Send`);
//! the collaborator only pushes voices into the shared [`SynthState`] which
//! the stream callback mixes.

use super::{feedback_cue, parse_note};
use crate::config::Waveform;
use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat, SizedSample, StreamConfig};
use crossbeam_channel::{bounded, Sender};
use std::f32::consts::PI;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tonetrail_core::audio::{AudioCollaborator, AudioError, SequenceOptions, SequenceStop};
use tracing::{debug, error, info};

/// Fade in and out, in seconds, so voices never click.
const FADE_SECS: f32 = 0.005;
const DEFAULT_VELOCITY: f32 = 0.8;

struct Voice {
    frequency: f32,
    phase: f32,
    /// Samples left before the voice starts
    delay: u64,
    elapsed: u64,
    length: u64,
    gain: f32,
    stop: Option<SequenceStop>,
}

impl Voice {
    fn is_finished(&self) -> bool {
        self.elapsed >= self.length || self.stop.as_ref().is_some_and(SequenceStop::is_stopped)
    }

    fn next_value(&mut self, sample_rate: f32, waveform: Waveform) -> f32 {
        if self.delay > 0 {
            self.delay -= 1;
            return 0.0;
        }
        let raw = match waveform {
            Waveform::Sine => (2.0 * PI * self.phase).sin(),
            Waveform::Triangle => 4.0 * (self.phase - 0.5).abs() - 1.0,
        };
        self.phase = (self.phase + self.frequency / sample_rate) % 1.0;

        let fade = (FADE_SECS * sample_rate).max(1.0);
        let remaining = self.length.saturating_sub(self.elapsed) as f32;
        let envelope = (self.elapsed as f32 / fade).min(remaining / fade).min(1.0);
        self.elapsed += 1;
        raw * envelope * self.gain
    }
}

/// Voices currently sounding or waiting to sound.
pub struct SynthState {
    voices: Vec<Voice>,
    sample_rate: f32,
    volume: f32,
    waveform: Waveform,
}

impl SynthState {
    pub fn new(sample_rate: f32, volume: f32, waveform: Waveform) -> Self {
        Self {
            voices: Vec::new(),
            sample_rate,
            volume: volume.clamp(0.0, 1.0),
            waveform,
        }
    }

    pub fn add_voice(
        &mut self,
        frequency: f32,
        duration_secs: f32,
        delay_secs: f32,
        velocity: f32,
        stop: Option<SequenceStop>,
    ) {
        self.voices.push(Voice {
            frequency,
            phase: 0.0,
            delay: (delay_secs.max(0.0) * self.sample_rate) as u64,
            elapsed: 0,
            length: (duration_secs.max(0.0) * self.sample_rate) as u64,
            gain: velocity.clamp(0.0, 1.0),
            stop,
        });
    }

    pub fn clear(&mut self) {
        self.voices.clear();
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Mix one mono sample and retire finished voices.
    pub fn next_frame(&mut self) -> f32 {
        let (rate, waveform) = (self.sample_rate, self.waveform);
        let mut mixed = 0.0;
        for voice in &mut self.voices {
            mixed += voice.next_value(rate, waveform);
        }
        self.voices.retain(|v| !v.is_finished());
        (mixed * self.volume * 0.3).clamp(-1.0, 1.0)
    }
}

pub struct SynthAudio {
    state: Arc<Mutex<SynthState>>,
    shutdown: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl SynthAudio {
    /// Open the default output device.
    pub fn open(volume: f32, waveform: Waveform) -> Result<Self> {
        let state = Arc::new(Mutex::new(SynthState::new(44_100.0, volume, waveform)));
        let (ready_tx, ready_rx) = bounded::<Result<(), String>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

        let stream_state = state.clone();
        let thread = thread::Builder::new()
            .name("tonetrail-synth".into())
            .spawn(move || match Self::start_stream(stream_state) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    let _ = shutdown_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                }
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("synthesizer ready");
                Ok(Self {
                    state,
                    shutdown: shutdown_tx,
                    thread: Some(thread),
                })
            }
            Ok(Err(e)) => Err(anyhow!(e)),
            Err(_) => Err(anyhow!("Synthesizer thread exited during startup")),
        }
    }

    fn start_stream(state: Arc<Mutex<SynthState>>) -> Result<cpal::Stream> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("No output device available"))?;
        let config = device.default_output_config()?;

        let sample_format = config.sample_format();
        let config: StreamConfig = config.into();
        if let Ok(mut s) = state.lock() {
            s.sample_rate = config.sample_rate.0 as f32;
        }

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, state)?,
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, state)?,
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, state)?,
            _ => return Err(anyhow!("Unsupported sample format: {:?}", sample_format)),
        };
        stream
            .play()
            .map_err(|e| anyhow!("Failed to play stream: {}", e))?;
        Ok(stream)
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &StreamConfig,
        state: Arc<Mutex<SynthState>>,
    ) -> Result<cpal::Stream>
    where
        T: Sample + SizedSample + Send + 'static + cpal::FromSample<f32>,
    {
        let channels = config.channels as usize;
        let err_fn = |err| error!(error = %err, "output stream error");

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let mut state = state.lock().ok();
                    for frame in data.chunks_mut(channels) {
                        let value = state.as_mut().map_or(0.0, |s| s.next_frame());
                        let value: T = T::from_sample(value);
                        for sample in frame.iter_mut() {
                            *sample = value;
                        }
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| anyhow!("Failed to build output stream: {}", e))
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SynthState) -> R) -> Result<R, AudioError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| AudioError::Unavailable("synthesizer state poisoned".to_string()))?;
        Ok(f(&mut state))
    }
}

impl AudioCollaborator for SynthAudio {
    fn play_note(
        &mut self,
        note: &str,
        duration_secs: f32,
        velocity: Option<f32>,
    ) -> Result<(), AudioError> {
        let frequency = parse_note(note)?.frequency();
        self.with_state(|s| {
            s.add_voice(
                frequency,
                duration_secs,
                0.0,
                velocity.unwrap_or(DEFAULT_VELOCITY),
                None,
            )
        })
    }

    fn play_note_sequence(
        &mut self,
        notes: &[String],
        options: SequenceOptions,
    ) -> Result<SequenceStop, AudioError> {
        let frequencies = notes
            .iter()
            .map(|n| parse_note(n).map(|t| t.frequency()))
            .collect::<Result<Vec<_>, _>>()?;
        let stop = SequenceStop::new();
        let step = options.step_secs();
        self.with_state(|s| {
            for (i, frequency) in frequencies.iter().enumerate() {
                s.add_voice(
                    *frequency,
                    options.note_duration_secs,
                    i as f32 * step,
                    DEFAULT_VELOCITY,
                    Some(stop.clone()),
                );
            }
        })?;
        debug!(notes = notes.len(), step, "sequence queued");
        Ok(stop)
    }

    fn stop_all(&mut self) {
        let _ = self.with_state(SynthState::clear);
    }

    fn play_feedback(&mut self, success: bool) {
        let mut offset = 0.0;
        let cue: Vec<(f32, f32, f32)> = feedback_cue(success)
            .iter()
            .filter_map(|(note, secs)| {
                let start = offset;
                offset += secs;
                parse_note(note).ok().map(|t| (t.frequency(), *secs, start))
            })
            .collect();
        let _ = self.with_state(|s| {
            for (frequency, secs, start) in cue {
                s.add_voice(frequency, secs, start, 0.6, None);
            }
        });
    }
}

impl Drop for SynthAudio {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: f32 = 1_000.0;

    fn run(state: &mut SynthState, samples: usize) -> Vec<f32> {
        (0..samples).map(|_| state.next_frame()).collect()
    }

    #[test]
    fn test_voice_retires_after_its_length() {
        let mut state = SynthState::new(RATE, 1.0, Waveform::Sine);
        state.add_voice(100.0, 0.1, 0.0, 1.0, None);
        run(&mut state, 99);
        assert_eq!(state.active_voices(), 1);
        run(&mut state, 1);
        assert_eq!(state.active_voices(), 0);
    }

    #[test]
    fn test_delayed_voice_is_silent_first() {
        let mut state = SynthState::new(RATE, 1.0, Waveform::Sine);
        state.add_voice(100.0, 0.1, 0.05, 1.0, None);
        assert!(run(&mut state, 50).iter().all(|v| *v == 0.0));
        assert!(run(&mut state, 50).iter().any(|v| *v != 0.0));
    }

    #[test]
    fn test_stop_handle_drops_sequence_voices() {
        let mut state = SynthState::new(RATE, 1.0, Waveform::Triangle);
        let stop = SequenceStop::new();
        state.add_voice(100.0, 1.0, 0.0, 1.0, Some(stop.clone()));
        state.add_voice(100.0, 1.0, 0.5, 1.0, Some(stop.clone()));
        state.add_voice(200.0, 1.0, 0.0, 1.0, None);
        run(&mut state, 10);
        assert_eq!(state.active_voices(), 3);

        stop.stop();
        run(&mut state, 1);
        assert_eq!(state.active_voices(), 1);
    }

    #[test]
    fn test_output_stays_in_range() {
        for waveform in [Waveform::Sine, Waveform::Triangle] {
            let mut state = SynthState::new(RATE, 1.0, waveform);
            for i in 0..12 {
                state.add_voice(50.0 + i as f32 * 30.0, 1.0, 0.0, 1.0, None);
            }
            assert!(run(&mut state, 1_000).iter().all(|v| (-1.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_clear_silences_everything() {
        let mut state = SynthState::new(RATE, 1.0, Waveform::Sine);
        state.add_voice(100.0, 1.0, 0.0, 1.0, None);
        state.clear();
        assert_eq!(state.next_frame(), 0.0);
    }

    #[test]
    fn test_synth_creation() {
        // May fail on machines without an audio device
        match SynthAudio::open(0.5, Waveform::Sine) {
            Ok(mut synth) => {
                assert!(synth.play_note("A4", 0.05, None).is_ok());
                assert!(synth.play_note("Q4", 0.05, None).is_err());
                synth.stop_all();
            }
            Err(e) => println!("SynthAudio unavailable: {}", e),
        }
    }
}
