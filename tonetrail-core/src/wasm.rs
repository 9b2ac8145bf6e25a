//! WASM bindings for tonetrail-core
//!
//! Note helpers plus [`WasmGame`], which runs an [`ActivityMachine`] inside
//! the browser. The machine talks to a recording audio collaborator and an
//! in-memory store; after every call the recorded audio commands and any
//! changed records are handed to JavaScript callbacks.

use crate::activity::{ActivityMachine, Answer, DrawPoint};
use crate::audio::{AudioCall, RecordingAudio};
use crate::config::GameConfig;
use crate::events::GameEvent;
use crate::persistence::{KeyValueStore, MemoryStore, DIFFICULTY_KEY, PROGRESS_KEY};
use crate::types::{ActivityMode, NoteToken, PatternKind};
use js_sys::Function;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use wasm_bindgen::prelude::*;

fn js_error(e: impl Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// A parsed note for JavaScript consumption
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteJS {
    pub name: String,
    pub pitch: String,
    pub octave: u8,
    pub duration: String,
    pub midi: u8,
    pub frequency: f32,
}

impl From<NoteToken> for NoteJS {
    fn from(note: NoteToken) -> Self {
        NoteJS {
            name: note.to_string(),
            pitch: note.pitch().to_string(),
            octave: note.octave(),
            duration: note.duration().suffix().to_string(),
            midi: note.midi_number(),
            frequency: note.frequency(),
        }
    }
}

#[wasm_bindgen]
pub fn parse_note(text: &str) -> Result<JsValue, JsValue> {
    let note: NoteToken = text.parse().map_err(js_error)?;
    serde_wasm_bindgen::to_value(&NoteJS::from(note)).map_err(js_error)
}

/// Canonical spelling of a note, e.g. `"g4:q"` becomes `"G4"`.
#[wasm_bindgen]
pub fn render_note(text: &str) -> Result<String, JsValue> {
    let note: NoteToken = text.parse().map_err(js_error)?;
    Ok(note.to_string())
}

#[wasm_bindgen]
pub fn note_duration_ms(text: &str, quarter_ms: u32) -> Result<u32, JsValue> {
    let note: NoteToken = text.parse().map_err(js_error)?;
    Ok(note.duration_ms(u64::from(quarter_ms)) as u32)
}

/// Audio command passed to the JavaScript audio callback
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum AudioCommandJS {
    Note {
        note: String,
        duration_secs: f32,
        velocity: Option<f32>,
    },
    Sequence {
        notes: Vec<String>,
        tempo_bpm: f32,
        note_duration_secs: f32,
    },
    StopAll,
    Feedback {
        success: bool,
    },
}

impl From<AudioCall> for AudioCommandJS {
    fn from(call: AudioCall) -> Self {
        match call {
            AudioCall::Note {
                note,
                duration_secs,
                velocity,
            } => AudioCommandJS::Note {
                note,
                duration_secs,
                velocity,
            },
            AudioCall::Sequence { notes, options } => AudioCommandJS::Sequence {
                notes,
                tempo_bpm: options.tempo_bpm,
                note_duration_secs: options.note_duration_secs,
            },
            AudioCall::StopAll => AudioCommandJS::StopAll,
            AudioCall::Feedback { success } => AudioCommandJS::Feedback { success },
        }
    }
}

/// Browser-side game. `audio` receives one command object per call;
/// `save` receives `(key, value)` whenever a record changes, with a `null`
/// value for removed records.
#[wasm_bindgen]
pub struct WasmGame {
    machine: ActivityMachine,
    audio: RecordingAudio,
    store: MemoryStore,
    on_audio: Function,
    on_save: Function,
    events: Vec<GameEvent>,
}

#[wasm_bindgen]
impl WasmGame {
    /// `config` is a partial [`GameConfig`] object (or undefined); `stored`
    /// maps storage keys to the strings previously passed to `save`.
    #[wasm_bindgen(constructor)]
    pub fn new(
        config: JsValue,
        stored: JsValue,
        audio: Function,
        save: Function,
    ) -> Result<WasmGame, JsValue> {
        let config: GameConfig = if config.is_undefined() || config.is_null() {
            GameConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(js_error)?
        };
        let stored: HashMap<String, String> = if stored.is_undefined() || stored.is_null() {
            HashMap::new()
        } else {
            serde_wasm_bindgen::from_value(stored).map_err(js_error)?
        };

        let store = stored
            .iter()
            .fold(MemoryStore::new(), |store, (key, value)| store.with_entry(key, value));
        let recorder = RecordingAudio::new();
        let machine =
            ActivityMachine::new(config, Box::new(recorder.clone()), Box::new(store.clone()));

        Ok(WasmGame {
            machine,
            audio: recorder,
            store,
            on_audio: audio,
            on_save: save,
            events: Vec::new(),
        })
    }

    #[wasm_bindgen(js_name = setMode)]
    pub fn set_mode(&mut self, mode: &str) -> Result<(), JsValue> {
        let mode: ActivityMode = mode.parse().map_err(js_error)?;
        self.machine.set_mode(mode);
        self.flush()
    }

    #[wasm_bindgen(js_name = advanceTo)]
    pub fn advance_to(&mut self, now_ms: f64) -> Result<(), JsValue> {
        self.machine.advance_to(now_ms.max(0.0) as u64);
        self.flush()
    }

    #[wasm_bindgen(js_name = nextDeadline)]
    pub fn next_deadline(&mut self) -> Option<f64> {
        self.machine.next_deadline().map(|ms| ms as f64)
    }

    pub fn play(&mut self) -> Result<(), JsValue> {
        let result = self.machine.play();
        self.flush()?;
        result.map_err(js_error)
    }

    /// `answer` is `{ type: "pitch" | "pattern" | "sounds-right", value }`.
    pub fn answer(&mut self, answer: JsValue) -> Result<bool, JsValue> {
        let answer: Answer = serde_wasm_bindgen::from_value(answer).map_err(js_error)?;
        let result = self.machine.answer(answer);
        self.flush()?;
        result.map_err(js_error)
    }

    #[wasm_bindgen(js_name = pressKey)]
    pub fn press_key(&mut self, note: &str) -> Result<(), JsValue> {
        let note: NoteToken = note.parse().map_err(js_error)?;
        let result = self.machine.press_key(note);
        self.flush()?;
        result.map(|_| ()).map_err(js_error)
    }

    /// `points` is an array of `{ x, y }` canvas coordinates.
    #[wasm_bindgen(js_name = submitDrawing)]
    pub fn submit_drawing(&mut self, points: JsValue, height: f32) -> Result<JsValue, JsValue> {
        let points: Vec<DrawPoint> = serde_wasm_bindgen::from_value(points).map_err(js_error)?;
        let result = self.machine.submit_drawing(&points, height);
        self.flush()?;
        let notes: Vec<String> = result
            .map_err(js_error)?
            .iter()
            .map(ToString::to_string)
            .collect();
        serde_wasm_bindgen::to_value(&notes).map_err(js_error)
    }

    #[wasm_bindgen(js_name = startGame)]
    pub fn start_game(&mut self) -> Result<(), JsValue> {
        let result = self.machine.start_game();
        self.flush()?;
        result.map_err(js_error)
    }

    #[wasm_bindgen(js_name = previewPattern)]
    pub fn preview_pattern(&mut self, kind: &str) -> Result<(), JsValue> {
        let kind: PatternKind = kind.parse().map_err(js_error)?;
        let result = self.machine.preview_pattern(kind);
        self.flush()?;
        result.map(|_| ()).map_err(js_error)
    }

    #[wasm_bindgen(js_name = toggleChallenge)]
    pub fn toggle_challenge(&mut self) -> Result<bool, JsValue> {
        let result = self.machine.toggle_challenge();
        self.flush()?;
        result.map_err(js_error)
    }

    #[wasm_bindgen(js_name = newReference)]
    pub fn new_reference(&mut self) -> Result<(), JsValue> {
        let result = self.machine.new_reference();
        self.flush()?;
        result.map_err(js_error)
    }

    pub fn stop(&mut self) -> Result<(), JsValue> {
        self.machine.stop();
        self.flush()
    }

    #[wasm_bindgen(js_name = resetProgress)]
    pub fn reset_progress(&mut self) -> Result<(), JsValue> {
        self.machine.reset_progress();
        self.flush()
    }

    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.machine.snapshot()).map_err(js_error)
    }

    /// Events emitted since the last call, as tagged objects.
    #[wasm_bindgen(js_name = takeEvents)]
    pub fn take_events(&mut self) -> Result<JsValue, JsValue> {
        let events = std::mem::take(&mut self.events);
        serde_wasm_bindgen::to_value(&events).map_err(js_error)
    }
}

impl WasmGame {
    /// Hand recorded audio calls and changed records over to JavaScript.
    fn flush(&mut self) -> Result<(), JsValue> {
        let calls = self.audio.calls();
        self.audio.clear();
        for call in calls {
            let command = serde_wasm_bindgen::to_value(&AudioCommandJS::from(call)).map_err(js_error)?;
            self.on_audio.call1(&JsValue::NULL, &command)?;
        }

        let events = self.machine.take_events();
        let persisted = events.iter().any(|e| {
            matches!(
                e,
                GameEvent::ProgressChanged { .. } | GameEvent::ProgressReset
            )
        });
        self.events.extend(events);

        if persisted {
            for key in [PROGRESS_KEY, DIFFICULTY_KEY] {
                let value = match self.store.load(key) {
                    Some(text) => JsValue::from_str(&text),
                    None => JsValue::NULL,
                };
                self.on_save
                    .call2(&JsValue::NULL, &JsValue::from_str(key), &value)?;
            }
        }
        Ok(())
    }
}
