//! Single-session melody playback.
//!
//! At most one session is alive per scheduler. Starting another cancels the
//! current one first and silences the collaborator.

use super::{CancelToken, PlaybackError, PlaybackStep};
use crate::audio::AudioCollaborator;
use crate::types::NoteToken;
use tracing::{debug, warn};

/// Callback run once when a session plays to the end.
pub type Completion = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    NoteStarted {
        session: u64,
        index: usize,
        note: NoteToken,
        at_ms: u64,
    },
    NoteFailed {
        session: u64,
        index: usize,
        note: NoteToken,
        error: String,
    },
    Completed {
        session: u64,
        at_ms: u64,
    },
    Cancelled {
        session: u64,
    },
}

/// Handle to a running session. Cancelling only flips the token; the
/// scheduler notices on its next poll and silences the collaborator.
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    id: u64,
    token: CancelToken,
}

impl PlaybackHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

struct Session {
    id: u64,
    steps: Vec<PlaybackStep>,
    cursor: usize,
    next_due_ms: u64,
    token: CancelToken,
    on_complete: Option<Completion>,
}

#[derive(Default)]
pub struct SequenceScheduler {
    session: Option<Session>,
    next_id: u64,
    events: Vec<PlaybackEvent>,
}

impl SequenceScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session, preempting any session already running.
    ///
    /// The first note sounds immediately; each following note is due once
    /// the previous note's duration has elapsed.
    pub fn play(
        &mut self,
        steps: Vec<PlaybackStep>,
        audio: &mut dyn AudioCollaborator,
        now_ms: u64,
        on_complete: Option<Completion>,
    ) -> Result<PlaybackHandle, PlaybackError> {
        if steps.is_empty() {
            debug!("ignoring request to play an empty sequence");
            return Err(PlaybackError::EmptySequence);
        }

        self.cancel(audio);

        self.next_id += 1;
        let token = CancelToken::new();
        let mut session = Session {
            id: self.next_id,
            steps,
            cursor: 0,
            next_due_ms: now_ms,
            token: token.clone(),
            on_complete,
        };
        debug!(session = session.id, notes = session.steps.len(), "starting playback");

        Self::fire_next(&mut session, audio, &mut self.events);
        let handle = PlaybackHandle {
            id: session.id,
            token,
        };
        self.session = Some(session);
        Ok(handle)
    }

    /// Like [`play`](Self::play), but refuses while a session is running.
    pub fn try_play(
        &mut self,
        steps: Vec<PlaybackStep>,
        audio: &mut dyn AudioCollaborator,
        now_ms: u64,
        on_complete: Option<Completion>,
    ) -> Result<PlaybackHandle, PlaybackError> {
        if self.is_active() {
            return Err(PlaybackError::SessionActive);
        }
        self.play(steps, audio, now_ms, on_complete)
    }

    /// Run every continuation due at or before `now_ms`, in order.
    pub fn poll(&mut self, now_ms: u64, audio: &mut dyn AudioCollaborator) {
        while let Some(session) = self.session.as_mut() {
            if session.token.is_cancelled() {
                let id = session.id;
                self.session = None;
                audio.stop_all();
                self.events.push(PlaybackEvent::Cancelled { session: id });
                debug!(session = id, "playback cancelled");
                break;
            }

            if session.next_due_ms > now_ms {
                break;
            }

            if session.cursor < session.steps.len() {
                Self::fire_next(session, audio, &mut self.events);
                continue;
            }

            let at_ms = session.next_due_ms;
            if let Some(finished) = self.session.take() {
                debug!(session = finished.id, at_ms, "playback complete");
                if let Some(callback) = finished.on_complete {
                    callback();
                }
                self.events.push(PlaybackEvent::Completed {
                    session: finished.id,
                    at_ms,
                });
            }
        }
    }

    fn fire_next(
        session: &mut Session,
        audio: &mut dyn AudioCollaborator,
        events: &mut Vec<PlaybackEvent>,
    ) {
        let index = session.cursor;
        let step = session.steps[index];
        let at_ms = session.next_due_ms;

        match audio.play_note(&step.note.pitch_name(), step.sound_secs(), None) {
            Ok(()) => events.push(PlaybackEvent::NoteStarted {
                session: session.id,
                index,
                note: step.note,
                at_ms,
            }),
            Err(e) => {
                warn!(note = %step.note, error = %e, "note failed to play, continuing");
                events.push(PlaybackEvent::NoteFailed {
                    session: session.id,
                    index,
                    note: step.note,
                    error: e.to_string(),
                });
            }
        }

        session.cursor += 1;
        session.next_due_ms = at_ms + step.duration_ms;
    }

    /// Cancel the running session, if any, and silence the collaborator.
    /// Safe to call repeatedly.
    pub fn cancel(&mut self, audio: &mut dyn AudioCollaborator) {
        if let Some(session) = self.session.take() {
            session.token.cancel();
            audio.stop_all();
            self.events.push(PlaybackEvent::Cancelled {
                session: session.id,
            });
            debug!(session = session.id, "playback cancelled");
        }
    }

    pub fn is_active(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| !s.token.is_cancelled())
    }

    /// Id of the running session.
    pub fn active_session(&self) -> Option<u64> {
        self.session
            .as_ref()
            .filter(|s| !s.token.is_cancelled())
            .map(|s| s.id)
    }

    /// When `poll` next has work to do. A cancelled session is due at once
    /// so its cleanup runs promptly.
    pub fn next_deadline(&self) -> Option<u64> {
        self.session.as_ref().map(|s| {
            if s.token.is_cancelled() {
                0
            } else {
                s.next_due_ms
            }
        })
    }

    pub fn take_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.events)
    }
}
