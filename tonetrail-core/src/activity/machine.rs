//! The activity machine owns every collaborator and drives rounds against
//! virtual time.
//!
//! Nothing here sleeps or spawns. The owner calls [`ActivityMachine::advance_to`]
//! with the current time and the machine runs whatever became due, playback
//! continuations and round timers alike, in deadline order. Operations such
//! as [`ActivityMachine::answer`] act at the last time passed to `advance_to`.

use super::draw_melody::{follows_contour, points_to_notes, sample_points};
use super::high_or_low::ToneRound;
use super::memory::KeyOutcome;
use super::sound_judgment::JudgmentRound;
use super::{
    match_sounds, ActivityContext, ActivityError, ActivityState, Answer, DrawPoint, Pitch,
    RoundPhase, RoundTimer,
};
use crate::audio::{AudioCollaborator, SequenceOptions, SequenceStop};
use crate::config::GameConfig;
use crate::difficulty::{DifficultyController, Progress};
use crate::events::GameEvent;
use crate::generator::PatternGenerator;
use crate::melodies::MelodyCatalog;
use crate::messages::Message;
use crate::persistence::{DifficultyRecord, KeyValueStore, ProgressStore};
use crate::scheduler::{
    evenly_spaced, PlaybackError, PlaybackEvent, PlaybackHandle, PlaybackStep, SequenceScheduler,
    Timeline,
};
use crate::types::note::render_sequence;
use crate::types::{ActivityMode, NoteToken, Palette, Pattern, PatternKind};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Seed used when the configuration does not name one.
pub const DEFAULT_SEED: u64 = 0x746f_6e65_7472_6169;

/// Serializable status view for frontends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ActivitySnapshot {
    pub mode: ActivityMode,
    pub phase: RoundPhase,
    pub feedback: Option<String>,
    pub playing: bool,
    pub game_mode: bool,
    pub challenge: bool,
    /// Name of the melody under judgment
    pub melody: Option<String>,
    pub keys_entered: usize,
    pub progress: Progress,
    pub stage: u8,
    pub unlocked_patterns: Vec<PatternKind>,
    pub memory_length: usize,
    pub now_ms: u64,
}

pub struct ActivityMachine {
    config: GameConfig,
    generator: PatternGenerator<StdRng>,
    difficulty: DifficultyController,
    scheduler: SequenceScheduler,
    timers: Timeline<(RoundTimer, u64)>,
    audio: Box<dyn AudioCollaborator>,
    store: ProgressStore,
    catalog: MelodyCatalog,
    context: ActivityContext,
    preview: Option<SequenceStop>,
    events: Vec<GameEvent>,
    now_ms: u64,
}

impl ActivityMachine {
    /// Build a machine in idle mode, restoring progress from `store`.
    pub fn new(
        config: GameConfig,
        audio: Box<dyn AudioCollaborator>,
        store: Box<dyn KeyValueStore>,
    ) -> Self {
        let store = ProgressStore::new(store);
        let mut progress = store.load_progress();
        let record = store.load_difficulty();
        progress.match_sounds = progress.match_sounds.max(record.correct_answers_count);
        let difficulty = DifficultyController::restore(progress, &record.unlocked_patterns);

        let seed = config.seed.unwrap_or(DEFAULT_SEED);
        debug!(seed, "activity machine created");

        Self {
            config,
            generator: PatternGenerator::new(StdRng::seed_from_u64(seed)),
            difficulty,
            scheduler: SequenceScheduler::new(),
            timers: Timeline::new(),
            audio,
            store,
            catalog: MelodyCatalog::builtin(),
            context: ActivityContext::default(),
            preview: None,
            events: Vec::new(),
            now_ms: 0,
        }
    }

    pub fn with_catalog(mut self, catalog: MelodyCatalog) -> Self {
        self.set_catalog(catalog);
        self
    }

    /// Replace the melody catalog. The current round keeps its melody.
    pub fn set_catalog(&mut self, catalog: MelodyCatalog) {
        info!(melodies = catalog.len(), "melody catalog replaced");
        self.catalog = catalog;
    }

    pub fn mode(&self) -> ActivityMode {
        self.context.mode()
    }

    pub fn phase(&self) -> RoundPhase {
        self.context.phase()
    }

    pub fn state(&self) -> &ActivityState {
        &self.context.state
    }

    pub fn feedback(&self) -> Option<&str> {
        self.context.feedback.as_deref()
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn difficulty(&self) -> &DifficultyController {
        &self.difficulty
    }

    pub fn catalog(&self) -> &MelodyCatalog {
        &self.catalog
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.active_session().is_some()
    }

    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Switch activity. Playback and every pending round timer of the old
    /// activity are cancelled and its transient state is dropped.
    pub fn set_mode(&mut self, mode: ActivityMode) {
        self.silence();
        self.timers.clear();
        self.context = ActivityContext::new(mode);
        info!(%mode, "mode changed");
        self.events.push(GameEvent::ModeChanged { mode });

        if mode == ActivityMode::SoundJudgment {
            if let Err(e) = self.prepare_melody() {
                warn!(error = %e, "no melody prepared");
            }
        }
        self.pump_playback();
    }

    /// Earliest time at which [`advance_to`](Self::advance_to) has work.
    pub fn next_deadline(&mut self) -> Option<u64> {
        match (self.scheduler.next_deadline(), self.timers.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Run everything due at or before `now_ms`. Time never moves backwards.
    pub fn advance_to(&mut self, now_ms: u64) {
        loop {
            let playback = self.scheduler.next_deadline();
            let timer = self.timers.next_deadline();
            let due = match (playback, timer) {
                (Some(a), Some(b)) => a.min(b),
                (Some(a), None) => a,
                (None, Some(b)) => b,
                (None, None) => break,
            };
            if due > now_ms {
                break;
            }
            self.now_ms = self.now_ms.max(due);

            if playback == Some(due) {
                self.scheduler.poll(self.now_ms, self.audio.as_mut());
                self.pump_playback();
            } else if let Some((_, (timer, round))) = self.timers.pop_due(self.now_ms) {
                self.run_timer(timer, round);
                self.pump_playback();
            } else {
                break;
            }
        }
        self.now_ms = self.now_ms.max(now_ms);
    }

    /// The shared play button.
    pub fn play(&mut self) -> Result<(), ActivityError> {
        let mode = self.context.mode();
        if mode == ActivityMode::Idle {
            return Err(ActivityError::WrongMode { action: "play", mode });
        }
        if self.context.phase() == RoundPhase::Feedback {
            return Err(ActivityError::RoundSettling);
        }

        let game_mode = match &self.context.state {
            ActivityState::MatchSounds(state) => state.game_mode,
            ActivityState::MemoryGame(state) => state.game_mode,
            _ => false,
        };
        match mode {
            ActivityMode::HighOrLow => self.play_tones(),
            ActivityMode::MatchSounds if game_mode => self.replay_pattern(),
            ActivityMode::MemoryGame if game_mode => self.replay_memory(),
            ActivityMode::MatchSounds | ActivityMode::MemoryGame => self.start_game(),
            ActivityMode::SoundJudgment => self.play_melody(),
            ActivityMode::DrawMelody => self.play_drawing(),
            ActivityMode::Idle => Err(ActivityError::WrongMode { action: "play", mode }),
        }
    }

    /// Answer the current round. Returns whether the answer was right.
    pub fn answer(&mut self, answer: Answer) -> Result<bool, ActivityError> {
        let mode = self.context.mode();
        match (mode, answer) {
            (ActivityMode::HighOrLow, Answer::Pitch(pitch)) => self.answer_pitch(pitch),
            (ActivityMode::MatchSounds, Answer::Pattern(kind)) => self.answer_pattern(kind),
            (ActivityMode::SoundJudgment, Answer::SoundsRight(claim)) => self.answer_judgment(claim),
            _ => Err(ActivityError::WrongMode {
                action: "this answer",
                mode,
            }),
        }
    }

    /// Switch the matching or memory activity into game mode and play the
    /// first round.
    pub fn start_game(&mut self) -> Result<(), ActivityError> {
        let mode = self.context.mode();
        match &mut self.context.state {
            ActivityState::MatchSounds(state) => state.game_mode = true,
            ActivityState::MemoryGame(state) => state.game_mode = true,
            _ => {
                return Err(ActivityError::WrongMode {
                    action: "a game",
                    mode,
                })
            }
        }
        self.stop_preview();
        self.context.feedback = None;
        self.events.push(GameEvent::GameModeChanged { mode, game: true });
        info!(%mode, "game started");

        if mode == ActivityMode::MatchSounds {
            self.new_pattern_round()
        } else {
            self.new_memory_sequence()?;
            self.replay_memory()
        }
    }

    /// Free-play preview of a contour in the matching activity.
    pub fn preview_pattern(&mut self, kind: PatternKind) -> Result<Pattern, ActivityError> {
        let mode = self.context.mode();
        let free_play = matches!(&self.context.state, ActivityState::MatchSounds(s) if !s.game_mode);
        if !free_play {
            return Err(ActivityError::WrongMode {
                action: "previewing",
                mode,
            });
        }
        if !self.difficulty.is_unlocked(kind) {
            return Err(ActivityError::PatternLocked(kind));
        }

        let pattern = self.generator.generate(kind, &Palette::melody())?;
        self.scheduler.cancel(self.audio.as_mut());
        self.stop_preview();

        let notes: Vec<String> = pattern.notes.iter().map(NoteToken::pitch_name).collect();
        let spacing = self.config.pattern_note_ms.max(1);
        let options = SequenceOptions {
            tempo_bpm: 60_000.0 / spacing as f32,
            ..SequenceOptions::default()
        };
        self.preview = Some(self.audio.play_note_sequence(&notes, options)?);
        debug!(%pattern, "previewing pattern");
        self.events.push(GameEvent::PatternPreviewed { kind });
        self.pump_playback();
        Ok(pattern)
    }

    /// A key on the memory keyboard. In free play it only sounds; in game
    /// mode it is checked against the sequence.
    pub fn press_key(&mut self, key: NoteToken) -> Result<Option<KeyOutcome>, ActivityError> {
        let mode = self.context.mode();
        let game = match &self.context.state {
            ActivityState::MemoryGame(state) => state.game_mode,
            _ => {
                return Err(ActivityError::WrongMode {
                    action: "the keyboard",
                    mode,
                })
            }
        };
        if game {
            self.context.phase().check_answerable(false)?;
        }

        self.play_sound(vec![PlaybackStep::new(key, self.config.memory_note_ms)])?;
        if !game {
            return Ok(None);
        }

        let (outcome, sequence) = match &mut self.context.state {
            ActivityState::MemoryGame(state) => {
                state.phase = RoundPhase::Answering;
                (state.press(key), state.sequence.clone())
            }
            _ => return Ok(None),
        };

        match outcome {
            KeyOutcome::Continue { position } => {
                self.events.push(GameEvent::KeyAccepted { note: key, position });
            }
            KeyOutcome::Complete => {
                self.events.push(GameEvent::KeyAccepted {
                    note: key,
                    position: sequence.len().saturating_sub(1),
                });
                self.conclude(
                    true,
                    render_sequence(&sequence),
                    Message::MemoryCorrect,
                    RoundTimer::MemoryNext,
                );
            }
            KeyOutcome::Mismatch { position } => {
                debug!(position, %key, "memory sequence broken");
                self.conclude(
                    false,
                    render_sequence(&sequence),
                    Message::MemoryWrong,
                    RoundTimer::MemoryRetry,
                );
            }
        }
        Ok(Some(outcome))
    }

    /// Turn a drawn line into notes and play them. In challenge mode the
    /// drawing is also scored against the reference melody.
    pub fn submit_drawing(
        &mut self,
        points: &[DrawPoint],
        height: f32,
    ) -> Result<Vec<NoteToken>, ActivityError> {
        let mode = self.context.mode();
        let ActivityState::DrawMelody(state) = &self.context.state else {
            return Err(ActivityError::WrongMode {
                action: "drawing",
                mode,
            });
        };
        let reference = if state.challenge {
            let reference = state
                .reference
                .clone()
                .ok_or(ActivityError::NoActiveSequence)?;
            state.phase.check_answerable(false)?;
            Some(reference)
        } else {
            None
        };

        let sampled = sample_points(points, self.config.max_drawing_points);
        if sampled.is_empty() {
            return Err(ActivityError::EmptyDrawing);
        }
        let notes = points_to_notes(&sampled, height, &Palette::drawing());
        if let ActivityState::DrawMelody(state) = &mut self.context.state {
            state.last_drawing = notes.clone();
        }
        debug!(notes = %render_sequence(&notes), "drawing converted");

        if let Some(reference) = reference {
            let correct = follows_contour(&notes, &reference.notes);
            let (message, timer) = if correct {
                (Message::DrawingMatched, RoundTimer::NextReference)
            } else {
                (Message::DrawingMissed, RoundTimer::RetryReference)
            };
            self.conclude(correct, render_sequence(&reference.notes), message, timer);
        }

        self.play_sound(evenly_spaced(&notes, self.config.drawing_note_ms))?;
        Ok(notes)
    }

    /// Flip the drawing challenge; turning it on plays a new reference.
    pub fn toggle_challenge(&mut self) -> Result<bool, ActivityError> {
        let mode = self.context.mode();
        let ActivityState::DrawMelody(state) = &mut self.context.state else {
            return Err(ActivityError::WrongMode {
                action: "the challenge",
                mode,
            });
        };
        state.challenge = !state.challenge;
        state.reference = None;
        state.phase = RoundPhase::Empty;
        let enabled = state.challenge;

        self.context.feedback = None;
        self.context.next_round();
        self.events.push(GameEvent::ChallengeToggled { enabled });
        info!(enabled, "drawing challenge toggled");

        if enabled {
            self.new_reference()?;
        } else {
            self.scheduler.cancel(self.audio.as_mut());
            self.pump_playback();
        }
        Ok(enabled)
    }

    /// Generate and play a fresh reference melody for the drawing challenge.
    pub fn new_reference(&mut self) -> Result<(), ActivityError> {
        let mode = self.context.mode();
        if !matches!(&self.context.state, ActivityState::DrawMelody(s) if s.challenge) {
            return Err(ActivityError::WrongMode {
                action: "a reference melody",
                mode,
            });
        }

        let pattern = self
            .generator
            .generate_reference(&Palette::drawing(), self.config.reference_length)?;
        let round = self.context.next_round();
        self.context.feedback = None;
        if let ActivityState::DrawMelody(state) = &mut self.context.state {
            state.reference = Some(pattern.clone());
            state.phase = RoundPhase::Ready;
        }
        debug!(%pattern, "new reference melody");
        self.events.push(GameEvent::RoundStarted { mode, round });
        self.play_round(evenly_spaced(&pattern.notes, self.config.reference_note_ms))
    }

    /// Silence everything without leaving the activity.
    pub fn stop(&mut self) {
        self.silence();
        self.pump_playback();
    }

    /// Forget all progress, in memory and in the store.
    pub fn reset_progress(&mut self) {
        self.difficulty.reset();
        self.store.clear();
        info!("progress reset");
        self.events.push(GameEvent::ProgressReset);
    }

    pub fn snapshot(&self) -> ActivitySnapshot {
        let (game_mode, challenge, melody, keys_entered) = match &self.context.state {
            ActivityState::MatchSounds(s) => (s.game_mode, false, None, 0),
            ActivityState::MemoryGame(s) => (s.game_mode, false, None, s.input.len()),
            ActivityState::DrawMelody(s) => (false, s.challenge, None, 0),
            ActivityState::SoundJudgment(s) => (
                false,
                false,
                s.round.as_ref().map(|r| r.melody_name.clone()),
                0,
            ),
            ActivityState::HighOrLow(_) | ActivityState::Idle => (false, false, None, 0),
        };

        ActivitySnapshot {
            mode: self.context.mode(),
            phase: self.context.phase(),
            feedback: self.context.feedback.clone(),
            playing: self.scheduler.is_active(),
            game_mode,
            challenge,
            melody,
            keys_entered,
            progress: self.difficulty.all_progress().clone(),
            stage: self.difficulty.high_or_low_stage().number(),
            unlocked_patterns: self.difficulty.unlocked_patterns().to_vec(),
            memory_length: self.difficulty.memory_sequence_length(),
            now_ms: self.now_ms,
        }
    }

    fn play_tones(&mut self) -> Result<(), ActivityError> {
        let existing = match &self.context.state {
            ActivityState::HighOrLow(state) => state.round.clone(),
            _ => None,
        };
        let round = match existing {
            Some(round) => round,
            None => self.new_tone_round(),
        };
        self.play_round_exclusive(round.steps(&self.config))
    }

    fn new_tone_round(&mut self) -> ToneRound {
        let stage = self.difficulty.high_or_low_stage();
        let round = ToneRound::generate(&mut self.generator, stage);
        let id = self.context.next_round();
        if let ActivityState::HighOrLow(state) = &mut self.context.state {
            state.round = Some(round.clone());
            state.phase = RoundPhase::Ready;
        }
        debug!(stage = stage.number(), tones = %render_sequence(&round.tones), "new high-or-low round");
        self.events.push(GameEvent::RoundStarted {
            mode: ActivityMode::HighOrLow,
            round: id,
        });
        round
    }

    fn answer_pitch(&mut self, pitch: Pitch) -> Result<bool, ActivityError> {
        self.context.phase().check_answerable(true)?;
        let round = match &self.context.state {
            ActivityState::HighOrLow(state) => state.round.clone(),
            _ => None,
        }
        .ok_or(ActivityError::NoActiveSequence)?;

        let correct = round.judge(pitch);
        let high = round.expected == Pitch::High;
        let comparison = round.is_comparison();
        let message = if correct {
            Message::ToneCorrect { high, comparison }
        } else {
            Message::ToneWrong { high, comparison }
        };
        self.conclude(correct, round.expected.to_string(), message, RoundTimer::NextTone);
        Ok(correct)
    }

    fn replay_pattern(&mut self) -> Result<(), ActivityError> {
        let pattern = match &self.context.state {
            ActivityState::MatchSounds(state) => state.round.clone(),
            _ => None,
        };
        match pattern {
            Some(pattern) => self.play_round(match_sounds::steps(&pattern, &self.config)),
            None => self.new_pattern_round(),
        }
    }

    fn new_pattern_round(&mut self) -> Result<(), ActivityError> {
        let kind = self.generator.choose_kind(self.difficulty.unlocked_patterns())?;
        let pattern = self.generator.generate(kind, &Palette::melody())?;
        let id = self.context.next_round();
        if let ActivityState::MatchSounds(state) = &mut self.context.state {
            state.round = Some(pattern.clone());
            state.phase = RoundPhase::Ready;
        }
        debug!(%pattern, "new matching round");
        self.events.push(GameEvent::RoundStarted {
            mode: ActivityMode::MatchSounds,
            round: id,
        });
        self.play_round(match_sounds::steps(&pattern, &self.config))
    }

    fn answer_pattern(&mut self, kind: PatternKind) -> Result<bool, ActivityError> {
        self.context.phase().check_answerable(false)?;
        let pattern = match &self.context.state {
            ActivityState::MatchSounds(state) if state.game_mode => state.round.clone(),
            _ => None,
        }
        .ok_or(ActivityError::NoActiveSequence)?;

        self.scheduler.cancel(self.audio.as_mut());
        let correct = match_sounds::judge(&pattern, kind);
        let (message, timer) = if correct {
            (Message::PatternCorrect, RoundTimer::NextPattern)
        } else {
            (Message::PatternWrong, RoundTimer::RetryPattern)
        };
        self.conclude(correct, pattern.kind.to_string(), message, timer);
        self.pump_playback();
        Ok(correct)
    }

    fn new_memory_sequence(&mut self) -> Result<(), ActivityError> {
        let length = self.difficulty.memory_sequence_length();
        let sequence = self
            .generator
            .choose_memory_sequence(&Palette::memory(), length)?;
        let id = self.context.next_round();
        debug!(length, "new memory sequence");
        if let ActivityState::MemoryGame(state) = &mut self.context.state {
            state.sequence = sequence;
            state.input.clear();
            state.phase = RoundPhase::Ready;
        }
        self.events.push(GameEvent::RoundStarted {
            mode: ActivityMode::MemoryGame,
            round: id,
        });
        Ok(())
    }

    fn replay_memory(&mut self) -> Result<(), ActivityError> {
        let sequence = match &mut self.context.state {
            ActivityState::MemoryGame(state) => {
                state.input.clear();
                state.sequence.clone()
            }
            _ => Vec::new(),
        };
        if sequence.is_empty() {
            return Err(ActivityError::NoActiveSequence);
        }
        self.play_round(evenly_spaced(&sequence, self.config.memory_note_ms))
    }

    /// Choose the next melody for sound judgment without playing it.
    fn prepare_melody(&mut self) -> Result<JudgmentRound, ActivityError> {
        let previous = match &self.context.state {
            ActivityState::SoundJudgment(state) => state.previous_melody.clone(),
            _ => None,
        };
        let melody = self
            .catalog
            .choose_next(self.generator.rng(), previous.as_deref())
            .cloned()
            .ok_or(ActivityError::NoMelodies)?;

        let name = melody.name(self.config.language).to_string();
        let round = JudgmentRound::prepare(
            &mut self.generator,
            &melody,
            &name,
            self.config.wrong_note_probability,
        );
        let id = self.context.next_round();
        if let ActivityState::SoundJudgment(state) = &mut self.context.state {
            state.round = Some(round.clone());
            state.previous_melody = Some(melody.id.clone());
            state.phase = RoundPhase::Ready;
        }
        debug!(melody = %melody.id, altered = round.has_wrong_note, "melody prepared");
        self.events.push(GameEvent::MelodyChosen {
            id: melody.id,
            name,
        });
        self.events.push(GameEvent::RoundStarted {
            mode: ActivityMode::SoundJudgment,
            round: id,
        });
        Ok(round)
    }

    fn play_melody(&mut self) -> Result<(), ActivityError> {
        let existing = match &self.context.state {
            ActivityState::SoundJudgment(state) => state.round.clone(),
            _ => None,
        };
        let round = match existing {
            Some(round) => round,
            None => self.prepare_melody()?,
        };
        self.play_round(round.steps())
    }

    fn answer_judgment(&mut self, sounds_right: bool) -> Result<bool, ActivityError> {
        self.context.phase().check_answerable(false)?;
        let round = match &self.context.state {
            ActivityState::SoundJudgment(state) => state.round.clone(),
            _ => None,
        }
        .ok_or(ActivityError::NoActiveSequence)?;

        self.scheduler.cancel(self.audio.as_mut());
        let correct = round.judge(sounds_right);
        let message = if correct {
            Message::JudgmentCorrect
        } else if round.has_wrong_note {
            Message::JudgmentMissedWrongNote
        } else {
            Message::JudgmentMelodyWasFine
        };
        let expected = if round.has_wrong_note {
            "wrong note"
        } else {
            "sounds right"
        };
        let timer = if correct {
            RoundTimer::NextMelody
        } else {
            RoundTimer::ReplayMelody
        };
        self.conclude(correct, expected.to_string(), message, timer);
        self.pump_playback();
        Ok(correct)
    }

    fn play_drawing(&mut self) -> Result<(), ActivityError> {
        let (challenge, reference, drawing) = match &self.context.state {
            ActivityState::DrawMelody(state) => (
                state.challenge,
                state.reference.clone(),
                state.last_drawing.clone(),
            ),
            _ => (false, None, Vec::new()),
        };

        if challenge {
            return match reference {
                Some(reference) => {
                    self.play_round(evenly_spaced(&reference.notes, self.config.reference_note_ms))
                }
                None => self.new_reference(),
            };
        }
        if drawing.is_empty() {
            return Err(ActivityError::EmptyDrawing);
        }
        self.play_sound(evenly_spaced(&drawing, self.config.drawing_note_ms))
    }

    /// Judge, count, save and schedule what happens after the feedback.
    fn conclude(&mut self, correct: bool, expected: String, message: Message, timer: RoundTimer) {
        let mode = self.context.mode();
        self.context.set_phase(RoundPhase::Feedback);
        self.audio.play_feedback(correct);
        info!(%mode, correct, %expected, "answer judged");
        self.events.push(GameEvent::AnswerJudged {
            mode,
            correct,
            expected,
        });

        let text = message.text(self.config.language);
        self.context.feedback = Some(text.clone());
        self.events.push(GameEvent::Feedback { text });

        if correct {
            let unlocks = self.difficulty.record_correct(mode);
            self.events.push(GameEvent::ProgressChanged {
                mode,
                count: self.difficulty.progress(mode),
            });
            for unlock in unlocks {
                self.events.push(GameEvent::StageUnlocked {
                    unlock,
                    message: Message::Unlock(unlock).text(self.config.language),
                });
            }
            self.save_progress();
        } else {
            self.difficulty.record_wrong(mode);
        }

        self.schedule(timer, self.config.feedback_delay_ms);
    }

    fn save_progress(&mut self) {
        let progress = self.difficulty.all_progress().clone();
        self.store.save_progress(&progress);
        self.store.save_difficulty(&DifficultyRecord {
            correct_answers_count: progress.match_sounds,
            unlocked_patterns: self.difficulty.unlocked_patterns().to_vec(),
        });
        info!(?progress, "progress saved");
    }

    fn schedule(&mut self, timer: RoundTimer, delay_ms: u64) {
        let due = self.now_ms + delay_ms;
        debug!(?timer, due, "round timer scheduled");
        self.timers.schedule(
            due,
            self.context.round_token(),
            (timer, self.context.round()),
        );
    }

    fn run_timer(&mut self, timer: RoundTimer, round: u64) {
        if round != self.context.round() {
            debug!(?timer, round, "stale round timer dropped");
            return;
        }
        if let Err(e) = self.fire_timer(timer) {
            warn!(?timer, error = %e, "round transition failed");
        }
    }

    fn fire_timer(&mut self, timer: RoundTimer) -> Result<(), ActivityError> {
        self.context.feedback = None;
        match timer {
            RoundTimer::NextTone => {
                self.new_tone_round();
                Ok(())
            }
            RoundTimer::NextPattern => self.new_pattern_round(),
            RoundTimer::RetryPattern | RoundTimer::RetryReference => {
                self.context.set_phase(RoundPhase::Answering);
                Ok(())
            }
            RoundTimer::MemoryRetry | RoundTimer::MemoryPlay => self.replay_memory(),
            RoundTimer::MemoryNext => {
                self.new_memory_sequence()?;
                self.schedule(RoundTimer::MemoryPlay, self.config.feedback_delay_ms);
                Ok(())
            }
            RoundTimer::NextMelody => {
                let round = self.prepare_melody()?;
                self.play_round(round.steps())
            }
            RoundTimer::ReplayMelody => self.play_melody(),
            RoundTimer::NextReference => self.new_reference(),
        }
    }

    /// Play the melody that belongs to the current round.
    fn play_round(&mut self, steps: Vec<PlaybackStep>) -> Result<(), ActivityError> {
        self.stop_preview();
        let handle = self
            .scheduler
            .play(steps, self.audio.as_mut(), self.now_ms, None)?;
        self.start_round_session(handle)
    }

    /// Play the round unless a melody is still sounding.
    fn play_round_exclusive(&mut self, steps: Vec<PlaybackStep>) -> Result<(), ActivityError> {
        let handle = self
            .scheduler
            .try_play(steps, self.audio.as_mut(), self.now_ms, None)
            .map_err(|e| match e {
                PlaybackError::SessionActive => ActivityError::SessionActive,
                other => ActivityError::Playback(other),
            })?;
        self.stop_preview();
        self.start_round_session(handle)
    }

    fn start_round_session(&mut self, handle: PlaybackHandle) -> Result<(), ActivityError> {
        self.context.session = Some(handle.id());
        self.context.set_phase(RoundPhase::Playing);
        self.pump_playback();
        Ok(())
    }

    /// Play something that is not the round itself, such as a key press.
    fn play_sound(&mut self, steps: Vec<PlaybackStep>) -> Result<(), ActivityError> {
        self.stop_preview();
        self.scheduler
            .play(steps, self.audio.as_mut(), self.now_ms, None)?;
        self.pump_playback();
        Ok(())
    }

    fn stop_preview(&mut self) {
        if let Some(preview) = self.preview.take() {
            preview.stop();
        }
    }

    fn silence(&mut self) {
        self.scheduler.cancel(self.audio.as_mut());
        self.stop_preview();
        self.audio.stop_all();
    }

    /// Forward scheduler events and track the round's own session.
    fn pump_playback(&mut self) {
        for event in self.scheduler.take_events() {
            match event {
                PlaybackEvent::NoteStarted {
                    index, note, at_ms, ..
                } => self.events.push(GameEvent::NoteStarted { index, note, at_ms }),
                PlaybackEvent::NoteFailed {
                    index, note, error, ..
                } => self.events.push(GameEvent::NoteFailed { index, note, error }),
                PlaybackEvent::Completed { session, at_ms } => {
                    self.events.push(GameEvent::SequenceCompleted { at_ms });
                    if self.context.session == Some(session) {
                        self.round_playback_ended(true);
                    }
                }
                PlaybackEvent::Cancelled { session } => {
                    self.events.push(GameEvent::PlaybackCancelled);
                    if self.context.session == Some(session) {
                        self.round_playback_ended(false);
                    }
                }
            }
        }
    }

    /// A round counts as heard once its melody ends. Only high-or-low insists
    /// on hearing it to the end; elsewhere an interruption also opens answers.
    fn round_playback_ended(&mut self, completed: bool) {
        self.context.session = None;
        if self.context.phase() != RoundPhase::Playing {
            return;
        }
        let phase = if completed || self.context.mode() != ActivityMode::HighOrLow {
            RoundPhase::Answering
        } else {
            RoundPhase::Ready
        };
        self.context.set_phase(phase);
    }
}
