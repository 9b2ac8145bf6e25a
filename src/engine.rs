//! Real-time driver for the activity machine
//!
//! The machine lives on one engine thread. Requests from the REPL and the
//! machine's own deadlines meet in a single `select!`, so user actions and
//! timer callbacks never run concurrently. Events are forwarded on a
//! channel as soon as they happen.

use anyhow::{anyhow, Result};
use crossbeam_channel::{after, bounded, never, select, unbounded, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tonetrail_core::activity::{DrawPoint, KeyOutcome};
use tonetrail_core::audio::AudioCollaborator;
use tonetrail_core::melodies::MelodyCatalog;
use tonetrail_core::persistence::KeyValueStore;
use tonetrail_core::{
    ActivityError, ActivityMachine, ActivityMode, ActivitySnapshot, Answer, GameConfig, GameEvent,
    NoteToken, Pattern, PatternKind,
};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub enum EngineCommand {
    SetMode(ActivityMode),
    Play,
    Answer(Answer),
    StartGame,
    Preview(PatternKind),
    PressKey(NoteToken),
    Draw { points: Vec<DrawPoint>, height: f32 },
    ToggleChallenge,
    NewReference,
    Stop,
    ResetProgress,
    SetCatalog(MelodyCatalog),
    Snapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Done,
    Judged(bool),
    Key(Option<KeyOutcome>),
    Drawing(Vec<NoteToken>),
    Challenge(bool),
    Previewed(Pattern),
    Snapshot(Box<ActivitySnapshot>),
}

enum Request {
    Run {
        command: EngineCommand,
        reply: Sender<Result<Reply, ActivityError>>,
    },
    Shutdown,
}

struct Engine {
    machine: ActivityMachine,
    started: Instant,
    requests: Receiver<Request>,
    events: Sender<GameEvent>,
}

impl Engine {
    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn advance(&mut self) {
        let now = self.elapsed_ms();
        self.machine.advance_to(now);
        self.forward_events();
    }

    fn forward_events(&mut self) {
        for event in self.machine.take_events() {
            let _ = self.events.send(event);
        }
    }

    fn run(mut self) {
        loop {
            self.advance();
            let timer = match self.machine.next_deadline() {
                Some(due) => after(Duration::from_millis(due.saturating_sub(self.elapsed_ms()))),
                None => never(),
            };

            select! {
                recv(self.requests) -> msg => match msg {
                    Ok(Request::Run { command, reply }) => {
                        self.advance();
                        let result = self.execute(command);
                        self.forward_events();
                        let _ = reply.send(result);
                    }
                    Ok(Request::Shutdown) | Err(_) => break,
                },
                recv(timer) -> _ => {}
            }
        }
        self.machine.stop();
        debug!("engine stopped");
    }

    fn execute(&mut self, command: EngineCommand) -> Result<Reply, ActivityError> {
        let machine = &mut self.machine;
        match command {
            EngineCommand::SetMode(mode) => {
                machine.set_mode(mode);
                Ok(Reply::Done)
            }
            EngineCommand::Play => machine.play().map(|_| Reply::Done),
            EngineCommand::Answer(answer) => machine.answer(answer).map(Reply::Judged),
            EngineCommand::StartGame => machine.start_game().map(|_| Reply::Done),
            EngineCommand::Preview(kind) => machine.preview_pattern(kind).map(Reply::Previewed),
            EngineCommand::PressKey(note) => machine.press_key(note).map(Reply::Key),
            EngineCommand::Draw { points, height } => {
                machine.submit_drawing(&points, height).map(Reply::Drawing)
            }
            EngineCommand::ToggleChallenge => machine.toggle_challenge().map(Reply::Challenge),
            EngineCommand::NewReference => machine.new_reference().map(|_| Reply::Done),
            EngineCommand::Stop => {
                machine.stop();
                Ok(Reply::Done)
            }
            EngineCommand::ResetProgress => {
                machine.reset_progress();
                Ok(Reply::Done)
            }
            EngineCommand::SetCatalog(catalog) => {
                machine.set_catalog(catalog);
                Ok(Reply::Done)
            }
            EngineCommand::Snapshot => Ok(Reply::Snapshot(Box::new(machine.snapshot()))),
        }
    }
}

/// The REPL's side of the engine thread.
pub struct EngineHandle {
    requests: Sender<Request>,
    events: Receiver<GameEvent>,
    thread: Option<JoinHandle<()>>,
}

impl EngineHandle {
    pub fn spawn(
        config: GameConfig,
        audio: Box<dyn AudioCollaborator>,
        store: Box<dyn KeyValueStore>,
        catalog: MelodyCatalog,
    ) -> Result<Self> {
        let (request_tx, request_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();

        let thread = thread::Builder::new()
            .name("tonetrail-engine".into())
            .spawn(move || {
                let machine = ActivityMachine::new(config, audio, store).with_catalog(catalog);
                let engine = Engine {
                    machine,
                    started: Instant::now(),
                    requests: request_rx,
                    events: event_tx,
                };
                engine.run();
            })?;
        info!("engine started");

        Ok(Self {
            requests: request_tx,
            events: event_rx,
            thread: Some(thread),
        })
    }

    /// Run one command on the engine thread and wait for its result.
    pub fn request(&self, command: EngineCommand) -> Result<Reply> {
        let (reply_tx, reply_rx) = bounded(1);
        self.requests
            .send(Request::Run {
                command,
                reply: reply_tx,
            })
            .map_err(|_| anyhow!("Engine is not running"))?;
        let result = reply_rx
            .recv()
            .map_err(|_| anyhow!("Engine stopped before replying"))?;
        Ok(result?)
    }

    pub fn snapshot(&self) -> Result<ActivitySnapshot> {
        match self.request(EngineCommand::Snapshot)? {
            Reply::Snapshot(snapshot) => Ok(*snapshot),
            other => Err(anyhow!("Unexpected engine reply: {:?}", other)),
        }
    }

    /// Events in the order the machine emitted them.
    pub fn events(&self) -> &Receiver<GameEvent> {
        &self.events
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        let _ = self.requests.send(Request::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
