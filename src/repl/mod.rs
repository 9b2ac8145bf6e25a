//! REPL (Read-Eval-Print Loop) for Tonetrail

use crate::audio;
use crate::commands::{create_registry, CommandContext, CommandResult};
use crate::config::AppConfig;
use crate::engine::{EngineCommand, EngineHandle};
use crate::melodies::load_catalog;
use crate::repl::watcher::FileWatcher;
use crate::store::FileStore;
use anyhow::{anyhow, Result};
use colored::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use notify::Event;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::Path;
use std::thread;
use tonetrail_core::melodies::MelodyCatalog;
use tonetrail_core::{GameEvent, Language};
use tracing::{info, warn};

pub mod watcher;

/// Types of events the REPL loop handles
enum ReplEvent {
    Input(Result<String, ReadlineError>),
}

/// How a game event shows up at the prompt, if at all.
pub fn render_event(event: &GameEvent) -> Option<String> {
    match event {
        GameEvent::NoteStarted { note, .. } => Some(format!("  ♪ {}", note).dimmed().to_string()),
        GameEvent::NoteFailed { note, error, .. } => Some(format!(
            "{} could not play {}: {}",
            "Audio:".yellow(),
            note,
            error
        )),
        GameEvent::PlaybackCancelled => Some("  ⏹".dimmed().to_string()),
        GameEvent::MelodyChosen { name, .. } => Some(format!("🎼 {}", name.bright_cyan())),
        GameEvent::KeyAccepted { note, position } => {
            Some(format!("  {} {} ({})", "✓".green(), note, position + 1))
        }
        GameEvent::AnswerJudged {
            correct: false,
            expected,
            ..
        } => Some(format!("  {} {}", "answer:".dimmed(), expected)),
        GameEvent::Feedback { text } => Some(text.bright_yellow().bold().to_string()),
        GameEvent::StageUnlocked { message, .. } => {
            Some(format!("🔓 {}", message.bright_magenta().bold()))
        }
        GameEvent::ProgressChanged { mode, count } => {
            Some(format!("  {} {}: {}", "★".yellow(), mode, count).dimmed().to_string())
        }
        GameEvent::ProgressReset => Some("Progress reset".bright_red().to_string()),
        GameEvent::ModeChanged { .. }
        | GameEvent::RoundStarted { .. }
        | GameEvent::SequenceCompleted { .. }
        | GameEvent::PatternPreviewed { .. }
        | GameEvent::AnswerJudged { .. }
        | GameEvent::ChallengeToggled { .. }
        | GameEvent::GameModeChanged { .. } => None,
    }
}

/// Interactive REPL for Tonetrail
pub struct Repl {
    editor: Option<DefaultEditor>,
    ctx: CommandContext,

    // Event channels
    tx_input: Sender<ReplEvent>,
    rx_input: Receiver<ReplEvent>,
    tx_watcher: Sender<notify::Result<Event>>,
    rx_watcher: Receiver<notify::Result<Event>>,

    // File watcher
    watcher: Option<FileWatcher>,
}

impl Repl {
    /// Open the store, audio output and melodies named by `settings` and
    /// start the engine.
    pub fn new(settings: AppConfig) -> Result<Self> {
        let editor = DefaultEditor::new()?;
        let store = FileStore::open(settings.data_dir())?;
        info!(dir = %store.dir().display(), "progress store opened");
        let audio = audio::open(&settings.audio);

        let catalog = match &settings.melodies {
            Some(path) => load_catalog(path, settings.game.default_quarter_ms)
                .unwrap_or_else(|e| {
                    warn!(error = %format!("{:#}", e), "using the built-in melodies");
                    MelodyCatalog::builtin()
                }),
            None => MelodyCatalog::builtin(),
        };

        let engine = EngineHandle::spawn(settings.game.clone(), audio, Box::new(store), catalog)?;
        let (tx_input, rx_input) = unbounded();
        let (tx_watcher, rx_watcher) = unbounded();

        Ok(Repl {
            editor: Some(editor),
            ctx: CommandContext::new(engine, settings),
            tx_input,
            rx_input,
            tx_watcher,
            rx_watcher,
            watcher: None,
        })
    }

    fn watch(&mut self, path: &Path) {
        if self.watcher.is_none() {
            match FileWatcher::new(self.tx_watcher.clone()) {
                Ok(w) => self.watcher = Some(w),
                Err(e) => {
                    println!("{} Failed to create watcher: {}", "Error:".red(), e);
                    return;
                }
            }
        }

        if let Some(w) = &mut self.watcher {
            match w.watch(path) {
                Ok(()) => {
                    self.ctx.settings.melodies = Some(path.to_path_buf());
                    println!(
                        "{} Watching {} for changes...",
                        "👀".bright_cyan(),
                        path.display().to_string().bright_green()
                    );
                }
                Err(e) => println!("{} Failed to watch {}: {}", "Error:".red(), path.display(), e),
            }
        }
    }

    fn reload(&mut self, path: &Path) {
        println!("{} File changed: {}", "⚡".bright_yellow(), path.display());
        let catalog = match load_catalog(path, self.ctx.settings.game.default_quarter_ms) {
            Ok(catalog) => catalog,
            Err(e) => {
                println!("{} {:#}", "Error:".red(), e);
                return;
            }
        };
        let count = catalog.len();
        match self.ctx.engine.request(EngineCommand::SetCatalog(catalog)) {
            Ok(_) => println!("{} Reloaded {} melodies", "✓".bright_green(), count),
            Err(e) => println!("{} {}", "Error:".red(), e),
        }
    }

    fn greeting(&self) {
        let english = self.ctx.settings.game.language == Language::English;
        println!(
            "{} {}",
            "🎵".bright_yellow(),
            if english {
                "Tonetrail, a pitch-training game"
            } else {
                "Tonetrail, ein Spiel für das Gehör"
            }
            .bright_cyan()
            .bold()
        );
        println!(
            "Try {}, {} and {}.",
            "mode high-or-low".cyan(),
            "play".cyan(),
            "high".cyan()
        );
        println!(
            "Type '{}' for more information, '{}' or {} to exit.\n",
            "help".bright_green(),
            "quit".bright_red(),
            "Ctrl+C".bright_red()
        );
    }

    /// Start the REPL loop
    pub fn run(&mut self) -> Result<()> {
        self.greeting();
        if let Some(path) = self.ctx.settings.melodies.clone() {
            self.watch(&path);
        }

        let mut editor = self
            .editor
            .take()
            .ok_or_else(|| anyhow!("REPL is already running"))?;
        let tx_input = self.tx_input.clone();

        thread::spawn(move || loop {
            let prompt = format!("{} ", "tonetrail>".bright_magenta().bold());
            match editor.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if !line.is_empty() {
                        let _ = editor.add_history_entry(&line);
                    }
                    if tx_input.send(ReplEvent::Input(Ok(line))).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    let _ = tx_input.send(ReplEvent::Input(Err(err)));
                    break;
                }
            }
        });

        let registry = create_registry();
        let rx_events = self.ctx.engine.events().clone();
        let rx_input = self.rx_input.clone();
        let rx_watcher = self.rx_watcher.clone();

        loop {
            crossbeam_channel::select! {
                recv(rx_input) -> msg => match msg {
                    Ok(ReplEvent::Input(Ok(line))) => {
                        if line.is_empty() {
                            continue;
                        }
                        match registry.execute(&line, &mut self.ctx) {
                            CommandResult::Success => {}
                            CommandResult::Message(msg) => println!("{}", msg),
                            CommandResult::Exit => {
                                println!("{} 🎵", "Goodbye!".bright_cyan());
                                break;
                            }
                            CommandResult::Error(e) => {
                                println!("{} {}", "Error:".bright_red().bold(), e.red());
                            }
                            CommandResult::Watch(path) => self.watch(Path::new(&path)),
                            CommandResult::NotACommand => println!(
                                "{} Unknown command '{}'. Type {} for a list.",
                                "Error:".bright_red().bold(),
                                line,
                                "help".bright_green()
                            ),
                        }
                    }
                    Ok(ReplEvent::Input(Err(ReadlineError::Interrupted | ReadlineError::Eof))) => {
                        println!("{} 🎵", "Goodbye!".bright_cyan());
                        break;
                    }
                    Ok(ReplEvent::Input(Err(err))) => {
                        println!(
                            "{} {}",
                            "Error reading input:".bright_red().bold(),
                            err.to_string().red()
                        );
                        break;
                    }
                    Err(_) => break, // Channel closed
                },

                recv(rx_events) -> msg => match msg {
                    Ok(event) => {
                        if let Some(text) = render_event(&event) {
                            println!("{}", text);
                        }
                    }
                    Err(_) => break, // Engine gone
                },

                recv(rx_watcher) -> msg => match msg {
                    Ok(Ok(event)) => {
                        let changed = self
                            .watcher
                            .as_ref()
                            .map(|w| w.changed_files(&event))
                            .unwrap_or_default();
                        for path in changed {
                            self.reload(&path);
                        }
                    }
                    Ok(Err(e)) => println!("{} Watch error: {}", "Error:".red(), e),
                    Err(_) => break, // Channel closed
                }
            }
        }

        Ok(())
    }
}

/// Convenience function to start the REPL
pub fn start(settings: AppConfig) -> Result<()> {
    let mut repl = Repl::new(settings)?;
    repl.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonetrail_core::difficulty::UnlockEvent;
    use tonetrail_core::{ActivityMode, NoteToken, PatternKind};

    #[test]
    fn test_feedback_and_unlocks_are_shown() {
        let feedback = render_event(&GameEvent::Feedback {
            text: "Great job!".to_string(),
        })
        .unwrap();
        assert!(feedback.contains("Great job!"));

        let unlock = render_event(&GameEvent::StageUnlocked {
            unlock: UnlockEvent::PatternUnlocked {
                kind: PatternKind::Jump,
            },
            message: "Jumpy melodies unlocked!".to_string(),
        })
        .unwrap();
        assert!(unlock.contains("Jumpy melodies unlocked!"));
    }

    #[test]
    fn test_only_wrong_answers_reveal_the_answer() {
        let judged = |correct| GameEvent::AnswerJudged {
            mode: ActivityMode::HighOrLow,
            correct,
            expected: "high".to_string(),
        };
        assert!(render_event(&judged(true)).is_none());
        assert!(render_event(&judged(false)).unwrap().contains("high"));
    }

    #[test]
    fn test_bookkeeping_events_stay_quiet() {
        assert!(render_event(&GameEvent::ModeChanged {
            mode: ActivityMode::DrawMelody
        })
        .is_none());
        assert!(render_event(&GameEvent::SequenceCompleted { at_ms: 10 }).is_none());

        let note: NoteToken = "E4".parse().unwrap();
        let shown = render_event(&GameEvent::KeyAccepted { note, position: 0 }).unwrap();
        assert!(shown.contains("E4"));
        assert!(shown.contains("(1)"));
    }
}
