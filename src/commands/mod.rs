//! Command registry for REPL commands
//!
//! Every line typed at the prompt is a command; the longest registered
//! prefix wins.

pub mod activity;
pub mod audio;
pub mod general;

use crate::config::AppConfig;
use crate::engine::{EngineCommand, EngineHandle, Reply};

/// Result of executing a command
#[derive(Debug)]
pub enum CommandResult {
    /// Command executed successfully, continue REPL
    Success,
    /// Command executed, show this message
    Message(String),
    /// Exit the REPL
    Exit,
    /// No command matches the input
    NotACommand,
    /// Error occurred
    Error(String),
    /// Watch a melody file for changes
    Watch(String),
}

/// Context passed to command handlers
pub struct CommandContext {
    pub engine: EngineHandle,
    pub settings: AppConfig,
}

impl CommandContext {
    pub fn new(engine: EngineHandle, settings: AppConfig) -> Self {
        Self { engine, settings }
    }

    /// Send a command to the engine, folding failures into a
    /// [`CommandResult::Error`].
    pub fn run(&self, command: EngineCommand) -> Result<Reply, CommandResult> {
        self.engine
            .request(command)
            .map_err(|e| CommandResult::Error(e.to_string()))
    }
}

/// A command handler function
pub type CommandHandler = fn(&str, &mut CommandContext) -> CommandResult;

/// Registry of available commands
pub struct CommandRegistry {
    /// Sorted by prefix length descending for longest-match-first lookup
    commands: Vec<(String, CommandHandler)>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    /// Register a command with its prefix
    pub fn register(&mut self, prefix: &str, handler: CommandHandler) {
        self.commands.push((prefix.to_string(), handler));
        self.commands.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// Execute a command, returning NotACommand if no match found
    pub fn execute(&self, input: &str, ctx: &mut CommandContext) -> CommandResult {
        for (prefix, handler) in &self.commands {
            if input == prefix || input.starts_with(&format!("{} ", prefix)) {
                let args = input[prefix.len()..].trim();
                return handler(args, ctx);
            }
        }
        CommandResult::NotACommand
    }

    /// Get all registered command prefixes
    pub fn list_commands(&self) -> Vec<&str> {
        self.commands.iter().map(|(p, _)| p.as_str()).collect()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a fully populated command registry with all built-in commands
pub fn create_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();

    // Activities
    registry.register("mode", activity::cmd_mode);
    registry.register("play", activity::cmd_play);
    registry.register("high", activity::cmd_high);
    registry.register("low", activity::cmd_low);
    registry.register("pattern", activity::cmd_pattern);
    registry.register("preview", activity::cmd_preview);
    registry.register("game", activity::cmd_game);
    registry.register("key", activity::cmd_key);
    registry.register("right", activity::cmd_right);
    registry.register("wrong", activity::cmd_wrong);
    registry.register("draw", activity::cmd_draw);
    registry.register("challenge", activity::cmd_challenge);
    registry.register("reference", activity::cmd_reference);
    registry.register("stop", activity::cmd_stop);

    // Audio
    registry.register("audio", audio::cmd_audio);
    registry.register("midi devices", audio::cmd_midi_devices);

    // General commands
    registry.register("status", general::cmd_status);
    registry.register("reset progress", general::cmd_reset_progress);
    registry.register("melodies", general::cmd_melodies);
    registry.register("help", general::cmd_help);
    registry.register("quit", general::cmd_quit);
    registry.register("exit", general::cmd_quit);
    registry.register("watch", general::cmd_watch);

    registry
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tonetrail_core::audio::RecordingAudio;
    use tonetrail_core::melodies::MelodyCatalog;
    use tonetrail_core::persistence::MemoryStore;
    use tonetrail_core::GameConfig;

    pub(crate) fn test_context() -> (CommandContext, RecordingAudio) {
        let audio = RecordingAudio::new();
        let config = GameConfig {
            seed: Some(21),
            ..GameConfig::default()
        };
        let engine = EngineHandle::spawn(
            config.clone(),
            Box::new(audio.clone()),
            Box::new(MemoryStore::new()),
            MelodyCatalog::builtin(),
        )
        .unwrap();
        let settings = AppConfig {
            game: config,
            ..AppConfig::default()
        };
        (CommandContext::new(engine, settings), audio)
    }

    fn echo(args: &str, _ctx: &mut CommandContext) -> CommandResult {
        CommandResult::Message(args.to_string())
    }

    fn short(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
        CommandResult::Message("short".to_string())
    }

    #[test]
    fn test_longest_prefix_wins() {
        let (mut ctx, _) = test_context();
        let mut registry = CommandRegistry::new();
        registry.register("midi", short);
        registry.register("midi devices", echo);

        match registry.execute("midi devices all", &mut ctx) {
            CommandResult::Message(m) => assert_eq!(m, "all"),
            other => panic!("unexpected {:?}", other),
        }
        match registry.execute("midi", &mut ctx) {
            CommandResult::Message(m) => assert_eq!(m, "short"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            registry.execute("midifoo", &mut ctx),
            CommandResult::NotACommand
        ));
    }

    #[test]
    fn test_default_registry_covers_every_command() {
        let registry = create_registry();
        let commands = registry.list_commands();
        for name in ["mode", "play", "high", "low", "draw", "help", "watch", "reset progress"] {
            assert!(commands.contains(&name), "{} missing", name);
        }
    }
}
