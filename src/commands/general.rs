//! General REPL commands (help, quit, status, melodies, watch)

use crate::commands::{CommandContext, CommandResult};
use crate::engine::EngineCommand;
use crate::melodies::load_catalog;
use colored::*;
use tonetrail_core::ActivitySnapshot;

/// Handle `help` command
pub fn cmd_help(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    print_help();
    CommandResult::Success
}

/// Handle `quit` or `exit` command
pub fn cmd_quit(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    CommandResult::Exit
}

/// Handle `status` command
pub fn cmd_status(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    match ctx.engine.snapshot() {
        Ok(snapshot) => CommandResult::Message(format_status(&snapshot)),
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

pub fn format_status(s: &ActivitySnapshot) -> String {
    let mut out = format!(
        "{} {}  ({:?}{})\n",
        "Activity:".bold(),
        s.mode.to_string().bright_cyan(),
        s.phase,
        if s.playing { ", playing" } else { "" }
    );
    if s.game_mode {
        out.push_str("  game mode\n");
    }
    if s.challenge {
        out.push_str("  drawing challenge\n");
    }
    if let Some(melody) = &s.melody {
        out.push_str(&format!("  melody: {}\n", melody.cyan()));
    }
    if s.keys_entered > 0 {
        out.push_str(&format!("  keys entered: {}\n", s.keys_entered));
    }
    if let Some(feedback) = &s.feedback {
        out.push_str(&format!("  {}\n", feedback.italic()));
    }

    let p = &s.progress;
    out.push_str(&format!("{}\n", "Progress:".bold()));
    out.push_str(&format!(
        "  high-or-low {} (stage {}), match-sounds {}, draw {}, sound-judgment {}, memory {}\n",
        p.high_or_low, s.stage, p.match_sounds, p.draw_melody, p.sound_judgment, p.memory_game
    ));
    let patterns: Vec<&str> = s.unlocked_patterns.iter().map(|k| k.name()).collect();
    out.push_str(&format!(
        "  patterns: {}, memory length: {}",
        patterns.join(" ").green(),
        s.memory_length
    ));
    out
}

/// Handle `reset progress` command
pub fn cmd_reset_progress(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args != "--yes" {
        return CommandResult::Message(format!(
            "This forgets every answer so far. Type {} to confirm.",
            "reset progress --yes".bright_red()
        ));
    }
    match ctx.run(EngineCommand::ResetProgress) {
        Ok(_) => CommandResult::Success,
        Err(result) => result,
    }
}

/// Handle `melodies [reload]` command
pub fn cmd_melodies(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let Some(path) = ctx.settings.melodies.clone() else {
        return CommandResult::Message("Using the built-in melodies".to_string());
    };
    if args != "reload" {
        return CommandResult::Message(format!("Melodies from {}", path.display()));
    }

    let catalog = match load_catalog(&path, ctx.settings.game.default_quarter_ms) {
        Ok(catalog) => catalog,
        Err(e) => return CommandResult::Error(format!("{:#}", e)),
    };
    let count = catalog.len();
    match ctx.run(EngineCommand::SetCatalog(catalog)) {
        Ok(_) => CommandResult::Message(format!("{} Loaded {} melodies", "✓".bright_green(), count)),
        Err(result) => result,
    }
}

/// Handle `watch [file]` command; defaults to the configured melody file
pub fn cmd_watch(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if !args.is_empty() {
        return CommandResult::Watch(args.to_string());
    }
    match &ctx.settings.melodies {
        Some(path) => CommandResult::Watch(path.display().to_string()),
        None => CommandResult::Error("Usage: watch <melody file>".to_string()),
    }
}

/// Print help information
fn print_help() {
    println!("{}", "🎵 Tonetrail Help".bold());
    println!("{}", "=================".bold());
    println!();
    println!("{}", "Activities:".green());
    println!("  {}       - Choose an activity", "mode <name>".cyan());
    println!(
        "                      ({})",
        "high-or-low, match, draw, judge, memory".dimmed()
    );
    println!("  {}              - Play, replay or start the activity", "play".cyan());
    println!("  {}              - Stop all sound", "stop".cyan());
    println!();
    println!("{}", "High or Low:".green());
    println!("  {} / {}        - Was the tone high or low?", "high".cyan(), "low".cyan());
    println!();
    println!("{}", "Match the Sounds:".green());
    println!("  {}    - Hear a melody shape", "preview <kind>".cyan());
    println!("  {}              - Start the guessing game", "game".cyan());
    println!("  {}    - Guess: up, down, wave or jump", "pattern <kind>".cyan());
    println!();
    println!("{}", "Draw a Melody:".green());
    println!(
        "  {} - Draw a line, heights 0-100 left to right",
        "draw 10 40 80 ...".cyan()
    );
    println!("  {}         - Toggle the drawing challenge", "challenge".cyan());
    println!("  {}         - New challenge melody", "reference".cyan());
    println!();
    println!("{}", "Does It Sound Right?".green());
    println!("  {} / {}     - Was the melody right or was a note wrong?", "right".cyan(), "wrong".cyan());
    println!();
    println!("{}", "Memory Game:".green());
    println!("  {}              - Start the memory game", "game".cyan());
    println!("  {}  - Press keys (C4 D4 E4 G4 A4)", "key <note>...".cyan());
    println!();
    println!("{}", "Audio:".green());
    println!("  {}             - Show the audio backend", "audio".cyan());
    println!("  {}      - List MIDI output ports", "midi devices".cyan());
    println!();
    println!("{}", "Other Commands:".green());
    println!("  {}            - Show activity and progress", "status".bright_green());
    println!("  {}  - Show or reload the melody file", "melodies [reload]".bright_green());
    println!("  {}     - Reload melodies when the file changes", "watch [file]".bright_green());
    println!("  {}    - Forget all progress", "reset progress".bright_green());
    println!("  {}              - Show this help", "help".bright_green());
    println!("  {}              - Exit the REPL", "quit".bright_red());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::test_context;
    use std::path::PathBuf;

    #[test]
    fn test_status_lists_progress() {
        let (mut ctx, _) = test_context();
        match cmd_status("", &mut ctx) {
            CommandResult::Message(m) => {
                assert!(m.contains("idle"), "{}", m);
                assert!(m.contains("memory length: 2"), "{}", m);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_reset_needs_confirmation() {
        let (mut ctx, _) = test_context();
        assert!(matches!(cmd_reset_progress("", &mut ctx), CommandResult::Message(_)));
        assert!(matches!(cmd_reset_progress("--yes", &mut ctx), CommandResult::Success));
    }

    #[test]
    fn test_watch_defaults_to_melody_file() {
        let (mut ctx, _) = test_context();
        assert!(matches!(cmd_watch("", &mut ctx), CommandResult::Error(_)));

        ctx.settings.melodies = Some(PathBuf::from("songs.toml"));
        match cmd_watch("", &mut ctx) {
            CommandResult::Watch(path) => assert_eq!(path, "songs.toml"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_melodies_reload() {
        let (mut ctx, _) = test_context();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("songs.toml");
        std::fs::write(
            &path,
            "[[melody]]\nid = \"a\"\nen = \"A\"\nnotes = \"C4 D4\"\n",
        )
        .unwrap();
        ctx.settings.melodies = Some(path);

        match cmd_melodies("reload", &mut ctx) {
            CommandResult::Message(m) => assert!(m.contains("1 melodies"), "{}", m),
            other => panic!("unexpected {:?}", other),
        }
    }
}
