//! Commands that drive the activities

use crate::commands::{CommandContext, CommandResult};
use crate::engine::{EngineCommand, Reply};
use colored::*;
use tonetrail_core::activity::{DrawPoint, KeyOutcome};
use tonetrail_core::types::note::render_sequence;
use tonetrail_core::{ActivityMode, Answer, NoteToken, PatternKind, Pitch};

/// Height of the virtual canvas `draw` maps its values onto.
const CANVAS_HEIGHT: f32 = 100.0;

fn run(ctx: &CommandContext, command: EngineCommand) -> CommandResult {
    match ctx.run(command) {
        Ok(_) => CommandResult::Success,
        Err(result) => result,
    }
}

fn judged(reply: Result<Reply, CommandResult>) -> CommandResult {
    match reply {
        // Feedback text arrives as an event
        Ok(Reply::Judged(_)) => CommandResult::Success,
        Ok(other) => CommandResult::Error(format!("Unexpected engine reply: {:?}", other)),
        Err(result) => result,
    }
}

/// Handle `mode [activity]`
pub fn cmd_mode(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        let names: Vec<&str> = ActivityMode::ALL.iter().map(|m| m.name()).collect();
        return CommandResult::Message(format!("Activities: {}", names.join(", ").cyan()));
    }
    let mode: ActivityMode = match args.parse() {
        Ok(mode) => mode,
        Err(e) => return CommandResult::Error(e),
    };
    match ctx.run(EngineCommand::SetMode(mode)) {
        Ok(_) => CommandResult::Message(format!("🎮 {}", mode.name().bright_cyan().bold())),
        Err(result) => result,
    }
}

/// Handle `play`: the play button of whichever activity is active
pub fn cmd_play(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    run(ctx, EngineCommand::Play)
}

fn answer_pitch(pitch: Pitch, ctx: &CommandContext) -> CommandResult {
    judged(ctx.run(EngineCommand::Answer(Answer::Pitch(pitch))))
}

/// Handle `high`
pub fn cmd_high(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    answer_pitch(Pitch::High, ctx)
}

/// Handle `low`
pub fn cmd_low(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    answer_pitch(Pitch::Low, ctx)
}

/// Handle `right`: the melody sounded right
pub fn cmd_right(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    judged(ctx.run(EngineCommand::Answer(Answer::SoundsRight(true))))
}

/// Handle `wrong`: there was a wrong note
pub fn cmd_wrong(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    judged(ctx.run(EngineCommand::Answer(Answer::SoundsRight(false))))
}

fn parse_kind(args: &str, usage: &str) -> Result<PatternKind, CommandResult> {
    if args.is_empty() {
        return Err(CommandResult::Error(usage.to_string()));
    }
    args.parse::<PatternKind>().map_err(CommandResult::Error)
}

/// Handle `pattern <up|down|wave|jump>`: guess the contour in game mode
pub fn cmd_pattern(args: &str, ctx: &mut CommandContext) -> CommandResult {
    match parse_kind(args, "Usage: pattern <up|down|wave|jump>") {
        Ok(kind) => judged(ctx.run(EngineCommand::Answer(Answer::Pattern(kind)))),
        Err(result) => result,
    }
}

/// Handle `preview <up|down|wave|jump>`: hear a contour in free play
pub fn cmd_preview(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let kind = match parse_kind(args, "Usage: preview <up|down|wave|jump>") {
        Ok(kind) => kind,
        Err(result) => return result,
    };
    match ctx.run(EngineCommand::Preview(kind)) {
        Ok(Reply::Previewed(pattern)) => CommandResult::Message(format!(
            "🔊 {} {}",
            kind.name().bright_green(),
            render_sequence(&pattern.notes).dimmed()
        )),
        Ok(_) => CommandResult::Success,
        Err(result) => result,
    }
}

/// Handle `game`: switch the matching or memory activity into game mode
pub fn cmd_game(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    match ctx.run(EngineCommand::StartGame) {
        Ok(_) => CommandResult::Message("🎲 Game on!".bright_green().to_string()),
        Err(result) => result,
    }
}

/// Handle `key <note>...`: press memory keys in order
pub fn cmd_key(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error("Usage: key <note> [note...]".to_string());
    }
    let mut notes = Vec::new();
    for text in args.split_whitespace() {
        match text.parse::<NoteToken>() {
            Ok(note) => notes.push(note),
            Err(e) => return CommandResult::Error(e.to_string()),
        }
    }

    for note in notes {
        match ctx.run(EngineCommand::PressKey(note)) {
            Ok(Reply::Key(Some(KeyOutcome::Continue { .. }))) | Ok(Reply::Key(None)) => {}
            // The round is over either way; later keys belong to no one
            Ok(Reply::Key(Some(_))) => break,
            Ok(other) => {
                return CommandResult::Error(format!("Unexpected engine reply: {:?}", other))
            }
            Err(result) => return result,
        }
    }
    CommandResult::Success
}

/// Parse `draw` arguments: heights from 0 (bottom) to 100 (top), one per
/// point, left to right.
pub fn parse_drawing(args: &str) -> Result<Vec<DrawPoint>, String> {
    args.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(i, text)| {
            let height: f32 = text
                .parse()
                .map_err(|_| format!("'{}' is not a height", text))?;
            if !(0.0..=CANVAS_HEIGHT).contains(&height) {
                return Err(format!("Height {} is outside 0-100", height));
            }
            Ok(DrawPoint {
                x: i as f32,
                y: CANVAS_HEIGHT - height,
            })
        })
        .collect()
}

/// Handle `draw <h1> <h2> ...`
pub fn cmd_draw(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let points = match parse_drawing(args) {
        Ok(points) => points,
        Err(e) => return CommandResult::Error(e),
    };
    match ctx.run(EngineCommand::Draw {
        points,
        height: CANVAS_HEIGHT,
    }) {
        Ok(Reply::Drawing(notes)) => {
            CommandResult::Message(format!("✏️  {}", render_sequence(&notes).cyan()))
        }
        Ok(_) => CommandResult::Success,
        Err(result) => result,
    }
}

/// Handle `challenge`: toggle the drawing challenge
pub fn cmd_challenge(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    match ctx.run(EngineCommand::ToggleChallenge) {
        Ok(Reply::Challenge(true)) => CommandResult::Message(
            "🏁 Challenge on: draw the melody you hear".bright_green().to_string(),
        ),
        Ok(_) => CommandResult::Message("Challenge off".to_string()),
        Err(result) => result,
    }
}

/// Handle `reference`: a new melody for the drawing challenge
pub fn cmd_reference(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    run(ctx, EngineCommand::NewReference)
}

/// Handle `stop`
pub fn cmd_stop(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    run(ctx, EngineCommand::Stop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::test_context;
    use tonetrail_core::RoundPhase;

    #[test]
    fn test_parse_drawing() {
        let points = parse_drawing("0, 50 100").unwrap();
        assert_eq!(
            points,
            vec![
                DrawPoint { x: 0.0, y: 100.0 },
                DrawPoint { x: 1.0, y: 50.0 },
                DrawPoint { x: 2.0, y: 0.0 },
            ]
        );
        assert!(parse_drawing("10 abc").is_err());
        assert!(parse_drawing("101").is_err());
        assert_eq!(parse_drawing("").unwrap(), vec![]);
    }

    #[test]
    fn test_mode_switch() {
        let (mut ctx, _) = test_context();
        assert!(matches!(cmd_mode("memory", &mut ctx), CommandResult::Message(_)));
        assert_eq!(
            ctx.engine.snapshot().unwrap().mode,
            ActivityMode::MemoryGame
        );
        assert!(matches!(cmd_mode("karaoke", &mut ctx), CommandResult::Error(_)));
        assert!(matches!(cmd_mode("", &mut ctx), CommandResult::Message(_)));
    }

    #[test]
    fn test_answer_outside_the_activity_is_an_error() {
        let (mut ctx, _) = test_context();
        match cmd_high("", &mut ctx) {
            CommandResult::Error(e) => assert!(e.contains("not available"), "{}", e),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_free_drawing_plays_notes() {
        let (mut ctx, audio) = test_context();
        cmd_mode("draw", &mut ctx);
        match cmd_draw("0 50 100", &mut ctx) {
            CommandResult::Message(m) => {
                assert!(m.contains("C3"), "{}", m);
                assert!(m.contains("G4"), "{}", m);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!audio.played_notes().is_empty());
        assert!(matches!(cmd_draw("", &mut ctx), CommandResult::Error(_)));
    }

    #[test]
    fn test_free_play_keys_only_sound() {
        let (mut ctx, audio) = test_context();
        cmd_mode("memory", &mut ctx);
        assert!(matches!(cmd_key("C4 E4", &mut ctx), CommandResult::Success));
        assert_eq!(audio.played_notes(), vec!["C4", "E4"]);
        assert!(matches!(cmd_key("X4", &mut ctx), CommandResult::Error(_)));
    }

    #[test]
    fn test_preview_reports_the_pattern() {
        let (mut ctx, _) = test_context();
        cmd_mode("match", &mut ctx);
        assert!(matches!(cmd_preview("up", &mut ctx), CommandResult::Message(_)));
        match cmd_preview("jump", &mut ctx) {
            CommandResult::Error(e) => assert!(e.contains("locked"), "{}", e),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_game_starts_a_round() {
        let (mut ctx, _) = test_context();
        cmd_mode("match", &mut ctx);
        assert!(matches!(cmd_game("", &mut ctx), CommandResult::Message(_)));
        let snapshot = ctx.engine.snapshot().unwrap();
        assert!(snapshot.game_mode);
        assert_eq!(snapshot.phase, RoundPhase::Playing);
    }
}
