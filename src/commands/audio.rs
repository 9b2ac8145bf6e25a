//! Audio-related commands

use crate::audio::MidiAudio;
use crate::commands::{CommandContext, CommandResult};
use crate::config::AudioBackend;
use colored::*;

/// Handle `audio` command - show the backend in use
pub fn cmd_audio(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    let audio = &ctx.settings.audio;
    let mut out = format!("🔈 Backend: {}", audio.backend.to_string().bright_cyan());
    match audio.backend {
        AudioBackend::Synth => out.push_str(&format!(
            ", {:?} at volume {:.0}%",
            audio.waveform,
            audio.volume * 100.0
        )),
        AudioBackend::Midi => out.push_str(&format!(
            ", port {} channel {}",
            audio.midi_port.as_deref().unwrap_or("(first)").green(),
            audio.midi_channel
        )),
        AudioBackend::Silent => {}
    }
    CommandResult::Message(out)
}

/// Handle `midi devices` command - list available MIDI output ports
pub fn cmd_midi_devices(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    match MidiAudio::list_ports() {
        Ok(ports) if ports.is_empty() => CommandResult::Message(
            "No MIDI output ports found. Make sure a MIDI device or virtual port is connected."
                .yellow()
                .to_string(),
        ),
        Ok(ports) => {
            let mut output = format!("{}\n", "🎹 Available MIDI Output Ports:".bold());
            for (i, port) in ports.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, port.cyan()));
            }
            output.push_str(&format!(
                "\n{} {}",
                "Start with".dimmed(),
                "--audio midi".green()
            ));
            CommandResult::Message(output)
        }
        Err(e) => CommandResult::Error(format!("Failed to list MIDI ports: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::test_context;

    #[test]
    fn test_audio_shows_backend() {
        let (mut ctx, _) = test_context();
        ctx.settings.audio.backend = AudioBackend::Midi;
        ctx.settings.audio.midi_port = Some("IAC".to_string());
        match cmd_audio("", &mut ctx) {
            CommandResult::Message(m) => {
                assert!(m.contains("midi"), "{}", m);
                assert!(m.contains("IAC"), "{}", m);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
