use super::parse_note;
use tonetrail_core::audio::{AudioCollaborator, AudioError, SequenceOptions, SequenceStop};
use tracing::debug;

/// Logs what would have sounded. Used with `--audio silent` and whenever
/// no real output can be opened.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentAudio;

impl AudioCollaborator for SilentAudio {
    fn play_note(
        &mut self,
        note: &str,
        duration_secs: f32,
        _velocity: Option<f32>,
    ) -> Result<(), AudioError> {
        parse_note(note)?;
        debug!(note, duration_secs, "silent note");
        Ok(())
    }

    fn play_note_sequence(
        &mut self,
        notes: &[String],
        options: SequenceOptions,
    ) -> Result<SequenceStop, AudioError> {
        for note in notes {
            parse_note(note)?;
        }
        debug!(notes = %notes.join(" "), tempo = options.tempo_bpm, "silent sequence");
        Ok(SequenceStop::new())
    }

    fn stop_all(&mut self) {
        debug!("silent stop");
    }

    fn play_feedback(&mut self, success: bool) {
        debug!(success, "silent feedback");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unknown_notes() {
        let mut audio = SilentAudio;
        assert!(audio.play_note("C4", 0.5, None).is_ok());
        assert!(audio.play_note("C#", 0.5, None).is_ok());
        assert!(audio.play_note("C9", 0.5, None).is_err());
        let stop = audio
            .play_note_sequence(&["C4".to_string(), "E4".to_string()], SequenceOptions::default())
            .unwrap();
        assert!(!stop.is_stopped());
    }
}
