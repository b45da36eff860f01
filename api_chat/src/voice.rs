use chrono::{DateTime, Utc};
use common::error::{AppError, Res};

/// Largest accepted recording.
pub const MAX_VOICE_BYTES: usize = 10 * 1024 * 1024;

/// Recording in progress. Chunks are buffered in memory until [`VoiceRecording::finish`].
#[derive(Debug)]
pub struct VoiceRecording {
    content_type: String,
    started_at: DateTime<Utc>,
    bytes: Vec<u8>,
}

impl VoiceRecording {
    /// Starts a recording of the given `audio/*` media type.
    pub fn new(content_type: &str) -> Res<Self> {
        let is_audio = essence(content_type)
            .split_once('/')
            .is_some_and(|(kind, subtype)| {
                kind.eq_ignore_ascii_case("audio") && !subtype.is_empty()
            });
        if !is_audio {
            return Err(AppError::BadRequest(format!(
                "Voice messages must be audio, got '{}'",
                content_type
            )));
        }
        Ok(VoiceRecording {
            content_type: content_type.trim().to_string(),
            started_at: Utc::now(),
            bytes: Vec::new(),
        })
    }

    pub fn push_chunk(&mut self, chunk: &[u8]) -> Res<()> {
        if self.bytes.len() + chunk.len() > MAX_VOICE_BYTES {
            return Err(AppError::BadRequest(format!(
                "Voice message exceeds {} bytes",
                MAX_VOICE_BYTES
            )));
        }
        self.bytes.extend_from_slice(chunk);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn finish(self) -> Res<VoiceClip> {
        if self.bytes.is_empty() {
            return Err(AppError::BadRequest("Voice message is empty".to_string()));
        }
        Ok(VoiceClip {
            bytes: self.bytes,
            content_type: self.content_type,
            recorded_at: self.started_at,
        })
    }
}

/// A finished recording, ready to upload. Handed back to the caller when a send aborts.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceClip {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub recorded_at: DateTime<Utc>,
}

impl VoiceClip {
    pub fn extension(&self) -> &'static str {
        match essence(&self.content_type).to_ascii_lowercase().as_str() {
            "audio/webm" => "webm",
            "audio/ogg" => "ogg",
            "audio/mp4" | "audio/x-m4a" | "audio/aac" => "m4a",
            "audio/mpeg" => "mp3",
            "audio/wav" | "audio/x-wav" => "wav",
            _ => "bin",
        }
    }
}

/// Media type without parameters, e.g. `audio/webm` of `audio/webm;codecs=opus`.
fn essence(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or_default().trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_chunks_until_finished() {
        let mut recording = VoiceRecording::new("audio/webm;codecs=opus").unwrap();
        recording.push_chunk(b"Ogg").unwrap();
        recording.push_chunk(b"S\x00").unwrap();
        assert_eq!(recording.len(), 5);

        let clip = recording.finish().unwrap();
        assert_eq!(clip.bytes, b"OggS\x00");
        assert_eq!(clip.extension(), "webm");
    }

    #[test]
    fn empty_and_oversized_recordings_are_rejected() {
        assert!(VoiceRecording::new("audio/mp4").unwrap().finish().is_err());

        let mut recording = VoiceRecording::new("audio/mp4").unwrap();
        recording.push_chunk(&vec![0; MAX_VOICE_BYTES]).unwrap();
        assert!(matches!(
            recording.push_chunk(&[0]),
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(recording.len(), MAX_VOICE_BYTES);
    }

    #[test]
    fn only_audio_is_accepted() {
        for content_type in ["text/plain", "application/octet-stream", "audio", "audio/", ""] {
            assert!(
                matches!(VoiceRecording::new(content_type), Err(AppError::BadRequest(_))),
                "{content_type:?} should be rejected"
            );
        }
    }

    #[test]
    fn media_type_matching_ignores_case() {
        let mut recording = VoiceRecording::new("Audio/MP4").unwrap();
        recording.push_chunk(b"ftyp").unwrap();
        assert_eq!(recording.finish().unwrap().extension(), "m4a");
    }
}
