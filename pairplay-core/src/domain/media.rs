use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Handle to a single audio track
///
/// Clones share state: muting or stopping through one handle is visible
/// through every other handle, the way a browser track object behaves.
#[derive(Debug, Clone)]
pub struct AudioTrack {
    id: String,
    enabled: Arc<AtomicBool>,
    live: Arc<AtomicBool>,
}

impl AudioTrack {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: Arc::new(AtomicBool::new(true)),
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Enable or disable the track without releasing the device
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether the track still holds its device
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Release the underlying device. Irreversible.
    pub fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

impl PartialEq for AudioTrack {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.live, &other.live)
    }
}

/// A set of audio tracks captured or received together
#[derive(Debug, Clone, PartialEq)]
pub struct MediaStream {
    id: String,
    tracks: Vec<AudioTrack>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>, tracks: Vec<AudioTrack>) -> Self {
        Self {
            id: id.into(),
            tracks,
        }
    }

    /// Stream with a single audio track named after the stream
    pub fn single_track(id: impl Into<String>) -> Self {
        let id = id.into();
        let track = AudioTrack::new(format!("{}/audio-0", id));
        Self::new(id, vec![track])
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn audio_tracks(&self) -> &[AudioTrack] {
        &self.tracks
    }

    pub fn set_audio_enabled(&self, enabled: bool) {
        for track in &self.tracks {
            track.set_enabled(enabled);
        }
    }

    /// True only if every track is enabled
    pub fn is_audio_enabled(&self) -> bool {
        !self.tracks.is_empty() && self.tracks.iter().all(AudioTrack::is_enabled)
    }

    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    pub fn is_live(&self) -> bool {
        self.tracks.iter().any(AudioTrack::is_live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let track = AudioTrack::new("mic");
        let clone = track.clone();

        clone.set_enabled(false);
        assert!(!track.is_enabled());

        track.stop();
        assert!(!clone.is_live());
    }

    #[test]
    fn test_stream_mute_keeps_tracks_live() {
        let stream = MediaStream::single_track("local");

        stream.set_audio_enabled(false);

        assert!(!stream.is_audio_enabled());
        assert!(stream.is_live());
    }

    #[test]
    fn test_stream_stop() {
        let stream = MediaStream::single_track("local");
        let observer = stream.clone();

        stream.stop();

        assert!(!observer.is_live());
        assert!(observer.audio_tracks().iter().all(|t| !t.is_live()));
    }

    #[test]
    fn test_empty_stream_not_enabled() {
        let stream = MediaStream::new("empty", vec![]);
        assert!(!stream.is_audio_enabled());
        assert!(!stream.is_live());
    }
}
