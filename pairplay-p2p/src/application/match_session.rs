use crate::application::session_manager::SessionManager;
use crate::application::voice::{VoiceInputs, VoiceManager, VoiceStatus};
use crate::infrastructure::transport::{DataTransport, MediaDevices, MediaTransport};
use pairplay_core::{PeerIdentity, PlayerInfo};
use tracing::{debug, info};

/// A session and the voice link that follows it
///
/// Voice inputs are re-derived from the session after every poll and after
/// every operation that changes the session mode, so the voice link never
/// outlives the match it belongs to.
#[derive(Debug)]
pub struct MatchSession<T: DataTransport, M: MediaTransport, D: MediaDevices> {
    session: SessionManager<T>,
    voice: Option<VoiceManager<M, D>>,
    voice_enabled: bool,
}

impl<T: DataTransport, M: MediaTransport, D: MediaDevices> MatchSession<T, M, D> {
    /// Session without voice
    pub fn new(session: SessionManager<T>) -> Self {
        Self {
            session,
            voice: None,
            voice_enabled: false,
        }
    }

    /// Session with a voice channel, enabled from the start
    pub fn with_voice(session: SessionManager<T>, voice: VoiceManager<M, D>) -> Self {
        Self {
            session,
            voice: Some(voice),
            voice_enabled: true,
        }
    }

    pub fn session(&self) -> &SessionManager<T> {
        &self.session
    }

    /// Direct access to the session; voice follows on the next poll
    pub fn session_mut(&mut self) -> &mut SessionManager<T> {
        &mut self.session
    }

    pub fn voice(&self) -> Option<&VoiceManager<M, D>> {
        self.voice.as_ref()
    }

    pub fn voice_status(&self) -> VoiceStatus {
        self.voice
            .as_ref()
            .map_or(VoiceStatus::Inactive, VoiceManager::status)
    }

    pub fn is_voice_enabled(&self) -> bool {
        self.voice_enabled
    }

    // ===== Operations =====

    pub fn host(&mut self) {
        self.session.host();
    }

    pub fn join(&mut self, host: PeerIdentity) {
        self.session.join(host);
    }

    pub fn join_code(&mut self, code: &str) {
        self.session.join_code(code);
    }

    pub fn update_self_info(&mut self, info: PlayerInfo) {
        self.session.update_self_info(info);
    }

    pub fn mark_ready(&mut self) {
        self.session.mark_ready();
    }

    pub fn start_game(&mut self) {
        self.session.start_game();
        self.sync_voice();
    }

    pub fn leave_match(&mut self) {
        self.session.leave_match();
        self.sync_voice();
    }

    /// Close the connection and the voice link in one step
    ///
    /// The microphone is stopped before this returns. A microphone grant
    /// still in flight is released when it arrives.
    pub fn disconnect(&mut self) {
        self.session.disconnect();
        if let Some(voice) = self.voice.as_mut() {
            voice.update(&VoiceInputs::default());
        }
    }

    pub fn reset_identity(&mut self) {
        self.disconnect();
        self.session.reset_identity();
    }

    pub fn set_voice_enabled(&mut self, enabled: bool) {
        if self.voice_enabled != enabled {
            info!(enabled, "Voice toggled");
        }
        self.voice_enabled = enabled;
        self.sync_voice();
    }

    /// Returns the new muted state; `true` without a voice link
    pub fn toggle_mute(&mut self) -> bool {
        self.voice.as_mut().map_or(true, VoiceManager::toggle_mute)
    }

    /// Poll the session, bring voice in line with it, then poll voice.
    /// Returns the number of events handled.
    pub fn poll(&mut self) -> usize {
        let mut count = self.session.poll();
        self.sync_voice();
        if let Some(voice) = self.voice.as_mut() {
            count += voice.poll();
        }
        count
    }

    fn sync_voice(&mut self) {
        let Some(voice) = self.voice.as_mut() else {
            return;
        };
        let inputs = VoiceInputs::from_session(&self.session, self.voice_enabled);
        debug!(game_active = inputs.game_active, enabled = inputs.enabled, "Voice inputs");
        voice.update(&inputs);
    }
}
