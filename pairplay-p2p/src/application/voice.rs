use crate::application::session_manager::SessionManager;
use crate::application::{CallId, DeviceEvent, MediaEvent, MicrophoneTicket, VoiceConfig};
use crate::infrastructure::error::{MediaError, TransportError};
use crate::infrastructure::transport::{DataTransport, MediaDevices, MediaTransport};
use pairplay_core::{MediaStream, PeerIdentity, SessionMode};
use std::fmt;
use tracing::{debug, info, warn};

/// Everything the voice channel depends on, re-evaluated on every update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceInputs {
    pub game_active: bool,
    pub enabled: bool,
    /// Own data identity
    pub my_id: Option<PeerIdentity>,
    /// Opponent's data identity
    pub opponent_id: Option<PeerIdentity>,
}

impl VoiceInputs {
    pub fn from_session<T: DataTransport>(session: &SessionManager<T>, enabled: bool) -> Self {
        Self {
            game_active: session.mode() == SessionMode::InGame,
            enabled,
            my_id: Some(session.peer_id().clone()),
            opponent_id: session.remote_id().cloned(),
        }
    }

    /// Voice identities to link, if every precondition holds
    fn link_target(&self) -> Option<(PeerIdentity, PeerIdentity)> {
        if !self.game_active || !self.enabled {
            return None;
        }
        match (&self.my_id, &self.opponent_id) {
            (Some(me), Some(opponent)) if me != opponent => {
                Some((me.voice_identity(), opponent.voice_identity()))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceStatus {
    Inactive,
    Connecting,
    Connected,
    PermissionDenied,
    /// Device or transport failure, by kind
    Error(String),
}

impl fmt::Display for VoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceStatus::Inactive => write!(f, "inactive"),
            VoiceStatus::Connecting => write!(f, "connecting"),
            VoiceStatus::Connected => write!(f, "connected"),
            VoiceStatus::PermissionDenied => write!(f, "permission denied"),
            VoiceStatus::Error(kind) => write!(f, "error ({})", kind),
        }
    }
}

#[derive(Debug)]
enum Microphone {
    Pending,
    Ready(MediaStream),
    Failed(MediaError),
}

impl Microphone {
    fn is_settled(&self) -> bool {
        !matches!(self, Microphone::Pending)
    }

    fn stream(&self) -> Option<MediaStream> {
        match self {
            Microphone::Ready(stream) => Some(stream.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Outbound,
    Inbound { answered: bool },
}

#[derive(Debug)]
struct ActiveCall {
    id: CallId,
    direction: Direction,
}

/// State of one activation
#[derive(Debug)]
struct VoiceLink {
    ticket: MicrophoneTicket,
    my_voice: PeerIdentity,
    opponent_voice: PeerIdentity,
    media_open: bool,
    microphone: Microphone,
    muted: bool,
    call: Option<ActiveCall>,
    outbound_attempted: bool,
    remote_stream: Option<MediaStream>,
    error: Option<String>,
}

/// Optional audio link to the opponent while a match runs
///
/// Level-triggered: [`VoiceManager::update`] compares the inputs with the
/// running link and activates, restarts or tears down as needed. The
/// microphone stream and the call belong to this manager alone.
pub struct VoiceManager<M: MediaTransport, D: MediaDevices> {
    media: M,
    devices: D,
    config: VoiceConfig,
    link: Option<VoiceLink>,
    generation: u64,
}

impl<M: MediaTransport, D: MediaDevices> fmt::Debug for VoiceManager<M, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceManager")
            .field("config", &self.config)
            .field("link", &self.link)
            .field("generation", &self.generation)
            .finish()
    }
}

impl<M: MediaTransport, D: MediaDevices> VoiceManager<M, D> {
    pub fn new(media: M, devices: D, config: VoiceConfig) -> Self {
        Self {
            media,
            devices,
            config,
            link: None,
            generation: 0,
        }
    }

    /// Bring the link in line with `inputs`
    pub fn update(&mut self, inputs: &VoiceInputs) {
        let target = inputs.link_target();

        let unchanged = match (&self.link, &target) {
            (Some(link), Some((me, opponent))) => {
                &link.my_voice == me && &link.opponent_voice == opponent
            }
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            self.advance();
            return;
        }

        self.deactivate();
        if let Some((me, opponent)) = target {
            self.activate(me, opponent);
        }
        self.advance();
    }

    /// Process device and media events. Returns the number handled.
    pub fn poll(&mut self) -> usize {
        let device_events = self.devices.poll_events();
        let media_events = self.media.poll_events();
        let count = device_events.len() + media_events.len();

        for event in device_events {
            self.handle_device_event(event);
        }
        for event in media_events {
            self.handle_media_event(event);
        }

        self.advance();
        count
    }

    /// Flip the enabled flag of every local track; the call is left alone.
    /// Returns the new muted state.
    pub fn toggle_mute(&mut self) -> bool {
        let Some(link) = self.link.as_mut() else {
            return true;
        };

        link.muted = !link.muted;
        if let Microphone::Ready(stream) = &link.microphone {
            stream.set_audio_enabled(!link.muted);
        }
        debug!(muted = link.muted, "Microphone mute toggled");
        link.muted
    }

    pub fn is_muted(&self) -> bool {
        self.link.as_ref().map_or(true, |link| link.muted)
    }

    pub fn status(&self) -> VoiceStatus {
        let Some(link) = &self.link else {
            return VoiceStatus::Inactive;
        };

        if let Some(kind) = &link.error {
            return VoiceStatus::Error(kind.clone());
        }
        match &link.microphone {
            Microphone::Failed(MediaError::PermissionDenied) => VoiceStatus::PermissionDenied,
            Microphone::Failed(e) => VoiceStatus::Error(e.kind().to_string()),
            _ if link.remote_stream.is_some() => VoiceStatus::Connected,
            _ => VoiceStatus::Connecting,
        }
    }

    pub fn is_active(&self) -> bool {
        self.link.is_some()
    }

    pub fn local_stream(&self) -> Option<MediaStream> {
        self.link.as_ref().and_then(|link| link.microphone.stream())
    }

    pub fn remote_stream(&self) -> Option<&MediaStream> {
        self.link.as_ref().and_then(|link| link.remote_stream.as_ref())
    }

    pub fn call_id(&self) -> Option<CallId> {
        self.link
            .as_ref()
            .and_then(|link| link.call.as_ref().map(|call| call.id))
    }

    pub fn has_call(&self) -> bool {
        self.call_id().is_some()
    }

    fn activate(&mut self, me: PeerIdentity, opponent: PeerIdentity) {
        self.generation += 1;
        let ticket = MicrophoneTicket(self.generation);
        info!("Starting voice link {} -> {}", me, opponent);

        let mut link = VoiceLink {
            ticket,
            my_voice: me.clone(),
            opponent_voice: opponent,
            media_open: false,
            microphone: Microphone::Pending,
            muted: self.config.start_muted,
            call: None,
            outbound_attempted: false,
            remote_stream: None,
            error: None,
        };

        self.devices.request_microphone(ticket);
        if let Err(e) = self.media.open(&me) {
            warn!(error = %e, "Voice transport failed to open");
            link.error = Some(e.kind().to_string());
        }
        self.link = Some(link);
    }

    /// Stop the microphone, hang up and close the voice transport
    fn deactivate(&mut self) {
        let Some(link) = self.link.take() else {
            return;
        };
        info!("Stopping voice link to {}", link.opponent_voice);

        if let Microphone::Ready(stream) = &link.microphone {
            stream.stop();
        }
        if let Some(call) = link.call {
            self.media.hang_up(call.id);
        }
        self.media.close();
    }

    fn handle_device_event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Granted { ticket, stream } => match self.link.as_mut() {
                Some(link)
                    if link.ticket == ticket
                        && matches!(link.microphone, Microphone::Pending) =>
                {
                    stream.set_audio_enabled(!link.muted);
                    debug!(muted = link.muted, "Microphone granted");
                    link.microphone = Microphone::Ready(stream);
                }
                _ => {
                    debug!(?ticket, "Releasing stale microphone grant");
                    stream.stop();
                }
            },
            DeviceEvent::Failed { ticket, error } => match self.link.as_mut() {
                Some(link) if link.ticket == ticket => {
                    warn!(error = %error, "Microphone unavailable");
                    link.microphone = Microphone::Failed(error);
                }
                _ => debug!(?ticket, "Ignoring stale microphone failure"),
            },
        }
    }

    fn handle_media_event(&mut self, event: MediaEvent) {
        let Some(link) = self.link.as_mut() else {
            if let MediaEvent::IncomingCall { call, .. } = event {
                self.media.hang_up(call);
            }
            return;
        };

        match event {
            MediaEvent::Open { local } => {
                if local == link.my_voice {
                    debug!("Voice transport open as {}", local);
                    link.media_open = true;
                }
            }
            MediaEvent::IncomingCall { call, from } => {
                if from != link.opponent_voice {
                    warn!("Rejecting call from {}", from);
                    self.media.hang_up(call);
                    return;
                }

                match &link.call {
                    None => {
                        link.call = Some(ActiveCall {
                            id: call,
                            direction: Direction::Inbound { answered: false },
                        });
                    }
                    // Both sides dialed at once: the call placed by the
                    // smaller voice identity survives on both ends
                    Some(ActiveCall {
                        id: own,
                        direction: Direction::Outbound,
                    }) if link.remote_stream.is_none() && link.opponent_voice < link.my_voice => {
                        debug!("Call glare, yielding to {}", from);
                        self.media.hang_up(*own);
                        link.call = Some(ActiveCall {
                            id: call,
                            direction: Direction::Inbound { answered: false },
                        });
                    }
                    Some(_) => {
                        debug!("Already in a call, rejecting {}", call);
                        self.media.hang_up(call);
                    }
                }
            }
            MediaEvent::RemoteStream { call, stream } => {
                if link.call.as_ref().map(|c| c.id) == Some(call) {
                    info!("Voice connected with {}", link.opponent_voice);
                    link.remote_stream = Some(stream);
                }
            }
            MediaEvent::CallClosed { call } => {
                if link.call.as_ref().map(|c| c.id) == Some(call) {
                    info!("Voice call closed");
                    link.call = None;
                    link.remote_stream = None;
                    link.outbound_attempted = false;
                }
            }
            MediaEvent::Error(TransportError::PeerUnavailable(_)) => {
                // Opponent not reachable yet; its own outbound call will reach us
                debug!("Opponent voice endpoint not registered yet");
            }
            MediaEvent::Error(e) => {
                warn!(error = %e, "Voice transport error");
                link.error = Some(e.kind().to_string());
            }
        }
    }

    /// Place or answer the call once its preconditions hold
    fn advance(&mut self) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        if !link.microphone.is_settled() || link.error.is_some() {
            return;
        }

        let unanswered = match &link.call {
            Some(ActiveCall {
                id,
                direction: Direction::Inbound { answered: false },
            }) => Some(*id),
            _ => None,
        };

        if let Some(id) = unanswered {
            if let Some(call) = link.call.as_mut() {
                call.direction = Direction::Inbound { answered: true };
            }
            if let Err(e) = self.media.answer(id, link.microphone.stream()) {
                warn!(error = %e, "Cannot answer voice call");
                link.call = None;
            }
            return;
        }

        if link.call.is_some() || !link.media_open || link.outbound_attempted {
            return;
        }

        link.outbound_attempted = true;
        match self.media.call(&link.opponent_voice, link.microphone.stream()) {
            Ok(call) => {
                debug!("Calling {} ({})", link.opponent_voice, call);
                link.call = Some(ActiveCall {
                    id: call,
                    direction: Direction::Outbound,
                });
            }
            Err(TransportError::PeerUnavailable(_)) => {
                debug!("{} not reachable yet, waiting for its call", link.opponent_voice);
            }
            Err(e) => {
                warn!(error = %e, "Voice call failed");
                link.error = Some(e.kind().to_string());
            }
        }
    }
}

impl<M: MediaTransport, D: MediaDevices> Drop for VoiceManager<M, D> {
    fn drop(&mut self) {
        self.deactivate();
    }
}
