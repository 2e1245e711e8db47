use crate::application::message_bus::{MessageBus, MessageInbox, SubscriptionId};
use crate::application::{SessionConfig, TransportEvent};
use crate::infrastructure::error::{SessionError, TransportError};
use crate::infrastructure::message::Frame;
use crate::infrastructure::transport::DataTransport;
use pairplay_core::{
    GameMessage, PeerIdentity, PlayerInfo, PlayerStatus, Role, Roster, RosterEntry, SessionMode,
    SessionState,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Point-in-time view of a session, cheap to compare between polls
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub local_id: PeerIdentity,
    pub role: Option<Role>,
    pub mode: SessionMode,
    pub remote_id: Option<PeerIdentity>,
    pub players: Vec<RosterEntry>,
}

/// Owns one two-party session: connection lifecycle, roles, roster and the
/// lobby/game state machine
///
/// Poll-driven: call [`SessionManager::poll`] regularly. Public operations
/// never fail; problems surface through [`SessionManager::last_error`] and
/// the observable state.
#[derive(Debug)]
pub struct SessionManager<T: DataTransport> {
    transport: T,
    config: SessionConfig,
    state: SessionState,
    roster: Roster,
    bus: MessageBus,
    /// Host identity a guest dials
    target: Option<PeerIdentity>,
    /// Last self-info sent over the current connection
    last_sent_info: Option<(PlayerInfo, PlayerStatus)>,
    last_error: Option<SessionError>,
}

impl<T: DataTransport> SessionManager<T> {
    /// Create a session with a freshly generated identity
    pub fn new(transport: T, config: SessionConfig) -> Self {
        let identity = PeerIdentity::generate(&config.identity_prefix);
        Self::with_identity(transport, config, identity)
    }

    pub fn with_identity(transport: T, config: SessionConfig, identity: PeerIdentity) -> Self {
        let bus = MessageBus::new(config.max_pending_messages);
        Self {
            transport,
            state: SessionState::new(identity.clone()),
            roster: Roster::new(identity, PlayerInfo::default()),
            bus,
            config,
            target: None,
            last_sent_info: None,
            last_error: None,
        }
    }

    // ===== Operations =====

    /// Begin establishing a session: `None` hosts, `Some(host)` joins
    ///
    /// Ignored unless idle.
    pub fn connect(&mut self, target: Option<PeerIdentity>) {
        if self.state.mode() != SessionMode::Idle {
            debug!(mode = %self.state.mode(), "connect ignored, session already active");
            return;
        }

        if target.as_ref() == Some(self.state.local()) {
            warn!("Refusing to join own identity {}", self.state.local());
            self.last_error = Some(SessionError::SelfJoin);
            return;
        }

        let role = if target.is_some() {
            Role::Guest
        } else {
            Role::Host
        };
        if let Err(e) = self.state.begin_connecting(role) {
            warn!(error = %e, "Cannot start connecting");
            return;
        }

        self.last_error = None;
        self.target = target;
        self.last_sent_info = None;
        self.bus.reset_sequences();
        self.roster.set_local_status(PlayerStatus::Connecting);

        match &self.target {
            Some(host) => info!("Joining {} as {}", host, self.state.local()),
            None => info!("Hosting as {}", self.state.local()),
        }

        let local = self.state.local().clone();
        if let Err(e) = self.transport.open(&local) {
            self.fail(e);
        }
    }

    pub fn host(&mut self) {
        self.connect(None);
    }

    pub fn join(&mut self, host: PeerIdentity) {
        self.connect(Some(host));
    }

    /// Join using a code typed by a user; an invalid code is recorded as
    /// `last_error` and the session stays idle
    pub fn join_code(&mut self, code: &str) {
        match PeerIdentity::parse(code) {
            Ok(host) => self.join(host),
            Err(e) => {
                warn!(error = %e, "Invalid session code");
                self.last_error = Some(SessionError::Identity(e));
            }
        }
    }

    /// Tear everything down and return to idle. Safe from any state.
    pub fn disconnect(&mut self) {
        if let Some(remote) = self.state.remote().cloned() {
            self.transport.close_connection(&remote);
        }
        self.transport.close();

        if self.state.is_active() {
            info!("Disconnected from session");
        }
        self.reset_to_idle();
    }

    /// Update the local roster entry and broadcast it if a channel is open
    pub fn update_self_info(&mut self, info: PlayerInfo) {
        if self.roster.apply_local_info(info.normalized()) {
            debug!(name = self.roster.local().display_name(), "Self info updated");
        }
        self.broadcast_self_info();
    }

    /// Send a game message to the opponent; dropped when no channel is open
    pub fn send_data(&mut self, message: GameMessage) {
        if self.open_remote().is_none() {
            debug!(kind = message.kind(), "No open channel, dropping message");
            return;
        }

        let seq = self.bus.next_sequence();
        debug!(kind = message.kind(), seq, "Sending message");
        self.send_frame(&Frame::app(seq, message));
    }

    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&GameMessage) + Send + 'static,
    {
        self.bus.subscribe(handler)
    }

    /// Subscribe with a queue instead of a callback
    pub fn subscribe_inbox(&mut self) -> (SubscriptionId, MessageInbox) {
        let inbox = MessageInbox::new();
        let sink = inbox.clone();
        let id = self.bus.subscribe(move |message| sink.push(message.clone()));
        (id, inbox)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Signal readiness to start the match
    pub fn mark_ready(&mut self) {
        if self.state.mode() != SessionMode::Lobby || self.open_remote().is_none() {
            debug!(mode = %self.state.mode(), "mark_ready ignored");
            return;
        }

        self.roster.set_local_status(PlayerStatus::Ready);
        self.send_frame(&Frame::Ready);
        self.broadcast_self_info();
    }

    /// Host only: start the match with the connected guest
    pub fn start_game(&mut self) {
        if !self.is_host() {
            warn!("Only the host can start the game");
            return;
        }

        if let Err(e) = self.state.enter_game() {
            warn!(error = %e, "Cannot start game");
            return;
        }

        info!("Game started");
        self.send_frame(&Frame::StartGame);
    }

    /// Leave the running match and return to the lobby
    pub fn leave_match(&mut self) {
        if self.state.mode() != SessionMode::InGame {
            debug!(mode = %self.state.mode(), "leave_match ignored");
            return;
        }

        self.send_data(GameMessage::leave_game());
        self.return_to_lobby();
    }

    /// Ask game modules on both sides to start over with the same roles
    pub fn request_rematch(&mut self) {
        if self.state.mode() != SessionMode::InGame {
            debug!(mode = %self.state.mode(), "request_rematch ignored");
            return;
        }

        info!("Rematch requested");
        self.send_data(GameMessage::rematch_start());
    }

    pub fn send_chat(&mut self, text: impl Into<String>) {
        let sender = self.roster.local().display_name().to_string();
        self.send_data(GameMessage::chat(text, sender));
    }

    pub fn send_reaction(&mut self, id: impl Into<String>) {
        self.send_data(GameMessage::reaction(id.into()));
    }

    /// Disconnect and continue under a newly generated identity
    pub fn reset_identity(&mut self) {
        self.disconnect();
        let identity = PeerIdentity::generate(&self.config.identity_prefix);
        info!("New identity {}", identity);
        self.state.reset_with_identity(identity.clone());
        self.roster.reset_local(identity);
    }

    /// Process pending transport events. Returns the number handled.
    pub fn poll(&mut self) -> usize {
        let events = self.transport.poll_events();
        let count = events.len();

        for event in events {
            self.handle_event(event);
        }

        count
    }

    // ===== Observable state =====

    pub fn mode(&self) -> SessionMode {
        self.state.mode()
    }

    /// Roster, self first
    pub fn players(&self) -> Vec<RosterEntry> {
        self.roster.players()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn peer_id(&self) -> &PeerIdentity {
        self.state.local()
    }

    pub fn role(&self) -> Option<Role> {
        self.state.role()
    }

    pub fn is_host(&self) -> bool {
        self.state.is_host()
    }

    /// Player one is always the host
    pub fn am_i_p1(&self) -> bool {
        self.is_host()
    }

    pub fn remote_id(&self) -> Option<&PeerIdentity> {
        self.state.remote()
    }

    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            local_id: self.state.local().clone(),
            role: self.state.role(),
            mode: self.state.mode(),
            remote_id: self.state.remote().cloned(),
            players: self.roster.players(),
        }
    }

    // ===== Event handling =====

    fn handle_event(&mut self, event: TransportEvent) {
        if self.state.mode() == SessionMode::Idle {
            debug!(?event, "Ignoring transport event while idle");
            return;
        }

        match event {
            TransportEvent::Open { local } => self.handle_open(local),
            TransportEvent::Error(e) => self.fail(e),
            TransportEvent::ConnectionOpened(peer) => self.handle_connection_opened(peer),
            TransportEvent::ConnectionClosed(peer) => {
                if self.state.remote() == Some(&peer) {
                    self.handle_departure();
                } else {
                    debug!("Ignoring close of unpaired connection {}", peer);
                }
            }
            TransportEvent::Data { from, payload } => self.handle_data(from, &payload),
        }
    }

    fn handle_open(&mut self, local: PeerIdentity) {
        if self.state.mode() != SessionMode::Connecting || &local != self.state.local() {
            debug!("Ignoring stale open for {}", local);
            return;
        }

        match self.state.role() {
            Some(Role::Host) => {
                if let Err(e) = self.state.enter_lobby() {
                    warn!(error = %e, "Cannot open lobby");
                    return;
                }
                self.roster.set_local_status(PlayerStatus::Hosting);
                info!("Lobby open, waiting for a guest on {}", local);
            }
            Some(Role::Guest) => {
                let Some(host) = self.target.clone() else {
                    return;
                };
                debug!("Registered, dialing {}", host);
                if let Err(e) = self.transport.connect(&host) {
                    self.fail(e);
                }
            }
            None => {}
        }
    }

    fn handle_connection_opened(&mut self, peer: PeerIdentity) {
        let accept = match self.state.role() {
            Some(Role::Host) => {
                self.state.mode() == SessionMode::Lobby && self.state.remote().is_none()
            }
            Some(Role::Guest) => {
                self.state.mode() == SessionMode::Connecting
                    && self.target.as_ref() == Some(&peer)
            }
            None => false,
        };

        if !accept {
            if self.state.remote() == Some(&peer) {
                return;
            }
            warn!("Rejecting connection from {}, session is full", peer);
            self.transport.close_connection(&peer);
            return;
        }

        if let Err(e) = self.state.attach_remote(peer.clone()) {
            warn!(error = %e, "Cannot attach {}", peer);
            self.transport.close_connection(&peer);
            return;
        }

        self.bus.reset_sequences();
        self.last_sent_info = None;

        if self.state.role() == Some(Role::Guest) {
            if let Err(e) = self.state.enter_lobby() {
                warn!(error = %e, "Cannot enter lobby");
                return;
            }
            self.roster.set_local_status(PlayerStatus::Joined);
        }

        info!("Data channel open with {}", peer);
        self.broadcast_self_info();
    }

    fn handle_data(&mut self, from: PeerIdentity, payload: &[u8]) {
        if self.open_remote() != Some(&from) {
            warn!("Dropping data from unpaired peer {}", from);
            return;
        }

        let frame = match Frame::decode(payload) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable frame from {}", from);
                return;
            }
        };

        match frame {
            Frame::SelfInfo { info, status } => {
                debug!(name = %info.display_name, %status, "Remote self info");
                self.roster.upsert_remote(from, info.normalized(), status);
            }
            Frame::Ready => {
                debug!("{} is ready", from);
                if self.roster.remote().is_none() {
                    self.roster
                        .upsert_remote(from, PlayerInfo::default(), PlayerStatus::Ready);
                } else {
                    self.roster.set_remote_status(PlayerStatus::Ready);
                }
                if self.is_host() && self.config.auto_start && self.mode() == SessionMode::Lobby {
                    self.start_game();
                }
            }
            Frame::StartGame => {
                if self.is_host() {
                    warn!("Ignoring start request sent to the host");
                } else if let Err(e) = self.state.enter_game() {
                    warn!(error = %e, "Cannot enter game");
                } else {
                    info!("Game started by host");
                }
            }
            Frame::App { seq, message } => match self.bus.accept(seq, message) {
                Ok(ready) => {
                    for message in ready {
                        self.deliver(message);
                    }
                }
                Err(e) => {
                    error!(error = %e, "Dropping connection to {}", from);
                    self.transport.close_connection(&from);
                    self.handle_departure();
                    self.last_error = Some(SessionError::Transport(e));
                }
            },
        }
    }

    fn deliver(&mut self, message: GameMessage) {
        debug!(kind = message.kind(), "Received message");
        self.bus.dispatch(&message);

        if message.is(pairplay_core::reserved::LEAVE_GAME)
            && self.state.mode() == SessionMode::InGame
        {
            info!("Opponent left the match");
            self.return_to_lobby();
        }
    }

    /// Remote went away: report it to game modules, then forget it
    fn handle_departure(&mut self) {
        let Some(remote) = self.state.remote().cloned() else {
            return;
        };
        info!("Peer {} left the session", remote);

        if self.state.mode() == SessionMode::InGame {
            self.bus.dispatch(&GameMessage::leave_game());
        }

        self.roster.remove_remote();
        self.state.detach_remote();
        self.transport.close_connection(&remote);
        self.bus.reset_sequences();
        self.last_sent_info = None;

        match self.state.role() {
            Some(Role::Host) => {
                self.roster.set_local_status(PlayerStatus::Hosting);
                info!("Back in the lobby, waiting for a new guest");
            }
            _ => {
                self.transport.close();
                self.reset_to_idle();
            }
        }
    }

    fn fail(&mut self, e: TransportError) {
        error!(error = %e, "Session transport failed");

        if self.state.remote().is_some() {
            self.handle_departure();
        }

        self.transport.close();
        self.reset_to_idle();
        self.last_error = Some(SessionError::Transport(e));
    }

    // ===== Helpers =====

    /// Remote identity while a data channel is usable
    fn open_remote(&self) -> Option<&PeerIdentity> {
        match self.state.mode() {
            SessionMode::Lobby | SessionMode::InGame => self.state.remote(),
            _ => None,
        }
    }

    fn return_to_lobby(&mut self) {
        if let Err(e) = self.state.enter_lobby() {
            warn!(error = %e, "Cannot return to lobby");
            return;
        }

        let status = match self.state.role() {
            Some(Role::Host) => PlayerStatus::Hosting,
            _ => PlayerStatus::Joined,
        };
        self.roster.set_local_status(status);
        self.broadcast_self_info();
    }

    /// Send self-info if a channel is open and it changed since the last send
    fn broadcast_self_info(&mut self) {
        if self.open_remote().is_none() {
            return;
        }

        let local = self.roster.local();
        let current = (local.info().clone(), local.status());
        if self.last_sent_info.as_ref() == Some(&current) {
            return;
        }

        let frame = Frame::SelfInfo {
            info: current.0.clone(),
            status: current.1,
        };
        if self.send_frame(&frame) {
            self.last_sent_info = Some(current);
        }
    }

    fn send_frame(&mut self, frame: &Frame) -> bool {
        let Some(remote) = self.open_remote().cloned() else {
            return false;
        };

        let bytes = match frame.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Cannot encode frame");
                return false;
            }
        };

        match self.transport.send(&remote, bytes) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Send to {} failed", remote);
                false
            }
        }
    }

    fn reset_to_idle(&mut self) {
        self.state.reset();
        self.roster.remove_remote();
        self.roster.set_local_status(PlayerStatus::Connecting);
        self.target = None;
        self.last_sent_info = None;
        self.bus.reset_sequences();
    }
}
