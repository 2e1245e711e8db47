use crate::application::{SessionConfig, TransportEvent};
use crate::domain::IceServer;
use crate::infrastructure::error::{Result, TransportError};
use crate::infrastructure::transport::DataTransport;
use futures::channel::oneshot;
use instant::{Duration, Instant};
use matchbox_socket::{
    ChannelConfig, PeerState, RtcIceServerConfig, WebRtcSocket, WebRtcSocketBuilder,
};
use pairplay_core::PeerIdentity;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::future::Future;
use tracing::Instrument;

const HELLO_TAG: u8 = 0;
const DATA_TAG: u8 = 1;

type ProviderPeer = matchbox_socket::PeerId;
type LoopResult = std::result::Result<(), String>;

/// Packet exchanged on the matchbox channel
#[derive(Debug, PartialEq)]
enum Packet<'a> {
    /// Announces the sender's identity, first thing after the peer connects
    Hello(PeerIdentity),
    Data(&'a [u8]),
}

impl<'a> Packet<'a> {
    fn decode(bytes: &'a [u8]) -> Option<Self> {
        let (tag, body) = bytes.split_first()?;
        match *tag {
            HELLO_TAG => {
                let text = std::str::from_utf8(body).ok()?;
                PeerIdentity::parse(text).ok().map(Packet::Hello)
            }
            DATA_TAG => Some(Packet::Data(body)),
            _ => None,
        }
    }
}

fn hello_packet(identity: &PeerIdentity) -> Box<[u8]> {
    let mut bytes = Vec::with_capacity(identity.as_str().len() + 1);
    bytes.push(HELLO_TAG);
    bytes.extend_from_slice(identity.as_str().as_bytes());
    bytes.into_boxed_slice()
}

fn data_packet(payload: &[u8]) -> Box<[u8]> {
    let mut bytes = Vec::with_capacity(payload.len() + 1);
    bytes.push(DATA_TAG);
    bytes.extend_from_slice(payload);
    bytes.into_boxed_slice()
}

/// One matchbox socket joined to the room named after `room`
struct RoomSocket {
    room: PeerIdentity,
    socket: WebRtcSocket,
    loop_done: oneshot::Receiver<LoopResult>,
    peers: HashMap<ProviderPeer, Option<PeerIdentity>>,
    started_at: Instant,
    /// Provider peer behind `room` once its hello arrived (dialing side)
    remote: Option<ProviderPeer>,
}

impl RoomSocket {
    fn send(&mut self, peer: ProviderPeer, packet: Box<[u8]>) {
        self.socket.channel_mut(0).send(packet, peer);
    }

    /// `Some` once the provider loop has stopped
    fn loop_result(&mut self) -> Option<LoopResult> {
        match self.loop_done.try_recv() {
            Ok(Some(result)) => Some(result),
            Ok(None) => None,
            Err(_) => Some(Err("message loop dropped".to_string())),
        }
    }
}

/// Infrastructure adapter: data transport over Matchbox signalling + WebRTC
///
/// `open` joins the room named after the local identity and waits there for
/// guests. `connect` joins the room named after the remote identity. Peers
/// greet each other with a hello packet carrying their identity, which maps
/// provider peer ids onto [`PeerIdentity`].
pub struct MatchboxTransport {
    signalling_server: String,
    ice_servers: Vec<IceServer>,
    connect_timeout: Duration,
    local: Option<PeerIdentity>,
    listener: Option<RoomSocket>,
    open_reported: bool,
    /// Identities greeted on the listener socket
    inbound: HashMap<PeerIdentity, ProviderPeer>,
    /// Inbound identities closed locally; the provider cannot drop one peer
    rejected: HashSet<PeerIdentity>,
    dialers: HashMap<PeerIdentity, RoomSocket>,
    events: VecDeque<TransportEvent>,
}

impl fmt::Debug for MatchboxTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchboxTransport")
            .field("signalling_server", &self.signalling_server)
            .field("local", &self.local)
            .field("listening", &self.listener.is_some())
            .field("inbound", &self.inbound.keys().collect::<Vec<_>>())
            .field("dialing", &self.dialers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MatchboxTransport {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            signalling_server: config.signalling_server.clone(),
            ice_servers: config.ice_servers.clone(),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            local: None,
            listener: None,
            open_reported: false,
            inbound: HashMap::new(),
            rejected: HashSet::new(),
            dialers: HashMap::new(),
            events: VecDeque::new(),
        }
    }

    /// Room URL on the signalling server for an identity
    pub fn room_url(&self, room: &PeerIdentity) -> String {
        format!("{}/{}", self.signalling_server.trim_end_matches('/'), room)
    }

    fn join_room(&self, room: &PeerIdentity) -> RoomSocket {
        let url = self.room_url(room);
        tracing::info!("Joining signalling room: {}", url);

        let (socket, loop_fut) = WebRtcSocketBuilder::new(url)
            .ice_server(build_ice_server_config(&self.ice_servers))
            .add_channel(ChannelConfig::reliable())
            .build();

        let (done_tx, done_rx) = oneshot::channel();
        let matchbox_span = tracing::info_span!("matchbox::webrtc_loop", room = %room);

        spawn_loop(
            async move {
                let result = loop_fut.await.map_err(|e| e.to_string());
                if let Err(e) = &result {
                    tracing::error!("Matchbox message loop failed: {}", e);
                }
                let _ = done_tx.send(result);
            }
            .instrument(matchbox_span),
        );

        RoomSocket {
            room: room.clone(),
            socket,
            loop_done: done_rx,
            peers: HashMap::new(),
            started_at: Instant::now(),
            remote: None,
        }
    }

    fn poll_listener(&mut self) {
        let Some(local) = self.local.clone() else {
            return;
        };
        let Some(listener) = self.listener.as_mut() else {
            return;
        };

        for (peer, state) in listener.socket.update_peers() {
            match state {
                PeerState::Connected => {
                    tracing::debug!("Provider peer {:?} joined room {}", peer, listener.room);
                    listener.peers.insert(peer, None);
                    listener.send(peer, hello_packet(&local));
                }
                PeerState::Disconnected => {
                    if let Some(Some(identity)) = listener.peers.remove(&peer) {
                        if self.inbound.get(&identity) == Some(&peer) {
                            self.inbound.remove(&identity);
                            tracing::info!("Peer disconnected: {}", identity);
                            self.events
                                .push_back(TransportEvent::ConnectionClosed(identity));
                        } else {
                            self.rejected.remove(&identity);
                        }
                    }
                }
            }
        }

        if !self.open_reported && listener.socket.id().is_some() {
            self.open_reported = true;
            tracing::info!("Registered as {}", local);
            self.events.push_back(TransportEvent::Open {
                local: local.clone(),
            });
        }

        for (peer, packet) in listener.socket.channel_mut(0).receive() {
            match Packet::decode(&packet) {
                Some(Packet::Hello(identity)) if identity == local => {
                    tracing::error!("Another client is registered as {}", local);
                    self.events
                        .push_back(TransportEvent::Error(TransportError::IdentityTaken(
                            local.to_string(),
                        )));
                }
                Some(Packet::Hello(identity)) if self.rejected.contains(&identity) => {
                    tracing::debug!("Ignoring hello from closed peer {}", identity);
                    listener.peers.insert(peer, Some(identity));
                }
                Some(Packet::Hello(identity)) => {
                    listener.peers.insert(peer, Some(identity.clone()));
                    self.inbound.insert(identity.clone(), peer);
                    tracing::info!("Peer connected: {}", identity);
                    self.events
                        .push_back(TransportEvent::ConnectionOpened(identity));
                }
                Some(Packet::Data(payload)) => {
                    match listener.peers.get(&peer) {
                        Some(Some(identity)) if self.inbound.get(identity) == Some(&peer) => {
                            tracing::debug!("Received {} bytes from {}", payload.len(), identity);
                            self.events.push_back(TransportEvent::Data {
                                from: identity.clone(),
                                payload: payload.to_vec(),
                            });
                        }
                        _ => tracing::warn!("Dropping data from unannounced peer {:?}", peer),
                    }
                }
                None => tracing::warn!("Dropping malformed packet from {:?}", peer),
            }
        }

        if let Some(result) = listener.loop_result() {
            let error = match result {
                Ok(()) => TransportError::Disconnected,
                Err(e) => TransportError::Network(e),
            };
            tracing::error!("Signalling connection lost: {}", error);
            self.listener = None;
            self.events.push_back(TransportEvent::Error(error));
        }
    }

    fn poll_dialers(&mut self) {
        let Some(local) = self.local.clone() else {
            return;
        };

        let mut finished = Vec::new();
        for (remote, dialer) in self.dialers.iter_mut() {
            if let Some(done) = poll_dialer(&local, remote, dialer, self.connect_timeout) {
                self.events.extend(done.events);
                if done.finished {
                    finished.push(remote.clone());
                }
            }
        }

        // Dropping a socket leaves its room
        for remote in finished {
            self.dialers.remove(&remote);
        }
    }
}

struct DialOutcome {
    events: Vec<TransportEvent>,
    finished: bool,
}

fn poll_dialer(
    local: &PeerIdentity,
    remote: &PeerIdentity,
    dialer: &mut RoomSocket,
    timeout: Duration,
) -> Option<DialOutcome> {
    let mut events = Vec::new();

    for (peer, state) in dialer.socket.update_peers() {
        match state {
            PeerState::Connected => {
                dialer.peers.insert(peer, None);
                dialer.send(peer, hello_packet(local));
            }
            PeerState::Disconnected => {
                dialer.peers.remove(&peer);
                if dialer.remote == Some(peer) {
                    tracing::info!("Peer disconnected: {}", remote);
                    events.push(TransportEvent::ConnectionClosed(remote.clone()));
                    return Some(DialOutcome {
                        events,
                        finished: true,
                    });
                }
            }
        }
    }

    for (peer, packet) in dialer.socket.channel_mut(0).receive() {
        match Packet::decode(&packet) {
            Some(Packet::Hello(identity)) if &identity == remote => {
                dialer.peers.insert(peer, Some(identity));
                if dialer.remote.is_none() {
                    dialer.remote = Some(peer);
                    tracing::info!("Connected to {}", remote);
                    events.push(TransportEvent::ConnectionOpened(remote.clone()));
                }
            }
            Some(Packet::Hello(other)) => {
                // Another guest dialing the same room
                tracing::debug!("Ignoring {} in room {}", other, remote);
                dialer.peers.insert(peer, Some(other));
            }
            Some(Packet::Data(payload)) if dialer.remote == Some(peer) => {
                tracing::debug!("Received {} bytes from {}", payload.len(), remote);
                events.push(TransportEvent::Data {
                    from: remote.clone(),
                    payload: payload.to_vec(),
                });
            }
            Some(Packet::Data(_)) => {
                tracing::warn!("Dropping data from {:?} in room {}", peer, remote);
            }
            None => tracing::warn!("Dropping malformed packet from {:?}", peer),
        }
    }

    if let Some(result) = dialer.loop_result() {
        let event = if dialer.remote.is_some() {
            TransportEvent::ConnectionClosed(remote.clone())
        } else {
            TransportEvent::Error(match result {
                Ok(()) => TransportError::PeerUnavailable(remote.to_string()),
                Err(e) => TransportError::Network(e),
            })
        };
        events.push(event);
        return Some(DialOutcome {
            events,
            finished: true,
        });
    }

    if dialer.remote.is_none() && dialer.started_at.elapsed() > timeout {
        tracing::warn!("No answer from {} after {:?}", remote, timeout);
        events.push(TransportEvent::Error(TransportError::PeerUnavailable(
            remote.to_string(),
        )));
        return Some(DialOutcome {
            events,
            finished: true,
        });
    }

    if events.is_empty() {
        None
    } else {
        Some(DialOutcome {
            events,
            finished: false,
        })
    }
}

impl DataTransport for MatchboxTransport {
    fn open(&mut self, local: &PeerIdentity) -> Result<()> {
        self.close();

        tracing::info!("Configured with {} ICE servers", self.ice_servers.len());
        self.listener = Some(self.join_room(local));
        self.local = Some(local.clone());
        Ok(())
    }

    fn connect(&mut self, remote: &PeerIdentity) -> Result<()> {
        if self.local.is_none() {
            return Err(TransportError::NotOpen);
        }
        if !self.dialers.contains_key(remote) {
            let dialer = self.join_room(remote);
            self.dialers.insert(remote.clone(), dialer);
        }
        Ok(())
    }

    fn send(&mut self, remote: &PeerIdentity, payload: Vec<u8>) -> Result<()> {
        if self.local.is_none() {
            return Err(TransportError::NotOpen);
        }

        if let Some(dialer) = self.dialers.get_mut(remote) {
            if let Some(peer) = dialer.remote {
                dialer.send(peer, data_packet(&payload));
                tracing::debug!("Sent {} bytes to {}", payload.len(), remote);
                return Ok(());
            }
        }

        match (self.inbound.get(remote), self.listener.as_mut()) {
            (Some(peer), Some(listener)) => {
                listener.send(*peer, data_packet(&payload));
                tracing::debug!("Sent {} bytes to {}", payload.len(), remote);
                Ok(())
            }
            _ => Err(TransportError::NotConnected(remote.to_string())),
        }
    }

    fn close_connection(&mut self, remote: &PeerIdentity) {
        self.dialers.remove(remote);
        if self.inbound.remove(remote).is_some() {
            self.rejected.insert(remote.clone());
        }
    }

    fn close(&mut self) {
        self.listener = None;
        self.dialers.clear();
        self.inbound.clear();
        self.rejected.clear();
        self.events.clear();
        self.open_reported = false;
        self.local = None;
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        self.poll_listener();
        self.poll_dialers();
        self.events.drain(..).collect()
    }
}

impl Drop for MatchboxTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Merge configured servers into the single entry Matchbox accepts
fn build_ice_server_config(ice_servers: &[IceServer]) -> RtcIceServerConfig {
    if ice_servers.is_empty() {
        return RtcIceServerConfig::default();
    }

    let auth = ice_servers.iter().find(|server| server.username.is_some());

    RtcIceServerConfig {
        urls: ice_servers
            .iter()
            .flat_map(|server| server.urls.iter().cloned())
            .collect(),
        username: auth.and_then(|server| server.username.clone()),
        credential: auth.and_then(|server| server.credential.clone()),
    }
}

#[cfg(target_arch = "wasm32")]
fn spawn_loop<F>(fut: F)
where
    F: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(fut);
}

#[cfg(all(not(target_arch = "wasm32"), feature = "native"))]
fn spawn_loop<F>(fut: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(fut);
}

#[cfg(all(not(target_arch = "wasm32"), not(feature = "native")))]
compile_error!("Non-WASM builds require the 'native' feature to be enabled");
