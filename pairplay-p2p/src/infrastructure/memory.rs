//! In-process connection provider.
//!
//! Every endpoint created from one [`MemoryNetwork`] shares the same
//! registry, so two sessions in the same process (tests, hot-seat play) can
//! find and talk to each other without signalling. Delivery is reliable and
//! ordered; events wait in per-endpoint queues until polled.

use crate::application::{CallId, DeviceEvent, MediaEvent, MicrophoneTicket, TransportEvent};
use crate::infrastructure::error::{MediaError, Result, TransportError};
use crate::infrastructure::transport::{DataTransport, MediaDevices, MediaTransport};
use pairplay_core::{MediaStream, PeerIdentity};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type EndpointId = u64;

#[derive(Debug)]
struct CallRecord {
    caller: PeerIdentity,
    callee: PeerIdentity,
    offer: Option<MediaStream>,
    answered: bool,
}

impl CallRecord {
    fn other_party(&self, me: &PeerIdentity) -> &PeerIdentity {
        if &self.caller == me {
            &self.callee
        } else {
            &self.caller
        }
    }
}

#[derive(Debug, Default)]
struct NetworkState {
    next_endpoint: EndpointId,
    next_call: u64,

    data: HashMap<PeerIdentity, EndpointId>,
    data_queues: HashMap<EndpointId, VecDeque<TransportEvent>>,
    links: HashSet<(PeerIdentity, PeerIdentity)>,

    media: HashMap<PeerIdentity, EndpointId>,
    media_queues: HashMap<EndpointId, VecDeque<MediaEvent>>,
    calls: HashMap<CallId, CallRecord>,
}

fn link_key(a: &PeerIdentity, b: &PeerIdentity) -> (PeerIdentity, PeerIdentity) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

impl NetworkState {
    fn allocate_endpoint(&mut self) -> EndpointId {
        self.next_endpoint += 1;
        self.next_endpoint
    }

    fn push_data(&mut self, endpoint: EndpointId, event: TransportEvent) {
        if let Some(queue) = self.data_queues.get_mut(&endpoint) {
            queue.push_back(event);
        }
    }

    fn push_data_to(&mut self, id: &PeerIdentity, event: TransportEvent) {
        if let Some(endpoint) = self.data.get(id).copied() {
            self.push_data(endpoint, event);
        }
    }

    fn push_media(&mut self, endpoint: EndpointId, event: MediaEvent) {
        if let Some(queue) = self.media_queues.get_mut(&endpoint) {
            queue.push_back(event);
        }
    }

    fn push_media_to(&mut self, id: &PeerIdentity, event: MediaEvent) {
        if let Some(endpoint) = self.media.get(id).copied() {
            self.push_media(endpoint, event);
        }
    }

    fn is_linked(&self, a: &PeerIdentity, b: &PeerIdentity) -> bool {
        self.links.contains(&link_key(a, b))
    }

    fn linked_peers(&self, id: &PeerIdentity) -> Vec<PeerIdentity> {
        self.links
            .iter()
            .filter_map(|(a, b)| {
                if a == id {
                    Some(b.clone())
                } else if b == id {
                    Some(a.clone())
                } else {
                    None
                }
            })
            .collect()
    }
}

/// Shared in-process network
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    inner: Arc<Mutex<NetworkState>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, NetworkState>> {
        self.inner.lock().map_err(|_| TransportError::ChannelClosed)
    }

    /// New data endpoint on this network
    pub fn transport(&self) -> MemoryTransport {
        let endpoint = match self.state() {
            Ok(mut state) => {
                let endpoint = state.allocate_endpoint();
                state.data_queues.insert(endpoint, VecDeque::new());
                endpoint
            }
            Err(_) => 0,
        };

        MemoryTransport {
            network: self.clone(),
            endpoint,
            local: None,
        }
    }

    /// New media endpoint on this network
    pub fn media(&self) -> MemoryMedia {
        let endpoint = match self.state() {
            Ok(mut state) => {
                let endpoint = state.allocate_endpoint();
                state.media_queues.insert(endpoint, VecDeque::new());
                endpoint
            }
            Err(_) => 0,
        };

        MemoryMedia {
            network: self.clone(),
            endpoint,
            local: None,
        }
    }

    pub fn is_registered(&self, id: &PeerIdentity) -> bool {
        self.state()
            .map(|state| state.data.contains_key(id) || state.media.contains_key(id))
            .unwrap_or(false)
    }

    pub fn is_linked(&self, a: &PeerIdentity, b: &PeerIdentity) -> bool {
        self.state()
            .map(|state| state.is_linked(a, b))
            .unwrap_or(false)
    }

    pub fn active_calls(&self) -> usize {
        self.state().map(|state| state.calls.len()).unwrap_or(0)
    }

    /// Drop every data connection of `id` as if the channel failed; both
    /// sides observe `ConnectionClosed`
    pub fn sever(&self, id: &PeerIdentity) {
        let Ok(mut state) = self.state() else {
            return;
        };

        for peer in state.linked_peers(id) {
            state.links.remove(&link_key(id, &peer));
            state.push_data_to(id, TransportEvent::ConnectionClosed(peer.clone()));
            state.push_data_to(&peer, TransportEvent::ConnectionClosed(id.clone()));
        }
    }

    /// Deliver a provider error to the data endpoint registered as `id`
    pub fn inject_error(&self, id: &PeerIdentity, error: TransportError) {
        if let Ok(mut state) = self.state() {
            state.push_data_to(id, TransportEvent::Error(error));
        }
    }
}

/// Data endpoint of a [`MemoryNetwork`]
#[derive(Debug)]
pub struct MemoryTransport {
    network: MemoryNetwork,
    endpoint: EndpointId,
    local: Option<PeerIdentity>,
}

impl MemoryTransport {
    pub fn local_identity(&self) -> Option<&PeerIdentity> {
        self.local.as_ref()
    }

    fn release(&mut self, state: &mut NetworkState) {
        let Some(local) = self.local.take() else {
            return;
        };

        for peer in state.linked_peers(&local) {
            state.links.remove(&link_key(&local, &peer));
            state.push_data_to(&peer, TransportEvent::ConnectionClosed(local.clone()));
        }

        if state.data.get(&local) == Some(&self.endpoint) {
            state.data.remove(&local);
        }

        if let Some(queue) = state.data_queues.get_mut(&self.endpoint) {
            queue.clear();
        }
    }
}

impl DataTransport for MemoryTransport {
    fn open(&mut self, local: &PeerIdentity) -> Result<()> {
        let network = self.network.clone();
        let mut state = network.state()?;
        self.release(&mut state);

        if state.data.contains_key(local) {
            tracing::debug!(%local, "Identity already registered on memory network");
            state.push_data(
                self.endpoint,
                TransportEvent::Error(TransportError::IdentityTaken(local.to_string())),
            );
            return Ok(());
        }

        state.data.insert(local.clone(), self.endpoint);
        self.local = Some(local.clone());
        state.push_data(
            self.endpoint,
            TransportEvent::Open {
                local: local.clone(),
            },
        );
        Ok(())
    }

    fn connect(&mut self, remote: &PeerIdentity) -> Result<()> {
        let local = self.local.clone().ok_or(TransportError::NotOpen)?;
        let mut state = self.network.state()?;

        if remote == &local || !state.data.contains_key(remote) {
            state.push_data(
                self.endpoint,
                TransportEvent::Error(TransportError::PeerUnavailable(remote.to_string())),
            );
            return Ok(());
        }

        if state.links.insert(link_key(&local, remote)) {
            state.push_data(self.endpoint, TransportEvent::ConnectionOpened(remote.clone()));
            state.push_data_to(remote, TransportEvent::ConnectionOpened(local));
        }
        Ok(())
    }

    fn send(&mut self, remote: &PeerIdentity, payload: Vec<u8>) -> Result<()> {
        let local = self.local.clone().ok_or(TransportError::NotOpen)?;
        let mut state = self.network.state()?;

        if !state.is_linked(&local, remote) {
            return Err(TransportError::NotConnected(remote.to_string()));
        }

        tracing::trace!(from = %local, to = %remote, bytes = payload.len(), "Memory send");
        state.push_data_to(
            remote,
            TransportEvent::Data {
                from: local,
                payload,
            },
        );
        Ok(())
    }

    fn close_connection(&mut self, remote: &PeerIdentity) {
        let Some(local) = self.local.clone() else {
            return;
        };
        let Ok(mut state) = self.network.state() else {
            return;
        };

        if state.links.remove(&link_key(&local, remote)) {
            state.push_data_to(remote, TransportEvent::ConnectionClosed(local));
        }
    }

    fn close(&mut self) {
        let network = self.network.clone();
        if let Ok(mut state) = network.state() {
            self.release(&mut state);
        };
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        match self.network.state() {
            Ok(mut state) => state
                .data_queues
                .get_mut(&self.endpoint)
                .map(|queue| queue.drain(..).collect())
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        let network = self.network.clone();
        if let Ok(mut state) = network.state() {
            self.release(&mut state);
            state.data_queues.remove(&self.endpoint);
        };
    }
}

/// Media endpoint of a [`MemoryNetwork`]
#[derive(Debug)]
pub struct MemoryMedia {
    network: MemoryNetwork,
    endpoint: EndpointId,
    local: Option<PeerIdentity>,
}

impl MemoryMedia {
    pub fn local_identity(&self) -> Option<&PeerIdentity> {
        self.local.as_ref()
    }

    fn release(&mut self, state: &mut NetworkState) {
        let Some(local) = self.local.take() else {
            return;
        };

        let calls: Vec<CallId> = state
            .calls
            .iter()
            .filter(|(_, record)| record.caller == local || record.callee == local)
            .map(|(call, _)| *call)
            .collect();

        for call in calls {
            if let Some(record) = state.calls.remove(&call) {
                let other = record.other_party(&local).clone();
                state.push_media_to(&other, MediaEvent::CallClosed { call });
            }
        }

        if state.media.get(&local) == Some(&self.endpoint) {
            state.media.remove(&local);
        }

        if let Some(queue) = state.media_queues.get_mut(&self.endpoint) {
            queue.clear();
        }
    }
}

impl MediaTransport for MemoryMedia {
    fn open(&mut self, local: &PeerIdentity) -> Result<()> {
        let network = self.network.clone();
        let mut state = network.state()?;
        self.release(&mut state);

        if state.media.contains_key(local) {
            state.push_media(
                self.endpoint,
                MediaEvent::Error(TransportError::IdentityTaken(local.to_string())),
            );
            return Ok(());
        }

        state.media.insert(local.clone(), self.endpoint);
        self.local = Some(local.clone());
        state.push_media(
            self.endpoint,
            MediaEvent::Open {
                local: local.clone(),
            },
        );
        Ok(())
    }

    fn call(&mut self, remote: &PeerIdentity, stream: Option<MediaStream>) -> Result<CallId> {
        let local = self.local.clone().ok_or(TransportError::NotOpen)?;
        let mut state = self.network.state()?;

        if remote == &local || !state.media.contains_key(remote) {
            return Err(TransportError::PeerUnavailable(remote.to_string()));
        }

        state.next_call += 1;
        let call = CallId(state.next_call);
        state.calls.insert(
            call,
            CallRecord {
                caller: local.clone(),
                callee: remote.clone(),
                offer: stream,
                answered: false,
            },
        );
        state.push_media_to(remote, MediaEvent::IncomingCall { call, from: local });
        Ok(call)
    }

    fn answer(&mut self, call: CallId, stream: Option<MediaStream>) -> Result<()> {
        let local = self.local.clone().ok_or(TransportError::NotOpen)?;
        let mut state = self.network.state()?;

        let record = state
            .calls
            .get_mut(&call)
            .filter(|record| record.callee == local && !record.answered)
            .ok_or_else(|| TransportError::NotConnected(call.to_string()))?;
        record.answered = true;
        let offer = record.offer.clone();
        let caller = record.caller.clone();

        if let Some(offer) = offer {
            state.push_media(
                self.endpoint,
                MediaEvent::RemoteStream {
                    call,
                    stream: offer,
                },
            );
        }
        if let Some(stream) = stream {
            state.push_media_to(&caller, MediaEvent::RemoteStream { call, stream });
        }
        Ok(())
    }

    fn hang_up(&mut self, call: CallId) {
        let Some(local) = self.local.clone() else {
            return;
        };
        let Ok(mut state) = self.network.state() else {
            return;
        };

        let involved = state
            .calls
            .get(&call)
            .is_some_and(|record| record.caller == local || record.callee == local);
        if !involved {
            return;
        }

        if let Some(record) = state.calls.remove(&call) {
            let other = record.other_party(&local).clone();
            state.push_media_to(&other, MediaEvent::CallClosed { call });
        }
    }

    fn close(&mut self) {
        let network = self.network.clone();
        if let Ok(mut state) = network.state() {
            self.release(&mut state);
        };
    }

    fn poll_events(&mut self) -> Vec<MediaEvent> {
        match self.network.state() {
            Ok(mut state) => state
                .media_queues
                .get_mut(&self.endpoint)
                .map(|queue| queue.drain(..).collect())
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }
}

impl Drop for MemoryMedia {
    fn drop(&mut self) {
        let network = self.network.clone();
        if let Ok(mut state) = network.state() {
            self.release(&mut state);
            state.media_queues.remove(&self.endpoint);
        };
    }
}

/// How [`ScriptedDevices`] answers microphone requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MicrophoneBehavior {
    Grant,
    Fail(MediaError),
    /// Hold requests until `grant_deferred` or `fail_deferred`
    Defer,
}

#[derive(Debug)]
struct DeviceState {
    behavior: MicrophoneBehavior,
    events: VecDeque<DeviceEvent>,
    deferred: Vec<MicrophoneTicket>,
    issued: Vec<MediaStream>,
    requests: usize,
}

/// Microphone with scripted answers
///
/// Clones share state, so a test can keep a handle after moving one into a
/// voice manager and inspect every stream it handed out.
#[derive(Debug, Clone)]
pub struct ScriptedDevices {
    inner: Arc<Mutex<DeviceState>>,
}

impl ScriptedDevices {
    pub fn new(behavior: MicrophoneBehavior) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DeviceState {
                behavior,
                events: VecDeque::new(),
                deferred: Vec::new(),
                issued: Vec::new(),
                requests: 0,
            })),
        }
    }

    pub fn granting() -> Self {
        Self::new(MicrophoneBehavior::Grant)
    }

    pub fn denying() -> Self {
        Self::new(MicrophoneBehavior::Fail(MediaError::PermissionDenied))
    }

    fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_behavior(&self, behavior: MicrophoneBehavior) {
        self.state().behavior = behavior;
    }

    /// Grant every held request
    pub fn grant_deferred(&self) {
        let mut state = self.state();
        for ticket in std::mem::take(&mut state.deferred) {
            let stream = issue_stream(&mut state);
            state
                .events
                .push_back(DeviceEvent::Granted { ticket, stream });
        }
    }

    /// Fail every held request
    pub fn fail_deferred(&self, error: MediaError) {
        let mut state = self.state();
        for ticket in std::mem::take(&mut state.deferred) {
            state.events.push_back(DeviceEvent::Failed {
                ticket,
                error: error.clone(),
            });
        }
    }

    /// Every stream handed out so far, in order
    pub fn issued_streams(&self) -> Vec<MediaStream> {
        self.state().issued.clone()
    }

    /// Streams still holding the device
    pub fn live_streams(&self) -> usize {
        self.state().issued.iter().filter(|s| s.is_live()).count()
    }

    pub fn request_count(&self) -> usize {
        self.state().requests
    }
}

fn issue_stream(state: &mut DeviceState) -> MediaStream {
    let stream = MediaStream::single_track(format!("mic-{}", state.issued.len() + 1));
    state.issued.push(stream.clone());
    stream
}

impl MediaDevices for ScriptedDevices {
    fn request_microphone(&mut self, ticket: MicrophoneTicket) {
        let mut state = self.state();
        state.requests += 1;

        match state.behavior.clone() {
            MicrophoneBehavior::Grant => {
                let stream = issue_stream(&mut state);
                state
                    .events
                    .push_back(DeviceEvent::Granted { ticket, stream });
            }
            MicrophoneBehavior::Fail(error) => {
                state.events.push_back(DeviceEvent::Failed { ticket, error });
            }
            MicrophoneBehavior::Defer => state.deferred.push(ticket),
        }
    }

    fn poll_events(&mut self) -> Vec<DeviceEvent> {
        self.state().events.drain(..).collect()
    }
}
