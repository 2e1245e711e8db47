use cucumber::World;
use pairplay_core::{PeerIdentity, PlayerInfo};
use pairplay_p2p::{
    CallId, MemoryMedia, MemoryNetwork, MemoryTransport, MessageInbox, ScriptedDevices,
    SessionConfig, SessionManager, VoiceConfig, VoiceInputs, VoiceManager,
};

pub type Session = SessionManager<MemoryTransport>;
pub type Voice = VoiceManager<MemoryMedia, ScriptedDevices>;

/// Both sides of one match on an in-memory network
#[derive(Debug, World, Default)]
pub struct PairWorld {
    pub network: MemoryNetwork,

    pub host: Option<Session>,
    pub guest: Option<Session>,

    /// Everything each side's subscribers received
    pub host_inbox: MessageInbox,
    pub guest_inbox: MessageInbox,

    pub host_voice: Option<Voice>,
    pub guest_voice: Option<Voice>,
    pub host_devices: Option<ScriptedDevices>,
    pub guest_devices: Option<ScriptedDevices>,
    pub voice_enabled: bool,

    /// Call observed before an action, for before/after comparisons
    pub recorded_call: Option<CallId>,
}

impl PairWorld {
    /// Create both sessions (idle) with display names
    pub fn create_pair(&mut self, host_name: &str, guest_name: &str) {
        let mut host = self.new_session("host-1", host_name);
        let mut guest = self.new_session("guest-1", guest_name);

        let (_, host_inbox) = host.subscribe_inbox();
        let (_, guest_inbox) = guest.subscribe_inbox();
        self.host_inbox = host_inbox;
        self.guest_inbox = guest_inbox;

        self.host = Some(host);
        self.guest = Some(guest);
    }

    fn new_session(&self, id: &str, name: &str) -> Session {
        let identity = PeerIdentity::parse(id).unwrap_or_else(|e| panic!("bad id {}: {}", id, e));
        let mut session = SessionManager::with_identity(
            self.network.transport(),
            SessionConfig::default(),
            identity,
        );
        session.update_self_info(PlayerInfo::new(name, ""));
        session
    }

    pub fn host(&mut self) -> &mut Session {
        self.host.as_mut().expect("host not created")
    }

    pub fn guest(&mut self) -> &mut Session {
        self.guest.as_mut().expect("guest not created")
    }

    pub fn side(&mut self, who: &str) -> &mut Session {
        match who {
            "host" => self.host(),
            "guest" => self.guest(),
            other => panic!("unknown side {}", other),
        }
    }

    pub fn inbox(&self, who: &str) -> &MessageInbox {
        match who {
            "host" => &self.host_inbox,
            "guest" => &self.guest_inbox,
            other => panic!("unknown side {}", other),
        }
    }

    /// Attach voice managers to both sides
    pub fn attach_voice(&mut self, host_devices: ScriptedDevices, guest_devices: ScriptedDevices) {
        self.host_voice = Some(VoiceManager::new(
            self.network.media(),
            host_devices.clone(),
            VoiceConfig::default(),
        ));
        self.guest_voice = Some(VoiceManager::new(
            self.network.media(),
            guest_devices.clone(),
            VoiceConfig::default(),
        ));
        self.host_devices = Some(host_devices);
        self.guest_devices = Some(guest_devices);
    }

    pub fn host_voice(&mut self) -> &mut Voice {
        self.host_voice.as_mut().expect("voice not attached")
    }

    /// Poll both sessions, then drive voice if attached
    pub fn tick(&mut self, count: usize) {
        for _ in 0..count {
            if let Some(host) = self.host.as_mut() {
                host.poll();
            }
            if let Some(guest) = self.guest.as_mut() {
                guest.poll();
            }
            self.update_voice();
            if let Some(voice) = self.host_voice.as_mut() {
                voice.poll();
            }
            if let Some(voice) = self.guest_voice.as_mut() {
                voice.poll();
            }
        }
    }

    /// Re-evaluate voice inputs without polling
    pub fn update_voice(&mut self) {
        let enabled = self.voice_enabled;
        if let (Some(session), Some(voice)) = (self.host.as_ref(), self.host_voice.as_mut()) {
            voice.update(&VoiceInputs::from_session(session, enabled));
        }
        if let (Some(session), Some(voice)) = (self.guest.as_ref(), self.guest_voice.as_mut()) {
            voice.update(&VoiceInputs::from_session(session, enabled));
        }
    }
}
