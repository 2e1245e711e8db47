#![allow(dead_code)]

use pairplay_p2p::{
    MemoryNetwork, MemoryTransport, PeerIdentity, PlayerInfo, SessionConfig, SessionManager,
    SessionMode,
};

pub fn id(s: &str) -> PeerIdentity {
    PeerIdentity::parse(s).unwrap()
}

pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

pub fn session(network: &MemoryNetwork, name: &str) -> SessionManager<MemoryTransport> {
    SessionManager::with_identity(network.transport(), SessionConfig::default(), id(name))
}

/// Host and guest on one in-memory network
pub struct PairFixture {
    pub network: MemoryNetwork,
    pub host: SessionManager<MemoryTransport>,
    pub guest: SessionManager<MemoryTransport>,
}

impl PairFixture {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        init_test_tracing();
        let network = MemoryNetwork::new();
        let mut host =
            SessionManager::with_identity(network.transport(), config.clone(), id("host-1"));
        let mut guest = SessionManager::with_identity(network.transport(), config, id("guest-1"));

        host.update_self_info(PlayerInfo::new("Alice", "avatar-a"));
        guest.update_self_info(PlayerInfo::new("Bob", "avatar-b"));

        Self {
            network,
            host,
            guest,
        }
    }

    /// Poll host then guest, `count` times
    pub fn tick(&mut self, count: usize) {
        for _ in 0..count {
            self.host.poll();
            self.guest.poll();
        }
    }

    /// Host opens its lobby and the guest joins it
    pub fn connect_pair(&mut self) {
        self.host.host();
        self.tick(1);
        assert_eq!(self.host.mode(), SessionMode::Lobby);

        self.guest.join(self.host.peer_id().clone());
        self.tick(5);
        assert_eq!(self.guest.mode(), SessionMode::Lobby);
        assert_eq!(self.host.players().len(), 2);
    }

    /// Connect and let the guest's readiness start the match
    pub fn start_match(&mut self) {
        self.connect_pair();
        self.guest.mark_ready();
        self.tick(5);
        assert_eq!(self.host.mode(), SessionMode::InGame);
        assert_eq!(self.guest.mode(), SessionMode::InGame);
    }
}
