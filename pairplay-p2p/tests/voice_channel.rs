mod support;

use pairplay_p2p::{
    MatchSession, MediaError, MemoryMedia, MemoryNetwork, MemoryTransport, MicrophoneBehavior,
    PlayerInfo, ScriptedDevices, SessionMode, VoiceConfig, VoiceInputs, VoiceManager, VoiceStatus,
};
use support::{id, init_test_tracing, session, PairFixture};

type Voice = VoiceManager<MemoryMedia, ScriptedDevices>;
type Match = MatchSession<MemoryTransport, MemoryMedia, ScriptedDevices>;

struct VoicePair {
    fixture: PairFixture,
    host_devices: ScriptedDevices,
    guest_devices: ScriptedDevices,
    host_voice: Voice,
    guest_voice: Voice,
}

impl VoicePair {
    fn new(host_devices: ScriptedDevices, guest_devices: ScriptedDevices) -> Self {
        let fixture = PairFixture::new();
        let host_voice = VoiceManager::new(
            fixture.network.media(),
            host_devices.clone(),
            VoiceConfig::default(),
        );
        let guest_voice = VoiceManager::new(
            fixture.network.media(),
            guest_devices.clone(),
            VoiceConfig::default(),
        );

        Self {
            fixture,
            host_devices,
            guest_devices,
            host_voice,
            guest_voice,
        }
    }

    fn granting() -> Self {
        Self::new(ScriptedDevices::granting(), ScriptedDevices::granting())
    }

    /// Session polls, then voice updates and polls, `count` times
    fn tick(&mut self, count: usize, enabled: bool) {
        for _ in 0..count {
            self.fixture.tick(1);
            let host_inputs = VoiceInputs::from_session(&self.fixture.host, enabled);
            let guest_inputs = VoiceInputs::from_session(&self.fixture.guest, enabled);
            self.host_voice.update(&host_inputs);
            self.guest_voice.update(&guest_inputs);
            self.host_voice.poll();
            self.guest_voice.poll();
        }
    }

    fn network(&self) -> &MemoryNetwork {
        &self.fixture.network
    }
}

#[test]
fn test_voice_connects_during_match() {
    let mut pair = VoicePair::granting();
    pair.fixture.start_match();
    pair.tick(5, true);

    assert_eq!(pair.host_voice.status(), VoiceStatus::Connected);
    assert_eq!(pair.guest_voice.status(), VoiceStatus::Connected);
    assert_eq!(pair.network().active_calls(), 1);

    let heard_by_guest = pair.guest_voice.remote_stream().unwrap();
    assert_eq!(Some(heard_by_guest.clone()), pair.host_voice.local_stream());
}

#[test]
fn test_voice_inactive_in_lobby() {
    let mut pair = VoicePair::granting();
    pair.fixture.connect_pair();
    pair.tick(3, true);

    assert_eq!(pair.host_voice.status(), VoiceStatus::Inactive);
    assert_eq!(pair.host_devices.request_count(), 0);
    assert_eq!(pair.guest_devices.request_count(), 0);
}

#[test]
fn test_voice_identities_are_derived() {
    let mut pair = VoicePair::granting();
    pair.fixture.start_match();
    pair.tick(1, true);

    assert!(pair.network().is_registered(&id("host-1-voice")));
    assert!(pair.network().is_registered(&id("guest-1-voice")));
}

#[test]
fn test_mic_starts_muted_and_toggles() {
    let mut pair = VoicePair::granting();
    pair.fixture.start_match();
    pair.tick(5, true);

    let local = pair.host_voice.local_stream().unwrap();
    assert!(!local.is_audio_enabled());

    assert!(!pair.host_voice.toggle_mute());
    assert!(local.is_audio_enabled());
    assert!(pair.host_voice.toggle_mute());
    assert!(!local.is_audio_enabled());
}

#[test]
fn test_mute_leaves_call_alone() {
    let mut pair = VoicePair::granting();
    pair.fixture.start_match();
    pair.tick(5, true);
    let call = pair.host_voice.call_id();

    pair.host_voice.toggle_mute();
    pair.tick(3, true);

    assert_eq!(pair.host_voice.call_id(), call);
    assert_eq!(pair.network().active_calls(), 1);
    assert_eq!(pair.host_devices.request_count(), 1);
    assert_eq!(pair.guest_voice.status(), VoiceStatus::Connected);
}

#[test]
fn test_disable_releases_mic_immediately() {
    let mut pair = VoicePair::granting();
    pair.fixture.start_match();
    pair.tick(5, true);
    assert_eq!(pair.host_devices.live_streams(), 1);

    let inputs = VoiceInputs::from_session(&pair.fixture.host, false);
    pair.host_voice.update(&inputs);

    assert_eq!(pair.host_devices.live_streams(), 0);
    assert_eq!(pair.host_voice.status(), VoiceStatus::Inactive);
    assert_eq!(pair.network().active_calls(), 0);

    pair.guest_voice.poll();
    assert_eq!(pair.guest_voice.status(), VoiceStatus::Connecting);
    assert!(pair.guest_voice.remote_stream().is_none());
}

#[test]
fn test_leaving_match_tears_down_voice() {
    let mut pair = VoicePair::granting();
    pair.fixture.start_match();
    pair.tick(5, true);

    pair.fixture.guest.leave_match();
    pair.tick(3, true);

    assert_eq!(pair.host_voice.status(), VoiceStatus::Inactive);
    assert_eq!(pair.guest_voice.status(), VoiceStatus::Inactive);
    assert_eq!(pair.host_devices.live_streams(), 0);
    assert_eq!(pair.guest_devices.live_streams(), 0);
    assert!(!pair.network().is_registered(&id("host-1-voice")));
}

#[test]
fn test_reenable_reconnects() {
    let mut pair = VoicePair::granting();
    pair.fixture.start_match();
    pair.tick(5, true);
    pair.tick(2, false);
    pair.tick(5, true);

    assert_eq!(pair.host_voice.status(), VoiceStatus::Connected);
    assert_eq!(pair.host_devices.request_count(), 2);
    assert_eq!(pair.host_devices.live_streams(), 1);
}

#[test]
fn test_permission_denied_still_hears_opponent() {
    let mut pair = VoicePair::new(ScriptedDevices::denying(), ScriptedDevices::granting());
    pair.fixture.start_match();
    pair.tick(5, true);

    assert_eq!(pair.host_voice.status(), VoiceStatus::PermissionDenied);
    assert!(pair.host_voice.local_stream().is_none());
    assert!(pair.host_voice.remote_stream().is_some());
    assert_eq!(pair.guest_voice.status(), VoiceStatus::Connecting);
}

#[test]
fn test_late_grant_after_disable_is_stopped() {
    let deferred = ScriptedDevices::new(MicrophoneBehavior::Defer);
    let mut pair = VoicePair::new(deferred, ScriptedDevices::granting());
    pair.fixture.start_match();
    pair.tick(1, true);
    assert_eq!(pair.host_voice.status(), VoiceStatus::Connecting);

    pair.tick(1, false);
    pair.host_devices.grant_deferred();
    pair.host_voice.poll();

    assert_eq!(pair.host_devices.issued_streams().len(), 1);
    assert_eq!(pair.host_devices.live_streams(), 0);
}

#[test]
fn test_mic_failure_reported_as_error() {
    let busy = ScriptedDevices::new(MicrophoneBehavior::Fail(MediaError::DeviceBusy));
    let mut pair = VoicePair::new(busy, ScriptedDevices::granting());
    pair.fixture.start_match();
    pair.tick(3, true);

    assert_eq!(
        pair.host_voice.status(),
        VoiceStatus::Error("device-busy".to_string())
    );
}

/// Host and guest sessions that each own their voice link
struct MatchPair {
    network: MemoryNetwork,
    host_devices: ScriptedDevices,
    host: Match,
    guest: Match,
}

impl MatchPair {
    fn new(host_devices: ScriptedDevices) -> Self {
        init_test_tracing();
        let network = MemoryNetwork::new();
        let host = MatchSession::with_voice(
            session(&network, "host-1"),
            VoiceManager::new(network.media(), host_devices.clone(), VoiceConfig::default()),
        );
        let guest = MatchSession::with_voice(
            session(&network, "guest-1"),
            VoiceManager::new(
                network.media(),
                ScriptedDevices::granting(),
                VoiceConfig::default(),
            ),
        );

        Self {
            network,
            host_devices,
            host,
            guest,
        }
    }

    fn tick(&mut self, count: usize) {
        for _ in 0..count {
            self.host.poll();
            self.guest.poll();
        }
    }

    fn start_match(&mut self) {
        self.host.update_self_info(PlayerInfo::new("Alice", "avatar-a"));
        self.guest.update_self_info(PlayerInfo::new("Bob", "avatar-b"));
        self.host.host();
        self.tick(1);
        self.guest.join(id("host-1"));
        self.tick(5);
        self.guest.mark_ready();
        self.tick(2);
        assert_eq!(self.host.session().mode(), SessionMode::InGame);
        assert_eq!(self.guest.session().mode(), SessionMode::InGame);
    }
}

#[test]
fn test_disconnect_tears_down_voice() {
    let mut pair = MatchPair::new(ScriptedDevices::granting());
    pair.start_match();
    pair.tick(5);
    assert_eq!(pair.host.voice_status(), VoiceStatus::Connected);
    assert_eq!(pair.host_devices.live_streams(), 1);

    pair.host.disconnect();

    assert_eq!(pair.host.session().mode(), SessionMode::Idle);
    assert_eq!(pair.host.voice_status(), VoiceStatus::Inactive);
    assert!(pair.host.voice().is_some_and(|voice| !voice.has_call()));
    assert_eq!(pair.host_devices.live_streams(), 0);
    assert_eq!(pair.network.active_calls(), 0);
    assert!(!pair.network.is_registered(&id("host-1-voice")));
}

#[test]
fn test_grant_after_disconnect_is_released() {
    let mut pair = MatchPair::new(ScriptedDevices::new(MicrophoneBehavior::Defer));
    pair.start_match();
    assert_eq!(pair.host_devices.request_count(), 1);

    pair.host.disconnect();
    pair.host_devices.grant_deferred();
    pair.host.poll();

    assert_eq!(pair.host_devices.issued_streams().len(), 1);
    assert_eq!(pair.host_devices.live_streams(), 0);
    assert!(pair.host.voice().is_some_and(|voice| voice.local_stream().is_none()));
}

#[test]
fn test_guest_voice_stops_when_host_disconnects() {
    let mut pair = MatchPair::new(ScriptedDevices::granting());
    pair.start_match();
    pair.tick(5);

    pair.host.disconnect();
    pair.tick(2);

    assert_eq!(pair.guest.session().mode(), SessionMode::Idle);
    assert_eq!(pair.guest.voice_status(), VoiceStatus::Inactive);
    assert!(!pair.network.is_registered(&id("guest-1-voice")));
}
