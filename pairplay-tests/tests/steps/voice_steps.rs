use cucumber::{given, then, when};
use pairplay_p2p::ScriptedDevices;
use pairplay_tests::PairWorld;

#[given("both players grant the microphone")]
async fn both_grant(world: &mut PairWorld) {
    world.attach_voice(ScriptedDevices::granting(), ScriptedDevices::granting());
}

#[given("the host denies the microphone")]
async fn host_denies(world: &mut PairWorld) {
    world.attach_voice(ScriptedDevices::denying(), ScriptedDevices::granting());
}

#[given("voice is enabled")]
async fn voice_enabled(world: &mut PairWorld) {
    world.voice_enabled = true;
}

#[when("voice is disabled without polling")]
async fn voice_disabled(world: &mut PairWorld) {
    world.voice_enabled = false;
    world.update_voice();
}

#[when("the host toggles mute")]
async fn host_toggles_mute(world: &mut PairWorld) {
    world.recorded_call = world.host_voice().call_id();
    world.host_voice().toggle_mute();
    world.tick(3);
}

#[then(expr = "the {word} voice status is {string}")]
async fn voice_status(world: &mut PairWorld, who: String, status: String) {
    let voice = match who.as_str() {
        "host" => world.host_voice.as_ref(),
        _ => world.guest_voice.as_ref(),
    };
    let voice = voice.expect("voice not attached");
    assert_eq!(voice.status().to_string(), status);
}

#[then("the host microphone is muted")]
async fn host_mic_muted(world: &mut PairWorld) {
    let stream = world.host_voice().local_stream().expect("no microphone");
    assert!(!stream.is_audio_enabled());
    assert!(stream.is_live());
}

#[then("the host microphone is unmuted")]
async fn host_mic_unmuted(world: &mut PairWorld) {
    let stream = world.host_voice().local_stream().expect("no microphone");
    assert!(stream.is_audio_enabled());
}

#[then("the host microphone is released")]
async fn host_mic_released(world: &mut PairWorld) {
    let devices = world.host_devices.as_ref().expect("voice not attached");
    assert_eq!(devices.request_count(), 1);
    assert_eq!(devices.live_streams(), 0);
}

#[then(expr = "the host microphone was requested {int} times")]
async fn host_mic_requests(world: &mut PairWorld, count: usize) {
    let devices = world.host_devices.as_ref().expect("voice not attached");
    assert_eq!(devices.request_count(), count);
}

#[then("the voice call is unchanged")]
async fn call_unchanged(world: &mut PairWorld) {
    assert!(world.recorded_call.is_some());
    assert_eq!(world.host_voice().call_id(), world.recorded_call);
    assert_eq!(world.network.active_calls(), 1);
}
