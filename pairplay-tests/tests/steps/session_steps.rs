use cucumber::{given, then, when};
use pairplay_core::PlayerInfo;
use pairplay_tests::PairWorld;

// ===== Given Steps =====

#[given(expr = "a host named {string} and a guest named {string}")]
async fn host_and_guest(world: &mut PairWorld, host_name: String, guest_name: String) {
    world.create_pair(&host_name, &guest_name);
}

#[given("the guest has joined the host's lobby")]
async fn guest_in_lobby(world: &mut PairWorld) {
    host_opens_lobby(world).await;
    guest_joins_host(world).await;
}

#[given("a match is running")]
async fn match_running(world: &mut PairWorld) {
    guest_in_lobby(world).await;
    world.guest().mark_ready();
    world.tick(10);
}

// ===== When Steps =====

#[when("the host opens a lobby")]
async fn host_opens_lobby(world: &mut PairWorld) {
    world.host().host();
    world.tick(1);
}

#[when("the guest joins the host")]
async fn guest_joins_host(world: &mut PairWorld) {
    let host_id = world.host().peer_id().clone();
    world.guest().join(host_id);
    world.tick(5);
}

#[when("the guest joins the host after the lobby opens")]
async fn guest_joins_after_open(world: &mut PairWorld) {
    guest_in_lobby(world).await;
}

#[when(expr = "the guest joins {string}")]
async fn guest_joins_code(world: &mut PairWorld, code: String) {
    world.guest().join_code(&code);
    world.tick(3);
}

#[when("the guest marks ready")]
async fn guest_marks_ready(world: &mut PairWorld) {
    world.guest().mark_ready();
    world.tick(3);
}

#[when("the host starts the game")]
async fn host_starts_game(world: &mut PairWorld) {
    world.host().start_game();
    world.tick(3);
}

#[when(expr = "the guest updates self info to {string} with avatar {string}")]
async fn guest_updates_self_info(world: &mut PairWorld, name: String, avatar: String) {
    world.guest().update_self_info(PlayerInfo::new(name, avatar));
    world.tick(2);
}

#[when("the guest's connection drops")]
async fn guest_connection_drops(world: &mut PairWorld) {
    let guest_id = world.guest().peer_id().clone();
    world.network.sever(&guest_id);
    world.tick(3);
}

#[when("the guest leaves the match")]
async fn guest_leaves(world: &mut PairWorld) {
    world.guest().leave_match();
    world.tick(3);
}

// ===== Then Steps =====

#[then(expr = "the {word} is in mode {string}")]
async fn side_in_mode(world: &mut PairWorld, who: String, mode: String) {
    assert_eq!(world.side(&who).mode().to_string(), mode);
}

#[then(expr = "the host sees {int} players")]
async fn host_sees_players(world: &mut PairWorld, count: usize) {
    assert_eq!(world.host().players().len(), count);
}

#[then(expr = "the {word} sees the remote player {string}")]
async fn sees_remote_player(world: &mut PairWorld, who: String, name: String) {
    let session = world.side(&who);
    let remote = session.roster().remote().expect("no remote player");
    assert_eq!(remote.display_name(), name);
}

#[then(expr = "the host sees the remote player {string} with avatar {string}")]
async fn sees_remote_with_avatar(world: &mut PairWorld, name: String, avatar: String) {
    let remote = world.host().roster().remote().expect("no remote player");
    assert_eq!(remote.display_name(), name);
    assert_eq!(remote.avatar_ref(), avatar);
}

#[then("the host is player one")]
async fn host_is_p1(world: &mut PairWorld) {
    assert!(world.host().am_i_p1());
    assert!(!world.guest().am_i_p1());
}

#[then(expr = "the guest reports error {string}")]
async fn guest_reports_error(world: &mut PairWorld, kind: String) {
    let error = world.guest().last_error().expect("no error recorded");
    assert_eq!(error.kind(), kind);
}
