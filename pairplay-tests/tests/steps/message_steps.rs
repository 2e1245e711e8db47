use cucumber::{then, when};
use pairplay_core::GameMessage;
use pairplay_tests::PairWorld;

#[when(expr = "the {word} sends {string} with seed {int}")]
async fn sends_with_seed(world: &mut PairWorld, who: String, kind: String, seed: i64) {
    world
        .side(&who)
        .send_data(GameMessage::new(kind).with_field("seed", seed));
    world.tick(2);
}

#[when(expr = "the guest sends {int} alternating {string} and {string} messages")]
async fn guest_sends_alternating(world: &mut PairWorld, count: i64, first: String, second: String) {
    for n in 0..count {
        let kind = if n % 2 == 0 { &first } else { &second };
        world
            .guest()
            .send_data(GameMessage::new(kind.as_str()).with_field("n", n));
    }
    world.tick(2);
}

#[when(expr = "the guest says {string}")]
async fn guest_says(world: &mut PairWorld, text: String) {
    world.guest().send_chat(text);
    world.tick(2);
}

#[then(expr = "the {word} receives exactly {int} {string} message")]
async fn receives_exactly(world: &mut PairWorld, who: String, count: usize, kind: String) {
    let received: Vec<GameMessage> = world
        .inbox(&who)
        .drain()
        .into_iter()
        .filter(|m| m.is(&kind))
        .collect();
    assert_eq!(received.len(), count, "unexpected number of {}", kind);

    // Keep them around for follow-up assertions
    for message in received {
        world.inbox(&who).push(message);
    }
}

#[then(expr = "the last {string} received by the {word} has seed {int}")]
async fn last_has_seed(world: &mut PairWorld, kind: String, who: String, seed: i64) {
    let messages = world.inbox(&who).take_kind(&kind);
    let last = messages.last().expect("no message of that type");
    assert_eq!(last.get_i64("seed"), Some(seed));
}

#[then("the host receives them in the order they were sent")]
async fn host_receives_in_order(world: &mut PairWorld) {
    let numbers: Vec<i64> = world
        .host_inbox
        .drain()
        .iter()
        .filter_map(|m| m.get_i64("n"))
        .collect();

    assert!(!numbers.is_empty());
    let expected: Vec<i64> = (0..numbers.len() as i64).collect();
    assert_eq!(numbers, expected);
}

#[then(expr = "the host receives a chat {string} from {string}")]
async fn host_receives_chat(world: &mut PairWorld, text: String, sender: String) {
    let chats = world.host_inbox.take_kind(pairplay_core::reserved::CHAT);
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].get_str("text"), Some(text.as_str()));
    assert_eq!(chats[0].get_str("senderName"), Some(sender.as_str()));
}
