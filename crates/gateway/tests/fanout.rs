//! End-to-end fan-out scenarios against a scripted snapshot source and
//! in-memory client channels.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use board_core::{Meta, Status, Update};
use gateway::{
    tweet_queue, ClientChannel, Collection, FeedTweet, GatewayError, TweetBuffer, TweetFilter,
};
use serde_json::{json, Value};

// ---------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------

#[derive(Default)]
struct MockSource {
    games: Mutex<Vec<Meta>>,
    snapshots: Mutex<HashMap<u64, Value>>,
}

impl MockSource {
    fn set_games(&self, games: Vec<Meta>) {
        *self.games.lock().unwrap() = games;
    }

    fn set_snapshot(&self, id: u64, doc: Value) {
        self.snapshots.lock().unwrap().insert(id, doc);
    }

    fn drop_snapshot(&self, id: u64) {
        self.snapshots.lock().unwrap().remove(&id);
    }
}

#[async_trait]
impl gateway::SnapshotSource for MockSource {
    async fn list(&self) -> gateway::Result<Vec<Meta>> {
        Ok(self.games.lock().unwrap().clone())
    }

    async fn fetch(&self, id: u64) -> gateway::Result<board_core::Game> {
        let doc = self
            .snapshots
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(GatewayError::UpstreamStatus(404))?;
        Ok(serde_json::from_value(doc).expect("scripted snapshot parses"))
    }
}

struct MemoryChannel {
    hello: Option<u64>,
    /// Writes allowed before the channel starts failing. `None` means
    /// unlimited.
    write_budget: Option<usize>,
    sent: Arc<Mutex<Vec<Vec<Update>>>>,
    closed: Arc<AtomicBool>,
}

#[derive(Clone)]
struct Probe {
    sent: Arc<Mutex<Vec<Vec<Update>>>>,
    closed: Arc<AtomicBool>,
}

impl Probe {
    fn messages(&self) -> Vec<Vec<Update>> {
        self.sent.lock().unwrap().clone()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn client(hello: Option<u64>) -> (Box<MemoryChannel>, Probe) {
    client_with_budget(hello, None)
}

fn client_with_budget(hello: Option<u64>, budget: Option<usize>) -> (Box<MemoryChannel>, Probe) {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let closed = Arc::new(AtomicBool::new(false));
    (
        Box::new(MemoryChannel {
            hello,
            write_budget: budget,
            sent: sent.clone(),
            closed: closed.clone(),
        }),
        Probe { sent, closed },
    )
}

#[async_trait]
impl ClientChannel for MemoryChannel {
    async fn read_hello(&mut self) -> gateway::Result<u64> {
        self.hello.ok_or(GatewayError::BadHello)
    }

    async fn write_updates(&mut self, updates: &[Update]) -> gateway::Result<()> {
        if let Some(budget) = &mut self.write_budget {
            if *budget == 0 {
                return Err(GatewayError::ClientWrite("refused".to_owned()));
            }
            *budget -= 1;
        }
        self.sent.lock().unwrap().push(updates.to_vec());
        Ok(())
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn remote_addr(&self) -> &str {
        "test-client"
    }
}

// ---------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------

fn meta(id: u64, name: &str, status: Status) -> Meta {
    let mut m = Meta::default();
    m.id = id;
    m.name = name.to_owned();
    m.status = status;
    m
}

fn alpha() -> Value {
    json!({
        "name": "Alpha", "mode": 0, "status": 1,
        "credit": "", "message": "",
        "teams": [{
            "id": 10, "name": "Red", "logo": "default.png", "color": "#f00",
            "score": {"total": 0, "health": 100},
            "flags": {"open": 0, "lost": 0, "captured": 0},
            "tickets": {"open": 0, "closed": 0},
            "hosts": [], "beacons": [],
            "offense": false, "minimal": false
        }],
        "events": []
    })
}

struct Harness {
    source: Arc<MockSource>,
    collection: Arc<Collection>,
    buffer: TweetBuffer,
    tweets: gateway::TweetSender,
}

fn harness() -> Harness {
    harness_with_retention(Duration::from_secs(3600))
}

fn harness_with_retention(retention: Duration) -> Harness {
    let source = Arc::new(MockSource::default());
    source.set_games(vec![meta(1, "Alpha", Status::Running)]);
    source.set_snapshot(1, alpha());
    let collection = Arc::new(Collection::new(
        source.clone(),
        "http://scorebot/".to_owned(),
        Duration::from_secs(5),
    ));
    let (tweets, buffer) = tweet_queue(TweetFilter::default(), retention);
    Harness {
        source,
        collection,
        buffer,
        tweets,
    }
}

fn has_value(updates: &[Update], id: &str, value: &str) -> bool {
    updates
        .iter()
        .any(|u| u.id == id && u.value.as_deref() == Some(value))
}

// ---------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------

#[tokio::test]
async fn cold_join_receives_the_full_board() {
    let h = harness();
    let (chan, probe) = client(Some(1));
    h.collection.join(chan).await;

    let messages = probe.messages();
    assert_eq!(messages.len(), 1, "expected exactly the create stream");
    let board = &messages[0];
    assert!(has_value(board, "game-status-name", "Alpha"));
    assert!(has_value(board, "game-status-mode", "Red vs Blue"));
    assert!(has_value(board, "game-status-status", "Running"));
    assert!(has_value(board, "game-team-t10-name-name", "Red"));
    assert!(board
        .iter()
        .any(|u| u.id == "game-team-t10-logo"
            && u.name == "background-image"
            && u.value.as_deref() == Some("url('/image/team.png')")));
    assert_eq!(h.collection.subscription_count(), 1);
    assert!(!probe.is_closed());
}

#[tokio::test]
async fn score_change_reaches_connected_clients() {
    let mut h = harness();
    let (chan, probe) = client(Some(1));
    h.collection.join(chan).await;

    // Nothing changed: the tick must stay silent.
    h.collection.tick_once(&mut h.buffer).await;
    assert_eq!(probe.messages().len(), 1);

    let mut doc = alpha();
    doc["teams"][0]["score"]["total"] = json!(50);
    h.source.set_snapshot(1, doc);
    h.collection.tick_once(&mut h.buffer).await;

    let messages = probe.messages();
    assert_eq!(messages.len(), 2, "expected one delta message");
    let delta = &messages[1];
    assert!(has_value(delta, "game-team-t10-name-total", "50"));
    assert!(delta
        .iter()
        .all(|u| u.id.starts_with("game-team-t10-name-total")
            || u.id.starts_with("game-team-t10-score-health")));
}

#[tokio::test]
async fn second_viewer_reuses_the_cached_stream() {
    let mut h = harness();
    let (first, _first_probe) = client(Some(1));
    h.collection.join(first).await;
    h.collection.tick_once(&mut h.buffer).await;

    let (second, probe) = client(Some(1));
    h.collection.join(second).await;
    assert_eq!(h.collection.subscription_count(), 1);
    assert!(has_value(&probe.messages()[0], "game-status-name", "Alpha"));

    // The next tick folds the new client into the swarm.
    h.collection.tick_once(&mut h.buffer).await;
    assert_eq!(h.collection.client_count().await, 2);
}

#[tokio::test]
async fn bad_hello_closes_the_channel() {
    let h = harness();
    let (chan, probe) = client(None);
    h.collection.join(chan).await;
    assert!(probe.is_closed());
    assert!(probe.messages().is_empty());
    assert_eq!(h.collection.subscription_count(), 0);
}

#[tokio::test]
async fn empty_snapshot_rejects_the_client() {
    let h = harness();
    h.source.set_snapshot(2, json!({}));
    let (chan, probe) = client(Some(2));
    h.collection.join(chan).await;
    assert!(probe.is_closed());
    assert_eq!(h.collection.subscription_count(), 0);
}

#[tokio::test]
async fn unknown_game_rejects_the_client() {
    let h = harness();
    let (chan, probe) = client(Some(99));
    h.collection.join(chan).await;
    assert!(probe.is_closed());
    assert_eq!(h.collection.subscription_count(), 0);
}

#[tokio::test]
async fn failing_client_is_dropped_others_keep_streaming() {
    let mut h = harness();
    // The first write (the board paint) succeeds, everything after fails.
    let (flaky, flaky_probe) = client_with_budget(Some(1), Some(1));
    let (steady, steady_probe) = client(Some(1));
    h.collection.join(flaky).await;
    h.collection.join(steady).await;
    h.collection.tick_once(&mut h.buffer).await;
    assert_eq!(h.collection.client_count().await, 2);

    let mut doc = alpha();
    doc["teams"][0]["score"]["total"] = json!(10);
    h.source.set_snapshot(1, doc);
    h.collection.tick_once(&mut h.buffer).await;

    assert!(flaky_probe.is_closed());
    assert_eq!(h.collection.client_count().await, 1);
    assert_eq!(steady_probe.messages().len(), 2);
    assert!(!steady_probe.is_closed());

    // The survivor keeps receiving deltas on later ticks.
    let mut doc = alpha();
    doc["teams"][0]["score"]["total"] = json!(20);
    h.source.set_snapshot(1, doc);
    h.collection.tick_once(&mut h.buffer).await;
    assert_eq!(steady_probe.messages().len(), 3);
}

#[tokio::test]
async fn upstream_failure_skips_the_tick_and_recovers() {
    let mut h = harness();
    let (chan, probe) = client(Some(1));
    h.collection.join(chan).await;
    h.collection.tick_once(&mut h.buffer).await;

    h.source.drop_snapshot(1);
    h.collection.tick_once(&mut h.buffer).await;
    assert_eq!(probe.messages().len(), 1, "failed fetch must stay silent");
    assert_eq!(h.collection.subscription_count(), 1);

    let mut doc = alpha();
    doc["teams"][0]["score"]["total"] = json!(75);
    h.source.set_snapshot(1, doc);
    h.collection.tick_once(&mut h.buffer).await;
    assert!(has_value(
        probe.messages().last().unwrap(),
        "game-team-t10-name-total",
        "75"
    ));
}

#[tokio::test]
async fn idle_subscription_is_evicted_after_two_ticks() {
    let mut h = harness();
    // The board paint fails, so the client never enters the swarm and
    // the subscription sits with zero clients.
    let (chan, _probe) = client_with_budget(Some(1), Some(0));
    h.collection.join(chan).await;
    assert_eq!(h.collection.subscription_count(), 1);

    h.collection.tick_once(&mut h.buffer).await;
    assert_eq!(h.collection.subscription_count(), 1, "one idle tick keeps it");

    h.collection.tick_once(&mut h.buffer).await;
    assert_eq!(h.collection.subscription_count(), 0, "second idle tick evicts");
}

#[tokio::test]
async fn connected_client_keeps_the_subscription_alive() {
    let mut h = harness();
    let (chan, _probe) = client(Some(1));
    h.collection.join(chan).await;
    for _ in 0..4 {
        h.collection.tick_once(&mut h.buffer).await;
    }
    assert_eq!(h.collection.subscription_count(), 1);
}

#[tokio::test]
async fn pushed_tweet_reaches_the_board() {
    let mut h = harness();
    let (chan, probe) = client(Some(1));
    h.collection.join(chan).await;
    h.collection.tick_once(&mut h.buffer).await;

    h.tweets.push(FeedTweet {
        id: 7,
        user: "Score Bot".to_owned(),
        handle: "scorebot".to_owned(),
        photo: String::new(),
        text: "hi".to_owned(),
        retweet: None,
        media: Vec::new(),
    });
    h.collection.tick_once(&mut h.buffer).await;

    let delta = probe.messages().last().unwrap().clone();
    assert!(has_value(&delta, "game-tweet-t7-user-content", "hi"));

    // A fresh viewer sees the tweet in its create stream too.
    let (second, second_probe) = client(Some(1));
    h.collection.join(second).await;
    assert!(has_value(
        &second_probe.messages()[0],
        "game-tweet-t7-user-content",
        "hi"
    ));
}

#[tokio::test]
async fn expired_tweet_is_removed_from_the_board() {
    let mut h = harness_with_retention(Duration::from_secs(3600));
    let (chan, probe) = client(Some(1));
    h.collection.join(chan).await;
    h.collection.tick_once(&mut h.buffer).await;

    h.tweets.push(FeedTweet {
        id: 7,
        user: "Score Bot".to_owned(),
        handle: "scorebot".to_owned(),
        photo: String::new(),
        text: "hi".to_owned(),
        retweet: None,
        media: Vec::new(),
    });
    h.collection.tick_once(&mut h.buffer).await;
    assert!(has_value(
        probe.messages().last().unwrap(),
        "game-tweet-t7-user-content",
        "hi"
    ));

    // Advance the buffer clock past every expiry and tick again: the
    // board drops the tweet.
    h.buffer.sync(i64::MAX);
    h.collection.tick_once(&mut h.buffer).await;
    let delta = probe.messages().last().unwrap().clone();
    assert!(delta.iter().any(|u| u.id == "game-tweet-t7" && u.remove));
}

#[tokio::test]
async fn directory_tracks_active_games_only() {
    let mut h = harness();
    h.source.set_games(vec![
        meta(1, "Alpha", Status::Running),
        meta(2, "Old Glory", Status::Completed),
    ]);
    h.collection.tick_once(&mut h.buffer).await;
    assert_eq!(h.collection.game_id("Alpha"), Some(1));
    assert_eq!(h.collection.game_id("alpha"), Some(1));
    assert_eq!(h.collection.game_id("Old Glory"), None);

    // A game going inactive loses its slug.
    h.source.set_games(vec![meta(1, "Alpha", Status::Completed)]);
    h.collection.tick_once(&mut h.buffer).await;
    assert_eq!(h.collection.game_id("Alpha"), None);
}
