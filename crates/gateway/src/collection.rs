//! The collection: subscription map, game directory and the periodic
//! tick that drives everything.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use board_core::{Meta, Tweet};
use dashmap::DashMap;
use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::channel::ClientChannel;
use crate::error::GatewayError;
use crate::source::SnapshotSource;
use crate::subscription::Subscription;
use crate::tweets::TweetBuffer;

/// Lower-cased, dash-normalized form of a game name, used for URL
/// routing. Runs of non-alphanumeric characters collapse into one dash.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            dash = false;
        } else if !dash && !slug.is_empty() {
            slug.push('-');
            dash = true;
        }
    }
    if slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Owns the `game id → subscription` map and the slug directory, and
/// multiplexes clients onto subscriptions. One collection per process.
pub struct Collection {
    source: Arc<dyn SnapshotSource>,
    subs: DashMap<u64, Arc<Subscription>>,
    directory: DashMap<String, u64>,
    /// Latest game index, overlaid onto snapshots that omit meta.
    games: RwLock<Vec<Meta>>,
    /// Retained tweet list as of the last tick.
    tweets: RwLock<Arc<Vec<Tweet>>>,
    assets: String,
    timeout: Duration,
    /// At most one tick in flight.
    running: AtomicBool,
}

impl Collection {
    pub fn new(source: Arc<dyn SnapshotSource>, assets: String, timeout: Duration) -> Self {
        Collection {
            source,
            subs: DashMap::new(),
            directory: DashMap::new(),
            games: RwLock::new(Vec::new()),
            tweets: RwLock::new(Arc::new(Vec::new())),
            assets,
            timeout,
            running: AtomicBool::new(false),
        }
    }

    /// Resolve a game name to an active game id, if any.
    pub fn game_id(&self, name: &str) -> Option<u64> {
        self.directory.get(&slugify(name)).map(|e| *e.value())
    }

    /// The latest game index.
    pub fn games(&self) -> Vec<Meta> {
        self.games.read().expect("games lock").clone()
    }

    pub fn subscription_count(&self) -> usize {
        self.subs.len()
    }

    pub async fn client_count(&self) -> usize {
        let subs: Vec<Arc<Subscription>> = self.subs.iter().map(|e| e.value().clone()).collect();
        let mut n = 0;
        for sub in subs {
            n += sub.client_count().await;
        }
        n
    }

    /// Drive the periodic tick until `shutdown` fires, then close every
    /// subscription.
    pub async fn run(
        self: Arc<Self>,
        mut buffer: TweetBuffer,
        tick: Duration,
        mut shutdown: mpsc::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("collection ticking every {tick:?}");
        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => break,

                _ = ticker.tick() => {
                    if self.running.swap(true, Ordering::SeqCst) {
                        continue;
                    }
                    if tokio::time::timeout(self.timeout, self.tick_once(&mut buffer))
                        .await
                        .is_err()
                    {
                        warn!("collection update ran over the timeout of {:?}", self.timeout);
                        counter!("gateway_tick_overruns_total").increment(1);
                    }
                    self.running.store(false, Ordering::SeqCst);
                }
            }
        }
        self.close_all().await;
        info!("collection stopped");
    }

    /// One tick: refresh the directory, expire tweets, update every
    /// subscription, evict the ones idle for two consecutive ticks.
    ///
    /// The caller bounds this future with the tick deadline; every await
    /// point in here is a valid cancellation point.
    pub async fn tick_once(&self, buffer: &mut TweetBuffer) {
        let list = match self.source.list().await {
            Ok(l) => l,
            Err(e) => {
                error!("error occurred during update tick: {e}");
                return;
            }
        };
        for m in &list {
            let slug = slugify(&m.name);
            if !m.status.is_active() {
                self.directory.remove(&slug);
                continue;
            }
            if !self.directory.contains_key(&slug) {
                debug!("added game name mapping {slug:?} for id {}", m.id);
                self.directory.insert(slug, m.id);
            }
        }

        let now = chrono::Utc::now().timestamp();
        let tweets = Arc::new(buffer.sync(now).to_vec());
        *self.tweets.write().expect("tweets lock") = tweets.clone();
        *self.games.write().expect("games lock") = list.clone();

        let subs: Vec<(u64, Arc<Subscription>)> =
            self.subs.iter().map(|e| (*e.key(), e.value().clone())).collect();
        let mut evict = Vec::new();
        for (id, sub) in subs {
            if sub.client_count().await == 0 {
                if sub.mark_idle() {
                    evict.push(id);
                    continue;
                }
            } else {
                sub.clear_idle();
            }
            sub.update(
                self.source.as_ref(),
                &list,
                &tweets,
                &self.assets,
                self.timeout,
            )
            .await;
        }
        for id in evict {
            // A hello that raced the eviction clears the idle tag and
            // keeps the subscription alive.
            if self.subs.remove_if(&id, |_, s| s.is_idle()).is_some() {
                debug!("removed unused subscription for game {id}");
            }
        }
        gauge!("gateway_subscriptions").set(self.subs.len() as f64);
        debug!("read {} games from scorebot, update finished", self.games().len());
    }

    /// Hello path: read which game the client wants, create the
    /// subscription if this is the first viewer, then hand the client
    /// over.
    pub async fn join(&self, mut chan: Box<dyn ClientChannel>) {
        debug!(
            "received a connection from {}, listening for hello",
            chan.remote_addr()
        );
        let game_id = match chan.read_hello().await {
            Ok(id) => id,
            Err(e) => {
                warn!("could not read hello from {}: {e}", chan.remote_addr());
                chan.close().await;
                return;
            }
        };
        debug!(
            "received hello with requested game {game_id} from {}",
            chan.remote_addr()
        );
        counter!("gateway_connections_total").increment(1);

        if let Some(sub) = self.subs.get(&game_id).map(|e| e.value().clone()) {
            sub.accept(chan).await;
            return;
        }

        let mut game = match self.source.fetch(game_id).await {
            Ok(g) => g,
            Err(e) => {
                error!("error retrieving data for game {game_id}: {e}");
                chan.close().await;
                return;
            }
        };
        if game.is_empty() {
            error!("{}", GatewayError::EmptySnapshot(game_id));
            chan.close().await;
            return;
        }
        game.meta.id = game_id;
        {
            let games = self.games.read().expect("games lock");
            if let Some(m) = games.iter().find(|m| m.id == game_id) {
                game.meta.start = m.start;
                game.meta.end = m.end;
                game.meta.status = m.status;
            }
        }
        game.tweets = self.tweets.read().expect("tweets lock").as_ref().clone();

        let sub = self
            .subs
            .entry(game_id)
            .or_insert_with(|| Arc::new(Subscription::new(game_id, game, &self.assets)))
            .clone();
        sub.accept(chan).await;
    }

    async fn close_all(&self) {
        let subs: Vec<Arc<Subscription>> = self.subs.iter().map(|e| e.value().clone()).collect();
        for sub in subs {
            sub.shutdown().await;
        }
        self.subs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_lowercase_dashed() {
        assert_eq!(slugify("Alpha"), "alpha");
        assert_eq!(slugify("Cyber City 2024"), "cyber-city-2024");
        assert_eq!(slugify("Red -vs- Blue!"), "red-vs-blue");
        assert_eq!(slugify("  "), "");
    }
}
