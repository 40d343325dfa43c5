//! Per-game fan-out context: one snapshot history, one set of clients.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use board_core::{Game, Meta, Tweet, Update};
use metrics::counter;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};

use crate::channel::ClientChannel;
use crate::source::SnapshotSource;

/// Bound on clients waiting to be folded in between two ticks.
pub const INCOMING_CAPACITY: usize = 2048;

struct ClientStream {
    chan: Box<dyn ClientChannel>,
    /// Guards against a second write to the same client within one tick.
    ok: bool,
}

/// Tick-owned state. Only the tick path (and subscription creation)
/// takes this lock.
struct Inner {
    last: Game,
    clients: Vec<ClientStream>,
    queue: mpsc::Receiver<Box<dyn ClientChannel>>,
}

/// One subscription per active game id. The hello path talks to the
/// shared face (`accept`, the cached create stream, the idle flag); the
/// collection's tick drives `update`.
pub struct Subscription {
    game_id: u64,
    /// True iff the previous tick observed zero clients. Two consecutive
    /// idle ticks evict the subscription.
    idle: AtomicBool,
    /// The create stream as of `last`, swapped whole on every tick.
    cache: RwLock<Arc<Vec<Update>>>,
    incoming: mpsc::Sender<Box<dyn ClientChannel>>,
    inner: Mutex<Inner>,
}

impl Subscription {
    /// Build a subscription around a first snapshot. The initial cache is
    /// the snapshot compared against nothing.
    pub fn new(game_id: u64, mut initial: Game, assets: &str) -> Self {
        let (create, _) = initial.delta(assets, None);
        let (tx, rx) = mpsc::channel(INCOMING_CAPACITY);
        Subscription {
            game_id,
            idle: AtomicBool::new(false),
            cache: RwLock::new(Arc::new(create)),
            incoming: tx,
            inner: Mutex::new(Inner {
                last: initial,
                clients: Vec::new(),
                queue: rx,
            }),
        }
    }

    pub fn game_id(&self) -> u64 {
        self.game_id
    }

    /// Set the idle tag, returning whether it was already set.
    pub(crate) fn mark_idle(&self) -> bool {
        self.idle.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn clear_idle(&self) {
        self.idle.store(false, Ordering::SeqCst);
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.idle.load(Ordering::SeqCst)
    }

    pub(crate) async fn client_count(&self) -> usize {
        self.inner.lock().await.clients.len()
    }

    /// Hand a new client to this subscription: paint the full board from
    /// the cached create stream, then queue the channel for the tick to
    /// fold in. A full queue closes the client instead of blocking.
    pub async fn accept(&self, mut chan: Box<dyn ClientChannel>) {
        self.clear_idle();
        let cache = self.cache.read().expect("cache lock").clone();
        if let Err(e) = chan.write_updates(&cache).await {
            warn!("could not write board to {}: {e}", chan.remote_addr());
            chan.close().await;
            return;
        }
        counter!("gateway_boards_painted_total").increment(1);
        if let Err(e) = self.incoming.try_send(chan) {
            warn!(
                "subscription for game {} cannot take more clients",
                self.game_id
            );
            let mut chan = match e {
                mpsc::error::TrySendError::Full(c) => c,
                mpsc::error::TrySendError::Closed(c) => c,
            };
            chan.close().await;
        }
    }

    /// One tick: fold in waiting clients, fetch a fresh snapshot, diff it
    /// against the previous one, push the delta to every live client and
    /// swap the snapshot and cache.
    ///
    /// Upstream failure skips the tick; the old cache keeps serving.
    /// Cancellation (the tick deadline dropping this future at an await
    /// point) leaves `last` and `cache` untouched — both swap only after
    /// the final client write.
    pub(crate) async fn update(
        &self,
        source: &dyn SnapshotSource,
        games: &[Meta],
        tweets: &[Tweet],
        assets: &str,
        write_timeout: Duration,
    ) {
        let mut inner = self.inner.lock().await;
        while let Ok(chan) = inner.queue.try_recv() {
            inner.clients.push(ClientStream { chan, ok: true });
        }

        debug!("checking for update for subscribed game {}", self.game_id);
        let mut game = match source.fetch(self.game_id).await {
            Ok(g) => g,
            Err(e) => {
                error!("error retrieving data for game {}: {e}", self.game_id);
                return;
            }
        };
        game.meta.id = self.game_id;
        if let Some(m) = games.iter().find(|m| m.id == self.game_id) {
            game.meta.start = m.start;
            game.meta.end = m.end;
            game.meta.status = m.status;
        }
        game.tweets = tweets.to_vec();

        let (create, delta) = game.delta(assets, Some(&inner.last));
        if !delta.is_empty() {
            debug!(
                "{} updates detected in game {}, updating clients",
                delta.len(),
                self.game_id
            );
            // Writes happen in place so a cancelled tick leaves the swarm
            // intact. A client abandoned mid-write keeps ok=false and is
            // swept below, on this pass or the next.
            for cs in inner.clients.iter_mut() {
                if !cs.ok {
                    continue;
                }
                cs.ok = false;
                match tokio::time::timeout(write_timeout, cs.chan.write_updates(&delta)).await {
                    Ok(Ok(())) => cs.ok = true,
                    Ok(Err(e)) => {
                        error!("client {} write failed, removing: {e}", cs.chan.remote_addr());
                    }
                    Err(_) => {
                        error!("client {} write timed out, removing", cs.chan.remote_addr());
                    }
                }
            }
            counter!("gateway_deltas_sent_total").increment(1);
        }

        let mut i = 0;
        while i < inner.clients.len() {
            if inner.clients[i].ok {
                i += 1;
                continue;
            }
            let mut cs = inner.clients.swap_remove(i);
            counter!("gateway_clients_dropped_total").increment(1);
            cs.chan.close().await;
        }

        // Clients that said hello while this tick was running were handed
        // the previous cache; repaint them from the fresh create stream so
        // they do not miss this tick's delta.
        while let Ok(mut chan) = inner.queue.try_recv() {
            match tokio::time::timeout(write_timeout, chan.write_updates(&create)).await {
                Ok(Ok(())) => inner.clients.push(ClientStream { chan, ok: true }),
                _ => chan.close().await,
            }
        }

        inner.last = game;
        *self.cache.write().expect("cache lock") = Arc::new(create);
    }

    /// Close every client and drain the intake queue. Shutdown only.
    pub(crate) async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        for mut cs in std::mem::take(&mut inner.clients) {
            cs.chan.close().await;
        }
        while let Ok(mut chan) = inner.queue.try_recv() {
            chan.close().await;
        }
    }
}
