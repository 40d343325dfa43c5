//! Tweet intake: filtering, normalization, and the bounded buffer the
//! tick drains.
//!
//! The feed side must never block: [`TweetSender::push`] filters,
//! normalizes and `try_send`s into a bounded channel, dropping the tweet
//! when the channel is full. The tick side drains the channel into the
//! retained list and expires old entries; the retained list is what gets
//! grafted into every snapshot before diffing.

use board_core::Tweet;
use metrics::counter;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Bound on tweets waiting between two ticks.
pub const TWEET_QUEUE_CAPACITY: usize = 2048;

/// Intake policy applied before a tweet enters the buffer.
#[derive(Debug, Clone, Default)]
pub struct TweetFilter {
    /// Informational: the upstream feed is already language-constrained.
    pub languages: Vec<String>,
    /// Handles whose tweets are dropped.
    pub blocked_users: Vec<String>,
    /// Substrings that disqualify a tweet's text.
    pub blocked_words: Vec<String>,
    /// When non-empty, only these handles pass.
    pub only_users: Vec<String>,
}

impl TweetFilter {
    /// Does a tweet from `handle` with body `text` pass the policy?
    /// `handle` is matched case-insensitively.
    pub fn matches(&self, handle: &str, text: &str) -> bool {
        let handle = handle.to_lowercase();
        if self
            .blocked_users
            .iter()
            .any(|u| u.to_lowercase() == handle)
        {
            return false;
        }
        if self.blocked_words.iter().any(|w| text.contains(w)) {
            return false;
        }
        if !self.only_users.is_empty() {
            return self.only_users.iter().any(|u| u.to_lowercase() == handle);
        }
        true
    }
}

/// A retweeted status carried inside a raw feed tweet.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct FeedRetweet {
    pub handle: String,
    pub text: String,
}

/// One media entity attached to a raw feed tweet. Only `photo` entities
/// contribute images to the board.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct FeedMedia {
    pub kind: String,
    pub url: String,
}

/// The raw form the external feed hands over, one per callback.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct FeedTweet {
    pub id: u64,
    /// Display name.
    pub user: String,
    /// Handle, without the leading `@`.
    pub handle: String,
    #[serde(default)]
    pub photo: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub retweet: Option<FeedRetweet>,
    #[serde(default)]
    pub media: Vec<FeedMedia>,
}

impl FeedTweet {
    /// Apply the retweet rewrite and the photo-only media rule.
    fn normalize(self, expire: i64) -> Tweet {
        let text = match &self.retweet {
            Some(rt) if self.text.is_empty() => format!("RT @{}: {}", rt.handle, rt.text),
            Some(rt) => format!("{}\nRT @{}: {}", self.text, rt.handle, rt.text),
            None => self.text,
        };
        let images = self
            .media
            .into_iter()
            .filter(|m| m.kind == "photo")
            .map(|m| m.url)
            .collect();
        Tweet {
            id: self.id,
            user: self.user,
            user_name: self.handle,
            user_photo: self.photo,
            text,
            images,
            expire,
        }
    }
}

/// Producer half: the non-blocking push callback handed to the feed.
#[derive(Clone)]
pub struct TweetSender {
    tx: mpsc::Sender<Tweet>,
    filter: TweetFilter,
    retention_secs: i64,
}

impl TweetSender {
    /// Feed callback. Filters, stamps the expiry and enqueues; drops the
    /// tweet when the queue is full so the feed never blocks on us.
    pub fn push(&self, raw: FeedTweet) {
        if !self.filter.matches(&raw.handle, &raw.text) {
            debug!("tweet {} from @{} filtered out", raw.id, raw.handle);
            return;
        }
        let now = chrono::Utc::now().timestamp();
        let tweet = raw.normalize(now + self.retention_secs);
        if self.tx.try_send(tweet).is_err() {
            counter!("gateway_tweets_dropped_total").increment(1);
            warn!("tweet queue full, dropping tweet");
        }
    }
}

/// Consumer half, owned by the tick.
pub struct TweetBuffer {
    rx: mpsc::Receiver<Tweet>,
    current: Vec<Tweet>,
}

impl TweetBuffer {
    /// Drain the intake queue and expire stale entries. Returns the
    /// retained list as of `now`.
    pub fn sync(&mut self, now: i64) -> &[Tweet] {
        while let Ok(t) = self.rx.try_recv() {
            self.current.push(t);
        }
        self.current.retain(|t| {
            if t.expire > now {
                return true;
            }
            debug!("removed tweet {} due to timeout", t.id);
            false
        });
        &self.current
    }
}

/// Build the intake queue: the sender goes to the feed, the buffer to
/// the collection tick.
pub fn tweet_queue(filter: TweetFilter, retention: std::time::Duration) -> (TweetSender, TweetBuffer) {
    let (tx, rx) = mpsc::channel(TWEET_QUEUE_CAPACITY);
    (
        TweetSender {
            tx,
            filter,
            retention_secs: retention.as_secs() as i64,
        },
        TweetBuffer {
            rx,
            current: Vec::new(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: u64, handle: &str, text: &str) -> FeedTweet {
        FeedTweet {
            id,
            user: "User".to_owned(),
            handle: handle.to_owned(),
            photo: String::new(),
            text: text.to_owned(),
            retweet: None,
            media: Vec::new(),
        }
    }

    #[test]
    fn blocked_users_are_excluded() {
        let f = TweetFilter {
            blocked_users: vec!["Spammer".to_owned()],
            ..TweetFilter::default()
        };
        assert!(!f.matches("spammer", "hello"));
        assert!(f.matches("friend", "hello"));
    }

    #[test]
    fn blocked_words_are_excluded() {
        let f = TweetFilter {
            blocked_words: vec!["casino".to_owned()],
            ..TweetFilter::default()
        };
        assert!(!f.matches("anyone", "best casino odds"));
        assert!(f.matches("anyone", "best ctf odds"));
    }

    #[test]
    fn allow_list_excludes_non_members() {
        let f = TweetFilter {
            only_users: vec!["Organizer".to_owned()],
            ..TweetFilter::default()
        };
        assert!(f.matches("organizer", "scores!"));
        assert!(!f.matches("random", "scores!"));
    }

    #[test]
    fn retweets_get_the_rt_line() {
        let mut t = raw(1, "fan", "look at this");
        t.retweet = Some(FeedRetweet {
            handle: "organizer".to_owned(),
            text: "scores are live".to_owned(),
        });
        let n = t.normalize(0);
        assert_eq!(n.text, "look at this\nRT @organizer: scores are live");

        let mut t = raw(2, "fan", "");
        t.retweet = Some(FeedRetweet {
            handle: "organizer".to_owned(),
            text: "scores are live".to_owned(),
        });
        assert_eq!(t.normalize(0).text, "RT @organizer: scores are live");
    }

    #[test]
    fn only_photo_media_contribute_images() {
        let mut t = raw(3, "fan", "pics");
        t.media = vec![
            FeedMedia {
                kind: "photo".to_owned(),
                url: "http://img/1.jpg".to_owned(),
            },
            FeedMedia {
                kind: "video".to_owned(),
                url: "http://img/2.mp4".to_owned(),
            },
        ];
        assert_eq!(t.normalize(0).images, vec!["http://img/1.jpg"]);
    }

    #[tokio::test]
    async fn sync_drains_and_expires() {
        let (sender, mut buffer) = tweet_queue(TweetFilter::default(), std::time::Duration::from_secs(5));
        sender.push(raw(7, "fan", "hi"));

        let now = chrono::Utc::now().timestamp();
        let retained = buffer.sync(now);
        assert_eq!(retained.len(), 1);
        assert_eq!(retained[0].id, 7);

        // Jump past the expiry: the tweet goes away and stays away.
        assert!(buffer.sync(now + 6).is_empty());
        assert!(buffer.sync(now + 7).is_empty());
    }

    #[tokio::test]
    async fn retention_is_monotonic() {
        let (_, mut buffer) = tweet_queue(TweetFilter::default(), std::time::Duration::from_secs(5));
        for (id, expire) in [(1u64, 10i64), (2, 20), (3, 30)] {
            buffer.current.push(Tweet {
                id,
                expire,
                ..Tweet::default()
            });
        }
        let early: Vec<u64> = buffer.sync(15).iter().map(|t| t.id).collect();
        let late: Vec<u64> = buffer.sync(25).iter().map(|t| t.id).collect();
        assert_eq!(early, vec![2, 3]);
        assert_eq!(late, vec![3]);
        assert!(late.iter().all(|id| early.contains(id)));
    }

    #[tokio::test]
    async fn filtered_tweets_never_enter_the_queue() {
        let filter = TweetFilter {
            blocked_users: vec!["spammer".to_owned()],
            ..TweetFilter::default()
        };
        let (sender, mut buffer) = tweet_queue(filter, std::time::Duration::from_secs(5));
        sender.push(raw(8, "spammer", "junk"));
        assert!(buffer.sync(0).is_empty());
    }
}
