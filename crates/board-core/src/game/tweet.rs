//! Tweets grafted into a snapshot before diffing.

use super::Entity;
use crate::plan::Planner;

/// One retained tweet. Content never changes for a given id, so the diff
/// only cares about presence: a tweet is either carried, brand new, or
/// expired (removed).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tweet {
    pub id: u64,
    /// Display name.
    pub user: String,
    /// Handle, without the leading `@`.
    pub user_name: String,
    pub user_photo: String,
    pub text: String,
    pub images: Vec<String>,
    /// Absolute expiry, epoch seconds.
    pub expire: i64,
}

impl Tweet {
    pub(crate) fn compare(&self, p: &mut Planner, old: Option<&Tweet>) {
        let id = format!("tweet-t{}", self.id);
        match old {
            Some(_) => p.value(&id, "", "tweet"),
            None => p.delta_value(&id, "", "tweet"),
        }
        p.push_scope(&id);
        if old.is_some() {
            p.value("pic", "", "tweet-pic");
            p.property("pic-img", format!("url('{}')", self.user_photo), "background-image");
            p.value("user", self.user.as_str(), "tweet-user");
            p.value("user-name", self.user_name.as_str(), "tweet-username");
            p.value("user-content", self.text.as_str(), "tweet-content");
            p.value("image", "", "tweet-media");
            for (n, img) in self.images.iter().enumerate() {
                p.value(&format!("image-{n}"), "", "tweet-image");
                p.property(&format!("image-{n}"), format!("url('{img}')"), "background-image");
            }
            p.pop_prefix();
            return;
        }
        p.delta_value("pic", "", "tweet-pic");
        p.delta_property("pic-img", format!("url('{}')", self.user_photo), "background-image");
        p.delta_value("user", self.user.as_str(), "tweet-user");
        p.delta_value("user-name", self.user_name.as_str(), "tweet-username");
        p.delta_value("user-content", self.text.as_str(), "tweet-content");
        p.delta_value("image", "", "tweet-media");
        for (n, img) in self.images.iter().enumerate() {
            p.delta_value(&format!("image-{n}"), "", "tweet-image");
            p.delta_property(&format!("image-{n}"), format!("url('{img}')"), "background-image");
        }
        p.pop_prefix();
    }
}

impl Entity for Tweet {
    fn id(&self) -> u64 {
        self.id
    }

    fn compare(&self, p: &mut Planner, old: Option<&Self>) {
        Tweet::compare(self, p, old);
    }

    fn remove_id(id: u64) -> String {
        format!("tweet-t{id}")
    }
}
