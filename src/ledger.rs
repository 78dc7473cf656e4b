//! Cross-category set of user ids already represented in the sink.
//!
//! Rebuilt from the sink at run start; only ever grows.

use ahash::AHashSet;

#[derive(Debug, Default, Clone)]
pub struct UserLedger {
    users: AHashSet<String>,
}

impl UserLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { users: ids.into_iter().map(Into::into).collect() }
    }

    #[inline]
    pub fn contains(&self, user_id: &str) -> bool {
        self.users.contains(user_id)
    }

    /// Add ids, returning how many were new.
    pub fn absorb<'a, I>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let before = self.users.len();
        for id in ids {
            if !self.users.contains(id) {
                self.users.insert(id.to_string());
            }
        }
        self.users.len() - before
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
