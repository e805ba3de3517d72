//! # Authors
//!
//! Registration, the follow/block graph and the derived profile
//! attributes. Counters are computed on demand from published entries;
//! nothing here is cached on the author row.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domains::{
    nice_entry_threshold, AppError, Author, AuthorRepo, CategoryRepo, Clock, Entry, EntryRepo,
    EntryWindow, MessagePreference, NewAuthor, Result, VerificationRepo,
};
use tracing::info;
use uuid::Uuid;

/// Everything the profile page shows about an author's writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorStats {
    pub entry_count: u64,
    pub entry_count_day: u64,
    pub entry_count_week: u64,
    pub entry_count_month: u64,
    pub last_entry_date: Option<DateTime<Utc>>,
    pub entry_nice: Option<Entry>,
}

pub struct AuthorService {
    authors: Arc<dyn AuthorRepo>,
    categories: Arc<dyn CategoryRepo>,
    entries: Arc<dyn EntryRepo>,
    verifications: Arc<dyn VerificationRepo>,
    clock: Arc<dyn Clock>,
}

impl AuthorService {
    pub fn new(
        authors: Arc<dyn AuthorRepo>,
        categories: Arc<dyn CategoryRepo>,
        entries: Arc<dyn EntryRepo>,
        verifications: Arc<dyn VerificationRepo>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            authors,
            categories,
            entries,
            verifications,
            clock,
        }
    }

    /// Creates the author and subscribes them to every existing category.
    pub async fn register(&self, new: NewAuthor) -> Result<Author> {
        let username = new.username.trim();
        let email = new.email.trim();
        if username.is_empty() {
            return Err(AppError::validation("username cannot be empty"));
        }
        if email.is_empty() {
            return Err(AppError::validation("email cannot be empty"));
        }

        let category_ids: Vec<Uuid> = self
            .categories
            .list_categories()
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();

        let author = Author::from_new(
            NewAuthor {
                username: username.to_string(),
                email: email.to_string(),
                is_novice: new.is_novice,
            },
            self.clock.now(),
        );
        self.authors.insert_author(&author, &category_ids).await?;
        info!(author = %author.id, username = %author.username, categories = category_ids.len(), "author registered");
        Ok(author)
    }

    pub async fn get(&self, id: Uuid) -> Result<Author> {
        self.authors
            .get_author(id)
            .await?
            .ok_or_else(|| AppError::not_found("Author", id))
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<Author>> {
        self.authors.find_by_username(username).await
    }

    /// Writes only the preference; the application state is owned by the
    /// entry lifecycle.
    pub async fn set_message_preference(&self, id: Uuid, preference: MessagePreference) -> Result<Author> {
        if !self.authors.set_message_preference(id, preference).await? {
            return Err(AppError::not_found("Author", id));
        }
        self.get(id).await
    }

    pub async fn follow(&self, follower: Uuid, followee: Uuid) -> Result<()> {
        if follower == followee {
            return Err(AppError::validation("authors cannot follow themselves"));
        }
        self.get(follower).await?;
        self.get(followee).await?;
        self.authors.add_following(follower, followee).await
    }

    pub async fn unfollow(&self, follower: Uuid, followee: Uuid) -> Result<()> {
        self.authors.remove_following(follower, followee).await
    }

    /// Blocks `blocked` for `blocker` and drops any following between them.
    pub async fn block(&self, blocker: Uuid, blocked: Uuid) -> Result<()> {
        if blocker == blocked {
            return Err(AppError::validation("authors cannot block themselves"));
        }
        self.get(blocker).await?;
        self.get(blocked).await?;
        self.authors.add_block(blocker, blocked).await?;
        self.authors.remove_following(blocker, blocked).await?;
        self.authors.remove_following(blocked, blocker).await?;
        info!(blocker = %blocker, blocked = %blocked, "author blocked");
        Ok(())
    }

    pub async fn unblock(&self, blocker: Uuid, blocked: Uuid) -> Result<()> {
        self.authors.remove_block(blocker, blocked).await
    }

    pub async fn followers(&self, id: Uuid) -> Result<Vec<Author>> {
        self.authors.followers(id).await
    }

    pub async fn following(&self, id: Uuid) -> Result<Vec<Author>> {
        self.authors.following(id).await
    }

    pub async fn followed_category_ids(&self, id: Uuid) -> Result<Vec<Uuid>> {
        self.authors.followed_category_ids(id).await
    }

    pub async fn entry_count(&self, id: Uuid) -> Result<u64> {
        self.entries.count_published_by(id, None).await
    }

    pub async fn entry_count_in(&self, id: Uuid, window: EntryWindow) -> Result<u64> {
        let since = window.since(self.clock.now());
        self.entries.count_published_by(id, Some(since)).await
    }

    pub async fn last_entry_date(&self, id: Uuid) -> Result<Option<DateTime<Utc>>> {
        self.entries.latest_published_by(id).await
    }

    /// The author's best published entry, if any scored above the nice threshold.
    pub async fn entry_nice(&self, id: Uuid) -> Result<Option<Entry>> {
        self.entries.best_published_by(id, &nice_entry_threshold()).await
    }

    /// False while an unexpired e-mail verification is outstanding.
    pub async fn email_confirmed(&self, id: Uuid) -> Result<bool> {
        let pending = self
            .verifications
            .has_live_verification(id, self.clock.now())
            .await?;
        Ok(!pending)
    }

    pub async fn profile_stats(&self, id: Uuid) -> Result<AuthorStats> {
        Ok(AuthorStats {
            entry_count: self.entry_count(id).await?,
            entry_count_day: self.entry_count_in(id, EntryWindow::Day).await?,
            entry_count_week: self.entry_count_in(id, EntryWindow::Week).await?,
            entry_count_month: self.entry_count_in(id, EntryWindow::Month).await?,
            last_entry_date: self.last_entry_date(id).await?,
            entry_nice: self.entry_nice(id).await?,
        })
    }
}
