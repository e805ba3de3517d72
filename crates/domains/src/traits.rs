//! # Core Traits (Ports)
//!
//! Any storage adapter must implement these traits to back the services.
//! Unique-constraint violations surface as [`AppError::Conflict`]; every
//! other adapter failure is [`AppError::Internal`].
//!
//! [`AppError::Conflict`]: crate::error::AppError::Conflict
//! [`AppError::Internal`]: crate::error::AppError::Internal

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Author, Category, Conversation, Delivery, Entry, EntryFavorite, EntryWrite, GeneralReport,
    Memento, Message, MessagePreference, OutgoingMessage, ParticipantPair, StatusReview, Topic,
    TopicFollowing, UserVerification,
};

/// Authors and the directed relations between them.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AuthorRepo: Send + Sync {
    /// Inserts the author and subscribes them to `category_ids` atomically.
    async fn insert_author(&self, author: &Author, category_ids: &[Uuid]) -> Result<()>;
    async fn get_author(&self, id: Uuid) -> Result<Option<Author>>;
    async fn find_by_username(&self, username: &str) -> Result<Option<Author>>;
    /// Writes only the preference column. Returns false for an unknown author.
    async fn set_message_preference(&self, id: Uuid, preference: MessagePreference) -> Result<bool>;

    // Following (directed). Adding an existing edge is a no-op.
    async fn add_following(&self, follower: Uuid, followee: Uuid) -> Result<()>;
    async fn remove_following(&self, follower: Uuid, followee: Uuid) -> Result<()>;
    async fn is_following(&self, follower: Uuid, followee: Uuid) -> Result<bool>;
    /// Authors whose following set includes `author`.
    async fn followers(&self, author: Uuid) -> Result<Vec<Author>>;
    async fn following(&self, author: Uuid) -> Result<Vec<Author>>;

    // Blocking (directed storage, symmetric effect).
    async fn add_block(&self, blocker: Uuid, blocked: Uuid) -> Result<()>;
    async fn remove_block(&self, blocker: Uuid, blocked: Uuid) -> Result<()>;
    async fn blocked_ids(&self, blocker: Uuid) -> Result<Vec<Uuid>>;
    /// True when either author has blocked the other.
    async fn blocks_between(&self, a: Uuid, b: Uuid) -> Result<bool>;

    async fn followed_category_ids(&self, author: Uuid) -> Result<Vec<Uuid>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CategoryRepo: Send + Sync {
    async fn insert_category(&self, category: &Category) -> Result<()>;
    async fn list_categories(&self) -> Result<Vec<Category>>;
    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>>;
    async fn category_slug_taken(&self, slug: &str) -> Result<bool>;
}

/// Topics and per-author topic subscriptions.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TopicRepo: Send + Sync {
    async fn insert_topic(&self, topic: &Topic) -> Result<()>;
    async fn get_topic(&self, id: Uuid) -> Result<Option<Topic>>;
    async fn find_topic_by_slug(&self, slug: &str) -> Result<Option<Topic>>;
    async fn find_topic_by_title(&self, title: &str) -> Result<Option<Topic>>;
    async fn topic_slug_taken(&self, slug: &str) -> Result<bool>;

    async fn insert_topic_following(&self, following: &TopicFollowing) -> Result<()>;
    async fn delete_topic_following(&self, topic: Uuid, author: Uuid) -> Result<bool>;
    async fn topic_following(&self, topic: Uuid, author: Uuid) -> Result<Option<TopicFollowing>>;
}

/// Entries plus the aggregate queries the derived attributes are built on.
/// "Published" always means `is_draft = false`.
///
/// Every write that changes an author's published count also claims the
/// topic creator (on publish) and recomputes the author's application
/// status in the same transaction, stamping `now` on a move to pending.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EntryRepo: Send + Sync {
    async fn insert_entry(&self, entry: &Entry, now: DateTime<Utc>) -> Result<EntryWrite>;
    async fn get_entry(&self, id: Uuid) -> Result<Option<Entry>>;
    /// Flips a draft to published. `None` when the entry does not exist; an
    /// entry that was already published comes back with no side effects.
    async fn publish_entry(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<EntryWrite>>;
    /// `None` when there was nothing to delete.
    async fn delete_entry(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<EntryWrite>>;
    /// Recomputes the author's application status from their published count.
    async fn refresh_application_status(&self, author: Uuid, now: DateTime<Utc>) -> Result<StatusReview>;
    /// Adds `delta` to the stored rate atomically and returns the new rate.
    async fn add_vote(&self, id: Uuid, delta: &BigDecimal) -> Result<BigDecimal>;

    /// Published entries by `author`, optionally only those created at or after `since`.
    async fn count_published_by(&self, author: Uuid, since: Option<DateTime<Utc>>) -> Result<u64>;
    async fn latest_published_by(&self, author: Uuid) -> Result<Option<DateTime<Utc>>>;
    /// Highest-rated published entry by `author` whose rate is strictly above `above`.
    async fn best_published_by(&self, author: Uuid, above: &BigDecimal) -> Result<Option<Entry>>;

    async fn topic_has_published(&self, topic: Uuid) -> Result<bool>;
    /// Newest published entry date in `topic`, ignoring entries by `excluded_authors`.
    async fn latest_published_in_topic(
        &self,
        topic: Uuid,
        excluded_authors: &[Uuid],
    ) -> Result<Option<DateTime<Utc>>>;
}

/// Private messages and the conversations grouping them.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageRepo: Send + Sync {
    /// Finds or creates the conversation for the message's participant pair
    /// and stores the message in it, in a single transaction.
    async fn deliver(&self, message: &OutgoingMessage) -> Result<Delivery>;
    async fn get_message(&self, id: Uuid) -> Result<Option<Message>>;
    async fn mark_message_read(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<Message>>;

    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>>;
    async fn find_conversation(&self, pair: ParticipantPair) -> Result<Option<Conversation>>;
    async fn conversations_of(&self, author: Uuid) -> Result<Vec<Conversation>>;
    /// Messages oldest first.
    async fn conversation_messages(&self, conversation: Uuid) -> Result<Vec<Message>>;
    async fn last_message(&self, conversation: Uuid) -> Result<Option<Message>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait VerificationRepo: Send + Sync {
    /// Deletes every verification of the author and stores `verification`.
    async fn replace_verification(&self, verification: &UserVerification) -> Result<()>;
    async fn delete_verifications(&self, author: Uuid) -> Result<u64>;
    async fn verifications_for(&self, author: Uuid) -> Result<Vec<UserVerification>>;
    async fn has_live_verification(&self, author: Uuid, now: DateTime<Utc>) -> Result<bool>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MementoRepo: Send + Sync {
    async fn insert_memento(&self, memento: &Memento) -> Result<()>;
    async fn find_memento(&self, holder: Uuid, patient: Uuid) -> Result<Option<Memento>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait FavoriteRepo: Send + Sync {
    async fn insert_favorite(&self, favorite: &EntryFavorite) -> Result<()>;
    async fn delete_favorite(&self, author: Uuid, entry: Uuid) -> Result<bool>;
    async fn favorite_entry_ids(&self, author: Uuid) -> Result<Vec<Uuid>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ReportRepo: Send + Sync {
    async fn insert_report(&self, report: &GeneralReport) -> Result<()>;
}

/// Everything a full storage backend provides.
pub trait Store:
    AuthorRepo
    + CategoryRepo
    + TopicRepo
    + EntryRepo
    + MessageRepo
    + VerificationRepo
    + MementoRepo
    + FavoriteRepo
    + ReportRepo
    + 'static
{
}

impl<T> Store for T where
    T: AuthorRepo
        + CategoryRepo
        + TopicRepo
        + EntryRepo
        + MessageRepo
        + VerificationRepo
        + MementoRepo
        + FavoriteRepo
        + ReportRepo
        + 'static
{
}
