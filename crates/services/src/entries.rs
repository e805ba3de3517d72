//! # Entry lifecycle
//!
//! Creating, publishing and deleting entries. Every change to an author's
//! published set carries its side effects in the same storage write: the
//! first published entry of a topic claims it for its author, and the
//! novice application status is recomputed against
//! [`NOVICE_ENTRY_THRESHOLD`](domains::NOVICE_ENTRY_THRESHOLD).

use std::sync::Arc;

use bigdecimal::BigDecimal;
use domains::text::turkish_lowercase;
use domains::{
    AppError, ApplicationStatus, AuthorRepo, Clock, Entry, EntryRepo, EntryWrite, NewEntry, Result,
    StatusReview, TopicRepo, VoteKind,
};
use tracing::{debug, info};
use uuid::Uuid;

pub struct EntryService {
    entries: Arc<dyn EntryRepo>,
    topics: Arc<dyn TopicRepo>,
    authors: Arc<dyn AuthorRepo>,
    clock: Arc<dyn Clock>,
}

impl EntryService {
    pub fn new(
        entries: Arc<dyn EntryRepo>,
        topics: Arc<dyn TopicRepo>,
        authors: Arc<dyn AuthorRepo>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            entries,
            topics,
            authors,
            clock,
        }
    }

    pub async fn create(&self, new: NewEntry) -> Result<Entry> {
        if self.topics.get_topic(new.topic_id).await?.is_none() {
            return Err(AppError::not_found("Topic", new.topic_id));
        }
        if self.authors.get_author(new.author_id).await?.is_none() {
            return Err(AppError::not_found("Author", new.author_id));
        }

        let now = self.clock.now();
        let entry = Entry {
            id: Uuid::now_v7(),
            topic_id: new.topic_id,
            author_id: new.author_id,
            content: turkish_lowercase(new.content.trim()),
            is_draft: new.is_draft,
            vote_rate: BigDecimal::from(0),
            created_at: now,
        };
        let write = self.entries.insert_entry(&entry, now).await?;
        debug!(entry = %entry.id, topic = %entry.topic_id, draft = entry.is_draft, "entry created");
        Ok(report(write))
    }

    pub async fn get(&self, id: Uuid) -> Result<Entry> {
        self.entries
            .get_entry(id)
            .await?
            .ok_or_else(|| AppError::not_found("Entry", id))
    }

    /// Turns a draft into a published entry. Already published entries are
    /// returned untouched.
    pub async fn publish(&self, id: Uuid) -> Result<Entry> {
        let write = self
            .entries
            .publish_entry(id, self.clock.now())
            .await?
            .ok_or_else(|| AppError::not_found("Entry", id))?;
        Ok(report(write))
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let write = self
            .entries
            .delete_entry(id, self.clock.now())
            .await?
            .ok_or_else(|| AppError::not_found("Entry", id))?;
        debug!(entry = %id, "entry deleted");
        report(write);
        Ok(())
    }

    /// Accumulates a vote on the entry and returns the new rate.
    pub async fn update_vote(&self, id: Uuid, delta: &BigDecimal, kind: VoteKind) -> Result<BigDecimal> {
        let applied = kind.effective_delta(delta);
        let rate = self.entries.add_vote(id, &applied).await?;
        debug!(entry = %id, delta = %applied, rate = %rate, "vote applied");
        Ok(rate)
    }

    /// Moves a novice between `OnHold` and `Pending` when their published
    /// entry count has crossed the threshold. Non-novices and approved
    /// authors are left alone.
    pub async fn recompute_application_status(&self, author_id: Uuid) -> Result<ApplicationStatus> {
        let review = self
            .entries
            .refresh_application_status(author_id, self.clock.now())
            .await?;
        log_review(author_id, &review);
        Ok(review.to)
    }
}

fn report(write: EntryWrite) -> Entry {
    let entry = write.entry;
    if write.topic_claimed {
        info!(topic = %entry.topic_id, author = %entry.author_id, "topic creator assigned");
    }
    if let Some(review) = &write.review {
        log_review(entry.author_id, review);
    }
    entry
}

fn log_review(author: Uuid, review: &StatusReview) {
    if review.changed() {
        info!(
            author = %author,
            published = review.published,
            from = review.from.as_str(),
            status = review.to.as_str(),
            "application status changed"
        );
    }
}
