//! # Topics
//!
//! Topic creation plus the per-viewer derived attributes shown on topic
//! lists: whether anything is published yet, when the last visible entry
//! arrived, and whether the viewer follows the topic.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domains::text::normalize_title;
use domains::{
    AppError, AuthorRepo, Clock, EntryRepo, Result, Topic, TopicFollowing, TopicRepo,
};
use tracing::info;
use uuid::Uuid;

use crate::slugs::unique_slug;

pub struct TopicService {
    topics: Arc<dyn TopicRepo>,
    entries: Arc<dyn EntryRepo>,
    authors: Arc<dyn AuthorRepo>,
    clock: Arc<dyn Clock>,
}

impl TopicService {
    pub fn new(
        topics: Arc<dyn TopicRepo>,
        entries: Arc<dyn EntryRepo>,
        authors: Arc<dyn AuthorRepo>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            topics,
            entries,
            authors,
            clock,
        }
    }

    /// Creates a topic without an owner. The title is normalized first; a
    /// title that is already taken fails with `Conflict` at the store.
    pub async fn create_topic(&self, title: &str) -> Result<Topic> {
        let title = normalize_title(title);
        if title.is_empty() {
            return Err(AppError::validation("topic title cannot be empty"));
        }

        let topics = &self.topics;
        let slug = unique_slug(&title, |candidate| async move {
            topics.topic_slug_taken(&candidate).await
        })
        .await?;

        let topic = Topic {
            id: Uuid::now_v7(),
            title,
            slug,
            created_by: None,
            created_at: self.clock.now(),
        };
        self.topics.insert_topic(&topic).await?;
        info!(topic = %topic.id, slug = %topic.slug, "topic created");
        Ok(topic)
    }

    pub async fn get(&self, id: Uuid) -> Result<Topic> {
        self.topics
            .get_topic(id)
            .await?
            .ok_or_else(|| AppError::not_found("Topic", id))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Topic>> {
        self.topics.find_topic_by_slug(slug).await
    }

    pub async fn find_by_title(&self, title: &str) -> Result<Option<Topic>> {
        self.topics.find_topic_by_title(&normalize_title(title)).await
    }

    pub async fn has_entries(&self, id: Uuid) -> Result<bool> {
        self.entries.topic_has_published(id).await
    }

    /// Date of the newest published entry the viewer would care about: their
    /// own entries and those of authors they block do not count. Falls back
    /// to the topic's creation date.
    pub async fn latest_entry_date(&self, id: Uuid, viewer: Option<Uuid>) -> Result<DateTime<Utc>> {
        let topic = self.get(id).await?;

        let excluded = match viewer {
            Some(viewer) => {
                let mut excluded = self.authors.blocked_ids(viewer).await?;
                excluded.push(viewer);
                excluded
            }
            None => Vec::new(),
        };

        let latest = self
            .entries
            .latest_published_in_topic(topic.id, &excluded)
            .await?;
        Ok(latest.unwrap_or(topic.created_at))
    }

    pub async fn follow_check(&self, id: Uuid, viewer: Uuid) -> Result<bool> {
        Ok(self.topics.topic_following(id, viewer).await?.is_some())
    }

    pub async fn follow(&self, id: Uuid, author: Uuid) -> Result<TopicFollowing> {
        self.get(id).await?;
        let now = self.clock.now();
        let following = TopicFollowing {
            id: Uuid::now_v7(),
            topic_id: id,
            author_id: author,
            read_at: now,
            created_at: now,
        };
        self.topics.insert_topic_following(&following).await?;
        Ok(following)
    }

    pub async fn unfollow(&self, id: Uuid, author: Uuid) -> Result<bool> {
        self.topics.delete_topic_following(id, author).await
    }
}
