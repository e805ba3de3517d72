use async_trait::async_trait;
use domains::{Result, Topic, TopicFollowing, TopicRepo};
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use super::{col, db_err, SqliteStore};

fn topic_from_row(row: &SqliteRow) -> Result<Topic> {
    Ok(Topic {
        id: col(row, "id")?,
        title: col(row, "title")?,
        slug: col(row, "slug")?,
        created_by: col(row, "created_by")?,
        created_at: col(row, "created_at")?,
    })
}

fn following_from_row(row: &SqliteRow) -> Result<TopicFollowing> {
    Ok(TopicFollowing {
        id: col(row, "id")?,
        topic_id: col(row, "topic_id")?,
        author_id: col(row, "author_id")?,
        read_at: col(row, "read_at")?,
        created_at: col(row, "created_at")?,
    })
}

#[async_trait]
impl TopicRepo for SqliteStore {
    async fn insert_topic(&self, topic: &Topic) -> Result<()> {
        sqlx::query("INSERT INTO topics (id, title, slug, created_by, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(topic.id)
            .bind(&topic.title)
            .bind(&topic.slug)
            .bind(topic.created_by)
            .bind(topic.created_at)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn get_topic(&self, id: Uuid) -> Result<Option<Topic>> {
        sqlx::query("SELECT * FROM topics WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(topic_from_row)
            .transpose()
    }

    async fn find_topic_by_slug(&self, slug: &str) -> Result<Option<Topic>> {
        sqlx::query("SELECT * FROM topics WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(topic_from_row)
            .transpose()
    }

    async fn find_topic_by_title(&self, title: &str) -> Result<Option<Topic>> {
        sqlx::query("SELECT * FROM topics WHERE title = ?")
            .bind(title)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(topic_from_row)
            .transpose()
    }

    async fn topic_slug_taken(&self, slug: &str) -> Result<bool> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM topics WHERE slug = ?)")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn insert_topic_following(&self, following: &TopicFollowing) -> Result<()> {
        sqlx::query(
            "INSERT INTO topic_following (id, topic_id, author_id, read_at, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(following.id)
        .bind(following.topic_id)
        .bind(following.author_id)
        .bind(following.read_at)
        .bind(following.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn delete_topic_following(&self, topic: Uuid, author: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM topic_following WHERE topic_id = ? AND author_id = ?")
            .bind(topic)
            .bind(author)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn topic_following(&self, topic: Uuid, author: Uuid) -> Result<Option<TopicFollowing>> {
        sqlx::query("SELECT * FROM topic_following WHERE topic_id = ? AND author_id = ?")
            .bind(topic)
            .bind(author)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(following_from_row)
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::super::test_support::{author, store, topic};
    use super::*;

    #[tokio::test]
    async fn lookups_by_title_and_slug() {
        let store = store().await;
        let t = topic(&store, "zeki müren").await;

        assert_eq!(store.find_topic_by_title("zeki müren").await.unwrap(), Some(t.clone()));
        assert_eq!(store.find_topic_by_slug(&t.slug).await.unwrap(), Some(t.clone()));
        assert!(store.topic_slug_taken(&t.slug).await.unwrap());
        assert!(store.find_topic_by_title("zeki muren").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn topic_following_round_trip() {
        let store = store().await;
        let reader = author(&store, "reader").await;
        let t = topic(&store, "takip").await;
        let now = Utc::now();
        let following = TopicFollowing {
            id: Uuid::now_v7(),
            topic_id: t.id,
            author_id: reader.id,
            read_at: now,
            created_at: now,
        };

        store.insert_topic_following(&following).await.unwrap();
        assert_eq!(store.topic_following(t.id, reader.id).await.unwrap(), Some(following));
        assert!(store.delete_topic_following(t.id, reader.id).await.unwrap());
        assert!(!store.delete_topic_following(t.id, reader.id).await.unwrap());
        assert!(store.topic_following(t.id, reader.id).await.unwrap().is_none());
    }
}
