use async_trait::async_trait;
use domains::{Author, AuthorRepo, MessagePreference, Result};
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use super::{col, db_err, parse_col, SqliteStore};

fn author_from_row(row: &SqliteRow) -> Result<Author> {
    Ok(Author {
        id: col(row, "id")?,
        username: col(row, "username")?,
        email: col(row, "email")?,
        message_preference: parse_col(row, "message_preference")?,
        is_novice: col(row, "is_novice")?,
        application_status: parse_col(row, "application_status")?,
        application_date: col(row, "application_date")?,
        created_at: col(row, "created_at")?,
    })
}

#[async_trait]
impl AuthorRepo for SqliteStore {
    /// Registration and category subscriptions commit together.
    async fn insert_author(&self, author: &Author, category_ids: &[Uuid]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            "INSERT INTO authors (id, username, email, message_preference, is_novice, application_status, application_date, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(author.id)
        .bind(&author.username)
        .bind(&author.email)
        .bind(author.message_preference.as_str())
        .bind(author.is_novice)
        .bind(author.application_status.as_str())
        .bind(author.application_date)
        .bind(author.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        for category_id in category_ids {
            sqlx::query("INSERT INTO author_category_follows (author_id, category_id) VALUES (?, ?)")
                .bind(author.id)
                .bind(category_id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn get_author(&self, id: Uuid) -> Result<Option<Author>> {
        sqlx::query("SELECT * FROM authors WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(author_from_row)
            .transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Author>> {
        sqlx::query("SELECT * FROM authors WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(author_from_row)
            .transpose()
    }

    async fn set_message_preference(&self, id: Uuid, preference: MessagePreference) -> Result<bool> {
        let result = sqlx::query("UPDATE authors SET message_preference = ? WHERE id = ?")
            .bind(preference.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn add_following(&self, follower: Uuid, followee: Uuid) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO author_following (follower_id, followee_id) VALUES (?, ?)")
            .bind(follower)
            .bind(followee)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn remove_following(&self, follower: Uuid, followee: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM author_following WHERE follower_id = ? AND followee_id = ?")
            .bind(follower)
            .bind(followee)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn is_following(&self, follower: Uuid, followee: Uuid) -> Result<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM author_following WHERE follower_id = ? AND followee_id = ?)",
        )
        .bind(follower)
        .bind(followee)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn followers(&self, author: Uuid) -> Result<Vec<Author>> {
        sqlx::query(
            "SELECT a.* FROM authors a JOIN author_following f ON f.follower_id = a.id \
             WHERE f.followee_id = ? ORDER BY a.username",
        )
        .bind(author)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .iter()
        .map(author_from_row)
        .collect()
    }

    async fn following(&self, author: Uuid) -> Result<Vec<Author>> {
        sqlx::query(
            "SELECT a.* FROM authors a JOIN author_following f ON f.followee_id = a.id \
             WHERE f.follower_id = ? ORDER BY a.username",
        )
        .bind(author)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .iter()
        .map(author_from_row)
        .collect()
    }

    async fn add_block(&self, blocker: Uuid, blocked: Uuid) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO author_blocks (blocker_id, blocked_id) VALUES (?, ?)")
            .bind(blocker)
            .bind(blocked)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn remove_block(&self, blocker: Uuid, blocked: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM author_blocks WHERE blocker_id = ? AND blocked_id = ?")
            .bind(blocker)
            .bind(blocked)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn blocked_ids(&self, blocker: Uuid) -> Result<Vec<Uuid>> {
        sqlx::query_scalar("SELECT blocked_id FROM author_blocks WHERE blocker_id = ?")
            .bind(blocker)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn blocks_between(&self, a: Uuid, b: Uuid) -> Result<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM author_blocks \
             WHERE (blocker_id = ? AND blocked_id = ?) OR (blocker_id = ? AND blocked_id = ?))",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn followed_category_ids(&self, author: Uuid) -> Result<Vec<Uuid>> {
        sqlx::query_scalar("SELECT category_id FROM author_category_follows WHERE author_id = ?")
            .bind(author)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
    }
}
