use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use domains::{AppError, ApplicationStatus, Entry, EntryRepo, EntryWrite, Result, StatusReview};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;
use uuid::Uuid;

use super::{col, count, db_err, parse_col, SqliteStore};

fn entry_from_row(row: &SqliteRow) -> Result<Entry> {
    Ok(Entry {
        id: col(row, "id")?,
        topic_id: col(row, "topic_id")?,
        author_id: col(row, "author_id")?,
        content: col(row, "content")?,
        is_draft: col(row, "is_draft")?,
        vote_rate: parse_col(row, "vote_rate")?,
        created_at: col(row, "created_at")?,
    })
}

/// Recomputes the author's application status on the open transaction.
/// Only the status columns are written, and only when the status moves.
async fn review_application(
    conn: &mut SqliteConnection,
    author: Uuid,
    now: DateTime<Utc>,
) -> Result<StatusReview> {
    let row = sqlx::query("SELECT is_novice, application_status FROM authors WHERE id = ?")
        .bind(author)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| AppError::not_found("Author", author))?;
    let is_novice: bool = col(&row, "is_novice")?;
    let from: ApplicationStatus = parse_col(&row, "application_status")?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE author_id = ? AND is_draft = 0")
        .bind(author)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err)?;
    let published = count(total)?;

    let to = from.transition(is_novice, published).unwrap_or(from);
    if to != from {
        let application_date = (to == ApplicationStatus::Pending).then_some(now);
        sqlx::query("UPDATE authors SET application_status = ?, application_date = ? WHERE id = ?")
            .bind(to.as_str())
            .bind(application_date)
            .bind(author)
            .execute(&mut *conn)
            .await
            .map_err(db_err)?;
    }
    Ok(StatusReview { from, to, published })
}

/// Side effects of an entry becoming published: the topic gets its creator
/// if it had none, and the author's status is recomputed.
async fn published_effects(
    conn: &mut SqliteConnection,
    entry: Entry,
    now: DateTime<Utc>,
) -> Result<EntryWrite> {
    let claimed = sqlx::query("UPDATE topics SET created_by = ? WHERE id = ? AND created_by IS NULL")
        .bind(entry.author_id)
        .bind(entry.topic_id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    let review = review_application(conn, entry.author_id, now).await?;
    Ok(EntryWrite {
        entry,
        topic_claimed: claimed.rows_affected() == 1,
        review: Some(review),
    })
}

#[async_trait]
impl EntryRepo for SqliteStore {
    async fn insert_entry(&self, entry: &Entry, now: DateTime<Utc>) -> Result<EntryWrite> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            "INSERT INTO entries (id, topic_id, author_id, content, is_draft, vote_rate, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.id)
        .bind(entry.topic_id)
        .bind(entry.author_id)
        .bind(&entry.content)
        .bind(entry.is_draft)
        .bind(entry.vote_rate.to_string())
        .bind(entry.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let write = if entry.is_published() {
            published_effects(&mut tx, entry.clone(), now).await?
        } else {
            EntryWrite {
                entry: entry.clone(),
                topic_claimed: false,
                review: None,
            }
        };

        tx.commit().await.map_err(db_err)?;
        Ok(write)
    }

    async fn get_entry(&self, id: Uuid) -> Result<Option<Entry>> {
        sqlx::query("SELECT * FROM entries WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(entry_from_row)
            .transpose()
    }

    async fn publish_entry(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<EntryWrite>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // The flip comes first so the transaction holds the write lock
        // before it counts anything.
        let flipped = sqlx::query("UPDATE entries SET is_draft = 0 WHERE id = ? AND is_draft = 1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        let Some(row) = sqlx::query("SELECT * FROM entries WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };
        let entry = entry_from_row(&row)?;

        let write = if flipped.rows_affected() == 1 {
            published_effects(&mut tx, entry, now).await?
        } else {
            debug!(entry = %id, "entry already published");
            EntryWrite {
                entry,
                topic_claimed: false,
                review: None,
            }
        };

        tx.commit().await.map_err(db_err)?;
        Ok(Some(write))
    }

    async fn delete_entry(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<EntryWrite>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let Some(row) = sqlx::query("DELETE FROM entries WHERE id = ? RETURNING *")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };
        let entry = entry_from_row(&row)?;

        let review = if entry.is_published() {
            Some(review_application(&mut tx, entry.author_id, now).await?)
        } else {
            None
        };

        tx.commit().await.map_err(db_err)?;
        Ok(Some(EntryWrite {
            entry,
            topic_claimed: false,
            review,
        }))
    }

    async fn refresh_application_status(&self, author: Uuid, now: DateTime<Utc>) -> Result<StatusReview> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Take the write lock before counting.
        sqlx::query("UPDATE authors SET application_status = application_status WHERE id = ?")
            .bind(author)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        let review = review_application(&mut tx, author, now).await?;

        tx.commit().await.map_err(db_err)?;
        Ok(review)
    }

    async fn add_vote(&self, id: Uuid, delta: &BigDecimal) -> Result<BigDecimal> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Take the write lock before reading so concurrent votes serialize.
        let touched = sqlx::query("UPDATE entries SET vote_rate = vote_rate WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        if touched.rows_affected() == 0 {
            return Err(AppError::not_found("Entry", id));
        }

        let raw: String = sqlx::query_scalar("SELECT vote_rate FROM entries WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
        let current: BigDecimal = raw
            .parse()
            .map_err(|e| AppError::Internal(format!("entry {id} holds vote rate `{raw}`: {e}")))?;
        let rate = current + delta;

        sqlx::query("UPDATE entries SET vote_rate = ? WHERE id = ?")
            .bind(rate.to_string())
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(rate)
    }

    async fn count_published_by(&self, author: Uuid, since: Option<DateTime<Utc>>) -> Result<u64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM entries \
             WHERE author_id = ? AND is_draft = 0 AND (? IS NULL OR created_at >= ?)",
        )
        .bind(author)
        .bind(since)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        count(total)
    }

    async fn latest_published_by(&self, author: Uuid) -> Result<Option<DateTime<Utc>>> {
        sqlx::query_scalar(
            "SELECT created_at FROM entries WHERE author_id = ? AND is_draft = 0 \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(author)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn best_published_by(&self, author: Uuid, above: &BigDecimal) -> Result<Option<Entry>> {
        // The REAL cast only narrows the candidates; the exact comparison
        // happens on the decimals.
        let rows = sqlx::query(
            "SELECT * FROM entries \
             WHERE author_id = ? AND is_draft = 0 AND CAST(vote_rate AS REAL) >= CAST(? AS REAL)",
        )
        .bind(author)
        .bind(above.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut best: Option<Entry> = None;
        for row in &rows {
            let entry = entry_from_row(row)?;
            if entry.vote_rate <= *above {
                continue;
            }
            let replaces = match &best {
                None => true,
                Some(current) => {
                    (&entry.vote_rate, entry.created_at) > (&current.vote_rate, current.created_at)
                }
            };
            if replaces {
                best = Some(entry);
            }
        }
        Ok(best)
    }

    async fn topic_has_published(&self, topic: Uuid) -> Result<bool> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM entries WHERE topic_id = ? AND is_draft = 0)")
            .bind(topic)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn latest_published_in_topic(
        &self,
        topic: Uuid,
        excluded_authors: &[Uuid],
    ) -> Result<Option<DateTime<Utc>>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT created_at FROM entries WHERE topic_id = ");
        query.push_bind(topic).push(" AND is_draft = 0");

        if !excluded_authors.is_empty() {
            query.push(" AND author_id NOT IN (");
            let mut ids = query.separated(", ");
            for id in excluded_authors {
                ids.push_bind(*id);
            }
            ids.push_unseparated(")");
        }
        query.push(" ORDER BY created_at DESC LIMIT 1");

        query
            .build_query_scalar::<DateTime<Utc>>()
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use domains::{AuthorRepo, TopicRepo, NOVICE_ENTRY_THRESHOLD};

    use super::super::test_support::{author, store, topic};
    use super::*;

    fn entry(topic_id: Uuid, author_id: Uuid, rate: &str, created_at: DateTime<Utc>) -> Entry {
        Entry {
            id: Uuid::now_v7(),
            topic_id,
            author_id,
            content: "içerik".into(),
            is_draft: false,
            vote_rate: rate.parse().unwrap(),
            created_at,
        }
    }

    fn dec(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    async fn insert(store: &SqliteStore, entry: &Entry) -> EntryWrite {
        store.insert_entry(entry, entry.created_at).await.unwrap()
    }

    #[tokio::test]
    async fn first_publish_claims_the_topic() {
        let store = store().await;
        let first = author(&store, "first").await;
        let second = author(&store, "second").await;
        let t = topic(&store, "ilk topic").await;
        let now = Utc::now();

        let mut draft = entry(t.id, second.id, "0", now);
        draft.is_draft = true;
        let written = insert(&store, &draft).await;
        assert!(!written.topic_claimed);
        assert_eq!(written.review, None);

        assert!(insert(&store, &entry(t.id, first.id, "0", now)).await.topic_claimed);
        let published = store.publish_entry(draft.id, now).await.unwrap().unwrap();
        assert!(!published.topic_claimed);
        assert!(published.entry.is_published());

        let stored = store.get_topic(t.id).await.unwrap().unwrap();
        assert_eq!(stored.created_by, Some(first.id));
    }

    #[tokio::test]
    async fn status_moves_with_the_published_count() {
        let store = store().await;
        let novice = author(&store, "çaylak").await;
        let t = topic(&store, "başvuru").await;
        let now = Utc::now();

        let mut published = Vec::new();
        for _ in 1..NOVICE_ENTRY_THRESHOLD {
            let e = entry(t.id, novice.id, "0", now);
            let review = insert(&store, &e).await.review.unwrap();
            assert!(!review.changed());
            published.push(e);
        }

        let mut draft = entry(t.id, novice.id, "0", now);
        draft.is_draft = true;
        insert(&store, &draft).await;
        let review = store.publish_entry(draft.id, now).await.unwrap().unwrap().review;
        assert_eq!(
            review,
            Some(StatusReview {
                from: ApplicationStatus::OnHold,
                to: ApplicationStatus::Pending,
                published: NOVICE_ENTRY_THRESHOLD,
            })
        );
        let pending = store.get_author(novice.id).await.unwrap().unwrap();
        assert_eq!(pending.application_date, Some(now));

        // Publishing twice does not count twice.
        assert_eq!(store.publish_entry(draft.id, now).await.unwrap().unwrap().review, None);

        let deleted = store.delete_entry(published[0].id, now).await.unwrap().unwrap();
        assert_eq!(deleted.entry.id, published[0].id);
        assert_eq!(deleted.review.map(|r| r.to), Some(ApplicationStatus::OnHold));
        let on_hold = store.get_author(novice.id).await.unwrap().unwrap();
        assert_eq!(on_hold.application_status, ApplicationStatus::OnHold);
        assert_eq!(on_hold.application_date, None);
    }

    #[tokio::test]
    async fn deleting_a_draft_leaves_the_status_alone() {
        let store = store().await;
        let a = author(&store, "writer").await;
        let t = topic(&store, "taslak").await;
        let mut draft = entry(t.id, a.id, "0", Utc::now());
        draft.is_draft = true;
        insert(&store, &draft).await;

        let deleted = store.delete_entry(draft.id, Utc::now()).await.unwrap().unwrap();
        assert_eq!(deleted.review, None);
        assert!(store.get_entry(draft.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lifecycle_writes_on_missing_rows() {
        let store = store().await;
        let now = Utc::now();
        assert!(store.publish_entry(Uuid::now_v7(), now).await.unwrap().is_none());
        assert!(store.delete_entry(Uuid::now_v7(), now).await.unwrap().is_none());

        let err = store.refresh_application_status(Uuid::now_v7(), now).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(kind, _) if kind == "Author"));
    }

    #[tokio::test]
    async fn refresh_repairs_a_stale_status() {
        let store = store().await;
        let a = author(&store, "writer").await;
        sqlx::query("UPDATE authors SET application_status = 'pending', application_date = created_at WHERE id = ?")
            .bind(a.id)
            .execute(store.pool())
            .await
            .unwrap();

        let review = store.refresh_application_status(a.id, Utc::now()).await.unwrap();
        assert_eq!(review.from, ApplicationStatus::Pending);
        assert_eq!(review.to, ApplicationStatus::OnHold);
        assert_eq!(review.published, 0);
        assert_eq!(store.get_author(a.id).await.unwrap().unwrap().application_date, None);
    }

    #[tokio::test]
    async fn votes_accumulate_exactly() {
        let store = store().await;
        let a = author(&store, "writer").await;
        let t = topic(&store, "oylama").await;
        let e = entry(t.id, a.id, "0", Utc::now());
        insert(&store, &e).await;

        assert_eq!(store.add_vote(e.id, &dec("0.2")).await.unwrap(), dec("0.2"));
        assert_eq!(store.add_vote(e.id, &dec("0.1")).await.unwrap(), dec("0.3"));
        assert_eq!(store.add_vote(e.id, &dec("-0.3")).await.unwrap(), dec("0"));
        assert_eq!(store.get_entry(e.id).await.unwrap().unwrap().vote_rate, dec("0"));
    }

    #[tokio::test]
    async fn voting_on_missing_entry_is_not_found() {
        let store = store().await;
        let err = store.add_vote(Uuid::now_v7(), &dec("0.2")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(kind, _) if kind == "Entry"));
    }

    #[tokio::test]
    async fn counts_skip_drafts_and_respect_since() {
        let store = store().await;
        let a = author(&store, "writer").await;
        let t = topic(&store, "sayım").await;
        let now = Utc::now();

        insert(&store, &entry(t.id, a.id, "0", now - Duration::days(3))).await;
        insert(&store, &entry(t.id, a.id, "0", now)).await;
        let mut draft = entry(t.id, a.id, "0", now);
        draft.is_draft = true;
        insert(&store, &draft).await;

        assert_eq!(store.count_published_by(a.id, None).await.unwrap(), 2);
        assert_eq!(store.count_published_by(a.id, Some(now - Duration::days(1))).await.unwrap(), 1);
        assert_eq!(store.latest_published_by(a.id).await.unwrap(), Some(now));
    }

    #[tokio::test]
    async fn best_entry_must_beat_the_threshold() {
        let store = store().await;
        let a = author(&store, "writer").await;
        let t = topic(&store, "iyi").await;
        let now = Utc::now();

        insert(&store, &entry(t.id, a.id, "1.0", now)).await;
        assert!(store.best_published_by(a.id, &dec("1.0")).await.unwrap().is_none());

        let good = entry(t.id, a.id, "1.4", now);
        let better = entry(t.id, a.id, "2.2", now);
        insert(&store, &good).await;
        insert(&store, &better).await;
        assert_eq!(store.best_published_by(a.id, &dec("1.0")).await.unwrap(), Some(better));
    }

    #[tokio::test]
    async fn latest_in_topic_skips_excluded_authors() {
        let store = store().await;
        let a = author(&store, "a").await;
        let b = author(&store, "b").await;
        let t = topic(&store, "son").await;
        let now = Utc::now();

        assert!(!store.topic_has_published(t.id).await.unwrap());
        insert(&store, &entry(t.id, a.id, "0", now - Duration::hours(2))).await;
        insert(&store, &entry(t.id, b.id, "0", now)).await;
        assert!(store.topic_has_published(t.id).await.unwrap());

        assert_eq!(store.latest_published_in_topic(t.id, &[]).await.unwrap(), Some(now));
        assert_eq!(
            store.latest_published_in_topic(t.id, &[b.id]).await.unwrap(),
            Some(now - Duration::hours(2))
        );
        assert_eq!(store.latest_published_in_topic(t.id, &[a.id, b.id]).await.unwrap(), None);
    }
}
