//! Verifications, mementos, favorites and contact reports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    EntryFavorite, FavoriteRepo, GeneralReport, Memento, MementoRepo, ReportRepo, Result,
    UserVerification, VerificationRepo,
};
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use super::{col, db_err, SqliteStore};

fn verification_from_row(row: &SqliteRow) -> Result<UserVerification> {
    Ok(UserVerification {
        id: col(row, "id")?,
        author_id: col(row, "author_id")?,
        token_hash: col(row, "token_hash")?,
        expires_at: col(row, "expires_at")?,
        created_at: col(row, "created_at")?,
    })
}

fn memento_from_row(row: &SqliteRow) -> Result<Memento> {
    Ok(Memento {
        id: col(row, "id")?,
        holder_id: col(row, "holder_id")?,
        patient_id: col(row, "patient_id")?,
        body: col(row, "body")?,
        created_at: col(row, "created_at")?,
    })
}

#[async_trait]
impl VerificationRepo for SqliteStore {
    async fn replace_verification(&self, verification: &UserVerification) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query("DELETE FROM user_verifications WHERE author_id = ?")
            .bind(verification.author_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        sqlx::query(
            "INSERT INTO user_verifications (id, author_id, token_hash, expires_at, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(verification.id)
        .bind(verification.author_id)
        .bind(&verification.token_hash)
        .bind(verification.expires_at)
        .bind(verification.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn delete_verifications(&self, author: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM user_verifications WHERE author_id = ?")
            .bind(author)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn verifications_for(&self, author: Uuid) -> Result<Vec<UserVerification>> {
        sqlx::query("SELECT * FROM user_verifications WHERE author_id = ? ORDER BY created_at DESC")
            .bind(author)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .iter()
            .map(verification_from_row)
            .collect()
    }

    async fn has_live_verification(&self, author: Uuid, now: DateTime<Utc>) -> Result<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM user_verifications WHERE author_id = ? AND expires_at > ?)",
        )
        .bind(author)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }
}

#[async_trait]
impl MementoRepo for SqliteStore {
    async fn insert_memento(&self, memento: &Memento) -> Result<()> {
        sqlx::query("INSERT INTO mementos (id, holder_id, patient_id, body, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(memento.id)
            .bind(memento.holder_id)
            .bind(memento.patient_id)
            .bind(&memento.body)
            .bind(memento.created_at)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn find_memento(&self, holder: Uuid, patient: Uuid) -> Result<Option<Memento>> {
        sqlx::query("SELECT * FROM mementos WHERE holder_id = ? AND patient_id = ?")
            .bind(holder)
            .bind(patient)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(memento_from_row)
            .transpose()
    }
}

#[async_trait]
impl FavoriteRepo for SqliteStore {
    async fn insert_favorite(&self, favorite: &EntryFavorite) -> Result<()> {
        sqlx::query("INSERT INTO entry_favorites (id, author_id, entry_id, created_at) VALUES (?, ?, ?, ?)")
            .bind(favorite.id)
            .bind(favorite.author_id)
            .bind(favorite.entry_id)
            .bind(favorite.created_at)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_favorite(&self, author: Uuid, entry: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM entry_favorites WHERE author_id = ? AND entry_id = ?")
            .bind(author)
            .bind(entry)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn favorite_entry_ids(&self, author: Uuid) -> Result<Vec<Uuid>> {
        sqlx::query_scalar("SELECT entry_id FROM entry_favorites WHERE author_id = ? ORDER BY created_at DESC")
            .bind(author)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
    }
}

#[async_trait]
impl ReportRepo for SqliteStore {
    async fn insert_report(&self, report: &GeneralReport) -> Result<()> {
        sqlx::query(
            "INSERT INTO general_reports (id, reporter_email, subject, content, is_verified, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(report.id)
        .bind(&report.reporter_email)
        .bind(&report.subject)
        .bind(&report.content)
        .bind(report.is_verified)
        .bind(report.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}
