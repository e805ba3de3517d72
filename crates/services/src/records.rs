//! # Records
//!
//! Small per-author records with a uniqueness rule and no further
//! behavior: mementos, favorite entries and contact-form reports.

use std::sync::Arc;

use domains::{
    AppError, Clock, EntryFavorite, EntryRepo, FavoriteRepo, GeneralReport, Memento, MementoRepo,
    NewReport, ReportRepo, Result,
};
use tracing::info;
use uuid::Uuid;

pub struct RecordService {
    mementos: Arc<dyn MementoRepo>,
    favorites: Arc<dyn FavoriteRepo>,
    reports: Arc<dyn ReportRepo>,
    entries: Arc<dyn EntryRepo>,
    clock: Arc<dyn Clock>,
}

impl RecordService {
    pub fn new(
        mementos: Arc<dyn MementoRepo>,
        favorites: Arc<dyn FavoriteRepo>,
        reports: Arc<dyn ReportRepo>,
        entries: Arc<dyn EntryRepo>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            mementos,
            favorites,
            reports,
            entries,
            clock,
        }
    }

    /// One memento per (holder, patient); the reverse pair is a separate memento.
    pub async fn save_memento(&self, holder: Uuid, patient: Uuid, body: &str) -> Result<Memento> {
        let memento = Memento {
            id: Uuid::now_v7(),
            holder_id: holder,
            patient_id: patient,
            body: body.to_string(),
            created_at: self.clock.now(),
        };
        self.mementos.insert_memento(&memento).await?;
        Ok(memento)
    }

    pub async fn memento(&self, holder: Uuid, patient: Uuid) -> Result<Option<Memento>> {
        self.mementos.find_memento(holder, patient).await
    }

    pub async fn favorite(&self, author: Uuid, entry: Uuid) -> Result<EntryFavorite> {
        if self.entries.get_entry(entry).await?.is_none() {
            return Err(AppError::not_found("Entry", entry));
        }
        let favorite = EntryFavorite {
            id: Uuid::now_v7(),
            author_id: author,
            entry_id: entry,
            created_at: self.clock.now(),
        };
        self.favorites.insert_favorite(&favorite).await?;
        Ok(favorite)
    }

    pub async fn unfavorite(&self, author: Uuid, entry: Uuid) -> Result<bool> {
        self.favorites.delete_favorite(author, entry).await
    }

    pub async fn favorite_entry_ids(&self, author: Uuid) -> Result<Vec<Uuid>> {
        self.favorites.favorite_entry_ids(author).await
    }

    pub async fn file_report(&self, new: NewReport) -> Result<GeneralReport> {
        let subject = new.subject.trim();
        if subject.is_empty() {
            return Err(AppError::validation("report subject cannot be empty"));
        }
        let report = GeneralReport {
            id: Uuid::now_v7(),
            reporter_email: new.reporter_email,
            subject: subject.to_string(),
            content: new.content,
            is_verified: false,
            created_at: self.clock.now(),
        };
        self.reports.insert_report(&report).await?;
        info!(report = %report.id, "general report filed");
        Ok(report)
    }
}
