//! Shared fixtures for the end-to-end scenarios: every service wired to a
//! fresh SQLite store and a clock the test controls. Most scenarios run on
//! a private in-memory database; races need [`TestApp::file_backed`] so
//! several pooled connections see the same data.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use domains::{Author, Entry, ManualClock, MessagePreference, NewAuthor, NewEntry, Topic};
use services::Services;
use storage_adapters::SqliteStore;
use tempfile::TempDir;
use uuid::Uuid;

pub struct TestApp {
    pub store: Arc<SqliteStore>,
    pub clock: Arc<ManualClock>,
    pub services: Arc<Services>,
    // Deleted with the app.
    _dir: Option<TempDir>,
}

/// A fixed starting point so dates in assertions are readable.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

impl TestApp {
    pub async fn new() -> Self {
        let store = SqliteStore::in_memory().await.expect("in-memory store");
        Self::with_store(store, None)
    }

    /// A database file in a temporary directory behind a pool of
    /// `connections` connections.
    pub async fn file_backed(connections: u32) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let url = format!("sqlite://{}", dir.path().join("sozluk.db").display());
        let store = SqliteStore::connect(&url, connections).await.expect("file store");
        Self::with_store(store, Some(dir))
    }

    fn with_store(store: SqliteStore, dir: Option<TempDir>) -> Self {
        let store = Arc::new(store);
        let clock = Arc::new(ManualClock::new(epoch()));
        let services = Arc::new(Services::new(store.clone(), clock.clone()));
        Self {
            store,
            clock,
            services,
            _dir: dir,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        domains::Clock::now(self.clock.as_ref())
    }

    /// Runs `f` with the clock moved back by `ago`, then restores it.
    pub async fn backdated<T, F, Fut>(&self, ago: Duration, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let now = self.now();
        self.clock.set(now - ago);
        let out = f().await;
        self.clock.set(now);
        out
    }

    pub async fn novice(&self, name: &str) -> Author {
        self.services
            .authors
            .register(NewAuthor::new(name, format!("{name}@example.com")))
            .await
            .expect("register novice")
    }

    pub async fn author(&self, name: &str) -> Author {
        self.services
            .authors
            .register(NewAuthor::new(name, format!("{name}@example.com")).novice(false))
            .await
            .expect("register author")
    }

    pub async fn with_preference(&self, author: &Author, preference: MessagePreference) -> Author {
        self.services
            .authors
            .set_message_preference(author.id, preference)
            .await
            .expect("set preference")
    }

    pub async fn topic(&self, title: &str) -> Topic {
        self.services.topics.create_topic(title).await.expect("create topic")
    }

    pub async fn publish(&self, topic: Uuid, author: Uuid) -> Entry {
        self.services
            .entries
            .create(NewEntry::published(topic, author, "bkz"))
            .await
            .expect("publish entry")
    }

    pub async fn draft(&self, topic: Uuid, author: Uuid) -> Entry {
        self.services
            .entries
            .create(NewEntry::draft(topic, author, "taslak"))
            .await
            .expect("draft entry")
    }

    pub async fn reload(&self, author: &Author) -> Author {
        self.services.authors.get(author.id).await.expect("reload author")
    }
}
