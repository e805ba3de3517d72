//! # Seeder
//!
//! Fills a database with a small, believable sözlük: categories, a handful
//! of authors, topics with entries spread over the last weeks, votes and a
//! conversation. Running it twice is a no-op.

use std::sync::Arc;

use anyhow::Context;
use bigdecimal::BigDecimal;
use chrono::{Duration, Utc};
use configs::{AppConfig, LogFormat, LoggingConfig};
use domains::{ManualClock, MessagePreference, NewAuthor, NewEntry, VoteKind};
use secrecy::ExposeSecret;
use services::Services;
use storage_adapters::SqliteStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SEED_MARKER: &str = "sozluk";

fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&logging.level))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    init_tracing(&config.logging)?;

    let store = SqliteStore::connect(config.database.url.expose_secret(), config.database.max_connections)
        .await
        .context("opening database")?;
    let store = Arc::new(store);

    // Entries are written on a clock that walks forward from five weeks ago.
    let clock = Arc::new(ManualClock::new(Utc::now() - Duration::weeks(5)));
    let services = Services::new(store, clock.clone());

    if services.authors.find_by_username(SEED_MARKER).await?.is_some() {
        info!("database already seeded");
        return Ok(());
    }

    for (name, description) in [
        ("spor", Some("maçlar, takımlar, dedikodular")),
        ("müzik", None),
        ("şeker", Some("tatlı işler")),
        ("seker", None),
    ] {
        services.categories.create_category(name, description).await?;
    }

    let founder = services
        .authors
        .register(NewAuthor::new(SEED_MARKER, "sozluk@example.com").novice(false))
        .await?;
    let regular = services
        .authors
        .register(NewAuthor::new("ssg", "ssg@example.com").novice(false))
        .await?;
    let novice = services
        .authors
        .register(NewAuthor::new("caylak", "caylak@example.com"))
        .await?;
    services
        .authors
        .set_message_preference(regular.id, MessagePreference::AuthorOnly)
        .await?;
    services.authors.follow(novice.id, founder.id).await?;
    services.authors.follow(regular.id, founder.id).await?;

    let topics = [
        services.topics.create_topic("zeki müren").await?,
        services.topics.create_topic("zeki muren").await?,
        services.topics.create_topic("ılık süt").await?,
    ];

    let mut written = Vec::new();
    for day in 0..12 {
        let topic = &topics[day % topics.len()];
        let author = if day % 3 == 0 { &regular } else { &novice };
        let entry = services
            .entries
            .create(NewEntry::published(topic.id, author.id, format!("{} hakkında {}. entry", topic.title, day + 1)))
            .await?;
        written.push(entry);
        clock.advance(Duration::days(3));
    }
    clock.set(Utc::now());

    let upvote: BigDecimal = "0.2".parse()?;
    for entry in written.iter().take(4) {
        for _ in 0..6 {
            services.entries.update_vote(entry.id, &upvote, VoteKind::Cast).await?;
        }
    }

    services
        .messaging
        .compose(founder.id, novice.id, "hoş geldin, kolay gelsin")
        .await?;

    let stats = services.authors.profile_stats(novice.id).await?;
    info!(
        entries = written.len(),
        novice_entries = stats.entry_count,
        novice_status = services.authors.get(novice.id).await?.application_status.as_str(),
        "seed complete"
    );
    Ok(())
}
