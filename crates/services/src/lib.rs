//! services
//!
//! Business rules of the sözlük, written against the `domains` ports.
//! Every service is request scoped and holds only `Arc`s to its ports.

pub mod authors;
pub mod categories;
pub mod entries;
pub mod messaging;
pub mod records;
mod slugs;
pub mod topics;
pub mod verification;

use std::sync::Arc;

use domains::{Clock, Store};

pub use authors::{AuthorService, AuthorStats};
pub use categories::CategoryService;
pub use entries::EntryService;
pub use messaging::{ComposeOutcome, MessagingService, Refusal};
pub use records::RecordService;
pub use topics::TopicService;
pub use verification::{IssuedVerification, VerificationService};

/// Every service wired to one store and one clock.
pub struct Services {
    pub authors: AuthorService,
    pub categories: CategoryService,
    pub entries: EntryService,
    pub messaging: MessagingService,
    pub records: RecordService,
    pub topics: TopicService,
    pub verifications: VerificationService,
}

impl Services {
    pub fn new<S: Store>(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            authors: AuthorService::new(
                store.clone(),
                store.clone(),
                store.clone(),
                store.clone(),
                clock.clone(),
            ),
            categories: CategoryService::new(store.clone(), clock.clone()),
            entries: EntryService::new(store.clone(), store.clone(), store.clone(), clock.clone()),
            messaging: MessagingService::new(store.clone(), store.clone(), clock.clone()),
            records: RecordService::new(
                store.clone(),
                store.clone(),
                store.clone(),
                store.clone(),
                clock.clone(),
            ),
            topics: TopicService::new(store.clone(), store.clone(), store.clone(), clock.clone()),
            verifications: VerificationService::new(store.clone(), store, clock),
        }
    }
}
