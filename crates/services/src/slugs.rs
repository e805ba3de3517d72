use std::future::Future;

use domains::text::{slug_candidate, slugify};
use domains::{AppError, Result};

const MAX_SLUG_ATTEMPTS: u32 = 100;

/// Finds the first slug for `title` that `taken` reports free.
pub(crate) async fn unique_slug<F, Fut>(title: &str, mut taken: F) -> Result<String>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let base = slugify(title);
    for attempt in 1..=MAX_SLUG_ATTEMPTS {
        let candidate = slug_candidate(&base, attempt);
        if !taken(candidate.clone()).await? {
            return Ok(candidate);
        }
    }
    Err(AppError::Conflict(format!("no free slug left for `{title}`")))
}
