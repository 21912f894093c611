//! Cache, dedup and quality layer.
//!
//! Owns the lifecycle of [`GlobalRecipe`] rows: URL canonicalization,
//! freshness decisions, quality scoring, language detection, content
//! hashing and the reuse/refresh/supersede choice. Fetchers never touch
//! durable state.

mod hash;
mod language;
mod quality;
mod store;
mod url;

pub use hash::canonical_hash;
pub use language::detect_language;
pub use quality::{
    is_better, score_recipe, should_reimport, QualityAssessment, FRESH_DAYS, QUALITY_MIN_SCORE,
};
pub use store::{CacheStore, MemoryStore};
pub use url::normalize_url;

use std::future::Future;
use std::path::PathBuf;

use chrono::Utc;
use uuid::Uuid;

use crate::error::ImportError;
use crate::types::{GlobalRecipe, ImportedRecipe};

/// What a platform fetcher hands back: the structured payload plus an
/// optional locally stored media file.
#[derive(Debug, Clone)]
pub struct FetchedImport {
    pub recipe: ImportedRecipe,
    pub local_media: Option<PathBuf>,
}

/// Result of a cache-wrapped import.
#[derive(Debug, Clone)]
pub struct CacheOutcome {
    pub payload: ImportedRecipe,
    pub entry: GlobalRecipe,
    /// True when the payload was served from the cache rather than the
    /// fetch that just ran.
    pub from_cache: bool,
    pub language: String,
    pub local_media: Option<PathBuf>,
}

fn outcome_from_entry(entry: GlobalRecipe) -> CacheOutcome {
    CacheOutcome {
        payload: entry.payload.clone(),
        language: entry.language_code.clone(),
        local_media: entry.payload.media_local_path.clone(),
        from_cache: true,
        entry,
    }
}

/// Import a recipe through the cache.
///
/// Looks up the current entry for the normalized URL and reuses it when
/// fresh; otherwise runs `fetch`, scores the result and either inserts
/// a superseding row or refreshes the existing entry's fetch timestamp.
/// A fetch failure with a cached entry on hand falls back to the stale
/// entry instead of erroring.
pub async fn import_with_cache<F, Fut>(
    store: &dyn CacheStore,
    raw_url: &str,
    source: &str,
    fetch: F,
) -> Result<CacheOutcome, ImportError>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<FetchedImport, ImportError>>,
{
    let normalized = normalize_url(raw_url)?;
    let now = Utc::now();
    let existing = store.find_current(&normalized).await?;

    if let Some(entry) = &existing {
        if !should_reimport(entry, now) {
            tracing::info!(url = %normalized, source, "cache hit, entry is fresh");
            return Ok(outcome_from_entry(entry.clone()));
        }
        tracing::debug!(url = %normalized, source, score = entry.quality_score, "cache entry stale or weak, refetching");
    }

    let fetched = match fetch(normalized.clone()).await {
        Ok(fetched) => fetched,
        Err(err) => {
            if let Some(entry) = existing {
                if err.is_recoverable_with_cache() {
                    tracing::warn!(url = %normalized, source, error = %err, "fetch failed, falling back to stale cache entry");
                    return Ok(outcome_from_entry(entry));
                }
            }
            return Err(err);
        }
    };

    let assessed = score_recipe(&fetched.recipe);
    let language = detect_language(&fetched.recipe.combined_text());
    let hash = canonical_hash(&fetched.recipe);

    if let Some(entry) = &existing {
        if !is_better(&assessed, entry) {
            tracing::info!(url = %normalized, source, new_score = assessed.score, existing_score = entry.quality_score, "refetch not better, refreshing existing entry");
            store.touch(entry.id, now).await?;
            let mut refreshed = entry.clone();
            refreshed.last_fetched_at = Some(now);
            refreshed.updated_at = now;
            return Ok(outcome_from_entry(refreshed));
        }
    }

    let mut payload = fetched.recipe;
    payload.metadata.missing_fields = assessed.missing_fields.clone();
    if payload.media_local_path.is_none() {
        payload.media_local_path = fetched.local_media.clone();
    }

    let entry = GlobalRecipe {
        id: Uuid::new_v4(),
        source_url_normalized: normalized.clone(),
        source_domain: payload.source_domain.clone(),
        source_platform: Some(source.to_string()),
        language_code: language.to_string(),
        quality_score: assessed.score,
        is_complete: assessed.is_complete,
        missing_fields: assessed.missing_fields,
        last_fetched_at: Some(now),
        canonical_hash: hash,
        canonical_group_id: existing
            .as_ref()
            .map(|e| e.canonical_group_id)
            .unwrap_or_else(Uuid::new_v4),
        supersedes_id: existing.as_ref().map(|e| e.id),
        created_at: now,
        updated_at: now,
        payload: payload.clone(),
    };

    let entry = store.insert(entry).await?;
    tracing::info!(url = %normalized, source, score = entry.quality_score, complete = entry.is_complete, "stored new cache entry");

    Ok(CacheOutcome {
        payload,
        language: language.to_string(),
        local_media: fetched.local_media,
        from_cache: false,
        entry,
    })
}
