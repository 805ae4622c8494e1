//! Entry routes.
//!
//! - GET /entries - List or search entries
//! - GET /entries/{slug} - Read one entry
//! - POST /entries - Create an entry from raw text
//! - PUT /entries/{slug} - Replace an entry's text
//!
//! Writes store the formatted body right away and leave cross-linking to
//! the link worker. Their outcome, failures included, is also published as
//! a notification.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};

use lexicon_core::{Entry, EntrySummary, Slug, SlugError};
use lexicon_linker::{entry_href, format};
use lexicon_store::StoreError;

use crate::error::{ApiError, ApiResult};
use crate::events::Notification;
use crate::state::AppState;

/// Longest accepted title, in characters.
pub const MAX_TITLE_CHARS: usize = 50;

/// Label of the link attached to entry notifications.
const VIEW_LABEL: &str = "View";

/// Notification text for failures the user cannot fix.
const GENERIC_FAILURE: &str = "Something went wrong";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing entries.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Case-insensitive search over titles and bodies.
    pub q: Option<String>,
}

/// Request body for creating an entry.
#[derive(Debug, Deserialize)]
pub struct CreateEntryRequest {
    /// Raw title; normalized before storage.
    pub title: String,
    /// Raw article text; formatted before storage.
    pub text: String,
}

/// Request body for replacing an entry's text.
#[derive(Debug, Deserialize)]
pub struct UpdateEntryRequest {
    pub text: String,
}

/// Response for accepted writes.
#[derive(Debug, Serialize)]
pub struct EntryAcceptedResponse {
    pub title: String,
    pub slug: Slug,
    /// Where the entry can be read.
    pub url: String,
    /// Whether a new link job was queued (false when one was already pending).
    pub link_queued: bool,
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Checks a raw title and builds the entry it would create.
fn build_entry(title: &str, text: &str) -> ApiResult<Entry> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }
    let length = trimmed.chars().count();
    if length > MAX_TITLE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "title must be at most {MAX_TITLE_CHARS} characters, got {length}"
        )));
    }
    if text.trim().is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".to_string()));
    }

    Entry::new(trimmed, format(text)).map_err(|e| match e {
        SlugError::Empty(_) => ApiError::BadRequest(format!(
            "title {trimmed:?} has no letters or digits to build an address from"
        )),
        other => ApiError::BadRequest(other.to_string()),
    })
}

/// Parses a slug taken from the path; anything malformed cannot exist.
fn parse_slug(raw: &str) -> ApiResult<Slug> {
    Slug::parse(raw).map_err(|_| ApiError::NotFound(format!("Entry {raw} not found")))
}

fn entry_not_found(slug: &Slug) -> ApiError {
    ApiError::NotFound(format!("Entry {slug} not found"))
}

/// Finds an entry that a new entry would collide with, by title or slug.
async fn find_existing(state: &AppState, entry: &Entry) -> ApiResult<Option<Slug>> {
    if let Some(existing) = state.store().find_by_title(&entry.title).await? {
        return Ok(Some(existing.slug));
    }
    if state.store().entry_exists(&entry.slug).await? {
        return Ok(Some(entry.slug.clone()));
    }
    Ok(None)
}

/// Tells the user the entry already exists and points at it.
fn reject_duplicate(state: &AppState, title: &str, existing: &Slug) -> ApiError {
    state.broadcaster().notify(
        Notification::info("Entry already exists").with_link(entry_href(existing), VIEW_LABEL),
    );
    tracing::info!(title = %title, existing = %existing, "Rejected duplicate entry");
    ApiError::Conflict(format!("An entry titled {title:?} already exists"))
}

/// Publishes a failed write as a notification.
fn notify_failure(state: &AppState, err: &ApiError) {
    let notification = match err {
        // Duplicates already sent their own notice.
        ApiError::Conflict(_) => return,
        ApiError::BadRequest(message) => Notification::error(message.clone()),
        ApiError::NotFound(message) => Notification::warning(message.clone()),
        ApiError::Internal(_) | ApiError::Store(_) => {
            tracing::error!(error = %err, "Entry write failed");
            Notification::error(GENERIC_FAILURE)
        }
    };
    state.broadcaster().notify(notification);
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /entries - List entries, optionally filtered by `q`.
///
/// # Response
///
/// - 200 OK: `[{ "title": "...", "slug": "..." }]` ordered by title
async fn list_entries(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<EntrySummary>>> {
    let entries = state.store().list_entries(query.q.as_deref()).await?;
    Ok(Json(entries))
}

/// GET /entries/{slug} - Read one entry.
///
/// # Response
///
/// - 200 OK: the full entry
/// - 404 Not Found: no entry has this slug
async fn get_entry(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Entry>> {
    let slug = parse_slug(&slug)?;
    let entry = state.store().get_entry(&slug).await.map_err(|e| match e {
        StoreError::EntryNotFound(slug) => entry_not_found(&slug),
        other => ApiError::Store(other),
    })?;
    Ok(Json(entry))
}

/// POST /entries - Create an entry.
///
/// The title is normalized and turned into a slug, the text is formatted
/// into HTML, and a cross-linking pass is queued.
///
/// # Request
///
/// Body: `{ "title": "...", "text": "..." }`
///
/// # Response
///
/// - 202 Accepted: `{ "title", "slug", "url", "link_queued" }`
/// - 400 Bad Request: Empty or over-long title, empty text
/// - 409 Conflict: An entry with this title (or slug) exists
async fn create_entry(
    State(state): State<AppState>,
    Json(request): Json<CreateEntryRequest>,
) -> ApiResult<(StatusCode, Json<EntryAcceptedResponse>)> {
    create(&state, request)
        .await
        .inspect_err(|e| notify_failure(&state, e))
}

async fn create(
    state: &AppState,
    request: CreateEntryRequest,
) -> ApiResult<(StatusCode, Json<EntryAcceptedResponse>)> {
    let entry = build_entry(&request.title, &request.text)?;

    if let Some(existing) = find_existing(state, &entry).await? {
        return Err(reject_duplicate(state, &entry.title, &existing));
    }

    let entry = match state.store().insert_entry(&entry).await {
        Ok(entry) => entry,
        // Lost a race with a concurrent create.
        Err(StoreError::DuplicateEntry(existing)) => {
            return Err(reject_duplicate(state, &entry.title, &existing));
        }
        Err(e) => return Err(e.into()),
    };

    let url = entry_href(&entry.slug);
    state
        .broadcaster()
        .notify(Notification::success("Entry created").with_link(url.clone(), VIEW_LABEL));
    let link_queued = state.schedule_link(entry.slug.clone());

    tracing::info!(slug = %entry.slug, title = %entry.title, "Entry created");

    Ok((
        StatusCode::ACCEPTED,
        Json(EntryAcceptedResponse {
            title: entry.title,
            slug: entry.slug,
            url,
            link_queued,
        }),
    ))
}

/// PUT /entries/{slug} - Replace an entry's text.
///
/// The slug stays as created even if the text mentions a different title.
///
/// # Request
///
/// Body: `{ "text": "..." }`
///
/// # Response
///
/// - 202 Accepted: `{ "title", "slug", "url", "link_queued" }`
/// - 400 Bad Request: Empty text
/// - 404 Not Found: no entry has this slug
async fn update_entry(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(request): Json<UpdateEntryRequest>,
) -> ApiResult<(StatusCode, Json<EntryAcceptedResponse>)> {
    update(&state, &slug, request)
        .await
        .inspect_err(|e| notify_failure(&state, e))
}

async fn update(
    state: &AppState,
    slug: &str,
    request: UpdateEntryRequest,
) -> ApiResult<(StatusCode, Json<EntryAcceptedResponse>)> {
    let slug = parse_slug(slug)?;
    if request.text.trim().is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".to_string()));
    }

    let map_missing = |e: StoreError| match e {
        StoreError::EntryNotFound(slug) => entry_not_found(&slug),
        other => ApiError::Store(other),
    };
    state
        .store()
        .update_body(&slug, &format(&request.text))
        .await
        .map_err(map_missing)?;
    let entry = state.store().get_entry(&slug).await.map_err(map_missing)?;

    let link_queued = state.schedule_link(slug.clone());
    tracing::info!(slug = %slug, "Entry text replaced");

    Ok((
        StatusCode::ACCEPTED,
        Json(EntryAcceptedResponse {
            title: entry.title,
            url: entry_href(&slug),
            slug,
            link_queued,
        }),
    ))
}

/// Build entry routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/entries", get(list_entries).post(create_entry))
        .route("/entries/{slug}", get(get_entry).put(update_entry))
}

// ============================================================================
// Tests
// ============================================================================
