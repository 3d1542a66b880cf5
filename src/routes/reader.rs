use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Reader Router Module
///
/// Ingestion endpoint for badge readers. Each handler takes the `ReaderKey`
/// extractor, so a request without the configured `x-reader-key` never reaches it.
pub fn reader_routes() -> Router<AppState> {
    Router::new()
        // POST /tag-reads
        // Queues `{"tagRFID": ...}` for the background worker and answers 202.
        .route("/tag-reads", post(handlers::submit_tag_read))
}
