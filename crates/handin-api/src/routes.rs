use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use handin_core::db::{Database, Directory, DocumentStore, LibSqlDirectory, LibSqlDocumentStore};
use handin_core::ledger::SubmissionLedger;
use handin_core::models::{
    submission_doc_id, BulkDocResult, BulkDocsRequest, MissingRevs, NewVersion, Submission,
    SubmissionVersion,
};
use handin_core::sync::{revs_diff, BulkSyncProcessor, RevisionGenerator};

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    db: Arc<Database>,
    revisions: Arc<RevisionGenerator>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, db: Arc<Database>) -> Self {
        Self {
            config,
            db,
            revisions: Arc::new(RevisionGenerator::new()),
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/sync/{db_name}/_bulk_docs", post(bulk_docs))
        .route("/sync/{db_name}/_revs_diff", post(handle_revs_diff))
        .route("/sync/{db_name}/_changes", get(changes_feed))
        .route("/sync/{db_name}/{doc_id}", get(fetch_document))
        .route(
            "/assignments/{assignment_id}/submissions",
            post(create_or_update_submission),
        )
        .route(
            "/assignments/{assignment_id}/submissions/{student_id}",
            get(get_submission),
        )
        .route(
            "/assignments/{assignment_id}/submissions/{student_id}/versions",
            get(get_submission_versions),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
    })
}

async fn bulk_docs(
    State(state): State<AppState>,
    Path(_db_name): Path<String>,
    Json(payload): Json<BulkDocsRequest>,
) -> Result<Json<Vec<BulkDocResult>>, AppError> {
    if payload.docs.len() > state.config.max_batch_docs {
        return Err(AppError::bad_request(format!(
            "Batch exceeds {} documents",
            state.config.max_batch_docs
        )));
    }
    if !payload.new_edits {
        // Accepted in the request shape; replayed revisions still go
        // through the same LWW path.
        tracing::debug!("new_edits=false received, no special handling");
    }

    let store = LibSqlDocumentStore::new(state.db.connection());
    let processor = BulkSyncProcessor::new(&store, &state.revisions);
    let results = processor.process_batch(&payload.docs).await;

    tracing::info!(
        docs = payload.docs.len(),
        accepted = results.iter().filter(|r| r.is_ok()).count(),
        "processed bulk_docs batch"
    );
    Ok(Json(results))
}

async fn handle_revs_diff(
    State(state): State<AppState>,
    Path(_db_name): Path<String>,
    Json(payload): Json<HashMap<String, Vec<String>>>,
) -> Result<Json<HashMap<String, MissingRevs>>, AppError> {
    let store = LibSqlDocumentStore::new(state.db.connection());
    let response = revs_diff(&store, &payload).await?;
    Ok(Json(response))
}

async fn changes_feed(
    State(_state): State<AppState>,
    Path(_db_name): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    // A real feed needs a monotonic sequence number assigned per accepted
    // write, which the current write path does not produce.
    Err(AppError::NotImplemented(
        "_changes feed not implemented".to_string(),
    ))
}

#[derive(Debug, Deserialize)]
struct DocumentQuery {
    rev: Option<String>,
}

async fn fetch_document(
    State(state): State<AppState>,
    Path((_db_name, doc_id)): Path<(String, String)>,
    Query(query): Query<DocumentQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = LibSqlDocumentStore::new(state.db.connection());
    let doc = store
        .get(&doc_id)
        .await?
        .filter(|doc| !doc.deleted)
        .ok_or_else(|| AppError::not_found("Document not found"))?;

    // Only the current revision is retained; anything else is gone
    if let Some(requested) = query.rev {
        if doc.rev.as_deref() != Some(requested.as_str()) {
            return Err(AppError::not_found("Revision not found"));
        }
    }

    Ok(Json(doc.to_wire()))
}

#[derive(Debug, Deserialize)]
struct CreateSubmissionRequest {
    student_id: String,
    file_url: String,
    content_hash: Option<String>,
    notes: Option<String>,
}

/// Public view of a submission: envelope plus the latest version
#[derive(Debug, Serialize)]
struct SubmissionView {
    id: String,
    assignment_id: String,
    student_id: String,
    team_id: String,
    current_version: i64,
    latest_version: Option<SubmissionVersion>,
    last_updated_at: Option<i64>,
}

impl From<Submission> for SubmissionView {
    fn from(submission: Submission) -> Self {
        let latest_version = submission.latest_version().cloned();
        Self {
            id: submission.id,
            assignment_id: submission.assignment_id,
            student_id: submission.student_id,
            team_id: submission.team_id,
            current_version: submission.current_version,
            latest_version,
            last_updated_at: submission.last_updated_at,
        }
    }
}

/// Submit the first version of an assignment, or append a new version when
/// a submission already exists for this (assignment, student) pair.
async fn create_or_update_submission(
    State(state): State<AppState>,
    Path(assignment_id): Path<String>,
    Json(request): Json<CreateSubmissionRequest>,
) -> Result<(StatusCode, Json<SubmissionView>), AppError> {
    let conn = state.db.connection();
    let directory = LibSqlDirectory::new(conn);

    let assignment = directory
        .get_assignment(&assignment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Assignment not found"))?;
    let team = directory
        .get_team(&assignment.team_id)
        .await?
        .ok_or_else(|| AppError::not_found("Team not found for assignment"))?;
    if !team.is_member(&request.student_id) {
        return Err(AppError::forbidden(
            "Student is not a member of the team for this assignment",
        ));
    }

    let store = LibSqlDocumentStore::new(conn);
    let ledger = SubmissionLedger::new(&store, &state.revisions);
    let version_data = NewVersion {
        file_url: request.file_url,
        content_hash: request.content_hash,
        notes: request.notes,
    };

    let doc_id = submission_doc_id(&assignment_id, &request.student_id);
    let submission = match ledger.get(&doc_id).await? {
        Some(existing) => ledger
            .append_version(&doc_id, version_data, existing.current_version)
            .await?
            .ok_or_else(|| {
                AppError::conflict("Submission updated concurrently. Please refresh and try again.")
            })?,
        None => ledger
            .create_first(
                &assignment_id,
                &request.student_id,
                &assignment.team_id,
                version_data,
            )
            .await?,
    };

    Ok((StatusCode::CREATED, Json(submission.into())))
}

async fn get_submission(
    State(state): State<AppState>,
    Path((assignment_id, student_id)): Path<(String, String)>,
) -> Result<Json<SubmissionView>, AppError> {
    let submission = load_submission(&state, &assignment_id, &student_id).await?;
    Ok(Json(submission.into()))
}

async fn get_submission_versions(
    State(state): State<AppState>,
    Path((assignment_id, student_id)): Path<(String, String)>,
) -> Result<Json<Vec<SubmissionVersion>>, AppError> {
    let submission = load_submission(&state, &assignment_id, &student_id).await?;
    Ok(Json(submission.versions))
}

async fn load_submission(
    state: &AppState,
    assignment_id: &str,
    student_id: &str,
) -> Result<Submission, AppError> {
    let store = LibSqlDocumentStore::new(state.db.connection());
    let ledger = SubmissionLedger::new(&store, &state.revisions);
    ledger
        .get(&submission_doc_id(assignment_id, student_id))
        .await?
        .ok_or_else(|| AppError::not_found("Submission not found for this student"))
}
