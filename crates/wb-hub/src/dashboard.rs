use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use chrono::Local;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};
use url::form_urlencoded;
use wb_core::history::{build_view, DashboardView};
use wb_core::{calculate, RawSubmission, TIMESTAMP_FORMAT};
use wb_storage::{RecordStore, StorageError};

use crate::render;

pub struct AppState {
    store: RecordStore,
    history_window: usize,
    // serializes read-modify-write appends within this process
    write_lock: AsyncMutex<()>,
}

impl AppState {
    pub fn new(store: RecordStore, history_window: usize) -> Self {
        Self {
            store,
            history_window,
            write_lock: AsyncMutex::new(()),
        }
    }

    fn load_view(&self) -> DashboardView {
        let rows = match self.store.read_all() {
            Ok(rows) => rows,
            Err(err) => {
                warn!(
                    event = "store_read_failed",
                    path = %self.store.path().display(),
                    error = %err
                );
                Vec::new()
            }
        };
        debug!(event = "view_built", rows = rows.len(), window = self.history_window);
        build_view(&rows, self.history_window)
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Storage(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "storage failure").into_response()
            }
        }
    }
}

pub async fn form_page() -> Html<String> {
    Html(render::render_form())
}

/// Decodes a urlencoded body whatever its declared content type. Repeated
/// fields keep their first value; undecodable bytes are replaced, so every
/// body yields a submission.
fn submission_from_body(body: &[u8]) -> RawSubmission {
    RawSubmission::from_pairs(form_urlencoded::parse(body))
}

pub async fn submit(
    State(app): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Redirect, AppError> {
    let raw = submission_from_body(&body);
    let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
    let row = calculate(&raw, timestamp);

    let _guard = app.write_lock.lock().await;
    let report = match app.store.append(&row) {
        Ok(report) => report,
        Err(err) => {
            error!(
                event = "submission_failed",
                path = %app.store.path().display(),
                error = %err
            );
            return Err(err.into());
        }
    };
    if let Some(reason) = report.recovered.as_deref() {
        warn!(event = "store_rebuilt", reason = reason);
    }
    info!(
        event = "submission_stored",
        timestamp = %row.timestamp(),
        burnout_risk = row.metrics.burnout_risk,
        rows = report.total_rows
    );
    Ok(Redirect::to("/metrics"))
}

pub async fn metrics_page(State(app): State<Arc<AppState>>) -> Html<String> {
    Html(render::render_dashboard(&app.load_view()))
}

pub async fn metrics_json(State(app): State<Arc<AppState>>) -> Json<DashboardView> {
    Json(app.load_view())
}
