//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the storage directory is writable

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::{collections::HashMap, path::Path};
use tokio::fs;
use tracing::warn;
use uuid::Uuid;

/// `GET /healthz`
///
/// Liveness only; never touches the disk.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// 200 while the storage directory accepts a write/read/delete round trip,
/// 503 with the failing step otherwise.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let disk = match probe_disk(&state.storage_dir).await {
        Ok(()) => CheckStatus { ok: true, error: None },
        Err(error) => CheckStatus {
            ok: false,
            error: Some(error),
        },
    };
    let ok = disk.ok;

    let body = ReadyResponse {
        status: if ok { "ok" } else { "error" }.into(),
        checks: HashMap::from([("disk", disk)]),
    };
    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

const PROBE: &[u8] = b"readyz";

async fn probe_disk(dir: &Path) -> Result<(), String> {
    let path = dir.join(format!(".readyz-{}", Uuid::new_v4()));
    fs::write(&path, PROBE)
        .await
        .map_err(|e| format!("could not write probe file: {}", e))?;

    let read_back = fs::read(&path).await;
    let removed = fs::remove_file(&path).await;

    match read_back {
        Ok(bytes) if bytes == PROBE => {}
        Ok(_) => return Err("probe file content mismatch".to_string()),
        Err(e) => return Err(format!("could not read probe file: {}", e)),
    }
    if let Err(e) = removed {
        // a stray dotfile is harmless, the directory still works
        warn!("could not remove {}: {}", path.display(), e);
    }
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
