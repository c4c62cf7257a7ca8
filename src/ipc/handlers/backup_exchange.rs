use serde_json::json;
use std::path::PathBuf;

use crate::backup;
use crate::db;
use crate::ipc::error::{err, ok, ApiError};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};

fn handle_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out: Result<serde_json::Value, ApiError> = (|| {
        let workspace = state
            .workspace
            .clone()
            .ok_or_else(|| ApiError::new("no_workspace", "select a workspace first"))?;
        let out_path = PathBuf::from(required_str(&req.params, "outPath")?);
        let summary = backup::export_workspace_bundle(&workspace, &out_path)
            .map_err(|e| ApiError::new("backup_failed", format!("{e:#}")))?;
        log::info!("exported workspace bundle to {}", out_path.to_string_lossy());
        Ok(json!({
            "bundleFormat": summary.bundle_format,
            "dbSha256": summary.db_sha256,
            "outPath": out_path.to_string_lossy(),
        }))
    })();
    match out {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

/// Replaces the open workspace database with the bundle's copy, then
/// reopens it. The session is dropped: accounts may differ on the other
/// side of an import.
fn handle_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let in_path = match required_str(&req.params, "inPath") {
        Ok(p) => PathBuf::from(p),
        Err(e) => return e.response(&req.id),
    };

    // Close the live connection before the file swap.
    state.db = None;
    state.session = None;

    let imported = backup::import_workspace_bundle(&in_path, &workspace);
    let reopened = db::open_db(&workspace);
    match (imported, reopened) {
        (Ok(summary), Ok(conn)) => {
            state.db = Some(conn);
            log::info!("imported workspace bundle from {}", in_path.to_string_lossy());
            ok(
                &req.id,
                json!({
                    "bundleFormatDetected": summary.bundle_format_detected,
                    "dbSha256": summary.db_sha256,
                }),
            )
        }
        (Err(e), Ok(conn)) => {
            // Import failed but the original database is intact.
            state.db = Some(conn);
            err(&req.id, "backup_failed", format!("{e:#}"), None)
        }
        (_, Err(e)) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.export" => Some(handle_export(state, req)),
        "backup.import" => Some(handle_import(state, req)),
        _ => None,
    }
}
