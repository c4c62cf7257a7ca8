use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::store::users::Role;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The signed-in user, established by `auth.signIn` and cleared by
/// `auth.signOut` or a workspace switch.
#[derive(Debug, Clone)]
pub struct Session {
    pub uid: String,
    pub name: String,
    pub role: Role,
    pub branch: Option<String>,
    pub semester: Option<i64>,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub session: Option<Session>,
}
