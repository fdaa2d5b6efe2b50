use thiserror::Error;

use crate::history::AppId;

#[derive(Error, Debug)]
pub enum SteamError {
    #[error("http error `{0}`")]
    Http(#[from] reqwest::Error),
    #[error("request to `{url}` failed with status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("malformed response `{0}`")]
    Decode(#[from] serde_json::Error),
    #[error("steam has no player count for app {app_id} (result {result})")]
    Unavailable { app_id: AppId, result: i64 },
}
