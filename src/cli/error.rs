use thiserror::Error;

use crate::{history::HistoryError, steam::error::SteamError};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("history error `{0}`")]
    History(#[from] HistoryError),
    #[error("steam error `{0}`")]
    Steam(#[from] SteamError),
    #[error("json encoding error `{0}`")]
    JsonEncoding(#[from] serde_json::Error),
    #[error("invalid sampling period `{0}`")]
    InvalidPeriod(String),
}
