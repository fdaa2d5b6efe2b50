//! Thin client for the two Steam Web API endpoints we sample from

use std::{future::Future, time::Duration};

use error::SteamError;
use serde::Deserialize;
use tracing::debug;

use crate::{config::SteamConfig, history::AppId};

pub mod error;

/// `result` value Steam uses when a player count is present
const RESULT_OK: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct App {
    #[serde(rename = "appid")]
    pub id: AppId,
    pub name: String,
}

/// Anything that can report the current player count of an app
pub trait UserCountSource {
    fn user_count(&self, app_id: AppId) -> impl Future<Output = Result<i64, SteamError>> + Send;
}

/// Anything that can list the apps worth tracking
pub trait AppCatalog {
    fn apps(&self) -> impl Future<Output = Result<Vec<App>, SteamError>> + Send;
}

#[derive(Debug, Clone)]
pub struct SteamClient {
    http: reqwest::Client,
    base_url: String,
}

impl SteamClient {
    pub fn new(cfg: &SteamConfig) -> Result<Self, SteamError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get(&self, url: String) -> Result<String, SteamError> {
        debug!(url = %url, "GET");
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(SteamError::Status {
                url,
                status: resp.status(),
            });
        }
        Ok(resp.text().await?)
    }
}

impl UserCountSource for SteamClient {
    async fn user_count(&self, app_id: AppId) -> Result<i64, SteamError> {
        let url = format!(
            "{}/ISteamUserStats/GetNumberOfCurrentPlayers/v1/?appid={app_id}",
            self.base_url
        );
        parse_user_count(app_id, &self.get(url).await?)
    }
}

impl AppCatalog for SteamClient {
    async fn apps(&self) -> Result<Vec<App>, SteamError> {
        let url = format!("{}/ISteamApps/GetAppList/v2/", self.base_url);
        parse_app_list(&self.get(url).await?)
    }
}

#[derive(Deserialize)]
struct PlayerCountBody {
    response: PlayerCountResponse,
}

#[derive(Deserialize)]
struct PlayerCountResponse {
    result: i64,
    #[serde(default)]
    player_count: i64,
}

pub fn parse_user_count(app_id: AppId, body: &str) -> Result<i64, SteamError> {
    let body: PlayerCountBody = serde_json::from_str(body)?;
    if body.response.result != RESULT_OK {
        return Err(SteamError::Unavailable {
            app_id,
            result: body.response.result,
        });
    }
    Ok(body.response.player_count)
}

#[derive(Deserialize)]
struct AppListBody {
    applist: AppList,
}

#[derive(Deserialize)]
struct AppList {
    apps: Vec<App>,
}

pub fn parse_app_list(body: &str) -> Result<Vec<App>, SteamError> {
    let body: AppListBody = serde_json::from_str(body)?;
    Ok(body.applist.apps)
}

#[cfg(test)]
mod test {
    use super::{App, error::SteamError, parse_app_list, parse_user_count};

    #[test]
    fn test_parse_user_count() {
        let body = r#"{"response":{"player_count":815432,"result":1}}"#;
        assert_eq!(parse_user_count(570, body).unwrap(), 815432);

        let body = r#"{"response":{"player_count":0,"result":1}}"#;
        assert_eq!(parse_user_count(570, body).unwrap(), 0);
    }

    #[test]
    fn test_parse_user_count_unavailable() {
        let body = r#"{"response":{"result":42}}"#;
        assert!(matches!(
            parse_user_count(10, body),
            Err(SteamError::Unavailable { app_id: 10, result: 42 })
        ));
    }

    #[test]
    fn test_parse_user_count_garbage() {
        assert!(matches!(
            parse_user_count(10, "<html>busy</html>"),
            Err(SteamError::Decode(_))
        ));
    }

    #[test]
    fn test_parse_app_list() {
        let body = r#"{"applist":{"apps":[
            {"appid":570,"name":"Dota 2"},
            {"appid":440,"name":"Team Fortress 2"}
        ]}}"#;

        assert_eq!(
            parse_app_list(body).unwrap(),
            vec![
                App {
                    id: 570,
                    name: "Dota 2".to_string()
                },
                App {
                    id: 440,
                    name: "Team Fortress 2".to_string()
                },
            ]
        );
        assert!(parse_app_list(r#"{"applist":{}}"#).is_err());
    }
}
