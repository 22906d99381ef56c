use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;

use crate::error::ExpireError;
use crate::expire::config::ServerConfig;
use crate::tavern::ChatStore;
use crate::tavern::types::{
    ChatFileEntry, MaintenanceReport, MaintenanceToken, OwnerScope, ReportEnvelope,
    RosterCharacter, RosterGroup,
};

const CSRF_HEADER: &str = "X-CSRF-Token";

#[derive(Debug, Deserialize)]
struct CsrfResponse {
    token: String,
}

/// Blocking HTTP client for the host's chat and maintenance endpoints.
pub struct TavernClient {
    http: Client,
    base_url: String,
    csrf_token: String,
    credentials: Option<(String, String)>,
}

impl TavernClient {
    /// Builds the client and performs the CSRF handshake. The session cookie
    /// set here is replayed on every later request.
    pub fn connect(cfg: &ServerConfig) -> Result<Self> {
        let http = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        let base_url = cfg.base_url.trim().trim_end_matches('/').to_string();
        let credentials = match (&cfg.username, &cfg.password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        };

        let mut client = Self {
            http,
            base_url,
            csrf_token: String::new(),
            credentials,
        };
        client.csrf_token = client.fetch_csrf_token()?;
        Ok(client)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((user, pass)) => req.basic_auth(user, Some(pass)),
            None => req,
        }
    }

    fn check(operation: &'static str, resp: Response) -> Result<Response> {
        let status = resp.status();
        if !status.is_success() {
            return Err(ExpireError::Transport {
                operation,
                status: status.as_u16(),
            }
            .into());
        }
        Ok(resp)
    }

    fn fetch_csrf_token(&self) -> Result<String> {
        let url = self.url("/csrf-token");
        let resp = self
            .authorize(self.http.get(&url))
            .send()
            .with_context(|| format!("csrf-token request to {url} failed"))?;
        let parsed: CsrfResponse = Self::check("csrf-token", resp)?
            .json()
            .context("invalid JSON from csrf-token")?;
        Ok(parsed.token)
    }

    fn post(&self, operation: &'static str, path: &str, body: &Value) -> Result<Response> {
        let url = self.url(path);
        let req = self
            .http
            .post(&url)
            .header(CSRF_HEADER, &self.csrf_token)
            .json(body);
        let resp = self
            .authorize(req)
            .send()
            .with_context(|| format!("{operation} request to {url} failed"))?;
        Self::check(operation, resp)
    }

    fn post_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        body: &Value,
    ) -> Result<T> {
        self.post(operation, path, body)?
            .json()
            .with_context(|| format!("invalid JSON from {operation}"))
    }
}

impl ChatStore for TavernClient {
    fn list_characters(&self) -> Result<Vec<RosterCharacter>> {
        self.post_json("characters/all", "/api/characters/all", &json!({}))
    }

    fn list_groups(&self) -> Result<Vec<RosterGroup>> {
        self.post_json("groups/all", "/api/groups/all", &json!({}))
    }

    fn search_chats(&self, scope: OwnerScope<'_>) -> Result<Vec<ChatFileEntry>> {
        let body = match scope {
            OwnerScope::Character { avatar } => {
                json!({ "query": "", "avatar_url": avatar, "group_id": null })
            }
            OwnerScope::Group { id } => {
                json!({ "query": "", "avatar_url": null, "group_id": id })
            }
        };
        self.post_json("chats/search", "/api/chats/search", &body)
    }

    fn delete_chat(&self, file_name: &str, scope: OwnerScope<'_>) -> Result<()> {
        match scope {
            OwnerScope::Character { avatar } => self.post(
                "chats/delete",
                "/api/chats/delete",
                &json!({ "chatfile": file_name, "avatar_url": avatar }),
            )?,
            OwnerScope::Group { .. } => self.post(
                "chats/group/delete",
                "/api/chats/group/delete",
                &json!({ "id": file_name }),
            )?,
        };
        Ok(())
    }

    fn maintenance_report(&self) -> Result<MaintenanceReport> {
        let envelope: ReportEnvelope =
            self.post_json("data-maid/report", "/api/data-maid/report", &json!({}))?;
        Ok(envelope.into_report())
    }

    fn delete_backups(&self, hashes: &[String], token: &MaintenanceToken) -> Result<()> {
        self.post(
            "data-maid/delete",
            "/api/data-maid/delete",
            &json!({ "hashes": hashes, "token": token.as_str() }),
        )?;
        Ok(())
    }

    fn finalize_maintenance(&self, token: &MaintenanceToken) -> Result<()> {
        self.post(
            "data-maid/finalize",
            "/api/data-maid/finalize",
            &json!({ "token": token.as_str() }),
        )?;
        Ok(())
    }
}
