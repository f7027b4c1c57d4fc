//! HTTP client for the MTProto gateway.
//!
//! Every call is `POST {base_url}/{method}` with a JSON body. The gateway
//! answers with `{"ok": true, "result": ...}` or
//! `{"ok": false, "error_code": .., "description": .., "parameters": {"retry_after": ..}}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::application::raw::RawMessage;
use crate::application::stream::{Direction, HistoryApi, HistoryPage};
use crate::domain::{AppError, ChatLocator, RemoteConfig, ResolvedChat, Result};

use super::session::{Credentials, SessionToken};

/// Wait used when the gateway signals a rate limit without saying how long.
const DEFAULT_FLOOD_WAIT: Duration = Duration::from_secs(30);

const FLOOD_WAIT_PREFIX: &str = "FLOOD_WAIT_";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: Option<i32>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ErrorParameters>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

#[derive(Debug, Serialize)]
struct SendCodeParams<'a> {
    api_id: i32,
    api_hash: &'a str,
    phone: &'a str,
}

#[derive(Debug, Deserialize)]
struct SentCode {
    phone_code_hash: String,
}

#[derive(Debug, Serialize)]
struct ExportSessionParams<'a> {
    api_id: i32,
    api_hash: &'a str,
    phone: &'a str,
    phone_code_hash: &'a str,
    code: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExportedSession {
    session: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ResolveParams<'a> {
    ChatId { chat_id: i64 },
    Username { username: &'a str },
}

#[derive(Debug, Serialize)]
struct HistoryParams {
    chat_id: i64,
    offset_id: i64,
    limit: u32,
    /// `true`: ids above `offset_id`, oldest first.
    reverse: bool,
}

/// Gateway-backed implementation of [`HistoryApi`].
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    /// Build a client. Without a session only the `auth.*` calls succeed.
    ///
    /// # Errors
    /// Returns error if the session token is not a valid header value or the
    /// HTTP client cannot be built.
    pub fn new(config: &RemoteConfig, session: Option<&SessionToken>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = session {
            let value = HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
                .map_err(|e| AppError::config(format!("Invalid session token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(AppError::transport)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn call<P: Serialize + Sync, R: DeserializeOwned>(&self, method: &str, params: &P) -> Result<R> {
        let url = format!("{}/{method}", self.base_url);
        tracing::debug!(method, "Gateway request");

        let response = self
            .client
            .post(&url)
            .json(params)
            .send()
            .await
            .map_err(AppError::transport)?;

        let status = response.status();
        let body = response.text().await.map_err(AppError::transport)?;
        interpret(method, status, &body)
    }

    /// Ask the service to send a login code to `phone`; returns the code hash.
    ///
    /// # Errors
    /// Returns error if the gateway rejects the request.
    pub async fn send_code(&self, credentials: &Credentials, phone: &str) -> Result<String> {
        let sent: SentCode = self
            .call(
                "auth.sendCode",
                &SendCodeParams {
                    api_id: credentials.api_id,
                    api_hash: &credentials.api_hash,
                    phone,
                },
            )
            .await?;
        Ok(sent.phone_code_hash)
    }

    /// Complete sign-in and export a reusable session token.
    ///
    /// # Errors
    /// Returns error if the code is rejected or the gateway fails.
    pub async fn export_session(
        &self,
        credentials: &Credentials,
        phone: &str,
        phone_code_hash: &str,
        code: &str,
    ) -> Result<SessionToken> {
        let exported: ExportedSession = self
            .call(
                "auth.exportSession",
                &ExportSessionParams {
                    api_id: credentials.api_id,
                    api_hash: &credentials.api_hash,
                    phone,
                    phone_code_hash,
                    code,
                },
            )
            .await?;
        Ok(SessionToken::new(exported.session))
    }
}

#[async_trait]
impl HistoryApi for GatewayClient {
    async fn resolve_chat(&self, locator: &ChatLocator) -> Result<ResolvedChat> {
        let params = match locator {
            ChatLocator::NumericChatId(chat_id) => ResolveParams::ChatId { chat_id: *chat_id },
            ChatLocator::Handle(username) => ResolveParams::Username {
                username: username.as_str(),
            },
        };

        self.call("contacts.resolve", &params).await.map_err(|e| match e {
            AppError::RemoteFetch { message, source } => AppError::RemoteFetch {
                message: format!("Could not access chat {locator}: {message}"),
                source,
            },
            other => other,
        })
    }

    async fn get_history(&self, chat: &ResolvedChat, page: HistoryPage) -> Result<Vec<RawMessage>> {
        let params = HistoryParams {
            chat_id: chat.id,
            offset_id: page.offset_id,
            limit: page.limit,
            reverse: page.direction == Direction::Forward,
        };
        self.call("messages.getHistory", &params).await
    }
}

/// Turns an HTTP status and body into a result or a typed error.
fn interpret<R: DeserializeOwned>(method: &str, status: StatusCode, body: &str) -> Result<R> {
    let envelope: Envelope<R> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(AppError::RateLimited {
                    wait: DEFAULT_FLOOD_WAIT,
                });
            }
            return Err(AppError::RemoteFetch {
                message: format!("{method}: unexpected response (HTTP {status})"),
                source: Some(Box::new(e)),
            });
        }
    };

    if envelope.ok {
        return envelope
            .result
            .ok_or_else(|| AppError::remote(format!("{method}: missing result")));
    }

    let description = envelope.description.unwrap_or_default();
    let retry_after = envelope.parameters.and_then(|p| p.retry_after);

    if let Some(wait) = rate_limit_wait(status, envelope.error_code, &description, retry_after) {
        tracing::warn!(method, wait_secs = wait.as_secs(), "Gateway rate limit");
        return Err(AppError::RateLimited { wait });
    }

    Err(AppError::remote(format!(
        "{method} failed ({}): {description}",
        envelope.error_code.map_or_else(|| status.as_u16().to_string(), |c| c.to_string())
    )))
}

/// Wait requested by a rate-limit response, if this is one.
fn rate_limit_wait(
    status: StatusCode,
    error_code: Option<i32>,
    description: &str,
    retry_after: Option<u64>,
) -> Option<Duration> {
    let flood = extract_flood_wait_seconds(description);
    let signalled = status == StatusCode::TOO_MANY_REQUESTS
        || matches!(error_code, Some(420 | 429))
        || retry_after.is_some()
        || flood.is_some();

    if !signalled {
        return None;
    }

    Some(
        retry_after
            .or(flood)
            .map_or(DEFAULT_FLOOD_WAIT, Duration::from_secs),
    )
}

/// Seconds from a `FLOOD_WAIT_<n>` description.
fn extract_flood_wait_seconds(description: &str) -> Option<u64> {
    let start = description.find(FLOOD_WAIT_PREFIX)? + FLOOD_WAIT_PREFIX.len();
    let digits: String = description[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}
