//! # Remote Session Module
//!
//! Interface-level client for the captcha-serving service: login, captcha
//! fetch and answer submission. The solving core never touches the network;
//! this layer feeds it decoded image bytes and submits the numeric answer
//! it produces. Retry policy lives here too: the service answers 401, 402
//! or 403 when a session expires, and the client re-authenticates once
//! before giving up on a request.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::seq::IndexedRandom;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::errors::{SolverError, SolverResult};

/// Browser user agents the client rotates between per account.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv=89.0) Gecko/20100101 Firefox/89.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_5) AppleWebKit/605.1.15 (KHTML, like Gecko) \
     Version/13.1.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/56.0.2924.87 Safari/537.36",
    "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/47.0.2526.106 Safari/537.36",
    "Mozilla/5.0 (Windows NT 6.1) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/41.0.2228.0 Safari/537.36",
];

/// Statuses that mean the session expired and a re-login may recover.
const RELOGIN_STATUSES: &[StatusCode] = &[
    StatusCode::UNAUTHORIZED,
    StatusCode::PAYMENT_REQUIRED,
    StatusCode::FORBIDDEN,
];

/// One account solving captchas against the service.
///
/// Replaces the attribute-dictionary accounts of the original front ends
/// with an explicit struct: credentials, the bearer token of the live
/// session, and the captcha the account is currently working on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub password: String,
    /// Bearer token of the authenticated session, if any
    pub session_token: Option<String>,
    /// Captcha identifier currently pending for this account
    pub pending_captcha: Option<String>,
}

impl Account {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            session_token: None,
            pending_captcha: None,
        }
    }
}

/// Pick a random browser user agent for a new session.
pub fn generate_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .expect("user agent pool is non-empty")
}

/// Browser-like header set the service expects.
pub fn generate_headers(origin: &str, user_agent: &str) -> SolverResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    let insert = |headers: &mut HeaderMap, name: &'static str, value: &str| -> SolverResult<()> {
        headers.insert(
            name,
            HeaderValue::from_str(value)
                .map_err(|e| SolverError::Session(format!("Invalid header {}: {}", name, e)))?,
        );
        Ok(())
    };

    insert(&mut headers, "User-Agent", user_agent)?;
    insert(&mut headers, "Content-Type", "application/json")?;
    insert(&mut headers, "Source", "WEB")?;
    insert(&mut headers, "Accept", "application/json, text/plain, */*")?;
    insert(&mut headers, "Referer", &format!("{}/", origin))?;
    insert(&mut headers, "Origin", origin)?;
    insert(&mut headers, "Connection", "keep-alive")?;
    insert(&mut headers, "Sec-Fetch-Dest", "empty")?;
    insert(&mut headers, "Sec-Fetch-Mode", "cors")?;
    insert(&mut headers, "Sec-Fetch-Site", "same-site")?;
    Ok(headers)
}

/// Decode a captcha payload into raw image bytes.
///
/// The service delivers captchas as base64, either bare or as a
/// `data:image/jpeg;base64,...` URI; both forms decode to the JPEG bytes
/// the pipeline consumes.
pub fn decode_captcha_payload(payload: &str) -> SolverResult<Vec<u8>> {
    let encoded = match payload.split_once(',') {
        Some((_, data)) => data,
        None => payload,
    };

    BASE64
        .decode(encoded.trim())
        .map_err(|e| SolverError::Decode(format!("Invalid base64 captcha payload: {}", e)))
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct CaptchaResponse {
    file: String,
}

#[derive(Serialize)]
struct SolutionRequest<'a> {
    id: &'a str,
    solution: &'a str,
}

/// HTTP client bound to one service origin.
pub struct SessionClient {
    client: reqwest::Client,
    base_url: String,
}

impl SessionClient {
    /// Build a client for the given service origin.
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> SolverResult<Self> {
        let base_url = base_url.into();
        let headers = generate_headers(&base_url, generate_user_agent())?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| SolverError::Session(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// Authenticate the account, storing the session token on success.
    pub async fn login(&self, account: &mut Account) -> SolverResult<()> {
        let response = self
            .client
            .post(format!("{}/secure/auth/login", self.base_url))
            .json(&LoginRequest {
                username: &account.username,
                password: &account.password,
            })
            .send()
            .await
            .map_err(|e| SolverError::Session(format!("Login request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SolverError::Session(format!(
                "Login rejected for {}: HTTP {}",
                account.username,
                response.status()
            )));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| SolverError::Session(format!("Malformed login response: {}", e)))?;

        info!(username = %account.username, "Session established");
        account.session_token = Some(body.token);
        Ok(())
    }

    /// Fetch the captcha image for the given identifier.
    ///
    /// Re-authenticates once if the session has expired, then propagates
    /// the failure; further retries belong to the operator.
    pub async fn fetch_captcha(
        &self,
        account: &mut Account,
        captcha_id: &str,
    ) -> SolverResult<Vec<u8>> {
        for attempt in 0..2 {
            let token = account.session_token.clone().ok_or_else(|| {
                SolverError::Session(format!("No session for account {}", account.username))
            })?;

            let response = self
                .client
                .get(format!("{}/files/get/{}", self.base_url, captcha_id))
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|e| SolverError::Session(format!("Captcha request failed: {}", e)))?;

            let status = response.status();
            if RELOGIN_STATUSES.contains(&status) && attempt == 0 {
                warn!(username = %account.username, %status, "Session expired, re-authenticating");
                self.login(account).await?;
                continue;
            }
            if !status.is_success() {
                return Err(SolverError::Session(format!(
                    "Captcha fetch failed: HTTP {}",
                    status
                )));
            }

            let body: CaptchaResponse = response
                .json()
                .await
                .map_err(|e| SolverError::Session(format!("Malformed captcha response: {}", e)))?;

            account.pending_captcha = Some(captcha_id.to_string());
            return decode_captcha_payload(&body.file);
        }

        unreachable!("loop either returns or re-authenticates exactly once")
    }

    /// Submit a numeric answer for the account's pending captcha.
    pub async fn submit_solution(&self, account: &mut Account, solution: &str) -> SolverResult<()> {
        let token = account.session_token.clone().ok_or_else(|| {
            SolverError::Session(format!("No session for account {}", account.username))
        })?;
        let captcha_id = account.pending_captcha.clone().ok_or_else(|| {
            SolverError::Session(format!(
                "No pending captcha for account {}",
                account.username
            ))
        })?;

        let response = self
            .client
            .post(format!("{}/rs/reserve", self.base_url))
            .bearer_auth(&token)
            .json(&SolutionRequest {
                id: &captcha_id,
                solution,
            })
            .send()
            .await
            .map_err(|e| SolverError::Session(format!("Submission failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SolverError::Session(format!(
                "Submission rejected: HTTP {}",
                response.status()
            )));
        }

        info!(username = %account.username, %captcha_id, "Captcha solution submitted");
        account.pending_captcha = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_bare_base64_payload() {
        let bytes = decode_captcha_payload("aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn test_decode_data_uri_payload() {
        let bytes = decode_captcha_payload("data:image/jpeg;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn test_decode_rejects_invalid_payload() {
        match decode_captcha_payload("not base64!!!") {
            Err(SolverError::Decode(_)) => {}
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_generate_headers_includes_service_origin() {
        let headers = generate_headers("https://example.test", generate_user_agent()).unwrap();
        assert_eq!(headers.get("Origin").unwrap(), "https://example.test");
        assert_eq!(headers.get("Referer").unwrap(), "https://example.test/");
        assert_eq!(headers.get("Source").unwrap(), "WEB");
    }

    #[test]
    fn test_user_agent_pool_membership() {
        let ua = generate_user_agent();
        assert!(USER_AGENTS.contains(&ua));
    }

    #[test]
    fn test_account_starts_without_session() {
        let account = Account::new("user", "secret");
        assert!(account.session_token.is_none());
        assert!(account.pending_captcha.is_none());
    }
}
