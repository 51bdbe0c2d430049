//! HTTP push transport
//!
//! Delivers one POST per token to the profile target (HTTP/2 providers such as
//! APNs take the token in the path, `{token}` in the target is replaced; the
//! token is also sent in a `push-token` header for gateways that want it
//! there). Tokens of a batch are sent concurrently. Nothing is retried here.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use md5::{Digest, Md5};
use rand::Rng;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use super::payload::Payload;
use super::profile::{AuthMode, PushProfile};
use super::transport::{PushTransport, TokenOutcome};
use crate::error::{PushWakeError, Result};
use crate::parser::auth::{digest_challenge, find_param};
use crate::types::PushKind;

/// Provider reasons that mean the token is gone for good
const PERMANENT_REJECTIONS: &[&str] = &["BadDeviceToken", "Unregistered", "DeviceTokenNotForTopic", "ExpiredToken"];

/// reqwest-backed [`PushTransport`]
#[derive(Default)]
pub struct HttpPushTransport {
    /// One client per profile and timeout pair
    clients: DashMap<String, Client>,
}

impl HttpPushTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn client_for(&self, profile: &PushProfile) -> Result<Client> {
        let key = format!("{}:{:?}:{:?}", profile.name, profile.connect_timeout, profile.total_timeout);
        if let Some(client) = self.clients.get(&key) {
            return Ok(client.clone());
        }
        let client = Client::builder()
            .connect_timeout(profile.connect_timeout)
            .timeout(profile.total_timeout)
            .build()?;
        self.clients.insert(key, client.clone());
        Ok(client)
    }

    async fn deliver_one(&self, client: &Client, profile: &PushProfile, token: &str, body: &[u8]) -> TokenOutcome {
        let url = profile.target_for(token);
        let request = || {
            client
                .post(&url)
                .header(header::CONTENT_TYPE, "application/json")
                .header("push-token", token)
                .header("apns-push-type", push_type(profile.kind))
                .header("apns-priority", "10")
                .body(body.to_vec())
        };

        let sent = match &profile.auth {
            AuthMode::None => request().send().await,
            AuthMode::Bearer { token: bearer } => request().bearer_auth(bearer).send().await,
            AuthMode::Basic { username, password } => request().basic_auth(username, Some(password)).send().await,
            AuthMode::Digest { username, password } => send_with_digest(request, &url, username, password).await,
        };

        match sent {
            Ok(response) => classify(token, response).await,
            Err(e) => {
                let kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connect"
                } else {
                    "request"
                };
                warn!("Push to {} via '{}' failed ({}): {}", url, profile.name, kind, e);
                TokenOutcome::failed(token, format!("{} error: {}", kind, e))
            }
        }
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn deliver(&self, profile: &PushProfile, tokens: &[String], payload: &Payload) -> Result<Vec<TokenOutcome>> {
        let client = self
            .client_for(profile)
            .map_err(|e| PushWakeError::transport(format!("profile '{}': {}", profile.name, e)))?;
        let body = payload.to_bytes();

        let sends = tokens
            .iter()
            .map(|token| self.deliver_one(&client, profile, token, &body));
        Ok(join_all(sends).await)
    }
}

fn push_type(kind: PushKind) -> &'static str {
    match kind {
        PushKind::VoiceWake => "voip",
        PushKind::Message => "alert",
    }
}

async fn classify(token: &str, response: Response) -> TokenOutcome {
    let status = response.status();
    if status.is_success() {
        debug!("Push accepted for token {}", token);
        return TokenOutcome::delivered(token);
    }

    let reason = response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|body| body.get("reason").and_then(|r| r.as_str()).map(str::to_string))
        .unwrap_or_else(|| status.to_string());

    let permanent = matches!(status, StatusCode::NOT_FOUND | StatusCode::GONE)
        || (status == StatusCode::BAD_REQUEST && PERMANENT_REJECTIONS.contains(&reason.as_str()));

    if permanent {
        TokenOutcome::invalid(token, reason)
    } else {
        TokenOutcome::failed(token, format!("HTTP {}: {}", status.as_u16(), reason))
    }
}

/// Send once, answer a Digest challenge once
async fn send_with_digest<F>(request: F, url: &str, username: &str, password: &str) -> reqwest::Result<Response>
where
    F: Fn() -> RequestBuilder,
{
    let first = request().send().await?;
    if first.status() != StatusCode::UNAUTHORIZED {
        return Ok(first);
    }

    let challenge = first
        .headers()
        .get(header::WWW_AUTHENTICATE)
        .and_then(|v| v.to_str().ok())
        .and_then(DigestChallenge::parse);

    match challenge {
        Some(challenge) => {
            let uri = request_uri(url);
            let cnonce = format!("{:016x}", rand::thread_rng().gen::<u64>());
            let authorization = challenge.authorization(username, password, "POST", &uri, &cnonce);
            request().header(header::AUTHORIZATION, authorization).send().await
        }
        None => Ok(first),
    }
}

fn request_uri(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(parsed) => match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_string(),
        },
        Err(_) => url.to_string(),
    }
}

/// Escape a value for a quoted-string
fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", Md5::digest(input.as_bytes()))
}

/// Parsed `WWW-Authenticate: Digest ...` header
#[derive(Debug, Clone, PartialEq)]
struct DigestChallenge {
    realm: String,
    nonce: String,
    opaque: Option<String>,
    qop_auth: bool,
}

impl DigestChallenge {
    fn parse(header: &str) -> Option<Self> {
        let (_, params) = digest_challenge(header.trim().as_bytes()).ok()?;
        Some(Self {
            realm: find_param(&params, "realm")?.to_string(),
            nonce: find_param(&params, "nonce")?.to_string(),
            opaque: find_param(&params, "opaque").map(str::to_string),
            qop_auth: find_param(&params, "qop")
                .map(|qop| qop.split(',').any(|q| q.trim().eq_ignore_ascii_case("auth")))
                .unwrap_or(false),
        })
    }

    fn authorization(&self, username: &str, password: &str, method: &str, uri: &str, cnonce: &str) -> String {
        let ha1 = md5_hex(&format!("{}:{}:{}", username, self.realm, password));
        let ha2 = md5_hex(&format!("{}:{}", method, uri));

        let mut value = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", algorithm=MD5",
            quote(username),
            quote(&self.realm),
            quote(&self.nonce),
            uri
        );
        if self.qop_auth {
            let nc = "00000001";
            let response = md5_hex(&format!("{}:{}:{}:{}:auth:{}", ha1, self.nonce, nc, cnonce, ha2));
            value.push_str(&format!(
                ", response=\"{}\", qop=auth, nc={}, cnonce=\"{}\"",
                response, nc, cnonce
            ));
        } else {
            let response = md5_hex(&format!("{}:{}:{}", ha1, self.nonce, ha2));
            value.push_str(&format!(", response=\"{}\"", response));
        }
        if let Some(opaque) = &self.opaque {
            value.push_str(&format!(", opaque=\"{}\"", quote(opaque)));
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_digest_challenge() {
        let challenge = DigestChallenge::parse(
            r#"Digest realm="push@example.net", qop="auth,auth-int", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#,
        )
        .unwrap();
        assert_eq!(challenge.realm, "push@example.net");
        assert_eq!(challenge.nonce, "dcd98b7102dd2f0e8b11d0f600bfb0c093");
        assert_eq!(challenge.opaque.as_deref(), Some("5ccc069c403ebaf9f0171e9517f40e41"));
        assert!(challenge.qop_auth);

        assert!(DigestChallenge::parse("Basic realm=\"x\"").is_none());
        assert!(DigestChallenge::parse("Digest realm=\"x\"").is_none());
    }

    #[test]
    fn test_lowercase_scheme_and_escaped_realm() {
        let challenge = DigestChallenge::parse(r#"digest realm="push", nonce="abc", qop="auth""#).unwrap();
        assert_eq!(challenge.nonce, "abc");
        assert!(challenge.qop_auth);

        let challenge = DigestChallenge::parse(r#"Digest realm="a\"b", nonce="abc", qop="auth""#).unwrap();
        assert_eq!(challenge.realm, r#"a"b"#);
        assert_eq!(challenge.nonce, "abc");
        let header = challenge.authorization("u", "p", "POST", "/", "c");
        assert!(header.contains(r#"realm="a\"b""#));
    }

    #[test]
    fn test_digest_response_matches_rfc2617_example() {
        // RFC 2617 section 3.5
        let challenge = DigestChallenge {
            realm: "testrealm@host.com".to_string(),
            nonce: "dcd98b7102dd2f0e8b11d0f600bfb0c093".to_string(),
            opaque: Some("5ccc069c403ebaf9f0171e9517f40e41".to_string()),
            qop_auth: true,
        };
        let header = challenge.authorization("Mufasa", "Circle Of Life", "GET", "/dir/index.html", "0a4f113b");
        assert!(header.contains("response=\"6629fae49393a05397450978507c4ef1\""));
        assert!(header.contains("opaque=\"5ccc069c403ebaf9f0171e9517f40e41\""));
        assert!(header.starts_with("Digest username=\"Mufasa\""));
    }

    #[test]
    fn test_request_uri_keeps_query() {
        assert_eq!(request_uri("https://push.example.net/3/device/abc?x=1"), "/3/device/abc?x=1");
        assert_eq!(request_uri("https://push.example.net"), "/");
    }
}
