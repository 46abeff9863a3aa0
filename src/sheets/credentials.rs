use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use log::{Level, log};
use ring::rand::SystemRandom;
use ring::signature::{RSA_PKCS1_SHA256, RsaKeyPair};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use crate::sheets::StoreError;

const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_HOURS: i64 = 1;
const REFRESH_MARGIN_SECS: i64 = 60;

/// The subset of a Google service account key file used for the JWT grant.
#[derive(Debug, Deserialize)]
pub struct ServiceAccount {
    pub client_email: String,
    private_key: String,
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Serialize)]
struct JwtHeader {
    alg: &'static str,
    typ: &'static str,
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    exp: i64,
    iat: i64,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

impl ServiceAccount {
    pub fn try_from_str(input: &str) -> Result<Self, StoreError> {
        serde_json::from_str(input).map_err(|e| {
            StoreError::Credentials(format!("Failed to deserialize service account key: {e}"))
        })
    }

    fn key_pair(&self) -> Result<RsaKeyPair, StoreError> {
        let mut reader = std::io::Cursor::new(self.private_key.as_bytes());
        let item = rustls_pemfile::read_one(&mut reader)
            .map_err(|e| StoreError::Credentials(format!("Invalid PEM private key: {e}")))?;
        match item {
            Some(rustls_pemfile::Item::Pkcs8Key(der)) => RsaKeyPair::from_pkcs8(der.secret_pkcs8_der())
                .map_err(|e| StoreError::Credentials(format!("Rejected pkcs8 key: {e}"))),
            Some(rustls_pemfile::Item::Pkcs1Key(der)) => RsaKeyPair::from_der(der.secret_pkcs1_der())
                .map_err(|e| StoreError::Credentials(format!("Rejected pkcs1 key: {e}"))),
            _ => Err(StoreError::Credentials("Missing private key".to_string())),
        }
    }

    fn signing_input(&self, now: DateTime<Utc>) -> Result<String, StoreError> {
        let header = JwtHeader {
            alg: "RS256",
            typ: "JWT",
        };
        let claims = JwtClaims {
            iss: &self.client_email,
            scope: SPREADSHEETS_SCOPE,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: (now + Duration::hours(TOKEN_LIFETIME_HOURS)).timestamp(),
        };
        let header = serde_json::to_vec(&header)
            .map_err(|e| StoreError::Credentials(format!("Failed to encode jwt header: {e}")))?;
        let claims = serde_json::to_vec(&claims)
            .map_err(|e| StoreError::Credentials(format!("Failed to encode jwt claims: {e}")))?;
        Ok(format!("{}.{}", URL_SAFE_NO_PAD.encode(header), URL_SAFE_NO_PAD.encode(claims)))
    }
}

/// Hands out bearer tokens for the service account, refreshing shortly before
/// expiry.
pub struct TokenProvider {
    account: ServiceAccount,
    key_pair: RsaKeyPair,
    rng: SystemRandom,
    http: reqwest::Client,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenProvider {
    /// Fails when the account's private key cannot be loaded.
    pub fn new(account: ServiceAccount, http: reqwest::Client) -> Result<Self, StoreError> {
        let key_pair = account.key_pair()?;
        Ok(TokenProvider {
            account,
            key_pair,
            rng: SystemRandom::new(),
            http,
            cached: RwLock::new(None),
        })
    }

    pub async fn access_token(&self) -> Result<String, StoreError> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
                return Ok(token.value.clone());
            }
        }
        let mut cached = self.cached.write().await;
        // Another task may have refreshed while we waited for the write lock.
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.value.clone());
        }
        let token = self.fetch().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    fn assertion(&self, now: DateTime<Utc>) -> Result<String, StoreError> {
        let signing_input = self.account.signing_input(now)?;
        let mut signature = vec![0; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(&RSA_PKCS1_SHA256, &self.rng, signing_input.as_bytes(), &mut signature)
            .map_err(|_| StoreError::Credentials("Failed to sign jwt".to_string()))?;
        Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(&signature)))
    }

    async fn fetch(&self) -> Result<CachedToken, StoreError> {
        let now = Utc::now();
        let assertion = self.assertion(now)?;
        let params = [("grant_type", JWT_GRANT_TYPE), ("assertion", assertion.as_str())];
        let response = self.http.post(&self.account.token_uri).form(&params).send().await?;
        let response = super::check_status(response).await.map_err(|e| StoreError::Auth(e.to_string()))?;
        let token: AccessTokenResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Auth(format!("Malformed token response: {e}")))?;
        log!(Level::Debug, "Refreshed access token for {}, valid for {}s",
            self.account.client_email, token.expires_in);
        Ok(CachedToken {
            value: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }
}
