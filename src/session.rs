use async_trait::async_trait;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;
use uuid::Uuid;

use crate::{config::SessionCredentials, error::SessionError};

/// Cookie holding the short-lived Supabase access token (a JWT).
pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";
/// Cookie holding the opaque refresh token used to mint a new access token.
pub const REFRESH_TOKEN_COOKIE: &str = "sb-refresh-token";

/// Identity
///
/// The authenticated subject resolved from the session cookies. Lives for a
/// single request.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub id: Uuid,
    pub email: Option<String>,
}

/// SessionTokens
///
/// Token pair returned by the Supabase token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Claims
///
/// The subset of a Supabase access token's payload this service reads.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The `auth.users.id` of the signed-in user.
    pub sub: Uuid,
    pub exp: usize,
    #[serde(default)]
    pub email: Option<String>,
    /// Supabase sets this to "authenticated" for signed-in users.
    #[serde(default)]
    pub aud: Option<String>,
}

/// SessionProvider
///
/// Contract for the external authentication service. The route guard only ever
/// talks to this trait, so tests swap in `MockSessionProvider`.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Returns the cookie jar with a fresh token pair written into it when the
    /// access token has expired. The jar's delta must reach the response.
    async fn refresh_session(&self, jar: CookieJar) -> Result<CookieJar, SessionError>;

    /// Resolves the current identity from the (refreshed) cookies, if any.
    async fn get_user(&self, jar: &CookieJar) -> Result<Option<Identity>, SessionError>;

    /// Password sign-in. Rejected credentials surface as `SessionError::Rejected`.
    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionTokens, SessionError>;

    /// Creates the auth user and returns its id.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Uuid, SessionError>;
}

/// SessionState
///
/// Shared handle to the configured provider.
pub type SessionState = Arc<dyn SessionProvider>;

/// store_tokens
///
/// Writes a token pair into the jar as HTTP-only, same-site cookies.
pub fn store_tokens(jar: CookieJar, tokens: &SessionTokens) -> CookieJar {
    jar.add(session_cookie(ACCESS_TOKEN_COOKIE, tokens.access_token.clone()))
        .add(session_cookie(REFRESH_TOKEN_COOKIE, tokens.refresh_token.clone()))
}

/// clear_tokens
///
/// Emits removal cookies for both session tokens.
pub fn clear_tokens(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_TOKEN_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_TOKEN_COOKIE).path("/"))
}

fn session_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

// --- Supabase Auth ---

/// SupabaseSessionProvider
///
/// Talks to Supabase Auth (GoTrue) over HTTP. Access tokens are verified locally
/// with the project's JWT secret; the network is only hit to refresh an expired
/// token, sign in or sign up.
pub struct SupabaseSessionProvider {
    client: reqwest::Client,
    credentials: SessionCredentials,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SupabaseSessionProvider {
    pub fn new(credentials: SessionCredentials, jwt_secret: &str) -> Result<Self, SessionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_audience(&["authenticated"]);

        Ok(Self {
            client,
            credentials,
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            validation,
        })
    }

    /// verify
    ///
    /// Decodes and validates an access token. Expired, malformed or foreign
    /// tokens are simply "no session".
    pub fn verify(&self, token: &str) -> Option<Claims> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!("access token rejected: {:?}", e.kind());
                None
            }
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.credentials.url, path)
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, SessionError> {
        let response = self
            .client
            .post(self.endpoint(&format!("token?grant_type={}", grant_type)))
            .header("apikey", &self.credentials.anon_key)
            .json(&body)
            .send()
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl SessionProvider for SupabaseSessionProvider {
    async fn refresh_session(&self, jar: CookieJar) -> Result<CookieJar, SessionError> {
        let access_valid = jar
            .get(ACCESS_TOKEN_COOKIE)
            .is_some_and(|cookie| self.verify(cookie.value()).is_some());
        if access_valid {
            return Ok(jar);
        }

        let Some(refresh_token) = jar.get(REFRESH_TOKEN_COOKIE).map(|c| c.value().to_string())
        else {
            return Ok(jar);
        };

        let response = self
            .token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await?;

        let status = response.status();
        if status.is_client_error() {
            // The refresh token was revoked or already used: the session is over.
            tracing::info!("refresh token rejected ({}), clearing session cookies", status);
            return Ok(clear_tokens(jar));
        }
        if !status.is_success() {
            return Err(SessionError::Rejected {
                status: status.as_u16(),
            });
        }

        let tokens = response
            .json::<SessionTokens>()
            .await
            .map_err(|e| SessionError::Malformed(e.to_string()))?;

        tracing::debug!("session refreshed");
        Ok(store_tokens(jar, &tokens))
    }

    async fn get_user(&self, jar: &CookieJar) -> Result<Option<Identity>, SessionError> {
        let identity = jar
            .get(ACCESS_TOKEN_COOKIE)
            .and_then(|cookie| self.verify(cookie.value()))
            .map(|claims| Identity {
                id: claims.sub,
                email: claims.email,
            });
        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionTokens, SessionError> {
        let response = self
            .token_grant("password", json!({ "email": email, "password": password }))
            .await?;

        if !response.status().is_success() {
            return Err(SessionError::Rejected {
                status: response.status().as_u16(),
            });
        }

        response
            .json::<SessionTokens>()
            .await
            .map_err(|e| SessionError::Malformed(e.to_string()))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Uuid, SessionError> {
        let response = self
            .client
            .post(self.endpoint("signup"))
            .header("apikey", &self.credentials.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            // Email already registered, weak password, signups disabled...
            return Err(SessionError::Rejected {
                status: response.status().as_u16(),
            });
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| SessionError::Malformed(e.to_string()))?;

        // With email confirmation the user object is the body; with auto-confirm it
        // is nested next to the issued session.
        body.get("user")
            .and_then(|user| user.get("id"))
            .or_else(|| body.get("id"))
            .and_then(|id| id.as_str())
            .and_then(|id| Uuid::parse_str(id).ok())
            .ok_or_else(|| SessionError::Malformed("signup response without user id".to_string()))
    }
}

// --- Mock (For Tests) ---

/// MockSessionProvider
///
/// In-memory provider for tests. Cookies are ignored; the configured identity
/// is returned as-is.
#[derive(Clone, Default)]
pub struct MockSessionProvider {
    pub identity: Option<Identity>,
    /// When true, every operation fails as if Supabase were unreachable.
    pub should_fail: bool,
    /// When set, `refresh_session` rotates the session to these tokens.
    pub rotate_to: Option<SessionTokens>,
    refresh_calls: Arc<AtomicUsize>,
}

impl MockSessionProvider {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(id: Uuid) -> Self {
        Self {
            identity: Some(Identity { id, email: None }),
            ..Self::default()
        }
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Number of `refresh_session` calls observed, across clones.
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for MockSessionProvider {
    async fn refresh_session(&self, jar: CookieJar) -> Result<CookieJar, SessionError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(SessionError::Rejected { status: 503 });
        }
        Ok(match &self.rotate_to {
            Some(tokens) => store_tokens(jar, tokens),
            None => jar,
        })
    }

    async fn get_user(&self, _jar: &CookieJar) -> Result<Option<Identity>, SessionError> {
        if self.should_fail {
            return Err(SessionError::Rejected { status: 503 });
        }
        Ok(self.identity.clone())
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> Result<SessionTokens, SessionError> {
        if self.should_fail {
            return Err(SessionError::Rejected { status: 400 });
        }
        Ok(self.rotate_to.clone().unwrap_or_else(|| SessionTokens {
            access_token: "mock-access".to_string(),
            refresh_token: "mock-refresh".to_string(),
            expires_in: Some(3600),
        }))
    }

    async fn sign_up(&self, _email: &str, _password: &str) -> Result<Uuid, SessionError> {
        if self.should_fail {
            return Err(SessionError::Rejected { status: 422 });
        }
        Ok(self
            .identity
            .as_ref()
            .map(|identity| identity.id)
            .unwrap_or_else(Uuid::new_v4))
    }
}
