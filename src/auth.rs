//! The two-account login gate and bearer sessions.

use std::collections::HashMap;

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::api::AppState;
use crate::error::{ApiError, ApiErrorWithMeta, E_FORBIDDEN, E_UNAUTHORIZED};
use crate::responses::{RequestMeta, new_meta};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Mod,
}

/// Dashboard sections a role may open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Landing,
    Settings,
    Rounds,
    Moderation,
    Meta,
    Financial,
}

impl Role {
    pub fn views(self) -> Vec<View> {
        match self {
            Role::Admin => vec![
                View::Landing,
                View::Settings,
                View::Rounds,
                View::Moderation,
                View::Meta,
                View::Financial,
            ],
            Role::Mod => vec![View::Moderation],
        }
    }

    pub fn landing_view(self) -> View {
        match self {
            Role::Admin => View::Landing,
            Role::Mod => View::Moderation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub role: Role,
    pub display_name: String,
    pub landing_view: View,
    pub views: Vec<View>,
}

impl User {
    fn new(username: &str, role: Role, display_name: &str) -> Self {
        Self {
            username: username.to_string(),
            role,
            display_name: display_name.to_string(),
            landing_view: role.landing_view(),
            views: role.views(),
        }
    }
}

/// Checks the hardcoded accounts. Usernames are case- and space-insensitive.
pub fn authenticate(username: &str, password: &str) -> Option<User> {
    match (username.trim().to_lowercase().as_str(), password) {
        ("marketing", "1111") => Some(User::new("admin", Role::Admin, "تيم الماركتنج")),
        ("moderation", "1234") => Some(User::new("mod", Role::Mod, "تيم المودريشن")),
        _ => None,
    }
}

/// Live bearer tokens. Each expires `ttl` after login; expired tokens are
/// refused on lookup and dropped on the next login.
#[derive(Debug)]
pub struct Sessions {
    ttl: Duration,
    inner: RwLock<HashMap<Uuid, Session>>,
}

#[derive(Debug)]
struct Session {
    user: User,
    expires_at: DateTime<Utc>,
}

impl Sessions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub async fn open(&self, user: User) -> Uuid {
        let token = Uuid::new_v4();
        let now = Utc::now();
        let mut sessions = self.inner.write().await;
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(
            token,
            Session {
                user,
                expires_at: now + self.ttl,
            },
        );
        token
    }

    pub async fn get(&self, token: &Uuid) -> Option<User> {
        let now = Utc::now();
        self.inner
            .read()
            .await
            .get(token)
            .filter(|s| s.expires_at > now)
            .map(|s| s.user.clone())
    }

    pub async fn close(&self, token: &Uuid) -> bool {
        self.inner.write().await.remove(token).is_some()
    }
}

fn bearer_token(parts: &Parts) -> Option<Uuid> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;
    Uuid::parse_str(token.trim()).ok()
}

fn request_meta(parts: &Parts) -> RequestMeta {
    parts
        .extensions
        .get::<RequestMeta>()
        .cloned()
        .unwrap_or_else(new_meta)
}

/// Any logged-in user, plus the token they presented.
pub struct CurrentUser {
    pub token: Uuid,
    pub user: User,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiErrorWithMeta;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let meta = request_meta(parts);
        let unauthorized = || {
            ApiError::Unauthorized("login required".into())
                .with_meta(meta.clone())
                .with_code(E_UNAUTHORIZED)
        };
        let token = bearer_token(parts).ok_or_else(unauthorized)?;
        let user = state.sessions.get(&token).await.ok_or_else(unauthorized)?;
        Ok(CurrentUser { token, user })
    }
}

/// A logged-in marketing (admin) user.
pub struct AdminUser(pub User);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiErrorWithMeta;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser { user, .. } = CurrentUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(ApiError::Forbidden("marketing team only".into())
                .with_meta(request_meta(parts))
                .with_code(E_FORBIDDEN));
        }
        Ok(AdminUser(user))
    }
}
