use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use chrono::Utc;

use crate::{
    AppState,
    auth::CurrentUser,
    directory::UserDirectory,
    models::{UserRecord, UserRole},
    policy::{AccessDecision, Namespace, RouteClass, decide, fallback_on_error, is_exempt},
    session::{Identity, SessionProvider},
};

/// GuardOutcome
///
/// Result of authorizing one request: the cookie jar to commit (possibly holding a
/// refreshed session), the decision, and the resolved user when there is one.
#[derive(Debug)]
pub struct GuardOutcome {
    pub jar: CookieJar,
    pub decision: AccessDecision,
    pub user: Option<UserRecord>,
}

impl GuardOutcome {
    fn fallback(path: &str, jar: CookieJar) -> Self {
        Self {
            jar,
            decision: fallback_on_error(path),
            user: None,
        }
    }
}

/// authorize
///
/// Runs the session refresh, identity resolution and directory lookup in sequence
/// and applies the access policy. Never fails: session provider errors resolve to
/// the safe fallback, directory errors to degraded access.
pub async fn authorize(
    path: &str,
    jar: CookieJar,
    session: &dyn SessionProvider,
    directory: &dyn UserDirectory,
) -> GuardOutcome {
    let jar = match session.refresh_session(jar.clone()).await {
        Ok(jar) => jar,
        Err(e) => {
            tracing::error!(path, "session refresh failed: {}", e);
            return GuardOutcome::fallback(path, jar);
        }
    };

    let identity = match session.get_user(&jar).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::error!(path, "session lookup failed: {}", e);
            return GuardOutcome::fallback(path, jar);
        }
    };

    let user = match &identity {
        None => None,
        Some(identity) => match directory.find_user(identity.id).await {
            Ok(Some(user)) => Some(user),
            Ok(None) => {
                tracing::warn!(user_id = %identity.id, "authenticated identity has no users row");
                None
            }
            Err(e) => {
                tracing::warn!(user_id = %identity.id, "user directory lookup failed: {}", e);
                None
            }
        },
    };

    let decision = decide(path, identity.as_ref(), user.as_ref().map(|u| u.role));

    // Unresolved role on the employee subtree: serve it as an employee with no
    // organization.
    let user = match (user, &identity) {
        (None, Some(identity))
            if decision == AccessDecision::Continue
                && RouteClass::of(path) == RouteClass::Namespaced(Namespace::Employee) =>
        {
            Some(degraded_employee(identity))
        }
        (user, _) => user,
    };

    GuardOutcome {
        jar,
        decision,
        user,
    }
}

fn degraded_employee(identity: &Identity) -> UserRecord {
    let now = Utc::now();
    UserRecord {
        id: identity.id,
        email: identity.email.clone().unwrap_or_default(),
        full_name: String::new(),
        role: UserRole::Employee,
        organization_id: None,
        created_at: now,
        updated_at: now,
    }
}

/// route_guard
///
/// Axum middleware applied to the whole router. Exempt paths and deployments
/// without Supabase credentials pass straight through. Otherwise the refreshed
/// session cookies are attached to whatever response comes out, redirect or not.
pub async fn route_guard(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if is_exempt(&path) {
        return next.run(request).await;
    }

    let Some(session) = state.session.clone() else {
        tracing::debug!(path = %path, "session provider not configured, skipping authorization");
        return next.run(request).await;
    };

    let GuardOutcome {
        jar,
        decision,
        user,
    } = authorize(&path, jar, session.as_ref(), state.directory.as_ref()).await;

    tracing::debug!(path = %path, ?decision, "route decision");

    match decision {
        AccessDecision::Continue => {
            if let Some(user) = user {
                request.extensions_mut().insert(CurrentUser(user));
            }
            let response = next.run(request).await;
            (jar, response).into_response()
        }
        // 307 keeps the method and body of the original request.
        AccessDecision::Redirect(target) => {
            (jar, Redirect::temporary(target.path())).into_response()
        }
    }
}
