//! Access Policy
//!
//! Pure decision table mapping (path, identity, role) to either "continue" or a
//! redirect. Holds no state; the route guard feeds it the results of the session
//! and directory lookups for one request.

use crate::{models::UserRole, session::Identity};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const DASHBOARD_PATH: &str = "/dashboard";

// Asset, API and framework-internal prefixes never go through authorization.
const EXEMPT_PREFIXES: [&str; 4] = ["/api", "/_next", "/static", "/assets"];
const FAVICON_PATH: &str = "/favicon.ico";

/// RedirectTarget
///
/// The fixed set of locations the guard may redirect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectTarget {
    Login,
    SuperHome,
    AdminHome,
    EmployeeHome,
    Unauthorized,
}

impl RedirectTarget {
    pub fn path(&self) -> &'static str {
        match self {
            RedirectTarget::Login => LOGIN_PATH,
            RedirectTarget::SuperHome => "/dashboard/super",
            RedirectTarget::AdminHome => "/dashboard/admin",
            RedirectTarget::EmployeeHome => "/dashboard/employee",
            RedirectTarget::Unauthorized => "/dashboard/unauthorized",
        }
    }
}

/// role_home
///
/// The dashboard each role lands on after login.
pub fn role_home(role: UserRole) -> RedirectTarget {
    match role {
        UserRole::SuperUser => RedirectTarget::SuperHome,
        UserRole::Admin => RedirectTarget::AdminHome,
        UserRole::Employee => RedirectTarget::EmployeeHome,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Continue,
    Redirect(RedirectTarget),
}

/// Namespace
///
/// A role-exclusive dashboard subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Super,
    Admin,
    Employee,
}

impl Namespace {
    pub fn prefix(&self) -> &'static str {
        match self {
            Namespace::Super => "/dashboard/super",
            Namespace::Admin => "/dashboard/admin",
            Namespace::Employee => "/dashboard/employee",
        }
    }

    /// allows
    ///
    /// Super users are privileged over the admin subtree; the employee subtree is
    /// employee-only.
    pub fn allows(&self, role: UserRole) -> bool {
        match (self, role) {
            (Namespace::Super, UserRole::SuperUser) => true,
            (Namespace::Super, UserRole::Admin | UserRole::Employee) => false,
            (Namespace::Admin, UserRole::SuperUser | UserRole::Admin) => true,
            (Namespace::Admin, UserRole::Employee) => false,
            (Namespace::Employee, UserRole::Employee) => true,
            (Namespace::Employee, UserRole::SuperUser | UserRole::Admin) => false,
        }
    }
}

/// RouteClass
///
/// Classification of a request path, derived on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Exempt,
    AuthPage,
    Root,
    DashboardRoot,
    Namespaced(Namespace),
    // Any other page under /dashboard, e.g. the unauthorized notice.
    DashboardOther,
    Unclassified,
}

impl RouteClass {
    pub fn of(path: &str) -> Self {
        if is_exempt(path) {
            return RouteClass::Exempt;
        }

        let path = normalize(path);
        if path == LOGIN_PATH || path == REGISTER_PATH {
            return RouteClass::AuthPage;
        }
        if path == "/" {
            return RouteClass::Root;
        }
        if path == DASHBOARD_PATH {
            return RouteClass::DashboardRoot;
        }
        for ns in [Namespace::Super, Namespace::Admin, Namespace::Employee] {
            if is_under(path, ns.prefix()) {
                return RouteClass::Namespaced(ns);
            }
        }
        if is_under(path, DASHBOARD_PATH) {
            return RouteClass::DashboardOther;
        }
        RouteClass::Unclassified
    }

    /// Root and everything under /dashboard require a session.
    pub fn is_protected(&self) -> bool {
        matches!(
            self,
            RouteClass::Root
                | RouteClass::DashboardRoot
                | RouteClass::Namespaced(_)
                | RouteClass::DashboardOther
        )
    }
}

/// is_exempt
///
/// Static assets, API routes and any path with a file extension skip the guard
/// entirely, before a session or directory lookup is attempted.
pub fn is_exempt(path: &str) -> bool {
    path == FAVICON_PATH
        || path.contains('.')
        || EXEMPT_PREFIXES.iter().any(|prefix| is_under(path, prefix))
}

/// decide
///
/// Rules, first match wins:
/// 1. exempt paths continue;
/// 2. without an identity, protected paths go to login;
/// 3. with an identity but no resolvable role, auth pages and the employee
///    subtree continue (degraded employee access), everything else goes to login;
/// 4. auth pages and `/` send a signed-in user to their role's home;
/// 5. a namespace that does not allow the role goes to the unauthorized page;
/// 6. bare `/dashboard` goes to the role's home;
/// 7. anything else continues.
pub fn decide(path: &str, identity: Option<&Identity>, role: Option<UserRole>) -> AccessDecision {
    let class = RouteClass::of(path);
    if class == RouteClass::Exempt {
        return AccessDecision::Continue;
    }

    if identity.is_none() {
        return if class.is_protected() {
            AccessDecision::Redirect(RedirectTarget::Login)
        } else {
            AccessDecision::Continue
        };
    }

    let Some(role) = role else {
        return match class {
            RouteClass::AuthPage | RouteClass::Namespaced(Namespace::Employee) => {
                AccessDecision::Continue
            }
            _ => AccessDecision::Redirect(RedirectTarget::Login),
        };
    };

    match class {
        RouteClass::AuthPage | RouteClass::Root => AccessDecision::Redirect(role_home(role)),
        RouteClass::Namespaced(ns) if !ns.allows(role) => {
            AccessDecision::Redirect(RedirectTarget::Unauthorized)
        }
        RouteClass::DashboardRoot => AccessDecision::Redirect(role_home(role)),
        _ => AccessDecision::Continue,
    }
}

/// fallback_on_error
///
/// Outcome when the guard itself fails: protected paths go to login, everything
/// else (auth pages included) passes through.
pub fn fallback_on_error(path: &str) -> AccessDecision {
    if RouteClass::of(path).is_protected() {
        AccessDecision::Redirect(RedirectTarget::Login)
    } else {
        AccessDecision::Continue
    }
}

fn is_under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

// "/dashboard/" and "/dashboard" classify the same; the root stays "/".
fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}
