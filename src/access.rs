use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

/// Where anonymous viewers are sent when they hit a non-public page.
pub const LOGIN_PATH: &str = "/auth/login";

/// Where standard viewers are sent when they leave their scoped area.
pub const DOCUMENTS_PATH: &str = "/documents";

/// Paths that any viewer may open. Matched by exact equality only.
pub const PUBLIC_PATHS: [&str; 5] = ["/auth/login", "/auth/signup", "/", "/landing", "/pricing"];

/// Path prefixes a standard (non-elevated) viewer may open.
/// Matched as plain string prefixes, so `/documents-archive` matches `/documents`.
pub const USER_SCOPED_PREFIXES: [&str; 5] =
    ["/documents", "/collections", "/collection", "/chat", "/account"];

/// Role
///
/// The privilege level reported by the auth backend. Superusers on the R2R
/// deployment map to `Elevated` and bypass route scoping entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    Standard,
    Elevated,
}

/// ViewerState
///
/// Explicit snapshot of who is looking at the page. It is resolved per request
/// (see `auth::Viewer`) and passed into `evaluate`; there is no ambient viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ViewerState {
    pub is_authenticated: bool,
    pub role: Role,
}

impl ViewerState {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(role: Role) -> Self {
        Self {
            is_authenticated: true,
            role,
        }
    }
}

/// RouteClass
///
/// Derived classification of a navigation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    UserScoped,
    Other,
}

/// AccessDecision
///
/// Outcome of the gate. Acting on a redirect is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    RedirectTo(String),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// classify
///
/// Public membership wins over user scoping; neither set overlaps today, but
/// the order keeps `/` from ever being treated as a prefix.
pub fn classify(path: &str) -> RouteClass {
    if PUBLIC_PATHS.contains(&path) {
        RouteClass::Public
    } else if USER_SCOPED_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
    {
        RouteClass::UserScoped
    } else {
        RouteClass::Other
    }
}

/// evaluate
///
/// The route-gating policy run on every navigation and every viewer change.
///
/// 1. Anonymous viewers only see public pages; everything else goes to login.
/// 2. Elevated viewers see everything.
/// 3. Standard viewers see public pages and their scoped area; everything
///    else goes to the documents view.
pub fn evaluate(viewer: &ViewerState, path: &str) -> AccessDecision {
    let class = classify(path);

    if !viewer.is_authenticated {
        return match class {
            RouteClass::Public => AccessDecision::Allow,
            _ => AccessDecision::RedirectTo(LOGIN_PATH.to_string()),
        };
    }

    if viewer.role == Role::Elevated {
        return AccessDecision::Allow;
    }

    match class {
        RouteClass::Public | RouteClass::UserScoped => AccessDecision::Allow,
        RouteClass::Other => AccessDecision::RedirectTo(DOCUMENTS_PATH.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard() -> ViewerState {
        ViewerState::authenticated(Role::Standard)
    }

    #[test]
    fn anonymous_sees_public_pages_only() {
        let anon = ViewerState::anonymous();
        assert_eq!(evaluate(&anon, "/pricing"), AccessDecision::Allow);
        assert_eq!(evaluate(&anon, "/"), AccessDecision::Allow);
        assert_eq!(evaluate(&anon, "/auth/signup"), AccessDecision::Allow);
        assert_eq!(
            evaluate(&anon, "/documents"),
            AccessDecision::RedirectTo("/auth/login".to_string())
        );
        assert_eq!(
            evaluate(&anon, "/success"),
            AccessDecision::RedirectTo("/auth/login".to_string())
        );
    }

    #[test]
    fn root_is_public_by_exact_match_only() {
        assert_eq!(classify("/"), RouteClass::Public);
        assert_eq!(classify("/landing/extra"), RouteClass::Other);
        assert_eq!(
            evaluate(&ViewerState::anonymous(), "/pricing/"),
            AccessDecision::RedirectTo(LOGIN_PATH.to_string())
        );
    }

    #[test]
    fn standard_viewer_is_scoped() {
        assert_eq!(evaluate(&standard(), "/chat"), AccessDecision::Allow);
        assert_eq!(evaluate(&standard(), "/collections/42"), AccessDecision::Allow);
        assert_eq!(evaluate(&standard(), "/landing"), AccessDecision::Allow);
        assert_eq!(
            evaluate(&standard(), "/random"),
            AccessDecision::RedirectTo("/documents".to_string())
        );
    }

    #[test]
    fn user_scoped_matching_is_plain_prefix() {
        assert_eq!(classify("/documents-archive"), RouteClass::UserScoped);
        assert_eq!(classify("/documents2"), RouteClass::UserScoped);
        assert!(evaluate(&standard(), "/accountant").is_allowed());
    }

    #[test]
    fn elevated_viewer_bypasses_scoping() {
        let admin = ViewerState::authenticated(Role::Elevated);
        assert!(evaluate(&admin, "/anything").is_allowed());
        assert!(evaluate(&admin, "/success").is_allowed());
    }

    #[test]
    fn unauthenticated_elevated_role_is_still_anonymous() {
        let odd = ViewerState {
            is_authenticated: false,
            role: Role::Elevated,
        };
        assert_eq!(
            evaluate(&odd, "/chat"),
            AccessDecision::RedirectTo(LOGIN_PATH.to_string())
        );
    }
}
