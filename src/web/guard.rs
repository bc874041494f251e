//! Edge guard for the server-rendered admin area.
//!
//! Classifies each request path, resolves the session from the cookie jar and
//! applies the four-state decision table: no token and invalid token redirect
//! to login (the latter clearing both cookie names), valid sessions pass
//! through with identity headers, and the two "correct elevation" redirects
//! keep admins and non-admins on their respective landing pages.

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use tracing::error;

use crate::{
    authz::Role,
    web::{AppState, auth},
};

pub const PROTECTED_PREFIX: &str = "/admin";
pub const LOGIN_PATH: &str = "/admin/login";
pub const ADMIN_LANDING: &str = "/admin/dashboard";
pub const PROFESSOR_LANDING: &str = "/admin/add-notes";

pub const HEADER_PROFESSOR_ID: &str = "x-professor-id";
pub const HEADER_PROFESSOR_NAME: &str = "x-professor-name";
pub const HEADER_PROFESSOR_EMAIL: &str = "x-professor-email";

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum PathClass {
    Unprotected,
    Login,
    Protected,
    AdminOnly,
    ProfessorLanding,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum SessionState {
    NoToken,
    Invalid,
    ValidProfessor,
    ValidAdmin,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Decision {
    PassThrough,
    RedirectLogin,
    RedirectLoginClearCookies,
    RedirectAdminLanding,
    RedirectProfessorLanding,
}

fn classify_path(path: &str) -> PathClass {
    if path == LOGIN_PATH {
        return PathClass::Login;
    }
    if path == ADMIN_LANDING || path.starts_with("/admin/dashboard/") {
        return PathClass::AdminOnly;
    }
    if path == PROFESSOR_LANDING {
        return PathClass::ProfessorLanding;
    }
    if path == PROTECTED_PREFIX || path.starts_with("/admin/") {
        return PathClass::Protected;
    }
    PathClass::Unprotected
}

fn decide(class: PathClass, session: SessionState) -> Decision {
    match class {
        PathClass::Unprotected | PathClass::Login => Decision::PassThrough,
        _ => match session {
            SessionState::NoToken => Decision::RedirectLogin,
            SessionState::Invalid => Decision::RedirectLoginClearCookies,
            SessionState::ValidProfessor => {
                if class == PathClass::AdminOnly {
                    Decision::RedirectProfessorLanding
                } else {
                    Decision::PassThrough
                }
            }
            SessionState::ValidAdmin => {
                if class == PathClass::ProfessorLanding {
                    Decision::RedirectAdminLanding
                } else {
                    Decision::PassThrough
                }
            }
        },
    }
}

/// Characters that must not pass through unescaped inside a query value.
const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'+')
    .add(b'<')
    .add(b'>')
    .add(b'=')
    .add(b'?');

fn login_redirect_target(original_path: &str) -> String {
    format!(
        "{LOGIN_PATH}?redirect={}",
        utf8_percent_encode(original_path, QUERY_VALUE)
    )
}

fn login_redirect(original_path: &str) -> Redirect {
    Redirect::to(&login_redirect_target(original_path))
}

/// Non-ASCII bytes are always escaped; `%` must be too so decoding is
/// unambiguous.
const HEADER_VALUE: &AsciiSet = &CONTROLS.add(b'%');

/// Percent-encode a header value so it survives the visible-ASCII restriction
/// on HTTP headers. Pages decode it back before rendering.
pub fn encode_header_value(value: &str) -> String {
    utf8_percent_encode(value, HEADER_VALUE).to_string()
}

pub async fn guard(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let class = classify_path(&path);

    if matches!(class, PathClass::Unprotected | PathClass::Login) {
        return next.run(request).await;
    }

    let (session, professor) = match auth::token_from_jar(&jar) {
        None => (SessionState::NoToken, None),
        Some(token) => {
            // Validation errors are indistinguishable from an invalid token.
            match auth::validate_session(state.pool_ref(), state.jwt_secret(), &token).await {
                Ok(Some(professor)) => {
                    let session = match Role::from_str(&professor.role) {
                        Role::Admin => SessionState::ValidAdmin,
                        Role::Professor => SessionState::ValidProfessor,
                    };
                    (session, Some(professor))
                }
                Ok(None) => (SessionState::Invalid, None),
                Err(err) => {
                    error!(?err, "session validation failed in route guard");
                    (SessionState::Invalid, None)
                }
            }
        }
    };

    match decide(class, session) {
        Decision::PassThrough => {
            if let Some(professor) = professor {
                attach_identity_headers(&mut request, &professor);
            }
            next.run(request).await
        }
        Decision::RedirectLogin => login_redirect(&path).into_response(),
        Decision::RedirectLoginClearCookies => {
            (auth::clear_session_cookies(jar), login_redirect(&path)).into_response()
        }
        Decision::RedirectAdminLanding => Redirect::to(ADMIN_LANDING).into_response(),
        Decision::RedirectProfessorLanding => Redirect::to(PROFESSOR_LANDING).into_response(),
    }
}

fn attach_identity_headers(request: &mut Request, professor: &auth::Professor) {
    let pairs = [
        (HEADER_PROFESSOR_ID, professor.id.to_string()),
        (HEADER_PROFESSOR_NAME, encode_header_value(&professor.name)),
        (HEADER_PROFESSOR_EMAIL, encode_header_value(&professor.email)),
    ];

    for (name, value) in pairs {
        if let Ok(value) = HeaderValue::from_str(&value) {
            request
                .headers_mut()
                .insert(HeaderName::from_static(name), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_paths() {
        assert_eq!(classify_path("/"), PathClass::Unprotected);
        assert_eq!(classify_path("/api/chat"), PathClass::Unprotected);
        assert_eq!(classify_path("/admin/login"), PathClass::Login);
        assert_eq!(classify_path("/admin"), PathClass::Protected);
        assert_eq!(classify_path("/admin/settings"), PathClass::Protected);
        assert_eq!(classify_path("/admin/dashboard"), PathClass::AdminOnly);
        assert_eq!(classify_path("/admin/dashboard/users"), PathClass::AdminOnly);
        assert_eq!(classify_path("/admin/add-notes"), PathClass::ProfessorLanding);
    }

    #[test]
    fn redirect_target_is_percent_encoded() {
        assert_eq!(
            login_redirect_target("/admin/dashboard"),
            "/admin/login?redirect=/admin/dashboard"
        );
        assert_eq!(
            login_redirect_target("/admin/x?a=1&b=2"),
            "/admin/login?redirect=/admin/x%3Fa%3D1%26b%3D2"
        );
    }

    #[test]
    fn header_values_survive_non_ascii() {
        use axum::http::HeaderValue;
        use percent_encoding::percent_decode_str;

        let encoded = encode_header_value("José Pérez");
        assert!(HeaderValue::from_str(&encoded).is_ok());
        assert_eq!(
            percent_decode_str(&encoded).decode_utf8().expect("utf8"),
            "José Pérez"
        );

        // A literal percent round-trips too.
        let encoded = encode_header_value("50% effort");
        assert_eq!(
            percent_decode_str(&encoded).decode_utf8().expect("utf8"),
            "50% effort"
        );
    }

    #[test]
    fn missing_token_redirects_to_login() {
        assert_eq!(
            decide(PathClass::Protected, SessionState::NoToken),
            Decision::RedirectLogin
        );
        assert_eq!(
            decide(PathClass::AdminOnly, SessionState::NoToken),
            Decision::RedirectLogin
        );
    }

    #[test]
    fn invalid_token_redirects_and_clears_cookies() {
        assert_eq!(
            decide(PathClass::Protected, SessionState::Invalid),
            Decision::RedirectLoginClearCookies
        );
    }

    #[test]
    fn non_admin_is_kept_off_the_dashboard() {
        assert_eq!(
            decide(PathClass::AdminOnly, SessionState::ValidProfessor),
            Decision::RedirectProfessorLanding
        );
        assert_eq!(
            decide(PathClass::Protected, SessionState::ValidProfessor),
            Decision::PassThrough
        );
    }

    #[test]
    fn admin_is_elevated_away_from_the_general_landing() {
        assert_eq!(
            decide(PathClass::ProfessorLanding, SessionState::ValidAdmin),
            Decision::RedirectAdminLanding
        );
        assert_eq!(
            decide(PathClass::AdminOnly, SessionState::ValidAdmin),
            Decision::PassThrough
        );
    }

    #[test]
    fn login_page_is_always_reachable() {
        assert_eq!(
            decide(PathClass::Login, SessionState::NoToken),
            Decision::PassThrough
        );
        assert_eq!(
            decide(PathClass::Login, SessionState::Invalid),
            Decision::PassThrough
        );
    }
}
