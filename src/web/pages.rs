use axum::{http::HeaderMap, response::Html};
use percent_encoding::percent_decode_str;

use crate::web::{
    guard::HEADER_PROFESSOR_NAME,
    templates::{render_dashboard_page, render_login_page, render_notes_page},
};

/// Identity headers arrive percent-encoded from the guard.
fn professor_name(headers: &HeaderMap) -> String {
    headers
        .get(HEADER_PROFESSOR_NAME)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| percent_decode_str(value).decode_utf8().ok())
        .map(|value| value.into_owned())
        .unwrap_or_else(|| "profesor".to_string())
}

pub async fn login_page() -> Html<String> {
    Html(render_login_page())
}

/// Admin landing. The guard guarantees an admin session and injects identity
/// headers before this runs.
pub async fn dashboard_page(headers: HeaderMap) -> Html<String> {
    Html(render_dashboard_page(&professor_name(&headers)))
}

/// General professor landing behind the guard.
pub async fn notes_page(headers: HeaderMap) -> Html<String> {
    Html(render_notes_page(&professor_name(&headers)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn decodes_the_encoded_professor_name() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HEADER_PROFESSOR_NAME,
            HeaderValue::from_static("Jos%C3%A9 P%C3%A9rez"),
        );

        assert_eq!(professor_name(&headers), "José Pérez");
    }

    #[test]
    fn falls_back_without_the_header() {
        assert_eq!(professor_name(&HeaderMap::new()), "profesor");
    }
}
