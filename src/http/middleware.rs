// Session cookie middleware

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use cookie::{Cookie, SameSite};
use tracing::{debug, warn};

use crate::basket::BASKET_SECTION;
use crate::config::SessionConfig;
use crate::state::AppState;

/// Resolve the visitor's session, expose it to handlers and write the cookie back
pub async fn session(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let config = &state.config.session;
    let cookie_id = session_cookie(request.headers(), &config.cookie_name);
    let session = state.sessions.start(cookie_id.as_deref());

    request.extensions_mut().insert(session.clone());
    let mut response = next.run(request).await;

    let basket = session.section(BASKET_SECTION);
    if !basket.is_empty() {
        basket.set_expiration(Some(config.basket_expiration()));
        debug!(expires_at = ?basket.expires_at(), "Basket expiration refreshed");
    }

    match HeaderValue::from_str(&set_cookie_value(config, &session.id())) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => warn!(error = %e, "Session cookie not representable as a header"),
    }

    response
}

/// Value of the named cookie, if sent
pub fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}

fn set_cookie_value(config: &SessionConfig, id: &str) -> String {
    Cookie::build((config.cookie_name.as_str(), id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(cookie::time::Duration::seconds(config.lifetime_secs as i64))
        .secure(config.cookie_secure)
        .build()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; MAIN=abcdefghijklmnopqrstuvwx; other=1"),
        );

        assert_eq!(
            session_cookie(&headers, "MAIN").as_deref(),
            Some("abcdefghijklmnopqrstuvwx")
        );
        assert_eq!(session_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_malformed_cookie_pairs_skipped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("=broken; MAIN=abcdefghijklmnopqrstuvwx"));
        headers.append(header::COOKIE, HeaderValue::from_static("other=1"));

        assert_eq!(
            session_cookie(&headers, "MAIN").as_deref(),
            Some("abcdefghijklmnopqrstuvwx")
        );
        assert_eq!(session_cookie(&headers, "other").as_deref(), Some("1"));
    }

    #[test]
    fn test_set_cookie_attributes() {
        let mut config = SessionConfig::default();
        let value = set_cookie_value(&config, "abc");
        let parsed = Cookie::parse(value.as_str()).unwrap();
        assert_eq!(parsed.name(), "MAIN");
        assert_eq!(parsed.value(), "abc");
        assert_eq!(parsed.path(), Some("/"));
        assert_eq!(parsed.http_only(), Some(true));
        assert_eq!(parsed.same_site(), Some(SameSite::Lax));
        assert_eq!(parsed.max_age(), Some(cookie::time::Duration::seconds(1_209_600)));
        assert!(!value.contains("Secure"));

        config.cookie_secure = true;
        let secure = set_cookie_value(&config, "abc");
        assert_eq!(Cookie::parse(secure.as_str()).unwrap().secure(), Some(true));
    }
}
