//! Session cookies: `accessToken` and `refreshToken`.
//!
//! Production serves the API and the web app from different domains, so the
//! cookies go out as `SameSite=None; Secure`. Development keeps `SameSite=Lax`
//! over plain http.

use std::time::Duration;

use axum::http::{
    header::{AUTHORIZATION, COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use cookie::{Cookie, SameSite};

use crate::{auth::jwt::TokenPair, config::Environment};

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

fn build_cookie(
    name: &'static str,
    value: String,
    max_age: Duration,
    env: Environment,
) -> Cookie<'static> {
    let (same_site, secure) = if env.is_production() {
        (SameSite::None, true)
    } else {
        (SameSite::Lax, false)
    };
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(same_site)
        .secure(secure)
        .max_age(cookie::time::Duration::seconds(max_age.as_secs() as i64))
        .build()
}

fn to_header(cookie: Cookie<'_>) -> anyhow::Result<HeaderValue> {
    Ok(HeaderValue::from_str(&cookie.to_string())?)
}

/// Append `Set-Cookie` headers for a freshly issued pair.
pub fn set_session_cookies(
    headers: &mut HeaderMap,
    pair: &TokenPair,
    access_ttl: Duration,
    refresh_ttl: Duration,
    env: Environment,
) -> anyhow::Result<()> {
    headers.append(
        SET_COOKIE,
        to_header(build_cookie(ACCESS_COOKIE, pair.access.clone(), access_ttl, env))?,
    );
    headers.append(
        SET_COOKIE,
        to_header(build_cookie(REFRESH_COOKIE, pair.refresh.clone(), refresh_ttl, env))?,
    );
    Ok(())
}

/// Append `Set-Cookie` headers that expire both session cookies.
pub fn clear_session_cookies(headers: &mut HeaderMap, env: Environment) -> anyhow::Result<()> {
    for name in [ACCESS_COOKIE, REFRESH_COOKIE] {
        headers.append(
            SET_COOKIE,
            to_header(build_cookie(name, String::new(), Duration::ZERO, env))?,
        );
    }
    Ok(())
}

/// Value of the named cookie in the request's `Cookie` header(s).
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == name && !c.value().is_empty())
        .map(|c| c.value().to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Access token from the cookie, falling back to `Authorization: Bearer`.
pub fn access_token(headers: &HeaderMap) -> Option<String> {
    read_cookie(headers, ACCESS_COOKIE).or_else(|| bearer_token(headers))
}

pub fn refresh_token(headers: &HeaderMap) -> Option<String> {
    read_cookie(headers, REFRESH_COOKIE)
}
