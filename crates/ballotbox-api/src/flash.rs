//! One-shot notice cookie. Redirect targets pop the notice and surface it in
//! their page context, matching the redirect-with-message flows of the poll
//! pages.

use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

const FLASH_COOKIE: &str = "ballotbox_notice";

pub fn set_notice(jar: CookieJar, message: &str) -> CookieJar {
    // Base64 keeps spaces and quotes out of the cookie value.
    let mut cookie = Cookie::new(FLASH_COOKIE, URL_SAFE_NO_PAD.encode(message));
    cookie.set_path("/");
    cookie.set_http_only(true);
    jar.add(cookie)
}

/// Remove and return the pending notice, if any.
pub fn take_notice(jar: CookieJar) -> (CookieJar, Option<String>) {
    let Some(cookie) = jar.get(FLASH_COOKIE) else {
        return (jar, None);
    };
    let message = URL_SAFE_NO_PAD
        .decode(cookie.value())
        .ok()
        .and_then(|raw| String::from_utf8(raw).ok());

    let mut removal = Cookie::from(FLASH_COOKIE);
    removal.set_path("/");
    (jar.remove(removal), message)
}

/// 303 redirect carrying a one-shot notice for the target page.
pub fn redirect_with_notice(jar: CookieJar, to: &str, message: &str) -> Response {
    (set_notice(jar, message), Redirect::to(to)).into_response()
}
