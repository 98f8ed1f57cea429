use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::Url;
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;

use crate::storage::{SessionKey, SessionStore};

/// Cookie jar kept in the session store next to the CSRF token, so the
/// pair survives restarts and logout drops them together.
///
/// The backend serves a single origin, so cookies are not scoped by
/// domain or path.
pub struct SessionCookies {
    session: Arc<dyn SessionStore>,
}

impl SessionCookies {
    pub fn new(session: Arc<dyn SessionStore>) -> Self {
        Self { session }
    }

    fn load(&self) -> BTreeMap<String, String> {
        match self.session.get(SessionKey::Cookies) {
            Ok(stored) => parse_cookie_header(stored.as_deref().unwrap_or_default()),
            Err(err) => {
                log::warn!("Failed to read stored cookies: {err}");
                BTreeMap::new()
            }
        }
    }

    fn save(&self, jar: &BTreeMap<String, String>) {
        let result = if jar.is_empty() {
            self.session.remove(SessionKey::Cookies)
        } else {
            self.session.set(SessionKey::Cookies, &format_cookie_header(jar))
        };
        if let Err(err) = result {
            log::warn!("Failed to store cookies: {err}");
        }
    }
}

impl CookieStore for SessionCookies {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let mut jar = self.load();
        let mut changed = false;
        for header in cookie_headers {
            match header.to_str() {
                Ok(line) => changed |= apply_set_cookie(&mut jar, line),
                Err(_) => log::warn!("Ignoring non-ASCII Set-Cookie from {url}"),
            }
        }
        if changed {
            self.save(&jar);
        }
    }

    fn cookies(&self, _url: &Url) -> Option<HeaderValue> {
        let jar = self.load();
        if jar.is_empty() {
            return None;
        }
        HeaderValue::from_str(&format_cookie_header(&jar)).ok()
    }
}

/// Splits a `Cookie` header (`a=1; b=2`) into name/value pairs.
pub(crate) fn parse_cookie_header(header: &str) -> BTreeMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

pub(crate) fn format_cookie_header(jar: &BTreeMap<String, String>) -> String {
    jar.iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Applies one `Set-Cookie` line. `Max-Age=0` or an empty value removes the cookie.
/// Returns whether the jar changed.
pub(crate) fn apply_set_cookie(jar: &mut BTreeMap<String, String>, line: &str) -> bool {
    let mut parts = line.split(';');
    let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
        return false;
    };
    let name = name.trim();
    if name.is_empty() {
        return false;
    }
    let value = value.trim().trim_matches('"');
    let expired = parts.any(|attr| {
        attr.split_once('=').is_some_and(|(key, age)| {
            key.trim().eq_ignore_ascii_case("max-age") && age.trim().starts_with(['0', '-'])
        })
    });

    if expired || value.is_empty() {
        jar.remove(name).is_some()
    } else {
        jar.insert(name.to_string(), value.to_string()).as_deref() != Some(value)
    }
}
