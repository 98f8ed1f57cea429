/// Keys held in the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKey {
    /// Bearer JWT issued at login
    Token,
    /// Anti-forgery token from the CSRF handshake
    CsrfToken,
    /// Cached display identity, refreshed on login and profile update
    Username,
    Avatar,
    /// Cookies set by the backend, sent back on every request
    Cookies,
}

impl SessionKey {
    pub const ALL: [SessionKey; 5] = [
        SessionKey::Token,
        SessionKey::CsrfToken,
        SessionKey::Username,
        SessionKey::Avatar,
        SessionKey::Cookies,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SessionKey::Token => "token",
            SessionKey::CsrfToken => "csrfToken",
            SessionKey::Username => "username",
            SessionKey::Avatar => "avatar",
            SessionKey::Cookies => "cookies",
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
