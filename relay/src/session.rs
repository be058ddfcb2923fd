use std::collections::HashMap;
use uuid::Uuid;

/// Cookie carrying the per-browser user identifier.
pub const SESSION_COOKIE_NAME: &str = "chatkit_session_id";
/// Session cookie lifetime: 30 days.
pub const SESSION_COOKIE_MAX_AGE_SECONDS: u64 = 60 * 60 * 24 * 30;

/// User identity resolved for one exchange request
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIdentity {
    /// Stable per-browser user id
    pub user_id: String,
    /// Whether the id was minted for this request and needs a cookie
    pub is_new: bool,
}

/// Parse a Cookie header into key/value pairs.
///
/// Pairs are split on `;` and trimmed as a whole; each pair splits on the
/// first `=` only, so values may contain further `=` characters. Pairs
/// without `=` are skipped and later duplicates win.
pub fn parse_cookie_header(header: &str) -> HashMap<&str, &str> {
    let mut cookies = HashMap::new();
    for pair in header.split(';') {
        let pair = pair.trim();
        if let Some((key, value)) = pair.split_once('=') {
            cookies.insert(key, value);
        }
    }
    cookies
}

/// Reuse the session id from the Cookie header, or mint a fresh v4 UUID.
///
/// An empty cookie value counts as absent, so a cleared cookie gets a new
/// identity instead of an empty user id.
pub fn resolve_identity(cookie_header: Option<&str>) -> ResolvedIdentity {
    let existing = cookie_header
        .map(parse_cookie_header)
        .and_then(|cookies| cookies.get(SESSION_COOKIE_NAME).map(|value| value.to_string()))
        .filter(|value| !value.is_empty());

    match existing {
        Some(user_id) => ResolvedIdentity {
            user_id,
            is_new: false,
        },
        None => ResolvedIdentity {
            user_id: Uuid::new_v4().to_string(),
            is_new: true,
        },
    }
}

/// Render the Set-Cookie value stamping a newly minted identity.
pub fn build_session_cookie(user_id: &str, secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax{}",
        SESSION_COOKIE_NAME, user_id, SESSION_COOKIE_MAX_AGE_SECONDS, secure_flag
    )
}
