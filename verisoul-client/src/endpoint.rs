//! Endpoint catalogue and path template rendering.
//!
//! Templates use `{name}` placeholders. Placeholders in the path must be
//! supplied and are percent-encoded; a query segment whose placeholder is not
//! supplied is dropped. Path values that are empty, `.` or `..` are refused.
//!
//! ```
//! use verisoul_client::endpoint;
//!
//! let path = endpoint::LIST_ADD_ACCOUNT.render(&[("list_name", "vip users"), ("account_id", "a1")])?;
//! assert_eq!(path, "/list/vip%20users/account/a1");
//!
//! let path = endpoint::LIVENESS_SESSION.render(&[])?;
//! assert_eq!(path, "/liveness/session");
//! # Ok::<(), verisoul_client::ApiError>(())
//! ```

use url::form_urlencoded;

use crate::{
    error::{ApiError, ErrorKind, Result},
    transport::HttpMethod,
};

/// A request descriptor: verb plus path template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    /// HTTP verb.
    pub method: HttpMethod,
    /// Path template, optionally followed by `?key={param}` query segments.
    pub template: &'static str,
}

impl Endpoint {
    /// Creates a descriptor.
    #[must_use]
    pub const fn new(method: HttpMethod, template: &'static str) -> Self {
        Self { method, template }
    }

    /// Substitutes `params` into the template.
    ///
    /// # Errors
    ///
    /// Returns a [`BadRequest`](ErrorKind::BadRequest) error with status 0 if a
    /// path placeholder has no value, or its value is empty, `.` or `..`. Dot
    /// segments would be collapsed by URL parsing and address another route.
    /// No request is made in either case.
    pub fn render(&self, params: &[(&str, &str)]) -> Result<String> {
        let (path, query) = match self.template.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (self.template, None),
        };

        let mut rendered = substitute(path, params, encode_path).map_err(|e| {
            let message = match e {
                ParamError::Missing(name) => format!("Missing path parameter '{name}'"),
                ParamError::Rejected(name) => {
                    format!("Path parameter '{name}' must not be empty, '.' or '..'")
                }
            };
            ApiError::new(ErrorKind::BadRequest, message, 0, self.template)
        })?;

        let segments: Vec<String> = query
            .into_iter()
            .flat_map(|q| q.split('&'))
            .filter_map(|segment| substitute(segment, params, encode_query).ok())
            .collect();

        if !segments.is_empty() {
            rendered.push('?');
            rendered.push_str(&segments.join("&"));
        }

        Ok(rendered)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamError<'t> {
    Missing(&'t str),
    Rejected(&'t str),
}

/// Replaces every `{name}` in `segment`, stopping at the first placeholder
/// that has no value or whose value `encode` refuses.
fn substitute<'t>(
    segment: &'t str,
    params: &[(&str, &str)],
    encode: fn(&str) -> Option<String>,
) -> std::result::Result<String, ParamError<'t>> {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|c| open + c) else {
            break;
        };

        let name = &rest[open + 1..close];
        let value = params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
            .ok_or(ParamError::Missing(name))?;

        out.push_str(&rest[..open]);
        out.push_str(&encode(value).ok_or(ParamError::Rejected(name))?);
        rest = &rest[close + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

#[allow(clippy::unnecessary_wraps, reason = "shares the encoder signature with encode_path")]
fn encode_query(value: &str) -> Option<String> {
    Some(form_urlencoded::byte_serialize(value.as_bytes()).collect())
}

fn encode_path(value: &str) -> Option<String> {
    if matches!(value, "" | "." | "..") {
        return None;
    }
    // Literal '+' is already escaped as %2B, so every remaining '+' is a space.
    encode_query(value).map(|encoded| encoded.replace('+', "%20"))
}

/// `GET /account/{account_id}`
pub const ACCOUNT_GET: Endpoint = Endpoint::new(HttpMethod::Get, "/account/{account_id}");
/// `DELETE /account/{account_id}`
pub const ACCOUNT_DELETE: Endpoint = Endpoint::new(HttpMethod::Delete, "/account/{account_id}");
/// `PUT /account/{account_id}`
pub const ACCOUNT_UPDATE: Endpoint = Endpoint::new(HttpMethod::Put, "/account/{account_id}");
/// `GET /account/{account_id}/sessions`
pub const ACCOUNT_SESSIONS: Endpoint = Endpoint::new(HttpMethod::Get, "/account/{account_id}/sessions");
/// `GET /account/{account_id}/accounts`
pub const ACCOUNT_LINKED: Endpoint = Endpoint::new(HttpMethod::Get, "/account/{account_id}/accounts");

/// `POST /session/authenticate`
pub const SESSION_AUTHENTICATE: Endpoint = Endpoint::new(HttpMethod::Post, "/session/authenticate");
/// `POST /session/unauthenticated`
pub const SESSION_UNAUTHENTICATED: Endpoint = Endpoint::new(HttpMethod::Post, "/session/unauthenticated");
/// `GET /session/{session_id}`
pub const SESSION_GET: Endpoint = Endpoint::new(HttpMethod::Get, "/session/{session_id}");

/// `POST /phone`
pub const PHONE_VERIFY: Endpoint = Endpoint::new(HttpMethod::Post, "/phone");

/// `GET /liveness/session`, optionally tied to a referring session.
pub const LIVENESS_SESSION: Endpoint =
    Endpoint::new(HttpMethod::Get, "/liveness/session?referring_session_id={referring_session_id}");
/// `POST /liveness/verify-face`
pub const LIVENESS_VERIFY_FACE: Endpoint = Endpoint::new(HttpMethod::Post, "/liveness/verify-face");
/// `POST /liveness/verify-id`
pub const LIVENESS_VERIFY_ID: Endpoint = Endpoint::new(HttpMethod::Post, "/liveness/verify-id");
/// `POST /liveness/verify-identity`
pub const LIVENESS_VERIFY_IDENTITY: Endpoint = Endpoint::new(HttpMethod::Post, "/liveness/verify-identity");
/// `POST /liveness/enroll`
pub const LIVENESS_ENROLL: Endpoint = Endpoint::new(HttpMethod::Post, "/liveness/enroll");

/// `POST /list/{list_name}`
pub const LIST_CREATE: Endpoint = Endpoint::new(HttpMethod::Post, "/list/{list_name}");
/// `GET /list/{list_name}`
pub const LIST_GET: Endpoint = Endpoint::new(HttpMethod::Get, "/list/{list_name}");
/// `POST /list/{list_name}/account/{account_id}`
pub const LIST_ADD_ACCOUNT: Endpoint =
    Endpoint::new(HttpMethod::Post, "/list/{list_name}/account/{account_id}");
/// `DELETE /list/{list_name}/account/{account_id}`
pub const LIST_REMOVE_ACCOUNT: Endpoint =
    Endpoint::new(HttpMethod::Delete, "/list/{list_name}/account/{account_id}");
/// `DELETE /list/{list_name}`
pub const LIST_DELETE: Endpoint = Endpoint::new(HttpMethod::Delete, "/list/{list_name}");
/// `GET /list`
pub const LIST_ALL: Endpoint = Endpoint::new(HttpMethod::Get, "/list");
