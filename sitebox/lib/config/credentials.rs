use std::fmt;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE};

use crate::{SiteboxError, SiteboxResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Ambient credentials attached to every backend request.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Credentials {
    /// No credentials.
    #[default]
    Anonymous,

    /// An `Authorization: Bearer <token>` header.
    Bearer(String),

    /// A `Cookie` header carrying the session.
    Cookie(String),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Credentials {
    /// Builds the default headers that carry these credentials.
    ///
    /// Header values are marked sensitive so they never show up in debug output.
    pub fn to_headers(&self) -> SiteboxResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let (name, raw) = match self {
            Credentials::Anonymous => return Ok(headers),
            Credentials::Bearer(token) => (AUTHORIZATION, format!("Bearer {token}")),
            Credentials::Cookie(cookie) => (COOKIE, cookie.clone()),
        };

        let mut value = HeaderValue::from_str(&raw)
            .map_err(|e| SiteboxError::InvalidCredentials(e.to_string()))?;
        value.set_sensitive(true);
        headers.insert(name, value);

        Ok(headers)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Anonymous => write!(f, "Anonymous"),
            Credentials::Bearer(_) => write!(f, "Bearer(***)"),
            Credentials::Cookie(_) => write!(f, "Cookie(***)"),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
