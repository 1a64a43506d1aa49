//! Request validation run before any probe or network action.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use reqwest::header::{HeaderName, HeaderValue};
use serde::Deserialize;
use thiserror::Error;
use url::{ParseError, Url};

/// Characters rejected in strict mode on top of control characters.
const SHELL_METACHARACTERS: [char; 9] = ['`', '$', ';', '|', '&', '<', '>', '(', ')'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
        HttpMethod::Head,
        HttpMethod::Options,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        HttpMethod::ALL
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(raw))
            .ok_or_else(|| ValidationError::Method {
                method: raw.to_string(),
            })
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }
}

fn allowed_methods() -> String {
    HttpMethod::ALL
        .iter()
        .map(HttpMethod::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid URL: URL parsing failed: {0}")]
    Unparseable(String),
    #[error("Invalid URL: missing scheme (only http/https allowed)")]
    MissingScheme,
    #[error("Invalid URL: Invalid scheme: {scheme} (only http/https allowed)")]
    Scheme { scheme: String },
    #[error("Invalid URL: Missing hostname")]
    MissingHost,
    #[error("Invalid URL: URL contains invalid characters")]
    UrlCharacters,
    #[error("Invalid method: {method} (allowed: {})", allowed_methods())]
    Method { method: String },
    #[error("Invalid header: contains newline characters")]
    HeaderNewline,
    #[error("Invalid header: {name:?} is not a valid header name")]
    HeaderName { name: String },
    #[error("Invalid header: value for {name:?} is not a valid header value")]
    HeaderValue { name: String },
    #[error("Invalid header: {name:?} appears more than once")]
    DuplicateHeader { name: String },
}

/// Raw operator input, not yet validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RequestDraft {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    HttpMethod::Get.as_str().to_string()
}

impl RequestDraft {
    pub fn new(url: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// A request that passed validation. Only [`Validator::validate`] builds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    url: Url,
    method: HttpMethod,
    headers: BTreeMap<String, String>,
}

impl RequestSpec {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Validator {
    strict_url_chars: bool,
}

impl Validator {
    pub fn new(strict_url_chars: bool) -> Self {
        Self { strict_url_chars }
    }

    pub fn validate(&self, draft: &RequestDraft) -> Result<RequestSpec, ValidationError> {
        let url = self.validate_url(&draft.url)?;
        let method = self.validate_method(&draft.method)?;
        let headers = self.validate_headers(&draft.headers)?;
        Ok(RequestSpec {
            url,
            method,
            headers,
        })
    }

    pub fn validate_url(&self, raw: &str) -> Result<Url, ValidationError> {
        let url = Url::parse(raw).map_err(|e| match e {
            ParseError::RelativeUrlWithoutBase => ValidationError::MissingScheme,
            ParseError::EmptyHost => ValidationError::MissingHost,
            other => ValidationError::Unparseable(other.to_string()),
        })?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ValidationError::Scheme {
                    scheme: other.to_string(),
                })
            }
        }

        // `http:host` and `http:\\host` parse with a host; require `//`.
        let has_authority = raw
            .split_once(':')
            .map_or(false, |(_, rest)| rest.starts_with("//"));
        if !has_authority || url.host_str().map_or(true, str::is_empty) {
            return Err(ValidationError::MissingHost);
        }

        // The parser silently drops tabs and newlines, so check the raw text.
        if raw.chars().any(|c| self.is_forbidden_url_char(c)) {
            return Err(ValidationError::UrlCharacters);
        }

        Ok(url)
    }

    pub fn validate_method(&self, raw: &str) -> Result<HttpMethod, ValidationError> {
        raw.parse()
    }

    /// All-or-nothing: one bad header rejects the whole map.
    pub fn validate_headers(
        &self,
        headers: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>, ValidationError> {
        if headers
            .iter()
            .any(|(name, value)| has_line_break(name) || has_line_break(value))
        {
            return Err(ValidationError::HeaderNewline);
        }

        let mut seen = Vec::with_capacity(headers.len());
        for (name, value) in headers {
            let parsed = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                ValidationError::HeaderName { name: name.clone() }
            })?;
            HeaderValue::from_str(value).map_err(|_| ValidationError::HeaderValue {
                name: name.clone(),
            })?;
            if seen.contains(&parsed) {
                return Err(ValidationError::DuplicateHeader { name: name.clone() });
            }
            seen.push(parsed);
        }

        Ok(headers.clone())
    }

    fn is_forbidden_url_char(&self, c: char) -> bool {
        c.is_control() || (self.strict_url_chars && SHELL_METACHARACTERS.contains(&c))
    }
}

fn has_line_break(text: &str) -> bool {
    text.contains('\n') || text.contains('\r')
}
