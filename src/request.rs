use reqwest::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    multipart, Method, Url,
};

use crate::{shape::Shape, ConfigError};

const JSON_MEDIA_TYPE: &str = "application/json";

/// A file attached to a multipart upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name.
    pub field: String,
    pub file_name: Option<String>,
    /// Media type, e.g. `image/png`.
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl FilePart {
    pub fn new(field: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            field: field.into(),
            file_name: None,
            mime: None,
            bytes: bytes.into(),
        }
    }

    pub fn file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

/// Payload of a call.
///
/// Multipart payloads are kept as plain data so they can be rebuilt for
/// every attempt.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Multipart {
        fields: Vec<(String, String)>,
        files: Vec<FilePart>,
    },
}

impl RequestBody {
    pub fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart { .. })
    }
}

/// Per-call description of what to send and what to expect back.
#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub method: Method,
    pub path: String,
    /// Query parameters in insertion order; `None` values are not sent.
    pub query: Vec<(String, Option<String>)>,
    pub body: RequestBody,
    /// Expected response shape; `None` skips validation for this call.
    pub shape: Option<Shape>,
}

impl Call {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            shape: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Sets a query parameter. A repeated key replaces the earlier value
    /// but keeps its position.
    pub fn query(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_opt(key, Some(value.into()))
    }

    /// Sets a query parameter that is omitted from the URL when `None`.
    pub fn query_opt(mut self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        let key = key.into();
        let value = value.map(Into::into);
        match self.query.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => self.query.push((key, value)),
        }
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn multipart(mut self, fields: Vec<(String, String)>, files: Vec<FilePart>) -> Self {
        self.body = RequestBody::Multipart { fields, files };
        self
    }

    pub fn expect(mut self, shape: Shape) -> Self {
        self.shape = Some(shape);
        self
    }
}

/// A fully-assembled request, as handed to the request hook.
#[derive(Clone, Debug)]
pub struct AssembledRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl AssembledRequest {
    pub(crate) fn into_request(self, http: &reqwest::Client) -> reqwest::Result<reqwest::Request> {
        let mut headers = self.headers;
        let builder = http.request(self.method, self.url);
        let builder = match self.body {
            RequestBody::Empty => builder.headers(headers),
            RequestBody::Json(value) => builder.headers(headers).json(&value),
            RequestBody::Multipart { fields, files } => {
                // reqwest sets the boundary-carrying content type itself.
                headers.remove(header::CONTENT_TYPE);
                let mut form = multipart::Form::new();
                for (name, value) in fields {
                    form = form.text(name, value);
                }
                for file in files {
                    let mut part = multipart::Part::bytes(file.bytes);
                    if let Some(file_name) = file.file_name {
                        part = part.file_name(file_name);
                    }
                    if let Some(mime) = file.mime {
                        part = part.mime_str(&mime)?;
                    }
                    form = form.part(file.field, part);
                }
                builder.headers(headers).multipart(form)
            }
        };
        builder.build()
    }
}

/// Joins `base` and `path` and appends the present query parameters.
///
/// `base` must not carry a query or fragment.
pub fn build_url(
    base: &Url,
    path: &str,
    query: &[(String, Option<String>)],
) -> Result<Url, String> {
    if base.query().is_some() || base.fragment().is_some() {
        return Err(format!("base url '{base}' must not have a query or fragment"));
    }
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    let mut url = Url::parse(&joined).map_err(|err| format!("invalid url '{joined}': {err}"))?;

    let mut present = query
        .iter()
        .filter_map(|(key, value)| value.as_deref().map(|value| (key, value)))
        .peekable();
    if present.peek().is_some() {
        url.query_pairs_mut().extend_pairs(present);
    }
    Ok(url)
}

/// Produces the header set for one attempt.
///
/// Order of precedence, lowest first: JSON defaults, credential, static
/// headers. Header names compare case-insensitively.
pub fn build_headers(
    static_headers: &HeaderMap,
    credential: Option<&HeaderValue>,
    body: &RequestBody,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static(JSON_MEDIA_TYPE));
    if !body.is_multipart() {
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_MEDIA_TYPE));
    }
    if let Some(credential) = credential {
        headers.insert(header::AUTHORIZATION, credential.clone());
    }
    for (name, value) in static_headers {
        headers.insert(name.clone(), value.clone());
    }
    headers
}

pub(crate) fn assemble(
    base: &Url,
    call: &Call,
    static_headers: &HeaderMap,
    credential: Option<&HeaderValue>,
) -> Result<AssembledRequest, String> {
    Ok(AssembledRequest {
        method: call.method.clone(),
        url: build_url(base, &call.path, &call.query)?,
        headers: build_headers(static_headers, credential, &call.body),
        body: call.body.clone(),
    })
}

pub(crate) fn parse_base_address(address: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(address.trim()).map_err(|err| ConfigError::BaseAddress {
        address: address.to_owned(),
        reason: err.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::BaseAddress {
            address: address.to_owned(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(ConfigError::BaseAddress {
            address: address.to_owned(),
            reason: "query and fragment are not allowed".to_owned(),
        });
    }
    Ok(url)
}

/// Parses static headers; a later duplicate replaces an earlier one.
pub(crate) fn parse_static_headers(pairs: &[(String, String)]) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let header_name =
            HeaderName::from_bytes(name.trim().as_bytes()).map_err(|err| ConfigError::Header {
                name: name.clone(),
                reason: err.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|err| ConfigError::Header {
            name: name.clone(),
            reason: err.to_string(),
        })?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

pub(crate) fn credential_header(token: &str) -> Result<HeaderValue, ConfigError> {
    let mut value = HeaderValue::from_str(&normalize_bearer_authorization(token)).map_err(|err| {
        ConfigError::Header {
            name: header::AUTHORIZATION.to_string(),
            reason: err.to_string(),
        }
    })?;
    value.set_sensitive(true);
    Ok(value)
}

fn normalize_bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}
