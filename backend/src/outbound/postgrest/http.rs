//! Reqwest transport for the PostgREST dialect.
//!
//! This layer knows about URLs, headers, status codes and JSON bodies. It
//! knows nothing about ports: callers map [`BackendError`] onto the error enum
//! of the port they implement.

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::dto::PostgrestErrorDto;

/// SQLSTATE for a unique-constraint violation.
const UNIQUE_VIOLATION: &str = "23505";
/// PostgREST code for "a single row was requested but none matched".
const NO_ROWS: &str = "PGRST116";

/// Connection settings for a PostgREST endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgrestSettings {
    /// Base URL of the REST endpoint, e.g. `https://db.example/rest/v1/`.
    pub base_url: Url,
    /// Key sent as both `apikey` and bearer token.
    pub api_key: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Failure talking to the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(super) enum BackendError {
    #[error("request failed: {message}")]
    Transport { message: String },
    #[error("status {status}: {message}")]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("invalid response payload: {message}")]
    Decode { message: String },
}

impl BackendError {
    /// The backend rejected a duplicate key.
    pub(super) fn is_unique_violation(&self) -> bool {
        match self {
            Self::Status {
                code: Some(code), ..
            } => code == UNIQUE_VIOLATION,
            Self::Status {
                status, code: None, ..
            } => *status == StatusCode::CONFLICT.as_u16(),
            _ => false,
        }
    }

    /// The addressed row does not exist.
    pub(super) fn is_not_found(&self) -> bool {
        match self {
            Self::Status { status, code, .. } => {
                code.as_deref() == Some(NO_ROWS) || *status == StatusCode::NOT_FOUND.as_u16()
            }
            _ => false,
        }
    }

    /// The backend could not be reached or is refusing work.
    pub(super) fn is_unavailable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => matches!(
                StatusCode::from_u16(*status),
                Ok(StatusCode::BAD_GATEWAY
                    | StatusCode::SERVICE_UNAVAILABLE
                    | StatusCode::GATEWAY_TIMEOUT)
            ),
            Self::Decode { .. } => false,
        }
    }
}

/// A `column=operator.value` query filter.
pub(super) type Filter = (&'static str, String);

/// `column = value`.
pub(super) fn eq(column: &'static str, value: impl std::fmt::Display) -> Filter {
    (column, format!("eq.{value}"))
}

/// `column IN (values)`.
pub(super) fn in_list(column: &'static str, values: impl IntoIterator<Item = i64>) -> Filter {
    let joined = values
        .into_iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(",");
    (column, format!("in.({joined})"))
}

/// Case-insensitive substring match.
///
/// The term is matched literally: LIKE wildcards (`%`, `_`) and the escape
/// character are backslash-escaped, and `*` is dropped because PostgREST
/// rewrites every `*` to `%`. PostgREST reserves `,`, `(` and `)` in filter
/// values, so the pattern is quoted when it contains any of them.
pub(super) fn ilike_contains(column: &'static str, term: &str) -> Filter {
    let mut literal = String::with_capacity(term.len());
    for ch in term.chars().filter(|ch| *ch != '*') {
        if matches!(ch, '%' | '_' | '\\') {
            literal.push('\\');
        }
        literal.push(ch);
    }
    let pattern = format!("*{literal}*");
    if pattern.contains([',', '(', ')', '"']) {
        let escaped = pattern.replace('\\', r"\\").replace('"', "\\\"");
        (column, format!("ilike.\"{escaped}\""))
    } else {
        (column, format!("ilike.{pattern}"))
    }
}

/// Thin PostgREST client: one method per HTTP verb, rows in and out.
pub(super) struct PostgrestHttp {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl PostgrestHttp {
    pub(super) fn new(settings: &PostgrestSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            base_url: with_trailing_slash(&settings.base_url),
            api_key: settings.api_key.clone(),
        })
    }

    fn table_url(&self, table: &str, filters: &[Filter]) -> Result<Url, BackendError> {
        let mut url = self.base_url.join(table).map_err(|error| BackendError::Transport {
            message: format!("invalid table url for {table}: {error}"),
        })?;
        if !filters.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (column, value) in filters {
                pairs.append_pair(column, value);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, url)
            .header(ACCEPT, "application/json")
            .header("apikey", self.api_key.as_str());
        if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            builder = builder.header(AUTHORIZATION, bearer);
        }
        builder
    }

    /// `GET table?filters`.
    pub(super) async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[Filter],
    ) -> Result<Vec<T>, BackendError> {
        let url = self.table_url(table, filters)?;
        self.send(self.request(Method::GET, url)).await
    }

    /// `POST table`, returning the inserted rows.
    pub(super) async fn insert<B, T>(&self, table: &str, body: &B) -> Result<Vec<T>, BackendError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.table_url(table, &[])?;
        let builder = self
            .request(Method::POST, url)
            .header("Prefer", "return=representation")
            .json(body);
        self.send(builder).await
    }

    /// `PATCH table?filters`, returning the updated rows.
    pub(super) async fn update<B, T>(
        &self,
        table: &str,
        filters: &[Filter],
        body: &B,
    ) -> Result<Vec<T>, BackendError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.table_url(table, filters)?;
        let builder = self
            .request(Method::PATCH, url)
            .header("Prefer", "return=representation")
            .json(body);
        self.send(builder).await
    }

    /// `DELETE table?filters`, returning the deleted rows.
    pub(super) async fn delete<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[Filter],
    ) -> Result<Vec<T>, BackendError> {
        let url = self.table_url(table, filters)?;
        let builder = self
            .request(Method::DELETE, url)
            .header("Prefer", "return=representation");
        self.send(builder).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<Vec<T>, BackendError> {
        let response = builder.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        parse_rows(body.as_ref())
    }
}

fn with_trailing_slash(url: &Url) -> Url {
    let mut normalised = url.clone();
    if !normalised.path().ends_with('/') {
        let path = format!("{}/", normalised.path());
        normalised.set_path(&path);
    }
    normalised
}

pub(super) fn parse_rows<T: DeserializeOwned>(body: &[u8]) -> Result<Vec<T>, BackendError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(body).map_err(|error| BackendError::Decode {
        message: format!("invalid PostgREST JSON payload: {error}"),
    })
}

fn map_transport_error(error: reqwest::Error) -> BackendError {
    let message = if error.is_timeout() {
        format!("timed out: {error}")
    } else {
        error.to_string()
    };
    BackendError::Transport { message }
}

pub(super) fn map_status_error(status: StatusCode, body: &[u8]) -> BackendError {
    let parsed: Option<PostgrestErrorDto> = serde_json::from_slice(body).ok();
    let (code, message) = parsed.map_or_else(
        || (None, body_preview(body)),
        |dto| (dto.code, dto.message.unwrap_or_else(|| body_preview(body))),
    );
    BackendError::Status {
        status: status.as_u16(),
        code,
        message,
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for non-network PostgREST helpers.

    use super::*;
    use rstest::rstest;

    fn settings(base: &str) -> PostgrestSettings {
        PostgrestSettings {
            base_url: Url::parse(base).expect("valid url"),
            api_key: "anon-key".to_owned(),
            timeout: Duration::from_secs(5),
        }
    }

    #[rstest]
    #[case::bare_host("https://db.example", "https://db.example/clients?id=eq.4")]
    #[case::nested_path(
        "https://db.example/rest/v1",
        "https://db.example/rest/v1/clients?id=eq.4"
    )]
    #[case::trailing_slash(
        "https://db.example/rest/v1/",
        "https://db.example/rest/v1/clients?id=eq.4"
    )]
    fn table_urls_keep_the_base_path(#[case] base: &str, #[case] expected: &str) {
        let http = PostgrestHttp::new(&settings(base)).expect("client builds");
        let url = http.table_url("clients", &[eq("id", 4)]).expect("url");
        assert_eq!(url.as_str(), expected);
    }

    #[rstest]
    #[case::plain("mar", "ilike.*mar*")]
    #[case::comma("a,b", "ilike.\"*a,b*\"")]
    #[case::star("ma*", "ilike.*ma*")]
    #[case::percent("5%", r"ilike.*5\%*")]
    #[case::underscore("a_b", r"ilike.*a\_b*")]
    #[case::escaped_and_quoted("a%,b", r#"ilike."*a\\%,b*""#)]
    fn ilike_filters_match_terms_literally(#[case] term: &str, #[case] expected: &str) {
        assert_eq!(ilike_contains("first_name", term).1, expected);
    }

    #[rstest]
    fn in_list_joins_ids() {
        assert_eq!(in_list("id", [101, 102]), ("id", "in.(101,102)".to_owned()));
    }

    #[rstest]
    #[case::unique_code(
        StatusCode::CONFLICT,
        r#"{"code":"23505","message":"duplicate key"}"#,
        true
    )]
    #[case::bare_conflict(StatusCode::CONFLICT, "", true)]
    #[case::foreign_key(
        StatusCode::CONFLICT,
        r#"{"code":"23503","message":"fk"}"#,
        false
    )]
    #[case::bad_request(StatusCode::BAD_REQUEST, r#"{"code":"22P02"}"#, false)]
    fn unique_violations_are_recognised(
        #[case] status: StatusCode,
        #[case] body: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(map_status_error(status, body.as_bytes()).is_unique_violation(), expected);
    }

    #[rstest]
    #[case::no_rows(
        StatusCode::NOT_ACCEPTABLE,
        r#"{"code":"PGRST116","message":"0 rows"}"#,
        true
    )]
    #[case::missing(StatusCode::NOT_FOUND, "", true)]
    #[case::server(StatusCode::INTERNAL_SERVER_ERROR, "boom", false)]
    fn missing_rows_are_recognised(
        #[case] status: StatusCode,
        #[case] body: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(map_status_error(status, body.as_bytes()).is_not_found(), expected);
    }

    #[rstest]
    #[case::gateway(StatusCode::BAD_GATEWAY, true)]
    #[case::unavailable(StatusCode::SERVICE_UNAVAILABLE, true)]
    #[case::server(StatusCode::INTERNAL_SERVER_ERROR, false)]
    fn gateway_statuses_count_as_unavailable(#[case] status: StatusCode, #[case] expected: bool) {
        assert_eq!(map_status_error(status, b"").is_unavailable(), expected);
    }

    #[rstest]
    fn status_message_prefers_backend_message() {
        let error = map_status_error(
            StatusCode::CONFLICT,
            br#"{"code":"23505","message":"duplicate key value violates unique constraint"}"#,
        );
        assert_eq!(
            error.to_string(),
            "status 409: duplicate key value violates unique constraint"
        );
    }

    #[rstest]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(400);
        let BackendError::Status { message, .. } =
            map_status_error(StatusCode::INTERNAL_SERVER_ERROR, body.as_bytes())
        else {
            panic!("expected status error");
        };
        assert_eq!(message.chars().count(), 163);
        assert!(message.ends_with("..."));
    }

    #[rstest]
    fn empty_body_parses_as_no_rows() {
        let rows: Vec<serde_json::Value> = parse_rows(b"  ").expect("empty body");
        assert!(rows.is_empty());
    }
}
