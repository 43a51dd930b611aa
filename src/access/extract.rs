use axum::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::{HeaderName, HOST};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::guard::AccessContext;
use super::scope::ScopeSignals;
use crate::app::AppState;
use crate::errors::AppError;
use crate::jwt::AuthUser;

const FORWARDED_HOST: &str = "x-forwarded-host";

/// Names of the headers carrying explicit branch addressing.
#[derive(Debug, Clone)]
pub struct ScopeHeaders {
    pub branch_id: HeaderName,
    pub branch_code: HeaderName,
}

impl Default for ScopeHeaders {
    fn default() -> Self {
        Self {
            branch_id: HeaderName::from_static("x-branch-id"),
            branch_code: HeaderName::from_static("x-branch-code"),
        }
    }
}

impl ScopeHeaders {
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Self::default();
        Ok(Self {
            branch_id: header_from_env("BRANCH_ID_HEADER", defaults.branch_id)?,
            branch_code: header_from_env("BRANCH_CODE_HEADER", defaults.branch_code)?,
        })
    }
}

fn header_from_env(key: &str, default: HeaderName) -> Result<HeaderName, AppError> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => HeaderName::try_from(value.trim().to_ascii_lowercase())
            .map_err(|_| AppError::configuration(format!("{key} is not a valid header name"))),
        _ => Ok(default),
    }
}

fn header_str(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Every value of a header folded into one reading.
#[derive(Debug, PartialEq, Eq)]
enum HeaderReading {
    Absent,
    Single(String),
    /// Values that disagree, or a value that is not visible ASCII.
    Conflicting,
}

fn read_all(headers: &HeaderMap, name: &HeaderName) -> HeaderReading {
    let mut seen: Option<String> = None;
    for value in headers.get_all(name) {
        let Ok(text) = value.to_str() else {
            return HeaderReading::Conflicting;
        };
        let text = text.trim();
        match seen.as_deref() {
            None => seen = Some(text.to_string()),
            Some(previous) if previous == text => {}
            Some(_) => return HeaderReading::Conflicting,
        }
    }
    seen.map_or(HeaderReading::Absent, HeaderReading::Single)
}

/// Collect branch addressing signals; `x-forwarded-host` wins over `Host`.
pub fn scope_signals_from_headers(headers: &HeaderMap, names: &ScopeHeaders) -> ScopeSignals {
    let mut signals = ScopeSignals::new();

    match read_all(headers, &names.branch_id) {
        HeaderReading::Absent => {}
        HeaderReading::Single(value) => signals = signals.with_branch_id(value),
        HeaderReading::Conflicting => signals = signals.with_conflicting_branch_id(),
    }
    match read_all(headers, &names.branch_code) {
        HeaderReading::Absent => {}
        HeaderReading::Single(value) => signals = signals.with_branch_code(value),
        HeaderReading::Conflicting => signals = signals.with_conflicting_branch_code(),
    }

    let host = headers
        .get(FORWARDED_HOST)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(',').next().unwrap_or(value).to_string())
        .or_else(|| header_str(headers, &HOST));
    if let Some(host) = host {
        signals = signals.with_host(host);
    }

    signals
}

/// Route layer hiding a whole module while it is disabled.
///
/// Runs before any extractor, so a disabled module answers 404 whatever the
/// credentials or branch headers carried by the request.
pub async fn require_module(
    State((state, slug)): State<(AppState, &'static str)>,
    request: Request,
    next: Next,
) -> Response {
    match state.guard.module_gate().ensure_enabled(slug).await {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AccessContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        let signals = scope_signals_from_headers(&parts.headers, &state.scope_headers);
        state.guard.establish(auth.actor, &signals).await
    }
}
