use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// DNS, TLS or connection refused.
    #[error("host unreachable: {0}")]
    Unreachable(String),

    #[error("timed out {}", timeout_phase(.connecting))]
    Timeout { connecting: bool },

    #[error("too many redirects")]
    TooManyRedirects,

    /// A redirect pointed somewhere the URL gate refuses.
    #[error("redirect to {0} blocked")]
    RedirectBlocked(String),

    #[error("origin answered {0}")]
    Status(StatusCode),

    /// Redirects ended on a sign-in page instead of the content.
    #[error("redirected to login page {0}")]
    LoginRedirect(Url),

    #[error("body too large ({0} bytes)")]
    BodyTooLarge(u64),

    #[error("not an html page: {0}")]
    NotHtml(String),

    #[error("client setup failed: {0}")]
    Client(String),

    #[error("reading body failed: {0}")]
    Body(String),

    #[error("{0}")]
    Other(String),
}

fn timeout_phase(connecting: &bool) -> &'static str {
    if *connecting { "connecting" } else { "waiting for the page" }
}

impl FetchError {
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Status(status) => {
                status.is_server_error()
                    || *status == StatusCode::TOO_MANY_REQUESTS
                    || *status == StatusCode::REQUEST_TIMEOUT
            }
            Self::Unreachable(_) | Self::Timeout { .. } | Self::Body(_) | Self::Other(_) => true,
            Self::InvalidUrl(_)
            | Self::TooManyRedirects
            | Self::RedirectBlocked(_)
            | Self::LoginRedirect(_)
            | Self::BodyTooLarge(_)
            | Self::NotHtml(_)
            | Self::Client(_) => false,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status(status) => Some(*status),
            _ => None,
        }
    }

    /// The origin refused us until we sign in.
    pub fn is_auth_wall(&self) -> bool {
        match self {
            Self::LoginRedirect(_) => true,
            Self::Status(status) => {
                *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
            }
            _ => false,
        }
    }

    /// The page is gone; no other loader will find it either.
    pub fn is_gone(&self) -> bool {
        matches!(
            self.status(),
            Some(StatusCode::NOT_FOUND) | Some(StatusCode::GONE)
        )
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                connecting: err.is_connect(),
            }
        } else if err.is_redirect() {
            match blocked_target(&err) {
                Some(target) => Self::RedirectBlocked(target),
                None => Self::TooManyRedirects,
            }
        } else if let Some(status) = err.status() {
            Self::Status(status)
        } else if err.is_connect() || err.is_request() {
            Self::Unreachable(err.to_string())
        } else if err.is_body() || err.is_decode() {
            Self::Body(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }
}

/// Raised from the redirect policy when the gate refuses a hop.
#[derive(Error, Debug)]
#[error("redirect to {0} blocked")]
pub struct BlockedRedirect(pub String);

fn blocked_target(err: &reqwest::Error) -> Option<String> {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(blocked) = cause.downcast_ref::<BlockedRedirect>() {
            return Some(blocked.0.clone());
        }
        source = cause.source();
    }
    None
}

/// Whether `landed` is a sign-in page the request for `requested` was bounced to.
pub fn is_login_bounce(requested: &Url, landed: &Url) -> bool {
    let on_login = |url: &Url| {
        let path = url.path().to_ascii_lowercase();
        path.contains("/login") || path.contains("/signin") || path.contains("/passport")
    };
    on_login(landed) && !on_login(requested)
}
