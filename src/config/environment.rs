use serde::Serialize;
use std::env;
use utoipa::ToSchema;

pub const ENV_HEADLESS_DISABLED: &str = "HEADLESS_DISABLED";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    Vercel,
    Netlify,
    Serverless,
    Local,
}

/// Where the process runs and what that allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeEnvironment {
    pub kind: RuntimeKind,
    pub headless_disabled: bool,
}

impl RuntimeEnvironment {
    pub fn detect() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let set = |key: &str| lookup(key).is_some_and(|v| !v.trim().is_empty());
        let is = |key: &str, expected: &str| lookup(key).is_some_and(|v| v.trim() == expected);

        let kind = if is("VERCEL", "1") || set("VERCEL_ENV") {
            RuntimeKind::Vercel
        } else if is("NETLIFY", "true") || is("NETLIFY_DEV", "true") {
            RuntimeKind::Netlify
        } else if set("AWS_LAMBDA_FUNCTION_NAME") || set("FUNCTIONS_RUNTIME") {
            RuntimeKind::Serverless
        } else {
            RuntimeKind::Local
        };

        Self {
            kind,
            headless_disabled: is(ENV_HEADLESS_DISABLED, "1") || is(ENV_HEADLESS_DISABLED, "true"),
        }
    }

    pub fn is_serverless(&self) -> bool {
        self.kind != RuntimeKind::Local
    }

    /// Serverless hosts cannot launch a browser, and builds without the
    /// `headless` feature have no driver.
    pub fn headless_browser_available(&self) -> bool {
        cfg!(feature = "headless") && !self.is_serverless() && !self.headless_disabled
    }
}
