//! User-Agent string shared by the page renderer and the document fetcher.

/// Project URL carried in the User-Agent.
const PROJECT_UA_URL: &str = "https://github.com/fierce/doc-bundler";

/// Default User-Agent for page and document requests (identifies the tool).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("doc-bundler/{version} (offline-docs-tool; +{PROJECT_UA_URL})")
}
