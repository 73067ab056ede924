//! Managed version tags
//!
//! Builds created by this tool carry a source-blob version of the form
//! `netbox-heroku@v<dotted-numeric>`. Decoding a tag is a classification: any
//! string that does not match means the app is not managed by us.

use std::sync::LazyLock;

use regex::Regex;

/// Product literal at the start of every managed tag
pub const PRODUCT_ID: &str = "netbox-heroku";

static MANAGED_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^{}@v([0-9.]+)$", regex::escape(PRODUCT_ID)))
        .expect("managed version pattern is valid")
});

/// Build the tag for a version. A leading `v` on the input is accepted.
pub fn encode_version(version: &str) -> String {
    let version = version.strip_prefix('v').unwrap_or(version);
    format!("{}@v{}", PRODUCT_ID, version)
}

/// Version carried by a managed tag, `None` when the tag is not ours
pub fn decode_version(tag: &str) -> Option<String> {
    MANAGED_VERSION
        .captures(tag)
        .and_then(|captures| captures.get(1))
        .map(|version| version.as_str().to_string())
}
