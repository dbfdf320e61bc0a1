//! Content signature matching for fetched script bodies.

use crate::types::{FireprobeError, Result};
use regex::{Regex, RegexBuilder};

/// Default platform-name token.
pub const DEFAULT_PLATFORM_TOKEN: &str = "firebase";
/// Default configuration-key token.
pub const DEFAULT_CONFIG_KEY_TOKEN: &str = "databaseURL";

/// Decides whether a script body carries the target integration signature.
///
/// A body matches when it contains both the platform token and the
/// configuration-key token, compared case-insensitively. Either token alone
/// is not a match.
#[derive(Debug, Clone)]
pub struct SignatureInspector {
    platform: Regex,
    config_key: Regex,
}

impl SignatureInspector {
    /// Create an inspector for the given token pair.
    pub fn new(platform_token: &str, config_key_token: &str) -> Result<Self> {
        Ok(Self {
            platform: token_pattern(platform_token)?,
            config_key: token_pattern(config_key_token)?,
        })
    }

    /// Check a resource body for the signature.
    pub fn matches(&self, body: &str) -> bool {
        self.platform.is_match(body) && self.config_key.is_match(body)
    }

    /// Inspector for the Firebase Realtime Database config signature.
    pub fn firebase() -> Result<Self> {
        Self::new(DEFAULT_PLATFORM_TOKEN, DEFAULT_CONFIG_KEY_TOKEN)
    }
}

fn token_pattern(token: &str) -> Result<Regex> {
    let token = token.trim();
    if token.is_empty() {
        return Err(FireprobeError::ConfigError(
            "Signature tokens must not be empty".to_string(),
        ));
    }

    RegexBuilder::new(&regex::escape(token))
        .case_insensitive(true)
        .build()
        .map_err(|e| FireprobeError::ConfigError(format!("Invalid signature token: {}", e)))
}
