//! Environment variable handling.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::sync::Arc;

/// Get an environment variable, returning None if not set or empty.
pub fn get_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Load environment variables from a dotenv-style file, if it exists.
///
/// Variables already present in the process environment win.
pub fn load_dotenv_from(path: &std::path::Path) -> Result<(), std::io::Error> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        for (key, value) in parse_dotenv(&content) {
            if env::var(&key).is_err() {
                env::set_var(key, value);
            }
        }
    }
    Ok(())
}

/// Parse `KEY=value` lines, skipping comments and blank lines.
fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let value = value.trim();

            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);

            pairs.push((key.to_string(), value.to_string()));
        }
    }
    pairs
}

/// A source of environment variables.
///
/// Provider adapters read credentials and cloud settings through this type
/// rather than the process environment directly, so a composition root (or a
/// test) can hand them a fixed set of variables.
#[derive(Clone, Default)]
pub struct Environment {
    fixed: Option<Arc<HashMap<String, String>>>,
}

impl Environment {
    /// Read from the live process environment.
    pub fn process() -> Self {
        Self { fixed: None }
    }

    /// Read only from the given pairs; the process environment is ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            fixed: Some(Arc::new(map)),
        }
    }

    /// An environment with no variables at all.
    pub fn empty() -> Self {
        Self::from_pairs(std::iter::empty::<(String, String)>())
    }

    /// Look up a variable, returning None if unset or empty.
    pub fn get(&self, name: &str) -> Option<String> {
        match &self.fixed {
            Some(map) => map.get(name).filter(|v| !v.is_empty()).cloned(),
            None => get_var(name),
        }
    }

    /// Look up a variable with a default value.
    pub fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Values may hold credentials; only list the names.
        match &self.fixed {
            Some(map) => {
                let mut names: Vec<&String> = map.keys().collect();
                names.sort();
                f.debug_struct("Environment").field("fixed", &names).finish()
            }
            None => f.write_str("Environment(process)"),
        }
    }
}

/// Common environment variable names.
pub mod vars {
    /// API key for Anthropic.
    pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";

    /// API key for OpenAI.
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

    /// OpenAI organization sent with every request.
    pub const OPENAI_ORG_ID: &str = "OPENAI_ORG_ID";

    /// AWS region for Bedrock.
    pub const AWS_REGION: &str = "AWS_REGION";

    /// AWS access key id.
    pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";

    /// AWS secret access key.
    pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";

    /// AWS session token for temporary credentials.
    pub const AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";

    /// Named AWS shared-config profile.
    pub const AWS_PROFILE: &str = "AWS_PROFILE";

    /// AWS shared credentials file override.
    pub const AWS_SHARED_CREDENTIALS_FILE: &str = "AWS_SHARED_CREDENTIALS_FILE";

    /// AWS shared config file override.
    pub const AWS_CONFIG_FILE: &str = "AWS_CONFIG_FILE";

    /// Google Cloud project for Vertex AI.
    pub const GOOGLE_CLOUD_PROJECT: &str = "GOOGLE_CLOUD_PROJECT";

    /// Google Cloud location for Vertex AI.
    pub const GOOGLE_CLOUD_LOCATION: &str = "GOOGLE_CLOUD_LOCATION";

    /// Pre-minted OAuth access token for Google Cloud.
    pub const GOOGLE_OAUTH_ACCESS_TOKEN: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

    /// Path to a Google service-account or authorized-user JSON key.
    pub const GOOGLE_APPLICATION_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";

    /// gcloud configuration directory override.
    pub const CLOUDSDK_CONFIG: &str = "CLOUDSDK_CONFIG";

    /// User home directory.
    pub const HOME: &str = "HOME";

    /// Atelier home directory override.
    pub const ATELIER_HOME: &str = "ATELIER_HOME";

    /// Atelier config file override.
    pub const ATELIER_CONFIG: &str = "ATELIER_CONFIG";

    /// Atelier log filter.
    pub const ATELIER_LOG: &str = "ATELIER_LOG";
}
