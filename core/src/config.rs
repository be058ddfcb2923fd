use serde::{Deserialize, Serialize};

/// Base URL used when no override is configured.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com";

pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const WORKFLOW_ID_VAR: &str = "CHATKIT_WORKFLOW_ID";
pub const WORKFLOW_ID_FALLBACK_VAR: &str = "VITE_CHATKIT_WORKFLOW_ID";
pub const API_BASE_VAR: &str = "CHATKIT_API_BASE";
pub const API_BASE_FALLBACK_VAR: &str = "VITE_CHATKIT_API_BASE";
pub const ENVIRONMENT_VAR: &str = "ENVIRONMENT";
pub const ENVIRONMENT_FALLBACK_VAR: &str = "VERCEL_ENV";

/// Configuration for the ChatKit API client
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ChatKitConfig {
    /// API key for OpenAI authentication
    pub api_key: Option<String>,
    /// Workflow to start sessions against when the request names none
    pub workflow_id: Option<String>,
    /// Override for the ChatKit API base URL
    pub api_base: Option<String>,
    /// Deployment environment name, e.g. "production"
    pub environment: Option<String>,
}

impl ChatKitConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Each setting reads its primary name first, then its `VITE_`-prefixed
    /// fallback. Empty values count as unset so a blank export does not
    /// shadow a populated fallback.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| lookup(name).filter(|value| !value.is_empty()))
        };

        ChatKitConfig {
            api_key: get(&[OPENAI_API_KEY_VAR]),
            workflow_id: get(&[WORKFLOW_ID_VAR, WORKFLOW_ID_FALLBACK_VAR]),
            api_base: get(&[API_BASE_VAR, API_BASE_FALLBACK_VAR]),
            environment: get(&[ENVIRONMENT_VAR, ENVIRONMENT_FALLBACK_VAR]),
        }
    }

    /// Merge with another config, with the other taking precedence
    pub fn merge(self, other: ChatKitConfig) -> ChatKitConfig {
        ChatKitConfig {
            api_key: other.api_key.or(self.api_key),
            workflow_id: other.workflow_id.or(self.workflow_id),
            api_base: other.api_base.or(self.api_base),
            environment: other.environment.or(self.environment),
        }
    }

    /// The configured API base, or the public OpenAI endpoint.
    pub fn base_url(&self) -> &str {
        self.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
    }

    /// Whether the deployment environment calls for Secure cookies.
    pub fn is_production(&self) -> bool {
        self.environment
            .as_deref()
            .map(|environment| environment.eq_ignore_ascii_case("production"))
            .unwrap_or(false)
    }
}
