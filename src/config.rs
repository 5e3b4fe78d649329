//! Client configuration
//!
//! All environment access happens here, once, when the config is built. The
//! resulting struct is passed explicitly to every component constructor; there
//! is no process-global client.

use serde::{Deserialize, Serialize};

/// Default namespace for all Agri-Link flows.
pub const DEFAULT_NAMESPACE: &str = "agrilink";

/// Flow identifiers on the Kestra side.
pub const FLOW_MAIN_SALE: &str = "main-sale-workflow";
pub const FLOW_NEGOTIATION: &str = "negotiation-swarm";
pub const FLOW_CRISIS_SHIELD: &str = "crisis-shield";
pub const FLOW_MARKET_MONITOR: &str = "market-monitor";

const DEFAULT_HOST: &str = "http://localhost:8080";
const DEFAULT_TENANT: &str = "default";
const DEFAULT_USERNAME: &str = "admin@kestra.io";
const DEFAULT_PASSWORD: &str = "admin";

/// Authentication for the Kestra API, selected by whichever credential is
/// present. API tokens win over basic auth.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Auth {
    Bearer { token: String },
    Basic { username: String, password: String },
    None,
}

impl Auth {
    /// Selection rule: prefer an API token, otherwise basic auth, filling
    /// missing halves with the standard Kestra defaults.
    pub fn select(
        api_token: Option<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Self {
        if let Some(token) = api_token {
            return Auth::Bearer { token };
        }
        Auth::Basic {
            username: username.unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            password: password.unwrap_or_else(|| DEFAULT_PASSWORD.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KestraConfig {
    /// Base URL of the Kestra server, e.g. `http://localhost:8080`.
    pub host: String,
    /// Tenant path segment for every API request.
    pub tenant: String,
    /// Namespace under which executions are triggered.
    pub namespace: String,
    pub auth: Auth,
}

impl Default for KestraConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            tenant: DEFAULT_TENANT.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            auth: Auth::select(None, None, None),
        }
    }
}

impl KestraConfig {
    /// Build a config from `KESTRA_HOST`, `KESTRA_TENANT`, `KESTRA_NAMESPACE`,
    /// `KESTRA_API_TOKEN`, `KESTRA_USERNAME` and `KESTRA_PASSWORD`.
    pub fn from_env() -> Self {
        let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            host: env("KESTRA_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            tenant: env("KESTRA_TENANT").unwrap_or_else(|| DEFAULT_TENANT.to_string()),
            namespace: env("KESTRA_NAMESPACE").unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            auth: Auth::select(
                env("KESTRA_API_TOKEN"),
                env("KESTRA_USERNAME"),
                env("KESTRA_PASSWORD"),
            ),
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }
}
