//! Provider configuration
//!
//! Every provider attribute is optional in HCL and falls back to an
//! environment variable, then to a default. Each API surface is enabled
//! only when its group of required attributes is complete.

use std::fmt;
use std::time::Duration;

use anyhow::Result;
use nutanix_client::Credentials;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::schema::{AttrType, Attribute, Block, Schema};
use crate::state::DynamicValue;

pub const DEFAULT_PORT: &str = "9440";
pub const DEFAULT_FOUNDATION_PORT: &str = "8000";

/// API surfaces that can be enabled independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    PrismCentral,
    Karbon,
    Foundation,
    Ndb,
}

impl Service {
    pub const ALL: [Service; 4] = [
        Service::PrismCentral,
        Service::Karbon,
        Service::Foundation,
        Service::Ndb,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Service::PrismCentral => "prism_central",
            Service::Karbon => "karbon",
            Service::Foundation => "foundation",
            Service::Ndb => "ndb",
        }
    }

    /// Attributes that must be set for the service to be usable.
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            Service::PrismCentral | Service::Karbon => &["username", "password", "endpoint"],
            Service::Foundation => &["foundation_endpoint"],
            Service::Ndb => &["ndb_endpoint", "ndb_username", "ndb_password"],
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Provider block as written in HCL.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    username: Option<String>,
    password: Option<String>,
    endpoint: Option<String>,
    port: Option<String>,
    insecure: Option<bool>,
    session_auth: Option<bool>,
    wait_timeout: Option<i64>,
    proxy_url: Option<String>,
    foundation_endpoint: Option<String>,
    foundation_port: Option<String>,
    ndb_endpoint: Option<String>,
    ndb_username: Option<String>,
    ndb_password: Option<String>,
}

/// Resolved provider configuration.
#[derive(Debug)]
pub struct ProviderConfig {
    pub username: String,
    pub password: SecretString,
    pub endpoint: String,
    pub port: String,
    pub insecure: bool,
    pub session_auth: bool,
    /// Overrides the default wait of v3 and Karbon tasks.
    pub wait_timeout: Option<Duration>,
    pub proxy_url: Option<String>,
    pub foundation_endpoint: String,
    pub foundation_port: String,
    pub ndb_endpoint: String,
    pub ndb_username: String,
    pub ndb_password: SecretString,
}

impl ProviderConfig {
    /// Resolves configuration against the process environment.
    pub fn from_value(value: &DynamicValue) -> Result<Self> {
        Self::from_value_with_env(value, |key| std::env::var(key).ok())
    }

    /// Resolves configuration with an explicit environment lookup.
    pub fn from_value_with_env(
        value: &DynamicValue,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let raw: RawConfig = if value.is_null() {
            RawConfig::default()
        } else {
            value.to_typed()?
        };

        let string = |v: Option<String>, key: &str, default: &str| -> String {
            v.filter(|s| !s.is_empty())
                .or_else(|| env(key).filter(|s| !s.is_empty()))
                .unwrap_or_else(|| default.to_string())
        };
        let boolean = |v: Option<bool>, key: &str, default: bool| -> bool {
            v.or_else(|| env(key).and_then(|s| parse_bool(&s)))
                .unwrap_or(default)
        };

        let wait_timeout = raw
            .wait_timeout
            .or_else(|| env("NUTANIX_WAIT_TIMEOUT").and_then(|s| s.trim().parse().ok()))
            .filter(|m| *m > 0)
            .map(|m| Duration::from_secs(m as u64 * 60));

        let proxy_url = string(raw.proxy_url, "NUTANIX_PROXY_URL", "");

        Ok(Self {
            username: string(raw.username, "NUTANIX_USERNAME", ""),
            password: SecretString::from(string(raw.password, "NUTANIX_PASSWORD", "")),
            endpoint: string(raw.endpoint, "NUTANIX_ENDPOINT", ""),
            port: string(raw.port, "NUTANIX_PORT", DEFAULT_PORT),
            insecure: boolean(raw.insecure, "NUTANIX_INSECURE", false),
            session_auth: boolean(raw.session_auth, "NUTANIX_SESSION_AUTH", false),
            wait_timeout,
            proxy_url: Some(proxy_url).filter(|s| !s.is_empty()),
            foundation_endpoint: string(raw.foundation_endpoint, "FOUNDATION_ENDPOINT", ""),
            foundation_port: string(
                raw.foundation_port,
                "FOUNDATION_PORT",
                DEFAULT_FOUNDATION_PORT,
            ),
            ndb_endpoint: string(raw.ndb_endpoint, "NDB_ENDPOINT", ""),
            ndb_username: string(raw.ndb_username, "NDB_USERNAME", ""),
            ndb_password: SecretString::from(string(raw.ndb_password, "NDB_PASSWORD", "")),
        })
    }

    fn field_is_set(&self, field: &str) -> bool {
        match field {
            "username" => !self.username.is_empty(),
            "password" => !self.password.expose_secret().is_empty(),
            "endpoint" => !self.endpoint.is_empty(),
            "foundation_endpoint" => !self.foundation_endpoint.is_empty(),
            "ndb_endpoint" => !self.ndb_endpoint.is_empty(),
            "ndb_username" => !self.ndb_username.is_empty(),
            "ndb_password" => !self.ndb_password.expose_secret().is_empty(),
            _ => true,
        }
    }

    /// Required attributes of `service` that are not set, in declaration order.
    pub fn missing_fields(&self, service: Service) -> Vec<&'static str> {
        service
            .required_fields()
            .iter()
            .copied()
            .filter(|f| !self.field_is_set(f))
            .collect()
    }

    /// Services whose required attributes are incomplete.
    pub fn disabled_services(&self) -> Vec<Service> {
        Service::ALL
            .into_iter()
            .filter(|s| !self.missing_fields(*s).is_empty())
            .collect()
    }

    /// Credentials for Prism Central and the APIs proxied through it.
    pub fn prism_credentials(&self) -> Credentials {
        Credentials::new(
            self.endpoint.clone(),
            self.port.clone(),
            self.username.clone(),
            self.password.expose_secret().to_string(),
        )
        .insecure(self.insecure)
        .session_auth(self.session_auth)
        .proxy_url(self.proxy_url.clone())
    }

    /// NDB is reached directly on its own endpoint, without a port.
    pub fn ndb_credentials(&self) -> Credentials {
        Credentials::new(
            self.ndb_endpoint.clone(),
            "",
            self.ndb_username.clone(),
            self.ndb_password.expose_secret().to_string(),
        )
        .insecure(self.insecure)
        .proxy_url(self.proxy_url.clone())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" => Some(true),
        "0" | "false" | "f" | "no" => Some(false),
        _ => None,
    }
}

/// `missing required fields are [a b] for <service>`
pub fn missing_fields_message(fields: &[&str], target: &str) -> String {
    format!("missing required fields are [{}] for {}", fields.join(" "), target)
}

/// Schema of the `provider "nutanix"` block.
pub fn provider_schema() -> Schema {
    Schema::new(
        Block::new(vec![
            Attribute::optional("username", AttrType::String).describe(concat!(
                "User name for Nutanix Prism. ",
                "Could be local cluster auth (e.g. 'admin') or directory auth."
            )),
            Attribute::optional("password", AttrType::String)
                .sensitive()
                .describe("Password for provided user name."),
            Attribute::optional("endpoint", AttrType::String)
                .describe(concat!(
                    "URL for Nutanix Prism ",
                    "(e.g IP or FQDN for cluster VIP note, or Prism Central)"
                )),
            Attribute::optional("port", AttrType::String)
                .describe("Port for Nutanix Prism. Defaults to 9440."),
            Attribute::optional("insecure", AttrType::Bool)
                .describe(concat!(
                    "Explicitly allow the provider to perform \"insecure\" SSL requests. ",
                    "If omitted, default value is `false`"
                )),
            Attribute::optional("session_auth", AttrType::Bool)
                .describe("Use session authentification instead of basic auth for each request"),
            Attribute::optional("wait_timeout", AttrType::Number)
                .describe(concat!(
                    "Set if you know that the creation o update of a resource ",
                    "may take long time (minutes)"
                )),
            Attribute::optional("proxy_url", AttrType::String)
                .describe("Proxy URL used for all API requests"),
            Attribute::optional("foundation_endpoint", AttrType::String)
                .describe("endpoint for foundation VM (eg. Foundation VM IP)"),
            Attribute::optional("foundation_port", AttrType::String)
                .describe("Port for foundation VM. Defaults to 8000."),
            Attribute::optional("ndb_endpoint", AttrType::String)
                .describe("endpoint for Era VM (era ip)"),
            Attribute::optional("ndb_username", AttrType::String)
                .describe("User name for Era VM"),
            Attribute::optional("ndb_password", AttrType::String)
                .sensitive()
                .describe("Password for Era user"),
        ])
        .describe("Nutanix Prism Central, Karbon, Volumes and NDB"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{int_value, make_state, null_value, string_value};
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_config() {
        let config = ProviderConfig::from_value_with_env(&null_value(), env(&[])).unwrap();

        assert_eq!(config.port, "9440");
        assert_eq!(config.foundation_port, "8000");
        assert!(!config.insecure);
        assert!(!config.session_auth);
        assert!(config.wait_timeout.is_none());
        assert!(config.proxy_url.is_none());
    }

    #[test]
    fn hcl_wins_over_environment() {
        let value = make_state(vec![
            ("username", string_value("hcl-user")),
            ("endpoint", null_value()),
            ("wait_timeout", int_value(5)),
        ]);
        let vars = env(&[
            ("NUTANIX_USERNAME", "env-user"),
            ("NUTANIX_ENDPOINT", "10.0.0.1"),
            ("NUTANIX_INSECURE", "true"),
        ]);

        let config = ProviderConfig::from_value_with_env(&value, vars).unwrap();

        assert_eq!(config.username, "hcl-user");
        assert_eq!(config.endpoint, "10.0.0.1");
        assert!(config.insecure);
        assert_eq!(config.wait_timeout, Some(Duration::from_secs(300)));
    }

    #[test]
    fn session_auth_reaches_prism_credentials_only() {
        let vars = env(&[("NUTANIX_SESSION_AUTH", "true")]);

        let config = ProviderConfig::from_value_with_env(&null_value(), vars).unwrap();

        assert!(config.prism_credentials().session_auth);
        assert!(!config.ndb_credentials().session_auth);
    }

    #[test]
    fn missing_fields_follow_declaration_order() {
        let value = make_state(vec![("username", string_value("admin"))]);
        let config = ProviderConfig::from_value_with_env(&value, env(&[])).unwrap();

        assert_eq!(config.missing_fields(Service::PrismCentral), vec!["password", "endpoint"]);
        assert_eq!(
            missing_fields_message(&config.missing_fields(Service::Ndb), Service::Ndb.name()),
            "missing required fields are [ndb_endpoint ndb_username ndb_password] for ndb"
        );
    }

    #[test]
    fn complete_group_enables_service() {
        let vars = env(&[
            ("NUTANIX_USERNAME", "admin"),
            ("NUTANIX_PASSWORD", "secret"),
            ("NUTANIX_ENDPOINT", "pc.local"),
        ]);
        let config = ProviderConfig::from_value_with_env(&null_value(), vars).unwrap();

        assert_eq!(config.disabled_services(), vec![Service::Foundation, Service::Ndb]);
        assert_eq!(
            config.prism_credentials().base_url().unwrap().as_str(),
            "https://pc.local:9440/"
        );
    }

    #[test]
    fn password_is_not_printed() {
        let vars = env(&[("NUTANIX_PASSWORD", "hunter2")]);
        let config = ProviderConfig::from_value_with_env(&null_value(), vars).unwrap();

        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
