//! API clients handed to resource handlers
//!
//! Built once by `ConfigureProvider`. Clients for API surfaces whose
//! required attributes were not configured are absent; asking for one
//! yields an error naming the missing attributes.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use nutanix_client::era::EraClient;
use nutanix_client::karbon::KarbonClient;
use nutanix_client::prism::PrismClient;
use nutanix_client::v3::V3Client;
use nutanix_client::StateChangeConf;
use nutanix_client::volumes::VolumesClient;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{missing_fields_message, ProviderConfig, Service};
use crate::timeouts::Timeouts;

/// A client or the reason it could not be built.
enum Slot<T> {
    Ready(T),
    Missing(String),
}

impl<T> Slot<T> {
    fn build(
        config: &ProviderConfig,
        service: Service,
        make: impl FnOnce() -> nutanix_client::Result<T>,
    ) -> Result<Self> {
        let missing = config.missing_fields(service);
        if !missing.is_empty() {
            return Ok(Slot::Missing(missing_fields_message(&missing, service.name())));
        }
        let client = make().with_context(|| format!("failed to create {} client", service))?;
        Ok(Slot::Ready(client))
    }

    fn get(&self) -> Result<&T> {
        match self {
            Slot::Ready(client) => Ok(client),
            Slot::Missing(reason) => Err(anyhow!("{}", reason)),
        }
    }
}

/// Everything a resource handler needs to talk to Nutanix.
pub struct Clients {
    v3: Slot<V3Client>,
    karbon: Slot<KarbonClient>,
    volumes: Slot<VolumesClient>,
    prism: Slot<PrismClient>,
    era: Slot<EraClient>,
    /// Provider-level `wait_timeout`.
    pub wait_timeout: Option<Duration>,
    /// Cancelled by `StopProvider`.
    pub cancel: CancellationToken,
    /// Replaces the delay and poll interval of every wait when set.
    poll_interval: Option<Duration>,
}

impl Clients {
    pub fn new(config: &ProviderConfig, cancel: CancellationToken) -> Result<Self> {
        let prism = config.prism_credentials();
        let ndb = config.ndb_credentials();

        let clients = Self {
            v3: Slot::build(config, Service::PrismCentral, || V3Client::new(&prism))?,
            karbon: Slot::build(config, Service::Karbon, || KarbonClient::new(&prism))?,
            volumes: Slot::build(config, Service::PrismCentral, || VolumesClient::new(&prism))?,
            prism: Slot::build(config, Service::PrismCentral, || PrismClient::new(&prism))?,
            era: Slot::build(config, Service::Ndb, || EraClient::new(&ndb))?,
            wait_timeout: config.wait_timeout,
            cancel,
            poll_interval: None,
        };

        info!(
            prism_central = matches!(clients.v3, Slot::Ready(_)),
            karbon = matches!(clients.karbon, Slot::Ready(_)),
            ndb = matches!(clients.era, Slot::Ready(_)),
            "API clients configured"
        );
        Ok(clients)
    }

    pub fn v3(&self) -> Result<&V3Client> {
        self.v3.get()
    }

    pub fn karbon(&self) -> Result<&KarbonClient> {
        self.karbon.get()
    }

    pub fn volumes(&self) -> Result<&VolumesClient> {
        self.volumes.get()
    }

    pub fn prism(&self) -> Result<&PrismClient> {
        self.prism.get()
    }

    pub fn era(&self) -> Result<&EraClient> {
        self.era.get()
    }

    /// `wait_timeout` for every operation when configured, otherwise the
    /// resource's own budgets.
    pub fn wait_timeouts(&self, defaults: Timeouts) -> Timeouts {
        self.wait_timeout.map(Timeouts::uniform).unwrap_or(defaults)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Applies the poll interval override to a wait description.
    pub fn poll(&self, conf: StateChangeConf) -> StateChangeConf {
        match self.poll_interval {
            Some(interval) => conf.with_delay(interval).with_min_timeout(interval),
            None => conf,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{make_state, string_value};

    fn configure(pairs: Vec<(&str, &str)>) -> Clients {
        let value = make_state(pairs.into_iter().map(|(k, v)| (k, string_value(v))).collect());
        let config = ProviderConfig::from_value_with_env(&value, |_| None).unwrap();
        Clients::new(&config, CancellationToken::new()).unwrap()
    }

    #[test]
    fn missing_service_explains_itself() {
        let clients = configure(vec![("username", "admin"), ("endpoint", "pc.local")]);

        let err = clients.v3().err().unwrap();

        assert_eq!(
            err.to_string(),
            "missing required fields are [password] for prism_central"
        );
        assert!(clients.era().is_err());
    }

    #[test]
    fn complete_prism_group_builds_prism_clients_only() {
        let clients = configure(vec![
            ("username", "admin"),
            ("password", "secret"),
            ("endpoint", "pc.local"),
        ]);

        assert!(clients.v3().is_ok());
        assert!(clients.karbon().is_ok());
        assert!(clients.volumes().is_ok());
        assert!(clients.prism().is_ok());
        assert!(clients
            .era()
            .err()
            .unwrap()
            .to_string()
            .ends_with("for ndb"));
    }

    #[test]
    fn poll_interval_shortens_waits() {
        let clients = configure(vec![]).with_poll_interval(Duration::from_millis(5));

        let conf = clients.poll(StateChangeConf::v3(Duration::from_secs(60)));

        assert_eq!(conf.delay, Duration::from_millis(5));
        assert_eq!(conf.min_timeout, Duration::from_millis(5));
        assert_eq!(conf.timeout, Duration::from_secs(60));
    }

    #[test]
    fn wait_timeout_overrides_default() {
        let mut clients = configure(vec![]);
        assert_eq!(clients.wait_timeouts(Timeouts::minutes(10)), Timeouts::minutes(10));

        clients.wait_timeout = Some(Duration::from_secs(300));

        assert_eq!(clients.wait_timeouts(Timeouts::minutes(10)), Timeouts::minutes(5));
    }
}
