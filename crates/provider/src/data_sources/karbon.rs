//! `nutanix_karbon_cluster_kubeconfig` and `nutanix_karbon_cluster_ssh`

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use super::{lookup_by, DataSource, Lookup};
use crate::client::Clients;
use crate::schema::{id_attribute, AttrType, Attribute, Block, Schema};
use crate::state::{make_state, opt_string, string_value, DynamicValue};

pub struct KubeconfigDataSource;

pub struct SshDataSource;

/// `(uuid, name)` of the Karbon cluster the configuration points at.
async fn resolve_cluster(clients: &Clients, config: &DynamicValue) -> Result<(String, String)> {
    let lookup = lookup_by(config, "karbon_cluster_id", "karbon_cluster_name")?;
    let karbon = clients.karbon()?;
    let cluster = match &lookup {
        Lookup::Name(name) => karbon
            .get_cluster(name)
            .await
            .with_context(|| format!("error reading karbon cluster {}", name))?,
        Lookup::Id(uuid) => karbon
            .list_clusters()
            .await
            .context("error listing karbon clusters")?
            .into_iter()
            .find(|c| c.uuid.as_deref() == Some(uuid.as_str()))
            .with_context(|| format!("karbon cluster with uuid {} not found", uuid))?,
    };
    let name = cluster.name.context("karbon cluster has no name")?;
    let uuid = cluster.uuid.context("karbon cluster has no uuid")?;
    debug!(cluster = %name, uuid = %uuid, "resolved karbon cluster");
    Ok((uuid, name))
}

fn lookup_attributes() -> Vec<Attribute> {
    vec![
        id_attribute(),
        Attribute::optional("karbon_cluster_id", AttrType::String),
        Attribute::optional("karbon_cluster_name", AttrType::String),
    ]
}

#[derive(Debug, Default, Deserialize)]
struct Kubeconfig {
    #[serde(default)]
    clusters: Vec<NamedCluster>,
    #[serde(default)]
    users: Vec<NamedUser>,
}

#[derive(Debug, Default, Deserialize)]
struct NamedCluster {
    #[serde(default)]
    name: String,
    cluster: ClusterEntry,
}

#[derive(Debug, Default, Deserialize)]
struct ClusterEntry {
    #[serde(default)]
    server: Option<String>,
    #[serde(rename = "certificate-authority-data", default)]
    certificate_authority_data: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NamedUser {
    user: UserEntry,
}

#[derive(Debug, Default, Deserialize)]
struct UserEntry {
    #[serde(default)]
    token: Option<String>,
}

#[async_trait::async_trait]
impl DataSource for KubeconfigDataSource {
    fn type_name(&self) -> &'static str {
        "nutanix_karbon_cluster_kubeconfig"
    }

    fn schema(&self) -> Schema {
        let mut attrs = lookup_attributes();
        attrs.extend([
            Attribute::computed("name", AttrType::String),
            Attribute::computed("kube_config", AttrType::String).sensitive(),
            Attribute::computed("cluster_url", AttrType::String),
            Attribute::computed("cluster_ca_certificate", AttrType::String),
            Attribute::computed("access_token", AttrType::String).sensitive(),
        ]);
        Schema::new(Block::new(attrs))
    }

    async fn read(&self, clients: &Clients, config: &DynamicValue) -> Result<DynamicValue> {
        let (uuid, name) = resolve_cluster(clients, config).await?;
        let raw = clients
            .karbon()?
            .get_kubeconfig(&name)
            .await
            .with_context(|| format!("error reading kubeconfig of {}", name))?
            .kube_config;
        let parsed: Kubeconfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("error parsing kubeconfig of {}", name))?;

        let cluster = parsed.clusters.first();
        Ok(make_state(vec![
            ("id", string_value(uuid.as_str())),
            ("karbon_cluster_id", string_value(uuid.as_str())),
            ("karbon_cluster_name", string_value(name.as_str())),
            ("name", opt_string(cluster.map(|c| c.name.as_str()))),
            ("cluster_url", opt_string(cluster.and_then(|c| c.cluster.server.as_deref()))),
            (
                "cluster_ca_certificate",
                opt_string(cluster.and_then(|c| c.cluster.certificate_authority_data.as_deref())),
            ),
            (
                "access_token",
                opt_string(parsed.users.first().and_then(|u| u.user.token.as_deref())),
            ),
            ("kube_config", string_value(raw)),
        ]))
    }
}

#[async_trait::async_trait]
impl DataSource for SshDataSource {
    fn type_name(&self) -> &'static str {
        "nutanix_karbon_cluster_ssh"
    }

    fn schema(&self) -> Schema {
        let mut attrs = lookup_attributes();
        attrs.extend([
            Attribute::computed("certificate", AttrType::String),
            Attribute::computed("expiry_time", AttrType::String),
            Attribute::computed("private_key", AttrType::String).sensitive(),
            Attribute::computed("username", AttrType::String),
        ]);
        Schema::new(Block::new(attrs))
    }

    async fn read(&self, clients: &Clients, config: &DynamicValue) -> Result<DynamicValue> {
        let (uuid, name) = resolve_cluster(clients, config).await?;
        let ssh = clients
            .karbon()?
            .get_ssh_config(&name)
            .await
            .with_context(|| format!("error reading ssh config of {}", name))?;

        Ok(make_state(vec![
            ("id", string_value(uuid.as_str())),
            ("karbon_cluster_id", string_value(uuid)),
            ("karbon_cluster_name", string_value(name)),
            ("certificate", string_value(ssh.certificate)),
            ("expiry_time", string_value(ssh.expiry_time)),
            ("private_key", string_value(ssh.private_key)),
            ("username", string_value(ssh.username)),
        ]))
    }
}
