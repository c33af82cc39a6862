//! `nutanix_karbon_cluster`
//!
//! Kubernetes clusters managed through Karbon. The Karbon API addresses a
//! cluster by name while Terraform tracks its UUID; mutations return a v3
//! task that is awaited against Prism Central.
//!
//! Karbon never returns the CNI or storage class settings, so those keys
//! are left out of the flattened state and keep their configured values.

use std::collections::BTreeSet;

use anyhow::{bail, Context, Result};
use nutanix_client::karbon::{
    ActivePassiveConfig, AhvConfig, CalicoConfig, CniConfig, CreateClusterRequest, ExternalLbConfig,
    FlannelConfig, IpPoolConfig, KarbonCluster, MasterNodeConfig, MastersConfig, NodePool,
    NodePoolsConfig, PrivateRegistry, SingleMasterConfig, StorageClassConfig, VolumesConfig,
};
use serde::Deserialize;
use tracing::{debug, info};

use super::common::{await_delete_task, await_task};
use super::{found, resource_id, task_timeouts, Resource};
use crate::client::Clients;
use crate::schema::{id_attribute, AttrType, Attribute, Block, NestedBlock, Schema};
use crate::state::{
    int_value, list_value, make_state, opt_int, opt_string, string_value, DynamicValue,
};
use crate::timeouts::Timeouts;

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(60);

const DEFAULT_POD_CIDR: &str = "172.20.0.0/16";
const DEFAULT_SERVICE_CIDR: &str = "172.19.0.0/16";
const DEFAULT_NODE_CIDR_MASK_SIZE: i64 = 24;

pub struct KarbonClusterResource;

#[derive(Debug, Default, Deserialize)]
struct KarbonConfig {
    name: String,
    version: String,
    #[serde(default)]
    storage_class_config: Vec<StorageClassArgs>,
    #[serde(default)]
    cni_config: Vec<CniArgs>,
    #[serde(default)]
    etcd_node_pool: Vec<NodePoolArgs>,
    #[serde(default)]
    master_node_pool: Vec<NodePoolArgs>,
    #[serde(default)]
    worker_node_pool: Vec<NodePoolArgs>,
    #[serde(default)]
    active_passive_config: Vec<ActivePassiveArgs>,
    #[serde(default)]
    external_lb_config: Vec<ExternalLbArgs>,
    #[serde(default)]
    private_registry: Vec<RegistryArgs>,
}

#[derive(Debug, Default, Deserialize)]
struct StorageClassArgs {
    name: String,
    reclaim_policy: Option<String>,
    #[serde(default)]
    volumes_config: Vec<VolumesArgs>,
}

#[derive(Debug, Default, Deserialize)]
struct VolumesArgs {
    file_system: Option<String>,
    flash_mode: Option<bool>,
    password: String,
    prism_element_cluster_uuid: String,
    storage_container: String,
    username: String,
}

#[derive(Debug, Default, Deserialize)]
struct CniArgs {
    node_cidr_mask_size: Option<i64>,
    pod_ipv4_cidr: Option<String>,
    service_ipv4_cidr: Option<String>,
    #[serde(default)]
    flannel_config: Vec<serde_json::Value>,
    #[serde(default)]
    calico_config: Vec<CalicoArgs>,
}

#[derive(Debug, Default, Deserialize)]
struct CalicoArgs {
    #[serde(default)]
    ip_pool_config: Vec<IpPoolArgs>,
}

#[derive(Debug, Default, Deserialize)]
struct IpPoolArgs {
    cidr: String,
}

#[derive(Debug, Default, Deserialize)]
struct NodePoolArgs {
    name: Option<String>,
    node_os_version: String,
    num_instances: i64,
    #[serde(default)]
    ahv_config: Vec<AhvArgs>,
}

#[derive(Debug, Default, Deserialize)]
struct AhvArgs {
    cpu: Option<i64>,
    disk_mib: Option<i64>,
    memory_mib: Option<i64>,
    network_uuid: String,
    prism_element_cluster_uuid: String,
}

#[derive(Debug, Default, Deserialize)]
struct ActivePassiveArgs {
    external_ipv4_address: String,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalLbArgs {
    external_ipv4_address: String,
    #[serde(default)]
    master_nodes_config: Vec<MasterNodeArgs>,
}

#[derive(Debug, Default, Deserialize)]
struct MasterNodeArgs {
    ipv4_address: String,
    node_pool_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RegistryArgs {
    registry_name: String,
}

/// Pool roles in the order the cluster reports them.
#[derive(Debug, Clone, Copy)]
enum PoolRole {
    Etcd,
    Master,
    Worker,
}

impl PoolRole {
    fn attribute(self) -> &'static str {
        match self {
            PoolRole::Etcd => "etcd_node_pool",
            PoolRole::Master => "master_node_pool",
            PoolRole::Worker => "worker_node_pool",
        }
    }

    fn default_name(self) -> &'static str {
        match self {
            PoolRole::Etcd => "etcd-node-pool",
            PoolRole::Master => "master-node-pool",
            PoolRole::Worker => "worker-node-pool",
        }
    }

    /// `(cpu, memory_mib, disk_mib)`
    fn default_size(self) -> (i64, i64, i64) {
        match self {
            PoolRole::Etcd => (4, 8192, 40960),
            PoolRole::Master => (2, 4096, 122880),
            PoolRole::Worker => (8, 8192, 122880),
        }
    }
}

impl NodePoolArgs {
    fn expand(self, role: PoolRole) -> Result<NodePool> {
        let Some(ahv) = self.ahv_config.into_iter().next() else {
            bail!("{} requires an ahv_config block", role.attribute());
        };
        let (cpu, memory_mib, disk_mib) = role.default_size();
        Ok(NodePool {
            name: Some(self.name.unwrap_or_else(|| role.default_name().to_string())),
            node_os_version: Some(self.node_os_version),
            num_instances: Some(self.num_instances),
            ahv_config: Some(AhvConfig {
                cpu: ahv.cpu.unwrap_or(cpu),
                disk_mib: ahv.disk_mib.unwrap_or(disk_mib),
                memory_mib: ahv.memory_mib.unwrap_or(memory_mib),
                network_uuid: ahv.network_uuid,
                prism_element_cluster_uuid: ahv.prism_element_cluster_uuid,
            }),
            nodes: None,
        })
    }

    fn expand_pools(pools: Vec<NodePoolArgs>, role: PoolRole) -> Result<Vec<NodePool>> {
        if pools.is_empty() {
            bail!("{} is required", role.attribute());
        }
        pools.into_iter().map(|p| p.expand(role)).collect()
    }
}

impl CniArgs {
    fn expand(cni: Vec<CniArgs>) -> CniConfig {
        let cni = cni.into_iter().next().unwrap_or_default();
        let calico = cni.calico_config.into_iter().next().map(|c| CalicoConfig {
            ip_pool_configs: c
                .ip_pool_config
                .into_iter()
                .map(|p| IpPoolConfig { cidr: p.cidr })
                .collect(),
        });
        CniConfig {
            node_cidr_mask_size: cni.node_cidr_mask_size.unwrap_or(DEFAULT_NODE_CIDR_MASK_SIZE),
            pod_ipv4_cidr: cni.pod_ipv4_cidr.unwrap_or_else(|| DEFAULT_POD_CIDR.to_string()),
            service_ipv4_cidr: cni
                .service_ipv4_cidr
                .unwrap_or_else(|| DEFAULT_SERVICE_CIDR.to_string()),
            flannel_config: calico.is_none().then_some(FlannelConfig {}),
            calico_config: calico,
        }
    }
}

impl KarbonConfig {
    fn check_master_layout(&self) -> Result<()> {
        if !self.active_passive_config.is_empty() && !self.external_lb_config.is_empty() {
            bail!("cannot set both active_passive_config and external_lb_config");
        }
        Ok(())
    }

    fn registries(&self) -> BTreeSet<String> {
        self.private_registry.iter().map(|r| r.registry_name.clone()).collect()
    }

    fn expand(self) -> Result<CreateClusterRequest> {
        self.check_master_layout()?;

        let storage = self
            .storage_class_config
            .into_iter()
            .next()
            .context("storage_class_config is required")?;
        let volumes = storage
            .volumes_config
            .into_iter()
            .next()
            .context("storage_class_config requires a volumes_config block")?;
        let master_pools = NodePoolArgs::expand_pools(self.master_node_pool, PoolRole::Master)?;
        let default_master_pool = master_pools
            .first()
            .and_then(|p| p.name.clone())
            .unwrap_or_default();

        let mut masters = MastersConfig {
            node_pools: master_pools,
            ..Default::default()
        };
        if let Some(ap) = self.active_passive_config.into_iter().next() {
            masters.active_passive_config = Some(ActivePassiveConfig {
                external_ipv4_address: ap.external_ipv4_address,
            });
        } else if let Some(lb) = self.external_lb_config.into_iter().next() {
            masters.external_lb_config = Some(ExternalLbConfig {
                external_ipv4_address: lb.external_ipv4_address,
                master_nodes_config: lb
                    .master_nodes_config
                    .into_iter()
                    .map(|m| MasterNodeConfig {
                        ipv4_address: m.ipv4_address,
                        node_pool_name: m
                            .node_pool_name
                            .unwrap_or_else(|| default_master_pool.clone()),
                    })
                    .collect(),
            });
        } else {
            masters.single_master_config = Some(SingleMasterConfig {});
        }

        Ok(CreateClusterRequest {
            name: self.name,
            version: self.version,
            cni_config: CniArgs::expand(self.cni_config),
            etcd_config: NodePoolsConfig {
                node_pools: NodePoolArgs::expand_pools(self.etcd_node_pool, PoolRole::Etcd)?,
            },
            masters_config: masters,
            metadata: Default::default(),
            storage_class_config: StorageClassConfig {
                default_storage_class: true,
                name: storage.name,
                reclaim_policy: storage.reclaim_policy.unwrap_or_else(|| "Delete".to_string()),
                volumes_config: VolumesConfig {
                    file_system: volumes.file_system.unwrap_or_else(|| "ext4".to_string()),
                    flash_mode: volumes.flash_mode.unwrap_or(false),
                    password: volumes.password,
                    prism_element_cluster_uuid: volumes.prism_element_cluster_uuid,
                    storage_container: volumes.storage_container,
                    username: volumes.username,
                },
            },
            workers_config: NodePoolsConfig {
                node_pools: NodePoolArgs::expand_pools(self.worker_node_pool, PoolRole::Worker)?,
            },
        })
    }
}

fn flatten_node_pool(pool: &NodePool) -> DynamicValue {
    let ahv = pool
        .ahv_config
        .as_ref()
        .map(|a| {
            vec![make_state(vec![
                ("cpu", int_value(a.cpu)),
                ("disk_mib", int_value(a.disk_mib)),
                ("memory_mib", int_value(a.memory_mib)),
                ("network_uuid", string_value(&a.network_uuid)),
                ("prism_element_cluster_uuid", string_value(&a.prism_element_cluster_uuid)),
            ])]
        })
        .unwrap_or_default();
    let nodes = pool
        .nodes
        .iter()
        .flatten()
        .map(|n| {
            make_state(vec![
                ("hostname", opt_string(n.hostname.as_deref())),
                ("ipv4_address", opt_string(n.ipv4_address.as_deref())),
            ])
        })
        .collect();
    make_state(vec![
        ("name", opt_string(pool.name.as_deref())),
        ("node_os_version", opt_string(pool.node_os_version.as_deref())),
        ("num_instances", opt_int(pool.num_instances)),
        ("ahv_config", list_value(ahv)),
        ("nodes", list_value(nodes)),
    ])
}

struct ClusterView {
    cluster: KarbonCluster,
    etcd: Vec<NodePool>,
    masters: Vec<NodePool>,
    workers: Vec<NodePool>,
    registries: Vec<PrivateRegistry>,
}

fn flatten_cluster(view: &ClusterView) -> DynamicValue {
    let cluster = &view.cluster;
    let registries = view
        .registries
        .iter()
        .filter_map(|r| r.name.as_deref())
        .map(|name| make_state(vec![("registry_name", string_value(name))]))
        .collect();
    let pools = |pools: &[NodePool]| list_value(pools.iter().map(flatten_node_pool).collect());
    make_state(vec![
        ("id", opt_string(cluster.uuid.as_deref())),
        ("name", opt_string(cluster.name.as_deref())),
        ("version", opt_string(cluster.version.as_deref())),
        ("status", opt_string(cluster.status.as_deref())),
        ("kubeapi_server_ipv4_address", opt_string(cluster.kubeapi_server_ipv4_address.as_deref())),
        ("deployment_type", string_value(&cluster.master_config.deployment_type)),
        (PoolRole::Etcd.attribute(), pools(&view.etcd)),
        (PoolRole::Master.attribute(), pools(&view.masters)),
        (PoolRole::Worker.attribute(), pools(&view.workers)),
        ("private_registry", list_value(registries)),
    ])
}

fn node_pool_block() -> Block {
    Block::new(vec![
        Attribute::optional_computed("name", AttrType::String),
        Attribute::required("node_os_version", AttrType::String),
        Attribute::required("num_instances", AttrType::Number),
        Attribute::computed(
            "nodes",
            AttrType::object_list(vec![
                ("hostname", AttrType::String),
                ("ipv4_address", AttrType::String),
            ]),
        ),
    ])
    .with_blocks(vec![NestedBlock::list(
        "ahv_config",
        Block::new(vec![
            Attribute::optional_computed("cpu", AttrType::Number),
            Attribute::optional_computed("disk_mib", AttrType::Number),
            Attribute::optional_computed("memory_mib", AttrType::Number),
            Attribute::required("network_uuid", AttrType::String),
            Attribute::required("prism_element_cluster_uuid", AttrType::String),
        ]),
    )
    .min_items(1)
    .max_items(1)])
}

/// Resolves the Karbon cluster name. Imports only carry the UUID.
async fn cluster_name(clients: &Clients, state: &DynamicValue) -> Result<Option<String>> {
    if let Some(name) = state.get("name").and_then(DynamicValue::as_string) {
        return Ok(Some(name.to_string()));
    }
    let uuid = resource_id(state)?;
    let clusters = clients
        .karbon()?
        .list_clusters()
        .await
        .context("error listing karbon clusters")?;
    Ok(clusters
        .into_iter()
        .find(|c| c.uuid.as_deref() == Some(uuid.as_str()))
        .and_then(|c| c.name))
}

async fn read_pools(clients: &Clients, name: &str, pools: &[String]) -> Result<Vec<NodePool>> {
    let karbon = clients.karbon()?;
    let mut out = Vec::with_capacity(pools.len());
    for pool in pools {
        debug!(cluster = %name, pool = %pool, "reading node pool");
        out.push(
            karbon
                .get_node_pool(name, pool)
                .await
                .with_context(|| format!("error reading node pool {} of {}", pool, name))?,
        );
    }
    Ok(out)
}

async fn read_view(clients: &Clients, name: &str) -> Result<Option<ClusterView>> {
    let karbon = clients.karbon()?;
    let Some(cluster) = found(karbon.get_cluster(name).await)
        .with_context(|| format!("error reading karbon cluster {}", name))?
    else {
        return Ok(None);
    };

    let etcd = read_pools(clients, name, &cluster.etcd_config.node_pools).await?;
    let masters = read_pools(clients, name, &cluster.master_config.node_pools).await?;
    let workers = read_pools(clients, name, &cluster.worker_config.node_pools).await?;
    let registries = karbon
        .list_private_registries(name)
        .await
        .with_context(|| format!("error listing private registries of {}", name))?;

    Ok(Some(ClusterView {
        cluster,
        etcd,
        masters,
        workers,
        registries,
    }))
}

/// Reads the cluster back, keeping the configured `version` string.
async fn read_state(
    clients: &Clients,
    name: &str,
    configured: &DynamicValue,
) -> Result<Option<DynamicValue>> {
    let Some(view) = read_view(clients, name).await? else {
        return Ok(None);
    };
    let mut state = flatten_cluster(&view);
    if let Some(version) = configured.get("version").filter(|v| v.as_string().is_some()) {
        state.set("version", version.clone());
    }
    Ok(Some(state))
}

async fn add_registries(
    clients: &Clients,
    name: &str,
    registries: impl IntoIterator<Item = &String>,
) -> Result<()> {
    let karbon = clients.karbon()?;
    for registry in registries {
        info!(cluster = %name, registry = %registry, "adding private registry");
        karbon
            .add_private_registry(name, registry)
            .await
            .with_context(|| format!("error adding private registry {} to {}", registry, name))?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl Resource for KarbonClusterResource {
    fn type_name(&self) -> &'static str {
        "nutanix_karbon_cluster"
    }

    fn schema(&self) -> Schema {
        let storage_class = Block::new(vec![
            Attribute::required("name", AttrType::String),
            Attribute::optional_computed("reclaim_policy", AttrType::String)
                .one_of(&["Delete", "Retain"]),
        ])
        .with_blocks(vec![NestedBlock::list(
            "volumes_config",
            Block::new(vec![
                Attribute::optional_computed("file_system", AttrType::String)
                    .one_of(&["ext4", "xfs"]),
                Attribute::optional_computed("flash_mode", AttrType::Bool),
                Attribute::required("password", AttrType::String).sensitive(),
                Attribute::required("prism_element_cluster_uuid", AttrType::String),
                Attribute::required("storage_container", AttrType::String),
                Attribute::required("username", AttrType::String),
            ]),
        )
        .min_items(1)
        .max_items(1)]);

        let cni = Block::new(vec![
            Attribute::optional_computed("node_cidr_mask_size", AttrType::Number),
            Attribute::optional_computed("pod_ipv4_cidr", AttrType::String),
            Attribute::optional_computed("service_ipv4_cidr", AttrType::String),
        ])
        .with_blocks(vec![
            NestedBlock::list("flannel_config", Block::new(vec![])).max_items(1),
            NestedBlock::list(
                "calico_config",
                Block::new(vec![]).with_blocks(vec![NestedBlock::list(
                    "ip_pool_config",
                    Block::new(vec![Attribute::optional("cidr", AttrType::String)]),
                )]),
            )
            .max_items(1),
        ]);

        Schema::new(
            Block::new(vec![
                id_attribute(),
                Attribute::required("name", AttrType::String).force_new(),
                Attribute::required("version", AttrType::String).force_new(),
                Attribute::computed("status", AttrType::String),
                Attribute::computed("kubeapi_server_ipv4_address", AttrType::String),
                Attribute::computed("deployment_type", AttrType::String),
            ])
            .with_blocks(vec![
                NestedBlock::list("storage_class_config", storage_class)
                    .min_items(1)
                    .max_items(1)
                    .force_new(),
                NestedBlock::list("cni_config", cni).max_items(1).force_new(),
                NestedBlock::list(PoolRole::Etcd.attribute(), node_pool_block())
                    .min_items(1)
                    .max_items(1)
                    .force_new(),
                NestedBlock::list(PoolRole::Master.attribute(), node_pool_block())
                    .min_items(1)
                    .max_items(1)
                    .force_new(),
                NestedBlock::list(PoolRole::Worker.attribute(), node_pool_block())
                    .min_items(1)
                    .force_new(),
                NestedBlock::list(
                    "active_passive_config",
                    Block::new(vec![Attribute::required(
                        "external_ipv4_address",
                        AttrType::String,
                    )]),
                )
                .max_items(1)
                .force_new(),
                NestedBlock::list(
                    "external_lb_config",
                    Block::new(vec![Attribute::required(
                        "external_ipv4_address",
                        AttrType::String,
                    )])
                    .with_blocks(vec![NestedBlock::list(
                        "master_nodes_config",
                        Block::new(vec![
                            Attribute::required("ipv4_address", AttrType::String),
                            Attribute::optional_computed("node_pool_name", AttrType::String),
                        ]),
                    )
                    .min_items(1)]),
                )
                .max_items(1)
                .force_new(),
                NestedBlock::set(
                    "private_registry",
                    Block::new(vec![Attribute::required("registry_name", AttrType::String)]),
                ),
                Timeouts::block(),
            ])
            .describe("A Kubernetes cluster deployed by Karbon."),
        )
    }

    fn validate(&self, config: &DynamicValue) -> Result<()> {
        let present = |key: &str| {
            config
                .get(key)
                .and_then(DynamicValue::as_list)
                .is_some_and(|items| !items.is_empty())
        };
        if present("active_passive_config") && present("external_lb_config") {
            bail!("cannot set both active_passive_config and external_lb_config");
        }
        Ok(())
    }

    async fn create(&self, clients: &Clients, planned: &DynamicValue) -> Result<DynamicValue> {
        let timeouts = task_timeouts(clients, DEFAULT_TIMEOUTS, planned)?;
        let config: KarbonConfig = planned.to_typed()?;
        let registries = config.registries();
        let request = config.expand()?;
        let name = request.name.clone();

        let response = clients
            .karbon()?
            .create_cluster(&request)
            .await
            .with_context(|| format!("error creating karbon cluster {}", name))?;
        info!(id = %response.cluster_uuid, name = %name, "created nutanix_karbon_cluster");

        await_task(
            clients,
            Some(response.task_uuid).filter(|t| !t.is_empty()),
            timeouts.create,
            &format!("karbon cluster ({}) to create", name),
        )
        .await?;

        add_registries(clients, &name, &registries).await?;

        read_state(clients, &name, planned)
            .await?
            .with_context(|| format!("karbon cluster {} vanished after create", name))
    }

    async fn read(&self, clients: &Clients, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let Some(name) = cluster_name(clients, state).await? else {
            return Ok(None);
        };
        read_state(clients, &name, state).await
    }

    async fn update(
        &self,
        clients: &Clients,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue> {
        let prior_config: KarbonConfig = prior.to_typed()?;
        let config: KarbonConfig = planned.to_typed()?;
        let name = config.name.clone();

        let before = prior_config.registries();
        let after = config.registries();
        let karbon = clients.karbon()?;
        for registry in before.difference(&after) {
            info!(cluster = %name, registry = %registry, "removing private registry");
            found(karbon.delete_private_registry(&name, registry).await)
                .with_context(|| {
                    format!("error removing private registry {} from {}", registry, name)
                })?;
        }
        add_registries(clients, &name, after.difference(&before)).await?;

        read_state(clients, &name, planned)
            .await?
            .with_context(|| format!("karbon cluster {} vanished during update", name))
    }

    async fn delete(&self, clients: &Clients, state: &DynamicValue) -> Result<()> {
        let timeouts = task_timeouts(clients, DEFAULT_TIMEOUTS, state)?;
        let Some(name) = cluster_name(clients, state).await? else {
            return Ok(());
        };

        info!(name = %name, "deleting nutanix_karbon_cluster");
        let Some(response) = found(clients.karbon()?.delete_cluster(&name).await)
            .with_context(|| format!("error deleting karbon cluster {}", name))?
        else {
            return Ok(());
        };
        await_delete_task(
            clients,
            Some(response.task_uuid).filter(|t| !t.is_empty()),
            timeouts.delete,
            &format!("karbon cluster ({}) to delete", name),
        )
        .await
    }
}
