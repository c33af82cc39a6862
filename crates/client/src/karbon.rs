//! Karbon (Nutanix Kubernetes Engine) client.
//!
//! Karbon mutations return a v3 task UUID which is awaited through
//! [`crate::v3::V3Client::wait_for_task`].

use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::http::{Credentials, HttpClient};

pub const ABSOLUTE_PATH: &str = "karbon";
pub const USER_AGENT: &str = "nutanix/karbon";
pub const METADATA_API_VERSION: &str = "2.0.0";

/// Cluster as reported by `GET /v1/k8s/clusters/{name}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KarbonCluster {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub kubeapi_server_ipv4_address: Option<String>,
    #[serde(default)]
    pub etcd_config: NodePoolNames,
    #[serde(default)]
    pub master_config: MasterNodePoolNames,
    #[serde(default)]
    pub worker_config: NodePoolNames,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodePoolNames {
    #[serde(default)]
    pub node_pools: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MasterNodePoolNames {
    #[serde(default)]
    pub deployment_type: String,
    #[serde(default)]
    pub node_pools: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AhvConfig {
    pub cpu: i64,
    pub disk_mib: i64,
    pub memory_mib: i64,
    pub network_uuid: String,
    pub prism_element_cluster_uuid: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Node {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub ipv4_address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodePool {
    #[serde(default)]
    pub ahv_config: Option<AhvConfig>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub node_os_version: Option<String>,
    #[serde(default)]
    pub num_instances: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<Node>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodePoolsConfig {
    pub node_pools: Vec<NodePool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SingleMasterConfig {}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ActivePassiveConfig {
    pub external_ipv4_address: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MasterNodeConfig {
    pub ipv4_address: String,
    pub node_pool_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExternalLbConfig {
    pub external_ipv4_address: String,
    pub master_nodes_config: Vec<MasterNodeConfig>,
}

/// Exactly one of the three master layouts is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MastersConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub single_master_config: Option<SingleMasterConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_passive_config: Option<ActivePassiveConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_lb_config: Option<ExternalLbConfig>,
    pub node_pools: Vec<NodePool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FlannelConfig {}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IpPoolConfig {
    pub cidr: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CalicoConfig {
    pub ip_pool_configs: Vec<IpPoolConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CniConfig {
    pub node_cidr_mask_size: i64,
    pub pod_ipv4_cidr: String,
    pub service_ipv4_cidr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flannel_config: Option<FlannelConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calico_config: Option<CalicoConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VolumesConfig {
    pub file_system: String,
    pub flash_mode: bool,
    pub password: String,
    pub prism_element_cluster_uuid: String,
    pub storage_container: String,
    pub username: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StorageClassConfig {
    pub default_storage_class: bool,
    pub name: String,
    pub reclaim_policy: String,
    pub volumes_config: VolumesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterMetadata {
    pub api_version: String,
}

impl Default for ClusterMetadata {
    fn default() -> Self {
        Self {
            api_version: METADATA_API_VERSION.to_string(),
        }
    }
}

/// Body of `POST /v1/k8s/clusters`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreateClusterRequest {
    pub name: String,
    pub version: String,
    pub cni_config: CniConfig,
    pub etcd_config: NodePoolsConfig,
    pub masters_config: MastersConfig,
    pub metadata: ClusterMetadata,
    pub storage_class_config: StorageClassConfig,
    pub workers_config: NodePoolsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterActionResponse {
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default)]
    pub cluster_uuid: String,
    #[serde(default)]
    pub task_uuid: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KubeconfigResponse {
    #[serde(default)]
    pub kube_config: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SshConfig {
    #[serde(default)]
    pub certificate: String,
    #[serde(default)]
    pub expiry_time: String,
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PrivateRegistryRequest {
    pub registry_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PrivateRegistry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PrivateRegistryOperationResponse {
    #[serde(default)]
    pub registry_name: Option<String>,
}

pub struct KarbonClient {
    http: HttpClient,
}

impl KarbonClient {
    pub fn new(credentials: &Credentials) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(credentials, ABSOLUTE_PATH, USER_AGENT)?,
        })
    }

    pub async fn list_clusters(&self) -> Result<Vec<KarbonCluster>> {
        self.http.get("/v1-beta.1/k8s/clusters").await
    }

    pub async fn create_cluster(
        &self,
        request: &CreateClusterRequest,
    ) -> Result<ClusterActionResponse> {
        self.http
            .request(Method::POST, "/v1/k8s/clusters", Some(request))
            .await
    }

    pub async fn get_cluster(&self, name: &str) -> Result<KarbonCluster> {
        self.http.get(&format!("/v1/k8s/clusters/{}", name)).await
    }

    pub async fn get_node_pool(&self, name: &str, pool: &str) -> Result<NodePool> {
        self.http
            .get(&format!("/v1-beta.1/k8s/clusters/{}/node-pools/{}", name, pool))
            .await
    }

    pub async fn delete_cluster(&self, name: &str) -> Result<ClusterActionResponse> {
        self.http
            .request::<(), _>(Method::DELETE, &format!("/v1/k8s/clusters/{}", name), None)
            .await
    }

    pub async fn get_kubeconfig(&self, name: &str) -> Result<KubeconfigResponse> {
        self.http
            .get(&format!("/v1/k8s/clusters/{}/kubeconfig", name))
            .await
    }

    pub async fn get_ssh_config(&self, name: &str) -> Result<SshConfig> {
        self.http.get(&format!("/v1/k8s/clusters/{}/ssh", name)).await
    }

    pub async fn list_private_registries(&self, name: &str) -> Result<Vec<PrivateRegistry>> {
        let registries: Option<Vec<PrivateRegistry>> = self
            .http
            .get(&format!("/v1-alpha.1/k8s/clusters/{}/registries", name))
            .await?;
        Ok(registries.unwrap_or_default())
    }

    pub async fn add_private_registry(
        &self,
        name: &str,
        registry: &str,
    ) -> Result<PrivateRegistry> {
        let body = PrivateRegistryRequest {
            registry_name: registry.to_string(),
        };
        self.http
            .request(
                Method::POST,
                &format!("/v1-alpha.1/k8s/clusters/{}/registries", name),
                Some(&body),
            )
            .await
    }

    pub async fn delete_private_registry(
        &self,
        name: &str,
        registry: &str,
    ) -> Result<PrivateRegistryOperationResponse> {
        let response: Option<PrivateRegistryOperationResponse> = self
            .http
            .request::<(), _>(
                Method::DELETE,
                &format!("/v1-alpha.1/k8s/clusters/{}/registries/{}", name, registry),
                None,
            )
            .await?;
        Ok(response.unwrap_or_default())
    }
}
