//! Wire types of the v3 intent API.
//!
//! Requests carry `api_version`/`metadata`/`spec`; responses add `status`.
//! Every optional field is skipped when unset so request bodies only carry
//! what the caller filled in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::MessageResource;

pub const API_VERSION: &str = "3.1";

/// `{kind, name, uuid}` pointer to another entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Reference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

impl Reference {
    pub fn new(kind: &str, uuid: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.to_string()),
            name: None,
            uuid: Some(uuid.into()),
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec_version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_force_translate: Option<bool>,
}

impl Metadata {
    pub fn kind(kind: &str) -> Self {
        Self {
            kind: Some(kind.to_string()),
            ..Default::default()
        }
    }
}

/// Body of every `/list` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DsMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ListMetadataOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_matches: Option<i64>,
}

/// Carries the UUID of the task created by a mutating call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExecutionContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_uuid: Option<Value>,
}

impl ExecutionContext {
    /// The API returns either a string or a list of strings here.
    pub fn task_uuid(&self) -> Option<String> {
        match self.task_uuid.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Array(items) => items.first().and_then(Value::as_str).map(str::to_string),
            _ => None,
        }
    }
}

/// `spec` shared by every intent entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EntitySpec<R> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zone_reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<R>,
}

/// `status` shared by every intent entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DefStatus<R> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zone_reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_list: Option<Vec<MessageResource>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<R>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_context: Option<ExecutionContext>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IntentInput<S> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<S>,
}

impl<S> IntentInput<S> {
    pub fn new(metadata: Metadata, spec: S) -> Self {
        Self {
            api_version: Some(API_VERSION.to_string()),
            metadata: Some(metadata),
            spec: Some(spec),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IntentResponse<S, St> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<S>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<St>,
}

impl<S, R> IntentResponse<S, DefStatus<R>> {
    pub fn uuid(&self) -> Option<&str> {
        self.metadata.as_ref()?.uuid.as_deref()
    }

    pub fn task_uuid(&self) -> Option<String> {
        self.status.as_ref()?.execution_context.as_ref()?.task_uuid()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(bound(deserialize = "E: serde::de::DeserializeOwned"))]
pub struct ListResponse<E> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default)]
    pub entities: Vec<E>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ListMetadataOutput>,
}

// Virtual machines

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DiskAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapter_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_index: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VmDiskDeviceProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_address: Option<DiskAddress>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VmDisk {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source_reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_properties: Option<VmDiskDeviceProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_size_bytes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_size_mib: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_group_reference: Option<Reference>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IpAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ip_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VmNic {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_endpoint_list: Option<Vec<IpAddress>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_connected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_function_nic_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nic_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_queues: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VmBootDevice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_address: Option<DiskAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VmBootConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_device: Option<VmBootDevice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_device_order_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GuestCustomizationCloudInit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_key_values: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GuestCustomizationSysprep {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unattend_xml: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GuestCustomization {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_init: Option<GuestCustomizationCloudInit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_overridable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sysprep: Option<GuestCustomizationSysprep>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VmResources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_config: Option<VmBootConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_list: Option<Vec<VmDisk>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_customization: Option<GuestCustomization>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_os_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware_clock_timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hypervisor_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_size_mib: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nic_list: Option<Vec<VmNic>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_sockets: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_vcpus_per_socket: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vga_console_enabled: Option<bool>,
}

pub type Vm = EntitySpec<VmResources>;
pub type VmDefStatus = DefStatus<VmResources>;
pub type VmIntentInput = IntentInput<Vm>;
pub type VmIntentResponse = IntentResponse<Vm, VmDefStatus>;
pub type VmListIntentResponse = ListResponse<VmIntentResponse>;

// Subnets

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IpPool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DhcpOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_name_server_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_search_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tftp_server_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IpConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_gateway_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp_options: Option<DhcpOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp_server_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_list: Option<Vec<IpPool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix_length: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_ip: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubnetResources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_config: Option<IpConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_function_chain_reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vswitch_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_external: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_nat: Option<bool>,
}

pub type Subnet = EntitySpec<SubnetResources>;
pub type SubnetDefStatus = DefStatus<SubnetResources>;
pub type SubnetIntentInput = IntentInput<Subnet>;
pub type SubnetIntentResponse = IntentResponse<Subnet, SubnetDefStatus>;
pub type SubnetListIntentResponse = ListResponse<SubnetIntentResponse>;

// Images

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Checksum {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum_algorithm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum_value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImageVersionResources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImageResources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<Checksum>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source_reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval_uri_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<ImageVersionResources>,
}

pub type Image = EntitySpec<ImageResources>;
pub type ImageDefStatus = DefStatus<ImageResources>;
pub type ImageIntentInput = IntentInput<Image>;
pub type ImageIntentResponse = IntentResponse<Image, ImageDefStatus>;
pub type ImageListIntentResponse = ListResponse<ImageIntentResponse>;

// Clusters

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BuildInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterNetwork {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_data_services_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_server_ip_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ntp_server_ip_list: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HypervisorServer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub hypervisor_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterNodes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hypervisor_server_list: Option<Vec<HypervisorServer>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterResources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<ClusterConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<ClusterNetwork>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<ClusterNodes>,
}

pub type Cluster = EntitySpec<ClusterResources>;
pub type ClusterDefStatus = DefStatus<ClusterResources>;
pub type ClusterIntentResponse = IntentResponse<Cluster, ClusterDefStatus>;
pub type ClusterListIntentResponse = ListResponse<ClusterIntentResponse>;

// Categories

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CategoryKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CategoryKeyStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_defined: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CategoryValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CategoryValueStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_defined: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

pub type CategoryKeyListResponse = ListResponse<CategoryKeyStatus>;
pub type CategoryValueListResponse = ListResponse<CategoryValueStatus>;

// Projects

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResourceDomainResource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResourceDomain {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<ResourceDomainResource>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExternalNetwork {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectResources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_reference_list: Option<Vec<Reference>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_reference_list: Option<Vec<Reference>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_environment_reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_subnet_reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_reference_list: Option<Vec<Reference>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_network_list: Option<Vec<ExternalNetwork>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_user_group_reference_list: Option<Vec<Reference>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_domain: Option<ResourceDomain>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_reference_list: Option<Vec<Reference>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_reference_list: Option<Vec<Reference>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_reference_list: Option<Vec<Reference>>,
}

pub type Project = EntitySpec<ProjectResources>;
pub type ProjectDefStatus = DefStatus<ProjectResources>;
pub type ProjectIntentInput = IntentInput<Project>;
pub type ProjectIntentResponse = IntentResponse<Project, ProjectDefStatus>;
pub type ProjectListIntentResponse = ListResponse<ProjectIntentResponse>;

// Roles

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoleResources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_reference_list: Option<Vec<Reference>>,
}

pub type Role = EntitySpec<RoleResources>;
pub type RoleDefStatus = DefStatus<RoleResources>;
pub type RoleIntentInput = IntentInput<Role>;
pub type RoleIntentResponse = IntentResponse<Role, RoleDefStatus>;
pub type RoleListIntentResponse = ListResponse<RoleIntentResponse>;

// Access control policies

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AccessControlPolicyResources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_list: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_group_reference_list: Option<Vec<Reference>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_reference_list: Option<Vec<Reference>>,
}

pub type AccessControlPolicy = EntitySpec<AccessControlPolicyResources>;
pub type AccessControlPolicyDefStatus = DefStatus<AccessControlPolicyResources>;
pub type AccessControlPolicyIntentInput = IntentInput<AccessControlPolicy>;
pub type AccessControlPolicyIntentResponse =
    IntentResponse<AccessControlPolicy, AccessControlPolicyDefStatus>;
pub type AccessControlPolicyListIntentResponse = ListResponse<AccessControlPolicyIntentResponse>;

// Tasks

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TasksResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_reference_list: Option<Vec<Reference>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_task_reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage_complete: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtask_reference_list: Option<Vec<Reference>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeleteStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_context: Option<ExecutionContext>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeleteResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DeleteStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl DeleteResponse {
    pub fn task_uuid(&self) -> Option<String> {
        self.status.as_ref()?.execution_context.as_ref()?.task_uuid()
    }
}
