//! `nutanix_subnet`

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use nutanix_client::v3::structs::{
    Address, DhcpOptions, IpConfig, IpPool, Metadata, Reference, Subnet, SubnetIntentInput,
    SubnetIntentResponse, SubnetResources,
};
use serde::Deserialize;
use tracing::info;

use super::common::{
    await_delete_task, await_task, created_uuid, expand_reference, flatten_metadata_fields,
    flatten_reference, metadata_attributes, reference_attribute, MetadataArgs, ReferenceMap,
};
use super::{found, resource_id, task_timeouts, Resource};
use crate::client::Clients;
use crate::schema::{id_attribute, AttrType, Attribute, Block, Schema};
use crate::state::{
    make_state, opt_bool, opt_int, opt_string, opt_string_list, string_map, DynamicValue,
};
use crate::timeouts::Timeouts;

const KIND: &str = "subnet";
const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(10);

pub struct SubnetResource;

#[derive(Debug, Default, Deserialize)]
struct SubnetConfig {
    name: String,
    description: Option<String>,
    cluster_uuid: Option<String>,
    availability_zone_reference: Option<ReferenceMap>,
    #[serde(flatten)]
    meta: MetadataArgs,
    subnet_type: String,
    vlan_id: Option<i64>,
    vswitch_name: Option<String>,
    default_gateway_ip: Option<String>,
    prefix_length: Option<i64>,
    subnet_ip: Option<String>,
    dhcp_server_address: Option<BTreeMap<String, String>>,
    dhcp_server_address_port: Option<i64>,
    ip_config_pool_list_ranges: Option<Vec<String>>,
    dhcp_options: Option<BTreeMap<String, String>>,
    dhcp_domain_name_server_list: Option<Vec<String>>,
    dhcp_domain_search_list: Option<Vec<String>>,
    network_function_chain_reference: Option<ReferenceMap>,
    vpc_reference_uuid: Option<String>,
    is_external: Option<bool>,
    enable_nat: Option<bool>,
}

impl SubnetConfig {
    fn expand(self, mut base: Subnet) -> (MetadataArgs, Subnet) {
        let mut resources = base.resources.take().unwrap_or_default();
        resources.subnet_type = Some(self.subnet_type);
        resources.vlan_id = self.vlan_id.or(resources.vlan_id);
        resources.vswitch_name = self.vswitch_name.or(resources.vswitch_name);
        resources.is_external = self.is_external.or(resources.is_external);
        resources.enable_nat = self.enable_nat.or(resources.enable_nat);
        if let Some(uuid) = self.vpc_reference_uuid {
            resources.vpc_reference = Some(Reference::new("vpc", uuid));
        }
        if let Some(r) = self.network_function_chain_reference.as_ref().and_then(expand_reference) {
            resources.network_function_chain_reference = Some(r);
        }

        let mut ip = resources.ip_config.take().unwrap_or_default();
        ip.default_gateway_ip = self.default_gateway_ip.or(ip.default_gateway_ip);
        ip.prefix_length = self.prefix_length.or(ip.prefix_length);
        ip.subnet_ip = self.subnet_ip.or(ip.subnet_ip);
        if let Some(ranges) = self.ip_config_pool_list_ranges {
            ip.pool_list =
                Some(ranges.into_iter().map(|range| IpPool { range: Some(range) }).collect());
        }
        if let Some(server) = self.dhcp_server_address.filter(|m| !m.is_empty()) {
            ip.dhcp_server_address = Some(Address {
                ip: server.get("ip").cloned(),
                fqdn: server.get("fqdn").cloned(),
                ipv6: server.get("ipv6").cloned(),
                port: self.dhcp_server_address_port,
            });
        }
        let mut dhcp = ip.dhcp_options.take().unwrap_or_default();
        if let Some(options) = self.dhcp_options {
            dhcp.boot_file_name = options.get("boot_file_name").cloned().or(dhcp.boot_file_name);
            dhcp.domain_name = options.get("domain_name").cloned().or(dhcp.domain_name);
            dhcp.tftp_server_name =
                options.get("tftp_server_name").cloned().or(dhcp.tftp_server_name);
        }
        dhcp.domain_name_server_list =
            self.dhcp_domain_name_server_list.or(dhcp.domain_name_server_list);
        dhcp.domain_search_list = self.dhcp_domain_search_list.or(dhcp.domain_search_list);
        if dhcp != DhcpOptions::default() {
            ip.dhcp_options = Some(dhcp);
        }
        if ip != IpConfig::default() {
            resources.ip_config = Some(ip);
        }

        base.name = Some(self.name);
        base.description = self.description.or(base.description);
        if let Some(uuid) = self.cluster_uuid {
            base.cluster_reference = Some(Reference::new("cluster", uuid));
        }
        if let Some(r) = self.availability_zone_reference.as_ref().and_then(expand_reference) {
            base.availability_zone_reference = Some(r);
        }
        base.resources = Some(resources);
        (self.meta, base)
    }
}

pub(crate) fn flatten_subnet(subnet: &SubnetIntentResponse) -> DynamicValue {
    let metadata = subnet.metadata.clone().unwrap_or_default();
    let status = subnet.status.as_ref();
    let spec = subnet.spec.as_ref();
    let default = SubnetResources::default();
    let res = status
        .and_then(|s| s.resources.as_ref())
        .or_else(|| spec.and_then(|s| s.resources.as_ref()))
        .unwrap_or(&default);
    let ip = res.ip_config.clone().unwrap_or_default();
    let dhcp = ip.dhcp_options.clone().unwrap_or_default();
    let cluster = status
        .and_then(|s| s.cluster_reference.as_ref())
        .or_else(|| spec.and_then(|s| s.cluster_reference.as_ref()));

    let mut server = BTreeMap::new();
    if let Some(address) = &ip.dhcp_server_address {
        for (key, value) in
            [("ip", &address.ip), ("fqdn", &address.fqdn), ("ipv6", &address.ipv6)]
        {
            if let Some(v) = value {
                server.insert(key.to_string(), v.clone());
            }
        }
    }
    let mut options = BTreeMap::new();
    for (key, value) in [
        ("boot_file_name", &dhcp.boot_file_name),
        ("domain_name", &dhcp.domain_name),
        ("tftp_server_name", &dhcp.tftp_server_name),
    ] {
        if let Some(v) = value {
            options.insert(key.to_string(), v.clone());
        }
    }
    let ranges: Option<Vec<String>> = ip
        .pool_list
        .as_ref()
        .map(|pools| pools.iter().filter_map(|p| p.range.clone()).collect());

    let mut attrs = vec![
        ("id", opt_string(metadata.uuid.as_deref())),
        ("api_version", opt_string(subnet.api_version.as_deref())),
        (
            "name",
            opt_string(
                status
                    .and_then(|s| s.name.as_deref())
                    .or(spec.and_then(|s| s.name.as_deref())),
            ),
        ),
        ("description", opt_string(spec.and_then(|s| s.description.as_deref()))),
        ("state", opt_string(status.and_then(|s| s.state.as_deref()))),
        ("cluster_uuid", opt_string(cluster.and_then(|c| c.uuid.as_deref()))),
        ("cluster_name", opt_string(cluster.and_then(|c| c.name.as_deref()))),
        (
            "availability_zone_reference",
            flatten_reference(spec.and_then(|s| s.availability_zone_reference.as_ref())),
        ),
        ("subnet_type", opt_string(res.subnet_type.as_deref())),
        ("vlan_id", opt_int(res.vlan_id)),
        ("vswitch_name", opt_string(res.vswitch_name.as_deref())),
        ("is_external", opt_bool(res.is_external)),
        ("enable_nat", opt_bool(res.enable_nat)),
        (
            "vpc_reference_uuid",
            opt_string(res.vpc_reference.as_ref().and_then(|r| r.uuid.as_deref())),
        ),
        (
            "network_function_chain_reference",
            flatten_reference(res.network_function_chain_reference.as_ref()),
        ),
        ("default_gateway_ip", opt_string(ip.default_gateway_ip.as_deref())),
        ("prefix_length", opt_int(ip.prefix_length)),
        ("subnet_ip", opt_string(ip.subnet_ip.as_deref())),
        ("dhcp_server_address", string_map(&server)),
        ("dhcp_server_address_port", opt_int(ip.dhcp_server_address.as_ref().and_then(|a| a.port))),
        ("ip_config_pool_list_ranges", opt_string_list(ranges.as_deref())),
        ("dhcp_options", string_map(&options)),
        (
            "dhcp_domain_name_server_list",
            opt_string_list(dhcp.domain_name_server_list.as_deref()),
        ),
        ("dhcp_domain_search_list", opt_string_list(dhcp.domain_search_list.as_deref())),
    ];
    attrs.extend(flatten_metadata_fields(&metadata));
    make_state(attrs)
}

#[async_trait::async_trait]
impl Resource for SubnetResource {
    fn type_name(&self) -> &'static str {
        "nutanix_subnet"
    }

    fn schema(&self) -> Schema {
        let mut attrs = vec![
            id_attribute(),
            Attribute::computed("api_version", AttrType::String),
            Attribute::required("name", AttrType::String),
            Attribute::optional_computed("description", AttrType::String),
            Attribute::computed("state", AttrType::String),
            Attribute::optional_computed("cluster_uuid", AttrType::String).force_new(),
            Attribute::computed("cluster_name", AttrType::String),
            reference_attribute("availability_zone_reference"),
            Attribute::required("subnet_type", AttrType::String)
                .force_new()
                .one_of(&["VLAN", "OVERLAY"]),
            Attribute::optional_computed("vlan_id", AttrType::Number).force_new(),
            Attribute::optional_computed("vswitch_name", AttrType::String),
            Attribute::optional_computed("is_external", AttrType::Bool),
            Attribute::optional_computed("enable_nat", AttrType::Bool),
            Attribute::optional_computed("vpc_reference_uuid", AttrType::String),
            reference_attribute("network_function_chain_reference"),
            Attribute::optional_computed("default_gateway_ip", AttrType::String),
            Attribute::optional_computed("prefix_length", AttrType::Number),
            Attribute::optional_computed("subnet_ip", AttrType::String),
            Attribute::optional_computed("dhcp_server_address", AttrType::string_map()),
            Attribute::optional_computed("dhcp_server_address_port", AttrType::Number),
            Attribute::optional_computed("ip_config_pool_list_ranges", AttrType::string_list()),
            Attribute::optional_computed("dhcp_options", AttrType::string_map()),
            Attribute::optional_computed("dhcp_domain_name_server_list", AttrType::string_list()),
            Attribute::optional_computed("dhcp_domain_search_list", AttrType::string_list()),
        ];
        attrs.extend(metadata_attributes());
        Schema::new(Block::new(attrs).with_blocks(vec![Timeouts::block()]))
    }

    async fn create(&self, clients: &Clients, planned: &DynamicValue) -> Result<DynamicValue> {
        let timeouts = task_timeouts(clients, DEFAULT_TIMEOUTS, planned)?;
        let config: SubnetConfig = planned.to_typed()?;
        let (meta, spec) = config.expand(Subnet::default());

        let v3 = clients.v3()?;
        let response = v3
            .create_subnet(&SubnetIntentInput::new(meta.to_metadata(KIND), spec))
            .await
            .context("error creating subnet")?;
        let uuid = created_uuid(response.uuid(), KIND)?;
        info!(id = %uuid, "created nutanix_subnet");

        await_task(
            clients,
            response.task_uuid(),
            timeouts.create,
            &format!("subnet ({}) to create", uuid),
        )
        .await?;

        let subnet = v3
            .get_subnet(&uuid)
            .await
            .with_context(|| format!("error reading subnet {}", uuid))?;
        Ok(flatten_subnet(&subnet))
    }

    async fn read(&self, clients: &Clients, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let id = resource_id(state)?;
        let subnet = found(clients.v3()?.get_subnet(&id).await)
            .with_context(|| format!("error reading subnet {}", id))?;
        Ok(subnet.as_ref().map(flatten_subnet))
    }

    async fn update(
        &self,
        clients: &Clients,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue> {
        let id = resource_id(prior)?;
        let timeouts = task_timeouts(clients, DEFAULT_TIMEOUTS, planned)?;
        let v3 = clients.v3()?;

        let existing = v3
            .get_subnet(&id)
            .await
            .with_context(|| format!("error reading subnet {}", id))?;
        let config: SubnetConfig = planned.to_typed()?;
        let (meta, spec) = config.expand(existing.spec.clone().unwrap_or_default());
        let metadata =
            meta.apply(existing.metadata.clone().unwrap_or_else(|| Metadata::kind(KIND)));

        info!(id = %id, "updating nutanix_subnet");
        let response = v3
            .update_subnet(&id, &SubnetIntentInput::new(metadata, spec))
            .await
            .with_context(|| format!("error updating subnet {}", id))?;
        await_task(
            clients,
            response.task_uuid(),
            timeouts.update,
            &format!("subnet ({}) to update", id),
        )
        .await?;

        let subnet = v3
            .get_subnet(&id)
            .await
            .with_context(|| format!("error reading subnet {}", id))?;
        Ok(flatten_subnet(&subnet))
    }

    async fn delete(&self, clients: &Clients, state: &DynamicValue) -> Result<()> {
        let id = resource_id(state)?;
        let timeouts = task_timeouts(clients, DEFAULT_TIMEOUTS, state)?;

        info!(id = %id, "deleting nutanix_subnet");
        let Some(response) = found(clients.v3()?.delete_subnet(&id).await)
            .with_context(|| format!("error while deleting subnet {}", id))?
        else {
            return Ok(());
        };
        await_delete_task(
            clients,
            response.task_uuid(),
            timeouts.delete,
            &format!("subnet ({}) to delete", id),
        )
        .await
    }
}
