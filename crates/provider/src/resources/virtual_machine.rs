//! `nutanix_virtual_machine`

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use nutanix_client::v3::structs::{
    DiskAddress, GuestCustomization, GuestCustomizationCloudInit, GuestCustomizationSysprep,
    IpAddress, Metadata, Reference, Vm, VmBootConfig, VmDisk, VmDiskDeviceProperties, VmIntentInput,
    VmIntentResponse, VmNic, VmResources,
};
use serde::Deserialize;
use tracing::info;

use super::common::{
    await_delete_task, await_task, created_uuid, expand_reference, flatten_metadata_fields,
    flatten_reference, metadata_attributes, reference_attribute, MetadataArgs, ReferenceMap,
};
use super::{found, resource_id, task_timeouts, Resource};
use crate::client::Clients;
use crate::schema::{id_attribute, AttrType, Attribute, Block, NestedBlock, Schema};
use crate::state::{
    list_value, make_state, opt_bool, opt_int, opt_string, opt_string_list, string_map,
    DynamicValue,
};
use crate::timeouts::Timeouts;

const KIND: &str = "vm";
const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(10);

pub struct VirtualMachineResource;

#[derive(Debug, Default, Deserialize)]
struct VmConfig {
    name: String,
    description: Option<String>,
    cluster_uuid: String,
    availability_zone_reference: Option<ReferenceMap>,
    #[serde(flatten)]
    meta: MetadataArgs,
    num_vcpus_per_socket: Option<i64>,
    num_sockets: Option<i64>,
    memory_size_mib: Option<i64>,
    power_state: Option<String>,
    guest_os_id: Option<String>,
    hardware_clock_timezone: Option<String>,
    machine_type: Option<String>,
    boot_device_order_list: Option<Vec<String>>,
    boot_type: Option<String>,
    vga_console_enabled: Option<bool>,
    guest_customization_cloud_init_user_data: Option<String>,
    guest_customization_cloud_init_meta_data: Option<String>,
    guest_customization_cloud_init_custom_key_values: Option<BTreeMap<String, String>>,
    guest_customization_is_overridable: Option<bool>,
    guest_customization_sysprep: Option<BTreeMap<String, String>>,
    parent_reference: Option<ReferenceMap>,
    #[serde(default)]
    nic_list: Vec<NicConfig>,
    #[serde(default)]
    disk_list: Vec<DiskConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct NicConfig {
    uuid: Option<String>,
    subnet_uuid: Option<String>,
    nic_type: Option<String>,
    model: Option<String>,
    network_function_nic_type: Option<String>,
    mac_address: Option<String>,
    is_connected: Option<bool>,
    #[serde(default)]
    ip_endpoint_list: Vec<IpEndpointConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct IpEndpointConfig {
    ip: Option<String>,
    #[serde(rename = "type")]
    ip_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DiskConfig {
    uuid: Option<String>,
    disk_size_bytes: Option<i64>,
    disk_size_mib: Option<i64>,
    #[serde(default)]
    device_properties: Vec<DevicePropertiesConfig>,
    data_source_reference: Option<ReferenceMap>,
    volume_group_reference: Option<ReferenceMap>,
}

#[derive(Debug, Default, Deserialize)]
struct DevicePropertiesConfig {
    device_type: Option<String>,
    disk_address: Option<BTreeMap<String, String>>,
}

impl VmConfig {
    /// Overlays the configuration on `base` (empty on create, the current
    /// spec on update).
    fn expand(self, mut base: Vm) -> Result<(MetadataArgs, Vm)> {
        let mut resources = base.resources.take().unwrap_or_default();

        resources.num_vcpus_per_socket =
            self.num_vcpus_per_socket.or(resources.num_vcpus_per_socket);
        resources.num_sockets = self.num_sockets.or(resources.num_sockets);
        resources.memory_size_mib = self.memory_size_mib.or(resources.memory_size_mib);
        resources.power_state = self.power_state.or(resources.power_state);
        resources.guest_os_id = self.guest_os_id.or(resources.guest_os_id);
        resources.hardware_clock_timezone =
            self.hardware_clock_timezone.or(resources.hardware_clock_timezone);
        resources.machine_type = self.machine_type.or(resources.machine_type);
        resources.vga_console_enabled = self.vga_console_enabled.or(resources.vga_console_enabled);
        if let Some(r) = self.parent_reference.as_ref().and_then(expand_reference) {
            resources.parent_reference = Some(r);
        }

        if self.boot_device_order_list.is_some() || self.boot_type.is_some() {
            let boot = resources.boot_config.get_or_insert_with(VmBootConfig::default);
            if let Some(order) = self.boot_device_order_list {
                boot.boot_device_order_list = Some(order);
            }
            if let Some(boot_type) = self.boot_type {
                boot.boot_type = Some(boot_type);
            }
        }

        let cloud_init = GuestCustomizationCloudInit {
            user_data: self.guest_customization_cloud_init_user_data,
            meta_data: self.guest_customization_cloud_init_meta_data,
            custom_key_values: self
                .guest_customization_cloud_init_custom_key_values
                .filter(|m| !m.is_empty()),
        };
        let sysprep = self
            .guest_customization_sysprep
            .filter(|m| !m.is_empty())
            .map(|m| GuestCustomizationSysprep {
                install_type: m.get("install_type").cloned(),
                unattend_xml: m.get("unattend_xml").cloned(),
            });
        if cloud_init != GuestCustomizationCloudInit::default() || sysprep.is_some() {
            resources.guest_customization = Some(GuestCustomization {
                cloud_init: (cloud_init != GuestCustomizationCloudInit::default())
                    .then_some(cloud_init),
                is_overridable: self.guest_customization_is_overridable,
                sysprep,
            });
        }

        if !self.nic_list.is_empty() {
            resources.nic_list = Some(self.nic_list.into_iter().map(NicConfig::expand).collect());
        }
        if !self.disk_list.is_empty() {
            resources.disk_list = Some(
                self.disk_list
                    .into_iter()
                    .map(DiskConfig::expand)
                    .collect::<Result<_>>()?,
            );
        }

        base.name = Some(self.name);
        base.description = self.description.or(base.description);
        base.cluster_reference = Some(Reference::new("cluster", self.cluster_uuid));
        if let Some(r) = self.availability_zone_reference.as_ref().and_then(expand_reference) {
            base.availability_zone_reference = Some(r);
        }
        base.resources = Some(resources);
        Ok((self.meta, base))
    }
}

impl NicConfig {
    fn expand(self) -> VmNic {
        let ip_endpoint_list: Vec<IpAddress> = self
            .ip_endpoint_list
            .into_iter()
            .filter(|ip| ip.ip.is_some())
            .map(|ip| IpAddress {
                ip: ip.ip,
                ip_type: ip.ip_type,
            })
            .collect();
        VmNic {
            uuid: self.uuid,
            subnet_reference: self.subnet_uuid.map(|uuid| Reference::new("subnet", uuid)),
            nic_type: self.nic_type,
            model: self.model,
            network_function_nic_type: self.network_function_nic_type,
            mac_address: self.mac_address,
            is_connected: self.is_connected,
            ip_endpoint_list: (!ip_endpoint_list.is_empty()).then_some(ip_endpoint_list),
            ..Default::default()
        }
    }
}

impl DiskConfig {
    fn expand(self) -> Result<VmDisk> {
        let device_properties = match self.device_properties.into_iter().next() {
            Some(props) => {
                let disk_address = match props.disk_address.filter(|m| !m.is_empty()) {
                    Some(m) => Some(DiskAddress {
                        adapter_type: m.get("adapter_type").cloned(),
                        device_index: match m.get("device_index") {
                            Some(index) => Some(
                                index
                                    .parse()
                                    .with_context(|| format!("invalid device_index {:?}", index))?,
                            ),
                            None => None,
                        },
                    }),
                    None => None,
                };
                Some(VmDiskDeviceProperties {
                    device_type: props.device_type,
                    disk_address,
                })
            }
            None => None,
        };
        Ok(VmDisk {
            uuid: self.uuid,
            disk_size_bytes: self.disk_size_bytes,
            disk_size_mib: self.disk_size_mib,
            device_properties,
            data_source_reference: self.data_source_reference.as_ref().and_then(expand_reference),
            volume_group_reference: self.volume_group_reference.as_ref().and_then(expand_reference),
        })
    }
}

fn flatten_nic(nic: &VmNic) -> DynamicValue {
    let ips = nic
        .ip_endpoint_list
        .iter()
        .flatten()
        .map(|ip| {
            make_state(vec![
                ("ip", opt_string(ip.ip.as_deref())),
                ("type", opt_string(ip.ip_type.as_deref())),
            ])
        })
        .collect();
    let subnet = nic.subnet_reference.as_ref();
    make_state(vec![
        ("uuid", opt_string(nic.uuid.as_deref())),
        ("subnet_uuid", opt_string(subnet.and_then(|r| r.uuid.as_deref()))),
        ("subnet_name", opt_string(subnet.and_then(|r| r.name.as_deref()))),
        ("nic_type", opt_string(nic.nic_type.as_deref())),
        ("model", opt_string(nic.model.as_deref())),
        ("network_function_nic_type", opt_string(nic.network_function_nic_type.as_deref())),
        ("mac_address", opt_string(nic.mac_address.as_deref())),
        ("is_connected", opt_bool(nic.is_connected)),
        ("ip_endpoint_list", list_value(ips)),
    ])
}

fn flatten_disk(disk: &VmDisk) -> DynamicValue {
    let device_properties = disk
        .device_properties
        .as_ref()
        .map(|props| {
            let mut address = BTreeMap::new();
            if let Some(a) = &props.disk_address {
                if let Some(index) = a.device_index {
                    address.insert("device_index".to_string(), index.to_string());
                }
                if let Some(adapter) = &a.adapter_type {
                    address.insert("adapter_type".to_string(), adapter.clone());
                }
            }
            vec![make_state(vec![
                ("device_type", opt_string(props.device_type.as_deref())),
                ("disk_address", string_map(&address)),
            ])]
        })
        .unwrap_or_default();
    make_state(vec![
        ("uuid", opt_string(disk.uuid.as_deref())),
        ("disk_size_bytes", opt_int(disk.disk_size_bytes)),
        ("disk_size_mib", opt_int(disk.disk_size_mib)),
        ("device_properties", list_value(device_properties)),
        ("data_source_reference", flatten_reference(disk.data_source_reference.as_ref())),
        ("volume_group_reference", flatten_reference(disk.volume_group_reference.as_ref())),
    ])
}

/// Builds the Terraform state of a VM. Observed values come from
/// `status`; guest customization is only echoed back in `spec`.
pub(crate) fn flatten_vm(vm: &VmIntentResponse) -> DynamicValue {
    let metadata = vm.metadata.clone().unwrap_or_default();
    let status = vm.status.as_ref();
    let spec = vm.spec.as_ref();
    let observed = status
        .and_then(|s| s.resources.as_ref())
        .or_else(|| spec.and_then(|s| s.resources.as_ref()));
    let requested = spec
        .and_then(|s| s.resources.as_ref())
        .or(observed);
    let default = VmResources::default();
    let res = observed.unwrap_or(&default);

    let cluster = status
        .and_then(|s| s.cluster_reference.as_ref())
        .or_else(|| spec.and_then(|s| s.cluster_reference.as_ref()));
    let boot = res.boot_config.as_ref();
    let guest = requested.and_then(|r| r.guest_customization.as_ref());
    let cloud_init = guest.and_then(|g| g.cloud_init.as_ref());
    let sysprep = guest.and_then(|g| g.sysprep.as_ref());
    let mut sysprep_map = BTreeMap::new();
    if let Some(s) = sysprep {
        if let Some(install_type) = &s.install_type {
            sysprep_map.insert("install_type".to_string(), install_type.clone());
        }
        if let Some(unattend_xml) = &s.unattend_xml {
            sysprep_map.insert("unattend_xml".to_string(), unattend_xml.clone());
        }
    }

    let mut attrs = vec![
        ("id", opt_string(metadata.uuid.as_deref())),
        ("api_version", opt_string(vm.api_version.as_deref())),
        (
            "name",
            opt_string(
                status
                    .and_then(|s| s.name.as_deref())
                    .or(spec.and_then(|s| s.name.as_deref())),
            ),
        ),
        (
            "description",
            opt_string(
                status
                    .and_then(|s| s.description.as_deref())
                    .or(spec.and_then(|s| s.description.as_deref())),
            ),
        ),
        ("state", opt_string(status.and_then(|s| s.state.as_deref()))),
        ("cluster_uuid", opt_string(cluster.and_then(|c| c.uuid.as_deref()))),
        ("cluster_name", opt_string(cluster.and_then(|c| c.name.as_deref()))),
        (
            "availability_zone_reference",
            flatten_reference(status.and_then(|s| s.availability_zone_reference.as_ref())),
        ),
        ("host_reference", flatten_reference(res.host_reference.as_ref())),
        ("hypervisor_type", opt_string(res.hypervisor_type.as_deref())),
        ("num_vcpus_per_socket", opt_int(res.num_vcpus_per_socket)),
        ("num_sockets", opt_int(res.num_sockets)),
        ("memory_size_mib", opt_int(res.memory_size_mib)),
        ("power_state", opt_string(res.power_state.as_deref())),
        ("guest_os_id", opt_string(res.guest_os_id.as_deref())),
        ("hardware_clock_timezone", opt_string(res.hardware_clock_timezone.as_deref())),
        ("machine_type", opt_string(res.machine_type.as_deref())),
        (
            "boot_device_order_list",
            opt_string_list(boot.and_then(|b| b.boot_device_order_list.as_deref())),
        ),
        ("boot_type", opt_string(boot.and_then(|b| b.boot_type.as_deref()))),
        ("vga_console_enabled", opt_bool(res.vga_console_enabled)),
        (
            "guest_customization_cloud_init_user_data",
            opt_string(cloud_init.and_then(|c| c.user_data.as_deref())),
        ),
        (
            "guest_customization_cloud_init_meta_data",
            opt_string(cloud_init.and_then(|c| c.meta_data.as_deref())),
        ),
        (
            "guest_customization_cloud_init_custom_key_values",
            string_map(cloud_init.and_then(|c| c.custom_key_values.as_ref()).into_iter().flatten()),
        ),
        (
            "guest_customization_is_overridable",
            opt_bool(guest.and_then(|g| g.is_overridable)),
        ),
        ("guest_customization_sysprep", string_map(&sysprep_map)),
        ("parent_reference", flatten_reference(res.parent_reference.as_ref())),
        (
            "nic_list",
            list_value(res.nic_list.iter().flatten().map(flatten_nic).collect()),
        ),
        (
            "disk_list",
            list_value(res.disk_list.iter().flatten().map(flatten_disk).collect()),
        ),
    ];
    attrs.extend(flatten_metadata_fields(&metadata));
    make_state(attrs)
}

pub(crate) fn vm_attributes() -> Vec<Attribute> {
    let mut attrs = vec![
        id_attribute(),
        Attribute::computed("api_version", AttrType::String),
        Attribute::required("name", AttrType::String),
        Attribute::optional_computed("description", AttrType::String),
        Attribute::required("cluster_uuid", AttrType::String).force_new(),
        Attribute::computed("cluster_name", AttrType::String),
        Attribute::computed("state", AttrType::String),
        reference_attribute("availability_zone_reference"),
        Attribute::computed("host_reference", AttrType::string_map()),
        Attribute::computed("hypervisor_type", AttrType::String),
        Attribute::optional_computed("num_vcpus_per_socket", AttrType::Number),
        Attribute::optional_computed("num_sockets", AttrType::Number),
        Attribute::optional_computed("memory_size_mib", AttrType::Number),
        Attribute::optional_computed("power_state", AttrType::String).one_of(&["ON", "OFF"]),
        Attribute::optional_computed("guest_os_id", AttrType::String),
        Attribute::optional_computed("hardware_clock_timezone", AttrType::String),
        Attribute::optional_computed("machine_type", AttrType::String)
            .one_of(&["PC", "PSERIES", "Q35"]),
        Attribute::optional_computed("boot_device_order_list", AttrType::string_list()),
        Attribute::optional_computed("boot_type", AttrType::String)
            .one_of(&["LEGACY", "UEFI", "SECURE_BOOT"]),
        Attribute::optional_computed("vga_console_enabled", AttrType::Bool),
        Attribute::optional_computed("guest_customization_cloud_init_user_data", AttrType::String)
            .force_new(),
        Attribute::optional_computed("guest_customization_cloud_init_meta_data", AttrType::String)
            .force_new(),
        Attribute::optional_computed(
            "guest_customization_cloud_init_custom_key_values",
            AttrType::string_map(),
        )
        .force_new(),
        Attribute::optional_computed("guest_customization_is_overridable", AttrType::Bool),
        Attribute::optional_computed("guest_customization_sysprep", AttrType::string_map())
            .force_new(),
        reference_attribute("parent_reference"),
    ];
    attrs.extend(metadata_attributes());
    attrs
}

fn nic_block() -> Block {
    Block::new(vec![
        Attribute::optional_computed("uuid", AttrType::String),
        Attribute::optional("subnet_uuid", AttrType::String),
        Attribute::computed("subnet_name", AttrType::String),
        Attribute::optional_computed("nic_type", AttrType::String),
        Attribute::optional_computed("model", AttrType::String),
        Attribute::optional_computed("network_function_nic_type", AttrType::String),
        Attribute::optional_computed("mac_address", AttrType::String),
        Attribute::optional_computed("is_connected", AttrType::Bool),
    ])
    .with_blocks(vec![NestedBlock::list(
        "ip_endpoint_list",
        Block::new(vec![
            Attribute::optional_computed("ip", AttrType::String),
            Attribute::optional_computed("type", AttrType::String),
        ]),
    )])
}

fn disk_block() -> Block {
    Block::new(vec![
        Attribute::optional_computed("uuid", AttrType::String),
        Attribute::optional_computed("disk_size_bytes", AttrType::Number),
        Attribute::optional_computed("disk_size_mib", AttrType::Number),
        reference_attribute("data_source_reference"),
        reference_attribute("volume_group_reference"),
    ])
    .with_blocks(vec![NestedBlock::list(
        "device_properties",
        Block::new(vec![
            Attribute::optional_computed("device_type", AttrType::String),
            Attribute::optional_computed("disk_address", AttrType::string_map()),
        ]),
    )
    .max_items(1)])
}

#[async_trait::async_trait]
impl Resource for VirtualMachineResource {
    fn type_name(&self) -> &'static str {
        "nutanix_virtual_machine"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new(vm_attributes())
                .with_blocks(vec![
                    NestedBlock::list("nic_list", nic_block()),
                    NestedBlock::list("disk_list", disk_block()),
                    Timeouts::block(),
                ])
                .describe("A virtual machine managed through the Prism Central v3 API."),
        )
    }

    async fn create(&self, clients: &Clients, planned: &DynamicValue) -> Result<DynamicValue> {
        let timeouts = task_timeouts(clients, DEFAULT_TIMEOUTS, planned)?;
        let config: VmConfig = planned.to_typed()?;
        let (meta, spec) = config.expand(Vm::default())?;
        let request = VmIntentInput::new(meta.to_metadata(KIND), spec);

        let v3 = clients.v3()?;
        let response = v3.create_vm(&request).await.context("error creating virtual machine")?;
        let uuid = created_uuid(response.uuid(), KIND)?;
        info!(id = %uuid, "created nutanix_virtual_machine");

        await_task(
            clients,
            response.task_uuid(),
            timeouts.create,
            &format!("vm ({}) to create", uuid),
        )
        .await?;

        let vm = v3
            .get_vm(&uuid)
            .await
            .with_context(|| format!("error reading virtual machine {}", uuid))?;
        Ok(flatten_vm(&vm))
    }

    async fn read(&self, clients: &Clients, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let id = resource_id(state)?;
        let vm = found(clients.v3()?.get_vm(&id).await)
            .with_context(|| format!("error reading virtual machine {}", id))?;
        Ok(vm.as_ref().map(flatten_vm))
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
            .get_vm(&id)
            .await
            .with_context(|| format!("error reading virtual machine {}", id))?;
        let config: VmConfig = planned.to_typed()?;
        let (meta, spec) = config.expand(existing.spec.clone().unwrap_or_default())?;
        let metadata =
            meta.apply(existing.metadata.clone().unwrap_or_else(|| Metadata::kind(KIND)));

        info!(id = %id, "updating nutanix_virtual_machine");
        let response = v3
            .update_vm(&id, &VmIntentInput::new(metadata, spec))
            .await
            .with_context(|| format!("error updating virtual machine {}", id))?;
        await_task(
            clients,
            response.task_uuid(),
            timeouts.update,
            &format!("vm ({}) to update", id),
        )
        .await?;

        let vm = v3
            .get_vm(&id)
            .await
            .with_context(|| format!("error reading virtual machine {}", id))?;
        Ok(flatten_vm(&vm))
    }

    async fn delete(&self, clients: &Clients, state: &DynamicValue) -> Result<()> {
        let id = resource_id(state)?;
        let timeouts = task_timeouts(clients, DEFAULT_TIMEOUTS, state)?;

        info!(id = %id, "deleting nutanix_virtual_machine");
        let Some(response) = found(clients.v3()?.delete_vm(&id).await)
            .with_context(|| format!("error while deleting virtual machine {}", id))?
        else {
            return Ok(());
        };
        await_delete_task(
            clients,
            response.task_uuid(),
            timeouts.delete,
            &format!("vm ({}) to delete", id),
        )
        .await
    }
}
