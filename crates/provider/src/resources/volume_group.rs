//! `nutanix_volume_group_v2`
//!
//! Volume groups go through the Volumes v4 API. Every mutation returns a
//! Prism v4 task reference; the id of a new group is read from the
//! completed task's affected entities. Waits follow the `timeouts` block
//! only; the provider `wait_timeout` does not apply to v4 tasks.

use std::time::Duration;

use anyhow::{Context, Result};
use nutanix_client::prism::{Task, TaskReference, REL_VOLUME_GROUP};
use nutanix_client::volumes::{
    DataSourceReference, FlashMode, IscsiFeatures, StorageFeatures, VolumeDisk, VolumeGroup,
};
use nutanix_client::StateChangeConf;
use serde::Deserialize;
use tracing::{debug, info};

use super::{found, resource_id, Resource};
use crate::client::Clients;
use crate::schema::{id_attribute, AttrType, Attribute, Block, NestedBlock, Schema};
use crate::state::{list_value, make_state, opt_bool, opt_string, DynamicValue};
use crate::timeouts::Timeouts;

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(30);

pub const SHARING_STATUS: &[&str] = &["SHARED", "NOT_SHARED"];
pub const AUTHENTICATION_TYPES: &[&str] = &["CHAP", "NONE"];
pub const USAGE_TYPES: &[&str] = &["USER", "INTERNAL", "TEMPORARY", "BACKUP_TARGET"];
pub const ATTACHMENT_TYPES: &[&str] = &["NONE", "DIRECT", "EXTERNAL"];
pub const PROTOCOLS: &[&str] = &["NOT_ASSIGNED", "ISCSI", "NVMF"];
const DATA_SOURCE_TYPES: &[&str] =
    &["STORAGE_CONTAINER", "VM_DISK", "VOLUME_DISK", "DISK_RECOVERY_POINT"];

pub struct VolumeGroupResource;

#[derive(Debug, Default, Deserialize)]
struct VolumeGroupConfig {
    name: String,
    description: Option<String>,
    should_load_balance_vm_attachments: Option<bool>,
    sharing_status: Option<String>,
    target_prefix: Option<String>,
    target_name: Option<String>,
    enabled_authentications: Option<String>,
    #[serde(default)]
    iscsi_features: Vec<IscsiArgs>,
    created_by: Option<String>,
    cluster_reference: String,
    #[serde(default)]
    storage_features: Vec<StorageFeaturesArgs>,
    usage_type: Option<String>,
    attachment_type: Option<String>,
    protocol: Option<String>,
    is_hidden: Option<bool>,
    #[serde(default)]
    disks: Vec<DiskArgs>,
}

#[derive(Debug, Default, Deserialize)]
struct IscsiArgs {
    target_secret: Option<String>,
    enabled_authentications: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StorageFeaturesArgs {
    #[serde(default)]
    flash_mode: Vec<FlashModeArgs>,
}

#[derive(Debug, Default, Deserialize)]
struct FlashModeArgs {
    is_enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct DiskArgs {
    index: Option<i64>,
    disk_size_bytes: i64,
    description: Option<String>,
    #[serde(default)]
    disk_data_source_reference: Vec<DataSourceArgs>,
    #[serde(default)]
    disk_storage_features: Vec<StorageFeaturesArgs>,
}

#[derive(Debug, Default, Deserialize)]
struct DataSourceArgs {
    ext_id: String,
    name: Option<String>,
    uris: Option<Vec<String>>,
    entity_type: Option<String>,
}

impl StorageFeaturesArgs {
    fn expand(features: Vec<StorageFeaturesArgs>) -> Option<StorageFeatures> {
        let features = features.into_iter().next()?;
        Some(StorageFeatures {
            flash_mode: features.flash_mode.into_iter().next().map(|f| FlashMode {
                is_enabled: f.is_enabled.unwrap_or(false),
            }),
        })
    }
}

impl DiskArgs {
    fn expand(self) -> VolumeDisk {
        VolumeDisk {
            ext_id: None,
            index: self.index,
            disk_size_bytes: Some(self.disk_size_bytes),
            description: self.description,
            disk_data_source_reference: self.disk_data_source_reference.into_iter().next().map(|r| {
                DataSourceReference {
                    ext_id: Some(r.ext_id),
                    name: r.name,
                    uris: r.uris,
                    entity_type: r.entity_type,
                }
            }),
            disk_storage_features: StorageFeaturesArgs::expand(self.disk_storage_features),
        }
    }
}

impl VolumeGroupConfig {
    /// Writes the configured fields over `base`.
    fn expand(self, mut base: VolumeGroup) -> VolumeGroup {
        base.name = Some(self.name);
        base.cluster_reference = Some(self.cluster_reference);
        base.description = self.description.or(base.description);
        base.should_load_balance_vm_attachments = self
            .should_load_balance_vm_attachments
            .or(base.should_load_balance_vm_attachments);
        base.sharing_status = self.sharing_status.or(base.sharing_status);
        base.target_prefix = self.target_prefix.or(base.target_prefix);
        base.target_name = self.target_name.or(base.target_name);
        base.enabled_authentications =
            self.enabled_authentications.or(base.enabled_authentications);
        if let Some(iscsi) = self.iscsi_features.into_iter().next() {
            base.iscsi_features = Some(IscsiFeatures {
                target_secret: iscsi.target_secret,
                enabled_authentications: iscsi.enabled_authentications,
            });
        }
        base.created_by = self.created_by.or(base.created_by);
        base.storage_features =
            StorageFeaturesArgs::expand(self.storage_features).or(base.storage_features);
        base.usage_type = self.usage_type.or(base.usage_type);
        base.attachment_type = self.attachment_type.or(base.attachment_type);
        base.protocol = self.protocol.or(base.protocol);
        base.is_hidden = self.is_hidden.or(base.is_hidden);
        if !self.disks.is_empty() {
            base.disks = Some(self.disks.into_iter().map(DiskArgs::expand).collect());
        }
        base
    }
}

fn flatten_storage_features(features: Option<&StorageFeatures>) -> DynamicValue {
    let Some(features) = features else {
        return list_value(vec![]);
    };
    let flash = features
        .flash_mode
        .iter()
        .map(|f| make_state(vec![("is_enabled", opt_bool(Some(f.is_enabled)))]))
        .collect();
    list_value(vec![make_state(vec![("flash_mode", list_value(flash))])])
}

/// State of a volume group. Disks are not part of the group read and are
/// left out.
pub(crate) fn flatten_volume_group(vg: &VolumeGroup) -> DynamicValue {
    let iscsi = vg
        .iscsi_features
        .iter()
        .map(|f| {
            make_state(vec![
                ("target_secret", opt_string(f.target_secret.as_deref())),
                ("enabled_authentications", opt_string(f.enabled_authentications.as_deref())),
            ])
        })
        .collect();
    make_state(vec![
        ("id", opt_string(vg.ext_id.as_deref())),
        ("ext_id", opt_string(vg.ext_id.as_deref())),
        ("name", opt_string(vg.name.as_deref())),
        ("description", opt_string(vg.description.as_deref())),
        ("should_load_balance_vm_attachments", opt_bool(vg.should_load_balance_vm_attachments)),
        ("sharing_status", opt_string(vg.sharing_status.as_deref())),
        ("target_prefix", opt_string(vg.target_prefix.as_deref())),
        ("target_name", opt_string(vg.target_name.as_deref())),
        ("enabled_authentications", opt_string(vg.enabled_authentications.as_deref())),
        ("iscsi_features", list_value(iscsi)),
        ("created_by", opt_string(vg.created_by.as_deref())),
        ("cluster_reference", opt_string(vg.cluster_reference.as_deref())),
        ("storage_features", flatten_storage_features(vg.storage_features.as_ref())),
        ("usage_type", opt_string(vg.usage_type.as_deref())),
        ("attachment_type", opt_string(vg.attachment_type.as_deref())),
        ("protocol", opt_string(vg.protocol.as_deref())),
        ("is_hidden", opt_bool(vg.is_hidden)),
    ])
}

/// The API never returns the CHAP target secret; keep the one in `source`.
fn keep_target_secret(state: &mut DynamicValue, source: &DynamicValue) {
    let secret = source
        .get("iscsi_features")
        .and_then(DynamicValue::as_list)
        .and_then(|items| items.first())
        .and_then(|f| f.get("target_secret"))
        .filter(|s| s.as_string().is_some());
    let Some(secret) = secret else {
        return;
    };
    if let Some(DynamicValue::List(items)) = state.get("iscsi_features").cloned() {
        let items = items
            .into_iter()
            .map(|mut item| {
                if item.get("target_secret").map_or(true, DynamicValue::is_null) {
                    item.set("target_secret", secret.clone());
                }
                item
            })
            .collect();
        state.set("iscsi_features", list_value(items));
    }
}

fn storage_features_block() -> Block {
    Block::new(vec![]).with_blocks(vec![NestedBlock::list(
        "flash_mode",
        Block::new(vec![Attribute::optional_computed("is_enabled", AttrType::Bool)]),
    )])
}

pub(crate) fn volume_group_attributes() -> Vec<Attribute> {
    vec![
        id_attribute(),
        Attribute::computed("ext_id", AttrType::String),
        Attribute::required("name", AttrType::String),
        Attribute::optional_computed("description", AttrType::String),
        Attribute::optional_computed("should_load_balance_vm_attachments", AttrType::Bool),
        Attribute::optional_computed("sharing_status", AttrType::String).one_of(SHARING_STATUS),
        Attribute::optional_computed("target_prefix", AttrType::String),
        Attribute::optional_computed("target_name", AttrType::String),
        Attribute::optional("enabled_authentications", AttrType::String)
            .one_of(AUTHENTICATION_TYPES),
        Attribute::optional_computed("created_by", AttrType::String),
        Attribute::required("cluster_reference", AttrType::String)
            .describe("UUID of the cluster hosting the volume group."),
        Attribute::optional_computed("usage_type", AttrType::String).one_of(USAGE_TYPES),
        Attribute::optional_computed("attachment_type", AttrType::String).one_of(ATTACHMENT_TYPES),
        Attribute::optional_computed("protocol", AttrType::String).one_of(PROTOCOLS),
        Attribute::optional_computed("is_hidden", AttrType::Bool),
    ]
}

/// Waits for a v4 task and returns it once it succeeded.
async fn await_prism_task(
    clients: &Clients,
    task: TaskReference,
    timeout: Duration,
    what: &str,
) -> Result<Option<Task>> {
    let Some(ext_id) = task.ext_id else {
        return Ok(None);
    };
    info!(task = %ext_id, "waiting for {}", what);
    let conf = clients.poll(StateChangeConf::prism_v4(timeout));
    let task = clients
        .prism()?
        .wait_for_task_with(&ext_id, &conf, &clients.cancel)
        .await
        .with_context(|| format!("error waiting for {}", what))?;
    debug!(task = %ext_id, affected = task.entities_affected.len(), "task finished");
    Ok(Some(task))
}

async fn read_group(
    clients: &Clients,
    id: &str,
    source: &DynamicValue,
) -> Result<Option<DynamicValue>> {
    let Some(vg) = found(clients.volumes()?.get_volume_group(id).await)
        .with_context(|| format!("error while fetching volume group {}", id))?
    else {
        return Ok(None);
    };
    let mut state = flatten_volume_group(&vg.value);
    keep_target_secret(&mut state, source);
    Ok(Some(state))
}

#[async_trait::async_trait]
impl Resource for VolumeGroupResource {
    fn type_name(&self) -> &'static str {
        "nutanix_volume_group_v2"
    }

    fn schema(&self) -> Schema {
        let disk = Block::new(vec![
            Attribute::optional_computed("index", AttrType::Number),
            Attribute::required("disk_size_bytes", AttrType::Number),
            Attribute::optional_computed("description", AttrType::String),
        ])
        .with_blocks(vec![
            NestedBlock::list(
                "disk_data_source_reference",
                Block::new(vec![
                    Attribute::required("ext_id", AttrType::String),
                    Attribute::optional_computed("name", AttrType::String),
                    Attribute::optional_computed("uris", AttrType::string_list()),
                    Attribute::optional_computed("entity_type", AttrType::String)
                        .one_of(DATA_SOURCE_TYPES),
                ]),
            )
            .min_items(1),
            NestedBlock::list("disk_storage_features", storage_features_block()),
        ]);

        Schema::new(
            Block::new(volume_group_attributes())
                .with_blocks(vec![
                    NestedBlock::list(
                        "iscsi_features",
                        Block::new(vec![
                            Attribute::optional_computed("target_secret", AttrType::String)
                                .sensitive(),
                            Attribute::optional_computed(
                                "enabled_authentications",
                                AttrType::String,
                            )
                            .one_of(AUTHENTICATION_TYPES),
                        ]),
                    ),
                    NestedBlock::list("storage_features", storage_features_block()),
                    NestedBlock::list("disks", disk),
                    Timeouts::block(),
                ])
                .describe("Creates a new Volume Group."),
        )
    }

    async fn create(&self, clients: &Clients, planned: &DynamicValue) -> Result<DynamicValue> {
        let timeouts = DEFAULT_TIMEOUTS.from_config(planned)?;
        let config: VolumeGroupConfig = planned.to_typed()?;
        let body = config.expand(VolumeGroup::default());

        let reference = clients
            .volumes()?
            .create_volume_group(&body)
            .await
            .context("error while creating volume group")?;
        let task_id = reference.ext_id.clone().unwrap_or_default();
        let task = await_prism_task(
            clients,
            reference,
            timeouts.create,
            &format!("volume group ({}) to create", task_id),
        )
        .await?
        .context("volume group create returned no task")?;
        let id = task.entity_ext_id(REL_VOLUME_GROUP, "Volume group")?;
        info!(id = %id, "created nutanix_volume_group_v2");

        read_group(clients, &id, planned)
            .await?
            .with_context(|| format!("volume group {} vanished after create", id))
    }

    async fn read(&self, clients: &Clients, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let id = resource_id(state)?;
        read_group(clients, &id, state).await
    }

    async fn update(
        &self,
        clients: &Clients,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue> {
        let id = resource_id(prior)?;
        let timeouts = DEFAULT_TIMEOUTS.from_config(planned)?;
        let volumes = clients.volumes()?;

        let current = volumes
            .get_volume_group(&id)
            .await
            .with_context(|| format!("error while fetching volume group {}", id))?;
        let config: VolumeGroupConfig = planned.to_typed()?;
        let mut body = config.expand(current.value);
        // Disks are managed through their own endpoint once the group exists.
        body.disks = None;
        body.ext_id = None;

        info!(id = %id, "updating nutanix_volume_group_v2");
        let reference = volumes
            .update_volume_group(&id, &body, current.etag.as_deref())
            .await
            .with_context(|| format!("error while updating volume group {}", id))?;
        await_prism_task(
            clients,
            reference,
            timeouts.update,
            &format!("volume group ({}) to update", id),
        )
        .await?;

        read_group(clients, &id, planned)
            .await?
            .with_context(|| format!("volume group {} vanished during update", id))
    }

    async fn delete(&self, clients: &Clients, state: &DynamicValue) -> Result<()> {
        let id = resource_id(state)?;
        let timeouts = DEFAULT_TIMEOUTS.from_config(state)?;

        info!(id = %id, "deleting nutanix_volume_group_v2");
        let Some(reference) = found(clients.volumes()?.delete_volume_group(&id).await)
            .with_context(|| format!("error while deleting volume group {}", id))?
        else {
            return Ok(());
        };
        await_prism_task(
            clients,
            reference,
            timeouts.delete,
            &format!("volume group ({}) to delete", id),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::common::testing::prism_clients;
    use crate::state::{int_value, string_value};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VG_ID: &str = "3f1c2b9a-6d5e-4c2b-9a1f-7e6d5c4b3a21";

    fn planned(extra: Vec<(&'static str, DynamicValue)>) -> DynamicValue {
        let mut attrs = vec![
            ("name", string_value("vg1")),
            ("cluster_reference", string_value("cluster-1")),
            ("sharing_status", string_value("SHARED")),
        ];
        attrs.extend(extra);
        VolumeGroupResource.schema().block.conform(&make_state(attrs))
    }

    async fn mount_task(server: &MockServer, task: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("/api/prism/v4.0/config/tasks/{}", task)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": body })))
            .mount(server)
            .await;
    }

    async fn mount_group(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path(format!("/api/volumes/v4.0/config/volume-groups/{}", VG_ID)))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "W/\"1\"")
                    .set_body_json(json!({"data": {
                        "extId": VG_ID,
                        "name": "vg1",
                        "sharingStatus": "SHARED",
                        "clusterReference": "cluster-1",
                        "iscsiFeatures": {"enabledAuthentications": "CHAP"},
                        "storageFeatures": {"flashMode": {"isEnabled": true}}
                    }})),
            )
            .mount(server)
            .await;
    }

    #[test]
    fn schema_rejects_unknown_sharing_status() {
        let config = planned(vec![("sharing_status", string_value("SOMETIMES"))]);

        let diagnostics = VolumeGroupResource.schema().block.validate(&config);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].detail,
            "expected sharing_status to be one of [\"SHARED\" \"NOT_SHARED\"], got SOMETIMES"
        );
    }

    #[test]
    fn expand_carries_disks_and_storage_features() {
        let disk = make_state(vec![
            ("disk_size_bytes", int_value(1073741824)),
            (
                "disk_data_source_reference",
                list_value(vec![make_state(vec![
                    ("ext_id", string_value("container-1")),
                    ("entity_type", string_value("STORAGE_CONTAINER")),
                ])]),
            ),
        ]);
        let config: VolumeGroupConfig =
            planned(vec![("disks", list_value(vec![disk]))]).to_typed().unwrap();

        let body = config.expand(VolumeGroup::default());

        let disks = body.disks.unwrap();
        assert_eq!(disks[0].disk_size_bytes, Some(1073741824));
        assert_eq!(
            disks[0].disk_data_source_reference.as_ref().unwrap().entity_type.as_deref(),
            Some("STORAGE_CONTAINER")
        );
        assert!(body.storage_features.is_none());
    }

    #[test]
    fn flattened_state_expands_back_to_the_same_group() {
        let group = VolumeGroup {
            ext_id: Some(VG_ID.to_string()),
            name: Some("vg1".to_string()),
            description: Some("db logs".to_string()),
            sharing_status: Some("SHARED".to_string()),
            cluster_reference: Some("cluster-1".to_string()),
            iscsi_features: Some(IscsiFeatures {
                target_secret: None,
                enabled_authentications: Some("CHAP".to_string()),
            }),
            storage_features: Some(StorageFeatures {
                flash_mode: Some(FlashMode { is_enabled: true }),
            }),
            usage_type: Some("USER".to_string()),
            is_hidden: Some(false),
            ..Default::default()
        };
        let state = VolumeGroupResource.schema().block.conform(&flatten_volume_group(&group));

        let config: VolumeGroupConfig = state.to_typed().unwrap();
        let body = config.expand(VolumeGroup::default());

        assert_eq!(
            body,
            VolumeGroup {
                ext_id: None,
                ..group
            }
        );
    }

    #[tokio::test]
    async fn create_reads_id_from_completed_task() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/volumes/v4.0/config/volume-groups"))
            .and(body_json(json!({
                "name": "vg1",
                "sharingStatus": "SHARED",
                "clusterReference": "cluster-1",
                "iscsiFeatures": {"targetSecret": "chap-secret-1", "enabledAuthentications": "CHAP"}
            })))
            .respond_with(
                ResponseTemplate::new(202).set_body_json(json!({"data": {"extId": "task-1"}})),
            )
            .expect(1)
            .mount(&server)
            .await;
        mount_task(
            &server,
            "task-1",
            json!({
                "extId": "task-1",
                "status": "SUCCEEDED",
                "entitiesAffected": [
                    {"extId": "cluster-1", "rel": "clustermgmt:config:cluster"},
                    {"extId": VG_ID, "rel": "volumes:config:volume-group"}
                ]
            }),
        )
        .await;
        mount_group(&server).await;
        let clients = prism_clients(&server.uri());
        let iscsi = list_value(vec![make_state(vec![
            ("target_secret", string_value("chap-secret-1")),
            ("enabled_authentications", string_value("CHAP")),
        ])]);

        // Act
        let state = VolumeGroupResource
            .create(&clients, &planned(vec![("iscsi_features", iscsi)]))
            .await
            .unwrap();

        // Assert
        assert_eq!(state.get("id"), Some(&string_value(VG_ID)));
        let iscsi = state.get("iscsi_features").unwrap().as_list().unwrap();
        assert_eq!(iscsi[0].get("target_secret"), Some(&string_value("chap-secret-1")));
        let storage = state.get("storage_features").unwrap().as_list().unwrap();
        let flash = storage[0].get("flash_mode").unwrap().as_list().unwrap();
        assert_eq!(flash[0].get("is_enabled"), Some(&opt_bool(Some(true))));
    }

    #[tokio::test]
    async fn create_fails_when_task_names_no_group() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/volumes/v4.0/config/volume-groups"))
            .respond_with(
                ResponseTemplate::new(202).set_body_json(json!({"data": {"extId": "task-2"}})),
            )
            .mount(&server)
            .await;
        mount_task(&server, "task-2", json!({"extId": "task-2", "status": "SUCCEEDED"})).await;
        let clients = prism_clients(&server.uri());

        // Act
        let err = VolumeGroupResource.create(&clients, &planned(vec![])).await.unwrap_err();

        // Assert
        assert!(format!("{:#}", err).contains("Volume group ext id not found in task task-2"));
    }

    #[tokio::test]
    async fn update_patches_with_etag() {
        // Arrange
        let server = MockServer::start().await;
        mount_group(&server).await;
        Mock::given(method("PATCH"))
            .and(path(format!("/api/volumes/v4.0/config/volume-groups/{}", VG_ID)))
            .and(header("If-Match", "W/\"1\""))
            .respond_with(
                ResponseTemplate::new(202).set_body_json(json!({"data": {"extId": "task-3"}})),
            )
            .expect(1)
            .mount(&server)
            .await;
        mount_task(&server, "task-3", json!({"extId": "task-3", "status": "SUCCEEDED"})).await;
        let clients = prism_clients(&server.uri());
        let prior = planned(vec![("id", string_value(VG_ID))]);
        let next =
            planned(vec![("id", string_value(VG_ID)), ("description", string_value("db logs"))]);

        // Act
        let state = VolumeGroupResource.update(&clients, &prior, &next).await.unwrap();

        // Assert
        assert_eq!(state.get("ext_id"), Some(&string_value(VG_ID)));
    }

    #[tokio::test]
    async fn delete_waits_for_task() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(format!("/api/volumes/v4.0/config/volume-groups/{}", VG_ID)))
            .respond_with(
                ResponseTemplate::new(202).set_body_json(json!({"data": {"extId": "task-4"}})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/prism/v4.0/config/tasks/task-4"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": {"status": "SUCCEEDED"}})),
            )
            .expect(1)
            .mount(&server)
            .await;
        let clients = prism_clients(&server.uri());
        let state = make_state(vec![("id", string_value(VG_ID))]);

        // Act
        let result = VolumeGroupResource.delete(&clients, &state).await;

        // Assert
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn delete_ignores_provider_wait_timeout() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(format!("/api/volumes/v4.0/config/volume-groups/{}", VG_ID)))
            .respond_with(
                ResponseTemplate::new(202).set_body_json(json!({"data": {"extId": "task-5"}})),
            )
            .mount(&server)
            .await;
        mount_task(&server, "task-5", json!({"extId": "task-5", "status": "SUCCEEDED"})).await;
        let mut clients = prism_clients(&server.uri());
        clients.wait_timeout = Some(Duration::ZERO);
        let state = make_state(vec![("id", string_value(VG_ID))]);

        // Act
        let result = VolumeGroupResource.delete(&clients, &state).await;

        // Assert
        assert!(result.is_ok());
    }
}
