//! `nutanix_role`

use anyhow::{Context, Result};
use nutanix_client::v3::structs::{
    Metadata, Role, RoleIntentInput, RoleIntentResponse, RoleResources,
};
use serde::Deserialize;
use tracing::info;

use super::common::{
    await_delete_task, await_task, created_uuid, expand_reference_list, flatten_metadata_fields,
    flatten_reference_list, metadata_attributes, reference_list_block, MetadataArgs, ReferenceMap,
};
use super::{found, resource_id, task_timeouts, Resource};
use crate::client::Clients;
use crate::schema::{id_attribute, AttrType, Attribute, Block, Schema};
use crate::state::{make_state, opt_string, DynamicValue};
use crate::timeouts::Timeouts;

const KIND: &str = "role";
const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(60);

pub struct RoleResource;

#[derive(Debug, Default, Deserialize)]
struct RoleConfig {
    name: String,
    description: Option<String>,
    #[serde(flatten)]
    meta: MetadataArgs,
    #[serde(default)]
    permission_reference_list: Vec<ReferenceMap>,
}

impl RoleConfig {
    fn expand(self, mut base: Role) -> (MetadataArgs, Role) {
        base.name = Some(self.name);
        base.description = self.description.or(base.description);
        base.resources = Some(RoleResources {
            permission_reference_list: expand_reference_list(
                &self.permission_reference_list,
                "permission",
            ),
        });
        (self.meta, base)
    }
}

pub(crate) fn flatten_role(role: &RoleIntentResponse) -> DynamicValue {
    let metadata = role.metadata.clone().unwrap_or_default();
    let status = role.status.as_ref();
    let spec = role.spec.as_ref();
    let res = status
        .and_then(|s| s.resources.as_ref())
        .or_else(|| spec.and_then(|s| s.resources.as_ref()));

    let mut attrs = vec![
        ("id", opt_string(metadata.uuid.as_deref())),
        ("api_version", opt_string(role.api_version.as_deref())),
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
        (
            "permission_reference_list",
            flatten_reference_list(res.and_then(|r| r.permission_reference_list.as_ref())),
        ),
    ];
    attrs.extend(flatten_metadata_fields(&metadata));
    make_state(attrs)
}

#[async_trait::async_trait]
impl Resource for RoleResource {
    fn type_name(&self) -> &'static str {
        "nutanix_role"
    }

    fn schema(&self) -> Schema {
        let mut attrs = vec![
            id_attribute(),
            Attribute::computed("api_version", AttrType::String),
            Attribute::required("name", AttrType::String),
            Attribute::optional_computed("description", AttrType::String),
            Attribute::computed("state", AttrType::String),
        ];
        attrs.extend(metadata_attributes());
        Schema::new(Block::new(attrs).with_blocks(vec![
            reference_list_block("permission_reference_list").min_items(1),
            Timeouts::block(),
        ]))
    }

    async fn create(&self, clients: &Clients, planned: &DynamicValue) -> Result<DynamicValue> {
        let timeouts = task_timeouts(clients, DEFAULT_TIMEOUTS, planned)?;
        let config: RoleConfig = planned.to_typed()?;
        let (meta, spec) = config.expand(Role::default());

        let v3 = clients.v3()?;
        let response = v3
            .create_role(&RoleIntentInput::new(meta.to_metadata(KIND), spec))
            .await
            .context("error creating role")?;
        let uuid = created_uuid(response.uuid(), KIND)?;
        info!(id = %uuid, "created nutanix_role");

        await_task(
            clients,
            response.task_uuid(),
            timeouts.create,
            &format!("role ({}) to create", uuid),
        )
        .await?;

        let role = v3
            .get_role(&uuid)
            .await
            .with_context(|| format!("error reading role {}", uuid))?;
        Ok(flatten_role(&role))
    }

    async fn read(&self, clients: &Clients, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let id = resource_id(state)?;
        let role = found(clients.v3()?.get_role(&id).await)
            .with_context(|| format!("error reading role {}", id))?;
        Ok(role.as_ref().map(flatten_role))
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
            .get_role(&id)
            .await
            .with_context(|| format!("error reading role {}", id))?;
        let config: RoleConfig = planned.to_typed()?;
        let (meta, spec) = config.expand(existing.spec.clone().unwrap_or_default());
        let metadata =
            meta.apply(existing.metadata.clone().unwrap_or_else(|| Metadata::kind(KIND)));

        info!(id = %id, "updating nutanix_role");
        let response = v3
            .update_role(&id, &RoleIntentInput::new(metadata, spec))
            .await
            .with_context(|| format!("error updating role {}", id))?;
        await_task(
            clients,
            response.task_uuid(),
            timeouts.update,
            &format!("role ({}) to update", id),
        )
        .await?;

        let role = v3
            .get_role(&id)
            .await
            .with_context(|| format!("error reading role {}", id))?;
        Ok(flatten_role(&role))
    }

    async fn delete(&self, clients: &Clients, state: &DynamicValue) -> Result<()> {
        let id = resource_id(state)?;
        let timeouts = task_timeouts(clients, DEFAULT_TIMEOUTS, state)?;

        info!(id = %id, "deleting nutanix_role");
        let Some(response) = found(clients.v3()?.delete_role(&id).await)
            .with_context(|| format!("error while deleting role {}", id))?
        else {
            return Ok(());
        };
        await_delete_task(
            clients,
            response.task_uuid(),
            timeouts.delete,
            &format!("role ({}) to delete", id),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::common::testing::prism_clients;
    use crate::state::{list_value, string_value};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ROLE_UUID: &str = "0b6b4a4e-7ab3-4c4c-9a5e-52d1b2bb2c11";

    #[test]
    fn flattened_state_expands_back_to_the_same_spec() {
        let role: RoleIntentResponse = serde_json::from_value(json!({
            "metadata": {"kind": "role", "uuid": ROLE_UUID},
            "spec": {
                "name": "vm-viewer",
                "description": "read only",
                "resources": {
                    "permission_reference_list": [
                        {"kind": "permission", "uuid": "perm-1", "name": "View_VM"}
                    ]
                }
            },
            "status": {
                "name": "vm-viewer",
                "description": "read only",
                "resources": {
                    "permission_reference_list": [
                        {"kind": "permission", "uuid": "perm-1", "name": "View_VM"}
                    ]
                }
            }
        }))
        .unwrap();
        let state = RoleResource.schema().block.conform(&flatten_role(&role));

        let config: RoleConfig = state.to_typed().unwrap();
        let (_, expanded) = config.expand(Role::default());

        assert_eq!(expanded, role.spec.unwrap());
    }

    #[tokio::test]
    async fn create_sends_permissions_with_kind() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/nutanix/v3/roles"))
            .and(body_partial_json(json!({
                "metadata": {"kind": "role"},
                "spec": {
                    "name": "vm-viewer",
                    "resources": {
                        "permission_reference_list": [{"kind": "permission", "uuid": "perm-1"}]
                    }
                }
            })))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "metadata": {"kind": "role", "uuid": ROLE_UUID},
                "status": {"execution_context": {"task_uuid": ["task-r"]}}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/nutanix/v3/tasks/task-r"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "SUCCEEDED"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/api/nutanix/v3/roles/{}", ROLE_UUID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "metadata": {"kind": "role", "uuid": ROLE_UUID},
                "status": {
                    "name": "vm-viewer",
                    "state": "COMPLETE",
                    "resources": {
                        "permission_reference_list": [
                            {"kind": "permission", "uuid": "perm-1", "name": "View_VM"}
                        ]
                    }
                }
            })))
            .mount(&server)
            .await;
        let clients = prism_clients(&server.uri());
        let planned = make_state(vec![
            ("name", string_value("vm-viewer")),
            (
                "permission_reference_list",
                list_value(vec![make_state(vec![("uuid", string_value("perm-1"))])]),
            ),
        ]);

        // Act
        let state = RoleResource.create(&clients, &planned).await.unwrap();

        // Assert
        assert_eq!(state.get("id"), Some(&string_value(ROLE_UUID)));
        let permissions = state.get("permission_reference_list").unwrap().as_list().unwrap();
        assert_eq!(permissions[0].get("name"), Some(&string_value("View_VM")));
    }
}
