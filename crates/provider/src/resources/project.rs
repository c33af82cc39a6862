//! `nutanix_project`

use anyhow::{Context, Result};
use nutanix_client::v3::structs::{
    ExternalNetwork, Metadata, Project, ProjectIntentInput, ProjectIntentResponse, ProjectResources,
    ResourceDomain, ResourceDomainResource,
};
use serde::Deserialize;
use tracing::info;

use super::common::{
    await_delete_task, await_task, created_uuid, expand_reference, expand_reference_list,
    flatten_metadata_fields, flatten_reference, flatten_reference_list, metadata_attributes,
    reference_attribute, reference_list_block, MetadataArgs, ReferenceMap,
};
use super::{found, resource_id, task_timeouts, Resource};
use crate::client::Clients;
use crate::schema::{id_attribute, AttrType, Attribute, Block, NestedBlock, Schema};
use crate::state::{list_value, make_state, opt_bool, opt_int, opt_string, DynamicValue};
use crate::timeouts::Timeouts;

const KIND: &str = "project";
const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(60);

pub struct ProjectResource;

#[derive(Debug, Default, Deserialize)]
struct ProjectConfig {
    name: String,
    description: Option<String>,
    #[serde(flatten)]
    meta: MetadataArgs,
    #[serde(default)]
    resource_domain: Vec<ResourceLimit>,
    default_subnet_reference: Option<ReferenceMap>,
    default_environment_reference: Option<ReferenceMap>,
    #[serde(default)]
    account_reference_list: Vec<ReferenceMap>,
    #[serde(default)]
    cluster_reference_list: Vec<ReferenceMap>,
    #[serde(default)]
    environment_reference_list: Vec<ReferenceMap>,
    #[serde(default)]
    subnet_reference_list: Vec<ReferenceMap>,
    #[serde(default)]
    user_reference_list: Vec<ReferenceMap>,
    #[serde(default)]
    external_user_group_reference_list: Vec<ReferenceMap>,
    #[serde(default)]
    vpc_reference_list: Vec<ReferenceMap>,
    #[serde(default)]
    external_network_list: Vec<NetworkConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct ResourceLimit {
    resource_type: String,
    limit: i64,
    units: Option<String>,
    value: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct NetworkConfig {
    uuid: String,
    name: Option<String>,
}

impl ProjectConfig {
    fn expand(self, mut base: Project) -> (MetadataArgs, Project) {
        let mut resources = base.resources.take().unwrap_or_default();

        if !self.resource_domain.is_empty() {
            resources.resource_domain = Some(ResourceDomain {
                resources: Some(
                    self.resource_domain
                        .into_iter()
                        .map(|r| ResourceDomainResource {
                            limit: Some(r.limit),
                            resource_type: Some(r.resource_type),
                            units: r.units,
                            value: r.value,
                        })
                        .collect(),
                ),
            });
        }
        if let Some(r) = self.default_subnet_reference.as_ref().and_then(expand_reference) {
            resources.default_subnet_reference = Some(r);
        }
        if let Some(r) = self.default_environment_reference.as_ref().and_then(expand_reference) {
            resources.default_environment_reference = Some(r);
        }

        let lists = [
            (&mut resources.account_reference_list, &self.account_reference_list, "account"),
            (&mut resources.cluster_reference_list, &self.cluster_reference_list, "cluster"),
            (
                &mut resources.environment_reference_list,
                &self.environment_reference_list,
                "environment",
            ),
            (&mut resources.subnet_reference_list, &self.subnet_reference_list, "subnet"),
            (&mut resources.user_reference_list, &self.user_reference_list, "user"),
            (
                &mut resources.external_user_group_reference_list,
                &self.external_user_group_reference_list,
                "user_group",
            ),
            (&mut resources.vpc_reference_list, &self.vpc_reference_list, "vpc"),
        ];
        for (target, items, kind) in lists {
            if let Some(refs) = expand_reference_list(items, kind) {
                *target = Some(refs);
            }
        }
        if !self.external_network_list.is_empty() {
            resources.external_network_list = Some(
                self.external_network_list
                    .into_iter()
                    .map(|n| ExternalNetwork {
                        name: n.name,
                        uuid: Some(n.uuid),
                    })
                    .collect(),
            );
        }

        base.name = Some(self.name);
        base.description = self.description.or(base.description);
        base.resources = Some(resources);
        (self.meta, base)
    }
}

pub(crate) fn flatten_project(project: &ProjectIntentResponse) -> DynamicValue {
    let metadata = project.metadata.clone().unwrap_or_default();
    let status = project.status.as_ref();
    let spec = project.spec.as_ref();
    let default = ProjectResources::default();
    let res = status
        .and_then(|s| s.resources.as_ref())
        .or_else(|| spec.and_then(|s| s.resources.as_ref()))
        .unwrap_or(&default);

    let limits = res
        .resource_domain
        .iter()
        .flat_map(|d| d.resources.iter().flatten())
        .map(|r| {
            make_state(vec![
                ("resource_type", opt_string(r.resource_type.as_deref())),
                ("limit", opt_int(r.limit)),
                ("units", opt_string(r.units.as_deref())),
                ("value", opt_int(r.value)),
            ])
        })
        .collect();
    let networks = res
        .external_network_list
        .iter()
        .flatten()
        .map(|n| {
            make_state(vec![
                ("uuid", opt_string(n.uuid.as_deref())),
                ("name", opt_string(n.name.as_deref())),
            ])
        })
        .collect();

    let mut attrs = vec![
        ("id", opt_string(metadata.uuid.as_deref())),
        ("api_version", opt_string(project.api_version.as_deref())),
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
        ("is_default", opt_bool(res.is_default)),
        ("resource_domain", list_value(limits)),
        ("default_subnet_reference", flatten_reference(res.default_subnet_reference.as_ref())),
        (
            "default_environment_reference",
            flatten_reference(res.default_environment_reference.as_ref()),
        ),
        ("account_reference_list", flatten_reference_list(res.account_reference_list.as_ref())),
        ("cluster_reference_list", flatten_reference_list(res.cluster_reference_list.as_ref())),
        (
            "environment_reference_list",
            flatten_reference_list(res.environment_reference_list.as_ref()),
        ),
        ("subnet_reference_list", flatten_reference_list(res.subnet_reference_list.as_ref())),
        ("user_reference_list", flatten_reference_list(res.user_reference_list.as_ref())),
        (
            "external_user_group_reference_list",
            flatten_reference_list(res.external_user_group_reference_list.as_ref()),
        ),
        ("vpc_reference_list", flatten_reference_list(res.vpc_reference_list.as_ref())),
        ("external_network_list", list_value(networks)),
    ];
    attrs.extend(flatten_metadata_fields(&metadata));
    make_state(attrs)
}

#[async_trait::async_trait]
impl Resource for ProjectResource {
    fn type_name(&self) -> &'static str {
        "nutanix_project"
    }

    fn schema(&self) -> Schema {
        let mut attrs = vec![
            id_attribute(),
            Attribute::computed("api_version", AttrType::String),
            Attribute::required("name", AttrType::String),
            Attribute::required("description", AttrType::String),
            Attribute::computed("state", AttrType::String),
            Attribute::computed("is_default", AttrType::Bool),
            reference_attribute("default_subnet_reference"),
            reference_attribute("default_environment_reference"),
        ];
        attrs.extend(metadata_attributes());
        Schema::new(
            Block::new(attrs).with_blocks(vec![
                NestedBlock::list(
                    "resource_domain",
                    Block::new(vec![
                        Attribute::required("resource_type", AttrType::String),
                        Attribute::required("limit", AttrType::Number),
                        Attribute::optional_computed("units", AttrType::String),
                        Attribute::optional_computed("value", AttrType::Number),
                    ]),
                ),
                reference_list_block("account_reference_list"),
                reference_list_block("cluster_reference_list"),
                reference_list_block("environment_reference_list"),
                reference_list_block("subnet_reference_list"),
                reference_list_block("user_reference_list"),
                reference_list_block("external_user_group_reference_list"),
                reference_list_block("vpc_reference_list"),
                NestedBlock::list(
                    "external_network_list",
                    Block::new(vec![
                        Attribute::required("uuid", AttrType::String),
                        Attribute::optional_computed("name", AttrType::String),
                    ]),
                ),
                Timeouts::block(),
            ]),
        )
    }

    async fn create(&self, clients: &Clients, planned: &DynamicValue) -> Result<DynamicValue> {
        let timeouts = task_timeouts(clients, DEFAULT_TIMEOUTS, planned)?;
        let config: ProjectConfig = planned.to_typed()?;
        let (meta, spec) = config.expand(Project::default());

        let v3 = clients.v3()?;
        let response = v3
            .create_project(&ProjectIntentInput::new(meta.to_metadata(KIND), spec))
            .await
            .context("error creating project")?;
        let uuid = created_uuid(response.uuid(), KIND)?;
        info!(id = %uuid, "created nutanix_project");

        await_task(
            clients,
            response.task_uuid(),
            timeouts.create,
            &format!("project ({}) to create", uuid),
        )
        .await?;

        let project = v3
            .get_project(&uuid)
            .await
            .with_context(|| format!("error reading project {}", uuid))?;
        Ok(flatten_project(&project))
    }

    async fn read(&self, clients: &Clients, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let id = resource_id(state)?;
        let project = found(clients.v3()?.get_project(&id).await)
            .with_context(|| format!("error reading project {}", id))?;
        Ok(project.as_ref().map(flatten_project))
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
            .get_project(&id)
            .await
            .with_context(|| format!("error reading project {}", id))?;
        let config: ProjectConfig = planned.to_typed()?;
        let (meta, spec) = config.expand(existing.spec.clone().unwrap_or_default());
        let metadata =
            meta.apply(existing.metadata.clone().unwrap_or_else(|| Metadata::kind(KIND)));

        info!(id = %id, "updating nutanix_project");
        let response = v3
            .update_project(&id, &ProjectIntentInput::new(metadata, spec))
            .await
            .with_context(|| format!("error updating project {}", id))?;
        await_task(
            clients,
            response.task_uuid(),
            timeouts.update,
            &format!("project ({}) to update", id),
        )
        .await?;

        let project = v3
            .get_project(&id)
            .await
            .with_context(|| format!("error reading project {}", id))?;
        Ok(flatten_project(&project))
    }

    async fn delete(&self, clients: &Clients, state: &DynamicValue) -> Result<()> {
        let id = resource_id(state)?;
        let timeouts = task_timeouts(clients, DEFAULT_TIMEOUTS, state)?;

        info!(id = %id, "deleting nutanix_project");
        let Some(response) = found(clients.v3()?.delete_project(&id).await)
            .with_context(|| format!("error while deleting project {}", id))?
        else {
            return Ok(());
        };
        await_delete_task(
            clients,
            response.task_uuid(),
            timeouts.delete,
            &format!("project ({}) to delete", id),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{int_value, string_value};
    use nutanix_client::v3::structs::Reference;

    fn planned() -> DynamicValue {
        ProjectResource.schema().block.conform(&make_state(vec![
            ("name", string_value("tf-project")),
            ("description", string_value("managed by terraform")),
            (
                "resource_domain",
                list_value(vec![make_state(vec![
                    ("resource_type", string_value("STORAGE")),
                    ("limit", int_value(4)),
                ])]),
            ),
            (
                "cluster_reference_list",
                list_value(vec![make_state(vec![("uuid", string_value("cluster-1"))])]),
            ),
            ("default_subnet_reference", make_state(vec![
                ("kind", string_value("subnet")),
                ("uuid", string_value("subnet-1")),
            ])),
        ]))
    }

    #[test]
    fn expand_fills_reference_kinds_and_limits() {
        let config: ProjectConfig = planned().to_typed().unwrap();

        let (_, spec) = config.expand(Project::default());

        let resources = spec.resources.unwrap();
        assert_eq!(
            resources.cluster_reference_list,
            Some(vec![Reference::new("cluster", "cluster-1")])
        );
        assert_eq!(resources.default_subnet_reference, Some(Reference::new("subnet", "subnet-1")));
        let limits = resources.resource_domain.unwrap().resources.unwrap();
        assert_eq!(limits[0].limit, Some(4));
        assert_eq!(limits[0].resource_type.as_deref(), Some("STORAGE"));
        assert!(resources.user_reference_list.is_none());
    }

    #[test]
    fn flattened_state_expands_back_to_the_same_spec() {
        let resources = serde_json::json!({
            "resource_domain": {
                "resources": [{"resource_type": "VCPUS", "limit": 8, "units": "COUNT"}]
            },
            "default_subnet_reference": {"kind": "subnet", "uuid": "s-1"},
            "subnet_reference_list": [{"kind": "subnet", "uuid": "s-1", "name": "vlan0"}],
            "user_reference_list": [{"kind": "user", "uuid": "u-1"}],
            "external_network_list": [{"uuid": "n-1", "name": "ext"}]
        });
        let project: ProjectIntentResponse = serde_json::from_value(serde_json::json!({
            "metadata": {"kind": "project", "uuid": "p-1", "spec_version": 0},
            "spec": {"name": "tf-project", "resources": resources.clone()},
            "status": {"name": "tf-project", "resources": resources}
        }))
        .unwrap();
        let state = ProjectResource.schema().block.conform(&flatten_project(&project));

        let config: ProjectConfig = state.to_typed().unwrap();
        let (_, expanded) = config.expand(Project::default());

        assert_eq!(expanded.resources, project.spec.unwrap().resources);
    }

    #[test]
    fn flatten_lists_references() {
        let project: ProjectIntentResponse = serde_json::from_value(serde_json::json!({
            "metadata": {"kind": "project", "uuid": "p-1"},
            "status": {
                "name": "tf-project",
                "resources": {
                    "is_default": false,
                    "subnet_reference_list": [{"kind": "subnet", "uuid": "s-1", "name": "vlan0"}],
                    "resource_domain": {
                        "resources": [{"resource_type": "VCPUS", "limit": 8, "units": "COUNT"}]
                    }
                }
            }
        }))
        .unwrap();

        let state = flatten_project(&project);

        let subnets = state.get("subnet_reference_list").unwrap().as_list().unwrap();
        assert_eq!(subnets[0].get("name"), Some(&string_value("vlan0")));
        let limits = state.get("resource_domain").unwrap().as_list().unwrap();
        assert_eq!(limits[0].get("units"), Some(&string_value("COUNT")));
        assert_eq!(state.get("id"), Some(&string_value("p-1")));
    }
}
