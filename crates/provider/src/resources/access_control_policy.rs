//! `nutanix_access_control_policy`
//!
//! Binds a role to users and groups. The scope of the binding is a list of
//! context filters which the API carries as free-form JSON under
//! `filter_list`; it is modelled here as nested blocks.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use nutanix_client::v3::structs::{
    AccessControlPolicy, AccessControlPolicyIntentInput, AccessControlPolicyIntentResponse,
    AccessControlPolicyResources, Metadata,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::common::{
    await_delete_task, await_task, created_uuid, expand_reference, expand_reference_list,
    flatten_metadata_fields, flatten_reference, flatten_reference_list, metadata_attributes,
    reference_list_block, MetadataArgs, ReferenceMap,
};
use super::{found, resource_id, task_timeouts, Resource};
use crate::client::Clients;
use crate::schema::{id_attribute, AttrType, Attribute, Block, NestedBlock, Schema};
use crate::state::{
    list_value, make_state, opt_string, opt_string_list, string_list, string_value, DynamicValue,
};
use crate::timeouts::Timeouts;

const KIND: &str = "access_control_policy";
const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(60);

pub struct AccessControlPolicyResource;

// Wire shape of `filter_list`.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct FilterList {
    #[serde(default)]
    context_list: Vec<ContextFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ContextFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    scope_filter_expression_list: Vec<ScopeFilter>,
    #[serde(default)]
    entity_filter_expression_list: Vec<EntityFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ScopeFilter {
    operator: String,
    left_hand_side: String,
    right_hand_side: RightHandSide,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct EntityFilter {
    operator: String,
    left_hand_side: EntityType,
    right_hand_side: RightHandSide,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct EntityType {
    entity_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct RightHandSide {
    #[serde(skip_serializing_if = "Option::is_none")]
    collection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    categories: Option<BTreeMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uuid_list: Option<Vec<String>>,
}

// Terraform shape.

#[derive(Debug, Default, Deserialize)]
struct AcpConfig {
    name: String,
    description: Option<String>,
    #[serde(flatten)]
    meta: MetadataArgs,
    role_reference: ReferenceMap,
    #[serde(default)]
    user_reference_list: Vec<ReferenceMap>,
    #[serde(default)]
    user_group_reference_list: Vec<ReferenceMap>,
    #[serde(default)]
    context_filter_list: Vec<ContextConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct ContextConfig {
    #[serde(default)]
    scope_filter_expression_list: Vec<ScopeConfig>,
    #[serde(default)]
    entity_filter_expression_list: Vec<EntityConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct ScopeConfig {
    operator: String,
    left_hand_side: String,
    #[serde(default)]
    right_hand_side: Vec<RhsConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct EntityConfig {
    operator: String,
    left_hand_side_entity_type: String,
    #[serde(default)]
    right_hand_side: Vec<RhsConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct RhsConfig {
    collection: Option<String>,
    #[serde(default)]
    categories: Vec<CategoryFilter>,
    uuid_list: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct CategoryFilter {
    name: String,
    #[serde(default)]
    value: Vec<String>,
}

impl RhsConfig {
    fn expand(rhs: Vec<RhsConfig>) -> RightHandSide {
        let Some(rhs) = rhs.into_iter().next() else {
            return RightHandSide::default();
        };
        let categories: BTreeMap<String, Vec<String>> =
            rhs.categories.into_iter().map(|c| (c.name, c.value)).collect();
        RightHandSide {
            collection: rhs.collection,
            categories: (!categories.is_empty()).then_some(categories),
            uuid_list: rhs.uuid_list.filter(|l| !l.is_empty()),
        }
    }
}

impl AcpConfig {
    fn expand(self, mut base: AccessControlPolicy) -> Result<(MetadataArgs, AccessControlPolicy)> {
        let filters = FilterList {
            context_list: self
                .context_filter_list
                .into_iter()
                .map(|c| ContextFilter {
                    scope_filter_expression_list: c
                        .scope_filter_expression_list
                        .into_iter()
                        .map(|s| ScopeFilter {
                            operator: s.operator,
                            left_hand_side: s.left_hand_side,
                            right_hand_side: RhsConfig::expand(s.right_hand_side),
                        })
                        .collect(),
                    entity_filter_expression_list: c
                        .entity_filter_expression_list
                        .into_iter()
                        .map(|e| EntityFilter {
                            operator: e.operator,
                            left_hand_side: EntityType {
                                entity_type: e.left_hand_side_entity_type,
                            },
                            right_hand_side: RhsConfig::expand(e.right_hand_side),
                        })
                        .collect(),
                })
                .collect(),
        };

        let mut resources = base.resources.take().unwrap_or_default();
        resources.role_reference = expand_reference(&self.role_reference).map(|mut r| {
            r.kind.get_or_insert_with(|| "role".to_string());
            r
        });
        resources.user_reference_list = expand_reference_list(&self.user_reference_list, "user");
        resources.user_group_reference_list =
            expand_reference_list(&self.user_group_reference_list, "user_group");
        if !filters.context_list.is_empty() {
            resources.filter_list =
                Some(serde_json::to_value(&filters).context("failed to encode filter_list")?);
        }

        base.name = Some(self.name);
        base.description = self.description.or(base.description);
        base.resources = Some(resources);
        Ok((self.meta, base))
    }
}

fn flatten_rhs(rhs: &RightHandSide) -> DynamicValue {
    let categories = rhs
        .categories
        .iter()
        .flatten()
        .map(|(name, values)| {
            make_state(vec![("name", string_value(name)), ("value", string_list(values))])
        })
        .collect();
    list_value(vec![make_state(vec![
        ("collection", opt_string(rhs.collection.as_deref())),
        ("categories", list_value(categories)),
        ("uuid_list", opt_string_list(rhs.uuid_list.as_deref())),
    ])])
}

fn flatten_filters(filter_list: Option<&serde_json::Value>) -> DynamicValue {
    let filters: FilterList = filter_list
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    list_value(
        filters
            .context_list
            .iter()
            .map(|c| {
                let scopes = c
                    .scope_filter_expression_list
                    .iter()
                    .map(|s| {
                        make_state(vec![
                            ("operator", string_value(&s.operator)),
                            ("left_hand_side", string_value(&s.left_hand_side)),
                            ("right_hand_side", flatten_rhs(&s.right_hand_side)),
                        ])
                    })
                    .collect();
                let entities = c
                    .entity_filter_expression_list
                    .iter()
                    .map(|e| {
                        make_state(vec![
                            ("operator", string_value(&e.operator)),
                            (
                                "left_hand_side_entity_type",
                                string_value(&e.left_hand_side.entity_type),
                            ),
                            ("right_hand_side", flatten_rhs(&e.right_hand_side)),
                        ])
                    })
                    .collect();
                make_state(vec![
                    ("scope_filter_expression_list", list_value(scopes)),
                    ("entity_filter_expression_list", list_value(entities)),
                ])
            })
            .collect(),
    )
}

pub(crate) fn flatten_acp(acp: &AccessControlPolicyIntentResponse) -> DynamicValue {
    let metadata = acp.metadata.clone().unwrap_or_default();
    let status = acp.status.as_ref();
    let spec = acp.spec.as_ref();
    let default = AccessControlPolicyResources::default();
    let res = status
        .and_then(|s| s.resources.as_ref())
        .or_else(|| spec.and_then(|s| s.resources.as_ref()))
        .unwrap_or(&default);

    let mut attrs = vec![
        ("id", opt_string(metadata.uuid.as_deref())),
        ("api_version", opt_string(acp.api_version.as_deref())),
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
        ("role_reference", flatten_reference(res.role_reference.as_ref())),
        ("user_reference_list", flatten_reference_list(res.user_reference_list.as_ref())),
        (
            "user_group_reference_list",
            flatten_reference_list(res.user_group_reference_list.as_ref()),
        ),
        ("context_filter_list", flatten_filters(res.filter_list.as_ref())),
    ];
    attrs.extend(flatten_metadata_fields(&metadata));
    make_state(attrs)
}

fn right_hand_side_block() -> NestedBlock {
    NestedBlock::list(
        "right_hand_side",
        Block::new(vec![
            Attribute::optional("collection", AttrType::String).one_of(&["ALL", "SELF_OWNED"]),
            Attribute::optional("uuid_list", AttrType::string_list()),
        ])
        .with_blocks(vec![NestedBlock::list(
            "categories",
            Block::new(vec![
                Attribute::required("name", AttrType::String),
                Attribute::required("value", AttrType::string_list()),
            ]),
        )]),
    )
    .min_items(1)
    .max_items(1)
}

#[async_trait::async_trait]
impl Resource for AccessControlPolicyResource {
    fn type_name(&self) -> &'static str {
        "nutanix_access_control_policy"
    }

    fn schema(&self) -> Schema {
        let mut attrs = vec![
            id_attribute(),
            Attribute::computed("api_version", AttrType::String),
            Attribute::required("name", AttrType::String),
            Attribute::optional_computed("description", AttrType::String),
            Attribute::computed("state", AttrType::String),
            Attribute::required("role_reference", AttrType::string_map()),
        ];
        attrs.extend(metadata_attributes());

        let context_filter = Block::new(vec![]).with_blocks(vec![
            NestedBlock::list(
                "scope_filter_expression_list",
                Block::new(vec![
                    Attribute::required("operator", AttrType::String),
                    Attribute::required("left_hand_side", AttrType::String)
                        .one_of(&["PROJECT", "CLUSTER", "CATEGORY"]),
                ])
                .with_blocks(vec![right_hand_side_block()]),
            ),
            NestedBlock::list(
                "entity_filter_expression_list",
                Block::new(vec![
                    Attribute::required("operator", AttrType::String),
                    Attribute::required("left_hand_side_entity_type", AttrType::String),
                ])
                .with_blocks(vec![right_hand_side_block()]),
            )
            .min_items(1),
        ]);

        Schema::new(Block::new(attrs).with_blocks(vec![
            reference_list_block("user_reference_list"),
            reference_list_block("user_group_reference_list"),
            NestedBlock::list("context_filter_list", context_filter),
            Timeouts::block(),
        ]))
    }

    async fn create(&self, clients: &Clients, planned: &DynamicValue) -> Result<DynamicValue> {
        let timeouts = task_timeouts(clients, DEFAULT_TIMEOUTS, planned)?;
        let config: AcpConfig = planned.to_typed()?;
        let (meta, spec) = config.expand(AccessControlPolicy::default())?;

        let v3 = clients.v3()?;
        let input = AccessControlPolicyIntentInput::new(meta.to_metadata(KIND), spec);
        let response = v3
            .create_access_control_policy(&input)
            .await
            .context("error creating access control policy")?;
        let uuid = created_uuid(response.uuid(), KIND)?;
        info!(id = %uuid, "created nutanix_access_control_policy");

        await_task(
            clients,
            response.task_uuid(),
            timeouts.create,
            &format!("access control policy ({}) to create", uuid),
        )
        .await?;

        let acp = v3
            .get_access_control_policy(&uuid)
            .await
            .with_context(|| format!("error reading access control policy {}", uuid))?;
        Ok(flatten_acp(&acp))
    }

    async fn read(&self, clients: &Clients, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let id = resource_id(state)?;
        let acp = found(clients.v3()?.get_access_control_policy(&id).await)
            .with_context(|| format!("error reading access control policy {}", id))?;
        Ok(acp.as_ref().map(flatten_acp))
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
            .get_access_control_policy(&id)
            .await
            .with_context(|| format!("error reading access control policy {}", id))?;
        let config: AcpConfig = planned.to_typed()?;
        let (meta, spec) = config.expand(existing.spec.clone().unwrap_or_default())?;
        let metadata =
            meta.apply(existing.metadata.clone().unwrap_or_else(|| Metadata::kind(KIND)));

        info!(id = %id, "updating nutanix_access_control_policy");
        let response = v3
            .update_access_control_policy(&id, &AccessControlPolicyIntentInput::new(metadata, spec))
            .await
            .with_context(|| format!("error updating access control policy {}", id))?;
        await_task(
            clients,
            response.task_uuid(),
            timeouts.update,
            &format!("access control policy ({}) to update", id),
        )
        .await?;

        let acp = v3
            .get_access_control_policy(&id)
            .await
            .with_context(|| format!("error reading access control policy {}", id))?;
        Ok(flatten_acp(&acp))
    }

    async fn delete(&self, clients: &Clients, state: &DynamicValue) -> Result<()> {
        let id = resource_id(state)?;
        let timeouts = task_timeouts(clients, DEFAULT_TIMEOUTS, state)?;

        info!(id = %id, "deleting nutanix_access_control_policy");
        let Some(response) = found(clients.v3()?.delete_access_control_policy(&id).await)
            .with_context(|| format!("error while deleting access control policy {}", id))?
        else {
            return Ok(());
        };
        await_delete_task(
            clients,
            response.task_uuid(),
            timeouts.delete,
            &format!("access control policy ({}) to delete", id),
        )
        .await
    }
}
