//! Data Source Implementations
//!
//! Read-only lookups. Most data sources expose every attribute of the
//! matching resource as computed, next to the arguments used to find the
//! entity.

pub mod category;
pub mod cluster;
pub mod image;
pub mod karbon;
pub mod ndb_database;
pub mod project;
pub mod role;
pub mod subnet;
pub mod virtual_machine;
pub mod volume_group;

use anyhow::{bail, Result};
use nutanix_client::v3::structs::{DefStatus, EntitySpec, IntentResponse};

use crate::client::Clients;
use crate::schema::{AttrType, Attribute, Block, Schema};
use crate::state::DynamicValue;

#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// Looks the entity up and returns the full state.
    async fn read(&self, clients: &Clients, config: &DynamicValue) -> Result<DynamicValue>;
}

/// Every data source the provider serves.
pub fn all() -> Vec<Box<dyn DataSource>> {
    vec![
        Box::new(virtual_machine::VirtualMachineDataSource),
        Box::new(subnet::SubnetDataSource),
        Box::new(subnet::SubnetsDataSource),
        Box::new(image::ImageDataSource),
        Box::new(cluster::ClusterDataSource),
        Box::new(cluster::ClustersDataSource),
        Box::new(category::CategoryKeyDataSource),
        Box::new(project::ProjectDataSource),
        Box::new(role::RoleDataSource),
        Box::new(karbon::KubeconfigDataSource),
        Box::new(karbon::SshDataSource),
        Box::new(volume_group::VolumeGroupDataSource),
        Box::new(ndb_database::NdbDatabaseDataSource),
    ]
}

pub fn find(type_name: &str) -> Option<Box<dyn DataSource>> {
    all().into_iter().find(|d| d.type_name() == type_name)
}

/// `lookup` arguments followed by the attributes of `resource`, read-only.
pub fn lookup_schema(lookup: Vec<Attribute>, resource: &Schema) -> Schema {
    let skip: Vec<&str> = lookup.iter().map(|a| a.name).collect();
    let mut attrs = lookup;
    attrs.extend(resource.block.computed_attributes(&skip));
    Schema::new(Block::new(attrs))
}

/// Element type of an `entities` list holding states of `resource`.
pub fn entity_type(resource: &Schema) -> AttrType {
    Block::new(resource.block.computed_attributes(&[])).object_type()
}

/// How the configuration identifies the entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Id(String),
    Name(String),
}

fn configured(config: &DynamicValue, key: &str) -> Option<String> {
    config
        .get(key)
        .and_then(DynamicValue::as_string)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A required string argument.
pub fn required_string(config: &DynamicValue, key: &str) -> Result<String> {
    match configured(config, key) {
        Some(value) => Ok(value),
        None => bail!("please provide the required attribute {}", key),
    }
}

/// Exactly one of `id_key` and `name_key` must be set.
pub fn lookup_by(config: &DynamicValue, id_key: &str, name_key: &str) -> Result<Lookup> {
    match (configured(config, id_key), configured(config, name_key)) {
        (Some(_), Some(_)) => bail!("only one of {} or {} may be set", id_key, name_key),
        (Some(id), None) => Ok(Lookup::Id(id)),
        (None, Some(name)) => Ok(Lookup::Name(name)),
        (None, None) => bail!("please provide one of {} or {} attributes", id_key, name_key),
    }
}

/// Observed name of an intent entity, falling back to the requested one.
pub fn entity_name<R>(entity: &IntentResponse<EntitySpec<R>, DefStatus<R>>) -> Option<&str> {
    entity
        .status
        .as_ref()
        .and_then(|s| s.name.as_deref())
        .or_else(|| entity.spec.as_ref().and_then(|s| s.name.as_deref()))
}

/// The one entity called `name` among `entities`.
pub fn single_named<R>(
    entities: Vec<IntentResponse<EntitySpec<R>, DefStatus<R>>>,
    name: &str,
    kind: &str,
    id_key: &str,
) -> Result<IntentResponse<EntitySpec<R>, DefStatus<R>>> {
    let mut matches: Vec<_> = entities
        .into_iter()
        .filter(|e| entity_name(e) == Some(name))
        .collect();
    match matches.len() {
        0 => bail!("{} with the given name, not found", kind),
        1 => Ok(matches.remove(0)),
        _ => bail!(
            "your query returned more than one result. Please use {} argument instead",
            id_key
        ),
    }
}

/// FIQL filter on the entity name.
pub fn name_filter(name: &str) -> String {
    format!("name=={}", name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{make_state, string_value};
    use nutanix_client::v3::structs::SubnetIntentResponse;
    use serde_json::json;

    fn subnet(name: &str, uuid: &str) -> SubnetIntentResponse {
        serde_json::from_value(json!({
            "metadata": {"kind": "subnet", "uuid": uuid},
            "status": {"name": name}
        }))
        .unwrap()
    }

    #[test]
    fn type_names_are_unique() {
        let names: Vec<&str> = all().iter().map(|d| d.type_name()).collect();
        let mut deduped = names.clone();
        deduped.sort();
        deduped.dedup();

        assert_eq!(names.len(), deduped.len());
        assert!(names.iter().all(|n| n.starts_with("nutanix_")));
    }

    #[test]
    fn lookup_schemas_never_require_computed_fields() {
        for data_source in all() {
            let schema = data_source.schema();
            for attr in &schema.block.attributes {
                assert!(
                    !(attr.required && attr.computed),
                    "{}.{} is both required and computed",
                    data_source.type_name(),
                    attr.name
                );
            }
        }
    }

    #[test]
    fn lookup_by_wants_exactly_one_key() {
        let by_id = make_state(vec![("subnet_id", string_value("abc"))]);
        let by_name = make_state(vec![("subnet_name", string_value("vlan0"))]);
        let both = make_state(vec![
            ("subnet_id", string_value("abc")),
            ("subnet_name", string_value("vlan0")),
        ]);

        assert_eq!(
            lookup_by(&by_id, "subnet_id", "subnet_name").unwrap(),
            Lookup::Id("abc".into())
        );
        assert_eq!(
            lookup_by(&by_name, "subnet_id", "subnet_name").unwrap(),
            Lookup::Name("vlan0".into())
        );
        assert!(lookup_by(&both, "subnet_id", "subnet_name").is_err());
        assert_eq!(
            lookup_by(&make_state(vec![]), "subnet_id", "subnet_name")
                .unwrap_err()
                .to_string(),
            "please provide one of subnet_id or subnet_name attributes"
        );
    }

    #[test]
    fn single_named_rejects_ambiguous_names() {
        let entities = vec![subnet("vlan0", "a"), subnet("vlan0", "b"), subnet("vlan1", "c")];

        let err = single_named(entities.clone(), "vlan0", "subnet", "subnet_id").unwrap_err();
        let hit = single_named(entities.clone(), "vlan1", "subnet", "subnet_id").unwrap();
        let miss = single_named(entities, "vlan9", "subnet", "subnet_id").unwrap_err();

        assert!(err.to_string().contains("subnet_id"));
        assert_eq!(hit.uuid(), Some("c"));
        assert_eq!(miss.to_string(), "subnet with the given name, not found");
    }
}
