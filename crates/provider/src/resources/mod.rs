//! Resource Implementations
//!
//! Implements the CRUD operations for each resource type. The provider
//! looks resources up by type name and drives them through [`Resource`].

pub mod access_control_policy;
pub mod category;
pub mod common;
pub mod image;
pub mod karbon_cluster;
pub mod ndb_database;
pub mod project;
pub mod role;
pub mod subnet;
pub mod virtual_machine;
pub mod volume_group;

use anyhow::{bail, Result};

use crate::client::Clients;
use crate::schema::Schema;
use crate::state::DynamicValue;
use crate::timeouts::Timeouts;

/// Trait for resource operations
#[async_trait::async_trait]
pub trait Resource: Send + Sync {
    /// Resource type name
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// Cross-field checks beyond what the schema expresses.
    fn validate(&self, _config: &DynamicValue) -> Result<()> {
        Ok(())
    }

    /// Create a new resource from the planned state
    async fn create(&self, clients: &Clients, planned: &DynamicValue) -> Result<DynamicValue>;

    /// Read an existing resource. `None` means it is gone.
    async fn read(&self, clients: &Clients, state: &DynamicValue) -> Result<Option<DynamicValue>>;

    /// Update an existing resource
    async fn update(
        &self,
        clients: &Clients,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue>;

    /// Delete a resource
    async fn delete(&self, clients: &Clients, state: &DynamicValue) -> Result<()>;
}

/// Every resource the provider serves.
pub fn all() -> Vec<Box<dyn Resource>> {
    vec![
        Box::new(virtual_machine::VirtualMachineResource),
        Box::new(subnet::SubnetResource),
        Box::new(image::ImageResource),
        Box::new(category::CategoryKeyResource),
        Box::new(category::CategoryValueResource),
        Box::new(project::ProjectResource),
        Box::new(role::RoleResource),
        Box::new(access_control_policy::AccessControlPolicyResource),
        Box::new(karbon_cluster::KarbonClusterResource),
        Box::new(volume_group::VolumeGroupResource),
        Box::new(ndb_database::NdbDatabaseResource),
    ]
}

pub fn find(type_name: &str) -> Option<Box<dyn Resource>> {
    all().into_iter().find(|r| r.type_name() == type_name)
}

/// The `id` recorded in state.
pub fn resource_id(state: &DynamicValue) -> Result<String> {
    match state.get("id").and_then(DynamicValue::as_string) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => bail!("resource state carries no id"),
    }
}

/// Wait budgets for an API whose waits honour the provider `wait_timeout`:
/// the resource's `timeouts` block wins, then `wait_timeout`, then defaults.
pub fn task_timeouts(
    clients: &Clients,
    defaults: Timeouts,
    config: &DynamicValue,
) -> Result<Timeouts> {
    clients.wait_timeouts(defaults).from_config(config)
}

/// Maps a not-found response to `None`.
pub fn found<T>(result: nutanix_client::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::resources::common::testing::prism_clients;
    use crate::state::{make_state, string_value};

    #[test]
    fn type_names_are_unique_and_prefixed() {
        let names: Vec<&str> = all().iter().map(|r| r.type_name()).collect();
        let mut deduped = names.clone();
        deduped.sort();
        deduped.dedup();

        assert_eq!(names.len(), deduped.len());
        assert!(names.iter().all(|n| n.starts_with("nutanix_")));
    }

    #[test]
    fn every_schema_has_an_id() {
        for resource in all() {
            let schema = resource.schema();
            assert!(
                schema.block.attribute("id").is_some(),
                "{} lacks id",
                resource.type_name()
            );
        }
    }

    #[test]
    fn resource_id_requires_value() {
        assert_eq!(
            resource_id(&make_state(vec![("id", string_value("abc"))])).unwrap(),
            "abc"
        );
        assert!(resource_id(&make_state(vec![("id", string_value(""))])).is_err());
        assert!(resource_id(&make_state(vec![])).is_err());
    }

    #[test]
    fn timeouts_block_beats_wait_timeout() {
        let mut clients = prism_clients("http://127.0.0.1:1");
        clients.wait_timeout = Some(Duration::from_secs(120));
        let config = make_state(vec![(
            "timeouts",
            make_state(vec![("delete", string_value("30s"))]),
        )]);

        let timeouts = task_timeouts(&clients, Timeouts::minutes(10), &config).unwrap();

        assert_eq!(timeouts.create, Duration::from_secs(120));
        assert_eq!(timeouts.update, Duration::from_secs(120));
        assert_eq!(timeouts.delete, Duration::from_secs(30));
    }

    #[test]
    fn not_found_reads_as_none() {
        let gone: nutanix_client::Result<()> = Err(nutanix_client::Error::Api {
            status: 404,
            message: "ENTITY_NOT_FOUND".to_string(),
        });
        let broken: nutanix_client::Result<()> = Err(nutanix_client::Error::Api {
            status: 500,
            message: "boom".to_string(),
        });

        assert!(found(gone).unwrap().is_none());
        assert!(found(broken).is_err());
    }
}
