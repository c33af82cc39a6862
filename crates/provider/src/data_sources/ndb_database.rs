//! `nutanix_ndb_database` data source

use anyhow::{Context, Result};

use super::{required_string, DataSource};
use crate::client::Clients;
use crate::resources::ndb_database::{flatten_database, NdbDatabaseResource};
use crate::resources::Resource;
use crate::schema::{AttrType, Attribute, Block, Schema};
use crate::state::{string_value, DynamicValue};

/// Resource attributes an NDB database read fills in.
const READ_FIELDS: &[&str] = &[
    "id",
    "database_instance_id",
    "name",
    "description",
    "properties",
    "tags",
    "date_created",
    "date_modified",
    "clone",
    "clustered",
    "database_name",
    "type",
    "status",
    "time_machine_id",
    "time_zone",
];

pub struct NdbDatabaseDataSource;

#[async_trait::async_trait]
impl DataSource for NdbDatabaseDataSource {
    fn type_name(&self) -> &'static str {
        "nutanix_ndb_database"
    }

    fn schema(&self) -> Schema {
        let mut attrs = vec![Attribute::required("database_id", AttrType::String)];
        attrs.extend(
            NdbDatabaseResource
                .schema()
                .block
                .computed_attributes(&[])
                .into_iter()
                .filter(|a| READ_FIELDS.contains(&a.name)),
        );
        Schema::new(Block::new(attrs))
    }

    async fn read(&self, clients: &Clients, config: &DynamicValue) -> Result<DynamicValue> {
        let database_id = required_string(config, "database_id")?;
        let db = clients
            .era()?
            .get_database(&database_id)
            .await
            .with_context(|| format!("error reading database {}", database_id))?;

        let mut state = flatten_database(&db);
        state.set("database_id", string_value(database_id));
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::common::testing::ndb_clients;
    use crate::state::make_state;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn reads_database_by_id() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/era/v0.9/databases/db-1"))
            .and(query_param("detailed", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "db-1",
                "name": "orders",
                "type": "postgres_database",
                "status": "READY",
                "timeMachineId": "tm-1",
                "properties": [{"name": "listener_port", "value": "5432"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        let clients = ndb_clients(&server.uri());
        let config = make_state(vec![("database_id", string_value("db-1"))]);

        // Act
        let state = NdbDatabaseDataSource.read(&clients, &config).await.unwrap();

        // Assert
        assert_eq!(state.get("type"), Some(&string_value("postgres_database")));
        assert_eq!(state.get("time_machine_id"), Some(&string_value("tm-1")));
        assert_eq!(state.get("database_id"), Some(&string_value("db-1")));
    }

    #[test]
    fn schema_leaves_out_provisioning_inputs() {
        let schema = NdbDatabaseDataSource.schema();

        assert!(schema.block.attribute("vm_password").is_none());
        assert!(schema.block.attribute("tags").is_some());
        assert!(schema.block.attribute("time_zone").unwrap().computed);
    }
}
