//! `nutanix_subnet` and `nutanix_subnets` data sources

use anyhow::{Context, Result};
use nutanix_client::http::filter_entities;
use nutanix_client::v3::structs::SubnetListIntentResponse;
use nutanix_client::AdditionalFilter;
use serde::Deserialize;
use tracing::debug;

use super::{entity_type, lookup_by, lookup_schema, name_filter, single_named, DataSource, Lookup};
use crate::client::Clients;
use crate::resources::subnet::{flatten_subnet, SubnetResource};
use crate::resources::Resource;
use crate::schema::{AttrType, Attribute, Block, NestedBlock, Schema};
use crate::state::{list_value, make_state, opt_string, string_list, string_value, DynamicValue};

/// Paths below which `additional_filter` names are resolved.
const FILTER_SEARCH_PATHS: &[&str] = &["spec", "spec.resources"];

pub struct SubnetDataSource;

pub struct SubnetsDataSource;

#[async_trait::async_trait]
impl DataSource for SubnetDataSource {
    fn type_name(&self) -> &'static str {
        "nutanix_subnet"
    }

    fn schema(&self) -> Schema {
        lookup_schema(
            vec![
                Attribute::optional("subnet_id", AttrType::String),
                Attribute::optional("subnet_name", AttrType::String),
            ],
            &SubnetResource.schema(),
        )
    }

    async fn read(&self, clients: &Clients, config: &DynamicValue) -> Result<DynamicValue> {
        let v3 = clients.v3()?;
        let subnet = match lookup_by(config, "subnet_id", "subnet_name")? {
            Lookup::Id(id) => v3
                .get_subnet(&id)
                .await
                .with_context(|| format!("error reading subnet {}", id))?,
            Lookup::Name(name) => {
                let list = v3
                    .list_all_subnet(Some(&name_filter(&name)))
                    .await
                    .with_context(|| format!("error listing subnets named {}", name))?;
                single_named(list.entities, &name, "subnet", "subnet_id")?
            }
        };

        let mut state = flatten_subnet(&subnet);
        let name = state.get("name").cloned().unwrap_or_default();
        state.set("subnet_id", opt_string(subnet.uuid()));
        state.set("subnet_name", name);
        Ok(state)
    }
}

#[derive(Debug, Default, Deserialize)]
struct SubnetsConfig {
    #[serde(default)]
    additional_filter: Vec<AdditionalFilter>,
}

#[async_trait::async_trait]
impl DataSource for SubnetsDataSource {
    fn type_name(&self) -> &'static str {
        "nutanix_subnets"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new(vec![
                Attribute::computed("api_version", AttrType::String),
                Attribute::computed(
                    "entities",
                    AttrType::list(entity_type(&SubnetResource.schema())),
                ),
            ])
            .with_blocks(vec![NestedBlock::list(
                "additional_filter",
                Block::new(vec![
                    Attribute::required("name", AttrType::String),
                    Attribute::required("values", AttrType::string_list()),
                ]),
            )]),
        )
    }

    async fn read(&self, clients: &Clients, config: &DynamicValue) -> Result<DynamicValue> {
        let config: SubnetsConfig = config.to_typed()?;
        let list = clients
            .v3()?
            .list_all_subnet(None)
            .await
            .context("error listing subnets")?;
        let total = list.entities.len();

        let body = filter_entities(
            serde_json::to_value(&list)?,
            &config.additional_filter,
            FILTER_SEARCH_PATHS,
        );
        let list: SubnetListIntentResponse = serde_json::from_value(body)?;
        debug!(total, kept = list.entities.len(), "filtered subnets");

        let filters = config
            .additional_filter
            .iter()
            .map(|f| {
                make_state(vec![
                    ("name", string_value(f.name.as_str())),
                    ("values", string_list(&f.values)),
                ])
            })
            .collect();
        Ok(make_state(vec![
            ("api_version", opt_string(list.api_version.as_deref())),
            ("entities", list_value(list.entities.iter().map(flatten_subnet).collect())),
            ("additional_filter", list_value(filters)),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::common::testing::prism_clients;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn subnet_entity(uuid: &str, name: &str, vlan_id: i64) -> serde_json::Value {
        json!({
            "metadata": {"kind": "subnet", "uuid": uuid},
            "spec": {"name": name, "resources": {"subnet_type": "VLAN", "vlan_id": vlan_id}},
            "status": {"name": name, "resources": {"subnet_type": "VLAN", "vlan_id": vlan_id}}
        })
    }

    #[tokio::test]
    async fn finds_subnet_by_name() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/nutanix/v3/subnets/list"))
            .and(body_partial_json(json!({"kind": "subnet", "filter": "name==vlan-10"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "api_version": "3.1",
                "entities": [subnet_entity("s-10", "vlan-10", 10)],
                "metadata": {"kind": "subnet", "total_matches": 1}
            })))
            .expect(1)
            .mount(&server)
            .await;
        let clients = prism_clients(&server.uri());
        let config = make_state(vec![("subnet_name", string_value("vlan-10"))]);

        // Act
        let state = SubnetDataSource.read(&clients, &config).await.unwrap();

        // Assert
        assert_eq!(state.get("subnet_id"), Some(&string_value("s-10")));
        assert_eq!(state.get("id"), Some(&string_value("s-10")));
        assert_eq!(state.get("vlan_id").and_then(DynamicValue::as_i64), Some(10));
    }

    #[tokio::test]
    async fn unknown_name_is_an_error() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/nutanix/v3/subnets/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entities": [],
                "metadata": {"kind": "subnet", "total_matches": 0}
            })))
            .mount(&server)
            .await;
        let clients = prism_clients(&server.uri());
        let config = make_state(vec![("subnet_name", string_value("missing"))]);

        // Act
        let err = SubnetDataSource.read(&clients, &config).await.unwrap_err();

        // Assert
        assert_eq!(err.to_string(), "subnet with the given name, not found");
    }

    #[tokio::test]
    async fn additional_filter_keeps_matching_subnets() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/nutanix/v3/subnets/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "api_version": "3.1",
                "entities": [
                    subnet_entity("s-10", "vlan-10", 10),
                    subnet_entity("s-20", "vlan-20", 20),
                ],
                "metadata": {"kind": "subnet", "total_matches": 2}
            })))
            .mount(&server)
            .await;
        let clients = prism_clients(&server.uri());
        let config = make_state(vec![(
            "additional_filter",
            list_value(vec![make_state(vec![
                ("name", string_value("vlan_id")),
                ("values", string_list(&["20"])),
            ])]),
        )]);

        // Act
        let state = SubnetsDataSource.read(&clients, &config).await.unwrap();

        // Assert
        let entities = state.get("entities").unwrap().as_list().unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].get("name"), Some(&string_value("vlan-20")));
    }
}
