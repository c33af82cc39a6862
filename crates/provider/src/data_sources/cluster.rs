//! `nutanix_cluster` and `nutanix_clusters` data sources
//!
//! Clusters are registered with Prism Central rather than created through
//! it, so there is no matching resource and the state is built here.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use nutanix_client::v3::structs::{ClusterIntentResponse, ClusterResources};

use super::{entity_name, lookup_by, name_filter, single_named, DataSource, Lookup};
use crate::client::Clients;
use crate::resources::common::{flatten_metadata_fields, metadata_attributes};
use crate::schema::{id_attribute, AttrType, Attribute, Block, Schema};
use crate::state::{
    bool_value, list_value, make_state, opt_string, string_list, string_map, DynamicValue,
};

pub struct ClusterDataSource;

pub struct ClustersDataSource;

fn cluster_attributes() -> Vec<Attribute> {
    let mut attrs = vec![
        id_attribute(),
        Attribute::computed("api_version", AttrType::String),
        Attribute::computed("name", AttrType::String),
        Attribute::computed("state", AttrType::String),
        Attribute::computed("is_available", AttrType::Bool),
        Attribute::computed("operation_mode", AttrType::String),
        Attribute::computed("service_list", AttrType::string_list()),
        Attribute::computed("timezone", AttrType::String),
        Attribute::computed("build", AttrType::string_map()),
        Attribute::computed("external_ip", AttrType::String),
        Attribute::computed("external_data_services_ip", AttrType::String),
        Attribute::computed("name_server_ip_list", AttrType::string_list()),
        Attribute::computed("ntp_server_ip_list", AttrType::string_list()),
        Attribute::computed(
            "nodes",
            AttrType::object_list(vec![
                ("ip", AttrType::String),
                ("type", AttrType::String),
                ("version", AttrType::String),
            ]),
        ),
    ];
    attrs.extend(metadata_attributes().into_iter().map(|a| Attribute {
        optional: false,
        ..a
    }));
    attrs
}

fn flatten_cluster(cluster: &ClusterIntentResponse) -> DynamicValue {
    let metadata = cluster.metadata.clone().unwrap_or_default();
    let status = cluster.status.as_ref();
    let default = ClusterResources::default();
    let res = status.and_then(|s| s.resources.as_ref()).unwrap_or(&default);
    let config = res.config.clone().unwrap_or_default();
    let network = res.network.clone().unwrap_or_default();

    let mut build = BTreeMap::new();
    if let Some(b) = &config.build {
        for (key, value) in [
            ("build_type", &b.build_type),
            ("commit_id", &b.commit_id),
            ("full_version", &b.full_version),
            ("version", &b.version),
        ] {
            build.insert(key.to_string(), value.clone().unwrap_or_default());
        }
    }
    let nodes = res
        .nodes
        .iter()
        .flat_map(|n| n.hypervisor_server_list.iter().flatten())
        .map(|server| {
            make_state(vec![
                ("ip", opt_string(server.ip.as_deref())),
                ("type", opt_string(server.hypervisor_type.as_deref())),
                ("version", opt_string(server.version.as_deref())),
            ])
        })
        .collect();

    let mut attrs = vec![
        ("id", opt_string(metadata.uuid.as_deref())),
        ("api_version", opt_string(cluster.api_version.as_deref())),
        ("name", opt_string(entity_name(cluster))),
        ("state", opt_string(status.and_then(|s| s.state.as_deref()))),
        ("is_available", bool_value(config.is_available.unwrap_or_default())),
        ("operation_mode", opt_string(config.operation_mode.as_deref())),
        ("service_list", string_list(config.service_list.as_deref().unwrap_or_default())),
        ("timezone", opt_string(config.timezone.as_deref())),
        ("build", string_map(&build)),
        ("external_ip", opt_string(network.external_ip.as_deref())),
        ("external_data_services_ip", opt_string(network.external_data_services_ip.as_deref())),
        (
            "name_server_ip_list",
            string_list(network.name_server_ip_list.as_deref().unwrap_or_default()),
        ),
        (
            "ntp_server_ip_list",
            string_list(network.ntp_server_ip_list.as_deref().unwrap_or_default()),
        ),
        ("nodes", list_value(nodes)),
    ];
    attrs.extend(flatten_metadata_fields(&metadata));
    make_state(attrs)
}

#[async_trait::async_trait]
impl DataSource for ClusterDataSource {
    fn type_name(&self) -> &'static str {
        "nutanix_cluster"
    }

    fn schema(&self) -> Schema {
        let mut attrs = vec![Attribute::optional("cluster_id", AttrType::String)];
        attrs.extend(cluster_attributes().into_iter().map(|a| match a.name {
            "name" => Attribute::optional_computed("name", AttrType::String),
            _ => a,
        }));
        Schema::new(Block::new(attrs))
    }

    async fn read(&self, clients: &Clients, config: &DynamicValue) -> Result<DynamicValue> {
        let v3 = clients.v3()?;
        let cluster = match lookup_by(config, "cluster_id", "name")? {
            Lookup::Id(id) => v3
                .get_cluster(&id)
                .await
                .with_context(|| format!("error reading cluster {}", id))?,
            Lookup::Name(name) => {
                let list = v3
                    .list_all_cluster(Some(&name_filter(&name)))
                    .await
                    .with_context(|| format!("error listing clusters named {}", name))?;
                single_named(list.entities, &name, "cluster", "cluster_id")?
            }
        };

        let mut state = flatten_cluster(&cluster);
        state.set("cluster_id", opt_string(cluster.uuid()));
        Ok(state)
    }
}

#[async_trait::async_trait]
impl DataSource for ClustersDataSource {
    fn type_name(&self) -> &'static str {
        "nutanix_clusters"
    }

    fn schema(&self) -> Schema {
        let entity = Block::new(cluster_attributes()).object_type();
        Schema::new(Block::new(vec![
            Attribute::computed("api_version", AttrType::String),
            Attribute::computed("entities", AttrType::list(entity)),
        ]))
    }

    async fn read(&self, clients: &Clients, _config: &DynamicValue) -> Result<DynamicValue> {
        let list = clients
            .v3()?
            .list_all_cluster(None)
            .await
            .context("error listing clusters")?;
        Ok(make_state(vec![
            ("api_version", opt_string(list.api_version.as_deref())),
            ("entities", list_value(list.entities.iter().map(flatten_cluster).collect())),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::common::testing::prism_clients;
    use crate::state::string_value;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cluster_body(uuid: &str, name: &str) -> serde_json::Value {
        json!({
            "api_version": "3.1",
            "metadata": {"kind": "cluster", "uuid": uuid},
            "status": {
                "name": name,
                "state": "COMPLETE",
                "resources": {
                    "config": {
                        "build": {"version": "6.5.2", "full_version": "el7.3-release-fraser-6.5.2"},
                        "service_list": ["AOS"],
                        "is_available": true
                    },
                    "network": {"external_ip": "10.0.0.10"},
                    "nodes": {
                        "hypervisor_server_list": [
                            {"ip": "10.0.0.11", "type": "AHV", "version": "20220304"}
                        ]
                    }
                }
            }
        })
    }

    #[tokio::test]
    async fn reads_cluster_by_name() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/nutanix/v3/clusters/list"))
            .and(body_partial_json(json!({"kind": "cluster", "filter": "name==PE01"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entities": [cluster_body("c-1", "PE01")],
                "metadata": {"kind": "cluster", "total_matches": 1}
            })))
            .expect(1)
            .mount(&server)
            .await;
        let clients = prism_clients(&server.uri());
        let config = make_state(vec![("name", string_value("PE01"))]);

        // Act
        let state = ClusterDataSource.read(&clients, &config).await.unwrap();

        // Assert
        assert_eq!(state.get("cluster_id"), Some(&string_value("c-1")));
        assert_eq!(state.get("external_ip"), Some(&string_value("10.0.0.10")));
        assert_eq!(
            state.get("build").and_then(|b| b.get("version")),
            Some(&string_value("6.5.2"))
        );
        let nodes = state.get("nodes").unwrap().as_list().unwrap();
        assert_eq!(nodes[0].get("type"), Some(&string_value("AHV")));
    }

    #[tokio::test]
    async fn lists_every_cluster() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/nutanix/v3/clusters/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "api_version": "3.1",
                "entities": [cluster_body("c-1", "PE01"), cluster_body("pc-1", "Unnamed")],
                "metadata": {"kind": "cluster", "total_matches": 2}
            })))
            .mount(&server)
            .await;
        let clients = prism_clients(&server.uri());

        // Act
        let state = ClustersDataSource.read(&clients, &make_state(vec![])).await.unwrap();

        // Assert
        let entities = state.get("entities").unwrap().as_list().unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[1].get("id"), Some(&string_value("pc-1")));
    }
}
