//! `nutanix_volume_group_v2` data source

use anyhow::{Context, Result};

use super::{lookup_schema, required_string, DataSource};
use crate::client::Clients;
use crate::resources::volume_group::{flatten_volume_group, VolumeGroupResource};
use crate::resources::Resource;
use crate::schema::{AttrType, Attribute, Schema};
use crate::state::DynamicValue;

pub struct VolumeGroupDataSource;

#[async_trait::async_trait]
impl DataSource for VolumeGroupDataSource {
    fn type_name(&self) -> &'static str {
        "nutanix_volume_group_v2"
    }

    fn schema(&self) -> Schema {
        let mut schema = lookup_schema(
            vec![Attribute::required("ext_id", AttrType::String)],
            &VolumeGroupResource.schema(),
        );
        // Disks are listed by a separate API.
        schema.block.attributes.retain(|a| a.name != "disks");
        schema
    }

    async fn read(&self, clients: &Clients, config: &DynamicValue) -> Result<DynamicValue> {
        let ext_id = required_string(config, "ext_id")?;
        let vg = clients
            .volumes()?
            .get_volume_group(&ext_id)
            .await
            .with_context(|| format!("error while fetching volume group {}", ext_id))?;
        Ok(flatten_volume_group(&vg.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::common::testing::prism_clients;
    use crate::state::{make_state, string_value};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn reads_group_by_ext_id() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/volumes/v4.0/config/volume-groups/vg-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "W/\"1\"")
                    .set_body_json(json!({
                        "data": {
                            "extId": "vg-1",
                            "name": "db-data",
                            "sharingStatus": "SHARED",
                            "clusterReference": "c-1",
                            "storageFeatures": {"flashMode": {"isEnabled": true}}
                        }
                    })),
            )
            .expect(1)
            .mount(&server)
            .await;
        let clients = prism_clients(&server.uri());
        let config = make_state(vec![("ext_id", string_value("vg-1"))]);

        // Act
        let state = VolumeGroupDataSource.read(&clients, &config).await.unwrap();

        // Assert
        assert_eq!(state.get("id"), Some(&string_value("vg-1")));
        assert_eq!(state.get("sharing_status"), Some(&string_value("SHARED")));
        let features = state.get("storage_features").unwrap().as_list().unwrap();
        assert_eq!(features.len(), 1);
    }

    #[test]
    fn schema_requires_ext_id_only() {
        let schema = VolumeGroupDataSource.schema();

        let required: Vec<&str> = schema
            .block
            .attributes
            .iter()
            .filter(|a| a.required)
            .map(|a| a.name)
            .collect();

        assert_eq!(required, vec!["ext_id"]);
        assert!(schema.block.attribute("disks").is_none());
    }
}
