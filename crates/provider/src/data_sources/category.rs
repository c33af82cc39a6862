//! `nutanix_category_key` data source

use anyhow::{Context, Result};
use nutanix_client::v3::structs::DsMetadata;

use super::{lookup_schema, required_string, DataSource};
use crate::client::Clients;
use crate::resources::category::{flatten_key, CategoryKeyResource};
use crate::resources::Resource;
use crate::schema::{AttrType, Attribute, Schema};
use crate::state::{string_list, DynamicValue};

pub struct CategoryKeyDataSource;

#[async_trait::async_trait]
impl DataSource for CategoryKeyDataSource {
    fn type_name(&self) -> &'static str {
        "nutanix_category_key"
    }

    fn schema(&self) -> Schema {
        let mut schema = lookup_schema(
            vec![Attribute::required("name", AttrType::String)],
            &CategoryKeyResource.schema(),
        );
        schema
            .block
            .attributes
            .push(Attribute::computed("values", AttrType::string_list()));
        schema
    }

    async fn read(&self, clients: &Clients, config: &DynamicValue) -> Result<DynamicValue> {
        let name = required_string(config, "name")?;
        let v3 = clients.v3()?;
        let key = v3
            .get_category_key(&name)
            .await
            .with_context(|| format!("error reading category key {}", name))?;
        let values = v3
            .list_category_values(
                &name,
                &DsMetadata {
                    kind: Some("category".to_string()),
                    ..Default::default()
                },
            )
            .await
            .with_context(|| format!("error listing values of category {}", name))?;

        let values: Vec<&str> = values
            .entities
            .iter()
            .filter_map(|v| v.value.as_deref())
            .collect();
        let mut state = flatten_key(&key);
        state.set("values", string_list(&values));
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::common::testing::prism_clients;
    use crate::state::{make_state, string_value};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn reads_key_with_values() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/nutanix/v3/categories/AppTier"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "api_version": "3.1",
                "name": "AppTier",
                "description": "tier of the application",
                "system_defined": false
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/nutanix/v3/categories/AppTier/list"))
            .and(body_partial_json(json!({"kind": "category"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entities": [
                    {"name": "AppTier", "value": "web"},
                    {"name": "AppTier", "value": "db"}
                ],
                "metadata": {"kind": "category", "total_matches": 2}
            })))
            .expect(1)
            .mount(&server)
            .await;
        let clients = prism_clients(&server.uri());
        let config = make_state(vec![("name", string_value("AppTier"))]);

        // Act
        let state = CategoryKeyDataSource.read(&clients, &config).await.unwrap();

        // Assert
        assert_eq!(state.get("id"), Some(&string_value("AppTier")));
        assert_eq!(state.get("values"), Some(&string_list(&["web", "db"])));
    }
}
