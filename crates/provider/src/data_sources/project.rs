//! `nutanix_project` data source

use anyhow::{Context, Result};

use super::{lookup_schema, required_string, DataSource};
use crate::client::Clients;
use crate::resources::project::{flatten_project, ProjectResource};
use crate::resources::Resource;
use crate::schema::{AttrType, Attribute, Schema};
use crate::state::{string_value, DynamicValue};

pub struct ProjectDataSource;

#[async_trait::async_trait]
impl DataSource for ProjectDataSource {
    fn type_name(&self) -> &'static str {
        "nutanix_project"
    }

    fn schema(&self) -> Schema {
        lookup_schema(
            vec![Attribute::required("project_id", AttrType::String)],
            &ProjectResource.schema(),
        )
    }

    async fn read(&self, clients: &Clients, config: &DynamicValue) -> Result<DynamicValue> {
        let project_id = required_string(config, "project_id")?;
        let project = clients
            .v3()?
            .get_project(&project_id)
            .await
            .with_context(|| format!("error reading project {}", project_id))?;

        let mut state = flatten_project(&project);
        state.set("project_id", string_value(project_id));
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::common::testing::prism_clients;
    use crate::state::make_state;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn reads_project_with_cluster_references() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/nutanix/v3/projects/p-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "metadata": {"kind": "project", "uuid": "p-1"},
                "status": {
                    "name": "platform",
                    "description": "platform team",
                    "state": "COMPLETE",
                    "resources": {
                        "cluster_reference_list": [
                            {"kind": "cluster", "uuid": "c-1", "name": "PE01"}
                        ]
                    }
                }
            })))
            .expect(1)
            .mount(&server)
            .await;
        let clients = prism_clients(&server.uri());
        let config = make_state(vec![("project_id", string_value("p-1"))]);

        // Act
        let state = ProjectDataSource.read(&clients, &config).await.unwrap();

        // Assert
        assert_eq!(state.get("name"), Some(&string_value("platform")));
        let clusters = state.get("cluster_reference_list").unwrap().as_list().unwrap();
        assert_eq!(clusters[0].get("uuid"), Some(&string_value("c-1")));
    }

    #[tokio::test]
    async fn missing_project_id_is_reported() {
        let clients = prism_clients("http://127.0.0.1:9");

        let err = ProjectDataSource.read(&clients, &make_state(vec![])).await.unwrap_err();

        assert_eq!(err.to_string(), "please provide the required attribute project_id");
    }
}
