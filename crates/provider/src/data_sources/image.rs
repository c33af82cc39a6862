//! `nutanix_image` data source

use anyhow::{Context, Result};

use super::{lookup_by, lookup_schema, name_filter, single_named, DataSource, Lookup};
use crate::client::Clients;
use crate::resources::image::{flatten_image, ImageResource};
use crate::resources::Resource;
use crate::schema::{AttrType, Attribute, Schema};
use crate::state::{opt_string, DynamicValue};

pub struct ImageDataSource;

#[async_trait::async_trait]
impl DataSource for ImageDataSource {
    fn type_name(&self) -> &'static str {
        "nutanix_image"
    }

    fn schema(&self) -> Schema {
        lookup_schema(
            vec![
                Attribute::optional("image_id", AttrType::String),
                Attribute::optional("image_name", AttrType::String),
            ],
            &ImageResource.schema(),
        )
    }

    async fn read(&self, clients: &Clients, config: &DynamicValue) -> Result<DynamicValue> {
        let v3 = clients.v3()?;
        let image = match lookup_by(config, "image_id", "image_name")? {
            Lookup::Id(id) => v3
                .get_image(&id)
                .await
                .with_context(|| format!("error reading image {}", id))?,
            Lookup::Name(name) => {
                let list = v3
                    .list_all_image(Some(&name_filter(&name)))
                    .await
                    .with_context(|| format!("error listing images named {}", name))?;
                single_named(list.entities, &name, "image", "image_id")?
            }
        };

        let mut state = flatten_image(&image);
        let name = state.get("name").cloned().unwrap_or_default();
        state.set("image_id", opt_string(image.uuid()));
        state.set("image_name", name);
        Ok(state)
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
    async fn reads_image_by_id() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/nutanix/v3/images/img-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "metadata": {"kind": "image", "uuid": "img-1"},
                "status": {
                    "name": "ubuntu-22.04",
                    "state": "COMPLETE",
                    "resources": {"image_type": "DISK_IMAGE", "size_bytes": 2361393152_i64}
                }
            })))
            .expect(1)
            .mount(&server)
            .await;
        let clients = prism_clients(&server.uri());
        let config = make_state(vec![("image_id", string_value("img-1"))]);

        // Act
        let state = ImageDataSource.read(&clients, &config).await.unwrap();

        // Assert
        assert_eq!(state.get("image_name"), Some(&string_value("ubuntu-22.04")));
        assert_eq!(state.get("image_type"), Some(&string_value("DISK_IMAGE")));
    }

    #[tokio::test]
    async fn duplicate_names_ask_for_the_id() {
        // Arrange
        let server = MockServer::start().await;
        let entity = |uuid: &str| {
            json!({"metadata": {"kind": "image", "uuid": uuid}, "status": {"name": "base"}})
        };
        Mock::given(method("POST"))
            .and(path("/api/nutanix/v3/images/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entities": [entity("a"), entity("b")],
                "metadata": {"kind": "image", "total_matches": 2}
            })))
            .mount(&server)
            .await;
        let clients = prism_clients(&server.uri());
        let config = make_state(vec![("image_name", string_value("base"))]);

        // Act
        let err = ImageDataSource.read(&clients, &config).await.unwrap_err();

        // Assert
        assert!(err.to_string().contains("Please use image_id argument instead"));
    }
}
