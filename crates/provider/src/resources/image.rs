//! `nutanix_image`

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use nutanix_client::v3::structs::{
    Checksum, Image, ImageIntentInput, ImageIntentResponse, ImageResources, ImageVersionResources,
    Metadata,
};
use serde::Deserialize;
use tracing::info;

use super::common::{
    await_delete_task, await_task, created_uuid, expand_reference, flatten_metadata_fields,
    flatten_reference, metadata_attributes, reference_attribute, MetadataArgs, ReferenceMap,
};
use super::{found, resource_id, task_timeouts, Resource};
use crate::client::Clients;
use crate::schema::{id_attribute, AttrType, Attribute, Block, Schema};
use crate::state::{make_state, opt_int, opt_string, string_list, string_map, DynamicValue};
use crate::timeouts::Timeouts;

const KIND: &str = "image";
const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(60);

pub struct ImageResource;

#[derive(Debug, Default, Deserialize)]
struct ImageConfig {
    name: String,
    description: Option<String>,
    availability_zone_reference: Option<ReferenceMap>,
    #[serde(flatten)]
    meta: MetadataArgs,
    image_type: Option<String>,
    source_uri: Option<String>,
    architecture: Option<String>,
    checksum: Option<BTreeMap<String, String>>,
    version: Option<BTreeMap<String, String>>,
    data_source_reference: Option<ReferenceMap>,
}

impl ImageConfig {
    fn expand(self, mut base: Image) -> (MetadataArgs, Image) {
        let mut resources = base.resources.take().unwrap_or_default();
        resources.image_type = self.image_type.or(resources.image_type);
        resources.source_uri = self.source_uri.or(resources.source_uri);
        resources.architecture = self.architecture.or(resources.architecture);
        if let Some(checksum) = self.checksum.filter(|m| !m.is_empty()) {
            resources.checksum = Some(Checksum {
                checksum_algorithm: checksum.get("checksum_algorithm").cloned(),
                checksum_value: checksum.get("checksum_value").cloned(),
            });
        }
        if let Some(version) = self.version.filter(|m| !m.is_empty()) {
            resources.version = Some(ImageVersionResources {
                product_name: version.get("product_name").cloned(),
                product_version: version.get("product_version").cloned(),
            });
        }
        if let Some(r) = self.data_source_reference.as_ref().and_then(expand_reference) {
            resources.data_source_reference = Some(r);
        }
        // Read-only in the API.
        resources.retrieval_uri_list = None;
        resources.size_bytes = None;

        base.name = Some(self.name);
        base.description = self.description.or(base.description);
        if let Some(r) = self.availability_zone_reference.as_ref().and_then(expand_reference) {
            base.availability_zone_reference = Some(r);
        }
        base.resources = Some(resources);
        (self.meta, base)
    }
}

pub(crate) fn flatten_image(image: &ImageIntentResponse) -> DynamicValue {
    let metadata = image.metadata.clone().unwrap_or_default();
    let status = image.status.as_ref();
    let spec = image.spec.as_ref();
    let default = ImageResources::default();
    let res = status
        .and_then(|s| s.resources.as_ref())
        .or_else(|| spec.and_then(|s| s.resources.as_ref()))
        .unwrap_or(&default);

    let mut checksum = BTreeMap::new();
    if let Some(c) = &res.checksum {
        for (key, value) in [
            ("checksum_algorithm", &c.checksum_algorithm),
            ("checksum_value", &c.checksum_value),
        ] {
            if let Some(v) = value {
                checksum.insert(key.to_string(), v.clone());
            }
        }
    }
    let mut version = BTreeMap::new();
    if let Some(v) = &res.version {
        for (key, value) in [
            ("product_name", &v.product_name),
            ("product_version", &v.product_version),
        ] {
            if let Some(v) = value {
                version.insert(key.to_string(), v.clone());
            }
        }
    }

    let mut attrs = vec![
        ("id", opt_string(metadata.uuid.as_deref())),
        ("api_version", opt_string(image.api_version.as_deref())),
        (
            "name",
            opt_string(
                status
                    .and_then(|s| s.name.as_deref())
                    .or(spec.and_then(|s| s.name.as_deref())),
            ),
        ),
        ("description", opt_string(spec.and_then(|s| s.description.as_deref()))),
        ("state", opt_string(status.and_then(|s| s.state.as_deref()))),
        (
            "availability_zone_reference",
            flatten_reference(spec.and_then(|s| s.availability_zone_reference.as_ref())),
        ),
        (
            "cluster_reference",
            flatten_reference(status.and_then(|s| s.cluster_reference.as_ref())),
        ),
        ("image_type", opt_string(res.image_type.as_deref())),
        ("source_uri", opt_string(res.source_uri.as_deref())),
        ("architecture", opt_string(res.architecture.as_deref())),
        ("size_bytes", opt_int(res.size_bytes)),
        ("retrieval_uri_list", string_list(res.retrieval_uri_list.as_deref().unwrap_or_default())),
        ("checksum", string_map(&checksum)),
        ("version", string_map(&version)),
        ("data_source_reference", flatten_reference(res.data_source_reference.as_ref())),
    ];
    attrs.extend(flatten_metadata_fields(&metadata));
    make_state(attrs)
}

#[async_trait::async_trait]
impl Resource for ImageResource {
    fn type_name(&self) -> &'static str {
        "nutanix_image"
    }

    fn schema(&self) -> Schema {
        let mut attrs = vec![
            id_attribute(),
            Attribute::computed("api_version", AttrType::String),
            Attribute::required("name", AttrType::String),
            Attribute::optional_computed("description", AttrType::String),
            Attribute::computed("state", AttrType::String),
            reference_attribute("availability_zone_reference"),
            Attribute::computed("cluster_reference", AttrType::string_map()),
            Attribute::optional_computed("image_type", AttrType::String)
                .one_of(&["DISK_IMAGE", "ISO_IMAGE"]),
            Attribute::optional_computed("source_uri", AttrType::String).force_new(),
            Attribute::optional_computed("architecture", AttrType::String),
            Attribute::computed("size_bytes", AttrType::Number),
            Attribute::computed("retrieval_uri_list", AttrType::string_list()),
            Attribute::optional_computed("checksum", AttrType::string_map()),
            Attribute::optional_computed("version", AttrType::string_map()),
            reference_attribute("data_source_reference"),
        ];
        attrs.extend(metadata_attributes());
        Schema::new(
            Block::new(attrs)
                .with_blocks(vec![Timeouts::block()])
                .describe("A disk or ISO image imported from a URI."),
        )
    }

    async fn create(&self, clients: &Clients, planned: &DynamicValue) -> Result<DynamicValue> {
        let timeouts = task_timeouts(clients, DEFAULT_TIMEOUTS, planned)?;
        let config: ImageConfig = planned.to_typed()?;
        let (meta, spec) = config.expand(Image::default());

        let v3 = clients.v3()?;
        let response = v3
            .create_image(&ImageIntentInput::new(meta.to_metadata(KIND), spec))
            .await
            .context("error creating image")?;
        let uuid = created_uuid(response.uuid(), KIND)?;
        info!(id = %uuid, "created nutanix_image");

        await_task(
            clients,
            response.task_uuid(),
            timeouts.create,
            &format!("image ({}) to create", uuid),
        )
        .await?;

        let image = v3
            .get_image(&uuid)
            .await
            .with_context(|| format!("error reading image {}", uuid))?;
        Ok(flatten_image(&image))
    }

    async fn read(&self, clients: &Clients, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let id = resource_id(state)?;
        let image = found(clients.v3()?.get_image(&id).await)
            .with_context(|| format!("error reading image {}", id))?;
        Ok(image.as_ref().map(flatten_image))
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
            .get_image(&id)
            .await
            .with_context(|| format!("error reading image {}", id))?;
        let config: ImageConfig = planned.to_typed()?;
        let (meta, spec) = config.expand(existing.spec.clone().unwrap_or_default());
        let metadata =
            meta.apply(existing.metadata.clone().unwrap_or_else(|| Metadata::kind(KIND)));

        info!(id = %id, "updating nutanix_image");
        let response = v3
            .update_image(&id, &ImageIntentInput::new(metadata, spec))
            .await
            .with_context(|| format!("error updating image {}", id))?;
        await_task(
            clients,
            response.task_uuid(),
            timeouts.update,
            &format!("image ({}) to update", id),
        )
        .await?;

        let image = v3
            .get_image(&id)
            .await
            .with_context(|| format!("error reading image {}", id))?;
        Ok(flatten_image(&image))
    }

    async fn delete(&self, clients: &Clients, state: &DynamicValue) -> Result<()> {
        let id = resource_id(state)?;
        let timeouts = task_timeouts(clients, DEFAULT_TIMEOUTS, state)?;

        info!(id = %id, "deleting nutanix_image");
        let Some(response) = found(clients.v3()?.delete_image(&id).await)
            .with_context(|| format!("error while deleting image {}", id))?
        else {
            return Ok(());
        };
        await_delete_task(
            clients,
            response.task_uuid(),
            timeouts.delete,
            &format!("image ({}) to delete", id),
        )
        .await
    }
}
