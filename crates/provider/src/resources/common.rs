//! Pieces shared by the v3 intent resources: metadata, references,
//! categories and task waits.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use nutanix_client::task::{STATE_DELETED_PENDING, STATE_DELETE_PENDING};
use nutanix_client::v3::structs::{Metadata, Reference};
use nutanix_client::StateChangeConf;
use serde::Deserialize;
use tracing::info;

use crate::client::Clients;
use crate::schema::{AttrType, Attribute, Block, NestedBlock};
use crate::state::{list_value, make_state, opt_string, string_map, DynamicValue};

/// `{kind, name, uuid}` as Terraform sees it.
pub type ReferenceMap = BTreeMap<String, String>;

/// Metadata-level arguments every intent resource accepts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataArgs {
    #[serde(default)]
    pub categories: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub project_reference: Option<ReferenceMap>,
    #[serde(default)]
    pub owner_reference: Option<ReferenceMap>,
}

impl MetadataArgs {
    /// Request metadata for a new entity of `kind`.
    pub fn to_metadata(&self, kind: &str) -> Metadata {
        self.apply(Metadata::kind(kind))
    }

    /// Overlays the configured fields on metadata read from the API, which
    /// keeps `spec_version` for the update.
    pub fn apply(&self, mut metadata: Metadata) -> Metadata {
        metadata.categories = self.categories.clone();
        if let Some(r) = self.project_reference.as_ref().and_then(expand_reference) {
            metadata.project_reference = Some(r);
        }
        if let Some(r) = self.owner_reference.as_ref().and_then(expand_reference) {
            metadata.owner_reference = Some(r);
        }
        metadata
    }
}

pub fn metadata_attribute() -> Attribute {
    Attribute::computed("metadata", AttrType::string_map())
}

pub fn categories_attribute() -> Attribute {
    Attribute::optional_computed("categories", AttrType::string_map())
}

pub fn reference_attribute(name: &'static str) -> Attribute {
    Attribute::optional_computed(name, AttrType::string_map())
}

/// The metadata attributes in the order resources list them.
pub fn metadata_attributes() -> Vec<Attribute> {
    vec![
        metadata_attribute(),
        categories_attribute(),
        reference_attribute("project_reference"),
        reference_attribute("owner_reference"),
    ]
}

/// List-of-references nested block (`kind`, `uuid`, `name`).
pub fn reference_list_block(name: &'static str) -> NestedBlock {
    NestedBlock::list(
        name,
        Block::new(vec![
            Attribute::optional_computed("kind", AttrType::String),
            Attribute::required("uuid", AttrType::String),
            Attribute::optional_computed("name", AttrType::String),
        ]),
    )
}

pub fn expand_reference(map: &ReferenceMap) -> Option<Reference> {
    let get = |key: &str| map.get(key).filter(|v| !v.is_empty()).cloned();
    let reference = Reference {
        kind: get("kind"),
        name: get("name"),
        uuid: get("uuid"),
    };
    if reference == Reference::default() {
        None
    } else {
        Some(reference)
    }
}

/// Entries of a reference-list block, with `kind` defaulting to `kind`.
pub fn expand_reference_list(items: &[ReferenceMap], kind: &str) -> Option<Vec<Reference>> {
    if items.is_empty() {
        return None;
    }
    Some(
        items
            .iter()
            .filter_map(expand_reference)
            .map(|mut r| {
                r.kind.get_or_insert_with(|| kind.to_string());
                r
            })
            .collect(),
    )
}

pub fn flatten_reference(reference: Option<&Reference>) -> DynamicValue {
    let mut map = BTreeMap::new();
    if let Some(r) = reference {
        map.insert("kind".to_string(), r.kind.clone().unwrap_or_default());
        map.insert("uuid".to_string(), r.uuid.clone().unwrap_or_default());
        if let Some(name) = &r.name {
            map.insert("name".to_string(), name.clone());
        }
    }
    string_map(&map)
}

pub fn flatten_reference_list(references: Option<&Vec<Reference>>) -> DynamicValue {
    list_value(
        references
            .map(|refs| {
                refs.iter()
                    .map(|r| {
                        make_state(vec![
                            ("kind", opt_string(r.kind.as_deref())),
                            ("uuid", opt_string(r.uuid.as_deref())),
                            ("name", opt_string(r.name.as_deref())),
                        ])
                    })
                    .collect()
            })
            .unwrap_or_default(),
    )
}

/// `metadata` map of the state. `spec_version` is rendered as a string.
pub fn flatten_metadata(metadata: &Metadata) -> DynamicValue {
    let mut map = BTreeMap::new();
    let mut put = |key: &str, value: Option<String>| {
        map.insert(key.to_string(), value.unwrap_or_default());
    };
    put("last_update_time", metadata.last_update_time.clone());
    put("uuid", metadata.uuid.clone());
    put("creation_time", metadata.creation_time.clone());
    put("spec_version", Some(metadata.spec_version.unwrap_or_default().to_string()));
    put("spec_hash", metadata.spec_hash.clone());
    put("name", metadata.name.clone());
    string_map(&map)
}

pub fn flatten_categories(categories: Option<&BTreeMap<String, String>>) -> DynamicValue {
    categories.map(string_map).unwrap_or_else(|| string_map(&BTreeMap::new()))
}

/// `metadata`, `categories`, `project_reference` and `owner_reference`.
pub fn flatten_metadata_fields(metadata: &Metadata) -> Vec<(&'static str, DynamicValue)> {
    vec![
        ("metadata", flatten_metadata(metadata)),
        ("categories", flatten_categories(metadata.categories.as_ref())),
        ("project_reference", flatten_reference(metadata.project_reference.as_ref())),
        ("owner_reference", flatten_reference(metadata.owner_reference.as_ref())),
    ]
}

/// Waits for the v3 task created by a mutation of `what`.
pub async fn await_task(
    clients: &Clients,
    task_uuid: Option<String>,
    timeout: Duration,
    what: &str,
) -> Result<()> {
    let Some(task_uuid) = task_uuid else {
        return Ok(());
    };
    info!(task = %task_uuid, "waiting for {}", what);
    let conf = clients.poll(StateChangeConf::v3(timeout));
    clients
        .v3()?
        .wait_for_task_with(&task_uuid, &conf, &clients.cancel)
        .await
        .with_context(|| format!("error waiting for {}", what))?;
    Ok(())
}

/// Like [`await_task`], also tolerating the intermediate delete states.
pub async fn await_delete_task(
    clients: &Clients,
    task_uuid: Option<String>,
    timeout: Duration,
    what: &str,
) -> Result<()> {
    let Some(task_uuid) = task_uuid else {
        return Ok(());
    };
    info!(task = %task_uuid, "waiting for {}", what);
    let conf = clients.poll(
        StateChangeConf::v3(timeout).with_pending(&[STATE_DELETED_PENDING, STATE_DELETE_PENDING]),
    );
    clients
        .v3()?
        .wait_for_task_with(&task_uuid, &conf, &clients.cancel)
        .await
        .with_context(|| format!("error waiting for {}", what))?;
    Ok(())
}

/// Entity uuid of a create response.
pub fn created_uuid(uuid: Option<&str>, kind: &str) -> Result<String> {
    uuid.map(str::to_string)
        .with_context(|| format!("{} create response carries no metadata.uuid", kind))
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::string_value;

    fn reference_map(pairs: &[(&str, &str)]) -> ReferenceMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_reference_expands_to_none() {
        assert_eq!(expand_reference(&ReferenceMap::new()), None);
        assert_eq!(expand_reference(&reference_map(&[("name", "")])), None);
    }

    #[test]
    fn reference_list_fills_kind() {
        let refs = expand_reference_list(&[reference_map(&[("uuid", "c1")])], "cluster").unwrap();

        assert_eq!(refs, vec![Reference::new("cluster", "c1")]);
        assert_eq!(expand_reference_list(&[], "cluster"), None);
    }

    #[test]
    fn apply_keeps_spec_version() {
        let args = MetadataArgs {
            categories: Some(reference_map(&[("Environment", "Dev")])),
            project_reference: Some(reference_map(&[("kind", "project"), ("uuid", "p1")])),
            owner_reference: None,
        };
        let existing = Metadata {
            kind: Some("vm".to_string()),
            uuid: Some("vm-1".to_string()),
            spec_version: Some(3),
            ..Default::default()
        };

        let metadata = args.apply(existing);

        assert_eq!(metadata.spec_version, Some(3));
        assert_eq!(metadata.project_reference, Some(Reference::new("project", "p1")));
        assert_eq!(
            metadata.categories.unwrap().get("Environment").map(String::as_str),
            Some("Dev")
        );
    }

    #[test]
    fn metadata_flattens_uuid_and_version() {
        let metadata = Metadata {
            uuid: Some("cfde831a-4e87-4a75-960f-89b0148aa2cc".to_string()),
            spec_version: Some(2),
            ..Default::default()
        };

        let flat = flatten_metadata(&metadata);

        assert_eq!(
            flat.get("uuid"),
            Some(&string_value("cfde831a-4e87-4a75-960f-89b0148aa2cc"))
        );
        assert_eq!(flat.get("spec_version"), Some(&string_value("2")));
    }

    #[test]
    fn flatten_reference_omits_missing_name() {
        let flat = flatten_reference(Some(&Reference::new("cluster", "c1")));

        assert_eq!(flat.get("uuid"), Some(&string_value("c1")));
        assert!(flat.get("name").is_none());
        assert_eq!(flatten_reference(None), string_map(&BTreeMap::new()));
    }
}
