//! `nutanix_category_key` and `nutanix_category_value`
//!
//! Categories are written with a synchronous PUT; there is no task to wait
//! for. A key is identified by its name, a value by the value itself.

use anyhow::{Context, Result};
use nutanix_client::v3::structs::{
    CategoryKey, CategoryKeyStatus, CategoryValue, CategoryValueStatus, API_VERSION,
};
use serde::Deserialize;
use tracing::info;

use super::{found, resource_id, Resource};
use crate::client::Clients;
use crate::schema::{id_attribute, AttrType, Attribute, Block, Schema};
use crate::state::{bool_value, make_state, opt_string, DynamicValue};

pub struct CategoryKeyResource;

pub struct CategoryValueResource;

#[derive(Debug, Deserialize)]
struct KeyConfig {
    name: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValueConfig {
    name: String,
    value: String,
    description: Option<String>,
}

pub(crate) fn flatten_key(key: &CategoryKeyStatus) -> DynamicValue {
    make_state(vec![
        ("id", opt_string(key.name.as_deref())),
        ("name", opt_string(key.name.as_deref())),
        ("description", opt_string(key.description.as_deref())),
        ("api_version", opt_string(key.api_version.as_deref())),
        ("system_defined", bool_value(key.system_defined.unwrap_or_default())),
    ])
}

fn flatten_value(value: &CategoryValueStatus) -> DynamicValue {
    make_state(vec![
        ("id", opt_string(value.value.as_deref())),
        ("name", opt_string(value.name.as_deref())),
        ("value", opt_string(value.value.as_deref())),
        ("description", opt_string(value.description.as_deref())),
        ("api_version", opt_string(value.api_version.as_deref())),
        ("system_defined", bool_value(value.system_defined.unwrap_or_default())),
    ])
}

impl CategoryKeyResource {
    async fn put(&self, clients: &Clients, planned: &DynamicValue) -> Result<DynamicValue> {
        let config: KeyConfig = planned.to_typed()?;
        let body = CategoryKey {
            api_version: Some(API_VERSION.to_string()),
            description: config.description,
            name: Some(config.name.clone()),
        };
        let key = clients
            .v3()?
            .create_or_update_category_key(&body)
            .await
            .with_context(|| format!("error writing category key {}", config.name))?;
        info!(id = %config.name, "wrote nutanix_category_key");
        Ok(flatten_key(&key))
    }
}

#[async_trait::async_trait]
impl Resource for CategoryKeyResource {
    fn type_name(&self) -> &'static str {
        "nutanix_category_key"
    }

    fn schema(&self) -> Schema {
        Schema::new(Block::new(vec![
            id_attribute(),
            Attribute::required("name", AttrType::String).force_new(),
            Attribute::optional("description", AttrType::String),
            Attribute::computed("api_version", AttrType::String),
            Attribute::computed("system_defined", AttrType::Bool),
        ]))
    }

    async fn create(&self, clients: &Clients, planned: &DynamicValue) -> Result<DynamicValue> {
        self.put(clients, planned).await
    }

    async fn read(&self, clients: &Clients, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let name = resource_id(state)?;
        let key = found(clients.v3()?.get_category_key(&name).await)
            .with_context(|| format!("error reading category key {}", name))?;
        Ok(key.as_ref().map(flatten_key))
    }

    async fn update(
        &self,
        clients: &Clients,
        _prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue> {
        self.put(clients, planned).await
    }

    async fn delete(&self, clients: &Clients, state: &DynamicValue) -> Result<()> {
        let name = resource_id(state)?;
        info!(id = %name, "deleting nutanix_category_key");
        found(clients.v3()?.delete_category_key(&name).await)
            .with_context(|| format!("error deleting category key {}", name))?;
        Ok(())
    }
}

impl CategoryValueResource {
    async fn put(&self, clients: &Clients, planned: &DynamicValue) -> Result<DynamicValue> {
        let config: ValueConfig = planned.to_typed()?;
        let body = CategoryValue {
            api_version: Some(API_VERSION.to_string()),
            description: config.description,
            value: Some(config.value.clone()),
        };
        let value = clients
            .v3()?
            .create_or_update_category_value(&config.name, &body)
            .await
            .with_context(|| {
                format!("error writing category value {}:{}", config.name, config.value)
            })?;
        info!(key = %config.name, id = %config.value, "wrote nutanix_category_value");
        Ok(flatten_value(&value))
    }
}

#[async_trait::async_trait]
impl Resource for CategoryValueResource {
    fn type_name(&self) -> &'static str {
        "nutanix_category_value"
    }

    fn schema(&self) -> Schema {
        Schema::new(Block::new(vec![
            id_attribute(),
            Attribute::required("name", AttrType::String)
                .force_new()
                .describe("Name of the category key the value belongs to."),
            Attribute::required("value", AttrType::String).force_new(),
            Attribute::optional("description", AttrType::String),
            Attribute::computed("api_version", AttrType::String),
            Attribute::computed("system_defined", AttrType::Bool),
        ]))
    }

    async fn create(&self, clients: &Clients, planned: &DynamicValue) -> Result<DynamicValue> {
        self.put(clients, planned).await
    }

    async fn read(&self, clients: &Clients, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let value = resource_id(state)?;
        let name = state
            .get("name")
            .and_then(DynamicValue::as_string)
            .context("category value state carries no key name")?;
        let found_value = found(clients.v3()?.get_category_value(name, &value).await)
            .with_context(|| format!("error reading category value {}:{}", name, value))?;
        Ok(found_value.as_ref().map(flatten_value))
    }

    async fn update(
        &self,
        clients: &Clients,
        _prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue> {
        self.put(clients, planned).await
    }

    async fn delete(&self, clients: &Clients, state: &DynamicValue) -> Result<()> {
        let value = resource_id(state)?;
        let name = state
            .get("name")
            .and_then(DynamicValue::as_string)
            .context("category value state carries no key name")?;
        info!(key = %name, id = %value, "deleting nutanix_category_value");
        found(clients.v3()?.delete_category_value(name, &value).await)
            .with_context(|| format!("error deleting category value {}:{}", name, value))?;
        Ok(())
    }
}
