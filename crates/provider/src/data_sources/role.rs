//! `nutanix_role` data source

use anyhow::{Context, Result};

use super::{lookup_schema, required_string, DataSource};
use crate::client::Clients;
use crate::resources::role::{flatten_role, RoleResource};
use crate::resources::Resource;
use crate::schema::{AttrType, Attribute, Schema};
use crate::state::{string_value, DynamicValue};

pub struct RoleDataSource;

#[async_trait::async_trait]
impl DataSource for RoleDataSource {
    fn type_name(&self) -> &'static str {
        "nutanix_role"
    }

    fn schema(&self) -> Schema {
        lookup_schema(
            vec![Attribute::required("role_id", AttrType::String)],
            &RoleResource.schema(),
        )
    }

    async fn read(&self, clients: &Clients, config: &DynamicValue) -> Result<DynamicValue> {
        let role_id = required_string(config, "role_id")?;
        let role = clients
            .v3()?
            .get_role(&role_id)
            .await
            .with_context(|| format!("error reading role {}", role_id))?;

        let mut state = flatten_role(&role);
        state.set("role_id", string_value(role_id));
        Ok(state)
    }
}
