//! `nutanix_virtual_machine` data source

use anyhow::{Context, Result};
use tracing::debug;

use super::{lookup_schema, required_string, DataSource};
use crate::client::Clients;
use crate::resources::virtual_machine::{flatten_vm, VirtualMachineResource};
use crate::resources::Resource;
use crate::schema::{AttrType, Attribute, Schema};
use crate::state::{string_value, DynamicValue};

pub struct VirtualMachineDataSource;

#[async_trait::async_trait]
impl DataSource for VirtualMachineDataSource {
    fn type_name(&self) -> &'static str {
        "nutanix_virtual_machine"
    }

    fn schema(&self) -> Schema {
        lookup_schema(
            vec![Attribute::required("vm_id", AttrType::String)],
            &VirtualMachineResource.schema(),
        )
    }

    async fn read(&self, clients: &Clients, config: &DynamicValue) -> Result<DynamicValue> {
        let vm_id = required_string(config, "vm_id")?;
        debug!(id = %vm_id, "reading virtual machine");
        let vm = clients
            .v3()?
            .get_vm(&vm_id)
            .await
            .with_context(|| format!("error reading virtual machine {}", vm_id))?;

        let mut state = flatten_vm(&vm);
        state.set("vm_id", string_value(vm_id));
        Ok(state)
    }
}
