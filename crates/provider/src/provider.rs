//! Nutanix Terraform Provider Implementation
//!
//! Implements the Terraform Plugin Protocol v6 Provider service on top of
//! the resource and data source registries.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info, warn};

use crate::client::Clients;
use crate::config::{provider_schema, ProviderConfig};
use crate::data_sources::{self, DataSource};
use crate::resources::{self, Resource};
use crate::schema::Block;
use crate::state::{
    decode_dynamic_value, decode_json_value, encode_dynamic_value, make_state, string_value,
    DynamicValue,
};
use crate::tfplugin6::provider_server::Provider;
use crate::tfplugin6::{self, *};

/// Nutanix Terraform Provider
pub struct NutanixProvider {
    /// API clients, set by `ConfigureProvider`.
    clients: Arc<RwLock<Option<Arc<Clients>>>>,
    /// Cancelled by `StopProvider`.
    cancel: CancellationToken,
}

impl Default for NutanixProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl NutanixProvider {
    pub fn new() -> Self {
        Self {
            clients: Arc::new(RwLock::new(None)),
            cancel: CancellationToken::new(),
        }
    }

    /// Token shared with every in-flight wait.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn clients(&self) -> anyhow::Result<Arc<Clients>> {
        self.clients
            .read()
            .await
            .clone()
            .ok_or_else(|| anyhow!("the provider has not been configured"))
    }

    fn resource(type_name: &str) -> Result<Box<dyn Resource>, Status> {
        resources::find(type_name)
            .ok_or_else(|| Status::not_found(format!("Unknown resource type: {}", type_name)))
    }

    fn data_source(type_name: &str) -> Result<Box<dyn DataSource>, Status> {
        data_sources::find(type_name)
            .ok_or_else(|| Status::not_found(format!("Unknown data source type: {}", type_name)))
    }
}

fn decode(value: Option<&tfplugin6::DynamicValue>) -> Result<DynamicValue, Status> {
    let decoded = match value {
        None => Ok(DynamicValue::Null),
        Some(v) if !v.msgpack.is_empty() => decode_dynamic_value(&v.msgpack),
        Some(v) => decode_json_value(&v.json),
    };
    decoded.map_err(|e| Status::invalid_argument(format!("Failed to decode value: {:#}", e)))
}

fn encode(value: &DynamicValue) -> Result<tfplugin6::DynamicValue, Status> {
    let msgpack = encode_dynamic_value(value)
        .map_err(|e| Status::internal(format!("Failed to encode state: {:#}", e)))?;
    Ok(tfplugin6::DynamicValue { msgpack, json: vec![] })
}

fn error_diagnostic(summary: String, err: &anyhow::Error) -> Diagnostic {
    error!("{}: {:#}", summary, err);
    Diagnostic {
        severity: diagnostic::Severity::Error as i32,
        summary,
        detail: format!("{:#}", err),
        attribute: None,
    }
}

fn warning_diagnostic(summary: String) -> Diagnostic {
    warn!("{}", summary);
    Diagnostic {
        severity: diagnostic::Severity::Warning as i32,
        summary,
        detail: String::new(),
        attribute: None,
    }
}

/// Copies top-level values the handler left out of `result` from `source`,
/// then shapes the result to `block`.
///
/// Handlers only report what the API returns; arguments the API never
/// echoes (passwords, create-only settings, `timeouts`) live on in state
/// through this.
fn finish_state(block: &Block, source: &DynamicValue, mut result: DynamicValue) -> DynamicValue {
    if let DynamicValue::Map(out) = &mut result {
        let names = block
            .attributes
            .iter()
            .map(|a| a.name)
            .chain(block.blocks.iter().map(|b| b.name));
        for name in names {
            if out.contains_key(name) {
                continue;
            }
            if let Some(v) = source.get(name).filter(|v| v.is_wholly_known()) {
                out.insert(name.to_string(), v.clone());
            }
        }
    }
    block.conform(&result)
}

#[tonic::async_trait]
impl Provider for NutanixProvider {
    async fn get_metadata(
        &self,
        _request: Request<get_metadata::Request>,
    ) -> Result<Response<get_metadata::Response>, Status> {
        debug!("GetMetadata called");

        Ok(Response::new(get_metadata::Response {
            server_capabilities: Some(ServerCapabilities {
                plan_destroy: true,
                get_provider_schema_optional: false,
                move_resource_state: false,
            }),
            diagnostics: vec![],
            data_sources: data_sources::all()
                .iter()
                .map(|d| get_metadata::DataSourceMetadata {
                    type_name: d.type_name().to_string(),
                })
                .collect(),
            resources: resources::all()
                .iter()
                .map(|r| get_metadata::ResourceMetadata {
                    type_name: r.type_name().to_string(),
                })
                .collect(),
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<get_provider_schema::Request>,
    ) -> Result<Response<get_provider_schema::Response>, Status> {
        info!("GetProviderSchema called");

        let resource_schemas: HashMap<String, tfplugin6::Schema> = resources::all()
            .iter()
            .map(|r| (r.type_name().to_string(), r.schema().to_proto()))
            .collect();
        let data_source_schemas: HashMap<String, tfplugin6::Schema> = data_sources::all()
            .iter()
            .map(|d| (d.type_name().to_string(), d.schema().to_proto()))
            .collect();

        Ok(Response::new(get_provider_schema::Response {
            provider: Some(provider_schema().to_proto()),
            resource_schemas,
            data_source_schemas,
            diagnostics: vec![],
            provider_meta: None,
            server_capabilities: Some(ServerCapabilities {
                plan_destroy: true,
                get_provider_schema_optional: false,
                move_resource_state: false,
            }),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<validate_provider_config::Request>,
    ) -> Result<Response<validate_provider_config::Response>, Status> {
        debug!("ValidateProviderConfig called");

        let config = decode(request.get_ref().config.as_ref())?;
        let diagnostics = provider_schema().block.validate(&config);

        Ok(Response::new(validate_provider_config::Response { diagnostics }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<validate_resource_config::Request>,
    ) -> Result<Response<validate_resource_config::Response>, Status> {
        let req = request.into_inner();
        debug!("ValidateResourceConfig called for {}", req.type_name);

        let resource = Self::resource(&req.type_name)?;
        let config = decode(req.config.as_ref())?;
        let mut diagnostics = resource.schema().block.validate(&config);
        if config.is_wholly_known() {
            if let Err(e) = resource.validate(&config) {
                diagnostics.push(error_diagnostic(
                    format!("Invalid {} configuration", req.type_name),
                    &e,
                ));
            }
        }

        Ok(Response::new(validate_resource_config::Response { diagnostics }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<validate_data_resource_config::Request>,
    ) -> Result<Response<validate_data_resource_config::Response>, Status> {
        let req = request.into_inner();
        debug!("ValidateDataResourceConfig called for {}", req.type_name);

        let data_source = Self::data_source(&req.type_name)?;
        let config = decode(req.config.as_ref())?;

        Ok(Response::new(validate_data_resource_config::Response {
            diagnostics: data_source.schema().block.validate(&config),
        }))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<upgrade_resource_state::Request>,
    ) -> Result<Response<upgrade_resource_state::Response>, Status> {
        let req = request.into_inner();
        debug!("UpgradeResourceState called for {} (version {})", req.type_name, req.version);

        let resource = Self::resource(&req.type_name)?;
        let raw = req.raw_state.map(|r| r.json).unwrap_or_default();
        let state = match decode_json_value(&raw) {
            Ok(state) => state,
            Err(e) => {
                return Ok(Response::new(upgrade_resource_state::Response {
                    upgraded_state: None,
                    diagnostics: vec![error_diagnostic(
                        format!("Error upgrading {} state", req.type_name),
                        &e,
                    )],
                }))
            }
        };

        let upgraded = resource.schema().block.conform(&state);
        Ok(Response::new(upgrade_resource_state::Response {
            upgraded_state: Some(encode(&upgraded)?),
            diagnostics: vec![],
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<configure_provider::Request>,
    ) -> Result<Response<configure_provider::Response>, Status> {
        let req = request.into_inner();
        info!("ConfigureProvider called (terraform {})", req.terraform_version);

        let value = decode(req.config.as_ref())?;
        let built = ProviderConfig::from_value(&value).and_then(|config| {
            let clients = Clients::new(&config, self.cancel.clone())?;
            Ok((clients, config.disabled_services()))
        });
        let (clients, disabled) = match built {
            Ok(built) => built,
            Err(e) => {
                return Ok(Response::new(configure_provider::Response {
                    diagnostics: vec![error_diagnostic(
                        "Failed to configure the Nutanix provider".to_string(),
                        &e,
                    )],
                }))
            }
        };

        let mut diagnostics = vec![];
        if !disabled.is_empty() {
            let names: Vec<&str> = disabled.iter().map(|s| s.name()).collect();
            diagnostics.push(warning_diagnostic(format!(
                concat!(
                    "Disabled Providers: {}. Please provide required fields ",
                    "in provider configuration to enable them. Refer docs."
                ),
                names.join(", ")
            )));
        }

        *self.clients.write().await = Some(Arc::new(clients));
        Ok(Response::new(configure_provider::Response { diagnostics }))
    }

    async fn read_resource(
        &self,
        request: Request<read_resource::Request>,
    ) -> Result<Response<read_resource::Response>, Status> {
        let req = request.into_inner();
        info!("ReadResource called for {}", req.type_name);

        let resource = Self::resource(&req.type_name)?;
        let current = decode(req.current_state.as_ref())?;
        if current.is_null() {
            return Ok(Response::new(read_resource::Response {
                new_state: req.current_state,
                diagnostics: vec![],
                private: req.private,
            }));
        }

        let result = match self.clients().await {
            Ok(clients) => resource.read(&clients, &current).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(Some(state)) => {
                let state = finish_state(&resource.schema().block, &current, state);
                Ok(Response::new(read_resource::Response {
                    new_state: Some(encode(&state)?),
                    diagnostics: vec![],
                    private: req.private,
                }))
            }
            Ok(None) => {
                warn!("{} no longer exists, removing it from state", req.type_name);
                Ok(Response::new(read_resource::Response {
                    new_state: Some(encode(&DynamicValue::Null)?),
                    diagnostics: vec![],
                    private: vec![],
                }))
            }
            Err(e) => Ok(Response::new(read_resource::Response {
                new_state: req.current_state,
                diagnostics: vec![error_diagnostic(format!("Error reading {}", req.type_name), &e)],
                private: req.private,
            })),
        }
    }

    async fn plan_resource_change(
        &self,
        request: Request<plan_resource_change::Request>,
    ) -> Result<Response<plan_resource_change::Response>, Status> {
        let req = request.into_inner();
        debug!("PlanResourceChange called for {}", req.type_name);

        let resource = Self::resource(&req.type_name)?;
        let proposed = decode(req.proposed_new_state.as_ref())?;
        if proposed.is_null() {
            return Ok(Response::new(plan_resource_change::Response {
                planned_state: req.proposed_new_state,
                requires_replace: vec![],
                planned_private: req.prior_private,
                diagnostics: vec![],
                legacy_type_system: true,
            }));
        }

        let prior = decode(req.prior_state.as_ref())?;
        let (planned, requires_replace) = resource.schema().block.plan(&prior, &proposed);
        if !requires_replace.is_empty() {
            debug!(
                "{} change requires replacement of {} attribute(s)",
                req.type_name,
                requires_replace.len()
            );
        }

        Ok(Response::new(plan_resource_change::Response {
            planned_state: Some(encode(&planned)?),
            requires_replace,
            planned_private: req.prior_private,
            diagnostics: vec![],
            legacy_type_system: true,
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<apply_resource_change::Request>,
    ) -> Result<Response<apply_resource_change::Response>, Status> {
        let req = request.into_inner();
        info!("ApplyResourceChange called for {}", req.type_name);

        let resource = Self::resource(&req.type_name)?;
        let prior = decode(req.prior_state.as_ref())?;
        let planned = decode(req.planned_state.as_ref())?;
        let block = resource.schema().block;

        let clients = match self.clients().await {
            Ok(clients) => clients,
            Err(e) => {
                return Ok(Response::new(apply_resource_change::Response {
                    new_state: req.prior_state,
                    private: vec![],
                    diagnostics: vec![error_diagnostic(
                        format!("Error applying {}", req.type_name),
                        &e,
                    )],
                    legacy_type_system: true,
                }))
            }
        };

        let (operation, result) = match (prior.is_null(), planned.is_null()) {
            (true, true) => ("applying", Ok(DynamicValue::Null)),
            (true, false) => (
                "creating",
                resource
                    .create(&clients, &planned)
                    .await
                    .map(|state| finish_state(&block, &planned, state)),
            ),
            (false, true) => (
                "deleting",
                resource.delete(&clients, &prior).await.map(|_| DynamicValue::Null),
            ),
            (false, false) => (
                "updating",
                resource
                    .update(&clients, &prior, &planned)
                    .await
                    .map(|state| finish_state(&block, &planned, state)),
            ),
        };

        match result {
            Ok(new_state) => {
                info!("{} {} finished", operation, req.type_name);
                Ok(Response::new(apply_resource_change::Response {
                    new_state: Some(encode(&new_state)?),
                    private: vec![],
                    diagnostics: vec![],
                    legacy_type_system: true,
                }))
            }
            // A failed create leaves nothing behind; a failed update or
            // delete keeps the prior state.
            Err(e) => Ok(Response::new(apply_resource_change::Response {
                new_state: if prior.is_null() { None } else { req.prior_state },
                private: vec![],
                diagnostics: vec![error_diagnostic(
                    format!("Error {} {}", operation, req.type_name),
                    &e,
                )],
                legacy_type_system: true,
            })),
        }
    }

    async fn import_resource_state(
        &self,
        request: Request<import_resource_state::Request>,
    ) -> Result<Response<import_resource_state::Response>, Status> {
        let req = request.into_inner();
        info!("ImportResourceState called for {} with ID {}", req.type_name, req.id);

        let resource = Self::resource(&req.type_name)?;
        let seed = make_state(vec![("id", string_value(&req.id))]);

        let result = match self.clients().await {
            Ok(clients) => resource.read(&clients, &seed).await,
            Err(e) => Err(e),
        };
        let state = match result {
            Ok(Some(state)) => finish_state(&resource.schema().block, &seed, state),
            Ok(None) => {
                let e = anyhow!("{} {} does not exist", req.type_name, req.id);
                return Ok(Response::new(import_resource_state::Response {
                    imported_resources: vec![],
                    diagnostics: vec![error_diagnostic(
                        "Cannot import non-existent remote object".to_string(),
                        &e,
                    )],
                }));
            }
            Err(e) => {
                return Ok(Response::new(import_resource_state::Response {
                    imported_resources: vec![],
                    diagnostics: vec![error_diagnostic(
                        format!("Error importing {}", req.type_name),
                        &e,
                    )],
                }))
            }
        };

        Ok(Response::new(import_resource_state::Response {
            imported_resources: vec![import_resource_state::ImportedResource {
                type_name: req.type_name,
                state: Some(encode(&state)?),
                private: vec![],
            }],
            diagnostics: vec![],
        }))
    }

    async fn read_data_source(
        &self,
        request: Request<read_data_source::Request>,
    ) -> Result<Response<read_data_source::Response>, Status> {
        let req = request.into_inner();
        info!("ReadDataSource called for {}", req.type_name);

        let data_source = Self::data_source(&req.type_name)?;
        let config = decode(req.config.as_ref())?;

        let result = match self.clients().await {
            Ok(clients) => data_source.read(&clients, &config).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(state) => {
                let state = finish_state(&data_source.schema().block, &config, state);
                Ok(Response::new(read_data_source::Response {
                    state: Some(encode(&state)?),
                    diagnostics: vec![],
                }))
            }
            Err(e) => Ok(Response::new(read_data_source::Response {
                state: None,
                diagnostics: vec![error_diagnostic(
                    format!("Error reading data source {}", req.type_name),
                    &e,
                )],
            })),
        }
    }

    async fn stop_provider(
        &self,
        _request: Request<stop_provider::Request>,
    ) -> Result<Response<stop_provider::Response>, Status> {
        info!("StopProvider called");
        self.cancel.cancel();
        Ok(Response::new(stop_provider::Response { error: String::new() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttrType, Attribute, NestedBlock};
    use crate::state::{bool_value, null_value};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dynamic(value: &DynamicValue) -> Option<tfplugin6::DynamicValue> {
        Some(encode(value).unwrap())
    }

    fn decoded(value: Option<tfplugin6::DynamicValue>) -> DynamicValue {
        decode(value.as_ref()).unwrap()
    }

    async fn configured(uri: &str) -> NutanixProvider {
        let provider = NutanixProvider::new();
        let config = make_state(vec![
            ("endpoint", string_value(uri)),
            ("username", string_value("admin")),
            ("password", string_value("secret")),
        ]);
        provider
            .configure_provider(Request::new(configure_provider::Request {
                terraform_version: "1.7.0".to_string(),
                config: dynamic(&config),
            }))
            .await
            .unwrap();
        provider
    }

    #[tokio::test]
    async fn schema_lists_every_resource_and_data_source() {
        let provider = NutanixProvider::new();

        let response = provider
            .get_provider_schema(Request::new(get_provider_schema::Request {}))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.resource_schemas.len(), resources::all().len());
        assert!(response.resource_schemas.contains_key("nutanix_volume_group_v2"));
        assert!(response.data_source_schemas.contains_key("nutanix_karbon_cluster_kubeconfig"));
        assert!(response.provider.is_some());
    }

    #[tokio::test]
    async fn configure_warns_about_disabled_services() {
        let provider = NutanixProvider::new();
        let config = make_state(vec![
            ("endpoint", string_value("pc.example.com")),
            ("username", string_value("admin")),
            ("password", string_value("secret")),
            ("foundation_endpoint", string_value("10.0.0.2")),
            ("ndb_endpoint", null_value()),
        ]);

        let response = provider
            .configure_provider(Request::new(configure_provider::Request {
                terraform_version: "1.7.0".to_string(),
                config: dynamic(&config),
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.diagnostics.len(), 1);
        let diagnostic = &response.diagnostics[0];
        assert_eq!(diagnostic.severity, diagnostic::Severity::Warning as i32);
        assert!(diagnostic.summary.starts_with("Disabled Providers: ndb."));
    }

    #[tokio::test]
    async fn validate_reports_bad_enum_values() {
        let provider = NutanixProvider::new();
        let config = make_state(vec![
            ("name", string_value("vg")),
            ("cluster_reference", string_value("c-1")),
            ("protocol", string_value("FIBRE")),
        ]);

        let response = provider
            .validate_resource_config(Request::new(validate_resource_config::Request {
                type_name: "nutanix_volume_group_v2".to_string(),
                config: dynamic(&config),
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].detail.contains("expected protocol to be one of"));
    }

    #[tokio::test]
    async fn plan_marks_force_new_changes() {
        let provider = NutanixProvider::new();
        let prior = make_state(vec![
            ("id", string_value("c1")),
            ("name", string_value("AppTier")),
            ("description", null_value()),
            ("api_version", string_value("3.1")),
            ("system_defined", bool_value(false)),
        ]);
        let proposed = make_state(vec![
            ("id", string_value("c1")),
            ("name", string_value("AppTier2")),
            ("description", null_value()),
            ("api_version", string_value("3.1")),
            ("system_defined", bool_value(false)),
        ]);

        let response = provider
            .plan_resource_change(Request::new(plan_resource_change::Request {
                type_name: "nutanix_category_key".to_string(),
                prior_state: dynamic(&prior),
                proposed_new_state: dynamic(&proposed),
                config: dynamic(&proposed),
                prior_private: vec![],
                provider_meta: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.requires_replace.len(), 1);
        assert!(response.legacy_type_system);
    }

    #[tokio::test]
    async fn apply_create_fills_computed_attributes() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/nutanix/v3/categories/AppTier"))
            .and(body_partial_json(json!({"name": "AppTier"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "api_version": "3.1",
                "name": "AppTier",
                "system_defined": false
            })))
            .expect(1)
            .mount(&server)
            .await;
        let provider = configured(&server.uri()).await;
        let planned = make_state(vec![
            ("id", DynamicValue::Unknown),
            ("name", string_value("AppTier")),
            ("description", null_value()),
            ("api_version", DynamicValue::Unknown),
            ("system_defined", DynamicValue::Unknown),
        ]);

        // Act
        let response = provider
            .apply_resource_change(Request::new(apply_resource_change::Request {
                type_name: "nutanix_category_key".to_string(),
                prior_state: dynamic(&DynamicValue::Null),
                planned_state: dynamic(&planned),
                config: dynamic(&planned),
                planned_private: vec![],
                provider_meta: None,
            }))
            .await
            .unwrap()
            .into_inner();

        // Assert
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = decoded(response.new_state);
        assert_eq!(state.get("id"), Some(&string_value("AppTier")));
        assert_eq!(state.get("system_defined"), Some(&bool_value(false)));
    }

    #[tokio::test]
    async fn read_of_vanished_resource_returns_null_state() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/nutanix/v3/roles/r-1"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "state": "ERROR",
                "code": 404,
                "message_list": [{"message": "ENTITY_NOT_FOUND"}]
            })))
            .mount(&server)
            .await;
        let provider = configured(&server.uri()).await;
        let current =
            make_state(vec![("id", string_value("r-1")), ("name", string_value("viewer"))]);

        // Act
        let response = provider
            .read_resource(Request::new(read_resource::Request {
                type_name: "nutanix_role".to_string(),
                current_state: dynamic(&current),
                private: vec![],
                provider_meta: None,
            }))
            .await
            .unwrap()
            .into_inner();

        // Assert
        assert!(response.diagnostics.is_empty());
        assert!(decoded(response.new_state).is_null());
    }

    #[tokio::test]
    async fn errors_carry_the_whole_chain() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/nutanix/v3/roles/r-1"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "state": "ERROR",
                "message_list": [{"message": "internal failure"}]
            })))
            .mount(&server)
            .await;
        let provider = configured(&server.uri()).await;
        let current = make_state(vec![("id", string_value("r-1"))]);

        // Act
        let response = provider
            .read_resource(Request::new(read_resource::Request {
                type_name: "nutanix_role".to_string(),
                current_state: dynamic(&current),
                private: vec![],
                provider_meta: None,
            }))
            .await
            .unwrap()
            .into_inner();

        // Assert
        let diagnostic = &response.diagnostics[0];
        assert_eq!(diagnostic.summary, "Error reading nutanix_role");
        assert!(diagnostic.detail.starts_with("error reading role r-1: "));
        assert!(diagnostic.detail.contains("internal failure"));
    }

    #[tokio::test]
    async fn import_seeds_the_id() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/nutanix/v3/categories/AppTier"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "api_version": "3.1",
                "name": "AppTier",
                "system_defined": false
            })))
            .expect(1)
            .mount(&server)
            .await;
        let provider = configured(&server.uri()).await;

        // Act
        let response = provider
            .import_resource_state(Request::new(import_resource_state::Request {
                type_name: "nutanix_category_key".to_string(),
                id: "AppTier".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();

        // Assert
        assert_eq!(response.imported_resources.len(), 1);
        let state = decoded(response.imported_resources[0].state.clone());
        assert_eq!(state.get("name"), Some(&string_value("AppTier")));
    }

    #[tokio::test]
    async fn upgrade_conforms_raw_state() {
        let provider = NutanixProvider::new();
        let raw = json!({"id": "AppTier", "name": "AppTier", "legacy_field": "x"});

        let response = provider
            .upgrade_resource_state(Request::new(upgrade_resource_state::Request {
                type_name: "nutanix_category_key".to_string(),
                version: 0,
                raw_state: Some(RawState {
                    json: serde_json::to_vec(&raw).unwrap(),
                    flatmap: HashMap::new(),
                }),
            }))
            .await
            .unwrap()
            .into_inner();

        let state = decoded(response.upgraded_state);
        assert!(state.get("legacy_field").is_none());
        assert_eq!(state.get("description"), Some(&null_value()));
        assert_eq!(state.get("name"), Some(&string_value("AppTier")));
    }

    #[tokio::test]
    async fn unconfigured_provider_reports_a_diagnostic() {
        let provider = NutanixProvider::new();
        let config = make_state(vec![("role_id", string_value("r-1"))]);

        let response = provider
            .read_data_source(Request::new(read_data_source::Request {
                type_name: "nutanix_role".to_string(),
                config: dynamic(&config),
                provider_meta: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(response.state.is_none());
        assert_eq!(response.diagnostics[0].detail, "the provider has not been configured");
    }

    #[tokio::test]
    async fn stop_cancels_waits() {
        let provider = NutanixProvider::new();
        let token = provider.cancellation();

        provider
            .stop_provider(Request::new(stop_provider::Request {}))
            .await
            .unwrap();

        assert!(token.is_cancelled());
    }

    #[test]
    fn finish_state_keeps_values_the_handler_omitted() {
        let block = Block::new(vec![
            Attribute::computed("id", AttrType::String),
            Attribute::optional("vm_password", AttrType::String),
            Attribute::computed("status", AttrType::String),
        ])
        .with_blocks(vec![NestedBlock::list(
            "cni_config",
            Block::new(vec![Attribute::optional("pod_ipv4_cidr", AttrType::String)]),
        )]);
        let planned = make_state(vec![
            ("vm_password", string_value("hunter2")),
            ("status", DynamicValue::Unknown),
            (
                "cni_config",
                crate::state::list_value(vec![make_state(vec![(
                    "pod_ipv4_cidr",
                    string_value("172.20.0.0/16"),
                )])]),
            ),
        ]);
        let result = make_state(vec![("id", string_value("db-1"))]);

        let state = finish_state(&block, &planned, result);

        assert_eq!(state.get("vm_password"), Some(&string_value("hunter2")));
        assert_eq!(state.get("status"), Some(&null_value()));
        assert_eq!(
            state.get("cni_config").and_then(DynamicValue::as_list).map(<[_]>::len),
            Some(1)
        );
    }
}
