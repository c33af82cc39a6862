//! NDB (Era) client.
//!
//! NDB speaks camelCase JSON under `/era/v0.9`. Mutations return an
//! operation id that is polled through `/operations/{id}`.

use std::time::Duration;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::http::{Credentials, HttpClient};
use crate::task::{wait_for_state, Refresh, StateChangeConf, STATE_COMPLETED, STATE_PENDING};

pub const ABSOLUTE_PATH: &str = "era/v0.9";
pub const USER_AGENT: &str = "nutanix/era";

/// Operation status codes as reported by NDB.
pub const OPERATION_FAILED: &str = "4";
pub const OPERATION_COMPLETED: &str = "5";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotTimeOfDay {
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContinuousSchedule {
    pub enabled: bool,
    pub log_backup_interval: i64,
    pub snapshots_per_day: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySchedule {
    pub enabled: bool,
    pub day_of_week: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySchedule {
    pub enabled: bool,
    pub day_of_month: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuartelySchedule {
    pub enabled: bool,
    pub start_month: String,
    pub day_of_month: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct YearlySchedule {
    pub enabled: bool,
    pub day_of_month: i64,
    pub month: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DailySchedule {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_time_of_day: Option<SnapshotTimeOfDay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuous_schedule: Option<ContinuousSchedule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly_schedule: Option<WeeklySchedule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_schedule: Option<DailySchedule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_schedule: Option<MonthlySchedule>,
    /// Spelled the way the NDB API spells it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quartely_schedule: Option<QuartelySchedule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yearly_schedule: Option<YearlySchedule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeMachineInfo {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub sla_id: String,
    pub schedule: Schedule,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    pub auto_tune_log_drive: bool,
}

/// `{name, value}` pair used for action arguments and node properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NameValue {
    pub name: String,
    pub value: Value,
}

impl NameValue {
    pub fn new(name: &str, value: impl Into<Value>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionNode {
    pub properties: Vec<NameValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vm_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_profile_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dbserver_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nx_cluster_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_profile_id: Option<String>,
}

/// Body of `POST /databases/provision`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionDatabaseRequest {
    pub create_dbserver: bool,
    pub clustered: bool,
    pub auto_tune_staging_drive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dbserver_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software_profile_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software_profile_version_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_profile_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_profile_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_parameter_profile_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_db_server_time_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nx_cluster_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_public_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vm_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_machine_info: Option<TimeMachineInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub action_arguments: Vec<NameValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<ProvisionNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

/// Reply to provision and delete calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationReply {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub work_id: String,
    #[serde(default)]
    pub operation_id: String,
    #[serde(default)]
    pub dbserver_id: String,
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub entity_name: String,
    #[serde(default)]
    pub entity_type: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteDatabaseRequest {
    pub delete: bool,
    pub remove: bool,
    pub soft_remove: bool,
    pub forced: bool,
    pub delete_time_machine: bool,
    pub delete_logical_cluster: bool,
}

impl DeleteDatabaseRequest {
    /// Full teardown: database, time machine and logical cluster.
    pub fn full() -> Self {
        Self {
            delete: true,
            remove: false,
            soft_remove: false,
            forced: false,
            delete_time_machine: true,
            delete_logical_cluster: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDatabaseRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub reset_name: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub reset_description: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub reset_tags: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDatabaseResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DatabaseProperty {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub date_created: String,
    #[serde(default)]
    pub date_modified: String,
    #[serde(default)]
    pub properties: Vec<DatabaseProperty>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub clustered: bool,
    #[serde(default)]
    pub clone: bool,
    #[serde(default)]
    pub era_created: bool,
    #[serde(default)]
    pub placeholder: bool,
    #[serde(default)]
    pub database_name: String,
    #[serde(default, rename = "type")]
    pub database_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub database_status: String,
    #[serde(default)]
    pub time_machine_id: String,
    #[serde(default)]
    pub time_zone: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub percentage_complete: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub entity_name: Option<String>,
    #[serde(default)]
    pub entity_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileVersion {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub engine_type: Option<String>,
    #[serde(default, rename = "type")]
    pub profile_type: Option<String>,
    #[serde(default)]
    pub topology: Option<String>,
    #[serde(default)]
    pub latest_version_id: Option<String>,
    #[serde(default)]
    pub versions: Vec<ProfileVersion>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EraCluster {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unique_name: Option<String>,
    #[serde(default)]
    pub ip_addresses: Vec<String>,
    #[serde(default, rename = "nxClusterUUID")]
    pub nx_cluster_uuid: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub healthy: bool,
}

pub struct EraClient {
    http: HttpClient,
}

impl EraClient {
    pub fn new(credentials: &Credentials) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(credentials, ABSOLUTE_PATH, USER_AGENT)?,
        })
    }

    pub async fn provision_database(
        &self,
        request: &ProvisionDatabaseRequest,
    ) -> Result<OperationReply> {
        self.http
            .request(Method::POST, "/databases/provision", Some(request))
            .await
    }

    pub async fn update_database(
        &self,
        id: &str,
        request: &UpdateDatabaseRequest,
    ) -> Result<UpdateDatabaseResponse> {
        self.http
            .request(Method::PATCH, &format!("/databases/{}", id), Some(request))
            .await
    }

    pub async fn delete_database(
        &self,
        id: &str,
        request: &DeleteDatabaseRequest,
    ) -> Result<OperationReply> {
        self.http
            .request(Method::DELETE, &format!("/databases/{}", id), Some(request))
            .await
    }

    pub async fn get_database(&self, id: &str) -> Result<Database> {
        self.http
            .get(&format!("/databases/{}?detailed=true&load-dbserver-cluster=true", id))
            .await
    }

    pub async fn get_operation(&self, id: &str) -> Result<Operation> {
        self.http
            .get(&format!("/operations/{}?display=false", id))
            .await
    }

    pub async fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.http.get("/profiles").await
    }

    pub async fn list_clusters(&self) -> Result<Vec<EraCluster>> {
        self.http.get("/clusters").await
    }

    /// One poll of an NDB operation.
    pub async fn refresh_operation(&self, id: &str) -> Result<Refresh<Operation>> {
        let operation = self.get_operation(id).await?;
        match operation.status.as_deref() {
            Some(OPERATION_COMPLETED) => Ok(Refresh::new(operation, STATE_COMPLETED)),
            Some(OPERATION_FAILED) => Err(Error::TaskFailed {
                id: id.to_string(),
                detail: format!(
                    "error_detail: {}, percentage_complete: {}",
                    operation.message.as_deref().unwrap_or_default(),
                    operation.percentage_complete.as_deref().unwrap_or_default()
                ),
            }),
            _ => Ok(Refresh::new(operation, STATE_PENDING)),
        }
    }

    pub async fn wait_for_operation(
        &self,
        id: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Operation> {
        self.wait_for_operation_with(id, &StateChangeConf::era(timeout), cancel)
            .await
    }

    pub async fn wait_for_operation_with(
        &self,
        id: &str,
        conf: &StateChangeConf,
        cancel: &CancellationToken,
    ) -> Result<Operation> {
        wait_for_state(id, conf, cancel, || self.refresh_operation(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, EraClient) {
        let server = MockServer::start().await;
        let credentials = Credentials::new(server.uri(), "", "admin", "secret");
        let client = EraClient::new(&credentials).unwrap();
        (server, client)
    }

    fn fast() -> StateChangeConf {
        StateChangeConf::era(Duration::from_secs(5))
            .with_delay(Duration::ZERO)
            .with_min_timeout(Duration::from_millis(1))
    }

    #[test]
    fn provision_request_uses_camel_case_keys() {
        let request = ProvisionDatabaseRequest {
            create_dbserver: true,
            auto_tune_staging_drive: true,
            node_count: Some(1),
            database_type: Some("postgres_database".to_string()),
            db_parameter_profile_id: Some("dbp-1".to_string()),
            action_arguments: vec![NameValue::new("listener_port", "5432")],
            ..Default::default()
        };

        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["createDbserver"], true);
        assert_eq!(value["autoTuneStagingDrive"], true);
        assert_eq!(value["nodeCount"], 1);
        assert_eq!(value["databaseType"], "postgres_database");
        assert_eq!(value["dbParameterProfileId"], "dbp-1");
        assert_eq!(value["actionArguments"][0], json!({"name": "listener_port", "value": "5432"}));
        assert!(value.get("nodes").is_none());
        assert!(value.get("timeMachineInfo").is_none());
    }

    #[tokio::test]
    async fn provision_posts_and_returns_operation() {
        // Arrange
        let (server, client) = setup().await;
        Mock::given(method("POST"))
            .and(path("/era/v0.9/databases/provision"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "db1", "workId": "w-1", "operationId": "op-1",
                "dbserverId": "dbs-1", "entityId": "db-1", "entityName": "db1",
                "entityType": "ERA_DATABASE", "status": "PENDING"
            })))
            .expect(1)
            .mount(&server)
            .await;

        // Act
        let reply = client
            .provision_database(&ProvisionDatabaseRequest::default())
            .await
            .unwrap();

        // Assert
        assert_eq!(reply.operation_id, "op-1");
        assert_eq!(reply.entity_id, "db-1");
    }

    #[tokio::test]
    async fn delete_sends_teardown_body() {
        let (server, client) = setup().await;
        Mock::given(method("DELETE"))
            .and(path("/era/v0.9/databases/db-1"))
            .and(body_json(json!({
                "delete": true, "remove": false, "softRemove": false, "forced": false,
                "deleteTimeMachine": true, "deleteLogicalCluster": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"operationId": "op-2"})))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client
            .delete_database("db-1", &DeleteDatabaseRequest::full())
            .await
            .unwrap();

        assert_eq!(reply.operation_id, "op-2");
    }

    #[tokio::test]
    async fn update_patches_only_set_fields() {
        let (server, client) = setup().await;
        Mock::given(method("PATCH"))
            .and(path("/era/v0.9/databases/db-1"))
            .and(body_json(json!({"name": "db2", "resetName": true})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "db-1", "name": "db2"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let updated = client
            .update_database(
                "db-1",
                &UpdateDatabaseRequest {
                    name: "db2".to_string(),
                    reset_name: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "db2");
    }

    #[tokio::test]
    async fn get_database_asks_for_details() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/era/v0.9/databases/db-1"))
            .and(query_param("detailed", "true"))
            .and(query_param("load-dbserver-cluster", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "db-1", "name": "db1", "type": "postgres_database", "status": "READY",
                "properties": [{"name": "db_parameter_profile_id", "value": "dbp-1"}]
            })))
            .mount(&server)
            .await;

        let database = client.get_database("db-1").await.unwrap();

        assert_eq!(database.database_type, "postgres_database");
        assert_eq!(database.properties[0].value, "dbp-1");
    }

    #[tokio::test]
    async fn wait_for_operation_completes_on_status_five() {
        // Arrange
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/era/v0.9/operations/op-1"))
            .and(query_param("display", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "op-1", "status": "1", "percentageComplete": "40"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/era/v0.9/operations/op-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "op-1", "status": "5", "percentageComplete": "100"
            })))
            .mount(&server)
            .await;

        // Act
        let operation = client
            .wait_for_operation_with("op-1", &fast(), &CancellationToken::new())
            .await
            .unwrap();

        // Assert
        assert_eq!(operation.percentage_complete.as_deref(), Some("100"));
    }

    #[tokio::test]
    async fn failed_operation_reports_message_and_percentage() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/era/v0.9/operations/op-3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "op-3",
                "status": "4",
                "percentageComplete": "20",
                "message": "Failed to provision VM"
            })))
            .mount(&server)
            .await;

        let err = client
            .wait_for_operation_with("op-3", &fast(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "error_detail: Failed to provision VM, percentage_complete: 20"
        );
    }

    #[tokio::test]
    async fn profiles_are_listed() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/era/v0.9/profiles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "id": "p-1",
                    "name": "DEFAULT_OOB_SMALL_COMPUTE",
                    "type": "Compute",
                    "engineType": "Generic"
                },
                {
                    "id": "p-2",
                    "name": "POSTGRES_15",
                    "type": "Software",
                    "engineType": "postgres_database"
                }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let profiles = client.list_profiles().await.unwrap();

        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[1].profile_type.as_deref(), Some("Software"));
        assert_eq!(profiles[1].engine_type.as_deref(), Some("postgres_database"));
    }
}
