//! Prism Central v4 task API.
//!
//! v4 services answer mutations with a task reference (`{data: {extId}}`).
//! The task is polled here and, once done, names the affected entities.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::http::{Credentials, HttpClient};
use crate::task::{
    wait_for_state, Refresh, StateChangeConf, STATE_CANCELED, STATE_FAILED,
};

pub const ABSOLUTE_PATH: &str = "api";
pub const USER_AGENT: &str = "nutanix/v4";
pub const REQUEST_ID_HEADER: &str = "NTNX-Request-Id";

/// `rel` of a volume group in `entitiesAffected`.
pub const REL_VOLUME_GROUP: &str = "volumes:config:volume-group";

/// Fresh idempotency key for one v4 mutation.
pub fn request_id() -> (&'static str, String) {
    (REQUEST_ID_HEADER, uuid::Uuid::new_v4().to_string())
}

/// `{ "data": T }` envelope of every v4 reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskReference {
    #[serde(default)]
    pub ext_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskErrorMessage {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntityReference {
    #[serde(default)]
    pub ext_id: Option<String>,
    #[serde(default)]
    pub rel: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub ext_id: Option<String>,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub progress_percentage: Option<i64>,
    #[serde(default)]
    pub error_messages: Vec<TaskErrorMessage>,
    #[serde(default)]
    pub entities_affected: Vec<EntityReference>,
}

impl Task {
    /// extId of the affected entity with relation `rel`.
    pub fn entity_ext_id(&self, rel: &str, kind: &str) -> Result<String> {
        self.entities_affected
            .iter()
            .find(|e| e.rel.as_deref() == Some(rel))
            .and_then(|e| e.ext_id.clone())
            .ok_or_else(|| {
                Error::Internal(format!(
                    "{} ext id not found in task {}",
                    kind,
                    self.ext_id.as_deref().unwrap_or_default()
                ))
            })
    }
}

pub struct PrismClient {
    http: HttpClient,
}

impl PrismClient {
    pub fn new(credentials: &Credentials) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(credentials, ABSOLUTE_PATH, USER_AGENT)?,
        })
    }

    pub async fn get_task(&self, ext_id: &str) -> Result<Task> {
        let envelope: Envelope<Task> = self
            .http
            .get(&format!("/prism/v4.0/config/tasks/{}", ext_id))
            .await?;
        Ok(envelope.data)
    }

    pub async fn refresh_task(&self, ext_id: &str) -> Result<Refresh<Task>> {
        let task = self.get_task(ext_id).await?;
        let status = task.status.clone().unwrap_or_default();
        if status == STATE_FAILED || status == STATE_CANCELED {
            let message = task
                .error_messages
                .first()
                .and_then(|m| m.message.as_deref())
                .unwrap_or_default();
            return Err(Error::TaskFailed {
                id: ext_id.to_string(),
                detail: format!(
                    "error_detail: {}, progress_message: {}",
                    message,
                    task.progress_percentage.unwrap_or_default()
                ),
            });
        }
        Ok(Refresh::new(task, status))
    }

    pub async fn wait_for_task(
        &self,
        ext_id: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Task> {
        self.wait_for_task_with(ext_id, &StateChangeConf::prism_v4(timeout), cancel)
            .await
    }

    pub async fn wait_for_task_with(
        &self,
        ext_id: &str,
        conf: &StateChangeConf,
        cancel: &CancellationToken,
    ) -> Result<Task> {
        wait_for_state(ext_id, conf, cancel, || self.refresh_task(ext_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TASK: &str = "ZXJnb24=:5b2d9b1b-4c1d-4a5c-9f8e-1c2d3e4f5a6b";

    async fn setup() -> (MockServer, PrismClient) {
        let server = MockServer::start().await;
        let credentials = Credentials::new(server.uri(), "", "admin", "secret");
        let client = PrismClient::new(&credentials).unwrap();
        (server, client)
    }

    fn fast() -> StateChangeConf {
        StateChangeConf::prism_v4(Duration::from_secs(5)).with_min_timeout(Duration::from_millis(1))
    }

    #[test]
    fn entity_ext_id_picks_matching_rel() {
        let task = Task {
            ext_id: Some(TASK.to_string()),
            entities_affected: vec![
                EntityReference {
                    ext_id: Some("cluster-1".to_string()),
                    rel: Some("clustermgmt:config:cluster".to_string()),
                    name: None,
                },
                EntityReference {
                    ext_id: Some("vg-1".to_string()),
                    rel: Some(REL_VOLUME_GROUP.to_string()),
                    name: None,
                },
            ],
            ..Default::default()
        };

        assert_eq!(task.entity_ext_id(REL_VOLUME_GROUP, "Volume group").unwrap(), "vg-1");
    }

    #[test]
    fn missing_entity_names_the_kind() {
        let err = Task::default()
            .entity_ext_id(REL_VOLUME_GROUP, "Volume group")
            .unwrap_err();
        assert!(err.to_string().contains("Volume group"));
    }

    #[tokio::test]
    async fn wait_for_task_polls_until_succeeded() {
        // Arrange
        let (server, client) = setup().await;
        let task_path = format!("/api/prism/v4.0/config/tasks/{}", TASK);
        Mock::given(method("GET"))
            .and(path(task_path.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"extId": TASK, "status": "RUNNING", "progressPercentage": 50}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(task_path.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {
                "extId": TASK, "status": "SUCCEEDED", "progressPercentage": 100,
                "entitiesAffected": [{"extId": "vg-1", "rel": REL_VOLUME_GROUP}]
            }})))
            .mount(&server)
            .await;

        // Act
        let task = client
            .wait_for_task_with(TASK, &fast(), &CancellationToken::new())
            .await
            .unwrap();

        // Assert
        assert_eq!(task.entity_ext_id(REL_VOLUME_GROUP, "Volume group").unwrap(), "vg-1");
    }

    #[tokio::test]
    async fn canceled_task_is_an_error() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path(format!("/api/prism/v4.0/config/tasks/{}", TASK)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {
                "extId": TASK, "status": "CANCELED", "progressPercentage": 10,
                "errorMessages": [{"message": "Task was canceled by user"}]
            }})))
            .mount(&server)
            .await;

        let err = client
            .wait_for_task_with(TASK, &fast(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "error_detail: Task was canceled by user, progress_message: 10"
        );
    }
}
