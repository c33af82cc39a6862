//! Volumes v4 client.

use reqwest::header::ETAG;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::http::{decode_body, Credentials, HttpClient};
use crate::prism::{request_id, Envelope, TaskReference, ABSOLUTE_PATH, USER_AGENT};

const VOLUME_GROUPS: &str = "/volumes/v4.0/config/volume-groups";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IscsiFeatures {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_authentications: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlashMode {
    #[serde(default)]
    pub is_enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageFeatures {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flash_mode: Option<FlashMode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uris: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeDisk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_size_bytes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_data_source_reference: Option<DataSourceReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_storage_features: Option<StorageFeatures>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_load_balance_vm_attachments: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharing_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_authentications: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iscsi_features: Option<IscsiFeatures>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_features: Option<StorageFeatures>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disks: Option<Vec<VolumeDisk>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

/// A volume group together with the `ETag` it was read with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tagged<T> {
    pub value: T,
    pub etag: Option<String>,
}

pub struct VolumesClient {
    http: HttpClient,
}

impl VolumesClient {
    pub fn new(credentials: &Credentials) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(credentials, ABSOLUTE_PATH, USER_AGENT)?,
        })
    }

    /// Returns the task creating the group.
    pub async fn create_volume_group(&self, body: &VolumeGroup) -> Result<TaskReference> {
        let response = self
            .http
            .send(Method::POST, VOLUME_GROUPS, Some(body), &[request_id()])
            .await?;
        let envelope: Envelope<TaskReference> = decode_body(response).await?;
        Ok(envelope.data)
    }

    pub async fn get_volume_group(&self, ext_id: &str) -> Result<Tagged<VolumeGroup>> {
        let response = self
            .http
            .send::<()>(Method::GET, &format!("{}/{}", VOLUME_GROUPS, ext_id), None, &[])
            .await?;
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let envelope: Envelope<VolumeGroup> = decode_body(response).await?;
        Ok(Tagged {
            value: envelope.data,
            etag,
        })
    }

    pub async fn update_volume_group(
        &self,
        ext_id: &str,
        body: &VolumeGroup,
        etag: Option<&str>,
    ) -> Result<TaskReference> {
        let mut headers = vec![request_id()];
        if let Some(etag) = etag {
            headers.push(("If-Match", etag.to_string()));
        }
        let response = self
            .http
            .send(Method::PATCH, &format!("{}/{}", VOLUME_GROUPS, ext_id), Some(body), &headers)
            .await?;
        let envelope: Envelope<TaskReference> = decode_body(response).await?;
        Ok(envelope.data)
    }

    pub async fn delete_volume_group(&self, ext_id: &str) -> Result<TaskReference> {
        let response = self
            .http
            .send::<()>(
                Method::DELETE,
                &format!("{}/{}", VOLUME_GROUPS, ext_id),
                None,
                &[request_id()],
            )
            .await?;
        let envelope: Envelope<TaskReference> = decode_body(response).await?;
        Ok(envelope.data)
    }

    pub async fn list_volume_groups(&self) -> Result<Vec<VolumeGroup>> {
        let envelope: Envelope<Option<Vec<VolumeGroup>>> = self.http.get(VOLUME_GROUPS).await?;
        Ok(envelope.data.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, VolumesClient) {
        let server = MockServer::start().await;
        let credentials = Credentials::new(server.uri(), "", "admin", "secret");
        let client = VolumesClient::new(&credentials).unwrap();
        (server, client)
    }

    #[tokio::test]
    async fn create_sends_request_id_and_returns_task() {
        // Arrange
        let (server, client) = setup().await;
        Mock::given(method("POST"))
            .and(path("/api/volumes/v4.0/config/volume-groups"))
            .and(header_exists("NTNX-Request-Id"))
            .and(body_json(json!({
                "name": "vg1",
                "sharingStatus": "SHARED",
                "clusterReference": "cluster-1",
                "disks": [{"diskSizeBytes": 1073741824}]
            })))
            .respond_with(
                ResponseTemplate::new(202).set_body_json(json!({"data": {"extId": "task-1"}})),
            )
            .expect(1)
            .mount(&server)
            .await;
        let body = VolumeGroup {
            name: Some("vg1".to_string()),
            sharing_status: Some("SHARED".to_string()),
            cluster_reference: Some("cluster-1".to_string()),
            disks: Some(vec![VolumeDisk {
                disk_size_bytes: Some(1073741824),
                ..Default::default()
            }]),
            ..Default::default()
        };

        // Act
        let task = client.create_volume_group(&body).await.unwrap();

        // Assert
        assert_eq!(task.ext_id.as_deref(), Some("task-1"));
    }

    #[tokio::test]
    async fn get_keeps_etag_and_update_sends_if_match() {
        // Arrange
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/api/volumes/v4.0/config/volume-groups/vg-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "W/\"abc\"")
                    .set_body_json(json!({
                        "data": {"extId": "vg-1", "name": "vg1", "usageType": "USER"}
                    })),
            )
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/api/volumes/v4.0/config/volume-groups/vg-1"))
            .and(header("If-Match", "W/\"abc\""))
            .respond_with(
                ResponseTemplate::new(202).set_body_json(json!({"data": {"extId": "task-2"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        // Act
        let current = client.get_volume_group("vg-1").await.unwrap();
        let task = client
            .update_volume_group("vg-1", &current.value, current.etag.as_deref())
            .await
            .unwrap();

        // Assert
        assert_eq!(current.value.usage_type.as_deref(), Some("USER"));
        assert_eq!(task.ext_id.as_deref(), Some("task-2"));
    }

    #[tokio::test]
    async fn delete_returns_task() {
        let (server, client) = setup().await;
        Mock::given(method("DELETE"))
            .and(path("/api/volumes/v4.0/config/volume-groups/vg-1"))
            .respond_with(
                ResponseTemplate::new(202).set_body_json(json!({"data": {"extId": "task-3"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let task = client.delete_volume_group("vg-1").await.unwrap();

        assert_eq!(task.ext_id.as_deref(), Some("task-3"));
    }

    #[tokio::test]
    async fn list_tolerates_missing_data() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/api/volumes/v4.0/config/volume-groups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
            .mount(&server)
            .await;

        assert!(client.list_volume_groups().await.unwrap().is_empty());
    }
}
