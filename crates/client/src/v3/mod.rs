//! Prism Central v3 intent API client.

pub mod structs;

use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};
use crate::http::{Credentials, HttpClient};
use crate::task::{
    task_failure_detail, wait_for_state, Refresh, StateChangeConf, STATE_FAILED, STATE_INVALID_UUID,
};

pub use structs::*;

pub const ABSOLUTE_PATH: &str = "api/nutanix/v3";
pub const USER_AGENT: &str = "nutanix/v3";
/// Page size used by every `list_all_*` call.
pub const ITEMS_PER_PAGE: i64 = 100;

pub struct V3Client {
    http: HttpClient,
}

impl V3Client {
    pub fn new(credentials: &Credentials) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(credentials, ABSOLUTE_PATH, USER_AGENT)?,
        })
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    async fn post<B: Serialize, D: DeserializeOwned>(&self, path: &str, body: &B) -> Result<D> {
        self.http.request(Method::POST, path, Some(body)).await
    }

    async fn put<B: Serialize, D: DeserializeOwned>(&self, path: &str, body: &B) -> Result<D> {
        self.http.request(Method::PUT, path, Some(body)).await
    }

    async fn delete<D: DeserializeOwned>(&self, path: &str) -> Result<D> {
        self.http.request::<(), D>(Method::DELETE, path, None).await
    }

    /// Collects every page of a `/list` endpoint into one response.
    ///
    /// The first page is fetched with `length = 100`; when more entities
    /// match, the list is walked again from offset 0.
    async fn list_all<E: DeserializeOwned>(
        &self,
        path: &str,
        kind: &str,
        filter: Option<&str>,
    ) -> Result<ListResponse<E>> {
        let mut request = DsMetadata {
            kind: Some(kind.to_string()),
            length: Some(ITEMS_PER_PAGE),
            filter: filter.filter(|f| !f.is_empty()).map(str::to_string),
            ..Default::default()
        };

        let mut response: ListResponse<E> = self.post(path, &request).await?;
        let total = response
            .metadata
            .as_ref()
            .and_then(|m| m.total_matches)
            .unwrap_or(0);
        if total <= ITEMS_PER_PAGE {
            return Ok(response);
        }

        debug!("{} has {} matches, paging", path, total);
        let mut entities = Vec::with_capacity(total as usize);
        let mut offset = 0;
        while offset < total {
            request.offset = Some(offset);
            let page: ListResponse<E> = self.post(path, &request).await?;
            if page.entities.is_empty() {
                break;
            }
            entities.extend(page.entities);
            offset += ITEMS_PER_PAGE;
        }
        response.entities = entities;
        Ok(response)
    }

    // Virtual machines

    pub async fn create_vm(&self, body: &VmIntentInput) -> Result<VmIntentResponse> {
        self.post("/vms", body).await
    }

    pub async fn get_vm(&self, uuid: &str) -> Result<VmIntentResponse> {
        self.http.get(&format!("/vms/{}", uuid)).await
    }

    pub async fn update_vm(&self, uuid: &str, body: &VmIntentInput) -> Result<VmIntentResponse> {
        self.put(&format!("/vms/{}", uuid), body).await
    }

    pub async fn delete_vm(&self, uuid: &str) -> Result<DeleteResponse> {
        self.delete(&format!("/vms/{}", uuid)).await
    }

    pub async fn list_vm(&self, request: &DsMetadata) -> Result<VmListIntentResponse> {
        self.post("/vms/list", request).await
    }

    pub async fn list_all_vm(&self, filter: Option<&str>) -> Result<VmListIntentResponse> {
        self.list_all("/vms/list", "vm", filter).await
    }

    // Subnets

    pub async fn create_subnet(&self, body: &SubnetIntentInput) -> Result<SubnetIntentResponse> {
        self.post("/subnets", body).await
    }

    pub async fn get_subnet(&self, uuid: &str) -> Result<SubnetIntentResponse> {
        self.http.get(&format!("/subnets/{}", uuid)).await
    }

    pub async fn update_subnet(
        &self,
        uuid: &str,
        body: &SubnetIntentInput,
    ) -> Result<SubnetIntentResponse> {
        self.put(&format!("/subnets/{}", uuid), body).await
    }

    pub async fn delete_subnet(&self, uuid: &str) -> Result<DeleteResponse> {
        self.delete(&format!("/subnets/{}", uuid)).await
    }

    pub async fn list_subnet(&self, request: &DsMetadata) -> Result<SubnetListIntentResponse> {
        self.post("/subnets/list", request).await
    }

    pub async fn list_all_subnet(&self, filter: Option<&str>) -> Result<SubnetListIntentResponse> {
        self.list_all("/subnets/list", "subnet", filter).await
    }

    // Images

    pub async fn create_image(&self, body: &ImageIntentInput) -> Result<ImageIntentResponse> {
        self.post("/images", body).await
    }

    pub async fn get_image(&self, uuid: &str) -> Result<ImageIntentResponse> {
        self.http.get(&format!("/images/{}", uuid)).await
    }

    pub async fn update_image(
        &self,
        uuid: &str,
        body: &ImageIntentInput,
    ) -> Result<ImageIntentResponse> {
        self.put(&format!("/images/{}", uuid), body).await
    }

    pub async fn delete_image(&self, uuid: &str) -> Result<DeleteResponse> {
        self.delete(&format!("/images/{}", uuid)).await
    }

    pub async fn list_image(&self, request: &DsMetadata) -> Result<ImageListIntentResponse> {
        self.post("/images/list", request).await
    }

    pub async fn list_all_image(&self, filter: Option<&str>) -> Result<ImageListIntentResponse> {
        self.list_all("/images/list", "image", filter).await
    }

    // Clusters

    pub async fn get_cluster(&self, uuid: &str) -> Result<ClusterIntentResponse> {
        self.http.get(&format!("/clusters/{}", uuid)).await
    }

    pub async fn list_cluster(&self, request: &DsMetadata) -> Result<ClusterListIntentResponse> {
        self.post("/clusters/list", request).await
    }

    pub async fn list_all_cluster(
        &self,
        filter: Option<&str>,
    ) -> Result<ClusterListIntentResponse> {
        self.list_all("/clusters/list", "cluster", filter).await
    }

    // Categories

    pub async fn create_or_update_category_key(
        &self,
        body: &CategoryKey,
    ) -> Result<CategoryKeyStatus> {
        let name = body.name.as_deref().unwrap_or_default();
        self.put(&format!("/categories/{}", name), body).await
    }

    pub async fn get_category_key(&self, name: &str) -> Result<CategoryKeyStatus> {
        self.http.get(&format!("/categories/{}", name)).await
    }

    pub async fn delete_category_key(&self, name: &str) -> Result<()> {
        self.http
            .send::<()>(Method::DELETE, &format!("/categories/{}", name), None, &[])
            .await?;
        Ok(())
    }

    pub async fn list_category_keys(
        &self,
        request: &DsMetadata,
    ) -> Result<CategoryKeyListResponse> {
        self.post("/categories/list", request).await
    }

    pub async fn list_category_values(
        &self,
        name: &str,
        request: &DsMetadata,
    ) -> Result<CategoryValueListResponse> {
        self.post(&format!("/categories/{}/list", name), request).await
    }

    pub async fn create_or_update_category_value(
        &self,
        name: &str,
        body: &CategoryValue,
    ) -> Result<CategoryValueStatus> {
        let value = body.value.as_deref().unwrap_or_default();
        self.put(&format!("/categories/{}/{}", name, value), body).await
    }

    pub async fn get_category_value(&self, name: &str, value: &str) -> Result<CategoryValueStatus> {
        self.http.get(&format!("/categories/{}/{}", name, value)).await
    }

    pub async fn delete_category_value(&self, name: &str, value: &str) -> Result<()> {
        self.http
            .send::<()>(Method::DELETE, &format!("/categories/{}/{}", name, value), None, &[])
            .await?;
        Ok(())
    }

    // Projects

    pub async fn create_project(&self, body: &ProjectIntentInput) -> Result<ProjectIntentResponse> {
        self.post("/projects", body).await
    }

    pub async fn get_project(&self, uuid: &str) -> Result<ProjectIntentResponse> {
        self.http.get(&format!("/projects/{}", uuid)).await
    }

    pub async fn update_project(
        &self,
        uuid: &str,
        body: &ProjectIntentInput,
    ) -> Result<ProjectIntentResponse> {
        self.put(&format!("/projects/{}", uuid), body).await
    }

    pub async fn delete_project(&self, uuid: &str) -> Result<DeleteResponse> {
        self.delete(&format!("/projects/{}", uuid)).await
    }

    pub async fn list_project(&self, request: &DsMetadata) -> Result<ProjectListIntentResponse> {
        self.post("/projects/list", request).await
    }

    pub async fn list_all_project(
        &self,
        filter: Option<&str>,
    ) -> Result<ProjectListIntentResponse> {
        self.list_all("/projects/list", "project", filter).await
    }

    // Roles

    pub async fn create_role(&self, body: &RoleIntentInput) -> Result<RoleIntentResponse> {
        self.post("/roles", body).await
    }

    pub async fn get_role(&self, uuid: &str) -> Result<RoleIntentResponse> {
        self.http.get(&format!("/roles/{}", uuid)).await
    }

    pub async fn update_role(
        &self,
        uuid: &str,
        body: &RoleIntentInput,
    ) -> Result<RoleIntentResponse> {
        self.put(&format!("/roles/{}", uuid), body).await
    }

    pub async fn delete_role(&self, uuid: &str) -> Result<DeleteResponse> {
        self.delete(&format!("/roles/{}", uuid)).await
    }

    pub async fn list_role(&self, request: &DsMetadata) -> Result<RoleListIntentResponse> {
        self.post("/roles/list", request).await
    }

    pub async fn list_all_role(&self, filter: Option<&str>) -> Result<RoleListIntentResponse> {
        self.list_all("/roles/list", "role", filter).await
    }

    // Access control policies

    pub async fn create_access_control_policy(
        &self,
        body: &AccessControlPolicyIntentInput,
    ) -> Result<AccessControlPolicyIntentResponse> {
        self.post("/access_control_policies", body).await
    }

    pub async fn get_access_control_policy(
        &self,
        uuid: &str,
    ) -> Result<AccessControlPolicyIntentResponse> {
        self.http.get(&format!("/access_control_policies/{}", uuid)).await
    }

    pub async fn update_access_control_policy(
        &self,
        uuid: &str,
        body: &AccessControlPolicyIntentInput,
    ) -> Result<AccessControlPolicyIntentResponse> {
        self.put(&format!("/access_control_policies/{}", uuid), body).await
    }

    pub async fn delete_access_control_policy(&self, uuid: &str) -> Result<DeleteResponse> {
        self.delete(&format!("/access_control_policies/{}", uuid)).await
    }

    pub async fn list_access_control_policy(
        &self,
        request: &DsMetadata,
    ) -> Result<AccessControlPolicyListIntentResponse> {
        self.post("/access_control_policies/list", request).await
    }

    pub async fn list_all_access_control_policy(
        &self,
        filter: Option<&str>,
    ) -> Result<AccessControlPolicyListIntentResponse> {
        self.list_all("/access_control_policies/list", "access_control_policy", filter)
            .await
    }

    // Tasks

    pub async fn get_task(&self, uuid: &str) -> Result<TasksResponse> {
        self.http.get(&format!("/tasks/{}", uuid)).await
    }

    /// One poll of a v3 task. Failed tasks become `TaskFailed`.
    pub async fn refresh_task(&self, uuid: &str) -> Result<Refresh<TasksResponse>> {
        let task = match self.get_task(uuid).await {
            Ok(task) => task,
            Err(e) if e.to_string().contains(STATE_INVALID_UUID) => {
                return Err(Error::TaskFailed {
                    id: uuid.to_string(),
                    detail: e.to_string(),
                })
            }
            Err(e) => return Err(e),
        };

        let status = task.status.clone().unwrap_or_default();
        if status == STATE_FAILED || status == STATE_INVALID_UUID {
            return Err(Error::TaskFailed {
                id: uuid.to_string(),
                detail: task_failure_detail(
                    task.error_detail.as_deref(),
                    task.progress_message.as_deref(),
                ),
            });
        }
        Ok(Refresh::new(task, status))
    }

    /// Waits for a task with the standard v3 pending/target sets.
    pub async fn wait_for_task(
        &self,
        uuid: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<TasksResponse> {
        self.wait_for_task_with(uuid, &StateChangeConf::v3(timeout), cancel)
            .await
    }

    pub async fn wait_for_task_with(
        &self,
        uuid: &str,
        conf: &StateChangeConf,
        cancel: &CancellationToken,
    ) -> Result<TasksResponse> {
        wait_for_state(uuid, conf, cancel, || self.refresh_task(uuid)).await
    }
}
