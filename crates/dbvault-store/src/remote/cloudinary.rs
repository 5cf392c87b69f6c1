use super::{ByteStream, SnapshotStore};
use crate::errors::{from_reqwest, io_error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dbvault_core::errors::{ExError, VaultError};
use dbvault_core::model::{DeleteOutcome, Fingerprint, RemoteSnapshot};
use dbvault_core_types::Sensitive;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.cloudinary.com/v1_1";
const RESOURCE_TYPE: &str = "raw";
const LIST_PAGE_SIZE: &str = "500";
const DELETE_BATCH: usize = 100;

/// Account credentials for the Cloudinary API
#[derive(Debug, Clone)]
pub struct CloudinaryCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: Sensitive<String>,
}

/// Snapshot store on Cloudinary raw resources
///
/// Uploads and single deletes go through the signed upload API; listing and
/// bulk deletes go through the admin API with basic auth.
pub struct CloudinaryStore {
    client: Client,
    credentials: CloudinaryCredentials,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct Resource {
    public_id: String,
    bytes: u64,
    #[serde(default)]
    etag: Option<String>,
    secure_url: String,
    created_at: DateTime<Utc>,
}

impl From<Resource> for RemoteSnapshot {
    fn from(r: Resource) -> Self {
        RemoteSnapshot {
            fingerprint: Fingerprint::new(r.etag.unwrap_or_default()),
            key: r.public_id,
            size_bytes: r.bytes,
            secure_url: r.secure_url,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResourcePage {
    #[serde(default)]
    resources: Vec<Resource>,
    next_cursor: Option<String>,
}

impl ResourcePage {
    /// Cursor for the following page; absent or empty means this was the last
    fn continuation(&self) -> Option<&str> {
        self.next_cursor.as_deref().filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

impl DestroyResponse {
    fn outcome(&self) -> DeleteOutcome {
        match self.result.as_str() {
            "ok" => DeleteOutcome::Deleted,
            "not found" => DeleteOutcome::NotFound,
            _ => DeleteOutcome::Failed,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BulkDeleteResponse {
    #[serde(default)]
    deleted: HashMap<String, String>,
}

impl BulkDeleteResponse {
    /// Outcome per requested key, in request order
    ///
    /// Keys the response does not mention count as failed.
    fn outcomes(&self, batch: &[String]) -> Vec<(String, DeleteOutcome)> {
        batch
            .iter()
            .map(|key| {
                let outcome = match self.deleted.get(key).map(String::as_str) {
                    Some("deleted") => DeleteOutcome::Deleted,
                    Some("not_found") => DeleteOutcome::NotFound,
                    _ => DeleteOutcome::Failed,
                };
                (key.clone(), outcome)
            })
            .collect()
    }
}

/// Bulk delete accepts at most `DELETE_BATCH` public ids per request
fn delete_batches(keys: &[String]) -> std::slice::Chunks<'_, String> {
    keys.chunks(DELETE_BATCH)
}

impl CloudinaryStore {
    /// Build a store whose every request is bounded by `timeout`
    pub fn new(credentials: CloudinaryCredentials, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| from_reqwest("build_client", e))?;
        Ok(Self {
            client,
            credentials,
            api_base: DEFAULT_API_BASE.to_string(),
        })
    }

    /// Point the store at a different API host (proxies, test servers)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/{}", self.api_base, self.credentials.cloud_name, path)
    }

    /// Signature over the sorted, `&`-joined params followed by the secret
    fn sign(&self, params: &BTreeMap<&str, String>) -> String {
        let joined = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let mut hasher = Sha256::new();
        hasher.update(joined.as_bytes());
        hasher.update(self.credentials.api_secret.expose().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Params every signed call sends, signature included
    fn signed_params(&self, mut params: BTreeMap<&'static str, String>) -> Vec<(String, String)> {
        params.insert("timestamp", Utc::now().timestamp().to_string());
        let signature = self.sign(&params);

        let mut fields: Vec<(String, String)> = params
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        fields.push(("api_key".to_string(), self.credentials.api_key.clone()));
        fields.push(("signature".to_string(), signature));
        fields.push(("signature_algorithm".to_string(), "sha256".to_string()));
        fields
    }

    async fn list_page(&self, folder: &str, cursor: Option<&str>) -> Result<ResourcePage> {
        let mut query = vec![
            ("prefix", format!("{}/", folder)),
            ("max_results", LIST_PAGE_SIZE.to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("next_cursor", cursor.to_string()));
        }

        let response = self
            .client
            .get(self.endpoint(&format!("resources/{}/upload", RESOURCE_TYPE)))
            .basic_auth(
                &self.credentials.api_key,
                Some(self.credentials.api_secret.expose()),
            )
            .query(&query)
            .send()
            .await
            .map_err(|e| from_reqwest("list", e))?;

        check_status("list", response)
            .await?
            .json::<ResourcePage>()
            .await
            .map_err(|e| from_reqwest("list", e))
    }
}

/// Pass success responses through, reject everything else
async fn check_status(op: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(rejection(op, status, body))
}

fn rejection(op: &str, status: StatusCode, body: String) -> ExError {
    VaultError::RemoteRejected {
        op: op.to_string(),
        status: status.as_u16(),
        body,
    }
    .into()
}

#[async_trait]
impl SnapshotStore for CloudinaryStore {
    async fn upload(&self, local_path: &Path, folder: &str) -> Result<RemoteSnapshot> {
        let content = tokio::fs::read(local_path)
            .await
            .map_err(|e| io_error("read_upload_source", e))?;
        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot.sqlite".to_string());

        let mut params = BTreeMap::new();
        params.insert("folder", folder.to_string());

        let mut form = Form::new().part("file", Part::bytes(content).file_name(file_name));
        for (k, v) in self.signed_params(params) {
            form = form.text(k, v);
        }

        let response = self
            .client
            .post(self.endpoint(&format!("{}/upload", RESOURCE_TYPE)))
            .multipart(form)
            .send()
            .await
            .map_err(|e| from_reqwest("upload", e))?;

        let resource: Resource = check_status("upload", response)
            .await?
            .json()
            .await
            .map_err(|e| from_reqwest("upload", e))?;

        Ok(resource.into())
    }

    async fn list(&self, folder: &str) -> Result<Vec<RemoteSnapshot>> {
        let mut snapshots = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.list_page(folder, cursor.as_deref()).await?;
            let next = page.continuation().map(str::to_string);
            snapshots.extend(page.resources.into_iter().map(RemoteSnapshot::from));
            match next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(snapshots)
    }

    async fn delete(&self, key: &str) -> Result<DeleteOutcome> {
        let mut params = BTreeMap::new();
        params.insert("public_id", key.to_string());

        let response = self
            .client
            .post(self.endpoint(&format!("{}/destroy", RESOURCE_TYPE)))
            .form(&self.signed_params(params))
            .send()
            .await
            .map_err(|e| from_reqwest("delete", e))?;

        let body: DestroyResponse = check_status("delete", response)
            .await?
            .json()
            .await
            .map_err(|e| from_reqwest("delete", e))?;

        Ok(body.outcome())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<Vec<(String, DeleteOutcome)>> {
        let mut results = Vec::with_capacity(keys.len());

        for batch in delete_batches(keys) {
            let query: Vec<(&str, &str)> = batch
                .iter()
                .map(|k| ("public_ids[]", k.as_str()))
                .collect();

            let response = self
                .client
                .delete(self.endpoint(&format!("resources/{}/upload", RESOURCE_TYPE)))
                .basic_auth(
                    &self.credentials.api_key,
                    Some(self.credentials.api_secret.expose()),
                )
                .query(&query)
                .send()
                .await
                .map_err(|e| from_reqwest("delete_many", e))?;

            let body: BulkDeleteResponse = check_status("delete_many", response)
                .await?
                .json()
                .await
                .map_err(|e| from_reqwest("delete_many", e))?;

            results.extend(body.outcomes(batch));
        }

        Ok(results)
    }

    async fn open_download(&self, snapshot: &RemoteSnapshot) -> Result<ByteStream> {
        let response = self
            .client
            .get(&snapshot.secure_url)
            .send()
            .await
            .map_err(|e| from_reqwest("download", e))?;
        let response = check_status("download", response).await?;

        let key = snapshot.key.clone();
        Ok(response
            .bytes_stream()
            .map(move |chunk| {
                chunk.map_err(|e| {
                    ExError::from(VaultError::DownloadInterrupted {
                        key: key.clone(),
                        reason: e.to_string(),
                    })
                })
            })
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CloudinaryStore {
        CloudinaryStore::new(
            CloudinaryCredentials {
                cloud_name: "demo".to_string(),
                api_key: "key".to_string(),
                api_secret: Sensitive::new("secret".to_string()),
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_signature_is_sorted_and_salted() {
        let s = store();
        let mut params = BTreeMap::new();
        params.insert("timestamp", "1700000000".to_string());
        params.insert("folder", "Backups".to_string());

        let mut hasher = Sha256::new();
        hasher.update(b"folder=Backups&timestamp=1700000000secret");
        let expected = hex::encode(hasher.finalize());

        assert_eq!(s.sign(&params), expected);
    }

    #[test]
    fn test_signed_params_carry_key_and_algorithm() {
        let s = store();
        let mut params = BTreeMap::new();
        params.insert("public_id", "Backups/abc".to_string());

        let fields: HashMap<String, String> = s.signed_params(params).into_iter().collect();

        assert_eq!(fields.get("api_key").map(String::as_str), Some("key"));
        assert_eq!(
            fields.get("signature_algorithm").map(String::as_str),
            Some("sha256")
        );
        assert!(fields.contains_key("timestamp"));
        assert_eq!(fields.get("signature").map(|s| s.len()), Some(64));
    }

    #[test]
    fn test_endpoint_uses_cloud_name() {
        let s = store().with_api_base("http://localhost:9000/v1_1/");
        assert_eq!(
            s.endpoint("raw/upload"),
            "http://localhost:9000/v1_1/demo/raw/upload"
        );
    }

    #[test]
    fn test_resource_maps_to_snapshot() {
        let json = r#"{
            "public_id": "Backups/abc",
            "bytes": 4096,
            "etag": "e1",
            "secure_url": "https://res.cloudinary.com/demo/raw/upload/Backups/abc",
            "created_at": "2024-05-01T10:00:00Z"
        }"#;
        let snap: RemoteSnapshot = serde_json::from_str::<Resource>(json).unwrap().into();

        assert_eq!(snap.key, "Backups/abc");
        assert_eq!(snap.size_bytes, 4096);
        assert_eq!(snap.fingerprint.as_str(), "e1");
    }

    #[test]
    fn test_page_continuation() {
        let more: ResourcePage =
            serde_json::from_str(r#"{"resources": [], "next_cursor": "c2"}"#).unwrap();
        assert_eq!(more.continuation(), Some("c2"));

        let empty: ResourcePage =
            serde_json::from_str(r#"{"resources": [], "next_cursor": ""}"#).unwrap();
        assert_eq!(empty.continuation(), None);

        let last: ResourcePage = serde_json::from_str(r#"{"resources": []}"#).unwrap();
        assert_eq!(last.continuation(), None);
    }

    #[test]
    fn test_destroy_result_mapping() {
        let cases = [
            (r#"{"result": "ok"}"#, DeleteOutcome::Deleted),
            (r#"{"result": "not found"}"#, DeleteOutcome::NotFound),
            (r#"{"result": "error"}"#, DeleteOutcome::Failed),
        ];
        for (json, expected) in cases {
            let body: DestroyResponse = serde_json::from_str(json).unwrap();
            assert_eq!(body.outcome(), expected, "{}", json);
        }
    }

    #[test]
    fn test_bulk_delete_outcomes_follow_request_order() {
        let body: BulkDeleteResponse = serde_json::from_str(
            r#"{"deleted": {"Backups/b": "not_found", "Backups/a": "deleted", "Backups/c": "pending"}}"#,
        )
        .unwrap();
        let batch: Vec<String> = ["Backups/a", "Backups/b", "Backups/c", "Backups/d"]
            .iter()
            .map(|k| k.to_string())
            .collect();

        assert_eq!(
            body.outcomes(&batch),
            vec![
                ("Backups/a".to_string(), DeleteOutcome::Deleted),
                ("Backups/b".to_string(), DeleteOutcome::NotFound),
                ("Backups/c".to_string(), DeleteOutcome::Failed),
                ("Backups/d".to_string(), DeleteOutcome::Failed),
            ]
        );
    }

    #[test]
    fn test_delete_batches_cap_request_size() {
        let keys: Vec<String> = (0..250).map(|i| format!("Backups/{}", i)).collect();
        let sizes: Vec<usize> = delete_batches(&keys).map(<[String]>::len).collect();
        assert_eq!(sizes, vec![DELETE_BATCH, DELETE_BATCH, 50]);

        let rejoined: Vec<String> = delete_batches(&keys).flatten().cloned().collect();
        assert_eq!(rejoined, keys);
        assert_eq!(delete_batches(&[]).count(), 0);
    }

    #[test]
    fn test_rejection_is_network_error() {
        let err = rejection(
            "list",
            StatusCode::UNAUTHORIZED,
            r#"{"error": {"message": "Invalid Signature"}}"#.to_string(),
        );
        assert_eq!(err.code(), "ERR_NETWORK");
        assert_eq!(err.op(), Some("list"));
        assert!(err.message().contains("401"));
        assert!(err.message().contains("Invalid Signature"));
    }
}
