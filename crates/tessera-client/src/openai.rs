//! Two-layer vector store adapter (OpenAI-style APIs).
//!
//! In this topology uploaded files and searchable indexes are independent
//! resources: a file is uploaded once to file storage, then attached to a
//! vector store, and the attachment is itself an asynchronous association
//! that must be polled to completion. `upload_document` therefore ignores
//! the store id (it may be empty) and `add_to_store` is the real attach.

use reqwest::Method;
use serde_json::{Value, json};
use tessera_core::adapter::{StoreInfo, StoreUpdate, VectorStoreAdapter};
use tessera_core::error::{AppError, ProviderErrorKind};
use tessera_core::{DocumentPayload, HttpConfig, PollConfig};

use crate::provider::{AuthScheme, PollOutcome, ProviderClient, RequestPurpose};

/// Default API root for OpenAI-style providers.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Adapter for two-layer "file store + vector store" providers.
#[derive(Clone)]
pub struct OpenAiAdapter {
    client: ProviderClient,
}

impl OpenAiAdapter {
    pub fn new(api_key: &str) -> Result<Self, AppError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self, AppError> {
        Ok(Self {
            client: ProviderClient::new(api_key, base_url, AuthScheme::Bearer)?,
        })
    }

    pub fn with_config(
        api_key: &str,
        base_url: &str,
        http: HttpConfig,
        poll: PollConfig,
    ) -> Result<Self, AppError> {
        Ok(Self {
            client: ProviderClient::with_config(api_key, base_url, AuthScheme::Bearer, http, poll)?,
        })
    }

    fn field<'a>(value: &'a Value, name: &str) -> Result<&'a str, AppError> {
        value
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::Client(format!("Response missing '{}' field", name)))
    }

    /// Poll the file-store association until the provider reports it
    /// searchable.
    async fn await_association(&self, store_id: &str, file_id: &str) -> Result<(), AppError> {
        let path = format!("vector_stores/{}/files/{}", store_id, file_id);
        self.client
            .poll_operation(&path, |value| {
                match value.get("status").and_then(Value::as_str) {
                    Some("completed") => PollOutcome::Ready,
                    Some("failed") | Some("cancelled") => {
                        let message = value
                            .pointer("/last_error/message")
                            .and_then(Value::as_str)
                            .unwrap_or("file association failed");
                        PollOutcome::Failed(message.to_string())
                    }
                    _ => PollOutcome::Pending,
                }
            })
            .await?;
        Ok(())
    }
}

impl VectorStoreAdapter for OpenAiAdapter {
    async fn create_store(&self, name: &str) -> Result<String, AppError> {
        let response = self
            .client
            .request(
                Method::POST,
                "vector_stores",
                Some(&json!({ "name": name })),
                RequestPurpose::Mutation,
            )
            .await?;
        Ok(Self::field(&response, "id")?.to_string())
    }

    async fn get_store_info(&self, store_id: &str) -> Result<StoreInfo, AppError> {
        let response = self
            .client
            .request(
                Method::GET,
                &format!("vector_stores/{}", store_id),
                None,
                RequestPurpose::Status,
            )
            .await?;
        Ok(StoreInfo {
            store_id: store_id.to_string(),
            name: response
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string),
            status: response
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            document_count: response.pointer("/file_counts/total").and_then(Value::as_u64),
            usage_bytes: response.get("usage_bytes").and_then(Value::as_u64),
        })
    }

    async fn update_store(&self, store_id: &str, fields: StoreUpdate) -> Result<(), AppError> {
        let mut payload = serde_json::Map::new();
        if let Some(name) = fields.name {
            payload.insert("name".to_string(), Value::String(name));
        }
        self.client
            .request(
                Method::POST,
                &format!("vector_stores/{}", store_id),
                Some(&Value::Object(payload)),
                RequestPurpose::Mutation,
            )
            .await?;
        Ok(())
    }

    async fn delete_store(&self, store_id: &str) -> Result<(), AppError> {
        self.client
            .request(
                Method::DELETE,
                &format!("vector_stores/{}", store_id),
                None,
                RequestPurpose::Mutation,
            )
            .await?;
        Ok(())
    }

    async fn upload_document(
        &self,
        payload: &DocumentPayload,
        _store_id: &str,
    ) -> Result<String, AppError> {
        // Two-layer: the file goes to provider-wide file storage; the
        // store association happens in add_to_store.
        let body = json!({
            "filename": format!("item-{}.txt", payload.item_id),
            "purpose": "assistants",
            "content": payload.content,
            "content_type": payload.content_type,
        });
        let response = self
            .client
            .request(Method::POST, "files", Some(&body), RequestPurpose::Upload)
            .await?;
        Ok(Self::field(&response, "id")?.to_string())
    }

    async fn add_to_store(
        &self,
        store_id: &str,
        file_id: &str,
        skip_verification: bool,
    ) -> Result<(), AppError> {
        self.client
            .request(
                Method::POST,
                &format!("vector_stores/{}/files", store_id),
                Some(&json!({ "file_id": file_id })),
                RequestPurpose::Mutation,
            )
            .await?;
        if !skip_verification {
            self.await_association(store_id, file_id).await?;
        }
        Ok(())
    }

    async fn remove_from_store(&self, store_id: &str, file_id: &str) -> Result<(), AppError> {
        self.client
            .request(
                Method::DELETE,
                &format!("vector_stores/{}/files/{}", store_id, file_id),
                None,
                RequestPurpose::Mutation,
            )
            .await?;
        Ok(())
    }

    async fn verify_exists(&self, file_id: &str, store_id: &str) -> Result<bool, AppError> {
        let result = self
            .client
            .request(
                Method::GET,
                &format!("vector_stores/{}/files/{}", store_id, file_id),
                None,
                RequestPurpose::Status,
            )
            .await;
        match result {
            Ok(value) => Ok(value.get("status").and_then(Value::as_str) == Some("completed")),
            Err(err) if err.provider_kind() == Some(ProviderErrorKind::NotFound) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn delete_file(&self, file_id: &str, _store_id: &str) -> Result<(), AppError> {
        self.client
            .request(
                Method::DELETE,
                &format!("files/{}", file_id),
                None,
                RequestPurpose::Mutation,
            )
            .await?;
        Ok(())
    }
}
