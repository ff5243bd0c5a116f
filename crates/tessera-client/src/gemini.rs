//! Single-layer file-search store adapter (Gemini-style APIs).
//!
//! In this topology a document exists only inside one named search store:
//! the upload itself places it there (via a resumable upload that resolves
//! into a long-running operation), so `add_to_store` degrades to a
//! verification-only check and `store_id` is required everywhere.

use reqwest::Method;
use serde_json::{Value, json};
use tessera_core::adapter::{StoreInfo, StoreUpdate, VectorStoreAdapter};
use tessera_core::error::{AppError, ProviderErrorKind};
use tessera_core::{DocumentPayload, HttpConfig, PollConfig};

use crate::provider::{AuthScheme, PollOutcome, ProviderClient, RequestPurpose};

/// Default API root for Gemini-style providers.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Adapter for single-layer "file-search store" providers.
///
/// Store and document ids are full resource names
/// (`fileSearchStores/<store>` and `fileSearchStores/<store>/documents/<doc>`),
/// which double as request paths.
#[derive(Clone)]
pub struct GeminiAdapter {
    client: ProviderClient,
}

impl GeminiAdapter {
    pub fn new(api_key: &str) -> Result<Self, AppError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self, AppError> {
        Ok(Self {
            client: ProviderClient::new(api_key, base_url, AuthScheme::GoogApiKey)?,
        })
    }

    pub fn with_config(
        api_key: &str,
        base_url: &str,
        http: HttpConfig,
        poll: PollConfig,
    ) -> Result<Self, AppError> {
        Ok(Self {
            client: ProviderClient::with_config(
                api_key,
                base_url,
                AuthScheme::GoogApiKey,
                http,
                poll,
            )?,
        })
    }

    fn require_store(store_id: &str) -> Result<(), AppError> {
        if store_id.is_empty() {
            return Err(AppError::Generic(
                "store id is required for file-search store operations".to_string(),
            ));
        }
        Ok(())
    }

    fn name_field(value: &Value) -> Result<String, AppError> {
        value
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AppError::Client("Response missing 'name' field".to_string()))
    }
}

impl VectorStoreAdapter for GeminiAdapter {
    async fn create_store(&self, name: &str) -> Result<String, AppError> {
        let response = self
            .client
            .request(
                Method::POST,
                "fileSearchStores",
                Some(&json!({ "displayName": name })),
                RequestPurpose::Mutation,
            )
            .await?;
        // The resource name ("fileSearchStores/<id>") is the store id.
        Self::name_field(&response)
    }

    async fn get_store_info(&self, store_id: &str) -> Result<StoreInfo, AppError> {
        Self::require_store(store_id)?;
        let response = self
            .client
            .request(Method::GET, store_id, None, RequestPurpose::Status)
            .await?;
        Ok(StoreInfo {
            store_id: store_id.to_string(),
            name: response
                .get("displayName")
                .and_then(Value::as_str)
                .map(str::to_string),
            // The API does not report a lifecycle state; a store that
            // answers is live.
            status: "active".to_string(),
            document_count: response
                .get("activeDocumentsCount")
                .and_then(Value::as_u64),
            usage_bytes: response
                .get("sizeBytes")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok()),
        })
    }

    async fn update_store(&self, store_id: &str, fields: StoreUpdate) -> Result<(), AppError> {
        Self::require_store(store_id)?;
        let mut payload = serde_json::Map::new();
        if let Some(name) = fields.name {
            payload.insert("displayName".to_string(), Value::String(name));
        }
        self.client
            .request(
                Method::PATCH,
                store_id,
                Some(&Value::Object(payload)),
                RequestPurpose::Mutation,
            )
            .await?;
        Ok(())
    }

    async fn delete_store(&self, store_id: &str) -> Result<(), AppError> {
        Self::require_store(store_id)?;
        // force drops the store together with every document in it.
        self.client
            .request(
                Method::DELETE,
                &format!("{}?force=true", store_id),
                None,
                RequestPurpose::Mutation,
            )
            .await?;
        Ok(())
    }

    async fn upload_document(
        &self,
        payload: &DocumentPayload,
        store_id: &str,
    ) -> Result<String, AppError> {
        Self::require_store(store_id)?;
        let metadata = json!({
            "displayName": format!("item-{}", payload.item_id),
        });
        let operation = self
            .client
            .upload_resumable(
                &format!("{}:uploadToFileSearchStore", store_id),
                &metadata,
                payload.content.clone().into_bytes(),
                &payload.content_type,
            )
            .await?;

        // The finalize response is a long-running operation; wait for the
        // document to land in the store.
        let operation_name = Self::name_field(&operation)?;
        let done = self
            .client
            .poll_operation(&operation_name, |value| {
                if value.get("done").and_then(Value::as_bool).unwrap_or(false) {
                    match value.pointer("/error/message").and_then(Value::as_str) {
                        Some(message) => PollOutcome::Failed(message.to_string()),
                        None => PollOutcome::Ready,
                    }
                } else {
                    PollOutcome::Pending
                }
            })
            .await?;

        done.pointer("/response/document/name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::Client("Upload operation finished without a document name".to_string())
            })
    }

    async fn add_to_store(
        &self,
        store_id: &str,
        file_id: &str,
        skip_verification: bool,
    ) -> Result<(), AppError> {
        // The upload already placed the document in the store; all that is
        // left is confirming it landed.
        if skip_verification {
            return Ok(());
        }
        if self.verify_exists(file_id, store_id).await? {
            Ok(())
        } else {
            Err(AppError::provider(
                ProviderErrorKind::NotFound,
                format!("document {} not present in store", file_id),
                404,
            ))
        }
    }

    async fn remove_from_store(&self, store_id: &str, file_id: &str) -> Result<(), AppError> {
        Self::require_store(store_id)?;
        self.client
            .request(Method::DELETE, file_id, None, RequestPurpose::Mutation)
            .await?;
        Ok(())
    }

    async fn verify_exists(&self, file_id: &str, store_id: &str) -> Result<bool, AppError> {
        Self::require_store(store_id)?;
        let result = self
            .client
            .request(Method::GET, file_id, None, RequestPurpose::Status)
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(err) if err.provider_kind() == Some(ProviderErrorKind::NotFound) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn delete_file(&self, file_id: &str, store_id: &str) -> Result<(), AppError> {
        // Single-layer: the document and the file are the same resource,
        // so this is the same delete as remove_from_store. Tolerate the
        // document already being gone from a prior removal.
        match self.remove_from_store(store_id, file_id).await {
            Ok(()) => Ok(()),
            Err(err) if err.provider_kind() == Some(ProviderErrorKind::NotFound) => Ok(()),
            Err(err) => Err(err),
        }
    }
}
