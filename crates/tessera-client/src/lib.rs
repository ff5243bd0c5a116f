//! Tessera Client - HTTP provider client and vector store adapters.
//!
//! This crate provides the network layer beneath the sync engine:
//!
//! - [`provider`] - `ProviderClient`: classification, retry/backoff,
//!   resumable uploads, operation polling
//! - [`openai`] - two-layer "file store + vector store" adapter
//! - [`gemini`] - single-layer "file-search store" adapter
//!
//! # Why an Enum Instead of `dyn Trait`?
//!
//! The [`VectorStoreAdapter`] trait uses `impl Future` return types
//! (RPITIT), which makes it not object-safe. [`AdapterEnum`] provides
//! runtime provider selection while keeping the ergonomic async trait
//! syntax.

pub mod gemini;
pub mod openai;
pub mod provider;

pub use gemini::GeminiAdapter;
pub use openai::OpenAiAdapter;
pub use provider::{AuthScheme, PollOutcome, ProviderClient, RequestPurpose, classify_provider_error};

use tessera_core::adapter::{StoreInfo, StoreUpdate, VectorStoreAdapter};
use tessera_core::error::AppError;
use tessera_core::{DocumentPayload, ProviderKind};

/// Unified vector store adapter that wraps the concrete topologies.
///
/// Selected at runtime from a collection's [`ProviderKind`].
#[derive(Clone)]
pub enum AdapterEnum {
    /// Two-layer file store + vector store topology.
    OpenAi(OpenAiAdapter),
    /// Single-layer file-search store topology.
    Gemini(GeminiAdapter),
}

impl AdapterEnum {
    /// Creates the adapter for a provider kind with its default API root.
    pub fn for_provider(kind: ProviderKind, api_key: &str) -> Result<Self, AppError> {
        match kind {
            ProviderKind::OpenAi => Ok(Self::OpenAi(OpenAiAdapter::new(api_key)?)),
            ProviderKind::Gemini => Ok(Self::Gemini(GeminiAdapter::new(api_key)?)),
        }
    }

    /// Creates the adapter against a custom API root (proxies, tests).
    pub fn for_provider_at(
        kind: ProviderKind,
        api_key: &str,
        base_url: &str,
    ) -> Result<Self, AppError> {
        match kind {
            ProviderKind::OpenAi => Ok(Self::OpenAi(OpenAiAdapter::with_base_url(api_key, base_url)?)),
            ProviderKind::Gemini => Ok(Self::Gemini(GeminiAdapter::with_base_url(api_key, base_url)?)),
        }
    }
}

impl VectorStoreAdapter for AdapterEnum {
    async fn create_store(&self, name: &str) -> Result<String, AppError> {
        match self {
            Self::OpenAi(a) => a.create_store(name).await,
            Self::Gemini(a) => a.create_store(name).await,
        }
    }

    async fn get_store_info(&self, store_id: &str) -> Result<StoreInfo, AppError> {
        match self {
            Self::OpenAi(a) => a.get_store_info(store_id).await,
            Self::Gemini(a) => a.get_store_info(store_id).await,
        }
    }

    async fn update_store(&self, store_id: &str, fields: StoreUpdate) -> Result<(), AppError> {
        match self {
            Self::OpenAi(a) => a.update_store(store_id, fields).await,
            Self::Gemini(a) => a.update_store(store_id, fields).await,
        }
    }

    async fn delete_store(&self, store_id: &str) -> Result<(), AppError> {
        match self {
            Self::OpenAi(a) => a.delete_store(store_id).await,
            Self::Gemini(a) => a.delete_store(store_id).await,
        }
    }

    async fn upload_document(
        &self,
        payload: &DocumentPayload,
        store_id: &str,
    ) -> Result<String, AppError> {
        match self {
            Self::OpenAi(a) => a.upload_document(payload, store_id).await,
            Self::Gemini(a) => a.upload_document(payload, store_id).await,
        }
    }

    async fn add_to_store(
        &self,
        store_id: &str,
        file_id: &str,
        skip_verification: bool,
    ) -> Result<(), AppError> {
        match self {
            Self::OpenAi(a) => a.add_to_store(store_id, file_id, skip_verification).await,
            Self::Gemini(a) => a.add_to_store(store_id, file_id, skip_verification).await,
        }
    }

    async fn remove_from_store(&self, store_id: &str, file_id: &str) -> Result<(), AppError> {
        match self {
            Self::OpenAi(a) => a.remove_from_store(store_id, file_id).await,
            Self::Gemini(a) => a.remove_from_store(store_id, file_id).await,
        }
    }

    async fn verify_exists(&self, file_id: &str, store_id: &str) -> Result<bool, AppError> {
        match self {
            Self::OpenAi(a) => a.verify_exists(file_id, store_id).await,
            Self::Gemini(a) => a.verify_exists(file_id, store_id).await,
        }
    }

    async fn delete_file(&self, file_id: &str, store_id: &str) -> Result<(), AppError> {
        match self {
            Self::OpenAi(a) => a.delete_file(file_id, store_id).await,
            Self::Gemini(a) => a.delete_file(file_id, store_id).await,
        }
    }
}
