//! The capability interface resource wrappers are written against

use crate::auth::KeepAliveOutcome;
use crate::error::Result;
use crate::filter::FilterBuilder;
use crate::http::{ApiResponse, RequestOptions, Response};
use crate::pagination::{PageParams, PageSummary, PaginationOptions};
use crate::upload::MultipartUpload;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Operations every Jamf Pro resource wrapper needs.
///
/// Paths are relative to the instance URL (`api/v1/buildings`,
/// `JSSResource/computergroups`). Bodies are encoded as JSON for the
/// versioned API and XML for the Classic API, chosen from the path.
/// Decoded responses keep the raw [`Response`] next to the data.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// GET and decode
    async fn get<T>(
        &self,
        path: &str,
        query: &[(String, String)],
        options: RequestOptions,
    ) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned + Send;

    /// POST an encoded body and decode the reply
    async fn post<B, T>(&self, path: &str, body: &B, options: RequestOptions) -> Result<ApiResponse<T>>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned + Send;

    /// POST with query parameters
    async fn post_with_query<B, T>(
        &self,
        path: &str,
        query: &[(String, String)],
        body: &B,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned + Send;

    /// POST an `application/x-www-form-urlencoded` body
    async fn post_form<T>(
        &self,
        path: &str,
        fields: &[(String, String)],
        options: RequestOptions,
    ) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned + Send;

    /// POST a streamed `multipart/form-data` upload. Never retried.
    async fn post_multipart<T>(
        &self,
        path: &str,
        upload: MultipartUpload,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned + Send;

    /// PUT an encoded body
    async fn put<B, T>(&self, path: &str, body: &B, options: RequestOptions) -> Result<ApiResponse<T>>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned + Send;

    /// PATCH an encoded body
    async fn patch<B, T>(&self, path: &str, body: &B, options: RequestOptions) -> Result<ApiResponse<T>>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned + Send;

    /// DELETE with optional query parameters
    async fn delete<T>(
        &self,
        path: &str,
        query: &[(String, String)],
        options: RequestOptions,
    ) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned + Send;

    /// DELETE carrying a body, used by bulk-delete endpoints
    async fn delete_with_body<B, T>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned + Send;

    /// GET without decoding; the raw bytes are in [`Response::body`]
    async fn get_bytes(
        &self,
        path: &str,
        query: &[(String, String)],
        options: RequestOptions,
    ) -> Result<Response>;

    /// Walk a paginated list endpoint, handing each page body to `merge`
    async fn get_paginated<F>(
        &self,
        path: &str,
        query: &[(String, String)],
        params: &PageParams,
        pagination: &PaginationOptions,
        options: RequestOptions,
        merge: F,
    ) -> Result<(Response, PageSummary)>
    where
        F: FnMut(&[u8]) -> Result<()> + Send;

    /// A fresh RSQL filter builder
    fn filter_builder(&self) -> FilterBuilder {
        FilterBuilder::new()
    }

    /// Revoke the current token on the server and drop it locally
    async fn invalidate_token(&self) -> Result<()>;

    /// Refresh the token if it is close to expiry
    async fn keep_alive_token(&self) -> Result<KeepAliveOutcome>;
}
