//! Default [`ApiClient`] implementation

use super::api::ApiClient;
use crate::auth::{KeepAliveOutcome, SessionManager};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::{
    decode_response, ApiResponse, ReqwestTransport, Request, RequestExecutor, RequestOptions,
    Response, Transport,
};
use crate::pagination::{fetch_all, PageParams, PageSummary, PaginationOptions};
use crate::types::{ApiGeneration, Method};
use crate::upload::{upload_file, MultipartUpload};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Jamf Pro client: one session and one executor over a shared transport
pub struct Client {
    config: ClientConfig,
    session: Arc<SessionManager>,
    executor: RequestExecutor,
}

impl Client {
    /// Create a client that talks HTTPS through `reqwest`
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport =
            ReqwestTransport::new(config.executor.timeout, &config.executor.user_agent)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Create a client over any transport
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        let session = Arc::new(SessionManager::new(
            config.credentials.clone(),
            config.session.clone(),
            Arc::clone(&transport),
        ));
        let executor = RequestExecutor::new(
            config.credentials.instance_url().clone(),
            transport,
            Some(Arc::clone(&session)),
            config.executor.clone(),
        )
        .hide_sensitive_data(config.hide_sensitive_data);

        info!(
            instance = config.credentials.instance_domain(),
            auth = config.credentials.auth().name(),
            "Jamf Pro client ready"
        );

        Ok(Self {
            config,
            session,
            executor,
        })
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The session manager owning the access token
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// The request executor
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Execute a hand-built request and decode the reply
    pub async fn execute<T: DeserializeOwned>(&self, request: Request) -> Result<ApiResponse<T>> {
        self.executor.execute_decoded(request).await
    }

    /// Refresh the token in the background every `interval` until `cancel`
    pub fn spawn_keep_alive(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        self.session.spawn_keep_alive(interval, cancel)
    }

    async fn send<B, T>(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned + Send,
    {
        let mut request = Request::new(method, path).queries(query.iter().cloned());
        if let Some(body) = body {
            request = request.payload(body)?;
        }
        self.executor
            .execute_decoded(request.with_options(options))
            .await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("session", &self.session.state())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ApiClient for Client {
    async fn get<T>(
        &self,
        path: &str,
        query: &[(String, String)],
        options: RequestOptions,
    ) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.send::<(), T>(Method::GET, path, query, None, options)
            .await
    }

    async fn post<B, T>(&self, path: &str, body: &B, options: RequestOptions) -> Result<ApiResponse<T>>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned + Send,
    {
        self.send(Method::POST, path, &[], Some(body), options).await
    }

    async fn post_with_query<B, T>(
        &self,
        path: &str,
        query: &[(String, String)],
        body: &B,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned + Send,
    {
        self.send(Method::POST, path, query, Some(body), options)
            .await
    }

    async fn post_form<T>(
        &self,
        path: &str,
        fields: &[(String, String)],
        options: RequestOptions,
    ) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned + Send,
    {
        let request = Request::post(path)
            .form(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .with_options(options);
        self.executor.execute_decoded(request).await
    }

    async fn post_multipart<T>(
        &self,
        path: &str,
        upload: MultipartUpload,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned + Send,
    {
        let response = upload_file(&self.executor, path, upload, options).await?;
        decode_response(response, ApiGeneration::for_path(path).content_kind())
    }

    async fn put<B, T>(&self, path: &str, body: &B, options: RequestOptions) -> Result<ApiResponse<T>>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned + Send,
    {
        self.send(Method::PUT, path, &[], Some(body), options).await
    }

    async fn patch<B, T>(&self, path: &str, body: &B, options: RequestOptions) -> Result<ApiResponse<T>>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned + Send,
    {
        self.send(Method::PATCH, path, &[], Some(body), options)
            .await
    }

    async fn delete<T>(
        &self,
        path: &str,
        query: &[(String, String)],
        options: RequestOptions,
    ) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.send::<(), T>(Method::DELETE, path, query, None, options)
            .await
    }

    async fn delete_with_body<B, T>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned + Send,
    {
        self.send(Method::DELETE, path, &[], Some(body), options)
            .await
    }

    async fn get_bytes(
        &self,
        path: &str,
        query: &[(String, String)],
        options: RequestOptions,
    ) -> Result<Response> {
        let request = Request::get(path)
            .queries(query.iter().cloned())
            .with_options(options);
        self.executor.execute(request).await
    }

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
        F: FnMut(&[u8]) -> Result<()> + Send,
    {
        fetch_all(&self.executor, path, query, params, pagination, &options, merge).await
    }

    async fn invalidate_token(&self) -> Result<()> {
        self.session.revoke().await
    }

    async fn keep_alive_token(&self) -> Result<KeepAliveOutcome> {
        self.session.keep_alive().await
    }
}
