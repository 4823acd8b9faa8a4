use crate::{debug, error::TransportError};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::sync::Arc;

/// Retrieves raw bytes from a URL
#[async_trait]
pub trait Transport: Send + Sync {
    async fn retrieve(&self, url: &str) -> Result<Bytes, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn retrieve(&self, url: &str) -> Result<Bytes, TransportError> {
        (**self).retrieve(url).await
    }
}

/// Plain HTTP(S) transport
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        HttpTransport {
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn retrieve(&self, url: &str) -> Result<Bytes, TransportError> {
        debug!("GET {}", url);
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::new(url, e))?;
        let resp = resp
            .error_for_status()
            .map_err(|e| TransportError::new(url, e))?;
        let body = resp.bytes().await.map_err(|e| TransportError::new(url, e))?;
        Ok(body)
    }
}
