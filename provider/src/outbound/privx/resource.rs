//! Generic REST collection client.
//!
//! Every PrivX store exposes its objects the same way: `GET` lists and
//! fetches, `POST` creates, `PUT` replaces and `DELETE` removes. The domain
//! records carry the serde names of the wire payload, so the client only
//! adds URLs and envelopes.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::dto::{CreatedDto, ListQueryDto, ListResponseDto};
use super::transport::PrivxTransport;
use crate::domain::ports::{RemoteError, ResourceClient};

/// Page size of listing calls.
const LIST_LIMIT: usize = 1000;

/// Listing order requested from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOrder {
    /// Whatever the server returns.
    Server,
    /// Ascending by `id`.
    ById,
}

/// Resource client for one PrivX collection.
pub struct RestResourceClient<T> {
    transport: Arc<PrivxTransport>,
    collection: &'static str,
    order: ListOrder,
    record: PhantomData<fn() -> T>,
}

impl<T> RestResourceClient<T> {
    /// Client for the collection at `collection`, e.g. `host-store/api/v1/hosts`.
    pub fn new(transport: Arc<PrivxTransport>, collection: &'static str) -> Self {
        Self {
            transport,
            collection,
            order: ListOrder::Server,
            record: PhantomData,
        }
    }

    /// Ask the server to sort listings.
    #[must_use]
    pub fn with_order(mut self, order: ListOrder) -> Self {
        self.order = order;
        self
    }

    fn list_query(&self, offset: usize) -> ListQueryDto {
        let (sortkey, sortdir) = match self.order {
            ListOrder::Server => (None, None),
            ListOrder::ById => (Some("id"), Some("ASC")),
        };
        ListQueryDto {
            offset,
            limit: LIST_LIMIT,
            sortkey,
            sortdir,
        }
    }
}

#[async_trait]
impl<T> ResourceClient<T> for RestResourceClient<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Pages through the collection until the reported `count` is reached,
    /// or until a short page when the server reports no count.
    async fn list(&self) -> Result<Vec<T>, RemoteError> {
        let mut items = Vec::new();
        loop {
            let url = self.transport.url(self.collection, &[])?;
            let query = self.list_query(items.len());
            let page: ListResponseDto<T> = self
                .transport
                .send_json(Method::GET, url, |request| request.query(&query))
                .await?;
            let fetched = page.items.len();
            items.extend(page.items);
            let exhausted = match page.count {
                Some(total) => fetched == 0 || items.len() >= total,
                None => fetched < LIST_LIMIT,
            };
            if exhausted {
                return Ok(items);
            }
        }
    }

    async fn get(&self, id: &str) -> Result<T, RemoteError> {
        let url = self.transport.url(self.collection, &[id])?;
        self.transport.send_json(Method::GET, url, |request| request).await
    }

    async fn create(&self, record: &T) -> Result<String, RemoteError> {
        let url = self.transport.url(self.collection, &[])?;
        let created: CreatedDto = self
            .transport
            .send_json(Method::POST, url, |request| request.json(record))
            .await?;
        created.into_identifier().ok_or_else(|| {
            RemoteError::decode(format!(
                "create response from {} carried no identifier",
                self.collection
            ))
        })
    }

    async fn update(&self, id: &str, record: &T) -> Result<(), RemoteError> {
        let url = self.transport.url(self.collection, &[id])?;
        self.transport
            .send(Method::PUT, url, |request| request.json(record))
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let url = self.transport.url(self.collection, &[id])?;
        self.transport
            .send(Method::DELETE, url, |request| request)
            .await?;
        Ok(())
    }
}
