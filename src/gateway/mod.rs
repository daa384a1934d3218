//! Access to the clinic backend's payment records.
//!
//! Handlers talk to the backend through [TransactionGateway] so that tests
//! can swap in canned data. [HttpGateway] is the real client.

mod http;

use async_trait::async_trait;
use axum::extract::FromRef;
use futures::{StreamExt, TryStreamExt, stream};
use serde::Deserialize;
use std::sync::Arc;

pub use http::HttpGateway;

use crate::{
    AppState, Error,
    transaction::{RawTransaction, Transaction, TransactionFilters},
};

/// One page of a doctor's payments.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest<'a> {
    /// The page number, starting from 1.
    pub page: u64,
    /// The maximum number of payments on the page.
    pub limit: u64,
    pub filters: &'a TransactionFilters,
}

/// The `{ data, totalResults }` body of the list endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse {
    #[serde(default)]
    pub data: Vec<RawTransaction>,
    /// The number of payments across all pages, if the backend reported it.
    #[serde(default)]
    pub total_results: Option<u64>,
}

/// The `{ data }` body of the single payment endpoint.
#[derive(Debug, Deserialize)]
pub struct SingleResponse {
    pub data: RawTransaction,
}

/// A page of normalized payments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    pub total_results: Option<u64>,
}

impl From<PageResponse> for TransactionPage {
    fn from(response: PageResponse) -> Self {
        Self {
            transactions: response.data.into_iter().map(Transaction::from).collect(),
            total_results: response.total_results,
        }
    }
}

/// The source of payment records.
#[async_trait]
pub trait TransactionGateway: Send + Sync {
    /// Get one page of the payments made to `doctor_id`.
    async fn fetch_page(
        &self,
        doctor_id: &str,
        request: &PageRequest<'_>,
    ) -> Result<TransactionPage, Error>;

    /// Get a single payment by its ID.
    async fn fetch_transaction(&self, payment_id: &str) -> Result<Transaction, Error>;
}

/// Limits on how much of the backend a single request may read.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// The number of payments requested per backend page.
    pub page_size: u64,
    /// The most backend pages read for one table.
    pub max_pages: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: 50,
        }
    }
}

/// The state needed by handlers that read payments.
#[derive(Clone)]
pub struct GatewayState {
    pub gateway: Arc<dyn TransactionGateway>,
    pub config: GatewayConfig,
}

impl FromRef<AppState> for GatewayState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            gateway: state.gateway.clone(),
            config: state.gateway_config.clone(),
        }
    }
}

/// Every payment matching `filters`, gathered page by page.
///
/// Stops when `totalResults` payments have been read, when a page comes back
/// short or empty, or after `config.max_pages` pages.
pub async fn fetch_all_pages(
    gateway: &dyn TransactionGateway,
    doctor_id: &str,
    filters: &TransactionFilters,
    config: &GatewayConfig,
) -> Result<Vec<Transaction>, Error> {
    let limit = config.page_size.max(1);
    let mut transactions = Vec::new();

    for page in 1..=config.max_pages {
        let request = PageRequest {
            page,
            limit,
            filters,
        };
        let TransactionPage {
            transactions: mut page_transactions,
            total_results,
        } = gateway.fetch_page(doctor_id, &request).await?;

        let page_len = page_transactions.len() as u64;
        transactions.append(&mut page_transactions);

        let read_everything = match total_results {
            Some(total_results) => transactions.len() as u64 >= total_results,
            None => page_len < limit,
        };

        if page_len == 0 || read_everything {
            return Ok(transactions);
        }
    }

    tracing::warn!(
        "Stopped reading payments for doctor {doctor_id} after {} pages ({} payments). \
        Totals may be incomplete.",
        config.max_pages,
        transactions.len()
    );

    Ok(transactions)
}

/// The most payment IDs a single details request may ask for.
pub const MAX_DETAIL_IDS: usize = 100;

/// The most single-payment requests in flight at once.
pub const DETAIL_REQUEST_CONCURRENCY: usize = 8;

/// Fetch the payments with the given IDs, a few at a time.
///
/// The payments are returned in the order of `ids`. If any single request
/// fails the first error is returned and the remaining requests are dropped.
///
/// # Errors
/// Returns [Error::TooManyPayments] without contacting the backend if there
/// are more than [MAX_DETAIL_IDS] IDs.
pub async fn fetch_details(
    gateway: &dyn TransactionGateway,
    ids: &[String],
) -> Result<Vec<Transaction>, Error> {
    if ids.len() > MAX_DETAIL_IDS {
        return Err(Error::TooManyPayments {
            requested: ids.len(),
            max: MAX_DETAIL_IDS,
        });
    }

    let requests: Vec<_> = ids.iter().map(|id| gateway.fetch_transaction(id)).collect();

    stream::iter(requests)
        .buffered(DETAIL_REQUEST_CONCURRENCY)
        .try_collect()
        .await
}
