use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{
    Error,
    gateway::{GatewayConfig, GatewayState, PageRequest, TransactionGateway, TransactionPage},
    transaction::{RawTransaction, Transaction, TransactionFilters},
};

/// Parse a backend JSON record into a [Transaction].
#[track_caller]
pub(crate) fn transaction(value: serde_json::Value) -> Transaction {
    let raw: RawTransaction = serde_json::from_value(value).expect("invalid test record");
    raw.into()
}

#[derive(Default)]
struct Requests {
    pages: Vec<u64>,
    filters: Option<TransactionFilters>,
    ids: Vec<String>,
}

/// Serves a fixed list of payments, paged the way the backend pages them.
///
/// Filters are recorded but not applied.
#[derive(Clone)]
pub(crate) struct StubGateway {
    transactions: Arc<Vec<Transaction>>,
    error: Option<Error>,
    requests: Arc<Mutex<Requests>>,
}

impl StubGateway {
    pub(crate) fn new(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions: Arc::new(transactions),
            error: None,
            requests: Default::default(),
        }
    }

    /// A gateway whose every request fails with `error`.
    pub(crate) fn failing(error: Error) -> Self {
        Self {
            error: Some(error),
            ..Self::new(Vec::new())
        }
    }

    /// The page numbers requested so far, in order.
    pub(crate) fn requested_pages(&self) -> Vec<u64> {
        self.requests.lock().unwrap().pages.clone()
    }

    /// The payment IDs fetched one at a time so far, in order.
    pub(crate) fn requested_ids(&self) -> Vec<String> {
        self.requests.lock().unwrap().ids.clone()
    }

    /// The filters of the most recent page request.
    pub(crate) fn last_filters(&self) -> Option<TransactionFilters> {
        self.requests.lock().unwrap().filters.clone()
    }
}

#[async_trait]
impl TransactionGateway for StubGateway {
    async fn fetch_page(
        &self,
        _doctor_id: &str,
        request: &PageRequest<'_>,
    ) -> Result<TransactionPage, Error> {
        {
            let mut requests = self.requests.lock().unwrap();
            requests.pages.push(request.page);
            requests.filters = Some(request.filters.clone());
        }

        if let Some(error) = &self.error {
            return Err(error.clone());
        }

        let start = ((request.page.max(1) - 1) * request.limit) as usize;
        let transactions = self
            .transactions
            .iter()
            .skip(start)
            .take(request.limit as usize)
            .cloned()
            .collect();

        Ok(TransactionPage {
            transactions,
            total_results: Some(self.transactions.len() as u64),
        })
    }

    async fn fetch_transaction(&self, payment_id: &str) -> Result<Transaction, Error> {
        self.requests
            .lock()
            .unwrap()
            .ids
            .push(payment_id.to_owned());

        if let Some(error) = &self.error {
            return Err(error.clone());
        }

        self.transactions
            .iter()
            .find(|transaction| transaction.id == payment_id)
            .cloned()
            .ok_or(Error::NotFound)
    }
}

/// Wrap `gateway` for handler state with the default limits.
pub(crate) fn gateway_state(gateway: StubGateway) -> GatewayState {
    GatewayState {
        gateway: Arc::new(gateway),
        config: GatewayConfig::default(),
    }
}
