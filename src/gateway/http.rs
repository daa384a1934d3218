//! The reqwest client for the clinic backend's payments API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::{Error, transaction::Transaction};

use super::{PageRequest, PageResponse, SingleResponse, TransactionGateway, TransactionPage};

/// Talks to `GET {base}/payments/doctor/{id}` and `GET {base}/payments/{id}`.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
    token: Option<String>,
    timeout: Duration,
}

impl HttpGateway {
    /// Create a client for the backend at `base_url`, e.g.
    /// "https://clinic.example.com/api".
    ///
    /// `token` is sent as a bearer token with every request if set.
    ///
    /// # Errors
    /// Returns [Error::InvalidBackendUrl] if `base_url` is not an absolute
    /// HTTP(S) URL.
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, Error> {
        let parsed = Url::parse(base_url)
            .inspect_err(|error| tracing::error!("could not parse backend URL {base_url}: {error}"))
            .map_err(|_| Error::InvalidBackendUrl(base_url.to_owned()))?;

        if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidBackendUrl(base_url.to_owned()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .inspect_err(|error| tracing::error!("could not build HTTP client: {error}"))
            .map_err(|error| Error::BackendUnavailable(error.to_string()))?;

        Ok(Self {
            client,
            base_url: parsed,
            token: token.filter(|token| !token.is_empty()),
            timeout,
        })
    }

    /// Append `segments` to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();

        url.path_segments_mut()
            .map_err(|_| Error::InvalidBackendUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T, Error> {
        let mut request = self.client.get(url.clone()).query(query);

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        tracing::debug!("GET {url} {query:?}");

        let response = request
            .send()
            .await
            .map_err(|error| self.map_send_error(&url, error))?;

        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("backend returned {status} for {url}: {body}");

            return Err(Error::BackendStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|error| self.map_send_error(&url, error))?;

        serde_json::from_str(&body)
            .inspect_err(|error| tracing::error!("could not parse response from {url}: {error}"))
            .map_err(|error| Error::InvalidResponse(error.to_string()))
    }

    fn map_send_error(&self, url: &Url, error: reqwest::Error) -> Error {
        let message = if error.is_connect() {
            format!("could not connect to {url}")
        } else if error.is_timeout() {
            format!(
                "request to {url} timed out after {} seconds",
                self.timeout.as_secs()
            )
        } else {
            format!("request to {url} failed: {error}")
        };

        tracing::error!("{message}");
        Error::BackendUnavailable(message)
    }
}

#[async_trait]
impl TransactionGateway for HttpGateway {
    async fn fetch_page(
        &self,
        doctor_id: &str,
        request: &PageRequest<'_>,
    ) -> Result<TransactionPage, Error> {
        let url = self.endpoint(&["payments", "doctor", doctor_id])?;

        let mut query = vec![
            ("page", request.page.to_string()),
            ("limit", request.limit.to_string()),
        ];
        query.extend(request.filters.to_query_pairs());

        let response: PageResponse = self.get_json(url, &query).await?;

        Ok(response.into())
    }

    async fn fetch_transaction(&self, payment_id: &str) -> Result<Transaction, Error> {
        let url = self.endpoint(&["payments", payment_id])?;

        let response: SingleResponse = self.get_json(url, &[]).await?;

        Ok(response.data.into())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        net::SocketAddr,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use axum::{
        Json, Router,
        extract::{Path, Query},
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::get,
    };
    use serde_json::json;
    use time::macros::date;

    use crate::{
        Error,
        gateway::{PageRequest, TransactionGateway},
        transaction::{Service, TransactionFilters},
    };

    use super::HttpGateway;

    type Seen = Arc<Mutex<Vec<(String, HashMap<String, String>, Option<String>)>>>;

    /// Serve a fake backend on a random local port.
    async fn spawn_backend(seen: Seen) -> SocketAddr {
        let list_seen = seen.clone();
        let router = Router::new()
            .route(
                "/api/payments/doctor/{doctor_id}",
                get(
                    move |Path(doctor_id): Path<String>,
                          Query(query): Query<HashMap<String, String>>,
                          headers: HeaderMap| async move {
                        let auth = headers
                            .get("authorization")
                            .map(|value| value.to_str().unwrap().to_owned());
                        list_seen.lock().unwrap().push((doctor_id, query, auth));

                        Json(json!({
                            "data": [
                                {"paymentId": "P1", "patientName": "Asha", "finalAmount": "500"},
                                {"_id": "D2", "actualAmount": 20}
                            ],
                            "totalResults": 2
                        }))
                    },
                ),
            )
            .route(
                "/api/payments/{payment_id}",
                get(|Path(payment_id): Path<String>| async move {
                    match payment_id.as_str() {
                        "P1" => Json(json!({"data": {"paymentId": "P1", "paymentFrom": "lab"}}))
                            .into_response(),
                        "broken" => (StatusCode::OK, "not json").into_response(),
                        "error" => {
                            (StatusCode::INTERNAL_SERVER_ERROR, "database is down").into_response()
                        }
                        _ => StatusCode::NOT_FOUND.into_response(),
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        addr
    }

    fn gateway_for(addr: SocketAddr, token: Option<&str>) -> HttpGateway {
        HttpGateway::new(
            &format!("http://{addr}/api/"),
            token.map(str::to_owned),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn rejects_urls_that_cannot_be_a_base() {
        for url in ["not a url", "mailto:admin@example.com", "ftp://example.com"] {
            let got = HttpGateway::new(url, None, Duration::from_secs(1));

            assert_eq!(
                got.map(|_| ()),
                Err(Error::InvalidBackendUrl(url.to_owned())),
                "{url} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn fetch_page_sends_paging_filters_and_token() {
        let seen: Seen = Default::default();
        let addr = spawn_backend(seen.clone()).await;
        let gateway = gateway_for(addr, Some("secret"));
        let filters = TransactionFilters {
            start_date: Some(date!(2024 - 01 - 01)),
            service: Some(Service::Appointments),
            search: Some("asha rao".to_owned()),
            ..Default::default()
        };

        let page = gateway
            .fetch_page(
                "doc 42",
                &PageRequest {
                    page: 2,
                    limit: 50,
                    filters: &filters,
                },
            )
            .await
            .unwrap();

        assert_eq!(page.total_results, Some(2));
        assert_eq!(page.transactions[0].id, "P1");
        assert_eq!(page.transactions[0].final_amount, Some(500.0));
        assert_eq!(page.transactions[1].id, "D2");

        let seen = seen.lock().unwrap();
        let (doctor_id, query, auth) = &seen[0];
        assert_eq!(doctor_id, "doc 42");
        assert_eq!(query["page"], "2");
        assert_eq!(query["limit"], "50");
        assert_eq!(query["startDate"], "2024-01-01");
        assert_eq!(query["service"], "appointment");
        assert_eq!(query["search"], "asha rao");
        assert!(!query.contains_key("endDate"));
        assert_eq!(auth.as_deref(), Some("Bearer secret"));
    }

    #[tokio::test]
    async fn fetch_page_without_token_sends_no_authorization() {
        let seen: Seen = Default::default();
        let addr = spawn_backend(seen.clone()).await;
        let gateway = gateway_for(addr, None);

        gateway
            .fetch_page(
                "doc-1",
                &PageRequest {
                    page: 1,
                    limit: 10,
                    filters: &TransactionFilters::default(),
                },
            )
            .await
            .unwrap();

        assert_eq!(seen.lock().unwrap()[0].2, None);
    }

    #[tokio::test]
    async fn fetch_transaction_maps_responses() {
        let addr = spawn_backend(Default::default()).await;
        let gateway = gateway_for(addr, None);

        let transaction = gateway.fetch_transaction("P1").await.unwrap();
        assert_eq!(transaction.id, "P1");
        assert_eq!(transaction.service(), Service::Lab);

        assert_eq!(gateway.fetch_transaction("nope").await, Err(Error::NotFound));
        assert!(matches!(
            gateway.fetch_transaction("broken").await,
            Err(Error::InvalidResponse(_))
        ));
        assert_eq!(
            gateway.fetch_transaction("error").await,
            Err(Error::BackendStatus {
                status: 500,
                body: "database is down".to_owned()
            })
        );
    }

    #[tokio::test]
    async fn unreachable_backend_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let gateway = gateway_for(addr, None);

        let got = gateway.fetch_transaction("P1").await;

        assert!(matches!(got, Err(Error::BackendUnavailable(_))), "got {got:?}");
    }
}
