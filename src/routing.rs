//! Application router configuration.

use axum::{
    Router, middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};

use crate::{
    AppState, endpoints,
    logging::logging_middleware,
    not_found::get_404_not_found,
    transaction::{
        get_accounts_export, get_accounts_page, get_details_fragment, get_expenditure_page,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::ROOT, get(get_index_page))
        .route(endpoints::ACCOUNTS_VIEW, get(get_accounts_page))
        .route(endpoints::ACCOUNT_DETAILS, get(get_details_fragment))
        .route(endpoints::ACCOUNTS_EXPORT, get(get_accounts_export))
        .route(endpoints::EXPENDITURE_VIEW, get(get_expenditure_page))
        .route(endpoints::HEALTH, get(get_health))
        .fallback(get_404_not_found)
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

/// The root path '/' redirects to the accounts page.
async fn get_index_page() -> Redirect {
    Redirect::to(endpoints::ACCOUNTS_VIEW)
}

/// Report that the server is up. The backend is not checked.
async fn get_health() -> Response {
    "ok".into_response()
}


#[cfg(test)]
mod router_tests {
    use std::sync::Arc;

    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use axum_test::TestServer;
    use serde_json::json;

    use crate::{
        AppState, endpoints,
        gateway::GatewayConfig,
        pagination::PaginationConfig,
        session::{Role, Session},
        test_utils::{StubGateway, transaction},
    };

    use super::build_router;

    fn server() -> TestServer {
        let gateway = StubGateway::new(vec![
            transaction(json!({
                "paymentId": "P1", "patientName": "Asha", "paymentFrom": "appointment",
                "paidAt": "2024-01-01T10:00:30Z", "finalAmount": 500, "platformFee": 20
            })),
            transaction(json!({
                "paymentId": "P2", "patientName": "Asha", "paymentFrom": "lab",
                "paidAt": "2024-01-02T10:00:00Z", "finalAmount": 100
            })),
        ]);
        let state = AppState::new(
            Arc::new(gateway),
            GatewayConfig::default(),
            Session::new("doc-1", Role::Doctor),
            "Etc/UTC",
            PaginationConfig::default(),
        )
        .expect("Could not create app state");

        TestServer::new(build_router(state))
    }

    #[tokio::test]
    async fn serves_the_accounts_page() {
        let response = server().get(endpoints::ACCOUNTS_VIEW).await;

        response.assert_status_ok();
        assert!(response.text().contains("data-patient=\"Asha\""));
    }

    #[tokio::test]
    async fn serves_the_expenditure_page() {
        let response = server().get(endpoints::EXPENDITURE_VIEW).await;

        response.assert_status_ok();
        assert!(
            response
                .text()
                .contains("data-group-key=\"Appointments__2024-01-01 10:00\"")
        );
    }

    #[tokio::test]
    async fn serves_the_details_fragment_to_htmx() {
        let response = server()
            .get(endpoints::ACCOUNT_DETAILS)
            .add_query_param("ids", "P1,P2")
            .add_header(
                HeaderName::from_static("hx-request"),
                HeaderValue::from_static("true"),
            )
            .await;

        response.assert_status_ok();
        let text = response.text();
        assert!(!text.contains("<html"), "expected a fragment, got {text}");
        assert!(text.contains("data-group-key=\"Lab__2024-01-02 10:00\""));
    }

    #[tokio::test]
    async fn serves_the_export() {
        let response = server().get(endpoints::ACCOUNTS_EXPORT).await;

        response.assert_status_ok();
        assert_eq!(response.header("content-type"), "text/csv; charset=utf-8");
        assert!(response.text().contains("\"Asha\",\"2\",\"600.00\""));
    }

    #[tokio::test]
    async fn health_check() {
        let response = server().get(endpoints::HEALTH).await;

        response.assert_status_ok();
        response.assert_text("ok");
    }

    #[tokio::test]
    async fn unknown_routes_are_404() {
        let response = server().get("/nope").await;

        response.assert_status(StatusCode::NOT_FOUND);
    }
}
