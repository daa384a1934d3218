//! The breakdown of a patient's payments by service and minute, shown in a
//! modal on the accounts page.

use axum::{
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use axum_htmx::HxRequest;
use maud::{Markup, html};
use serde::Deserialize;
use time::UtcOffset;

use crate::{
    AppState, Error,
    alert::Alert,
    gateway::{GatewayState, fetch_details},
    html::{BUTTON_LINK_STYLE, PAGE_CONTAINER_STYLE, base},
    timezone::get_local_offset,
};

use super::{
    aggregation::{DetailRow, group_by_service_minute},
    view::detail_table,
};

/// The state needed for the details fragment.
#[derive(Clone)]
pub struct DetailsState {
    pub payments: GatewayState,
    /// The local timezone as a canonical timezone name, e.g. "Asia/Kolkata".
    pub local_timezone: String,
}

impl FromRef<AppState> for DetailsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            payments: GatewayState::from_ref(state),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// `?ids=a,b,c`
#[derive(Debug, Default, Deserialize)]
pub struct DetailsQuery {
    #[serde(default)]
    pub ids: String,
}

impl DetailsQuery {
    fn ids(&self) -> Vec<String> {
        self.ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

/// Fetch the payments in `ids` and render their service/minute breakdown.
///
/// If any payment cannot be fetched the breakdown is left empty and an alert
/// is shown instead of a partial result. Requests made outside of htmx get a
/// full page.
pub async fn get_details_fragment(
    State(state): State<DetailsState>,
    HxRequest(is_htmx): HxRequest,
    Query(query): Query<DetailsQuery>,
) -> Response {
    let Some(local_offset) = get_local_offset(&state.local_timezone) else {
        tracing::error!("Invalid timezone {}", state.local_timezone);
        let error = Error::InvalidTimezone(state.local_timezone);

        return if is_htmx {
            error.into_alert_response()
        } else {
            error.into_response()
        };
    };

    let ids = query.ids();

    let (rows, alert) = match fetch_details(state.payments.gateway.as_ref(), &ids).await {
        Ok(transactions) => (group_by_service_minute(&transactions), None),
        Err(error) => {
            tracing::error!("could not get details for payments {ids:?}: {error}");
            let (_, alert) = error.to_alert();
            (Vec::new(), Some(alert))
        }
    };

    let fragment = details_view(&rows, ids.len(), local_offset, alert);

    if is_htmx {
        fragment.into_response()
    } else {
        let content = html! {
            div class=(PAGE_CONTAINER_STYLE) { (fragment) }
        };

        base("Payment Details", &content).into_response()
    }
}

fn details_view(
    rows: &[DetailRow],
    payment_count: usize,
    local_offset: UtcOffset,
    alert: Option<Alert>,
) -> Markup {
    html! {
        section
            id="details"
            class="w-full p-4 bg-white rounded-lg shadow dark:bg-gray-800"
            aria-label="Payment details"
        {
            div class="flex justify-between items-center mb-4"
            {
                h2 class="text-lg font-semibold" { "Payment details" }

                button
                    type="button"
                    class=(BUTTON_LINK_STYLE)
                    onclick="document.getElementById('details-modal').replaceChildren()"
                {
                    "Close"
                }
            }

            @if let Some(alert) = alert {
                (alert.into_inline_html())
            } @else {
                p class="mb-2 text-sm text-gray-600 dark:text-gray-400"
                {
                    (payment_count) " payments in " (rows.len()) " groups"
                }
            }

            div class="relative overflow-x-auto"
            {
                (detail_table(rows, local_offset))
            }
        }
    }
}
