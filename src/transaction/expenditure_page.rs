//! Defines the route handler for the total expenditure page: every payment
//! grouped by service and minute, with totals per service.

use axum::{
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use time::UtcOffset;

use crate::{
    AppState, Error,
    alert::Alert,
    endpoints,
    gateway::{GatewayState, fetch_all_pages},
    html::{PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base},
    navigation::NavBar,
    pagination::{
        PaginationConfig, create_pagination_indicators, page_count, page_slice, pagination_html,
    },
    session::Session,
    timezone::get_local_offset,
};

use super::{
    aggregation::{DetailRow, ServiceTotal, group_by_service_minute, total_by_service},
    filters::FilterQuery,
    view::{amount_cell, detail_table, filter_form, platform_fee_cell},
};

/// The state needed for the expenditure page.
#[derive(Clone)]
pub struct ExpenditureViewState {
    pub payments: GatewayState,
    pub session: Session,
    /// The local timezone as a canonical timezone name, e.g. "Asia/Kolkata".
    pub local_timezone: String,
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for ExpenditureViewState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            payments: GatewayState::from_ref(state),
            session: state.session.clone(),
            local_timezone: state.local_timezone.clone(),
            pagination_config: state.pagination_config.clone(),
        }
    }
}

/// Render the doctor's payments grouped by service and minute.
pub async fn get_expenditure_page(
    State(state): State<ExpenditureViewState>,
    Query(query): Query<FilterQuery>,
) -> Response {
    let Some(local_offset) = get_local_offset(&state.local_timezone) else {
        tracing::error!("Invalid timezone {}", state.local_timezone);
        return Error::InvalidTimezone(state.local_timezone).into_response();
    };

    let (rows, alert) = match load_rows(&state, &query).await {
        Ok(rows) => (rows, None),
        Err(error) => {
            let (_, alert) = error.to_alert();
            (Vec::new(), Some(alert))
        }
    };

    let totals = total_by_service(&rows);

    let curr_page = query.page();
    let page_size = state.pagination_config.page_size;
    let indicators = create_pagination_indicators(
        curr_page,
        page_count(rows.len(), page_size),
        state.pagination_config.max_pages,
    );
    let pagination = pagination_html(&indicators, |page| {
        query.with_page(page).to_url(endpoints::EXPENDITURE_VIEW)
    });

    expenditure_view(
        &state.session,
        &query,
        page_slice(&rows, curr_page, page_size),
        &totals,
        local_offset,
        pagination,
        alert,
    )
    .into_response()
}

async fn load_rows(
    state: &ExpenditureViewState,
    query: &FilterQuery,
) -> Result<Vec<DetailRow>, Error> {
    let filters = query
        .normalize()
        .inspect_err(|error| tracing::warn!("rejected expenditure filters {query:?}: {error}"))?;

    let transactions = fetch_all_pages(
        state.payments.gateway.as_ref(),
        &state.session.doctor_id,
        &filters,
        &state.payments.config,
    )
    .await
    .inspect_err(|error| tracing::error!("could not get payments for expenditure page: {error}"))?;

    Ok(group_by_service_minute(&transactions))
}

fn expenditure_view(
    session: &Session,
    query: &FilterQuery,
    rows: &[DetailRow],
    totals: &[ServiceTotal],
    local_offset: UtcOffset,
    pagination: Markup,
    alert: Option<Alert>,
) -> Markup {
    let nav_bar = NavBar::new(endpoints::EXPENDITURE_VIEW, session).into_html();

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            div class="w-full max-w-screen-xl"
            {
                h1 class="text-xl font-bold mb-4" { "Total Expenditure" }

                @if let Some(alert) = alert {
                    (alert.into_inline_html())
                }

                (filter_form(endpoints::EXPENDITURE_VIEW, query))

                section class="mb-8"
                {
                    h2 class="text-lg font-semibold mb-2" { "By service" }

                    div class="relative overflow-x-auto shadow-md sm:rounded-lg"
                    {
                        (totals_table(totals))
                    }
                }

                section
                {
                    h2 class="text-lg font-semibold mb-2" { "By minute" }

                    div class="relative overflow-x-auto shadow-md sm:rounded-lg"
                    {
                        (detail_table(rows, local_offset))
                    }

                    (pagination)
                }
            }
        }
    };

    base("Total Expenditure", &content)
}

fn totals_table(totals: &[ServiceTotal]) -> Markup {
    let grand_total: f64 = totals.iter().map(|total| total.amount).sum();
    let payment_count: usize = totals.iter().map(|total| total.count).sum();

    html! {
        table
            id="service-totals"
            class="w-full text-sm text-left rtl:text-right text-gray-500 dark:text-gray-400"
        {
            thead class=(TABLE_HEADER_STYLE)
            {
                tr
                {
                    th scope="col" class=(TABLE_CELL_STYLE) { "Service" }
                    th scope="col" class=(TABLE_CELL_STYLE) { "Payments" }
                    th scope="col" class={(TABLE_CELL_STYLE) " text-right"} { "Amount" }
                    th scope="col" class={(TABLE_CELL_STYLE) " text-right"} { "Platform Fee" }
                }
            }

            tbody
            {
                @for total in totals {
                    tr class=(TABLE_ROW_STYLE) data-service=(total.service.label())
                    {
                        td class=(TABLE_CELL_STYLE) { (total.service.label()) }
                        td class=(TABLE_CELL_STYLE) { (total.count) }
                        (amount_cell(total.amount))
                        (platform_fee_cell(total.platform_fee, 0))
                    }
                }
            }

            tfoot
            {
                tr class="font-semibold text-gray-900 dark:text-white"
                {
                    th scope="row" class=(TABLE_CELL_STYLE) { "Total" }
                    td class=(TABLE_CELL_STYLE) { (payment_count) }
                    (amount_cell(grand_total))
                    td class=(TABLE_CELL_STYLE) {}
                }
            }
        }
    }
}
