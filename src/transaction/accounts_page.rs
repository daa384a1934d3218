//! Defines the route handler for the page that summarises payments per patient.

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
    html::{
        LINK_STYLE, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE,
        base, loading_spinner, truncate_graphemes,
    },
    navigation::NavBar,
    pagination::{
        PaginationConfig, create_pagination_indicators, page_count, page_slice, pagination_html,
    },
    session::Session,
    timezone::get_local_offset,
};

use super::{
    aggregation::{MINUTE_FORMAT, PatientGroup, group_by_patient},
    filters::FilterQuery,
    view::{amount_cell, details_button, filter_form},
};

/// Patient names longer than this are shortened in the table.
const MAX_PATIENT_NAME_LENGTH: usize = 40;

/// The state needed for the accounts page.
#[derive(Clone)]
pub struct AccountsViewState {
    pub payments: GatewayState,
    pub session: Session,
    /// The local timezone as a canonical timezone name, e.g. "Asia/Kolkata".
    pub local_timezone: String,
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for AccountsViewState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            payments: GatewayState::from_ref(state),
            session: state.session.clone(),
            local_timezone: state.local_timezone.clone(),
            pagination_config: state.pagination_config.clone(),
        }
    }
}

/// Render the patient summary of the doctor's payments.
///
/// Backend failures and invalid filters do not fail the page: the table is
/// rendered empty with an alert explaining what went wrong.
pub async fn get_accounts_page(
    State(state): State<AccountsViewState>,
    Query(query): Query<FilterQuery>,
) -> Response {
    let Some(local_offset) = get_local_offset(&state.local_timezone) else {
        tracing::error!("Invalid timezone {}", state.local_timezone);
        return Error::InvalidTimezone(state.local_timezone).into_response();
    };

    let (groups, alert) = match load_groups(&state, &query).await {
        Ok(groups) => (groups, None),
        Err(error) => {
            let (_, alert) = error.to_alert();
            (Vec::new(), Some(alert))
        }
    };

    let curr_page = query.page();
    let page_size = state.pagination_config.page_size;
    let page_count = page_count(groups.len(), page_size);
    let page_groups = page_slice(&groups, curr_page, page_size);
    let indicators =
        create_pagination_indicators(curr_page, page_count, state.pagination_config.max_pages);

    let pagination = pagination_html(&indicators, |page| {
        query.with_page(page).to_url(endpoints::ACCOUNTS_VIEW)
    });
    let export_url = query.without_page().to_url(endpoints::ACCOUNTS_EXPORT);

    accounts_view(AccountsView {
        session: &state.session,
        query: &query,
        groups: page_groups,
        total_groups: groups.len(),
        local_offset,
        pagination,
        export_url: &export_url,
        alert,
    })
    .into_response()
}

async fn load_groups(
    state: &AccountsViewState,
    query: &FilterQuery,
) -> Result<Vec<PatientGroup>, Error> {
    let filters = query
        .normalize()
        .inspect_err(|error| tracing::warn!("rejected accounts filters {query:?}: {error}"))?;

    let transactions = fetch_all_pages(
        state.payments.gateway.as_ref(),
        &state.session.doctor_id,
        &filters,
        &state.payments.config,
    )
    .await
    .inspect_err(|error| tracing::error!("could not get payments for accounts page: {error}"))?;

    Ok(group_by_patient(&transactions))
}

struct AccountsView<'a> {
    session: &'a Session,
    query: &'a FilterQuery,
    groups: &'a [PatientGroup],
    total_groups: usize,
    local_offset: UtcOffset,
    pagination: Markup,
    export_url: &'a str,
    alert: Option<Alert>,
}

fn accounts_view(view: AccountsView) -> Markup {
    let nav_bar = NavBar::new(endpoints::ACCOUNTS_VIEW, view.session).into_html();

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            div class="w-full max-w-screen-xl"
            {
                div class="flex justify-between items-center mb-4"
                {
                    h1 class="text-xl font-bold" { "Accounts" }

                    a href=(view.export_url) class=(LINK_STYLE) download { "Export CSV" }
                }

                @if let Some(alert) = view.alert {
                    (alert.into_inline_html())
                }

                (filter_form(endpoints::ACCOUNTS_VIEW, view.query))

                p class="mb-2 text-sm text-gray-600 dark:text-gray-400"
                {
                    (view.total_groups) " patients"
                }

                div class="relative overflow-x-auto shadow-md sm:rounded-lg"
                {
                    (summary_table(view.groups, view.local_offset))
                }

                (view.pagination)

                span id="details-indicator" class="htmx-indicator" { (loading_spinner()) "Loading…" }
                div id="details-modal" class="w-full mt-6" {}
            }
        }
    };

    base("Accounts", &content)
}

fn summary_table(groups: &[PatientGroup], local_offset: UtcOffset) -> Markup {
    html! {
        table class="w-full text-sm text-left rtl:text-right text-gray-500 dark:text-gray-400"
        {
            thead class=(TABLE_HEADER_STYLE)
            {
                tr
                {
                    th scope="col" class=(TABLE_CELL_STYLE) { "Patient" }
                    th scope="col" class=(TABLE_CELL_STYLE) { "Transactions" }
                    th scope="col" class={(TABLE_CELL_STYLE) " text-right"} { "Total Amount" }
                    th scope="col" class=(TABLE_CELL_STYLE) { "Services" }
                    th scope="col" class=(TABLE_CELL_STYLE) { "Payment Methods" }
                    th scope="col" class=(TABLE_CELL_STYLE) { "Statuses" }
                    th scope="col" class=(TABLE_CELL_STYLE) { "Last Paid At" }
                    th scope="col" class=(TABLE_CELL_STYLE) { span class="sr-only" { "Details" } }
                }
            }

            tbody
            {
                @for group in groups {
                    tr class=(TABLE_ROW_STYLE) data-patient=(group.patient)
                    {
                        th
                            scope="row"
                            class={(TABLE_CELL_STYLE) " font-medium text-gray-900 whitespace-nowrap dark:text-white"}
                            title=(group.patient)
                        {
                            (truncate_graphemes(&group.patient, MAX_PATIENT_NAME_LENGTH))
                        }
                        td class=(TABLE_CELL_STYLE) { (group.count) }
                        (amount_cell(group.total_amount))
                        td class=(TABLE_CELL_STYLE) { (group.services) }
                        td class=(TABLE_CELL_STYLE) { (group.methods) }
                        td class=(TABLE_CELL_STYLE) { (group.statuses) }
                        td class=(TABLE_CELL_STYLE) { (last_paid_at(group, local_offset)) }
                        td class=(TABLE_CELL_STYLE) { (details_button(&group.ids)) }
                    }
                }

                @if groups.is_empty() {
                    tr class=(TABLE_ROW_STYLE)
                    {
                        td colspan="8" class={(TABLE_CELL_STYLE) " text-center"}
                        {
                            "No payments found."
                        }
                    }
                }
            }
        }
    }
}

/// When the patient last paid, in local time, or an empty string.
pub(super) fn last_paid_at(group: &PatientGroup, local_offset: UtcOffset) -> String {
    group
        .latest
        .paid_at
        .and_then(|paid_at| paid_at.to_offset(local_offset).format(MINUTE_FORMAT).ok())
        .unwrap_or_default()
}
