//! Markup shared by the accounts and expenditure pages.

use maud::{Markup, html};
use time::UtcOffset;

use crate::{
    endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, DASH, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, LINK_STYLE,
        TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, format_amount,
    },
};

use super::{
    aggregation::{DetailRow, display_status},
    filters::{FilterQuery, KNOWN_STATUSES},
    service::Service,
};

/// The filter form, submitted with GET to `route`.
pub(super) fn filter_form(route: &str, query: &FilterQuery) -> Markup {
    let selected_service = query.service.as_deref().unwrap_or_default();
    let selected_status = query.status.as_deref().unwrap_or_default();

    html! {
        form
            method="get"
            action=(route)
            class="w-full grid grid-cols-1 gap-4 mb-6 md:grid-cols-3 lg:grid-cols-6 items-end"
        {
            div
            {
                label for="start_date" class=(FORM_LABEL_STYLE) { "From" }
                input
                    type="date"
                    id="start_date"
                    name="start_date"
                    value=[query.start_date.as_deref()]
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            div
            {
                label for="end_date" class=(FORM_LABEL_STYLE) { "To" }
                input
                    type="date"
                    id="end_date"
                    name="end_date"
                    value=[query.end_date.as_deref()]
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            div
            {
                label for="service" class=(FORM_LABEL_STYLE) { "Service" }
                select id="service" name="service" class=(FORM_TEXT_INPUT_STYLE)
                {
                    option value="" selected[selected_service.is_empty()] { "All services" }

                    @for service in &Service::KNOWN {
                        option
                            value=(service.query_value())
                            selected[Service::from_raw(Some(selected_service)) == *service]
                        {
                            (service.label())
                        }
                    }
                }
            }

            div
            {
                label for="status" class=(FORM_LABEL_STYLE) { "Status" }
                select id="status" name="status" class=(FORM_TEXT_INPUT_STYLE)
                {
                    option value="" selected[selected_status.is_empty()] { "All statuses" }

                    @for status in KNOWN_STATUSES {
                        option value=(status) selected[selected_status == status]
                        {
                            (status_label(status))
                        }
                    }
                }
            }

            div
            {
                label for="search" class=(FORM_LABEL_STYLE) { "Search" }
                input
                    type="search"
                    id="search"
                    name="search"
                    placeholder="Patient name"
                    value=[query.search.as_deref()]
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            div class="flex gap-4 items-center"
            {
                button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Apply" }
                a href=(route) class=(LINK_STYLE) { "Clear" }
            }
        }
    }
}

/// "Paid", "Pending" or "Refunded".
fn status_label(status: &str) -> String {
    let label = display_status(status);
    let mut chars = label.chars();

    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A right-aligned money cell carrying the raw amount in `data-amount`.
pub(super) fn amount_cell(amount: f64) -> Markup {
    html! {
        td class={(TABLE_CELL_STYLE) " text-right"} data-amount=(amount)
        {
            (format_amount(amount))
        }
    }
}

/// The platform fee cell: the summed fee for appointments, a dash otherwise.
pub(super) fn platform_fee_cell(platform_fee: Option<f64>, fees_unreported: usize) -> Markup {
    html! {
        @match platform_fee {
            Some(fee) => {
                td class={(TABLE_CELL_STYLE) " text-right"} data-platform-fee=(fee)
                {
                    (format_amount(fee))

                    @if fees_unreported > 0 {
                        span
                            class="ms-1 text-yellow-600 dark:text-yellow-400"
                            title={(fees_unreported) " payment(s) had no platform fee recorded"}
                        {
                            "*"
                        }
                    }
                }
            }
            None => {
                td class={(TABLE_CELL_STYLE) " text-right"} data-platform-fee=""
                {
                    (DASH)
                }
            }
        }
    }
}

/// The service/minute breakdown table used by the details modal and the
/// expenditure page.
pub(super) fn detail_table(rows: &[DetailRow], local_offset: UtcOffset) -> Markup {
    html! {
        table class="w-full text-sm text-left rtl:text-right text-gray-500 dark:text-gray-400"
        {
            thead class=(TABLE_HEADER_STYLE)
            {
                tr
                {
                    th scope="col" class=(TABLE_CELL_STYLE) { "Service" }
                    th scope="col" class=(TABLE_CELL_STYLE) { "Paid At" }
                    th scope="col" class=(TABLE_CELL_STYLE) { "Payments" }
                    th scope="col" class={(TABLE_CELL_STYLE) " text-right"} { "Amount" }
                    th scope="col" class={(TABLE_CELL_STYLE) " text-right"} { "Platform Fee" }
                }
            }

            tbody
            {
                @for row in rows {
                    tr class=(TABLE_ROW_STYLE) data-group-key=(row.group_key())
                    {
                        td class=(TABLE_CELL_STYLE) { (row.service.label()) }
                        td class=(TABLE_CELL_STYLE) { (row.minute_label(local_offset)) }
                        td class=(TABLE_CELL_STYLE) title=(row.ids.join(", ")) { (row.ids.len()) }
                        (amount_cell(row.amount))
                        (platform_fee_cell(row.platform_fee, row.fees_unreported))
                    }
                }

                @if rows.is_empty() {
                    tr class=(TABLE_ROW_STYLE)
                    {
                        td colspan="5" class={(TABLE_CELL_STYLE) " text-center"}
                        {
                            "No payments found."
                        }
                    }
                }
            }
        }
    }
}

/// The link that opens the details modal for a group of payments.
pub(super) fn details_button(ids: &[String]) -> Markup {
    let url = match serde_urlencoded::to_string([("ids", ids.join(","))]) {
        Ok(query) => format!("{}?{query}", endpoints::ACCOUNT_DETAILS),
        Err(error) => {
            tracing::error!("could not encode payment IDs {ids:?}: {error}");
            endpoints::ACCOUNT_DETAILS.to_owned()
        }
    };

    html! {
        button
            type="button"
            hx-get=(url)
            hx-target="#details-modal"
            hx-swap="innerHTML"
            hx-sync="#details-modal:replace"
            hx-indicator="#details-indicator"
            class=(LINK_STYLE)
        {
            "Details"
        }
    }
}
