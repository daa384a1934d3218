//! Download of the patient summary as a CSV file.

use axum::{
    extract::{FromRef, Query, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use axum_htmx::HxRequest;
use csv::{QuoteStyle, WriterBuilder};
use time::{OffsetDateTime, UtcOffset, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    AppState, Error,
    gateway::{GatewayState, fetch_all_pages},
    session::Session,
    timezone::{get_local_offset, now_local},
};

use super::{
    accounts_page::last_paid_at,
    aggregation::{PatientGroup, group_by_patient},
    filters::FilterQuery,
};

/// Lets spreadsheet programs detect that the file is UTF-8.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const CSV_HEADER: [&str; 7] = [
    "Patient",
    "Transactions",
    "Total Amount",
    "Services",
    "Payment Methods",
    "Statuses",
    "Last Paid At",
];

const FILENAME_TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day]_[hour][minute][second]");

/// The state needed for the CSV export.
#[derive(Clone)]
pub struct ExportState {
    pub payments: GatewayState,
    pub session: Session,
    /// The local timezone as a canonical timezone name, e.g. "Asia/Kolkata".
    pub local_timezone: String,
}

impl FromRef<AppState> for ExportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            payments: GatewayState::from_ref(state),
            session: state.session.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// Write the patient summary as CSV.
///
/// The output starts with a UTF-8 byte order mark and every field is quoted,
/// with embedded quotes doubled.
///
/// # Errors
/// Returns [Error::CsvExport] if a record could not be written.
pub fn summary_csv(groups: &[PatientGroup], local_offset: UtcOffset) -> Result<Vec<u8>, Error> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(UTF8_BOM.to_vec());

    writer
        .write_record(CSV_HEADER)
        .map_err(|error| Error::CsvExport(error.to_string()))?;

    for group in groups {
        let count = group.count.to_string();
        let total_amount = format!("{:.2}", group.total_amount);
        let last_paid_at = last_paid_at(group, local_offset);

        writer
            .write_record([
                group.patient.as_str(),
                &count,
                &total_amount,
                &group.services,
                &group.methods,
                &group.statuses,
                &last_paid_at,
            ])
            .map_err(|error| Error::CsvExport(error.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|error| Error::CsvExport(error.to_string()))
}

/// `transactions_<YYYYMMDD_HHmmss>.csv` for the time `now`.
pub fn export_filename(now: OffsetDateTime) -> String {
    let timestamp = now
        .format(FILENAME_TIMESTAMP_FORMAT)
        .inspect_err(|error| tracing::error!("could not format export timestamp {now}: {error}"))
        .unwrap_or_default();

    format!("transactions_{timestamp}.csv")
}

/// Download the patient summary for the current filters.
///
/// Nothing is sent unless the whole file could be built. Failures are shown
/// as an alert for htmx requests and as an error page otherwise.
pub async fn get_accounts_export(
    State(state): State<ExportState>,
    HxRequest(is_htmx): HxRequest,
    Query(query): Query<FilterQuery>,
) -> Response {
    match build_export(&state, &query).await {
        Ok((filename, body)) => (
            [
                (CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
                (
                    CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{filename}\""),
                ),
            ],
            body,
        )
            .into_response(),
        Err(error) if is_htmx => error.into_alert_response(),
        Err(error) => error.into_response(),
    }
}

async fn build_export(state: &ExportState, query: &FilterQuery) -> Result<(String, Vec<u8>), Error> {
    let now = now_local(&state.local_timezone)?;
    let local_offset = get_local_offset(&state.local_timezone)
        .ok_or_else(|| Error::InvalidTimezone(state.local_timezone.clone()))?;

    let filters = query
        .normalize()
        .inspect_err(|error| tracing::warn!("rejected export filters {query:?}: {error}"))?;

    let transactions = fetch_all_pages(
        state.payments.gateway.as_ref(),
        &state.session.doctor_id,
        &filters,
        &state.payments.config,
    )
    .await
    .inspect_err(|error| tracing::error!("could not get payments for export: {error}"))?;

    let body = summary_csv(&group_by_patient(&transactions), local_offset)
        .inspect_err(|error| tracing::error!("could not export payments: {error}"))?;

    Ok((export_filename(now), body))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::to_bytes,
        extract::{Query, State},
        http::StatusCode,
    };
    use axum_htmx::HxRequest;
    use serde_json::json;
    use time::{
        UtcOffset,
        macros::{datetime, offset},
    };

    use crate::{
        Error,
        session::{Role, Session},
        test_utils::{StubGateway, gateway_state, get_header, transaction},
        transaction::{aggregation::group_by_patient, filters::FilterQuery},
    };

    use super::{ExportState, export_filename, get_accounts_export, summary_csv};

    #[test]
    fn doubles_embedded_quotes() {
        let groups = group_by_patient(&[transaction(json!({
            "paymentId": "T1", "patientName": "A\"B", "finalAmount": 100, "paymentStatus": "paid"
        }))]);

        let csv = summary_csv(&groups, UtcOffset::UTC).unwrap();
        let csv = String::from_utf8(csv).unwrap();

        assert!(csv.contains("\"A\"\"B\""), "{csv}");
        assert!(csv.contains("\"100.00\""), "{csv}");
    }

    #[test]
    fn starts_with_bom_and_quoted_header() {
        let csv = summary_csv(&[], UtcOffset::UTC).unwrap();

        assert!(csv.starts_with(b"\xEF\xBB\xBF"));
        let text = String::from_utf8(csv[3..].to_vec()).unwrap();
        assert_eq!(
            text.lines().next(),
            Some(
                "\"Patient\",\"Transactions\",\"Total Amount\",\"Services\",\
                \"Payment Methods\",\"Statuses\",\"Last Paid At\""
            )
        );
    }

    #[test]
    fn last_paid_at_uses_local_time() {
        let groups = group_by_patient(&[transaction(json!({
            "patientName": "Asha", "paidAt": "2024-01-01T10:00:30Z"
        }))]);

        let csv = String::from_utf8(summary_csv(&groups, offset!(+5:30)).unwrap()).unwrap();

        assert!(csv.contains("\"2024-01-01 15:30\""), "{csv}");
    }

    #[test]
    fn filename_has_timestamp() {
        assert_eq!(
            export_filename(datetime!(2024-03-05 07:08:09 +5:30)),
            "transactions_20240305_070809.csv"
        );
    }

    fn state_with(gateway: StubGateway) -> ExportState {
        ExportState {
            payments: gateway_state(gateway),
            session: Session::new("doc-1", Role::Doctor),
            local_timezone: "Etc/UTC".to_owned(),
        }
    }

    #[tokio::test]
    async fn export_downloads_csv() {
        let gateway = StubGateway::new(vec![transaction(json!({
            "paymentId": "P1", "patientName": "Asha", "finalAmount": 10
        }))]);

        let response = get_accounts_export(
            State(state_with(gateway)),
            HxRequest(false),
            Query(FilterQuery::default()),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(get_header(&response, "content-type"), "text/csv; charset=utf-8");
        let disposition = get_header(&response, "content-disposition");
        assert!(disposition.starts_with("attachment; filename=\"transactions_"));
        assert!(disposition.ends_with(".csv\""));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8_lossy(&body);
        assert!(body.contains("\"Asha\",\"1\",\"10.00\""), "{body}");
    }

    #[tokio::test]
    async fn failed_export_sends_no_file() {
        let gateway = StubGateway::failing(Error::BackendUnavailable("down".to_owned()));

        let response = get_accounts_export(
            State(state_with(gateway)),
            HxRequest(true),
            Query(FilterQuery::default()),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(response.headers().get("content-disposition").is_none());
    }
}
