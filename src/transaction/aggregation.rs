//! Grouping and summing of payments for the accounts and expenditure tables.
//!
//! Everything in here is a pure function of the payments passed in: nothing
//! is cached and nothing can fail. Missing amounts count as zero, missing
//! dates as "Unknown" and missing patients as "unknown".

use std::collections::HashMap;

use time::{OffsetDateTime, UtcOffset, format_description::BorrowedFormatItem, macros::format_description};

use super::{record::Transaction, service::Service};

/// The label used in place of a minute when a payment has no date.
pub const UNKNOWN_MINUTE_LABEL: &str = "Unknown";

/// Separates the service from the minute in a [DetailRow::group_key].
const GROUP_KEY_SEPARATOR: &str = "__";

/// Joins the distinct services, methods and statuses of a patient.
const LIST_SEPARATOR: &str = ", ";

pub(super) const MINUTE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");

/// The amount a payment counts for.
///
/// `finalAmount` if the backend sent one (even `null`), else `actualAmount`,
/// else zero.
pub fn resolve_amount(transaction: &Transaction) -> f64 {
    transaction
        .final_amount
        .or(transaction.actual_amount)
        .unwrap_or(0.0)
}

/// The platform fee of a payment, zero if none was recorded.
///
/// Use [Transaction::fee] directly to tell a recorded zero apart from a
/// missing fee.
pub fn resolve_platform_fee(transaction: &Transaction) -> f64 {
    transaction.fee.amount()
}

/// The label shown for a payment status.
pub fn display_status(status: &str) -> &str {
    if status.trim().eq_ignore_ascii_case("refund_pending") {
        "Refunded"
    } else {
        status
    }
}

/// One row of the accounts summary: every payment of a single patient.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientGroup {
    /// The patient's display name, the grouping key.
    pub patient: String,
    /// How many payments the patient made.
    pub count: usize,
    /// The sum of [resolve_amount] over the patient's payments.
    pub total_amount: f64,
    /// The distinct `paymentFrom` values in first-seen order, comma separated.
    pub services: String,
    /// The distinct payment methods in first-seen order, comma separated.
    pub methods: String,
    /// The distinct status labels in first-seen order, comma separated.
    pub statuses: String,
    /// The payment with the latest `paidAt`.
    pub latest: Transaction,
    /// The IDs of every payment in the group, in input order.
    pub ids: Vec<String>,
}

struct PatientGroupBuilder {
    patient: String,
    count: usize,
    total_amount: f64,
    services: Vec<String>,
    methods: Vec<String>,
    statuses: Vec<String>,
    latest: Transaction,
    ids: Vec<String>,
}

impl PatientGroupBuilder {
    fn new(transaction: &Transaction) -> Self {
        Self {
            patient: transaction.patient.clone(),
            count: 0,
            total_amount: 0.0,
            services: Vec::new(),
            methods: Vec::new(),
            statuses: Vec::new(),
            latest: transaction.clone(),
            ids: Vec::new(),
        }
    }

    fn add(&mut self, transaction: &Transaction) {
        self.count += 1;
        self.total_amount += resolve_amount(transaction);
        self.ids.push(transaction.id.clone());

        push_distinct(&mut self.services, transaction.payment_from.as_deref());
        push_distinct(&mut self.methods, transaction.payment_method.as_deref());
        push_distinct(
            &mut self.statuses,
            transaction.payment_status.as_deref().map(display_status),
        );

        if sort_time(transaction) > sort_time(&self.latest) {
            self.latest = transaction.clone();
        }
    }

    fn build(self) -> PatientGroup {
        PatientGroup {
            patient: self.patient,
            count: self.count,
            total_amount: self.total_amount,
            services: self.services.join(LIST_SEPARATOR),
            methods: self.methods.join(LIST_SEPARATOR),
            statuses: self.statuses.join(LIST_SEPARATOR),
            latest: self.latest,
            ids: self.ids,
        }
    }
}

fn push_distinct(values: &mut Vec<String>, value: Option<&str>) {
    let Some(value) = value.filter(|value| !value.trim().is_empty()) else {
        return;
    };

    if !values.iter().any(|existing| existing == value) {
        values.push(value.to_owned());
    }
}

/// Payments without a date sort as the Unix epoch.
fn sort_time(transaction: &Transaction) -> OffsetDateTime {
    transaction.paid_at.unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

/// Group payments by patient.
///
/// Groups are returned in the order each patient first appears.
pub fn group_by_patient(transactions: &[Transaction]) -> Vec<PatientGroup> {
    let mut index_by_patient: HashMap<&str, usize> = HashMap::new();
    let mut builders: Vec<PatientGroupBuilder> = Vec::new();

    for transaction in transactions {
        let index = *index_by_patient
            .entry(transaction.patient.as_str())
            .or_insert_with(|| {
                builders.push(PatientGroupBuilder::new(transaction));
                builders.len() - 1
            });

        builders[index].add(transaction);
    }

    builders.into_iter().map(PatientGroupBuilder::build).collect()
}

/// One row of the service/minute breakdown.
///
/// Payments from the same service made within the same minute are treated
/// as one logical transaction, e.g. a consultation paid in two parts.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailRow {
    /// The normalized service.
    pub service: Service,
    /// The start of the minute the payments were made in (UTC), `None` if
    /// the payments have no date.
    pub minute: Option<OffsetDateTime>,
    /// The IDs of the payments in the row, in input order.
    pub ids: Vec<String>,
    /// The sum of [resolve_amount] over the row's payments.
    pub amount: f64,
    /// The summed platform fee, only for services that charge one.
    pub platform_fee: Option<f64>,
    /// How many payments in a fee-charging row had no fee recorded at all.
    pub fees_unreported: usize,
}

impl DetailRow {
    /// The grouping key, `"<service>__<YYYY-MM-DD HH:mm>"` in UTC or
    /// `"<service>__Unknown"`.
    pub fn group_key(&self) -> String {
        format!(
            "{}{GROUP_KEY_SEPARATOR}{}",
            self.service.label(),
            self.minute_label(UtcOffset::UTC)
        )
    }

    /// The minute formatted as `YYYY-MM-DD HH:mm` in `offset`, or "Unknown".
    pub fn minute_label(&self, offset: UtcOffset) -> String {
        self.minute
            .and_then(|minute| minute.to_offset(offset).format(MINUTE_FORMAT).ok())
            .unwrap_or_else(|| UNKNOWN_MINUTE_LABEL.to_owned())
    }
}

/// Round `date_time` down to the start of its minute, in UTC.
pub fn truncate_to_minute(date_time: OffsetDateTime) -> OffsetDateTime {
    let date_time = date_time.to_offset(UtcOffset::UTC);

    date_time
        .replace_second(0)
        .and_then(|date_time| date_time.replace_nanosecond(0))
        .unwrap_or(date_time)
}

/// Group payments by service and the minute they were made in.
///
/// Rows are sorted by service name, then by minute with undated rows last.
pub fn group_by_service_minute(transactions: &[Transaction]) -> Vec<DetailRow> {
    let mut index_by_key: HashMap<(Service, Option<OffsetDateTime>), usize> = HashMap::new();
    let mut rows: Vec<DetailRow> = Vec::new();

    for transaction in transactions {
        let service = transaction.service();
        let minute = transaction.paid_at.map(truncate_to_minute);
        let charges_fee = service.charges_platform_fee();

        let index = *index_by_key
            .entry((service.clone(), minute))
            .or_insert_with(|| {
                rows.push(DetailRow {
                    service,
                    minute,
                    ids: Vec::new(),
                    amount: 0.0,
                    platform_fee: charges_fee.then_some(0.0),
                    fees_unreported: 0,
                });
                rows.len() - 1
            });

        let row = &mut rows[index];
        row.ids.push(transaction.id.clone());
        row.amount += resolve_amount(transaction);

        if let Some(platform_fee) = row.platform_fee.as_mut() {
            *platform_fee += resolve_platform_fee(transaction);

            if !transaction.fee.is_known() {
                row.fees_unreported += 1;
            }
        }
    }

    rows.sort_by(|a, b| {
        a.service
            .label()
            .cmp(b.service.label())
            .then_with(|| compare_minutes(a.minute, b.minute))
    });

    rows
}

/// Undated rows sort after every dated row.
fn compare_minutes(a: Option<OffsetDateTime>, b: Option<OffsetDateTime>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

/// The totals for one service on the expenditure page.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceTotal {
    pub service: Service,
    /// How many payments the service received.
    pub count: usize,
    pub amount: f64,
    /// `None` for services that do not charge a platform fee.
    pub platform_fee: Option<f64>,
}

/// Sum detail rows per service, keeping the order of `rows`.
pub fn total_by_service(rows: &[DetailRow]) -> Vec<ServiceTotal> {
    let mut totals: Vec<ServiceTotal> = Vec::new();

    for row in rows {
        let index = match totals.iter().position(|total| total.service == row.service) {
            Some(index) => index,
            None => {
                totals.push(ServiceTotal {
                    service: row.service.clone(),
                    count: 0,
                    amount: 0.0,
                    platform_fee: row.platform_fee.map(|_| 0.0),
                });
                totals.len() - 1
            }
        };

        let total = &mut totals[index];
        total.count += row.ids.len();
        total.amount += row.amount;

        if let (Some(total_fee), Some(row_fee)) = (total.platform_fee.as_mut(), row.platform_fee) {
            *total_fee += row_fee;
        }
    }

    totals
}
