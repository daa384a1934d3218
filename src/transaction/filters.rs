//! The filters shared by the accounts, expenditure and export routes.

use serde::{Deserialize, Serialize};
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::Error;

use super::service::Service;

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// The payment statuses that can be used to filter payments.
pub const KNOWN_STATUSES: [&str; 3] = ["paid", "pending", "refund_pending"];

/// The raw query string of the filter form.
///
/// HTML forms submit empty inputs as empty strings, so every field is kept as
/// text here and cleaned up by [FilterQuery::normalize].
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct FilterQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
}

/// Validated filters passed on to the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilters {
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub service: Option<Service>,
    pub status: Option<String>,
    pub search: Option<String>,
}

impl FilterQuery {
    /// Clean up the query into filters.
    ///
    /// Blank fields are ignored. Dates that cannot be parsed are ignored and
    /// logged rather than failing the whole page.
    ///
    /// # Errors
    /// Returns [Error::InvalidDateRange] if the start date is after the end date.
    pub fn normalize(&self) -> Result<TransactionFilters, Error> {
        let start_date = parse_date_field("start_date", self.start_date.as_deref());
        let end_date = parse_date_field("end_date", self.end_date.as_deref());

        if let (Some(start), Some(end)) = (start_date, end_date) {
            if start > end {
                return Err(Error::InvalidDateRange { start, end });
            }
        }

        Ok(TransactionFilters {
            start_date,
            end_date,
            service: non_blank(self.service.as_deref())
                .map(|service| Service::from_raw(Some(service))),
            status: non_blank(self.status.as_deref()).map(str::to_owned),
            search: non_blank(self.search.as_deref()).map(str::to_owned),
        })
    }

    /// The requested page number, starting from 1.
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    /// The same filters on a different page.
    pub fn with_page(&self, page: u64) -> Self {
        Self {
            page: Some(page),
            ..self.clone()
        }
    }

    /// The same filters without a page, e.g. for links that span all pages.
    pub fn without_page(&self) -> Self {
        Self {
            page: None,
            ..self.clone()
        }
    }

    /// Build `route?query` for these filters.
    pub fn to_url(&self, route: &str) -> String {
        match serde_urlencoded::to_string(self) {
            Ok(query) if !query.is_empty() => format!("{route}?{query}"),
            Ok(_) => route.to_owned(),
            Err(error) => {
                tracing::error!("could not encode filter query {self:?}: {error}");
                route.to_owned()
            }
        }
    }
}

impl TransactionFilters {
    /// The query parameters the backend understands, without paging.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();

        if let Some(start_date) = self.start_date.and_then(format_date) {
            pairs.push(("startDate", start_date));
        }
        if let Some(end_date) = self.end_date.and_then(format_date) {
            pairs.push(("endDate", end_date));
        }
        if let Some(service) = &self.service {
            pairs.push(("service", service.query_value().to_owned()));
        }
        if let Some(status) = &self.status {
            pairs.push(("status", status.clone()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }

        pairs
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn parse_date_field(name: &str, value: Option<&str>) -> Option<Date> {
    let value = non_blank(value)?;

    Date::parse(value, DATE_FORMAT)
        .inspect_err(|error| tracing::warn!("ignoring invalid {name} {value:?}: {error}"))
        .ok()
}

fn format_date(date: Date) -> Option<String> {
    date.format(DATE_FORMAT)
        .inspect_err(|error| tracing::error!("could not format date {date}: {error}"))
        .ok()
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use crate::{Error, transaction::service::Service};

    use super::{FilterQuery, TransactionFilters};

    #[test]
    fn blank_fields_are_ignored() {
        let query = FilterQuery {
            start_date: Some("".to_owned()),
            service: Some("  ".to_owned()),
            search: Some("".to_owned()),
            ..Default::default()
        };

        assert_eq!(query.normalize(), Ok(TransactionFilters::default()));
    }

    #[test]
    fn parses_dates_and_services() {
        let query = FilterQuery {
            start_date: Some("2024-01-01".to_owned()),
            end_date: Some("2024-01-31".to_owned()),
            service: Some("Appointments".to_owned()),
            status: Some("paid".to_owned()),
            search: Some(" asha ".to_owned()),
            page: Some(3),
        };

        let got = query.normalize().expect("filters should be valid");

        assert_eq!(
            got,
            TransactionFilters {
                start_date: Some(date!(2024 - 01 - 01)),
                end_date: Some(date!(2024 - 01 - 31)),
                service: Some(Service::Appointments),
                status: Some("paid".to_owned()),
                search: Some("asha".to_owned()),
            }
        );
    }

    #[test]
    fn invalid_dates_are_ignored() {
        let query = FilterQuery {
            start_date: Some("01/02/2024".to_owned()),
            ..Default::default()
        };

        assert_eq!(query.normalize().map(|filters| filters.start_date), Ok(None));
    }

    #[test]
    fn rejects_start_after_end() {
        let query = FilterQuery {
            start_date: Some("2024-02-01".to_owned()),
            end_date: Some("2024-01-01".to_owned()),
            ..Default::default()
        };

        assert_eq!(
            query.normalize(),
            Err(Error::InvalidDateRange {
                start: date!(2024 - 02 - 01),
                end: date!(2024 - 01 - 01),
            })
        );
    }

    #[test]
    fn backend_query_uses_backend_names() {
        let filters = TransactionFilters {
            start_date: Some(date!(2024 - 01 - 01)),
            end_date: None,
            service: Some(Service::Appointments),
            status: Some("refund_pending".to_owned()),
            search: None,
        };

        assert_eq!(
            filters.to_query_pairs(),
            [
                ("startDate", "2024-01-01".to_owned()),
                ("service", "appointment".to_owned()),
                ("status", "refund_pending".to_owned()),
            ]
        );
    }

    #[test]
    fn page_defaults_to_one() {
        assert_eq!(FilterQuery::default().page(), 1);
        assert_eq!(FilterQuery::default().with_page(0).page(), 1);
        assert_eq!(FilterQuery::default().with_page(4).page(), 4);
    }

    #[test]
    fn to_url_keeps_filters_and_page() {
        let query = FilterQuery {
            search: Some("a b".to_owned()),
            ..Default::default()
        }
        .with_page(2);

        assert_eq!(query.to_url("/accounts"), "/accounts?search=a+b&page=2");
        assert_eq!(FilterQuery::default().to_url("/accounts"), "/accounts");
    }
}
