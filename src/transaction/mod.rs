//! Payments made to a doctor and the reports built from them.
//!
//! This module contains everything related to transactions:
//! - The wire format of the backend's payment records and their normalized form
//! - The pure grouping and summing used by the reports
//! - The accounts and expenditure pages, the details fragment and the CSV export

mod accounts_page;
mod aggregation;
mod details;
mod expenditure_page;
mod export;
mod filters;
mod record;
mod service;
mod view;

pub use accounts_page::get_accounts_page;
pub use aggregation::{
    DetailRow, PatientGroup, ServiceTotal, UNKNOWN_MINUTE_LABEL, display_status,
    group_by_patient, group_by_service_minute, resolve_amount, resolve_platform_fee,
    total_by_service, truncate_to_minute,
};
pub use details::get_details_fragment;
pub use expenditure_page::get_expenditure_page;
pub use export::{export_filename, get_accounts_export, summary_csv};
pub use filters::TransactionFilters;
pub use record::{FeeSource, RawTransaction, Transaction};
pub use service::{Service, normalize_service_name};
