//! The route URIs served by the console.

/// The root route which redirects to the accounts page.
pub const ROOT: &str = "/";
/// The patient summary of the doctor's payments.
pub const ACCOUNTS_VIEW: &str = "/accounts";
/// The service/minute breakdown of a group of payments, rendered as a modal.
pub const ACCOUNT_DETAILS: &str = "/accounts/details";
/// The patient summary as a CSV download.
pub const ACCOUNTS_EXPORT: &str = "/accounts/export.csv";
/// The service/minute breakdown of all of the doctor's payments.
pub const EXPENDITURE_VIEW: &str = "/expenditure";
/// Liveness probe.
pub const HEALTH: &str = "/api/health";
