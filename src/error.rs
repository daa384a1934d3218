//! Defines the app level error type and conversions to rendered HTML pages and alerts.
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use time::Date;

use crate::{
    alert::Alert, html::error_view, internal_server_error::InternalServerError,
    not_found::NotFoundError,
};

/// The errors that may occur in the application.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum Error {
    /// The clinic backend could not be reached or did not answer in time.
    #[error("the clinic backend could not be reached: {0}")]
    BackendUnavailable(String),

    /// The clinic backend answered with a non-success status code.
    ///
    /// `body` is the response text, which is only meant for the server logs.
    #[error("the clinic backend responded with status {status}: {body}")]
    BackendStatus {
        /// The HTTP status code of the response.
        status: u16,
        /// The response body.
        body: String,
    },

    /// The clinic backend's response did not have the expected shape.
    #[error("could not parse the clinic backend response: {0}")]
    InvalidResponse(String),

    /// The configured backend URL cannot be used as a base for API routes.
    #[error("invalid backend URL \"{0}\"")]
    InvalidBackendUrl(String),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezone(String),

    /// The user asked for payments in a date range that ends before it starts.
    #[error("the start date {start} is after the end date {end}")]
    InvalidDateRange {
        /// The first day of the range.
        start: Date,
        /// The last day of the range.
        end: Date,
    },

    /// More payments were selected for the details view than may be fetched at once.
    #[error("{requested} payments were requested, at most {max} may be fetched at once")]
    TooManyPayments {
        /// The number of payment IDs in the request.
        requested: usize,
        /// The largest number of payment IDs accepted.
        max: usize,
    },

    /// The summary could not be written as CSV.
    #[error("could not write CSV: {0}")]
    CsvExport(String),

    /// The requested resource was not found.
    #[error("the requested resource could not be found")]
    NotFound,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::NotFound => NotFoundError.into_response(),
            Error::InvalidTimezone(timezone) => InternalServerError {
                description: "Invalid Timezone Settings",
                fix: &format!(
                    "Could not get local timezone \"{timezone}\". Check your server settings and \
                    ensure the timezone has been set to valid, canonical timezone string"
                ),
            }
            .into_response(),
            Error::InvalidDateRange { start, end } => {
                let page = error_view(
                    "Bad Request",
                    "400",
                    "Invalid date range",
                    &format!(
                        "The start date {start} is after the end date {end}. \
                        Swap the dates or clear one of them."
                    ),
                );

                (StatusCode::BAD_REQUEST, Html(page.into_string())).into_response()
            }
            Error::BackendUnavailable(_) | Error::BackendStatus { .. } => {
                tracing::error!("{self}");
                InternalServerError {
                    description: "Could not reach the clinic server",
                    fix: "The clinic server did not respond. Try again in a few minutes.",
                }
                .into_response()
            }
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                InternalServerError::default().into_response()
            }
        }
    }
}

impl Error {
    /// The status code and alert shown to the user for this error.
    ///
    /// Details of backend failures stay in the server logs.
    pub fn to_alert(&self) -> (StatusCode, Alert) {
        match self {
            Error::BackendUnavailable(_) => (
                StatusCode::BAD_GATEWAY,
                Alert::error(
                    "Could not reach the clinic server",
                    "The data shown may be out of date. Try again in a few minutes.",
                ),
            ),
            Error::BackendStatus { status, .. } => (
                StatusCode::BAD_GATEWAY,
                Alert::error(
                    "The clinic server returned an error",
                    &format!("The request failed with status {status}."),
                ),
            ),
            Error::InvalidResponse(_) => (
                StatusCode::BAD_GATEWAY,
                Alert::error(
                    "Unexpected data from the clinic server",
                    "Check the server logs for more details.",
                ),
            ),
            Error::InvalidDateRange { start, end } => (
                StatusCode::BAD_REQUEST,
                Alert::error(
                    "Invalid date range",
                    &format!(
                        "The start date {start} is after the end date {end}. \
                        Swap the dates or clear one of them."
                    ),
                ),
            ),
            Error::TooManyPayments { requested, max } => (
                StatusCode::BAD_REQUEST,
                Alert::error(
                    "Too many payments selected",
                    &format!(
                        "Details can be shown for at most {max} payments at a time, \
                        but {requested} were selected. Narrow the date range and try again."
                    ),
                ),
            ),
            Error::CsvExport(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Alert::error(
                    "Export failed",
                    "The transactions could not be exported. No file was written.",
                ),
            ),
            Error::NotFound => (
                StatusCode::NOT_FOUND,
                Alert::error(
                    "Not found",
                    "The requested transactions could not be found.",
                ),
            ),
            Error::InvalidTimezone(_) | Error::InvalidBackendUrl(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Alert::error(
                    "Something went wrong",
                    "An unexpected error occurred, check the server logs for more details.",
                ),
            ),
        }
    }

    /// Convert the error into an HTTP response with an HTML alert.
    pub fn into_alert_response(self) -> Response {
        tracing::error!("{self}");
        let (status_code, alert) = self.to_alert();

        (status_code, alert.into_html()).into_response()
    }
}
