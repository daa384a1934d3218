//! Toast-style alerts for telling the user that something went wrong.
//!
//! Pages render alerts inline and htmx requests swap them into
//! `#alert-container` out-of-band. Alerts never block the page: the table
//! underneath still renders with whatever data is available.

use maud::{Markup, html};

/// A non-blocking error notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    /// The headline.
    pub message: String,
    /// Extra context, may be empty.
    pub details: String,
}

impl Alert {
    /// Create an alert with a headline and extra context.
    pub fn error(message: &str, details: &str) -> Self {
        Self {
            message: message.to_owned(),
            details: details.to_owned(),
        }
    }

    /// Render the alert so htmx swaps it into the page's alert container.
    pub fn into_html(self) -> Markup {
        html! {
            div
                id="alert-container"
                hx-swap-oob="true"
                class="w-full max-w-md px-4"
                style="position: fixed; bottom: 1rem; left: 50%; transform: translateX(-50%); z-index: 9999;"
            {
                (self.into_inline_html())
            }
        }
    }

    /// Render the alert in place, e.g. at the top of a page or fragment.
    pub fn into_inline_html(self) -> Markup {
        html! {
            div
                class="p-4 mb-4 text-sm border rounded-lg text-red-800 border-red-300
                    bg-red-50 dark:bg-gray-800 dark:text-red-400 dark:border-red-800"
                role="alert"
            {
                span class="font-medium" { (self.message) }

                @if !self.details.is_empty() {
                    " " (self.details)
                }

                button
                    type="button"
                    class="ms-2 font-bold"
                    aria-label="Close"
                    onclick="this.parentElement.remove()"
                {
                    "×"
                }
            }
        }
    }
}
