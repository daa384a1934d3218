//! Implements a struct that holds the state of the REST server.

use std::sync::Arc;

use crate::{
    Error,
    gateway::{GatewayConfig, TransactionGateway},
    pagination::PaginationConfig,
    session::Session,
    timezone::get_local_offset,
};

/// The state of the REST server.
#[derive(Clone)]
pub struct AppState {
    /// Where payment records come from.
    pub gateway: Arc<dyn TransactionGateway>,

    /// How much of the backend a single page may read.
    pub gateway_config: GatewayConfig,

    /// The doctor the console was started for.
    pub session: Session,

    /// The local timezone as a canonical timezone name, e.g. "Asia/Kolkata".
    pub local_timezone: String,

    /// The config that controls how to display pages of data.
    pub pagination_config: PaginationConfig,
}

impl AppState {
    /// Create a new [AppState].
    ///
    /// `local_timezone` should be a valid, canonical timezone name, e.g. "Asia/Kolkata".
    ///
    /// # Errors
    /// Returns [Error::InvalidTimezone] if `local_timezone` is not a known timezone.
    pub fn new(
        gateway: Arc<dyn TransactionGateway>,
        gateway_config: GatewayConfig,
        session: Session,
        local_timezone: &str,
        pagination_config: PaginationConfig,
    ) -> Result<Self, Error> {
        if get_local_offset(local_timezone).is_none() {
            return Err(Error::InvalidTimezone(local_timezone.to_owned()));
        }

        Ok(Self {
            gateway,
            gateway_config,
            session,
            local_timezone: local_timezone.to_owned(),
            pagination_config,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        Error,
        gateway::GatewayConfig,
        pagination::PaginationConfig,
        session::{Role, Session},
        test_utils::StubGateway,
    };

    use super::AppState;

    #[test]
    fn rejects_unknown_timezone() {
        let got = AppState::new(
            Arc::new(StubGateway::new(Vec::new())),
            GatewayConfig::default(),
            Session::new("doc-1", Role::Doctor),
            "Nowhere/Special",
            PaginationConfig::default(),
        );

        assert!(matches!(got, Err(Error::InvalidTimezone(_))));
    }
}
