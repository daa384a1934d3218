//! The clinic service (department) that a payment originated from.

use std::fmt::Display;

/// The label used when a payment does not say where it came from.
pub const UNSPECIFIED_SERVICE_LABEL: &str = "-";

/// The subsystem that originated a payment.
///
/// Free-text `paymentFrom` values from the backend are normalized
/// case-insensitively into one of the known services. Anything else is kept
/// verbatim so that new services still show up in reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Service {
    /// Consultation fees collected through the appointment system.
    Appointments,
    /// Lab tests.
    Lab,
    /// Medicines sold through the pharmacy.
    Pharmacy,
    /// A service this console does not know about, in its original casing.
    Other(String),
    /// The payment did not record its source.
    Unspecified,
}

impl Service {
    /// The services that can be used to filter payments.
    pub const KNOWN: [Service; 3] = [Service::Appointments, Service::Lab, Service::Pharmacy];

    /// Normalize a raw `paymentFrom` value.
    ///
    /// A value that already is a display name, e.g. `"Appointments"` or `"-"`,
    /// maps back to its service so that every label names exactly one service.
    pub fn from_raw(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Service::Unspecified;
        };

        match raw.trim().to_lowercase().as_str() {
            "" => Service::Unspecified,
            "appointment" => Service::Appointments,
            "lab" => Service::Lab,
            "pharmacy" => Service::Pharmacy,
            _ => Service::from_label(raw),
        }
    }

    fn from_label(label: &str) -> Self {
        Service::KNOWN
            .into_iter()
            .chain([Service::Unspecified])
            .find(|service| service.label() == label)
            .unwrap_or_else(|| Service::Other(label.to_owned()))
    }

    /// The display name used in tables and as part of grouping keys.
    pub fn label(&self) -> &str {
        match self {
            Service::Appointments => "Appointments",
            Service::Lab => "Lab",
            Service::Pharmacy => "Pharmacy",
            Service::Other(name) => name,
            Service::Unspecified => UNSPECIFIED_SERVICE_LABEL,
        }
    }

    /// The value the backend expects for its `service` filter.
    pub fn query_value(&self) -> &str {
        match self {
            Service::Appointments => "appointment",
            Service::Lab => "lab",
            Service::Pharmacy => "pharmacy",
            Service::Other(name) => name,
            Service::Unspecified => "",
        }
    }

    /// Whether a platform fee is deducted from payments for this service.
    pub fn charges_platform_fee(&self) -> bool {
        *self == Service::Appointments
    }
}

impl Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Map a raw `paymentFrom` value to its display name.
///
/// `"appointment"`, `"lab"` and `"pharmacy"` are matched case-insensitively
/// after trimming, other non-empty values are returned unchanged and empty or
/// missing values become `"-"`.
pub fn normalize_service_name(raw: Option<&str>) -> String {
    Service::from_raw(raw).label().to_owned()
}

#[cfg(test)]
mod tests {
    use super::{Service, normalize_service_name};

    #[test]
    fn normalizes_known_services_case_insensitively() {
        assert_eq!(normalize_service_name(Some("  APPOINTMENT ")), "Appointments");
        assert_eq!(normalize_service_name(Some("lab")), "Lab");
        assert_eq!(normalize_service_name(Some("Pharmacy")), "Pharmacy");
    }

    #[test]
    fn passes_unknown_services_through_unchanged() {
        assert_eq!(normalize_service_name(Some("Xray")), "Xray");
    }

    #[test]
    fn plural_appointments_is_not_a_known_service() {
        assert_eq!(normalize_service_name(Some("APPOINTMENTS")), "APPOINTMENTS");
        assert_eq!(
            Service::from_raw(Some(" appointments ")),
            Service::Other(" appointments ".to_owned())
        );
        assert!(!Service::from_raw(Some("appointments")).charges_platform_fee());
    }

    #[test]
    fn missing_or_blank_service_becomes_dash() {
        assert_eq!(normalize_service_name(None), "-");
        assert_eq!(normalize_service_name(Some("   ")), "-");
    }

    #[test]
    fn literal_dash_is_the_same_service_as_a_missing_one() {
        assert_eq!(Service::from_raw(Some("-")), Service::from_raw(None));
    }

    #[test]
    fn display_names_map_back_to_their_service() {
        assert_eq!(Service::from_raw(Some("Appointments")), Service::Appointments);
        assert!(Service::from_raw(Some("Appointments")).charges_platform_fee());
        assert_eq!(
            Service::from_raw(Some("Appointments ")),
            Service::Other("Appointments ".to_owned())
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["appointment", "LAB", "pharmacy", "Xray", ""] {
            let once = normalize_service_name(Some(raw));
            let twice = normalize_service_name(Some(&once));

            assert_eq!(once, twice, "normalizing {raw:?} twice changed the result");
        }
    }

    #[test]
    fn only_appointments_charge_a_platform_fee() {
        assert!(Service::Appointments.charges_platform_fee());
        assert!(!Service::Lab.charges_platform_fee());
        assert!(!Service::Pharmacy.charges_platform_fee());
        assert!(!Service::Other("Xray".to_owned()).charges_platform_fee());
    }
}
