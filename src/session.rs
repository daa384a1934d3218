//! The signed-in user the console acts for.
//!
//! Logging in happens elsewhere. The console is started for one doctor and
//! every backend query is scoped to that doctor's ID.

use std::fmt::Display;

/// What the signed-in user is allowed to see.
///
/// All roles currently see the same accounts, scoped to the session's
/// doctor ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Role {
    Doctor,
    Staff,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Role::Doctor => "Doctor",
            Role::Staff => "Staff",
            Role::Admin => "Admin",
        };

        f.write_str(label)
    }
}

/// The doctor whose payments are shown and the role of the user viewing them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub doctor_id: String,
    pub role: Role,
}

impl Session {
    pub fn new(doctor_id: &str, role: Role) -> Self {
        Self {
            doctor_id: doctor_id.to_owned(),
            role,
        }
    }

    /// The label shown in the navigation bar, e.g. "Staff · doc-42".
    pub fn label(&self) -> String {
        format!("{} · {}", self.role, self.doctor_id)
    }
}
