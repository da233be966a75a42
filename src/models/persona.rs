//! Execution persona for a persona-run.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Which browser persona a persona-run impersonates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    /// Desktop browser persona.
    Desktop,
    /// Mobile browser persona (plus mobile-app API access).
    Mobile,
}

impl Persona {
    /// Whether this is the mobile persona.
    #[must_use]
    pub fn is_mobile(self) -> bool {
        matches!(self, Self::Mobile)
    }
}

impl Display for Persona {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Desktop => f.write_str("desktop"),
            Self::Mobile => f.write_str("mobile"),
        }
    }
}
