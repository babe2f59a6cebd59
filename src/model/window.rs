//! Service-window categories and the company profile

use super::WindowId;
use serde::{Deserialize, Serialize};

/// A named service category routed to a physical window
///
/// Immutable once created. Window numbers are operator-chosen and may repeat
/// across categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowCategory {
    pub id: WindowId,
    pub name: String,
    pub window_number: u32,
}

impl WindowCategory {
    pub fn new(id: impl Into<WindowId>, name: impl Into<String>, window_number: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            window_number,
        }
    }
}

/// Company profile shown on every display surface
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    pub name: String,
    #[serde(default)]
    pub logo_url: String,
}

impl CompanyProfile {
    pub fn new(name: impl Into<String>, logo_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            logo_url: logo_url.into(),
        }
    }

    /// Name to show when no profile has been set up
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "Electronic queue"
        } else {
            &self.name
        }
    }
}
