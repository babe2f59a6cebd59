//! Company profile setup

use crate::model::CompanyProfile;
use crate::store::{self, SharedStore, StoreKey};
use crate::{QueueError, Result};
use std::sync::Arc;

/// Reads and writes the company profile singleton
pub struct CompanySetup {
    store: Arc<dyn SharedStore>,
}

impl CompanySetup {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    /// Current profile; an absent or malformed profile reads as the default
    pub fn load(&self) -> Result<CompanyProfile> {
        Ok(store::load_json(self.store.as_ref(), StoreKey::Company)?.unwrap_or_default())
    }

    /// Whether a profile has been saved
    pub fn is_configured(&self) -> Result<bool> {
        Ok(store::load_json::<CompanyProfile>(self.store.as_ref(), StoreKey::Company)?.is_some())
    }

    /// Validate and persist a profile
    pub fn save(&self, profile: CompanyProfile) -> Result<CompanyProfile> {
        let profile = CompanyProfile::new(profile.name.trim(), profile.logo_url.trim());

        if profile.name.is_empty() {
            return Err(QueueError::InvalidInput(
                "company name cannot be empty".to_string(),
            ));
        }
        if !profile.logo_url.is_empty() && !is_http_url(&profile.logo_url) {
            return Err(QueueError::InvalidInput(format!(
                "logo URL must start with http:// or https://, got {}",
                profile.logo_url
            )));
        }

        store::save_json(self.store.as_ref(), StoreKey::Company, &profile)?;
        tracing::info!(name = %profile.name, "Company profile saved");
        Ok(profile)
    }
}

fn is_http_url(url: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        url.len() > scheme.len()
            && url
                .get(..scheme.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn setup() -> CompanySetup {
        CompanySetup::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_unconfigured_profile_is_default() {
        let setup = setup();
        assert!(!setup.is_configured().unwrap());
        assert_eq!(setup.load().unwrap(), CompanyProfile::default());
    }

    #[test]
    fn test_save_and_load() {
        let setup = setup();
        setup
            .save(CompanyProfile::new(" Acme Bank ", "https://acme.test/logo.png"))
            .unwrap();

        let profile = setup.load().unwrap();
        assert_eq!(profile.name, "Acme Bank");
        assert_eq!(profile.logo_url, "https://acme.test/logo.png");
        assert!(setup.is_configured().unwrap());
    }

    #[test]
    fn test_logo_is_optional() {
        let setup = setup();
        assert!(setup.save(CompanyProfile::new("Acme", "")).is_ok());
    }

    #[test]
    fn test_rejects_invalid_profile() {
        let setup = setup();
        assert!(matches!(
            setup.save(CompanyProfile::new("", "")),
            Err(QueueError::InvalidInput(_))
        ));
        assert!(matches!(
            setup.save(CompanyProfile::new("Acme", "ftp://acme.test/logo.png")),
            Err(QueueError::InvalidInput(_))
        ));
        assert!(!setup.is_configured().unwrap());
    }

    #[test]
    fn test_http_url_check() {
        assert!(is_http_url("https://a.test/x.png"));
        assert!(is_http_url("HTTP://a.test"));
        assert!(!is_http_url("https://"));
        assert!(!is_http_url("logo.png"));
    }
}
