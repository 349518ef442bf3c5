//! Builtin platform adapters and the explicit discovery step that loads
//! them. Registration happens once, at startup, driven by the composition
//! root; adapters never self-register as an import side effect.

pub mod linkedin;
pub mod remotive;
pub mod wellfound;

use tracing::{info, warn};

use crate::error::JobFlowError;
use crate::registry::{AdapterRegistration, AdapterRegistry};

/// Outcome of one discovery pass.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub loaded: Vec<String>,
    pub failed: Vec<(String, JobFlowError)>,
}

/// Every builtin adapter, in registration order.
pub fn builtin() -> Vec<AdapterRegistration> {
    vec![
        linkedin::registration(),
        wellfound::registration(),
        remotive::registration(),
    ]
}

/// Register every builtin adapter. One adapter failing validation is
/// reported individually and never prevents the rest from loading.
pub fn discover(registry: &mut AdapterRegistry) -> DiscoveryReport {
    let mut report = DiscoveryReport::default();
    for registration in builtin() {
        let key = registration.key.to_string();
        match registry.register(registration) {
            Ok(()) => {
                info!("Loaded adapter '{}'", key);
                report.loaded.push(key);
            }
            Err(e) => {
                warn!("Failed to load adapter '{}': {}", key, e);
                report.failed.push((key, e));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{capabilities, AdapterKind};

    #[test]
    fn discovery_loads_every_builtin_adapter() {
        let mut registry = AdapterRegistry::new();
        let report = discover(&mut registry);

        assert_eq!(report.loaded.len(), builtin().len());
        assert!(report.failed.is_empty());
        assert_eq!(registry.len(), builtin().len());

        assert_eq!(
            registry.get("linkedin").unwrap().kind,
            AdapterKind::Browser
        );
        assert_eq!(registry.get("remotive").unwrap().kind, AdapterKind::Api);
        assert!(registry
            .get("linkedin")
            .unwrap()
            .capabilities
            .contains(capabilities::IN_PRODUCT_APPLY));
        assert!(!registry
            .get("wellfound")
            .unwrap()
            .capabilities
            .contains(capabilities::IN_PRODUCT_APPLY));
    }

    #[test]
    fn rediscovery_reports_duplicates_without_clobbering_entries() {
        let mut registry = AdapterRegistry::new();
        discover(&mut registry);
        let second = discover(&mut registry);

        assert!(second.loaded.is_empty());
        assert_eq!(second.failed.len(), builtin().len());
        for (_, err) in &second.failed {
            assert!(matches!(err, JobFlowError::DuplicateKey { .. }));
        }
        assert_eq!(registry.len(), builtin().len());
    }
}
