//! Platform catalog with fail-fast registration. All structural validation
//! happens here, exactly once, at load time, before any browser process or
//! network client exists.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::contracts::{ApiAdapter, BrowserAdapter, JobSource, Operation};
use crate::error::{JobFlowError, Result};
use crate::types::AdapterKind;

/// Zero-argument constructor for an adapter. The variant fixes the adapter
/// kind at registration; the two can never disagree.
#[derive(Debug, Clone, Copy)]
pub enum AdapterFactory {
    Browser(fn() -> Box<dyn BrowserAdapter>),
    Api(fn() -> Box<dyn ApiAdapter>),
}

impl AdapterFactory {
    pub fn kind(&self) -> AdapterKind {
        match self {
            AdapterFactory::Browser(_) => AdapterKind::Browser,
            AdapterFactory::Api(_) => AdapterKind::Api,
        }
    }

    pub fn construct(&self) -> AdapterInstance {
        match self {
            AdapterFactory::Browser(f) => AdapterInstance::Browser(f()),
            AdapterFactory::Api(f) => AdapterInstance::Api(f()),
        }
    }
}

/// One constructed adapter. Ephemeral: lives inside a single orchestrator
/// run and is never reused across runs or shared across platforms.
pub enum AdapterInstance {
    Browser(Box<dyn BrowserAdapter>),
    Api(Box<dyn ApiAdapter>),
}

impl AdapterInstance {
    pub fn kind(&self) -> AdapterKind {
        match self {
            AdapterInstance::Browser(_) => AdapterKind::Browser,
            AdapterInstance::Api(_) => AdapterKind::Api,
        }
    }

    /// The operation subset common to both kinds.
    pub fn as_source_mut(&mut self) -> &mut dyn JobSource {
        match self {
            AdapterInstance::Browser(a) => &mut **a,
            AdapterInstance::Api(a) => &mut **a,
        }
    }
}

/// What an adapter hands the registry at load time.
pub struct AdapterRegistration {
    pub key: &'static str,
    pub display_name: &'static str,
    pub capabilities: &'static [&'static str],
    pub factory: AdapterFactory,
}

/// Registered platform metadata. `kind` is fixed at registration and never
/// mutated.
#[derive(Debug, Clone)]
pub struct PlatformInfo {
    pub key: String,
    pub display_name: String,
    pub kind: AdapterKind,
    pub capabilities: BTreeSet<String>,
    factory: AdapterFactory,
}

impl PlatformInfo {
    pub fn instantiate(&self) -> AdapterInstance {
        self.factory.construct()
    }
}

/// The catalog mapping platform keys to [`PlatformInfo`]. Owned by the
/// composition root; nothing self-registers behind its back.
#[derive(Default)]
pub struct AdapterRegistry {
    platforms: BTreeMap<String, PlatformInfo>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one platform, validating structural compliance before the
    /// entry lands. On any error the registry is unchanged.
    pub fn register(&mut self, registration: AdapterRegistration) -> Result<()> {
        let key = registration.key;
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(JobFlowError::Config(format!(
                "platform key '{key}' is not a lowercase slug"
            )));
        }
        if let Some(existing) = self.platforms.get(key) {
            return Err(JobFlowError::DuplicateKey {
                key: key.to_string(),
                existing: existing.display_name.clone(),
            });
        }

        let kind = registration.factory.kind();
        // Construct one probe instance and check the operation surface it
        // declares against the kind's required set. This is the load-time
        // integration check; nothing re-validates at call time.
        let mut probe = registration.factory.construct();
        let source = probe.as_source_mut();
        if source.name() != key {
            return Err(JobFlowError::Config(format!(
                "adapter name '{}' does not match its registration key '{}'",
                source.name(),
                key
            )));
        }
        let declared = source.operations();
        let missing: Vec<Operation> = Operation::required_for(kind)
            .iter()
            .filter(|op| !declared.contains(op))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(JobFlowError::ContractViolation {
                key: key.to_string(),
                kind,
                missing,
            });
        }

        debug!("Registered platform '{}' ({})", key, kind);
        self.platforms.insert(
            key.to_string(),
            PlatformInfo {
                key: key.to_string(),
                display_name: registration.display_name.to_string(),
                kind,
                capabilities: registration
                    .capabilities
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
                factory: registration.factory,
            },
        );
        Ok(())
    }

    /// Resolve a platform key. The error message enumerates every currently
    /// valid key so a bad configuration is diagnosable from the message
    /// alone.
    pub fn get(&self, key: &str) -> Result<&PlatformInfo> {
        self.platforms
            .get(key)
            .ok_or_else(|| JobFlowError::UnknownPlatform {
                key: key.to_string(),
                valid: self.platforms.keys().cloned().collect(),
            })
    }

    /// Read-only snapshot of every registered entry, keyed by platform.
    pub fn all(&self) -> &BTreeMap<String, PlatformInfo> {
        &self.platforms
    }

    pub fn by_kind(&self, kind: AdapterKind) -> BTreeMap<&str, &PlatformInfo> {
        self.platforms
            .iter()
            .filter(|(_, info)| info.kind == kind)
            .map(|(key, info)| (key.as_str(), info))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }
}
