//! Apply-mode resolution: a pure function of the requested mode, the
//! platform's capabilities, and the job's flags. Downgrade-only: the
//! effective automation level never exceeds what was requested.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::types::{capabilities, flags, ApplyMode};

/// The resolver's answer for one (job, platform) pair. Ephemeral: the
/// orchestrator consumes it immediately and never stores it.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyModeDecision {
    pub requested: ApplyMode,
    pub effective: ApplyMode,
    pub reason: String,
}

pub fn resolve_apply_mode(
    requested: ApplyMode,
    platform_capabilities: &BTreeSet<String>,
    job_flags: &BTreeSet<String>,
) -> ApplyModeDecision {
    if !platform_capabilities.contains(capabilities::IN_PRODUCT_APPLY) {
        return ApplyModeDecision {
            requested,
            effective: ApplyMode::Manual,
            reason: format!(
                "platform lacks the '{}' capability; submission must happen off-platform",
                capabilities::IN_PRODUCT_APPLY
            ),
        };
    }

    if requested == ApplyMode::Auto && !job_flags.contains(flags::EXPRESS_APPLY) {
        return ApplyModeDecision {
            requested,
            effective: ApplyMode::SemiAuto,
            reason: format!(
                "job lacks the '{}' flag required for one-click submission",
                flags::EXPRESS_APPLY
            ),
        };
    }

    ApplyModeDecision {
        requested,
        effective: requested,
        reason: format!("requested mode '{requested}' is permitted unchanged"),
    }
}
