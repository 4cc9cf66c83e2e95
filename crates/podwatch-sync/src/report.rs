//! Cycle outcome reporting.
//!
//! Every reconciliation run produces one [`CycleReport`], serialized
//! as-is by the POST trigger endpoints.

use serde::Serialize;

use podwatch_core::types::Phase;

/// One per-record error surfaced in a cycle report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleErrorDetail {
    pub node_ip: Option<String>,
    pub phase: Phase,
    pub message: String,
}

/// Structured summary of one reconciliation cycle.
///
/// `created` is only meaningful for the gossip cycle (the stats cycle
/// never inserts node rows). `dropped` counts records excluded from the
/// cycle: validation failures for gossip, unreachable pods for stats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub cycle: &'static str,
    pub success: bool,
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub dropped: usize,
    pub duration_ms: u64,
    /// Set only when the cycle as a whole aborted in this phase.
    pub failed_phase: Option<Phase>,
    pub errors: Vec<CycleErrorDetail>,
}

impl CycleReport {
    pub fn new(cycle: &'static str) -> Self {
        Self {
            cycle,
            success: false,
            processed: 0,
            created: 0,
            updated: 0,
            dropped: 0,
            duration_ms: 0,
            failed_phase: None,
            errors: Vec::new(),
        }
    }

    /// A critical failure: the cycle aborted wholesale rather than
    /// merely finding nothing to do. Trigger endpoints map this to a
    /// non-2xx response.
    pub fn is_critical(&self) -> bool {
        self.failed_phase.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_to_do_is_not_critical() {
        let report = CycleReport::new("gossip_sync");
        assert!(!report.success);
        assert!(!report.is_critical());
    }

    #[test]
    fn failed_phase_is_critical() {
        let report = CycleReport {
            failed_phase: Some(Phase::Transaction),
            ..CycleReport::new("gossip_sync")
        };
        assert!(report.is_critical());
    }

    #[test]
    fn report_serializes_camel_case() {
        let report = CycleReport {
            duration_ms: 12,
            failed_phase: Some(Phase::Fetch),
            ..CycleReport::new("gossip_sync")
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["durationMs"], 12);
        assert_eq!(json["failedPhase"], "fetch");
    }
}
