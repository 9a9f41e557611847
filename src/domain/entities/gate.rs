use crate::errors::EntitlementError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatedAction {
    Download,
    Share,
}

/// Gate states. Everything except `Idle` and `NeedsGate` is transient and
/// only held while the corresponding call is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Checking,
    Allowed,
    NeedsGate { ad: AdAvailability },
    AdPending,
    AdShown,
    PurchaseChosen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdAvailability {
    /// Preloaded and ready to show.
    Ready,
    /// Preload failed. The option stays disabled until a retry succeeds.
    Disabled,
}

/// Result of asking to perform a gated action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    ProceedImmediately,
    ShowGate { ad_ready: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdShowResult {
    /// Reward earned, or interstitial dismissed.
    Watched,
    /// The ad layer noticed an active entitlement and did not show anything.
    SkippedDueToEntitlement,
}

/// Resolution of a gate interaction.
#[derive(Debug)]
pub enum GateOutcome {
    /// Perform the action now. The gate has been reset.
    Proceed(GatedAction),
    Denied(DenyReason),
    Failed(EntitlementError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NoPendingAction,
    AdUnavailable,
    /// Purchase was started but no active entitlement showed up within the
    /// poll budget. It may still complete later.
    StillProcessing,
}

impl GateOutcome {
    pub fn proceeds(&self) -> bool {
        matches!(self, GateOutcome::Proceed(_))
    }
}
