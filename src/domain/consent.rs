use serde::{Deserialize, Serialize};

/// Phases of one browser visit through the consent interstitial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentState {
    Navigating,
    ConsentPresented,
    ConsentAccepted,
    Settled,
    TimedOut,
}

impl ConsentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentState::Navigating => "navigating",
            ConsentState::ConsentPresented => "consent_presented",
            ConsentState::ConsentAccepted => "consent_accepted",
            ConsentState::Settled => "settled",
            ConsentState::TimedOut => "timed_out",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConsentState::Settled | ConsentState::TimedOut)
    }

    /// Whether the state machine may move from `self` to `next`.
    pub fn can_transition_to(&self, next: ConsentState) -> bool {
        use ConsentState::*;
        matches!(
            (self, next),
            (Navigating, ConsentPresented)
                | (Navigating, Settled)
                | (Navigating, TimedOut)
                | (ConsentPresented, ConsentAccepted)
                | (ConsentPresented, Settled)
                | (ConsentPresented, TimedOut)
                | (ConsentAccepted, Settled)
                | (ConsentAccepted, TimedOut)
        )
    }
}

impl std::fmt::Display for ConsentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
