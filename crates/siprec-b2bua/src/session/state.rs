use std::fmt;

use serde::Serialize;

/// Lifecycle of a call session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    /// Inbound INVITE accepted, nothing allocated yet
    Init,
    /// Waiting for the relay to rewrite the inbound offer
    NegotiatingOffer,
    /// Outbound INVITE sent to the trunk
    Routing,
    /// Outbound leg answered, relay answer pending
    NegotiatingAnswer,
    /// Both legs bridged
    Connected,
    /// A re-INVITE is being renegotiated
    Modifying,
    /// Ended after having been connected
    Terminated,
    /// Setup failed before the call was connected
    Failed,
}

impl CallState {
    pub fn is_terminal(self) -> bool {
        matches!(self, CallState::Terminated | CallState::Failed)
    }

    pub fn is_established(self) -> bool {
        matches!(self, CallState::Connected | CallState::Modifying)
    }

    pub fn can_transition_to(self, next: CallState) -> bool {
        use CallState::*;
        match (self, next) {
            (Init, NegotiatingOffer)
            | (NegotiatingOffer, Routing)
            | (Routing, NegotiatingAnswer)
            | (NegotiatingAnswer, Connected) => true,
            (Connected, Modifying) | (Modifying, Connected) => true,
            (Connected, Terminated) | (Modifying, Terminated) => true,
            (Init, Failed) | (NegotiatingOffer, Failed) | (Routing, Failed) | (NegotiatingAnswer, Failed) => {
                true
            }
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CallState::Init => "init",
            CallState::NegotiatingOffer => "negotiating_offer",
            CallState::Routing => "routing",
            CallState::NegotiatingAnswer => "negotiating_answer",
            CallState::Connected => "connected",
            CallState::Modifying => "modifying",
            CallState::Terminated => "terminated",
            CallState::Failed => "failed",
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
