//! Attack strategy interface
//!
//! A strategy takes over once the version and length exchanges have
//! concluded. It decides which packets to inject, reacts to the peer's
//! responses and signals when the attempt has reached its trigger.

use crate::dispatcher::Event;
use crate::session::Session;
use bleshock_packet::BtlePacket;

/// Whether the attempt should end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Keep the connection and wait for more frames
    Continue,
    /// Attack payload delivered; move to reset
    TriggerReached,
}

/// When a pending reset is carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetTrigger {
    /// On the next inbound frame after the trigger
    NextFrame,
    /// In the same loop iteration as the trigger
    Immediate,
}

/// Which data PDUs count as signs of life for the scan timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessPolicy {
    pub refresh_on_data: bool,
    pub refresh_on_empty: bool,
}

impl LivenessPolicy {
    /// Refresh on PDUs that carry a payload
    pub const DATA: LivenessPolicy = LivenessPolicy {
        refresh_on_data: true,
        refresh_on_empty: false,
    };

    /// Refresh on empty PDUs only
    pub const EMPTY: LivenessPolicy = LivenessPolicy {
        refresh_on_data: false,
        refresh_on_empty: true,
    };

    /// Refresh on every data PDU
    pub const ANY: LivenessPolicy = LivenessPolicy {
        refresh_on_data: true,
        refresh_on_empty: true,
    };

    /// Whether `event` refreshes the scan timer
    pub fn refreshes_on(&self, event: &Event) -> bool {
        if event.is_empty_data() {
            self.refresh_on_empty
        } else if event.is_data() {
            self.refresh_on_data
        } else {
            false
        }
    }
}

impl Default for LivenessPolicy {
    fn default() -> Self {
        LivenessPolicy::DATA
    }
}

/// A packet to send, optionally kept as a capture artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub packet: BtlePacket,
    pub capture: bool,
}

impl OutboundFrame {
    pub fn send(packet: BtlePacket) -> Self {
        Self {
            packet,
            capture: false,
        }
    }

    pub fn send_and_capture(packet: BtlePacket) -> Self {
        Self {
            packet,
            capture: true,
        }
    }
}

/// Result of a strategy step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    pub frames: Vec<OutboundFrame>,
    pub verdict: Verdict,
}

impl Injection {
    /// Nothing to send, keep waiting
    pub fn wait() -> Self {
        Self {
            frames: Vec::new(),
            verdict: Verdict::Continue,
        }
    }

    pub fn send(frames: Vec<OutboundFrame>) -> Self {
        Self {
            frames,
            verdict: Verdict::Continue,
        }
    }

    pub fn trigger(frames: Vec<OutboundFrame>) -> Self {
        Self {
            frames,
            verdict: Verdict::TriggerReached,
        }
    }
}

/// Pluggable attack policy
///
/// Strategies keep no per-attempt state of their own; progress lives in
/// [`Session::attack_step`], which the state machine clears on reset.
pub trait AttackStrategy {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Called once per attempt when negotiation has concluded
    fn on_negotiation_complete(&self, session: &mut Session) -> Injection;

    /// Called for every frame received while injecting
    fn on_response(&self, session: &mut Session, event: &Event) -> Injection;

    fn liveness_policy(&self) -> LivenessPolicy {
        LivenessPolicy::default()
    }

    fn reset_trigger(&self) -> ResetTrigger {
        ResetTrigger::NextFrame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liveness_policy() {
        let empty = Event::DataPdu { is_empty: true };
        let data = Event::DataPdu { is_empty: false };
        let adv = Event::Unrecognized;

        assert!(LivenessPolicy::DATA.refreshes_on(&data));
        assert!(!LivenessPolicy::DATA.refreshes_on(&empty));
        assert!(LivenessPolicy::EMPTY.refreshes_on(&empty));
        assert!(!LivenessPolicy::EMPTY.refreshes_on(&data));
        assert!(LivenessPolicy::ANY.refreshes_on(&empty));
        assert!(!LivenessPolicy::ANY.refreshes_on(&adv));
    }
}
