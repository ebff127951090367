//! Central-role connection state machine
//!
//! ```text
//! Scanning --adv from peer--> Connecting --data PDU--> VersionExchange
//!    ^                                                      |
//!    |                                              LL_VERSION_IND
//!    |                                                      v
//! ResetPending <--trigger-- Injecting <--LENGTH_RSP/UNKNOWN_RSP-- LengthExchange
//! ```
//!
//! The machine never touches the transport. Every transition returns the
//! [`Action`]s the harness must carry out, and timers are armed on the
//! scheduler handed in by the caller.

use crate::config::{AccessAddressPolicy, ConnectionParams, HarnessConfig};
use crate::dispatcher::Event;
use crate::session::{ConnectionState, Session};
use crate::strategy::{AttackStrategy, Injection, ResetTrigger, Verdict};
use crate::timer::TimerScheduler;
use bleshock_core::Error;
use bleshock_packet::{
    AddressType, BdAddress, BtlePacket, ControlPdu, LengthParams, VersionInd,
};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Re-scan heartbeat and connection liveness timer
pub const SCAN_TIMEOUT: &str = "scan_timeout";

/// Armed after a reset; fires if the peer never advertises again
pub const CRASH_TIMEOUT: &str = "crash_timeout";

/// Octets requested in `LL_LENGTH_REQ`
pub const REQUESTED_OCTETS: u16 = 251;

/// Events carried by the harness timers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    ScanTimeout,
    CrashTimeout,
}

/// Work the harness performs on behalf of the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Transmit a packet
    Send(BtlePacket),
    /// Persist a packet as a capture artifact
    Capture(BtlePacket),
    /// The peer did not come back after a reset
    LivenessLost(BdAddress),
}

/// Per-run transition counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MachineCounters {
    pub connection_attempts: u64,
    pub injections: u64,
    pub resets: u64,
    pub liveness_failures: u64,
    /// Attempts abandoned by the scan timeout before a reset
    pub stalled_attempts: u64,
}

/// Connection state machine
pub struct ConnectionMachine {
    session: Session,
    strategy: Box<dyn AttackStrategy>,
    connection: ConnectionParams,
    access_policy: AccessAddressPolicy,
    scan_timeout: Duration,
    crash_timeout: Duration,
    counters: MachineCounters,
}

impl ConnectionMachine {
    pub fn new(config: &HarnessConfig, strategy: Box<dyn AttackStrategy>) -> Self {
        let access_address = config.access_address.next_address(&mut rand::thread_rng());
        Self {
            session: Session::new(
                config.local_address,
                config.peer_address,
                access_address,
                config.crc_init,
            ),
            strategy,
            connection: config.connection,
            access_policy: config.access_address,
            scan_timeout: config.scan_timeout,
            crash_timeout: config.crash_timeout,
            counters: MachineCounters::default(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state
    }

    pub fn counters(&self) -> MachineCounters {
        self.counters
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Send the first scan request and arm the scan heartbeat
    pub fn start(&mut self, timers: &mut TimerScheduler<TimerEvent>) -> Vec<Action> {
        info!(peer = %self.session.peer_address, "Waiting for advertisements");
        timers.restart(SCAN_TIMEOUT, self.scan_timeout, TimerEvent::ScanTimeout);
        vec![Action::Send(self.scan_request())]
    }

    /// Feed one classified inbound frame
    pub fn handle_event(
        &mut self,
        event: &Event,
        timers: &mut TimerScheduler<TimerEvent>,
    ) -> Vec<Action> {
        let mut actions = Vec::new();

        if self.strategy.liveness_policy().refreshes_on(event) {
            self.refresh_liveness(timers);
        }
        if event.is_non_empty_data() {
            debug!(state = %self.session.state, "Peer RX <--- {}", event);
        }

        match self.session.state {
            ConnectionState::Scanning => match event.advertiser() {
                Some((address, address_type))
                    if address == self.session.peer_address && !self.session.connecting =>
                {
                    self.connect(address_type, timers, &mut actions)
                }
                _ => self.ignore(event),
            },
            ConnectionState::Connecting if event.is_non_empty_data() => {
                self.session.connecting = false;
                self.session.state = ConnectionState::VersionExchange;
                info!(peer = %self.session.peer_address, "Peer connected");
                actions.push(Action::Send(BtlePacket::control(
                    self.session.access_address,
                    ControlPdu::VersionInd(VersionInd::v4_2()),
                )));
            }
            ConnectionState::VersionExchange => match event {
                Event::Control(ControlPdu::VersionInd(version)) => {
                    debug!(
                        version = version.version,
                        company = format_args!("0x{:04x}", version.company_id),
                        subversion = version.subversion,
                        "Peer version"
                    );
                    self.session.state = ConnectionState::LengthExchange;
                    actions.push(Action::Send(BtlePacket::control(
                        self.session.access_address,
                        ControlPdu::LengthReq(LengthParams::symmetric(REQUESTED_OCTETS)),
                    )));
                }
                _ => self.ignore(event),
            },
            ConnectionState::LengthExchange => match event {
                Event::Control(ControlPdu::LengthRsp(_))
                | Event::Control(ControlPdu::UnknownRsp { .. }) => {
                    self.begin_injection(&mut actions)
                }
                _ => self.ignore(event),
            },
            ConnectionState::Injecting => {
                let injection = self.strategy.on_response(&mut self.session, event);
                self.apply(injection, &mut actions);
            }
            ConnectionState::ResetPending
                if self.strategy.reset_trigger() == ResetTrigger::NextFrame =>
            {
                self.reset(timers, &mut actions)
            }
            _ => self.ignore(event),
        }

        actions
    }

    /// Carry out a reset that does not wait for a frame
    ///
    /// Called by the harness once per loop iteration, after dispatch.
    pub fn advance(&mut self, timers: &mut TimerScheduler<TimerEvent>) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.session.state == ConnectionState::ResetPending
            && self.strategy.reset_trigger() == ResetTrigger::Immediate
        {
            self.reset(timers, &mut actions);
        }
        actions
    }

    /// Handle an expired timer
    pub fn handle_timer(
        &mut self,
        event: TimerEvent,
        timers: &mut TimerScheduler<TimerEvent>,
    ) -> Vec<Action> {
        let mut actions = Vec::new();

        match event {
            TimerEvent::ScanTimeout => {
                match self.session.state {
                    ConnectionState::ResetPending => self.reset(timers, &mut actions),
                    state => {
                        if state != ConnectionState::Scanning {
                            warn!(
                                peer = %self.session.peer_address,
                                state = %state,
                                "Peer stopped responding, back to scanning"
                            );
                            self.counters.stalled_attempts += 1;
                        }
                        self.session.reset();
                        actions.push(Action::Send(self.scan_request()));
                    }
                }
                timers.restart(SCAN_TIMEOUT, self.scan_timeout, TimerEvent::ScanTimeout);
            }
            TimerEvent::CrashTimeout => {
                self.counters.liveness_failures += 1;
                actions.push(Action::LivenessLost(self.session.peer_address));
            }
        }

        actions
    }

    /// Drop the current attempt after a failed send
    pub fn abandon(&mut self, timers: &mut TimerScheduler<TimerEvent>) {
        if self.session.state != ConnectionState::Scanning {
            warn!(state = %self.session.state, "Abandoning connection attempt");
        }
        self.session.reset();
        if !timers.is_active(SCAN_TIMEOUT) {
            timers.restart(SCAN_TIMEOUT, self.scan_timeout, TimerEvent::ScanTimeout);
        }
    }

    fn scan_request(&self) -> BtlePacket {
        BtlePacket::scan_request(
            self.session.local_address,
            self.session.peer_address,
            self.session.peer_address_type,
        )
    }

    fn refresh_liveness(&self, timers: &mut TimerScheduler<TimerEvent>) {
        if let Err(e) = timers.refresh(SCAN_TIMEOUT) {
            debug!(code = e.error_code(), error = %e, "Liveness refresh ignored");
        }
    }

    fn ignore(&self, event: &Event) {
        if event.is_data() {
            let e = Error::UnexpectedFrame(event.to_string());
            debug!(code = e.error_code(), state = %self.session.state, "{}", e);
        } else {
            trace!(state = %self.session.state, %event, "Ignoring frame");
        }
    }

    fn connect(
        &mut self,
        address_type: AddressType,
        timers: &mut TimerScheduler<TimerEvent>,
        actions: &mut Vec<Action>,
    ) {
        self.session.connecting = true;
        self.session.peer_address_type = address_type;
        timers.cancel(CRASH_TIMEOUT);
        self.refresh_liveness(timers);
        self.session.state = ConnectionState::Connecting;
        self.counters.connection_attempts += 1;

        info!(
            peer = %self.session.peer_address,
            address_type = %address_type,
            access_address = format_args!("0x{:08x}", self.session.access_address),
            "Peer detected, sending CONNECT_REQ"
        );

        let request = self.connection.connect_request(
            self.session.local_address,
            self.session.peer_address,
            self.session.access_address,
            self.session.crc_init,
        );
        actions.push(Action::Send(BtlePacket::connect_request(request, address_type)));
    }

    fn begin_injection(&mut self, actions: &mut Vec<Action>) {
        self.session.state = ConnectionState::Injecting;
        self.counters.injections += 1;
        info!(strategy = self.strategy.name(), "Negotiation complete, injecting");

        let injection = self.strategy.on_negotiation_complete(&mut self.session);
        self.apply(injection, actions);
    }

    fn apply(&mut self, injection: Injection, actions: &mut Vec<Action>) {
        for frame in injection.frames {
            let capture = frame.capture.then(|| frame.packet.clone());
            actions.push(Action::Send(frame.packet));
            if let Some(packet) = capture {
                actions.push(Action::Capture(packet));
            }
        }

        if injection.verdict == Verdict::TriggerReached {
            self.session.state = ConnectionState::ResetPending;
            info!(strategy = self.strategy.name(), "Trigger reached, reset pending");
        }
    }

    fn reset(&mut self, timers: &mut TimerScheduler<TimerEvent>, actions: &mut Vec<Action>) {
        self.session.reset();
        self.session.access_address = self.access_policy.next_address(&mut rand::thread_rng());
        self.counters.resets += 1;

        info!(
            peer = %self.session.peer_address,
            "Connection reset, malformed packets were sent; waiting for advertisements"
        );
        actions.push(Action::Send(self.scan_request()));

        timers.restart(CRASH_TIMEOUT, self.crash_timeout, TimerEvent::CrashTimeout);
        if !timers.is_active(SCAN_TIMEOUT) {
            timers.restart(SCAN_TIMEOUT, self.scan_timeout, TimerEvent::ScanTimeout);
        }
    }
}
