//! Harness loop
//!
//! Ties the transport, the frame dispatcher, the timer scheduler and the
//! connection state machine together. Everything runs on one task; timer
//! expiries are processed between transport reads, so no two handlers ever
//! run concurrently.

use crate::config::HarnessConfig;
use crate::dispatcher::FrameDispatcher;
use crate::machine::{Action, ConnectionMachine, TimerEvent};
use crate::session::Session;
use crate::strategy::AttackStrategy;
use crate::timer::TimerScheduler;
use bleshock_core::{Direction, Error, Packet, PacketSink, Result, Transport};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Counters for one harness run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HarnessStats {
    pub frames_received: u64,
    pub frames_decoded: u64,
    pub undecodable_reads: u64,
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub send_failures: u64,
    pub connection_attempts: u64,
    pub injections: u64,
    pub resets: u64,
    pub liveness_failures: u64,
    pub captured: u64,
}

impl fmt::Display for HarnessStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rx={} (decoded={}, undecodable={}) tx={} ({} bytes, {} failed) \
             attempts={} injections={} resets={} liveness_failures={} captured={}",
            self.frames_received,
            self.frames_decoded,
            self.undecodable_reads,
            self.frames_sent,
            self.bytes_sent,
            self.send_failures,
            self.connection_attempts,
            self.injections,
            self.resets,
            self.liveness_failures,
            self.captured
        )
    }
}

/// Single-threaded harness driving one peer
pub struct Harness<T: Transport> {
    run_id: Uuid,
    config: HarnessConfig,
    transport: T,
    dispatcher: FrameDispatcher,
    timers: TimerScheduler<TimerEvent>,
    machine: ConnectionMachine,
    sink: Option<Box<dyn PacketSink>>,
    running: Arc<AtomicBool>,
    started: bool,
    stats: HarnessStats,
}

impl<T: Transport> Harness<T> {
    pub fn new(config: HarnessConfig, transport: T, strategy: Box<dyn AttackStrategy>) -> Result<Self> {
        config.validate()?;
        let machine = ConnectionMachine::new(&config, strategy);
        Ok(Self {
            run_id: Uuid::now_v7(),
            dispatcher: FrameDispatcher::new(config.max_decode_failures),
            timers: TimerScheduler::new(),
            machine,
            config,
            transport,
            sink: None,
            running: Arc::new(AtomicBool::new(true)),
            started: false,
            stats: HarnessStats::default(),
        })
    }

    /// Keep packets flagged for capture in `sink`
    pub fn with_sink(mut self, sink: Box<dyn PacketSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Flag checked once per loop iteration; clear it to stop [`Harness::run`]
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn stats(&self) -> HarnessStats {
        self.stats
    }

    pub fn session(&self) -> &Session {
        self.machine.session()
    }

    pub fn timers(&self) -> &TimerScheduler<TimerEvent> {
        &self.timers
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Send the first scan request and arm the scan timer at `now`
    pub fn start_at(&mut self, now: Instant) {
        if self.started {
            return;
        }
        self.started = true;
        self.timers = TimerScheduler::starting_at(now);
        info!(
            id = %self.run_id,
            transport = self.transport.name(),
            strategy = self.machine.strategy_name(),
            peer = %self.config.peer_address,
            "Harness started"
        );
        let actions = self.machine.start(&mut self.timers);
        self.execute(actions);
    }

    /// One loop iteration at `now`
    ///
    /// Expired timers are handled first, then at most one transport read is
    /// dispatched. Only [`Error::TransportAbsent`] is returned; every other
    /// failure is logged and absorbed.
    pub fn step(&mut self, now: Instant) -> Result<()> {
        if !self.started {
            self.start_at(now);
        }

        for (name, event) in self.timers.tick(now) {
            trace!(timer = %name, "Timer expired");
            let actions = self.machine.handle_timer(event, &mut self.timers);
            self.execute(actions);
        }

        let raw = match self.transport.poll_recv() {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(()),
            Err(e) => {
                let result = self.dispatcher.record_read_error(&e);
                self.sync_dispatch_stats();
                return result;
            }
        };
        self.stats.frames_received += 1;

        let dispatched = self.dispatcher.dispatch(&raw);
        self.sync_dispatch_stats();

        if let Some(dispatched) = dispatched? {
            let actions = self.machine.handle_event(&dispatched.event, &mut self.timers);
            self.execute(actions);
        }

        let actions = self.machine.advance(&mut self.timers);
        self.execute(actions);
        Ok(())
    }

    /// Run until the running flag is cleared or the transport is lost
    pub async fn run(&mut self) -> Result<HarnessStats> {
        self.start_at(Instant::now());

        while self.running.load(Ordering::SeqCst) {
            if let Err(e) = self.step(Instant::now()) {
                error!(
                    id = %self.run_id,
                    error = %e,
                    code = e.error_code(),
                    "Harness stopped"
                );
                return Err(e);
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }

        info!(id = %self.run_id, stats = %self.stats, "Harness finished");
        Ok(self.stats)
    }

    fn sync_dispatch_stats(&mut self) {
        self.stats.frames_decoded = self.dispatcher.decoded();
        self.stats.undecodable_reads = self.dispatcher.undecodable();
    }

    fn sync_machine_stats(&mut self) {
        let counters = self.machine.counters();
        self.stats.connection_attempts = counters.connection_attempts;
        self.stats.injections = counters.injections;
        self.stats.resets = counters.resets;
        self.stats.liveness_failures = counters.liveness_failures;
    }

    fn execute(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Send(packet) => {
                    let bytes = packet.to_bytes(self.machine.session().crc_init);
                    match self.transport.send(&bytes) {
                        Ok(()) => {
                            debug!(state = %self.machine.state(), "Central TX ---> {}", packet);
                            self.stats.frames_sent += 1;
                            self.stats.bytes_sent += bytes.len() as u64;
                        }
                        Err(e) => {
                            error!(
                                error = %e,
                                code = e.error_code(),
                                packet = %packet,
                                "Send failed"
                            );
                            self.stats.send_failures += 1;
                            self.machine.abandon(&mut self.timers);
                            // Remaining actions belong to the abandoned attempt
                            break;
                        }
                    }
                }
                Action::Capture(packet) => self.capture(packet.to_bytes(self.machine.session().crc_init)),
                Action::LivenessLost(peer) => {
                    let e = Error::LivenessLost {
                        peer: peer.to_string(),
                    };
                    error!(code = e.error_code(), "{}; the peer may have crashed", e);
                }
            }
        }
        self.sync_machine_stats();
    }

    fn capture(&mut self, bytes: Vec<u8>) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        let packet = Packet::new(self.transport.name().to_string(), Direction::Tx, bytes);
        match sink.record(&packet) {
            Ok(()) => self.stats.captured += 1,
            Err(e) => warn!(error = %e, code = e.error_code(), "Capture failed"),
        }
    }
}
