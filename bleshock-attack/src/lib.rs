//! Central-role test harness engine for bleshock
//!
//! This crate drives a single BLE peripheral through repeated connection
//! attempts:
//!
//! - `TimerScheduler`: named one-shot timers with refresh/cancel
//! - `FrameDispatcher`: decodes transport frames into protocol events
//! - `ConnectionMachine`: scan, connect, negotiate, inject, reset
//! - `AttackStrategy`: pluggable injection policy
//! - `Harness`: the single-threaded loop tying them together
//!
//! # Example
//!
//! ```no_run
//! use bleshock_attack::testing::MockTransport;
//! use bleshock_attack::{Harness, HarnessConfig};
//! # use bleshock_attack::{AttackStrategy, Event, Injection, Session};
//! # struct Noop;
//! # impl AttackStrategy for Noop {
//! #     fn name(&self) -> &str { "noop" }
//! #     fn on_negotiation_complete(&self, _: &mut Session) -> Injection { Injection::wait() }
//! #     fn on_response(&self, _: &mut Session, _: &Event) -> Injection { Injection::wait() }
//! # }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut harness = Harness::new(HarnessConfig::default(), MockTransport::new(), Box::new(Noop))?;
//!     let stats = harness.run().await?;
//!     println!("{}", stats);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatcher;
pub mod harness;
pub mod machine;
pub mod session;
pub mod strategy;
pub mod testing;
pub mod timer;

pub use config::{AccessAddressPolicy, ConnectionParams, HarnessConfig};
pub use dispatcher::{classify, Dispatched, Event, FrameDispatcher};
pub use harness::{Harness, HarnessStats};
pub use machine::{Action, ConnectionMachine, MachineCounters, TimerEvent, CRASH_TIMEOUT, SCAN_TIMEOUT};
pub use session::{ConnectionState, Session};
pub use strategy::{AttackStrategy, Injection, LivenessPolicy, OutboundFrame, ResetTrigger, Verdict};
pub use timer::TimerScheduler;
