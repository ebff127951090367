//! In-memory transport and capture sink for driving the harness without a dongle

use bleshock_core::{Error, Packet, PacketSink, Result, Transport};
use bytes::Bytes;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One scripted transport read
#[derive(Debug)]
pub enum ScriptedRead {
    Frame(Bytes),
    Error(Error),
}

type Responder = Box<dyn FnMut(&[u8]) -> Vec<Bytes>>;

/// Scripted [`Transport`]
///
/// Reads are served from a queue. A responder, when set, sees every sent
/// frame and may queue replies, which lets tests play the peer.
#[derive(Default)]
pub struct MockTransport {
    inbound: VecDeque<ScriptedRead>,
    sent: Vec<Vec<u8>>,
    fail_sends: bool,
    responder: Option<Responder>,
    stop_when_drained: Option<Arc<AtomicBool>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_inbound(&mut self, frame: impl Into<Bytes>) {
        self.inbound.push_back(ScriptedRead::Frame(frame.into()));
    }

    pub fn push_error(&mut self, error: Error) {
        self.inbound.push_back(ScriptedRead::Error(error));
    }

    /// Make every send fail
    pub fn fail_sends(&mut self, fail: bool) {
        self.fail_sends = fail;
    }

    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Vec<Bytes> + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Clear `running` once the inbound queue is empty
    pub fn stop_when_drained(mut self, running: Arc<AtomicBool>) -> Self {
        self.stop_when_drained = Some(running);
        self
    }

    /// Frames handed to [`Transport::send`], oldest first
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    pub fn pending(&self) -> usize {
        self.inbound.len()
    }
}

impl Transport for MockTransport {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        if self.fail_sends {
            return Err(Error::send("mock transport refused frame"));
        }
        self.sent.push(frame.to_vec());
        if let Some(responder) = self.responder.as_mut() {
            for reply in responder(frame) {
                self.inbound.push_back(ScriptedRead::Frame(reply));
            }
        }
        Ok(())
    }

    fn poll_recv(&mut self) -> Result<Option<Bytes>> {
        match self.inbound.pop_front() {
            Some(ScriptedRead::Frame(frame)) => Ok(Some(frame)),
            Some(ScriptedRead::Error(e)) => Err(e),
            None => {
                if let Some(running) = &self.stop_when_drained {
                    running.store(false, Ordering::SeqCst);
                }
                Ok(None)
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Capture sink keeping packets in memory; clones share storage
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    packets: Rc<RefCell<Vec<Packet>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn packets(&self) -> Vec<Packet> {
        self.packets.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.packets.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.borrow().is_empty()
    }
}

impl PacketSink for MemorySink {
    fn record(&mut self, packet: &Packet) -> Result<()> {
        self.packets.borrow_mut().push(packet.clone());
        Ok(())
    }
}
