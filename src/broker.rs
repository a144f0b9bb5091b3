//! Request/response broker (spec.md §4.5).
//!
//! Serializes outstanding commands under `request_lock`, stores the
//! expected prefix and accumulator under `response_lock`, and hands the
//! assembled response back to the blocked caller. Mutex acquisition order
//! is strictly `request_lock → response_lock` (spec.md §5); the pktio
//! worker only ever touches `response_lock`, via [`SolicitedSink`].

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{AtError, AtResult};
use crate::pktio::{CommInterface, InFlightInfo, SolicitedSink};
use crate::response::{Accumulator, AtRequest, AtResponse, CommandKind, LineOutcome, TokenTables};

struct InFlightState {
    kind: CommandKind,
    expected_prefix: Option<Vec<u8>>,
    accumulator: Accumulator,
    reply_tx: mpsc::Sender<AtResult<AtResponse>>,
}

pub struct Broker {
    comm: Arc<Mutex<Box<dyn CommInterface>>>,
    request_lock: Mutex<()>,
    response_lock: Mutex<Option<InFlightState>>,
    tables: TokenTables,
    send_timeout: Duration,
}

impl Broker {
    pub fn new(comm: Arc<Mutex<Box<dyn CommInterface>>>, tables: TokenTables, send_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            comm,
            request_lock: Mutex::new(()),
            response_lock: Mutex::new(None),
            tables,
            send_timeout,
        })
    }

    /// Registers `req` as the in-flight command and writes it to the
    /// transport (spec.md §4.5 `send_at_cmd`). Returns the channel the
    /// worker will deliver the terminated response on.
    fn send_at_cmd(&self, mut req: AtRequest) -> AtResult<mpsc::Receiver<AtResult<AtResponse>>> {
        let (tx, rx) = mpsc::channel();
        {
            let mut guard = self.response_lock.lock().unwrap();
            if guard.is_some() {
                // Unreachable under correct use: `request_lock` serializes
                // every caller of `request_with_callback`.
                return Err(AtError::Error);
            }
            *guard = Some(InFlightState {
                kind: req.kind,
                expected_prefix: req.expected_prefix.clone(),
                accumulator: Accumulator::new(req.kind),
                reply_tx: tx,
            });
        }

        req.command_text.push(b'\r');
        let sent = self.comm.lock().unwrap().send(&req.command_text, self.send_timeout);
        if let Err(e) = sent {
            *self.response_lock.lock().unwrap() = None;
            return Err(e);
        }
        Ok(rx)
    }

    /// Sends `req` and blocks the calling thread until a terminator fires
    /// or `deadline` elapses (spec.md §4.5 `request_with_callback`).
    pub fn request_with_callback(&self, req: AtRequest, deadline: Duration) -> AtResult<AtResponse> {
        let _request_guard = self.request_lock.lock().unwrap();
        let rx = self.send_at_cmd(req)?;
        match rx.recv_timeout(deadline) {
            Ok(result) => result,
            Err(_) => {
                // The worker may still deliver a late response; it will be
                // classified UNDEFINED now that in-flight state is gone
                // (spec.md §5 "Cancellation").
                *self.response_lock.lock().unwrap() = None;
                Err(AtError::Timeout)
            }
        }
    }
}

impl SolicitedSink for Broker {
    fn in_flight(&self) -> Option<InFlightInfo> {
        let guard = self.response_lock.lock().unwrap();
        guard.as_ref().map(|s| InFlightInfo { kind: s.kind, expected_prefix: s.expected_prefix.clone() })
    }

    fn push_line(&self, line: &[u8]) -> AtResult<LineOutcome> {
        let mut guard = self.response_lock.lock().unwrap();
        let state = guard.as_mut().ok_or(AtError::Error)?;
        let outcome = state.accumulator.push_line(line, &self.tables)?;
        if let LineOutcome::Terminated(_) = outcome {
            let state = guard.take().unwrap();
            let _ = state.reply_tx.send(Ok(state.accumulator.into_response()));
        }
        Ok(outcome)
    }

    fn push_raw(&self, bytes: Vec<u8>) {
        let mut guard = self.response_lock.lock().unwrap();
        if let Some(state) = guard.as_mut() {
            state.accumulator.push_raw(bytes);
        }
    }

    fn note_undefined(&self) {
        let mut guard = self.response_lock.lock().unwrap();
        if let Some(state) = guard.take() {
            let _ = state.reply_tx.send(Err(AtError::InvalidData));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pktio::EventGroup;
    use crate::response::CommandKind;
    use std::sync::mpsc as std_mpsc;

    struct LoopbackComm {
        sent: std_mpsc::Sender<Vec<u8>>,
    }

    impl CommInterface for LoopbackComm {
        fn open(&mut self, _events: Arc<EventGroup>) -> AtResult<()> {
            Ok(())
        }
        fn recv(&mut self, _buf: &mut [u8], _timeout: Duration) -> AtResult<usize> {
            Ok(0)
        }
        fn send(&mut self, buf: &[u8], _timeout: Duration) -> AtResult<usize> {
            self.sent.send(buf.to_vec()).unwrap();
            Ok(buf.len())
        }
        fn close(&mut self) {}
    }

    #[test]
    fn send_at_cmd_appends_cr_and_registers_in_flight() {
        let (tx, rx) = std_mpsc::channel();
        let comm: Arc<Mutex<Box<dyn CommInterface>>> = Arc::new(Mutex::new(Box::new(LoopbackComm { sent: tx })));
        let broker = Broker::new(comm, TokenTables::default(), Duration::from_millis(100));

        let req = AtRequest::new("AT+CGMR", CommandKind::WithoutPrefix, None, 64).unwrap();
        let _rx = broker.send_at_cmd(req).unwrap();

        assert_eq!(rx.recv().unwrap(), b"AT+CGMR\r");
        assert!(broker.in_flight().is_some());
    }

    #[test]
    fn timeout_clears_in_flight() {
        let (tx, _rx) = std_mpsc::channel();
        let comm: Arc<Mutex<Box<dyn CommInterface>>> = Arc::new(Mutex::new(Box::new(LoopbackComm { sent: tx })));
        let broker = Broker::new(comm, TokenTables::default(), Duration::from_millis(100));

        let req = AtRequest::new("AT+CGMR", CommandKind::WithoutPrefix, None, 64).unwrap();
        let result = broker.request_with_callback(req, Duration::from_millis(5));
        assert_eq!(result, Err(AtError::Timeout));
        assert!(broker.in_flight().is_none());
    }

    #[test]
    fn terminated_response_is_delivered() {
        let (tx, _rx) = std_mpsc::channel();
        let comm: Arc<Mutex<Box<dyn CommInterface>>> = Arc::new(Mutex::new(Box::new(LoopbackComm { sent: tx })));
        let broker = Broker::new(comm, TokenTables::default(), Duration::from_millis(100));

        let req = AtRequest::new("AT+CGMR", CommandKind::WithoutPrefix, None, 64).unwrap();
        let reply_rx = broker.send_at_cmd(req).unwrap();

        broker.push_line(b"LM0001").unwrap();
        broker.push_line(b"OK").unwrap();

        let response = reply_rx.recv().unwrap().unwrap();
        assert!(response.status);
    }
}
