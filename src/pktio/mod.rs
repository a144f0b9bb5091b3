//! The pktio worker (spec.md §4.4): a dedicated thread that reassembles,
//! classifies and routes every line from the transport.

pub mod buffer;

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::at::classifier::{classify, Classification, InFlightView};
use crate::error::{AtError, AtResult};
use crate::response::{AtResponse, CommandKind};
use buffer::ReadBuffer;

/// Bits of the pktio event group (spec.md §4.4, §6 "Platform").
pub const RX_DATA: u8 = 0b0001;
pub const ABORT: u8 = 0b0010;
pub const STARTED: u8 = 0b0100;
pub const ABORTED: u8 = 0b1000;

/// A single-producer, multi-consumer bitmask wait primitive. On a hosted
/// Rust target this is `Mutex<u8>` + `Condvar`; spec.md §5 treats the
/// "scoped-lock" and "event-group" primitives as external collaborators
/// because the original targets an RTOS with no such facility built in —
/// here they are simply the standard library (see SPEC_FULL.md §9).
pub struct EventGroup {
    bits: Mutex<u8>,
    cv: Condvar,
}

impl EventGroup {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { bits: Mutex::new(0), cv: Condvar::new() })
    }

    pub fn set(&self, mask: u8) {
        let mut bits = self.bits.lock().unwrap();
        *bits |= mask;
        self.cv.notify_all();
    }

    pub fn clear(&self, mask: u8) {
        let mut bits = self.bits.lock().unwrap();
        *bits &= !mask;
    }

    /// Waits for any of `mask`'s bits, clearing them on exit. Blocks
    /// indefinitely.
    pub fn wait_any(&self, mask: u8) -> u8 {
        let mut bits = self.bits.lock().unwrap();
        loop {
            let matched = *bits & mask;
            if matched != 0 {
                *bits &= !matched;
                return matched;
            }
            bits = self.cv.wait(bits).unwrap();
        }
    }

    /// Polling variant used by `shutdown` (spec.md §4.4.2).
    pub fn wait_any_timeout(&self, mask: u8, timeout: Duration) -> Option<u8> {
        let bits = self.bits.lock().unwrap();
        let (mut bits, result) = self.cv.wait_timeout(bits, timeout).unwrap();
        let matched = *bits & mask;
        if matched != 0 {
            *bits &= !matched;
            Some(matched)
        } else {
            drop(result);
            None
        }
    }
}

/// The transport ("comm interface", spec.md §6). Hardware/OS specific;
/// the only true external trait boundary this crate leaves open.
pub trait CommInterface: Send {
    /// Opens the transport. `events` is handed to the transport so its
    /// receive-ready notification (an ISR or a thread) can call
    /// `events.set(RX_DATA)` — and nothing else; it must never take a lock
    /// (spec.md §6).
    fn open(&mut self, events: Arc<EventGroup>) -> AtResult<()>;
    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> AtResult<usize>;
    fn send(&mut self, buf: &[u8], timeout: Duration) -> AtResult<usize>;
    fn close(&mut self);
}

/// Outcome of an `input_buffer_cb` preprocessor call (spec.md §4.4 step b).
pub enum PreprocessOutcome {
    Consumed(usize),
    PrefixMismatch,
    SizeMismatch,
}

pub trait InputBufferHook: Send {
    fn process(&mut self, buf: &[u8]) -> AtResult<PreprocessOutcome>;
}

/// Inspects a classified line and, on match, yields the byte length of the
/// binary data block that immediately follows it (spec.md §4.4 step d).
pub trait DataPrefixHook: Send {
    fn detect(&mut self, line: &[u8]) -> Option<usize>;
}

/// May rewrite the outbound stream and emit a command's data-send prefix
/// (spec.md §4.4 step c). Present for structural completeness; no built-in
/// command in this crate currently needs it (sockets are out of scope).
pub trait DataSendPrefixHook: Send {
    fn process(&mut self) -> AtResult<()>;
}

#[derive(Default)]
pub struct Hooks {
    pub urc_without_prefix: Vec<Vec<u8>>,
    pub undefined_cb: Option<Box<dyn FnMut(&[u8]) + Send>>,
    pub data_prefix_cb: Option<Box<dyn DataPrefixHook>>,
    pub data_send_prefix_cb: Option<Box<dyn DataSendPrefixHook>>,
    pub input_buffer_cb: Option<Box<dyn InputBufferHook>>,
}

/// What the classifier saw as "in flight" at line-processing time, plus
/// the hooks needed to deliver the outcome (implemented by the broker).
pub struct InFlightInfo {
    pub kind: CommandKind,
    pub expected_prefix: Option<Vec<u8>>,
}

/// The worker's view onto the request/response broker (spec.md §4.5):
/// queries the in-flight command and delivers terminated responses.
pub trait SolicitedSink: Send + Sync {
    fn in_flight(&self) -> Option<InFlightInfo>;
    fn push_line(&self, line: &[u8]) -> AtResult<crate::response::LineOutcome>;
    fn push_raw(&self, bytes: Vec<u8>);
    /// An `UNDEFINED` line arrived: clear in-flight state and report
    /// `InvalidData` to the blocked caller, if any (spec.md §7).
    fn note_undefined(&self);
}

/// The worker's view onto the URC dispatcher (spec.md §4.6, §4.7).
pub trait UrcSink: Send + Sync {
    fn dispatch(&self, line: &[u8]);
}

fn handle_all_received(
    buf: &mut ReadBuffer,
    solicited: &dyn SolicitedSink,
    urc: &dyn UrcSink,
    hooks: &mut Hooks,
) {
    loop {
        buf.skip_leading_junk();

        if let Some(hook) = hooks.input_buffer_cb.as_mut() {
            match hook.process(buf.unprocessed()) {
                Ok(PreprocessOutcome::Consumed(n)) => {
                    buf.advance(n);
                    continue;
                }
                Ok(PreprocessOutcome::PrefixMismatch) => {}
                Ok(PreprocessOutcome::SizeMismatch) => return,
                Err(_) => {
                    buf.reset();
                    solicited.note_undefined();
                    return;
                }
            }
        }

        if let Some(hook) = hooks.data_send_prefix_cb.as_mut() {
            if hook.process().is_err() {
                log::warn!("data_send_prefix_cb failed; continuing without it");
            }
        }

        let Some((line, consumed)) = buf.next_line() else {
            return;
        };
        let line = line.to_vec();

        let data_len_hint = hooks.data_prefix_cb.as_mut().and_then(|h| h.detect(&line));

        let flight = solicited.in_flight();
        let view = flight
            .as_ref()
            .map(|f| InFlightView { expected_prefix: f.expected_prefix.as_deref() });
        let urc_table: Vec<&[u8]> = hooks.urc_without_prefix.iter().map(|v| v.as_slice()).collect();

        match classify(&line, view.as_ref(), &urc_table) {
            Classification::Unsolicited => {
                urc.dispatch(&line);
                buf.advance(consumed);
            }
            Classification::Solicited => {
                if let Some(n) = data_len_hint {
                    buf.set_data_length(n);
                }
                match solicited.push_line(&line) {
                    Ok(crate::response::LineOutcome::Continue)
                    | Ok(crate::response::LineOutcome::Terminated(_)) => {
                        buf.advance(consumed);
                    }
                    Ok(crate::response::LineOutcome::PendingBuffer) => {
                        buf.advance(consumed);
                        if buf.data_length() > 0 {
                            match buf.drain_data(0) {
                                Ok(Some(bytes)) => solicited.push_raw(bytes),
                                Ok(None) => return,
                                Err(_) => {
                                    buf.reset();
                                    solicited.note_undefined();
                                    return;
                                }
                            }
                        }
                    }
                    Err(_) => {
                        buf.reset();
                        solicited.note_undefined();
                        return;
                    }
                }
            }
            Classification::Undefined => {
                if let Some(cb) = hooks.undefined_cb.as_mut() {
                    cb(&line);
                    buf.advance(consumed);
                } else {
                    log::error!("undefined line with no handler installed: {:?}", String::from_utf8_lossy(&line));
                    buf.reset();
                    solicited.note_undefined();
                    return;
                }
            }
        }
    }
}

fn read_loop(
    comm: &Mutex<Box<dyn CommInterface>>,
    buf: &mut ReadBuffer,
    recv_timeout: Duration,
    solicited: &dyn SolicitedSink,
    urc: &dyn UrcSink,
    hooks: &mut Hooks,
) {
    loop {
        buf.compact();

        if buf.empty_region_mut().is_empty() {
            // Buffer full: park and let the next RX_DATA resume.
            return;
        }

        let n = match comm.lock().unwrap().recv(buf.empty_region_mut(), recv_timeout) {
            Ok(n) => n,
            Err(e) => {
                log::warn!("comm recv error: {e:?}");
                return;
            }
        };
        if n == 0 {
            return;
        }
        buf.commit_received(n);

        if buf.data_length() > 0 {
            match buf.drain_data(0) {
                Ok(Some(bytes)) => solicited.push_raw(bytes),
                Ok(None) => return,
                Err(_) => {
                    buf.reset();
                    solicited.note_undefined();
                    return;
                }
            }
        }

        handle_all_received(buf, solicited, urc, hooks);
    }
}

/// Handle to a running pktio worker. Dropping this does not stop the
/// worker; call [`PktioWorker::shutdown`] explicitly.
pub struct PktioWorker {
    events: Arc<EventGroup>,
    join: Mutex<Option<JoinHandle<()>>>,
    shutdown_poll: Duration,
}

impl PktioWorker {
    /// Creates the event group and spawns the worker thread, then waits
    /// for `STARTED` or `ABORTED` (spec.md §4.4.2).
    pub fn init(
        comm: Arc<Mutex<Box<dyn CommInterface>>>,
        read_buf_len: usize,
        recv_timeout: Duration,
        shutdown_poll: Duration,
        solicited: Arc<dyn SolicitedSink>,
        urc: Arc<dyn UrcSink>,
        mut hooks: Hooks,
    ) -> AtResult<Self> {
        let events = EventGroup::new();
        let thread_events = events.clone();
        let thread_comm = comm.clone();

        let join = std::thread::spawn(move || {
            let mut buf = ReadBuffer::new(read_buf_len);
            match thread_comm.lock().unwrap().open(thread_events.clone()) {
                Ok(()) => thread_events.set(STARTED),
                Err(_) => {
                    thread_events.set(ABORTED);
                    return;
                }
            }

            loop {
                let bits = thread_events.wait_any(RX_DATA | ABORT);
                if bits & ABORT != 0 {
                    break;
                }
                if bits & RX_DATA != 0 {
                    read_loop(&thread_comm, &mut buf, recv_timeout, solicited.as_ref(), urc.as_ref(), &mut hooks);
                }
            }

            thread_comm.lock().unwrap().close();
            thread_events.set(ABORTED);
        });

        let bits = events.wait_any(STARTED | ABORTED);
        if bits & ABORTED != 0 {
            return Err(AtError::Error);
        }

        Ok(Self { events, join: Mutex::new(Some(join)), shutdown_poll })
    }

    /// Cooperative shutdown (spec.md §4.4.2): sets `ABORT`, polls for
    /// `ABORTED`, then joins the thread.
    pub fn shutdown(&self) {
        self.events.set(ABORT);
        loop {
            if self.events.wait_any_timeout(ABORTED, self.shutdown_poll).is_some() {
                break;
            }
        }
        if let Some(handle) = self.join.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    /// Wakes the worker to re-check for new data; the real transport does
    /// this from its own callback, but tests and synchronous callers may
    /// invoke it directly.
    pub fn notify_rx_data(&self) {
        self.events.set(RX_DATA);
    }
}
