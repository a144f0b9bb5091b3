//! End-to-end tests driving the full pktio worker / broker / registration
//! pipeline against a scripted in-memory transport (spec.md §8 "End-to-end
//! scenarios").

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::broker::Broker;
use crate::error::AtResult;
use crate::pktio::{CommInterface, DataPrefixHook, EventGroup, Hooks, PktioWorker, SolicitedSink, UrcSink};
use crate::registration::{RegType, RegistrationTracker};
use crate::response::{AtRequest, CommandKind, ResponseLine, TokenTables};

struct ScriptedComm {
    chunks: Arc<Mutex<VecDeque<Vec<u8>>>>,
}

impl CommInterface for ScriptedComm {
    fn open(&mut self, _events: Arc<EventGroup>) -> AtResult<()> {
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8], _timeout: Duration) -> AtResult<usize> {
        match self.chunks.lock().unwrap().pop_front() {
            Some(chunk) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                Ok(n)
            }
            None => Ok(0),
        }
    }

    fn send(&mut self, buf: &[u8], _timeout: Duration) -> AtResult<usize> {
        Ok(buf.len())
    }

    fn close(&mut self) {}
}

struct RegistrationUrcSink {
    registration: Arc<RegistrationTracker>,
}

impl UrcSink for RegistrationUrcSink {
    fn dispatch(&self, line: &[u8]) {
        for (prefix, reg_type) in [(&b"+CREG"[..], RegType::Creg), (&b"+CGREG"[..], RegType::Cgreg), (&b"+CEREG"[..], RegType::Cereg)] {
            if let Ok(payload) = crate::query::payload(line, prefix) {
                let _ = self.registration.handle_line(reg_type, true, payload);
                return;
            }
        }
    }
}

struct NoUrc;
impl UrcSink for NoUrc {
    fn dispatch(&self, _line: &[u8]) {}
}

struct RcvLengthHook;
impl DataPrefixHook for RcvLengthHook {
    fn detect(&mut self, line: &[u8]) -> Option<usize> {
        let rest = line.strip_prefix(b"+RCV:")?;
        core::str::from_utf8(rest).ok()?.parse::<usize>().ok()
    }
}

fn push(queue: &Arc<Mutex<VecDeque<Vec<u8>>>>, worker: &PktioWorker, bytes: &[u8]) {
    queue.lock().unwrap().push_back(bytes.to_vec());
    worker.notify_rx_data();
}

fn wait_until<T>(timeout: Duration, mut f: impl FnMut() -> Option<T>) -> T {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(v) = f() {
            return v;
        }
        if Instant::now() >= deadline {
            panic!("condition did not become true within {timeout:?}");
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Scenario 1: basic solicited command with a single intermediate line.
#[test]
fn basic_solicited_response() {
    let queue = Arc::new(Mutex::new(VecDeque::new()));
    let comm: Arc<Mutex<Box<dyn CommInterface>>> = Arc::new(Mutex::new(Box::new(ScriptedComm { chunks: queue.clone() })));
    let broker = Broker::new(comm.clone(), TokenTables::default(), Duration::from_millis(200));
    let solicited: Arc<dyn SolicitedSink> = broker.clone();
    let worker = PktioWorker::init(comm, 256, Duration::from_millis(20), Duration::from_millis(20), solicited, Arc::new(NoUrc), Hooks::default()).unwrap();

    let req = AtRequest::new("AT+CGMR", CommandKind::WithoutPrefix, None, 64).unwrap();
    let resp = std::thread::scope(|s| {
        s.spawn(|| {
            std::thread::sleep(Duration::from_millis(20));
            push(&queue, &worker, b"\r\nLM0001\r\n\r\nOK\r\n");
        });
        broker.request_with_callback(req, Duration::from_millis(500)).unwrap()
    });

    assert!(resp.status);
    assert_eq!(resp.lines, vec![ResponseLine::Text(b"LM0001".to_vec())]);

    worker.shutdown();
}

/// Scenario 2: a `+CEREG` URC arrives while `AT+CPSMS?` is in flight. The
/// URC updates registration state even though it does not match the
/// expected prefix; the solicited `+CPSMS` line is still delivered in the
/// response.
#[test]
fn urc_arrives_mid_command() {
    let queue = Arc::new(Mutex::new(VecDeque::new()));
    let comm: Arc<Mutex<Box<dyn CommInterface>>> = Arc::new(Mutex::new(Box::new(ScriptedComm { chunks: queue.clone() })));
    let broker = Broker::new(comm.clone(), TokenTables::default(), Duration::from_millis(200));
    let registration = RegistrationTracker::new();
    let solicited: Arc<dyn SolicitedSink> = broker.clone();
    let urc: Arc<dyn UrcSink> = Arc::new(RegistrationUrcSink { registration: registration.clone() });
    let worker = PktioWorker::init(comm, 256, Duration::from_millis(20), Duration::from_millis(20), solicited, urc, Hooks::default()).unwrap();

    let req = AtRequest::new("AT+CPSMS?", CommandKind::WithPrefix, Some(b"+CPSMS".to_vec()), 64).unwrap();
    let resp = std::thread::scope(|s| {
        s.spawn(|| {
            std::thread::sleep(Duration::from_millis(20));
            push(
                &queue,
                &worker,
                b"\r\n+CEREG: 1,\"1A2B\",\"01AB0123\",7\r\n+CPSMS: 1,,,\"01000011\",\"00001111\"\r\n\r\nOK\r\n",
            );
        });
        broker.request_with_callback(req, Duration::from_millis(500)).unwrap()
    });

    assert!(resp.status);
    let snap = registration.snapshot();
    assert_eq!(snap.ps_reg_status, crate::registration::RegStatus::RegisteredHome);
    assert_eq!(snap.rat, crate::registration::Rat::Lte);
    assert_eq!(snap.tac, 0x1A2B);
    assert_eq!(snap.cell_id, 0x01AB0123);

    let cpsms_line = match &resp.lines[0] {
        ResponseLine::Text(t) => t.clone(),
        ResponseLine::Raw(_) => panic!("expected a text line"),
    };
    let payload = crate::query::payload(&cpsms_line, b"+CPSMS").unwrap();
    let cpsms = crate::query::psm::parse_cpsms(payload).unwrap();
    assert_eq!(cpsms.mode, 1);
    // Per the literal §4.7 unit table the TAU field's unit bits "010" select
    // the 10h-per-unit row, not the 2s row spec.md's own narrative for this
    // scenario states; see DESIGN.md's T3412 open question.
    assert_eq!(cpsms.tau_seconds, Some(36_000 * 3));
    assert_eq!(cpsms.active_time_seconds, Some(30));

    worker.shutdown();
}

/// Scenario 3: a denied `+CREG` URC with no in-flight command clears the
/// location sentinels but keeps the reject fields.
#[test]
fn denied_urc_with_no_in_flight_command() {
    let queue = Arc::new(Mutex::new(VecDeque::new()));
    let comm: Arc<Mutex<Box<dyn CommInterface>>> = Arc::new(Mutex::new(Box::new(ScriptedComm { chunks: queue.clone() })));
    let broker = Broker::new(comm.clone(), TokenTables::default(), Duration::from_millis(200));
    let registration = RegistrationTracker::new();
    let solicited: Arc<dyn SolicitedSink> = broker.clone();
    let urc: Arc<dyn UrcSink> = Arc::new(RegistrationUrcSink { registration: registration.clone() });
    let worker = PktioWorker::init(comm, 256, Duration::from_millis(20), Duration::from_millis(20), solicited, urc, Hooks::default()).unwrap();

    push(&queue, &worker, b"\r\n+CREG: 3,,,,,2,17\r\n");

    let snap = wait_until(Duration::from_secs(1), || {
        let snap = registration.snapshot();
        (snap.cs_reg_status == crate::registration::RegStatus::Denied).then_some(snap)
    });
    assert_eq!(snap.cs_reject_type, Some(2));
    assert_eq!(snap.cs_reject_cause, Some(17));
    assert_eq!(snap.lac, crate::registration::UNKNOWN_LAC);
    assert_eq!(snap.cell_id, crate::registration::UNKNOWN_CELL_ID);

    worker.shutdown();
}

/// Scenario 6: a binary payload arrives split across two reads.
#[test]
fn binary_payload_split_across_two_reads() {
    let queue = Arc::new(Mutex::new(VecDeque::new()));
    let comm: Arc<Mutex<Box<dyn CommInterface>>> = Arc::new(Mutex::new(Box::new(ScriptedComm { chunks: queue.clone() })));
    let broker = Broker::new(comm.clone(), TokenTables::default(), Duration::from_millis(200));
    let solicited: Arc<dyn SolicitedSink> = broker.clone();
    let hooks = Hooks { data_prefix_cb: Some(Box::new(RcvLengthHook)), ..Hooks::default() };
    let worker = PktioWorker::init(comm, 256, Duration::from_millis(20), Duration::from_millis(20), solicited, Arc::new(NoUrc), hooks).unwrap();

    let req =
        AtRequest::new("AT+URDFILE", CommandKind::MultiDataWithoutPrefix, Some(b"+RCV".to_vec()), 64).unwrap();
    let resp = std::thread::scope(|s| {
        s.spawn(|| {
            std::thread::sleep(Duration::from_millis(20));
            push(&queue, &worker, b"\r\n+RCV:10\r\nABCD");
            std::thread::sleep(Duration::from_millis(20));
            push(&queue, &worker, b"EFGHIJ\r\nOK\r\n");
        });
        broker.request_with_callback(req, Duration::from_millis(500)).unwrap()
    });

    assert!(resp.status);
    assert_eq!(resp.lines, vec![ResponseLine::Text(b"+RCV:10".to_vec()), ResponseLine::Raw(b"ABCDEFGHIJ".to_vec())]);

    worker.shutdown();
}
