//! AT command request/response types and the terminator-driven response
//! accumulator (spec.md §3 "AT command request/response", §4.3).

use crate::at::lexer::starts_with;
use crate::error::{AtError, AtResult};

/// How a command's response is shaped; drives both prefix validation and
/// the accumulator's intermediate-line policy (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    NoResult,
    WithoutPrefix,
    WithPrefix,
    MultiWithPrefix,
    MultiWithoutPrefix,
    MultiDataWithoutPrefix,
    WithoutPrefixNoResultCode,
    WithPrefixNoResultCode,
}

impl CommandKind {
    fn requires_prefix(self) -> bool {
        matches!(
            self,
            CommandKind::WithPrefix | CommandKind::WithPrefixNoResultCode | CommandKind::MultiWithPrefix
        )
    }
}

/// A request queued with the broker (spec.md §3 "AT command request").
pub struct AtRequest {
    pub command_text: Vec<u8>,
    pub kind: CommandKind,
    pub expected_prefix: Option<Vec<u8>>,
}

impl AtRequest {
    pub fn new(
        command_text: impl Into<Vec<u8>>,
        kind: CommandKind,
        expected_prefix: Option<Vec<u8>>,
        max_cmd_len: usize,
    ) -> AtResult<Self> {
        let command_text = command_text.into();
        if command_text.len() > max_cmd_len {
            return Err(AtError::BadParameter);
        }
        if kind.requires_prefix() && expected_prefix.is_none() {
            return Err(AtError::BadParameter);
        }
        Ok(Self { command_text, kind, expected_prefix })
    }
}

/// One line of an accumulated response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseLine {
    /// Already trimmed, NUL-terminated-in-spirit text line.
    Text(Vec<u8>),
    /// Raw binary slice of exactly the negotiated length (no terminator).
    Raw(Vec<u8>),
}

/// The assembled result of a solicited command (spec.md §3 "AT response").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtResponse {
    pub status: bool,
    pub lines: Vec<ResponseLine>,
}

/// The three terminator token tables, consulted in order (spec.md §4.3,
/// "Design notes" open question: a token only in "error" but also in
/// "extra" is reported as success — the ordering below is load-bearing and
/// intentional, not an oversight).
#[derive(Debug, Clone)]
pub struct TokenTables {
    /// Module-specific extra success terminators, consulted first.
    pub extra_success: Vec<Vec<u8>>,
    pub success: Vec<Vec<u8>>,
    pub error: Vec<Vec<u8>>,
}

impl Default for TokenTables {
    fn default() -> Self {
        Self {
            extra_success: Vec::new(),
            success: vec![b"OK".to_vec(), b"CONNECT".to_vec(), b"SEND OK".to_vec(), b">".to_vec()],
            error: vec![
                b"ERROR".to_vec(),
                b"BUSY".to_vec(),
                b"NO CARRIER".to_vec(),
                b"+CMS ERROR".to_vec(),
                b"+CME ERROR".to_vec(),
                b"SEND FAIL".to_vec(),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    Success,
    Error,
    None,
}

fn matches_any(line: &[u8], table: &[Vec<u8>]) -> bool {
    table.iter().any(|tok| line == tok.as_slice() || starts_with(line, tok))
}

fn consult_tables(line: &[u8], tables: &TokenTables) -> Terminator {
    if matches_any(line, &tables.extra_success) {
        return Terminator::Success;
    }
    if matches_any(line, &tables.success) {
        return Terminator::Success;
    }
    if matches_any(line, &tables.error) {
        return Terminator::Error;
    }
    Terminator::None
}

/// What the worker should do after handing one solicited line to the
/// accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Keep collecting; nothing to deliver yet.
    Continue,
    /// A terminator fired; the response is complete with this status.
    Terminated(bool),
    /// The accumulator wants the worker to switch to the binary data path
    /// before resuming the line loop.
    PendingBuffer,
}

/// Per-command accumulator (spec.md §3 "Response accumulator", §4.3).
/// Freed by the worker immediately after delivery.
pub struct Accumulator {
    kind: CommandKind,
    response: AtResponse,
    has_intermediate: bool,
}

impl Accumulator {
    pub fn new(kind: CommandKind) -> Self {
        Self { kind, response: AtResponse::default(), has_intermediate: false }
    }

    /// Feeds one already-classified `SOLICITED` line into the accumulator.
    pub fn push_line(&mut self, line: &[u8], tables: &TokenTables) -> AtResult<LineOutcome> {
        match consult_tables(line, tables) {
            Terminator::Success => {
                self.response.status = true;
                Ok(LineOutcome::Terminated(true))
            }
            Terminator::Error => {
                self.response.status = false;
                Ok(LineOutcome::Terminated(false))
            }
            Terminator::None => self.push_intermediate(line),
        }
    }

    fn push_intermediate(&mut self, line: &[u8]) -> AtResult<LineOutcome> {
        match self.kind {
            CommandKind::NoResult => Err(AtError::InvalidData),
            CommandKind::WithoutPrefix | CommandKind::WithPrefix => {
                if self.has_intermediate {
                    return Err(AtError::InvalidData);
                }
                self.has_intermediate = true;
                self.response.lines.push(ResponseLine::Text(line.to_vec()));
                Ok(LineOutcome::Continue)
            }
            CommandKind::MultiWithPrefix | CommandKind::MultiWithoutPrefix => {
                self.response.lines.push(ResponseLine::Text(line.to_vec()));
                Ok(LineOutcome::Continue)
            }
            CommandKind::MultiDataWithoutPrefix => {
                self.response.lines.push(ResponseLine::Text(line.to_vec()));
                Ok(LineOutcome::PendingBuffer)
            }
            CommandKind::WithoutPrefixNoResultCode | CommandKind::WithPrefixNoResultCode => {
                self.response.lines.push(ResponseLine::Text(line.to_vec()));
                self.response.status = true;
                Ok(LineOutcome::Terminated(true))
            }
        }
    }

    /// Appends a raw binary payload line, as produced by the pktio data
    /// path (spec.md §4.4.1).
    pub fn push_raw(&mut self, bytes: Vec<u8>) {
        self.response.lines.push(ResponseLine::Raw(bytes));
    }

    pub fn into_response(self) -> AtResponse {
        self.response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_prefix_required_for_with_prefix_kinds() {
        assert!(AtRequest::new("AT+CGMR", CommandKind::WithPrefix, None, 64).is_err());
        assert!(AtRequest::new("AT+CGMR", CommandKind::WithPrefix, Some(b"+CGMR".to_vec()), 64).is_ok());
    }

    #[test]
    fn expected_prefix_optional_for_multi_without_prefix() {
        assert!(AtRequest::new("AT+X", CommandKind::MultiWithoutPrefix, None, 64).is_ok());
    }

    #[test]
    fn command_too_long_is_rejected() {
        assert_eq!(
            AtRequest::new("AT+X", CommandKind::NoResult, None, 2).unwrap_err(),
            AtError::BadParameter
        );
    }

    #[test]
    fn without_prefix_accepts_one_intermediate_line() {
        let mut acc = Accumulator::new(CommandKind::WithoutPrefix);
        let tables = TokenTables::default();
        assert_eq!(acc.push_line(b"LM0001", &tables).unwrap(), LineOutcome::Continue);
        assert_eq!(acc.push_line(b"LM0002", &tables).unwrap_err(), AtError::InvalidData);
    }

    #[test]
    fn without_prefix_terminates_on_ok() {
        let mut acc = Accumulator::new(CommandKind::WithoutPrefix);
        let tables = TokenTables::default();
        acc.push_line(b"LM0001", &tables).unwrap();
        assert_eq!(acc.push_line(b"OK", &tables).unwrap(), LineOutcome::Terminated(true));
        let resp = acc.into_response();
        assert!(resp.status);
        assert_eq!(resp.lines, vec![ResponseLine::Text(b"LM0001".to_vec())]);
    }

    #[test]
    fn multi_with_prefix_appends_indefinitely() {
        let mut acc = Accumulator::new(CommandKind::MultiWithPrefix);
        let tables = TokenTables::default();
        for line in [&b"+CEREG: 1"[..], b"+CPSMS: 1"] {
            assert_eq!(acc.push_line(line, &tables).unwrap(), LineOutcome::Continue);
        }
        assert_eq!(acc.push_line(b"OK", &tables).unwrap(), LineOutcome::Terminated(true));
    }

    #[test]
    fn multi_data_without_prefix_forces_the_data_path() {
        let mut acc = Accumulator::new(CommandKind::MultiDataWithoutPrefix);
        let tables = TokenTables::default();
        assert_eq!(acc.push_line(b"+RCV:10", &tables).unwrap(), LineOutcome::PendingBuffer);
    }

    #[test]
    fn no_result_code_kind_synthesizes_success() {
        let mut acc = Accumulator::new(CommandKind::WithPrefixNoResultCode);
        let tables = TokenTables::default();
        assert_eq!(acc.push_line(b"+USORD: 0,10", &tables).unwrap(), LineOutcome::Terminated(true));
        assert!(acc.into_response().status);
    }

    #[test]
    fn error_table_prefix_match_handles_parameterized_errors() {
        let mut acc = Accumulator::new(CommandKind::NoResult);
        let tables = TokenTables::default();
        assert_eq!(acc.push_line(b"+CME ERROR: 10", &tables).unwrap(), LineOutcome::Terminated(false));
    }

    #[test]
    fn extra_success_table_is_consulted_first() {
        let mut tables = TokenTables::default();
        tables.extra_success.push(b"ERROR".to_vec());
        let mut acc = Accumulator::new(CommandKind::NoResult);
        // "ERROR" is in both tables; extra_success wins per documented order.
        assert_eq!(acc.push_line(b"ERROR", &tables).unwrap(), LineOutcome::Terminated(true));
    }
}
