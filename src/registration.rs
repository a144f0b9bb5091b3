//! 3GPP registration parser and state (spec.md §3 "Registration state",
//! §4.6). Replaces the teacher's `CellularRegistrationStatus<CLK>` with a
//! plain, clock-agnostic record behind one lock.

use std::sync::{Arc, Mutex};

use crate::at::lexer::{remove_all_quotes, remove_all_whitespace, split_all, strtoi};
use crate::error::{AtError, AtResult};

pub const UNKNOWN_LAC: u16 = 0xFFFF;
pub const UNKNOWN_TAC: u16 = 0xFFFF;
pub const UNKNOWN_RAC: u8 = 0xFF;
pub const UNKNOWN_CELL_ID: u32 = 0xFFFF_FFFF;

/// Radio access technology (spec.md §3 "rat"). `rat == 7` from the modem is
/// always remapped to `Lte`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rat {
    Invalid,
    Gsm,
    Edge,
    Lte,
    CatM1,
    NbIot,
}

/// CS or PS registration status (spec.md §3 "cs_reg_status, ps_reg_status").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegStatus {
    NotRegisteredSearching,
    RegisteredHome,
    Searching,
    Denied,
    Unknown,
    Roaming,
}

/// Which 3GPP registration command a line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegType {
    Creg,
    Cgreg,
    Cereg,
}

/// The protected registration record (spec.md §3 "Registration state").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtData {
    pub rat: Rat,
    pub cs_reg_status: RegStatus,
    pub ps_reg_status: RegStatus,
    pub cs_reject_type: Option<i64>,
    pub cs_reject_cause: Option<i64>,
    pub ps_reject_type: Option<i64>,
    pub ps_reject_cause: Option<i64>,
    pub cell_id: u32,
    pub lac: u16,
    pub tac: u16,
    pub rac: u8,
}

impl Default for AtData {
    fn default() -> Self {
        Self {
            rat: Rat::Invalid,
            cs_reg_status: RegStatus::NotRegisteredSearching,
            ps_reg_status: RegStatus::NotRegisteredSearching,
            cs_reject_type: None,
            cs_reject_cause: None,
            ps_reject_type: None,
            ps_reject_cause: None,
            cell_id: UNKNOWN_CELL_ID,
            lac: UNKNOWN_LAC,
            tac: UNKNOWN_TAC,
            rac: UNKNOWN_RAC,
        }
    }
}

/// Emitted when `cs_reg_status` or `ps_reg_status` changes (spec.md §4.6,
/// last bullet). PLMN is not carried on `+CxREG` lines, so MCC/MNC are the
/// documented placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationEvent {
    pub data: AtData,
    pub plmn_mcc: &'static str,
    pub plmn_mnc: &'static str,
}

struct ParsedReg {
    status: RegStatus,
    lac_or_tac: Option<i64>,
    cell_id: Option<i64>,
    rat: Option<Rat>,
    reject_type: Option<i64>,
    reject_cause: Option<i64>,
}

fn decode_status(v: i64) -> AtResult<RegStatus> {
    Ok(match v {
        0 => RegStatus::NotRegisteredSearching,
        1 => RegStatus::RegisteredHome,
        2 => RegStatus::Searching,
        3 => RegStatus::Denied,
        4 => RegStatus::Unknown,
        5 => RegStatus::Roaming,
        _ => return Err(AtError::InvalidData),
    })
}

const RAT_MAX: i64 = 10;

pub(crate) fn decode_rat(v: i64) -> AtResult<Rat> {
    if !(0..RAT_MAX).contains(&v) {
        return Err(AtError::InvalidData);
    }
    Ok(match v {
        7 => Rat::Lte,
        0 => Rat::Gsm,
        3 => Rat::Edge,
        8 => Rat::CatM1,
        9 => Rat::NbIot,
        _ => Rat::Invalid,
    })
}

fn token_value(tok: &[u8], radix: u32) -> AtResult<Option<i64>> {
    if tok.is_empty() {
        Ok(None)
    } else {
        strtoi(tok, radix).map(Some)
    }
}

/// Parses one `+CREG`/`+CGREG`/`+CEREG` payload (the argument list after the
/// prefix, with the prefix itself already stripped) per spec.md §4.6's
/// pipeline. `is_urc` selects the 1-based field offset: `<stat>` is field 1
/// for a URC, field 2 for a query response (field 1 there is the echoed
/// `<n>`).
///
/// Reject type/cause are read from the *last two* tokens whenever the
/// status is `Denied` and at least six tokens are present. The worked
/// example in spec.md §8 scenario 3 (`3,,,,,2,17`, seven tokens for a
/// nominally six-field URC) only parses correctly this way: fixing
/// `reject_type`/`reject_cause` at absolute offsets 4/5 would read them as
/// empty. Real 3GPP grammars place these two fields last regardless of how
/// many optional fields precede them, so this is also the more robust
/// reading.
fn parse_reg_payload(payload: &[u8], is_urc: bool) -> AtResult<ParsedReg> {
    let unquoted = remove_all_quotes(payload);
    let cleaned = remove_all_whitespace(&unquoted);
    let tokens = split_all(&cleaned, b',');

    let stat_idx = if is_urc { 0 } else { 1 };
    let stat_tok = tokens.get(stat_idx).ok_or(AtError::InvalidData)?;
    let status = decode_status(strtoi(stat_tok, 10)?)?;

    let lac_or_tac = tokens.get(stat_idx + 1).and_then(|t| token_value(t, 16).ok().flatten());
    let cell_id = tokens.get(stat_idx + 2).and_then(|t| token_value(t, 16).ok().flatten());
    let rat = tokens
        .get(stat_idx + 3)
        .and_then(|t| token_value(t, 10).ok().flatten())
        .and_then(|v| decode_rat(v).ok());

    let (reject_type, reject_cause) = if status == RegStatus::Denied && tokens.len() >= stat_idx + 1 + 4 {
        let n = tokens.len();
        (token_value(&tokens[n - 2], 10)?, token_value(&tokens[n - 1], 10)?)
    } else {
        (None, None)
    };

    Ok(ParsedReg { status, lac_or_tac, cell_id, rat, reject_type, reject_cause })
}

impl AtData {
    /// Applies one parsed registration line, returning whether the relevant
    /// (CS or PS) status changed (spec.md §4.6).
    fn apply(&mut self, reg_type: RegType, parsed: ParsedReg) -> bool {
        let changed = match reg_type {
            RegType::Creg => {
                let changed = self.cs_reg_status != parsed.status;
                self.cs_reg_status = parsed.status;
                if parsed.status == RegStatus::Denied {
                    self.cs_reject_type = parsed.reject_type;
                    self.cs_reject_cause = parsed.reject_cause;
                } else {
                    self.cs_reject_type = None;
                    self.cs_reject_cause = None;
                }
                changed
            }
            RegType::Cgreg | RegType::Cereg => {
                let changed = self.ps_reg_status != parsed.status;
                self.ps_reg_status = parsed.status;
                if parsed.status == RegStatus::Denied {
                    self.ps_reject_type = parsed.reject_type;
                    self.ps_reject_cause = parsed.reject_cause;
                } else {
                    self.ps_reject_type = None;
                    self.ps_reject_cause = None;
                }
                changed
            }
        };

        if !matches!(parsed.status, RegStatus::RegisteredHome | RegStatus::Roaming) {
            self.lac = UNKNOWN_LAC;
            self.tac = UNKNOWN_TAC;
            self.cell_id = UNKNOWN_CELL_ID;
            self.rat = Rat::Invalid;
            self.rac = UNKNOWN_RAC;
        } else {
            if let Some(v) = parsed.lac_or_tac {
                match reg_type {
                    RegType::Cereg => self.tac = v as u16,
                    RegType::Creg | RegType::Cgreg => self.lac = v as u16,
                }
            }
            if let Some(v) = parsed.cell_id {
                self.cell_id = v as u32;
            }
            if let Some(rat) = parsed.rat {
                self.rat = rat;
            }
        }

        changed
    }
}

/// Owns the at-data lock and the registration-event callback (spec.md §4.6,
/// §4.8 "AT-data mutex wrapper"). The worker (via [`crate::pktio::UrcSink`]
/// dispatch) and any query path (§4.7) both call [`Self::handle_line`] /
/// [`Self::snapshot`] through this single collaborator.
pub struct RegistrationTracker {
    data: Mutex<AtData>,
    callback: Mutex<Option<Box<dyn Fn(RegistrationEvent) + Send + Sync>>>,
}

impl RegistrationTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { data: Mutex::new(AtData::default()), callback: Mutex::new(None) })
    }

    /// Registers the URC callback (spec.md §6 "Public API", URC hooks).
    /// Replaces any previously registered callback.
    pub fn set_callback(&self, cb: impl Fn(RegistrationEvent) + Send + Sync + 'static) {
        *self.callback.lock().unwrap() = Some(Box::new(cb));
    }

    /// A snapshot of the current record, taken under the at-data lock
    /// (spec.md §4.8 "Returns a snapshot taken under the AT-data lock").
    pub fn snapshot(&self) -> AtData {
        self.data.lock().unwrap().clone()
    }

    /// Parses and applies one `+CREG`/`+CGREG`/`+CEREG` payload, firing the
    /// registration callback if the relevant status changed.
    pub fn handle_line(&self, reg_type: RegType, is_urc: bool, payload: &[u8]) -> AtResult<()> {
        let parsed = parse_reg_payload(payload, is_urc)?;
        let (changed, snapshot) = {
            let mut guard = self.data.lock().unwrap();
            let changed = guard.apply(reg_type, parsed);
            (changed, guard.clone())
        };
        if changed {
            if let Some(cb) = self.callback.lock().unwrap().as_ref() {
                cb(RegistrationEvent { data: snapshot, plmn_mcc: "FFF", plmn_mnc: "FFF" });
            }
        }
        Ok(())
    }

    pub fn is_ps_registered(&self) -> bool {
        matches!(
            self.data.lock().unwrap().ps_reg_status,
            RegStatus::RegisteredHome | RegStatus::Roaming
        )
    }
}
