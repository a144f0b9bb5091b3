//! `AT+COPS?` response parsing (spec.md §4.7 "COPS").

use crate::at::lexer::{remove_outermost_quotes, split_all, strtoi};
use crate::error::{AtError, AtResult};
use crate::registration::Rat;

/// Upper bound (exclusive) on the `<mode>` field.
const REG_MODE_MAX: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorFormat {
    Long,
    Short,
    Numeric,
}

impl OperatorFormat {
    fn decode(v: i64) -> AtResult<Self> {
        Ok(match v {
            0 => OperatorFormat::Long,
            1 => OperatorFormat::Short,
            2 => OperatorFormat::Numeric,
            _ => return Err(AtError::InvalidData),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopsResult {
    pub mode: i64,
    pub format: Option<OperatorFormat>,
    pub name: Option<String>,
    pub mcc: Option<String>,
    pub mnc: Option<String>,
    pub rat: Option<Rat>,
}

/// Parses an `+COPS: <mode>[,<format>,<oper>[,<AcT>]]` payload.
pub fn parse_cops(payload: &[u8]) -> AtResult<CopsResult> {
    let tokens = split_all(payload, b',');

    let mode = strtoi(tokens.first().ok_or(AtError::InvalidData)?, 10)?;
    if !(0..REG_MODE_MAX).contains(&mode) {
        return Err(AtError::BadParameter);
    }

    let format = match tokens.get(1) {
        Some(t) if !t.is_empty() => Some(OperatorFormat::decode(strtoi(t, 10)?)?),
        _ => None,
    };

    let name = match tokens.get(2) {
        Some(t) if !t.is_empty() => Some(remove_outermost_quotes(t)?.to_vec()),
        _ => None,
    };

    let (mcc, mnc) = match (format, &name) {
        (Some(OperatorFormat::Numeric), Some(digits)) if digits.len() == 5 || digits.len() == 6 => {
            let text = core::str::from_utf8(digits).map_err(|_| AtError::InvalidData)?;
            (Some(text[..3].to_string()), Some(text[3..].to_string()))
        }
        _ => (None, None),
    };

    let rat = match tokens.get(3) {
        Some(t) if !t.is_empty() => Some(crate::registration::decode_rat(strtoi(t, 10)?)?),
        _ => None,
    };

    let name = name.map(|b| String::from_utf8_lossy(&b).into_owned());

    Ok(CopsResult { mode, format, name, mcc, mnc, rat })
}
