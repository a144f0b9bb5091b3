//! Service-status aggregation (spec.md §4.8): `CREG?`, then (unless
//! `no_gsm_network`) `CGREG?`, then `CEREG?` only if PS is not already
//! registered, then `COPS?`.

use std::time::Duration;

use crate::broker::Broker;
use crate::error::{AtError, AtResult};
use crate::query::{self, cops};
use crate::registration::{AtData, RegType, RegistrationTracker};
use crate::response::{AtRequest, AtResponse, CommandKind, ResponseLine};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    pub at_data: AtData,
    pub operator: cops::CopsResult,
}

fn first_text_line(resp: &AtResponse) -> AtResult<&[u8]> {
    resp.lines
        .iter()
        .find_map(|l| match l {
            ResponseLine::Text(t) => Some(t.as_slice()),
            ResponseLine::Raw(_) => None,
        })
        .ok_or(AtError::InvalidData)
}

fn query_prefixed(
    broker: &Broker,
    text: &str,
    prefix: &'static [u8],
    deadline: Duration,
    max_cmd_len: usize,
) -> AtResult<Vec<u8>> {
    let req = AtRequest::new(text, CommandKind::WithPrefix, Some(prefix.to_vec()), max_cmd_len)?;
    let resp = broker.request_with_callback(req, deadline)?;
    Ok(query::payload(first_text_line(&resp)?, prefix)?.to_vec())
}

/// Runs the aggregation and returns a snapshot taken under the at-data lock
/// (spec.md §4.8).
pub fn get_service_status(
    broker: &Broker,
    registration: &RegistrationTracker,
    no_gsm_network: bool,
    deadline: Duration,
    max_cmd_len: usize,
) -> AtResult<ServiceStatus> {
    let creg = query_prefixed(broker, "AT+CREG?", b"+CREG", deadline, max_cmd_len)?;
    registration.handle_line(RegType::Creg, false, &creg)?;

    if !no_gsm_network {
        let cgreg = query_prefixed(broker, "AT+CGREG?", b"+CGREG", deadline, max_cmd_len)?;
        registration.handle_line(RegType::Cgreg, false, &cgreg)?;
    }

    if !registration.is_ps_registered() {
        let cereg = query_prefixed(broker, "AT+CEREG?", b"+CEREG", deadline, max_cmd_len)?;
        registration.handle_line(RegType::Cereg, false, &cereg)?;
    }

    let cops_payload = query_prefixed(broker, "AT+COPS?", b"+COPS", deadline, max_cmd_len)?;
    let operator = cops::parse_cops(&cops_payload)?;

    Ok(ServiceStatus { at_data: registration.snapshot(), operator })
}
