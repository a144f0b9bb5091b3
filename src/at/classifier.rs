//! Line classifier (spec.md §4.2).
//!
//! Labels a received line as the expected solicited response, an
//! unsolicited report, or undefined noise. Always run under the response
//! lock (`broker::ResponseLock`) so the "in flight" view is stable for the
//! duration of one classification.

use crate::at::lexer::{is_prefix_present, starts_with};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Solicited,
    Unsolicited,
    Undefined,
}

/// The subset of in-flight command state the classifier needs to see.
pub struct InFlightView<'a> {
    pub expected_prefix: Option<&'a [u8]>,
}

/// Classifies `line` per the table in spec.md §4.2.
///
/// `urc_without_prefix` is the table of exact-match URC tokens that are
/// always unsolicited regardless of prefix or in-flight state (e.g.
/// `"RING"`).
pub fn classify(
    line: &[u8],
    in_flight: Option<&InFlightView<'_>>,
    urc_without_prefix: &[&[u8]],
) -> Classification {
    if urc_without_prefix.iter().any(|tok| *tok == line) {
        return Classification::Unsolicited;
    }

    let prefixed = is_prefix_present(line);

    if prefixed {
        if let Some(flight) = in_flight {
            if let Some(expected) = flight.expected_prefix {
                if starts_with(line, expected) {
                    return Classification::Solicited;
                }
            }
        }
        return Classification::Unsolicited;
    }

    match in_flight {
        Some(_) => Classification::Solicited,
        None => Classification::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urc_table_wins_unconditionally() {
        let flight = InFlightView { expected_prefix: Some(b"+CGMR") };
        let got = classify(b"RING", Some(&flight), &[b"RING"]);
        assert_eq!(got, Classification::Unsolicited);
    }

    #[test]
    fn prefixed_line_matching_in_flight_is_solicited() {
        let flight = InFlightView { expected_prefix: Some(b"+CGMR") };
        let got = classify(b"+CGMR: LM0001", Some(&flight), &[]);
        assert_eq!(got, Classification::Solicited);
    }

    #[test]
    fn prefixed_line_not_matching_in_flight_is_unsolicited() {
        let flight = InFlightView { expected_prefix: Some(b"+CPSMS") };
        let got = classify(b"+CEREG: 1,\"1A2B\"", Some(&flight), &[]);
        assert_eq!(got, Classification::Unsolicited);
    }

    #[test]
    fn prefixed_line_no_flight_is_unsolicited() {
        let got = classify(b"+CEREG: 1", None, &[]);
        assert_eq!(got, Classification::Unsolicited);
    }

    #[test]
    fn unprefixed_line_in_flight_is_solicited() {
        let flight = InFlightView { expected_prefix: None };
        let got = classify(b"OK", Some(&flight), &[]);
        assert_eq!(got, Classification::Solicited);
    }

    #[test]
    fn unprefixed_line_no_flight_is_undefined() {
        let got = classify(b"garbage", None, &[]);
        assert_eq!(got, Classification::Undefined);
    }
}
