//! SP protocol-id constants.
//!
//! StreamHdr (component G) and the WS opening handshake both negotiate a
//! 16-bit protocol id during the handshake; these are the values nanomsg
//! assigns each message pattern (`protocol_family * 16 + ordinal`), carried
//! here so the handshake and overlay layers agree on the same numbers
//! without hand-rolling them at each call site.

/// PAIR: one-to-one.
pub const PAIR: u16 = 1 * 16;
/// PUB: one-to-many broadcast, publisher side.
pub const PUB: u16 = 2 * 16;
/// SUB: one-to-many broadcast, subscriber side.
pub const SUB: u16 = 2 * 16 + 1;
/// REQ: request-reply, client side (component H).
pub const REQ: u16 = 3 * 16;
/// REP: request-reply, server side.
pub const REP: u16 = 3 * 16 + 1;
/// PUSH: pipeline, sending side.
pub const PUSH: u16 = 5 * 16;
/// PULL: pipeline, receiving side.
pub const PULL: u16 = 5 * 16 + 1;
/// SURVEYOR: survey, asking side (component I).
pub const SURVEYOR: u16 = 6 * 16 + 2;
/// RESPONDENT: survey, answering side.
pub const RESPONDENT: u16 = 6 * 16 + 3;
/// BUS: many-to-many broadcast.
pub const BUS: u16 = 7 * 16;

/// The name token the WS opening handshake's `Sec-WebSocket-Protocol` header
/// uses for a given protocol id, per the `<token>.sp.nanomsg.org` mapping.
#[must_use]
pub fn name(protocol: u16) -> Option<&'static str> {
    Some(match protocol {
        PAIR => "pair",
        PUB => "pub",
        SUB => "sub",
        REQ => "req",
        REP => "rep",
        PUSH => "push",
        PULL => "pull",
        SURVEYOR => "surveyor",
        RESPONDENT => "respondent",
        BUS => "bus",
        _ => return None,
    })
}

/// Whether two protocol ids are allowed to pair over a connection — REQ only
/// ever talks to REP, SURVEYOR only to RESPONDENT, and so on. Mirrors
/// upstream `xreq_ispeer`/`xsurveyor_ispeer` et al.
#[must_use]
pub fn are_peers(a: u16, b: u16) -> bool {
    matches!(
        (a, b),
        (REQ, REP)
            | (REP, REQ)
            | (SURVEYOR, RESPONDENT)
            | (RESPONDENT, SURVEYOR)
            | (PUB, SUB)
            | (SUB, PUB)
            | (PUSH, PULL)
            | (PULL, PUSH)
            | (PAIR, PAIR)
            | (BUS, BUS)
    )
}

/// Suffix appended to a protocol token in the WS `Sec-WebSocket-Protocol`
/// subprotocol negotiation, per the `<token>.sp.nanomsg.org` convention.
pub const WS_SUBPROTOCOL_SUFFIX: &str = ".sp.nanomsg.org";

/// Format `protocol`'s `Sec-WebSocket-Protocol` subprotocol token
/// (`<name>.sp.nanomsg.org`), or `None` if `protocol` has no known name.
#[must_use]
pub fn ws_subprotocol(protocol: u16) -> Option<String> {
    name(protocol).map(|n| format!("{n}{WS_SUBPROTOCOL_SUFFIX}"))
}

/// Parse a `Sec-WebSocket-Protocol` token (`<name>.sp.nanomsg.org`) back into
/// its protocol id.
#[must_use]
pub fn from_ws_subprotocol(token: &str) -> Option<u16> {
    match token.strip_suffix(WS_SUBPROTOCOL_SUFFIX)? {
        "pair" => Some(PAIR),
        "pub" => Some(PUB),
        "sub" => Some(SUB),
        "req" => Some(REQ),
        "rep" => Some(REP),
        "push" => Some(PUSH),
        "pull" => Some(PULL),
        "surveyor" => Some(SURVEYOR),
        "respondent" => Some(RESPONDENT),
        "bus" => Some(BUS),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn req_rep_are_peers() {
        assert!(are_peers(REQ, REP));
        assert!(are_peers(REP, REQ));
        assert!(!are_peers(REQ, SURVEYOR));
    }

    #[test]
    fn surveyor_respondent_are_peers() {
        assert!(are_peers(SURVEYOR, RESPONDENT));
        assert!(are_peers(RESPONDENT, SURVEYOR));
    }

    #[test]
    fn name_round_trips_known_protocols() {
        assert_eq!(name(REQ), Some("req"));
        assert_eq!(name(RESPONDENT), Some("respondent"));
        assert_eq!(name(9999), None);
    }

    #[test]
    fn ws_subprotocol_round_trips() {
        assert_eq!(ws_subprotocol(REQ).as_deref(), Some("req.sp.nanomsg.org"));
        assert_eq!(from_ws_subprotocol("req.sp.nanomsg.org"), Some(REQ));
        assert_eq!(
            from_ws_subprotocol("surveyor.sp.nanomsg.org"),
            Some(SURVEYOR)
        );
    }

    #[test]
    fn from_ws_subprotocol_rejects_unknown_token_or_suffix() {
        assert_eq!(from_ws_subprotocol("req.wrong.suffix"), None);
        assert_eq!(from_ws_subprotocol("bogus.sp.nanomsg.org"), None);
    }
}
