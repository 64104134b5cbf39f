use tracing::debug;

use crate::protocol::checksum::Checksum;
use crate::protocol::grammar::{
    element_text, parse_int, split_after_last, strip_whitespace, Scanner, ID_CLOSE, ID_OPEN,
    MEASUREMENT_CLOSE, MEASUREMENT_OPEN, REQUEST_CLOSE, REQUEST_OPEN,
};
use crate::util::random::{Random, RngRandom};

/// Result of the two-phase server-side check on a received request.
///
/// `request_id` is what the server addresses its response to. When the id element of the
///  request is unparseable, a fresh random id is synthesized instead - a corrupted request
///  must still get an error response routed somewhere, so the fallback is explicit rather
///  than an error path.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Verdict {
    pub integrity_passed: bool,
    pub syntax_passed: bool,
    pub request_id: u16,
    pub measurement_id: u32,
}

pub fn validate_request(raw: &[u8]) -> Verdict {
    validate_request_with_random::<RngRandom>(raw)
}

/// The integrity phase extracts the fields leniently and compares the trailing checksum
///  against one recomputed over the body. A request without any parseable trailing checksum
///  passes the integrity check and fails the element check instead - legacy behavior that
///  routes such requests to the malformed-request answer, not the integrity-failure one.
///
/// The syntax phase runs only when the elements came out intact and re-validates the exact
///  tag sequence: nothing before `<request>`, every tag in grammar order, integer fields,
///  and nothing but the checksum digits after `</request>`.
pub fn validate_request_with_random<R: Random>(raw: &[u8]) -> Verdict {
    let stripped = strip_whitespace(raw);

    let mut elements_ok = true;

    let request_id = match element_text(&stripped, ID_OPEN, ID_CLOSE)
        .and_then(|text| parse_int::<u16>(text).ok())
    {
        Some(id) => id,
        None => {
            elements_ok = false;
            let synthesized = R::next_request_id();
            debug!("request id is unparseable, synthesizing {} for the error response", synthesized);
            synthesized
        }
    };

    let measurement_id = match element_text(&stripped, MEASUREMENT_OPEN, MEASUREMENT_CLOSE)
        .and_then(|text| parse_int::<u32>(text).ok())
    {
        Some(id) => id,
        None => {
            elements_ok = false;
            0
        }
    };

    let checksum_fields = split_after_last(&stripped, REQUEST_CLOSE)
        .and_then(|(body, trailer)| parse_int::<u16>(trailer).ok().map(|c| (body, Checksum(c))));

    let integrity_passed = match checksum_fields {
        None => {
            // no parseable trailing checksum: integrity is assumed intact and the strict
            // syntax check takes over
            elements_ok = false;
            true
        }
        Some((body, received)) => {
            let computed = Checksum::of_message(body);
            if computed == received {
                // a matching checksum re-marks the elements as usable; residual damage is
                // caught by the strict syntax phase
                elements_ok = true;
                true
            } else {
                debug!("request checksum mismatch: received {:?}, computed {:?}", received, computed);
                false
            }
        }
    };

    let syntax_passed = integrity_passed && elements_ok && check_syntax(&stripped);

    Verdict {
        integrity_passed,
        syntax_passed,
        request_id,
        measurement_id,
    }
}

fn check_syntax(stripped: &[u8]) -> bool {
    fn scan(stripped: &[u8]) -> anyhow::Result<()> {
        let mut scanner = Scanner::new(stripped);
        scanner.expect(REQUEST_OPEN)?;
        scanner.expect(ID_OPEN)?;
        parse_int::<u16>(scanner.scan_until(ID_CLOSE)?)?;
        scanner.expect(MEASUREMENT_OPEN)?;
        parse_int::<u32>(scanner.scan_until(MEASUREMENT_CLOSE)?)?;
        scanner.expect(REQUEST_CLOSE)?;
        parse_int::<u16>(scanner.remainder())?;
        Ok(())
    }

    scan(stripped).is_ok()
}

#[cfg(test)]
mod test {
    use bytes::BytesMut;
    use rstest::rstest;

    use crate::protocol::request::Request;
    use crate::util::random::{MockRandom, MOCK_RANDOM_MUTEX};

    use super::*;

    fn encoded(request: &Request) -> Vec<u8> {
        let mut buf = BytesMut::new();
        request.ser(&mut buf);
        buf.to_vec()
    }

    fn with_checksum(body: &[u8]) -> Vec<u8> {
        let mut raw = body.to_vec();
        raw.extend_from_slice(Checksum::of_message(body).to_string().as_bytes());
        raw
    }

    #[rstest]
    #[case::small_ids(Request::new(42, 7))]
    #[case::zero_ids(Request::new(0, 0))]
    #[case::max_ids(Request::new(65535, u32::MAX))]
    fn test_canonical_request_roundtrip(#[case] request: Request) {
        let verdict = validate_request(&encoded(&request));
        assert_eq!(verdict, Verdict {
            integrity_passed: true,
            syntax_passed: true,
            request_id: request.request_id,
            measurement_id: request.measurement_id,
        });
    }

    #[rstest]
    fn test_whitespace_does_not_affect_validation() {
        let raw = encoded(&Request::new(42, 7));
        let mut perturbed = Vec::new();
        for (i, b) in raw.iter().enumerate() {
            perturbed.push(*b);
            if i % 4 == 0 {
                perturbed.push(b'\t');
            }
        }
        let verdict = validate_request(&perturbed);
        assert!(verdict.integrity_passed);
        assert!(verdict.syntax_passed);
        assert_eq!(verdict.request_id, 42);
    }

    #[rstest]
    fn test_corrupted_body_fails_integrity() {
        let mut raw = encoded(&Request::new(42, 7));
        raw[1] ^= 0x01;

        let verdict = validate_request(&raw);
        assert!(!verdict.integrity_passed);
        assert_eq!(verdict.request_id, 42);
    }

    #[rstest]
    fn test_missing_close_tag_with_valid_checksum_fails_syntax_only() {
        // structurally damaged, but the checksum covers the damaged bytes and matches
        let raw = with_checksum(b"<request><id>9</id><measurement>7</request>");

        let verdict = validate_request(&raw);
        assert!(verdict.integrity_passed);
        assert!(!verdict.syntax_passed);
        assert_eq!(verdict.request_id, 9);
    }

    #[rstest]
    #[case::missing_checksum(b"<request><id>1</id><measurement>2</measurement></request>".as_slice())]
    #[case::nonnumeric_checksum(b"<request><id>1</id><measurement>2</measurement></request>abc".as_slice())]
    fn test_unparseable_checksum_passes_integrity_fails_syntax(#[case] raw: &[u8]) {
        let verdict = validate_request(raw);
        assert!(verdict.integrity_passed);
        assert!(!verdict.syntax_passed);
        assert_eq!(verdict.request_id, 1);
    }

    #[rstest]
    #[case::leading_junk(b"x<request><id>1</id><measurement>2</measurement></request>".as_slice())]
    #[case::text_between_tags(b"<request>z<id>1</id><measurement>2</measurement></request>".as_slice())]
    #[case::nonnumeric_id(b"<request><id>1x</id><measurement>2</measurement></request>".as_slice())]
    #[case::duplicate_element(b"<request><id>1</id><id>1</id><measurement>2</measurement></request>".as_slice())]
    fn test_strict_syntax_violations(#[case] body: &[u8]) {
        let verdict = validate_request(&with_checksum(body));
        assert!(verdict.integrity_passed);
        assert!(!verdict.syntax_passed);
    }

    #[rstest]
    fn test_garbage_synthesizes_request_id() {
        let _lock = MOCK_RANDOM_MUTEX.lock().unwrap();
        let ctx = MockRandom::next_request_id_context();
        ctx.expect().returning(|| 77);

        let verdict = validate_request_with_random::<MockRandom>(b"hello");
        // no closing tag at all, so there is no checksum to fail: the request is routed
        // through the malformed-request path under the synthesized id
        assert!(verdict.integrity_passed);
        assert!(!verdict.syntax_passed);
        assert_eq!(verdict.request_id, 77);
        assert_eq!(verdict.measurement_id, 0);
    }
}
