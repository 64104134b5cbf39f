use anyhow::anyhow;
use bytes::{BufMut, BytesMut};

use crate::protocol::checksum::Checksum;
use crate::protocol::error_code::ErrorCode;
use crate::protocol::grammar::{
    element_text, parse_float, parse_int, split_after_last, strip_whitespace, CODE_CLOSE,
    CODE_OPEN, ID_CLOSE, ID_OPEN, MEASUREMENT_CLOSE, MEASUREMENT_OPEN, RESPONSE_CLOSE,
    VALUE_CLOSE, VALUE_OPEN,
};

/// A server answer to one request delivery attempt. `measurement_id` and
///  `measurement_value` carry data only when `error_code` is [ErrorCode::Ok]; on the error
///  forms they stay at their zero defaults and are not put on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub response_id: u16,
    pub error_code: ErrorCode,
    pub measurement_id: u32,
    pub measurement_value: f32,
}

/// A decoded response plus the verdict of checking its checksum against the bytes it
///  actually arrived in. The two are separate because a corrupt response is still routable:
///  the client wants the decode result even when the integrity check fails.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedResponse {
    pub response: Response,
    pub integrity_ok: bool,
}

impl Response {
    pub fn ok(response_id: u16, measurement_id: u32, measurement_value: f32) -> Response {
        Response {
            response_id,
            error_code: ErrorCode::Ok,
            measurement_id,
            measurement_value,
        }
    }

    pub fn error(response_id: u16, error_code: ErrorCode) -> Response {
        Response {
            response_id,
            error_code,
            measurement_id: 0,
            measurement_value: 0.0,
        }
    }

    /// Canonical encoding with the checksum appended; the error form omits the
    ///  measurement elements.
    pub fn ser(&self, buf: &mut BytesMut) {
        let body = match self.error_code {
            ErrorCode::Ok => format!(
                "<response><id>{}</id><code>0</code><measurement>{}</measurement><value>{}</value></response>",
                self.response_id, self.measurement_id, self.measurement_value
            ),
            code => format!(
                "<response><id>{}</id><code>{}</code></response>",
                self.response_id,
                u8::from(code)
            ),
        };
        let checksum = Checksum::of_message(body.as_bytes());
        buf.put_slice(body.as_bytes());
        buf.put_slice(checksum.to_string().as_bytes());
    }

    /// Decodes a received datagram. Extraction is lenient about where elements sit, but the
    ///  decoder fails hard on an unrecognizable `<code>` or `<id>`, on garbled measurement
    ///  elements, and on a missing or unparseable trailing checksum. Absent measurement
    ///  elements decode to zero.
    pub fn deser(raw: &[u8]) -> anyhow::Result<DecodedResponse> {
        let stripped = strip_whitespace(raw);

        let code_text = element_text(&stripped, CODE_OPEN, CODE_CLOSE)
            .ok_or_else(|| anyhow!("response has no <code> element"))?;
        let code_raw: u8 = parse_int(code_text)?;
        let error_code = ErrorCode::try_from(code_raw)
            .map_err(|_| anyhow!("invalid error code {}", code_raw))?;

        let id_text = element_text(&stripped, ID_OPEN, ID_CLOSE)
            .ok_or_else(|| anyhow!("response has no <id> element"))?;
        let response_id: u16 = parse_int(id_text)?;

        let measurement_id = match element_text(&stripped, MEASUREMENT_OPEN, MEASUREMENT_CLOSE) {
            Some(text) => parse_int(text)?,
            None => 0,
        };
        let measurement_value = match element_text(&stripped, VALUE_OPEN, VALUE_CLOSE) {
            Some(text) => parse_float(text)?,
            None => 0.0,
        };

        let (body, trailer) = split_after_last(&stripped, RESPONSE_CLOSE)
            .ok_or_else(|| anyhow!("response has no closing tag"))?;
        let received_checksum = Checksum(parse_int::<u16>(trailer)?);
        let integrity_ok = Checksum::of_message(body) == received_checksum;

        Ok(DecodedResponse {
            response: Response {
                response_id,
                error_code,
                measurement_id,
                measurement_value,
            },
            integrity_ok,
        })
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::*;

    fn encoded(response: &Response) -> Vec<u8> {
        let mut buf = BytesMut::new();
        response.ser(&mut buf);
        buf.to_vec()
    }

    #[rstest]
    fn test_ser_ok_layout() {
        let raw = encoded(&Response::ok(42, 7, 72.5));
        let text = String::from_utf8(raw).unwrap();
        assert!(text.starts_with(
            "<response><id>42</id><code>0</code><measurement>7</measurement><value>72.5</value></response>"
        ));
    }

    #[rstest]
    fn test_ser_error_layout() {
        let raw = encoded(&Response::error(9, ErrorCode::MeasurementNotFound));
        let text = String::from_utf8(raw).unwrap();
        assert!(text.starts_with("<response><id>9</id><code>3</code></response>"));
        assert!(!text.contains("<measurement>"));
    }

    #[rstest]
    #[case::ok(Response::ok(42, 7, 72.5))]
    #[case::ok_integral_value(Response::ok(1, 2, 80.0))]
    #[case::integrity_failure(Response::error(65535, ErrorCode::IntegrityFailure))]
    #[case::malformed(Response::error(0, ErrorCode::MalformedRequest))]
    #[case::not_found(Response::error(7, ErrorCode::MeasurementNotFound))]
    fn test_roundtrip(#[case] response: Response) {
        let decoded = Response::deser(&encoded(&response)).unwrap();
        assert!(decoded.integrity_ok);
        assert_eq!(decoded.response, response);
    }

    #[rstest]
    fn test_deser_tolerates_whitespace() {
        let raw = encoded(&Response::ok(42, 7, 72.5));
        let mut perturbed = Vec::new();
        for (i, b) in raw.iter().enumerate() {
            perturbed.push(*b);
            if i % 5 == 0 {
                perturbed.push(b' ');
            }
        }
        let decoded = Response::deser(&perturbed).unwrap();
        assert!(decoded.integrity_ok);
        assert_eq!(decoded.response, Response::ok(42, 7, 72.5));
    }

    #[rstest]
    fn test_deser_detects_corruption() {
        let mut raw = encoded(&Response::ok(42, 7, 72.5));
        raw[1] ^= 0x01;
        let decoded = Response::deser(&raw).unwrap();
        assert!(!decoded.integrity_ok);
    }

    #[rstest]
    #[case::unknown_code(b"<response><id>1</id><code>7</code></response>0".as_slice())]
    #[case::huge_code(b"<response><id>1</id><code>256</code></response>0".as_slice())]
    #[case::nonnumeric_code(b"<response><id>1</id><code>x</code></response>0".as_slice())]
    #[case::missing_code(b"<response><id>1</id></response>0".as_slice())]
    #[case::missing_id(b"<response><code>0</code></response>0".as_slice())]
    #[case::nonnumeric_id(b"<response><id>1x</id><code>0</code></response>0".as_slice())]
    #[case::garbled_measurement(b"<response><id>1</id><code>0</code><measurement>a</measurement></response>0".as_slice())]
    #[case::garbled_value(b"<response><id>1</id><code>0</code><value>1.2.3</value></response>0".as_slice())]
    #[case::no_closing_tag(b"<response><id>1</id><code>0</code>".as_slice())]
    #[case::nonnumeric_checksum(b"<response><id>1</id><code>0</code></response>abc".as_slice())]
    #[case::missing_checksum(b"<response><id>1</id><code>0</code></response>".as_slice())]
    fn test_deser_rejects(#[case] raw: &[u8]) {
        assert!(Response::deser(raw).is_err());
    }

    #[rstest]
    fn test_deser_defaults_for_absent_measurement_elements() {
        let body = b"<response><id>5</id><code>0</code></response>";
        let mut raw = body.to_vec();
        raw.extend_from_slice(Checksum::of_message(body).to_string().as_bytes());

        let decoded = Response::deser(&raw).unwrap();
        assert!(decoded.integrity_ok);
        assert_eq!(decoded.response.measurement_id, 0);
        assert_eq!(decoded.response.measurement_value, 0.0);
    }
}
