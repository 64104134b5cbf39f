use bytes::{BufMut, BytesMut};

use crate::protocol::checksum::Checksum;

/// A measurement lookup request. The `request_id` identifies one wire-level attempt, not
///  the logical request: a client picks a fresh one whenever it has reason to believe the
///  previous id is burned (see the client's corrupt-response handling).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Request {
    pub request_id: u16,
    pub measurement_id: u32,
}

impl Request {
    pub fn new(request_id: u16, measurement_id: u32) -> Request {
        Request {
            request_id,
            measurement_id,
        }
    }

    /// Canonical encoding: the tag-delimited body with no whitespace, followed by the
    ///  checksum over that body.
    pub fn ser(&self, buf: &mut BytesMut) {
        let body = format!(
            "<request><id>{}</id><measurement>{}</measurement></request>",
            self.request_id, self.measurement_id
        );
        let checksum = Checksum::of_message(body.as_bytes());
        buf.put_slice(body.as_bytes());
        buf.put_slice(checksum.to_string().as_bytes());
    }
}
