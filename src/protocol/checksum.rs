use std::fmt::{Debug, Display, Formatter};

/// Rolling 16-bit hash over a message body, used as the integrity check on both requests
///  and responses.
///
/// The input is packed into 16-bit big-endian words (an odd trailing byte becomes the high
///  byte of a final word), and the words are folded in order with
///  `s = 7919 * (s ^ word) mod 65536`. The fold is order-sensitive and touches every bit,
///  but it is a fingerprint for detecting transmission errors, not a cryptographic hash.
///
/// ASCII whitespace is stripped before packing, so two messages that differ only in
///  whitespace placement hash identically.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct Checksum(pub u16);

impl Debug for Checksum {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl Display for Checksum {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Checksum {
    const FOLD_MULTIPLIER: u16 = 7919;

    pub fn of_message(raw: &[u8]) -> Checksum {
        let mut s = 0u16;
        let mut bytes = raw.iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace());

        while let Some(hi) = bytes.next() {
            let lo = bytes.next().unwrap_or(0);
            let word = u16::from_be_bytes([hi, lo]);
            s = Self::FOLD_MULTIPLIER.wrapping_mul(s ^ word);
        }
        Checksum(s)
    }
}
