//! The wire protocol: a tag-delimited textual request/response format with a 16-bit
//!  integrity checksum appended directly after the closing root tag.
//!
//! ```ascii
//! Request          ::= "<request><id>" INT "</id><measurement>" INT "</measurement></request>" CHECKSUM
//! Response (OK)    ::= "<response><id>" INT "</id><code>0</code><measurement>" INT "</measurement><value>" FLOAT "</value></response>" CHECKSUM
//! Response (error) ::= "<response><id>" INT "</id><code>" INT "</code></response>" CHECKSUM
//! ```
//!
//! `CHECKSUM` is the plain decimal rendering of the checksum, with no delimiter before it.
//!
//! Encoders emit the canonical form with no whitespace anywhere. Decoders strip all ASCII
//!  whitespace before interpreting a message, and the checksum is computed over the stripped
//!  bytes - so inserting whitespace anywhere in transit changes neither the parse nor the
//!  integrity check, while any other modification fails the integrity check.
//!
//! Requests are checked in two phases on the server ([validation]): a lenient integrity phase
//!  that extracts fields wherever they can be found, and a strict syntax phase that accepts
//!  only the canonical form. Responses are decoded leniently on the client, with the zero
//!  defaults for absent elements that the protocol prescribes.

pub mod checksum;
pub mod error_code;
pub mod grammar;
pub mod request;
pub mod response;
pub mod validation;
