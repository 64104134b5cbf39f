use num_enum::{IntoPrimitive, TryFromPrimitive};

/// The closed set of result codes a response can carry in its `<code>` element. Anything
///  else on the wire is rejected at decode time rather than mapped to a default.
#[derive(Debug, Copy, Clone, Eq, PartialEq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ErrorCode {
    Ok = 0,
    IntegrityFailure = 1,
    MalformedRequest = 2,
    MeasurementNotFound = 3,
}

impl ErrorCode {
    /// human-readable message for displaying a server verdict to the user
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::Ok => "OK. The response has been created according to the request.",
            ErrorCode::IntegrityFailure => "Error: integrity check failure. The request has one or more bit errors.",
            ErrorCode::MalformedRequest => "Error: malformed request. The syntax of the request message is not correct.",
            ErrorCode::MeasurementNotFound => "Error: non-existent measurement. The measurement with the requested measurement ID does not exist.",
        }
    }
}
