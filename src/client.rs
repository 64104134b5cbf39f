use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::protocol::error_code::ErrorCode;
use crate::protocol::request::Request;
use crate::protocol::response::Response;
use crate::transport::{Transport, MAX_DATAGRAM_SIZE};
use crate::util::random::{Random, RngRandom};

/// timeout for the first attempt of every logical request
pub const INITIAL_TIMEOUT: Duration = Duration::from_millis(1000);

/// A logical request is abandoned when the number of consecutive timeouts exceeds this,
///  i.e. after the fourth unanswered attempt.
pub const TIMEOUT_BUDGET: u32 = 3;

/// Bound on resends triggered by corrupt (checksum-failing) responses. Corrupt responses
///  do not count against the timeout budget, so they need a budget of their own.
pub const CORRUPT_RESPONSE_BUDGET: u32 = 3;

/// Final outcome of one logical request, as reported to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Value { measurement_id: u32, value: f32 },
    /// the server could not make sense of the request's structure (error code 2)
    MalformedRequest,
    /// the server has no value for the measurement id (error code 3)
    MeasurementNotFound,
    /// the server reported an integrity failure and the caller declined to resend; no
    ///  value was obtained, but nothing failed either - a deliberate end of the request
    DeclinedAfterIntegrityFailure,
    /// timeout budget or corrupt-response budget exhausted
    ConnectionFailure,
    /// the response could not be decoded (damaged structure or an unknown error code)
    MalformedResponse,
}

/// Yes/no decision capability for the integrity-failure branch. The session blocks on the
///  answer; retrieval does not continue until one is given.
#[async_trait]
pub trait ResendPrompt: Send + Sync {
    async fn confirm_resend(&self, request: &Request) -> bool;
}

/// Interactive prompt on stdin: asks until the user answers `y` or `n`.
pub struct ConsolePrompt {}

#[async_trait]
impl ResendPrompt for ConsolePrompt {
    async fn confirm_resend(&self, request: &Request) -> bool {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            println!(
                "Integrity check for the request with requestID:{} and measurementID:{} failed.\nDo you wish to resend this packet?(y/n)",
                request.request_id, request.measurement_id
            );
            match lines.next_line().await {
                Ok(Some(line)) => match line.trim().to_ascii_lowercase().as_str() {
                    "y" => return true,
                    "n" => return false,
                    _ => continue,
                },
                // EOF or a broken stdin means nobody can answer: don't resend
                _ => return false,
            }
        }
    }
}

/// The client side of the protocol: one logical request at a time, each spanning as many
///  wire-level attempts as the timeout/backoff state machine allows.
///
/// The timeout counter and the backoff interval are owned by the session and reset at
///  exactly these points: receiving any datagram (even one that turns out corrupt), and
///  abandoning a logical request. A timed-out attempt leaves the interval doubled.
pub struct ClientSession {
    transport: Arc<dyn Transport>,
    prompt: Arc<dyn ResendPrompt>,
    num_timeouts: u32,
    current_timeout: Duration,
}

impl ClientSession {
    pub fn new(transport: Arc<dyn Transport>, prompt: Arc<dyn ResendPrompt>) -> ClientSession {
        ClientSession {
            transport,
            prompt,
            num_timeouts: 0,
            current_timeout: INITIAL_TIMEOUT,
        }
    }

    /// Runs the logical requests for `measurement_ids` strictly in sequence, reporting the
    ///  outcome per id. A transport failure ends only the logical request it happened in.
    pub async fn run(&mut self, measurement_ids: impl IntoIterator<Item = u32>) -> Vec<(u32, Outcome)> {
        let mut outcomes = Vec::new();
        for measurement_id in measurement_ids {
            let outcome = match self.retrieve(measurement_id).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("measurement {}: transport error: {}", measurement_id, e);
                    Outcome::ConnectionFailure
                }
            };
            outcomes.push((measurement_id, outcome));
        }
        outcomes
    }

    /// One logical request: sends attempts with timeout/backoff until a terminal outcome
    ///  is reached.
    pub async fn retrieve(&mut self, measurement_id: u32) -> anyhow::Result<Outcome> {
        let mut request = Request::new(RngRandom::next_request_id(), measurement_id);
        let mut corrupt_responses = 0u32;

        loop {
            if self.num_timeouts > TIMEOUT_BUDGET {
                info!(
                    "giving up on measurement {} after {} consecutive timeouts",
                    measurement_id, self.num_timeouts
                );
                self.reset_backoff();
                return Ok(Outcome::ConnectionFailure);
            }

            let mut buf = BytesMut::new();
            request.ser(&mut buf);
            debug!(
                "requesting measurement {} with request id {} and timeout {:?}",
                request.measurement_id, request.request_id, self.current_timeout
            );
            self.transport.send(&buf).await?;

            let mut recv_buf = [0u8; MAX_DATAGRAM_SIZE];
            let num_read = match tokio::time::timeout(self.current_timeout, self.transport.recv(&mut recv_buf)).await {
                Err(_) => {
                    debug!("no response for request id {} within {:?}", request.request_id, self.current_timeout);
                    self.num_timeouts += 1;
                    self.current_timeout *= 2;
                    continue;
                }
                Ok(Err(e)) => {
                    // a broken receive is handled like a lost datagram
                    warn!("error receiving response: {}", e);
                    self.num_timeouts += 1;
                    self.current_timeout *= 2;
                    continue;
                }
                Ok(Ok(num_read)) => num_read,
            };

            // any received datagram resets the backoff state, even one that turns out corrupt
            self.reset_backoff();

            let decoded = match Response::deser(&recv_buf[..num_read]) {
                Ok(decoded) => decoded,
                Err(e) => {
                    warn!("undecodable response for request id {}: {}", request.request_id, e);
                    return Ok(Outcome::MalformedResponse);
                }
            };

            if !decoded.integrity_ok {
                corrupt_responses += 1;
                if corrupt_responses > CORRUPT_RESPONSE_BUDGET {
                    warn!(
                        "giving up on measurement {} after {} corrupt responses",
                        measurement_id, corrupt_responses
                    );
                    return Ok(Outcome::ConnectionFailure);
                }
                debug!(
                    "response for request id {} failed the integrity check, resending with a fresh id",
                    request.request_id
                );
                request.request_id = RngRandom::next_request_id();
                continue;
            }

            let response = decoded.response;
            match response.error_code {
                ErrorCode::IntegrityFailure => {
                    if self.prompt.confirm_resend(&request).await {
                        continue;
                    }
                    return Ok(Outcome::DeclinedAfterIntegrityFailure);
                }
                ErrorCode::MalformedRequest => return Ok(Outcome::MalformedRequest),
                ErrorCode::MeasurementNotFound => return Ok(Outcome::MeasurementNotFound),
                ErrorCode::Ok => {
                    return Ok(Outcome::Value {
                        measurement_id: response.measurement_id,
                        value: response.measurement_value,
                    })
                }
            }
        }
    }

    fn reset_backoff(&mut self) {
        self.num_timeouts = 0;
        self.current_timeout = INITIAL_TIMEOUT;
    }

    #[cfg(test)]
    fn backoff_state(&self) -> (u32, Duration) {
        (self.num_timeouts, self.current_timeout)
    }
}
