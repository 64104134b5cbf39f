use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::net::{ToSocketAddrs, UdpSocket};
use tracing::{debug, error, info};

use crate::protocol::error_code::ErrorCode;
use crate::protocol::response::Response;
use crate::protocol::validation::validate_request;
use crate::store::MeasurementStore;
use crate::transport::MAX_DATAGRAM_SIZE;

/// UDP server answering measurement lookups. Stateless across datagrams: every received
///  datagram is classified on its own and answered with exactly one response datagram,
///  sent back to wherever the request came from.
pub struct Server {
    socket: UdpSocket,
    store: Arc<dyn MeasurementStore>,
}

impl Server {
    pub async fn bind(addr: impl ToSocketAddrs, store: Arc<dyn MeasurementStore>) -> anyhow::Result<Server> {
        let socket = UdpSocket::bind(addr).await?;
        info!("listening on {:?}", socket.local_addr()?);
        Ok(Server { socket, store })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive loop: one request/response exchange at a time, forever. Receive and send
    ///  failures are logged and the loop continues.
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        loop {
            let (num_read, from) = match self.socket.recv_from(&mut buf).await {
                Ok(x) => x,
                Err(e) => {
                    error!("error receiving datagram: {}", e);
                    continue;
                }
            };
            debug!("received {} byte request from {:?}", num_read, from);

            let response = response_for(&buf[..num_read], self.store.as_ref());
            debug!("responding to {:?} with {:?}", from, response);

            let mut send_buf = BytesMut::new();
            response.ser(&mut send_buf);
            if let Err(e) = self.socket.send_to(&send_buf, from).await {
                error!("error sending response to {:?}: {}", from, e);
            }
        }
    }
}

/// Classifies one received datagram and builds the response for it: integrity failure
///  first, then syntax, then the store lookup.
pub fn response_for(raw: &[u8], store: &dyn MeasurementStore) -> Response {
    let verdict = validate_request(raw);

    if !verdict.integrity_passed {
        return Response::error(verdict.request_id, ErrorCode::IntegrityFailure);
    }
    if !verdict.syntax_passed {
        return Response::error(verdict.request_id, ErrorCode::MalformedRequest);
    }
    match store.lookup(verdict.measurement_id) {
        Some(value) => Response::ok(verdict.request_id, verdict.measurement_id, value),
        None => Response::error(verdict.request_id, ErrorCode::MeasurementNotFound),
    }
}
