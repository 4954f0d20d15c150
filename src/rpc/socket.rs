//! UDP transport carrying bencoded messages, correlating responses by message id.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::common::{Id, Message, Request, Response};
use crate::{Error, Result};

use super::{RequestHandler, Transport};

/// Largest payload of a UDP datagram.
const MTU: usize = 65_507;

#[derive(Debug)]
struct InflightRequest {
    to: SocketAddr,
    sender: flume::Sender<Response>,
}

impl InflightRequest {
    fn does_match(&self, from: &SocketAddr) -> bool {
        if self.to.port() != from.port() {
            return false;
        }

        if self.to.ip().is_unspecified() {
            return true;
        }

        self.to.ip() == from.ip()
    }
}

type InflightRequests = Arc<Mutex<HashMap<Id, InflightRequest>>>;
type HandlerSlot = Arc<Mutex<Option<Weak<dyn RequestHandler>>>>;

/// A UdpSocket wrapper that formats and correlates requests and responses.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    inflight_requests: InflightRequests,
    handler: HandlerSlot,
    receiver: JoinHandle<()>,
}

impl UdpTransport {
    /// Bind a socket at `address` and start receiving.
    pub async fn bind(address: SocketAddr) -> Result<Self> {
        let socket = Arc::new(UdpSocket::bind(address).await?);
        let local_addr = socket.local_addr()?;

        let inflight_requests = InflightRequests::default();
        let handler = HandlerSlot::default();

        let receiver = tokio::spawn(receive_loop(
            socket.clone(),
            inflight_requests.clone(),
            handler.clone(),
        ));

        debug!(?local_addr, "Udp transport listening");

        Ok(Self {
            socket,
            local_addr,
            inflight_requests,
            handler,
            receiver,
        })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn serve(&self, handler: Weak<dyn RequestHandler>) {
        *lock(&self.handler) = Some(handler);
    }

    async fn request(&self, to: SocketAddr, request: Request) -> Result<Response> {
        let msg_id = request.msg_id;
        let bytes = Message::Request(request).to_bytes()?;

        let (sender, receiver) = flume::bounded::<Response>(1);

        lock(&self.inflight_requests).insert(msg_id, InflightRequest { to, sender });
        // Removes the entry however this future ends, including being dropped on timeout.
        let _guard = InflightGuard {
            msg_id,
            inflight_requests: &self.inflight_requests,
        };

        trace!(?to, ?msg_id, "Sending request");

        self.socket
            .send_to(&bytes, to)
            .await
            .map_err(|error| Error::Unreachable(to, error.to_string()))?;

        receiver
            .recv_async()
            .await
            .map_err(|_| Error::Unreachable(to, "response channel closed".to_string()))
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.receiver.abort();
    }
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("local_addr", &self.local_addr)
            .field("inflight", &lock(&self.inflight_requests).len())
            .finish()
    }
}

struct InflightGuard<'a> {
    msg_id: Id,
    inflight_requests: &'a InflightRequests,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        lock(self.inflight_requests).remove(&self.msg_id);
    }
}

async fn receive_loop(
    socket: Arc<UdpSocket>,
    inflight_requests: InflightRequests,
    handler_slot: HandlerSlot,
) {
    let mut buf = vec![0_u8; MTU];

    loop {
        let (amt, from) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(error) => {
                debug!(?error, "Udp receive failed");
                continue;
            }
        };

        if from.port() == 0 {
            trace!(context = "socket_validation", "Message from port 0");
            continue;
        }

        match Message::from_bytes(&buf[..amt]) {
            Ok(Message::Request(request)) => {
                trace!(context = "socket_message_receiving", ?request, ?from, "Received request");

                let handler = lock(&handler_slot).as_ref().and_then(Weak::upgrade);

                if let Some(handler) = handler {
                    let socket = socket.clone();

                    tokio::spawn(async move {
                        let response = handler.handle_request(request).await;

                        match Message::Response(response).to_bytes() {
                            Ok(bytes) => {
                                if let Err(error) = socket.send_to(&bytes, from).await {
                                    debug!(?error, ?from, "Error sending response message");
                                }
                            }
                            Err(error) => debug!(?error, "Error encoding response message"),
                        }
                    });
                }
            }
            Ok(Message::Response(response)) => {
                trace!(context = "socket_message_receiving", ?response, ?from, "Received response");

                let mut inflight = lock(&inflight_requests);

                let matches = inflight
                    .get(&response.msg_id)
                    .map(|request| request.does_match(&from))
                    .unwrap_or(false);

                if matches {
                    if let Some(request) = inflight.remove(&response.msg_id) {
                        let _ = request.sender.try_send(response);
                    }
                } else {
                    trace!(context = "socket_validation", ?from, "Unexpected response");
                }
            }
            Err(error) => {
                trace!(
                    context = "socket_error",
                    ?error,
                    ?from,
                    message = ?String::from_utf8_lossy(&buf[..amt]),
                    "Received invalid Bencode message."
                );
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
