//! Typed RPC messages and their bencoded wire form.

mod internal;

use bytes::Bytes;
use serde_bytes::ByteBuf;

use crate::common::{Contact, Id};
use crate::vanish::Vdo;
use crate::{Error, Result};

/// Error code carried by `e` messages.
const GENERIC_ERROR_CODE: i32 = 201;

#[derive(Debug, PartialEq, Clone)]
pub enum Message {
    Request(Request),
    Response(Response),
}

#[derive(Debug, PartialEq, Clone)]
/// An RPC request, every request carries the caller's [Contact].
pub struct Request {
    pub msg_id: Id,
    pub sender: Contact,
    pub kind: RequestKind,
}

#[derive(Debug, PartialEq, Clone)]
pub enum RequestKind {
    Ping,
    Store { key: Id, value: Bytes },
    FindNode { target: Id },
    FindValue { key: Id },
    GetVdo { vdo_id: Id },
}

#[derive(Debug, PartialEq, Clone)]
/// An RPC response echoing the request's `msg_id`.
pub struct Response {
    pub msg_id: Id,
    pub kind: ResponseKind,
}

#[derive(Debug, PartialEq, Clone)]
pub enum ResponseKind {
    Pong { sender: Contact },
    Stored,
    /// Closest contacts to the requested target, excluding the requester.
    Nodes(Vec<Contact>),
    Value(Bytes),
    Vdo(Option<Vdo>),
    Error(String),
}

impl Request {
    pub fn new(msg_id: Id, sender: Contact, kind: RequestKind) -> Self {
        Self {
            msg_id,
            sender,
            kind,
        }
    }

    /// A response to this request.
    pub fn reply(&self, kind: ResponseKind) -> Response {
        Response {
            msg_id: self.msg_id,
            kind,
        }
    }
}

impl RequestKind {
    pub fn name(&self) -> &'static str {
        match self {
            RequestKind::Ping => "ping",
            RequestKind::Store { .. } => "store",
            RequestKind::FindNode { .. } => "find_node",
            RequestKind::FindValue { .. } => "find_value",
            RequestKind::GetVdo { .. } => "get_vdo",
        }
    }
}

impl Message {
    fn into_serde_message(self) -> internal::KrpcMessage {
        match self {
            Message::Request(Request {
                msg_id,
                sender,
                kind,
            }) => {
                let sender = ByteBuf::from(sender.to_compact());

                internal::KrpcMessage {
                    msg_id: msg_id.0,
                    variant: internal::KrpcMessageVariant::Request(match kind {
                        RequestKind::Ping => internal::KrpcRequestSpecific::Ping {
                            arguments: internal::PingRequestArguments { sender },
                        },
                        RequestKind::Store { key, value } => internal::KrpcRequestSpecific::Store {
                            arguments: internal::StoreRequestArguments {
                                sender,
                                key: key.0,
                                value: ByteBuf::from(value.to_vec()),
                            },
                        },
                        RequestKind::FindNode { target } => {
                            internal::KrpcRequestSpecific::FindNode {
                                arguments: internal::FindNodeRequestArguments {
                                    sender,
                                    target: target.0,
                                },
                            }
                        }
                        RequestKind::FindValue { key } => {
                            internal::KrpcRequestSpecific::FindValue {
                                arguments: internal::FindValueRequestArguments {
                                    sender,
                                    key: key.0,
                                },
                            }
                        }
                        RequestKind::GetVdo { vdo_id } => internal::KrpcRequestSpecific::GetVdo {
                            arguments: internal::GetVdoRequestArguments {
                                sender,
                                vdo_id: vdo_id.0,
                            },
                        },
                    }),
                }
            }
            Message::Response(Response { msg_id, kind }) => internal::KrpcMessage {
                msg_id: msg_id.0,
                variant: match kind {
                    ResponseKind::Error(description) => {
                        internal::KrpcMessageVariant::Error(internal::KrpcErrorSpecific {
                            error_info: (GENERIC_ERROR_CODE, description),
                        })
                    }
                    kind => internal::KrpcMessageVariant::Response(match kind {
                        ResponseKind::Pong { sender } => internal::KrpcResponseSpecific::Pong {
                            arguments: internal::PongResponseArguments {
                                sender: ByteBuf::from(sender.to_compact()),
                            },
                        },
                        ResponseKind::Nodes(nodes) => internal::KrpcResponseSpecific::Nodes {
                            arguments: internal::NodesResponseArguments {
                                nodes: contacts_to_bytes(&nodes),
                            },
                        },
                        ResponseKind::Value(value) => internal::KrpcResponseSpecific::Value {
                            arguments: internal::ValueResponseArguments {
                                value: ByteBuf::from(value.to_vec()),
                            },
                        },
                        ResponseKind::Vdo(vdo) => internal::KrpcResponseSpecific::Vdo {
                            arguments: internal::VdoResponseArguments { vdo },
                        },
                        ResponseKind::Stored | ResponseKind::Error(_) => {
                            internal::KrpcResponseSpecific::Stored
                        }
                    }),
                },
            },
        }
    }

    fn from_serde_message(msg: internal::KrpcMessage) -> Result<Message> {
        let msg_id = Id(msg.msg_id);

        Ok(match msg.variant {
            internal::KrpcMessageVariant::Request(request) => {
                let (sender, kind) = match request {
                    internal::KrpcRequestSpecific::Ping { arguments } => {
                        (arguments.sender, RequestKind::Ping)
                    }
                    internal::KrpcRequestSpecific::Store { arguments } => (
                        arguments.sender,
                        RequestKind::Store {
                            key: Id(arguments.key),
                            value: Bytes::from(arguments.value.into_vec()),
                        },
                    ),
                    internal::KrpcRequestSpecific::FindNode { arguments } => (
                        arguments.sender,
                        RequestKind::FindNode {
                            target: Id(arguments.target),
                        },
                    ),
                    internal::KrpcRequestSpecific::FindValue { arguments } => (
                        arguments.sender,
                        RequestKind::FindValue {
                            key: Id(arguments.key),
                        },
                    ),
                    internal::KrpcRequestSpecific::GetVdo { arguments } => (
                        arguments.sender,
                        RequestKind::GetVdo {
                            vdo_id: Id(arguments.vdo_id),
                        },
                    ),
                };

                Message::Request(Request {
                    msg_id,
                    sender: Contact::from_compact(&sender)?,
                    kind,
                })
            }
            internal::KrpcMessageVariant::Response(response) => Message::Response(Response {
                msg_id,
                kind: match response {
                    internal::KrpcResponseSpecific::Pong { arguments } => ResponseKind::Pong {
                        sender: Contact::from_compact(&arguments.sender)?,
                    },
                    internal::KrpcResponseSpecific::Stored => ResponseKind::Stored,
                    internal::KrpcResponseSpecific::Nodes { arguments } => {
                        ResponseKind::Nodes(bytes_to_contacts(&arguments.nodes)?)
                    }
                    internal::KrpcResponseSpecific::Value { arguments } => {
                        ResponseKind::Value(Bytes::from(arguments.value.into_vec()))
                    }
                    internal::KrpcResponseSpecific::Vdo { arguments } => {
                        ResponseKind::Vdo(arguments.vdo)
                    }
                },
            }),
            internal::KrpcMessageVariant::Error(error) => Message::Response(Response {
                msg_id,
                kind: ResponseKind::Error(error.error_info.1),
            }),
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.clone()
            .into_serde_message()
            .to_bytes()
            .map_err(Error::BencodeError)
    }

    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Message> {
        Message::from_serde_message(internal::KrpcMessage::from_bytes(bytes.as_ref())?)
    }
}

fn contacts_to_bytes(contacts: &[Contact]) -> Vec<ByteBuf> {
    contacts
        .iter()
        .map(|contact| ByteBuf::from(contact.to_compact()))
        .collect()
}

fn bytes_to_contacts(bytes: &[ByteBuf]) -> Result<Vec<Contact>> {
    bytes
        .iter()
        .map(|compact| Contact::from_compact(compact))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> Contact {
        Contact::new(Id::random(), "127.0.0.1:6881".parse().unwrap())
    }

    #[test]
    fn test_ping_request() {
        let original_msg = Message::Request(Request::new(Id::random(), sender(), RequestKind::Ping));

        let serde_msg = original_msg.clone().into_serde_message();
        let bytes = serde_msg.to_bytes().unwrap();
        let parsed_serde_msg = internal::KrpcMessage::from_bytes(&bytes).unwrap();
        let parsed_msg = Message::from_serde_message(parsed_serde_msg).unwrap();

        assert_eq!(parsed_msg, original_msg);
    }

    #[test]
    fn test_pong_response() {
        let original_msg = Message::Response(Response {
            msg_id: Id::random(),
            kind: ResponseKind::Pong { sender: sender() },
        });

        let bytes = original_msg.to_bytes().unwrap();

        assert_eq!(Message::from_bytes(bytes).unwrap(), original_msg);
    }

    #[test]
    fn test_store_request() {
        let original_msg = Message::Request(Request::new(
            Id::random(),
            sender(),
            RequestKind::Store {
                key: Id::hash(b"key"),
                value: Bytes::from_static(b"some value"),
            },
        ));

        let bytes = original_msg.to_bytes().unwrap();

        assert_eq!(Message::from_bytes(bytes).unwrap(), original_msg);
    }

    #[test]
    fn test_find_node_response_mixed_families() {
        let original_msg = Message::Response(Response {
            msg_id: Id::random(),
            kind: ResponseKind::Nodes(vec![
                Contact::new(Id::random(), "10.0.0.1:4000".parse().unwrap()),
                Contact::new(Id::random(), "[::1]:4001".parse().unwrap()),
            ]),
        });

        let bytes = original_msg.to_bytes().unwrap();

        assert_eq!(Message::from_bytes(bytes).unwrap(), original_msg);
    }

    #[test]
    fn test_vdo_response() {
        let vdo = Vdo {
            access_key: 42,
            ciphertext: Bytes::from_static(&[1, 2, 3, 4]),
            number_of_shares: 20,
            threshold: 10,
        };

        for vdo in [Some(vdo), None] {
            let original_msg = Message::Response(Response {
                msg_id: Id::random(),
                kind: ResponseKind::Vdo(vdo),
            });

            let bytes = original_msg.to_bytes().unwrap();

            assert_eq!(Message::from_bytes(bytes).unwrap(), original_msg);
        }
    }

    #[test]
    fn test_error_response() {
        let original_msg = Message::Response(Response {
            msg_id: Id::random(),
            kind: ResponseKind::Error("store is full".to_string()),
        });

        let bytes = original_msg.to_bytes().unwrap();

        assert_eq!(Message::from_bytes(bytes).unwrap(), original_msg);
    }

    #[test]
    fn test_wire_format() {
        let msg = Message::Request(Request::new(
            Id([7; 20]),
            sender(),
            RequestKind::FindNode {
                target: Id([1; 20]),
            },
        ));

        let bytes = msg.to_bytes().unwrap();
        let text = String::from_utf8_lossy(&bytes);

        assert!(text.contains("1:q9:find_node"));
        assert!(text.contains("1:y1:q"));
        assert!(text.contains("1:t20:"));
    }

    #[test]
    fn test_garbage() {
        assert!(Message::from_bytes(b"not bencode").is_err());
    }
}
