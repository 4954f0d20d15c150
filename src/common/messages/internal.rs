use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

use crate::vanish::Vdo;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct KrpcMessage {
    #[serde(rename = "t", with = "serde_bytes")]
    pub msg_id: [u8; 20],

    #[serde(flatten)]
    pub variant: KrpcMessageVariant,
}

impl KrpcMessage {
    pub fn from_bytes(bytes: &[u8]) -> Result<KrpcMessage, serde_bencode::Error> {
        let obj = serde_bencode::from_bytes(bytes)?;
        Ok(obj)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_bencode::Error> {
        serde_bencode::to_bytes(self)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "y")]
pub enum KrpcMessageVariant {
    #[serde(rename = "q")]
    Request(KrpcRequestSpecific),

    #[serde(rename = "r")]
    Response(KrpcResponseSpecific),

    #[serde(rename = "e")]
    Error(KrpcErrorSpecific),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "q")]
pub enum KrpcRequestSpecific {
    #[serde(rename = "ping")]
    Ping {
        #[serde(rename = "a")]
        arguments: PingRequestArguments,
    },

    #[serde(rename = "store")]
    Store {
        #[serde(rename = "a")]
        arguments: StoreRequestArguments,
    },

    #[serde(rename = "find_node")]
    FindNode {
        #[serde(rename = "a")]
        arguments: FindNodeRequestArguments,
    },

    #[serde(rename = "find_value")]
    FindValue {
        #[serde(rename = "a")]
        arguments: FindValueRequestArguments,
    },

    #[serde(rename = "get_vdo")]
    GetVdo {
        #[serde(rename = "a")]
        arguments: GetVdoRequestArguments,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "k")]
pub enum KrpcResponseSpecific {
    #[serde(rename = "pong")]
    Pong {
        #[serde(rename = "r")]
        arguments: PongResponseArguments,
    },

    #[serde(rename = "stored")]
    Stored,

    #[serde(rename = "nodes")]
    Nodes {
        #[serde(rename = "r")]
        arguments: NodesResponseArguments,
    },

    #[serde(rename = "value")]
    Value {
        #[serde(rename = "r")]
        arguments: ValueResponseArguments,
    },

    #[serde(rename = "vdo")]
    Vdo {
        #[serde(rename = "r")]
        arguments: VdoResponseArguments,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct KrpcErrorSpecific {
    #[serde(rename = "e")]
    pub error_info: (i32, String),
}

// === PING ===

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PingRequestArguments {
    #[serde(rename = "s")]
    pub sender: ByteBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PongResponseArguments {
    #[serde(rename = "s")]
    pub sender: ByteBuf,
}

// === STORE ===

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StoreRequestArguments {
    #[serde(rename = "s")]
    pub sender: ByteBuf,

    #[serde(with = "serde_bytes")]
    pub key: [u8; 20],

    #[serde(rename = "v")]
    pub value: ByteBuf,
}

// === FIND_NODE ===

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FindNodeRequestArguments {
    #[serde(rename = "s")]
    pub sender: ByteBuf,

    #[serde(with = "serde_bytes")]
    pub target: [u8; 20],
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NodesResponseArguments {
    pub nodes: Vec<ByteBuf>,
}

// === FIND_VALUE ===

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FindValueRequestArguments {
    #[serde(rename = "s")]
    pub sender: ByteBuf,

    #[serde(with = "serde_bytes")]
    pub key: [u8; 20],
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ValueResponseArguments {
    #[serde(rename = "v")]
    pub value: ByteBuf,
}

// === GET_VDO ===

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GetVdoRequestArguments {
    #[serde(rename = "s")]
    pub sender: ByteBuf,

    #[serde(with = "serde_bytes")]
    pub vdo_id: [u8; 20],
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VdoResponseArguments {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vdo: Option<Vdo>,
}
