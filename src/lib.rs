#![doc = include_str!("../README.md")]

// Public modules
mod common;

pub mod cli;
mod dht;
mod error;
pub mod rpc;
pub mod server;
mod testnet;
pub mod vanish;

pub use crate::common::{
    messages, routing_table, Contact, Id, Insertion, RoutingTable, ID_BITS, ID_SIZE,
};
pub use bytes::Bytes;
pub use dht::{Dht, DhtBuilder};
pub use error::{Error, Result};
pub use testnet::Testnet;
pub use vanish::{RepublishHandle, Vdo};
