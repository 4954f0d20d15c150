//! Miscellaneous common structs used throughout the library.

mod closest_contacts;
mod contact;
mod id;
pub mod messages;
pub mod routing_table;

pub use closest_contacts::*;
pub use contact::*;
pub use id::*;
pub use messages::*;
pub use routing_table::*;
