//! Line oriented command front end for a [Dht] node.

use std::fmt::Write;
use std::net::SocketAddr;
use std::str::FromStr;

use bytes::Bytes;

use crate::common::{Contact, Id};
use crate::rpc::iterative_query::QueryReply;
use crate::vanish::RepublishHandle;
use crate::Dht;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// A command line that never reaches the node, displayed as the reply.
pub enum ParseError {
    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("ERR: Provided an invalid {kind} ({value})")]
    Invalid { kind: &'static str, value: String },

    #[error("ERR: Unknown command")]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PingTarget {
    Node(Id),
    /// `host:port`, resolved when executed.
    Address(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Whoami,
    PrintContact(Id),
    Ping(PingTarget),
    LocalFindValue(Id),
    Store { node: Id, key: Id, value: Bytes },
    FindNode { node: Id, key: Id },
    FindValue { node: Id, key: Id },
    IterativeFindNode(Id),
    IterativeStore { key: Id, value: Bytes },
    IterativeFindValue(Id),
    Vanish {
        vdo_id: Id,
        data: Bytes,
        number_of_shares: u8,
        threshold: u8,
        epochs: u32,
    },
    Unvanish { node: Id, vdo_id: Id },
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Command, ParseError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();

        let (name, args) = match tokens.split_first() {
            Some((name, args)) => (*name, args),
            None => return Err(ParseError::Unknown),
        };

        let expect = |count: usize, usage: &'static str| {
            if args.len() == count {
                Ok(())
            } else {
                Err(ParseError::Usage(usage))
            }
        };

        let command = match name {
            "quit" => {
                expect(0, "quit")?;
                Command::Quit
            }
            "whoami" => {
                expect(0, "whoami")?;
                Command::Whoami
            }
            "print_contact" => {
                expect(1, "print_contact [nodeID]")?;
                Command::PrintContact(parse_id(args[0], "node ID")?)
            }
            "ping" => {
                expect(1, "ping [nodeID | host:port]")?;
                Command::Ping(parse_ping_target(args[0])?)
            }
            "local_find_value" => {
                expect(1, "local_find_value [key]")?;
                Command::LocalFindValue(parse_id(args[0], "key")?)
            }
            "store" => {
                expect(3, "store [nodeID] [key] [value]")?;
                Command::Store {
                    node: parse_id(args[0], "node ID")?,
                    key: parse_id(args[1], "key")?,
                    value: Bytes::from(args[2].to_string()),
                }
            }
            "find_node" => {
                expect(2, "find_node [nodeID] [key]")?;
                Command::FindNode {
                    node: parse_id(args[0], "node ID")?,
                    key: parse_id(args[1], "key")?,
                }
            }
            "find_value" => {
                expect(2, "find_value [nodeID] [key]")?;
                Command::FindValue {
                    node: parse_id(args[0], "node ID")?,
                    key: parse_id(args[1], "key")?,
                }
            }
            "iterativeFindNode" => {
                expect(1, "iterativeFindNode [nodeID]")?;
                Command::IterativeFindNode(parse_id(args[0], "node ID")?)
            }
            "iterativeStore" => {
                expect(2, "iterativeStore [key] [value]")?;
                Command::IterativeStore {
                    key: parse_id(args[0], "key")?,
                    value: Bytes::from(args[1].to_string()),
                }
            }
            "iterativeFindValue" => {
                expect(1, "iterativeFindValue [key]")?;
                Command::IterativeFindValue(parse_id(args[0], "key")?)
            }
            "vanish" => {
                const USAGE: &str = "vanish [vdoID] [data] [numberOfShares] [threshold] [epochs]";

                if args.len() != 4 && args.len() != 5 {
                    return Err(ParseError::Usage(USAGE));
                }

                let number_of_shares = parse_number::<u8>(args[2], "number of shares")?;
                let threshold = parse_number::<u8>(args[3], "threshold")?;

                if threshold == 0 || threshold > number_of_shares {
                    return Err(ParseError::Invalid {
                        kind: "threshold",
                        value: args[3].to_string(),
                    });
                }

                Command::Vanish {
                    vdo_id: parse_id(args[0], "VDO ID")?,
                    data: Bytes::from(args[1].to_string()),
                    number_of_shares,
                    threshold,
                    epochs: match args.get(4) {
                        Some(epochs) => parse_number(epochs, "number of epochs")?,
                        None => 0,
                    },
                }
            }
            "unvanish" => {
                expect(2, "unvanish [nodeID] [vdoID]")?;
                Command::Unvanish {
                    node: parse_id(args[0], "node ID")?,
                    vdo_id: parse_id(args[1], "VDO ID")?,
                }
            }
            _ => return Err(ParseError::Unknown),
        };

        Ok(command)
    }
}

/// Executes commands against a node, keeping the republish tasks it started alive.
#[derive(Debug)]
pub struct Cli {
    dht: Dht,
    republishing: Vec<RepublishHandle>,
}

impl Cli {
    pub fn new(dht: Dht) -> Self {
        Self {
            dht,
            republishing: Vec::new(),
        }
    }

    pub fn dht(&self) -> &Dht {
        &self.dht
    }

    /// Parse and execute a line, returns the reply to print.
    pub async fn execute_line(&mut self, line: &str) -> String {
        match line.parse::<Command>() {
            Ok(command) => self.execute(command).await,
            Err(error) => error.to_string(),
        }
    }

    pub async fn execute(&mut self, command: Command) -> String {
        let dht = self.dht.clone();

        match command {
            Command::Quit => "OK: bye".to_string(),
            Command::Whoami => format!("OK: {}", dht.id()),
            Command::PrintContact(id) => match dht.find_contact(&id).await {
                Ok(contact) => format!(
                    "OK: NodeID={}\n      Host={}\n      Port={}",
                    contact.id, contact.host, contact.port
                ),
                Err(_) => "ERR: Unknown contact node ID".to_string(),
            },
            Command::Ping(target) => {
                let address = match target {
                    PingTarget::Node(id) => match dht.find_contact(&id).await {
                        Ok(contact) => contact.address(),
                        Err(_) => return "ERR: Not a valid Node ID or host:port address".to_string(),
                    },
                    PingTarget::Address(address) => match resolve(&address).await {
                        Some(address) => address,
                        None => return "ERR: Could not find the provided hostname".to_string(),
                    },
                };

                match dht.ping(address).await {
                    Ok(contact) => format!("OK: pong from {}", contact),
                    Err(error) => format!("ERR: {}", error),
                }
            }
            Command::LocalFindValue(key) => match dht.local_find_value(&key).await {
                Ok(value) => format!("OK: {}", String::from_utf8_lossy(&value)),
                Err(_) => "ERR: No Record".to_string(),
            },
            Command::Store { node, key, value } => {
                let contact = match self.contact(node).await {
                    Ok(contact) => contact,
                    Err(reply) => return reply,
                };

                match dht.store(&contact, key, value).await {
                    Ok(()) => "OK: stored".to_string(),
                    Err(error) => format!("ERR: {}", error),
                }
            }
            Command::FindNode { node, key } => {
                let contact = match self.contact(node).await {
                    Ok(contact) => contact,
                    Err(reply) => return reply,
                };

                match dht.find_node(&contact, key).await {
                    Ok(contacts) => format!("OK: {}", render_contacts(&contacts)),
                    Err(error) => format!("ERR: {}", error),
                }
            }
            Command::FindValue { node, key } => {
                let contact = match self.contact(node).await {
                    Ok(contact) => contact,
                    Err(reply) => return reply,
                };

                match dht.find_value(&contact, key).await {
                    Ok(QueryReply::Value(value)) => {
                        format!("OK: Value: {}", String::from_utf8_lossy(&value))
                    }
                    Ok(QueryReply::Nodes(contacts)) => {
                        format!("OK: Nodes: {}", render_contacts(&contacts))
                    }
                    Err(error) => format!("ERR: {}", error),
                }
            }
            Command::IterativeFindNode(id) => {
                let contacts = dht.iterative_find_node(id).await;
                format!("OK: {}", render_contacts(&contacts))
            }
            Command::IterativeStore { key, value } => {
                let stored = dht.iterative_store(key, value).await;

                if stored.is_empty() {
                    "ERR: No node acknowledged the store".to_string()
                } else {
                    format!("OK: stored at {}", render_contacts(&stored))
                }
            }
            Command::IterativeFindValue(key) => match dht.iterative_find_value(key).await {
                Ok(value) => format!("OK: Value: {}", String::from_utf8_lossy(&value)),
                Err(error) => format!("ERR: {}", error),
            },
            Command::Vanish {
                vdo_id,
                data,
                number_of_shares,
                threshold,
                epochs,
            } => match dht
                .vanish_data(vdo_id, &data, number_of_shares, threshold, epochs)
                .await
            {
                Ok((_, handle)) => {
                    self.republishing.retain(|republish| !republish.is_finished());
                    self.republishing.extend(handle);
                    format!("OK: vanished {}", vdo_id)
                }
                Err(error) => format!("ERR: {}", error),
            },
            Command::Unvanish { node, vdo_id } => {
                let contact = match self.contact(node).await {
                    Ok(contact) => contact,
                    Err(reply) => return reply,
                };

                match dht.unvanish_data(&contact, vdo_id).await {
                    Ok(data) => format!("OK: {}", String::from_utf8_lossy(&data)),
                    Err(error) => format!("ERR: {}", error),
                }
            }
        }
    }

    async fn contact(&self, node: Id) -> Result<Contact, String> {
        self.dht
            .find_contact(&node)
            .await
            .map_err(|_| format!("ERR: Unable to find contact with node ID ({})", node))
    }
}

fn parse_id(value: &str, kind: &'static str) -> Result<Id, ParseError> {
    Id::from_str(value).map_err(|_| ParseError::Invalid {
        kind,
        value: value.to_string(),
    })
}

fn parse_number<T: FromStr>(value: &str, kind: &'static str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::Invalid {
        kind,
        value: value.to_string(),
    })
}

fn parse_ping_target(value: &str) -> Result<PingTarget, ParseError> {
    if let Ok(id) = Id::from_str(value) {
        return Ok(PingTarget::Node(id));
    }

    match value.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            Ok(PingTarget::Address(value.to_string()))
        }
        _ => Err(ParseError::Invalid {
            kind: "node ID or host:port address",
            value: value.to_string(),
        }),
    }
}

async fn resolve(address: &str) -> Option<SocketAddr> {
    let mut addresses: Vec<SocketAddr> = tokio::net::lookup_host(address).await.ok()?.collect();
    // Prefer IPv4, like most nodes listen on.
    addresses.sort_by_key(|address| !address.is_ipv4());

    addresses.into_iter().next()
}

fn render_contacts(contacts: &[Contact]) -> String {
    if contacts.is_empty() {
        return "No Record".to_string();
    }

    let mut out = String::new();

    for contact in contacts {
        let _ = write!(out, "\n{}", contact);
    }

    out
}

#[cfg(test)]
mod test {
    use super::*;

    const ID: &str = "5a3ce9c14e7a08645677bbd1cfe7d8f956d53256";

    #[test]
    fn parse_commands() {
        let id = Id::from_str(ID).unwrap();

        assert_eq!("quit".parse(), Ok(Command::Quit));
        assert_eq!("  whoami  ".parse(), Ok(Command::Whoami));
        assert_eq!(
            format!("find_node {ID} {ID}").parse(),
            Ok(Command::FindNode { node: id, key: id })
        );
        assert_eq!(
            format!("iterativeStore {ID} hello").parse(),
            Ok(Command::IterativeStore {
                key: id,
                value: Bytes::from_static(b"hello")
            })
        );
        assert_eq!(
            format!("vanish {ID} secret 20 10").parse(),
            Ok(Command::Vanish {
                vdo_id: id,
                data: Bytes::from_static(b"secret"),
                number_of_shares: 20,
                threshold: 10,
                epochs: 0,
            })
        );
    }

    #[test]
    fn parse_ping_targets() {
        assert_eq!(
            format!("ping {ID}").parse(),
            Ok(Command::Ping(PingTarget::Node(Id::from_str(ID).unwrap())))
        );
        assert_eq!(
            "ping localhost:7890".parse(),
            Ok(Command::Ping(PingTarget::Address("localhost:7890".to_string())))
        );
        assert!(matches!(
            "ping localhost".parse::<Command>(),
            Err(ParseError::Invalid { .. })
        ));
    }

    #[test]
    fn wrong_argument_count_is_usage() {
        assert_eq!(
            "store abc".parse::<Command>(),
            Err(ParseError::Usage("store [nodeID] [key] [value]"))
        );
        assert_eq!(
            "whoami extra".parse::<Command>(),
            Err(ParseError::Usage("whoami"))
        );
        assert_eq!(
            "usage: print_contact [nodeID]",
            "print_contact".parse::<Command>().unwrap_err().to_string()
        );
    }

    #[test]
    fn invalid_ids_are_rejected() {
        let error = "iterativeFindValue xyz".parse::<Command>().unwrap_err();

        assert_eq!(error.to_string(), "ERR: Provided an invalid key (xyz)");
    }

    #[test]
    fn invalid_vanish_parameters() {
        assert!(format!("vanish {ID} data 5 6").parse::<Command>().is_err());
        assert!(format!("vanish {ID} data 5 0").parse::<Command>().is_err());
        assert!(format!("vanish {ID} data 300 6").parse::<Command>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn finished_republishes_are_released() {
        let interval = std::time::Duration::from_secs(60 * 60);
        let testnet =
            crate::Testnet::with_builder(4, || Dht::builder().republish_interval(interval))
                .await
                .unwrap();

        let mut cli = Cli::new(testnet.nodes[0].clone());

        let reply = cli.execute_line(&format!("vanish {ID} first 3 2 1")).await;
        assert!(reply.starts_with("OK:"), "{reply}");
        assert_eq!(cli.republishing.len(), 1);

        tokio::time::sleep(interval + std::time::Duration::from_secs(1)).await;
        assert!(cli.republishing[0].is_finished());

        let reply = cli.execute_line(&format!("vanish {ID} second 3 2 2")).await;
        assert!(reply.starts_with("OK:"), "{reply}");
        assert_eq!(cli.republishing.len(), 1);
        assert_eq!(cli.republishing[0].remaining_epochs(), 2);
    }

    #[test]
    fn unknown_command() {
        assert_eq!("launch".parse::<Command>(), Err(ParseError::Unknown));
        assert_eq!("".parse::<Command>(), Err(ParseError::Unknown));
    }
}
