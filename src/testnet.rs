//! In-process network of nodes for tests and simulations.

use std::net::SocketAddr;

use futures::future::join_all;

use crate::rpc::MemoryNetwork;
use crate::{Dht, DhtBuilder, Result};

#[derive(Debug)]
/// A set of nodes on a [MemoryNetwork], all bootstrapped through the first one.
pub struct Testnet {
    pub network: MemoryNetwork,
    pub nodes: Vec<Dht>,
    /// Address of the first node, to bootstrap more nodes from.
    pub bootstrap: SocketAddr,
}

impl Testnet {
    /// Create a testnet of `count` nodes with default settings.
    pub async fn new(count: usize) -> Result<Testnet> {
        Self::with_builder(count, Dht::builder).await
    }

    /// Create a testnet of `count` nodes, each configured by `builder`.
    ///
    /// Nodes join one at a time, so every lookup sees the nodes before it.
    pub async fn with_builder<F>(count: usize, builder: F) -> Result<Testnet>
    where
        F: Fn() -> DhtBuilder,
    {
        let network = MemoryNetwork::new();

        let first = builder().build(network.transport());
        let bootstrap = first.local_addr();

        let mut nodes = vec![first];

        for _ in 1..count {
            let node = builder().build(network.transport());
            node.bootstrap(bootstrap).await?;

            nodes.push(node);
        }

        Ok(Testnet {
            network,
            nodes,
            bootstrap,
        })
    }

    /// A new node on the same network, already bootstrapped.
    pub async fn join(&mut self, builder: DhtBuilder) -> Result<Dht> {
        let node = builder.build(self.network.transport());
        node.bootstrap(self.bootstrap).await?;

        self.nodes.push(node.clone());

        Ok(node)
    }

    /// Have every node look itself up again, filling routing tables with nodes
    /// that joined after it.
    pub async fn refresh(&self) {
        join_all(
            self.nodes
                .iter()
                .map(|node| node.iterative_find_node(*node.id())),
        )
        .await;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn every_node_knows_the_bootstrap() {
        let testnet = Testnet::new(5).await.unwrap();

        assert_eq!(testnet.nodes.len(), 5);

        let first = &testnet.nodes[0];

        for node in &testnet.nodes[1..] {
            assert_eq!(node.find_contact(first.id()).await.unwrap(), *first.contact());
        }

        assert_eq!(first.routing_table_size().await, 4);
    }
}
