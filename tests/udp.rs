//! Nodes talking over real UDP sockets on localhost.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use vanishing_dht::{rpc::UdpTransport, Bytes, Dht, Error, Id};

async fn node() -> Dht {
    let transport = UdpTransport::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await
        .unwrap();

    Dht::builder()
        .request_timeout(Duration::from_millis(300))
        .build(transport)
}

#[tokio::test]
async fn ping_and_store() {
    let a = node().await;
    let b = node().await;

    assert_ne!(a.local_addr().port(), 0);

    let contact = a.ping(b.local_addr()).await.unwrap();
    assert_eq!(&contact, b.contact());
    assert_eq!(b.find_contact(a.id()).await.unwrap(), *a.contact());

    let key = Id::hash(b"udp");
    let value = Bytes::from_static(b"over the wire");

    a.store(b.contact(), key, value.clone()).await.unwrap();
    assert_eq!(b.local_find_value(&key).await.unwrap(), value);

    let c = node().await;
    c.ping(b.local_addr()).await.unwrap();

    let contacts = a.find_node(b.contact(), *c.id()).await.unwrap();
    assert!(contacts.contains(c.contact()));
}

#[tokio::test]
async fn vanish_over_udp() {
    let bootstrap = node().await;

    let mut nodes = Vec::new();
    for _ in 0..8 {
        let dht = node().await;
        dht.bootstrap(bootstrap.local_addr()).await.unwrap();
        nodes.push(dht);
    }

    let (vdo, _) = nodes[0].vanish(b"short lived", 8, 4, 0).await.unwrap();

    assert_eq!(nodes[7].unvanish(&vdo).await.unwrap(), b"short lived");
}

#[tokio::test]
async fn silent_address_times_out() {
    let a = node().await;

    // Bound but never answering.
    let silent = std::net::UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();

    assert!(matches!(
        a.ping(silent.local_addr().unwrap()).await,
        Err(Error::Timeout(_))
    ));
}
