//! Micro-benchmarks of the routing table: update, closest and evict at varying
//! table sizes. Reports nanoseconds per operation.
//!
//! Run: `cargo bench --bench routing_table`

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Instant;

use vanishing_dht::{Contact, Id, Insertion, RoutingTable};

fn main() {
    println!("routing_table\n");

    bench_update();
    bench_closest();
    bench_evict();
}

fn contact() -> Contact {
    Contact::new(Id::random(), SocketAddr::from((Ipv4Addr::LOCALHOST, 7890)))
}

fn filled(size: usize) -> RoutingTable {
    let mut table = RoutingTable::new(Id::random());
    for _ in 0..size {
        table.update(contact());
    }
    table
}

fn bench_update() {
    println!("update");

    // Generated outside the timed section.
    let contacts: Vec<_> = (0..1000).map(|_| contact()).collect();

    for (label, size) in [("empty table:", 0), ("100 contacts:", 100), ("400 contacts:", 400)] {
        let mut table = filled(size);

        let start = Instant::now();
        for contact in contacts.iter().cloned() {
            table.update(contact);
        }
        let per_op = start.elapsed().as_nanos() / contacts.len() as u128;
        println!("{label:<14} {per_op}ns/op (final size: {})", table.size());
    }

    // Refreshing contacts already present.
    {
        let mut table = filled(0);
        for contact in contacts.iter().cloned() {
            table.update(contact);
        }

        let start = Instant::now();
        for contact in contacts.iter().cloned() {
            table.update(contact);
        }
        let per_op = start.elapsed().as_nanos() / contacts.len() as u128;
        println!("{:<14} {per_op}ns/op", "refresh:");
    }

    println!();
}

fn bench_closest() {
    println!("closest");

    let targets: Vec<_> = (0..1000).map(|_| Id::random()).collect();

    for size in [50, 100, 200, 400] {
        let table = filled(size);

        let start = Instant::now();
        for target in &targets {
            let _ = table.closest(target, None);
        }
        let per_op = start.elapsed().as_nanos() / targets.len() as u128;
        println!("{size:>3} contacts: {per_op}ns/op");
    }

    println!();
}

fn bench_evict() {
    println!("evict");

    let mut table = filled(0);
    let mut pending = Vec::new();

    // Keep offering until buckets fill up, remembering who was turned away.
    for _ in 0..5000 {
        let incoming = contact();
        if let Insertion::BucketFull { head } = table.update(incoming.clone()) {
            pending.push((head.id, incoming));
        }
    }

    let n = pending.len();
    let start = Instant::now();
    for (head, incoming) in pending {
        table.evict(&head, incoming);
    }
    let per_op = start.elapsed().as_nanos() / n.max(1) as u128;
    println!("{per_op}ns/op ({n} evictions)");
    println!();
}
