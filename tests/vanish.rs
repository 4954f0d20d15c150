//! Vanishing data objects across in-memory networks.

use std::time::Duration;

use chrono::Local;

use vanishing_dht::{
    vanish::{cipher, epoch, sss},
    Bytes, Dht, Error, Id, Testnet, Vdo,
};

const DATA: &[u8] = b"this message will self-destruct";

/// Store the selected shares of a freshly encrypted [DATA] for the epoch starting at
/// `epoch_start`, returns the object and its share locations.
async fn vanish_at(dht: &Dht, epoch_start: i64, keep: impl Fn(usize) -> bool) -> (Vdo, Vec<Id>) {
    let key = cipher::generate_key();
    let ciphertext = cipher::encrypt(&key, DATA);

    let shares = sss::split(&key.0, 20, 10, &mut rand::thread_rng()).unwrap();
    let access_key = rand::random::<u64>() >> 1;

    let locations = epoch::share_locations(access_key, epoch_start, 20);

    for (i, (location, share)) in locations.iter().zip(shares).enumerate() {
        if keep(i) {
            let stored = dht
                .iterative_store(*location, Bytes::from(share.to_bytes()))
                .await;
            assert!(!stored.is_empty());
        }
    }

    let vdo = Vdo {
        access_key,
        ciphertext: Bytes::from(ciphertext),
        number_of_shares: 20,
        threshold: 10,
    };

    (vdo, locations)
}

async fn vanish_partially(dht: &Dht, keep: impl Fn(usize) -> bool) -> Vdo {
    let epoch_start = epoch::epoch_start(&Local::now(), 0);

    vanish_at(dht, epoch_start, keep).await.0
}

#[tokio::test]
async fn vanish_unvanish() {
    let testnet = Testnet::new(30).await.unwrap();

    let (vdo, handle) = testnet.nodes[2].vanish(DATA, 20, 10, 0).await.unwrap();

    assert!(handle.is_none());
    assert_eq!(vdo.number_of_shares, 20);
    assert_eq!(vdo.threshold, 10);
    assert!(vdo.access_key <= i64::MAX as u64);

    let data = testnet.nodes[25].unvanish(&vdo).await.unwrap();

    assert_eq!(data, DATA);
}

#[tokio::test]
async fn any_threshold_shares_suffice() {
    let testnet = Testnet::new(30).await.unwrap();

    let vdo = vanish_partially(&testnet.nodes[0], |i| (5..15).contains(&i)).await;

    assert_eq!(testnet.nodes[11].unvanish(&vdo).await.unwrap(), DATA);
}

#[tokio::test]
async fn fewer_than_threshold_shares_fail() {
    let testnet = Testnet::new(30).await.unwrap();

    let vdo = vanish_partially(&testnet.nodes[0], |i| i % 2 == 0 && i < 18).await;

    assert!(matches!(
        testnet.nodes[11].unvanish(&vdo).await,
        Err(Error::InsufficientShares {
            found: 9,
            threshold: 10
        })
    ));
}

#[tokio::test]
async fn invalid_share_parameters() {
    let testnet = Testnet::new(3).await.unwrap();

    assert!(matches!(
        testnet.nodes[1].vanish(DATA, 5, 6, 0).await,
        Err(Error::InvalidShareParameters {
            shares: 5,
            threshold: 6
        })
    ));
    assert!(matches!(
        testnet.nodes[1].vanish(DATA, 5, 0, 0).await,
        Err(Error::InvalidShareParameters { .. })
    ));
}

#[tokio::test]
async fn vanish_data_is_served_to_others() {
    let testnet = Testnet::new(20).await.unwrap();

    let owner = &testnet.nodes[0];
    let vdo_id = Id::hash(b"vdo");

    let (vdo, _) = owner.vanish_data(vdo_id, DATA, 10, 5, 0).await.unwrap();

    let reader = &testnet.nodes[13];

    assert_eq!(
        reader.get_vdo(owner.contact(), vdo_id).await.unwrap(),
        Some(vdo)
    );
    assert_eq!(
        reader.unvanish_data(owner.contact(), vdo_id).await.unwrap(),
        DATA
    );
    assert!(matches!(
        reader.unvanish_data(owner.contact(), Id::random()).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn republish_lifecycle() {
    let interval = Duration::from_secs(60 * 60);

    let testnet = Testnet::with_builder(10, || Dht::builder().republish_interval(interval))
        .await
        .unwrap();

    let (vdo, handle) = testnet.nodes[0].vanish(DATA, 6, 3, 2).await.unwrap();
    let handle = handle.unwrap();

    assert_eq!(handle.remaining_epochs(), 2);

    tokio::time::sleep(interval + Duration::from_secs(1)).await;
    assert_eq!(handle.remaining_epochs(), 1);
    assert!(!handle.is_finished());

    tokio::time::sleep(interval).await;
    assert_eq!(handle.remaining_epochs(), 0);
    assert!(handle.is_finished());

    assert_eq!(testnet.nodes[4].unvanish(&vdo).await.unwrap(), DATA);
}

#[tokio::test(start_paused = true)]
async fn cancelled_republish_stops() {
    let interval = Duration::from_secs(60 * 60);

    let testnet = Testnet::with_builder(5, || Dht::builder().republish_interval(interval))
        .await
        .unwrap();

    let (_, handle) = testnet.nodes[1].vanish(DATA, 6, 3, 5).await.unwrap();
    let handle = handle.unwrap();

    tokio::time::sleep(interval + Duration::from_secs(1)).await;
    assert_eq!(handle.remaining_epochs(), 4);

    // Resolves only once the task has wound down.
    handle.cancel().await;
}

#[tokio::test]
async fn shares_of_neighbour_epochs_are_found() {
    let testnet = Testnet::new(25).await.unwrap();

    for offset in [-1, 1] {
        let epoch_start = epoch::epoch_start(&Local::now(), offset);
        let (vdo, _) = vanish_at(&testnet.nodes[3], epoch_start, |_| true).await;

        assert_eq!(testnet.nodes[18].unvanish(&vdo).await.unwrap(), DATA);
    }
}

#[tokio::test]
async fn stray_value_at_a_share_location_is_skipped() {
    let testnet = Testnet::new(30).await.unwrap();

    let epoch_start = epoch::epoch_start(&Local::now(), 0);
    let (vdo, locations) = vanish_at(&testnet.nodes[0], epoch_start, |i| i != 0).await;

    // Claims the index of the missing share, but is too short to be one.
    testnet.nodes[0]
        .iterative_store(locations[0], Bytes::from_static(&[1, 9, 9]))
        .await;

    assert_eq!(testnet.nodes[12].unvanish(&vdo).await.unwrap(), DATA);
}
