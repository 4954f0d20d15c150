//! Eight hour epochs aligned to the local day, and the share locations they select.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Timelike};
use sha1_smol::Sha1;

use crate::common::Id;

/// Length of an epoch in hours, three epochs per day starting at midnight.
pub const EPOCH_HOURS: u32 = 8;

/// Start of the epoch `offset` epochs away from the one containing `now`, as a unix timestamp.
pub fn epoch_start<Tz: TimeZone>(now: &DateTime<Tz>, offset: i64) -> i64 {
    let local = now.naive_local();
    let hour = local.hour() - local.hour() % EPOCH_HOURS;

    let start = local
        .date()
        .and_hms_opt(hour, 0, 0)
        .unwrap_or(local)
        + Duration::hours(offset * EPOCH_HOURS as i64);

    resolve(&now.timezone(), &start)
}

/// Starts of the current, previous and next epochs, in the order they are searched.
pub fn search_epochs<Tz: TimeZone>(now: &DateTime<Tz>) -> [i64; 3] {
    [epoch_start(now, 0), epoch_start(now, -1), epoch_start(now, 1)]
}

/// The `count` locations of an access key's shares during the epoch starting at `epoch_start`.
///
/// `seed = SHA1(access_key || epoch_start)` and `location_i = SHA1(seed || i)`.
pub fn share_locations(access_key: u64, epoch_start: i64, count: u8) -> Vec<Id> {
    let mut hasher = Sha1::new();
    hasher.update(&access_key.to_be_bytes());
    hasher.update(&epoch_start.to_be_bytes());
    let seed = hasher.digest().bytes();

    (0..count)
        .map(|i| {
            let mut hasher = Sha1::new();
            hasher.update(&seed);
            hasher.update(&[i]);

            Id(hasher.digest().bytes())
        })
        .collect()
}

/// Local wall time to a timestamp, skipped local times (daylight saving gaps) are read as UTC.
fn resolve<Tz: TimeZone>(tz: &Tz, local: &NaiveDateTime) -> i64 {
    match tz.from_local_datetime(local).earliest() {
        Some(time) => time.timestamp(),
        None => tz.from_utc_datetime(local).timestamp(),
    }
}

#[cfg(test)]
mod test {
    use chrono::{FixedOffset, Utc};

    use super::*;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, hour, minute, 0).unwrap()
    }

    #[test]
    fn aligned_to_day() {
        assert_eq!(epoch_start(&at(0, 0), 0), at(0, 0).timestamp());
        assert_eq!(epoch_start(&at(7, 59), 0), at(0, 0).timestamp());
        assert_eq!(epoch_start(&at(8, 0), 0), at(8, 0).timestamp());
        assert_eq!(epoch_start(&at(23, 30), 0), at(16, 0).timestamp());
    }

    #[test]
    fn neighbours_cross_days() {
        let now = at(3, 0);

        assert_eq!(
            epoch_start(&now, -1),
            Utc.with_ymd_and_hms(2024, 3, 9, 16, 0, 0).unwrap().timestamp()
        );
        assert_eq!(epoch_start(&now, 1), at(8, 0).timestamp());

        assert_eq!(
            search_epochs(&now),
            [
                at(0, 0).timestamp(),
                at(0, 0).timestamp() - 8 * 3600,
                at(8, 0).timestamp()
            ]
        );
    }

    #[test]
    fn follows_local_midnight() {
        let tz = FixedOffset::east_opt(5 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 3, 10, 1, 0, 0).unwrap();

        // Local midnight is 19:00 UTC the day before.
        assert_eq!(
            epoch_start(&now, 0),
            Utc.with_ymd_and_hms(2024, 3, 9, 19, 0, 0).unwrap().timestamp()
        );
    }

    #[test]
    fn locations() {
        let a = share_locations(42, 1_700_000_000, 20);

        assert_eq!(a.len(), 20);
        assert_eq!(a, share_locations(42, 1_700_000_000, 20));
        assert_ne!(a, share_locations(43, 1_700_000_000, 20));
        assert_ne!(a, share_locations(42, 1_700_028_800, 20));
        assert_ne!(a[0], a[1]);
    }
}
