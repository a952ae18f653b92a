//! Captured frames awaiting a username before they are registered.
//!
//! Entries are keyed by a capture-time token, bounded in number (oldest
//! evicted first) and expire after a fixed time to live.

use chrono::{DateTime, Local};
use image::RgbImage;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

const TOKEN_FORMAT: &str = "%Y%m%d%H%M%S%6f";

struct Entry {
    id: String,
    image: RgbImage,
    created: Instant,
}

pub struct SnapshotStore {
    entries: Mutex<VecDeque<Entry>>,
    ttl: Duration,
    capacity: usize,
}

impl SnapshotStore {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Store a frame and return its token.
    pub fn insert(&self, image: RgbImage) -> String {
        self.insert_at(image, Local::now(), Instant::now())
    }

    /// Copy of the frame for `id`, if it is still held.
    pub fn get(&self, id: &str) -> Option<RgbImage> {
        self.get_at(id, Instant::now())
    }

    /// Remove and return the frame for `id`.
    pub fn take(&self, id: &str) -> Option<RgbImage> {
        self.take_at(id, Instant::now())
    }

    /// Number of snapshots still awaiting confirmation.
    pub fn len(&self) -> usize {
        self.len_at(Instant::now())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn insert_at(&self, image: RgbImage, wall: DateTime<Local>, now: Instant) -> String {
        let mut entries = self.lock();
        self.purge_expired(&mut entries, now);

        let base = wall.format(TOKEN_FORMAT).to_string();
        let mut id = base.clone();
        let mut suffix = 1;
        while entries.iter().any(|e| e.id == id) {
            id = format!("{base}-{suffix}");
            suffix += 1;
        }

        while entries.len() >= self.capacity {
            if let Some(evicted) = entries.pop_front() {
                tracing::debug!(id = %evicted.id, "snapshot evicted (capacity)");
            }
        }
        entries.push_back(Entry {
            id: id.clone(),
            image,
            created: now,
        });
        tracing::debug!(id = %id, pending = entries.len(), "snapshot stored");
        id
    }

    fn len_at(&self, now: Instant) -> usize {
        let mut entries = self.lock();
        self.purge_expired(&mut entries, now);
        entries.len()
    }

    fn get_at(&self, id: &str, now: Instant) -> Option<RgbImage> {
        let mut entries = self.lock();
        self.purge_expired(&mut entries, now);
        entries.iter().find(|e| e.id == id).map(|e| e.image.clone())
    }

    fn take_at(&self, id: &str, now: Instant) -> Option<RgbImage> {
        let mut entries = self.lock();
        self.purge_expired(&mut entries, now);
        let pos = entries.iter().position(|e| e.id == id)?;
        entries.remove(pos).map(|e| e.image)
    }

    fn purge_expired(&self, entries: &mut VecDeque<Entry>, now: Instant) {
        let ttl = self.ttl;
        entries.retain(|e| {
            let alive = now.saturating_duration_since(e.created) < ttl;
            if !alive {
                tracing::debug!(id = %e.id, "snapshot expired");
            }
            alive
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::Rgb;

    fn img(v: u8) -> RgbImage {
        RgbImage::from_pixel(2, 2, Rgb([v, v, v]))
    }

    fn wall() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap()
    }

    #[test]
    fn test_token_format() {
        let store = SnapshotStore::new(Duration::from_secs(60), 4);
        let id = store.insert_at(img(1), wall(), Instant::now());
        assert_eq!(id, "20240305140709000000");
    }

    #[test]
    fn test_same_instant_tokens_are_distinct() {
        let store = SnapshotStore::new(Duration::from_secs(60), 4);
        let now = Instant::now();
        let a = store.insert_at(img(1), wall(), now);
        let b = store.insert_at(img(2), wall(), now);
        let c = store.insert_at(img(3), wall(), now);
        assert_eq!(b, format!("{a}-1"));
        assert_eq!(c, format!("{a}-2"));
        assert_eq!(store.get_at(&b, now).unwrap().get_pixel(0, 0).0, [2, 2, 2]);
    }

    #[test]
    fn test_get_keeps_take_removes() {
        let store = SnapshotStore::new(Duration::from_secs(60), 4);
        let id = store.insert(img(7));
        assert!(store.get(&id).is_some());
        assert!(store.get(&id).is_some());
        assert_eq!(store.take(&id).unwrap().get_pixel(1, 1).0, [7, 7, 7]);
        assert!(store.take(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let store = SnapshotStore::new(Duration::from_secs(60), 2);
        let now = Instant::now();
        let first = store.insert_at(img(1), wall(), now);
        let second = store.insert_at(img(2), wall() + chrono::Duration::seconds(1), now);
        let third = store.insert_at(img(3), wall() + chrono::Duration::seconds(2), now);
        assert_eq!(store.len(), 2);
        assert!(store.get_at(&first, now).is_none());
        assert!(store.get_at(&second, now).is_some());
        assert!(store.get_at(&third, now).is_some());
    }

    #[test]
    fn test_expired_entries_vanish() {
        let store = SnapshotStore::new(Duration::from_secs(10), 4);
        let start = Instant::now();
        let id = store.insert_at(img(1), wall(), start);
        assert!(store.get_at(&id, start + Duration::from_secs(9)).is_some());
        assert!(store.take_at(&id, start + Duration::from_secs(11)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_len_excludes_expired() {
        let store = SnapshotStore::new(Duration::from_secs(10), 4);
        let start = Instant::now();
        store.insert_at(img(1), wall(), start);
        store.insert_at(img(2), wall(), start + Duration::from_secs(5));
        assert_eq!(store.len_at(start + Duration::from_secs(9)), 2);
        assert_eq!(store.len_at(start + Duration::from_secs(11)), 1);
        assert_eq!(store.len_at(start + Duration::from_secs(16)), 0);
    }

    #[test]
    fn test_len_after_real_expiry() {
        let store = SnapshotStore::new(Duration::from_millis(1), 4);
        store.insert(img(1));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_unknown_id() {
        let store = SnapshotStore::new(Duration::from_secs(10), 4);
        assert!(store.get("20000101000000000000").is_none());
    }
}
