// 缓存模块
// 路径附近用户查询的短时结果缓存，以及可替换的时钟

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};

use crate::geo::NearbyUser;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 手动推进的时钟，测试和回放时使用
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// 半径按位存储，f64 本身不能做 HashMap 的键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    path_id: String,
    radius_bits: u64,
}

impl CacheKey {
    fn new(path_id: &str, radius: f64) -> Self {
        Self {
            path_id: path_id.to_string(),
            radius_bits: radius.to_bits(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    users: Vec<NearbyUser>,
    stored_at: DateTime<Utc>,
}

/// 按 (路径ID, 半径) 缓存附近用户查询结果
///
/// 过期在读取时惰性检查，不需要后台清理任务。任何用户位置更新都会调用
/// [`PathResultCache::invalidate_all`]。
pub struct PathResultCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl PathResultCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, path_id: &str, radius: f64) -> Option<Vec<NearbyUser>> {
        let key = CacheKey::new(path_id, radius);
        let now = self.clock.now();
        let mut entries = self.entries();

        match entries.get(&key) {
            Some(entry) if now - entry.stored_at < self.ttl => {
                tracing::debug!("Path cache hit: {}:{}", path_id, radius);
                Some(entry.users.clone())
            }
            Some(_) => {
                entries.remove(&key);
                tracing::debug!("Path cache expired: {}:{}", path_id, radius);
                None
            }
            None => None,
        }
    }

    /// 写入时顺带清掉已过期的条目，避免不同半径的轮询让缓存一直增长
    pub fn put(&self, path_id: &str, radius: f64, users: Vec<NearbyUser>) {
        let now = self.clock.now();
        let mut entries = self.entries();

        let before = entries.len();
        entries.retain(|_, entry| now - entry.stored_at < self.ttl);
        if entries.len() < before {
            tracing::debug!("Path cache dropped {} expired entries", before - entries.len());
        }

        entries.insert(
            CacheKey::new(path_id, radius),
            CacheEntry {
                users,
                stored_at: now,
            },
        );
        tracing::debug!("Path cache set: {}:{}", path_id, radius);
    }

    pub fn invalidate_all(&self) {
        let mut entries = self.entries();
        if !entries.is_empty() {
            tracing::debug!("Path cache cleared ({} entries)", entries.len());
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::TrackedUser;
    use crate::geo::Point;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
    }

    fn users(at: DateTime<Utc>) -> Vec<NearbyUser> {
        vec![NearbyUser {
            user: TrackedUser {
                id: "u1".into(),
                display_name: "小王".into(),
                position: Point::new(31.2304, 121.4737).unwrap(),
                last_seen_at: at,
            },
            distance_meters: 42.5,
        }]
    }

    fn cache() -> (Arc<ManualClock>, PathResultCache) {
        let clock = Arc::new(ManualClock::new(start()));
        let cache = PathResultCache::new(Duration::seconds(5), clock.clone());
        (clock, cache)
    }

    #[test]
    fn serves_identical_result_within_ttl() {
        let (clock, cache) = cache();
        cache.put("p1", 500.0, users(start()));

        clock.advance(Duration::milliseconds(4999));
        let cached = cache.get("p1", 500.0).unwrap();
        assert_eq!(
            serde_json::to_vec(&cached).unwrap(),
            serde_json::to_vec(&users(start())).unwrap()
        );
    }

    #[test]
    fn expires_at_ttl() {
        let (clock, cache) = cache();
        cache.put("p1", 500.0, users(start()));

        clock.advance(Duration::seconds(5));
        assert!(cache.get("p1", 500.0).is_none());
        assert!(cache.is_empty(), "expired entry should be dropped on read");
    }

    #[test]
    fn key_includes_radius() {
        let (_, cache) = cache();
        cache.put("p1", 500.0, users(start()));
        assert!(cache.get("p1", 500.0).is_some());
        assert!(cache.get("p1", 200.0).is_none());
        assert!(cache.get("p2", 500.0).is_none());
    }

    #[test]
    fn invalidate_all_drops_everything() {
        let (_, cache) = cache();
        cache.put("p1", 500.0, users(start()));
        cache.put("p2", 100.0, Vec::new());
        assert_eq!(cache.len(), 2);

        cache.invalidate_all();
        assert!(cache.get("p1", 500.0).is_none());
        assert!(cache.get("p2", 100.0).is_none());
    }

    #[test]
    fn put_refreshes_stored_time() {
        let (clock, cache) = cache();
        cache.put("p1", 500.0, users(start()));
        clock.advance(Duration::seconds(4));
        cache.put("p1", 500.0, Vec::new());
        clock.advance(Duration::seconds(4));
        assert_eq!(cache.get("p1", 500.0), Some(Vec::new()));
    }

    #[test]
    fn put_drops_expired_entries_for_other_keys() {
        let (clock, cache) = cache();
        for radius in [100.0, 200.0, 300.0] {
            cache.put("p1", radius, Vec::new());
        }
        clock.advance(Duration::seconds(3));
        cache.put("p1", 400.0, Vec::new());
        assert_eq!(cache.len(), 4);

        clock.advance(Duration::seconds(2));
        cache.put("p2", 500.0, Vec::new());
        assert_eq!(cache.len(), 2, "entries older than ttl should be gone");
        assert!(cache.get("p1", 100.0).is_none());
        assert!(cache.get("p1", 400.0).is_some());
    }

    #[test]
    fn concurrent_access_is_safe() {
        let (_, cache) = cache();
        let cache = Arc::new(cache);
        let handles = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for j in 0..100 {
                        let id = format!("p{}", (i + j) % 10);
                        cache.put(&id, 500.0, Vec::new());
                        let _ = cache.get(&id, 500.0);
                        if j % 25 == 0 {
                            cache.invalidate_all();
                        }
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 10);
    }
}
