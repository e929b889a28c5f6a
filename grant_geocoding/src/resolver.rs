//! Turning place names into coordinates, with a per-run cache.
//!
//! The cache is created by the caller at the start of a run and handed to the
//! resolver by reference. Every distinct query reaches the geocoding backend
//! once per run at most: not-found answers and exhausted retries are cached too.

use log::{debug, warn};
use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::*;

/// A geocoding backend.
pub trait Geocoder {
    /// Short name of the backend, for the logs.
    fn name(&self) -> &str;

    /// Looks up a free-form query. `Ok(None)` means that the backend has no match.
    fn lookup(&self, query: &str) -> Result<Option<GeocodeResult>, LookupError>;
}

/// The query → result memo of one run.
#[derive(Debug, Default)]
pub struct GeocodeCache {
    entries: HashMap<String, Lookup>,
}

impl GeocodeCache {
    pub fn new() -> GeocodeCache {
        GeocodeCache::default()
    }

    /// Exact string match, no further normalization.
    pub fn get(&self, query: &str) -> Option<&Lookup> {
        self.entries.get(query)
    }

    pub fn insert(&mut self, query: String, lookup: Lookup) {
        self.entries.insert(query, lookup);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Enforces a minimum delay between two consecutive requests.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> RateLimiter {
        RateLimiter {
            min_interval,
            last: None,
        }
    }

    /// Blocks until a new request is allowed, and records it.
    pub fn wait(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                thread::sleep(self.min_interval - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ResolverPolicy {
    /// Attempts per query when the backend fails transiently. At least 1.
    pub max_attempts: u32,
    /// Minimum delay between two requests to the backend, across all queries.
    pub min_interval: Duration,
    /// On a miss, try again with the looser "<name> <state>" query.
    pub loose_fallback: bool,
}

impl ResolverPolicy {
    pub const DEFAULT_POLICY: ResolverPolicy = ResolverPolicy {
        max_attempts: 3,
        min_interval: Duration::from_millis(1100),
        loose_fallback: false,
    };
}

/// The query built for a place: "<place>, <state>, Brasil".
pub fn build_query(search_target: &str, state_code: &str) -> String {
    format!("{}, {}, Brasil", search_target, state_code)
}

/// The second-chance query: "<place> <state>".
pub fn loose_query(search_target: &str, state_code: &str) -> String {
    format!("{} {}", search_target, state_code)
}

/// The answer for a place, and the last query sent to get it.
#[derive(PartialEq, Debug, Clone)]
pub struct Resolution {
    pub query: String,
    pub lookup: Lookup,
}

pub struct Resolver<'a, G: Geocoder + ?Sized> {
    geocoder: &'a G,
    cache: &'a mut GeocodeCache,
    limiter: RateLimiter,
    policy: ResolverPolicy,
    requests: usize,
}

impl<'a, G: Geocoder + ?Sized> Resolver<'a, G> {
    pub fn new(geocoder: &'a G, cache: &'a mut GeocodeCache, policy: ResolverPolicy) -> Self {
        Resolver {
            geocoder,
            cache,
            limiter: RateLimiter::new(policy.min_interval),
            policy,
            requests: 0,
        }
    }

    /// Number of requests sent to the backend so far, retries included.
    pub fn requests(&self) -> usize {
        self.requests
    }

    pub fn resolve(&mut self, search_target: &str, state_code: &str) -> Resolution {
        let query = build_query(search_target, state_code);
        let lookup = self.lookup_cached(&query);
        if lookup != Lookup::NotFound || !self.policy.loose_fallback {
            return Resolution { query, lookup };
        }
        let loose = loose_query(search_target, state_code);
        debug!("resolve: {:?} not found, trying {:?}", query, loose);
        let lookup = self.lookup_cached(&loose);
        Resolution {
            query: loose,
            lookup,
        }
    }

    fn lookup_cached(&mut self, query: &str) -> Lookup {
        if let Some(hit) = self.cache.get(query) {
            debug!("lookup_cached: cache hit for {:?}: {:?}", query, hit);
            return hit.clone();
        }
        let res = self.lookup_with_retries(query);
        self.cache.insert(query.to_string(), res.clone());
        res
    }

    fn lookup_with_retries(&mut self, query: &str) -> Lookup {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = String::new();
        for attempt in 1..=max_attempts {
            self.limiter.wait();
            self.requests += 1;
            match self.geocoder.lookup(query) {
                Ok(Some(res)) => return Lookup::Found(res),
                Ok(None) => return Lookup::NotFound,
                Err(LookupError::Transient(msg)) => {
                    warn!(
                        "lookup: {} failed on {:?} (attempt {}/{}): {}",
                        self.geocoder.name(),
                        query,
                        attempt,
                        max_attempts,
                        msg
                    );
                    last_error = msg;
                }
                Err(LookupError::Rejected(msg)) => {
                    warn!(
                        "lookup: {} rejected {:?}: {}",
                        self.geocoder.name(),
                        query,
                        msg
                    );
                    return Lookup::Failed(msg);
                }
            }
        }
        Lookup::Failed(last_error)
    }
}

/// An in-memory backend for the tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    pub struct FakeGeocoder {
        pub places: HashMap<String, GeocodeResult>,
        /// Number of transient failures left before a query succeeds.
        pub failures: RefCell<HashMap<String, u32>>,
        pub rejected: Vec<String>,
        pub calls: RefCell<Vec<String>>,
    }

    impl FakeGeocoder {
        pub fn with_place(mut self, query: &str, latitude: f64, longitude: f64) -> Self {
            self.places.insert(
                query.to_string(),
                GeocodeResult {
                    latitude,
                    longitude,
                    display_address: Some(format!("{} (address)", query)),
                },
            );
            self
        }

        pub fn failing(self, query: &str, times: u32) -> Self {
            self.failures.borrow_mut().insert(query.to_string(), times);
            self
        }

        pub fn calls_for(&self, query: &str) -> usize {
            self.calls.borrow().iter().filter(|q| *q == query).count()
        }
    }

    impl Geocoder for FakeGeocoder {
        fn name(&self) -> &str {
            "fake"
        }

        fn lookup(&self, query: &str) -> Result<Option<GeocodeResult>, LookupError> {
            self.calls.borrow_mut().push(query.to_string());
            if self.rejected.iter().any(|q| q == query) {
                return Err(LookupError::Rejected("forbidden".to_string()));
            }
            if let Some(left) = self.failures.borrow_mut().get_mut(query) {
                if *left > 0 {
                    *left -= 1;
                    return Err(LookupError::Transient("timeout".to_string()));
                }
            }
            Ok(self.places.get(query).cloned())
        }
    }

    pub fn fast_policy() -> ResolverPolicy {
        ResolverPolicy {
            min_interval: Duration::ZERO,
            ..ResolverPolicy::DEFAULT_POLICY
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn repeated_queries_hit_the_cache() {
        let geocoder = FakeGeocoder::default().with_place("SALVADOR, BA, Brasil", -12.97, -38.5);
        let mut cache = GeocodeCache::new();
        let mut resolver = Resolver::new(&geocoder, &mut cache, fast_policy());
        let first = resolver.resolve("SALVADOR", "BA");
        let second = resolver.resolve("SALVADOR", "BA");
        assert_eq!(first, second);
        assert!(matches!(first.lookup, Lookup::Found(_)));
        assert_eq!(first.query, "SALVADOR, BA, Brasil");
        assert_eq!(resolver.requests(), 1);
        assert_eq!(geocoder.calls_for("SALVADOR, BA, Brasil"), 1);
    }

    #[test]
    fn not_found_is_cached() {
        let geocoder = FakeGeocoder::default();
        let mut cache = GeocodeCache::new();
        {
            let mut resolver = Resolver::new(&geocoder, &mut cache, fast_policy());
            for _ in 0..3 {
                assert_eq!(resolver.resolve("ATLANTIS", "AM").lookup, Lookup::NotFound);
            }
        }
        assert_eq!(geocoder.calls.borrow().len(), 1);
        assert_eq!(cache.get("ATLANTIS, AM, Brasil"), Some(&Lookup::NotFound));
    }

    #[test]
    fn transient_failures_are_retried() {
        let geocoder = FakeGeocoder::default()
            .with_place("LAGES, SC, Brasil", -27.8, -50.3)
            .failing("LAGES, SC, Brasil", 2);
        let mut cache = GeocodeCache::new();
        let mut resolver = Resolver::new(&geocoder, &mut cache, fast_policy());
        let res = resolver.resolve("LAGES", "SC");
        assert!(matches!(res.lookup, Lookup::Found(_)));
        assert_eq!(resolver.requests(), 3);
    }

    #[test]
    fn exhausted_retries_fail_once() {
        let geocoder = FakeGeocoder::default()
            .with_place("LAGES, SC, Brasil", -27.8, -50.3)
            .failing("LAGES, SC, Brasil", 10);
        let mut cache = GeocodeCache::new();
        let mut resolver = Resolver::new(&geocoder, &mut cache, fast_policy());
        let res = resolver.resolve("LAGES", "SC");
        assert_eq!(res.lookup, Lookup::Failed("timeout".to_string()));
        let again = resolver.resolve("LAGES", "SC");
        assert_eq!(again.lookup, Lookup::Failed("timeout".to_string()));
        assert_eq!(resolver.requests(), 3);
    }

    #[test]
    fn rejected_requests_are_not_retried() {
        let geocoder = FakeGeocoder {
            rejected: vec!["X, SP, Brasil".to_string()],
            ..FakeGeocoder::default()
        };
        let mut cache = GeocodeCache::new();
        let mut resolver = Resolver::new(&geocoder, &mut cache, fast_policy());
        let res = resolver.resolve("X", "SP");
        assert_eq!(res.lookup, Lookup::Failed("forbidden".to_string()));
        assert_eq!(resolver.requests(), 1);
    }

    #[test]
    fn loose_fallback() {
        let geocoder = FakeGeocoder::default().with_place("SEDE NOVA RS", -29.0, -51.0);
        let mut cache = GeocodeCache::new();
        let policy = ResolverPolicy {
            loose_fallback: true,
            ..fast_policy()
        };
        let mut resolver = Resolver::new(&geocoder, &mut cache, policy);
        let res = resolver.resolve("SEDE NOVA", "RS");
        assert_eq!(res.query, "SEDE NOVA RS");
        assert!(matches!(res.lookup, Lookup::Found(_)));
        assert_eq!(geocoder.calls.borrow().len(), 2);
    }

    #[test]
    fn rate_limiter_spaces_requests() {
        let mut limiter = RateLimiter::new(Duration::from_millis(30));
        let start = Instant::now();
        limiter.wait();
        limiter.wait();
        limiter.wait();
        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
