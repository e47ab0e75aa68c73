//! A cache of query results on the reviewer side.
//!
//! Entries are keyed on the name of the query and a hash of its
//! arguments. Nothing expires on its own: the owner invalidates the
//! contest and ballot touched by each command it sends.

use std::collections::HashMap;

use log::debug;

use crate::config::*;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Operation {
    QueueMetadata,
    Queue,
    FirstPendingId,
    AdjudicationContext,
    ImageView,
    ListCandidates,
    WriteInRecords,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::QueueMetadata => "queue_metadata",
            Operation::Queue => "queue",
            Operation::FirstPendingId => "first_pending_id",
            Operation::AdjudicationContext => "adjudication_context",
            Operation::ImageView => "image_view",
            Operation::ListCandidates => "list_candidates",
            Operation::WriteInRecords => "write_in_records",
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct CacheKey {
    pub operation: Operation,
    pub args_hash: String,
}

impl CacheKey {
    pub fn new(operation: Operation, args: &[Option<&str>]) -> CacheKey {
        // Absent arguments hash differently from empty strings.
        let joined: Vec<String> = args
            .iter()
            .map(|arg| match arg {
                Some(s) => format!("+{}", s),
                None => "-".to_string(),
            })
            .collect();
        let s = format!("{}({})", operation.as_str(), joined.join("\u{1f}"));
        CacheKey {
            operation,
            args_hash: sha256::digest(s.as_str()),
        }
    }
}

/// What a cached entry depends on.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum CacheScope {
    Contest(ContestId),
    Cvr(CvrId),
    /// Depends on every contest.
    Election,
    /// Never stale. Ballot image layouts do not change during a review.
    Fixed,
}

#[derive(PartialEq, Debug, Clone)]
pub enum CachedValue {
    QueueMetadata(Vec<QueueMetadata>),
    Queue(Vec<WriteInId>),
    FirstPendingId(Option<WriteInId>),
    AdjudicationContext(AdjudicationContext),
    ImageView(ImageView),
    Candidates(CandidateListing),
    WriteInRecords(Vec<WriteIn>),
}

/// Conversion between a query result and its cached form.
pub trait Cacheable: Sized + Clone {
    fn into_cached(self) -> CachedValue;
    fn from_cached(value: &CachedValue) -> Option<Self>;
}

impl Cacheable for Vec<QueueMetadata> {
    fn into_cached(self) -> CachedValue {
        CachedValue::QueueMetadata(self)
    }
    fn from_cached(value: &CachedValue) -> Option<Self> {
        match value {
            CachedValue::QueueMetadata(x) => Some(x.clone()),
            _ => None,
        }
    }
}

impl Cacheable for Vec<WriteInId> {
    fn into_cached(self) -> CachedValue {
        CachedValue::Queue(self)
    }
    fn from_cached(value: &CachedValue) -> Option<Self> {
        match value {
            CachedValue::Queue(x) => Some(x.clone()),
            _ => None,
        }
    }
}

impl Cacheable for Option<WriteInId> {
    fn into_cached(self) -> CachedValue {
        CachedValue::FirstPendingId(self)
    }
    fn from_cached(value: &CachedValue) -> Option<Self> {
        match value {
            CachedValue::FirstPendingId(x) => Some(x.clone()),
            _ => None,
        }
    }
}

impl Cacheable for AdjudicationContext {
    fn into_cached(self) -> CachedValue {
        CachedValue::AdjudicationContext(self)
    }
    fn from_cached(value: &CachedValue) -> Option<Self> {
        match value {
            CachedValue::AdjudicationContext(x) => Some(x.clone()),
            _ => None,
        }
    }
}

impl Cacheable for ImageView {
    fn into_cached(self) -> CachedValue {
        CachedValue::ImageView(self)
    }
    fn from_cached(value: &CachedValue) -> Option<Self> {
        match value {
            CachedValue::ImageView(x) => Some(x.clone()),
            _ => None,
        }
    }
}

impl Cacheable for CandidateListing {
    fn into_cached(self) -> CachedValue {
        CachedValue::Candidates(self)
    }
    fn from_cached(value: &CachedValue) -> Option<Self> {
        match value {
            CachedValue::Candidates(x) => Some(x.clone()),
            _ => None,
        }
    }
}

impl Cacheable for Vec<WriteIn> {
    fn into_cached(self) -> CachedValue {
        CachedValue::WriteInRecords(self)
    }
    fn from_cached(value: &CachedValue) -> Option<Self> {
        match value {
            CachedValue::WriteInRecords(x) => Some(x.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedValue,
    scopes: Vec<CacheScope>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryCache {
    entries: HashMap<CacheKey, CacheEntry>,
    hits: u64,
    misses: u64,
}

impl QueryCache {
    pub fn new() -> QueryCache {
        QueryCache::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// (hits, misses) since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn get<T: Cacheable>(&mut self, key: &CacheKey) -> Option<T> {
        let res = self.entries.get(key).and_then(|e| T::from_cached(&e.value));
        if res.is_some() {
            self.hits += 1;
        }
        res
    }

    pub fn insert<T: Cacheable>(&mut self, key: CacheKey, scopes: Vec<CacheScope>, value: T) {
        self.entries.insert(
            key,
            CacheEntry {
                value: value.into_cached(),
                scopes,
            },
        );
    }

    /// Returns the cached result, or runs `load` and caches what it returns.
    /// Errors are not cached.
    pub fn get_or_load<T, F>(
        &mut self,
        key: CacheKey,
        scopes: Vec<CacheScope>,
        load: F,
    ) -> AdjudicationResult<T>
    where
        T: Cacheable,
        F: FnOnce() -> AdjudicationResult<T>,
    {
        if let Some(value) = self.get::<T>(&key) {
            return Ok(value);
        }
        self.misses += 1;
        let value = load()?;
        self.insert(key, scopes, value.clone());
        Ok(value)
    }

    fn invalidate_where(&mut self, pred: impl Fn(&CacheScope) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.scopes.iter().any(&pred));
        before - self.entries.len()
    }

    /// Drops the entries depending on a contest, including the ones
    /// covering the whole election.
    pub fn invalidate_contest(&mut self, contest_id: &str) -> usize {
        let n = self.invalidate_where(|s| match s {
            CacheScope::Contest(c) => c == contest_id,
            CacheScope::Election => true,
            _ => false,
        });
        debug!("invalidate_contest: {}: {} entries dropped", contest_id, n);
        n
    }

    pub fn invalidate_cvr(&mut self, cvr_id: &str) -> usize {
        let n = self.invalidate_where(|s| matches!(s, CacheScope::Cvr(c) if c == cvr_id));
        debug!("invalidate_cvr: {}: {} entries dropped", cvr_id, n);
        n
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
