//! Dynamic variables: values pulled out of one query's result and fed as
//! parameters into other queries on the same datasource.
//!
//! The definitions live in the datasource config; resolved values live in a
//! [`VariableCache`] keyed by `(datasource id, variable name)`.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::core::storage::{get_doc, put_doc, DocumentStore};
use crate::models::{Datasource, DynamicVariable, Query};
use crate::utils::AppError;

lazy_static! {
    static ref BINDING: Regex = Regex::new(r"\{\{\s*([^{}\s]+)\s*\}\}").expect("valid binding regex");
}

#[async_trait]
pub trait VariableCache: Send + Sync {
    async fn get(&self, datasource_id: &str, name: &str) -> Option<String>;

    async fn set(&self, datasource_id: &str, name: &str, value: String);

    async fn invalidate(&self, datasource_id: &str, variables: &[DynamicVariable]);
}

#[derive(Clone, Debug)]
struct CachedVariable {
    value: String,
    cached_at: Instant,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VariableCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

pub struct MemoryVariableCache {
    cache: Arc<RwLock<HashMap<String, CachedVariable>>>,
    stats: Arc<RwLock<VariableCacheStats>>,
    ttl: Duration,
}

impl MemoryVariableCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(VariableCacheStats::default())),
            ttl,
        }
    }

    pub async fn stats(&self) -> VariableCacheStats {
        self.stats.read().await.clone()
    }

    fn cache_key(datasource_id: &str, name: &str) -> String {
        format!("{}:{}", datasource_id, name)
    }
}

#[async_trait]
impl VariableCache for MemoryVariableCache {
    async fn get(&self, datasource_id: &str, name: &str) -> Option<String> {
        let cache_key = Self::cache_key(datasource_id, name);
        let cache = self.cache.read().await;

        if let Some(cached) = cache.get(&cache_key) {
            if cached.cached_at.elapsed() < self.ttl {
                self.stats.write().await.hits += 1;
                return Some(cached.value.clone());
            }
        }

        self.stats.write().await.misses += 1;
        None
    }

    async fn set(&self, datasource_id: &str, name: &str, value: String) {
        let mut cache = self.cache.write().await;
        let ttl = self.ttl;
        cache.retain(|_, cached| cached.cached_at.elapsed() < ttl);
        cache.insert(
            Self::cache_key(datasource_id, name),
            CachedVariable {
                value,
                cached_at: Instant::now(),
            },
        );
    }

    async fn invalidate(&self, datasource_id: &str, variables: &[DynamicVariable]) {
        let mut cache = self.cache.write().await;
        let mut evicted = 0;
        for variable in variables {
            if cache.remove(&Self::cache_key(datasource_id, &variable.name)).is_some() {
                evicted += 1;
            }
        }
        self.stats.write().await.evictions += evicted;
    }
}

pub struct DynamicVariableManager {
    store: Arc<dyn DocumentStore>,
    cache: Arc<dyn VariableCache>,
}

impl DynamicVariableManager {
    pub fn new(store: Arc<dyn DocumentStore>, cache: Arc<dyn VariableCache>) -> Self {
        Self { store, cache }
    }

    pub fn cache(&self) -> &Arc<dyn VariableCache> {
        &self.cache
    }

    /// Drop every variable sourced from `query` out of its datasource, then
    /// evict them from the cache. Evicting before the datasource write lands
    /// would let a concurrent resolution put them straight back.
    ///
    /// Returns the removed variables; empty (and nothing written) when the
    /// query owns none.
    pub async fn remove_for_query(&self, query: &Query) -> Result<Vec<DynamicVariable>, AppError> {
        let Some(query_id) = query.id.as_deref() else {
            return Ok(Vec::new());
        };

        let mut datasource: Datasource = get_doc(self.store.as_ref(), &query.datasource_id).await?;
        let Some(config) = datasource.config.as_mut() else {
            return Ok(Vec::new());
        };

        let (removed, kept): (Vec<_>, Vec<_>) = config
            .dynamic_variables
            .drain(..)
            .partition(|variable| variable.query_id == query_id);

        if removed.is_empty() {
            debug!(query_id, "Query owns no dynamic variables");
            return Ok(removed);
        }

        config.dynamic_variables = kept;
        put_doc(self.store.as_ref(), &datasource).await?;

        self.cache.invalidate(&query.datasource_id, &removed).await;
        info!(
            query_id,
            datasource_id = %query.datasource_id,
            removed = removed.len(),
            "Removed dynamic variables for deleted query"
        );
        Ok(removed)
    }

    /// Evict the cached values of variables that an edit removed or
    /// redefined.
    pub async fn invalidate_for_update(&self, before: &Datasource, after: &Datasource) -> Vec<DynamicVariable> {
        let stale: Vec<DynamicVariable> = before
            .dynamic_variables()
            .iter()
            .filter(|old| {
                !after.dynamic_variables().iter().any(|new| {
                    new.name == old.name && new.query_id == old.query_id && new.value == old.value
                })
            })
            .cloned()
            .collect();

        if stale.is_empty() {
            return stale;
        }
        if let Some(datasource_id) = before.id.as_deref() {
            self.cache.invalidate(datasource_id, &stale).await;
            debug!(datasource_id, evicted = stale.len(), "Invalidated changed dynamic variables");
        }
        stale
    }
}

/// Names bound as `{{ name }}` anywhere in `fields`.
pub fn bound_names(fields: &Value) -> HashSet<String> {
    let mut names = HashSet::new();
    collect_bindings(fields, &mut names);
    names
}

fn collect_bindings(value: &Value, names: &mut HashSet<String>) {
    match value {
        Value::String(text) => {
            for caps in BINDING.captures_iter(text) {
                names.insert(caps[1].to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_bindings(item, names)),
        Value::Object(map) => map.values().for_each(|item| collect_bindings(item, names)),
        _ => {}
    }
}

/// Variables of `datasource` that `fields` actually uses, minus any sourced
/// from `current_query_id` itself.
pub fn used_variables(datasource: &Datasource, fields: &Value, current_query_id: Option<&str>) -> Vec<DynamicVariable> {
    let bound = bound_names(fields);
    datasource
        .dynamic_variables()
        .iter()
        .filter(|variable| bound.contains(&variable.name))
        .filter(|variable| Some(variable.query_id.as_str()) != current_query_id)
        .cloned()
        .collect()
}

enum PathSegment {
    Key(String),
    Index(usize),
}

fn parse_path(expression: &str) -> Option<Vec<PathSegment>> {
    let path = expression
        .trim()
        .trim_start_matches("{{")
        .trim_end_matches("}}")
        .trim();
    if path.is_empty() {
        return None;
    }

    let mut segments = Vec::new();
    for part in path.split('.') {
        let (key, mut rest) = match part.find('[') {
            Some(open) => (&part[..open], &part[open..]),
            None => (part, ""),
        };
        if !key.is_empty() {
            segments.push(PathSegment::Key(key.to_string()));
        }
        while let Some(inner) = rest.strip_prefix('[') {
            let close = inner.find(']')?;
            let index = inner[..close].trim().parse().ok()?;
            segments.push(PathSegment::Index(index));
            rest = &inner[close + 1..];
        }
        if !rest.is_empty() {
            return None;
        }
    }
    Some(segments)
}

/// Evaluate a `{{ data[0].token }}` style path against a query result.
/// Strings come back as-is, anything else as its JSON text.
pub fn extract_value(expression: &str, result: &Value) -> Option<String> {
    let mut current = result;
    for segment in parse_path(expression)? {
        current = match segment {
            PathSegment::Key(key) => current.get(key.as_str())?,
            PathSegment::Index(index) => current.get(index)?,
        };
    }
    match current {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}
