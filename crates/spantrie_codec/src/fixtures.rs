//! Fixture generators for testing.
//!
//! Produces span batches shaped like real service traffic: a handful of
//! HTTP routes, database queries and cache lookups repeated many times,
//! plus a small share of unusual values (error statuses, canary hosts,
//! unexpected database systems) that the sampler should keep.

// Slices indexed here are constant and never empty
#![allow(clippy::missing_panics_doc)]

use crate::record::{Batch, Record, ResourceBlock, ScopeBlock};
use crate::value::Value;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Base timestamp for generated records (2023-11-14T22:13:20Z).
const EPOCH_NANOS: u64 = 1_700_000_000_000_000_000;

/// Configuration for fixture generation.
#[derive(Debug, Clone)]
pub struct FixtureConfig {
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Number of resource blocks.
    pub resources: usize,
    /// Scope blocks per resource.
    pub scopes_per_resource: usize,
    /// Records per scope block.
    pub records_per_scope: usize,
    /// Probability that a record carries an unusual value.
    pub rare_rate: f64,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            resources: 2,
            scopes_per_resource: 2,
            records_per_scope: 100,
            rare_rate: 0.02,
        }
    }
}

impl FixtureConfig {
    /// Sets the seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the number of records per scope block.
    #[must_use]
    pub const fn with_records_per_scope(mut self, count: usize) -> Self {
        self.records_per_scope = count;
        self
    }

    /// Sets the block layout.
    #[must_use]
    pub const fn with_layout(mut self, resources: usize, scopes_per_resource: usize) -> Self {
        self.resources = resources;
        self.scopes_per_resource = scopes_per_resource;
        self
    }

    /// Sets the unusual-value rate.
    #[must_use]
    pub const fn with_rare_rate(mut self, rate: f64) -> Self {
        self.rare_rate = rate;
        self
    }
}

const SERVICES: [&str; 4] = ["api-gateway", "order-service", "user-service", "payment-service"];

const ROUTES: [(&str, &str); 5] = [
    ("GET", "/api/v2/users/:id"),
    ("GET", "/api/v2/orders"),
    ("POST", "/api/v2/orders"),
    ("GET", "/api/v2/products"),
    ("POST", "/api/v2/checkout"),
];

const QUERIES: [(&str, &str); 3] = [
    ("SELECT", "orders"),
    ("SELECT", "users"),
    ("INSERT", "orders"),
];

const SCOPES: [&str; 3] = [
    "io.opentelemetry.http",
    "io.opentelemetry.jdbc",
    "io.opentelemetry.redis",
];

/// Span batch fixture generator.
pub struct FixtureGenerator {
    rng: ChaCha8Rng,
    config: FixtureConfig,
    clock: u64,
}

impl FixtureGenerator {
    /// Creates a new fixture generator.
    #[must_use]
    pub fn new(config: FixtureConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            rng,
            config,
            clock: EPOCH_NANOS,
        }
    }

    /// Generates a batch with the configured layout.
    ///
    /// Each scope block carries one instrumentation library's records:
    /// HTTP server spans, database queries or cache lookups.
    #[must_use]
    pub fn generate(&mut self) -> Batch {
        let resources = (0..self.config.resources)
            .map(|r| {
                let service = SERVICES[r % SERVICES.len()];
                let scopes = (0..self.config.scopes_per_resource)
                    .map(|s| self.scope_block(SCOPES[(r + s) % SCOPES.len()]))
                    .collect();
                ResourceBlock::new(scopes).with_resource(Value::Map(vec![
                    ("service.name".to_string(), Value::from(service)),
                    ("deployment.environment".to_string(), Value::from("production")),
                ]))
            })
            .collect();
        Batch::new(resources)
    }

    /// Generates a single scope block of HTTP spans where exactly one
    /// record out of `count` hits a canary host.
    #[must_use]
    pub fn canary_deploy(&mut self, count: usize) -> Batch {
        let canary = self.rng.gen_range(0..count.max(1));
        let records = (0..count)
            .map(|i| {
                let host = if i == canary { "api-canary-0" } else { "api-prod-0" };
                let start = self.tick();
                Record::new("GET /api/v2/orders")
                    .with_times(start, start + 20_000_000)
                    .with_attribute("http.method", "GET")
                    .with_attribute("net.host.name", host)
                    .with_field("spanId", self.hex_id(8))
            })
            .collect();
        Batch::new(vec![ResourceBlock::new(vec![
            ScopeBlock::new(records).with_scope(library(SCOPES[0]))
        ])])
    }

    fn scope_block(&mut self, library_name: &str) -> ScopeBlock {
        let records = (0..self.config.records_per_scope)
            .map(|_| match library_name {
                "io.opentelemetry.jdbc" => self.db_record(),
                "io.opentelemetry.redis" => self.cache_record(),
                _ => self.http_record(),
            })
            .collect();
        ScopeBlock::new(records).with_scope(library(library_name))
    }

    fn http_record(&mut self) -> Record {
        let (method, route) = ROUTES[self.rng.gen_range(0..ROUTES.len())];
        let rare = self.rare();
        let status: i64 = if rare {
            *[500, 502, 503].choose(&mut self.rng).unwrap_or(&500)
        } else {
            200
        };
        let latency = if rare {
            self.rng.gen_range(800..5_000)
        } else {
            self.rng.gen_range(5..120)
        };

        let record = Record::new(format!("{method} {route}"))
            .with_attribute("http.method", method)
            .with_attribute("http.route", route)
            .with_attribute("http.status_code", status);
        let record = if rare {
            record.with_attribute("error.type", "upstream_timeout")
        } else {
            record
        };
        self.finish(record, latency)
    }

    fn db_record(&mut self) -> Record {
        let (operation, table) = QUERIES[self.rng.gen_range(0..QUERIES.len())];
        let system = if self.rare() { "mysql" } else { "postgresql" };
        let rows = self.rng.gen_range(0..3i64);
        let record = Record::new(format!("{operation} {table}"))
            .with_attribute("db.system", system)
            .with_attribute("db.operation", operation)
            .with_attribute("db.sql.table", table)
            .with_attribute("db.rows_affected", rows);
        let latency = self.rng.gen_range(1..40);
        self.finish(record, latency)
    }

    fn cache_record(&mut self) -> Record {
        let hit = self.rng.gen_bool(0.9);
        let mut record = Record::new("cache.get")
            .with_attribute("db.system", "redis")
            .with_attribute("cache.hit", hit);
        if self.rare() {
            record = record.with_attribute("net.peer.name", "redis-replica-3");
        }
        self.finish(record, 1)
    }

    /// Stamps times and passthrough identifiers onto a record.
    fn finish(&mut self, record: Record, latency_ms: u64) -> Record {
        let start = self.tick();
        let status = Value::Map(vec![("code".to_string(), Value::from(0i64))]);
        record
            .with_times(start, start + latency_ms * 1_000_000)
            .with_field("traceId", self.hex_id(16))
            .with_field("spanId", self.hex_id(8))
            .with_field("kind", 2i64)
            .with_field("status", status)
    }

    fn tick(&mut self) -> u64 {
        self.clock += self.rng.gen_range(100_000..5_000_000);
        self.clock
    }

    fn rare(&mut self) -> bool {
        self.rng.gen_bool(self.config.rare_rate.clamp(0.0, 1.0))
    }

    fn hex_id(&mut self, bytes: usize) -> String {
        (0..bytes)
            .map(|_| format!("{:02x}", self.rng.gen::<u8>()))
            .collect()
    }
}

fn library(name: &str) -> Value {
    Value::Map(vec![
        ("name".to_string(), Value::from(name)),
        ("version".to_string(), Value::from("1.32.0")),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_configured_layout() {
        let config = FixtureConfig::default().with_layout(3, 2).with_records_per_scope(10);
        let batch = FixtureGenerator::new(config).generate();

        assert_eq!(batch.resource_spans.len(), 3);
        assert!(batch.resource_spans.iter().all(|r| r.scope_spans.len() == 2));
        assert_eq!(batch.record_count(), 60);
        assert!(batch.records().all(|r| r.name.is_some() && r.end_time >= r.start_time));
    }

    #[test]
    fn same_seed_same_batch() {
        let a = FixtureGenerator::new(FixtureConfig::default().with_seed(9)).generate();
        let b = FixtureGenerator::new(FixtureConfig::default().with_seed(9)).generate();
        let c = FixtureGenerator::new(FixtureConfig::default().with_seed(10)).generate();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn canary_appears_once() {
        let batch = FixtureGenerator::new(FixtureConfig::default()).canary_deploy(100);
        let canaries = batch
            .records()
            .filter(|r| r.get_attribute("net.host.name") == Some(&Value::from("api-canary-0")))
            .count();
        assert_eq!(canaries, 1);
        assert_eq!(batch.record_count(), 100);
    }

    #[test]
    fn zero_rare_rate_has_no_errors() {
        let config = FixtureConfig::default().with_rare_rate(0.0);
        let batch = FixtureGenerator::new(config).generate();
        assert!(batch
            .records()
            .all(|r| r.get_attribute("error.type").is_none()));
    }
}
