//! Multi-tenant capacity limiting, rate limiting, caching, and tuning
//! (spec §4.8-§4.11, C8-C11).

pub mod cache;
pub mod capacity;
pub mod memory_kv;
pub mod rate_limit;
pub mod tuning;

pub use cache::{EmbeddingCache, ResultCache};
pub use capacity::{CapacityLimiter, Lease, WorkClass};
pub use memory_kv::InMemoryKv;
pub use rate_limit::{RateLimitCategory, RateLimitResult, RateLimiter};
pub use tuning::{AuditLogEntry, FeedbackAnalysis, FeedbackCause, TenantConfigStore};
