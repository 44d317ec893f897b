//! Fixed-window rate limiting and counter state.

mod backend;
mod clock;
mod counter;
mod key;
mod limiter;
mod policy;
mod store;

pub use backend::CounterStore;
pub use clock::{Clock, ManualClock, SystemClock};
pub use counter::{RateLimitDecision, RateLimitRecord};
pub use key::{client_key, RateLimitKey, UNKNOWN_CLIENT};
pub use limiter::{RateLimiter, DEFAULT_SWEEP_PROBABILITY};
pub use policy::{PolicyCatalogue, PolicyClass, RateLimitPolicy, MAX_WINDOW_MS};
pub use store::InMemoryCounterStore;
