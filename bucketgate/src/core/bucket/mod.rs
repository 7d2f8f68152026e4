//! Token bucket with lazy, on-access refill
//!
//! A [`TokenBucket`] holds a capped number of tokens. Every admitted request
//! takes one token; tokens flow back in at a fixed rate per minute. There is
//! no timer behind a bucket: the refill owed since the last visit is computed
//! when the bucket is touched, so an idle client costs nothing but memory.
//!
//! All mutable state sits behind a per-bucket lock that is held for a handful
//! of integer operations. Two clients never contend on the same lock, and
//! concurrent calls for the same client are linearizable.

use parking_lot::Mutex;
use std::time::Instant;


const MILLIS_PER_MINUTE: u128 = 60_000;
const MICROS_PER_MINUTE: u128 = 60_000_000;

/// How elapsed time is turned into whole tokens
///
/// # Variants
///
/// - [`Truncate`](RefillMode::Truncate): every visit converts the elapsed
///   milliseconds into whole tokens and drops the fraction. Frequent visits
///   can therefore refill slower than the configured rate.
/// - [`Carry`](RefillMode::Carry): the unconverted fraction is kept for the
///   next visit, so the long-run refill matches the configured rate. The
///   fraction is discarded while the bucket is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefillMode {
    #[default]
    Truncate,
    Carry,
}

/// Outcome of a single [`TokenBucket::try_consume`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Consumption {
    /// Tokens left in the bucket after this call
    pub remaining: u64,
    /// Whether a token was taken
    pub allowed: bool,
}

impl Consumption {
    fn allowed(remaining: u64) -> Self {
        Consumption {
            remaining,
            allowed: true,
        }
    }

    fn rejected() -> Self {
        Consumption {
            remaining: 0,
            allowed: false,
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: u64,
    last_refill: Instant,
    // Sub-token remainder in token-microseconds, only used by `RefillMode::Carry`
    carry: u128,
}

/// A token bucket owned by one (client, endpoint) pair
///
/// # Example
///
/// ```
/// use bucketgate::TokenBucket;
/// use std::time::{Duration, Instant};
///
/// let start = Instant::now();
/// // Burst of 100, 50 requests per minute sustained
/// let bucket = TokenBucket::new(100, 50, start);
///
/// let first = bucket.try_consume(start);
/// assert!(first.allowed);
/// assert_eq!(first.remaining, 49);
///
/// // 60 seconds later the minute's allowance has flowed back in
/// let later = bucket.try_consume(start + Duration::from_secs(60));
/// assert_eq!(later.remaining, 98);
/// ```
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u64,
    refill_per_minute: u64,
    mode: RefillMode,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a bucket that truncates fractional refill
    ///
    /// The bucket starts with one minute worth of tokens, `min(refill_per_minute, capacity)`.
    /// A bucket that never refills (`refill_per_minute == 0`) starts full instead,
    /// since its initial fill is the only allowance it will ever have.
    pub fn new(capacity: u64, refill_per_minute: u64, now: Instant) -> Self {
        Self::with_mode(capacity, refill_per_minute, RefillMode::Truncate, now)
    }

    /// Create a bucket with an explicit [`RefillMode`]
    pub fn with_mode(
        capacity: u64,
        refill_per_minute: u64,
        mode: RefillMode,
        now: Instant,
    ) -> Self {
        TokenBucket {
            capacity,
            refill_per_minute,
            mode,
            state: Mutex::new(BucketState {
                tokens: initial_tokens(capacity, refill_per_minute),
                last_refill: now,
                carry: 0,
            }),
        }
    }

    /// Maximum number of tokens the bucket can hold
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Tokens added back per minute
    pub fn refill_per_minute(&self) -> u64 {
        self.refill_per_minute
    }

    pub fn mode(&self) -> RefillMode {
        self.mode
    }

    /// Tokens currently stored, without applying any pending refill
    pub fn available_tokens(&self) -> u64 {
        self.state.lock().tokens
    }

    /// Refill for the time elapsed since the last visit, then try to take one token
    ///
    /// The whole read-refill-decrement sequence is one atomic step. A `now`
    /// earlier than the last visit counts as zero elapsed time.
    ///
    /// Running out of tokens is a normal outcome reported through
    /// [`Consumption::allowed`], not an error.
    pub fn try_consume(&self, now: Instant) -> Consumption {
        let mut state = self.state.lock();

        let elapsed = now.saturating_duration_since(state.last_refill);
        let added = match self.mode {
            RefillMode::Truncate => {
                elapsed.as_millis() * u128::from(self.refill_per_minute) / MILLIS_PER_MINUTE
            }
            RefillMode::Carry => {
                let owed = elapsed.as_micros() * u128::from(self.refill_per_minute) + state.carry;
                state.carry = owed % MICROS_PER_MINUTE;
                owed / MICROS_PER_MINUTE
            }
        };

        let refilled = u128::from(state.tokens) + added;
        if refilled >= u128::from(self.capacity) {
            state.tokens = self.capacity;
            state.carry = 0;
        } else {
            // below capacity, so it fits in u64
            state.tokens = refilled as u64;
        }
        state.last_refill = state.last_refill.max(now);

        if state.tokens == 0 {
            return Consumption::rejected();
        }

        state.tokens -= 1;
        Consumption::allowed(state.tokens)
    }
}

/// Tokens a fresh bucket starts with
pub fn initial_tokens(capacity: u64, refill_per_minute: u64) -> u64 {
    if refill_per_minute == 0 {
        capacity
    } else {
        refill_per_minute.min(capacity)
    }
}
