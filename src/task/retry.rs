// src/task/retry.rs

//! Retry policy attached to a task and applied by the executor.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Delay schedule between attempts.
#[derive(Clone)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// Same delay before every retry.
    Fixed(Duration),
    /// `initial * multiplier^(attempt - 1)`, capped at `max`, plus
    /// `±jitter * delay` of random noise.
    Exponential {
        initial: Duration,
        multiplier: f64,
        max: Duration,
        jitter: f64,
    },
    /// Caller-provided schedule.
    Custom(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl Backoff {
    /// Doubling backoff starting at `initial`, capped at 60 seconds.
    pub fn exponential(initial: Duration) -> Self {
        Backoff::Exponential {
            initial,
            multiplier: 2.0,
            max: Duration::from_secs(60),
            jitter: 0.0,
        }
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Backoff::Custom(Arc::new(f))
    }

    /// Set the cap of an exponential schedule. No-op for other variants.
    pub fn with_max(mut self, cap: Duration) -> Self {
        if let Backoff::Exponential { max, .. } = &mut self {
            *max = cap;
        }
        self
    }

    /// Set the jitter fraction (clamped to `0.0..=1.0`) of an exponential
    /// schedule. No-op for other variants.
    pub fn with_jitter(mut self, fraction: f64) -> Self {
        if let Backoff::Exponential { jitter, .. } = &mut self {
            *jitter = fraction.clamp(0.0, 1.0);
        }
        self
    }

    /// Delay to wait after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(delay) => *delay,
            Backoff::Exponential {
                initial,
                multiplier,
                max,
                jitter,
            } => {
                let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let base = (initial.as_secs_f64() * multiplier.powi(exponent)).max(0.0);
                let capped = if base >= max.as_secs_f64() {
                    *max
                } else {
                    Duration::from_secs_f64(base)
                };

                if *jitter > 0.0 {
                    let secs = capped.as_secs_f64();
                    let range = secs * jitter;
                    let offset = rand::random::<f64>() * range * 2.0 - range;
                    Duration::from_secs_f64((secs + offset).max(0.0))
                } else {
                    capped
                }
            }
            Backoff::Custom(f) => f(attempt),
        }
    }
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backoff::None => f.write_str("None"),
            Backoff::Fixed(d) => f.debug_tuple("Fixed").field(d).finish(),
            Backoff::Exponential {
                initial,
                multiplier,
                max,
                jitter,
            } => f
                .debug_struct("Exponential")
                .field("initial", initial)
                .field("multiplier", multiplier)
                .field("max", max)
                .field("jitter", jitter)
                .finish(),
            Backoff::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// How many times a task may be attempted and how long to wait in between.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    /// Policy allowing `max_attempts` attempts in total.
    ///
    /// `max_attempts` is clamped to at least 1: a task always runs once.
    pub fn attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::None,
        }
    }

    /// Run exactly once.
    pub fn no_retry() -> Self {
        Self::attempts(1)
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Whether another attempt follows failed attempt `attempt` (1-based).
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.delay_for(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retry()
    }
}
