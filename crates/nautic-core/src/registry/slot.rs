//! A single lazily materialized capability.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::RwLock;
use serde::Serialize;

use super::capability::Capability;
use super::policy::FailurePolicy;
use crate::error::InitError;

/// Availability of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    /// No initialization attempt has completed yet.
    Unknown,
    /// Initialized; the instance is cached.
    Available,
    /// The last attempt failed.
    Unavailable,
}

/// Point-in-time view of a slot for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct SlotStatus {
    pub name: &'static str,
    pub state: Availability,
    /// Advisory probe answer.
    pub probe: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Consecutive failed attempts.
    pub failures: u32,
    /// Completed initialization attempts.
    pub attempts: u64,
}

struct Failure {
    error: InitError,
    failures: u32,
    retry_at: Option<Instant>,
}

enum State<T: ?Sized> {
    Unknown,
    Available(Arc<T>),
    Unavailable(Failure),
}

type Outcome<T> = Result<Arc<T>, InitError>;

/// Handle on the attempt in flight. Every waiter polls the same spawned task.
type Attempt<T> = Shared<BoxFuture<'static, Outcome<T>>>;

struct Inner<T: ?Sized> {
    state: State<T>,
    /// Bumped each time an attempt completes.
    generation: u64,
    in_flight: Option<Attempt<T>>,
}

/// Holder for one optional subsystem.
///
/// `get_or_init` runs at most one initializer at a time. The attempt runs on
/// its own task, so a caller that is dropped mid-initialization neither
/// cancels it nor lets a second attempt start; every caller that arrives
/// while it is in flight shares its outcome.
pub struct CapabilitySlot<T: ?Sized> {
    capability: Arc<dyn Capability<Instance = T>>,
    policy: FailurePolicy,
    inner: Arc<RwLock<Inner<T>>>,
}

impl<T: ?Sized + Send + Sync + 'static> CapabilitySlot<T> {
    /// Create an uninitialized slot.
    pub fn new<C>(capability: C, policy: FailurePolicy) -> Self
    where
        C: Capability<Instance = T>,
    {
        Self {
            capability: Arc::new(capability),
            policy,
            inner: Arc::new(RwLock::new(Inner {
                state: State::Unknown,
                generation: 0,
                in_flight: None,
            })),
        }
    }

    /// Slot name.
    pub fn name(&self) -> &'static str {
        self.capability.name()
    }

    /// Failure policy of this slot.
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Return the cached instance, initializing it first if needed.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn get_or_init(&self) -> Outcome<T> {
        {
            let inner = self.inner.read();
            match &inner.state {
                State::Available(instance) => return Ok(instance.clone()),
                State::Unavailable(failure)
                    if inner.in_flight.is_none() && !self.retry_due(failure) =>
                {
                    return Err(failure.error.clone())
                }
                _ => {}
            }
        }

        let attempt = {
            let mut inner = self.inner.write();
            if let Some(attempt) = inner.in_flight.clone() {
                attempt
            } else {
                // Re-check: an attempt may have finished since the read above.
                match &inner.state {
                    State::Available(instance) => return Ok(instance.clone()),
                    State::Unavailable(failure) if !self.retry_due(failure) => {
                        return Err(failure.error.clone())
                    }
                    _ => {}
                }
                let attempt = self.start_attempt();
                inner.in_flight = Some(attempt.clone());
                attempt
            }
        };

        attempt.await
    }

    /// The cached instance, without attempting initialization.
    pub fn get(&self) -> Option<Arc<T>> {
        match &self.inner.read().state {
            State::Available(instance) => Some(instance.clone()),
            _ => None,
        }
    }

    /// Advisory availability check. Never initializes, never mutates the slot.
    pub fn probe(&self) -> bool {
        std::panic::catch_unwind(AssertUnwindSafe(|| self.capability.probe())).unwrap_or(false)
    }

    /// Current availability.
    pub fn availability(&self) -> Availability {
        match &self.inner.read().state {
            State::Unknown => Availability::Unknown,
            State::Available(_) => Availability::Available,
            State::Unavailable(_) => Availability::Unavailable,
        }
    }

    /// Whether an initialization attempt is running.
    pub fn is_initializing(&self) -> bool {
        self.inner.read().in_flight.is_some()
    }

    /// Authoritative answer once an attempt has completed, probe before that.
    pub fn is_available(&self) -> bool {
        match self.availability() {
            Availability::Available => true,
            Availability::Unavailable => false,
            Availability::Unknown => self.probe(),
        }
    }

    /// Snapshot for health reporting.
    pub fn status(&self) -> SlotStatus {
        let probe = self.probe();
        let inner = self.inner.read();
        let (state, last_error, failures) = match &inner.state {
            State::Unknown => (Availability::Unknown, None, 0),
            State::Available(_) => (Availability::Available, None, 0),
            State::Unavailable(failure) => (
                Availability::Unavailable,
                Some(failure.error.reason.clone()),
                failure.failures,
            ),
        };

        SlotStatus {
            name: self.name(),
            state,
            probe,
            last_error,
            failures,
            attempts: inner.generation,
        }
    }

    fn retry_due(&self, failure: &Failure) -> bool {
        match self.policy {
            FailurePolicy::Sticky => false,
            FailurePolicy::Retry { .. } => failure
                .retry_at
                .map_or(true, |retry_at| Instant::now() >= retry_at),
        }
    }

    /// Spawn an attempt. Called with the write lock held, so the task cannot
    /// record its outcome before `in_flight` points at it.
    fn start_attempt(&self) -> Attempt<T> {
        let name = self.name();
        let capability = self.capability.clone();
        let inner = self.inner.clone();
        let policy = self.policy;

        let task = tokio::spawn(async move {
            tracing::info!(capability = name, "initializing capability");
            let started = Instant::now();
            let outcome = AssertUnwindSafe(capability.initialize())
                .catch_unwind()
                .await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let result = match outcome {
                Ok(Ok(instance)) => Ok(instance),
                Ok(Err(reason)) => Err(InitError::new(name, reason)),
                Err(panic) => Err(InitError::new(name, panic_reason(panic))),
            };
            record(&inner, policy, name, elapsed_ms, result)
        });

        let inner = self.inner.clone();
        async move {
            match task.await {
                Ok(result) => result,
                // Only reachable when the runtime shuts down under the task.
                Err(e) => {
                    let error = InitError::new(name, format!("initialization task failed: {}", e));
                    record(&inner, policy, name, 0, Err(error))
                }
            }
        }
        .boxed()
        .shared()
    }
}

/// Store the outcome of an attempt and clear the in-flight handle.
fn record<T: ?Sized>(
    inner: &RwLock<Inner<T>>,
    policy: FailurePolicy,
    name: &'static str,
    elapsed_ms: u64,
    result: Outcome<T>,
) -> Outcome<T> {
    match result {
        Ok(instance) => {
            {
                let mut inner = inner.write();
                inner.state = State::Available(instance.clone());
                inner.generation += 1;
                inner.in_flight = None;
            }
            tracing::info!(capability = name, elapsed_ms, "capability initialized");
            Ok(instance)
        }
        Err(error) => {
            let (failures, retry_in) = {
                let mut inner = inner.write();
                let failures = match &inner.state {
                    State::Unavailable(previous) => previous.failures.saturating_add(1),
                    _ => 1,
                };
                let retry_in = policy.backoff_after(failures);
                inner.state = State::Unavailable(Failure {
                    error: error.clone(),
                    failures,
                    retry_at: retry_in.map(|delay| Instant::now() + delay),
                });
                inner.generation += 1;
                inner.in_flight = None;
                (failures, retry_in)
            };
            tracing::warn!(
                capability = name,
                elapsed_ms,
                failures,
                retry_in_ms = retry_in.map(|d: Duration| d.as_millis() as u64),
                reason = %error.reason,
                "capability initialization failed"
            );
            Err(error)
        }
    }
}

fn panic_reason(panic: Box<dyn Any + Send>) -> String {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("initializer panicked: {}", message)
}

/// Type-erased view of a slot used by the registry.
pub(crate) trait SlotHandle: Send + Sync {
    fn name(&self) -> &'static str;
    fn probe(&self) -> bool;
    fn status(&self) -> SlotStatus;
    fn warm_up(self: Arc<Self>) -> BoxFuture<'static, ()>;
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: ?Sized + Send + Sync + 'static> SlotHandle for CapabilitySlot<T> {
    fn name(&self) -> &'static str {
        CapabilitySlot::name(self)
    }

    fn probe(&self) -> bool {
        CapabilitySlot::probe(self)
    }

    fn status(&self) -> SlotStatus {
        CapabilitySlot::status(self)
    }

    fn warm_up(self: Arc<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let _ = self.get_or_init().await;
        })
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
