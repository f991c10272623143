//! Lazy capability registry.
//!
//! Optional subsystems (the auth manager, the vision backend) are registered
//! at start-up with an initializer and an advisory probe, and materialized on
//! first use. Each slot is tri-state:
//!
//! ```text
//! Unknown ──init ok──► Available (instance cached for the process lifetime)
//!    │
//!    └──init err──► Unavailable ──(retry policy, backoff elapsed)──► init again
//! ```
//!
//! Concurrent first callers coalesce onto a single initialization attempt and
//! all observe its outcome. The registry is an explicit value owned by the
//! host, not a module-level singleton.
//!
//! # Example
//!
//! ```ignore
//! let registry = CapabilityRegistry::new(FailurePolicy::default());
//! let vision = registry.register(ModelFileCapability::new(path, loader))?;
//!
//! if registry.probe("vision") {
//!     let backend = vision.get_or_init().await?;
//! }
//! ```

pub mod capability;
pub mod policy;
pub mod slot;

pub use capability::{Capability, FnCapability};
pub use policy::FailurePolicy;
pub use slot::{Availability, CapabilitySlot, SlotStatus};

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, InitError, Result};
use slot::SlotHandle;

/// Process-wide holder of optional subsystems.
pub struct CapabilityRegistry {
    slots: RwLock<Vec<Arc<dyn SlotHandle>>>,
    default_policy: FailurePolicy,
}

impl CapabilityRegistry {
    /// Create an empty registry. `default_policy` applies to slots registered
    /// with [`register`](Self::register).
    pub fn new(default_policy: FailurePolicy) -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
            default_policy,
        }
    }

    /// Policy applied by [`register`](Self::register).
    pub fn default_policy(&self) -> FailurePolicy {
        self.default_policy
    }

    /// Register a capability under the default policy.
    pub fn register<C: Capability>(&self, capability: C) -> Result<Arc<CapabilitySlot<C::Instance>>> {
        self.register_with_policy(capability, self.default_policy)
    }

    /// Register a capability under an explicit policy.
    ///
    /// Fails if a slot with the same name already exists.
    pub fn register_with_policy<C: Capability>(
        &self,
        capability: C,
        policy: FailurePolicy,
    ) -> Result<Arc<CapabilitySlot<C::Instance>>> {
        let name = capability.name();
        let mut slots = self.slots.write();
        if slots.iter().any(|slot| slot.name() == name) {
            return Err(Error::Config(format!(
                "capability '{}' is already registered",
                name
            )));
        }

        let slot = Arc::new(CapabilitySlot::new(capability, policy));
        slots.push(slot.clone());
        tracing::debug!(capability = name, ?policy, "capability registered");
        Ok(slot)
    }

    /// Typed handle to a registered slot.
    ///
    /// `None` if no slot has this name or its instance type is not `T`.
    pub fn slot<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Option<Arc<CapabilitySlot<T>>> {
        let handle = self.find(name)?;
        handle.as_any().downcast::<CapabilitySlot<T>>().ok()
    }

    /// Return the named capability, initializing it if needed.
    pub async fn get_or_init<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> std::result::Result<Arc<T>, InitError> {
        let slot = self
            .slot::<T>(name)
            .ok_or_else(|| InitError::new(name, "capability is not registered"))?;
        slot.get_or_init().await
    }

    /// Advisory probe of the named capability. Unknown names answer `false`.
    pub fn probe(&self, name: &str) -> bool {
        self.find(name).map(|slot| slot.probe()).unwrap_or(false)
    }

    /// Status of every slot, in registration order.
    pub fn status(&self) -> Vec<SlotStatus> {
        self.handles().iter().map(|slot| slot.status()).collect()
    }

    /// Names of every slot, in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.handles().iter().map(|slot| slot.name()).collect()
    }

    /// Start initializing every slot in the background.
    ///
    /// Goes through the same coalescing path as request-driven calls, so a
    /// request arriving mid-warm-up waits for the same attempt.
    pub fn warm_up(&self) -> Vec<tokio::task::JoinHandle<()>> {
        self.handles()
            .into_iter()
            .map(|slot| tokio::spawn(slot.warm_up()))
            .collect()
    }

    fn find(&self, name: &str) -> Option<Arc<dyn SlotHandle>> {
        self.slots
            .read()
            .iter()
            .find(|slot| slot.name() == name)
            .cloned()
    }

    fn handles(&self) -> Vec<Arc<dyn SlotHandle>> {
        self.slots.read().clone()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new(FailurePolicy::default())
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("slots", &self.names())
            .field("default_policy", &self.default_policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    #[tokio::test]
    async fn test_register_and_lookup_by_name() {
        let registry = CapabilityRegistry::default();
        registry
            .register(FnCapability::new("greeter", || async {
                Ok::<Arc<dyn Greeter>, String>(Arc::new(English))
            }))
            .unwrap();

        let greeter = registry.get_or_init::<dyn Greeter>("greeter").await.unwrap();
        assert_eq!(greeter.greet(), "hello");
        assert_eq!(registry.names(), vec!["greeter"]);
    }

    #[tokio::test]
    async fn test_unknown_or_mistyped_slot() {
        let registry = CapabilityRegistry::default();
        registry
            .register(FnCapability::new("number", || async {
                Ok::<_, String>(Arc::new(7u32))
            }))
            .unwrap();

        assert!(registry.slot::<String>("number").is_none());
        assert!(registry.slot::<u32>("number").is_some());

        let err = registry.get_or_init::<u32>("missing").await.unwrap_err();
        assert_eq!(err.capability, "missing");
        assert!(!registry.probe("missing"));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = CapabilityRegistry::default();
        let make = || FnCapability::new("auth", || async { Ok::<_, String>(Arc::new(())) });

        registry.register(make()).unwrap();
        assert!(matches!(registry.register(make()), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_status_and_probe_do_not_initialize() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let registry = CapabilityRegistry::new(FailurePolicy::Sticky);
        registry
            .register(
                FnCapability::new("vision", move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, String>(Arc::new("model".to_string())) }
                })
                .with_probe(|| false),
            )
            .unwrap();

        assert!(!registry.probe("vision"));
        let status = registry.status();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].state, Availability::Unknown);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // The probe said no, but it is only advisory.
        assert!(registry.get_or_init::<String>("vision").await.is_ok());
        assert_eq!(registry.status()[0].state, Availability::Available);
    }

    #[tokio::test]
    async fn test_warm_up_initializes_every_slot() {
        let registry = CapabilityRegistry::default();
        let a = registry
            .register(FnCapability::new("a", || async { Ok::<_, String>(Arc::new(1u8)) }))
            .unwrap();
        let b = registry
            .register(FnCapability::new("b", || async {
                Err::<Arc<u8>, _>("no device".to_string())
            }))
            .unwrap();

        for handle in registry.warm_up() {
            handle.await.unwrap();
        }

        assert_eq!(a.availability(), Availability::Available);
        assert_eq!(b.availability(), Availability::Unavailable);
    }
}
