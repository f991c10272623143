//! Host-supplied optional subsystems.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

/// An optional subsystem the registry can materialize lazily.
#[async_trait]
pub trait Capability: Send + Sync + 'static {
    /// Handle type callers receive once the capability is available.
    type Instance: ?Sized + Send + Sync + 'static;

    /// Slot name, used for lookups, logs and health output.
    fn name(&self) -> &'static str;

    /// Cheap advisory check ("is it installed", "is the file there").
    ///
    /// Must not perform the expensive initialization.
    fn probe(&self) -> bool {
        true
    }

    /// Build the instance. May be slow; the registry calls it at most once per
    /// attempt regardless of how many callers are waiting.
    async fn initialize(&self) -> Result<Arc<Self::Instance>, String>;
}

type InitFn<T> = Box<dyn Fn() -> BoxFuture<'static, Result<Arc<T>, String>> + Send + Sync>;
type ProbeFn = Box<dyn Fn() -> bool + Send + Sync>;

/// A [`Capability`] built from closures.
pub struct FnCapability<T: ?Sized> {
    name: &'static str,
    probe: ProbeFn,
    init: InitFn<T>,
}

impl<T: ?Sized + Send + Sync + 'static> FnCapability<T> {
    /// Create a capability whose probe always answers `true`.
    pub fn new<F, Fut>(name: &'static str, init: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, String>> + Send + 'static,
    {
        Self {
            name,
            probe: Box::new(|| true),
            init: Box::new(move || Box::pin(init())),
        }
    }

    /// Replace the probe.
    pub fn with_probe<P>(mut self, probe: P) -> Self
    where
        P: Fn() -> bool + Send + Sync + 'static,
    {
        self.probe = Box::new(probe);
        self
    }
}

#[async_trait]
impl<T: ?Sized + Send + Sync + 'static> Capability for FnCapability<T> {
    type Instance = T;

    fn name(&self) -> &'static str {
        self.name
    }

    fn probe(&self) -> bool {
        (self.probe)()
    }

    async fn initialize(&self) -> Result<Arc<T>, String> {
        (self.init)().await
    }
}
