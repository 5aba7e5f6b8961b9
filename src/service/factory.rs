//! Service factories and the instances they hand out.

use std::fmt;
use std::sync::Arc;

use crate::service::{
    FullRequestService, FullResponseService, GeneralService, LightweightService, Service, ServiceKind,
};

type CreateFn = dyn Fn() -> Service + Send + Sync;

/// Creates the service instance that serves one request cycle.
///
/// Cloning a factory is cheap and clones share identity (see
/// [`ServiceFactory::ptr_eq`]).
#[derive(Clone)]
pub struct ServiceFactory {
    inner: FactoryInner,
}

#[derive(Clone)]
enum FactoryInner {
    PerRequest(Arc<CreateFn>),
    SharedLightweight(Arc<dyn LightweightService>),
    SharedFullRequest(Arc<dyn FullRequestService>),
}

impl ServiceFactory {
    /// A factory calling `create` for every request.
    pub fn new<F>(create: F) -> Self
    where
        F: Fn() -> Service + Send + Sync + 'static,
    {
        Self {
            inner: FactoryInner::PerRequest(Arc::new(create)),
        }
    }

    /// A fresh `S::default()` general service per request.
    pub fn general<S>() -> Self
    where
        S: GeneralService + Default + 'static,
    {
        Self::new(|| Service::general(S::default()))
    }

    /// A fresh `S::default()` full-response service per request.
    pub fn full_response<S>() -> Self
    where
        S: FullResponseService + Default + 'static,
    {
        Self::new(|| Service::full_response(S::default()))
    }

    /// A factory that always returns the same stateless instance.
    pub fn shared_lightweight(service: impl LightweightService + 'static) -> Self {
        Self {
            inner: FactoryInner::SharedLightweight(Arc::new(service)),
        }
    }

    /// A factory that always returns the same stateless instance.
    pub fn shared_full_request(service: impl FullRequestService + 'static) -> Self {
        Self {
            inner: FactoryInner::SharedFullRequest(Arc::new(service)),
        }
    }

    pub fn is_shared(&self) -> bool {
        !matches!(self.inner, FactoryInner::PerRequest(_))
    }

    /// Produce the instance for a new request cycle.
    pub fn create(&self) -> ServiceInstance {
        match &self.inner {
            FactoryInner::PerRequest(create) => ServiceInstance {
                service: create(),
                shared: false,
            },
            FactoryInner::SharedLightweight(service) => ServiceInstance {
                service: Service::Lightweight(Arc::clone(service)),
                shared: true,
            },
            FactoryInner::SharedFullRequest(service) => ServiceInstance {
                service: Service::FullRequest(Arc::clone(service)),
                shared: true,
            },
        }
    }

    /// Whether both factories are clones of the same registration.
    pub fn ptr_eq(&self, other: &ServiceFactory) -> bool {
        match (&self.inner, &other.inner) {
            (FactoryInner::PerRequest(a), FactoryInner::PerRequest(b)) => Arc::ptr_eq(a, b),
            (FactoryInner::SharedLightweight(a), FactoryInner::SharedLightweight(b)) => Arc::ptr_eq(a, b),
            (FactoryInner::SharedFullRequest(a), FactoryInner::SharedFullRequest(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for ServiceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.inner {
            FactoryInner::PerRequest(_) => "per-request",
            FactoryInner::SharedLightweight(_) => "shared-lightweight",
            FactoryInner::SharedFullRequest(_) => "shared-full-request",
        };
        f.debug_struct("ServiceFactory").field("mode", &mode).finish()
    }
}

/// A service serving exactly one request cycle.
#[derive(Debug)]
pub struct ServiceInstance {
    service: Service,
    shared: bool,
}

impl ServiceInstance {
    pub fn kind(&self) -> ServiceKind {
        self.service.kind()
    }

    /// Whether this is the shared instance of a singleton factory.
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut Service {
        &mut self.service
    }

    /// End the instance's lifetime, running its release hook unless shared.
    pub fn release(self) {
        match self.service {
            Service::General(mut s) => s.release(),
            Service::FullResponse(mut s) => s.release(),
            Service::Lightweight(s) if !self.shared => s.release(),
            Service::FullRequest(s) if !self.shared => s.release(),
            Service::Lightweight(_) | Service::FullRequest(_) => {}
        }
    }
}
