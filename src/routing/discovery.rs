use std::collections::HashMap;
use std::fmt;

use anyhow::{anyhow, Result};
use tracing::{debug, info};

use super::handler::{BoxedHandler, HandlerUnit};
use super::{HandlerId, Registry};
use crate::error::StartupError;

type Factory<S> = Box<dyn Fn(&S) -> Result<BoxedHandler> + Send + Sync>;

/// Builds handler instances by id.
///
/// Every unit is registered with scoped lifetime: [`Container::resolve`]
/// returns a fresh instance on each call, owned by the caller.
pub struct Container<S> {
    factories: HashMap<HandlerId, Factory<S>>,
}

impl<S> Default for Container<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Container<S> {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a unit under scoped lifetime
    pub fn add_scoped<H: HandlerUnit<S>>(&mut self) -> HandlerId
    where
        S: 'static,
    {
        let id = HandlerId::of::<H>();
        let factory: Factory<S> =
            Box::new(|services: &S| H::build(services).map(|h| Box::new(h) as BoxedHandler));
        self.factories.insert(id, factory);
        id
    }

    /// Create a fresh instance of the unit named by `id`
    pub fn resolve(&self, id: HandlerId, services: &S) -> Result<BoxedHandler> {
        let factory = self
            .factories
            .get(&id)
            .ok_or_else(|| anyhow!("{} is not registered with the container", id))?;
        factory(services)
    }

    pub fn contains(&self, id: HandlerId) -> bool {
        self.factories.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl<S> fmt::Debug for Container<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("units", &self.factories.len())
            .finish()
    }
}

/// One-time registration pass over an explicit table of handler units.
///
/// ```ignore
/// let (registry, container) = Discovery::new()
///     .unit::<StartCommand>()
///     .unit::<HelloText>()
///     .finish()?;
/// ```
///
/// Consumed by [`Discovery::finish`], so it can only run once.
pub struct Discovery<S> {
    registry: Registry,
    container: Container<S>,
}

impl<S> Default for Discovery<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Discovery<S> {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            container: Container::new(),
        }
    }

    /// Register a handler unit under every rule it declares.
    /// A unit with no rules is buildable but never routed to.
    pub fn unit<H: HandlerUnit<S>>(mut self) -> Self
    where
        S: 'static,
    {
        let id = self.container.add_scoped::<H>();
        let rules = H::rules();

        if rules.is_empty() {
            debug!("Handler {} declares no rules and is unreachable", id);
        }

        for rule in rules {
            debug!("Registered {} -> {}", rule, id);
            self.registry.set(rule, id);
        }

        self
    }

    /// Freeze the registry and container
    pub fn finish(self) -> Result<(Registry, Container<S>), StartupError> {
        if self.container.is_empty() {
            return Err(StartupError::NoHandlers);
        }

        info!(
            "Registered {} handler units with {} routes",
            self.container.len(),
            self.registry.len()
        );

        Ok((self.registry, self.container))
    }
}
