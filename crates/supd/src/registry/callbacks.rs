//! Callback registrations, grouped by scope.
//!
//! One table serves global, interface and network observers alike. Within a
//! scope, registrations keep their insertion order, which is also the order
//! broadcasts deliver in.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use sup_core::Scope;

use crate::liveness::LivenessMonitor;
use crate::observer::{Observer, ObserverId};

/// One observer registered for one scope, with its liveness monitor.
#[derive(Debug)]
pub struct CallbackRegistration {
    observer: Arc<dyn Observer>,
    monitor: LivenessMonitor,
}

impl CallbackRegistration {
    pub fn new(observer: Arc<dyn Observer>, monitor: LivenessMonitor) -> Self {
        Self { observer, monitor }
    }

    pub fn observer_id(&self) -> ObserverId {
        self.observer.id()
    }

    pub fn monitor(&self) -> &LivenessMonitor {
        &self.monitor
    }
}

/// All callback registrations, keyed by scope.
#[derive(Debug, Default)]
pub struct CallbackTable {
    scopes: HashMap<Scope, Vec<CallbackRegistration>>,
}

impl CallbackTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, scope: &Scope, observer_id: ObserverId) -> bool {
        self.scopes
            .get(scope)
            .is_some_and(|list| list.iter().any(|r| r.observer_id() == observer_id))
    }

    /// Appends a registration. The caller checks [`Self::contains`] first;
    /// a duplicate is handed back untouched.
    pub fn insert(
        &mut self,
        scope: Scope,
        registration: CallbackRegistration,
    ) -> Result<(), CallbackRegistration> {
        if self.contains(&scope, registration.observer_id()) {
            return Err(registration);
        }
        self.scopes.entry(scope).or_default().push(registration);
        Ok(())
    }

    /// Removes one registration and disarms its monitor.
    pub fn remove(
        &mut self,
        scope: &Scope,
        observer_id: ObserverId,
    ) -> Option<CallbackRegistration> {
        let list = self.scopes.get_mut(scope)?;
        let index = list.iter().position(|r| r.observer_id() == observer_id)?;
        let registration = list.remove(index);
        if list.is_empty() {
            self.scopes.remove(scope);
        }
        registration.monitor.disarm();
        Some(registration)
    }

    /// Removes every registration under `scope`, disarming each monitor.
    pub fn clear(&mut self, scope: &Scope) -> Vec<CallbackRegistration> {
        let removed = self.scopes.remove(scope).unwrap_or_default();
        for registration in &removed {
            registration.monitor.disarm();
        }
        removed
    }

    /// Removes everything, disarming each monitor.
    pub fn drain(&mut self) -> Vec<(Scope, CallbackRegistration)> {
        let mut removed = Vec::new();
        for (scope, list) in self.scopes.drain() {
            for registration in list {
                registration.monitor.disarm();
                removed.push((scope.clone(), registration));
            }
        }
        removed
    }

    /// Observers registered under `scope`, in registration order.
    pub fn observers(&self, scope: &Scope) -> Vec<Arc<dyn Observer>> {
        self.scopes
            .get(scope)
            .map(|list| list.iter().map(|r| Arc::clone(&r.observer)).collect())
            .unwrap_or_default()
    }

    /// Every scope `observer_id` is registered under.
    pub fn scopes_of(&self, observer_id: ObserverId) -> Vec<Scope> {
        let mut scopes: Vec<Scope> = self
            .scopes
            .iter()
            .filter(|(_, list)| list.iter().any(|r| r.observer_id() == observer_id))
            .map(|(scope, _)| scope.clone())
            .collect();
        scopes.sort();
        scopes
    }

    pub fn counts(&self) -> BTreeMap<Scope, usize> {
        self.scopes
            .iter()
            .map(|(scope, list)| (scope.clone(), list.len()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.scopes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}
