//! Ride service facade
//!
//! [`RideService`] owns the injected collaborators: the store, the
//! notification sink and the clock. The operations themselves live next to
//! the rules they implement (`involvement`, `requests`, `lifecycle`,
//! `notifications`).

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::error::{RideError, RideResult};
use crate::models::User;
use crate::outbox::{Delivery, Outbox};
use crate::store::{NotificationSink, Store, StoreSession};

/// Entry point for every ride, request and notification operation
#[derive(Clone)]
pub struct RideService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
}

impl RideService {
    /// Create a service over a store and a notification sink
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self {
            store,
            notifier,
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a service over a store that also acts as the notification sink
    pub fn from_store<S>(store: S) -> Self
    where
        S: Store + NotificationSink + 'static,
    {
        let store = Arc::new(store);
        Self::new(store.clone(), store)
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Resolve an external identity to its user record
    pub async fn resolve_user(&self, external_id: &str) -> RideResult<User> {
        let mut session = self.begin().await?;
        session
            .user_by_external_id(external_id)
            .await?
            .ok_or_else(|| RideError::not_found("user"))
    }

    /// Look up a user by internal id
    pub async fn user_by_id(&self, id: uuid::Uuid) -> RideResult<User> {
        let mut session = self.begin().await?;
        session
            .user_by_id(id)
            .await?
            .ok_or_else(|| RideError::not_found("user"))
    }

    pub(crate) async fn begin(&self) -> RideResult<Box<dyn StoreSession>> {
        Ok(self.store.begin().await?)
    }

    pub(crate) fn outbox(&self) -> Outbox {
        Outbox::new(self.now())
    }

    pub(crate) async fn dispatch(&self, outbox: Outbox) -> Delivery {
        outbox.dispatch(self.notifier.as_ref()).await
    }
}
