//! Ride-sharing coordination core
//!
//! Rides posted by leaders, join requests from riders, the per-date
//! involvement ledger that keeps a user to one commitment per day, the
//! notification mailbox and the expiry sweep. All mutations go through a
//! transactional [`store::Store`]; notifications are dispatched after commit.

pub mod clock;
pub mod error;
pub mod involvement;
pub mod lifecycle;
pub mod models;
pub mod notifications;
pub mod outbox;
pub mod requests;
pub mod service;
pub mod store;
pub mod sweep;
pub mod validation;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ConflictError, RideError, RideResult};
pub use involvement::{ClearedInvolvement, InvolvementReport};
pub use lifecycle::RideDeletion;
pub use notifications::{NotificationView, RideStatus};
pub use requests::{
    CooldownView, PendingRequestView, REVOCATION_COOLDOWN_MINUTES, SentRequestView,
};
pub use service::RideService;
pub use store::{MemoryStore, PgStore, StoreError};
pub use sweep::{ExpirySweeper, SweepOutcome, SweepReport};
