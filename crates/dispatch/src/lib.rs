//! Primary/fallback routing for named operations
//!
//! Every operation is bound to a pair of implementations with identical
//! argument and result shapes: the primary reaches the remote service, the
//! fallback computes a local substitute. The `Dispatcher` picks one per call
//! from the force-fallback override and the shared `Availability` flag that
//! the `HealthMonitor` keeps current.

pub mod availability;
pub mod binding;
pub mod dispatcher;
pub mod error;
pub mod monitor;

pub use availability::{Availability, AvailabilitySnapshot};
pub use binding::{Operation, OperationBinding, OperationFuture};
pub use dispatcher::{Dispatched, Dispatcher, Route};
pub use error::{Error, Result};
pub use monitor::{HealthMonitor, MonitorHandle};
