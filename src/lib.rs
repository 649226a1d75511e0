//! Plow: field-service round tracking.
//!
//! A worker starts a round over a snapshot of the customer registry, marks
//! stops complete as they go while a GPS stream records the route, and ends
//! the round. Ending archives the round and folds each completed stop into
//! that customer's visit history.
//!
//! [`session::Session`] is the entry point.

pub mod archive;
pub mod error;
pub mod model;
pub mod position;
pub mod reconcile;
pub mod registry;
pub mod round;
pub mod session;
pub mod state;
pub mod storage;
