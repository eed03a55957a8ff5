//! Ordering finalized configurations into a build plan.
//!
//! Configurations are nodes, requirements naming another configuration's
//! package are edges. The plan lists configurations so that every dependency
//! precedes its consumers, keeping expander order among independent ones, and
//! groups them into waves that can be built in parallel.

mod dag;

pub use dag::*;
