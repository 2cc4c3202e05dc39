//! State management for orders.
//!
//! The transition table decides where an event leads, a short-lived state
//! machine applies it to one order, and interceptors commit the result through
//! a per-order transaction on the order store.

pub mod interceptor;
pub mod machine;
pub mod store;
pub mod transition;

pub use interceptor::{PersistingInterceptor, StateChangeInterceptor, TracingInterceptor};
pub use machine::{OrderStateMachine, Transition};
pub use store::{OrderStore, OrderTransaction};
