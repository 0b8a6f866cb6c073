#![forbid(unsafe_code)]

//! Store/observer plumbing between selector state and the rendering layer.
//!
//! - [`Observable`]: a shared, version-tracked value; subscribers run when
//!   it changes.
//! - [`Subscription`]: RAII guard; dropping it unsubscribes.
//!
//! `Rc<RefCell<..>>` inside: observables are single-threaded, matching the
//! selector's cooperative scheduling model.

pub mod observable;

pub use observable::{Observable, Subscription};
