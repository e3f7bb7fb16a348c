//! Domain types for checkrunner
//!
//! A [`Check`] is one pending resource check handed to the dispatcher by a
//! [`CheckSource`](crate::source::CheckSource). The dispatcher only reads it.

mod check;

pub use check::{Check, CheckId};
