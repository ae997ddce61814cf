//! Login event handling
//!
//! [`LoginHandler`] is the entry point called by the host login pipeline.
//! [`AccountResolver`] decides which mail account a login maps to and
//! provisions one on a first directory login.

mod handler;
mod resolver;

pub use handler::{LoginFailure, LoginHandler, LoginOutcome};
pub use resolver::{AccountResolver, Resolution};
