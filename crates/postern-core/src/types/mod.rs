//! Core types for Postern

mod account;
mod login;
mod server;
mod user;

pub use account::*;
pub use login::*;
pub use server::*;
pub use user::*;
