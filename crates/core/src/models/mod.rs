//! Domain models owned by one authenticated user.

mod chat;
mod checkin;
mod journal;

pub use chat::*;
pub use checkin::*;
pub use journal::*;
