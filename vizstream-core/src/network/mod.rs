//! Connection management: one [`Session`] per link, backed by a reader
//! and a writer task sharing state with the handle.

mod io;
mod session;
mod shared;

pub use session::{Session, SessionListener};
pub use shared::Role;
