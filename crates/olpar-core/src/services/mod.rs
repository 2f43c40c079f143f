//! Shared services used across clients.

mod persistence;
mod subscription;

pub use persistence::Persistence;
pub use subscription::Subscription;
