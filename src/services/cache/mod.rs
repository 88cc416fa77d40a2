pub mod identity;

pub use identity::{DEFAULT_TTL, IdentityCache};
