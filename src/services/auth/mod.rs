pub mod credential;
pub mod identity;
pub mod pipeline;
pub mod resolver;
pub mod scope;

pub use identity::Identity;
pub use pipeline::{AuthConfig, AuthPipeline};
pub use resolver::{HttpIdentityResolver, IdentityResolver, ResolveError};
pub use scope::{ScopeError, ScopeSet};
