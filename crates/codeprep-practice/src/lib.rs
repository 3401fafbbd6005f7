pub mod analytics;
pub mod auth;
pub mod catalog;
pub mod daily;
pub mod generation;
pub mod paths;
pub mod seed;

pub use auth::{AuthError, IdentityProvider, LocalIdentityProvider, Session};
pub use paths::{PathError, PathService};
