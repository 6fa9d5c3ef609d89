//! Services layer for access-service.
//!
//! Assignment storage, context validation and resolution, the access
//! decision procedure and the assignment lifecycle.

mod database;
mod decision;
pub mod error;
mod lifecycle;
pub mod metrics;
pub mod registry;
mod resolver;
mod store;
mod validator;

pub use database::PgAssignmentStore;
pub use decision::AccessDecider;
pub use error::{AccessError, StoreError};
pub use lifecycle::AssignmentManager;
pub use registry::{
    ContextLookup, ContextRecord, InMemoryRegistry, PgEntityRegistry, ScopeLocator, UserDirectory,
};
pub use resolver::ContextResolver;
pub use store::{AssignmentStore, InMemoryAssignmentStore};
pub use validator::ContextValidator;
