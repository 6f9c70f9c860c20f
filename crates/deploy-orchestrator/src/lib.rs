//! Deployment Target Orchestrator
//!
//! Publishes a build artifact (a static site bundle or a compute task) onto
//! the first available hosting backend in a priority-ordered chain, then
//! tracks the live deployment so it can be torn down later.

pub mod adapters;
pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod orchestrator;

pub use config::Config;
pub use credentials::{AssertionMinter, Credential, CredentialProvider, CredentialSource};
pub use dispatcher::{dispatch, NO_BACKEND_CONFIGURED};
pub use orchestrator::Orchestrator;
