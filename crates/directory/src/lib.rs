//! Validator directory and service registry.
//!
//! The [`ValidatorDirectory`] holds one [`ValidatorRecord`] per validator a
//! domain knows about: validators registered locally, and mirrors of remote
//! validators enrolled with a local service. The [`ServiceRegistry`] holds
//! the services hosted on the domain, their slash policies, eligibility
//! requirements and rosters.
//!
//! [`ValidatorRecord`]: xstake_types::ValidatorRecord

mod registry;
mod requirements;
mod validators;

pub use registry::{ServiceRecord, ServiceRegistry};
pub use requirements::RequirementTable;
pub use validators::ValidatorDirectory;
