//! Board access control: role resolution, the permission gate and the
//! write paths that keep cached roles coherent.

pub mod gate;
pub mod membership;
pub mod propagation;
pub mod resolver;

pub use gate::{AccessDecision, AccessGate};
pub use membership::MembershipService;
pub use propagation::CachePropagator;
pub use resolver::RoleResolver;
