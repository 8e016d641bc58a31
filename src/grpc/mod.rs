//! gRPC surface: the AuthService server and the People client.

pub mod auth_service;
pub mod people;

/// Generated AuthService types.
pub mod auth {
    tonic::include_proto!("sidekiq.auth.v1");
}

pub use auth_service::AuthServiceImpl;
pub use people::{GrpcPeopleClient, PeopleService};
