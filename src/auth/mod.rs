//! Session tokens and user validation.

pub mod jwt;
pub mod validate;

pub use jwt::{Claims, IssuedToken, TokenService};
pub use validate::UserValidator;
