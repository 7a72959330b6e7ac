//! `invoicechain-auth`: caller authentication boundary.
//!
//! Maps a bearer token to the account address a request acts as. Decoupled
//! from HTTP and storage.

pub mod claims;
pub mod jwt;

pub use claims::{CallerClaims, TokenValidationError, validate_claims};
pub use jwt::{AuthError, Hs256JwtValidator, JwtValidator};
