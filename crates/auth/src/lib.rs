//! `devportal-auth` — bearer-token authentication boundary.
//!
//! Decoupled from HTTP and storage: a token goes in, the acting user comes out.

pub mod claims;
pub mod jwt;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
