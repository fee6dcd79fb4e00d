//! Caller identity: token issuing and password handling.

pub mod jwt;
pub mod password;

pub use jwt::{TokenClaims, TokenError, TokenIssuer};
pub use password::{PasswordPolicy, PasswordPolicyError, PasswordService};
