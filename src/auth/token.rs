//! Bearer and refresh token wrappers.

pub mod pair;
pub mod secret;
