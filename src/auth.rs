//! Auth-domain credentials and token models.

pub mod credentials;
pub mod token;

pub use credentials::*;
pub use token::{pair::*, secret::*};
