pub mod principal;

pub use principal::{Capability, CurrentPrincipal, Principal};
