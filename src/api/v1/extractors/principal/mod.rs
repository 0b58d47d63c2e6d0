/*!
 * Authenticated principal extractor
 *
 * Responsibility:
 * - Hand the Principal the gate installed for this request to handlers
 * - Keep HTTP / axum wiring in core, the type contract in types
 *
 * Public API:
 * - Principal, Capability
 * - CurrentPrincipal
 */

mod core;
mod types;

pub use core::CurrentPrincipal;
pub use types::{Capability, Principal};
