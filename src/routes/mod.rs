/// Router Module Index
///
/// Splits the portal's routes by how access is enforced.

/// JSON API routes. Open to everyone; handlers resolve the viewer when they need it.
pub mod public;

/// HTML page routes. Every request passes through the access gate first.
pub mod pages;
