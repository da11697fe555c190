/// Router Module Index
///
/// Splits the routing table by access level so that authentication is applied as a layer
/// on whole modules rather than remembered per handler.

/// Routes accessible to anonymous clients.
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware.
pub mod authenticated;
