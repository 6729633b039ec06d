/// Identity resolution
///
/// Validates bearer credentials against the external identity provider and
/// maps them to a stable external subject. Resolution results are cached
/// in-process with a short TTL.

pub mod resolver;

pub use resolver::{IdentityResolver, ResolvedIdentity};
