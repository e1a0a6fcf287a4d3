//! Stable point identifiers.
//!
//! Qdrant only accepts unsigned integers or UUIDs as point ids, while the
//! platform hands out short base-36 strings. [`derive_point_id`] bridges the
//! two with a name-based UUID (v5) under a fixed namespace, so the mapping
//! is reproducible across restarts without any stored state.

use uuid::Uuid;

/// Namespace for all derived point ids. Changing it orphans every stored point.
pub const POINT_ID_NAMESPACE: Uuid = Uuid::NAMESPACE_OID;

/// Map a platform-native comment id to its vector-store point id.
///
/// ```rust
/// use threadsync::ids::derive_point_id;
///
/// let id = derive_point_id("abc123");
/// assert_eq!(id.to_string(), "696647a0-9c12-5a5e-9299-c6bc6ee9cd55");
/// assert_eq!(id, derive_point_id("abc123"));
/// ```
pub fn derive_point_id(native_id: &str) -> Uuid {
    Uuid::new_v5(&POINT_ID_NAMESPACE, native_id.as_bytes())
}
