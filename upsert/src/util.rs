/// Prevents downstream crates from implementing extension traits.
pub(crate) trait Sealed {}
