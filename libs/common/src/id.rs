use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = flawk_common::id::prefixed_ulid("usr");
/// assert!(id.starts_with("usr_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Returns true if `id` is `"{prefix}_"` followed by a valid ULID.
///
/// # Examples
/// ```
/// use flawk_common::id::{is_well_formed, prefixed_ulid};
/// assert!(is_well_formed("usr", &prefixed_ulid("usr")));
/// assert!(!is_well_formed("usr", "usr_not-a-ulid"));
/// ```
pub fn is_well_formed(prefix: &str, id: &str) -> bool {
    id.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|ulid| ulid.len() == 26 && Ulid::from_string(ulid).is_ok())
}

/// Well-known ID prefixes.
pub mod prefix {
    pub const USER: &str = "usr";
    pub const NOTIFICATION: &str = "ntf";
    pub const CONNECTION: &str = "cx";
    pub const TOKEN: &str = "tok";
}
