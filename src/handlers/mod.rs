// handlers/mod.rs - Route handlers grouped by resource
//
// Each handler states its guard in its signature: `AuthUser` and `AdminUser`
// reject the request before the body runs, `OptionalUser` never rejects an
// anonymous caller.

pub mod auth;
pub mod categories;
pub mod posts;
pub mod system;
pub mod users;


/// Treat missing and blank strings alike, as required-field checks do.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::non_empty;

    #[test]
    fn blank_strings_count_as_missing() {
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some("  ".into())), None);
        assert_eq!(non_empty(Some("A".into())), Some("A".to_string()));
    }
}
