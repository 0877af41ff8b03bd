//! Collision-free names for sources inside one bucket.

/// Uppercase the first character of `s`.
pub fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lowercase the first character of `s`.
pub fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Derives unique source names from an entity's dotted path.
pub struct NamingResolver;

impl NamingResolver {
    /// Return `candidate` if it is free, otherwise extend it until it is.
    ///
    /// The first extension appends `_` plus the innermost enclosing path
    /// segment; each further attempt appends the next segment outward. Once
    /// the segments run out the name is doubled until it is free.
    pub fn unique_name(candidate: &str, path: &str, is_taken: impl Fn(&str) -> bool) -> String {
        if !is_taken(candidate) {
            return candidate.to_string();
        }

        let mut segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        segments.pop();

        let mut name = format!("{candidate}_");
        loop {
            match segments.pop() {
                Some(segment) => name.push_str(&upper_first(segment)),
                None => name = name.repeat(2),
            }
            if !is_taken(&name) {
                return name;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn taken(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_free_name_is_kept() {
        let names = taken(&["Other"]);
        let name = NamingResolver::unique_name("User", "com.acme.User", |n| names.contains(n));
        assert_eq!(name, "User");
    }

    #[test]
    fn test_collision_uses_innermost_segment() {
        let names = taken(&["User"]);
        let name = NamingResolver::unique_name("User", "com.acme.billing.User", |n| names.contains(n));
        assert_eq!(name, "User_Billing");
    }

    #[test]
    fn test_walks_outward_then_doubles() {
        let names = taken(&["User", "User_Billing", "User_BillingAcme", "User_BillingAcmeCom"]);
        let name = NamingResolver::unique_name("User", "com.acme.billing.User", |n| names.contains(n));
        assert_eq!(name, "User_BillingAcmeComUser_BillingAcmeCom");
    }

    #[test]
    fn test_idempotent() {
        let names = taken(&["User"]);
        let first = NamingResolver::unique_name("User", "a.b.User", |n| names.contains(n));
        let second = NamingResolver::unique_name("User", "a.b.User", |n| names.contains(n));
        assert_eq!(first, second);
    }

    #[test]
    fn test_distinct_for_many_collisions() {
        let mut names = HashSet::new();
        for _ in 0..6 {
            let name = NamingResolver::unique_name("Item", "x.y.Item", |n| names.contains(n));
            assert!(names.insert(name));
        }
        assert_eq!(names.len(), 6);
    }

    #[test]
    fn test_case_helpers() {
        assert_eq!(upper_first("billing"), "Billing");
        assert_eq!(lower_first("Name"), "name");
        assert_eq!(upper_first(""), "");
    }
}
