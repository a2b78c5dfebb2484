//! Distinguished-name tokenization and value escaping.
//!
//! DNs are comma-separated RDN sequences (`uid=jdoe,ou=people,dc=example`).
//! Tokenization here is escape-aware per RFC 4514: a comma preceded by an
//! unescaped backslash is part of the value, not a separator, so
//! `cn=Smith\, John,dc=example` has the parent `dc=example`.

/// Splits a DN into its leading RDN and the remainder (the parent DN).
///
/// The split happens at the first unescaped comma; a space after the
/// separator is tolerated. Returns `None` for the remainder when the DN is a
/// single RDN.
pub fn split_dn(dn: &str) -> (&str, Option<&str>) {
    match find_unescaped_comma(dn) {
        Some(pos) => {
            let rest = dn[pos + 1..].trim_start();
            (&dn[..pos], Some(rest))
        }
        None => (dn, None),
    }
}

/// The parent DN, or `None` when the DN is a single RDN.
pub fn parent_dn(dn: &str) -> Option<&str> {
    split_dn(dn).1
}

/// Splits an RDN of the form `attr=value` at the first `=`.
///
/// The value side is returned still escaped; pass it through
/// [`unescape_value`] before interpreting it.
pub fn split_rdn(rdn: &str) -> Option<(&str, &str)> {
    let pos = rdn.find('=')?;
    Some((&rdn[..pos], &rdn[pos + 1..]))
}

/// Escapes an attribute value for inclusion in a DN per RFC 4514.
///
/// Always escapes `, + " \ < > ; =`, hex-escapes NUL, and escapes a space at
/// either end or a `#` at the start.
pub fn escape_value(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }

    let last = value.chars().count() - 1;
    let mut result = String::with_capacity(value.len() * 2);
    for (i, ch) in value.chars().enumerate() {
        match ch {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                result.push('\\');
                result.push(ch);
            }
            '\0' => result.push_str("\\00"),
            ' ' if i == 0 || i == last => result.push_str("\\20"),
            '#' if i == 0 => result.push_str("\\23"),
            _ => result.push(ch),
        }
    }
    result
}

/// Reverses [`escape_value`]: resolves `\c` character escapes and `\XX` hex
/// pairs. Hex pairs are decoded byte-wise, so multi-byte UTF-8 sequences
/// escaped per-byte reassemble correctly; undecodable bytes are replaced.
pub fn unescape_value(value: &str) -> String {
    let mut bytes = Vec::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some(c1) => {
                if let Some(hi) = c1.to_digit(16) {
                    if let Some(lo) = chars.peek().and_then(|c| c.to_digit(16)) {
                        chars.next();
                        bytes.push(((hi << 4) | lo) as u8);
                        continue;
                    }
                }
                // A single escaped character, hex digit or not.
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(c1.encode_utf8(&mut buf).as_bytes());
            }
            // Trailing backslash kept literal.
            None => bytes.push(b'\\'),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn find_unescaped_comma(dn: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, ch) in dn.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == ',' {
            return Some(i);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_dn_basic() {
        let (rdn, rest) = split_dn("uid=jdoe,ou=people,dc=example,dc=com");
        assert_eq!(rdn, "uid=jdoe");
        assert_eq!(rest, Some("ou=people,dc=example,dc=com"));
    }

    #[test]
    fn test_split_dn_single_rdn() {
        assert_eq!(split_dn("dc=com"), ("dc=com", None));
        assert_eq!(parent_dn("dc=com"), None);
    }

    #[test]
    fn test_split_dn_honors_escaped_comma() {
        let (rdn, rest) = split_dn(r"cn=Smith\, John,dc=example");
        assert_eq!(rdn, r"cn=Smith\, John");
        assert_eq!(rest, Some("dc=example"));
    }

    #[test]
    fn test_split_dn_escaped_backslash_is_not_an_escape() {
        // The value ends in an escaped backslash, so the comma separates.
        let (rdn, rest) = split_dn(r"cn=a\\,dc=b");
        assert_eq!(rdn, r"cn=a\\");
        assert_eq!(rest, Some("dc=b"));
    }

    #[test]
    fn test_split_dn_tolerates_space_after_comma() {
        assert_eq!(parent_dn("cn=a, dc=b"), Some("dc=b"));
    }

    #[test]
    fn test_split_rdn() {
        assert_eq!(split_rdn("uid=jdoe"), Some(("uid", "jdoe")));
        assert_eq!(split_rdn("cn=a=b"), Some(("cn", "a=b")));
        assert_eq!(split_rdn("norelation"), None);
    }

    #[test]
    fn test_escape_specials() {
        assert_eq!(escape_value("Smith, John"), r"Smith\, John");
        assert_eq!(escape_value(r"back\slash"), r"back\\slash");
        assert_eq!(escape_value("a<b>c"), r"a\<b\>c");
        assert_eq!(escape_value("#hash"), r"\23hash");
        assert_eq!(escape_value(" padded "), r"\20padded\20");
        assert_eq!(escape_value("inner space"), "inner space");
    }

    #[test]
    fn test_unescape_round_trip() {
        for original in ["Smith, John", "a+b;c", r"back\slash", "plain"] {
            assert_eq!(unescape_value(&escape_value(original)), original);
        }
    }

    #[test]
    fn test_unescape_hex_pairs() {
        assert_eq!(unescape_value(r"Smith\2C John"), "Smith, John");
        assert_eq!(unescape_value(r"Smith\2c John"), "Smith, John");
        // Multi-byte UTF-8 escaped per byte.
        assert_eq!(unescape_value(r"M\C3\BCller"), "Müller");
        // A lone hex digit after the backslash is not a pair.
        assert_eq!(unescape_value(r"a\2x"), "a2x");
    }

    #[test]
    fn test_unescape_trailing_backslash() {
        assert_eq!(unescape_value(r"abc\"), r"abc\");
    }
}
