//! Identifier casing.
//!
//! Table names become type names through [`to_upper_camel`]; attribute
//! spellings supplied by callers map back to column names through
//! [`to_snake`]. The two transforms are not exact inverses. Acronym runs and
//! punctuation are lossy across a round trip.

/// Characters removed by [`to_upper_camel`].
const CAMEL_SEPARATORS: [char; 3] = ['_', '-', ' '];

/// Characters removed by [`to_snake`].
const SNAKE_DROPPED: [char; 2] = [' ', '.'];

/// Converts an identifier to `UpperCamelCase`.
///
/// Separators (`_`, `-`, space) are removed. The first retained character
/// and every character following a separator are upper-cased; everything
/// else passes through unchanged.
///
/// ```rust
/// use relmap_core::naming::to_upper_camel;
///
/// assert_eq!(to_upper_camel("user_profile"), "UserProfile");
/// assert_eq!(to_upper_camel("order-ID"), "OrderID");
/// ```
pub fn to_upper_camel(identifier: &str) -> String {
    let mut out = String::with_capacity(identifier.len());
    let mut capitalize = true;

    for c in identifier.chars() {
        if CAMEL_SEPARATORS.contains(&c) {
            capitalize = true;
        } else if capitalize {
            out.extend(c.to_uppercase());
            capitalize = false;
        } else {
            out.push(c);
        }
    }

    out
}

/// Converts an identifier to `snake_case`.
///
/// An underscore goes before an upper-case character unless it is the first
/// character or follows a separator, and only when a neighbour is lower-case,
/// so `HTTPServer` becomes `http_server`. Spaces and periods are dropped.
///
/// ```rust
/// use relmap_core::naming::to_snake;
///
/// assert_eq!(to_snake("firstName"), "first_name");
/// assert_eq!(to_snake("HTTPServer"), "http_server");
/// ```
pub fn to_snake(identifier: &str) -> String {
    let chars: Vec<char> = identifier.chars().collect();
    let mut out = String::with_capacity(identifier.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if SNAKE_DROPPED.contains(&c) {
            continue;
        }

        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next = chars.get(i + 1).copied();
            let after_separator = prev == '_' || SNAKE_DROPPED.contains(&prev);
            let lower_neighbour =
                prev.is_lowercase() || next.map_or(false, char::is_lowercase);
            if !after_separator && lower_neighbour {
                out.push('_');
            }
        }

        out.extend(c.to_lowercase());
    }

    out
}
