//! Utility functions

/// Domain part of an email address, lowercased.
///
/// Returns an empty string when the address has no `@` or nothing after it.
pub fn domain_from_email(email: &str) -> String {
    match email.rfind('@') {
        Some(pos) => email[pos + 1..].trim().to_lowercase(),
        None => String::new(),
    }
}
