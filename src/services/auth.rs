// Auth Collaborator
// The controller only consumes a yes/no login outcome

use regex::Regex;
use serde::Deserialize;

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

pub trait Authenticator {
    fn login(&self, credentials: &Credentials) -> bool;
}

/// Accepts any well-formed e-mail with a long enough password. No account
/// lookup happens.
pub struct FormatCheckAuthenticator {
    email_re: Regex,
    min_password_len: usize,
}

impl Default for FormatCheckAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatCheckAuthenticator {
    pub fn new() -> Self {
        Self {
            email_re: Regex::new(EMAIL_PATTERN).expect("email pattern is valid"),
            min_password_len: MIN_PASSWORD_LEN,
        }
    }

    /// Field-level problems, in form order. Empty when the credentials pass.
    pub fn problems(&self, credentials: &Credentials) -> Vec<&'static str> {
        let mut problems = Vec::new();
        let email = credentials.email.trim();
        if email.is_empty() {
            problems.push("Email is required");
        } else if !self.email_re.is_match(email) {
            problems.push("Please enter a valid email address");
        }

        if credentials.password.is_empty() {
            problems.push("Password is required");
        } else if credentials.password.chars().count() < self.min_password_len {
            problems.push("Password must be at least 8 characters");
        }
        problems
    }
}

impl Authenticator for FormatCheckAuthenticator {
    fn login(&self, credentials: &Credentials) -> bool {
        self.problems(credentials).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_check() {
        let auth = FormatCheckAuthenticator::new();
        assert!(auth.login(&Credentials::new("user@gmail.com", "longenough")));
        assert!(!auth.login(&Credentials::new("user@gmail", "longenough")));
        assert!(!auth.login(&Credentials::new("user@gmail.com", "short")));
        assert_eq!(
            auth.problems(&Credentials::new("", "")),
            vec!["Email is required", "Password is required"]
        );
    }
}
