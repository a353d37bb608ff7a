// Input validation helpers for account forms

/// Minimum password length in characters
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Pragmatic e-mail check: `local@domain.tld` without whitespace
pub fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.rsplit_once('@') else {
        return false;
    };

    if local.is_empty() || local.len() > 64 || domain.len() > 255 {
        return false;
    }

    if value.chars().any(|c| c.is_whitespace() || c.is_control()) || local.contains('@') {
        return false;
    }

    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    let tld = labels[labels.len() - 1];
    if tld.len() < 2 || !tld.chars().all(|c| c.is_alphabetic()) {
        return false;
    }

    labels.iter().all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_alphanumeric() || c == '-')
    })
}

/// At least eight characters with a letter and a digit
pub fn is_password(value: &str) -> bool {
    value.chars().count() >= MIN_PASSWORD_LENGTH
        && value.chars().any(|c| c.is_ascii_alphabetic())
        && value.chars().any(|c| c.is_ascii_digit())
}
