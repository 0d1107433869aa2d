use shared::Credentials;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CredentialsError {
    #[error("Username must be between 3 and 50 characters long.")]
    UsernameLength,
    #[error("Username can only contain letters, numbers, and underscores.")]
    UsernameCharacters,
    #[error("Password must be at least 6 characters long.")]
    PasswordTooShort,
    #[error("Username and password are required.")]
    Missing,
}

pub fn validate_login(credentials: &Credentials) -> Result<(), CredentialsError> {
    if credentials.username.trim().is_empty() || credentials.password.is_empty() {
        return Err(CredentialsError::Missing);
    }
    Ok(())
}

/// Checks run before a registration request leaves the client.
pub fn validate_registration(credentials: &Credentials) -> Result<(), CredentialsError> {
    let username = &credentials.username;
    let length = username.chars().count();
    if !(3..=50).contains(&length) {
        return Err(CredentialsError::UsernameLength);
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(CredentialsError::UsernameCharacters);
    }
    if credentials.password.chars().count() < 6 {
        return Err(CredentialsError::PasswordTooShort);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(username: &str, password: &str) -> Credentials {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }

    #[test]
    fn registration_rules() {
        assert_eq!(validate_registration(&creds("geo_lab1", "secret1")), Ok(()));
        assert_eq!(
            validate_registration(&creds("ab", "secret1")),
            Err(CredentialsError::UsernameLength)
        );
        assert_eq!(
            validate_registration(&creds(&"x".repeat(51), "secret1")),
            Err(CredentialsError::UsernameLength)
        );
        assert_eq!(
            validate_registration(&creds("rock-hound", "secret1")),
            Err(CredentialsError::UsernameCharacters)
        );
        assert_eq!(
            validate_registration(&creds("rockhound", "12345")),
            Err(CredentialsError::PasswordTooShort)
        );
    }

    #[test]
    fn login_needs_both_fields() {
        assert_eq!(validate_login(&creds("rockhound", "pw")), Ok(()));
        assert_eq!(
            validate_login(&creds("  ", "pw")),
            Err(CredentialsError::Missing)
        );
        assert_eq!(
            validate_login(&creds("rockhound", "")),
            Err(CredentialsError::Missing)
        );
    }
}
