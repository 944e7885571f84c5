/// Hard-coded sign-in gate. Purely a UI gate, not a security boundary: the
/// credentials are fixed and only a persistent flag is set on success.
const USERNAME: &str = "test";
const PASSWORD: &str = "1234test";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInError {
    UnknownUser,
    WrongPassword,
}

impl SignInError {
    pub fn message(&self) -> &'static str {
        match self {
            SignInError::UnknownUser => "User not found. Try again.",
            SignInError::WrongPassword => "Password incorrect. Try again.",
        }
    }
}

pub fn verify_credentials(username: &str, password: &str) -> Result<(), SignInError> {
    if username != USERNAME {
        Err(SignInError::UnknownUser)
    } else if password != PASSWORD {
        Err(SignInError::WrongPassword)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_fixed_pair() {
        assert!(verify_credentials("test", "1234test").is_ok());
    }

    #[test]
    fn unknown_user_beats_wrong_password() {
        assert_eq!(
            verify_credentials("admin", "1234test"),
            Err(SignInError::UnknownUser)
        );
        assert_eq!(
            verify_credentials("admin", "nope"),
            Err(SignInError::UnknownUser)
        );
    }

    #[test]
    fn wrong_password_for_known_user() {
        assert_eq!(
            verify_credentials("test", "nope"),
            Err(SignInError::WrongPassword)
        );
    }
}
