use crate::model::Id;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;

pub const USER_NAME_MAX_LEN: usize = 100;
pub const EMAIL_MAX_LEN: usize = 254;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub name: UserName,
    pub email: Email,
    pub is_admin: bool,
}

/// Registration input. The password is still plaintext here; hashing happens
/// before anything is persisted.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct CreateUser {
    pub name: UserName,
    pub email: Email,
    pub password: String,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct UserName(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The user name is invalid: {0:?}")]
pub struct InvalidUserNameError(String);

impl UserName {
    pub fn new(name: String) -> Result<Self, InvalidUserNameError> {
        let trimmed_len = name.trim().chars().count();
        if trimmed_len > 0 && name.chars().count() <= USER_NAME_MAX_LEN {
            Ok(UserName(name))
        } else {
            Err(InvalidUserNameError(name))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for UserName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        UserName::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"UserName"))
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct Email(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The email address is invalid: {0:?}")]
pub struct InvalidEmailError(String);

impl Email {
    /// Deliberately shallow validation: a local part, an `@`, and a domain.
    /// The unique index on the users table is the real dedup authority.
    pub fn new(email: String) -> Result<Self, InvalidEmailError> {
        let well_formed = email.chars().count() <= EMAIL_MAX_LEN
            && email
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));

        if well_formed {
            Ok(Email(email))
        } else {
            Err(InvalidEmailError(email))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for Email {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Email::new(inner).map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"Email"))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::user::{Email, USER_NAME_MAX_LEN, UserName};

    #[test]
    fn user_name_validation() {
        assert!(UserName::new("Ada Lovelace".to_owned()).is_ok());
        assert!(UserName::new(String::new()).is_err());
        assert!(UserName::new("   ".to_owned()).is_err());
        assert!(UserName::new("x".repeat(USER_NAME_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn email_validation() {
        assert!(Email::new("ada@example.com".to_owned()).is_ok());
        assert!(Email::new("a@x.com".to_owned()).is_ok());
        assert!(Email::new("not-an-email".to_owned()).is_err());
        assert!(Email::new("@example.com".to_owned()).is_err());
        assert!(Email::new("ada@nodot".to_owned()).is_err());
    }
}
