//! Wire shapes of the auth API.

use serde::{Deserialize, Serialize};

use crate::domain::UserId;
use crate::domain::ports::{AuthSessionError, AuthUser};

#[derive(Serialize)]
pub(super) struct PasswordGrantDto<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct TokenResponseDto {
    pub access_token: String,
    pub user: UserDto,
}

#[derive(Debug, Deserialize)]
pub(super) struct UserDto {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl TryFrom<UserDto> for AuthUser {
    type Error = AuthSessionError;

    fn try_from(value: UserDto) -> Result<Self, Self::Error> {
        let id = value.id.parse::<UserId>().map_err(|err| {
            AuthSessionError::protocol(format!("auth user id is not a UUID: {err}"))
        })?;
        Ok(Self {
            id,
            email: value.email.filter(|email| !email.is_empty()),
        })
    }
}
