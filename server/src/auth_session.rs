use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::rand::SecureRandom;

const TOKEN_LENGTH: usize = 32;

/// Random bearer token identifying a logged-in client session.
///
/// The token is handed out to the client once, at login. The data_store only keeps its SHA-256
/// digest (see [SessionToken::digest]), so leaked database contents can't be used to take over
/// sessions.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    value: [u8; TOKEN_LENGTH],
}

impl SessionToken {
    /// Generate a new random session token, using the system's secure random number generator.
    pub fn generate() -> Result<Self, SessionError> {
        let mut value = [0u8; TOKEN_LENGTH];
        ring::rand::SystemRandom::new()
            .fill(&mut value)
            .map_err(|_| SessionError::RandomGeneratorFailed)?;
        Ok(Self { value })
    }

    /// Parse a session token from its string representation, as sent by the client in the
    /// `Authorization: Bearer` header.
    pub fn from_string(data: &str) -> Result<Self, SessionError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(data.trim())
            .map_err(|_| SessionError::InvalidTokenFormat)?;
        let value: [u8; TOKEN_LENGTH] = bytes
            .try_into()
            .map_err(|_| SessionError::InvalidTokenFormat)?;
        Ok(Self { value })
    }

    pub fn as_string(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.value)
    }

    /// The SHA-256 digest of the token, which is used as the session's key in the data_store.
    pub fn digest(&self) -> Vec<u8> {
        ring::digest::digest(&ring::digest::SHA256, &self.value)
            .as_ref()
            .to_vec()
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SessionError {
    InvalidTokenFormat,
    RandomGeneratorFailed,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::InvalidTokenFormat => f.write_str("Session token has an invalid format"),
            SessionError::RandomGeneratorFailed => {
                f.write_str("Could not generate random session token")
            }
        }
    }
}

impl std::error::Error for SessionError {}
