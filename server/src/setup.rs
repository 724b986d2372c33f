use std::env;
use std::env::VarError;
use std::fmt::{Display, Formatter};

const DEFAULT_TIMEZONE: chrono_tz::Tz = chrono_tz::Europe::Madrid;
const DEFAULT_SESSION_MAX_AGE_DAYS: i64 = 30;

/// Get the database URL from the environment variable.
pub fn get_database_url_from_env() -> Result<String, SetupError> {
    env::var("DATABASE_URL").map_err(|e| SetupError::from_env_error(e, "DATABASE_URL"))
}

/// Get the web server TCP listening port from the environment variable
pub fn get_listen_port_from_env() -> Result<u16, SetupError> {
    env::var("LISTEN_PORT")
        .map_err(|e| SetupError::from_env_error(e, "LISTEN_PORT"))
        .and_then(|v| {
            v.parse().map_err(|_| SetupError::EnvVariableInvalid {
                variable_name: "LISTEN_PORT",
                problem: "Not a valid uint16",
            })
        })
}

/// Get the web server TCP listening interface address from the environment variable
pub fn get_listen_address_from_env() -> Result<String, SetupError> {
    env::var("LISTEN_ADDRESS").map_err(|e| SetupError::from_env_error(e, "LISTEN_ADDRESS"))
}

/// Get the local timezone of the school, which is used for rendering times in user-facing
/// messages, from the TIMEZONE environment variable. Defaults to Europe/Madrid.
pub fn get_timezone_from_env() -> Result<chrono_tz::Tz, SetupError> {
    match env::var("TIMEZONE") {
        Err(VarError::NotPresent) => Ok(DEFAULT_TIMEZONE),
        Err(e) => Err(SetupError::from_env_error(e, "TIMEZONE")),
        Ok(v) => v.trim().parse().map_err(|_| SetupError::EnvVariableInvalid {
            variable_name: "TIMEZONE",
            problem: "Not a known IANA timezone name",
        }),
    }
}

/// Get the maximum age of client sessions from the SESSION_MAX_AGE_DAYS environment variable.
/// Defaults to 30 days.
pub fn get_session_max_age_from_env() -> Result<chrono::Duration, SetupError> {
    let days = match env::var("SESSION_MAX_AGE_DAYS") {
        Err(VarError::NotPresent) => DEFAULT_SESSION_MAX_AGE_DAYS,
        Err(e) => return Err(SetupError::from_env_error(e, "SESSION_MAX_AGE_DAYS")),
        Ok(v) => v
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|days| *days > 0)
            .ok_or(SetupError::EnvVariableInvalid {
                variable_name: "SESSION_MAX_AGE_DAYS",
                problem: "Not a positive number of days",
            })?,
    };
    chrono::Duration::try_days(days).ok_or(SetupError::EnvVariableInvalid {
        variable_name: "SESSION_MAX_AGE_DAYS",
        problem: "Out of range",
    })
}

#[derive(Debug)]
pub enum SetupError {
    EnvVariableMissing {
        variable_name: &'static str,
    },
    EnvVariableInvalid {
        variable_name: &'static str,
        problem: &'static str,
    },
}

impl SetupError {
    fn from_env_error(error: VarError, variable_name: &'static str) -> Self {
        match error {
            VarError::NotPresent => Self::EnvVariableMissing { variable_name },
            VarError::NotUnicode(_) => Self::EnvVariableInvalid {
                variable_name,
                problem: "no valid unicode",
            },
        }
    }
}

impl Display for SetupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SetupError::EnvVariableMissing { variable_name } => {
                write!(f, "Environment variable {} must be defined", variable_name)
            }
            SetupError::EnvVariableInvalid {
                variable_name,
                problem,
            } => write!(
                f,
                "Value of environment variable {} is invalid: {}",
                variable_name, problem
            ),
        }
    }
}

impl std::error::Error for SetupError {}
