//! Outcome classification at the service boundary.

use std::fmt;

use lockbox_common::Error;

/// Coarse result of a manager operation as seen by a transport layer.
///
/// Authentication failures are reported as [`Status::Internal`]: a wrong key
/// and a corrupted record are indistinguishable to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    Conflict,
    NotFound,
    BadRequest,
    Internal,
}

impl Status {
    /// Classify an error.
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::AlreadyExists(_) => Status::Conflict,
            Error::NotFound(_) => Status::NotFound,
            Error::Validation(_) => Status::BadRequest,
            Error::Authentication(_)
            | Error::Internal(_)
            | Error::Storage(_)
            | Error::Serialization(_)
            | Error::Io(_) => Status::Internal,
        }
    }

    /// Classify an operation result.
    pub fn of<T>(result: &lockbox_common::Result<T>) -> Self {
        match result {
            Ok(_) => Status::Ok,
            Err(e) => Self::from_error(e),
        }
    }

    /// Equivalent HTTP status code.
    pub fn http_code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Conflict => 409,
            Status::NotFound => 404,
            Status::BadRequest => 400,
            Status::Internal => 500,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Ok => "ok",
            Status::Conflict => "conflict",
            Status::NotFound => "not found",
            Status::BadRequest => "bad request",
            Status::Internal => "internal error",
        };
        f.write_str(name)
    }
}
