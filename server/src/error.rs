use std::time::Duration;

use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::Json;
use serde::Serialize;
use shared::{ChallengeId, UserId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("already joined challenge {0}")]
    Conflict(ChallengeId),

    #[error("challenge {0} is not active")]
    InactiveChallenge(ChallengeId),

    #[error("ledger operation exceeded the {0:?} deadline")]
    ConcurrencyTimeout(Duration),

    #[error("an aggregate for user {user_id} would drop below zero; clamped to zero")]
    InvariantViolation { user_id: UserId },

    #[error(transparent)]
    Storage(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl LedgerError {
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "validation",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::Conflict(_) => "conflict",
            LedgerError::InactiveChallenge(_) => "inactive_challenge",
            LedgerError::ConcurrencyTimeout(_) => "concurrency_timeout",
            LedgerError::InvariantViolation { .. } => "invariant_violation",
            LedgerError::Storage(_) | LedgerError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> Status {
        match self {
            LedgerError::Validation(_) | LedgerError::InactiveChallenge(_) => Status::BadRequest,
            LedgerError::NotFound(_) => Status::NotFound,
            LedgerError::Conflict(_) => Status::Conflict,
            LedgerError::ConcurrencyTimeout(_) => Status::GatewayTimeout,
            LedgerError::InvariantViolation { .. }
            | LedgerError::Storage(_)
            | LedgerError::Internal(_) => Status::InternalServerError,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for LedgerError {
    fn respond_to(self, request: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status == Status::InternalServerError {
            tracing::error!("request failed: {self:#}");
        }
        let body = Json(ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        });
        let mut response = body.respond_to(request)?;
        response.set_status(status);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_by_kind() {
        assert_eq!(
            LedgerError::Validation("bad".into()).status(),
            Status::BadRequest
        );
        assert_eq!(LedgerError::NotFound("activity").status(), Status::NotFound);
        assert_eq!(LedgerError::Conflict(7).status(), Status::Conflict);
        assert_eq!(
            LedgerError::ConcurrencyTimeout(Duration::from_secs(5)).status(),
            Status::GatewayTimeout
        );
    }
}
