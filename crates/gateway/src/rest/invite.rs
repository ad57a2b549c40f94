//! Invite email delivery endpoint

use std::sync::Arc;

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use bazaar_backend::AuthApi;
use bazaar_market::InviteEmail;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::error::{ErrorResponse, GatewayError, GatewayResult};
use crate::middleware::bearer_token;
use crate::state::GatewayState;

const FIELDS_REQUIRED: &str = "Email and code are required";
const DELIVERY_FAILED: &str = "Failed to send invite email";

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendInviteRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SendInviteResponse {
    pub success: bool,
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[utoipa::path(
    post,
    path = "/api/send-invite",
    tag = "Invites",
    request_body = SendInviteRequest,
    responses(
        (status = 200, description = "Invite handed to the mailer", body = SendInviteResponse),
        (status = 400, description = "Email or code missing", body = ErrorResponse),
        (status = 401, description = "No valid bearer session", body = ErrorResponse),
        (status = 500, description = "Unreadable body or delivery failed", body = ErrorResponse)
    ),
    security(("bearerAuth" = []))
)]
pub async fn send_invite(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> GatewayResult<Json<SendInviteResponse>> {
    // Parsed regardless of content type; an unreadable body is a delivery failure.
    let request: SendInviteRequest = serde_json::from_slice(&body)
        .map_err(|err| GatewayError::internal(DELIVERY_FAILED, err))?;
    let (Some(email), Some(code)) = (present(request.email), present(request.code)) else {
        return Err(GatewayError::InvalidRequest(FIELDS_REQUIRED.to_string()));
    };

    let token = bearer_token(&headers).ok_or(GatewayError::Unauthorized)?;
    let user = state.backend.get_user(token).await.map_err(|err| {
        debug!(error = %err, "bearer token rejected");
        GatewayError::Unauthorized
    })?;

    let inviter_name = match state.profiles.find_by_user(&user.id).await {
        Ok(profile) => profile.and_then(|profile| profile.full_name),
        Err(err) => {
            warn!(user_id = %user.id, error = %err, "could not load inviter profile");
            None
        }
    };

    let message = InviteEmail {
        email,
        code,
        inviter_name,
    };
    state
        .mailer
        .send_invite(&message)
        .await
        .map_err(|err| GatewayError::internal(DELIVERY_FAILED, err))?;

    info!(user_id = %user.id, "invite email dispatched");
    Ok(Json(SendInviteResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_count_as_missing() {
        assert_eq!(present(Some("  ".into())), None);
        assert_eq!(present(None), None);
        assert_eq!(present(Some(" a@b.co ".into())), Some("a@b.co".to_string()));
    }

    #[test]
    fn absent_fields_deserialize_as_none() {
        let request: SendInviteRequest = serde_json::from_slice(b"{}").expect("empty object");
        assert!(request.email.is_none() && request.code.is_none());
        assert!(serde_json::from_slice::<SendInviteRequest>(b"not json").is_err());
    }
}
