//! Invite issuance and redemption.

use std::sync::Arc;

use bazaar_backend::{AuthUser, Backend, DataApiExt, Direction, Query, Session, SignUpRequest};
use bazaar_config::InviteConfig;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::entities::{
    Invite, InviteDetails, InviteSummary, NewInvite, Profile, RedeemInviteRequest,
    ACCEPT_INVITE_FN, INVITES_TABLE, INVITE_DETAILS_VIEW,
};
use crate::mailer::{InviteEmail, InviteMailer};
use crate::services::require_session;
use crate::types::{MarketError, MarketResult, ValidationErrors};
use crate::utils::{generate_invite_code, normalize_invite_code, Validator};

/// What happened to the optional invite email
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailDelivery {
    NotRequested,
    Sent,
    /// The code exists but the email could not be sent
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct GeneratedInvite {
    pub invite: Invite,
    pub delivery: EmailDelivery,
}

#[derive(Debug, Clone)]
pub struct Redemption {
    pub user: AuthUser,
    pub session: Option<Session>,
    pub invite_id: String,
}

pub struct InviteService {
    backend: Arc<dyn Backend>,
    mailer: Arc<dyn InviteMailer>,
    config: InviteConfig,
}

impl InviteService {
    pub fn new(
        backend: Arc<dyn Backend>,
        mailer: Arc<dyn InviteMailer>,
        config: InviteConfig,
    ) -> Self {
        Self {
            backend,
            mailer,
            config,
        }
    }

    /// Issue a new code on behalf of `inviter`, optionally emailing it.
    pub async fn generate_invite(
        &self,
        inviter: &Profile,
        email: Option<&str>,
    ) -> MarketResult<GeneratedInvite> {
        if !inviter.can_invite() {
            return Err(MarketError::NoInvitesLeft);
        }

        require_session(&*self.backend).await?;

        let email = email.map(str::trim).filter(|email| !email.is_empty());
        if let Some(email) = email {
            Validator::email(email)?;
        }

        let code = generate_invite_code(self.config.code_length);
        let row = NewInvite::new(
            code,
            email.map(str::to_string),
            &inviter.id,
            self.config.expiry_days,
        );

        let invite: Invite = self
            .backend
            .insert_as(INVITES_TABLE, &row)
            .await
            .map_err(|err| {
                if err.is_unique_violation() {
                    MarketError::EmailAlreadyInvited
                } else {
                    error!(error = %err, "failed to create invite");
                    err.into()
                }
            })?;
        info!(invite_id = %invite.id, inviter_id = %inviter.id, "invite created");

        let delivery = match email {
            None => EmailDelivery::NotRequested,
            Some(email) => {
                let message = InviteEmail {
                    email: email.to_string(),
                    code: invite.code.clone(),
                    inviter_name: inviter.full_name.clone(),
                };
                match self.mailer.send_invite(&message).await {
                    Ok(()) => EmailDelivery::Sent,
                    Err(err) => {
                        warn!(error = %err, invite_id = %invite.id, "Failed to send email, but code was generated");
                        EmailDelivery::Failed(err.to_string())
                    }
                }
            }
        };

        Ok(GeneratedInvite { invite, delivery })
    }

    /// Sign up a new member with an invite code.
    ///
    /// The principal is created before the invite is marked accepted. If
    /// acceptance then fails, the principal remains without a profile.
    pub async fn redeem_invite(&self, request: RedeemInviteRequest) -> MarketResult<Redemption> {
        validate_redemption(&request)?;

        let code = normalize_invite_code(&request.code);
        let query = Query::from(INVITES_TABLE).eq("code", &code);
        let invite: Invite = match self.backend.select_single(&query).await {
            Ok(invite) => invite,
            Err(err) if err.is_not_found() => return Err(MarketError::InvalidInviteCode),
            Err(err) => {
                debug!(error = %err, "invite lookup failed");
                return Err(MarketError::InvalidInviteCode);
            }
        };

        if invite.is_accepted() {
            return Err(MarketError::InviteAlreadyUsed);
        }
        if invite.is_expired() {
            return Err(MarketError::InviteExpired);
        }

        let full_name = request.full_name.trim().to_string();
        let outcome = self
            .backend
            .sign_up(SignUpRequest {
                email: request.email.trim().to_string(),
                password: request.password.clone(),
                metadata: json!({ "full_name": full_name, "invite_code": code }),
            })
            .await?;
        info!(user_id = %outcome.user.id, invite_id = %invite.id, "principal created from invite");

        let accepted = self
            .backend
            .rpc(
                ACCEPT_INVITE_FN,
                json!({
                    "invite_id": invite.id,
                    "user_id": outcome.user.id,
                    "full_name": full_name,
                }),
            )
            .await;

        match accepted {
            Ok(Value::Bool(true)) => {}
            Ok(other) => {
                warn!(orphaned_user_id = %outcome.user.id, result = %other, "invite acceptance refused");
                return Err(MarketError::acceptance_failed("invite could not be accepted"));
            }
            Err(err) => {
                warn!(orphaned_user_id = %outcome.user.id, error = %err, "invite acceptance failed");
                return Err(MarketError::acceptance_failed(err.to_string()));
            }
        }

        info!(invite_id = %invite.id, "invite accepted");
        Ok(Redemption {
            user: outcome.user,
            session: outcome.session,
            invite_id: invite.id,
        })
    }

    /// Invites visible to the signed-in member, newest first.
    pub async fn list_invites(&self) -> MarketResult<Vec<InviteDetails>> {
        require_session(&*self.backend).await?;

        let query = Query::from(INVITE_DETAILS_VIEW).order("created_at", Direction::Descending);
        match self.backend.select_as(&query).await {
            Ok(invites) => Ok(invites),
            Err(err) => {
                warn!(error = %err, "failed to load invites");
                Ok(Vec::new())
            }
        }
    }

    pub async fn invite_summary(&self) -> MarketResult<InviteSummary> {
        let invites = self.list_invites().await?;
        Ok(InviteSummary::from_details(&invites))
    }
}

fn validate_redemption(request: &RedeemInviteRequest) -> MarketResult<()> {
    let mut errors = ValidationErrors::default();
    for check in [
        Validator::invite_code(&request.code),
        Validator::email(&request.email),
        Validator::password(&request.password),
        Validator::full_name(&request.full_name),
    ] {
        match check {
            Ok(()) => {}
            Err(MarketError::Validation(found)) => errors.0.extend(found.0),
            Err(other) => return Err(other),
        }
    }
    errors.into_result()
}
