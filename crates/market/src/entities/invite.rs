use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const INVITES_TABLE: &str = "invites";
pub const INVITE_DETAILS_VIEW: &str = "invite_details";
pub const ACCEPT_INVITE_FN: &str = "accept_invite";

/// Discount percentage earned per accepted invite of a well-rated member.
pub const DISCOUNT_PER_GOOD_INVITE: u32 = 2;
const GOOD_REPUTATION_THRESHOLD: f64 = 3.0;

/// Represents an invite code issued by a member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invite {
    pub id: String,
    pub code: String,
    /// Profile that issued the code
    pub inviter_id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub status: InviteStatus,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub accepted_profile_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Expired,
}

impl From<&str> for InviteStatus {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "accepted" => InviteStatus::Accepted,
            "expired" => InviteStatus::Expired,
            _ => InviteStatus::Pending,
        }
    }
}

impl From<InviteStatus> for String {
    fn from(status: InviteStatus) -> Self {
        match status {
            InviteStatus::Pending => "pending".to_string(),
            InviteStatus::Accepted => "accepted".to_string(),
            InviteStatus::Expired => "expired".to_string(),
        }
    }
}

impl Invite {
    /// Past its timestamp or explicitly marked expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now || self.status == InviteStatus::Expired
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_accepted(&self) -> bool {
        self.status == InviteStatus::Accepted
    }
}

/// Row inserted when a member issues a code
#[derive(Debug, Clone, Serialize)]
pub struct NewInvite {
    pub code: String,
    pub email: Option<String>,
    pub inviter_id: String,
    pub status: InviteStatus,
    pub expires_at: DateTime<Utc>,
}

impl NewInvite {
    pub fn new(
        code: String,
        email: Option<String>,
        inviter_id: impl Into<String>,
        valid_for_days: i64,
    ) -> Self {
        Self {
            code,
            email,
            inviter_id: inviter_id.into(),
            status: InviteStatus::Pending,
            expires_at: Utc::now() + Duration::days(valid_for_days),
        }
    }
}

/// Signup request that redeems an invite code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeemInviteRequest {
    pub code: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
}

/// Row of the invite details view: an invite joined with both parties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InviteDetails {
    pub id: String,
    pub code: String,
    pub status: InviteStatus,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub accepted_at: Option<DateTime<Utc>>,
    pub inviter_id: String,
    #[serde(default)]
    pub inviter_name: Option<String>,
    #[serde(default)]
    pub inviter_reputation: Option<f64>,
    #[serde(default)]
    pub invited_name: Option<String>,
    #[serde(default)]
    pub invited_reputation: Option<f64>,
    #[serde(default)]
    pub reputation_effect: Option<f64>,
}

/// Status as presented: expiry wins over acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStatus {
    Expired,
    Accepted,
    Pending,
}

impl InviteDetails {
    pub fn display_status_at(&self, now: DateTime<Utc>) -> DisplayStatus {
        if self.expires_at < now {
            DisplayStatus::Expired
        } else if self.status == InviteStatus::Accepted {
            DisplayStatus::Accepted
        } else {
            DisplayStatus::Pending
        }
    }

    /// Accepted by someone whose reputation is above the discount threshold.
    pub fn is_good_invite(&self) -> bool {
        self.status == InviteStatus::Accepted
            && self
                .invited_reputation
                .is_some_and(|reputation| reputation > GOOD_REPUTATION_THRESHOLD)
    }
}

/// Aggregate over a member's invites
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InviteSummary {
    pub total: usize,
    pub pending: usize,
    pub accepted: usize,
    pub expired: usize,
    pub good_invites: usize,
    /// Percentage discount
    pub discount: u32,
}

impl InviteSummary {
    pub fn from_details_at(details: &[InviteDetails], now: DateTime<Utc>) -> Self {
        let mut summary = Self {
            total: details.len(),
            pending: 0,
            accepted: 0,
            expired: 0,
            good_invites: 0,
            discount: 0,
        };

        for invite in details {
            match invite.display_status_at(now) {
                DisplayStatus::Expired => summary.expired += 1,
                DisplayStatus::Accepted => summary.accepted += 1,
                DisplayStatus::Pending => summary.pending += 1,
            }
            if invite.is_good_invite() {
                summary.good_invites += 1;
            }
        }

        summary.discount = u32::try_from(summary.good_invites)
            .unwrap_or(u32::MAX)
            .saturating_mul(DISCOUNT_PER_GOOD_INVITE);
        summary
    }

    pub fn from_details(details: &[InviteDetails]) -> Self {
        Self::from_details_at(details, Utc::now())
    }
}
