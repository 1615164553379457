use serde::{Deserialize, Serialize};

/// Outcome category for one candidature, as persisted in the tracker.
///
/// A record starts as `sent` or `error` and moves to one of the
/// `reply_*` states when a reply is classified. Field names are stable:
/// the tracker file doubles as the dedup index and audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Sent,
    Error,
    ReplyPositive,
    ReplyNegative,
    ReplyNeutral,
}

/// One outreach attempt. Never deleted; reply fields are filled in
/// place by the reply-scanning pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidature {
    pub id: u64,
    pub sent_at: String, // "YYYY-MM-DD HH:MM"
    pub company_name: String,
    pub contact_email: String,
    pub city: String,
    pub sector: String,
    pub status: Status,
    pub error_detail: String,
    pub follow_up_due: String, // "YYYY-MM-DD", sent_at + 14 days
    pub reply_received_at: String,
    pub reply_notes: String,
    pub reply_seen: bool,
}

/// A target company row from the source list (CSV or JSON).
/// French aliases match the original column headers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Company {
    #[serde(alias = "nom", default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(alias = "ville", default)]
    pub city: String,
    #[serde(alias = "secteur", default)]
    pub sector: String,
    #[serde(alias = "raison_specifique", default)]
    pub reason: String,
}

impl Company {
    /// Dedup/lookup key; empty when the row has no usable address.
    pub fn email_key(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

/// One message returned by the Mail Fetcher collaborator.
#[derive(Debug, Clone)]
pub struct MessageSummary {
    pub sender_email: String,
    pub subject: String,
    pub date: String, // "YYYY-MM-DD HH:MM"
    pub body_snippet: String,
}

/// Result of the keyword classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Positive,
    Negative,
    Neutral,
}

impl Classification {
    pub fn status(self) -> Status {
        match self {
            Self::Positive => Status::ReplyPositive,
            Self::Negative => Status::ReplyNegative,
            Self::Neutral => Status::ReplyNeutral,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Positive => "réponse positive",
            Self::Negative => "réponse négative",
            Self::Neutral => "réponse reçue",
        }
    }
}
