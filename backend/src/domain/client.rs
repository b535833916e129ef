//! Client records and the profile form that edits them.
//!
//! A [`Client`] is a persisted diver with a server-assigned [`ClientId`]. The
//! editable part lives in [`ClientProfile`], which is also what a draft holds
//! before its first save. Drafts are identified by a random [`DraftId`] that
//! never reaches storage.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Server-assigned client identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(i64);

impl ClientId {
    /// Wrap a raw storage identifier.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Access the raw storage identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Placeholder identity for a client form that has not been saved yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DraftId(Uuid);

impl DraftId {
    /// Generate a fresh placeholder identity.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "draft-{}", self.0)
    }
}

/// Identity of the client currently open in a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKey {
    /// A stored client.
    Persisted(ClientId),
    /// An unsaved form.
    Draft(DraftId),
}

impl ClientKey {
    /// Return the storage identifier when the client has one.
    #[must_use]
    pub const fn persisted(self) -> Option<ClientId> {
        match self {
            Self::Persisted(id) => Some(id),
            Self::Draft(_) => None,
        }
    }

    /// Whether this key refers to an unsaved draft.
    #[must_use]
    pub const fn is_draft(self) -> bool {
        matches!(self, Self::Draft(_))
    }
}

/// Diver certification level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CertificationLevel {
    /// Entry-level certification.
    #[serde(rename = "Open Water")]
    OpenWater,
    /// Advanced open water.
    #[serde(rename = "Advanced Open Water")]
    Advanced,
    /// Rescue diver.
    #[serde(rename = "Rescue Diver")]
    Rescue,
    /// Divemaster.
    #[serde(rename = "Divemaster")]
    Divemaster,
    /// Instructor.
    #[serde(rename = "Instructor")]
    Instructor,
}

impl CertificationLevel {
    /// Every level, lowest first.
    pub const ALL: [Self; 5] = [
        Self::OpenWater,
        Self::Advanced,
        Self::Rescue,
        Self::Divemaster,
        Self::Instructor,
    ];

    /// Label shown in forms and stored by the backend.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::OpenWater => "Open Water",
            Self::Advanced => "Advanced Open Water",
            Self::Rescue => "Rescue Diver",
            Self::Divemaster => "Divemaster",
            Self::Instructor => "Instructor",
        }
    }

    /// Short code used on trip manifests.
    #[must_use]
    pub const fn manifest_code(self) -> &'static str {
        match self {
            Self::OpenWater => "OW",
            Self::Advanced => "AOW",
            Self::Rescue => "RD",
            Self::Divemaster => "DM",
            Self::Instructor => "INS",
        }
    }
}

impl fmt::Display for CertificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a certification label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown certification level: {0}")]
pub struct UnknownCertification(pub String);

impl FromStr for CertificationLevel {
    type Err = UnknownCertification;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|level| {
                level.label().eq_ignore_ascii_case(wanted)
                    || level.manifest_code().eq_ignore_ascii_case(wanted)
            })
            .or_else(|| match wanted.to_ascii_lowercase().as_str() {
                "advanced" => Some(Self::Advanced),
                "rescue" => Some(Self::Rescue),
                _ => None,
            })
            .ok_or_else(|| UnknownCertification(wanted.to_owned()))
    }
}

/// Validation failures for [`ClientProfile`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientValidationError {
    /// First name was blank.
    #[error("first name is required")]
    MissingFirstName,
    /// Last name was blank.
    #[error("last name is required")]
    MissingLastName,
    /// Email was present but not an address.
    #[error("email address is not valid: {0}")]
    MalformedEmail(String),
}

impl ClientValidationError {
    /// Name of the offending form field.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::MissingFirstName => "firstName",
            Self::MissingLastName => "lastName",
            Self::MalformedEmail(_) => "email",
        }
    }
}

/// The editable part of a client record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientProfile {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Contact email.
    pub email: Option<String>,
    /// Contact phone number.
    pub phone: Option<String>,
    /// Highest certification held.
    pub certification: Option<CertificationLevel>,
    /// Date of the most recent logged dive.
    pub last_dive: Option<NaiveDate>,
    /// Free-text notes.
    #[serde(default)]
    pub notes: String,
}

impl ClientProfile {
    /// Start a profile with the two required fields filled in.
    pub fn named(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Self::default()
        }
    }

    /// Set the contact email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the certification level.
    #[must_use]
    pub const fn with_certification(mut self, level: CertificationLevel) -> Self {
        self.certification = Some(level);
        self
    }

    /// Check the required fields before anything is sent to storage.
    ///
    /// # Errors
    ///
    /// Returns the first [`ClientValidationError`] found.
    pub fn validate(&self) -> Result<(), ClientValidationError> {
        if self.first_name.trim().is_empty() {
            return Err(ClientValidationError::MissingFirstName);
        }
        if self.last_name.trim().is_empty() {
            return Err(ClientValidationError::MissingLastName);
        }
        if let Some(raw) = self.email.as_deref() {
            let email = raw.trim();
            if !email.is_empty() && !email.contains('@') {
                return Err(ClientValidationError::MalformedEmail(email.to_owned()));
            }
        }
        Ok(())
    }

    /// "First Last" as shown in lists.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }

    /// Case-insensitive substring match on first name, last name and email.
    ///
    /// `needle` must already be lower-cased.
    pub(crate) fn matches_lowercase(&self, needle: &str) -> bool {
        self.first_name.to_lowercase().contains(needle)
            || self.last_name.to_lowercase().contains(needle)
            || self
                .email
                .as_deref()
                .is_some_and(|email| email.to_lowercase().contains(needle))
    }
}

/// A stored client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// Storage identity.
    pub id: ClientId,
    /// Editable fields.
    #[serde(flatten)]
    pub profile: ClientProfile,
}

impl Client {
    /// Pair an identifier with a profile.
    #[must_use]
    pub const fn new(id: ClientId, profile: ClientProfile) -> Self {
        Self { id, profile }
    }

    /// "First Last" as shown in lists.
    #[must_use]
    pub fn full_name(&self) -> String {
        self.profile.full_name()
    }

    /// Case-insensitive list order: last name, first name, then id.
    #[must_use]
    pub fn listing_key(&self) -> (String, String, ClientId) {
        (
            self.profile.last_name.to_lowercase(),
            self.profile.first_name.to_lowercase(),
            self.id,
        )
    }
}
