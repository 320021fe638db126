//!
//! goalmusic record model
//! ----------------------
//! `UserRecord` is the persisted document. Everything that leaves the service
//! through a read path goes through `PublicUser`, which has no credential
//! field at all, so a stored `access_token` cannot be serialized by accident.
//!
//! Partial updates are expressed as a `FieldMask`: an explicit list of the
//! fields present in the request. The record id is never part of a mask.

use serde::{Deserialize, Serialize};

/// A stored user preference record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Unique key; immutable once stored.
    pub id: String,
    /// Reference to the track played on goal (e.g. a Spotify URI).
    pub goal_music_uri: String,
    /// Opaque bearer string gating mutation and deletion of this record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl UserRecord {
    /// True when `presented` may mutate this record: either the record holds
    /// no credential, or the presented one is exactly equal to it.
    pub fn authorizes(&self, presented: Option<&str>) -> bool {
        match self.access_token.as_deref() {
            None => true,
            Some(stored) => presented == Some(stored),
        }
    }
}

/// Read view of a user record. Deliberately has no credential field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub goal_music_uri: String,
}

impl From<&UserRecord> for PublicUser {
    fn from(r: &UserRecord) -> Self {
        Self { id: r.id.clone(), goal_music_uri: r.goal_music_uri.clone() }
    }
}

impl From<UserRecord> for PublicUser {
    fn from(r: UserRecord) -> Self {
        Self { id: r.id, goal_music_uri: r.goal_music_uri }
    }
}

/// PATCH request body. `goal_music_uri` is required, so a body without it is
/// rejected at extraction. `id` is accepted so that clients may send a full
/// record, but it is dropped when building the mask.
#[derive(Debug, Clone, Deserialize)]
pub struct UserPatch {
    #[serde(default)]
    pub id: Option<String>,
    pub goal_music_uri: String,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl UserPatch {
    /// Credential presented with this request, if any.
    pub fn presented_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn into_mask(self) -> FieldMask {
        let mut mask = FieldMask::default();
        mask.set(UserField::GoalMusicUri(self.goal_music_uri));
        if let Some(tok) = self.access_token {
            mask.set(UserField::AccessToken(tok));
        }
        mask
    }
}

/// A single mutable field of a user record together with its new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserField {
    GoalMusicUri(String),
    AccessToken(String),
}

impl UserField {
    pub fn name(&self) -> &'static str {
        match self {
            UserField::GoalMusicUri(_) => "goal_music_uri",
            UserField::AccessToken(_) => "access_token",
        }
    }
}

/// Set of fields explicitly present in an update, in first-set order.
/// Setting the same field twice keeps the later value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMask {
    fields: Vec<UserField>,
}

impl FieldMask {
    pub fn set(&mut self, field: UserField) {
        let name = field.name();
        match self.fields.iter_mut().find(|f| f.name() == name) {
            Some(slot) => *slot = field,
            None => self.fields.push(field),
        }
    }

    pub fn is_empty(&self) -> bool { self.fields.is_empty() }

    pub fn len(&self) -> usize { self.fields.len() }

    pub fn iter(&self) -> impl Iterator<Item = &UserField> { self.fields.iter() }

    /// Names of the present fields, for logging.
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(UserField::name).collect()
    }

    /// Merge the present fields into `record`. The id is never touched.
    pub fn apply(&self, record: &mut UserRecord) {
        for field in &self.fields {
            match field {
                UserField::GoalMusicUri(uri) => record.goal_music_uri = uri.clone(),
                UserField::AccessToken(tok) => record.access_token = Some(tok.clone()),
            }
        }
    }
}

/// Body of a bulk delete response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteManyResponse {
    pub deleted_count: u64,
}
