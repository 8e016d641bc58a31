//! Board documents, identifiers and roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

use crate::error::AuthorizationError;

/// 12-byte document identifier, rendered as 24 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BoardId([u8; 12]);

impl BoardId {
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// A fresh random id.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 12];
        bytes.copy_from_slice(&uuid::Uuid::new_v4().as_bytes()[..12]);
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for BoardId {
    type Err = AuthorizationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|_| AuthorizationError::InvalidBoardId(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for BoardId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for BoardId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Profile identifier. Board documents store these as decimal strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProfileId(pub i64);

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProfileId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<i64> for ProfileId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl Serialize for ProfileId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ProfileId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Author,
    Subscriber,
    Viewer,
    Guest,
    Blocked,
    None,
}

impl Role {
    /// Order in which membership lists are scanned for a direct role.
    pub const DIRECT_PRIORITY: [Role; 7] = [
        Role::Owner,
        Role::Admin,
        Role::Author,
        Role::Subscriber,
        Role::Viewer,
        Role::Guest,
        Role::Blocked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Author => "author",
            Role::Subscriber => "subscriber",
            Role::Viewer => "viewer",
            Role::Guest => "guest",
            Role::Blocked => "blocked",
            Role::None => "none",
        }
    }

    /// Role as shown to callers that do not distinguish guests.
    pub fn external(self) -> Role {
        match self {
            Role::Guest => Role::Viewer,
            other => other,
        }
    }

    /// Role a child board receives from this role on its parent.
    pub fn inherited(self) -> Role {
        match self {
            Role::Owner => Role::Admin,
            other => other,
        }
    }

    pub fn is_manager(self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            "author" => Ok(Role::Author),
            "subscriber" => Ok(Role::Subscriber),
            "viewer" => Ok(Role::Viewer),
            "guest" => Ok(Role::Guest),
            "blocked" => Ok(Role::Blocked),
            "none" | "" => Ok(Role::None),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Visibility {
    Members,
    Contacts,
    Public,
    /// Also what empty or unrecognised values decode to.
    #[default]
    #[serde(other)]
    Private,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    #[serde(rename = "_id")]
    pub id: BoardId,
    pub owner: ProfileId,
    #[serde(default)]
    pub admins: Vec<ProfileId>,
    #[serde(default)]
    pub authors: Vec<ProfileId>,
    #[serde(default)]
    pub subscribers: Vec<ProfileId>,
    #[serde(default)]
    pub viewers: Vec<ProfileId>,
    #[serde(default)]
    pub guests: Vec<ProfileId>,
    #[serde(default)]
    pub blocked: Vec<ProfileId>,
    #[serde(default)]
    pub followers: Vec<ProfileId>,
    #[serde(rename = "parentID", default, deserialize_with = "empty_as_none")]
    pub parent_id: Option<BoardId>,
    #[serde(default)]
    pub visible: Visibility,
}

fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<BoardId>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        Some(s) if !s.is_empty() => s.parse().map(Some).map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

impl Board {
    pub fn new(id: BoardId, owner: ProfileId) -> Self {
        Self {
            id,
            owner,
            admins: Vec::new(),
            authors: Vec::new(),
            subscribers: Vec::new(),
            viewers: Vec::new(),
            guests: Vec::new(),
            blocked: Vec::new(),
            followers: Vec::new(),
            parent_id: None,
            visible: Visibility::default(),
        }
    }

    pub fn with_parent(mut self, parent: BoardId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    pub fn with_member(mut self, profile: ProfileId, role: Role) -> Self {
        self.add_member(profile, role);
        self
    }

    fn list(&self, role: Role) -> Option<&Vec<ProfileId>> {
        match role {
            Role::Admin => Some(&self.admins),
            Role::Author => Some(&self.authors),
            Role::Subscriber => Some(&self.subscribers),
            Role::Viewer => Some(&self.viewers),
            Role::Guest => Some(&self.guests),
            Role::Blocked => Some(&self.blocked),
            Role::Owner | Role::None => None,
        }
    }

    fn list_mut(&mut self, role: Role) -> Option<&mut Vec<ProfileId>> {
        match role {
            Role::Admin => Some(&mut self.admins),
            Role::Author => Some(&mut self.authors),
            Role::Subscriber => Some(&mut self.subscribers),
            Role::Viewer => Some(&mut self.viewers),
            Role::Guest => Some(&mut self.guests),
            Role::Blocked => Some(&mut self.blocked),
            Role::Owner | Role::None => None,
        }
    }

    /// Highest-priority role recorded for `profile` on this board alone.
    pub fn direct_role(&self, profile: ProfileId) -> Role {
        Role::DIRECT_PRIORITY
            .into_iter()
            .find(|role| match role {
                Role::Owner => self.owner == profile,
                _ => self.list(*role).is_some_and(|l| l.contains(&profile)),
            })
            .unwrap_or(Role::None)
    }

    /// Removes `profile` from every membership list and returns the role it held.
    /// The owner is never removed.
    pub fn remove_member(&mut self, profile: ProfileId) -> Role {
        let previous = self.direct_role(profile);
        for role in Role::DIRECT_PRIORITY {
            if let Some(list) = self.list_mut(role) {
                list.retain(|p| *p != profile);
            }
        }
        previous
    }

    /// Moves `profile` into the list for `role`. Returns `false` for roles
    /// that have no list (`owner`, `none`).
    pub fn add_member(&mut self, profile: ProfileId, role: Role) -> bool {
        if self.list(role).is_none() {
            return false;
        }
        self.remove_member(profile);
        if let Some(list) = self.list_mut(role) {
            list.push(profile);
        }
        true
    }

    pub fn is_follower(&self, profile: ProfileId) -> bool {
        self.followers.contains(&profile)
    }

    /// Every listed member with its direct role, owner first.
    pub fn members(&self) -> Vec<(ProfileId, Role)> {
        let mut members = vec![(self.owner, Role::Owner)];
        for role in &Role::DIRECT_PRIORITY[1..] {
            if let Some(list) = self.list(*role) {
                members.extend(list.iter().map(|p| (*p, *role)));
            }
        }
        members
    }
}
