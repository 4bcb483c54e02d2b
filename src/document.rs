//! Document codec - entity <-> flat JSON document
//!
//! Each entity is stored as one JSON object in a `data` column. References
//! to other entities are written as names only. On decode every name is
//! resolved against the supplied registry (or platform) and names that do
//! not resolve are skipped; only a malformed document fails the decode.
//!
//! Nothing here touches storage.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use crate::group::{Group, ServerId};
use crate::platform::Platform;
use crate::privilege::Privilege;
use crate::registry::{GroupId, GroupRegistry};
use crate::track::Track;
use crate::user::User;
use crate::{Error, Result};

/// Stored form of a [`User`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(rename = "super")]
    pub super_user: bool,
    pub privileges: Vec<String>,
    pub groups: Vec<String>,
}

/// Stored form of a [`Group`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDocument {
    #[serde(deserialize_with = "int_or_numeric_string")]
    pub priority: i32,
    pub privileges: Vec<String>,
    pub inherit: Vec<String>,
    pub worlds: Vec<String>,
    pub servers: Vec<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
}

/// Stored form of a [`Track`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDocument {
    pub isdefault: bool,
    pub groups: Vec<String>,
}

/// Serialize a document to the text stored in the `data` column
pub fn to_json<T: Serialize>(document: &T) -> Result<String> {
    Ok(serde_json::to_string(document)?)
}

/// Parse the text of a `data` column
pub fn from_json<'a, T: Deserialize<'a>>(json: &'a str) -> Result<T> {
    serde_json::from_str(json).map_err(|e| Error::Document(e.to_string()))
}

// ========== Encode ==========

pub fn encode_user(user: &User, groups: &GroupRegistry) -> UserDocument {
    UserDocument {
        prefix: user.prefix.clone(),
        suffix: user.suffix.clone(),
        super_user: user.super_user,
        privileges: tokens(&user.privileges),
        groups: names(user.groups(), groups),
    }
}

pub fn encode_group(group: &Group, groups: &GroupRegistry) -> GroupDocument {
    GroupDocument {
        priority: group.priority,
        privileges: tokens(&group.privileges),
        inherit: names(&group.inheritance, groups),
        worlds: group.worlds.clone(),
        servers: group.servers.iter().map(ToString::to_string).collect(),
        prefix: group.prefix.clone(),
        suffix: group.suffix.clone(),
    }
}

pub fn encode_track(track: &Track, groups: &GroupRegistry) -> TrackDocument {
    TrackDocument {
        isdefault: track.default_track,
        groups: names(&track.groups, groups),
    }
}

fn tokens(privileges: &[Privilege]) -> Vec<String> {
    privileges.iter().map(Privilege::to_token).collect()
}

/// Ids that no longer resolve (removed from the registry) are omitted.
fn names(ids: &[GroupId], groups: &GroupRegistry) -> Vec<String> {
    ids.iter()
        .filter_map(|id| groups.name_of(*id))
        .map(str::to_string)
        .collect()
}

// ========== Decode ==========

pub fn decode_user(uuid: Uuid, name: &str, doc: &UserDocument, groups: &GroupRegistry) -> User {
    let mut user = User::new(uuid, name);
    user.prefix = doc.prefix.clone();
    user.suffix = doc.suffix.clone();
    user.super_user = doc.super_user;

    for privilege in doc.privileges.iter().filter_map(|t| Privilege::parse(t)) {
        user.grant(privilege);
    }
    for id in resolve_groups(&doc.groups, groups) {
        user.add_group(id);
    }
    user
}

/// Decoded mutable fields of a group, ready to overwrite a registry entry.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupFields {
    pub priority: i32,
    pub privileges: Vec<Privilege>,
    pub inheritance: Vec<GroupId>,
    pub worlds: Vec<String>,
    pub servers: Vec<ServerId>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
}

impl GroupFields {
    /// Overwrite every mutable field of `group` in place.
    pub fn apply(self, group: &mut Group) {
        group.reset();
        group.priority = self.priority;
        for privilege in self.privileges {
            group.grant(privilege);
        }
        for parent in self.inheritance {
            // self-references were dropped while decoding
            let _ = group.inherit(parent);
        }
        group.worlds = self.worlds;
        group.servers = self.servers;
        group.prefix = self.prefix;
        group.suffix = self.suffix;
    }
}

/// Decode a group document owned by the group named `owner`.
pub fn decode_group(
    owner: &str,
    doc: &GroupDocument,
    groups: &GroupRegistry,
    platform: &dyn Platform,
) -> GroupFields {
    let owner_id = groups.id_of(owner);

    let inheritance = resolve_groups(&doc.inherit, groups)
        .into_iter()
        .filter(|id| Some(*id) != owner_id)
        .collect();

    let worlds = doc
        .worlds
        .iter()
        .filter(|w| platform.world_exists(w))
        .cloned()
        .collect();

    let mut servers: Vec<ServerId> = Vec::new();
    for raw in &doc.servers {
        match ServerId::parse(raw) {
            Ok(server) if !servers.contains(&server) => servers.push(server),
            Ok(_) => {}
            Err(_) => tracing::debug!("Skipping unparsable server id {:?} in group {}", raw, owner),
        }
    }

    GroupFields {
        priority: doc.priority,
        privileges: doc.privileges.iter().filter_map(|t| Privilege::parse(t)).collect(),
        inheritance,
        worlds,
        servers,
        prefix: doc.prefix.clone(),
        suffix: doc.suffix.clone(),
    }
}

pub fn decode_track(name: &str, doc: &TrackDocument, groups: &GroupRegistry) -> Track {
    let mut track = Track::new(name);
    track.default_track = doc.isdefault;
    track.groups = doc.groups.iter().filter_map(|g| groups.id_of(g)).collect();
    track
}

/// Resolve names to ids, skipping unknown names and repeated groups.
fn resolve_groups(names: &[String], groups: &GroupRegistry) -> Vec<GroupId> {
    let mut ids = Vec::with_capacity(names.len());
    for id in names.iter().filter_map(|n| groups.id_of(n)) {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Accepts `10` as well as `"10"` for the priority field.
fn int_or_numeric_string<'de, D>(deserializer: D) -> std::result::Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Text(String),
    }

    let value = match Raw::deserialize(deserializer)? {
        Raw::Int(n) => n,
        Raw::Text(s) => s.trim().parse::<i64>().map_err(serde::de::Error::custom)?,
    };
    i32::try_from(value).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::StaticPlatform;

    const SERVER: &str = "2f1d5c3e-8a9b-4c7d-9e0f-1a2b3c4d5e6f";

    fn registry_with(names: &[&str]) -> GroupRegistry {
        let mut registry = GroupRegistry::new();
        for name in names {
            registry.insert(*name, 0).unwrap();
        }
        registry
    }

    #[test]
    fn test_user_roundtrip() {
        let registry = registry_with(&["default", "admin"]);
        let mut user = User::new(Uuid::new_v4(), "Steve");
        user.prefix = Some("[A]".to_string());
        user.super_user = true;
        user.grant(Privilege::parse("node:sub:value").unwrap());
        user.add_group(registry.id_of("admin").unwrap());
        user.add_group(registry.id_of("default").unwrap());

        let json = to_json(&encode_user(&user, &registry)).unwrap();
        let doc: UserDocument = from_json(&json).unwrap();
        let decoded = decode_user(user.uuid, &user.name, &doc, &registry);

        assert_eq!(decoded, user);
    }

    #[test]
    fn test_unresolved_group_is_skipped() {
        let registry = registry_with(&["Admin"]);
        let json = r#"{"prefix":null,"suffix":null,"super":false,"privileges":[],"groups":["Admin","Ghost"]}"#;
        let doc: UserDocument = from_json(json).unwrap();

        let user = decode_user(Uuid::new_v4(), "Alex", &doc, &registry);
        assert_eq!(user.groups(), &[registry.id_of("Admin").unwrap()]);
    }

    #[test]
    fn test_repeated_group_names_collapse() {
        let registry = registry_with(&["default"]);
        let json = r#"{"super":false,"privileges":[],"groups":["default","default"]}"#;
        let doc: UserDocument = from_json(json).unwrap();

        let user = decode_user(Uuid::new_v4(), "Alex", &doc, &registry);
        assert_eq!(user.groups().len(), 1);
        assert!(user.prefix.is_none());
    }

    #[test]
    fn test_user_document_field_names() {
        let registry = registry_with(&[]);
        let user = User::new(Uuid::new_v4(), "Steve");
        let value: serde_json::Value =
            serde_json::from_str(&to_json(&encode_user(&user, &registry)).unwrap()).unwrap();

        assert_eq!(value["super"], serde_json::Value::Bool(false));
        assert!(value["prefix"].is_null());
        assert!(value["groups"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_document_fails() {
        assert!(from_json::<UserDocument>("{not json").is_err());
        // missing the required super flag
        assert!(from_json::<UserDocument>(r#"{"privileges":[],"groups":[]}"#).is_err());
        // wrong type for a list field
        assert!(from_json::<TrackDocument>(r#"{"isdefault":true,"groups":"admin"}"#).is_err());
    }

    #[test]
    fn test_group_roundtrip() {
        let mut registry = registry_with(&["default", "admin"]);
        let platform = StaticPlatform::new(["world", "world_nether"]);
        let admin = registry.id_of("admin").unwrap();
        let base = registry.id_of("default").unwrap();
        {
            let group = registry.get_mut(admin).unwrap();
            group.priority = 10;
            group.grant(Privilege::parse("world:edit").unwrap());
            group.inherit(base).unwrap();
            group.worlds = vec!["world".to_string()];
            group.servers = vec![ServerId::parse(SERVER).unwrap()];
            group.suffix = Some("*".to_string());
        }
        let original = registry.get(admin).unwrap().clone();

        let json = to_json(&encode_group(&original, &registry)).unwrap();
        let doc: GroupDocument = from_json(&json).unwrap();
        let fields = decode_group("admin", &doc, &registry, &platform);

        let group = registry.get_mut(admin).unwrap();
        group.reset();
        fields.apply(group);
        assert_eq!(*group, original);
    }

    #[test]
    fn test_group_decode_drops_unresolvable_references() {
        let registry = registry_with(&["default", "admin"]);
        let platform = StaticPlatform::new(["world"]);
        let json = format!(
            r#"{{"priority":"7","privileges":["a:b",""],"inherit":["admin","default","gone"],
                "worlds":["world","deleted_world"],"servers":["{SERVER}","bogus"],
                "prefix":null,"suffix":null}}"#
        );
        let doc: GroupDocument = from_json(&json).unwrap();
        let fields = decode_group("admin", &doc, &registry, &platform);

        assert_eq!(fields.priority, 7);
        assert_eq!(fields.privileges, vec![Privilege::parse("a:b").unwrap()]);
        // self-reference and unknown group both dropped
        assert_eq!(fields.inheritance, vec![registry.id_of("default").unwrap()]);
        assert_eq!(fields.worlds, vec!["world"]);
        assert_eq!(fields.servers, vec![ServerId::parse(SERVER).unwrap()]);
    }

    #[test]
    fn test_priority_rejects_non_numeric_text() {
        let json = r#"{"priority":"high","privileges":[],"inherit":[],"worlds":[],"servers":[]}"#;
        assert!(from_json::<GroupDocument>(json).is_err());
    }

    #[test]
    fn test_track_keeps_ladder_order() {
        let registry = registry_with(&["default", "mod", "admin"]);
        let doc = TrackDocument {
            isdefault: true,
            groups: vec!["admin".into(), "ghost".into(), "default".into()],
        };
        let track = decode_track("staff", &doc, &registry);

        assert!(track.default_track);
        assert_eq!(
            track.groups,
            vec![registry.id_of("admin").unwrap(), registry.id_of("default").unwrap()]
        );
        assert_eq!(encode_track(&track, &registry).groups, vec!["admin", "default"]);
    }

    #[test]
    fn test_removed_group_is_omitted_on_encode() {
        let mut registry = registry_with(&["default", "admin"]);
        let base = registry.id_of("default").unwrap();
        let mut track = Track::new("staff");
        track.groups = vec![base, registry.id_of("admin").unwrap()];

        registry.remove(base);
        assert_eq!(encode_track(&track, &registry).groups, vec!["admin"]);
    }
}
