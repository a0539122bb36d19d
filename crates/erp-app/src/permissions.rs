// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    View,
    Create,
    Update,
    Delete,
}

impl Verb {
    pub const ALL: [Self; 4] = [Self::View, Self::Create, Self::Update, Self::Delete];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|verb| verb.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Parts,
    Users,
    Documents,
}

impl Resource {
    pub const ALL: [Self; 3] = [Self::Parts, Self::Users, Self::Documents];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Parts => "parts",
            Self::Users => "users",
            Self::Documents => "documents",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|resource| resource.as_str() == value)
    }
}

/// A `(verb, resource)` pair, written `"delete:parts"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Capability {
    pub verb: Verb,
    pub resource: Resource,
}

impl Capability {
    pub const fn new(verb: Verb, resource: Resource) -> Self {
        Self { verb, resource }
    }

    pub fn all() -> impl Iterator<Item = Self> {
        Verb::ALL
            .into_iter()
            .flat_map(|verb| Resource::ALL.into_iter().map(move |resource| Self::new(verb, resource)))
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.verb.as_str(), self.resource.as_str())
    }
}

impl FromStr for Capability {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let Some((verb, resource)) = value.split_once(':') else {
            bail!("capability {value:?} must look like `verb:resource`");
        };
        let verb = Verb::parse(verb.trim())
            .ok_or_else(|| anyhow!("unknown verb {verb:?} in capability {value:?}"))?;
        let resource = Resource::parse(resource.trim())
            .ok_or_else(|| anyhow!("unknown resource {resource:?} in capability {value:?}"))?;
        Ok(Self::new(verb, resource))
    }
}

impl Serialize for Capability {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Capability {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Employee,
    Customer,
    Supplier,
}

impl Role {
    pub const ALL: [Self; 3] = [Self::Employee, Self::Customer, Self::Supplier];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::Customer => "customer",
            Self::Supplier => "supplier",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_str() == value)
    }
}

/// Synchronous capability checks queried while rendering.
pub trait PermissionOracle {
    fn can(&self, verb: Verb, resource: Resource) -> bool;
    fn is(&self, role: Role) -> bool;

    fn allows(&self, capability: Capability) -> bool {
        self.can(capability.verb, capability.resource)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub role: Role,
    pub granted: BTreeSet<Capability>,
}

impl Permissions {
    pub fn new(role: Role, granted: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            role,
            granted: granted.into_iter().collect(),
        }
    }

    pub fn none(role: Role) -> Self {
        Self::new(role, [])
    }

    pub fn all(role: Role) -> Self {
        Self::new(role, Capability::all())
    }

    pub fn grant(&mut self, capability: Capability) {
        self.granted.insert(capability);
    }

    pub fn revoke(&mut self, capability: Capability) {
        self.granted.remove(&capability);
    }

    pub fn without(mut self, capability: Capability) -> Self {
        self.revoke(capability);
        self
    }

    /// Parses a list such as `["view:parts", "delete:parts"]`.
    pub fn parse_list<'a>(role: Role, items: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let granted = items
            .into_iter()
            .map(str::parse)
            .collect::<Result<BTreeSet<Capability>>>()?;
        Ok(Self { role, granted })
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.granted.iter().map(ToString::to_string).collect()
    }
}

impl PermissionOracle for Permissions {
    fn can(&self, verb: Verb, resource: Resource) -> bool {
        self.granted.contains(&Capability::new(verb, resource))
    }

    fn is(&self, role: Role) -> bool {
        self.role == role
    }
}

#[cfg(test)]
mod tests {
    use super::{Capability, PermissionOracle, Permissions, Resource, Role, Verb};

    #[test]
    fn capability_string_form() -> anyhow::Result<()> {
        let capability: Capability = "delete:parts".parse()?;
        assert_eq!(capability, Capability::new(Verb::Delete, Resource::Parts));
        assert_eq!(capability.to_string(), "delete:parts");
        assert!("delete".parse::<Capability>().is_err());
        assert!("erase:parts".parse::<Capability>().is_err());
        Ok(())
    }

    #[test]
    fn all_grants_every_pair() {
        let permissions = Permissions::all(Role::Employee);
        for capability in Capability::all() {
            assert!(permissions.allows(capability));
        }
        assert!(permissions.is(Role::Employee));
        assert!(!permissions.is(Role::Customer));
    }

    #[test]
    fn without_revokes_one_capability() {
        let permissions =
            Permissions::all(Role::Employee).without(Capability::new(Verb::Delete, Resource::Parts));
        assert!(!permissions.can(Verb::Delete, Resource::Parts));
        assert!(permissions.can(Verb::Delete, Resource::Users));
    }

    #[test]
    fn parse_list_rejects_unknown_entries() {
        assert!(Permissions::parse_list(Role::Employee, ["view:parts", "fly:parts"]).is_err());
    }
}
