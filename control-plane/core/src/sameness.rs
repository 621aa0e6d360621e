use crate::common::{is_default, EntryMeta};
use serde::{Deserialize, Serialize};

/// A `sameness-group` entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SamenessGroupConfigEntry {
    pub name: String,
    #[serde(skip_serializing_if = "is_default")]
    pub default_for_failover: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub include_local: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<SamenessGroupMember>,
    #[serde(flatten)]
    pub entry_meta: EntryMeta,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SamenessGroupMember {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub peer: String,
}
