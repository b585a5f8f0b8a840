use crate::error::{RentRollError, Result};
use crate::normalize::{normalize, same_label};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Owner {
    #[schemars(description = "Display label of the owner as typed by an administrator")]
    pub name: String,

    #[serde(default)]
    #[schemars(description = "Property labels in display order")]
    pub properties: Vec<String>,
}

impl Owner {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    pub fn has_property(&self, property: &str) -> bool {
        self.properties.iter().any(|p| same_label(p, property))
    }
}

/// The shared owner list. It is read and rewritten as a single unit, so two
/// concurrent edits resolve as last-write-wins.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct OwnerStructure {
    #[serde(default)]
    pub owners: Vec<Owner>,
}

/// A single administrative change to the owner list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StructureEdit {
    AddOwner {
        name: String,
    },
    RenameOwner {
        #[schemars(description = "Current label of the owner (matched ignoring case and accents)")]
        target: String,
        new_name: String,
    },
    DeleteOwner {
        target: String,
    },
    AddProperty {
        owner: String,
        property: String,
    },
    RenameProperty {
        owner: String,
        target: String,
        new_name: String,
    },
    DeleteProperty {
        owner: String,
        target: String,
    },
}

impl OwnerStructure {
    /// Reads the structure document. A missing document or one without an
    /// `owners` array is an empty structure; malformed entries are skipped.
    pub fn from_document(document: &Value) -> Self {
        let owners = document
            .get("owners")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| match serde_json::from_value::<Owner>(entry.clone()) {
                        Ok(owner) => Some(owner),
                        Err(e) => {
                            debug!("Skipping malformed owner entry {}: {}", entry, e);
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self { owners }
    }

    pub fn to_document(&self) -> Value {
        json!({ "owners": self.owners })
    }

    pub fn find_owner(&self, name: &str) -> Option<&Owner> {
        self.owners.iter().find(|o| same_label(&o.name, name))
    }

    pub fn owner_names(&self) -> Vec<&str> {
        self.owners.iter().map(|o| o.name.as_str()).collect()
    }

    /// Applies an edit and returns the new structure; `self` is left untouched.
    pub fn apply(&self, edit: &StructureEdit) -> Result<OwnerStructure> {
        let mut next = self.clone();

        match edit {
            StructureEdit::AddOwner { name } => {
                let name = clean_name(name)?;
                if next.find_owner(&name).is_some() {
                    return Err(RentRollError::DuplicateOwner(name));
                }
                next.owners.push(Owner::new(name));
                next.owners.sort_by(|a, b| {
                    normalize(&a.name)
                        .cmp(&normalize(&b.name))
                        .then_with(|| a.name.cmp(&b.name))
                });
            }

            StructureEdit::RenameOwner { target, new_name } => {
                let new_name = clean_name(new_name)?;
                let clash = next
                    .owners
                    .iter()
                    .any(|o| same_label(&o.name, &new_name) && !same_label(&o.name, target));
                if clash {
                    return Err(RentRollError::DuplicateOwner(new_name));
                }
                let owner = find_owner_mut(&mut next, target)?;
                owner.name = new_name;
            }

            StructureEdit::DeleteOwner { target } => {
                let before = next.owners.len();
                next.owners.retain(|o| !same_label(&o.name, target));
                if next.owners.len() == before {
                    return Err(RentRollError::OwnerNotFound(target.clone()));
                }
            }

            StructureEdit::AddProperty { owner, property } => {
                let property = clean_name(property)?;
                let entry = find_owner_mut(&mut next, owner)?;
                if entry.has_property(&property) {
                    return Err(RentRollError::DuplicateProperty {
                        owner: entry.name.clone(),
                        property,
                    });
                }
                entry.properties.push(property);
            }

            StructureEdit::RenameProperty {
                owner,
                target,
                new_name,
            } => {
                let new_name = clean_name(new_name)?;
                let entry = find_owner_mut(&mut next, owner)?;
                let clash = entry
                    .properties
                    .iter()
                    .any(|p| same_label(p, &new_name) && !same_label(p, target));
                if clash {
                    return Err(RentRollError::DuplicateProperty {
                        owner: entry.name.clone(),
                        property: new_name,
                    });
                }
                let slot = entry
                    .properties
                    .iter_mut()
                    .find(|p| same_label(p, target))
                    .ok_or_else(|| RentRollError::PropertyNotFound {
                        owner: owner.clone(),
                        property: target.clone(),
                    })?;
                *slot = new_name;
            }

            StructureEdit::DeleteProperty { owner, target } => {
                let entry = find_owner_mut(&mut next, owner)?;
                let before = entry.properties.len();
                entry.properties.retain(|p| !same_label(p, target));
                if entry.properties.len() == before {
                    return Err(RentRollError::PropertyNotFound {
                        owner: owner.clone(),
                        property: target.clone(),
                    });
                }
            }
        }

        info!("Applied structure edit {:?}", edit);
        Ok(next)
    }

    pub fn schema_as_json() -> Result<String> {
        let schema = schemars::schema_for!(StructureEdit);
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}

fn clean_name(raw: &str) -> Result<String> {
    let clean = raw.trim();
    if clean.is_empty() {
        return Err(RentRollError::InvalidName(raw.to_string()));
    }
    Ok(clean.to_string())
}

fn find_owner_mut<'a>(structure: &'a mut OwnerStructure, name: &str) -> Result<&'a mut Owner> {
    structure
        .owners
        .iter_mut()
        .find(|o| same_label(&o.name, name))
        .ok_or_else(|| RentRollError::OwnerNotFound(name.to_string()))
}
