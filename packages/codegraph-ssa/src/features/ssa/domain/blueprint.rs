//! Blueprints: struct / class / interface descriptors

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ids::{BlueprintId, FunctionId, ValueId};
use super::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlueprintKind {
    Class,
    Struct,
    Union,
    Interface,
}

/// Construction state, used to reject self-referential inheritance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlueprintState {
    /// Referenced by name, body not seen yet
    Declared,
    UnderConstruction,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintField {
    pub name: String,
    pub ty: Type,
    pub default: Option<ValueId>,
    /// Go embedded field
    pub anonymous: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blueprint {
    pub id: BlueprintId,
    pub name: String,
    pub kind: BlueprintKind,
    pub state: BlueprintState,
    pub fields: Vec<BlueprintField>,
    pub methods: BTreeMap<String, FunctionId>,
    /// Constructors and other dunder methods (`__init__`)
    pub magic_methods: BTreeMap<String, FunctionId>,
    pub parents: Vec<BlueprintId>,
    /// Class object bound to the blueprint's name, if any
    pub object: Option<ValueId>,
}

impl Blueprint {
    pub fn new(id: BlueprintId, name: impl Into<String>, kind: BlueprintKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            state: BlueprintState::Declared,
            fields: Vec::new(),
            methods: BTreeMap::new(),
            magic_methods: BTreeMap::new(),
            parents: Vec::new(),
            object: None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&BlueprintField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn constructor(&self) -> Option<FunctionId> {
        self.magic_methods.get("__init__").copied()
    }
}
