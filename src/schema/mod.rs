//! Remote model and field descriptors.
//!
//! The store exposes no compile-time schema; these descriptors are what the
//! engine learns about a remote type at runtime. They are immutable once
//! fetched and cached for the process lifetime (see [`cache::SchemaCache`]).

pub mod cache;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::RecordId;

pub use cache::SchemaCache;

/// Wire format for date fields.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Wire format for datetime fields (UTC).
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Field kind as reported by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldKind {
    Binary,
    Boolean,
    Char,
    Date,
    DateTime,
    Float,
    Html,
    Integer,
    Monetary,
    Selection,
    Text,
    ManyToOne,
    OneToMany,
    ManyToMany,
    /// A kind this engine does not model; values pass through untouched.
    Other(String),
}

impl FieldKind {
    /// The store's name for this kind.
    #[must_use]
    pub fn wire_name(&self) -> &str {
        match self {
            Self::Binary => "binary",
            Self::Boolean => "boolean",
            Self::Char => "char",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Float => "float",
            Self::Html => "html",
            Self::Integer => "integer",
            Self::Monetary => "monetary",
            Self::Selection => "selection",
            Self::Text => "text",
            Self::ManyToOne => "many2one",
            Self::OneToMany => "one2many",
            Self::ManyToMany => "many2many",
            Self::Other(name) => name,
        }
    }

    /// True for both date and datetime kinds.
    #[must_use]
    pub const fn is_date(&self) -> bool {
        matches!(self, Self::Date | Self::DateTime)
    }

    /// True for any association kind.
    #[must_use]
    pub const fn is_association(&self) -> bool {
        matches!(self, Self::ManyToOne | Self::OneToMany | Self::ManyToMany)
    }

    /// True for the to-one association kind.
    #[must_use]
    pub const fn is_single_association(&self) -> bool {
        matches!(self, Self::ManyToOne)
    }

    /// True for the to-many association kinds.
    #[must_use]
    pub const fn is_multiple_association(&self) -> bool {
        matches!(self, Self::OneToMany | Self::ManyToMany)
    }

    /// Wire date format for this kind (datetime gets the full format).
    #[must_use]
    pub const fn date_format(&self) -> &'static str {
        match self {
            Self::DateTime => DATETIME_FORMAT,
            _ => DATE_FORMAT,
        }
    }
}

impl std::str::FromStr for FieldKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "binary" => Self::Binary,
            "boolean" => Self::Boolean,
            "char" => Self::Char,
            "date" => Self::Date,
            "datetime" => Self::DateTime,
            "float" => Self::Float,
            "html" => Self::Html,
            "integer" => Self::Integer,
            "monetary" => Self::Monetary,
            "selection" => Self::Selection,
            "text" => Self::Text,
            "many2one" => Self::ManyToOne,
            "one2many" => Self::OneToMany,
            "many2many" => Self::ManyToMany,
            other => Self::Other(other.to_string()),
        })
    }
}

impl TryFrom<String> for FieldKind {
    type Error = std::convert::Infallible;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FieldKind> for String {
    fn from(kind: FieldKind) -> Self {
        kind.wire_name().to_string()
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// One choice of an enumerated (selection) field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Remote id of the choice row, when the store materializes choices.
    pub id: Option<RecordId>,
    /// Display label.
    pub name: String,
    /// Stored value.
    pub value: String,
}

impl Choice {
    /// Creates a choice without a remote id (inline selection specs).
    #[must_use]
    pub fn new(value: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Enumerated-choice set of a selection field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Choices in store order.
    pub choices: Vec<Choice>,
}

impl Selection {
    /// Creates a selection from its choices.
    #[must_use]
    pub fn new(choices: Vec<Choice>) -> Self {
        Self { choices }
    }

    /// Looks up a choice by stored value.
    #[must_use]
    pub fn choice(&self, value: &str) -> Option<&Choice> {
        self.choices.iter().find(|choice| choice.value == value)
    }

    /// All stored values, in order.
    #[must_use]
    pub fn values(&self) -> Vec<&str> {
        self.choices.iter().map(|choice| choice.value.as_str()).collect()
    }
}

/// Remote field descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Remote id of the field descriptor row.
    pub id: RecordId,
    /// Field name on the remote model.
    pub name: String,
    /// Human-readable label, when distinct from the name.
    pub display_name: Option<String>,
    /// Field kind.
    pub kind: FieldKind,
    /// Whether the store requires a value.
    pub required: bool,
    /// Read-only fields are never written back.
    pub read_only: bool,
    /// Maximum size for text-like fields.
    pub size: Option<u32>,
    /// Choice set for selection fields.
    pub selection: Option<Selection>,
    /// Target model name for association fields.
    pub target_model: Option<String>,
    /// Inverse field on the target model, for one-to-many fields.
    pub mapped_by: Option<String>,
}

impl Field {
    /// True for the store's identifier field.
    #[must_use]
    pub fn is_identifier(&self) -> bool {
        self.name == "id"
    }

    /// Label, falling back to the field name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    #[must_use]
    pub const fn is_association(&self) -> bool {
        self.kind.is_association()
    }

    #[must_use]
    pub const fn is_single_association(&self) -> bool {
        self.kind.is_single_association()
    }

    #[must_use]
    pub const fn is_multiple_association(&self) -> bool {
        self.kind.is_multiple_association()
    }

    /// Wire date format for this field.
    #[must_use]
    pub const fn date_format(&self) -> &'static str {
        self.kind.date_format()
    }
}

/// Remote model descriptor: the full runtime schema of one remote type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Remote id of the model row.
    pub id: RecordId,
    /// Technical model name (the name used on the wire).
    pub name: String,
    /// Human-readable model label.
    pub display_name: String,
    /// Transient models hold short-lived records the store may vacuum.
    pub transient: bool,
    /// Field descriptors keyed by field name (deterministic order).
    pub fields: BTreeMap<String, Field>,
}

impl Model {
    /// The technical model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn is_transient(&self) -> bool {
        self.transient
    }

    /// Looks up a field descriptor by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// All field names in deterministic order.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }
}
