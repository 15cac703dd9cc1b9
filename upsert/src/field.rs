//! Per-field metadata: column name, role, and value expression.

use core::fmt::{self, Display, Formatter};
use crate::param::ParamPrefix;


/// The part a field plays in the generated statements.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Role {
    /// Locates the row: appears in `WHERE`, never in `SET` or `VALUES`.
    Key,
    /// Ordinary data: appears in `SET` and `VALUES`.
    #[default]
    Writable,
    /// Not a column at all.
    Omitted,
}

impl Role {
    /// Interprets a free-form role annotation.
    ///
    /// Any value containing `omit` is [`Role::Omitted`]; otherwise, any
    /// value containing `key` is [`Role::Key`]; everything else (including
    /// the empty string) is [`Role::Writable`]. This is plain substring
    /// containment, so annotation values must not embed one token in another.
    pub fn from_tag(tag: &str) -> Self {
        if tag.contains("omit") {
            Role::Omitted
        } else if tag.contains("key") {
            Role::Key
        } else {
            Role::Writable
        }
    }
}

impl Display for Role {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(match *self {
            Role::Key      => "key",
            Role::Writable => "writable",
            Role::Omitted  => "omit",
        })
    }
}

/// Describes a single field of a record, as declared on the Rust type.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Field {
    /// The Rust identifier of the field.
    pub ident: String,
    /// Explicit column name, if the default (lower-cased identifier) is not right.
    pub rename: Option<String>,
    /// Key, writable, or omitted.
    pub role: Role,
    /// Explicit SQL expression standing in for the value of the field.
    pub value_expr: Option<String>,
    /// Whether the field is itself a composite (tuple, array, nested struct).
    pub is_composite: bool,
    /// Whether an omitted field is still available as a named parameter.
    pub is_bound: bool,
    /// Whether a key is supplied by the record rather than generated by the
    /// database, and must therefore be inserted along with the writable columns.
    pub is_natural: bool,
}

impl Field {
    /// A writable scalar field with no overrides.
    pub fn new(ident: impl Into<String>) -> Self {
        Field {
            ident: ident.into(),
            rename: None,
            role: Role::Writable,
            value_expr: None,
            is_composite: false,
            is_bound: false,
            is_natural: false,
        }
    }

    /// Overrides the column name.
    pub fn rename(mut self, column: impl Into<String>) -> Self {
        self.rename = Some(column.into());
        self
    }

    /// Sets the role of the field.
    pub fn role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Marks the field as (part of) the key.
    pub fn key(self) -> Self {
        self.role(Role::Key)
    }

    /// Marks the field as not mapping to any column.
    pub fn omit(self) -> Self {
        self.role(Role::Omitted)
    }

    /// Sets the role from a free-form annotation, see [`Role::from_tag()`].
    pub fn tag(self, tag: &str) -> Self {
        self.role(Role::from_tag(tag))
    }

    /// Replaces the default `:column` placeholder with an arbitrary SQL expression.
    pub fn value_expr(mut self, expr: impl Into<String>) -> Self {
        self.value_expr = Some(expr.into());
        self
    }

    /// Marks the field as a nested composite value.
    pub fn composite(mut self) -> Self {
        self.is_composite = true;
        self
    }

    /// Makes an omitted field available to value expressions of other fields.
    pub fn bind(mut self, is_bound: bool) -> Self {
        self.is_bound = is_bound;
        self
    }

    /// Marks a key as natural, i.e. supplied by the record on insert.
    pub fn natural(mut self) -> Self {
        self.is_natural = true;
        self
    }

    /// Whether the column appears in the column list of `INSERT`.
    pub fn is_inserted(&self) -> bool {
        match self.role {
            Role::Key => self.is_natural,
            Role::Writable => true,
            Role::Omitted => false,
        }
    }

    /// Whether the written value comes from an SQL expression rather than
    /// from the field itself, so only the database can tell if it changed.
    pub fn is_computed(&self) -> bool {
        self.role == Role::Writable && self.value_expr.is_some()
    }

    /// The SQL column name; also the name of the bound parameter.
    pub fn column_name(&self) -> String {
        self.rename.clone().unwrap_or_else(|| self.ident.to_lowercase())
    }

    /// Whether the record must supply a value for this field when binding.
    /// Composite fields never do, as they have no SQL representation.
    pub fn is_param(&self) -> bool {
        (self.role != Role::Omitted || self.is_bound) && !self.is_composite
    }

    /// Computes the column specification and role of this field.
    pub fn resolve(&self, prefix: ParamPrefix) -> ResolvedField {
        let name = self.column_name();
        let value = self.value_expr.clone().unwrap_or_else(|| format!("{prefix}{name}"));

        ResolvedField {
            role: self.role,
            spec: ColumnSpec { name, value },
        }
    }
}

/// The name and value expression of a column in generated statements.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ColumnSpec {
    /// The column name, without quotes.
    pub name: String,
    /// The placeholder or SQL expression providing the value.
    pub value: String,
}

impl ColumnSpec {
    /// Creates a column specification from its parts.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        ColumnSpec {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A field after its annotations have been interpreted.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ResolvedField {
    /// Key, writable, or omitted.
    pub role: Role,
    /// Column name and value expression.
    pub spec: ColumnSpec,
}
