//! Describing record types and classifying their fields into columns.

use core::any::{type_name, TypeId};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock, RwLock};
use rusqlite::{Row, ToSql};
use crate::field::{Field, Role, ColumnSpec};
use crate::param::ParamPrefix;
use crate::sql::{self, StatementKind};
use crate::error::{Error, Result};


/// Implemented by types that map to exactly one row of an SQL table.
///
/// This is normally derived. The derive macro understands the following
/// attributes:
///
/// * on the struct, `#[upsert(table = "name")]` to set the table name
///   (default: the type name in `lower_snake_case`), `rename_all = "..."`
///   to change how column names are derived from field names (default:
///   lower-cased), and `param_prefix = '$'` to pick the placeholder
///   character (default `:`);
/// * on a field, `key` or `omit` to set its role, `natural` on a key that is
///   supplied by the record instead of generated by the database (such a key
///   is also inserted), `rename = "col"` to set
///   the column name, `value = "SQL expression"` to replace its `:column`
///   placeholder, and `bind` to make an omitted field usable as a named
///   parameter inside other fields' value expressions.
///
/// Every column is bound as a single SQL value. Tuple and array fields are
/// rejected at compile time unless they are omitted or have a value
/// expression (byte arrays are fine, they are blobs); with a value expression,
/// they are neither bound nor read back. The derive can't see inside other
/// types, so a nested struct that isn't omitted shows up as a missing
/// `ToSql`/`FromSql` implementation instead; omit it, or give it a value
/// expression over a bound field:
///
/// ```rust,compile_fail
/// # use upsert::Record;
/// #[derive(Clone, PartialEq, Debug)]
/// struct Point {
///     x: f64,
///     y: f64,
/// }
///
/// #[derive(Clone, PartialEq, Debug, Record)]
/// struct Marker {
///     #[upsert(key)]
///     id: i64,
///     origin: Point,
/// }
/// ```
///
/// ```rust
/// # use upsert::{Record, Connection, ConnectionExt, Outcome, Result};
/// #[derive(Clone, PartialEq, Debug, Record)]
/// struct Person {
///     name: String,
///     age: i64,
///     #[upsert(key)]
///     id: i64,
/// }
///
/// # fn main() -> Result<()> {
/// let conn = Connection::open_in_memory()?;
/// conn.execute_batch(
///     "CREATE TABLE person(id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER NOT NULL)"
/// )?;
///
/// let person = Person { name: "Brian Seitz".into(), age: 36, id: 0 };
/// let saved = conn.upsert(&person)?;
///
/// assert_eq!(saved.outcome, Outcome::Inserted);
/// assert!(saved.record.id > 0);
/// # Ok(())
/// # }
/// ```
pub trait Record: Sized {
    /// The table name and the ordered list of fields.
    fn description() -> RecordDesc;

    /// Returns the value of the named parameter, without its prefix, if this
    /// record has a field of that name which can be bound.
    fn param(&self, name: &str) -> Option<&dyn ToSql>;

    /// Creates a new record from a row returned by the database. Key and
    /// writable fields are read from the row by column name; omitted and
    /// composite fields are copied from `self`.
    fn scan_row(&self, row: &Row<'_>) -> Result<Self>;

    /// Whether every writable field of `self` equals that of `other`.
    /// Key and omitted fields do not participate, and neither do fields with
    /// a value expression: what they write is only known to the database,
    /// which compares them separately (see [`Schema::compare_sql()`]).
    fn writable_eq(&self, other: &Self) -> bool;

    /// The name of the destination table.
    fn table_name() -> String {
        Self::description().table
    }
}

/// The value-level description of a record type.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RecordDesc {
    /// The name of the destination table.
    pub table: String,
    /// The prefix of generated placeholders.
    pub param_prefix: ParamPrefix,
    /// The fields of the record, in declaration order.
    pub fields: Vec<Field>,
}

impl RecordDesc {
    /// Creates a description with the given table name and no fields.
    pub fn new(table: impl Into<String>) -> Self {
        RecordDesc {
            table: table.into(),
            param_prefix: ParamPrefix::default(),
            fields: Vec::new(),
        }
    }

    /// Sets the placeholder prefix.
    pub fn param_prefix(mut self, prefix: ParamPrefix) -> Self {
        self.param_prefix = prefix;
        self
    }

    /// Appends a field.
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }
}

/// The classified columns of a record type, and the statements built from them.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Schema {
    table: String,
    keys: Vec<ColumnSpec>,
    writable: Vec<ColumnSpec>,
    inserted: Vec<ColumnSpec>,
    computed: Vec<ColumnSpec>,
    params: Vec<String>,
    select: String,
    compare: Option<String>,
    update: String,
    insert: String,
    delete: String,
}

impl Schema {
    /// Returns the (cached) schema of `R`.
    ///
    /// The first call for a given type classifies its fields and renders its
    /// statements; later calls share the result. Failures are not cached.
    pub fn of<R: Record + 'static>() -> Result<Arc<Schema>> {
        static CACHE: OnceLock<RwLock<HashMap<TypeId, Arc<Schema>>>> = OnceLock::new();

        let cache = CACHE.get_or_init(Default::default);
        let type_id = TypeId::of::<R>();

        // a poisoned lock can only contain complete entries, since
        // insertion is the only mutation and it can't be observed halfway
        if let Some(schema) = cache.read().unwrap_or_else(|e| e.into_inner()).get(&type_id) {
            return Ok(Arc::clone(schema));
        }

        let schema = Arc::new(Schema::from_desc(type_name::<R>(), R::description())?);
        let mut guard = cache.write().unwrap_or_else(|e| e.into_inner());
        let schema = guard.entry(type_id).or_insert(schema);

        Ok(Arc::clone(schema))
    }

    /// Classifies the fields of a record description.
    pub fn from_desc(type_name: &str, desc: RecordDesc) -> Result<Self> {
        let unsupported = |reason: Cow<'static, str>| {
            Error::unsupported_type(type_name.to_owned(), reason)
        };

        if desc.fields.is_empty() {
            return Err(unsupported("a record must have at least one field".into()));
        }
        if !desc.param_prefix.is_named() {
            return Err(unsupported(
                format!("parameter prefix `{}` is not a named parameter", desc.param_prefix).into()
            ));
        }

        let mut keys = Vec::new();
        let mut writable = Vec::new();
        let mut inserted = Vec::new();
        let mut computed = Vec::new();
        let mut params = Vec::new();
        let mut names = HashSet::new();

        for field in &desc.fields {
            let resolved = field.resolve(desc.param_prefix);

            if !names.insert(resolved.spec.name.clone()) {
                return Err(unsupported(
                    format!("more than one field is named `{}`", resolved.spec.name).into()
                ));
            }

            if field.is_composite && field.role != Role::Omitted && field.value_expr.is_none() {
                return Err(unsupported(
                    format!(
                        "nested field `{}` must be omitted or have a value expression",
                        field.ident,
                    ).into()
                ));
            }

            if field.is_natural && field.role != Role::Key {
                return Err(unsupported(
                    format!("only key fields can be natural, but `{}` isn't a key", field.ident).into()
                ));
            }

            if field.is_param() {
                params.push(resolved.spec.name.clone());
            }

            if field.is_inserted() {
                inserted.push(resolved.spec.clone());
            }
            if field.is_computed() {
                computed.push(resolved.spec.clone());
            }

            match resolved.role {
                Role::Key => keys.push(resolved.spec),
                Role::Writable => writable.push(resolved.spec),
                Role::Omitted => {}
            }
        }

        if keys.is_empty() {
            return Err(Error::NoKeyColumns { table: desc.table });
        }

        let table = desc.table;

        Ok(Schema {
            select: sql::select_sql(&table, &keys),
            compare: if computed.is_empty() {
                None
            } else {
                Some(sql::compare_sql(&table, &computed, &keys))
            },
            update: sql::update_sql(&table, &writable, &keys),
            insert: sql::insert_sql(&table, &inserted),
            delete: sql::delete_sql(&table, &keys),
            table,
            keys,
            writable,
            inserted,
            computed,
            params,
        })
    }

    /// The name of the destination table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Key columns, in declaration order.
    pub fn keys(&self) -> &[ColumnSpec] {
        &self.keys
    }

    /// Writable columns, in declaration order.
    pub fn writable(&self) -> &[ColumnSpec] {
        &self.writable
    }

    /// Columns listed by `INSERT`: the writable ones and the natural keys,
    /// in declaration order.
    pub fn inserted(&self) -> &[ColumnSpec] {
        &self.inserted
    }

    /// Writable columns whose value is an SQL expression, in declaration order.
    pub fn computed(&self) -> &[ColumnSpec] {
        &self.computed
    }

    /// The statement comparing the computed columns of the stored row with
    /// what would be written, or `None` if there are no computed columns.
    pub fn compare_sql(&self) -> Option<&str> {
        self.compare.as_deref()
    }

    /// Names of the fields that the record binds as parameters.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// The text of one of the generated statements.
    pub fn sql(&self, kind: StatementKind) -> &str {
        match kind {
            StatementKind::Select => &self.select,
            StatementKind::Update => &self.update,
            StatementKind::Insert => &self.insert,
            StatementKind::Delete => &self.delete,
        }
    }
}
