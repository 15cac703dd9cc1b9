//! Binding the fields of a record as named statement parameters.

use core::fmt::{self, Display, Formatter, Write};
use rusqlite::Statement;
use crate::schema::Record;
use crate::error::{Error, Result};


/// A parameter prefix character, preceding the name of a bound parameter.
/// One of `$`, `:`, `?`, or `@`.
///
/// The default value is `:`, which is what generated value expressions
/// (`:column`) use unless a record asks for something else. `?` denotes
/// positional parameters, which records can't be bound to.
///
/// Variants are in ASCII/Unicode code point order.
#[repr(u8)]
#[allow(missing_docs)]
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum ParamPrefix {
    Dollar = b'$',
    #[default]
    Colon = b':',
    Question = b'?',
    At = b'@',
}

impl ParamPrefix {
    /// Returns the underlying raw byte.
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Returns the underlying raw character.
    pub const fn as_char(self) -> char {
        self as u8 as char
    }

    /// Whether parameters with this prefix are addressed by name.
    pub const fn is_named(self) -> bool {
        !matches!(self, ParamPrefix::Question)
    }
}

impl From<ParamPrefix> for u8 {
    fn from(prefix: ParamPrefix) -> Self {
        prefix.as_byte()
    }
}

impl From<ParamPrefix> for char {
    fn from(prefix: ParamPrefix) -> Self {
        prefix.as_char()
    }
}

impl TryFrom<char> for ParamPrefix {
    type Error = Error;

    fn try_from(ch: char) -> Result<Self, Self::Error> {
        match ch {
            '$' => Ok(ParamPrefix::Dollar),
            ':' => Ok(ParamPrefix::Colon),
            '?' => Ok(ParamPrefix::Question),
            '@' => Ok(ParamPrefix::At),
            _   => Err(Error::message(format_args!("invalid parameter prefix: `{ch}`"))),
        }
    }
}

impl TryFrom<u8> for ParamPrefix {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        char::from(byte).try_into()
    }
}

impl Display for ParamPrefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_char(self.as_char())
    }
}

/// Binds every parameter of `statement` to the identically-named field of
/// `record`.
///
/// The names are looked up with their prefix character stripped, so `:age`,
/// `$age`, and `@age` all resolve to the record's `age` parameter. Parameters
/// may appear in any order and any number of times; a value expression is
/// free to mention fields that are not columns themselves.
pub(crate) fn bind_record<R: Record>(statement: &mut Statement<'_>, record: &R) -> Result<()> {
    statement.clear_bindings();

    for index in 1..=statement.parameter_count() {
        let Some(param_name) = statement.parameter_name(index) else {
            // anonymous `?` parameter: there is nothing to look it up by
            return Err(Error::unknown_param_dyn(format_args!("?{index}")));
        };

        let field_name = strip_prefix(param_name);
        let value = record.param(field_name).ok_or_else(|| {
            Error::unknown_param_dyn(param_name)
        })?;

        statement.raw_bind_parameter(index, value)?;
    }

    Ok(())
}

/// Removes the leading `$`, `:`, `@`, or `?` from a parameter name.
fn strip_prefix(param_name: &str) -> &str {
    let mut chars = param_name.chars();

    match chars.next().map(ParamPrefix::try_from) {
        Some(Ok(_)) => chars.as_str(),
        _ => param_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_round_trips_through_char() -> Result<()> {
        for prefix in [ParamPrefix::Dollar, ParamPrefix::Colon, ParamPrefix::At] {
            assert!(prefix.is_named());
            assert_eq!(ParamPrefix::try_from(prefix.as_char())?, prefix);
        }

        assert!(!ParamPrefix::Question.is_named());
        assert!(ParamPrefix::try_from('#').is_err());
        assert_eq!(ParamPrefix::default().to_string(), ":");

        Ok(())
    }

    #[test]
    fn strip_prefix_keeps_bare_names() {
        assert_eq!(strip_prefix(":age"), "age");
        assert_eq!(strip_prefix("$name"), "name");
        assert_eq!(strip_prefix("@lat"), "lat");
        assert_eq!(strip_prefix("plain"), "plain");
        assert_eq!(strip_prefix(""), "");
    }
}
