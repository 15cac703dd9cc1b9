use core::fmt::{self, Display, Formatter};
use proc_macro::TokenStream as TokenStream;
use proc_macro2::{TokenStream as TokenStream2, TokenTree, Span, Ident};
use syn::{Lit, LitStr};
use syn::parse::{Parse, ParseStream, Error};
use syn::ext::IdentExt;
use quote::ToTokens;
use deluxe::{ParseAttributes, ParseMetaItem, ParseMode};


pub fn expand<F>(ts: TokenStream, f: F) -> TokenStream
where
    F: FnOnce(TokenStream2) -> Result<TokenStream2, Error>
{
    f(ts.into()).unwrap_or_else(Error::into_compile_error).into()
}

/// Top-level attributes on a record struct.
#[derive(Clone, Debug, ParseAttributes)]
#[deluxe(attributes(upsert))]
pub struct ContainerAttributes {
    /// The name of the destination table.
    #[deluxe(alias = rename)]
    pub table: Option<IdentOrStr>,
    /// How column names are derived from field names.
    #[deluxe(default, with = deluxe::with::syn)]
    pub rename_all: CaseConversion,
    /// The prefix character of generated placeholders.
    #[deluxe(alias = prefix, alias = param_pfx)]
    pub param_prefix: Option<ParamPrefix>,
}

/// Attributes on a record field.
#[derive(Clone, Debug, ParseAttributes)]
#[deluxe(attributes(upsert))]
pub struct FieldAttributes {
    /// The column is (part of) the key.
    #[deluxe(default = false)]
    pub key: bool,
    /// The key is supplied by the record, so it's inserted too.
    #[deluxe(default = false)]
    pub natural: bool,
    /// The field is not a column.
    #[deluxe(alias = skip, default = false)]
    pub omit: bool,
    /// The column name, instead of the lower-cased field name.
    #[deluxe(alias = column)]
    pub rename: Option<IdentOrStr>,
    /// An SQL expression replacing the `:column` placeholder.
    #[deluxe(alias = value_expr)]
    pub value: Option<SqlExprStr>,
    /// Makes an omitted field available as a named parameter.
    #[deluxe(default = false)]
    pub bind: bool,
}

/// The string literal of a `value` expression, which is pasted into every
/// generated statement as-is. With the `expr-check` feature, it must parse
/// as a single SQLite expression.
#[derive(Clone, Debug)]
pub struct SqlExprStr {
    /// Kept as a literal for its span.
    sql: LitStr,
}

#[cfg(feature = "expr-check")]
impl SqlExprStr {
    fn check_syntax(fragment: &LitStr) -> Result<(), Error> {
        let value = fragment.value();
        let dialect = sqlparser::dialect::SQLiteDialect {};
        let mut parser = sqlparser::parser::Parser::new(&dialect)
            .try_with_sql(&value)
            .map_err(|sqlerr| Error::new_spanned(fragment, sqlerr))?;

        let _ = parser
            .parse_expr()
            .map_err(|sqlerr| Error::new_spanned(fragment, sqlerr))?;

        // e.g. `lower(:name); DROP TABLE person`
        parser
            .expect_token(&sqlparser::tokenizer::Token::EOF)
            .map_err(|sqlerr| Error::new_spanned(fragment, sqlerr))?;

        Ok(())
    }
}

impl Parse for SqlExprStr {
    fn parse(input: ParseStream<'_>) -> Result<Self, Error> {
        let sql: LitStr = input.parse()?;

        if sql.value().trim().is_empty() {
            return Err(Error::new_spanned(&sql, "value expression must not be empty"));
        }

        #[cfg(feature = "expr-check")]
        SqlExprStr::check_syntax(&sql)?;

        Ok(SqlExprStr { sql })
    }
}

impl ToTokens for SqlExprStr {
    fn to_tokens(&self, tokens: &mut TokenStream2) {
        self.sql.to_tokens(tokens);
    }
}

impl ParseMetaItem for SqlExprStr {
    fn parse_meta_item(input: ParseStream<'_>, _mode: ParseMode) -> Result<Self, Error> {
        input.parse::<SqlExprStr>()
    }
}

/// The `param_prefix` attribute; emitted as the matching variant
/// of `::upsert::ParamPrefix`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ParamPrefix {
    Dollar,
    Colon,
    Question,
    At,
}

impl Parse for ParamPrefix {
    fn parse(stream: ParseStream<'_>) -> Result<Self, Error> {
        let (ch, span) = match Lit::parse(stream)? {
            Lit::Char(lit) => (Some(lit.value()), lit.span()),
            Lit::Str(lit) => {
                let value = lit.value();
                let mut chars = value.chars();
                let ch = chars.next().filter(|_| chars.next().is_none());
                (ch, lit.span())
            }
            other => return Err(Error::new_spanned(other, "expected character or string literal")),
        };

        match ch {
            Some('$') => Ok(ParamPrefix::Dollar),
            Some(':') => Ok(ParamPrefix::Colon),
            Some('?') => Ok(ParamPrefix::Question),
            Some('@') => Ok(ParamPrefix::At),
            _ => Err(Error::new(span, "invalid parameter prefix, expected one of `:`, `@`, `$`")),
        }
    }
}

impl ParseMetaItem for ParamPrefix {
    fn parse_meta_item(stream: ParseStream<'_>, _: ParseMode) -> Result<Self, Error> {
        <ParamPrefix as Parse>::parse(stream)
    }
}

impl ToTokens for ParamPrefix {
    fn to_tokens(&self, ts: &mut TokenStream2) {
        let variant = match self {
            ParamPrefix::Dollar   => "Dollar",
            ParamPrefix::Colon    => "Colon",
            ParamPrefix::Question => "Question",
            ParamPrefix::At       => "At",
        };
        ts.extend([TokenTree::from(Ident::new(variant, Span::call_site()))]);
    }
}

/// The `rename_all` attribute.
#[derive(Clone, Copy, Default, Debug)]
pub enum CaseConversion {
    #[default]
    Lowercase,
    Identity,
    LowerSnakeCase,
    UpperSnakeCase,
    LowerCamelCase,
    UpperCamelCase,
}

impl Parse for CaseConversion {
    fn parse(stream: ParseStream<'_>) -> Result<Self, Error> {
        let span = stream.span();
        let raw: IdentOrStr = stream.parse()?;

        Ok(match raw.to_string().as_str() {
            "lowercase" => CaseConversion::Lowercase,
            "identity" => CaseConversion::Identity,
            "lower_snake_case" => CaseConversion::LowerSnakeCase,
            "UPPER_SNAKE_CASE" => CaseConversion::UpperSnakeCase,
            "lowerCamelCase" => CaseConversion::LowerCamelCase,
            "UpperCamelCase" => CaseConversion::UpperCamelCase,
            other => return Err(Error::new(span, format_args!("unknown case conversion `{other}`"))),
        })
    }
}

impl CaseConversion {
    /// The column name for a field called `name`.
    pub fn apply(self, name: &str) -> String {
        use heck::*;

        match self {
            CaseConversion::Lowercase      => name.to_lowercase(),
            CaseConversion::Identity       => name.to_owned(),
            CaseConversion::LowerSnakeCase => AsSnakeCase(name).to_string(),
            CaseConversion::UpperSnakeCase => AsShoutySnakeCase(name).to_string(),
            CaseConversion::LowerCamelCase => AsLowerCamelCase(name).to_string(),
            CaseConversion::UpperCamelCase => AsUpperCamelCase(name).to_string(),
        }
    }
}

/// A table or column name, given either as an identifier or as a string.
#[derive(Clone, Debug)]
pub enum IdentOrStr {
    Ident(Ident),
    Str(LitStr),
}

impl IdentOrStr {
    /// Table and column names end up in double quotes without escaping,
    /// so they are restricted to plain ASCII identifiers.
    fn validate_ident(ident: &str, span: Span) -> Result<(), Error> {
        let mut chars = ident.chars();
        let Some(first) = chars.next() else {
            return Err(Error::new(span, "identifier must not be empty"));
        };
        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(
                Error::new(span, format_args!("invalid leading character `{first}` in identifier"))
            );
        }
        if let Some(bad) = chars.find(|&c| !c.is_ascii_alphanumeric() && c != '_') {
            return Err(
                Error::new(span, format_args!("invalid character `{bad}` in identifier"))
            );
        }
        Ok(())
    }
}

impl Parse for IdentOrStr {
    fn parse(stream: ParseStream<'_>) -> Result<Self, Error> {
        let lookahead = stream.lookahead1();

        if lookahead.peek(Ident::peek_any) {
            Ident::parse_any(stream).and_then(|ident| {
                let ident = ident.unraw();
                Self::validate_ident(&ident.to_string(), ident.span())?;
                Ok(IdentOrStr::Ident(ident))
            })
        } else if lookahead.peek(LitStr) {
            stream.parse::<LitStr>().and_then(|lit| {
                Self::validate_ident(&lit.value(), lit.span())?;
                Ok(IdentOrStr::Str(lit))
            })
        } else {
            Err(lookahead.error())
        }
    }
}

impl ParseMetaItem for IdentOrStr {
    fn parse_meta_item(stream: ParseStream<'_>, _: ParseMode) -> Result<Self, Error> {
        <IdentOrStr as Parse>::parse(stream)
    }
}

impl Display for IdentOrStr {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            IdentOrStr::Ident(ident) => Display::fmt(ident, formatter),
            IdentOrStr::Str(lit) => Display::fmt(&lit.value(), formatter),
        }
    }
}
