//! Logical field types used for value coercion and validation.

use std::fmt;

/// Logical type of a searchable field.
///
/// Declared on every [`crate::FieldDescriptor`] and consulted by the coercer
/// to turn raw wire values into typed [`crate::Value`]s, and by the compiler
/// when binding comparison values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Char,
    Bool,
    I16,
    I32,
    I64,
    F32,
    F64,
    Decimal,
    Uuid,
    /// Enumerated field; the slice holds the canonical variant names.
    /// Raw values match case-insensitively and are canonicalized.
    Enum(&'static [&'static str]),
    Date,
    Time,
    /// Timezone-naive date-time. Offset-carrying inputs are converted to the
    /// server's local zone.
    DateTime,
    /// Instant semantics; stored and compared in UTC.
    DateTimeUtc,
    /// Offset-preserving date-time. Inputs without an offset get the server's
    /// local zone.
    DateTimeFixed,
    /// A calendar year, carried as an integer value.
    Year,
    /// A calendar month, carried as the first day of that month.
    YearMonth,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::String => "String",
            FieldKind::Char => "Char",
            FieldKind::Bool => "Bool",
            FieldKind::I16 => "I16",
            FieldKind::I32 => "I32",
            FieldKind::I64 => "I64",
            FieldKind::F32 => "F32",
            FieldKind::F64 => "F64",
            FieldKind::Decimal => "Decimal",
            FieldKind::Uuid => "Uuid",
            FieldKind::Enum(_) => "Enum",
            FieldKind::Date => "Date",
            FieldKind::Time => "Time",
            FieldKind::DateTime => "DateTime",
            FieldKind::DateTimeUtc => "DateTimeUtc",
            FieldKind::DateTimeFixed => "DateTimeFixed",
            FieldKind::Year => "Year",
            FieldKind::YearMonth => "YearMonth",
        };
        f.write_str(name)
    }
}
