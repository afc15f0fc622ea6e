//! Typed literal values carried by leaves

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt::{self, Write};

const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

/// Datatype of a literal
///
/// Covers the XML Schema types the broker produces or commonly receives.
/// Anything else is carried through as [`Datatype::Other`] with its IRI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Datatype {
    #[default]
    String,
    Boolean,
    Integer,
    Int,
    Long,
    UnsignedLong,
    Double,
    Float,
    Decimal,
    DateTime,
    /// Any other datatype, identified by IRI
    Other(String),
}

impl Datatype {
    /// Resolve a datatype IRI
    pub fn from_iri(iri: &str) -> Self {
        match iri.strip_prefix(XSD) {
            Some("string") => Datatype::String,
            Some("boolean") => Datatype::Boolean,
            Some("integer") => Datatype::Integer,
            Some("int") => Datatype::Int,
            Some("long") => Datatype::Long,
            Some("unsignedLong") => Datatype::UnsignedLong,
            Some("double") => Datatype::Double,
            Some("float") => Datatype::Float,
            Some("decimal") => Datatype::Decimal,
            Some("dateTime") => Datatype::DateTime,
            _ => Datatype::Other(iri.to_string()),
        }
    }

    /// The datatype IRI
    pub fn iri(&self) -> Cow<'_, str> {
        let local = match self {
            Datatype::String => "string",
            Datatype::Boolean => "boolean",
            Datatype::Integer => "integer",
            Datatype::Int => "int",
            Datatype::Long => "long",
            Datatype::UnsignedLong => "unsignedLong",
            Datatype::Double => "double",
            Datatype::Float => "float",
            Datatype::Decimal => "decimal",
            Datatype::DateTime => "dateTime",
            Datatype::Other(iri) => return Cow::Borrowed(iri),
        };
        Cow::Owned(format!("{XSD}{local}"))
    }

    /// Whether values of this type are rendered as bare JSON numbers
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Datatype::Integer
                | Datatype::Int
                | Datatype::Long
                | Datatype::UnsignedLong
                | Datatype::Double
                | Datatype::Float
                | Datatype::Decimal
        )
    }

    fn is_integral(&self) -> bool {
        matches!(
            self,
            Datatype::Integer | Datatype::Int | Datatype::Long | Datatype::UnsignedLong
        )
    }
}

/// Numeric value of a literal
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::UInt(u) => write!(f, "{}", u),
            Number::Float(x) => write!(f, "{}", x),
        }
    }
}

/// A typed literal: lexical form, datatype and optional language tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Literal {
    lexical: String,
    datatype: Datatype,
    lang: Option<String>,
}

impl Literal {
    /// Create a literal with an explicit datatype
    pub fn new(lexical: impl Into<String>, datatype: Datatype) -> Self {
        Self {
            lexical: lexical.into(),
            datatype,
            lang: None,
        }
    }

    /// Create a plain string literal
    pub fn string(lexical: impl Into<String>) -> Self {
        Self::new(lexical, Datatype::String)
    }

    /// Create a language-tagged string literal
    pub fn lang_string(lexical: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: Datatype::String,
            lang: Some(lang.into()),
        }
    }

    /// Create an `xsd:int` literal
    pub fn int(value: i64) -> Self {
        Self::new(value.to_string(), Datatype::Int)
    }

    /// Create an `xsd:integer` literal
    pub fn integer(value: i64) -> Self {
        Self::new(value.to_string(), Datatype::Integer)
    }

    /// Create an `xsd:double` literal
    pub fn double(value: f64) -> Self {
        Self::new(value.to_string(), Datatype::Double)
    }

    /// The empty string literal that stands in for an unset scalar
    pub fn placeholder() -> Self {
        Self::string("")
    }

    /// Type a raw text value
    ///
    /// `[-+]?\d+` becomes an int, `[-+]?\d+\.\d*` a double, anything else a
    /// string. Integers that overflow `i64` stay strings.
    pub fn infer(text: &str) -> Self {
        let digits = text.strip_prefix(['-', '+']).unwrap_or(text);
        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (digits, None),
        };
        let int_ok = !int_part.is_empty() && int_part.bytes().all(|b| b.is_ascii_digit());
        if int_ok {
            match frac_part {
                None => {
                    if let Ok(i) = text.parse::<i64>() {
                        return Self::new(i.to_string(), Datatype::Int);
                    }
                }
                Some(frac) if frac.bytes().all(|b| b.is_ascii_digit()) => {
                    if let Ok(x) = text.parse::<f64>() {
                        return Self::double(x);
                    }
                }
                Some(_) => {}
            }
        }
        Self::string(text)
    }

    pub fn lexical(&self) -> &str {
        &self.lexical
    }

    pub fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }

    /// Numeric value, if the datatype is numeric and the lexical form parses
    pub fn as_number(&self) -> Option<Number> {
        if !self.datatype.is_numeric() {
            return None;
        }
        let text = self.lexical.trim();
        if self.datatype.is_integral() {
            if let Ok(i) = text.parse::<i64>() {
                return Some(Number::Int(i));
            }
            if let Ok(u) = text.parse::<u64>() {
                return Some(Number::UInt(u));
            }
        }
        text.parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .map(Number::Float)
    }

    /// Append the wire rendering of this literal
    ///
    /// Numbers are written bare, every other literal as a quoted string.
    pub fn write_json(&self, out: &mut String) {
        match self.as_number() {
            Some(n) => out.push_str(&n.to_string()),
            None => {
                out.push('"');
                out.push_str(&escape(&self.lexical));
                out.push('"');
            }
        }
    }

    /// The wire rendering as an owned string
    pub fn to_json(&self) -> String {
        let mut out = String::new();
        self.write_json(&mut out);
        out
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.lang, &self.datatype) {
            (Some(lang), _) => write!(f, "\"{}\"@{}", self.lexical, lang),
            (None, Datatype::String) => write!(f, "\"{}\"", self.lexical),
            (None, dt) => write!(f, "\"{}\"^^<{}>", self.lexical, dt.iri()),
        }
    }
}

/// Escape a string for embedding between double quotes
///
/// `"` and `\` get a preceding backslash, `\n`, `\r` and `\t` their short
/// escapes, and any other control character below U+0020 a `\u00XX` escape.
/// The result never contains a raw line break.
pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.chars().any(|c| c == '"' || c == '\\' || c < '\u{20}') {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c < '\u{20}' => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_int() {
        let lit = Literal::infer("-42");
        assert_eq!(lit.datatype(), &Datatype::Int);
        assert_eq!(lit.as_number(), Some(Number::Int(-42)));

        let lit = Literal::infer("+7");
        assert_eq!(lit.datatype(), &Datatype::Int);
        assert_eq!(lit.to_json(), "7");
    }

    #[test]
    fn test_infer_double() {
        let lit = Literal::infer("21.5");
        assert_eq!(lit.datatype(), &Datatype::Double);
        assert_eq!(lit.to_json(), "21.5");

        // Trailing dot is still a double
        let lit = Literal::infer("3.");
        assert_eq!(lit.datatype(), &Datatype::Double);
    }

    #[test]
    fn test_infer_string() {
        assert_eq!(Literal::infer(".").datatype(), &Datatype::String);
        assert_eq!(Literal::infer("1.2.3").datatype(), &Datatype::String);
        assert_eq!(Literal::infer("abc").datatype(), &Datatype::String);
        assert_eq!(Literal::infer("").datatype(), &Datatype::String);
        assert_eq!(Literal::infer("-").datatype(), &Datatype::String);
    }

    #[test]
    fn test_numeric_with_bad_lexical_is_quoted() {
        let lit = Literal::new("n/a", Datatype::Integer);
        assert_eq!(lit.to_json(), "\"n/a\"");
    }

    #[test]
    fn test_unsigned_long_beyond_i64() {
        let lit = Literal::new("18446744073709551615", Datatype::UnsignedLong);
        assert_eq!(lit.to_json(), "18446744073709551615");
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape(r#"a"b\c"#), r#"a\"b\\c"#);
        let lit = Literal::string(r#"say "hi""#);
        assert_eq!(lit.to_json(), r#""say \"hi\"""#);
    }

    #[test]
    fn test_escape_control_characters() {
        assert_eq!(escape("a\nb"), r"a\nb");
        assert_eq!(escape("\r\t"), r"\r\t");
        assert_eq!(escape("\u{0}\u{1b}\u{1f}"), r"\u0000\u001b\u001f");
        // DEL and non-ASCII pass through
        assert_eq!(escape("\u{7f}é"), "\u{7f}é");

        let lit = Literal::string("line1\nline2");
        assert!(!lit.to_json().contains('\n'));
        assert_eq!(lit.to_json(), r#""line1\nline2""#);
    }

    #[test]
    fn test_datatype_iri_round_trip() {
        let dt = Datatype::from_iri("http://www.w3.org/2001/XMLSchema#unsignedLong");
        assert_eq!(dt, Datatype::UnsignedLong);
        assert_eq!(
            Datatype::from_iri("urn:x-custom"),
            Datatype::Other("urn:x-custom".to_string())
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Literal::lang_string("hi", "en").to_string(), "\"hi\"@en");
        assert_eq!(
            Literal::int(3).to_string(),
            "\"3\"^^<http://www.w3.org/2001/XMLSchema#int>"
        );
    }
}
