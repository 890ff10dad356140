//! XSD built-in simple types
//!
//! Each built-in knows its lexical space (for checking), the facets it
//! implies (integer ranges, white space handling), how to order two values
//! for range facets, and how to synthesize a random lexical value that
//! honours a merged [`FacetSet`].

use crate::error::{Error, Result};
use crate::names::{is_valid_name, is_valid_ncname, is_valid_nmtoken, is_valid_qname, is_xml_char};
use crate::schema::facets::{FacetSet, WhiteSpace};
use base64::Engine;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use std::cmp::Ordering;

const MAX_LEADING_ZEROS: usize = 12;

static LANGUAGE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z]{1,8}(-[a-zA-Z0-9]{1,8})*$").expect("language regex"));
static DECIMAL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").expect("decimal regex"));
static INTEGER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").expect("integer regex"));
static FLOAT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?(\d+(\.\d*)?|\.\d+)([Ee][+-]?\d+)?|[+-]?INF|NaN)$").expect("float regex")
});
static DURATION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?P(\d+Y)?(\d+M)?(\d+D)?(T(\d+H)?(\d+M)?(\d+(\.\d+)?S)?)?$")
        .expect("duration regex")
});
static HEX_BINARY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9a-fA-F]{2})*$").expect("hexBinary regex"));
static G_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-?\d{4,})?(-\d{2})?$|^--\d{2}(-\d{2})?$|^---\d{2}$").expect("gregorian regex")
});

const NAME_START: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz_";
const NAME_REST: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz_0123456789.-";
const ALNUM: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const TEXT: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789 .,;:!?-_()[]{}<>&'\"/#@*+=%";
const EXTRA_TEXT: &[char] = &['\u{E9}', '\u{DF}', '\u{3A9}', '\u{4E2D}', '\u{20AC}', '\u{1F600}'];
const LANGUAGES: &[&str] = &["en", "fr", "de", "en-US", "de-CH", "zh-Hans", "pt-BR", "x-klingon"];

/// Unit in which length facets are measured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    /// Unicode scalar values
    Chars,
    /// Decoded octets
    Octets,
    /// Length facets do not apply
    NotApplicable,
}

/// XSD built-in atomic type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    AnySimpleType,
    String,
    NormalizedString,
    Token,
    Language,
    Name,
    NCName,
    Id,
    IdRef,
    NmToken,
    AnyUri,
    QName,
    Boolean,
    Decimal,
    Integer,
    Long,
    Int,
    Short,
    Byte,
    NonNegativeInteger,
    PositiveInteger,
    NonPositiveInteger,
    NegativeInteger,
    UnsignedLong,
    UnsignedInt,
    UnsignedShort,
    UnsignedByte,
    Float,
    Double,
    Duration,
    DateTime,
    Date,
    Time,
    GYear,
    GYearMonth,
    GMonth,
    GDay,
    GMonthDay,
    HexBinary,
    Base64Binary,
}

impl BuiltinType {
    /// Look up an atomic built-in by its local name in the XSD namespace
    pub fn from_local_name(name: &str) -> Result<Self> {
        use BuiltinType::*;
        let ty = match name {
            "anySimpleType" | "anyAtomicType" | "anyType" => AnySimpleType,
            "string" => String,
            "normalizedString" => NormalizedString,
            "token" => Token,
            "language" => Language,
            "Name" => Name,
            "NCName" => NCName,
            "ID" => Id,
            "IDREF" => IdRef,
            "NMTOKEN" => NmToken,
            "anyURI" => AnyUri,
            "QName" => QName,
            "boolean" => Boolean,
            "decimal" => Decimal,
            "integer" => Integer,
            "long" => Long,
            "int" => Int,
            "short" => Short,
            "byte" => Byte,
            "nonNegativeInteger" => NonNegativeInteger,
            "positiveInteger" => PositiveInteger,
            "nonPositiveInteger" => NonPositiveInteger,
            "negativeInteger" => NegativeInteger,
            "unsignedLong" => UnsignedLong,
            "unsignedInt" => UnsignedInt,
            "unsignedShort" => UnsignedShort,
            "unsignedByte" => UnsignedByte,
            "float" => Float,
            "double" => Double,
            "duration" => Duration,
            "dateTime" => DateTime,
            "date" => Date,
            "time" => Time,
            "gYear" => GYear,
            "gYearMonth" => GYearMonth,
            "gMonth" => GMonth,
            "gDay" => GDay,
            "gMonthDay" => GMonthDay,
            "hexBinary" => HexBinary,
            "base64Binary" => Base64Binary,
            "NOTATION" | "ENTITY" | "ENTITIES" => {
                return Err(Error::SchemaUnsupportedConstruct(format!("xs:{}", name)))
            }
            _ => return Err(Error::UnknownType(format!("xs:{}", name))),
        };
        Ok(ty)
    }

    /// Item type of a built-in list type (`NMTOKENS`, `IDREFS`)
    pub fn list_item_of(name: &str) -> Option<Self> {
        match name {
            "NMTOKENS" => Some(BuiltinType::NmToken),
            "IDREFS" => Some(BuiltinType::IdRef),
            _ => None,
        }
    }

    /// Local name in the XSD namespace
    pub fn name(&self) -> &'static str {
        use BuiltinType::*;
        match self {
            AnySimpleType => "anySimpleType",
            String => "string",
            NormalizedString => "normalizedString",
            Token => "token",
            Language => "language",
            Name => "Name",
            NCName => "NCName",
            Id => "ID",
            IdRef => "IDREF",
            NmToken => "NMTOKEN",
            AnyUri => "anyURI",
            QName => "QName",
            Boolean => "boolean",
            Decimal => "decimal",
            Integer => "integer",
            Long => "long",
            Int => "int",
            Short => "short",
            Byte => "byte",
            NonNegativeInteger => "nonNegativeInteger",
            PositiveInteger => "positiveInteger",
            NonPositiveInteger => "nonPositiveInteger",
            NegativeInteger => "negativeInteger",
            UnsignedLong => "unsignedLong",
            UnsignedInt => "unsignedInt",
            UnsignedShort => "unsignedShort",
            UnsignedByte => "unsignedByte",
            Float => "float",
            Double => "double",
            Duration => "duration",
            DateTime => "dateTime",
            Date => "date",
            Time => "time",
            GYear => "gYear",
            GYearMonth => "gYearMonth",
            GMonth => "gMonth",
            GDay => "gDay",
            GMonthDay => "gMonthDay",
            HexBinary => "hexBinary",
            Base64Binary => "base64Binary",
        }
    }

    /// Whether this is `xs:integer` or one of its derivations
    pub fn is_integer(&self) -> bool {
        use BuiltinType::*;
        matches!(
            self,
            Integer
                | Long
                | Int
                | Short
                | Byte
                | NonNegativeInteger
                | PositiveInteger
                | NonPositiveInteger
                | NegativeInteger
                | UnsignedLong
                | UnsignedInt
                | UnsignedShort
                | UnsignedByte
        )
    }

    /// Whether values are compared as decimals
    pub fn is_decimal(&self) -> bool {
        *self == BuiltinType::Decimal || self.is_integer()
    }

    /// Whether values are compared as floating point numbers
    pub fn is_float(&self) -> bool {
        matches!(self, BuiltinType::Float | BuiltinType::Double)
    }

    /// Whether this is a date/time type with a total order
    pub fn is_temporal(&self) -> bool {
        use BuiltinType::*;
        matches!(
            self,
            DateTime | Date | Time | GYear | GYearMonth | GMonth | GDay | GMonthDay
        )
    }

    /// Whether range facets can be evaluated for this type
    pub fn is_ordered(&self) -> bool {
        self.is_decimal() || self.is_float() || self.is_temporal()
    }

    /// Unit in which length facets are measured
    pub fn length_unit(&self) -> LengthUnit {
        use BuiltinType::*;
        match self {
            HexBinary | Base64Binary => LengthUnit::Octets,
            AnySimpleType | String | NormalizedString | Token | Language | Name | NCName | Id
            | IdRef | NmToken | AnyUri | QName => LengthUnit::Chars,
            _ => LengthUnit::NotApplicable,
        }
    }

    /// Length of a value in this type's length unit
    pub fn value_length(&self, value: &str) -> Option<usize> {
        match self.length_unit() {
            LengthUnit::Chars => Some(value.chars().count()),
            LengthUnit::Octets => match self {
                BuiltinType::HexBinary => Some(value.len() / 2),
                _ => base64::engine::general_purpose::STANDARD
                    .decode(value.replace(' ', ""))
                    .ok()
                    .map(|bytes| bytes.len()),
            },
            LengthUnit::NotApplicable => None,
        }
    }

    /// White space handling implied by the type
    pub fn white_space(&self) -> WhiteSpace {
        match self {
            BuiltinType::String | BuiltinType::AnySimpleType => WhiteSpace::Preserve,
            BuiltinType::NormalizedString => WhiteSpace::Replace,
            _ => WhiteSpace::Collapse,
        }
    }

    /// Facets implied by the type's position in the built-in hierarchy
    pub fn implicit_facets(&self) -> FacetSet {
        use BuiltinType::*;
        let facets = FacetSet::new().white_space(self.white_space());
        let facets = if self.is_integer() {
            facets.fraction_digits(0)
        } else {
            facets
        };
        let range = |lo: &str, hi: &str| facets.clone().min_inclusive(lo).max_inclusive(hi);
        match self {
            Long => range("-9223372036854775808", "9223372036854775807"),
            Int => range("-2147483648", "2147483647"),
            Short => range("-32768", "32767"),
            Byte => range("-128", "127"),
            UnsignedLong => range("0", "18446744073709551615"),
            UnsignedInt => range("0", "4294967295"),
            UnsignedShort => range("0", "65535"),
            UnsignedByte => range("0", "255"),
            NonNegativeInteger => facets.clone().min_inclusive("0"),
            PositiveInteger => facets.clone().min_inclusive("1"),
            NonPositiveInteger => facets.clone().max_inclusive("0"),
            NegativeInteger => facets.clone().max_inclusive("-1"),
            _ => facets.clone(),
        }
    }

    /// Check a (white space normalized) lexical value
    pub fn validate_lexical(&self, value: &str) -> std::result::Result<(), String> {
        use BuiltinType::*;
        let ok = match self {
            AnySimpleType | String => value.chars().all(is_xml_char),
            NormalizedString => {
                value.chars().all(is_xml_char) && !value.contains(['\t', '\n', '\r'])
            }
            Token => value.chars().all(is_xml_char) && WhiteSpace::Collapse.is_normalized(value),
            Language => LANGUAGE_REGEX.is_match(value),
            Name => is_valid_name(value),
            NCName | Id | IdRef => is_valid_ncname(value),
            NmToken => is_valid_nmtoken(value),
            QName => is_valid_qname(value),
            AnyUri => {
                !value.contains(char::is_whitespace)
                    && url::Url::parse("http://base.invalid/")
                        .and_then(|base| base.join(value))
                        .is_ok()
            }
            Boolean => matches!(value, "true" | "false" | "1" | "0"),
            Decimal => DECIMAL_REGEX.is_match(value),
            Float | Double => FLOAT_REGEX.is_match(value),
            Duration => {
                DURATION_REGEX.is_match(value)
                    && value != "P"
                    && value != "-P"
                    && !value.ends_with('T')
            }
            DateTime | Date | Time | GYear | GYearMonth | GMonth | GDay | GMonthDay => {
                temporal_key(*self, value).is_some()
            }
            HexBinary => HEX_BINARY_REGEX.is_match(value),
            Base64Binary => base64::engine::general_purpose::STANDARD
                .decode(value.replace(' ', ""))
                .is_ok(),
            _ => INTEGER_REGEX.is_match(value),
        };
        if ok {
            Ok(())
        } else {
            Err(format!("'{}' is not a valid xs:{}", value, self.name()))
        }
    }

    /// Order two lexical values of this type, when they are comparable
    pub fn compare(&self, a: &str, b: &str) -> Option<Ordering> {
        if self.is_decimal() {
            parse_decimal(a)?.partial_cmp(&parse_decimal(b)?)
        } else if self.is_float() {
            parse_float(a)?.partial_cmp(&parse_float(b)?)
        } else if self.is_temporal() {
            temporal_key(*self, a)?.partial_cmp(&temporal_key(*self, b)?)
        } else {
            None
        }
    }

    /// Equivalent spellings of a value: the value itself, then forms with
    /// leading zeros, an explicit plus sign or a trailing fraction
    pub fn lexical_variants(&self, value: &str) -> Vec<std::string::String> {
        let mut variants = vec![value.to_string()];
        if !self.is_decimal() {
            return variants;
        }
        let (sign, digits) = match value.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", value),
        };
        variants.extend(
            (1..=MAX_LEADING_ZEROS).map(|zeros| format!("{}{}{}", sign, "0".repeat(zeros), digits)),
        );
        if sign.is_empty() {
            variants.push(format!("+{}", digits));
        }
        if !self.is_integer() && !digits.contains('.') {
            variants.push(format!("{}.0", value));
        }
        variants
    }

    /// Synthesize a random lexical value honouring the given facets
    ///
    /// Enumerations and patterns are handled by the caller; this covers
    /// lengths, value bounds and digit limits. The result may still violate
    /// facets that cannot be steered (e.g. exclusive float bounds after
    /// rounding), so callers re-check it.
    pub fn synthesize<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        size: u32,
        facets: &FacetSet,
    ) -> Result<String> {
        use BuiltinType::*;
        let value = match self {
            AnySimpleType | String | NormalizedString => {
                let len = draw_length(rng, size, facets);
                (0..len).map(|_| text_char(rng)).collect()
            }
            Token => {
                let len = draw_length(rng, size, facets);
                token_string(rng, len)
            }
            Language => LANGUAGES[rng.random_range(0..LANGUAGES.len())].to_string(),
            Name | NCName | Id | IdRef | QName => {
                let len = draw_length(rng, size, facets).max(1);
                name_string(rng, len, true)
            }
            NmToken => {
                let len = draw_length(rng, size, facets).max(1);
                name_string(rng, len, false)
            }
            AnyUri => uri_string(rng, size)?,
            Boolean => ["true", "false", "1", "0"][rng.random_range(0..4)].to_string(),
            Float | Double => self.synthesize_float(rng, size, facets)?,
            Duration => duration_string(rng, size),
            DateTime | Date | Time | GYear | GYearMonth | GMonth | GDay | GMonthDay => {
                self.synthesize_temporal(rng, size, facets)
            }
            HexBinary => {
                let len = draw_length(rng, size, facets);
                (0..len).map(|_| format!("{:02X}", rng.random::<u8>())).collect()
            }
            Base64Binary => {
                let len = draw_length(rng, size, facets);
                let bytes: Vec<u8> = (0..len).map(|_| rng.random::<u8>()).collect();
                base64::engine::general_purpose::STANDARD.encode(bytes)
            }
            _ => self.synthesize_decimal(rng, size, facets)?,
        };
        Ok(value)
    }

    fn synthesize_decimal<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        size: u32,
        facets: &FacetSet,
    ) -> Result<String> {
        let max_scale = if self.is_integer() {
            0
        } else {
            facets.fraction_digits.unwrap_or(4).min(4).min(size)
        };
        let scale = if max_scale == 0 {
            0
        } else {
            rng.random_range(0..=max_scale)
        };
        let factor = rust_decimal::Decimal::from(10i64.pow(scale));
        let mantissa = |text: &str, up: bool| -> Result<Option<i128>> {
            let d = parse_decimal(text).ok_or_else(|| {
                Error::Value(format!("'{}' is not a valid bound for xs:{}", text, self.name()))
            })?;
            Ok(d.checked_mul(factor)
                .and_then(|scaled| (if up { scaled.ceil() } else { scaled.floor() }).to_i128()))
        };

        let mut lo = i128::MIN;
        let mut hi = i128::MAX;
        if let Some(v) = &facets.min_inclusive {
            if let Some(m) = mantissa(v, true)? {
                lo = lo.max(m);
            }
        }
        if let Some(v) = &facets.min_exclusive {
            if let Some(m) = mantissa(v, false)? {
                lo = lo.max(m.saturating_add(1));
            }
        }
        if let Some(v) = &facets.max_inclusive {
            if let Some(m) = mantissa(v, false)? {
                hi = hi.min(m);
            }
        }
        if let Some(v) = &facets.max_exclusive {
            if let Some(m) = mantissa(v, true)? {
                hi = hi.min(m.saturating_sub(1));
            }
        }

        let digits = (1 + size / 2).min(18);
        let mut magnitude = 10i128.pow(digits + scale) - 1;
        if let Some(total) = facets.total_digits {
            if let Some(limit) = 10i128.checked_pow(total.min(28)) {
                magnitude = magnitude.min(limit - 1);
            }
        }
        if lo > hi {
            return Err(Error::ConflictingFacets {
                type_name: format!("xs:{}", self.name()),
                reason: "value bounds exclude every value".to_string(),
            });
        }
        let (a, b) = if lo <= 0 && hi >= 0 {
            (lo.max(-magnitude), hi.min(magnitude))
        } else if lo > 0 {
            (lo, hi.min(lo.saturating_add(magnitude)))
        } else {
            (lo.max(hi.saturating_sub(magnitude)), hi)
        };
        let m = rng.random_range(a..=b);
        if scale == 0 {
            return Ok(m.to_string());
        }
        rust_decimal::Decimal::try_from_i128_with_scale(m, scale)
            .map(|d| d.to_string())
            .map_err(|e| Error::Value(e.to_string()))
    }

    fn synthesize_float<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        size: u32,
        facets: &FacetSet,
    ) -> Result<String> {
        if !facets.has_bounds() && size > 0 && rng.random_bool(0.05) {
            return Ok(["INF", "-INF", "NaN"][rng.random_range(0..3)].to_string());
        }
        let bound = |text: &Option<std::string::String>| -> Result<Option<f64>> {
            text.as_deref()
                .map(|t| {
                    parse_float(t).ok_or_else(|| {
                        Error::Value(format!("'{}' is not a valid xs:{}", t, self.name()))
                    })
                })
                .transpose()
        };
        let lower = match (bound(&facets.min_inclusive)?, bound(&facets.min_exclusive)?) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let upper = match (bound(&facets.max_inclusive)?, bound(&facets.max_exclusive)?) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        let magnitude = 10f64.powi((size / 3).min(30) as i32 + 1);
        let (lo, hi) = match (lower, upper) {
            (Some(l), Some(u)) => (l, u),
            (Some(l), None) => (l, l + magnitude),
            (None, Some(u)) => (u - magnitude, u),
            (None, None) => (-magnitude, magnitude),
        };
        let v = lo + rng.random::<f64>() * (hi - lo);
        let precision = rng.random_range(0..=3usize);
        Ok(format!("{:.*}", precision, v))
    }

    fn synthesize_temporal<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        size: u32,
        facets: &FacetSet,
    ) -> String {
        use BuiltinType::*;
        let spread = size as i32;
        let bound_year = |text: &Option<std::string::String>| {
            text.as_deref().and_then(|t| t.get(0..4)).and_then(|y| y.parse::<i32>().ok())
        };
        let min_year =
            bound_year(&facets.min_inclusive).or_else(|| bound_year(&facets.min_exclusive));
        let max_year =
            bound_year(&facets.max_inclusive).or_else(|| bound_year(&facets.max_exclusive));
        let (lo, hi) = match (min_year, max_year) {
            (Some(l), Some(u)) => (l, u.max(l)),
            (Some(l), None) => (l, l + spread),
            (None, Some(u)) => (u - spread, u),
            (None, None) => (2000 - spread, 2000 + spread),
        };
        let year = rng.random_range(lo.clamp(1, 9999)..=hi.clamp(1, 9999));
        let month: u32 = rng.random_range(1..=12);
        let day: u32 = rng.random_range(1..=28);
        let (h, mi, s) = (
            rng.random_range(0..24u32),
            rng.random_range(0..60u32),
            rng.random_range(0..60u32),
        );
        let tz = if !facets.has_bounds() && size > 0 && rng.random_bool(0.3) {
            "Z"
        } else {
            ""
        };
        match self {
            DateTime => format!(
                "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}{}",
                year, month, day, h, mi, s, tz
            ),
            Date => format!("{:04}-{:02}-{:02}{}", year, month, day, tz),
            Time => format!("{:02}:{:02}:{:02}{}", h, mi, s, tz),
            GYear => format!("{:04}{}", year, tz),
            GYearMonth => format!("{:04}-{:02}{}", year, month, tz),
            GMonth => format!("--{:02}{}", month, tz),
            GDay => format!("---{:02}{}", day, tz),
            _ => format!("--{:02}-{:02}{}", month, day, tz),
        }
    }
}

/// Parse an `xs:decimal`-family lexical value
pub fn parse_decimal(value: &str) -> Option<rust_decimal::Decimal> {
    if !DECIMAL_REGEX.is_match(value) {
        return None;
    }
    let trimmed = value.trim_start_matches('+');
    let normalized = if trimmed.ends_with('.') {
        &trimmed[..trimmed.len() - 1]
    } else {
        trimmed
    };
    normalized.parse::<rust_decimal::Decimal>().ok()
}

/// Parse an `xs:float`/`xs:double` lexical value
pub fn parse_float(value: &str) -> Option<f64> {
    match value {
        "NaN" => Some(f64::NAN),
        "INF" | "+INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        _ if FLOAT_REGEX.is_match(value) => value.parse::<f64>().ok(),
        _ => None,
    }
}

/// Count (total, fraction) digits of a decimal lexical value, ignoring
/// leading and trailing zeros
pub fn decimal_digits(value: &str) -> (u32, u32) {
    let unsigned = value.trim_start_matches(['+', '-']);
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let int_part = int_part.trim_start_matches('0');
    let frac_part = frac_part.trim_end_matches('0');
    let total = (int_part.len() + frac_part.len()).max(1) as u32;
    (total, frac_part.len() as u32)
}

fn split_timezone(value: &str) -> &str {
    if let Some(stripped) = value.strip_suffix('Z') {
        return stripped;
    }
    let bytes = value.as_bytes();
    let n = bytes.len();
    if n > 6 && matches!(bytes[n - 6], b'+' | b'-') && bytes[n - 3] == b':' {
        return &value[..n - 6];
    }
    value
}

/// Sortable key of a date/time value (time zone ignored)
fn temporal_key(ty: BuiltinType, value: &str) -> Option<(i64, i64)> {
    let body = split_timezone(value);
    match ty {
        BuiltinType::DateTime => {
            let dt = NaiveDateTime::parse_from_str(body, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
            Some((dt.and_utc().timestamp(), dt.and_utc().timestamp_subsec_nanos() as i64))
        }
        BuiltinType::Date => {
            let d = NaiveDate::parse_from_str(body, "%Y-%m-%d").ok()?;
            Some((d.and_hms_opt(0, 0, 0)?.and_utc().timestamp(), 0))
        }
        BuiltinType::Time => {
            let t = NaiveTime::parse_from_str(body, "%H:%M:%S%.f").ok()?;
            Some((t.signed_duration_since(NaiveTime::MIN).num_nanoseconds()?, 0))
        }
        _ => {
            if !G_REGEX.is_match(body) {
                return None;
            }
            let fields: Vec<i64> = body
                .split('-')
                .filter(|part| !part.is_empty())
                .map(|part| part.parse::<i64>())
                .collect::<std::result::Result<_, _>>()
                .ok()?;
            match (ty, fields.as_slice()) {
                (BuiltinType::GYear, [y]) if body.len() >= 4 => Some((*y, 0)),
                (BuiltinType::GYearMonth, [y, m]) if (1..=12).contains(m) => Some((*y, *m)),
                (BuiltinType::GMonth, [m])
                    if body.starts_with("--") && !body.starts_with("---") && (1..=12).contains(m) =>
                {
                    Some((*m, 0))
                }
                (BuiltinType::GDay, [d]) if body.starts_with("---") && (1..=31).contains(d) => {
                    Some((*d, 0))
                }
                (BuiltinType::GMonthDay, [m, d])
                    if body.starts_with("--") && (1..=12).contains(m) && (1..=31).contains(d) =>
                {
                    Some((*m, *d))
                }
                _ => None,
            }
        }
    }
}

fn draw_length<R: Rng + ?Sized>(rng: &mut R, size: u32, facets: &FacetSet) -> usize {
    let (lo, hi) = facets.length_window();
    let lo = lo.max(facets.min_length.unwrap_or(0));
    let hi = hi
        .unwrap_or(usize::MAX)
        .min(facets.max_length.unwrap_or(usize::MAX))
        .min(lo.saturating_add(size as usize));
    if hi <= lo {
        lo
    } else {
        rng.random_range(lo..=hi)
    }
}

fn pick<R: Rng + ?Sized>(rng: &mut R, alphabet: &[u8]) -> char {
    alphabet[rng.random_range(0..alphabet.len())] as char
}

fn text_char<R: Rng + ?Sized>(rng: &mut R) -> char {
    if rng.random_bool(0.05) {
        EXTRA_TEXT[rng.random_range(0..EXTRA_TEXT.len())]
    } else {
        pick(rng, TEXT)
    }
}

fn token_string<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    let mut out = String::with_capacity(len);
    let mut prev_space = true;
    for i in 0..len {
        if !prev_space && i + 1 < len && rng.random_bool(0.15) {
            out.push(' ');
            prev_space = true;
        } else {
            out.push(pick(rng, ALNUM));
            prev_space = false;
        }
    }
    out
}

fn name_string<R: Rng + ?Sized>(rng: &mut R, len: usize, start: bool) -> String {
    let mut out = String::with_capacity(len);
    for i in 0..len {
        let alphabet = if i == 0 && start { NAME_START } else { NAME_REST };
        out.push(pick(rng, alphabet));
    }
    out
}

fn uri_string<R: Rng + ?Sized>(rng: &mut R, size: u32) -> Result<String> {
    let hosts = ["example.org", "example.com", "test.invalid"];
    let base = format!("https://{}/", hosts[rng.random_range(0..hosts.len())]);
    let mut url = url::Url::parse(&base).map_err(|e| Error::Value(e.to_string()))?;
    let segments = rng.random_range(0..=size.min(4));
    let path: Vec<String> = (0..segments)
        .map(|_| {
            let len = rng.random_range(1..=6);
            name_string(rng, len, true)
        })
        .collect();
    url.set_path(&path.join("/"));
    Ok(url.to_string())
}

fn duration_string<R: Rng + ?Sized>(rng: &mut R, size: u32) -> String {
    let cap = size.max(1) * 3;
    let mut date = String::new();
    let mut time = String::new();
    for unit in ["Y", "M", "D"] {
        if rng.random_bool(0.4) {
            date.push_str(&format!("{}{}", rng.random_range(0..=cap), unit));
        }
    }
    for unit in ["H", "M", "S"] {
        if rng.random_bool(0.4) {
            time.push_str(&format!("{}{}", rng.random_range(0..=cap), unit));
        }
    }
    if date.is_empty() && time.is_empty() {
        date = format!("{}D", rng.random_range(0..=cap));
    }
    let sign = if rng.random_bool(0.1) { "-" } else { "" };
    if time.is_empty() {
        format!("{}P{}", sign, date)
    } else {
        format!("{}P{}T{}", sign, date, time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const ALL: &[&str] = &[
        "string", "normalizedString", "token", "language", "Name", "NCName", "ID", "IDREF",
        "NMTOKEN", "anyURI", "QName", "boolean", "decimal", "integer", "long", "int", "short",
        "byte", "nonNegativeInteger", "positiveInteger", "nonPositiveInteger", "negativeInteger",
        "unsignedLong", "unsignedInt", "unsignedShort", "unsignedByte", "float", "double",
        "duration", "dateTime", "date", "time", "gYear", "gYearMonth", "gMonth", "gDay",
        "gMonthDay", "hexBinary", "base64Binary",
    ];

    fn within_bounds(ty: BuiltinType, facets: &FacetSet, value: &str) -> bool {
        let ok = |bound: &Option<String>, pred: fn(Ordering) -> bool| {
            bound
                .as_deref()
                .map_or(true, |b| ty.compare(value, b).map_or(false, pred))
        };
        ok(&facets.min_inclusive, |o| o != Ordering::Less)
            && ok(&facets.max_inclusive, |o| o != Ordering::Greater)
            && ok(&facets.min_exclusive, |o| o == Ordering::Greater)
            && ok(&facets.max_exclusive, |o| o == Ordering::Less)
    }

    #[test]
    fn test_lookup_names() {
        for name in ALL {
            let ty = BuiltinType::from_local_name(name).unwrap();
            assert_eq!(ty.name(), *name);
        }
        assert!(matches!(
            BuiltinType::from_local_name("NOTATION"),
            Err(Error::SchemaUnsupportedConstruct(_))
        ));
        assert!(BuiltinType::from_local_name("nope").is_err());
        assert_eq!(BuiltinType::list_item_of("NMTOKENS"), Some(BuiltinType::NmToken));
    }

    #[test]
    fn test_synthesized_values_are_valid() {
        let mut rng = StdRng::seed_from_u64(42);
        for name in ALL {
            let ty = BuiltinType::from_local_name(name).unwrap();
            let facets = ty.implicit_facets();
            for size in [0, 1, 5, 20, 100] {
                for _ in 0..20 {
                    let value = ty.synthesize(&mut rng, size, &facets).unwrap();
                    let normalized =
                        facets.white_space.unwrap_or(WhiteSpace::Preserve).normalize(&value);
                    assert!(ty.validate_lexical(&normalized).is_ok(), "{}: '{}'", name, value);
                    if ty.is_ordered() && value != "NaN" {
                        assert!(within_bounds(ty, &facets, &normalized), "{}: '{}'", name, value);
                    }
                }
            }
        }
    }

    #[test]
    fn test_integer_bounds_honoured() {
        let mut rng = StdRng::seed_from_u64(7);
        let facets = BuiltinType::Int
            .implicit_facets()
            .restrict(&FacetSet::new().min_inclusive("1000").max_exclusive("1010"));
        for _ in 0..100 {
            let value = BuiltinType::Int.synthesize(&mut rng, 3, &facets).unwrap();
            let n: i64 = value.parse().unwrap();
            assert!((1000..1010).contains(&n), "{}", n);
        }
    }

    #[test]
    fn test_decimal_digits_honoured() {
        let mut rng = StdRng::seed_from_u64(7);
        let facets = FacetSet::new().total_digits(4).fraction_digits(2);
        for _ in 0..100 {
            let value = BuiltinType::Decimal.synthesize(&mut rng, 50, &facets).unwrap();
            let (total, fraction) = decimal_digits(&value);
            assert!(total <= 4 && fraction <= 2, "{}", value);
        }
    }

    #[test]
    fn test_string_length_window() {
        let mut rng = StdRng::seed_from_u64(1);
        let facets = FacetSet::new().min_length(3).max_length(5);
        for _ in 0..50 {
            let value = BuiltinType::String.synthesize(&mut rng, 100, &facets).unwrap();
            assert!((3..=5).contains(&value.chars().count()));
        }
        let value = BuiltinType::HexBinary
            .synthesize(&mut rng, 10, &FacetSet::new().length(4))
            .unwrap();
        assert_eq!(BuiltinType::HexBinary.value_length(&value), Some(4));
    }

    #[test]
    fn test_conflicting_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let facets = FacetSet::new().min_inclusive("10").max_inclusive("5");
        let err = BuiltinType::Integer.synthesize(&mut rng, 5, &facets).unwrap_err();
        assert!(matches!(err, Error::ConflictingFacets { .. }));
    }

    #[test]
    fn test_lexical_checks() {
        assert!(BuiltinType::Date.validate_lexical("2024-02-29").is_ok());
        assert!(BuiltinType::Date.validate_lexical("2023-02-29").is_err());
        assert!(BuiltinType::Date.validate_lexical("2024-01-01Z").is_ok());
        assert!(BuiltinType::DateTime.validate_lexical("2024-01-01T10:00:00+02:00").is_ok());
        assert!(BuiltinType::GMonthDay.validate_lexical("--12-25").is_ok());
        assert!(BuiltinType::GMonth.validate_lexical("--13").is_err());
        assert!(BuiltinType::Duration.validate_lexical("P1Y2M").is_ok());
        assert!(BuiltinType::Duration.validate_lexical("P").is_err());
        assert!(BuiltinType::Float.validate_lexical("-INF").is_ok());
        assert!(BuiltinType::Float.validate_lexical("1e").is_err());
        assert!(BuiltinType::Boolean.validate_lexical("yes").is_err());
        assert!(BuiltinType::Token.validate_lexical("a  b").is_err());
        assert!(BuiltinType::HexBinary.validate_lexical("ABC").is_err());
    }

    #[test]
    fn test_lexical_variants() {
        let variants = BuiltinType::Integer.lexical_variants("-42");
        assert_eq!(variants[0], "-42");
        assert!(variants.contains(&"-00042".to_string()));
        assert!(!variants.iter().any(|v| v.starts_with('+')));
        assert!(BuiltinType::Decimal.lexical_variants("7").contains(&"7.0".to_string()));
        assert!(BuiltinType::Integer.lexical_variants("7").contains(&"+7".to_string()));
        assert_eq!(BuiltinType::Date.lexical_variants("2001-02-03"), vec!["2001-02-03"]);
        for v in BuiltinType::UnsignedByte.lexical_variants("200") {
            assert!(BuiltinType::UnsignedByte.validate_lexical(&v).is_ok(), "{}", v);
        }
    }

    #[test]
    fn test_compare() {
        assert_eq!(BuiltinType::Decimal.compare("1.50", "1.5"), Some(Ordering::Equal));
        assert_eq!(BuiltinType::Integer.compare("+3", "-4"), Some(Ordering::Greater));
        assert_eq!(BuiltinType::Date.compare("2001-01-01", "2000-12-31"), Some(Ordering::Greater));
        assert_eq!(BuiltinType::Float.compare("NaN", "1"), None);
        assert_eq!(BuiltinType::String.compare("a", "b"), None);
        assert_eq!(decimal_digits("-0012.3400"), (4, 2));
    }
}
