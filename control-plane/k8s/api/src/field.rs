//! Field-level validation errors, rendered the way the Kubernetes API server
//! reports them so that `kubectl` users see familiar messages.

use std::fmt;

/// The API group of every resource in this crate.
pub const GROUP: &str = "consul.hashicorp.com";

/// A path to a field within an object, e.g. `spec.routes[0].match`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Path {
    segments: Vec<Segment>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Child(String),
    Index(usize),
    Key(String),
}

impl Path {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::Child(root.into())],
        }
    }

    #[must_use]
    pub fn child(&self, name: impl Into<String>) -> Self {
        self.push(Segment::Child(name.into()))
    }

    #[must_use]
    pub fn index(&self, i: usize) -> Self {
        self.push(Segment::Index(i))
    }

    #[must_use]
    pub fn key(&self, key: impl Into<String>) -> Self {
        self.push(Segment::Key(key.into()))
    }

    fn push(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Child(name) if i == 0 => f.write_str(name)?,
                Segment::Child(name) => write!(f, ".{name}")?,
                Segment::Index(idx) => write!(f, "[{idx}]")?,
                Segment::Key(key) => write!(f, "[{key}]")?,
            }
        }
        Ok(())
    }
}

/// The offending value reported with an error.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Int(i64),
    /// Unsigned values are reported in hexadecimal, matching the API server.
    Uint(u64),
    Float(f64),
    Float32(f32),
    Bool(bool),
    /// A structured value, rendered as compact JSON.
    Json(serde_json::Value),
}

impl Value {
    /// Renders `value` as a JSON string. The result is reported like any
    /// other string, i.e. quoted.
    ///
    /// A value that can't be encoded is reported as the encoding error.
    pub fn json_string<T: serde::Serialize + ?Sized>(value: &T) -> Self {
        Self::String(serde_json::to_string(value).unwrap_or_else(|error| error.to_string()))
    }

    /// Reports `value` as a structure.
    pub fn json<T: serde::Serialize + ?Sized>(value: &T) -> Self {
        Self::Json(
            serde_json::to_value(value)
                .unwrap_or_else(|error| serde_json::Value::String(error.to_string())),
        )
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::String(s) => f.write_str(&quote(s)),
            Self::Int(n) => write!(f, "{n}"),
            Self::Uint(n) => write!(f, "{n:#x}"),
            Self::Float(n) => {
                write_float(f, n.is_finite(), *n < 0.0, &n.to_string(), &format!("{n:e}"))
            }
            Self::Float32(n) => {
                write_float(f, n.is_finite(), *n < 0.0, &n.to_string(), &format!("{n:e}"))
            }
            Self::Bool(b) => write!(f, "{b}"),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

/// Writes a float the way Go's `%v` does: shortest digits, switching to an
/// exponent with at least two digits outside `1e-4 <= |n| < 1e21`.
fn write_float(
    f: &mut fmt::Formatter<'_>,
    finite: bool,
    negative: bool,
    plain: &str,
    sci: &str,
) -> fmt::Result {
    if !finite {
        return match (plain, negative) {
            ("NaN", _) => f.write_str("NaN"),
            (_, true) => f.write_str("-Inf"),
            (_, false) => f.write_str("+Inf"),
        };
    }
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return f.write_str(plain);
    };
    let exp = exp.parse::<i32>().map_err(|_| fmt::Error)?;
    if (-4..21).contains(&exp) {
        return f.write_str(plain);
    }
    let sign = if exp < 0 { '-' } else { '+' };
    write!(f, "{mantissa}e{sign}{:02}", exp.abs())
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident as $as:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant(<$as>::from(v))
                }
            }
        )+
    };
}

value_from! {
    &str => String as String,
    String => String as String,
    &String => String as String,
    i32 => Int as i64,
    i64 => Int as i64,
    u32 => Uint as u64,
    u64 => Uint as u64,
    f32 => Float32 as f32,
    f64 => Float as f64,
    bool => Bool as bool,
}

/// Quotes a string using Go's escaping rules.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{07}' => out.push_str("\\a"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\u{0b}' => out.push_str("\\v"),
            c if c.is_control() => {
                let n = u32::from(c);
                if n <= 0xff {
                    out.push_str(&format!("\\x{n:02x}"));
                } else {
                    out.push_str(&format!("\\u{n:04x}"));
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorType {
    Invalid,
    Required,
    Forbidden,
    Duplicate,
    NotSupported,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Invalid => "Invalid value",
            Self::Required => "Required value",
            Self::Forbidden => "Forbidden",
            Self::Duplicate => "Duplicate value",
            Self::NotSupported => "Unsupported value",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Error {
    pub error_type: ErrorType,
    pub path: Path,
    pub value: Value,
    pub detail: String,
}

pub fn invalid(path: &Path, value: impl Into<Value>, detail: impl Into<String>) -> Error {
    Error {
        error_type: ErrorType::Invalid,
        path: path.clone(),
        value: value.into(),
        detail: detail.into(),
    }
}

pub fn required(path: &Path, detail: impl Into<String>) -> Error {
    Error {
        error_type: ErrorType::Required,
        path: path.clone(),
        value: Value::String(String::new()),
        detail: detail.into(),
    }
}

pub fn forbidden(path: &Path, detail: impl Into<String>) -> Error {
    Error {
        error_type: ErrorType::Forbidden,
        path: path.clone(),
        value: Value::String(String::new()),
        detail: detail.into(),
    }
}

pub fn duplicate(path: &Path, value: impl Into<Value>) -> Error {
    Error {
        error_type: ErrorType::Duplicate,
        path: path.clone(),
        value: value.into(),
        detail: String::new(),
    }
}

pub fn not_supported(path: &Path, value: impl Into<Value>, valid: &[&str]) -> Error {
    let quoted = valid.iter().map(|v| quote(v)).collect::<Vec<_>>();
    Error {
        error_type: ErrorType::NotSupported,
        path: path.clone(),
        value: value.into(),
        detail: format!("supported values: {}", quoted.join(", ")),
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.error_type)?;
        match self.error_type {
            ErrorType::Required | ErrorType::Forbidden => {}
            _ => write!(f, ": {}", self.value)?,
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ErrorList(Vec<Error>);

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: Error) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.0.iter()
    }

    /// Fails with an [`Invalid`] error for the named resource if any errors
    /// were collected.
    pub fn into_result(self, kind: &str, name: &str) -> Result<(), Invalid> {
        if self.is_empty() {
            return Ok(());
        }
        Err(Invalid {
            kind: kind.to_string(),
            name: name.to_string(),
            errors: self,
        })
    }
}

impl Extend<Error> for ErrorList {
    fn extend<I: IntoIterator<Item = Error>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl FromIterator<Error> for ErrorList {
    fn from_iter<I: IntoIterator<Item = Error>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ErrorList {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<Vec<Error>> for ErrorList {
    fn from(errors: Vec<Error>) -> Self {
        Self(errors)
    }
}

/// Renders a single message as-is and several as `[a, b]`, dropping repeats.
impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut msgs = Vec::<String>::with_capacity(self.0.len());
        for e in &self.0 {
            let msg = e.to_string();
            if !msgs.contains(&msg) {
                msgs.push(msg);
            }
        }
        match msgs.as_slice() {
            [] => Ok(()),
            [one] => f.write_str(one),
            many => write!(f, "[{}]", many.join(", ")),
        }
    }
}

/// A resource failed validation.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{kind}.{GROUP} {} is invalid: {errors}", quote(.name))]
pub struct Invalid {
    /// The lower-case kind, e.g. `servicedefaults`.
    pub kind: String,
    pub name: String,
    pub errors: ErrorList,
}
