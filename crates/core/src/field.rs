//! Field paths and field-level validation errors.
//!
//! An `ErrorList` is ordered; callers translate it into an API status.

use std::fmt;

use serde::{Serialize, Serializer};
use smallvec::SmallVec;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Field(String),
    Index(usize),
    Key(String),
}

/// Dotted path to a field, e.g. `spec.template.spec.volumes[0].emptyDir`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath {
    segments: SmallVec<[Segment; 6]>,
}

impl FieldPath {
    pub fn new(root: &str) -> Self {
        let mut segments = SmallVec::new();
        segments.push(Segment::Field(root.to_string()));
        Self { segments }
    }

    pub fn child(&self, name: &str) -> Self {
        let mut next = self.clone();
        next.segments.push(Segment::Field(name.to_string()));
        next
    }

    pub fn index(&self, i: usize) -> Self {
        let mut next = self.clone();
        next.segments.push(Segment::Index(i));
        next
    }

    pub fn key(&self, k: &str) -> Self {
        let mut next = self.clone();
        next.segments.push(Segment::Key(k.to_string()));
        next
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                Segment::Field(name) if i == 0 => f.write_str(name)?,
                Segment::Field(name) => write!(f, ".{}", name)?,
                Segment::Index(idx) => write!(f, "[{}]", idx)?,
                Segment::Key(k) => write!(f, "[{}]", k)?,
            }
        }
        Ok(())
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldErrorKind {
    Required,
    Invalid,
    Forbidden,
    NotSupported,
}

impl FieldErrorKind {
    fn describe(&self) -> &'static str {
        match self {
            FieldErrorKind::Required => "Required value",
            FieldErrorKind::Invalid => "Invalid value",
            FieldErrorKind::Forbidden => "Forbidden",
            FieldErrorKind::NotSupported => "Unsupported value",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub kind: FieldErrorKind,
    pub path: FieldPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bad_value: Option<serde_json::Value>,
    pub detail: String,
}

impl FieldError {
    pub fn required(path: FieldPath, detail: impl Into<String>) -> Self {
        Self { kind: FieldErrorKind::Required, path, bad_value: None, detail: detail.into() }
    }

    pub fn invalid<V: Serialize + ?Sized>(path: FieldPath, value: &V, detail: impl Into<String>) -> Self {
        Self {
            kind: FieldErrorKind::Invalid,
            path,
            bad_value: serde_json::to_value(value).ok(),
            detail: detail.into(),
        }
    }

    pub fn forbidden(path: FieldPath, detail: impl Into<String>) -> Self {
        Self { kind: FieldErrorKind::Forbidden, path, bad_value: None, detail: detail.into() }
    }

    pub fn not_supported<V: Serialize + ?Sized>(path: FieldPath, value: &V, valid: &[&str]) -> Self {
        let quoted: Vec<String> = valid.iter().map(|v| format!("\"{}\"", v)).collect();
        Self {
            kind: FieldErrorKind::NotSupported,
            path,
            bad_value: serde_json::to_value(value).ok(),
            detail: format!("supported values: {}", quoted.join(", ")),
        }
    }

    fn body(&self) -> String {
        let mut s = self.kind.describe().to_string();
        if let Some(v) = &self.bad_value {
            s.push_str(": ");
            s.push_str(&v.to_string());
        }
        if !self.detail.is_empty() {
            s.push_str(": ");
            s.push_str(&self.detail);
        }
        s
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.body())
    }
}

impl std::error::Error for FieldError {}

pub type ErrorList = Vec<FieldError>;
