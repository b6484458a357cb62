use serde::{Deserialize, Serialize}; // For the persisted document shape
use serde_json::{Map, Value}; // Student records are untyped JSON objects
use std::fmt;
use thiserror::Error; // For domain-specific errors

// --- Domain Errors ---
#[derive(Error, Debug, PartialEq)]
pub enum DomainError {
    #[error("Invalid position: '{0}'")]
    InvalidPosition(String),
}

// --- Student ---

/// Field names of a student record as they appear on the wire and on disk.
pub const NAME: &str = "name";
pub const SURNAME: &str = "surname";
pub const AGE: &str = "age";
pub const IS_STUDENT: &str = "isStudent";

/// A single student record.
///
/// Records carry no identity of their own; they are addressed by their
/// position in the owning [`Document`]. The record is stored as an ordered
/// JSON object so that partial updates can add arbitrary fields and absent
/// fields are simply omitted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct Student(Map<String, Value>);

impl Student {
    /// Builds a record from the four well-known fields. `None` leaves the field absent.
    pub fn new(
        name: Option<Value>,
        surname: Option<Value>,
        age: Option<Value>,
        is_student: Option<Value>,
    ) -> Self {
        let mut fields = Map::new();
        for (key, value) in [
            (NAME, name),
            (SURNAME, surname),
            (AGE, age),
            (IS_STUDENT, is_student),
        ] {
            if let Some(value) = value {
                fields.insert(key.to_string(), value);
            }
        }
        Self(fields)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Shallow merge: every entry in `updates` overwrites (or adds) the field of
    /// the same name, everything else is left untouched. Existing fields keep
    /// their order, new ones are appended.
    pub fn merge(&mut self, updates: Map<String, Value>) {
        for (key, value) in updates {
            self.0.insert(key, value);
        }
    }
}

// --- Document ---

/// The persisted unit: an ordered sequence of students.
///
/// Top-level fields other than `students` are kept as-is so that a rewrite
/// does not drop them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Document {
    #[serde(default)]
    students: Vec<Student>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Document {
    pub fn new(students: Vec<Student>) -> Self {
        Self {
            students,
            extra: Map::new(),
        }
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn into_students(self) -> Vec<Student> {
        self.students
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    /// Appends a record and returns its (1-based) position.
    pub fn push(&mut self, student: Student) -> Position {
        self.students.push(student);
        Position(self.students.len())
    }

    /// Resolves a position against the current sequence, `None` if out of range.
    pub fn offset_of(&self, position: Position) -> Option<usize> {
        let offset = position.0 - 1;
        (offset < self.students.len()).then_some(offset)
    }

    pub fn get(&self, position: Position) -> Option<&Student> {
        self.offset_of(position).map(|offset| &self.students[offset])
    }

    pub fn get_mut(&mut self, position: Position) -> Option<&mut Student> {
        let offset = self.offset_of(position)?;
        Some(&mut self.students[offset])
    }

    /// Removes the record at `position`; later records shift down by one.
    pub fn remove(&mut self, position: Position) -> Option<Student> {
        let offset = self.offset_of(position)?;
        Some(self.students.remove(offset))
    }

    /// Replaces the record at `position`, returning the previous content.
    pub fn replace(&mut self, position: Position, student: Student) -> Option<Student> {
        let slot = self.get_mut(position)?;
        Some(std::mem::replace(slot, student))
    }
}

// --- Position ---

/// A validated 1-based position into a [`Document`]. Always `>= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position(usize);

impl Position {
    /// Parses a path segment with leading-integer rules: optional leading
    /// whitespace, an optional sign, then at least one digit. Anything after the
    /// digits is ignored. Values that overflow are clamped so that they never
    /// resolve to a record.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let invalid = || DomainError::InvalidPosition(raw.to_string());

        let trimmed = raw.trim_start();
        let (negative, rest) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let digits = &rest[..end];
        if digits.is_empty() || negative {
            return Err(invalid());
        }

        let value = digits.bytes().try_fold(0usize, |acc, b| {
            acc.checked_mul(10)?.checked_add(usize::from(b - b'0'))
        });
        match value {
            Some(0) => Err(invalid()),
            Some(n) => Ok(Self(n)),
            None => Ok(Self(usize::MAX)),
        }
    }

    pub fn new(position: usize) -> Option<Self> {
        (position >= 1).then_some(Self(position))
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
