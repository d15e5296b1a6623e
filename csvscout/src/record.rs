use csv::StringRecord;
use serde::{Deserialize, Serialize};

/// A single row of the data file: `id,name[,image]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub image: String,
}

/// Why a row could not be turned into a [`Record`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowDefect {
    MissingId,
    InvalidId(String),
    MissingName,
}

impl std::fmt::Display for RowDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowDefect::MissingId => write!(f, "missing id field"),
            RowDefect::InvalidId(raw) => write!(f, "id {:?} is not an integer", raw),
            RowDefect::MissingName => write!(f, "missing name field"),
        }
    }
}

impl Record {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            image: String::new(),
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Parses only the id column
    pub fn parse_id(fields: &StringRecord) -> Result<i64, RowDefect> {
        let raw = fields.get(0).ok_or(RowDefect::MissingId)?;
        raw.trim()
            .parse::<i64>()
            .map_err(|_| RowDefect::InvalidId(raw.to_string()))
    }

    /// Builds a record from decoded fields. A third column, when present,
    /// becomes the image; further columns are ignored.
    pub fn from_fields(fields: &StringRecord) -> Result<Self, RowDefect> {
        let id = Self::parse_id(fields)?;
        let name = fields.get(1).ok_or(RowDefect::MissingName)?;
        let image = fields.get(2).unwrap_or_default();
        Ok(Self {
            id,
            name: name.to_string(),
            image: image.to_string(),
        })
    }

    /// Column layout used when writing the file back out
    pub fn to_fields(&self) -> [String; 3] {
        [self.id.to_string(), self.name.clone(), self.image.clone()]
    }
}
