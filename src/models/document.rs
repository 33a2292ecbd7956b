use serde::Serialize;
use sqlx::FromRow;

/// The two kinds of record that can own an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Vehicle,
    Driver,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 2] = [DocumentKind::Vehicle, DocumentKind::Driver];

    /// High bits of the advisory lock key guarding this kind's documents.
    pub fn lock_class(&self) -> i64 {
        match self {
            DocumentKind::Vehicle => 1,
            DocumentKind::Driver => 2,
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentKind::Vehicle => f.write_str("vehicle"),
            DocumentKind::Driver => f.write_str("driver"),
        }
    }
}

/// Exactly one of `alerts.document_id` / `alerts.driver_document_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AlertOwner {
    pub kind: DocumentKind,
    pub document_id: i64,
}

impl AlertOwner {
    pub fn new(kind: DocumentKind, document_id: i64) -> Self {
        Self { kind, document_id }
    }

    /// Resolve the owner from the nullable FK pair of an alert row.
    pub fn from_columns(document_id: Option<i64>, driver_document_id: Option<i64>) -> Option<Self> {
        match (document_id, driver_document_id) {
            (Some(id), None) => Some(Self::new(DocumentKind::Vehicle, id)),
            (None, Some(id)) => Some(Self::new(DocumentKind::Driver, id)),
            _ => None,
        }
    }
}

impl AlertOwner {
    /// Advisory lock key serializing every alert write for this document.
    pub fn lock_key(&self) -> i64 {
        (self.kind.lock_class() << 48) | (self.document_id & 0xFFFF_FFFF_FFFF)
    }
}

impl std::fmt::Display for AlertOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} document {}", self.kind, self.document_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct DocumentExpiry {
    pub id: i64,
    pub expiry_date: String, // DATE or VARCHAR in DDL, read as text
}
