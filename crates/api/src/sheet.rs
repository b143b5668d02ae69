//! In-memory sheet: a header row followed by one row per entry, plus the
//! uploaded files the rows link to.

use std::collections::HashMap;
use std::sync::RwLock;

use needlelog_core::{Field, FileId, IncidentRecord, FIELD_COUNT};

/// An uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub id: FileId,
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Position of an appended row.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Appended {
    /// 1-based sheet row; the header is row 1.
    pub row_number: u64,
    /// Data rows after the append.
    pub entry_count: u64,
}

#[derive(Debug, Default)]
pub struct SheetStore {
    rows: RwLock<Vec<IncidentRecord>>,
    files: RwLock<HashMap<FileId, StoredFile>>,
}

impl SheetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headers(&self) -> [&'static str; FIELD_COUNT] {
        Field::headers()
    }

    pub fn append(&self, record: IncidentRecord) -> Appended {
        let mut rows = self.rows.write().unwrap_or_else(|p| p.into_inner());
        rows.push(record);
        let entry_count = rows.len() as u64;
        Appended {
            row_number: entry_count + 1,
            entry_count,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows whose date column equals `date`, in sheet order.
    pub fn rows_for_date(&self, date: &str) -> Vec<IncidentRecord> {
        self.rows
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|row| !row.date().is_empty() && row.date() == date)
            .cloned()
            .collect()
    }

    pub fn store_file(&self, name: String, mime_type: String, bytes: Vec<u8>) -> StoredFile {
        let file = StoredFile {
            id: FileId::new(),
            name,
            mime_type,
            bytes,
        };
        self.files
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(file.id, file.clone());
        file
    }

    pub fn file(&self, id: FileId) -> Option<StoredFile> {
        self.files
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(&id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(date: &str) -> IncidentRecord {
        IncidentRecord::builder().field(Field::Date, date).build()
    }

    #[test]
    fn row_numbers_count_the_header() {
        let sheet = SheetStore::new();
        assert_eq!(sheet.append(row("2024-05-01")), Appended { row_number: 2, entry_count: 1 });
        assert_eq!(sheet.append(row("2024-05-02")), Appended { row_number: 3, entry_count: 2 });
    }

    #[test]
    fn header_row_names_every_column() {
        let headers = SheetStore::new().headers();
        assert_eq!(headers[0], Field::Timestamp.header());
        assert_eq!(headers[3], Field::Date.header());
        assert_eq!(headers.len(), FIELD_COUNT);
    }

    #[test]
    fn filters_by_date_column() {
        let sheet = SheetStore::new();
        sheet.append(row("2024-05-01"));
        sheet.append(row("2024-05-02"));
        sheet.append(row("2024-05-01"));
        sheet.append(row(""));

        assert_eq!(sheet.rows_for_date("2024-05-01").len(), 2);
        assert!(sheet.rows_for_date("").is_empty());
    }

    #[test]
    fn files_are_kept_by_id() {
        let sheet = SheetStore::new();
        let stored = sheet.store_file("a.png".into(), "image/png".into(), vec![1, 2]);
        assert_eq!(sheet.file(stored.id).unwrap().bytes, vec![1, 2]);
        assert!(sheet.file(FileId::new()).is_none());
    }
}
