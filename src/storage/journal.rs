use async_trait::async_trait;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::{AuditEntry, AuditQuery, AuditRecord};

use super::traits::AuditLog;

/// Errors that can occur during journal operations.
#[derive(Error, Debug)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid journal line format")]
    InvalidFormat,
}

/// Append-only audit journal on local disk.
///
/// Each entry is one line: `JSON\tCRC32\n`. Lines that fail the checksum
/// are skipped on read.
pub struct AuditJournal {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl AuditJournal {
    /// Open or create a journal file for appending.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(AuditJournal {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write and flush one entry.
    pub fn write_entry(&self, entry: &AuditEntry) -> Result<(), JournalError> {
        let json = serde_json::to_string(entry)?;
        let checksum = crc32fast::hash(json.as_bytes());

        let mut writer = self.writer.lock();
        writeln!(writer, "{}\t{:08x}", json, checksum)?;
        writer.flush()?;

        Ok(())
    }

    /// Read every intact entry in append order.
    pub fn read_all(&self) -> Result<Vec<AuditEntry>, JournalError> {
        let mut reader = JournalReader::open(&self.path)?;
        let mut entries = Vec::new();

        while let Some(entry) = reader.next_entry()? {
            entries.push(entry);
        }

        if reader.errors() > 0 {
            tracing::warn!(
                path = %self.path.display(),
                errors = reader.errors(),
                "Skipped corrupt audit journal lines"
            );
        }

        Ok(entries)
    }
}

#[async_trait]
impl AuditLog for AuditJournal {
    async fn append(&self, record: &AuditRecord) -> anyhow::Result<AuditEntry> {
        let entry = AuditEntry::from_record(record.clone());
        self.write_entry(&entry)?;
        Ok(entry)
    }

    async fn list(&self, query: &AuditQuery) -> anyhow::Result<Vec<AuditEntry>> {
        let limit = query.limit.unwrap_or(usize::MAX);

        Ok(self
            .read_all()?
            .into_iter()
            .rev()
            .filter(|e| query.matches(e))
            .take(limit)
            .collect())
    }
}

/// Sequential reader over a journal file.
pub struct JournalReader {
    reader: BufReader<File>,
    line_buffer: String,
    entries_read: u64,
    errors: u64,
}

impl JournalReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let file = File::open(path)?;

        Ok(JournalReader {
            reader: BufReader::new(file),
            line_buffer: String::with_capacity(512),
            entries_read: 0,
            errors: 0,
        })
    }

    /// Read the next intact entry. Returns `None` at end of file.
    pub fn next_entry(&mut self) -> Result<Option<AuditEntry>, JournalError> {
        loop {
            self.line_buffer.clear();
            let bytes_read = self.reader.read_line(&mut self.line_buffer)?;

            if bytes_read == 0 {
                return Ok(None);
            }

            let line = self.line_buffer.trim();
            if line.is_empty() {
                continue;
            }

            let Some((json, checksum)) = line.split_once('\t') else {
                self.errors += 1;
                continue;
            };

            let Ok(expected) = u32::from_str_radix(checksum, 16) else {
                self.errors += 1;
                continue;
            };

            if crc32fast::hash(json.as_bytes()) != expected {
                self.errors += 1;
                continue;
            }

            let entry: AuditEntry = serde_json::from_str(json)?;
            self.entries_read += 1;

            return Ok(Some(entry));
        }
    }

    pub fn entries_read(&self) -> u64 {
        self.entries_read
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventType, SubjectId};
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn record(subject: i64, is_fraud: bool) -> AuditRecord {
        AuditRecord {
            subject_id: SubjectId::new(subject),
            event_type: EventType::Transaction,
            amount: Decimal::new(12550, 2),
            source_address: "192.168.1.100".to_string(),
            is_fraud,
            reason: if is_fraud {
                "Fraud if NID has expired".to_string()
            } else {
                "None".to_string()
            },
            risk_score: if is_fraud { 1.0 } else { 0.0 },
        }
    }

    #[tokio::test]
    async fn test_append_and_list() {
        let dir = TempDir::new().unwrap();
        let journal = AuditJournal::open(dir.path().join("audit.log")).unwrap();

        journal.append(&record(1, false)).await.unwrap();
        journal.append(&record(2, true)).await.unwrap();
        journal.append(&record(1, true)).await.unwrap();

        let all = journal.list(&AuditQuery::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].subject_id, SubjectId::new(1));
        assert!(all[0].is_fraud);

        let subject_one = journal
            .list(&AuditQuery::for_subject(SubjectId::new(1)))
            .await
            .unwrap();
        assert_eq!(subject_one.len(), 2);
        assert_eq!(subject_one[1].amount, Decimal::new(12550, 2));
    }

    #[tokio::test]
    async fn test_corrupt_line_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");
        let journal = AuditJournal::open(&path).unwrap();

        journal.append(&record(1, false)).await.unwrap();
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(file, "{{\"broken\":true}}\tdeadbeef").unwrap();
            writeln!(file, "no checksum here").unwrap();
        }
        journal.append(&record(2, false)).await.unwrap();

        let mut reader = JournalReader::open(&path).unwrap();
        let mut count = 0;
        while reader.next_entry().unwrap().is_some() {
            count += 1;
        }

        assert_eq!(count, 2);
        assert_eq!(reader.entries_read(), 2);
        assert_eq!(reader.errors(), 2);
    }

    #[tokio::test]
    async fn test_reopen_keeps_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");

        {
            let journal = AuditJournal::open(&path).unwrap();
            journal.append(&record(5, false)).await.unwrap();
        }

        let journal = AuditJournal::open(&path).unwrap();
        journal.append(&record(6, false)).await.unwrap();

        assert_eq!(journal.read_all().unwrap().len(), 2);
    }
}
