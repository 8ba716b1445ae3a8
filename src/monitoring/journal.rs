use anyhow::Result;
use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use ethers::types::TxHash;
use crate::data::types::Side;

const HEADER: &str = "timestamp,market_id,side,tx_hash,block,status,error";

/// One finished submission. The stake itself is never written.
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub market_id: String,
    pub side: Side,
    pub tx_hash: Option<TxHash>,
    pub block: Option<u64>,
    pub status: &'static str,
    pub error: Option<String>,
}

/// Append-only CSV log of submission outcomes.
pub struct SubmissionJournal {
    log_path: String,
    lock: Mutex<()>,
}

impl SubmissionJournal {
    pub fn new(log_path: String) -> Result<Self> {
        // Create CSV file with headers if it doesn't exist
        if !Path::new(&log_path).exists() {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .open(&log_path)?;
            writeln!(file, "{}", HEADER)?;
        }

        Ok(Self {
            log_path,
            lock: Mutex::new(()),
        })
    }

    pub fn record(&self, entry: &JournalEntry) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| anyhow::anyhow!("journal lock poisoned"))?;
        let mut file = OpenOptions::new().append(true).open(&self.log_path)?;

        let tx_hash = entry.tx_hash.map(|h| format!("{:?}", h)).unwrap_or_default();
        let block = entry.block.map(|b| b.to_string()).unwrap_or_default();
        let error = entry.error.as_deref().map(csv_field).unwrap_or_default();

        writeln!(
            file,
            "{},{},{},{},{},{},{}",
            entry.timestamp.to_rfc3339(),
            csv_field(&entry.market_id),
            entry.side,
            tx_hash,
            block,
            entry.status,
            error
        )?;

        Ok(())
    }
}

/// Quote a field if it holds a delimiter, quote or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
