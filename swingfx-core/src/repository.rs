//! Persistence of bot and group state.
//!
//! The engine takes a `BotRepository` as a dependency and calls it after each
//! bot's turn. Two implementations: in-memory (tests, dry runs) and a JSON
//! file layout:
//!
//! ```text
//! <root>/group.json          latest GroupSnapshot
//! <root>/bots/<PAIR>.json    latest Bot state
//! <root>/orders.jsonl        append-only archive of closed orders
//! ```

use crate::engine::Bot;
use crate::orders::Order;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("repository I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("repository serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Group-level state as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub name: String,
    pub enabled: bool,
    pub consecutive_losses: u32,
    pub balance: f64,
    pub ready: bool,
    /// Fingerprint of the config the group ran under.
    pub fingerprint: String,
    pub saved_at: DateTime<Utc>,
}

/// A closed order as archived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedOrder {
    pub pair: String,
    pub order: Order,
}

pub trait BotRepository {
    fn save_bot(&mut self, bot: &Bot) -> Result<(), RepositoryError>;

    fn save_group(&mut self, snapshot: &GroupSnapshot) -> Result<(), RepositoryError>;

    fn archive_order(&mut self, pair: &str, order: &Order) -> Result<(), RepositoryError>;
}

// ── In-memory ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryRepository {
    pub bots: HashMap<String, Bot>,
    pub group: Option<GroupSnapshot>,
    pub archive: Vec<ArchivedOrder>,
    /// Number of save calls (bots + group).
    pub saves: usize,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BotRepository for MemoryRepository {
    fn save_bot(&mut self, bot: &Bot) -> Result<(), RepositoryError> {
        self.bots.insert(bot.name().to_string(), bot.clone());
        self.saves += 1;
        Ok(())
    }

    fn save_group(&mut self, snapshot: &GroupSnapshot) -> Result<(), RepositoryError> {
        self.group = Some(snapshot.clone());
        self.saves += 1;
        Ok(())
    }

    fn archive_order(&mut self, pair: &str, order: &Order) -> Result<(), RepositoryError> {
        self.archive.push(ArchivedOrder {
            pair: pair.to_string(),
            order: order.clone(),
        });
        Ok(())
    }
}

// ── JSON files ──────────────────────────────────────────────────────

pub struct JsonFileRepository {
    root: PathBuf,
}

impl JsonFileRepository {
    /// Open (creating if needed) a repository rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let root = root.into();
        fs::create_dir_all(root.join("bots"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bot_path(&self, pair: &str) -> PathBuf {
        self.root.join("bots").join(format!("{pair}.json"))
    }

    fn group_path(&self) -> PathBuf {
        self.root.join("group.json")
    }

    fn archive_path(&self) -> PathBuf {
        self.root.join("orders.jsonl")
    }

    pub fn load_bot(&self, pair: &str) -> Result<Option<Bot>, RepositoryError> {
        read_json(&self.bot_path(pair))
    }

    pub fn load_group(&self) -> Result<Option<GroupSnapshot>, RepositoryError> {
        read_json(&self.group_path())
    }

    /// All archived orders, oldest first. Malformed lines are skipped.
    pub fn load_archive(&self) -> Result<Vec<ArchivedOrder>, RepositoryError> {
        let path = self.archive_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = io::BufReader::new(fs::File::open(&path)?);
        let mut out = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entry) => out.push(entry),
                Err(e) => log::warn!("skipping malformed archive line {}: {e}", i + 1),
            }
        }
        Ok(out)
    }
}

impl BotRepository for JsonFileRepository {
    fn save_bot(&mut self, bot: &Bot) -> Result<(), RepositoryError> {
        write_json_atomic(&self.bot_path(bot.name()), bot)
    }

    fn save_group(&mut self, snapshot: &GroupSnapshot) -> Result<(), RepositoryError> {
        write_json_atomic(&self.group_path(), snapshot)
    }

    fn archive_order(&mut self, pair: &str, order: &Order) -> Result<(), RepositoryError> {
        let entry = ArchivedOrder {
            pair: pair.to_string(),
            order: order.clone(),
        };
        let json = serde_json::to_string(&entry)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.archive_path())?;
        writeln!(file, "{json}")?;
        file.flush()?;
        Ok(())
    }
}

/// Write to a sibling temp file, then rename over the target.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), RepositoryError> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, RepositoryError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
