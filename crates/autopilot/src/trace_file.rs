//! JSONL decision trace with a SHA-256 hash chain.
//!
//! - Line 1: header with `format_version`, scenario and level names, and a hash of the config.
//! - Lines 2+: one record per autopilot tick, chained through `prev_sha256_hex` and `sha256_hex`.
//!
//! Every record is flushed as it is written. Loading stops at the first line that fails to
//! parse or breaks the chain.

use std::error::Error;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use xxhash_rust::xxh3::xxh3_64;

use crate::config::AutopilotConfig;
use crate::pilot::{Autopilot, decision_hash};
use crate::types::{AgentInput, AvatarView, GoalKind, Pos};

pub const FORMAT_VERSION: u16 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TraceHeader {
    pub format_version: u16,
    pub scenario: String,
    pub level: String,
    pub config_hash: u64,
}

impl TraceHeader {
    pub fn new(scenario: &str, level: &str, config: &AutopilotConfig) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            scenario: scenario.to_string(),
            level: level.to_string(),
            config_hash: config_hash(config),
        }
    }
}

/// Stable hash of a config's JSON form. Two runs with equal configs share it.
pub fn config_hash(config: &AutopilotConfig) -> u64 {
    serde_json::to_string(config).map_or(0, |json| xxh3_64(json.as_bytes()))
}

/// What the autopilot decided on one tick.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TraceRecord {
    pub tick: u64,
    pub pos: Vec2,
    pub heading: f32,
    pub goal: Option<GoalKind>,
    pub target: Option<Pos>,
    pub step: Option<usize>,
    pub input: AgentInput,
    pub decision_hash: u64,
}

impl TraceRecord {
    /// Captures the decision `pilot` just made for `avatar`.
    pub fn capture(pilot: &Autopilot, avatar: AvatarView, input: &AgentInput) -> Self {
        let diagnostics = pilot.diagnostics();
        let goal = diagnostics.goal.as_ref();
        Self {
            tick: diagnostics.tick,
            pos: avatar.pos,
            heading: avatar.heading,
            goal: goal.map(|goal| goal.kind()),
            target: goal.map(|goal| Pos::of_point(goal.position())),
            step: diagnostics.active_step,
            input: *input,
            decision_hash: decision_hash(input, goal),
        }
    }
}

#[derive(Serialize)]
struct RecordBody<'a> {
    seq: u64,
    record: &'a TraceRecord,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct FileRecord {
    seq: u64,
    record: TraceRecord,
    prev_sha256_hex: String,
    sha256_hex: String,
}

const INITIAL_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// `hex(SHA-256(body_json || prev_sha256_hex))`
fn compute_record_sha256(body_json: &str, prev_sha256_hex: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body_json.as_bytes());
    hasher.update(prev_sha256_hex.as_bytes());
    let result = hasher.finalize();
    format!("{result:064x}")
}

pub struct TraceWriter {
    writer: BufWriter<File>,
    last_sha256_hex: String,
    next_seq: u64,
}

impl TraceWriter {
    /// Creates the trace file (and missing parent directories) and writes the header.
    pub fn create(path: &Path, header: &TraceHeader) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        let header_json = serde_json::to_string(header).map_err(io::Error::other)?;
        writeln!(writer, "{header_json}")?;
        writer.flush()?;
        Ok(Self { writer, last_sha256_hex: INITIAL_HASH.to_string(), next_seq: 0 })
    }

    pub fn append(&mut self, record: &TraceRecord) -> io::Result<()> {
        let body = RecordBody { seq: self.next_seq, record };
        let body_json = serde_json::to_string(&body).map_err(io::Error::other)?;
        let sha256_hex = compute_record_sha256(&body_json, &self.last_sha256_hex);

        let line = FileRecord {
            seq: self.next_seq,
            record: record.clone(),
            prev_sha256_hex: self.last_sha256_hex.clone(),
            sha256_hex: sha256_hex.clone(),
        };
        let line_json = serde_json::to_string(&line).map_err(io::Error::other)?;
        writeln!(self.writer, "{line_json}")?;
        self.writer.flush()?;

        self.last_sha256_hex = sha256_hex;
        self.next_seq += 1;
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.next_seq
    }
}

#[derive(Debug)]
pub struct LoadedTrace {
    pub header: TraceHeader,
    pub records: Vec<TraceRecord>,
    pub last_sha256_hex: String,
}

impl LoadedTrace {
    /// Tick of the first record whose decision differs from `other`, or where one trace ends
    /// before the other.
    pub fn first_divergence(&self, other: &[TraceRecord]) -> Option<u64> {
        let diverged = self
            .records
            .iter()
            .zip(other)
            .find(|(a, b)| a.decision_hash != b.decision_hash)
            .map(|(a, _)| a.tick);
        diverged.or_else(|| {
            let shorter = self.records.len().min(other.len());
            let longer = if self.records.len() > other.len() { &self.records[..] } else { other };
            longer.get(shorter).map(|record| record.tick)
        })
    }
}

#[derive(Debug)]
pub enum TraceFileError {
    Io(io::Error),
    EmptyFile,
    InvalidHeader { line: usize, message: String },
    UnsupportedVersion { found: u16 },
    InvalidRecord { line: usize, message: String },
    /// File ended without a trailing newline.
    IncompleteLine { line: usize },
    HashChainBroken { line: usize },
}

impl fmt::Display for TraceFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "trace I/O error: {e}"),
            Self::EmptyFile => write!(f, "trace file is empty"),
            Self::InvalidHeader { line, message } => {
                write!(f, "invalid trace header at line {line}: {message}")
            }
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported trace format version {found} (expected {FORMAT_VERSION})")
            }
            Self::InvalidRecord { line, message } => {
                write!(f, "invalid trace record at line {line}: {message}")
            }
            Self::IncompleteLine { line } => write!(f, "incomplete trace line at line {line}"),
            Self::HashChainBroken { line } => write!(f, "SHA-256 hash chain broken at line {line}"),
        }
    }
}

impl Error for TraceFileError {}

/// Loads and validates a trace file, failing on the first bad line.
pub fn load_trace_from_file(path: &Path) -> Result<LoadedTrace, TraceFileError> {
    let content = fs::read_to_string(path).map_err(TraceFileError::Io)?;
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return Err(TraceFileError::EmptyFile);
    }
    if !content.ends_with('\n') {
        return Err(TraceFileError::IncompleteLine { line: lines.len() });
    }

    let header: TraceHeader = serde_json::from_str(lines[0])
        .map_err(|e| TraceFileError::InvalidHeader { line: 1, message: e.to_string() })?;
    if header.format_version != FORMAT_VERSION {
        return Err(TraceFileError::UnsupportedVersion { found: header.format_version });
    }

    let mut records = Vec::with_capacity(lines.len() - 1);
    let mut prev_sha256_hex = INITIAL_HASH.to_string();
    for (index, line) in lines.iter().enumerate().skip(1) {
        let line_number = index + 1;
        let invalid = |message: String| TraceFileError::InvalidRecord { line: line_number, message };

        let parsed: FileRecord = serde_json::from_str(line).map_err(|e| invalid(e.to_string()))?;
        let expected_seq = records.len() as u64;
        if parsed.seq != expected_seq {
            return Err(invalid(format!("expected seq {expected_seq}, found {}", parsed.seq)));
        }
        if parsed.prev_sha256_hex != prev_sha256_hex {
            return Err(TraceFileError::HashChainBroken { line: line_number });
        }
        let body = RecordBody { seq: parsed.seq, record: &parsed.record };
        let body_json = serde_json::to_string(&body).map_err(|e| invalid(e.to_string()))?;
        if parsed.sha256_hex != compute_record_sha256(&body_json, &prev_sha256_hex) {
            return Err(TraceFileError::HashChainBroken { line: line_number });
        }

        records.push(parsed.record);
        prev_sha256_hex = parsed.sha256_hex;
    }

    Ok(LoadedTrace { header, records, last_sha256_hex: prev_sha256_hex })
}
