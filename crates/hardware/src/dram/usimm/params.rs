//! DRAM parameter files.
//!
//! Both the system configuration file and the chip parameter file use the same line format:
//! one `KEY value` pair per line, blank lines allowed, `//` and `#` start a comment.
//! Keys are shared between the two files; a later file overrides an earlier one.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::common::error::SetupError;

/// Keys this model understands. Anything else is logged and ignored.
const KNOWN_KEYS: &[&str] = &[
    "NUM_CHANNELS",
    "NUM_RANKS",
    "NUM_BANKS",
    "NUM_ROWS",
    "NUM_COLUMNS",
    "CACHE_LINE_SIZE",
    "ADDRESS_BITS",
    "ADDRESS_MAPPING",
    "WQ_CAPACITY",
    "RQ_CAPACITY",
    "DRAM_CLK_FREQUENCY",
    "T_RCD",
    "T_RP",
    "T_CAS",
    "T_RAS",
    "T_RC",
    "T_CWD",
    "T_DATA_TRANS",
    "VDD",
    "IDD0",
    "IDD2N",
    "IDD3N",
    "IDD4R",
    "IDD4W",
    "CHIPS_PER_RANK",
];

/// Where a raw value came from, for error reporting.
#[derive(Clone, Debug)]
struct RawValue {
    text: String,
    path: PathBuf,
    line: usize,
}

/// Raw `KEY value` pairs gathered from one or more files.
#[derive(Debug, Default)]
pub struct ParamFile {
    values: HashMap<String, RawValue>,
}

impl ParamFile {
    /// Parses `text` (read from `path`) and merges its pairs in.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Parse`] for a line that is not exactly a key and a value.
    pub fn merge_str(&mut self, text: &str, path: &Path) -> Result<(), SetupError> {
        for (i, raw) in text.lines().enumerate() {
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (Some(key), Some(value), None) = (fields.next(), fields.next(), fields.next())
            else {
                return Err(SetupError::Parse {
                    path: path.to_path_buf(),
                    line: i + 1,
                    message: format!("expected `KEY value`, got `{line}`"),
                });
            };
            if !KNOWN_KEYS.contains(&key) {
                warn!(
                    key,
                    path = %path.display(),
                    line = i + 1,
                    "ignoring unknown DRAM parameter"
                );
                continue;
            }
            let _ = self.values.insert(
                key.to_string(),
                RawValue {
                    text: value.to_string(),
                    path: path.to_path_buf(),
                    line: i + 1,
                },
            );
        }
        Ok(())
    }

    /// Reads and merges a file, mapping a failure to open it through `on_missing`.
    ///
    /// # Errors
    ///
    /// Returns whatever `on_missing` builds if the file can't be read, or a parse error.
    pub fn merge_file<F>(&mut self, path: &Path, on_missing: F) -> Result<(), SetupError>
    where
        F: FnOnce(PathBuf, std::io::Error) -> SetupError,
    {
        let text = fs::read_to_string(path).map_err(|e| on_missing(path.to_path_buf(), e))?;
        self.merge_str(&text, path)
    }

    fn parse_with<T>(
        &self,
        key: &'static str,
        kind: &str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<Option<T>, SetupError> {
        let Some(raw) = self.values.get(key) else {
            return Ok(None);
        };
        parse(&raw.text).map(Some).ok_or_else(|| SetupError::Parse {
            path: raw.path.clone(),
            line: raw.line,
            message: format!("{key} must be {kind}, got `{}`", raw.text),
        })
    }

    /// Integer value of `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Parse`] if the value is not a non-negative integer.
    pub fn u64(&self, key: &'static str) -> Result<Option<u64>, SetupError> {
        self.parse_with(key, "a non-negative integer", |s| s.parse().ok())
    }

    /// Integer value of `key`, which must be present.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::MissingParameter`] if absent or a parse error if malformed.
    pub fn required_u64(&self, key: &'static str) -> Result<u64, SetupError> {
        self.u64(key)?.ok_or(SetupError::MissingParameter(key))
    }

    /// Power-of-two value of `key`, which must be present. Returns its log2.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::MissingParameter`] if absent or a parse error if the value is
    /// not a nonzero power of two.
    pub fn required_log2(&self, key: &'static str) -> Result<u32, SetupError> {
        let parsed = self.parse_with(key, "a power of two", |s| {
            s.parse::<u64>().ok().filter(|v| v.is_power_of_two())
        })?;
        parsed
            .map(u64::trailing_zeros)
            .ok_or(SetupError::MissingParameter(key))
    }

    /// Floating-point value of `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Parse`] if the value is not a number.
    pub fn f64(&self, key: &'static str) -> Result<Option<f64>, SetupError> {
        self.parse_with(key, "a number", |s| s.parse().ok())
    }
}

fn strip_comment(line: &str) -> &str {
    let cut = [line.find("//"), line.find('#')]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(line.len());
    &line[..cut]
}

/// Address geometry, each dimension stored as log2.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    /// log2 of the channel count.
    pub channel_bits: u32,
    /// log2 of ranks per channel.
    pub rank_bits: u32,
    /// log2 of banks per rank.
    pub bank_bits: u32,
    /// log2 of rows per bank.
    pub row_bits: u32,
    /// log2 of columns per row.
    pub column_bits: u32,
    /// log2 of the cache line size.
    pub line_bits: u32,
    /// Total address bits.
    pub address_bits: u32,
    /// 1: consecutive lines share a row. 2: consecutive lines stripe across channels and banks.
    pub mapping: u8,
}

impl Geometry {
    /// Number of channels.
    pub const fn channels(&self) -> usize {
        1 << self.channel_bits
    }

    /// Ranks per channel.
    pub const fn ranks(&self) -> usize {
        1 << self.rank_bits
    }

    /// Banks per rank.
    pub const fn banks(&self) -> usize {
        1 << self.bank_bits
    }
}

/// Timing in DRAM cycles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timing {
    /// Activate to column command.
    pub t_rcd: u64,
    /// Precharge to activate.
    pub t_rp: u64,
    /// Column read to data.
    pub t_cas: u64,
    /// Activate to precharge.
    pub t_ras: u64,
    /// Row cycle.
    pub t_rc: u64,
    /// Column write to data.
    pub t_cwd: u64,
    /// One burst on the data bus.
    pub t_data_trans: u64,
}

/// Supply voltage and currents (mA) used for the power estimate.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Power {
    /// Supply voltage.
    pub vdd: f64,
    /// Activate-precharge current.
    pub idd0: f64,
    /// Precharge standby current.
    pub idd2n: f64,
    /// Active standby current.
    pub idd3n: f64,
    /// Burst read current.
    pub idd4r: f64,
    /// Burst write current.
    pub idd4w: f64,
    /// Chips per rank.
    pub chips_per_rank: f64,
}

/// Fully validated USIMM parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UsimmParams {
    /// Address geometry.
    pub geometry: Geometry,
    /// Timing.
    pub timing: Timing,
    /// Power model inputs.
    pub power: Power,
    /// Write queue entries per channel.
    pub wq_capacity: usize,
    /// Read queue entries per channel.
    pub rq_capacity: usize,
}

impl UsimmParams {
    /// Extracts the geometry, which the system configuration file must fully define.
    ///
    /// # Errors
    ///
    /// Returns a setup error for a missing or malformed value, or [`SetupError::Geometry`]
    /// if the dimensions don't add up to `ADDRESS_BITS`.
    pub fn geometry(file: &ParamFile) -> Result<Geometry, SetupError> {
        let g = Geometry {
            channel_bits: file.required_log2("NUM_CHANNELS")?,
            rank_bits: file.required_log2("NUM_RANKS")?,
            bank_bits: file.required_log2("NUM_BANKS")?,
            row_bits: file.required_log2("NUM_ROWS")?,
            column_bits: file.required_log2("NUM_COLUMNS")?,
            line_bits: file.required_log2("CACHE_LINE_SIZE")?,
            address_bits: file.required_u64("ADDRESS_BITS")? as u32,
            mapping: file
                .parse_with("ADDRESS_MAPPING", "1 or 2", |s| {
                    s.parse::<u8>().ok().filter(|m| (1..=2).contains(m))
                })?
                .unwrap_or(1),
        };
        let needed =
            g.channel_bits + g.rank_bits + g.bank_bits + g.row_bits + g.column_bits + g.line_bits;
        if needed != g.address_bits {
            return Err(SetupError::Geometry {
                needed,
                configured: g.address_bits,
            });
        }
        Ok(g)
    }

    /// Extracts every parameter once both files are merged.
    ///
    /// # Errors
    ///
    /// Returns a setup error for any missing or malformed parameter.
    pub fn from_file(file: &ParamFile, geometry: Geometry) -> Result<Self, SetupError> {
        let t_ras = file.u64("T_RAS")?.unwrap_or(112);
        let t_rp = file.required_u64("T_RP")?;
        let timing = Timing {
            t_rcd: file.required_u64("T_RCD")?,
            t_rp,
            t_cas: file.required_u64("T_CAS")?,
            t_ras,
            t_rc: file.u64("T_RC")?.unwrap_or(t_ras + t_rp),
            t_cwd: file.u64("T_CWD")?.unwrap_or(20),
            t_data_trans: file.required_u64("T_DATA_TRANS")?,
        };
        let power = Power {
            vdd: file.f64("VDD")?.unwrap_or(0.0),
            idd0: file.f64("IDD0")?.unwrap_or(0.0),
            idd2n: file.f64("IDD2N")?.unwrap_or(0.0),
            idd3n: file.f64("IDD3N")?.unwrap_or(0.0),
            idd4r: file.f64("IDD4R")?.unwrap_or(0.0),
            idd4w: file.f64("IDD4W")?.unwrap_or(0.0),
            chips_per_rank: file.f64("CHIPS_PER_RANK")?.unwrap_or(16.0),
        };
        Ok(Self {
            geometry,
            timing,
            power,
            wq_capacity: file.u64("WQ_CAPACITY")?.unwrap_or(64) as usize,
            rq_capacity: file.u64("RQ_CAPACITY")?.unwrap_or(64) as usize,
        })
    }
}
