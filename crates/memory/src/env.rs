//! Environment-variable configuration for the arena
//!
//! Values are integers with an optional binary unit suffix (`k`/`K` for
//! KiB, `m`/`M` for MiB). Problems never abort loading: each one becomes an
//! [`EnvWarning`], is logged with `tracing::warn!`, and the previous value
//! of the affected setting is kept.

use core::fmt;

use thiserror::Error;
use tracing::{debug, warn};

use crate::arena::Arena;
use crate::error::{MemoryError, MemoryResult};
use crate::utils::{KIB, MIB};

/// Prefix used for the process environment of the global arena
pub const ENV_PREFIX: &str = "IMAGING";

/// Arena settings that can be set from the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvVariable {
    /// Block alignment
    Alignment,
    /// Block size in bytes
    BlockSize,
    /// Cache capacity in blocks
    BlocksMax,
}

impl EnvVariable {
    /// All variables, in application order
    ///
    /// Block size is applied before the cache capacity so the capacity
    /// overflow check sees the new block size.
    pub const ALL: [Self; 3] = [Self::Alignment, Self::BlockSize, Self::BlocksMax];

    /// Unprefixed variable name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Alignment => "ALIGNMENT",
            Self::BlockSize => "BLOCK_SIZE",
            Self::BlocksMax => "BLOCKS_MAX",
        }
    }

    const fn parameter(self) -> &'static str {
        match self {
            Self::Alignment => "alignment",
            Self::BlockSize => "block size",
            Self::BlocksMax => "blocks max",
        }
    }

    fn apply(self, arena: &Arena, value: i64) -> MemoryResult<usize> {
        let value = usize::try_from(value).map_err(|_| {
            MemoryError::invalid_argument(self.parameter(), value, "must not be negative")
        })?;
        match self {
            Self::Alignment => arena.set_alignment(value)?,
            Self::BlockSize => arena.set_block_size(value)?,
            Self::BlocksMax => arena.set_blocks_max(value)?,
        }
        Ok(value)
    }
}

impl fmt::Display for EnvVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a value could not be read as a size
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvParseError {
    #[error("empty value")]
    Empty,

    #[error("`{0}` is not an integer")]
    NotANumber(String),

    #[error("`{0}` does not fit in 64 bits")]
    Overflow(String),
}

/// Parses an integer with an optional `k`/`K`/`m`/`M` suffix
///
/// # Examples
/// ```
/// use imaging_memory::env::parse_size;
///
/// assert_eq!(parse_size("2K"), Ok(2048));
/// assert_eq!(parse_size("2m"), Ok(2 * 1024 * 1024));
/// assert_eq!(parse_size("-1"), Ok(-1));
/// assert!(parse_size("wat").is_err());
/// ```
pub fn parse_size(value: &str) -> Result<i64, EnvParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::Empty);
    }

    let (digits, unit) = match trimmed.as_bytes()[trimmed.len() - 1] {
        b'k' | b'K' => (&trimmed[..trimmed.len() - 1], KIB as i64),
        b'm' | b'M' => (&trimmed[..trimmed.len() - 1], MIB as i64),
        _ => (trimmed, 1),
    };

    let number: i64 = digits
        .trim_end()
        .parse()
        .map_err(|_| EnvParseError::NotANumber(value.to_string()))?;

    number
        .checked_mul(unit)
        .ok_or_else(|| EnvParseError::Overflow(value.to_string()))
}

/// Why a variable was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvWarningKind {
    /// The value is not a size
    Unparsable(EnvParseError),
    /// The setter refused the value
    Rejected(MemoryError),
}

impl fmt::Display for EnvWarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unparsable(err) => write!(f, "unparsable: {err}"),
            Self::Rejected(err) => write!(f, "rejected: {err}"),
        }
    }
}

/// Non-fatal diagnostic for one skipped variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvWarning {
    /// Variable name as given
    pub variable: String,
    /// Raw value as given
    pub value: String,
    /// Setting the variable targets
    pub target: EnvVariable,
    /// Reason the variable was skipped
    pub kind: EnvWarningKind,
}

impl fmt::Display for EnvWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?} ignored, {}", self.variable, self.value, self.kind)
    }
}

/// Outcome of one loader run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvReport {
    /// Variables applied, with the value they set
    pub applied: Vec<(String, usize)>,
    /// Variables skipped
    pub warnings: Vec<EnvWarning>,
}

impl EnvReport {
    /// Whether every recognised variable was applied
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Applies `ALIGNMENT`, `BLOCK_SIZE` and `BLOCKS_MAX` variables to an arena
#[derive(Debug, Clone, Default)]
pub struct EnvLoader {
    /// Required prefix, without the trailing separator
    prefix: Option<String>,
}

impl EnvLoader {
    /// Loader recognising the bare names and any `<PREFIX>_<NAME>`
    pub fn new() -> Self {
        Self { prefix: None }
    }

    /// Loader recognising only `<prefix>_<NAME>`
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into().to_ascii_uppercase()),
        }
    }

    fn matches(&self, key: &str, variable: EnvVariable) -> bool {
        let key = key.to_ascii_uppercase();
        let name = variable.name();
        match &self.prefix {
            Some(prefix) => key
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix('_'))
                .is_some_and(|rest| rest == name),
            None => {
                key == name
                    || key
                        .strip_suffix(name)
                        .is_some_and(|head| head.ends_with('_'))
            }
        }
    }

    /// Applies recognised variables, logging every warning
    pub fn apply<I, K, V>(&self, arena: &Arena, vars: I) -> EnvReport
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.apply_with(arena, vars, |_| {})
    }

    /// Applies recognised variables, passing every warning to `on_warning`
    ///
    /// Variables are applied in [`EnvVariable::ALL`] order; when several
    /// keys name the same setting they are applied in key order.
    pub fn apply_with<I, K, V, F>(&self, arena: &Arena, vars: I, mut on_warning: F) -> EnvReport
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
        F: FnMut(&EnvWarning),
    {
        let mut vars: Vec<(String, String)> = vars
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();
        vars.sort();

        let mut report = EnvReport::default();
        for target in EnvVariable::ALL {
            for (key, value) in vars.iter().filter(|(key, _)| self.matches(key, target)) {
                let outcome = parse_size(value)
                    .map_err(EnvWarningKind::Unparsable)
                    .and_then(|parsed| {
                        target
                            .apply(arena, parsed)
                            .map_err(EnvWarningKind::Rejected)
                    });

                match outcome {
                    Ok(applied) => {
                        debug!(variable = %key, value = applied, "Applied arena setting from environment");
                        report.applied.push((key.clone(), applied));
                    }
                    Err(kind) => {
                        let warning = EnvWarning {
                            variable: key.clone(),
                            value: value.clone(),
                            target,
                            kind,
                        };
                        warn!(variable = %key, value = %value, "{warning}");
                        on_warning(&warning);
                        report.warnings.push(warning);
                    }
                }
            }
        }
        report
    }

    /// Applies recognised variables from the process environment
    pub fn apply_process_env(&self, arena: &Arena) -> EnvReport {
        self.apply(arena, std::env::vars())
    }
}
