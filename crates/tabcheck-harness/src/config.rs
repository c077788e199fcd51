//! Harness configuration: defaults, then environment, then command line.

use std::path::PathBuf;

use tabcheck_error::{OracleError, Result};
use tabcheck_gen::{CFloatFormat, DEFAULT_SEED, FeatureSpec};

/// Base seed override (decimal or `0x` hex).
pub const ENV_SEED: &str = "TABCHECK_SEED";

/// Directory for `input.tsv`/`expected.tsv`/`observed.tsv` and `failures/`.
pub const ENV_WORK_DIR: &str = "TABCHECK_WORK_DIR";

/// Canonical float format the program under test echoes, e.g. `%.1e`.
pub const ENV_FLOAT_FORMAT: &str = "TABCHECK_FLOAT_FORMAT";

/// Options every harness binary understands.
pub const SHARED_OPTIONS_HELP: &str = "\
    --seed <u64>              Base seed (decimal or 0x-hex; env TABCHECK_SEED)
    --work-dir <PATH>         Artifact directory (default: .; env TABCHECK_WORK_DIR)
    --float-format <FMT>      Canonical float format (default: %.1e; env TABCHECK_FLOAT_FORMAT)
    --summary-out <PATH>      Write the run summary JSON to file
    --log-json <PATH>         Also write JSON-lines logs to file
    -v, --verbose             Trace-level logging
    -h, --help                Show this help";

/// Feature spec pins understood by the spec-driven binaries.
pub const SPEC_OPTIONS_HELP: &str = "\
    --class <bool|cat|cont>   Statistical class
    --rep <str|int|fp>        Value representation
    --length <n>              Number of values
    --missing <n>             Number of missing values
    --card <k>                Category count for bool/cat
    --labeled <true|false>    Prepend a row label
    --prefixed <true|false>   Prefix the label with B:, C: or N:
    --na <tok,tok,...>        Allowed missing tokens (empty entries allowed)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub seed: u64,
    pub work_dir: PathBuf,
    pub canonical: CFloatFormat,
    pub summary_out: Option<PathBuf>,
    pub log_json: Option<PathBuf>,
    pub verbose: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            work_dir: PathBuf::from("."),
            canonical: CFloatFormat::canonical(),
            summary_out: None,
            log_json: None,
            verbose: false,
        }
    }
}

impl HarnessConfig {
    /// Defaults overridden by the process environment.
    ///
    /// # Errors
    ///
    /// Returns `OracleError::InvalidArgument` or `InvalidFloatFormat` when a
    /// variable is set but unparseable.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Self::from_env`] with an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(raw) = lookup(ENV_SEED) {
            cfg.seed = parse_seed(ENV_SEED, &raw)?;
        }
        if let Some(raw) = lookup(ENV_WORK_DIR).filter(|v| !v.is_empty()) {
            cfg.work_dir = PathBuf::from(raw);
        }
        if let Some(raw) = lookup(ENV_FLOAT_FORMAT) {
            cfg.canonical = raw.parse()?;
        }
        Ok(cfg)
    }

    /// Consume the shared option at `args[*i]`, if it is one, advancing `i`
    /// past its value. Returns `false` for anything else, including
    /// `-h`/`--help`, which each binary handles itself.
    ///
    /// # Errors
    ///
    /// Returns `OracleError::InvalidArgument` for a missing or bad value.
    pub fn take_option(&mut self, args: &[String], i: &mut usize) -> Result<bool> {
        let flag = args[*i].as_str();
        match flag {
            "-v" | "--verbose" => self.verbose = true,
            "--seed" => self.seed = parse_seed(flag, option_value(args, i)?)?,
            "--work-dir" => self.work_dir = PathBuf::from(option_value(args, i)?),
            "--float-format" => self.canonical = option_value(args, i)?.parse()?,
            "--summary-out" => self.summary_out = Some(PathBuf::from(option_value(args, i)?)),
            "--log-json" => self.log_json = Some(PathBuf::from(option_value(args, i)?)),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// Consume the spec pin at `args[*i]`, if it is one, advancing `i` past its
/// value.
///
/// # Errors
///
/// Returns `OracleError::InvalidArgument` for a missing or bad value, and
/// the class or representation parse errors.
pub fn take_spec_option(spec: &mut FeatureSpec, args: &[String], i: &mut usize) -> Result<bool> {
    let flag = args[*i].as_str();
    match flag {
        "--class" => spec.class = Some(option_value(args, i)?.parse()?),
        "--rep" => spec.rep = Some(option_value(args, i)?.parse()?),
        "--length" => spec.length = Some(parse_count(flag, option_value(args, i)?)?),
        "--missing" => spec.missing = Some(parse_count(flag, option_value(args, i)?)?),
        "--card" => spec.card = Some(parse_count(flag, option_value(args, i)?)?),
        "--labeled" => spec.labeled = Some(parse_bool(flag, option_value(args, i)?)?),
        "--prefixed" => spec.prefixed = Some(parse_bool(flag, option_value(args, i)?)?),
        "--na" => {
            let raw = option_value(args, i)?;
            spec.na = Some(raw.split(',').map(str::to_owned).collect());
        }
        _ => return Ok(false),
    }
    Ok(true)
}

/// Value following the option at `args[*i]`; advances `i` onto it.
///
/// # Errors
///
/// Returns `OracleError::InvalidArgument` if the option is last.
pub fn option_value<'a>(args: &'a [String], i: &mut usize) -> Result<&'a str> {
    let flag = &args[*i];
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| OracleError::argument(flag.as_str(), "requires a value"))
}

/// Parse a seed given in decimal or `0x`-prefixed hex.
///
/// # Errors
///
/// Returns `OracleError::InvalidArgument` naming `name`.
pub fn parse_seed(name: &str, raw: &str) -> Result<u64> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => raw.replace('_', "").parse(),
    };
    parsed.map_err(|_| OracleError::argument(name, format!("not a 64-bit seed: {raw}")))
}

/// Parse `true`/`false` (also `yes`/`no`, `1`/`0`).
///
/// # Errors
///
/// Returns `OracleError::InvalidArgument` naming `name`.
pub fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(OracleError::argument(name, format!("not a boolean: {raw}"))),
    }
}

/// Parse a non-negative count argument.
///
/// # Errors
///
/// Returns `OracleError::InvalidArgument` naming `name`.
pub fn parse_count<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| OracleError::argument(name, format!("not a non-negative integer: {raw}")))
}
