//! Command-line parsing for the two binaries.

use crate::{ArgsError, ProblemKind};
use shmring::{prefix_from_env, RingConfig};
use std::str::FromStr;
use std::time::Duration;

pub const SUPERVISOR_USAGE: &str = "\
Usage: supervisor [--problem arcset|color] [--prefix NAME] [--capacity N]
                  [--max-producers N] [-n LIMIT] [-w DELAY] [--cleanup]

  --problem        problem solved by the generators (default: arcset)
  --prefix         name prefix of the shared objects (default: $SHMRING_PREFIX or shmring)
  --capacity       ring slots (default: 16)
  --max-producers  generators allowed at once (default: 64)
  -n LIMIT         stop after LIMIT candidates
  -w DELAY         wait DELAY seconds before reading candidates
  --cleanup        remove objects left behind by a crashed supervisor first";

pub const GENERATOR_USAGE: &str = "\
Usage: generator [--problem arcset|color] [--prefix NAME] EDGE...

  EDGE             directed edge u-v with decimal vertex ids, e.g. 0-1 1-2 2-0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorArgs {
    pub problem: ProblemKind,
    pub prefix: String,
    pub config: RingConfig,
    pub limit: Option<u64>,
    pub delay: Duration,
    pub cleanup: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorArgs {
    pub problem: ProblemKind,
    pub prefix: String,
    pub edges: Vec<String>,
}

/// Tracks options seen once.
#[derive(Default)]
struct Seen(Vec<&'static str>);

impl Seen {
    fn first(&mut self, flag: &'static str) -> Result<(), ArgsError> {
        if self.0.contains(&flag) {
            return Err(ArgsError::Repeated(flag.into()));
        }
        self.0.push(flag);
        Ok(())
    }
}

fn value(flag: &str, args: &mut impl Iterator<Item = String>) -> Result<String, ArgsError> {
    args.next()
        .ok_or_else(|| ArgsError::MissingValue(flag.into()))
}

fn number<T>(flag: &str, raw: &str) -> Result<T, ArgsError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let invalid = |reason: String| ArgsError::InvalidValue {
        flag: flag.into(),
        value: raw.into(),
        reason,
    };
    let n = raw.parse::<T>().map_err(|e| invalid(e.to_string()))?;
    if n <= T::default() {
        return Err(invalid("must be positive".into()));
    }
    Ok(n)
}

impl SupervisorArgs {
    /// Parses arguments without the program name.
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            problem: ProblemKind::default(),
            prefix: prefix_from_env(),
            config: RingConfig::default(),
            limit: None,
            delay: Duration::ZERO,
            cleanup: false,
        };
        let mut seen = Seen::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => return Err(ArgsError::HelpRequested),
                "--problem" => {
                    seen.first("--problem")?;
                    parsed.problem = value(&arg, &mut args)?.parse()?;
                }
                "--prefix" => {
                    seen.first("--prefix")?;
                    parsed.prefix = value(&arg, &mut args)?;
                }
                "--capacity" => {
                    seen.first("--capacity")?;
                    parsed.config.capacity = number(&arg, &value(&arg, &mut args)?)?;
                }
                "--max-producers" => {
                    seen.first("--max-producers")?;
                    parsed.config.max_producers = number(&arg, &value(&arg, &mut args)?)?;
                }
                "-n" => {
                    seen.first("-n")?;
                    parsed.limit = Some(number(&arg, &value(&arg, &mut args)?)?);
                }
                "-w" => {
                    seen.first("-w")?;
                    parsed.delay = Duration::from_secs(number(&arg, &value(&arg, &mut args)?)?);
                }
                "--cleanup" => {
                    seen.first("--cleanup")?;
                    parsed.cleanup = true;
                }
                other if other.starts_with('-') => {
                    return Err(ArgsError::UnknownOption(other.into()))
                }
                other => return Err(ArgsError::UnexpectedArgument(other.into())),
            }
        }
        Ok(parsed)
    }
}

impl GeneratorArgs {
    /// Parses arguments without the program name. Edges are validated later
    /// by [`Graph::parse`](crate::Graph::parse).
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            problem: ProblemKind::default(),
            prefix: prefix_from_env(),
            edges: Vec::new(),
        };
        let mut seen = Seen::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => return Err(ArgsError::HelpRequested),
                "--problem" => {
                    seen.first("--problem")?;
                    parsed.problem = value(&arg, &mut args)?.parse()?;
                }
                "--prefix" => {
                    seen.first("--prefix")?;
                    parsed.prefix = value(&arg, &mut args)?;
                }
                "--" => {
                    parsed.edges.extend(args.by_ref());
                }
                other if other.starts_with('-') => {
                    return Err(ArgsError::UnknownOption(other.into()))
                }
                _ => parsed.edges.push(arg),
            }
        }
        Ok(parsed)
    }
}
