//! Engine-owned argument group and parser introspection
//!
//! The host hands over its own `clap::Command`; we bolt the recording
//! options onto it, parse, and split the result four ways: host args,
//! engine options, the default-argument snapshot, and the reconstructed
//! command line.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::Value;

use crate::{infer_literal, GlobalConfig, Result};

/// Help heading under which the engine options are listed.
pub const OPTION_GROUP_HEADING: &str = "Experiment recording";

/// Root directory used when neither the command line nor the global
/// config names one. Relative to the working directory.
pub const DEFAULT_EXPERIMENTS_DIR: &str = "experiments";

const EXPERIMENTS_DIR_ID: &str = "experiments-directory";
const EXPERIMENT_ID_ID: &str = "experiment-id";
const DESCRIPTION_ID: &str = "description";

/// Options owned by the engine, stripped from the host's view of the parse.
const ENGINE_IDS: &[&str] = &[EXPERIMENTS_DIR_ID, EXPERIMENT_ID_ID, DESCRIPTION_ID];

/// Attach the engine-owned option group to the host's parser.
///
/// `description` becomes the default value of `--description`. Calling
/// this twice on the same command is undefined (clap panics on duplicate
/// argument ids); callers must not.
pub fn add_argument_group(cmd: Command, description: Option<&str>) -> Command {
    let default_description = description.unwrap_or("").to_string();
    cmd.arg(
        Arg::new(EXPERIMENTS_DIR_ID)
            .long("experiments-directory")
            .value_name("PATH")
            .default_value(DEFAULT_EXPERIMENTS_DIR)
            .help("Root directory under which experiment directories are allocated")
            .help_heading(OPTION_GROUP_HEADING),
    )
    .arg(
        Arg::new(EXPERIMENT_ID_ID)
            .long("experiment-id")
            .value_name("ID")
            .help("Use this experiment id verbatim instead of auto-allocating one")
            .help_heading(OPTION_GROUP_HEADING),
    )
    .arg(
        Arg::new(DESCRIPTION_ID)
            .long("description")
            .value_name("TEXT")
            .default_value(default_description)
            .help("Free-form description stored in the experiment metadata")
            .help_heading(OPTION_GROUP_HEADING),
    )
}

/// Engine options recovered from a parse, with global-config fallbacks
/// already applied.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub experiments_directory: PathBuf,
    pub experiment_id: Option<String>,
    pub description: String,
    pub allow_dirty: bool,
}

/// Everything the lifecycle controller needs from one invocation.
#[derive(Debug, Clone)]
pub struct ParsedInvocation {
    /// Non-engine arguments mapped to their parsed values.
    pub host_args: BTreeMap<String, Value>,
    pub engine: EngineOptions,
    /// The parser's defaults, with required positionals omitted. Equal to
    /// what parsing an empty argument vector would produce.
    pub default_args: BTreeMap<String, Value>,
    /// The invocation rebuilt as a shell command line.
    pub command_line: String,
}

/// Parse `arg_list` (or the process argument vector) against the host's
/// parser. The parser must have had [`add_argument_group`] applied.
pub fn parse(cmd: &mut Command, arg_list: Option<Vec<OsString>>) -> Result<ParsedInvocation> {
    let config = GlobalConfig::load().unwrap_or_default();
    parse_with_config(cmd, arg_list, &config)
}

/// [`parse`] with an explicit global config instead of the on-disk one.
pub fn parse_with_config(
    cmd: &mut Command,
    arg_list: Option<Vec<OsString>>,
    config: &GlobalConfig,
) -> Result<ParsedInvocation> {
    let argv: Vec<OsString> = match arg_list {
        Some(list) => {
            // Match the process argv shape: the program name leads.
            let mut v = vec![OsString::from(cmd.get_name().to_string())];
            v.extend(list);
            v
        }
        None => std::env::args_os().collect(),
    };

    let matches = cmd.try_get_matches_from_mut(argv.clone())?;

    let words: Vec<String> = argv
        .iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();

    Ok(ParsedInvocation {
        host_args: collect_host_args(cmd, &matches),
        engine: resolve_engine_options(&matches, config),
        default_args: collect_default_args(cmd),
        command_line: shell_words::join(&words),
    })
}

fn is_engine_arg(id: &str) -> bool {
    ENGINE_IDS.contains(&id)
}

fn is_builtin(id: &str) -> bool {
    matches!(id, "help" | "version")
}

fn accepts_multiple(arg: &Arg) -> bool {
    arg.get_num_args().map(|r| r.max_values() > 1).unwrap_or(false)
}

fn collect_host_args(cmd: &Command, matches: &ArgMatches) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_str();
        if is_engine_arg(id) || is_builtin(id) {
            continue;
        }
        out.insert(id.to_string(), matched_value(arg, matches));
    }
    out
}

/// The parsed value of one argument, as JSON.
fn matched_value(arg: &Arg, matches: &ArgMatches) -> Value {
    let id = arg.get_id().as_str();
    match arg.get_action() {
        ArgAction::SetTrue | ArgAction::SetFalse => Value::Bool(matches.get_flag(id)),
        ArgAction::Count => Value::from(matches.get_count(id)),
        _ => {
            let raw: Option<Vec<String>> = matches
                .get_raw(id)
                .map(|vals| vals.map(|v| v.to_string_lossy().into_owned()).collect());
            match raw {
                None => Value::Null,
                Some(vals) if vals.len() == 1 && !accepts_multiple(arg) => {
                    infer_literal(&vals[0])
                }
                Some(vals) => Value::Array(vals.iter().map(|v| infer_literal(v)).collect()),
            }
        }
    }
}

fn collect_default_args(cmd: &Command) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_str();
        if is_engine_arg(id) || is_builtin(id) {
            continue;
        }
        // Required positionals have no default; parsing an empty argument
        // vector would not produce them.
        if arg.is_positional() && arg.is_required_set() {
            continue;
        }
        out.insert(id.to_string(), default_value(arg));
    }
    out
}

fn default_value(arg: &Arg) -> Value {
    match arg.get_action() {
        ArgAction::SetTrue => Value::Bool(false),
        ArgAction::SetFalse => Value::Bool(true),
        ArgAction::Count => Value::from(0),
        _ => {
            let defaults: Vec<String> = arg
                .get_default_values()
                .iter()
                .map(|v| v.to_string_lossy().into_owned())
                .collect();
            match defaults.len() {
                0 => Value::Null,
                1 if !accepts_multiple(arg) => infer_literal(&defaults[0]),
                _ => Value::Array(defaults.iter().map(|v| infer_literal(v)).collect()),
            }
        }
    }
}

fn resolve_engine_options(matches: &ArgMatches, config: &GlobalConfig) -> EngineOptions {
    let dir_from_cli =
        matches.value_source(EXPERIMENTS_DIR_ID) == Some(ValueSource::CommandLine);
    let experiments_directory = if dir_from_cli {
        matches
            .get_one::<String>(EXPERIMENTS_DIR_ID)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPERIMENTS_DIR))
    } else {
        match &config.defaults.experiments_directory {
            Some(dir) => PathBuf::from(dir),
            None => matches
                .get_one::<String>(EXPERIMENTS_DIR_ID)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPERIMENTS_DIR)),
        }
    };

    // Precedence: --description, then the group default the host passed to
    // add_argument_group, then the global config, then empty.
    let cli_description = matches
        .get_one::<String>(DESCRIPTION_ID)
        .cloned()
        .unwrap_or_default();
    let description = if cli_description.is_empty() {
        config.defaults.description.clone().unwrap_or_default()
    } else {
        cli_description
    };

    EngineOptions {
        experiments_directory,
        experiment_id: matches.get_one::<String>(EXPERIMENT_ID_ID).cloned(),
        description,
        allow_dirty: config.defaults.allow_dirty,
    }
}
