//! Command-line argument parsing.
//!
//! Usage:
//!   pica [-d] [--config FILE | --no-config] run [FILE] [NAME…] [--delay MS] [--timeout MS] [--no-color]
//!   pica [-d] format [FILE] [--no-save] [--no-print]
//!   pica [-d] init [FILE] [TEMPLATE] [--force]
//!   pica help | -h
//!   pica version | -V

use std::path::PathBuf;

pub const DEFAULT_SCRIPT: &str = "pica.fun";

pub const USAGE: &str = "\
Usage: pica [-d] [--config FILE | --no-config] <command> [args]

Commands:
  run [FILE] [NAME...]   run the API items in FILE (default pica.fun);
                         NAMEs restrict the run to those items
      --delay MS         wait MS milliseconds between items
      --timeout MS       give up on a request after MS milliseconds
      --no-color         plain output
  format [FILE]          re-indent FILE in canonical form
      --no-save          do not write the result back
      --no-print         do not print the result
  init [FILE] [TEMPLATE] write a starter script, from TEMPLATE (a file
                         or http(s) URL) when given
      --force            overwrite an existing file
  help                   show this message
  version                show the version

Options:
  -d, --debug            log debug output to stderr
      --config FILE      read settings from FILE instead of searching
      --no-config        ignore .picarc files";

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    pub command: Command,
    /// Debug logging (`-d`).
    pub debug: bool,
    /// Which config file to load.
    pub config: ConfigFile,
}

/// How to choose the user config file.
#[derive(Debug, Default, PartialEq, Eq)]
pub enum ConfigFile {
    /// Search the standard locations (default).
    #[default]
    Search,
    /// `--no-config`: use built-in defaults only.
    Skip,
    /// `--config FILE`.
    Explicit(PathBuf),
}

#[derive(Debug, Default, PartialEq, Eq)]
pub enum Command {
    Run(RunArgs),
    Format(FormatArgs),
    Init(InitArgs),
    #[default]
    Help,
    Version,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RunArgs {
    pub file: PathBuf,
    /// Item names to run; empty means all.
    pub names: Vec<String>,
    pub delay_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub no_color: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub struct FormatArgs {
    pub file: PathBuf,
    pub save: bool,
    pub print: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub struct InitArgs {
    pub file: PathBuf,
    /// Local path or `http(s)://` URL; the built-in template otherwise.
    pub template: Option<String>,
    pub force: bool,
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(raw.get(1..).unwrap_or_default())
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut positional: Vec<String> = Vec::new();
    let mut delay_ms = None;
    let mut timeout_ms = None;
    let mut no_color = false;
    let mut no_save = false;
    let mut no_print = false;
    let mut force = false;
    let mut i = 0;

    let value_of = |i: &mut usize, flag: &str| -> Result<String, String> {
        *i += 1;
        argv.get(*i)
            .cloned()
            .ok_or_else(|| format!("{flag} requires an argument"))
    };
    let millis = |s: String, flag: &str| -> Result<u64, String> {
        s.parse()
            .map_err(|_| format!("{flag}: expected milliseconds, got `{s}`"))
    };

    while i < argv.len() {
        let arg = argv[i].as_str();

        // `--` ends flag processing.
        if arg == "--" {
            positional.extend(argv[i + 1..].iter().cloned());
            break;
        }

        match arg {
            "-d" | "--debug" => args.debug = true,
            "-h" | "--help" => return Ok(CliArgs { command: Command::Help, ..args }),
            "-V" | "--version" => return Ok(CliArgs { command: Command::Version, ..args }),
            "--config" => args.config = ConfigFile::Explicit(value_of(&mut i, arg)?.into()),
            "--no-config" => args.config = ConfigFile::Skip,
            "--delay" => delay_ms = Some(millis(value_of(&mut i, arg)?, arg)?),
            "--timeout" => timeout_ms = Some(millis(value_of(&mut i, arg)?, arg)?),
            "--no-color" => no_color = true,
            "--no-save" => no_save = true,
            "--no-print" => no_print = true,
            "--force" | "-f" => force = true,
            _ if arg.starts_with('-') && arg != "-" => {
                return Err(format!("unknown option: {arg}"));
            }
            _ => positional.push(arg.to_owned()),
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    let Some(cmd) = positional.next() else {
        return Ok(args);
    };
    let file = |p: Option<String>| PathBuf::from(p.unwrap_or_else(|| DEFAULT_SCRIPT.to_owned()));

    args.command = match cmd.as_str() {
        "run" => {
            let file = file(positional.next());
            Command::Run(RunArgs {
                file,
                names: positional.collect(),
                delay_ms,
                timeout_ms,
                no_color,
            })
        }
        "format" | "fmt" => {
            let file = file(positional.next());
            reject_extra(positional, "format")?;
            Command::Format(FormatArgs {
                file,
                save: !no_save,
                print: !no_print,
            })
        }
        "init" => {
            let file = file(positional.next());
            let template = positional.next();
            reject_extra(positional, "init")?;
            Command::Init(InitArgs {
                file,
                template,
                force,
            })
        }
        "help" => Command::Help,
        "version" => Command::Version,
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(args)
}

fn reject_extra(mut rest: impl Iterator<Item = String>, cmd: &str) -> Result<(), String> {
    match rest.next() {
        Some(extra) => Err(format!("{cmd}: unexpected argument `{extra}`")),
        None => Ok(()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|&s| s.to_owned()).collect()
    }

    fn run_args(args: &[&str]) -> RunArgs {
        match parse_argv(&argv(args)).unwrap().command {
            Command::Run(r) => r,
            other => panic!("not a run command: {other:?}"),
        }
    }

    #[test]
    fn empty_args_show_help() {
        let a = parse_argv(&argv(&[])).unwrap();
        assert_eq!(a.command, Command::Help);
        assert!(!a.debug);
        assert_eq!(a.config, ConfigFile::Search);
    }

    #[test]
    fn run_defaults_to_pica_fun() {
        let r = run_args(&["run"]);
        assert_eq!(r.file, PathBuf::from("pica.fun"));
        assert!(r.names.is_empty());
        assert_eq!(r.delay_ms, None);
    }

    #[test]
    fn run_with_file_and_names() {
        let r = run_args(&["run", "api.fun", "login", "profile"]);
        assert_eq!(r.file, PathBuf::from("api.fun"));
        assert_eq!(r.names, vec!["login", "profile"]);
    }

    #[test]
    fn run_flags_anywhere() {
        let r = run_args(&["--delay", "100", "run", "x.fun", "--timeout", "5000", "--no-color"]);
        assert_eq!(r.delay_ms, Some(100));
        assert_eq!(r.timeout_ms, Some(5000));
        assert!(r.no_color);
    }

    #[test]
    fn bad_millis() {
        assert!(parse_argv(&argv(&["run", "--delay", "soon"])).is_err());
        assert!(parse_argv(&argv(&["run", "--delay"])).is_err());
    }

    #[test]
    fn format_flags() {
        let a = parse_argv(&argv(&["format", "--no-save"])).unwrap();
        assert_eq!(
            a.command,
            Command::Format(FormatArgs {
                file: PathBuf::from("pica.fun"),
                save: false,
                print: true,
            })
        );
    }

    #[test]
    fn init_force() {
        let a = parse_argv(&argv(&["init", "new.fun", "--force"])).unwrap();
        assert_eq!(
            a.command,
            Command::Init(InitArgs {
                file: PathBuf::from("new.fun"),
                template: None,
                force: true,
            })
        );
        let a = parse_argv(&argv(&["init", "a", "https://x/t.fun"])).unwrap();
        assert!(matches!(
            a.command,
            Command::Init(InitArgs { template: Some(ref t), .. }) if t == "https://x/t.fun"
        ));
        assert!(parse_argv(&argv(&["init", "a", "b", "c"])).is_err());
    }

    #[test]
    fn global_flags() {
        let a = parse_argv(&argv(&["-d", "--config", "my.rc", "run"])).unwrap();
        assert!(a.debug);
        assert_eq!(a.config, ConfigFile::Explicit(PathBuf::from("my.rc")));
        let a = parse_argv(&argv(&["--no-config", "run"])).unwrap();
        assert_eq!(a.config, ConfigFile::Skip);
    }

    #[test]
    fn help_and_version() {
        assert_eq!(parse_argv(&argv(&["-h"])).unwrap().command, Command::Help);
        assert_eq!(parse_argv(&argv(&["help"])).unwrap().command, Command::Help);
        assert_eq!(parse_argv(&argv(&["-V"])).unwrap().command, Command::Version);
        assert_eq!(
            parse_argv(&argv(&["version"])).unwrap().command,
            Command::Version
        );
    }

    #[test]
    fn double_dash_ends_flags() {
        let r = run_args(&["run", "--", "-odd-name.fun"]);
        assert_eq!(r.file, PathBuf::from("-odd-name.fun"));
    }

    #[test]
    fn unknown_flag_and_command() {
        assert!(parse_argv(&argv(&["-z"])).is_err());
        assert!(parse_argv(&argv(&["launch"])).is_err());
    }
}
