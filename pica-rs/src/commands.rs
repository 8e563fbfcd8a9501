//! The `run`, `format` and `init` subcommands.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::{FormatArgs, InitArgs, RunArgs};
use crate::config::{ColorMode, Config};
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpRequest, Transport};
use crate::output::Output;
use crate::runner::{Runner, Script};
use crate::script;

const INIT_TEMPLATE: &str = "\
name = '{name}'
description = 'API checks for {name}'
author = '{author}'
email = '{email}'
version = '0.1.0'

baseUrl = 'http://localhost:8080'
headers['Content-Type'] = 'application/json'

// Items are opened by a comment: METHOD PATH [NAME] [DESCRIPTION...]
// Statements before the first assert() build the request; the rest check
// the response through status, header, body and json.

// GET /api/users list List all users
headers['Authorization'] = 'Bearer change-me'
assert(status == 200)

// POST /api/users create Create a user
post = {
  name = name()
  email = email()
  age = 10
}
assert(status == 201)
echoln('created ', json)
";

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

/// Load `path` and run its items over the network.
pub async fn run(args: &RunArgs, config: &Config) -> Result<usize> {
    let script = Script::load(&args.file)?;

    let mut config = config.clone();
    if let Some(ms) = args.delay_ms {
        config.delay = Duration::from_millis(ms);
    }
    if let Some(ms) = args.timeout_ms {
        config.timeout = (ms > 0).then(|| Duration::from_millis(ms));
    }
    if args.no_color {
        config.color = ColorMode::Never;
    }

    tracing::debug!(file = %args.file.display(), items = script.items.len(), "running script");
    let output = Output::stdout(config.color);
    let mut runner = Runner::new(HttpClient::new()?, output, &config)?;
    runner.run(&script, &args.names).await
}

/// Re-serialize a script in canonical form.  Returns the formatted text.
pub fn format(args: &FormatArgs, out: &mut impl Write) -> Result<String> {
    let src = read_source(&args.file)?;
    let formatted = script::format_source(&src).map_err(|source| Error::Script {
        path: args.file.clone(),
        source,
    })?;
    if args.print {
        out.write_all(formatted.as_bytes())?;
        out.flush()?;
    }
    if args.save && formatted != src {
        std::fs::write(&args.file, &formatted).map_err(|e| Error::io(&args.file, e))?;
        tracing::debug!(file = %args.file.display(), "formatted file saved");
    }
    Ok(formatted)
}

/// Fill the built-in starter template.
pub fn render_template(name: &str, author: &str, email: &str) -> String {
    fill_template(INIT_TEMPLATE, name, author, email)
}

/// Replace `{name}`, `{author}` and `{email}` in `template`.  Quotes are
/// dropped from the substituted values so a quoted placeholder still parses.
pub fn fill_template(template: &str, name: &str, author: &str, email: &str) -> String {
    let clean = |s: &str| s.chars().filter(|c| !matches!(c, '\'' | '\\' | '\n' | '\r')).collect::<String>();
    template
        .replace("{name}", &clean(name))
        .replace("{author}", &clean(author))
        .replace("{email}", &clean(email))
}

/// Template text from a local file or an `http(s)://` URL.
async fn read_template(source: &str) -> Result<String> {
    if !(source.starts_with("http://") || source.starts_with("https://")) {
        return read_source(Path::new(source));
    }
    let req = HttpRequest {
        method: "GET".to_owned(),
        url: source.to_owned(),
        ..HttpRequest::default()
    };
    let resp = HttpClient::new()?.send(&req).await?;
    if resp.status >= 400 {
        return Err(Error::Usage(format!(
            "cannot fetch template {source}: {} {}",
            resp.status, resp.reason
        )));
    }
    tracing::debug!(url = source, bytes = resp.body.len(), "template fetched");
    Ok(String::from_utf8_lossy(&resp.body).into_owned())
}

/// Write a starter script.  An existing file is only replaced with `force`.
pub async fn init(args: &InitArgs, config: &Config) -> Result<PathBuf> {
    if args.file.exists() && !args.force {
        return Err(Error::Usage(format!(
            "{} already exists; use --force to overwrite",
            args.file.display()
        )));
    }
    let name = std::fs::canonicalize(&args.file)
        .ok()
        .or_else(|| std::env::current_dir().ok().map(|d| d.join(&args.file)))
        .and_then(|p| p.parent().and_then(Path::file_name).map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "api".to_owned());
    let template = match &args.template {
        Some(source) => read_template(source).await?,
        None => INIT_TEMPLATE.to_owned(),
    };
    let text = fill_template(
        &template,
        &name,
        config.author.as_deref().unwrap_or_default(),
        config.email.as_deref().unwrap_or_default(),
    );
    std::fs::write(&args.file, text).map_err(|e| Error::io(&args.file, e))?;
    Ok(args.file.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_into_items() {
        let script = Script::parse(&render_template("shop", "Ann", "ann@example.com")).unwrap();
        assert_eq!(script.items.len(), 2);
        assert_eq!(script.items[0].name, "list");
        assert_eq!(script.items[1].method, "POST");
        assert_eq!(script.items[1].response.len(), 2);
    }

    #[test]
    fn template_values_are_sanitized() {
        let text = render_template("it's", "a\\b", "x");
        assert!(text.contains("name = 'its'"));
        assert!(text.contains("author = 'ab'"));
        assert!(Script::parse(&text).is_ok());
    }

    #[test]
    fn template_is_already_formatted() {
        let text = render_template("shop", "", "");
        assert_eq!(script::format_source(&text).unwrap(), text);
    }

    #[tokio::test]
    async fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("pica.fun");
        let mut args = InitArgs {
            file: file.clone(),
            template: None,
            force: false,
        };
        let mut config = Config::new();
        config.author = Some("Ann".into());

        init(&args, &config).await.unwrap();
        let text = std::fs::read_to_string(&file).unwrap();
        assert!(text.contains("author = 'Ann'"));
        let dir_name = dir.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(text.contains(&format!("name = '{dir_name}'")));

        assert!(matches!(init(&args, &config).await, Err(Error::Usage(_))));
        args.force = true;
        assert!(init(&args, &config).await.is_ok());
    }

    #[tokio::test]
    async fn init_from_local_template() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("team.tpl");
        std::fs::write(&template, "author = '{author}'\nbaseUrl = 'http://team'\n").unwrap();
        let args = InitArgs {
            file: dir.path().join("pica.fun"),
            template: Some(template.display().to_string()),
            force: false,
        };
        let mut config = Config::new();
        config.author = Some("O'Neil".into());

        let path = init(&args, &config).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "author = 'ONeil'\nbaseUrl = 'http://team'\n"
        );
    }

    #[tokio::test]
    async fn init_with_missing_template_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let args = InitArgs {
            file: dir.path().join("pica.fun"),
            template: Some(dir.path().join("nope.tpl").display().to_string()),
            force: false,
        };
        let err = init(&args, &Config::new()).await.unwrap_err();
        assert!(matches!(&err, Error::Io { path, .. } if path.ends_with("nope.tpl")), "{err}");
        assert!(!args.file.exists());
    }

    #[test]
    fn format_prints_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.fun");
        std::fs::write(&file, "x=1\nif x>0 {\necho(x)\n}\n").unwrap();
        let mut printed = Vec::new();
        let args = FormatArgs {
            file: file.clone(),
            save: true,
            print: true,
        };
        let formatted = format(&args, &mut printed).unwrap();
        assert_eq!(String::from_utf8(printed).unwrap(), formatted);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), formatted);
        assert!(formatted.contains("  echo(x)"));
    }

    #[test]
    fn format_reports_path_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.fun");
        std::fs::write(&file, "x = (1\n").unwrap();
        let args = FormatArgs {
            file: file.clone(),
            save: false,
            print: false,
        };
        let err = format(&args, &mut Vec::new()).unwrap_err();
        assert!(err.to_string().starts_with(&file.display().to_string()), "{err}");
    }

    #[test]
    fn missing_file() {
        let args = FormatArgs {
            file: PathBuf::from("/definitely/not/here.fun"),
            save: false,
            print: false,
        };
        assert!(matches!(format(&args, &mut Vec::new()), Err(Error::Io { .. })));
    }
}
