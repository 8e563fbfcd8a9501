use std::path::Path;
use std::sync::Once;

use pica::cli::{self, Command, ConfigFile};
use pica::commands;
use pica::config::{self, Config};

static TRACING_INIT: Once = Once::new();

/// Log to stderr.  `RUST_LOG` wins; otherwise `-d` enables debug output for
/// this crate and everything else stays at `warn`.
fn init_tracing(debug: bool) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(if debug { "warn,pica=debug" } else { "warn" })
        });
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .init();
    });
}

fn load_config(path: &Path) -> Config {
    match Config::load_file(path) {
        Ok((config, errors)) => {
            for e in errors {
                eprintln!("pica: warning: {}: {e}", path.display());
            }
            tracing::debug!(path = %path.display(), "config loaded");
            config
        }
        Err(e) => {
            eprintln!("pica: {}: {e}", path.display());
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("pica: {e}");
            eprintln!("{}", cli::USAGE);
            std::process::exit(1);
        }
    };
    init_tracing(args.debug);

    // ── Load user config ──────────────────────────────────────────────────────
    let config = match &args.config {
        ConfigFile::Skip => Config::new(),
        ConfigFile::Explicit(path) => load_config(path),
        ConfigFile::Search => config::find_user_config()
            .map(|path| load_config(&path))
            .unwrap_or_default(),
    };

    let result = match args.command {
        Command::Help => {
            println!("{}", cli::USAGE);
            Ok(())
        }
        Command::Version => {
            println!("pica {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Run(run) => commands::run(&run, &config).await.map(|_| ()),
        Command::Format(fmt) => commands::format(&fmt, &mut std::io::stdout()).map(|_| ()),
        Command::Init(init) => commands::init(&init, &config).await.map(|path| {
            println!("created {}", path.display());
        }),
    };

    if let Err(e) = result {
        eprintln!("pica: {e}");
        std::process::exit(1);
    }
}
