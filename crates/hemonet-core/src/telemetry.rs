//! Tracing setup for the `hemonet` binary.
//!
//! Every `hemonet` command prints its result (normalized observation,
//! network prediction, share summary) as JSON on stdout, so log lines,
//! including the JSON ones, are written to stderr only. Piping a command
//! into another tool never mixes the two streams.
//!
//! Peer traffic goes through reqwest and hyper; their logs are capped at
//! `warn` unless `RUST_LOG` says otherwise.
//!
//! Call [`init_tracing`] once at program start. Later calls are ignored,
//! since the global subscriber can only be set once per process.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const HTTP_STACK: &[&str] = &["hyper", "hyper_util", "reqwest"];

/// Filter directives used when `RUST_LOG` is not set.
fn default_directives(level: Level) -> String {
    let mut directives = vec![level.as_str().to_ascii_lowercase()];
    directives.extend(HTTP_STACK.iter().map(|target| format!("{target}=warn")));
    directives.join(",")
}

/// Initialise the global tracing subscriber.
///
/// * `json` - emit newline-delimited JSON log lines.
/// * `level` - default verbosity when `RUST_LOG` is not set.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let stderr = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = if json {
        registry.with(stderr.json()).try_init()
    } else {
        registry.with(stderr).try_init()
    };
    installed.ok();
}
