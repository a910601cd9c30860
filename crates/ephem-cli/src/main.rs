//! ephem: share end-to-end encrypted notes through an untrusted relay
//!
//! Commands:
//!   info               - show relay limits
//!   send text <text>   - share a text note
//!   send file <file..> - share one or more files
//!   open <url>         - open a shared note

use std::io::{IsTerminal, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use secrecy::SecretString;
use tracing::debug;
use url::Url;

use ephem_client::{decode_share_url, open_note, send_note, HttpRelay, Relay};
use ephem_core::config::EphemConfig;
use ephem_core::ShareConstraints;
use ephem_crypto::KdfParams;
use ephem_envelope::{NotePayload, OpenedPayload, SealOptions};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "ephem",
    version,
    about = "Zero-knowledge ephemeral note sharing",
    long_about = "ephem encrypts notes and files locally and shares them through \
                  a relay that never sees plaintext or keys"
)]
struct Cli {
    /// Relay server to use (overrides config)
    #[arg(long, short = 's', env = "EPHEM_SERVER", global = true)]
    server: Option<String>,

    /// Path to ephem.toml configuration file
    #[arg(long, short = 'c', env = "EPHEM_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show relay version and advertised limits
    Info,

    /// Create and share a note
    Send {
        #[command(subcommand)]
        what: SendWhat,
    },

    /// Open a shared note URL
    Open {
        /// The share URL, including its key fragment
        url: String,
        /// Password for protected notes (prompted if omitted)
        #[arg(long, short = 'p')]
        password: Option<String>,
        /// Save all files without prompting
        #[arg(long, short = 'a', default_value_t = false)]
        all: bool,
    },
}

#[derive(Subcommand, Debug)]
enum SendWhat {
    /// Share a text note
    Text {
        text: String,
        #[command(flatten)]
        opts: SendOpts,
    },
    /// Share one or more files
    File {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        opts: SendOpts,
    },
}

#[derive(clap::Args, Debug)]
struct SendOpts {
    /// Views before the note is destroyed
    #[arg(long, short = 'v')]
    views: Option<u32>,
    /// Minutes before the note expires
    #[arg(long, short = 'm')]
    minutes: Option<u32>,
    /// Protect the note with a password
    #[arg(long, short = 'p')]
    password: Option<String>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = EphemConfig::load(cli.config.as_deref())?;
    init_tracing(&config);

    let server = cli.server.clone().unwrap_or_else(|| config.relay.url.clone());
    let base = Url::parse(&server).with_context(|| format!("invalid relay URL: {server}"))?;
    let relay = HttpRelay::new(base.clone(), Duration::from_secs(config.relay.timeout_secs))?;

    match cli.command {
        Commands::Info => cmd_info(&relay).await,
        Commands::Send { what } => match what {
            SendWhat::Text { text, opts } => {
                cmd_send(&relay, &base, &config, NotePayload::text(text), opts).await
            }
            SendWhat::File { files, opts } => {
                let payload = NotePayload::from_files(&files)?;
                cmd_send(&relay, &base, &config, payload, opts).await
            }
        },
        Commands::Open { url, password, all } => cmd_open(&relay, &url, password, all).await,
    }
}

fn init_tracing(config: &EphemConfig) {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.relay.log_level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ── Commands ──────────────────────────────────────────────────────────────────

async fn cmd_info(relay: &HttpRelay) -> Result<()> {
    let status = relay.status().await?;
    println!("version:        {}", status.version);
    println!("max size:       {}", HumanBytes(status.max_size));
    println!("max views:      {}", status.max_views);
    println!("max expiration: {} minutes", status.max_expiration);
    Ok(())
}

async fn cmd_send(
    relay: &HttpRelay,
    base: &Url,
    config: &EphemConfig,
    payload: NotePayload,
    opts: SendOpts,
) -> Result<()> {
    let constraints = ShareConstraints::new(
        opts.views.or(config.send.views),
        opts.minutes.or(config.send.expire_minutes),
    );
    let password = match opts.password {
        Some(pw) => Some(pw),
        None => piped_password()?,
    }
    .map(SecretString::from);
    let kdf = KdfParams {
        mem_cost_kib: config.crypto.argon2_mem_cost_kib,
        time_cost: config.crypto.argon2_time_cost,
        parallelism: config.crypto.argon2_parallelism,
    };
    let seal_opts = SealOptions {
        chunk_size: config.crypto.chunk_size,
    };

    let spinner = ProgressBar::new_spinner().with_message(format!(
        "encrypting and uploading {}",
        HumanBytes(payload.total_size())
    ));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let outcome = send_note(
        relay,
        base,
        &payload,
        constraints,
        password.as_ref(),
        &kdf,
        &seal_opts,
    )
    .await?;

    spinner.finish_and_clear();
    debug!(
        note_id = %outcome.note_id,
        envelope_bytes = outcome.summary.envelope_bytes,
        chunks = outcome.summary.body_chunks,
        "note stored"
    );
    println!("Note created:\n\n{}", outcome.url);
    Ok(())
}

/// A password piped into stdin stands in for a missing `-p` flag. Never
/// consumes an interactive terminal.
fn piped_password() -> Result<Option<String>> {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    let mut raw = String::new();
    stdin
        .read_to_string(&mut raw)
        .context("reading password from stdin")?;
    Ok(normalize_piped_password(&raw))
}

/// Strip the trailing newline a pipe carries; an empty pipe is no password.
fn normalize_piped_password(raw: &str) -> Option<String> {
    let pw = raw.trim_end_matches(['\r', '\n']);
    (!pw.is_empty()).then(|| pw.to_string())
}

async fn cmd_open(
    relay: &HttpRelay,
    raw_url: &str,
    password: Option<String>,
    all: bool,
) -> Result<()> {
    let url = Url::parse(raw_url).context("invalid share URL")?;

    // Prompt only when the fragment says the note is password-protected.
    let share = decode_share_url(&url)?;
    let password = match (password, share.key.needs_password()) {
        (Some(pw), _) => Some(SecretString::from(pw)),
        (None, true) => Some(SecretString::from(
            rpassword::prompt_password("Password: ").context("reading password")?,
        )),
        (None, false) => None,
    };

    let reader = open_note(relay, &url, password.as_ref()).await?;
    match reader.payload() {
        OpenedPayload::Text => {
            println!("{}", reader.read_text()?);
        }
        OpenedPayload::Files(metas) => {
            let bar = ProgressBar::new(metas.iter().map(|m| m.size).sum()).with_style(
                ProgressStyle::with_template("{bar:40} {bytes}/{total_bytes} {msg}")
                    .expect("static template"),
            );
            reader.extract_files(|meta| {
                let keep = all || confirm_save(&meta.name, meta.size)?;
                bar.set_message(meta.name.clone());
                let sink: Box<dyn Write> = if keep {
                    Box::new(std::fs::File::create(&meta.name)?)
                } else {
                    Box::new(std::io::sink())
                };
                Ok(ProgressWriter::new(sink, bar.clone()))
            })?;
            bar.finish_and_clear();
        }
    }
    Ok(())
}

/// Write adapter that advances a progress bar as bytes actually land in the
/// underlying sink.
struct ProgressWriter<W: Write> {
    inner: W,
    bar: ProgressBar,
}

impl<W: Write> ProgressWriter<W> {
    fn new(inner: W, bar: ProgressBar) -> Self {
        Self { inner, bar }
    }
}

impl<W: Write> Write for ProgressWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.bar.inc(n as u64);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

fn confirm_save(name: &str, size: u64) -> ephem_core::EphemResult<bool> {
    print!("Save {name} ({})? [y/N] ", HumanBytes(size));
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_tracks_written_bytes() {
        let bar = ProgressBar::hidden();
        bar.set_length(10);
        let mut writer = ProgressWriter::new(Vec::new(), bar.clone());

        writer.write_all(b"0123").unwrap();
        assert_eq!(bar.position(), 4);

        writer.write_all(b"456789").unwrap();
        assert_eq!(bar.position(), 10);
        assert_eq!(writer.inner, b"0123456789");
    }

    #[test]
    fn test_piped_password_strips_trailing_newline() {
        assert_eq!(
            normalize_piped_password("hunter2\n"),
            Some("hunter2".to_string())
        );
        assert_eq!(
            normalize_piped_password("hunter2\r\n"),
            Some("hunter2".to_string())
        );
        assert_eq!(
            normalize_piped_password("hunter2"),
            Some("hunter2".to_string())
        );
    }

    #[test]
    fn test_empty_pipe_is_no_password() {
        assert_eq!(normalize_piped_password(""), None);
        assert_eq!(normalize_piped_password("\n"), None);
    }
}
