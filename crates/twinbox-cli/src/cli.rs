//! CLI command definitions and argument parsing

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use twinbox_core::correspondent::OpenedBody;
use twinbox_core::config::ConfigError;
use twinbox_core::directory::RetryPolicy;
use twinbox_core::{
    ChatKind, CliOverrides, Config, CoreError, Correspondent, DirectoryClient, HttpKeyDirectory,
    IdentityKeyStore, StoredMessage,
};
use twinbox_crypto::IdentityKeyPair;

use crate::ExitCode;

/// twinbox - end-to-end encrypted chat messages
#[derive(Parser, Debug)]
#[command(name = "twinbox")]
#[command(version, about = "twinbox - end-to-end encrypted chat messages")]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub output: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Chat server base URL
    #[arg(long = "directory-url", global = true, env = "TWINBOX_DIRECTORY_URL")]
    pub directory_url: Option<String>,

    /// Identity file path
    #[arg(long = "key-path", global = true)]
    pub key_path: Option<PathBuf>,

    /// Session cookie for the chat server
    #[arg(
        long = "session-cookie",
        global = true,
        env = "TWINBOX_SESSION_COOKIE",
        hide_env_values = true
    )]
    pub session_cookie: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage the local identity
    Identity(IdentityArgs),
    /// Publish our public key
    Publish {
        #[arg(long)]
        username: String,
    },
    /// Print a user's public key
    Fetch {
        #[arg(long)]
        username: String,
    },
    /// Seal a message for a contact and print the stored body
    Seal {
        /// Recipient username
        #[arg(long)]
        to: String,
        /// Message text (read from stdin when absent)
        #[arg(long)]
        message: Option<String>,
    },
    /// Open a stored body
    Open {
        /// We are the original sender of this message
        #[arg(long)]
        as_sender: bool,
        /// Stored body (read from stdin when absent)
        #[arg(long)]
        body: Option<String>,
    },
    /// Render a stored conversation
    History {
        /// Our username, to tell sent from received messages
        #[arg(long)]
        me: String,
        /// Conversation is a group chat (never encrypted)
        #[arg(long)]
        group: bool,
        /// JSON array of {sender, message, file, created_at}
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Parser, Debug)]
pub struct IdentityArgs {
    #[command(subcommand)]
    pub command: IdentityCommand,
}

#[derive(Subcommand, Debug)]
pub enum IdentityCommand {
    /// Load the identity, generating one on first use
    Init {
        /// Publish the public key under this name when freshly generated
        #[arg(long)]
        username: Option<String>,
    },
    /// Print the public key and its fingerprint
    Show,
    /// Remove the stored identity
    Clear,
}

impl Cli {
    /// Overrides taken from global flags.
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            directory_url: self.directory_url.clone(),
            key_path: self.key_path.clone(),
            session_cookie: self.session_cookie.clone(),
            verbose: self.verbose.then_some(true),
            debug: self.debug.then_some(true),
        }
    }

    /// Load the config file (`--config` or the default location) and apply
    /// global flags. A file that cannot be read, parsed or validated is an
    /// error, never a silent switch to defaults.
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        let config = Config::load_from(self.config.as_deref())?;
        Ok(config.with_overrides(&self.overrides()))
    }

    /// Execute the CLI command with a pre-loaded configuration
    pub async fn execute_with_config(self, config: Config) -> anyhow::Result<ExitCode> {
        let session = Session {
            store: Arc::new(IdentityKeyStore::from_config(&config.identity)),
            config,
            output: self.output,
        };

        match self.command {
            Commands::Identity(args) => match args.command {
                IdentityCommand::Init { username } => session.identity_init(username).await,
                IdentityCommand::Show => session.identity_show(),
                IdentityCommand::Clear => session.identity_clear(),
            },
            Commands::Publish { username } => session.publish(&username).await,
            Commands::Fetch { username } => session.fetch(&username).await,
            Commands::Seal { to, message } => {
                let message = read_arg_or_stdin(message)?;
                session.seal(&to, &message).await
            }
            Commands::Open { as_sender, body } => {
                let body = read_arg_or_stdin(body)?;
                session.open(&body, as_sender)
            }
            Commands::History { me, group, file } => session.history(&me, group, &file),
        }
    }
}

fn read_arg_or_stdin(value: Option<String>) -> anyhow::Result<String> {
    match value {
        Some(value) => Ok(value),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            Ok(buf.trim_end_matches(['\r', '\n']).to_string())
        }
    }
}

fn fingerprint_hex(pair: &IdentityKeyPair) -> anyhow::Result<String> {
    Ok(hex::encode(pair.fingerprint()?))
}

struct Session {
    config: Config,
    store: Arc<IdentityKeyStore>,
    output: OutputFormat,
}

impl Session {
    fn directory(&self) -> anyhow::Result<DirectoryClient> {
        let http = HttpKeyDirectory::from_config(&self.config.directory)
            .context("configuring key directory")?;
        tracing::debug!(base_url = %self.config.directory.base_url, "Using HTTP key directory");
        Ok(DirectoryClient::new(
            Arc::new(http),
            RetryPolicy::from_config(&self.config.directory),
        ))
    }

    /// The stored identity as a correspondent. `username` only matters for
    /// telling sent from received messages.
    fn correspondent(&self, username: &str) -> anyhow::Result<Option<Correspondent>> {
        let Some(pair) = self.store.load()? else {
            return Ok(None);
        };
        Ok(Some(Correspondent::new(username, pair, self.directory()?)))
    }

    fn print_json(&self, value: serde_json::Value) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(&value)?);
        Ok(())
    }

    fn no_identity(&self) -> anyhow::Result<ExitCode> {
        eprintln!("{}", ExitCode::NoIdentity.description());
        Ok(ExitCode::NoIdentity)
    }

    async fn identity_init(&self, username: Option<String>) -> anyhow::Result<ExitCode> {
        let store = Arc::clone(&self.store);
        let provisioned = tokio::task::spawn_blocking(move || store.load_or_generate())
            .await
            .context("identity task")?
            .map_err(CoreError::from)?;
        let fingerprint = fingerprint_hex(&provisioned.pair)?;

        let mut published = false;
        if let (true, Some(username)) = (provisioned.fresh, username.as_deref()) {
            self.directory()?
                .publish(username, &provisioned.pair.public)
                .await?;
            published = true;
        }

        match self.output {
            OutputFormat::Json => self.print_json(serde_json::json!({
                "generated": provisioned.fresh,
                "published": published,
                "fingerprint": fingerprint,
            }))?,
            OutputFormat::Text => {
                if provisioned.fresh {
                    println!("Generated new identity");
                } else {
                    println!("Identity already exists");
                }
                println!("Fingerprint: {fingerprint}");
                if published {
                    println!("Public key published");
                }
            }
        }
        Ok(ExitCode::Success)
    }

    fn identity_show(&self) -> anyhow::Result<ExitCode> {
        let Some(pair) = self.store.load()? else {
            return self.no_identity();
        };
        let public_key = pair.public.export()?;
        let fingerprint = fingerprint_hex(&pair)?;
        let created_at = self.store.created_at()?.map(|t| t.to_rfc3339());

        match self.output {
            OutputFormat::Json => self.print_json(serde_json::json!({
                "publicKey": public_key,
                "fingerprint": fingerprint,
                "modulusBits": pair.public.modulus_len() * 8,
                "createdAt": created_at,
            }))?,
            OutputFormat::Text => {
                println!("Fingerprint: {fingerprint}");
                println!("Modulus:     {} bits", pair.public.modulus_len() * 8);
                if let Some(created_at) = created_at {
                    println!("Created:     {created_at}");
                }
                println!("Public key:\n{public_key}");
            }
        }
        Ok(ExitCode::Success)
    }

    fn identity_clear(&self) -> anyhow::Result<ExitCode> {
        if !self.store.exists() {
            return self.no_identity();
        }
        self.store.clear()?;
        println!("Identity removed");
        Ok(ExitCode::Success)
    }

    async fn publish(&self, username: &str) -> anyhow::Result<ExitCode> {
        let Some(me) = self.correspondent(username)? else {
            return self.no_identity();
        };
        me.publish().await?;
        println!("Published public key for {username}");
        Ok(ExitCode::Success)
    }

    async fn fetch(&self, username: &str) -> anyhow::Result<ExitCode> {
        let key = self.directory()?.fetch_public_key(username).await?;
        let text = key.export()?;
        match self.output {
            OutputFormat::Json => self.print_json(serde_json::json!({
                "username": username,
                "publicKey": text,
            }))?,
            OutputFormat::Text => println!("{text}"),
        }
        Ok(ExitCode::Success)
    }

    async fn seal(&self, recipient: &str, message: &str) -> anyhow::Result<ExitCode> {
        let Some(me) = self.correspondent("")? else {
            return self.no_identity();
        };
        let body = me
            .seal_for(recipient, message)
            .await
            .with_context(|| format!("sealing message for {recipient}"))?;
        println!("{body}");
        Ok(ExitCode::Success)
    }

    fn open(&self, body: &str, as_sender: bool) -> anyhow::Result<ExitCode> {
        let Some(me) = self.correspondent("")? else {
            return self.no_identity();
        };
        let opened = me.open_body(body, as_sender)?;
        match self.output {
            OutputFormat::Json => {
                let (status, text) = match opened {
                    OpenedBody::Decrypted(text) => ("decrypted", text),
                    OpenedBody::Plain(text) => ("plain", text),
                };
                self.print_json(serde_json::json!({ "status": status, "text": text }))?
            }
            OutputFormat::Text => println!("{}", opened.into_text()),
        }
        Ok(ExitCode::Success)
    }

    fn history(&self, me: &str, group: bool, file: &std::path::Path) -> anyhow::Result<ExitCode> {
        let raw = std::fs::read_to_string(file)
            .with_context(|| format!("reading {}", file.display()))?;
        let messages: Vec<StoredMessage> = match serde_json::from_str(&raw) {
            Ok(messages) => messages,
            Err(e) => {
                eprintln!("Invalid history file {}: {e}", file.display());
                return Ok(ExitCode::InvalidInput);
            }
        };
        let Some(me) = self.correspondent(me)? else {
            return self.no_identity();
        };

        let kind = if group { ChatKind::Group } else { ChatKind::Contact };
        let rendered = me.render_history(&messages, kind);

        match self.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rendered)?),
            OutputFormat::Text => {
                for message in &rendered {
                    let when = message.created_at.as_deref().unwrap_or("-");
                    let text = message.text.as_deref().unwrap_or("");
                    match &message.file {
                        Some(file) if text.is_empty() => {
                            println!("[{when}] {}: <file {file}>", message.sender)
                        }
                        Some(file) => println!("[{when}] {}: {text} <file {file}>", message.sender),
                        None => println!("[{when}] {}: {text}", message.sender),
                    }
                }
            }
        }
        Ok(ExitCode::Success)
    }
}
