//! Lockbox CLI - Command line interface for the encrypted record store.
//!
//! Packs, seals and stores credentials, payment cards and files in a local
//! SQLite database, and reads them back. The encryption key is derived from a
//! passphrase taken from an environment variable; nothing is prompted.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use zeroize::Zeroizing;

use lockbox_common::{
    BankCard, ContentHash, Credentials, DataType, FileContents, Metadata, Package, Payload,
    PrincipalId,
};
use lockbox_crypto::{pack_payload, unpack_payload, Cipher, PackageCodec, SecretKey};
use lockbox_manager::{DataManager, ManagerConfig, Status};
use lockbox_storage::{SqliteRecordStore, StoreConfig};

const DEFAULT_DB: &str = "lockbox.db";

#[derive(Parser)]
#[command(name = "lockbox")]
#[command(about = "Lockbox - Encrypted credential and file storage")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Database file (overrides the configuration file).
    #[arg(long)]
    db: Option<PathBuf>,

    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Principal the records belong to.
    #[arg(short, long, default_value_t = 1)]
    principal: i64,

    /// Environment variable holding the passphrase.
    #[arg(long, default_value = "LOCKBOX_KEY")]
    key_env: String,

    /// Cipher used to seal new records.
    #[arg(long, value_enum, default_value_t = CipherArg::HashNonce)]
    cipher: CipherArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum CipherArg {
    /// AES-256-GCM with a nonce taken from the content hash.
    HashNonce,
    /// XChaCha20-Poly1305 with a random nonce stored with the ciphertext.
    RandomNonce,
}

impl From<CipherArg> for Cipher {
    fn from(arg: CipherArg) -> Self {
        match arg {
            CipherArg::HashNonce => Cipher::HashDerivedNonce,
            CipherArg::RandomNonce => Cipher::RandomNonce,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Store a login/password pair.
    PutCredentials {
        #[arg(short, long)]
        login: String,

        #[arg(long)]
        password: String,

        /// Free-form description.
        #[arg(short, long)]
        description: String,
    },

    /// Store a payment card.
    PutCard {
        #[arg(short, long)]
        number: String,

        /// Expiry date, e.g. "12/27".
        #[arg(short, long)]
        expires: String,

        /// Card verification code.
        #[arg(long)]
        cvc: u32,

        #[arg(long)]
        holder: String,

        #[arg(short, long)]
        description: String,
    },

    /// Store the contents of a file.
    PutFile {
        /// File to store.
        #[arg(short, long)]
        file: PathBuf,

        /// Description (default: the file name).
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List stored records.
    List,

    /// Decrypt and show a stored record.
    Show {
        /// Content hash of the record.
        hash: String,

        /// Write file records here instead of reporting their size.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete a stored record.
    Delete {
        /// Content hash of the record.
        hash: String,
    },

    /// Drop every stored record and the database schema.
    Reset {
        /// Confirm the reset.
        #[arg(long)]
        yes: bool,
    },
}

/// Configuration file layout.
#[derive(Debug, Default, Deserialize)]
struct CliConfig {
    #[serde(default)]
    store: Option<StoreConfig>,
    #[serde(default)]
    manager: ManagerConfig,
}

impl CliConfig {
    fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                serde_json::from_str(&json).context("Invalid configuration file")
            }
            None => Ok(Self::default()),
        }
    }

    /// Store configuration with the `--db` override applied.
    fn store_config(&self, db: Option<&Path>) -> StoreConfig {
        let mut config = self
            .store
            .clone()
            .unwrap_or_else(|| StoreConfig::file(DEFAULT_DB));
        if let Some(db) = db {
            config.path = Some(db.to_path_buf());
        }
        config
    }
}

/// Everything a command needs.
struct Session {
    manager: DataManager,
    codec: PackageCodec,
    principal: PrincipalId,
    key_env: String,
}

impl Session {
    fn open(cli: &Cli, config: &CliConfig) -> Result<Self> {
        let store_config = config.store_config(cli.db.as_deref());
        let store = SqliteRecordStore::open(store_config).context("Failed to open store")?;

        Ok(Self {
            manager: DataManager::new(Arc::new(store), config.manager.clone()),
            codec: PackageCodec::new(cli.cipher.into()),
            principal: PrincipalId::new(cli.principal),
            key_env: cli.key_env.clone(),
        })
    }

    /// Derive the key from the passphrase in the configured variable.
    fn key(&self) -> Result<SecretKey> {
        let passphrase = Zeroizing::new(
            std::env::var(&self.key_env)
                .with_context(|| format!("Passphrase variable {} is not set", self.key_env))?,
        );
        if passphrase.is_empty() {
            anyhow::bail!("Passphrase in {} is empty", self.key_env);
        }
        Ok(SecretKey::from_passphrase(&passphrase))
    }

    async fn lookup(&self, hash: &str) -> Result<Metadata> {
        let hash = ContentHash::parse(hash).context("Invalid content hash")?;
        self.manager
            .get_metadata(self.principal, &hash)
            .await
            .with_context(|| format!("No record {}", hash))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = CliConfig::load(cli.config.as_deref())?;

    if let Commands::Reset { yes } = cli.command {
        return cmd_reset(&config.store_config(cli.db.as_deref()), yes).await;
    }

    let ctx = Session::open(&cli, &config)?;

    match cli.command {
        Commands::PutCredentials {
            login,
            password,
            description,
        } => {
            let credentials = Credentials { login, password };
            cmd_put(&ctx, &credentials, &description).await
        }

        Commands::PutCard {
            number,
            expires,
            cvc,
            holder,
            description,
        } => {
            let card = BankCard {
                card_number: number,
                expire_date: expires,
                csv_code: cvc,
                card_holder: holder,
            };
            cmd_put(&ctx, &card, &description).await
        }

        Commands::PutFile { file, description } => {
            let contents = FileContents::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let description = description.unwrap_or_else(|| {
                file.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file.display().to_string())
            });
            cmd_put(&ctx, &contents, &description).await
        }

        Commands::List => cmd_list(&ctx).await,

        Commands::Show { hash, output } => cmd_show(&ctx, &hash, output.as_deref()).await,

        Commands::Delete { hash } => cmd_delete(&ctx, &hash).await,

        Commands::Reset { .. } => Ok(()),
    }
}

/// Pack, seal and store a payload.
async fn cmd_put<P: Payload>(ctx: &Session, payload: &P, description: &str) -> Result<()> {
    let key = ctx.key()?;
    let package = pack_payload(payload, description).context("Failed to encode payload")?;
    let sealed = ctx
        .codec
        .seal(&package, &key)
        .context("Failed to encrypt payload")?;
    let hash = sealed.hash().clone();

    info!("Storing {} record: {}", P::DATA_TYPE, description);

    let result = ctx.manager.load_data(ctx.principal, sealed).await;
    match Status::of(&result) {
        Status::Ok => println!("Stored {} ({})", hash, P::DATA_TYPE),
        Status::Conflict => println!("Already stored: {}", hash),
        _ => result.context("Failed to store record")?,
    }

    Ok(())
}

/// List stored records.
async fn cmd_list(ctx: &Session) -> Result<()> {
    let records = ctx
        .manager
        .get_all_metadata(ctx.principal)
        .await
        .context("Failed to list records")?;

    if records.is_empty() {
        println!("No records stored.");
        return Ok(());
    }

    println!("Records of principal {}:", ctx.principal);
    for metadata in records {
        println!(
            "  {}  [{:<11}] {}  {}",
            metadata.hash,
            metadata.data_type.to_string(),
            metadata.upload_date.format("%Y-%m-%d %H:%M:%S"),
            metadata.description
        );
    }

    Ok(())
}

/// Decrypt and show a record.
async fn cmd_show(ctx: &Session, hash: &str, output: Option<&Path>) -> Result<()> {
    let key = ctx.key()?;
    let metadata = ctx.lookup(hash).await?;
    let sealed = ctx
        .manager
        .get_data(ctx.principal, &metadata)
        .await
        .context("Failed to fetch record")?;
    let package = open_any(ctx, &sealed, &key)?;

    println!("Description: {}", metadata.description);
    println!("Uploaded:    {}", metadata.upload_date.to_rfc3339());

    match metadata.data_type {
        DataType::Credentials => {
            let credentials: Credentials = unpack_payload(&package)?;
            println!("Login:       {}", credentials.login);
            println!("Password:    {}", credentials.password);
        }
        DataType::BankCard => {
            let card: BankCard = unpack_payload(&package)?;
            println!("Card number: {}", card.card_number);
            println!("Expires:     {}", card.expire_date);
            println!("CVC:         {}", card.csv_code);
            println!("Holder:      {}", card.card_holder);
        }
        DataType::File => {
            let bytes = unpack_payload::<FileContents>(&package)?.into_bytes();
            match output {
                Some(path) => {
                    tokio::fs::write(path, &bytes)
                        .await
                        .context("Failed to write output file")?;
                    println!("File written: {} ({} bytes)", path.display(), bytes.len());
                }
                None => println!("File:        {} bytes", bytes.len()),
            }
        }
    }

    Ok(())
}

/// Open a sealed package with the configured cipher, then the other one.
///
/// Records are not tagged with the cipher that sealed them.
fn open_any(ctx: &Session, sealed: &Package, key: &SecretKey) -> Result<Package> {
    let other = match ctx.codec.cipher() {
        Cipher::HashDerivedNonce => Cipher::RandomNonce,
        Cipher::RandomNonce => Cipher::HashDerivedNonce,
    };
    ctx.codec
        .open(sealed, key)
        .or_else(|_| PackageCodec::new(other).open(sealed, key))
        .context("Failed to decrypt record (wrong passphrase?)")
}

/// Delete a record.
async fn cmd_delete(ctx: &Session, hash: &str) -> Result<()> {
    let metadata = ctx.lookup(hash).await?;

    ctx.manager
        .delete_data(ctx.principal, &metadata)
        .await
        .context("Failed to delete record")?;

    println!("Deleted: {} ({})", metadata.hash, metadata.description);

    Ok(())
}

/// Remove all records and the schema.
async fn cmd_reset(store_config: &StoreConfig, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!("Refusing to reset without --yes");
    }

    info!("Resetting record store");

    let store = SqliteRecordStore::open(store_config.clone()).context("Failed to open store")?;
    store
        .close_and_clean()
        .await
        .context("Failed to reset store")?;

    println!("Store reset.");

    Ok(())
}
