use super::commands::{IdentityAction, OutputFormat};
use super::utils::{print_json, print_ok, read_file};
use zensor_crypto::{field_hash_to_decimal, Identity};
use zensor_daemon::{DaemonConfig, GroupDirectoryClient, IdentityVault};
use zensor_types::{ZensorError, ZensorResult};

pub async fn handle_identity(
    action: IdentityAction,
    config: &DaemonConfig,
    format: &OutputFormat,
) -> ZensorResult<()> {
    let vault = IdentityVault::new(config.identities_dir());

    match action {
        IdentityAction::Create {
            tag,
            seed,
            sensor_log,
            force,
        } => create_identity(&vault, &tag, seed, sensor_log, force, format),
        IdentityAction::Show { tag } => show_identity(&vault, &tag, format),
        IdentityAction::Commitment { tag, decimal } => {
            let identity = require(&vault, &tag)?;
            if decimal {
                println!("{}", field_hash_to_decimal(&identity.commitment())?);
            } else {
                println!("{}", identity.commitment().to_hex());
            }
            Ok(())
        }
        IdentityAction::List => list_identities(&vault, format),
        IdentityAction::JoinUrl {
            tag,
            group,
            redirect_uri,
        } => {
            let identity = require(&vault, &tag)?;
            let group_id = group.unwrap_or_else(|| config.groups.default_group.clone());
            let directory = GroupDirectoryClient::from_config(&config.directory)?
                .ok_or_else(|| ZensorError::Config("directory.url is not set".into()))?;
            let info = directory.get_group(&group_id).await?;
            println!("{}", directory.join_url(&info, &identity.commitment(), &redirect_uri)?);
            Ok(())
        }
    }
}

/// Loads `tag`, pointing the user at `identity create` when it is missing.
pub fn require(vault: &IdentityVault, tag: &str) -> ZensorResult<Identity> {
    vault.load(tag)?.ok_or_else(|| {
        ZensorError::Config(format!(
            "No identity '{}'. Run 'zensor identity create --tag {}' first.",
            tag, tag
        ))
    })
}

fn create_identity(
    vault: &IdentityVault,
    tag: &str,
    seed: Option<String>,
    sensor_log: Option<std::path::PathBuf>,
    force: bool,
    format: &OutputFormat,
) -> ZensorResult<()> {
    if vault.exists(tag)? && !force {
        return Err(ZensorError::Config(format!(
            "Identity '{}' already exists. Use --force to replace it.",
            tag
        )));
    }

    let (identity, source) = match (seed, sensor_log) {
        (_, Some(path)) => {
            let log = String::from_utf8_lossy(&read_file(&path)?).into_owned();
            (Identity::from_sensor_log(&log)?, "sensor PUF")
        }
        (Some(seed), None) => (Identity::create(Some(seed.as_bytes()))?, "seed"),
        (None, None) => (Identity::create(None)?, "random"),
    };
    let path = vault.store(tag, &identity)?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "tag": tag,
            "source": source,
            "commitment": identity.commitment(),
            "commitment_decimal": field_hash_to_decimal(&identity.commitment())?,
            "file": path,
        })),
        OutputFormat::Text => {
            print_ok(format, &format!("Identity '{}' created ({})", tag, source));
            println!("    Commitment: \x1b[38;5;226m{}\x1b[0m", identity.commitment().to_hex());
            println!("    File:       {:?}", path);
            Ok(())
        }
    }
}

fn show_identity(vault: &IdentityVault, tag: &str, format: &OutputFormat) -> ZensorResult<()> {
    let identity = require(vault, tag)?;
    let path = vault.path_for(tag)?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "tag": tag,
            "commitment": identity.commitment(),
            "commitment_decimal": field_hash_to_decimal(&identity.commitment())?,
            "file": path,
        })),
        OutputFormat::Text => {
            println!("Identity:   {}", tag);
            println!("Commitment: {}", identity.commitment().to_hex());
            println!("Decimal:    {}", field_hash_to_decimal(&identity.commitment())?);
            println!("File:       {:?}", path);
            Ok(())
        }
    }
}

fn list_identities(vault: &IdentityVault, format: &OutputFormat) -> ZensorResult<()> {
    let tags = vault.tags()?;
    match format {
        OutputFormat::Json => print_json(&tags),
        OutputFormat::Text => {
            if tags.is_empty() {
                println!("\x1b[38;5;245mNo identities in {:?}\x1b[0m", vault.dir());
            }
            for tag in tags {
                println!("{}", tag);
            }
            Ok(())
        }
    }
}
