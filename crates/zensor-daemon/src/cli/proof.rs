use super::commands::OutputFormat;
use super::identity::require;
use super::utils::{print_json, print_ok, read_file};
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use zensor_crypto::{sensor_signal, MembershipKeys, MembershipTree, ZkProof};
use zensor_daemon::api::{ErrorBody, FeedbackEntry, GroupResponse};
use zensor_daemon::{
    backend_from_config, endpoint_url, load_or_generate_keys, DaemonConfig, GroupDirectoryClient,
    IdentityVault, ProofEngine, ProverBackendKind, RetryPolicy,
};
use zensor_types::{ZensorError, ZensorResult};

pub struct ProveArgs {
    pub tag: String,
    pub group: Option<String>,
    pub signal: Option<String>,
    pub file: Option<PathBuf>,
    pub daemon: Option<String>,
    pub from_directory: bool,
    pub output: Option<PathBuf>,
    pub submit: bool,
}

pub async fn prove_signal(
    config: &DaemonConfig,
    args: ProveArgs,
    format: &OutputFormat,
) -> ZensorResult<()> {
    let identity = require(&IdentityVault::new(config.identities_dir()), &args.tag)?;
    let group_id = args
        .group
        .unwrap_or_else(|| config.groups.default_group.clone());
    let signal = match (args.signal, &args.file) {
        (Some(signal), _) => signal,
        (None, Some(file)) => sensor_signal(&read_file(file)?),
        (None, None) => {
            return Err(ZensorError::Config("Pass --signal or --file".into()));
        }
    };
    let daemon = args
        .daemon
        .unwrap_or_else(|| format!("http://{}", config.api_socket_addr()))
        .trim_end_matches('/')
        .to_string();
    let client = reqwest::Client::new();

    let (depth, members) = if args.from_directory {
        let directory = GroupDirectoryClient::from_config(&config.directory)?
            .ok_or_else(|| ZensorError::Config("directory.url is not set".into()))?;
        (config.groups.tree_depth, directory.get_members(&group_id).await?)
    } else {
        let group = fetch_group(&client, &daemon, &group_id).await?;
        (group.summary.depth, group.members)
    };
    let tree = MembershipTree::from_leaves(depth, members)?;
    info!("Group {} has {} members, root {}", group_id, tree.len(), tree.root().short());

    let keys = match config.prover.backend {
        ProverBackendKind::Local => {
            let dir = config.keys_dir();
            let generate = config.prover.generate_missing_keys;
            let keys = tokio::task::spawn_blocking(move || {
                load_or_generate_keys(&dir, depth, generate)
            })
            .await
            .map_err(|e| ZensorError::Internal(format!("Key loading task failed: {}", e)))??;
            Some(Arc::new(keys))
        }
        ProverBackendKind::Remote => None,
    };
    let engine = ProofEngine::new(
        backend_from_config(&config.prover, keys)?,
        RetryPolicy::from(&config.prover),
    );

    let proof = engine.generate(&identity, &tree, &group_id, &signal).await?;

    if let Some(path) = &args.output {
        let json = serde_json::to_vec_pretty(&proof)
            .map_err(|e| ZensorError::Serialization(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| ZensorError::Config(format!("Failed to write {:?}: {}", path, e)))?;
        print_ok(format, &format!("Proof written to {:?}", path));
    } else if !args.submit {
        print_json(&proof)?;
    }

    if args.submit {
        let entries = submit(&client, &daemon, &group_id, &proof).await?;
        match format {
            OutputFormat::Json => print_json(&entries)?,
            OutputFormat::Text => {
                for entry in entries {
                    print_ok(
                        format,
                        &format!("Signal {} accepted as #{}", entry.signal, entry.id),
                    );
                }
            }
        }
    }
    Ok(())
}

async fn fetch_group(
    client: &reqwest::Client,
    daemon: &str,
    group_id: &str,
) -> ZensorResult<GroupResponse> {
    let response = client
        .get(endpoint_url(daemon, &["api", "groups", group_id])?)
        .send()
        .await
        .map_err(|e| ZensorError::Network(format!("Daemon unreachable at {}: {}", daemon, e)))?;

    if response.status() == StatusCode::NOT_FOUND {
        return Err(ZensorError::GroupNotFound(group_id.to_string()));
    }
    if !response.status().is_success() {
        return Err(ZensorError::Network(format!(
            "Daemon returned {} for group {}",
            response.status(),
            group_id
        )));
    }
    response
        .json()
        .await
        .map_err(|e| ZensorError::Serialization(format!("Invalid group response: {}", e)))
}

/// Submits `proof` and maps the daemon's error body back onto the error taxonomy.
async fn submit(
    client: &reqwest::Client,
    daemon: &str,
    group_id: &str,
    proof: &ZkProof,
) -> ZensorResult<Vec<FeedbackEntry>> {
    let response = client
        .post(endpoint_url(daemon, &["api", "groups", group_id, "signals"])?)
        .json(proof)
        .send()
        .await
        .map_err(|e| ZensorError::Network(format!("Daemon unreachable at {}: {}", daemon, e)))?;

    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| ZensorError::Serialization(format!("Invalid submit response: {}", e)));
    }

    let body: Option<ErrorBody> = response.json().await.ok();
    let (code, message) = body
        .map(|b| (b.error.code, b.error.message))
        .unwrap_or_else(|| (String::new(), status.to_string()));

    Err(match code.as_str() {
        "INVALID_PROOF" => ZensorError::InvalidProof(message),
        "STALE_ROOT" => ZensorError::StaleRoot {
            group_id: group_id.to_string(),
            root: proof.merkle_tree_root.to_hex(),
        },
        "DUPLICATE_NULLIFIER" => ZensorError::DuplicateNullifier {
            group_id: group_id.to_string(),
            nullifier: proof.nullifier_hash.to_hex(),
        },
        "GROUP_NOT_FOUND" => ZensorError::GroupNotFound(group_id.to_string()),
        _ => ZensorError::Network(format!("Submission failed ({}): {}", status, message)),
    })
}

pub fn verify_proof(
    config: &DaemonConfig,
    proof_path: &Path,
    group: Option<String>,
    format: &OutputFormat,
) -> ZensorResult<()> {
    let group_id = group.unwrap_or_else(|| config.groups.default_group.clone());
    let proof: ZkProof = serde_json::from_slice(&read_file(proof_path)?)
        .map_err(|e| ZensorError::Serialization(format!("Invalid proof file: {}", e)))?;
    let keys = MembershipKeys::load(&config.keys_dir())?;

    let valid = keys.verify(&proof, &group_id)?;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "valid": valid,
            "group": group_id,
            "signal": proof.signal,
            "merkleTreeRoot": proof.merkle_tree_root,
            "nullifierHash": proof.nullifier_hash,
            "vk_sha256": keys.fingerprint()?,
        }))?,
        OutputFormat::Text => {
            if valid {
                print_ok(format, &format!("Proof is valid for group {}", group_id));
            } else {
                println!("\x1b[38;5;196m[-]\x1b[0m Proof does not verify for group {}", group_id);
            }
            println!("    Signal:    {}", proof.signal);
            println!("    Root:      {}", proof.merkle_tree_root.to_hex());
            println!("    Nullifier: {}", proof.nullifier_hash.to_hex());
        }
    }

    if valid {
        Ok(())
    } else {
        Err(ZensorError::InvalidProof(format!(
            "Proof does not verify for group {}",
            group_id
        )))
    }
}
