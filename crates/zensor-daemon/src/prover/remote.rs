use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;
use zensor_crypto::{MembershipWitness, ZkProof};
use zensor_types::{ZensorError, ZensorResult};

use super::ProvingBackend;
use crate::api::ErrorBody;

/// Delegates proving to another daemon's `POST /api/prove`.
///
/// The witness carries identity secrets, so the remote endpoint must be
/// trusted and reached over TLS or a private network.
pub struct RemoteBackend {
    client: Client,
    url: String,
}

impl RemoteBackend {
    pub fn new(base_url: &str, timeout: Duration) -> ZensorResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ZensorError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: format!("{}/api/prove", base_url.trim_end_matches('/')),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ProvingBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn prove(&self, witness: MembershipWitness) -> ZensorResult<ZkProof> {
        debug!("HTTP POST: {}", self.url);

        let response = self
            .client
            .post(&self.url)
            .json(&witness)
            .send()
            .await
            .map_err(|e| ZensorError::BackendUnavailable(format!("{}: {}", self.url, e)))?;

        let status = response.status();
        if status.is_success() {
            let proof = response
                .json::<ZkProof>()
                .await
                .map_err(|e| ZensorError::BackendUnavailable(format!("Bad prover response: {}", e)))?;
            check_public_inputs(&proof, &witness)?;
            return Ok(proof);
        }

        let body = response.json::<ErrorBody>().await.ok();
        Err(remote_error(status, body, &witness.group_id))
    }
}

/// The remote must prove exactly what it was asked to.
fn check_public_inputs(proof: &ZkProof, witness: &MembershipWitness) -> ZensorResult<()> {
    let mismatch = if proof.signal != witness.signal {
        Some("signal")
    } else if proof.merkle_tree_root != witness.path.root {
        Some("root")
    } else if proof.nullifier_hash != witness.nullifier_hash()? {
        Some("nullifier hash")
    } else {
        None
    };

    match mismatch {
        Some(field) => Err(ZensorError::InvalidProof(format!(
            "Remote prover returned a proof for a different {}",
            field
        ))),
        None => Ok(()),
    }
}

fn remote_error(status: StatusCode, body: Option<ErrorBody>, group_id: &str) -> ZensorError {
    let (code, message) = body
        .map(|b| (b.error.code, b.error.message))
        .unwrap_or_else(|| (String::new(), status.to_string()));

    match status {
        StatusCode::REQUEST_TIMEOUT
        | StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => ZensorError::BackendUnavailable(message),
        _ if code == "NOT_A_MEMBER" => ZensorError::NotAMember(group_id.to_string()),
        StatusCode::NOT_FOUND => {
            ZensorError::Config("Remote daemon does not serve /api/prove".into())
        }
        _ => ZensorError::Internal(format!("Remote prover returned {}: {}", status, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode as AxumStatus;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use zensor_crypto::{Identity, MembershipTree};
    use zensor_types::FieldHash;

    fn witness() -> MembershipWitness {
        let identity = Identity::create(Some(b"remote")).unwrap();
        let mut tree = MembershipTree::new(4).unwrap();
        let index = tree.insert(identity.commitment()).unwrap();
        MembershipWitness::new(&identity, tree.proof_path(index).unwrap(), "g", "0x01")
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_remote_returns_proof() {
        let app = Router::new().route(
            "/api/prove",
            post(|Json(w): Json<MembershipWitness>| async move {
                Json(ZkProof {
                    proof: vec![1, 2, 3],
                    signal: w.signal.clone(),
                    merkle_tree_root: w.path.root,
                    nullifier_hash: w.nullifier_hash().unwrap(),
                })
            }),
        );
        let backend = RemoteBackend::new(&serve(app).await, Duration::from_secs(5)).unwrap();

        let w = witness();
        let expected_nullifier = w.nullifier_hash().unwrap();
        let proof = backend.prove(w).await.unwrap();
        assert_eq!(proof.signal, "0x01");
        assert_eq!(proof.nullifier_hash, expected_nullifier);
        assert_eq!(backend.name(), "remote");
    }

    #[tokio::test]
    async fn test_mismatched_proof_is_rejected() {
        let app = Router::new().route(
            "/api/prove",
            post(|Json(w): Json<MembershipWitness>| async move {
                let signal = if w.signal == "0x01" { "0x02".to_string() } else { w.signal.clone() };
                let nullifier_hash = if w.group_id == "g" {
                    w.nullifier_hash().unwrap()
                } else {
                    FieldHash::zero()
                };
                Json(ZkProof {
                    proof: vec![1, 2, 3],
                    signal,
                    merkle_tree_root: w.path.root,
                    nullifier_hash,
                })
            }),
        );
        let backend = RemoteBackend::new(&serve(app).await, Duration::from_secs(5)).unwrap();

        let err = backend.prove(witness()).await.unwrap_err();
        assert!(matches!(err, ZensorError::InvalidProof(ref m) if m.contains("signal")));
        assert!(!err.is_transient());

        let identity = Identity::create(Some(b"remote")).unwrap();
        let mut tree = MembershipTree::new(4).unwrap();
        let index = tree.insert(identity.commitment()).unwrap();
        let other_group =
            MembershipWitness::new(&identity, tree.proof_path(index).unwrap(), "h", "0x03");
        let err = backend.prove(other_group).await.unwrap_err();
        assert!(matches!(err, ZensorError::InvalidProof(ref m) if m.contains("nullifier")));
    }

    #[tokio::test]
    async fn test_timeout_is_backend_unavailable() {
        let app = Router::new().route(
            "/api/prove",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(FieldHash::zero())
            }),
        );
        let backend = RemoteBackend::new(&serve(app).await, Duration::from_millis(100)).unwrap();

        assert!(matches!(
            backend.prove(witness()).await,
            Err(ZensorError::BackendUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_connection_refused_is_backend_unavailable() {
        let backend = RemoteBackend::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        let err = backend.prove(witness()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/api/prove",
            post(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        (AxumStatus::SERVICE_UNAVAILABLE, "busy").into_response()
                    } else {
                        (
                            AxumStatus::FORBIDDEN,
                            Json(serde_json::json!({
                                "error": { "code": "NOT_A_MEMBER", "message": "not in group" }
                            })),
                        )
                            .into_response()
                    }
                }
            }),
        );
        let backend = RemoteBackend::new(&serve(app).await, Duration::from_secs(5)).unwrap();

        assert!(matches!(
            backend.prove(witness()).await,
            Err(ZensorError::BackendUnavailable(_))
        ));
        assert!(matches!(
            backend.prove(witness()).await,
            Err(ZensorError::NotAMember(_))
        ));
    }
}
