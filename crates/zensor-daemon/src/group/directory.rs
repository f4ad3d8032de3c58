//! Client for the external group directory that manages membership.

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zensor_crypto::{field_hash_to_decimal, parse_field_hash};
use zensor_types::{FieldHash, ZensorError, ZensorResult};

use crate::config::DirectoryConfig;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCredentials {
    pub id: String,
    #[serde(default)]
    pub criteria: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub tree_depth: usize,
    #[serde(default)]
    pub credentials: Option<GroupCredentials>,
    /// Member commitments, usually decimal strings.
    #[serde(default)]
    pub members: Vec<String>,
}

impl GroupInfo {
    /// Lowercased credential provider, the part of `credentials.id` before `_`.
    pub fn provider(&self) -> Option<String> {
        self.credentials
            .as_ref()
            .and_then(|c| c.id.split('_').next())
            .filter(|p| !p.is_empty())
            .map(str::to_lowercase)
    }

    pub fn member_commitments(&self) -> ZensorResult<Vec<FieldHash>> {
        self.members.iter().map(|m| parse_field_hash(m)).collect()
    }
}

#[derive(Clone)]
pub struct GroupDirectoryClient {
    client: Client,
    base_url: String,
    dashboard_url: Option<String>,
}

impl GroupDirectoryClient {
    pub fn new(base_url: &str, config: &DirectoryConfig) -> ZensorResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ZensorError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            dashboard_url: config
                .dashboard_url
                .as_ref()
                .map(|u| u.trim_end_matches('/').to_string()),
        })
    }

    /// `None` when no directory is configured.
    pub fn from_config(config: &DirectoryConfig) -> ZensorResult<Option<Self>> {
        config
            .url
            .as_deref()
            .map(|url| Self::new(url, config))
            .transpose()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get_group(&self, group_id: &str) -> ZensorResult<GroupInfo> {
        let url = endpoint_url(&self.base_url, &["groups", group_id])?;
        debug!("HTTP GET: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ZensorError::Network(format!("HTTP GET failed: {}", e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(ZensorError::GroupNotFound(group_id.to_string())),
            status if !status.is_success() => {
                return Err(ZensorError::Network(format!(
                    "Group directory returned {} for {}",
                    status, group_id
                )));
            }
            _ => {}
        }

        response
            .json::<GroupInfo>()
            .await
            .map_err(|e| ZensorError::Serialization(format!("Invalid group response: {}", e)))
    }

    pub async fn get_members(&self, group_id: &str) -> ZensorResult<Vec<FieldHash>> {
        self.get_group(group_id).await?.member_commitments()
    }

    /// Link a user follows to prove a credential and get `commitment` added to the group.
    pub fn join_url(
        &self,
        group: &GroupInfo,
        commitment: &FieldHash,
        redirect_uri: &str,
    ) -> ZensorResult<String> {
        let dashboard = self
            .dashboard_url
            .as_deref()
            .ok_or_else(|| ZensorError::Config("directory.dashboard_url is not set".into()))?;
        let provider = group.provider().ok_or_else(|| {
            ZensorError::Config(format!("Group {} has no credential provider", group.id))
        })?;

        let mut url = Url::parse(&format!("{}/credentials", dashboard))
            .map_err(|e| ZensorError::Config(format!("Invalid dashboard URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("group", &group.id)
            .append_pair("member", &field_hash_to_decimal(commitment)?)
            .append_pair("provider", &provider)
            .append_pair("redirect_uri", redirect_uri);

        Ok(url.to_string())
    }
}

/// `base` with `segments` appended, each percent-encoded as one path segment.
pub fn endpoint_url(base: &str, segments: &[&str]) -> ZensorResult<Url> {
    let mut url =
        Url::parse(base).map_err(|e| ZensorError::Config(format!("Invalid URL {}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| ZensorError::Config(format!("URL cannot take a path: {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::get;
    use axum::{Json, Router};

    fn group_json(members: Vec<&str>) -> GroupInfo {
        GroupInfo {
            id: "sensors".into(),
            name: "Sensors".into(),
            description: String::new(),
            tree_depth: 16,
            credentials: Some(GroupCredentials {
                id: "GITHUB_FOLLOWERS".into(),
                criteria: serde_json::Value::Null,
            }),
            members: members.into_iter().map(String::from).collect(),
        }
    }

    async fn serve_directory() -> String {
        let app = Router::new().route(
            "/groups/:id",
            get(|Path(id): Path<String>| async move {
                if id == "sensors" {
                    Ok(Json(group_json(vec!["1", "2", "3"])))
                } else if id == "lab/a?b#c" {
                    Ok(Json(group_json(vec!["4"])))
                } else {
                    Err(AxumStatus::NOT_FOUND)
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_get_members_parses_decimal() {
        let base = serve_directory().await;
        let client = GroupDirectoryClient::new(&base, &DirectoryConfig::default()).unwrap();

        let members = client.get_members("sensors").await.unwrap();
        assert_eq!(members.len(), 3);
        assert_eq!(members[0], parse_field_hash("1").unwrap());
    }

    #[tokio::test]
    async fn test_unknown_group_not_found() {
        let base = serve_directory().await;
        let client = GroupDirectoryClient::new(&base, &DirectoryConfig::default()).unwrap();

        assert!(matches!(
            client.get_group("missing").await,
            Err(ZensorError::GroupNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_group_id_is_one_path_segment() {
        let base = serve_directory().await;
        let client = GroupDirectoryClient::new(&base, &DirectoryConfig::default()).unwrap();

        let members = client.get_members("lab/a?b#c").await.unwrap();
        assert_eq!(members, vec![parse_field_hash("4").unwrap()]);
        assert!(matches!(
            client.get_group("lab").await,
            Err(ZensorError::GroupNotFound(_))
        ));
    }

    #[test]
    fn test_endpoint_url_encodes_segments() {
        let url = endpoint_url("http://daemon:8420/", &["api", "groups", "a/b?c#d", "signals"])
            .unwrap();
        assert_eq!(url.as_str(), "http://daemon:8420/api/groups/a%2Fb%3Fc%23d/signals");

        let nested = endpoint_url("https://dir.example/v1", &["groups", "x y"]).unwrap();
        assert_eq!(nested.as_str(), "https://dir.example/v1/groups/x%20y");

        assert!(endpoint_url("not a url", &["groups"]).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_directory_is_network_error() {
        let config = DirectoryConfig {
            timeout_secs: 2,
            ..Default::default()
        };
        let client = GroupDirectoryClient::new("http://127.0.0.1:1", &config).unwrap();
        let err = client.get_group("sensors").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_join_url() {
        let config = DirectoryConfig {
            dashboard_url: Some("https://dashboard.example/".into()),
            ..Default::default()
        };
        let client = GroupDirectoryClient::new("https://api.example", &config).unwrap();
        let commitment = parse_field_hash("12345").unwrap();

        let url = client
            .join_url(&group_json(vec![]), &commitment, "https://app.example/groups")
            .unwrap();
        assert!(url.starts_with("https://dashboard.example/credentials?group=sensors"));
        assert!(url.contains("member=12345"));
        assert!(url.contains("provider=github"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fapp.example%2Fgroups"));
    }

    #[test]
    fn test_join_url_requires_dashboard() {
        let client =
            GroupDirectoryClient::new("https://api.example", &DirectoryConfig::default()).unwrap();
        let commitment = parse_field_hash("1").unwrap();
        assert!(client.join_url(&group_json(vec![]), &commitment, "x").is_err());
    }
}
