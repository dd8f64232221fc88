// Gaia Hub 内容存储客户端
// 写入/删除/列表需要 v1 授权令牌（ES256K JWT），读取走公开的 read_url_prefix

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use k256::ecdsa::{signature::Signer, Signature, SigningKey};
use rand::RngCore;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::OnceCell;

use crate::{
    config::HttpClientConfig,
    domain::derivation,
    error::{ProviderError, ProviderResult},
    service::content_store::ContentStore,
};

#[derive(Debug, Clone, Deserialize)]
pub struct HubInfo {
    pub challenge_text: String,
    pub read_url_prefix: String,
    #[serde(default)]
    pub latest_auth_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListFilesPage {
    #[serde(default)]
    entries: Vec<String>,
    page: Option<String>,
}

/// 授权方式
pub enum GaiaAuth {
    /// 用 app 私钥现场签发令牌
    AppKey(SigningKey),
    /// 预先签发的 `v1:` 令牌
    Token(String),
}

struct Session {
    info: HubInfo,
    address: String,
    token: String,
}

pub struct GaiaHubClient {
    http_client: reqwest::Client,
    hub_url: String,
    auth: GaiaAuth,
    session: OnceCell<Session>,
}

/// app 公钥对应的 bucket 地址（比特币主网 P2PKH）
pub fn bucket_address(public_key: &[u8]) -> ProviderResult<String> {
    let key = bitcoin::PublicKey::from_slice(public_key)
        .map_err(|e| ProviderError::invalid_request(format!("Invalid Gaia public key: {}", e)))?;
    Ok(bitcoin::Address::p2pkh(&key, bitcoin::Network::Bitcoin).to_string())
}

/// 签发 `v1:` 授权令牌
pub fn make_v1_token(key: &SigningKey, challenge_text: &str, hub_url: &str) -> ProviderResult<String> {
    let mut salt = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut salt);

    let header = json!({"typ": "JWT", "alg": "ES256K"});
    let payload = json!({
        "gaiaChallenge": challenge_text,
        "hubUrl": hub_url,
        "iss": hex::encode(derivation::compressed_public_key(key)),
        "salt": hex::encode(salt),
    });

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload)?)
    );
    let signature: Signature = key.sign(signing_input.as_bytes());

    Ok(format!(
        "v1:{}.{}",
        signing_input,
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    ))
}

/// 从 `v1:` 令牌的 `iss` 取出签发公钥
fn token_issuer(token: &str) -> ProviderResult<Vec<u8>> {
    let jwt = token.trim().trim_start_matches("v1:");
    let payload = jwt
        .split('.')
        .nth(1)
        .ok_or_else(|| ProviderError::invalid_request("Malformed Gaia auth token"))?;
    let decoded = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| ProviderError::invalid_request(format!("Malformed Gaia auth token: {}", e)))?;
    let claims: serde_json::Value = serde_json::from_slice(&decoded)?;
    let iss = claims
        .get("iss")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ProviderError::invalid_request("Gaia auth token has no iss claim"))?;
    hex::decode(iss)
        .map_err(|e| ProviderError::invalid_request(format!("Invalid iss in Gaia auth token: {}", e)))
}

impl GaiaHubClient {
    pub fn new(hub_url: impl Into<String>, auth: GaiaAuth, http: &HttpClientConfig) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(http.request_timeout_secs))
            .connect_timeout(Duration::from_secs(http.connect_timeout_secs))
            .build()
            .map_err(|e| ProviderError::network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client: client,
            hub_url: hub_url.into().trim_end_matches('/').to_string(),
            auth,
            session: OnceCell::new(),
        })
    }

    pub async fn hub_info(&self) -> ProviderResult<HubInfo> {
        let url = format!("{}/hub_info", self.hub_url);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::from(e).context("hub_info"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::network_status(
                status.as_u16(),
                format!("GET {} failed with status {}", url, status),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from(e).context("hub_info"))?;
        serde_json::from_str(&body).map_err(|e| ProviderError::from(e).context("hub_info"))
    }

    /// 首次调用时拉取 hub_info 并签发令牌，之后复用
    async fn session(&self) -> ProviderResult<&Session> {
        self.session
            .get_or_try_init(|| async {
                let info = self.hub_info().await?;
                let (address, token) = match &self.auth {
                    GaiaAuth::AppKey(key) => (
                        bucket_address(&derivation::compressed_public_key(key))?,
                        make_v1_token(key, &info.challenge_text, &self.hub_url)?,
                    ),
                    GaiaAuth::Token(token) => {
                        (bucket_address(&token_issuer(token)?)?, token.clone())
                    }
                };
                tracing::info!(hub = %self.hub_url, address = %address, "Gaia hub session established");
                Ok::<_, ProviderError>(Session {
                    info,
                    address,
                    token,
                })
            })
            .await
    }

    pub async fn address(&self) -> ProviderResult<String> {
        Ok(self.session().await?.address.clone())
    }

    fn bearer(session: &Session) -> String {
        format!("bearer {}", session.token)
    }
}

fn status_error(op: &str, path: &str, status: StatusCode, body: String) -> ProviderError {
    ProviderError::network_status(
        status.as_u16(),
        format!("Gaia {} {} failed with status {}: {}", op, path, status, body),
    )
}

#[async_trait]
impl ContentStore for GaiaHubClient {
    async fn get(&self, path: &str) -> ProviderResult<Option<Vec<u8>>> {
        let session = self.session().await?;
        let url = format!("{}{}/{}", session.info.read_url_prefix, session.address, path);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::from(e).context("gaia get"))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("get", path, status, body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::from(e).context("gaia get"))?;
        Ok(Some(bytes.to_vec()))
    }

    async fn put(&self, path: &str, content: Vec<u8>) -> ProviderResult<()> {
        let session = self.session().await?;
        let url = format!("{}/store/{}/{}", self.hub_url, session.address, path);
        let size = content.len();

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", Self::bearer(session))
            .header("Content-Type", "application/octet-stream")
            .body(content)
            .send()
            .await
            .map_err(|e| ProviderError::from(e).context("gaia put"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("put", path, status, body));
        }

        tracing::debug!(path = %path, size, "Gaia file stored");
        Ok(())
    }

    async fn delete(&self, path: &str) -> ProviderResult<bool> {
        let session = self.session().await?;
        let url = format!("{}/delete/{}/{}", self.hub_url, session.address, path);

        let response = self
            .http_client
            .delete(&url)
            .header("Authorization", Self::bearer(session))
            .send()
            .await
            .map_err(|e| ProviderError::from(e).context("gaia delete"))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("delete", path, status, body));
        }

        tracing::debug!(path = %path, "Gaia file deleted");
        Ok(true)
    }

    async fn list(&self, prefix: &str) -> ProviderResult<Vec<String>> {
        let session = self.session().await?;
        let url = format!("{}/list-files/{}", self.hub_url, session.address);

        let mut paths = Vec::new();
        let mut page: Option<String> = None;
        loop {
            let response = self
                .http_client
                .post(&url)
                .header("Authorization", Self::bearer(session))
                .json(&json!({ "page": page }))
                .send()
                .await
                .map_err(|e| ProviderError::from(e).context("gaia list"))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(status_error("list", prefix, status, body));
            }

            let body = response
                .text()
                .await
                .map_err(|e| ProviderError::from(e).context("gaia list"))?;
            let listing: ListFilesPage =
                serde_json::from_str(&body).map_err(|e| ProviderError::from(e).context("gaia list"))?;

            paths.extend(listing.entries.into_iter().filter(|p| p.starts_with(prefix)));

            match listing.page {
                Some(next) if !next.is_empty() => page = Some(next),
                _ => break,
            }
        }

        Ok(paths)
    }
}
