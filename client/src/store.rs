//! Durable client-side state: the session token and the per-product
//! hidden-candidate sets. Everything lives in one JSON file written with a
//! tmp+rename swap; mutations serialize behind a lock shared by all clones.
//! The token is encrypted at rest with ChaCha20-Poly1305
//! under SHA-256 of a secret; hidden-ID sets are plain arrays keyed by the
//! owning product id.

use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, Key, KeyInit, Nonce};
use rand_core::{OsRng, RngCore};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::Mutex;

const ENC_PREFIX: &str = "enc:";
const DEFAULT_SECRET: &str = "basalam-panel";
const SESSION_KEY: &str = "session";
const HIDDEN_KEY: &str = "hidden_ids";

#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
    secret: String,
    /// Every mutation is a read-modify-write cycle on one file, and clones
    /// of the store save from detached tasks; the shared lock keeps a late
    /// writer from dropping keys a concurrent writer just added.
    write_lock: Arc<Mutex<()>>,
}

impl Store {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            secret: resolve_secret(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    #[cfg(test)]
    fn with_secret(path: impl Into<PathBuf>, secret: &str) -> Self {
        Self {
            path: path.into(),
            secret: secret.to_string(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn load_session(&self) -> Result<Option<String>> {
        let root = self.read_root().await?;
        let Some(raw) = root
            .get(SESSION_KEY)
            .and_then(|s| s.get("token"))
            .and_then(Value::as_str)
        else {
            return Ok(None);
        };
        let token = if let Some(rest) = raw.strip_prefix(ENC_PREFIX) {
            decrypt_token(&self.secret, rest)?
        } else {
            raw.to_string()
        };
        Ok(Some(token))
    }

    pub async fn save_session(&self, token: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut root = self.read_root().await?;
        let encrypted = encrypt_token(&self.secret, token)?;
        root[SESSION_KEY] = json!({ "token": format!("{ENC_PREFIX}{encrypted}") });
        self.write_root(&root).await
    }

    pub async fn clear_session(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut root = self.read_root().await?;
        if let Some(obj) = root.as_object_mut() {
            obj.remove(SESSION_KEY);
        }
        self.write_root(&root).await
    }

    /// Hidden candidate ids for one product. A missing or unreadable entry
    /// is an empty set.
    pub async fn load_hidden_ids(&self, product_id: u64) -> Result<HashSet<u64>> {
        let root = self.read_root().await?;
        let ids = root
            .get(HIDDEN_KEY)
            .and_then(|h| h.get(product_id.to_string()))
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_u64).collect())
            .unwrap_or_default();
        Ok(ids)
    }

    /// Replace one product's hidden set. Other products' entries are left
    /// untouched.
    pub async fn save_hidden_ids(&self, product_id: u64, ids: &HashSet<u64>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut root = self.read_root().await?;
        let hidden = root
            .as_object_mut()
            .ok_or_else(|| anyhow!("store root must be an object"))?
            .entry(HIDDEN_KEY)
            .or_insert_with(|| Value::Object(Default::default()));
        let hidden_obj = hidden
            .as_object_mut()
            .ok_or_else(|| anyhow!("hidden_ids must be an object"))?;
        let mut sorted: Vec<u64> = ids.iter().copied().collect();
        sorted.sort_unstable();
        hidden_obj.insert(product_id.to_string(), json!(sorted));
        self.write_root(&root).await
    }

    async fn read_root(&self) -> Result<Value> {
        if !self.path.exists() {
            return Ok(json!({}));
        }
        let raw = fs::read(&self.path)
            .await
            .with_context(|| format!("read state file: {}", self.path.display()))?;
        serde_json::from_slice(&raw).context("parse state file json")
    }

    async fn write_root(&self, root: &Value) -> Result<()> {
        let mut bytes = serde_json::to_vec_pretty(root).context("serialize state file")?;
        bytes.push(b'\n');
        let tmp = temp_path(&self.path);
        fs::write(&tmp, &bytes)
            .await
            .with_context(|| format!("write temp state: {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replace state file: {}", self.path.display()))?;
        Ok(())
    }
}

fn resolve_secret() -> String {
    env::var("PANEL_SECRET").unwrap_or_else(|_| DEFAULT_SECRET.to_string())
}

fn encrypt_token(secret: &str, plaintext: &str) -> Result<String> {
    let cipher = build_cipher(secret);
    let mut nonce_bytes = [0u8; 12];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let mut ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|err| anyhow!("encrypt session token: {}", err))?;

    let mut combined = Vec::with_capacity(nonce_bytes.len() + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.append(&mut ciphertext);
    Ok(BASE64_STANDARD.encode(combined))
}

fn decrypt_token(secret: &str, encoded: &str) -> Result<String> {
    let cipher = build_cipher(secret);
    let data = BASE64_STANDARD
        .decode(encoded.as_bytes())
        .map_err(|err| anyhow!("decode encrypted token: {}", err))?;
    if data.len() < 12 {
        return Err(anyhow!("encrypted token too short"));
    }
    let (nonce_bytes, ciphertext) = data.split_at(12);
    let nonce = Nonce::from_slice(nonce_bytes);
    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| anyhow!("failed to decrypt session token; check PANEL_SECRET"))?;
    String::from_utf8(plaintext).map_err(|err| anyhow!("decrypted token not utf-8: {}", err))
}

fn build_cipher(secret: &str) -> ChaCha20Poly1305 {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    let digest = hasher.finalize();
    let key = Key::from_slice(&digest);
    ChaCha20Poly1305::new(key)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut os_string = path.as_os_str().to_os_string();
    os_string.push(".tmp");
    os_string.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn session_round_trips_encrypted() {
        let dir = tempdir().expect("tempdir");
        let store = Store::with_secret(dir.path().join("state.json"), "test-secret");

        assert_eq!(store.load_session().await.expect("load"), None);
        store.save_session("tok-123").await.expect("save");
        assert_eq!(
            store.load_session().await.expect("load"),
            Some("tok-123".to_string())
        );

        // token is not stored in the clear
        let raw = std::fs::read_to_string(dir.path().join("state.json")).expect("read file");
        assert!(!raw.contains("tok-123"));
        assert!(raw.contains(ENC_PREFIX));

        store.clear_session().await.expect("clear");
        assert_eq!(store.load_session().await.expect("load"), None);
    }

    #[tokio::test]
    async fn hidden_sets_are_scoped_per_product() {
        let dir = tempdir().expect("tempdir");
        let store = Store::with_secret(dir.path().join("state.json"), "test-secret");

        let a: HashSet<u64> = [1, 2, 3].into_iter().collect();
        let b: HashSet<u64> = [9].into_iter().collect();
        store.save_hidden_ids(100, &a).await.expect("save a");
        store.save_hidden_ids(200, &b).await.expect("save b");

        assert_eq!(store.load_hidden_ids(100).await.expect("load a"), a);
        assert_eq!(store.load_hidden_ids(200).await.expect("load b"), b);
        assert!(store.load_hidden_ids(300).await.expect("load c").is_empty());

        // clearing one product must not touch another
        store
            .save_hidden_ids(100, &HashSet::new())
            .await
            .expect("reset a");
        assert!(store.load_hidden_ids(100).await.expect("load a").is_empty());
        assert_eq!(store.load_hidden_ids(200).await.expect("load b"), b);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_saves_do_not_lose_each_other() {
        let dir = tempdir().expect("tempdir");
        let store = Store::with_secret(dir.path().join("state.json"), "test-secret");

        // saves race from detached tasks in normal use; every write must
        // land, none may erase another's keys or trip over its temp file
        let mut handles = Vec::new();
        for product_id in 1..=8u64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let ids: HashSet<u64> = [product_id * 10].into_iter().collect();
                store.save_hidden_ids(product_id, &ids).await
            }));
        }
        {
            let store = store.clone();
            handles.push(tokio::spawn(
                async move { store.save_session("tok-racy").await },
            ));
        }
        for handle in handles {
            handle.await.expect("join").expect("save");
        }

        for product_id in 1..=8u64 {
            let expected: HashSet<u64> = [product_id * 10].into_iter().collect();
            assert_eq!(
                store.load_hidden_ids(product_id).await.expect("load"),
                expected
            );
        }
        assert_eq!(
            store.load_session().await.expect("load"),
            Some("tok-racy".to_string())
        );
    }

    #[tokio::test]
    async fn hidden_sets_survive_alongside_the_session() {
        let dir = tempdir().expect("tempdir");
        let store = Store::with_secret(dir.path().join("state.json"), "test-secret");

        let ids: HashSet<u64> = [5].into_iter().collect();
        store.save_hidden_ids(7, &ids).await.expect("save");
        store.save_session("tok").await.expect("session");
        store.clear_session().await.expect("logout");

        // per-product data is not session data
        assert_eq!(store.load_hidden_ids(7).await.expect("load"), ids);
    }
}
