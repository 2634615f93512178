//! Mock implementations of platform traits and shared test fixtures

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use crate::account::{Account, AccountStore, InsertOutcome, ProfileRecord, ProfileUpdate};
use crate::error::{ApiError, Result};
use crate::platform::{Cache, Clock, Environment, HttpClient, HttpResponse};

/// Mock cache backed by an in-memory HashMap
pub struct MockCache {
    store: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockCache {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Cache for MockCache {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let store = self.store.lock().unwrap();
        Ok(store.get(key).cloned())
    }

    async fn put_bytes(&self, key: &str, value: &[u8], _ttl_secs: u64) -> Result<()> {
        self.store
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// Mock HTTP client with pre-configured responses and a call log
pub struct MockHttp {
    responses: Vec<(String, u16, Vec<u8>)>,
    calls: Mutex<Vec<String>>,
    post_bodies: Mutex<Vec<Vec<u8>>>,
}

impl MockHttp {
    pub fn new() -> Self {
        Self {
            responses: Vec::new(),
            calls: Mutex::new(Vec::new()),
            post_bodies: Mutex::new(Vec::new()),
        }
    }

    /// Register a response for any URL containing `pattern`.
    pub fn with_response(mut self, pattern: &str, status: u16, body: &str) -> Self {
        self.responses
            .push((pattern.to_string(), status, body.as_bytes().to_vec()));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_post_body(&self) -> Option<String> {
        self.post_bodies
            .lock()
            .unwrap()
            .last()
            .map(|body| String::from_utf8_lossy(body).into_owned())
    }

    fn lookup(&self, method: &str, url: &str) -> Result<HttpResponse> {
        self.calls.lock().unwrap().push(format!("{} {}", method, url));
        for (pattern, status, body) in &self.responses {
            if url.contains(pattern.as_str()) {
                return Ok(HttpResponse {
                    status: *status,
                    body: body.clone(),
                });
            }
        }
        Err(ApiError::upstream_unavailable(format!(
            "no mock response for {} {}",
            method, url
        )))
    }
}

#[async_trait]
impl HttpClient for MockHttp {
    async fn get(&self, url: &str, _headers: &[(&str, &str)]) -> Result<HttpResponse> {
        self.lookup("GET", url)
    }

    async fn post(&self, url: &str, _headers: &[(&str, &str)], body: &[u8]) -> Result<HttpResponse> {
        self.post_bodies.lock().unwrap().push(body.to_vec());
        self.lookup("POST", url)
    }
}

/// Mock clock with a fixed timestamp
pub struct MockClock(pub u64);

impl Clock for MockClock {
    fn now_secs(&self) -> u64 {
        self.0
    }
}

/// Mock environment backed by in-memory maps
pub struct MockEnv {
    vars: HashMap<String, String>,
    secrets: HashMap<String, String>,
}

impl MockEnv {
    pub fn new() -> Self {
        Self {
            vars: HashMap::new(),
            secrets: HashMap::new(),
        }
    }

    pub fn with_var(mut self, name: &str, value: &str) -> Self {
        self.vars.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_secret(mut self, name: &str, value: &str) -> Self {
        self.secrets.insert(name.to_string(), value.to_string());
        self
    }
}

impl Environment for MockEnv {
    fn get_var(&self, name: &str) -> Result<String> {
        self.vars
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::configuration(format!("variable '{}' not found", name)))
    }

    fn get_secret(&self, name: &str) -> Result<String> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::configuration(format!("secret '{}' not found", name)))
    }
}

#[derive(Default)]
struct MemoryInner {
    accounts: HashMap<String, Account>,
    profiles: HashMap<String, ProfileRecord>,
}

/// In-memory account store; the mutex makes the conditional insert atomic.
#[derive(Default)]
pub struct MemoryAccountStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account_count(&self) -> usize {
        self.inner.lock().unwrap().accounts.len()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn get_account(&self, account_id: &str) -> Result<Option<Account>> {
        Ok(self.inner.lock().unwrap().accounts.get(account_id).cloned())
    }

    async fn get_profile(&self, account_id: &str) -> Result<Option<ProfileRecord>> {
        Ok(self.inner.lock().unwrap().profiles.get(account_id).cloned())
    }

    async fn insert_account(
        &self,
        account: &Account,
        profile: &ProfileRecord,
    ) -> Result<InsertOutcome> {
        let mut inner = self.inner.lock().unwrap();
        if inner.accounts.contains_key(&account.account_id) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        inner
            .accounts
            .insert(account.account_id.clone(), account.clone());
        inner
            .profiles
            .insert(profile.account_id.clone(), profile.clone());
        Ok(InsertOutcome::Created)
    }

    async fn set_admin_flag(&self, account_id: &str, is_admin: bool) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let account = inner
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| ApiError::repository(format!("no account '{}'", account_id)))?;
        account.admin_flag = is_admin;
        Ok(())
    }

    async fn set_profile_role(&self, account_id: &str, role: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let profile = inner
            .profiles
            .get_mut(account_id)
            .ok_or_else(|| ApiError::repository(format!("no profile '{}'", account_id)))?;
        profile.role = role.to_string();
        Ok(())
    }

    async fn update_profile_fields(
        &self,
        account_id: &str,
        fields: &ProfileUpdate,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let profile = inner
            .profiles
            .get_mut(account_id)
            .ok_or_else(|| ApiError::repository(format!("no profile '{}'", account_id)))?;
        if let Some(email) = &fields.email {
            profile.email = Some(email.clone());
        }
        if let Some(photo_url) = &fields.photo_url {
            profile.photo_url = Some(photo_url.clone());
        }
        Ok(())
    }

    async fn touch_last_login(&self, account_id: &str, now_secs: i64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let profile = inner
            .profiles
            .get_mut(account_id)
            .ok_or_else(|| ApiError::repository(format!("no profile '{}'", account_id)))?;
        profile.last_login_at = now_secs;
        Ok(())
    }
}

/// Store wrapper whose role-mirror write always fails; used to exercise the
/// partial-update path of the admin claim.
pub struct FailingRoleStore {
    inner: MemoryAccountStore,
}

impl FailingRoleStore {
    pub fn new(inner: MemoryAccountStore) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl AccountStore for FailingRoleStore {
    async fn get_account(&self, account_id: &str) -> Result<Option<Account>> {
        self.inner.get_account(account_id).await
    }

    async fn get_profile(&self, account_id: &str) -> Result<Option<ProfileRecord>> {
        self.inner.get_profile(account_id).await
    }

    async fn insert_account(
        &self,
        account: &Account,
        profile: &ProfileRecord,
    ) -> Result<InsertOutcome> {
        self.inner.insert_account(account, profile).await
    }

    async fn set_admin_flag(&self, account_id: &str, is_admin: bool) -> Result<()> {
        self.inner.set_admin_flag(account_id, is_admin).await
    }

    async fn set_profile_role(&self, _account_id: &str, _role: &str) -> Result<()> {
        Err(ApiError::repository("injected role-write failure"))
    }

    async fn update_profile_fields(
        &self,
        account_id: &str,
        fields: &ProfileUpdate,
    ) -> Result<()> {
        self.inner.update_profile_fields(account_id, fields).await
    }

    async fn touch_last_login(&self, account_id: &str, now_secs: i64) -> Result<()> {
        self.inner.touch_last_login(account_id, now_secs).await
    }
}

/// RSA test key with its JWKS rendering
#[derive(Clone)]
pub struct TestKey {
    pub kid: String,
    pub private_pem: String,
    pub public_pem: String,
    pub jwks_json: String,
}

static TEST_KEY: OnceLock<TestKey> = OnceLock::new();
static TEST_KEY_ALT: OnceLock<TestKey> = OnceLock::new();

/// Primary signing key, generated once per test run (never touches disk)
pub fn test_key() -> &'static TestKey {
    TEST_KEY.get_or_init(|| generate_test_key("test-key-1"))
}

/// A second, unrelated key for wrong-key and rotation scenarios
pub fn test_key_alt() -> &'static TestKey {
    TEST_KEY_ALT.get_or_init(|| generate_test_key("test-key-2"))
}

fn generate_test_key(kid: &str) -> TestKey {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use rand::rngs::OsRng;
    use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
    use rsa::traits::PublicKeyParts;
    use rsa::RsaPrivateKey;

    let private_key = RsaPrivateKey::new(&mut OsRng, 2048).expect("key generation failed");
    let private_pem = private_key
        .to_pkcs1_pem(LineEnding::LF)
        .expect("private key PEM export failed")
        .to_string();
    let public_key = private_key.to_public_key();
    let public_pem = public_key
        .to_pkcs1_pem(LineEnding::LF)
        .expect("public key PEM export failed");

    let n = URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());
    let e = URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be());
    let jwks_json = format!(
        r#"{{"keys":[{{"kty":"RSA","use":"sig","alg":"RS256","kid":"{}","n":"{}","e":"{}"}}]}}"#,
        kid, n, e
    );

    TestKey {
        kid: kid.to_string(),
        private_pem,
        public_pem,
        jwks_json,
    }
}

/// Sign an identity token with a test key, setting the `kid` header
pub fn sign_id_token(key: &TestKey, claims: &serde_json::Value) -> String {
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(key.kid.clone());

    let encoding_key =
        EncodingKey::from_rsa_pem(key.private_pem.as_bytes()).expect("test key should parse");

    encode(&header, claims, &encoding_key).expect("test token encoding failed")
}
