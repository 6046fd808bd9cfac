use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::auth::errors::AuthError;
use crate::auth::password::CredentialHasher;
use crate::auth::repo;
use crate::auth::repo_types::CredentialRecord;
use crate::session::{SessionHandle, SessionUser, UserId};
use crate::storage::KvStore;

pub const MIN_PASSWORD_CHARS: usize = 8;

// Seeded when no usable user list is stored.
const DEMO_USER_ID: &str = "user-demo";
const DEMO_USER_NAME: &str = "Demo Farmer";
const DEMO_USER_EMAIL: &str = "demo@farmwise.local";
const DEMO_USER_PASSWORD: &str = "harvest-season";

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Signup input as typed by the user.
#[derive(Debug, Clone)]
pub struct SignupInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Login, signup and logout for the single device session.
///
/// The user list and the session are updated under one lock, so two
/// overlapping signups for the same email cannot both succeed.
pub struct AuthService {
    store: Arc<dyn KvStore>,
    session: SessionHandle,
    hasher: CredentialHasher,
    users: Mutex<Vec<CredentialRecord>>,
    loading: AtomicBool,
}

struct LoadingGuard<'a>(&'a AtomicBool);

impl<'a> LoadingGuard<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl AuthService {
    /// Restore users and the session from `store`.
    ///
    /// A missing or unreadable user list is replaced with the built-in demo
    /// account and written back; an unusable session means signed out.
    pub async fn load(
        store: Arc<dyn KvStore>,
        session: SessionHandle,
        hasher: CredentialHasher,
    ) -> Result<Self, AuthError> {
        let users = match repo::load_users(store.as_ref()).await? {
            Some(users) => users,
            None => {
                info!("no stored users; seeding the demo account");
                let defaults = default_users(&hasher).await?;
                repo::save_users(store.as_ref(), &defaults).await?;
                defaults
            }
        };

        let current = repo::load_session(store.as_ref()).await?;
        if let Some(user) = &current {
            debug!(user_id = %user.id, "restored session");
        }
        session.replace(current).await;

        Ok(Self {
            store,
            session,
            hasher,
            users: Mutex::new(users),
            loading: AtomicBool::new(false),
        })
    }

    pub async fn current(&self) -> Option<SessionUser> {
        self.session.current().await
    }

    /// Advisory only: true while a login or signup is running.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub async fn user_count(&self) -> usize {
        self.users.lock().await.len()
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionUser, AuthError> {
        let _loading = LoadingGuard::set(&self.loading);
        let email = normalize_email(email);

        let users = self.users.lock().await;
        let candidates: Vec<(usize, String)> = users
            .iter()
            .enumerate()
            .filter(|(_, u)| normalize_email(&u.email) == email)
            .map(|(idx, u)| (idx, u.password_hash.clone()))
            .collect();
        let known_email = !candidates.is_empty();

        let Some(idx) = self.hasher.find_match(password, candidates).await? else {
            // logged, never returned: both cases look the same to the caller
            warn!(known_email, "login rejected");
            return Err(AuthError::InvalidCredentials);
        };

        let user = users[idx].redacted();
        repo::save_session(self.store.as_ref(), &user).await?;
        self.session.replace(Some(user.clone())).await;

        info!(user_id = %user.id, "user logged in");
        Ok(user)
    }

    #[instrument(skip(self, input), fields(email = %input.email.trim()))]
    pub async fn signup(&self, input: SignupInput) -> Result<SessionUser, AuthError> {
        let _loading = LoadingGuard::set(&self.loading);
        let name = input.name.trim().to_string();
        let email = normalize_email(&input.email);

        if name.is_empty() {
            return Err(AuthError::Validation("Please enter your name.".into()));
        }
        if !is_valid_email(&email) {
            return Err(AuthError::Validation("Please enter a valid email address.".into()));
        }
        if input.password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AuthError::Validation(format!(
                "Use at least {MIN_PASSWORD_CHARS} characters for your password."
            )));
        }

        let mut users = self.users.lock().await;
        if users.iter().any(|u| normalize_email(&u.email) == email) {
            warn!("signup with an email already in use");
            return Err(AuthError::EmailAlreadyInUse);
        }

        let password_hash = self.hasher.hash(&input.password).await?;
        let id = loop {
            let candidate = UserId::generate();
            if !users.iter().any(|u| u.id == candidate) {
                break candidate;
            }
        };
        let record = CredentialRecord {
            id,
            name,
            email,
            password_hash,
        };

        let mut next = users.clone();
        next.push(record.clone());
        repo::save_users(self.store.as_ref(), &next).await?;

        // No account without a session: put the old list back if this fails.
        let user = record.redacted();
        if let Err(e) = repo::save_session(self.store.as_ref(), &user).await {
            if let Err(undo) = repo::save_users(self.store.as_ref(), users.as_slice()).await {
                error!(error = %undo, "failed to roll back user list after signup");
            }
            return Err(e.into());
        }
        *users = next;
        self.session.replace(Some(user.clone())).await;

        info!(user_id = %user.id, "user signed up");
        Ok(user)
    }

    /// Always succeeds. A failure to delete the stored session is logged;
    /// the in-memory session is cleared regardless.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        let _users = self.users.lock().await;
        if let Err(e) = repo::clear_session(self.store.as_ref()).await {
            error!(error = %e, "failed to delete stored session");
        }
        if let Some(user) = self.session.current().await {
            info!(user_id = %user.id, "user logged out");
        }
        self.session.replace(None).await;
    }
}

async fn default_users(hasher: &CredentialHasher) -> Result<Vec<CredentialRecord>, AuthError> {
    Ok(vec![CredentialRecord {
        id: UserId::from(DEMO_USER_ID),
        name: DEMO_USER_NAME.into(),
        email: DEMO_USER_EMAIL.into(),
        password_hash: hasher.hash(DEMO_USER_PASSWORD).await?,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::{legacy_digest, test_hasher};
    use crate::auth::repo::{CURRENT_USER_KEY, USERS_KEY};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;

    async fn service_with(store: Arc<MemoryStore>) -> AuthService {
        AuthService::load(store, SessionHandle::default(), test_hasher())
            .await
            .expect("load auth service")
    }

    fn signup_input(name: &str, email: &str, password: &str) -> SignupInput {
        SignupInput {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn signup_then_login_with_other_casing() {
        let store = Arc::new(MemoryStore::default());
        let auth = service_with(store).await;

        let created = auth
            .signup(signup_input("Alice", "Alice@Example.com", "password123"))
            .await
            .unwrap();
        assert_eq!(created.email, "alice@example.com");

        auth.logout().await;
        let user = auth.login("  ALICE@example.COM ", "password123").await.unwrap();
        assert_eq!(user.name, "Alice");
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.id, created.id);
        assert_eq!(auth.current().await, Some(user));
    }

    #[tokio::test]
    async fn duplicate_email_leaves_store_unchanged() {
        let store = Arc::new(MemoryStore::default());
        let auth = service_with(store.clone()).await;
        auth.signup(signup_input("Alice", "alice@example.com", "password123"))
            .await
            .unwrap();
        let before = store.get(USERS_KEY).await.unwrap();

        let err = auth
            .signup(signup_input("Other", " ALICE@EXAMPLE.COM", "different-pass"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailAlreadyInUse));
        assert_eq!(store.get(USERS_KEY).await.unwrap(), before);
        assert_eq!(auth.user_count().await, 2);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let auth = service_with(Arc::new(MemoryStore::default())).await;
        auth.signup(signup_input("Alice", "alice@example.com", "password123"))
            .await
            .unwrap();
        auth.logout().await;

        let wrong = auth.login("alice@example.com", "password999").await.unwrap_err();
        let unknown = auth.login("nobody@example.com", "password123").await.unwrap_err();
        assert_eq!(wrong.code(), "INVALID_CREDENTIALS");
        assert_eq!(unknown.code(), wrong.code());
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert!(auth.current().await.is_none());
    }

    #[tokio::test]
    async fn signup_validates_input() {
        let auth = service_with(Arc::new(MemoryStore::default())).await;
        for input in [
            signup_input("  ", "a@b.co", "password123"),
            signup_input("Ann", "not-an-email", "password123"),
            signup_input("Ann", "ann@example.com", "short"),
        ] {
            let err = auth.signup(input).await.unwrap_err();
            assert_eq!(err.code(), "VALIDATION");
        }
        assert!(!auth.is_loading());
    }

    #[tokio::test]
    async fn missing_user_list_seeds_demo_account() {
        let store = Arc::new(MemoryStore::default());
        let auth = service_with(store.clone()).await;
        assert_eq!(auth.user_count().await, 1);
        assert!(store.get(USERS_KEY).await.unwrap().is_some());

        let user = auth.login(DEMO_USER_EMAIL, DEMO_USER_PASSWORD).await.unwrap();
        assert_eq!(user.id, UserId::from(DEMO_USER_ID));
    }

    #[tokio::test]
    async fn corrupted_user_list_falls_back_to_defaults() {
        let store = Arc::new(MemoryStore::default());
        store.put(USERS_KEY, "definitely not json").await.unwrap();
        let auth = service_with(store).await;
        assert_eq!(auth.user_count().await, 1);
    }

    #[tokio::test]
    async fn session_is_restored_and_cleared() {
        let store = Arc::new(MemoryStore::default());
        let auth = service_with(store.clone()).await;
        let user = auth
            .signup(signup_input("Bo", "bo@example.com", "password123"))
            .await
            .unwrap();

        let restored = service_with(store.clone()).await;
        assert_eq!(restored.current().await, Some(user));

        restored.logout().await;
        assert!(store.get(CURRENT_USER_KEY).await.unwrap().is_none());
        assert!(service_with(store).await.current().await.is_none());
    }

    #[tokio::test]
    async fn corrupted_session_reads_as_logged_out() {
        let store = Arc::new(MemoryStore::default());
        store.put(CURRENT_USER_KEY, "{").await.unwrap();
        let auth = service_with(store).await;
        assert!(auth.current().await.is_none());
    }

    #[tokio::test]
    async fn legacy_browser_records_can_log_in() {
        let store = Arc::new(MemoryStore::default());
        let legacy = vec![CredentialRecord {
            id: UserId::from("user-1700000000000"),
            name: "Old Timer".into(),
            email: "old@example.com".into(),
            password_hash: legacy_digest("password123"),
        }];
        store
            .put(USERS_KEY, &serde_json::to_string(&legacy).unwrap())
            .await
            .unwrap();

        let auth = service_with(store.clone()).await;
        let user = auth.login("old@example.com", "password123").await.unwrap();
        assert_eq!(user.name, "Old Timer");

        let raw = store.get(USERS_KEY).await.unwrap().unwrap();
        assert!(raw.contains(&legacy_digest("password123")));
    }

    // Fails writes to the session document only.
    #[derive(Default)]
    struct SessionWriteFails {
        inner: MemoryStore,
        fail_session: AtomicBool,
    }

    #[async_trait]
    impl KvStore for SessionWriteFails {
        async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.inner.get(key).await
        }
        async fn put(&self, key: &str, document: &str) -> anyhow::Result<()> {
            if key == CURRENT_USER_KEY && self.fail_session.load(Ordering::SeqCst) {
                anyhow::bail!("disk full writing {key}");
            }
            self.inner.put(key, document).await
        }
        async fn delete(&self, key: &str) -> anyhow::Result<()> {
            self.inner.delete(key).await
        }
    }

    #[tokio::test]
    async fn failed_session_write_leaves_no_account_behind() {
        let store = Arc::new(SessionWriteFails::default());
        let auth = AuthService::load(store.clone(), SessionHandle::default(), test_hasher())
            .await
            .unwrap();
        let users_before = store.inner.get(USERS_KEY).await.unwrap();

        store.fail_session.store(true, Ordering::SeqCst);
        let err = auth
            .signup(signup_input("Cy", "cy@example.com", "password123"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "STORAGE");
        assert_eq!(auth.user_count().await, 1);
        assert_eq!(store.inner.get(USERS_KEY).await.unwrap(), users_before);
        assert!(auth.current().await.is_none());

        store.fail_session.store(false, Ordering::SeqCst);
        let user = auth
            .signup(signup_input("Cy", "cy@example.com", "password123"))
            .await
            .unwrap();
        assert_eq!(user.email, "cy@example.com");
        assert_eq!(auth.user_count().await, 2);
    }

    #[tokio::test]
    async fn concurrent_signups_for_one_email_admit_one() {
        let auth = Arc::new(service_with(Arc::new(MemoryStore::default())).await);
        let a = tokio::spawn({
            let auth = auth.clone();
            async move { auth.signup(signup_input("A", "race@example.com", "password123")).await }
        });
        let b = tokio::spawn({
            let auth = auth.clone();
            async move { auth.signup(signup_input("B", "race@example.com", "password123")).await }
        });
        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(auth.user_count().await, 2);
    }
}
