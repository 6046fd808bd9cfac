use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::profile::errors::ProfileError;
use crate::profile::repo;
use crate::profile::repo_types::{Profile, ProfileSummary};
use crate::session::{SessionHandle, UserId};
use crate::storage::KvStore;

/// Which profile the service currently holds in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Anonymous,
    Bound(UserId),
}

struct ProfileState {
    binding: Binding,
    profile: Profile,
}

/// Profile operations for whoever is signed in on the session handle.
///
/// Signed-out callers work on a throwaway default profile that is never
/// written to storage. Each call re-checks the session first, so a login or
/// logout is picked up before the next mutation runs.
pub struct ProfileService {
    store: Arc<dyn KvStore>,
    session: SessionHandle,
    state: Mutex<ProfileState>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn KvStore>, session: SessionHandle) -> Self {
        Self {
            store,
            session,
            state: Mutex::new(ProfileState {
                binding: Binding::Anonymous,
                profile: Profile::default(),
            }),
        }
    }

    /// Sync with the session handle now and report the resulting binding.
    pub async fn rebind(&self) -> Result<Binding, ProfileError> {
        let mut state = self.state.lock().await;
        self.sync(&mut state).await?;
        Ok(state.binding.clone())
    }

    pub async fn profile(&self) -> Result<Profile, ProfileError> {
        let mut state = self.state.lock().await;
        self.sync(&mut state).await?;
        Ok(state.profile.clone())
    }

    pub async fn summary(&self) -> Result<ProfileSummary, ProfileError> {
        let mut state = self.state.lock().await;
        self.sync(&mut state).await?;
        Ok(state.profile.summary())
    }

    #[instrument(skip(self, prompt, answer))]
    pub async fn record_question(&self, prompt: &str, answer: &str) -> Result<Profile, ProfileError> {
        self.mutate("record_question", |p, now| p.record_question(prompt, answer, now))
            .await
    }

    #[instrument(skip(self))]
    pub async fn clear_questions(&self) -> Result<Profile, ProfileError> {
        self.mutate("clear_questions", |p, _| p.clear_questions()).await
    }

    #[instrument(skip(self, title, content))]
    pub async fn save_tip(&self, title: &str, content: &str) -> Result<Profile, ProfileError> {
        self.mutate("save_tip", |p, now| p.save_tip(title, content, now))
            .await
    }

    #[instrument(skip(self))]
    pub async fn remove_tip(&self, id: &str) -> Result<Profile, ProfileError> {
        self.mutate("remove_tip", |p, _| p.remove_tip(id)).await
    }

    #[instrument(skip(self))]
    pub async fn toggle_task(&self, id: &str) -> Result<Profile, ProfileError> {
        self.mutate("toggle_task", |p, _| p.toggle_task(id)).await
    }

    #[instrument(skip(self, message))]
    pub async fn add_reminder(&self, message: &str) -> Result<Profile, ProfileError> {
        self.mutate("add_reminder", |p, now| p.add_reminder(message, now))
            .await
    }

    #[instrument(skip(self))]
    pub async fn remove_reminder(&self, id: &str) -> Result<Profile, ProfileError> {
        self.mutate("remove_reminder", |p, _| p.remove_reminder(id)).await
    }

    // Read-modify-write under the state lock. The new profile replaces the
    // in-memory one only after it has been written.
    async fn mutate<F>(&self, op: &'static str, f: F) -> Result<Profile, ProfileError>
    where
        F: FnOnce(&mut Profile, OffsetDateTime) -> bool,
    {
        let mut state = self.state.lock().await;
        self.sync(&mut state).await?;

        let mut next = state.profile.clone();
        if !f(&mut next, OffsetDateTime::now_utc()) {
            debug!(op, "profile unchanged");
            return Ok(next);
        }

        if let Binding::Bound(id) = &state.binding {
            repo::save_profile(self.store.as_ref(), id, &next).await?;
            debug!(op, user_id = %id, "profile saved");
        }
        state.profile = next;
        Ok(state.profile.clone())
    }

    async fn sync(&self, state: &mut ProfileState) -> Result<(), ProfileError> {
        let wanted = match self.session.identity().await {
            Some(id) => Binding::Bound(id),
            None => Binding::Anonymous,
        };
        if wanted == state.binding {
            return Ok(());
        }

        let profile = match &wanted {
            Binding::Anonymous => Profile::default(),
            Binding::Bound(id) => {
                let profile = repo::load_profile(self.store.as_ref(), id)
                    .await?
                    .unwrap_or_default();
                // write back so a first-seen identity gets its record and a
                // merged one is stored in its complete shape
                repo::save_profile(self.store.as_ref(), id, &profile).await?;
                profile
            }
        };

        info!(from = ?state.binding, to = ?wanted, "profile binding switched");
        state.binding = wanted;
        state.profile = profile;
        Ok(())
    }
}
