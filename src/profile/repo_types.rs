use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

pub const HISTORY_LIMIT: usize = 50;
pub const SAVED_TIPS_LIMIT: usize = 50;
pub const REMINDERS_LIMIT: usize = 20;
pub const DEFAULT_TIP_TITLE: &str = "Saved answer";

const DEFAULT_TASKS: [(&str, &str); 3] = [
    ("task-1", "Check soil moisture levels"),
    ("task-2", "Review irrigation schedule"),
    ("task-3", "Inspect tomato crop for pests"),
];

const DEFAULT_REMINDERS: [(&str, &str); 2] = [
    ("reminder-1", "Review weather forecast for the week ahead."),
    ("reminder-2", "Follow up on fertilizer delivery status."),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionEntry {
    pub id: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub answer: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedTip {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub message: String,
    // the seeded reminders carry no timestamp
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<OffsetDateTime>,
}

/// Per-user bundle of history, saved tips, tasks and reminders.
///
/// All lists are newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub questions_history: Vec<QuestionEntry>,
    pub saved_tips: Vec<SavedTip>,
    pub tasks: Vec<Task>,
    pub reminders: Vec<Reminder>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub questions_asked: usize,
    pub saved_tips: usize,
    pub open_tasks: usize,
    pub recent_questions: Vec<QuestionEntry>,
    pub latest_tips: Vec<SavedTip>,
}

pub fn default_tasks() -> Vec<Task> {
    DEFAULT_TASKS
        .iter()
        .map(|(id, label)| Task {
            id: (*id).into(),
            label: (*label).into(),
            completed: false,
        })
        .collect()
}

pub fn default_reminders() -> Vec<Reminder> {
    DEFAULT_REMINDERS
        .iter()
        .map(|(id, message)| Reminder {
            id: (*id).into(),
            message: (*message).into(),
            created_at: None,
        })
        .collect()
}

pub(crate) fn generate_id(kind: &str) -> String {
    format!("{kind}-{}", Uuid::new_v4().simple())
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            questions_history: Vec::new(),
            saved_tips: Vec::new(),
            tasks: default_tasks(),
            reminders: default_reminders(),
        }
    }
}

impl Profile {
    /// Build a profile from a stored document, field by field.
    ///
    /// A list that is absent or not an array takes its default; tasks and
    /// reminders are also reseeded when stored empty. Entries that do not
    /// parse are dropped one by one and the rest of the list is kept.
    /// Anything that is not a JSON object yields the full default profile.
    pub fn from_document(doc: Value) -> Self {
        let Value::Object(mut fields) = doc else {
            warn!("stored profile is not an object; using defaults");
            return Self::default();
        };
        Self {
            questions_history: take_list(&mut fields, "questionsHistory").unwrap_or_default(),
            saved_tips: take_list(&mut fields, "savedTips").unwrap_or_default(),
            tasks: take_list(&mut fields, "tasks")
                .filter(|tasks: &Vec<Task>| !tasks.is_empty())
                .unwrap_or_else(default_tasks),
            reminders: take_list(&mut fields, "reminders")
                .filter(|reminders: &Vec<Reminder>| !reminders.is_empty())
                .unwrap_or_else(default_reminders),
        }
    }

    /// Returns whether anything changed; same for the other mutators.
    pub fn record_question(&mut self, prompt: &str, answer: &str, now: OffsetDateTime) -> bool {
        if prompt.is_empty() && answer.is_empty() {
            return false;
        }
        let entry = QuestionEntry {
            id: generate_id("question"),
            prompt: prompt.to_string(),
            answer: answer.to_string(),
            created_at: now,
        };
        self.questions_history.insert(0, entry);
        self.questions_history.truncate(HISTORY_LIMIT);
        true
    }

    pub fn clear_questions(&mut self) -> bool {
        self.questions_history.clear();
        true
    }

    pub fn save_tip(&mut self, title: &str, content: &str, now: OffsetDateTime) -> bool {
        if title.is_empty() && content.is_empty() {
            return false;
        }
        let title = match title.trim() {
            "" => DEFAULT_TIP_TITLE.to_string(),
            t => t.to_string(),
        };
        let tip = SavedTip {
            id: generate_id("tip"),
            title,
            content: content.to_string(),
            created_at: now,
        };
        self.saved_tips.insert(0, tip);
        self.saved_tips.truncate(SAVED_TIPS_LIMIT);
        true
    }

    pub fn remove_tip(&mut self, id: &str) -> bool {
        let before = self.saved_tips.len();
        self.saved_tips.retain(|tip| tip.id != id);
        self.saved_tips.len() != before
    }

    pub fn toggle_task(&mut self, id: &str) -> bool {
        let mut changed = false;
        for task in self.tasks.iter_mut().filter(|t| t.id == id) {
            task.completed = !task.completed;
            changed = true;
        }
        changed
    }

    pub fn add_reminder(&mut self, message: &str, now: OffsetDateTime) -> bool {
        let message = message.trim();
        if message.is_empty() {
            return false;
        }
        let reminder = Reminder {
            id: generate_id("reminder"),
            message: message.to_string(),
            created_at: Some(now),
        };
        self.reminders.insert(0, reminder);
        self.reminders.truncate(REMINDERS_LIMIT);
        true
    }

    pub fn remove_reminder(&mut self, id: &str) -> bool {
        let before = self.reminders.len();
        self.reminders.retain(|r| r.id != id);
        self.reminders.len() != before
    }

    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            questions_asked: self.questions_history.len(),
            saved_tips: self.saved_tips.len(),
            open_tasks: self.tasks.iter().filter(|t| !t.completed).count(),
            recent_questions: self.questions_history.iter().take(5).cloned().collect(),
            latest_tips: self.saved_tips.iter().take(5).cloned().collect(),
        }
    }
}

fn take_list<T: DeserializeOwned>(fields: &mut Map<String, Value>, key: &str) -> Option<Vec<T>> {
    let Value::Array(entries) = fields.remove(key)? else {
        warn!(field = key, "stored profile field is not a list; using default");
        return None;
    };
    let list = entries
        .into_iter()
        .enumerate()
        .filter_map(|(idx, entry)| match serde_json::from_value::<T>(entry) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(field = key, index = idx, error = %e, "skipping malformed stored profile entry");
                None
            }
        })
        .collect();
    Some(list)
}
