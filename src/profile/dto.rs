use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RecordQuestionRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveTipRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct AddReminderRequest {
    #[serde(default)]
    pub message: String,
}
