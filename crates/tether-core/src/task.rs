use serde::{Deserialize, Deserializer, Serialize};

/// A task as the server reports it. The server owns identity, ordering,
/// and the completed flag; the client keeps only a render-time copy that
/// is replaced wholesale on every fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: u64,

    pub title: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,

    #[serde(default)]
    pub completed: bool,
}

/// Request body for the registration and login endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Request body for task creation and full title/description replacement.
#[derive(Debug, Clone, Serialize)]
pub struct TaskPayload<'a> {
    pub title: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenBody {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageBody {
    #[serde(default)]
    pub message: String,
}

/// The server may omit the description or send an explicit null; both
/// collapse to the empty string.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}
