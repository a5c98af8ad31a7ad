/// Kafka topic names used by the Spectra services
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    RegistrationCode,
    NewPost,
    NewComment,
    NewReaction,
    UserDelete,
}

impl Topic {
    pub const ALL: [Topic; 5] = [
        Topic::RegistrationCode,
        Topic::NewPost,
        Topic::NewComment,
        Topic::NewReaction,
        Topic::UserDelete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::RegistrationCode => "registration-code",
            Topic::NewPost => "new-post",
            Topic::NewComment => "new-comment",
            Topic::NewReaction => "new-reaction",
            Topic::UserDelete => "user-delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|topic| topic.as_str() == s)
    }

    /// Dead-letter topic for records that cannot be processed
    pub fn dead_letter(&self) -> String {
        format!("{}.dlq", self.as_str())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
