use serde::{Deserialize, Serialize};

/// openFDA label sections arrive as either a single string or an array of strings.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StringOrVec {
    #[default]
    None,
    Single(String),
    Multiple(Vec<String>),
}

impl StringOrVec {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::None => Vec::new(),
            Self::Single(value) => vec![value],
            Self::Multiple(values) => values,
        }
    }
}
