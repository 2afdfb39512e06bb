use std::collections::BTreeMap;

use crate::config::RepositoryConfig;
use crate::eval::Value;

/// What `!eval` snippets see as `git`: the remote and branch the bot
/// deploys from.
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryHandle {
    pub remote: String,
    pub branch: String,
}

impl RepositoryHandle {
    pub fn to_value(&self) -> Value {
        let mut fields = BTreeMap::new();
        fields.insert("remote".to_string(), Value::from(self.remote.as_str()));
        fields.insert("branch".to_string(), Value::from(self.branch.as_str()));
        Value::Dict(fields)
    }
}

impl From<&RepositoryConfig> for RepositoryHandle {
    fn from(config: &RepositoryConfig) -> Self {
        Self {
            remote: config.remote.clone(),
            branch: config.branch.clone(),
        }
    }
}
