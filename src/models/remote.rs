//! Remote listing models

use serde::{Deserialize, Serialize};

const HEADS_PREFIX: &str = "refs/heads/";

/// Advertised branches of a remote repository
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRefs {
    pub branches: Vec<String>,
}

impl RemoteRefs {
    /// Build from advertised ref names, keeping branch heads only.
    pub fn from_ref_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let branches = names
            .into_iter()
            .filter_map(|name| {
                name.as_ref()
                    .strip_prefix(HEADS_PREFIX)
                    .map(|short| short.to_string())
            })
            .collect();
        Self { branches }
    }

    pub fn has_branch(&self, name: &str) -> bool {
        self.branches.iter().any(|b| b == name)
    }

    /// The conventional substitute for a default-branch name.
    pub fn alternate_name(name: &str) -> Option<&'static str> {
        match name {
            "main" => Some("master"),
            "master" => Some("main"),
            _ => None,
        }
    }

    /// The substitute branch, but only when the remote actually has it.
    pub fn available_alternate(&self, name: &str) -> Option<&'static str> {
        Self::alternate_name(name).filter(|alt| self.has_branch(alt))
    }

    /// An unborn repository advertises no branch heads at all.
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}
