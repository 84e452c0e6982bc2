use serde::{Serialize, Deserialize};

/// Identity handed over by the authentication provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VoterIdentity {
    pub id: String,
    pub display_name: String,
}

impl VoterIdentity {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self { id: id.into(), display_name: display_name.into() }
    }
}
