use serde::{Deserialize, Serialize};
use std::fmt;

/// How the card's legacy folio was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    /// Legacy folio auto-allocated from the shared sequence
    Digital,
    /// Legacy folio supplied by the caller from a predecessor card
    Mixed,
}

impl CardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardType::Digital => "digital",
            CardType::Mixed => "mixed",
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status given to every card issued at registration
pub const CARD_STATUS_ACTIVE: &str = "active";
