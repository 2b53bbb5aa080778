//! Backend provider tags.

use reelforge_error::{ReelforgeResult, ValidationError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Backend family selected per request by the `provider` field.
///
/// # Examples
///
/// ```
/// use reelforge_core::Provider;
///
/// assert_eq!(Provider::parse(Some("openai_compatible")).unwrap(), Provider::OpenaiCompatible);
/// assert_eq!(Provider::parse(None).unwrap(), Provider::None);
/// assert_eq!(
///     Provider::parse(Some("bard")).unwrap_err().to_string(),
///     "Unknown provider: bard"
/// );
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Provider {
    /// Template only; no backend is called
    None,
    /// Locally installed CLI agent run as a subprocess
    Command,
    /// Ollama HTTP API
    Ollama,
    /// Any OpenAI-compatible chat completions endpoint
    OpenaiCompatible,
    /// OpenAI-compatible endpoint configured for image generation
    ImageGen,
    /// Puter.js, which runs in the browser
    Puter,
    /// Self-bootstrapped gpt4free gateway
    Gpt4free,
}

/// Groups of providers that share a gate or execution model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ProviderFamily {
    /// No execution at all
    Template,
    /// Spawns a local process
    Subprocess,
    /// Makes outbound HTTP requests
    HttpEgress,
    /// Fulfilled by the browser, never by the server
    ClientSide,
}

impl Provider {
    /// Parse the `provider` field; a missing field means `none`.
    pub fn parse(raw: Option<&str>) -> ReelforgeResult<Self> {
        match raw {
            None => Ok(Provider::None),
            Some(raw) => Provider::from_str(raw.trim())
                .map_err(|_| ValidationError::new(format!("Unknown provider: {}", raw)).into()),
        }
    }

    /// Which execution family this provider belongs to.
    pub fn family(self) -> ProviderFamily {
        match self {
            Provider::None => ProviderFamily::Template,
            Provider::Command => ProviderFamily::Subprocess,
            Provider::Ollama
            | Provider::OpenaiCompatible
            | Provider::ImageGen
            | Provider::Gpt4free => ProviderFamily::HttpEgress,
            Provider::Puter => ProviderFamily::ClientSide,
        }
    }

    /// Only subprocess agents accept file attachments.
    pub fn accepts_attachments(self) -> bool {
        self == Provider::Command
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_display_round_trips_through_parse() {
        for provider in Provider::iter() {
            let tag = provider.to_string();
            assert_eq!(Provider::parse(Some(&tag)).unwrap(), provider);
        }
    }

    #[test]
    fn test_families() {
        assert_eq!(Provider::Command.family(), ProviderFamily::Subprocess);
        assert_eq!(Provider::Gpt4free.family(), ProviderFamily::HttpEgress);
        assert_eq!(Provider::Puter.family(), ProviderFamily::ClientSide);
        assert_eq!(Provider::None.family(), ProviderFamily::Template);
    }
}
