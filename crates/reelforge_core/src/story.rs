//! Structured story fields and the writer instruction wrapped around the
//! rendered template.

use reelforge_error::{ReelforgeResult, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Catalog prompt rendered by `/api/generate`.
pub const STRUCTURED_PROMPT_NAME: &str = "structured_video_prompt";

/// Optional structured constraints accompanying a story.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryFields {
    /// Single clip or multi-part
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub mode: Option<String>,
    /// Total duration in seconds
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub duration_seconds: Option<String>,
    /// Length of each part in seconds
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub part_length_seconds: Option<String>,
    /// Output resolution, e.g. 1080p
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub resolution: Option<String>,
    /// Aspect ratio, e.g. 16:9
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub aspect_ratio: Option<String>,
    /// Visual style
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub style: Option<String>,
    /// Camera movement
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub camera: Option<String>,
    /// Lighting setup
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub lighting: Option<String>,
    /// Quality keywords
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub quality: Option<String>,
    /// Ordered action beats
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub action_beats: Option<String>,
    /// Audio direction
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub audio: Option<String>,
}

impl StoryFields {
    /// Reject a part length that is not shorter than the total duration.
    ///
    /// Only enforced when both values parse as numbers.
    pub fn check_durations(&self) -> ReelforgeResult<()> {
        let total = self.duration_seconds.as_deref().and_then(seconds);
        let part = self.part_length_seconds.as_deref().and_then(seconds);
        match (total, part) {
            (Some(total), Some(part)) if part >= total => Err(ValidationError::new(
                "Part length must be less than total duration.",
            )
            .into()),
            _ => Ok(()),
        }
    }

    /// Template arguments: the story plus every non-empty field.
    ///
    /// # Examples
    ///
    /// ```
    /// use reelforge_core::StoryFields;
    ///
    /// let fields = StoryFields {
    ///     camera: Some("dolly in".to_string()),
    ///     ..Default::default()
    /// };
    /// let args = fields.prompt_arguments("a cat in the rain");
    /// assert_eq!(args.len(), 2);
    /// assert_eq!(args["camera"], "dolly in");
    /// ```
    pub fn prompt_arguments(&self, story: &str) -> BTreeMap<String, String> {
        let mut args = BTreeMap::new();
        args.insert("story".to_string(), story.to_string());
        let fields = [
            ("mode", &self.mode),
            ("duration_seconds", &self.duration_seconds),
            ("part_length_seconds", &self.part_length_seconds),
            ("resolution", &self.resolution),
            ("aspect_ratio", &self.aspect_ratio),
            ("style", &self.style),
            ("camera", &self.camera),
            ("lighting", &self.lighting),
            ("quality", &self.quality),
            ("action_beats", &self.action_beats),
            ("audio", &self.audio),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                args.insert(key.to_string(), value.clone());
            }
        }
        args
    }
}

fn seconds(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

const WRITER_PREAMBLE: &[&str] = &[
    "You are a prompt writer. Fill in the missing fields and output ONLY the final structured prompt sections.",
    "Do not include '(unspecified)'. If unknown, infer plausible specifics.",
    "If Part length (seconds) is provided, split into multiple parts and label with time ranges.",
    "If Part length is NOT provided, output a single Part 1 covering the full Duration.",
    "Return exactly these sections for each part:",
    "Part 1 (start-end s):",
    "Prompt:",
    "Scene:",
    "Style:",
    "Camera:",
    "Lighting:",
    "Action beats:",
    "Quality:",
    "Audio (optional):",
    "",
    "Repeat the Part block for each segment when Part length is provided.",
    "",
    "Template + constraints:",
];

/// Wrap a rendered template in the fixed writer instruction sent to backends.
pub fn writer_instruction(template: &str) -> String {
    let mut lines: Vec<&str> = WRITER_PREAMBLE.to_vec();
    lines.push(template);
    lines.push("");
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_must_be_shorter_than_total() {
        let fields = StoryFields {
            duration_seconds: Some("10".to_string()),
            part_length_seconds: Some("10".to_string()),
            ..Default::default()
        };
        let err = fields.check_durations().unwrap_err();
        assert_eq!(err.to_string(), "Part length must be less than total duration.");
    }

    #[test]
    fn test_durations_ignored_when_not_numeric() {
        let fields = StoryFields {
            duration_seconds: Some("long".to_string()),
            part_length_seconds: Some("5".to_string()),
            ..Default::default()
        };
        assert!(fields.check_durations().is_ok());
    }

    #[test]
    fn test_instruction_ends_with_template() {
        let text = writer_instruction("Story: cat");
        assert!(text.starts_with("You are a prompt writer."));
        assert!(text.ends_with("Template + constraints:\nStory: cat\n"));
    }
}
