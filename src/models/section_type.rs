use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Text,
    Video,
    Audio,
    Image,
    Quiz,
    Exercise,
}

impl SectionType {
    pub const ALL: [SectionType; 6] = [
        SectionType::Text,
        SectionType::Video,
        SectionType::Audio,
        SectionType::Image,
        SectionType::Quiz,
        SectionType::Exercise,
    ];

    /// Returns true if `content` holds a media URL for this type.
    pub fn is_media(&self) -> bool {
        matches!(
            self,
            SectionType::Video | SectionType::Audio | SectionType::Image
        )
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionType::Text => write!(f, "text"),
            SectionType::Video => write!(f, "video"),
            SectionType::Audio => write!(f, "audio"),
            SectionType::Image => write!(f, "image"),
            SectionType::Quiz => write!(f, "quiz"),
            SectionType::Exercise => write!(f, "exercise"),
        }
    }
}

impl FromStr for SectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(SectionType::Text),
            "video" => Ok(SectionType::Video),
            "audio" => Ok(SectionType::Audio),
            "image" => Ok(SectionType::Image),
            "quiz" => Ok(SectionType::Quiz),
            "exercise" => Ok(SectionType::Exercise),
            _ => Err(format!(
                "Invalid section type '{}'. Valid options: text, video, audio, image, quiz, exercise",
                s
            )),
        }
    }
}
