use std::fmt;
use std::str::FromStr;

use palette::Srgb;
use serde::{Deserialize, Deserializer};

/// Which trending list the field is populated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MediaKind {
    #[default]
    Anime,
    Manga,
}

impl MediaKind {
    /// Value of the `MediaType` enum in the AniList schema.
    pub fn as_graphql(self) -> &'static str {
        match self {
            MediaKind::Anime => "ANIME",
            MediaKind::Manga => "MANGA",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            MediaKind::Anime => MediaKind::Manga,
            MediaKind::Manga => MediaKind::Anime,
        }
    }

    /// Call-to-action line shown on the landing window.
    pub fn call_to_action(self) -> &'static str {
        match self {
            MediaKind::Anime => "fall into anime",
            MediaKind::Manga => "fall into manga",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Anime => f.write_str("anime"),
            MediaKind::Manga => f.write_str("manga"),
        }
    }
}

/// Reads an explicit JSON `null` as the type's default, like a missing key.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MediaTitle {
    pub romaji: Option<String>,
    pub english: Option<String>,
    pub native: Option<String>,
}

impl MediaTitle {
    /// English title when present, otherwise romaji, otherwise native.
    pub fn display(&self) -> Option<&str> {
        self.english
            .as_deref()
            .or(self.romaji.as_deref())
            .or(self.native.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverImage {
    pub extra_large: Option<String>,
    pub large: Option<String>,
    pub medium: Option<String>,
    /// Dominant colour as `#rrggbb`.
    pub color: Option<String>,
}

/// One trending title as returned by the catalog. Read-only once fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaRecord {
    #[serde(deserialize_with = "null_as_default")]
    pub id: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub title: MediaTitle,
    #[serde(deserialize_with = "null_as_default")]
    pub cover_image: CoverImage,
    pub average_score: Option<u32>,
    #[serde(deserialize_with = "null_as_default")]
    pub genres: Vec<String>,
    pub description: Option<String>,
    pub episodes: Option<u32>,
    pub chapters: Option<u32>,
    pub status: Option<String>,
}

impl MediaRecord {
    /// Best cover URL for a magnified poster: extra-large, then large.
    pub fn poster_url(&self) -> Option<&str> {
        self.cover_image
            .extra_large
            .as_deref()
            .or(self.cover_image.large.as_deref())
            .filter(|url| !url.is_empty())
    }

    /// Parses the cover colour hint into sRGB bytes.
    pub fn accent_rgb(&self) -> Option<[u8; 3]> {
        let rgb = Srgb::<u8>::from_str(self.cover_image.color.as_deref()?.trim()).ok()?;
        Some([rgb.red, rgb.green, rgb.blue])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_anilist_media_object() {
        let json = r##"{
            "id": 21,
            "title": {"romaji": "One Piece", "english": null, "native": "ONE PIECE"},
            "coverImage": {"extraLarge": "https://img/xl.jpg", "large": "https://img/l.jpg", "medium": null, "color": "#e4a15d"},
            "averageScore": 88,
            "genres": ["Action", "Adventure"],
            "description": "pirates",
            "episodes": null,
            "chapters": null,
            "status": "RELEASING"
        }"##;
        let record: MediaRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, 21);
        assert_eq!(record.title.display(), Some("One Piece"));
        assert_eq!(record.poster_url(), Some("https://img/xl.jpg"));
        assert_eq!(record.accent_rgb(), Some([0xe4, 0xa1, 0x5d]));
        assert_eq!(record.genres.len(), 2);
    }

    #[test]
    fn poster_url_falls_back_to_large() {
        let record = MediaRecord {
            cover_image: CoverImage {
                large: Some("https://img/l.jpg".into()),
                ..CoverImage::default()
            },
            ..MediaRecord::default()
        };
        assert_eq!(record.poster_url(), Some("https://img/l.jpg"));
        assert_eq!(MediaRecord::default().poster_url(), None);
    }

    #[test]
    fn media_kind_toggles_and_labels() {
        assert_eq!(MediaKind::Anime.toggled(), MediaKind::Manga);
        assert_eq!(MediaKind::Manga.as_graphql(), "MANGA");
        assert_eq!(MediaKind::Manga.call_to_action(), "fall into manga");
    }

    #[test]
    fn null_fields_fall_back_to_defaults() {
        let json = r#"{
            "id": 7,
            "title": null,
            "coverImage": null,
            "averageScore": null,
            "genres": null,
            "description": null
        }"#;
        let record: MediaRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, 7);
        assert_eq!(record.title, MediaTitle::default());
        assert_eq!(record.title.display(), None);
        assert!(record.genres.is_empty());
        assert_eq!(record.poster_url(), None);
        assert_eq!(record.accent_rgb(), None);
    }

    #[test]
    fn partial_nulls_inside_nested_objects() {
        let json = r#"{"id": null, "title": {"romaji": null, "english": null, "native": "N"},
            "coverImage": {"large": "https://img/l.jpg", "color": null}}"#;
        let record: MediaRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, 0);
        assert_eq!(record.title.display(), Some("N"));
        assert_eq!(record.poster_url(), Some("https://img/l.jpg"));
    }
}
