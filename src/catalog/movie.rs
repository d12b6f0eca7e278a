//! Domain types for the movie catalog.

use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum accepted title length.
const MAX_TITLE_LEN: usize = 255;

/// A movie owned by a user, with zero or more attached images.
///
/// The row itself is always written synchronously at creation time; images
/// are attached later by the upload worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub id: Uuid,
    pub user_id: Uuid,
    pub indicative_rating_id: Uuid,
    pub title: String,
    pub duration_minutes: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Attached images; populated on fetch, empty on a fresh creation.
    #[serde(default)]
    pub images: Vec<MovieImage>,
}

/// An image attached to a movie after a successful remote upload.
///
/// `external_id` correlates the row with the remote object; the row exists
/// iff the remote store is believed to hold that object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MovieImage {
    pub id: Uuid,
    pub movie_id: Uuid,
    /// Canonical public URL served to clients.
    pub image_url: String,
    /// External stored-object identifier (unique).
    pub external_id: String,
    pub created_at: DateTime<Utc>,
}

impl MovieImage {
    /// Creates a new image row for a completed upload.
    pub fn new(movie_id: Uuid, image_url: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            movie_id,
            image_url: image_url.into(),
            external_id: external_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// Age classification a movie is published under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicativeRating {
    pub id: Uuid,
    /// Short classification code, e.g. "L", "12", "18".
    pub description: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome kinds recorded on the ingest audit stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestEventKind {
    /// An image was uploaded and its row persisted.
    ImageUploaded,
    /// An upload task was dead-lettered.
    UploadFailed,
    /// A remote object and its row were deleted.
    ImageDeleted,
    /// A delete task was dead-lettered.
    DeleteFailed,
}

impl IngestEventKind {
    /// Stable string form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestEventKind::ImageUploaded => "image_uploaded",
            IngestEventKind::UploadFailed => "upload_failed",
            IngestEventKind::ImageDeleted => "image_deleted",
            IngestEventKind::DeleteFailed => "delete_failed",
        }
    }

    /// Parses the database string form.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "image_uploaded" => Some(IngestEventKind::ImageUploaded),
            "upload_failed" => Some(IngestEventKind::UploadFailed),
            "image_deleted" => Some(IngestEventKind::ImageDeleted),
            "delete_failed" => Some(IngestEventKind::DeleteFailed),
            _ => None,
        }
    }
}

impl std::fmt::Display for IngestEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only entry on the ingest audit stream.
///
/// Lets a caller see per-image pipeline outcomes for a movie without
/// mining worker logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestEvent {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub kind: IngestEventKind,
    pub external_id: Option<String>,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl IngestEvent {
    /// Creates a new event for a movie.
    pub fn new(movie_id: Uuid, kind: IngestEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            movie_id,
            kind,
            external_id: None,
            detail: None,
            created_at: Utc::now(),
        }
    }

    /// Sets the external id the event refers to.
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Sets a free-form detail message.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Where a submitted image's bytes live until the producer reads them.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Bytes already buffered in memory.
    Memory(Vec<u8>),
    /// File spooled to disk by the upstream multipart parser.
    File(PathBuf),
}

/// An image file submitted alongside a movie, not yet read into memory.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    filename: String,
    source: ImageSource,
}

impl ImageUpload {
    /// Creates an upload from in-memory bytes.
    pub fn from_bytes(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            source: ImageSource::Memory(bytes),
        }
    }

    /// Creates an upload backed by a spooled file.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Self {
            filename,
            source: ImageSource::File(path),
        }
    }

    /// Returns the submitted filename.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Reads the image into memory.
    ///
    /// Fails when a spooled file has disappeared or cannot be read; the
    /// producer skips such images rather than failing movie creation.
    pub async fn read_bytes(&self) -> io::Result<Vec<u8>> {
        match &self.source {
            ImageSource::Memory(bytes) => Ok(bytes.clone()),
            ImageSource::File(path) => tokio::fs::read(path).await,
        }
    }
}

/// Payload for creating a movie.
#[derive(Debug)]
pub struct MovieDraft {
    pub title: String,
    pub duration_minutes: i32,
    pub indicative_rating_id: Uuid,
    pub images: Vec<ImageUpload>,
}

impl MovieDraft {
    /// Validates the draft, returning a human-readable reason on failure.
    ///
    /// The title is trimmed in place before validation.
    pub fn validate(&mut self) -> Result<(), String> {
        self.title = self.title.trim().to_string();

        if self.title.is_empty() {
            return Err("title must not be empty".to_string());
        }
        if self.title.len() > MAX_TITLE_LEN {
            return Err(format!("title must be at most {} characters", MAX_TITLE_LEN));
        }
        if self.duration_minutes <= 0 {
            return Err("duration must be a positive number of minutes".to_string());
        }

        Ok(())
    }

    /// Builds the movie row for this draft, owned by the given user.
    pub fn into_movie(self, user_id: Uuid) -> (Movie, Vec<ImageUpload>) {
        let movie = Movie {
            id: Uuid::new_v4(),
            user_id,
            indicative_rating_id: self.indicative_rating_id,
            title: self.title,
            duration_minutes: self.duration_minutes,
            created_at: Utc::now(),
            updated_at: None,
            images: Vec::new(),
        };
        (movie, self.images)
    }
}

/// Partial update for a movie. At least one field must be set.
#[derive(Debug, Default, Clone)]
pub struct MovieUpdate {
    pub title: Option<String>,
    pub duration_minutes: Option<i32>,
    pub indicative_rating_id: Option<Uuid>,
}

impl MovieUpdate {
    /// Validates the update, returning a human-readable reason on failure.
    pub fn validate(&mut self) -> Result<(), String> {
        if let Some(title) = &mut self.title {
            *title = title.trim().to_string();
            if title.is_empty() {
                return Err("title must not be empty".to_string());
            }
            if title.len() > MAX_TITLE_LEN {
                return Err(format!("title must be at most {} characters", MAX_TITLE_LEN));
            }
        }

        if let Some(duration) = self.duration_minutes {
            if duration <= 0 {
                return Err("duration must be a positive number of minutes".to_string());
            }
        }

        if self.title.is_none()
            && self.duration_minutes.is_none()
            && self.indicative_rating_id.is_none()
        {
            return Err("at least one field must be provided".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_validation_trims_title() {
        let mut draft = MovieDraft {
            title: "  The Seventh Seal  ".to_string(),
            duration_minutes: 96,
            indicative_rating_id: Uuid::new_v4(),
            images: vec![],
        };

        draft.validate().expect("draft should be valid");
        assert_eq!(draft.title, "The Seventh Seal");
    }

    #[test]
    fn test_draft_validation_rejects_empty_title() {
        let mut draft = MovieDraft {
            title: "   ".to_string(),
            duration_minutes: 96,
            indicative_rating_id: Uuid::new_v4(),
            images: vec![],
        };

        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_draft_validation_rejects_nonpositive_duration() {
        let mut draft = MovieDraft {
            title: "Short".to_string(),
            duration_minutes: 0,
            indicative_rating_id: Uuid::new_v4(),
            images: vec![],
        };

        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_update_requires_at_least_one_field() {
        let mut update = MovieUpdate::default();
        assert!(update.validate().is_err());

        let mut update = MovieUpdate {
            duration_minutes: Some(120),
            ..Default::default()
        };
        assert!(update.validate().is_ok());
    }

    #[test]
    fn test_ingest_event_kind_roundtrip() {
        for kind in [
            IngestEventKind::ImageUploaded,
            IngestEventKind::UploadFailed,
            IngestEventKind::ImageDeleted,
            IngestEventKind::DeleteFailed,
        ] {
            assert_eq!(IngestEventKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(IngestEventKind::parse("unknown"), None);
    }

    #[tokio::test]
    async fn test_image_upload_from_memory() {
        let upload = ImageUpload::from_bytes("poster.jpg", vec![1, 2, 3]);
        assert_eq!(upload.filename(), "poster.jpg");
        assert_eq!(upload.read_bytes().await.expect("should read"), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_image_upload_from_spooled_file() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("poster.jpg");
        std::fs::write(&path, b"jpeg-bytes").expect("file should be written");

        let upload = ImageUpload::from_path(&path);
        assert_eq!(upload.filename(), "poster.jpg");
        assert_eq!(
            upload.read_bytes().await.expect("should read"),
            b"jpeg-bytes"
        );
    }

    #[tokio::test]
    async fn test_image_upload_from_missing_file_fails() {
        let upload = ImageUpload::from_path("/nonexistent/poster.jpg");
        assert_eq!(upload.filename(), "poster.jpg");
        assert!(upload.read_bytes().await.is_err());
    }
}
