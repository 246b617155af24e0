use serde::{Deserialize, Deserializer, Serialize};

/// Body of `GET random[/<selection>]`.
///
/// `data` stays optional on the wire: a response without it is malformed and
/// the player has to notice rather than fail to parse.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RandomResponse {
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub data: Option<Vec<TrackRecord>>,
}

impl RandomResponse {
    pub fn ok(data: Vec<TrackRecord>) -> Self {
        Self {
            status: 200,
            message: "OK".to_string(),
            count: data.len(),
            data: Some(data),
        }
    }
}

/// One picked file as the server describes it.  Every field defaults to an
/// empty string, missing or `null`, so a sparse record still parses.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TrackRecord {
    /// Opaque play id; the stream lives at `stream/<path>`.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub path: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub ext: String,
    #[serde(default, alias = "file_name", deserialize_with = "null_as_empty")]
    pub file: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub artist: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub album: String,
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

/// Metadata for the track being played, as the view shows it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackMetadata {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    pub file: Option<String>,
    pub path: String,
    pub extension: String,
}

impl TrackMetadata {
    /// Convert a wire record.  Returns `None` when there is nothing to stream.
    pub fn from_record(record: TrackRecord) -> Option<Self> {
        let path = record.path.trim().to_string();
        if path.is_empty() {
            return None;
        }

        let file = non_empty(record.file);
        let extension = match non_empty(record.ext) {
            Some(ext) => ext.trim_start_matches('.').to_ascii_lowercase(),
            None => file
                .as_deref()
                .and_then(|f| std::path::Path::new(f).extension())
                .map(|e| e.to_string_lossy().to_ascii_lowercase())
                .unwrap_or_default(),
        };

        Some(Self {
            artist: non_empty(record.artist),
            title: non_empty(record.title),
            album: non_empty(record.album),
            file,
            path,
            extension,
        })
    }

    /// The fields that are present, in display order, as `(label, value)`.
    pub fn display_fields(&self) -> Vec<(&'static str, &str)> {
        let mut out = Vec::new();
        if let Some(f) = self.file.as_deref() {
            out.push(("File", f));
        }
        if let Some(t) = self.title.as_deref() {
            out.push(("Title", t));
        }
        if let Some(a) = self.artist.as_deref() {
            out.push(("Artist", a));
        }
        if let Some(a) = self.album.as_deref() {
            out.push(("Album", a));
        }
        out
    }

    /// One-line summary used by the marquee: `artist — title — album — file`.
    pub fn ticker_text(&self) -> String {
        [&self.artist, &self.title, &self.album, &self.file]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .collect::<Vec<_>>()
            .join(" — ")
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Playback state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle, // nothing requested yet, or the last fetch chain gave up
    Loading,
    Playing,
    Stopped, // explicit stop
    Errored, // playback failed after the unlock retry
}

impl PlaybackState {
    /// Idle, Stopped and Errored all mean "nothing running, waiting for the user".
    pub fn is_resting(self) -> bool {
        matches!(
            self,
            PlaybackState::Idle | PlaybackState::Stopped | PlaybackState::Errored
        )
    }

    /// Short label for the header badge.
    pub fn badge_label(self) -> &'static str {
        match self {
            PlaybackState::Idle => "IDLE",
            PlaybackState::Loading => "LOAD",
            PlaybackState::Playing => "LIVE",
            PlaybackState::Stopped => "STOP",
            PlaybackState::Errored => "ERR",
        }
    }
}
