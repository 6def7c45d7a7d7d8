use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;

/// One line of a song catalog file, as shipped by the file source.
#[derive(Debug, Clone, Deserialize)]
pub struct SongRecord {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub artist_name: String,
    pub artist_location: Option<String>,
    pub artist_latitude: Option<f64>,
    pub artist_longitude: Option<f64>,
    pub year: i32,
    pub duration: f64,
    pub num_songs: Option<i32>,
}

/// One line of a session log file. Field names follow the raw feed.
///
/// `userId` arrives as either a JSON number or a numeric string (empty for
/// anonymous sessions), so it gets a lenient deserializer.
#[derive(Debug, Clone, Deserialize)]
pub struct LogEvent {
    pub artist: Option<String>,
    pub song: Option<String>,
    pub length: Option<f64>,
    pub page: String,
    pub ts: i64,
    #[serde(rename = "userId", default, deserialize_with = "lenient_user_id")]
    pub user_id: Option<i32>,
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: String,
    #[serde(rename = "sessionId")]
    pub session_id: i64,
    pub location: Option<String>,
    #[serde(rename = "userAgent")]
    pub user_agent: Option<String>,
}

fn lenient_user_id<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i32),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Raw::Text(s)) => s
            .trim()
            .parse::<i32>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// One row of the `songs` dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Song {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub year: i32,
    pub duration: f64,
}

/// One row of the `artists` dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Artist {
    pub artist_id: String,
    pub name: String,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// One row of the `users` dimension. `level` is "free" or "paid"; the most
/// recently observed value wins on re-insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: String,
}

/// One row of the `time` dimension, keyed by the timestamp it was derived
/// from. All calendar parts use UTC; `weekday` is Monday=0 and `week` is the
/// ISO week number, matching what the set-wise SQL extracts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TimeRow {
    pub start_time: DateTime<Utc>,
    pub hour: i32,
    pub day: i32,
    pub week: i32,
    pub month: i32,
    pub year: i32,
    pub weekday: i32,
}

impl TimeRow {
    pub fn from_timestamp(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            hour: start_time.hour() as i32,
            day: start_time.day() as i32,
            week: start_time.iso_week().week() as i32,
            month: start_time.month() as i32,
            year: start_time.year(),
            weekday: start_time.weekday().num_days_from_monday() as i32,
        }
    }
}

/// One row of the `songplays` fact table. The surrogate key is generated by
/// the engine; `song_id`/`artist_id` stay null when the catalog has no match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SongPlay {
    pub start_time: DateTime<Utc>,
    pub user_id: i32,
    pub level: String,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: i64,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

/// A qualifying play event after mapping: the decoded timestamp, the user
/// projection, and the denormalized triple the resolver matches against.
#[derive(Debug, Clone)]
pub struct PlayRecord {
    pub start_time: DateTime<Utc>,
    pub user: User,
    pub song: Option<String>,
    pub artist: Option<String>,
    pub length: Option<f64>,
    pub session_id: i64,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

impl PlayRecord {
    pub fn time_row(&self) -> TimeRow {
        TimeRow::from_timestamp(self.start_time)
    }

    pub fn songplay(&self, song_id: Option<String>, artist_id: Option<String>) -> SongPlay {
        SongPlay {
            start_time: self.start_time,
            user_id: self.user.user_id,
            level: self.user.level.clone(),
            song_id,
            artist_id,
            session_id: self.session_id,
            location: self.location.clone(),
            user_agent: self.user_agent.clone(),
        }
    }
}
