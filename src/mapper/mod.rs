//! Record mapping rules, shared by both load strategies.
//!
//! Everything here is pure: one catalog line becomes one (song, artist)
//! candidate pair, one log line becomes at most one qualifying play record.
//! Calendar parts are derived in UTC; the set-wise SQL in
//! [`crate::loader::staged`] extracts the same parts so the two strategies
//! agree on every derived value.

use crate::errors::EtlError;
use crate::models::{Artist, LogEvent, PlayRecord, Song, SongRecord, User};
use chrono::{DateTime, TimeZone, Utc};

/// The page action that marks a listening event. Every other page type is
/// dropped before it can reach the fact table.
pub const SONG_PLAYED_PAGE: &str = "NextSong";

/// Map one catalog line into its song and artist dimension candidates.
///
/// Fails with [`EtlError::MalformedRecord`] when required fields are absent
/// or mistyped.
pub fn map_song_record(line: &str) -> Result<(Song, Artist), EtlError> {
    let record: SongRecord =
        serde_json::from_str(line).map_err(|e| EtlError::malformed(e.to_string()))?;

    let song = Song {
        song_id: record.song_id,
        title: record.title,
        artist_id: record.artist_id.clone(),
        year: record.year,
        duration: record.duration,
    };
    let artist = Artist {
        artist_id: record.artist_id,
        name: record.artist_name,
        location: record.artist_location,
        latitude: record.artist_latitude,
        longitude: record.artist_longitude,
    };
    Ok((song, artist))
}

/// Map one log line into a qualifying play record.
///
/// Returns `Ok(None)` for events whose page is not the song-played action;
/// those never produce fact rows. Qualifying events must carry a user id and
/// a decodable epoch-millisecond timestamp.
pub fn map_log_line(line: &str) -> Result<Option<PlayRecord>, EtlError> {
    // Filter on page before demanding any other field: a dropped record may
    // legitimately lack fields that are never projected.
    let value: serde_json::Value =
        serde_json::from_str(line).map_err(|e| EtlError::malformed(e.to_string()))?;
    if value.get("page").and_then(|p| p.as_str()) != Some(SONG_PLAYED_PAGE) {
        return Ok(None);
    }

    let event: LogEvent =
        serde_json::from_value(value).map_err(|e| EtlError::malformed(e.to_string()))?;

    let start_time = decode_millis(event.ts)?;
    let user_id = event
        .user_id
        .ok_or_else(|| EtlError::malformed(format!("play event at ts={} has no userId", event.ts)))?;

    Ok(Some(PlayRecord {
        start_time,
        user: User {
            user_id,
            first_name: event.first_name,
            last_name: event.last_name,
            gender: event.gender,
            level: event.level,
        },
        song: event.song,
        artist: event.artist,
        length: event.length,
        session_id: event.session_id,
        location: event.location,
        user_agent: event.user_agent,
    }))
}

/// Lazily map an iterator of log lines, dropping non-qualifying events.
/// Derived fresh per file; not restartable.
pub fn play_records<I>(lines: I) -> impl Iterator<Item = Result<PlayRecord, EtlError>>
where
    I: Iterator<Item = String>,
{
    lines.filter_map(|line| map_log_line(&line).transpose())
}

fn decode_millis(ts: i64) -> Result<DateTime<Utc>, EtlError> {
    Utc.timestamp_millis_opt(ts)
        .single()
        .ok_or_else(|| EtlError::malformed(format!("timestamp {ts} is out of range")))
}
