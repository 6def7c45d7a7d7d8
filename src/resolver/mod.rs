//! Song/artist key resolution.
//!
//! A play event only carries the denormalized `(song title, artist name,
//! duration)` triple; the catalog owns the natural keys. Row-wise mode runs
//! one lookup per fact-row candidate; set-wise mode evaluates the same
//! condition as a join during the fact transform. Both render their
//! predicate through [`match_condition`] so the matching rule exists once.
//!
//! Duration is compared with exact floating-point equality, as inherited
//! from the source schema. Known fragility: a catalog value that differs in
//! the last bit will miss.

use crate::errors::EtlError;
use sqlx::postgres::Postgres;
use sqlx::Executor;

/// Render the catalog match condition. Each pair is (event-side expression,
/// catalog-side expression).
pub fn match_condition(
    (song, title): (&str, &str),
    (artist, name): (&str, &str),
    (length, duration): (&str, &str),
) -> String {
    format!("{song} = {title} AND {artist} = {name} AND {length} = {duration}")
}

/// Row-wise lookup statement, parameterized over the event triple.
pub fn song_select_sql() -> String {
    format!(
        "SELECT s.song_id, a.artist_id \
         FROM songs s JOIN artists a ON s.artist_id = a.artist_id \
         WHERE {} LIMIT 1",
        match_condition(("$1", "s.title"), ("$2", "a.name"), ("$3", "s.duration"))
    )
}

/// Look up the song/artist key pair for one play event.
///
/// `None` is a resolution miss, an expected outcome: the fact row still gets
/// inserted, with null foreign keys. Never mutates state.
pub async fn resolve<'e, E>(
    executor: E,
    title: &str,
    artist_name: &str,
    duration: f64,
) -> Result<Option<(String, String)>, EtlError>
where
    E: Executor<'e, Database = Postgres>,
{
    let pair = sqlx::query_as::<_, (String, String)>(&song_select_sql())
        .bind(title)
        .bind(artist_name)
        .bind(duration)
        .fetch_optional(executor)
        .await?;
    Ok(pair)
}
