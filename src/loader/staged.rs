//! Set-wise loader: bulk copy into staging, then in-engine transforms.
//!
//! `stage_all` recreates the two staging tables and issues one engine-side
//! COPY per file category, all-or-nothing per category. `transform_all` then
//! runs one INSERT-SELECT per target table in explicit dependency order,
//! each committed independently. Dimension statements deduplicate with
//! DISTINCT and land through conflict clauses, so a rerun after a failed
//! stage cannot duplicate dimension rows.

use crate::config::BulkConfig;
use crate::errors::EtlError;
use crate::mapper::SONG_PLAYED_PAGE;
use crate::resolver;
use crate::schema;
use sqlx::PgPool;
use tracing::info;

/// An engine-side bulk copy statement. Built from an explicitly passed
/// [`BulkConfig`]; COPY targets cannot be parameterized, so every spliced
/// value goes through [`quote_literal`].
pub struct CopyStatement {
    table: &'static str,
    location: String,
    iam_role: String,
    region: String,
    /// Field-mapping side channel; `None` means the engine auto-maps JSON
    /// keys to column names.
    jsonpath: Option<String>,
}

impl CopyStatement {
    pub fn for_events(bulk: &BulkConfig) -> Self {
        Self {
            table: "staging_events",
            location: bulk.log_data.clone(),
            iam_role: bulk.iam_role.clone(),
            region: bulk.region.clone(),
            jsonpath: bulk.log_jsonpath.clone(),
        }
    }

    pub fn for_songs(bulk: &BulkConfig) -> Self {
        Self {
            table: "staging_songs",
            location: bulk.song_data.clone(),
            iam_role: bulk.iam_role.clone(),
            region: bulk.region.clone(),
            jsonpath: None,
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn build(&self) -> String {
        let json_format = match &self.jsonpath {
            Some(path) => quote_literal(path),
            None => quote_literal("auto"),
        };
        format!(
            "COPY {} FROM {} IAM_ROLE {} FORMAT AS JSON {} REGION {}",
            self.table,
            quote_literal(&self.location),
            quote_literal(&self.iam_role),
            json_format,
            quote_literal(&self.region),
        )
    }
}

/// Quote a string as a SQL literal, doubling embedded quotes.
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// One in-engine transform statement targeting a single table.
pub struct Transform {
    pub table: &'static str,
    pub sql: String,
}

/// The five transforms in dependency order: dimensions first, fact last.
///
/// The fact statement uses a LEFT JOIN against the song staging table so a
/// resolution miss still produces a fact row with null keys, matching the
/// row-wise strategy. The catalog side is collapsed to one row per
/// (title, artist_name, duration) triple first, so a duplicated catalog
/// entry cannot fan one event out into several fact rows; row-wise gets the
/// same guarantee from its LIMIT 1 lookup. Calendar parts are extracted in
/// UTC regardless of the
/// session timezone, and weekday/week follow the row-wise convention
/// (Monday=0, ISO week).
pub fn transforms() -> Vec<Transform> {
    let user_filter = format!(
        "page = {} AND NULLIF(userid, '') IS NOT NULL",
        quote_literal(SONG_PLAYED_PAGE)
    );

    let users = Transform {
        table: "users",
        sql: format!(
            "INSERT INTO users (user_id, first_name, last_name, gender, level) \
             SELECT DISTINCT ON (userid) \
                 NULLIF(userid, '')::int, firstname, lastname, gender, level \
             FROM staging_events \
             WHERE {user_filter} \
             ORDER BY userid, ts DESC \
             ON CONFLICT (user_id) DO UPDATE SET \
                 first_name = EXCLUDED.first_name, \
                 last_name = EXCLUDED.last_name, \
                 gender = EXCLUDED.gender, \
                 level = EXCLUDED.level"
        ),
    };

    let songs = Transform {
        table: "songs",
        sql: "INSERT INTO songs (song_id, title, artist_id, year, duration) \
              SELECT DISTINCT ON (song_id) song_id, title, artist_id, year, duration \
              FROM staging_songs \
              WHERE song_id IS NOT NULL \
              ORDER BY song_id \
              ON CONFLICT (song_id) DO NOTHING"
            .to_string(),
    };

    let artists = Transform {
        table: "artists",
        sql: "INSERT INTO artists (artist_id, name, location, latitude, longitude) \
              SELECT DISTINCT ON (artist_id) \
                  artist_id, artist_name, artist_location, artist_latitude, artist_longitude \
              FROM staging_songs \
              WHERE artist_id IS NOT NULL \
              ORDER BY artist_id \
              ON CONFLICT (artist_id) DO NOTHING"
            .to_string(),
    };

    let time = Transform {
        table: "time",
        sql: format!(
            "INSERT INTO time (start_time, hour, day, week, month, year, weekday) \
             SELECT start_time, \
                 EXTRACT(HOUR FROM start_time AT TIME ZONE 'UTC')::int, \
                 EXTRACT(DAY FROM start_time AT TIME ZONE 'UTC')::int, \
                 EXTRACT(WEEK FROM start_time AT TIME ZONE 'UTC')::int, \
                 EXTRACT(MONTH FROM start_time AT TIME ZONE 'UTC')::int, \
                 EXTRACT(YEAR FROM start_time AT TIME ZONE 'UTC')::int, \
                 EXTRACT(ISODOW FROM start_time AT TIME ZONE 'UTC')::int - 1 \
             FROM (SELECT DISTINCT to_timestamp(ts / 1000.0) AS start_time \
                   FROM staging_events \
                   WHERE {user_filter} AND ts IS NOT NULL) stamps \
             ON CONFLICT (start_time) DO NOTHING"
        ),
    };

    let songplays = Transform {
        table: "songplays",
        sql: format!(
            "INSERT INTO songplays \
                 (start_time, user_id, level, song_id, artist_id, \
                  session_id, location, user_agent) \
             SELECT DISTINCT \
                 to_timestamp(se.ts / 1000.0), \
                 NULLIF(se.userid, '')::int, \
                 se.level, \
                 ss.song_id, \
                 ss.artist_id, \
                 se.sessionid, \
                 se.location, \
                 se.useragent \
             FROM staging_events se \
             LEFT JOIN (SELECT DISTINCT ON (title, artist_name, duration) \
                            title, artist_name, duration, song_id, artist_id \
                        FROM staging_songs \
                        ORDER BY title, artist_name, duration, song_id) ss \
                 ON {join} \
             WHERE se.page = {page} AND NULLIF(se.userid, '') IS NOT NULL",
            join = resolver::match_condition(
                ("se.song", "ss.title"),
                ("se.artist", "ss.artist_name"),
                ("se.length", "ss.duration"),
            ),
            page = quote_literal(SONG_PLAYED_PAGE)
        ),
    };

    vec![users, songs, artists, time, songplays]
}

/// Recreate the staging tables and bulk-copy both file categories into them.
/// A copy failure is fatal to the run: the transforms depend on staging.
pub async fn stage_all(pool: &PgPool, bulk: &BulkConfig) -> Result<(), EtlError> {
    for statement in [CopyStatement::for_events(bulk), CopyStatement::for_songs(bulk)] {
        let table = statement.table();
        let def = schema::table(table)
            .ok_or_else(|| EtlError::configuration(format!("unknown staging table {table}")))?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(pool)
            .await?;
        sqlx::query(def.create).execute(pool).await?;

        info!("Bulk copying into {}", table);
        sqlx::query(&statement.build())
            .execute(pool)
            .await
            .map_err(|e| EtlError::bulk_copy(table, e))?;
        info!("Bulk copy into {} complete", table);
    }
    Ok(())
}

/// Run the transforms in order, committing each independently. A failure
/// stops the run but leaves earlier transforms committed; rerunning after a
/// fix is safe because the statements deduplicate on the natural keys.
pub async fn transform_all(pool: &PgPool) -> Result<(), EtlError> {
    for transform in transforms() {
        info!("Transforming staging data into {}", transform.table);
        let result = sqlx::query(&transform.sql).execute(pool).await?;
        info!(
            "Populated {} ({} rows affected)",
            transform.table,
            result.rows_affected()
        );
    }
    Ok(())
}
