//! Warehouse schema registry.
//!
//! Single source of truth for every table the pipeline touches: the two
//! staging tables, the four dimensions and the fact table. DDL is idempotent
//! (`IF NOT EXISTS` / `IF EXISTS`) and issued in an explicit dependency
//! order, fact table last, so the ordering is not an implied call sequence.

use crate::errors::EtlError;
use sqlx::PgPool;
use tracing::debug;

pub struct TableDef {
    pub name: &'static str,
    pub create: &'static str,
}

/// Untyped landing table mirroring the raw event file shape. `userid` stays
/// text because the feed emits it as a string, empty for anonymous sessions;
/// the transform casts it.
const STAGING_EVENTS: TableDef = TableDef {
    name: "staging_events",
    create: r#"
        CREATE TABLE IF NOT EXISTS staging_events (
            artist          varchar,
            auth            varchar,
            firstname       varchar,
            gender          varchar,
            iteminsession   int,
            lastname        varchar,
            length          double precision,
            level           varchar,
            location        varchar,
            method          varchar,
            page            varchar,
            registration    double precision,
            sessionid       bigint,
            song            varchar,
            status          int,
            ts              bigint,
            useragent       varchar,
            userid          varchar
        )
    "#,
};

const STAGING_SONGS: TableDef = TableDef {
    name: "staging_songs",
    create: r#"
        CREATE TABLE IF NOT EXISTS staging_songs (
            num_songs           int,
            artist_id           varchar,
            artist_latitude     double precision,
            artist_longitude    double precision,
            artist_location     varchar,
            artist_name         varchar,
            song_id             varchar,
            title               varchar,
            duration            double precision,
            year                int
        )
    "#,
};

const USERS: TableDef = TableDef {
    name: "users",
    create: r#"
        CREATE TABLE IF NOT EXISTS users (
            user_id     int PRIMARY KEY,
            first_name  varchar,
            last_name   varchar,
            gender      varchar,
            level       varchar
        )
    "#,
};

const SONGS: TableDef = TableDef {
    name: "songs",
    create: r#"
        CREATE TABLE IF NOT EXISTS songs (
            song_id     varchar PRIMARY KEY,
            title       varchar NOT NULL,
            artist_id   varchar,
            year        int,
            duration    double precision
        )
    "#,
};

const ARTISTS: TableDef = TableDef {
    name: "artists",
    create: r#"
        CREATE TABLE IF NOT EXISTS artists (
            artist_id   varchar PRIMARY KEY,
            name        varchar NOT NULL,
            location    varchar,
            latitude    double precision,
            longitude   double precision
        )
    "#,
};

const TIME: TableDef = TableDef {
    name: "time",
    create: r#"
        CREATE TABLE IF NOT EXISTS time (
            start_time  timestamptz PRIMARY KEY,
            hour        int,
            day         int,
            week        int,
            month       int,
            year        int,
            weekday     int
        )
    "#,
};

/// Foreign keys are informational, not constraints: a songplay may carry
/// null song_id/artist_id when the catalog had no match.
const SONGPLAYS: TableDef = TableDef {
    name: "songplays",
    create: r#"
        CREATE TABLE IF NOT EXISTS songplays (
            songplay_id bigserial PRIMARY KEY,
            start_time  timestamptz NOT NULL,
            user_id     int NOT NULL,
            level       varchar,
            song_id     varchar,
            artist_id   varchar,
            session_id  bigint,
            location    varchar,
            user_agent  varchar
        )
    "#,
};

/// Creation order: staging and dimensions before the fact table.
pub const CREATE_ORDER: &[TableDef] = &[
    STAGING_EVENTS,
    STAGING_SONGS,
    USERS,
    SONGS,
    ARTISTS,
    TIME,
    SONGPLAYS,
];

/// Look up a registered table by name.
pub fn table(name: &str) -> Option<&'static TableDef> {
    CREATE_ORDER.iter().find(|t| t.name == name)
}

/// Issue `CREATE TABLE IF NOT EXISTS` for every table. Safe to call twice.
pub async fn create_all(pool: &PgPool) -> Result<(), EtlError> {
    for table in CREATE_ORDER {
        debug!("Creating table {} if absent", table.name);
        sqlx::query(table.create).execute(pool).await?;
    }
    Ok(())
}

/// Issue `DROP TABLE IF EXISTS` in reverse dependency order.
pub async fn drop_all(pool: &PgPool) -> Result<(), EtlError> {
    for table in CREATE_ORDER.iter().rev() {
        debug!("Dropping table {} if present", table.name);
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table.name))
            .execute(pool)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fact_table_is_created_last() {
        assert_eq!(CREATE_ORDER.last().unwrap().name, "songplays");
    }

    #[test]
    fn staging_tables_come_before_dimensions() {
        let position = |name: &str| {
            CREATE_ORDER
                .iter()
                .position(|t| t.name == name)
                .unwrap_or_else(|| panic!("table {name} not registered"))
        };
        assert!(position("staging_events") < position("users"));
        assert!(position("staging_songs") < position("songs"));
    }

    #[test]
    fn all_ddl_is_idempotent() {
        for table in CREATE_ORDER {
            assert!(
                table.create.contains("IF NOT EXISTS"),
                "{} create statement is not idempotent",
                table.name
            );
        }
    }

    #[test]
    fn registry_covers_the_seven_tables() {
        let names: Vec<_> = CREATE_ORDER.iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            [
                "staging_events",
                "staging_songs",
                "users",
                "songs",
                "artists",
                "time",
                "songplays"
            ]
        );
    }
}
