//! Round-trip tests against a live Postgres instance.
//!
//! Run with a scratch database:
//!
//! ```text
//! TEST_DATABASE_URL=postgres://localhost/songplay_test cargo test -- --ignored
//! ```
//!
//! Every test recreates the schema, so the database contents do not survive.

use songplay_etl::loader::row_wise;
use songplay_etl::resolver;
use songplay_etl::schema;
use sqlx::PgPool;
use std::io::Write;
use std::path::PathBuf;

async fn fresh_pool() -> PgPool {
    let url = std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must point at a scratch Postgres database");
    let pool = PgPool::connect(&url).await.unwrap();
    schema::drop_all(&pool).await.unwrap();
    schema::create_all(&pool).await.unwrap();
    pool
}

fn write_fixture(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "{contents}").unwrap();
    path
}

const CATALOG_LINE: &str = r#"{"num_songs":1,"artist_id":"AROTHER1187B9AC123","artist_latitude":null,"artist_longitude":null,"artist_location":"","artist_name":"A","song_id":"SOSOMETHING12AB018","title":"T","duration":210.5,"year":2001}"#;

fn play_line(song: &str, artist: &str, length: f64, ts: i64, user_id: u32) -> String {
    format!(
        r#"{{"artist":"{artist}","auth":"Logged In","firstName":"Lily","gender":"F","itemInSession":0,"lastName":"Koch","length":{length},"level":"paid","location":"Chicago, IL","method":"PUT","page":"NextSong","registration":1541048010796.0,"sessionId":818,"song":"{song}","status":200,"ts":{ts},"userAgent":"Mozilla/5.0","userId":"{user_id}"}}"#
    )
}

#[tokio::test]
#[ignore]
async fn create_all_twice_is_idempotent() {
    let pool = fresh_pool().await;
    schema::create_all(&pool).await.unwrap();
    schema::create_all(&pool).await.unwrap();

    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.tables \
         WHERE table_schema = 'public' AND table_name = 'songplays'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(tables, 1);
}

#[tokio::test]
#[ignore]
async fn resolution_hit_carries_catalog_keys() {
    let pool = fresh_pool().await;
    let dir = tempfile::tempdir().unwrap();

    let catalog = write_fixture(&dir, "catalog.json", CATALOG_LINE);
    row_wise::process_song_file(&pool, &catalog).await.unwrap();

    let resolved = resolver::resolve(&pool, "T", "A", 210.5).await.unwrap();
    assert_eq!(
        resolved,
        Some(("SOSOMETHING12AB018".to_string(), "AROTHER1187B9AC123".to_string()))
    );

    let log = write_fixture(&dir, "log.json", &play_line("T", "A", 210.5, 1541440009796, 15));
    let loaded = row_wise::process_log_file(&pool, &log).await.unwrap();
    assert_eq!(loaded, 1);

    let (song_id, artist_id): (Option<String>, Option<String>) =
        sqlx::query_as("SELECT song_id, artist_id FROM songplays")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(song_id.as_deref(), Some("SOSOMETHING12AB018"));
    assert_eq!(artist_id.as_deref(), Some("AROTHER1187B9AC123"));
}

#[tokio::test]
#[ignore]
async fn resolution_miss_still_inserts_the_fact_row() {
    let pool = fresh_pool().await;
    let dir = tempfile::tempdir().unwrap();

    let log = write_fixture(
        &dir,
        "log.json",
        &play_line("Unknown Song", "Unknown Artist", 99.9, 1541440009796, 15),
    );
    let loaded = row_wise::process_log_file(&pool, &log).await.unwrap();
    assert_eq!(loaded, 1);

    let (song_id, artist_id): (Option<String>, Option<String>) =
        sqlx::query_as("SELECT song_id, artist_id FROM songplays")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(song_id, None);
    assert_eq!(artist_id, None);
}

#[tokio::test]
#[ignore]
async fn repeated_users_collapse_to_one_row_with_last_seen_level() {
    let pool = fresh_pool().await;
    let dir = tempfile::tempdir().unwrap();

    let free = play_line("S1", "X", 1.0, 1541440009796, 15).replace("\"paid\"", "\"free\"");
    let paid = play_line("S2", "X", 2.0, 1541449000000, 15);
    let log = write_fixture(&dir, "log.json", &format!("{free}\n{paid}"));
    row_wise::process_log_file(&pool, &log).await.unwrap();

    let (count, level): (i64, String) =
        sqlx::query_as("SELECT COUNT(*), MAX(level) FROM users WHERE user_id = 15")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 1);
    assert_eq!(level, "paid");
}

#[tokio::test]
#[ignore]
async fn duplicate_catalog_files_do_not_duplicate_dimensions() {
    let pool = fresh_pool().await;
    let dir = tempfile::tempdir().unwrap();

    let catalog = write_fixture(&dir, "catalog.json", CATALOG_LINE);
    row_wise::process_song_file(&pool, &catalog).await.unwrap();
    row_wise::process_song_file(&pool, &catalog).await.unwrap();

    let songs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM songs")
        .fetch_one(&pool)
        .await
        .unwrap();
    let artists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM artists")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(songs, 1);
    assert_eq!(artists, 1);
}

#[tokio::test]
#[ignore]
async fn time_rows_match_the_client_side_derivation() {
    let pool = fresh_pool().await;
    let dir = tempfile::tempdir().unwrap();

    let log = write_fixture(&dir, "log.json", &play_line("S", "X", 1.0, 1541440009796, 15));
    row_wise::process_log_file(&pool, &log).await.unwrap();

    let (hour, day, week, month, year, weekday): (i32, i32, i32, i32, i32, i32) = sqlx::query_as(
        "SELECT hour, day, week, month, year, weekday FROM time",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    // 2018-11-05T17:46:49.796Z, a Monday in ISO week 45.
    assert_eq!((hour, day, week, month, year, weekday), (17, 5, 45, 11, 2018, 0));
}
