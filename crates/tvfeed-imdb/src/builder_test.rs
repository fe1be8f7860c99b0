use tvfeed_store::{MemoryStore, SqliteStore};

use super::*;

fn title(id: &str, kind: &str, name: &str, year: Option<i32>) -> Result<TitleRow, ImdbError> {
    Ok(TitleRow {
        id: id.to_string(),
        title_type: kind.to_string(),
        primary_title: name.to_string(),
        start_year: year,
    })
}

fn rating(id: &str, value: f64) -> Result<RatingRow, ImdbError> {
    Ok(RatingRow {
        id: id.to_string(),
        average_rating: value,
    })
}

fn entry(id: &str, rating: f64) -> RatingEntry {
    RatingEntry {
        source_id: id.to_string(),
        title_type: TitleType::Film,
        year: Some(1979),
        rating,
    }
}

async fn value(store: &MemoryStore, key: &str) -> Option<IndexValue> {
    get_json(store, key).await.unwrap()
}

#[test]
fn resolve_empty_key_takes_entry() {
    let incoming = entry("tt1", 7.1);
    assert_eq!(
        resolve(None, &incoming),
        Resolution::Write(IndexValue::Rated(incoming.clone()))
    );
}

#[test]
fn resolve_different_rating_tombstones() {
    let existing = IndexValue::Rated(entry("tt1", 7.1));
    assert_eq!(
        resolve(Some(existing), &entry("tt2", 8.4)),
        Resolution::Write(IndexValue::Tombstone)
    );
}

#[test]
fn resolve_equal_rating_keeps_first() {
    let existing = IndexValue::Rated(entry("tt1", 7.1));
    assert_eq!(resolve(Some(existing), &entry("tt2", 7.1)), Resolution::Keep);
}

#[test]
fn resolve_never_replaces_tombstone() {
    assert_eq!(
        resolve(Some(IndexValue::Tombstone), &entry("tt3", 9.0)),
        Resolution::Keep
    );
}

#[tokio::test]
async fn joined_film_gets_exact_and_yearless_keys() {
    let store = MemoryStore::new();
    let summary = build_index(
        vec![title("tt0078748", "movie", "Alien", Some(1979))],
        vec![rating("tt0078748", 8.5)],
        &store,
    )
    .await
    .unwrap();

    assert_eq!(summary.joined, 1);
    assert_eq!(summary.keys_written, 2);
    let expected = IndexValue::Rated(RatingEntry {
        source_id: "tt0078748".to_string(),
        title_type: TitleType::Film,
        year: Some(1979),
        rating: 8.5,
    });
    assert_eq!(value(&store, "alien|movie|1979").await, Some(expected.clone()));
    assert_eq!(value(&store, "alien|movie|").await, Some(expected));
}

#[tokio::test]
async fn unknown_year_writes_only_yearless_key() {
    let store = MemoryStore::new();
    build_index(
        vec![title("tt1", "tvSeries", "Mystery Show", None)],
        vec![rating("tt1", 6.0)],
        &store,
    )
    .await
    .unwrap();

    assert_eq!(store.len(), 1);
    assert!(value(&store, "mystery show|tvseries|").await.is_some());
}

#[tokio::test]
async fn unmatched_and_unindexed_rows_are_skipped() {
    let store = MemoryStore::new();
    let summary = build_index(
        vec![
            title("tt1", "movie", "No Rating", Some(2001)),
            title("tt2", "tvEpisode", "Pilot", Some(2002)),
            title("tt3", "tvMovie", "Made For TV", Some(2003)),
        ],
        vec![rating("tt2", 7.0), rating("tt3", 6.5), rating("tt4", 9.9)],
        &store,
    )
    .await
    .unwrap();

    assert_eq!(summary.joined, 2);
    assert_eq!(summary.skipped_types, 1);
    assert!(value(&store, "no rating|movie|").await.is_none());
    assert!(value(&store, "pilot|tvseries|").await.is_none());
    assert!(value(&store, "made for tv|movie|2003").await.is_some());
}

#[tokio::test]
async fn conflicting_ratings_tombstone_only_shared_keys() {
    let store = MemoryStore::new();
    let summary = build_index(
        vec![
            title("tt1", "movie", "Twin", Some(1990)),
            title("tt2", "movie", "Twin", Some(2000)),
        ],
        vec![rating("tt1", 7.1), rating("tt2", 8.4)],
        &store,
    )
    .await
    .unwrap();

    assert_eq!(summary.tombstones, 1);
    assert_eq!(value(&store, "twin|movie|").await, Some(IndexValue::Tombstone));
    assert!(matches!(
        value(&store, "twin|movie|1990").await,
        Some(IndexValue::Rated(RatingEntry { rating, .. })) if rating == 7.1
    ));
    assert!(matches!(
        value(&store, "twin|movie|2000").await,
        Some(IndexValue::Rated(RatingEntry { rating, .. })) if rating == 8.4
    ));
}

#[tokio::test]
async fn tombstone_survives_later_agreeing_rating() {
    let store = MemoryStore::new();
    build_index(
        vec![
            title("tt1", "movie", "Twin", None),
            title("tt2", "movie", "Twin", None),
            title("tt3", "movie", "Twin", None),
        ],
        vec![rating("tt1", 7.1), rating("tt2", 8.4), rating("tt3", 7.1)],
        &store,
    )
    .await
    .unwrap();

    assert_eq!(value(&store, "twin|movie|").await, Some(IndexValue::Tombstone));
}

#[tokio::test]
async fn equal_ratings_keep_first_source() {
    let store = MemoryStore::new();
    build_index(
        vec![
            title("tt1", "movie", "Same", None),
            title("tt2", "movie", "SAME", None),
        ],
        vec![rating("tt1", 6.6), rating("tt2", 6.6)],
        &store,
    )
    .await
    .unwrap();

    assert!(matches!(
        value(&store, "same|movie|").await,
        Some(IndexValue::Rated(RatingEntry { source_id, .. })) if source_id == "tt1"
    ));
}

#[tokio::test]
async fn film_and_series_with_same_title_do_not_collide() {
    let store = MemoryStore::new();
    let summary = build_index(
        vec![
            title("tt1", "movie", "Fargo", Some(1996)),
            title("tt2", "tvSeries", "Fargo", Some(2014)),
        ],
        vec![rating("tt1", 8.1), rating("tt2", 8.9)],
        &store,
    )
    .await
    .unwrap();

    assert_eq!(summary.tombstones, 0);
    assert_eq!(store.len(), 4);
}

#[tokio::test]
async fn decode_error_aborts_build() {
    let store = MemoryStore::new();
    let titles = vec![
        title("tt1", "movie", "Fine", Some(2000)),
        Err(ImdbError::Decode {
            dataset: "title.basics",
            line: 3,
            reason: "truncated".to_string(),
        }),
        title("tt3", "movie", "Never Seen", Some(2001)),
    ];
    let result = build_index(titles, vec![rating("tt1", 5.0), rating("tt3", 5.0)], &store).await;

    assert!(matches!(result, Err(ImdbError::Decode { line: 3, .. })));
}

#[tokio::test]
async fn conflicts_resolve_across_committed_batches() {
    let store = MemoryStore::new();
    let rows = stream::iter(merge_join(
        vec![
            title("tt1", "movie", "Twin", Some(1990)),
            title("tt2", "movie", "Other", Some(1995)),
            title("tt3", "movie", "Twin", Some(2000)),
            title("tt4", "movie", "Twin", None),
        ],
        vec![
            rating("tt1", 7.1),
            rating("tt2", 6.0),
            rating("tt3", 8.4),
            rating("tt4", 7.1),
        ],
    ));
    let summary = load_joined(rows, &store, 1).await.unwrap();

    assert_eq!(summary.joined, 4);
    assert_eq!(summary.tombstones, 1);
    assert_eq!(value(&store, "twin|movie|").await, Some(IndexValue::Tombstone));
    assert!(value(&store, "twin|movie|1990").await.is_some());
    assert!(value(&store, "other|movie|").await.is_some());
}

#[tokio::test]
async fn uncommitted_writes_are_seen_by_later_rows() {
    let store = MemoryStore::new();
    let rows = stream::iter(merge_join(
        vec![
            title("tt1", "movie", "Same", None),
            title("tt2", "movie", "Same", None),
        ],
        vec![rating("tt1", 6.6), rating("tt2", 5.0)],
    ));
    let summary = load_joined(rows, &store, usize::MAX).await.unwrap();

    assert_eq!(summary.tombstones, 1);
    assert_eq!(store.len(), 1);
    assert_eq!(value(&store, "same|movie|").await, Some(IndexValue::Tombstone));
}

fn write_gzip(path: &Path, text: &str) {
    use std::io::Write;

    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    std::fs::write(path, encoder.finish().unwrap()).unwrap();
}

#[tokio::test]
async fn build_from_files_decodes_on_blocking_reader() {
    let dir = tempfile::tempdir().unwrap();
    let titles = dir.path().join("title.basics.tsv.gz");
    let ratings = dir.path().join("title.ratings.tsv.gz");
    let index = dir.path().join("imdb.db");
    write_gzip(
        &titles,
        "tconst\ttitleType\tprimaryTitle\toriginalTitle\tisAdult\tstartYear\tendYear\truntimeMinutes\tgenres\n\
         tt0078748\tmovie\tAlien\tAlien\t0\t1979\t\\N\t117\tHorror\n\
         tt0106179\ttvSeries\tThe X-Files\tThe X-Files\t0\t1993\t2018\t45\tDrama\n",
    );
    write_gzip(
        &ratings,
        "tconst\taverageRating\tnumVotes\ntt0078748\t8.5\t950000\ntt0106179\t8.6\t250000\n",
    );

    let summary = build_from_files(&titles, &ratings, &index).await.unwrap();

    assert_eq!(summary.joined, 2);
    assert_eq!(summary.keys_written, 4);
    let published = SqliteStore::open_read_only(&index).await.unwrap();
    let alien: Option<IndexValue> = get_json(&published, "alien|movie|1979").await.unwrap();
    assert!(matches!(alien, Some(IndexValue::Rated(RatingEntry { rating, .. })) if rating == 8.5));
}

#[tokio::test]
async fn missing_dataset_file_fails_without_publishing() {
    let dir = tempfile::tempdir().unwrap();
    let ratings = dir.path().join("title.ratings.tsv.gz");
    let index = dir.path().join("imdb.db");
    write_gzip(&ratings, "tconst\taverageRating\tnumVotes\n");

    let result = build_from_files(&dir.path().join("absent.tsv.gz"), &ratings, &index).await;

    assert!(matches!(result, Err(ImdbError::Io { .. })));
    assert!(!index.exists());
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".staging"))
        .collect();
    assert!(leftovers.is_empty());
}
