//! Decoding of the gzip-compressed, tab-separated IMDb dataset files.
//!
//! Only the columns the index needs are kept; trailing columns are ignored
//! by position. `\N` marks an absent value.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::marker::PhantomData;
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::ImdbError;
use crate::merge::Keyed;

const NULL_FIELD: &str = "\\N";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    TitleBasics,
    TitleRatings,
}

impl Dataset {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Dataset::TitleBasics => "title.basics",
            Dataset::TitleRatings => "title.ratings",
        }
    }

    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Dataset::TitleBasics => "title.basics.tsv.gz",
            Dataset::TitleRatings => "title.ratings.tsv.gz",
        }
    }
}

/// A row of `title.basics`: `tconst, titleType, primaryTitle, originalTitle,
/// isAdult, startYear, ...`.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleRow {
    pub id: String,
    /// Raw `titleType`, mapped later so unknown kinds can be counted.
    pub title_type: String,
    pub primary_title: String,
    pub start_year: Option<i32>,
}

/// A row of `title.ratings`: `tconst, averageRating, numVotes`.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingRow {
    pub id: String,
    pub average_rating: f64,
}

impl Keyed for TitleRow {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for RatingRow {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Conversion from the tab-separated fields of one dataset line.
pub trait FromFields: Sized {
    const DATASET: Dataset;

    /// # Errors
    ///
    /// Returns a human-readable reason when the fields do not form a row.
    fn from_fields(fields: &[&str]) -> Result<Self, String>;
}

impl FromFields for TitleRow {
    const DATASET: Dataset = Dataset::TitleBasics;

    fn from_fields(fields: &[&str]) -> Result<Self, String> {
        if fields.len() < 6 {
            return Err(format!("expected at least 6 columns, found {}", fields.len()));
        }
        let start_year = match fields[5] {
            NULL_FIELD => None,
            raw => Some(
                raw.parse::<i32>()
                    .map_err(|e| format!("invalid startYear {raw:?}: {e}"))?,
            ),
        };
        Ok(TitleRow {
            id: fields[0].to_string(),
            title_type: fields[1].to_string(),
            primary_title: fields[2].to_string(),
            start_year,
        })
    }
}

impl FromFields for RatingRow {
    const DATASET: Dataset = Dataset::TitleRatings;

    fn from_fields(fields: &[&str]) -> Result<Self, String> {
        if fields.len() < 2 {
            return Err(format!("expected at least 2 columns, found {}", fields.len()));
        }
        let average_rating = fields[1]
            .parse::<f64>()
            .map_err(|e| format!("invalid averageRating {:?}: {e}", fields[1]))?;
        Ok(RatingRow {
            id: fields[0].to_string(),
            average_rating,
        })
    }
}

/// Iterator over the data rows of one dataset; the header line is skipped.
///
/// Yields `Err` on the first unreadable or undecodable line; the caller is
/// expected to stop there.
pub struct DatasetRows<R, T> {
    reader: R,
    line: u64,
    buf: String,
    _row: PhantomData<fn() -> T>,
}

impl<R: BufRead, T: FromFields> DatasetRows<R, T> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
            _row: PhantomData,
        }
    }

    fn decode_error(&self, reason: String) -> ImdbError {
        ImdbError::Decode {
            dataset: T::DATASET.name(),
            line: self.line,
            reason,
        }
    }
}

impl<R: BufRead, T: FromFields> Iterator for DatasetRows<R, T> {
    type Item = Result<T, ImdbError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(self.decode_error(e.to_string()))),
            }
            self.line += 1;

            let line = self.buf.trim_end_matches(['\n', '\r']);
            if self.line == 1 || line.is_empty() {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            return Some(T::from_fields(&fields).map_err(|reason| self.decode_error(reason)));
        }
    }
}

/// Opens a downloaded `.tsv.gz` dataset for row-by-row decoding.
///
/// # Errors
///
/// Returns [`ImdbError::Io`] if the file cannot be opened.
pub fn open_dataset<T: FromFields>(
    path: &Path,
) -> Result<DatasetRows<BufReader<MultiGzDecoder<File>>, T>, ImdbError> {
    let file = File::open(path).map_err(|e| ImdbError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(DatasetRows::new(BufReader::new(MultiGzDecoder::new(file))))
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use flate2::write::GzEncoder;
    use flate2::Compression;

    use super::*;

    const BASICS: &str = "tconst\ttitleType\tprimaryTitle\toriginalTitle\tisAdult\tstartYear\tendYear\truntimeMinutes\tgenres\n\
tt0078748\tmovie\tAlien\tAlien\t0\t1979\t\\N\t117\tHorror,Sci-Fi\n\
tt0106179\ttvSeries\tThe X-Files\tThe X-Files\t0\t1993\t2018\t45\tCrime,Drama\n\
tt9999999\tmovie\tUntitled\tUntitled\t0\t\\N\t\\N\t\\N\t\\N\n";

    fn rows<T: FromFields>(text: &str) -> Vec<Result<T, ImdbError>> {
        DatasetRows::<_, T>::new(Cursor::new(text.as_bytes().to_vec())).collect()
    }

    #[test]
    fn title_rows_skip_header_and_map_null_year() {
        let parsed: Vec<TitleRow> = rows::<TitleRow>(BASICS)
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].id, "tt0078748");
        assert_eq!(parsed[0].title_type, "movie");
        assert_eq!(parsed[0].primary_title, "Alien");
        assert_eq!(parsed[0].start_year, Some(1979));
        assert_eq!(parsed[2].start_year, None);
    }

    #[test]
    fn rating_rows_ignore_extra_columns() {
        let text = "tconst\taverageRating\tnumVotes\ntt0078748\t8.5\t950000\r\n";
        let parsed: Vec<RatingRow> = rows::<RatingRow>(text)
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            parsed,
            vec![RatingRow {
                id: "tt0078748".to_string(),
                average_rating: 8.5,
            }]
        );
    }

    #[test]
    fn short_row_reports_line_number() {
        let text = "tconst\taverageRating\tnumVotes\ntt1\t7.0\t10\ntt2\n";
        let results = rows::<RatingRow>(text);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(ImdbError::Decode { dataset: "title.ratings", line: 3, .. })
        ));
    }

    #[test]
    fn unparseable_rating_is_a_decode_error() {
        let text = "tconst\taverageRating\tnumVotes\ntt1\tgood\t10\n";
        let results = rows::<RatingRow>(text);
        assert!(matches!(results[0], Err(ImdbError::Decode { line: 2, .. })));
    }

    #[test]
    fn open_dataset_reads_gzip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("title.basics.tsv.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(BASICS.as_bytes()).unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let parsed: Vec<TitleRow> = open_dataset::<TitleRow>(&path)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[1].primary_title, "The X-Files");
    }

    #[test]
    fn corrupt_gzip_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("title.ratings.tsv.gz");
        std::fs::write(&path, b"definitely not gzip").unwrap();

        let first = open_dataset::<RatingRow>(&path).unwrap().next();
        assert!(matches!(first, Some(Err(ImdbError::Decode { .. }))));
    }

    #[test]
    fn open_missing_dataset_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = open_dataset::<TitleRow>(&dir.path().join("missing.tsv.gz"));
        assert!(matches!(result, Err(ImdbError::Io { .. })));
    }
}
