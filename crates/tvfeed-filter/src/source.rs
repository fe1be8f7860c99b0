//! Newline-delimited JSON programme input.

use futures::Stream;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tvfeed_core::ProgrammeRecord;

use crate::error::FilterError;

/// Streams one [`ProgrammeRecord`] per JSON line of `reader`.
///
/// Blank lines are ignored. Lines that do not decode, including lines that
/// are not valid UTF-8, are logged and skipped; only read failures end the
/// stream with an error.
pub fn json_lines<R>(reader: R) -> impl Stream<Item = Result<ProgrammeRecord, FilterError>> + Unpin
where
    R: AsyncBufRead + Unpin,
{
    let lines = JsonLines {
        reader,
        line_no: 0,
        buf: Vec::new(),
    };
    Box::pin(futures::stream::try_unfold(lines, |mut lines| async move {
        let next = lines.next_record().await;
        next.map(|record| record.map(|r| (r, lines)))
    }))
}

struct JsonLines<R> {
    reader: R,
    line_no: u64,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> JsonLines<R> {
    async fn next_record(&mut self) -> Result<Option<ProgrammeRecord>, FilterError> {
        loop {
            self.buf.clear();
            if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = self.buf.trim_ascii();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_slice(line) {
                Ok(record) => return Ok(Some(record)),
                Err(e) => {
                    tracing::warn!(line = self.line_no, error = %e, "skipping malformed programme");
                }
            }
        }
    }
}
