//! Purpose: Stream a result cursor into a byte sink as CSV, one whole record at a time.
//! Exports: `ByteSink`, `StreamSummary`, `stream_csv`.
//! Role: Core of the query pipeline; sits between a driver cursor and the HTTP body.
//! Invariants: The header is written exactly once, before any data row.
//! Invariants: At most one encoded row is held here; backpressure comes from the sink.
//! Invariants: A row failure stops the stream; rows already sent are not retracted.

use std::future::Future;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::core::csv::CsvEncoder;
use crate::core::cursor::ResultCursor;
use crate::core::error::{Error, ErrorKind};

pub trait ByteSink: Send {
    fn send(&mut self, chunk: Bytes) -> impl Future<Output = Result<(), Error>> + Send;
}

impl ByteSink for mpsc::Sender<Result<Bytes, Error>> {
    fn send(&mut self, chunk: Bytes) -> impl Future<Output = Result<(), Error>> + Send {
        async move {
            mpsc::Sender::send(self, Ok(chunk)).await.map_err(|_| {
                Error::new(ErrorKind::Io).with_message("client disconnected before the stream ended")
            })
        }
    }
}

impl ByteSink for Vec<u8> {
    fn send(&mut self, chunk: Bytes) -> impl Future<Output = Result<(), Error>> + Send {
        self.extend_from_slice(&chunk);
        std::future::ready(Ok(()))
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StreamSummary {
    pub columns: usize,
    pub rows: u64,
}

pub async fn stream_csv<C, S>(cursor: &mut C, sink: &mut S) -> Result<StreamSummary, Error>
where
    C: ResultCursor,
    S: ByteSink,
{
    let columns = cursor.columns()?;
    let mut encoder = CsvEncoder::new();
    sink.send(encoder.encode_header(&columns)?).await?;

    let mut rows = 0u64;
    loop {
        let values = match cursor.next_row().await {
            Ok(Some(values)) => values,
            Ok(None) => break,
            Err(err) => return Err(err.with_row(rows + 1)),
        };
        rows += 1;
        let record = encoder
            .encode_row(&values)
            .map_err(|err| err.with_row(rows))?;
        sink.send(record).await?;
    }

    Ok(StreamSummary {
        columns: columns.len(),
        rows,
    })
}
