//! Purpose: Encode header and data records as RFC-4180 style CSV.
//! Exports: `CsvEncoder`, `NULL_TEXT`.
//! Role: Turns one row of nullable text into one complete, flushed CSV record.
//! Invariants: Each call yields a whole record terminated by `\n`; never a partial one.
//! Invariants: SQL NULL renders as the bare token `null`.
//! Notes: A text value `"null"` renders identically to NULL; CSV has no way to tell them apart.

use bytes::Bytes;

use crate::core::error::{Error, ErrorKind};

pub const NULL_TEXT: &str = "null";

pub struct CsvEncoder {
    builder: csv::WriterBuilder,
    width: Option<usize>,
}

impl CsvEncoder {
    pub fn new() -> Self {
        let mut builder = csv::WriterBuilder::new();
        builder
            .terminator(csv::Terminator::Any(b'\n'))
            .quote_style(csv::QuoteStyle::Necessary)
            .buffer_capacity(1024);
        Self {
            builder,
            width: None,
        }
    }

    pub fn encode_header(&mut self, columns: &[String]) -> Result<Bytes, Error> {
        self.encode(columns.len(), columns.iter().map(String::as_str))
    }

    pub fn encode_row(&mut self, values: &[Option<String>]) -> Result<Bytes, Error> {
        self.encode(
            values.len(),
            values.iter().map(|value| value.as_deref().unwrap_or(NULL_TEXT)),
        )
    }

    fn encode<'a>(
        &mut self,
        len: usize,
        fields: impl Iterator<Item = &'a str>,
    ) -> Result<Bytes, Error> {
        let width = *self.width.get_or_insert(len);
        if len != width {
            return Err(Error::new(ErrorKind::Row).with_message(format!(
                "record has {len} fields but the header has {width}"
            )));
        }
        let mut writer = self.builder.from_writer(Vec::new());
        writer.write_record(fields).map_err(|err| {
            Error::new(ErrorKind::Row)
                .with_message("failed to encode csv record")
                .with_source(err)
        })?;
        let record = writer.into_inner().map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to flush csv record")
                .with_source(err.into_error())
        })?;
        Ok(Bytes::from(record))
    }
}

impl Default for CsvEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{CsvEncoder, NULL_TEXT};
    use crate::core::error::ErrorKind;

    fn parse_single(bytes: &[u8]) -> Vec<String> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(bytes);
        let record = reader
            .records()
            .next()
            .expect("one record")
            .expect("valid csv");
        record.iter().map(str::to_string).collect()
    }

    #[test]
    fn header_and_rows_are_newline_terminated() {
        let mut encoder = CsvEncoder::new();
        let header = encoder
            .encode_header(&["id".to_string(), "name".to_string()])
            .expect("header");
        let row = encoder
            .encode_row(&[Some("1".to_string()), Some("Alice".to_string())])
            .expect("row");
        assert_eq!(&header[..], b"id,name\n");
        assert_eq!(&row[..], b"1,Alice\n");
    }

    #[test]
    fn null_renders_as_bare_token() {
        let mut encoder = CsvEncoder::new();
        let row = encoder
            .encode_row(&[Some("2".to_string()), None])
            .expect("row");
        assert_eq!(&row[..], b"2,null\n");
        assert_eq!(NULL_TEXT.len(), 4);
    }

    #[test]
    fn empty_string_differs_from_null() {
        let mut encoder = CsvEncoder::new();
        let row = encoder
            .encode_row(&[Some(String::new()), None])
            .expect("row");
        assert_eq!(&row[..], b",null\n");
    }

    #[test]
    fn literal_null_text_is_indistinguishable_from_null() {
        let mut encoder = CsvEncoder::new();
        let null_row = encoder.encode_row(&[None]).expect("row");
        let text_row = encoder.encode_row(&[Some("null".to_string())]).expect("row");
        assert_eq!(null_row, text_row);
    }

    #[test]
    fn special_characters_round_trip_through_a_csv_reader() {
        let tricky = "a,b \"quoted\"\nnext line".to_string();
        let mut encoder = CsvEncoder::new();
        let row = encoder
            .encode_row(&[Some(tricky.clone()), Some("plain".to_string())])
            .expect("row");
        assert_eq!(
            &row[..],
            b"\"a,b \"\"quoted\"\"\nnext line\",plain\n".as_slice()
        );
        assert_eq!(parse_single(&row), vec![tricky, "plain".to_string()]);
    }

    #[test]
    fn multibyte_text_is_preserved() {
        let mut encoder = CsvEncoder::new();
        let row = encoder
            .encode_row(&[Some("Zoë 🚀".to_string())])
            .expect("row");
        assert_eq!(parse_single(&row), vec!["Zoë 🚀".to_string()]);
    }

    #[test]
    fn field_count_must_match_the_header() {
        let mut encoder = CsvEncoder::new();
        encoder
            .encode_header(&["id".to_string(), "name".to_string()])
            .expect("header");
        let err = encoder
            .encode_row(&[Some("1".to_string())])
            .expect_err("expected unequal length error");
        assert_eq!(err.kind(), ErrorKind::Row);
    }
}
