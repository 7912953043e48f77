//! `id;name` CSV import and export
//!
//! Exports start with a UTF-8 BOM so spreadsheet tools pick the right
//! encoding. Imports tolerate that BOM, junk rows above the header, and
//! short or empty rows.

use csv::{ByteRecord, ReaderBuilder, Trim, WriterBuilder};

use super::User;
use crate::error::AppError;

pub const BOM: &[u8] = b"\xEF\xBB\xBF";
pub const DELIMITER: u8 = b';';

fn is_header(record: &ByteRecord) -> bool {
    matches!(record.get(0), Some(b"id" | b"ID")) && matches!(record.get(1), Some(b"name" | b"Name"))
}

/// Parse an uploaded CSV into users
///
/// Rows up to and including an `id;name` header are skipped. Without a
/// header every row is treated as data. Rows with fewer than two columns,
/// an empty field, or a non-numeric id are ignored.
pub fn parse_users(data: &[u8]) -> Result<Vec<User>, AppError> {
    let data = data.strip_prefix(BOM).unwrap_or(data);
    let mut reader = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(data);

    let records = reader
        .byte_records()
        .collect::<Result<Vec<ByteRecord>, _>>()?;
    if records.is_empty() {
        return Err(AppError::validation("CSV file is empty"));
    }

    let start = records.iter().position(is_header).map_or(0, |i| i + 1);

    let mut users = Vec::new();
    for (i, record) in records.iter().enumerate().skip(start) {
        let (Some(id), Some(name)) = (record.get(0), record.get(1)) else {
            continue;
        };
        if id.is_empty() || name.is_empty() {
            continue;
        }
        let Some(id) = std::str::from_utf8(id).ok().and_then(|s| s.parse::<i64>().ok()) else {
            continue;
        };
        let name = std::str::from_utf8(name)
            .map_err(|_| AppError::validation(format!("invalid encoding in row {}", i + 1)))?;
        users.push(User {
            id,
            name: name.to_string(),
        });
    }
    Ok(users)
}

/// Render users as a BOM-prefixed `id;name` CSV
pub fn write_users(users: &[User]) -> Result<Vec<u8>, AppError> {
    let mut writer = WriterBuilder::new()
        .delimiter(DELIMITER)
        .from_writer(BOM.to_vec());
    writer.write_record(["id", "name"])?;
    for user in users {
        writer.write_record([user.id.to_string().as_str(), user.name.as_str()])?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, name: &str) -> User {
        User {
            id,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_parse_skips_junk_before_header() {
        let data = "Report generated today\n;\nID;Name\n1; Alice \n2;Bob\n";
        let users = parse_users(data.as_bytes()).unwrap();
        assert_eq!(users, vec![user(1, "Alice"), user(2, "Bob")]);
    }

    #[test]
    fn test_parse_without_header_and_with_bom() {
        let mut data = BOM.to_vec();
        data.extend_from_slice("5;Мария\n6;Алексей".as_bytes());
        let users = parse_users(&data).unwrap();
        assert_eq!(users, vec![user(5, "Мария"), user(6, "Алексей")]);
    }

    #[test]
    fn test_parse_skips_bad_rows() {
        let data = "id;name\n1\n;nobody\n2;\nx;NaN\n3;Carol;extra\n";
        let users = parse_users(data.as_bytes()).unwrap();
        assert_eq!(users, vec![user(3, "Carol")]);
    }

    #[test]
    fn test_parse_rejects_invalid_utf8_with_row_number() {
        let data = b"id;name\n1;ok\n2;\xff\xfe\n";
        match parse_users(data) {
            Err(AppError::Validation(msg)) => assert!(msg.contains("row 3"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_empty_file() {
        assert!(matches!(parse_users(b""), Err(AppError::Validation(_))));
        assert!(matches!(parse_users(BOM), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_write_users() {
        let out = write_users(&[user(1, "Ann"), user(2, "Bob; Jr")]).unwrap();
        assert!(out.starts_with(BOM));
        let text = std::str::from_utf8(&out[BOM.len()..]).unwrap();
        assert_eq!(text, "id;name\n1;Ann\n2;\"Bob; Jr\"\n");
    }

    #[test]
    fn test_export_is_importable() {
        let users = vec![user(1, "Ann"), user(2, "Bob")];
        assert_eq!(parse_users(&write_users(&users).unwrap()).unwrap(), users);
    }
}
