//! Minimal `multipart/form-data` encoder for the single-file upload form.
//!
//! The host transports only see bytes and a content-type header, so the
//! form is serialized here rather than by an HTTP library.

use uuid::Uuid;

use crate::types::UploadFile;

/// A boundary that cannot collide with CSV contents in practice.
pub(crate) fn new_boundary() -> String {
    format!("agri-{}", Uuid::new_v4().simple())
}

pub(crate) fn content_type(boundary: &str) -> String {
    format!("multipart/form-data; boundary={boundary}")
}

/// Encode `file` as the only part of a form, under `field`.
pub(crate) fn encode_file(boundary: &str, field: &str, file: &UploadFile) -> Vec<u8> {
    let head = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
        escape_quoted(&file.file_name),
        file.content_type,
    );
    let tail = format!("\r\n--{boundary}--\r\n");

    let mut body = Vec::with_capacity(head.len() + file.bytes.len() + tail.len());
    body.extend_from_slice(head.as_bytes());
    body.extend_from_slice(&file.bytes);
    body.extend_from_slice(tail.as_bytes());
    body
}

/// Percent-escape the characters that would break a quoted header value,
/// the same way browsers do for `filename=`.
fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_single_file_part() {
        let file = UploadFile::csv("crops.csv", "a,b\n1,2\n");
        let body = encode_file("XYZ", "file", &file);
        let text = String::from_utf8(body).unwrap();
        assert_eq!(
            text,
            "--XYZ\r\nContent-Disposition: form-data; name=\"file\"; filename=\"crops.csv\"\r\n\
             Content-Type: text/csv\r\n\r\na,b\n1,2\n\r\n--XYZ--\r\n"
        );
    }

    #[test]
    fn escapes_quotes_in_file_name() {
        let file = UploadFile::csv("my \"best\".csv", Vec::new());
        let text = String::from_utf8(encode_file("B", "file", &file)).unwrap();
        assert!(text.contains("filename=\"my %22best%22.csv\""));
    }

    #[test]
    fn boundaries_are_unique() {
        assert_ne!(new_boundary(), new_boundary());
        assert!(content_type("abc").ends_with("boundary=abc"));
    }
}
