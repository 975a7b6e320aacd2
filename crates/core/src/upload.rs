use {
    base64::{Engine, engine::general_purpose::STANDARD},
    botbridge_channels::Session,
    tracing::debug,
};

use crate::{Error, Result};

/// Decodes a `data:<mime>;base64,<payload>` URI into raw bytes.
pub fn decode_data_uri(data_uri: &str) -> Result<Vec<u8>> {
    let mut parts = data_uri.split(";base64,");
    let (Some(_), Some(payload), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(Error::MalformedDataUri);
    };
    Ok(STANDARD.decode(payload.trim())?)
}

/// Picks a file name from the decoded bytes, e.g. `image-20240101120000.png`.
pub fn attachment_name(data: &[u8]) -> Result<String> {
    let format = image::guess_format(data).map_err(|_| Error::UnsupportedAttachment)?;
    let extension = format
        .extensions_str()
        .first()
        .ok_or(Error::UnsupportedAttachment)?;
    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
    Ok(format!("image-{stamp}.{extension}"))
}

/// Uploads a base64 data URI as an attachment and returns its hosted URL.
pub async fn upload_data_uri(
    session: &dyn Session,
    channel_id: &str,
    data_uri: &str,
) -> Result<String> {
    let data = decode_data_uri(data_uri)?;
    let file_name = attachment_name(&data)?;
    let size = data.len();

    let message = session.send_attachment(channel_id, &file_name, data).await?;
    let url = message
        .attachment_urls
        .into_iter()
        .next()
        .ok_or(Error::MissingAttachment)?;
    debug!(channel_id, file_name, size, "uploaded attachment");
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::test_support::FakeSession;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn png_uri() -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(PNG))
    }

    #[test]
    fn decodes_payload_after_marker() {
        assert_eq!(decode_data_uri(&png_uri()).unwrap(), PNG);
    }

    #[test]
    fn rejects_uri_without_marker() {
        assert!(matches!(
            decode_data_uri("data:image/png,abc"),
            Err(Error::MalformedDataUri)
        ));
        assert!(matches!(
            decode_data_uri("a;base64,b;base64,c"),
            Err(Error::MalformedDataUri)
        ));
    }

    #[test]
    fn rejects_bad_base64() {
        assert!(matches!(
            decode_data_uri("data:image/png;base64,@@@"),
            Err(Error::InvalidBase64(_))
        ));
    }

    #[test]
    fn names_file_after_detected_type() {
        let name = attachment_name(PNG).unwrap();
        assert!(name.starts_with("image-"));
        assert!(name.ends_with(".png"));
        assert_eq!(name.len(), "image-20240101120000.png".len());

        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10];
        assert!(attachment_name(&jpeg).unwrap().ends_with(".jpg"));
    }

    #[test]
    fn unknown_bytes_are_rejected() {
        assert!(matches!(
            attachment_name(b"plain text"),
            Err(Error::UnsupportedAttachment)
        ));
    }

    #[tokio::test]
    async fn upload_returns_attachment_url() {
        let session = FakeSession::new();
        let url = upload_data_uri(session.as_ref(), "c1", &png_uri())
            .await
            .unwrap();
        assert!(url.starts_with("https://cdn.test/c1/image-"));

        let uploads = session.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].2, PNG.len());
    }

    #[tokio::test]
    async fn upload_without_attachment_fails() {
        let session = FakeSession::new();
        session.drop_attachments();
        let err = upload_data_uri(session.as_ref(), "c1", &png_uri())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingAttachment));
    }
}
