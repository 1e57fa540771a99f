//! Resolution of host file references into uploadable attachments.
//!
//! A reference is one of:
//! - inline data: `base64://<payload>` or `data:<mime>;base64,<payload>`
//! - a remote URL: `http://` or `https://`, downloaded through the proxy
//! - anything else, passed to the client library as a local path

use {
    base64::{Engine, engine::general_purpose::STANDARD},
    chrono::Utc,
    tracing::{debug, warn},
};

use crate::{Error, Result, transport::FileData};

/// What inline references look like in logs.
pub const REDACTED_INLINE: &str = "base64://...";

/// Where a file reference points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSource<'a> {
    /// Encoded payload carried in the reference itself.
    Inline(&'a str),
    Remote(&'a str),
    Local(&'a str),
}

/// Classify `file_ref` without touching it.
pub fn classify(file_ref: &str) -> FileSource<'_> {
    if let Some(payload) = file_ref.strip_prefix("base64://") {
        return FileSource::Inline(payload);
    }
    if let Some((_, payload)) = file_ref
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
    {
        return FileSource::Inline(payload);
    }
    if file_ref.starts_with("http://") || file_ref.starts_with("https://") {
        return FileSource::Remote(file_ref);
    }
    FileSource::Local(file_ref)
}

/// A file ready to attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub data: FileData,
    pub name: String,
    /// Safe to log; inline payloads are redacted.
    pub display_url: String,
}

/// Downloads and decodes file references.
#[derive(Clone)]
pub struct FileResolver {
    client: reqwest::Client,
}

impl FileResolver {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Resolve `file_ref`. `name` overrides the derived file name; `fallback`
    /// is used when the content type of a byte buffer cannot be detected.
    pub async fn resolve(
        &self,
        file_ref: &str,
        name: Option<&str>,
        fallback: &str,
    ) -> Result<ResolvedFile> {
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        match classify(file_ref) {
            FileSource::Inline(payload) => {
                let bytes =
                    decode_inline(payload).map_err(|e| Error::resolution(REDACTED_INLINE, e))?;
                let name = name.map_or_else(|| synthesize_name(&bytes, fallback), str::to_string);
                Ok(ResolvedFile {
                    data: FileData::Bytes(bytes),
                    name,
                    display_url: REDACTED_INLINE.to_string(),
                })
            },
            FileSource::Remote(url) => {
                let bytes = self.fetch(url).await?;
                let name = name.map_or_else(|| synthesize_name(&bytes, fallback), str::to_string);
                Ok(ResolvedFile {
                    data: FileData::Bytes(bytes),
                    name,
                    display_url: url.to_string(),
                })
            },
            FileSource::Local(path) => {
                let name = name
                    .or_else(|| last_component(path))
                    .unwrap_or(fallback)
                    .to_string();
                Ok(ResolvedFile {
                    data: FileData::Path(path.to_string()),
                    name,
                    display_url: path.to_string(),
                })
            },
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        debug!(url, "fetching file");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::resolution(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::resolution(url, format!("HTTP {status}")));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::resolution(url, e))?;
        Ok(bytes.to_vec())
    }
}

fn decode_inline(payload: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact)
}

fn last_component(path: &str) -> Option<&str> {
    path.rsplit(['/', '\\'])
        .next()
        .filter(|component| !component.is_empty())
}

/// File extension for `bytes`, detected from its leading signature.
pub fn sniff_extension(bytes: &[u8]) -> Result<&'static str> {
    if let Some(ext) = image::guess_format(bytes)
        .ok()
        .and_then(|format| format.extensions_str().first().copied())
    {
        return Ok(ext);
    }
    sniff_media(bytes).ok_or(Error::UnknownFormat)
}

fn sniff_media(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [b'I', b'D', b'3', ..] | [0xFF, 0xFB | 0xF3 | 0xF2, ..] => Some("mp3"),
        [b'O', b'g', b'g', b'S', ..] => Some("ogg"),
        [b'f', b'L', b'a', b'C', ..] => Some("flac"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => Some("wav"),
        [b'#', b'!', b'A', b'M', b'R', ..] => Some("amr"),
        [b'#', b'!', b'S', b'I', b'L', b'K', ..]
        | [0x02, b'#', b'!', b'S', b'I', b'L', b'K', ..] => Some("silk"),
        [_, _, _, _, b'f', b't', b'y', b'p', b'M', b'4', b'A', ..] => Some("m4a"),
        [_, _, _, _, b'f', b't', b'y', b'p', b'q', b't', ..] => Some("mov"),
        [_, _, _, _, b'f', b't', b'y', b'p', ..] => Some("mp4"),
        [0x1A, 0x45, 0xDF, 0xA3, ..] => Some("webm"),
        [b'%', b'P', b'D', b'F', ..] => Some("pdf"),
        _ => None,
    }
}

/// `"<unix millis>.<ext>"` for detectable content, else `fallback`.
pub fn synthesize_name(bytes: &[u8], fallback: &str) -> String {
    match sniff_extension(bytes) {
        Ok(ext) => format!("{}.{ext}", Utc::now().timestamp_millis()),
        Err(e) => {
            warn!(error = %e, fallback, size = bytes.len(), "could not detect file type");
            fallback.to_string()
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    const PNG: &[u8] = &[
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
    ];

    fn resolver() -> FileResolver {
        FileResolver::new(reqwest::Client::new())
    }

    #[rstest]
    #[case("base64://AAAA", FileSource::Inline("AAAA"))]
    #[case("data:image/png;base64,AAAA", FileSource::Inline("AAAA"))]
    #[case("https://cdn.example/a.png", FileSource::Remote("https://cdn.example/a.png"))]
    #[case("http://cdn.example/a.png", FileSource::Remote("http://cdn.example/a.png"))]
    #[case("/tmp/a.png", FileSource::Local("/tmp/a.png"))]
    #[case("data:text/plain,hello", FileSource::Local("data:text/plain,hello"))]
    fn classifies_references(#[case] input: &str, #[case] expected: FileSource<'_>) {
        assert_eq!(classify(input), expected);
    }

    #[rstest]
    #[case(PNG, "png")]
    #[case(b"GIF89a\x01\x00\x01\x00", "gif")]
    #[case(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10], "jpg")]
    #[case(b"ID3\x04\x00\x00\x00\x00", "mp3")]
    #[case(b"OggS\x00\x02\x00\x00", "ogg")]
    #[case(b"RIFF\x24\x00\x00\x00WAVEfmt ", "wav")]
    #[case(b"\x00\x00\x00\x18ftypisom\x00\x00", "mp4")]
    #[case(b"\x00\x00\x00\x18ftypM4A \x00\x00", "m4a")]
    #[case(b"#!SILK_V3", "silk")]
    #[case(b"%PDF-1.7", "pdf")]
    fn sniffs_known_signatures(#[case] bytes: &[u8], #[case] ext: &str) {
        assert_eq!(sniff_extension(bytes).unwrap(), ext);
    }

    #[test]
    fn unknown_content_falls_back() {
        assert!(matches!(
            sniff_extension(b"plain text"),
            Err(Error::UnknownFormat)
        ));
        assert_eq!(synthesize_name(b"plain text", "file"), "file");
    }

    #[tokio::test]
    async fn inline_payload_is_decoded_and_redacted() {
        let file_ref = format!("base64://{}", STANDARD.encode(PNG));
        let resolved = resolver().resolve(&file_ref, None, "image.png").await.unwrap();

        assert_eq!(resolved.data, FileData::Bytes(PNG.to_vec()));
        assert!(resolved.name.ends_with(".png"));
        assert_eq!(resolved.display_url, REDACTED_INLINE);
    }

    #[tokio::test]
    async fn explicit_name_wins() {
        let file_ref = format!("data:image/png;base64,{}", STANDARD.encode(PNG));
        let resolved = resolver()
            .resolve(&file_ref, Some("cat.png"), "image.png")
            .await
            .unwrap();
        assert_eq!(resolved.name, "cat.png");
    }

    #[tokio::test]
    async fn invalid_inline_payload_is_a_resolution_failure() {
        let err = resolver()
            .resolve("base64://!!not base64!!", None, "image.png")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Resolution { .. }));
        assert!(!err.to_string().contains("not base64"));
    }

    #[tokio::test]
    async fn inline_references_never_touch_the_network() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let file_ref = format!("base64://{}", STANDARD.encode(PNG));
        resolver().resolve(&file_ref, None, "image.png").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn remote_references_are_downloaded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/media/a")
            .with_status(200)
            .with_body(PNG)
            .expect(1)
            .create_async()
            .await;

        let url = format!("{}/media/a", server.url());
        let resolved = resolver().resolve(&url, None, "image.png").await.unwrap();

        mock.assert_async().await;
        assert_eq!(resolved.data, FileData::Bytes(PNG.to_vec()));
        assert!(resolved.name.ends_with(".png"));
        assert_eq!(resolved.display_url, url);
    }

    #[tokio::test]
    async fn remote_error_status_fails() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let url = format!("{}/missing", server.url());
        let err = resolver().resolve(&url, None, "image.png").await.unwrap_err();
        assert!(matches!(err, Error::Resolution { .. }));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn local_references_pass_through() {
        let resolved = resolver()
            .resolve("/srv/media/clip.mp4", None, "video.mp4")
            .await
            .unwrap();
        assert_eq!(resolved.data, FileData::Path("/srv/media/clip.mp4".into()));
        assert_eq!(resolved.name, "clip.mp4");

        let resolved = resolver().resolve("dir/", None, "video.mp4").await.unwrap();
        assert_eq!(resolved.name, "video.mp4");
    }
}
