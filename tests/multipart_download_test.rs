/*!
 * Integration tests for multipart downloads
 *
 * A mock part source serves parts from memory with per-part checksum
 * headers. The tests cover:
 * - Splicing parts into one stream in order
 * - Integrity failures surfacing only at the end of the corrupted part
 * - Fetch failures surfacing after the bytes of earlier parts
 * - Skipped verification (no checksum header, verification disabled)
 */

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use fusion_transfer::metadata::{CHECKSUM_HEADER, CONTENT_LENGTH_HEADER, PARTS_COUNT_HEADER};
use fusion_transfer::transfer::{download_multipart, PartResponse, PartSource};
use fusion_transfer::{
    digest_bytes, HeaderMap, ObjectHead, PrefetchClosePolicy, TransferConfig, TransferError,
    TransferResult,
};
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// One part as served by the mock: payload plus the checksum header value
#[derive(Clone)]
struct ServedPart {
    data: Vec<u8>,
    checksum: Option<String>,
}

impl ServedPart {
    fn honest(data: &[u8]) -> Self {
        let checksum = digest_bytes("SHA-256", Bytes::copy_from_slice(data))
            .unwrap()
            .checksum;
        Self {
            data: data.to_vec(),
            checksum: Some(checksum),
        }
    }

    fn corrupted(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            checksum: Some("xyz".to_string()),
        }
    }

    fn unchecked(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            checksum: None,
        }
    }
}

struct MockSource {
    parts: Vec<ServedPart>,
    fail_on: Option<u32>,
    fetches: AtomicU32,
}

impl MockSource {
    fn new(parts: Vec<ServedPart>) -> Self {
        Self {
            parts,
            fail_on: None,
            fetches: AtomicU32::new(0),
        }
    }

    fn failing_on(mut self, part_number: u32) -> Self {
        self.fail_on = Some(part_number);
        self
    }

    fn object_head(&self) -> ObjectHead {
        let total: usize = self.parts.iter().map(|p| p.data.len()).sum();
        let mut headers = HeaderMap::new();
        headers.insert(
            CHECKSUM_HEADER.to_string(),
            vec![format!("aggregate-{}", self.parts.len())],
        );
        headers.insert(
            PARTS_COUNT_HEADER.to_string(),
            vec![self.parts.len().to_string()],
        );
        headers.insert(CONTENT_LENGTH_HEADER.to_string(), vec![total.to_string()]);
        ObjectHead::from_headers(&headers)
    }
}

#[async_trait]
impl PartSource for MockSource {
    async fn fetch_part(&self, part_number: u32) -> TransferResult<PartResponse> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if self.fail_on == Some(part_number) {
            return Err(TransferError::Fetch(format!(
                "part {} unavailable",
                part_number
            )));
        }

        let part = self
            .parts
            .get(part_number as usize - 1)
            .cloned()
            .ok_or_else(|| TransferError::Fetch(format!("no part {}", part_number)))?;

        let mut headers = HeaderMap::new();
        if let Some(checksum) = part.checksum {
            headers.insert(CHECKSUM_HEADER.to_string(), vec![checksum]);
        }
        headers.insert(
            CONTENT_LENGTH_HEADER.to_string(),
            vec![part.data.len().to_string()],
        );

        // Deliver in small chunks so parts span several reads
        let chunks: Vec<io::Result<Bytes>> = part
            .data
            .chunks(4)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        Ok(PartResponse::new(headers, Box::pin(stream::iter(chunks))))
    }
}

async fn read_all<S>(stream: &mut S) -> (Vec<u8>, Option<io::Error>)
where
    S: futures::Stream<Item = io::Result<Bytes>> + Unpin,
{
    let mut bytes = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => bytes.extend_from_slice(&chunk),
            Err(e) => return (bytes, Some(e)),
        }
    }
    (bytes, None)
}

#[tokio::test]
async fn test_download_splices_verified_parts() {
    let source = Arc::new(MockSource::new(vec![
        ServedPart::honest(b"The quick brown "),
        ServedPart::honest(b"fox jumps over "),
        ServedPart::honest(b"the lazy dog"),
    ]));
    let head = source.object_head();

    assert!(head.is_multipart);
    assert_eq!(head.part_count, 3);
    assert_eq!(head.checksum.as_deref(), Some("aggregate"));

    let mut stream = download_multipart(source.clone(), &head, &TransferConfig::default())
        .await
        .unwrap();
    let (bytes, err) = read_all(&mut stream).await;

    assert!(err.is_none(), "unexpected error: {:?}", err);
    assert_eq!(bytes, b"The quick brown fox jumps over the lazy dog".to_vec());
    assert_eq!(stream.parts_opened(), 3);
    assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_corrupted_part_fails_after_its_bytes() {
    let source = Arc::new(MockSource::new(vec![
        ServedPart::honest(b"first part "),
        ServedPart::corrupted(b"second part "),
        ServedPart::honest(b"third part"),
    ]));
    let head = source.object_head();

    let mut stream = download_multipart(source, &head, &TransferConfig::default())
        .await
        .unwrap();
    let (bytes, err) = read_all(&mut stream).await;

    // All of part 2 was delivered before the mismatch was detected
    assert_eq!(bytes, b"first part second part ".to_vec());

    let err = err.expect("checksum mismatch expected");
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);

    let transfer_err = TransferError::from_io_error(&err);
    assert!(transfer_err.is_integrity_failure());
    assert!(!transfer_err.is_retryable());
    assert!(transfer_err.to_string().starts_with("part 2:"));

    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_fetch_failure_after_earlier_parts() {
    let source = Arc::new(
        MockSource::new(vec![
            ServedPart::honest(b"one "),
            ServedPart::honest(b"two "),
            ServedPart::honest(b"three"),
        ])
        .failing_on(3),
    );
    let head = source.object_head();

    let mut stream = download_multipart(source, &head, &TransferConfig::default())
        .await
        .unwrap();
    let (bytes, err) = read_all(&mut stream).await;

    assert_eq!(bytes, b"one two ".to_vec());
    let transfer_err = TransferError::from_io_error(&err.expect("fetch failure expected"));
    assert!(matches!(transfer_err.root(), TransferError::Fetch(_)));
    assert!(transfer_err.is_retryable());
}

#[tokio::test]
async fn test_first_part_failure_fails_open() {
    let source = Arc::new(MockSource::new(vec![ServedPart::honest(b"only")]).failing_on(1));
    let head = source.object_head();

    let result = download_multipart(source, &head, &TransferConfig::default()).await;
    let err = result.err().expect("open should fail");
    assert!(matches!(err.root(), TransferError::Fetch(_)));
}

#[tokio::test]
async fn test_parts_without_checksum_are_not_verified() {
    let source = Arc::new(MockSource::new(vec![
        ServedPart::unchecked(b"no header "),
        ServedPart::honest(b"with header"),
    ]));
    let head = source.object_head();

    let mut stream = download_multipart(source, &head, &TransferConfig::default())
        .await
        .unwrap();
    let (bytes, err) = read_all(&mut stream).await;

    assert!(err.is_none());
    assert_eq!(bytes, b"no header with header".to_vec());
}

#[tokio::test]
async fn test_verification_can_be_disabled() {
    let source = Arc::new(MockSource::new(vec![
        ServedPart::corrupted(b"bad "),
        ServedPart::corrupted(b"data"),
    ]));
    let head = source.object_head();
    let config = TransferConfig {
        verify_checksums: false,
        ..Default::default()
    };

    let mut stream = download_multipart(source, &head, &config).await.unwrap();
    let (bytes, err) = read_all(&mut stream).await;

    assert!(err.is_none());
    assert_eq!(bytes, b"bad data".to_vec());
}

#[tokio::test]
async fn test_single_part_object() {
    let source = Arc::new(MockSource::new(vec![ServedPart::honest(b"whole object")]));

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_LENGTH_HEADER.to_string(), vec!["12".to_string()]);
    let head = ObjectHead::from_headers(&headers);
    assert!(!head.is_multipart);

    let mut stream = download_multipart(source.clone(), &head, &TransferConfig::default())
        .await
        .unwrap();
    let (bytes, err) = read_all(&mut stream).await;

    assert!(err.is_none());
    assert_eq!(bytes, b"whole object".to_vec());
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_close_mid_download() {
    let source = Arc::new(MockSource::new(vec![
        ServedPart::honest(b"aaaaaaaa"),
        ServedPart::honest(b"bbbbbbbb"),
        ServedPart::honest(b"cccccccc"),
    ]));
    let head = source.object_head();
    let config = TransferConfig {
        prefetch_close_policy: PrefetchClosePolicy::Cancel,
        ..Default::default()
    };

    let mut stream = download_multipart(source, &head, &config).await.unwrap();
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first, Bytes::from_static(b"aaaa"));

    stream.close();
    assert!(!stream.has_pending_fetch());
    assert!(stream.next().await.is_none());
}
