//! Object-store backend. Each snapshot and the ledger are single objects, so a
//! `PutObject` replaces them atomically.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::models::prompt::Prompt;
use crate::models::selection::SelectionRecord;
use crate::store::{
    decode, encode, latest_tag, merge_record, snapshot_name, tag_from_name, validate_tag,
    HistoryLedger, PromptStore, StorageError, LEDGER_FILE,
};

pub struct S3Store {
    client: S3Client,
    bucket: String,
    prefix: String,
    ledger_lock: Mutex<()>,
}

impl S3Store {
    pub fn new(client: S3Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
            ledger_lock: Mutex::new(()),
        }
    }

    fn snapshot_key(&self, tag: &str) -> String {
        format!("{}snapshots/{}", self.prefix, snapshot_name(tag))
    }

    fn ledger_key(&self) -> String {
        format!("{}{}", self.prefix, LEDGER_FILE)
    }

    async fn snapshot_tags(&self) -> Result<Vec<String>, StorageError> {
        let list_prefix = format!("{}snapshots/", self.prefix);
        let mut tags = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&list_prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| StorageError::ObjectStore(format!("list {list_prefix}: {e}")))?;

            for object in page.contents() {
                let name = object
                    .key()
                    .and_then(|key| key.strip_prefix(list_prefix.as_str()));
                if let Some(tag) = name.and_then(tag_from_name) {
                    tags.push(tag.to_string());
                }
            }

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        tags.sort();
        Ok(tags)
    }

    /// Fetches an object, treating `NoSuchKey` as `None`.
    async fn get_optional(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        let output = match response {
            Ok(output) => output,
            Err(e) if e.as_service_error().map(|se| se.is_no_such_key()).unwrap_or(false) => {
                return Ok(None);
            }
            Err(e) => return Err(StorageError::ObjectStore(format!("get {key}: {e}"))),
        };

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::ObjectStore(format!("read {key}: {e}")))?;
        Ok(Some(body.into_bytes().to_vec()))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| StorageError::ObjectStore(format!("put {key}: {e}")))?;
        Ok(())
    }

    async fn read_snapshot(&self, tag: &str) -> Result<Vec<Prompt>, StorageError> {
        let key = self.snapshot_key(tag);
        match self.get_optional(&key).await? {
            Some(bytes) => decode(&key, &bytes),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl PromptStore for S3Store {
    async fn latest_snapshot(&self) -> Result<Vec<Prompt>, StorageError> {
        let tags = self.snapshot_tags().await?;
        match latest_tag(tags.iter().map(String::as_str)) {
            Some(tag) => self.read_snapshot(tag).await,
            None => Ok(Vec::new()),
        }
    }

    async fn all_snapshots(&self) -> Result<Vec<Prompt>, StorageError> {
        let mut all = Vec::new();
        for tag in self.snapshot_tags().await? {
            match self.read_snapshot(&tag).await {
                Ok(prompts) => all.extend(prompts),
                Err(e @ StorageError::Serialization { .. }) => {
                    warn!("Skipping unreadable snapshot {tag}: {e}");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(all)
    }

    async fn write_snapshot(&self, prompts: &[Prompt], tag: &str) -> Result<(), StorageError> {
        validate_tag(tag)?;
        let key = self.snapshot_key(tag);
        let bytes = encode(&key, prompts)?;
        self.put(&key, bytes).await?;
        info!(
            "Uploaded snapshot to s3://{}/{} ({} prompts)",
            self.bucket,
            key,
            prompts.len()
        );
        Ok(())
    }
}

#[async_trait]
impl HistoryLedger for S3Store {
    async fn load(&self) -> Result<Vec<SelectionRecord>, StorageError> {
        let key = self.ledger_key();
        match self.get_optional(&key).await? {
            Some(bytes) => decode(&key, &bytes),
            None => Ok(Vec::new()),
        }
    }

    async fn upsert(&self, record: SelectionRecord) -> Result<(), StorageError> {
        let _guard = self.ledger_lock.lock().await;
        let key = self.ledger_key();
        let ledger = merge_record(self.load().await?, record);
        let bytes = encode(&key, &ledger)?;
        self.put(&key, bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::prompt::PromptType;
    use crate::testutil::{date, prompt};
    use aws_sdk_s3::config::retry::RetryConfig;
    use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
    use chrono::Utc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BUCKET: &str = "prompts";

    fn store_for(server: &MockServer) -> S3Store {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("test", "test", None, None, "test"))
            .endpoint_url(server.uri())
            .force_path_style(true)
            .retry_config(RetryConfig::disabled())
            .build();
        S3Store::new(S3Client::from_conf(config), BUCKET, "env/")
    }

    fn listing(keys: &[&str], next_token: Option<&str>) -> String {
        let contents: String = keys
            .iter()
            .map(|key| format!("<Contents><Key>{key}</Key><Size>2</Size></Contents>"))
            .collect();
        let truncation = match next_token {
            Some(token) => format!(
                "<IsTruncated>true</IsTruncated><NextContinuationToken>{token}</NextContinuationToken>"
            ),
            None => "<IsTruncated>false</IsTruncated>".to_string(),
        };
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
<Name>{BUCKET}</Name><Prefix>env/snapshots/</Prefix><KeyCount>{}</KeyCount>{truncation}{contents}
</ListBucketResult>"#,
            keys.len()
        )
    }

    fn xml(status: u16, body: String) -> ResponseTemplate {
        ResponseTemplate::new(status)
            .insert_header("content-type", "application/xml")
            .set_body_string(body)
    }

    fn no_such_key(key: &str) -> ResponseTemplate {
        xml(
            404,
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message><Key>{key}</Key><RequestId>r1</RequestId></Error>"#
            ),
        )
    }

    #[tokio::test]
    async fn test_latest_snapshot_spans_listing_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/{BUCKET}")))
            .and(query_param("list-type", "2"))
            .and(query_param("continuation-token", "page-2"))
            .respond_with(xml(
                200,
                listing(
                    &["env/snapshots/prompts-2025-08-10.json", "env/snapshots/notes.txt"],
                    None,
                ),
            ))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/{BUCKET}")))
            .and(query_param("list-type", "2"))
            .respond_with(xml(
                200,
                listing(
                    &[
                        "env/snapshots/prompts-2025-07-27.json",
                        "env/snapshots/prompts-2025-08-03.json",
                    ],
                    Some("page-2"),
                ),
            ))
            .mount(&server)
            .await;
        let newest = vec![prompt("newest", "PromptHero Veo", PromptType::Video)];
        Mock::given(method("GET"))
            .and(path(format!("/{BUCKET}/env/snapshots/prompts-2025-08-10.json")))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(serde_json::to_vec(&newest).unwrap()),
            )
            .mount(&server)
            .await;

        let latest = store_for(&server).latest_snapshot().await.unwrap();
        assert_eq!(latest, newest);
    }

    #[tokio::test]
    async fn test_missing_ledger_reads_as_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/{BUCKET}/env/history.json")))
            .respond_with(no_such_key("env/history.json"))
            .mount(&server)
            .await;

        let store = store_for(&server);
        assert!(store.load().await.unwrap().is_empty());
        assert!(store.find_by_date(date("2025-08-03")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_other_errors_are_storage_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(xml(
                403,
                r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>AccessDenied</Code><Message>Access Denied</Message><RequestId>r2</RequestId></Error>"#
                    .to_string(),
            ))
            .mount(&server)
            .await;

        let err = store_for(&server).load().await.unwrap_err();
        assert!(matches!(err, StorageError::ObjectStore(_)));
    }

    #[tokio::test]
    async fn test_writes_use_prefixed_keys() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/{BUCKET}/env/history.json")))
            .respond_with(no_such_key("env/history.json"))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let picked = prompt("p1", "Microsoft Copilot", PromptType::Text);
        store.write_snapshot(&[picked.clone()], "2025-08-03").await.unwrap();
        let record =
            SelectionRecord::with_prompt(date("2025-08-03"), picked, Utc::now(), None, None);
        store.upsert(record).await.unwrap();

        let puts: Vec<String> = server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.method.as_str() == "PUT")
            .map(|r| r.url.path().to_string())
            .collect();
        assert_eq!(
            puts,
            vec![
                format!("/{BUCKET}/env/snapshots/prompts-2025-08-03.json"),
                format!("/{BUCKET}/env/history.json"),
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_tag_is_rejected_before_upload() {
        let server = MockServer::start().await;
        let err = store_for(&server).write_snapshot(&[], "../escape").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidTag(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
