use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::config::{Config, USER_AGENT};
use crate::error::{AppError, Result};
use crate::types::FeedKind;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Raw bytes of the three feeds for one trading date. `None` means the feed was
/// not published (holiday, not yet uploaded, or not present locally).
#[derive(Debug, Default, Clone)]
pub struct DayFeeds {
    pub price: Option<Vec<u8>>,
    pub delivery: Option<Vec<u8>>,
    pub derivatives: Option<Vec<u8>>,
}

#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, date: NaiveDate) -> Result<DayFeeds>;
}

/// Expand `{yyyymmdd}` / `{ddmmyyyy}` in a URL or file-name template.
pub fn render_template(template: &str, date: NaiveDate) -> String {
    template
        .replace("{yyyymmdd}", &date.format("%Y%m%d").to_string())
        .replace("{ddmmyyyy}", &date.format("%d%m%Y").to_string())
}

/// Return the first `.csv` member of a zip archive, or the input untouched
/// when it is not a zip.
pub fn unpack(bytes: Vec<u8>) -> Result<Vec<u8>> {
    if !bytes.starts_with(ZIP_MAGIC) {
        return Ok(bytes);
    }

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    for i in 0..archive.len() {
        let mut member = archive.by_index(i)?;
        if member.name().to_ascii_lowercase().ends_with(".csv") {
            let mut out = Vec::with_capacity(member.size() as usize);
            member.read_to_end(&mut out)?;
            return Ok(out);
        }
    }
    Err(AppError::Zip(zip::result::ZipError::FileNotFound))
}

/// Archive file name of a feed without its extension.
fn file_stem(feed: FeedKind, date: NaiveDate) -> String {
    let template = match feed {
        FeedKind::Price => "BhavCopy_NSE_CM_0_0_0_{yyyymmdd}_F_0000",
        FeedKind::Delivery => "sec_bhavdata_full_{ddmmyyyy}",
        FeedKind::Derivatives => "BhavCopy_NSE_FO_0_0_0_{yyyymmdd}_F_0000",
    };
    render_template(template, date)
}

// ---------------------------------------------------------------------------
// Local directory
// ---------------------------------------------------------------------------

/// Reads feeds saved under their archive file names, zipped or not.
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn candidates(&self, feed: FeedKind, date: NaiveDate) -> Vec<PathBuf> {
        let stem = file_stem(feed, date);
        ["csv", "csv.zip"]
            .iter()
            .map(|ext| self.dir.join(format!("{stem}.{ext}")))
            .collect()
    }

    async fn read_first(&self, feed: FeedKind, date: NaiveDate) -> Result<Option<Vec<u8>>> {
        for path in self.candidates(feed, date) {
            if let Some(bytes) = read_if_exists(&path).await? {
                debug!(feed = %feed, path = %path.display(), "[SOURCE] read local feed");
                return Ok(Some(unpack(bytes)?));
            }
        }
        Ok(None)
    }
}

async fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl FeedSource for DirectorySource {
    async fn fetch(&self, date: NaiveDate) -> Result<DayFeeds> {
        Ok(DayFeeds {
            price: self.read_first(FeedKind::Price, date).await?,
            delivery: self.read_first(FeedKind::Delivery, date).await?,
            derivatives: self.read_first(FeedKind::Derivatives, date).await?,
        })
    }
}

// ---------------------------------------------------------------------------
// Exchange archive over HTTP
// ---------------------------------------------------------------------------

/// Downloads feeds from URL templates. Requests through one source are spaced
/// by `delay`, including requests made from concurrent ingestion tasks.
/// Every downloaded feed is saved unpacked under `save_dir` with the file name
/// [`DirectorySource`] looks for.
pub struct HttpSource {
    client: reqwest::Client,
    save_dir: PathBuf,
    cm_bhavcopy_url: String,
    fo_bhavcopy_url: String,
    delivery_url: String,
    delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl HttpSource {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.fetch_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            save_dir: cfg.feed_dir.clone(),
            cm_bhavcopy_url: cfg.cm_bhavcopy_url.clone(),
            fo_bhavcopy_url: cfg.fo_bhavcopy_url.clone(),
            delivery_url: cfg.delivery_url.clone(),
            delay: cfg.fetch_delay,
            last_request: Mutex::new(None),
        })
    }

    /// Hold the pacing lock until our slot comes up.
    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let next = prev + self.delay;
            if next > Instant::now() {
                tokio::time::sleep_until(next).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn get(&self, feed: FeedKind, template: &str, date: NaiveDate) -> Result<Option<Vec<u8>>> {
        let url = render_template(template, date);
        self.pace().await;

        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            debug!(feed = %feed, date = %date, status = status.as_u16(), "[SOURCE] feed not available");
            return Ok(None);
        }

        let bytes = unpack(resp.bytes().await?.to_vec())?;
        debug!(feed = %feed, date = %date, bytes = bytes.len(), "[SOURCE] downloaded {url}");
        self.save(feed, date, &bytes).await?;
        Ok(Some(bytes))
    }

    async fn save(&self, feed: FeedKind, date: NaiveDate, bytes: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.save_dir).await?;
        let path = self.save_dir.join(format!("{}.csv", file_stem(feed, date)));
        tokio::fs::write(&path, bytes).await?;
        debug!(feed = %feed, path = %path.display(), "[SOURCE] saved feed");
        Ok(())
    }
}

#[async_trait]
impl FeedSource for HttpSource {
    async fn fetch(&self, date: NaiveDate) -> Result<DayFeeds> {
        let price = self.get(FeedKind::Price, &self.cm_bhavcopy_url, date).await?;
        // Without the price file the day is skipped anyway.
        if price.is_none() {
            return Ok(DayFeeds::default());
        }
        let delivery = self.get(FeedKind::Delivery, &self.delivery_url, date).await?;
        let derivatives = self.get(FeedKind::Derivatives, &self.fo_bhavcopy_url, date).await?;
        Ok(DayFeeds { price, delivery, derivatives })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use axum::{routing::get, Router};

    use super::*;
    use crate::types::ScanParams;

    fn http_config(base_url: &str, feed_dir: &Path, fetch_delay: Duration) -> Config {
        Config {
            log_level: "debug".to_string(),
            db_path: ":memory:".to_string(),
            api_port: 0,
            feed_dir: feed_dir.to_path_buf(),
            cm_bhavcopy_url: format!("{base_url}/cm/BhavCopy_{{yyyymmdd}}.csv.zip"),
            fo_bhavcopy_url: format!("{base_url}/fo/BhavCopy_{{yyyymmdd}}.csv.zip"),
            delivery_url: format!("{base_url}/sec_bhavdata_full_{{ddmmyyyy}}.csv"),
            fetch_delay,
            fetch_timeout: Duration::from_secs(5),
            ingest_concurrency: 1,
            scan_defaults: ScanParams::default(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 5).unwrap()
    }

    fn zipped(name: &str, body: &[u8]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zw = zip::ZipWriter::new(&mut buf);
            let opts = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Stored);
            zw.start_file("readme.txt", opts).unwrap();
            zw.write_all(b"not this one").unwrap();
            zw.start_file(name, opts).unwrap();
            zw.write_all(body).unwrap();
            zw.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn templates_expand_both_date_layouts() {
        assert_eq!(
            render_template("a_{yyyymmdd}_b_{ddmmyyyy}.csv", date()),
            "a_20260305_b_05032026.csv"
        );
    }

    #[test]
    fn unpack_takes_first_csv_member() {
        let body = unpack(zipped("BhavCopy.CSV", b"SYMBOL\nAAA\n")).unwrap();
        assert_eq!(body, b"SYMBOL\nAAA\n");
        assert_eq!(unpack(b"plain,csv\n".to_vec()).unwrap(), b"plain,csv\n");
    }

    #[tokio::test]
    async fn directory_source_reads_plain_and_zipped_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("BhavCopy_NSE_CM_0_0_0_20260305_F_0000.csv.zip"),
            zipped("cm.csv", b"price"),
        )
        .unwrap();
        std::fs::write(dir.path().join("sec_bhavdata_full_05032026.csv"), b"delivery").unwrap();

        let feeds = DirectorySource::new(dir.path()).fetch(date()).await.unwrap();
        assert_eq!(feeds.price.as_deref(), Some(&b"price"[..]));
        assert_eq!(feeds.delivery.as_deref(), Some(&b"delivery"[..]));
        assert!(feeds.derivatives.is_none());
    }

    #[tokio::test]
    async fn directory_source_missing_day_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let feeds = DirectorySource::new(dir.path()).fetch(date()).await.unwrap();
        assert!(feeds.price.is_none() && feeds.delivery.is_none() && feeds.derivatives.is_none());
    }

    #[tokio::test]
    async fn downloads_are_saved_for_the_directory_source() {
        let price = zipped("cm.csv", b"price body");
        let app = Router::new()
            .route(
                "/cm/BhavCopy_20260305.csv.zip",
                get(move || {
                    let body = price.clone();
                    async move { body }
                }),
            )
            .route("/sec_bhavdata_full_05032026.csv", get(|| async { "delivery body" }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let dir = tempfile::tempdir().unwrap();
        let feed_dir = dir.path().join("downloads");
        let source =
            HttpSource::from_config(&http_config(&base_url, &feed_dir, Duration::ZERO)).unwrap();

        let fetched = source.fetch(date()).await.unwrap();
        assert_eq!(fetched.price.as_deref(), Some(&b"price body"[..]));
        assert_eq!(fetched.delivery.as_deref(), Some(&b"delivery body"[..]));
        // Not routed, so the server answers 404.
        assert!(fetched.derivatives.is_none());

        let local = DirectorySource::new(&feed_dir).fetch(date()).await.unwrap();
        assert_eq!(local.price, fetched.price);
        assert_eq!(local.delivery, fetched.delivery);
        assert!(local.derivatives.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_spaces_concurrent_requests() {
        let dir = tempfile::tempdir().unwrap();
        let delay = Duration::from_millis(600);
        let source = Arc::new(
            HttpSource::from_config(&http_config("http://127.0.0.1:9", dir.path(), delay)).unwrap(),
        );

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let source = Arc::clone(&source);
                tokio::spawn(async move {
                    source.pace().await;
                    Instant::now()
                })
            })
            .collect();

        let mut slots = Vec::new();
        for task in tasks {
            slots.push(task.await.unwrap());
        }
        slots.sort();
        for pair in slots.windows(2) {
            assert!(pair[1] - pair[0] >= delay, "slots {:?} closer than {delay:?}", pair);
        }
    }
}
