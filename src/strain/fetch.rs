// Data fetch adapter
// Retrieves open strain data from the GWOSC archive: list the strain files
// covering a span, download (or reuse from cache), decompress, parse, stitch
// and crop to the requested window

use flate2::read::GzDecoder;
use serde::Deserialize;
use std::io::Read;
use std::time::Duration;
use thiserror::Error;

use crate::catalog::Detector;
use crate::strain::cache::{CacheError, StrainCache};
use crate::strain::series::TimeSeries;

/// Failure to obtain strain for a requested span.
/// No partial data is ever returned alongside this error.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("No {detector} strain data available for GPS [{start}, {end}): {source}")]
    DataUnavailable {
        detector: Detector,
        start: f64,
        end: f64,
        #[source]
        source: FetchCause,
    },
}

/// Underlying reason a fetch failed
#[derive(Debug, Error)]
pub enum FetchCause {
    #[error("invalid span: start {0} is not before end {1}")]
    InvalidSpan(f64, f64),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("malformed archive data: {0}")]
    Malformed(String),

    #[error("no strain files listed for the span")]
    NoFiles,

    #[error("no ASCII strain files for the span (archive offers: {0})")]
    UnsupportedFormat(String),

    #[error("strain files do not cover GPS [{0}, {1})")]
    Gap(f64, f64),
}

/// Anything that can produce strain for a detector over a GPS span
pub trait StrainSource {
    fn fetch(
        &self,
        detector: Detector,
        start_time: f64,
        end_time: f64,
        use_cache: bool,
    ) -> Result<TimeSeries, FetchError>;
}

/// One strain file entry from the archive file listing
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StrainFile {
    pub url: String,

    pub format: String,

    #[serde(rename = "GPSstart")]
    pub gps_start: f64,

    /// File length in seconds
    pub duration: f64,

    pub sampling_rate: f64,

    #[serde(default)]
    pub detector: Option<String>,
}

impl StrainFile {
    pub fn gps_end(&self) -> f64 {
        self.gps_start + self.duration
    }

    fn is_text(&self) -> bool {
        self.format.eq_ignore_ascii_case("txt") || self.url.ends_with(".txt.gz")
    }
}

#[derive(Debug, Deserialize)]
struct StrainListing {
    #[serde(default)]
    strain: Vec<StrainFile>,
}

/// HTTP client for the Gravitational Wave Open Science Center archive
pub struct GwoscClient {
    http: reqwest::blocking::Client,
    base_url: String,
    dataset: String,
    cache: Option<StrainCache>,
}

impl GwoscClient {
    /// Client for one observing-run dataset (e.g., "O1")
    pub fn new(
        base_url: impl Into<String>,
        dataset: impl Into<String>,
        timeout: Duration,
        cache: Option<StrainCache>,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("strainwave/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(GwoscClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            dataset: dataset.into(),
            cache,
        })
    }

    /// File listing URL for a detector and span
    pub fn listing_url(&self, detector: Detector, start_time: f64, end_time: f64) -> String {
        format!(
            "{}/archive/links/{}/{}/{}/{}/json/",
            self.base_url,
            self.dataset,
            detector.code(),
            start_time.floor() as i64,
            end_time.ceil() as i64
        )
    }

    fn download(&self, url: &str, use_cache: bool) -> Result<Vec<u8>, FetchCause> {
        let cache = if use_cache { self.cache.as_ref() } else { None };

        if let Some(cache) = cache {
            if let Some(bytes) = cache.load(url)? {
                log::debug!("Using cached strain file for {}", url);
                return Ok(bytes);
            }
        }

        log::info!("Downloading {}", url);
        let bytes = self.http.get(url).send()?.error_for_status()?.bytes()?.to_vec();

        if let Some(cache) = cache {
            let path = cache.store(url, &bytes)?;
            log::debug!("Cached strain file at {}", path.display());
        }

        Ok(bytes)
    }

    fn fetch_span(
        &self,
        detector: Detector,
        start_time: f64,
        end_time: f64,
        use_cache: bool,
    ) -> Result<TimeSeries, FetchCause> {
        if !(start_time < end_time) {
            return Err(FetchCause::InvalidSpan(start_time, end_time));
        }

        let listing_url = self.listing_url(detector, start_time, end_time);
        log::debug!("Querying strain file listing: {}", listing_url);
        let listing: StrainListing = self.http.get(&listing_url).send()?.error_for_status()?.json()?;

        let files = select_files(&listing.strain, start_time, end_time);
        if files.is_empty() {
            let formats = offered_formats(&listing.strain, start_time, end_time);
            if formats.is_empty() {
                return Err(FetchCause::NoFiles);
            }
            return Err(FetchCause::UnsupportedFormat(formats.join(", ")));
        }

        let mut pieces = Vec::with_capacity(files.len());
        for file in files {
            let bytes = self.download(&file.url, use_cache)?;
            let text = decompress(&bytes)?;
            let samples = parse_strain_text(&text)?;
            pieces.push(TimeSeries::new(
                channel_name(detector),
                file.gps_start,
                file.sampling_rate,
                samples,
            ));
        }

        stitch(pieces, start_time, end_time)
    }
}

impl StrainSource for GwoscClient {
    fn fetch(
        &self,
        detector: Detector,
        start_time: f64,
        end_time: f64,
        use_cache: bool,
    ) -> Result<TimeSeries, FetchError> {
        log::info!(
            "Fetching {} data from GWOSC: {} to {}",
            detector,
            start_time,
            end_time
        );

        match self.fetch_span(detector, start_time, end_time, use_cache) {
            Ok(series) => {
                log::info!("Fetched {} data: {} samples", detector, series.len());
                Ok(series)
            }
            Err(source) => {
                log::error!("Failed to fetch {} data: {}", detector, source);
                Err(FetchError::DataUnavailable {
                    detector,
                    start: start_time,
                    end: end_time,
                    source,
                })
            }
        }
    }
}

/// Channel label attached to fetched strain
pub fn channel_name(detector: Detector) -> String {
    format!("{}:GWOSC-STRAIN", detector.code())
}

/// Text-format files overlapping `[start, end)`, ordered by start time, one per start
pub fn select_files(files: &[StrainFile], start_time: f64, end_time: f64) -> Vec<StrainFile> {
    let mut selected: Vec<StrainFile> = files
        .iter()
        .filter(|file| file.is_text())
        .filter(|file| file.sampling_rate > 0.0 && file.duration > 0.0)
        .filter(|file| file.gps_start < end_time && file.gps_end() > start_time)
        .cloned()
        .collect();

    selected.sort_by(|a, b| a.gps_start.total_cmp(&b.gps_start));
    selected.dedup_by(|a, b| a.gps_start == b.gps_start);
    selected
}

/// Distinct formats of any files overlapping `[start, end)`
fn offered_formats(files: &[StrainFile], start_time: f64, end_time: f64) -> Vec<String> {
    let mut formats: Vec<String> = files
        .iter()
        .filter(|file| file.gps_start < end_time && file.gps_end() > start_time)
        .map(|file| file.format.to_lowercase())
        .collect();
    formats.sort();
    formats.dedup();
    formats
}

/// Inflate a gzip payload; plain text passes through unchanged
pub fn decompress(bytes: &[u8]) -> Result<String, FetchCause> {
    let mut text = String::new();
    if bytes.starts_with(&[0x1f, 0x8b]) {
        GzDecoder::new(bytes).read_to_string(&mut text)?;
    } else {
        text = String::from_utf8(bytes.to_vec())
            .map_err(|e| FetchCause::Malformed(format!("strain file is not UTF-8: {}", e)))?;
    }
    Ok(text)
}

/// Parse an ASCII strain file: `#` header lines, then one sample per line.
/// Missing data is kept as NaN; `stitch` rejects it only inside the requested span.
pub fn parse_strain_text(text: &str) -> Result<Vec<f64>, FetchCause> {
    let mut samples = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let value: f64 = line.parse().map_err(|_| {
            FetchCause::Malformed(format!("line {}: not a number: {:?}", line_no + 1, line))
        })?;
        if value.is_infinite() {
            return Err(FetchCause::Malformed(format!(
                "line {}: infinite sample",
                line_no + 1
            )));
        }
        samples.push(value);
    }

    if samples.is_empty() {
        return Err(FetchCause::Malformed("strain file has no samples".to_string()));
    }

    Ok(samples)
}

/// Join contiguous pieces and crop to `[start, end)`
pub fn stitch(pieces: Vec<TimeSeries>, start_time: f64, end_time: f64) -> Result<TimeSeries, FetchCause> {
    let mut pieces = pieces.into_iter();
    let first = pieces.next().ok_or(FetchCause::NoFiles)?;

    let sample_rate = first.sample_rate();
    let half_sample = 0.5 / sample_rate;
    let mut cursor = first.end_time();
    let mut samples = first.samples().to_vec();

    for piece in pieces {
        if piece.sample_rate() != sample_rate {
            return Err(FetchCause::Malformed(format!(
                "mixed sample rates: {} and {}",
                sample_rate,
                piece.sample_rate()
            )));
        }
        if (piece.start_time() - cursor).abs() > half_sample {
            return Err(FetchCause::Gap(cursor, piece.start_time()));
        }
        samples.extend_from_slice(piece.samples());
        cursor = piece.end_time();
    }

    let joined = TimeSeries::new(first.name(), first.start_time(), sample_rate, samples);

    if joined.start_time() > start_time + half_sample {
        return Err(FetchCause::Gap(start_time, joined.start_time()));
    }
    if joined.end_time() < end_time - half_sample {
        return Err(FetchCause::Gap(joined.end_time(), end_time));
    }

    let cropped = joined.cropped(start_time, end_time);
    if let Some(index) = cropped.samples().iter().position(|s| !s.is_finite()) {
        return Err(FetchCause::Malformed(format!(
            "missing samples (NaN) at GPS {}",
            cropped.time_at(index)
        )));
    }
    Ok(cropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn file(start: f64, duration: f64, format: &str) -> StrainFile {
        StrainFile {
            url: format!("https://example.org/H-H1-{}-{}.{}", start, duration, format),
            format: format.to_string(),
            gps_start: start,
            duration,
            sampling_rate: 4.0,
            detector: Some("H1".to_string()),
        }
    }

    #[test]
    fn test_listing_deserialize() {
        let payload = r#"{
            "strain": [
                {"url": "https://example.org/a.txt.gz", "format": "txt", "GPSstart": 1126257414,
                 "duration": 4096, "sampling_rate": 4096, "detector": "H1"},
                {"url": "https://example.org/a.hdf5", "format": "hdf5", "GPSstart": 1126257414,
                 "duration": 4096, "sampling_rate": 4096}
            ]
        }"#;
        let listing: StrainListing = serde_json::from_str(payload).unwrap();
        assert_eq!(listing.strain.len(), 2);
        assert_eq!(listing.strain[0].gps_start, 1126257414.0);
        assert_eq!(listing.strain[0].gps_end(), 1126261510.0);
        assert!(listing.strain[1].detector.is_none());
    }

    #[test]
    fn test_select_files_filters_and_orders() {
        let files = vec![
            file(20.0, 10.0, "txt"),
            file(10.0, 10.0, "hdf5"),
            file(10.0, 10.0, "txt"),
            file(40.0, 10.0, "txt"),
        ];
        let selected = select_files(&files, 12.0, 25.0);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].gps_start, 10.0);
        assert_eq!(selected[1].gps_start, 20.0);
    }

    #[test]
    fn test_parse_strain_text() {
        let text = "# Gravitational wave strain\n# Sample rate 4096 Hz\n1.5e-21\n-2.0e-21\n\n3e-22\n";
        let samples = parse_strain_text(text).unwrap();
        assert_eq!(samples, vec![1.5e-21, -2.0e-21, 3e-22]);
    }

    #[test]
    fn test_parse_strain_text_rejects_garbage() {
        assert!(matches!(
            parse_strain_text("# header\n1.0\nabc\n"),
            Err(FetchCause::Malformed(_))
        ));
        assert!(matches!(parse_strain_text("# only header\n"), Err(FetchCause::Malformed(_))));
        assert!(matches!(parse_strain_text("1.0\ninf\n"), Err(FetchCause::Malformed(_))));
    }

    #[test]
    fn test_decompress_gzip_and_plain() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"# h\n1.0\n").unwrap();
        let gz = encoder.finish().unwrap();

        assert_eq!(decompress(&gz).unwrap(), "# h\n1.0\n");
        assert_eq!(decompress(b"2.0\n").unwrap(), "2.0\n");
    }

    #[test]
    fn test_stitch_contiguous_and_crop() {
        let a = TimeSeries::new("H1:GWOSC-STRAIN", 10.0, 4.0, vec![1.0; 8]);
        let b = TimeSeries::new("H1:GWOSC-STRAIN", 12.0, 4.0, vec![2.0; 8]);

        let joined = stitch(vec![a, b], 11.0, 13.0).unwrap();
        assert_eq!(joined.start_time(), 11.0);
        assert_eq!(joined.len(), 8);
        assert_eq!(joined.samples()[..4], [1.0; 4]);
        assert_eq!(joined.samples()[4..], [2.0; 4]);
    }

    #[test]
    fn test_stitch_detects_gap() {
        let a = TimeSeries::new("H1:GWOSC-STRAIN", 10.0, 4.0, vec![1.0; 8]);
        let b = TimeSeries::new("H1:GWOSC-STRAIN", 13.0, 4.0, vec![2.0; 8]);
        assert!(matches!(stitch(vec![a, b], 10.0, 15.0), Err(FetchCause::Gap(_, _))));
    }

    #[test]
    fn test_stitch_requires_coverage() {
        let a = TimeSeries::new("H1:GWOSC-STRAIN", 10.0, 4.0, vec![1.0; 8]);
        assert!(matches!(stitch(vec![a], 9.0, 11.0), Err(FetchCause::Gap(_, _))));
    }

    #[test]
    fn test_invalid_span_is_data_unavailable() {
        let client = GwoscClient::new(
            "http://127.0.0.1:9",
            "O1",
            Duration::from_secs(1),
            None,
        )
        .unwrap();

        let err = client.fetch(Detector::H1, 20.0, 10.0, false).unwrap_err();
        let FetchError::DataUnavailable { detector, source, .. } = err;
        assert_eq!(detector, Detector::H1);
        assert!(matches!(source, FetchCause::InvalidSpan(_, _)));
    }

    #[test]
    fn test_listing_url() {
        let client = GwoscClient::new("https://gwosc.org/", "O1", Duration::from_secs(1), None).unwrap();
        assert_eq!(
            client.listing_url(Detector::L1, 1126259446.0, 1126259478.0),
            "https://gwosc.org/archive/links/O1/L1/1126259446/1126259478/json/"
        );
    }

    #[test]
    fn test_nan_outside_span_is_cropped_away() {
        let mut text = String::from("# strain\nnan\n");
        for i in 1..16 {
            text.push_str(&format!("{}\n", i as f64));
        }
        let samples = parse_strain_text(&text).unwrap();
        assert_eq!(samples.len(), 16);
        assert!(samples[0].is_nan());

        let piece = TimeSeries::new("H1:GWOSC-STRAIN", 10.0, 4.0, samples);
        let joined = stitch(vec![piece], 12.0, 14.0).unwrap();
        assert_eq!(joined.len(), 8);
        assert_eq!(joined.samples()[0], 8.0);
        assert!(joined.samples().iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_nan_inside_span_is_rejected() {
        let mut samples: Vec<f64> = (0..16).map(|i| i as f64).collect();
        samples[9] = f64::NAN;
        let piece = TimeSeries::new("H1:GWOSC-STRAIN", 10.0, 4.0, samples);

        match stitch(vec![piece], 12.0, 14.0) {
            Err(FetchCause::Malformed(message)) => assert!(message.contains("12.25")),
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_offered_formats() {
        let files = vec![
            file(10.0, 10.0, "hdf5"),
            file(10.0, 10.0, "GWF"),
            file(10.0, 10.0, "hdf5"),
            file(40.0, 10.0, "txt"),
        ];
        assert_eq!(offered_formats(&files, 12.0, 15.0), vec!["gwf", "hdf5"]);
        assert!(select_files(&files, 12.0, 15.0).is_empty());
    }

    #[test]
    fn test_unreachable_host_is_data_unavailable() {
        let client = GwoscClient::new("http://127.0.0.1:9", "O1", Duration::from_secs(2), None).unwrap();

        let err = client.fetch(Detector::L1, 1126259446.0, 1126259478.0, false).unwrap_err();
        let FetchError::DataUnavailable { detector, start, end, source } = err;
        assert_eq!(detector, Detector::L1);
        assert_eq!((start, end), (1126259446.0, 1126259478.0));
        assert!(matches!(source, FetchCause::Http(_)));
    }

    #[test]
    fn test_cached_download_skips_request() {
        let temp = tempfile::TempDir::new().unwrap();
        let cache = StrainCache::new(temp.path().join("cache"));
        let url = "http://127.0.0.1:9/archive/data/H-H1_LOSC_4_V1-1126256640-4096.txt.gz";
        cache.store(url, b"cached bytes").unwrap();

        // Nothing listens on port 9, so any request would fail
        let client = GwoscClient::new("http://127.0.0.1:9", "O1", Duration::from_secs(2), Some(cache)).unwrap();
        assert_eq!(client.download(url, true).unwrap(), b"cached bytes".to_vec());
        assert!(matches!(client.download(url, false), Err(FetchCause::Http(_))));
    }

    /// Answer `requests` HTTP GETs from `routes` (path -> body), 404 otherwise
    fn serve(listener: std::net::TcpListener, routes: Vec<(String, Vec<u8>)>, requests: usize) {
        use std::io::Read;

        std::thread::spawn(move || {
            for stream in listener.incoming().take(requests) {
                let mut stream = stream.unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = stream.read(&mut buf).unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                }

                let head = String::from_utf8_lossy(&request).to_string();
                let path = head.split_whitespace().nth(1).unwrap_or("").to_string();
                let (status, body) = routes
                    .iter()
                    .find(|(route, _)| *route == path)
                    .map(|(_, body)| ("200 OK", body.clone()))
                    .unwrap_or(("404 Not Found", Vec::new()));

                write!(
                    stream,
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status,
                    body.len()
                )
                .unwrap();
                stream.write_all(&body).unwrap();
            }
        });
    }

    #[test]
    fn test_fetch_downloads_and_caches() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let file_url = format!("{}/archive/data/H-H1_LOSC_4_V1-10-8.txt.gz", base);

        // 8 s at 4 Hz from GPS 10, with a missing first sample
        let mut text = String::from("# strain\nnan\n");
        for i in 1..32 {
            text.push_str(&format!("{:e}\n", i as f64 * 1e-21));
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        let gz = encoder.finish().unwrap();

        let listing = format!(
            r#"{{"strain": [{{"url": "{}", "format": "txt", "GPSstart": 10, "duration": 8, "sampling_rate": 4, "detector": "H1"}}]}}"#,
            file_url
        );
        serve(
            listener,
            vec![
                ("/archive/links/O1/H1/12/14/json/".to_string(), listing.into_bytes()),
                ("/archive/data/H-H1_LOSC_4_V1-10-8.txt.gz".to_string(), gz.clone()),
            ],
            2,
        );

        let temp = tempfile::TempDir::new().unwrap();
        let cache = StrainCache::new(temp.path().join("cache"));
        let client = GwoscClient::new(base, "O1", Duration::from_secs(5), Some(cache.clone())).unwrap();

        let series = client.fetch(Detector::H1, 12.0, 14.0, true).unwrap();
        assert_eq!(series.name(), "H1:GWOSC-STRAIN");
        assert_eq!(series.start_time(), 12.0);
        assert_eq!(series.sample_rate(), 4.0);
        assert_eq!(series.len(), 8);
        assert!((series.samples()[0] - 8e-21).abs() < 1e-30);

        assert_eq!(cache.load(&file_url).unwrap(), Some(gz));
    }
}
