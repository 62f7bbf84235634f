//! Cover-art download with per-source URL rewrites and frame normalization.

use std::io::Read;
use std::time::Duration;

use image::{imageops, imageops::FilterType, RgbaImage};
use log::{debug, warn};

use crate::config::ThumbnailConfig;
use crate::error::FetchError;
use crate::image_pipeline::decode_rgba_from_memory;

const USER_AGENT: &str = concat!("trackthumb/", env!("CARGO_PKG_VERSION"));

/// Providers whose images get forced into one frame size.
const NORMALIZED_FRAME: (u32, u32) = (640, 360);

struct SourceRule {
    prefix: &'static str,
    /// (from, to) substring replacement applied before the request.
    rewrite: Option<(&'static str, &'static str)>,
    frame: Option<(u32, u32)>,
}

const SOURCE_RULES: &[SourceRule] = &[
    SourceRule {
        prefix: "https://is1-ssl.mzstatic.com",
        rewrite: Some(("500x500bb.jpg", "600x600bb.jpg")),
        frame: None,
    },
    SourceRule {
        prefix: "https://i.ytimg.com",
        rewrite: None,
        frame: Some(NORMALIZED_FRAME),
    },
    SourceRule {
        prefix: "http://c.saavncdn.com",
        rewrite: None,
        frame: Some(NORMALIZED_FRAME),
    },
    SourceRule {
        prefix: "https://i1.sndcdn",
        rewrite: None,
        frame: Some(NORMALIZED_FRAME),
    },
];

fn matching_rule(url: &str) -> Option<&'static SourceRule> {
    SOURCE_RULES.iter().find(|rule| url.starts_with(rule.prefix))
}

/// URL actually requested for `url`, after source-specific rewrites.
pub fn rewrite_source_url(url: &str) -> String {
    match matching_rule(url).and_then(|rule| rule.rewrite) {
        Some((from, to)) => url.replace(from, to),
        None => url.to_string(),
    }
}

/// Fixed frame the decoded image must be resized to, if the source has one.
pub fn normalized_frame_for(url: &str) -> Option<(u32, u32)> {
    matching_rule(url).and_then(|rule| rule.frame)
}

pub fn apply_source_rules(url: &str, image: RgbaImage) -> RgbaImage {
    match normalized_frame_for(url) {
        Some((width, height)) if image.dimensions() != (width, height) => {
            imageops::resize(&image, width, height, FilterType::Lanczos3)
        }
        _ => image,
    }
}

/// Retrieves a cover image and decodes it to RGBA.
pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<RgbaImage, FetchError>;
}

/// Blocking HTTP fetcher with one bounded-timeout attempt per call.
pub struct UreqImageFetcher {
    http_client: ureq::Agent,
    max_image_bytes: u64,
}

impl UreqImageFetcher {
    pub fn new(timeout: Duration, max_image_bytes: u64) -> Self {
        let http_client = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build();
        Self {
            http_client,
            max_image_bytes: max_image_bytes.max(1),
        }
    }

    pub fn from_config(config: &ThumbnailConfig) -> Self {
        Self::new(
            Duration::from_secs(config.fetch_timeout_secs.max(1)),
            config.max_image_bytes,
        )
    }

    fn is_timeout_io(error: &std::io::Error) -> bool {
        matches!(
            error.kind(),
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
        ) || error.to_string().to_ascii_lowercase().contains("timed out")
    }

    fn classify_ureq_failure(url: &str, error: ureq::Error) -> FetchError {
        match error {
            ureq::Error::Status(status, _) => FetchError::Status {
                url: url.to_string(),
                status,
            },
            ureq::Error::Transport(transport) => {
                let io_timeout = std::error::Error::source(&transport)
                    .and_then(|source| source.downcast_ref::<std::io::Error>())
                    .is_some_and(Self::is_timeout_io);
                let message = transport.to_string();
                let lowered = message.to_ascii_lowercase();
                if io_timeout || lowered.contains("timed out") || lowered.contains("timeout") {
                    FetchError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    FetchError::Transport {
                        url: url.to_string(),
                        message,
                    }
                }
            }
        }
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .http_client
            .get(url)
            .call()
            .map_err(|error| Self::classify_ureq_failure(url, error))?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(self.max_image_bytes.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|source| {
                if Self::is_timeout_io(&source) {
                    FetchError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    FetchError::Read {
                        url: url.to_string(),
                        source,
                    }
                }
            })?;
        if bytes.len() as u64 > self.max_image_bytes {
            return Err(FetchError::TooLarge {
                url: url.to_string(),
                limit: self.max_image_bytes,
            });
        }
        Ok(bytes)
    }

    fn fetch_and_decode(&self, url: &str) -> Result<RgbaImage, FetchError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(FetchError::MissingUrl);
        }
        let request_url = rewrite_source_url(url);
        let bytes = self.download(&request_url)?;
        let decoded = decode_rgba_from_memory(&bytes).ok_or_else(|| FetchError::Decode {
            url: request_url.clone(),
        })?;
        debug!(
            "Fetched cover art {} ({}x{})",
            request_url,
            decoded.width(),
            decoded.height()
        );
        Ok(apply_source_rules(&request_url, decoded))
    }
}

impl ImageFetcher for UreqImageFetcher {
    fn fetch(&self, url: &str) -> Result<RgbaImage, FetchError> {
        let result = self.fetch_and_decode(url);
        if let Err(err) = &result {
            if !matches!(err, FetchError::MissingUrl) {
                warn!("Image loading error: {}", err);
            }
        }
        result
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serves exactly one HTTP response on a loopback port and returns its URL.
    pub(crate) fn serve_once(status_line: &'static str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
        let addr = listener.local_addr().expect("listener address");
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = [0u8; 2048];
                let _ = stream.read(&mut request);
                let header = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(header.as_bytes());
                let _ = stream.write_all(&body);
                let _ = stream.flush();
            }
        });
        format!("http://{addr}/cover.png")
    }

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(width, height, image::Rgba([30, 60, 90, 255]));
        let mut cursor = std::io::Cursor::new(Vec::new());
        image
            .write_to(&mut cursor, image::ImageFormat::Png)
            .expect("png encoding should succeed");
        cursor.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{png_bytes, serve_once};
    use super::{
        apply_source_rules, normalized_frame_for, rewrite_source_url, ImageFetcher,
        UreqImageFetcher,
    };
    use crate::error::FetchError;
    use image::{Rgba, RgbaImage};
    use std::net::TcpListener;
    use std::time::Duration;

    fn fetcher() -> UreqImageFetcher {
        UreqImageFetcher::new(Duration::from_secs(5), 1024 * 1024)
    }

    #[test]
    fn test_rewrite_source_url_upgrades_apple_cover_size() {
        assert_eq!(
            rewrite_source_url("https://is1-ssl.mzstatic.com/image/thumb/a/500x500bb.jpg"),
            "https://is1-ssl.mzstatic.com/image/thumb/a/600x600bb.jpg"
        );
        assert_eq!(
            rewrite_source_url("https://is1-ssl.mzstatic.com/image/thumb/a/100x100bb.jpg"),
            "https://is1-ssl.mzstatic.com/image/thumb/a/100x100bb.jpg"
        );
        assert_eq!(
            rewrite_source_url("https://cdn.example/500x500bb.jpg"),
            "https://cdn.example/500x500bb.jpg"
        );
    }

    #[test]
    fn test_normalized_frame_applies_only_to_listed_providers() {
        assert_eq!(
            normalized_frame_for("https://i.ytimg.com/vi/abc/hqdefault.jpg"),
            Some((640, 360))
        );
        assert_eq!(
            normalized_frame_for("http://c.saavncdn.com/123/cover.jpg"),
            Some((640, 360))
        );
        assert_eq!(
            normalized_frame_for("https://i1.sndcdn.com/artworks-1.jpg"),
            Some((640, 360))
        );
        assert_eq!(normalized_frame_for("https://is1-ssl.mzstatic.com/a.jpg"), None);
        assert_eq!(normalized_frame_for("https://cdn.example/a.jpg"), None);
    }

    #[test]
    fn test_apply_source_rules_resizes_provider_images_to_frame() {
        let square = RgbaImage::from_pixel(480, 480, Rgba([1, 2, 3, 255]));
        let framed = apply_source_rules("https://i.ytimg.com/vi/x/0.jpg", square.clone());
        assert_eq!(framed.dimensions(), (640, 360));

        let untouched = apply_source_rules("https://cdn.example/a.jpg", square);
        assert_eq!(untouched.dimensions(), (480, 480));
    }

    #[test]
    fn test_fetch_empty_url_fails_without_request() {
        assert!(matches!(fetcher().fetch(""), Err(FetchError::MissingUrl)));
        assert!(matches!(fetcher().fetch("   "), Err(FetchError::MissingUrl)));
    }

    #[test]
    fn test_fetch_decodes_served_png() {
        let url = serve_once("200 OK", png_bytes(32, 16));
        let image = fetcher().fetch(&url).expect("served png should decode");
        assert_eq!(image.dimensions(), (32, 16));
        assert_eq!(image.get_pixel(0, 0), &Rgba([30, 60, 90, 255]));
    }

    #[test]
    fn test_fetch_reports_http_status() {
        let url = serve_once("404 Not Found", b"missing".to_vec());
        match fetcher().fetch(&url) {
            Err(FetchError::Status { status, .. }) => assert_eq!(status, 404),
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn test_fetch_reports_undecodable_body() {
        let url = serve_once("200 OK", b"<html>oops</html>".to_vec());
        assert!(matches!(
            fetcher().fetch(&url),
            Err(FetchError::Decode { .. })
        ));
    }

    #[test]
    fn test_fetch_rejects_oversized_body() {
        let url = serve_once("200 OK", png_bytes(64, 64));
        let small = UreqImageFetcher::new(Duration::from_secs(5), 16);
        assert!(matches!(
            small.fetch(&url),
            Err(FetchError::TooLarge { limit: 16, .. })
        ));
    }

    #[test]
    fn test_fetch_reports_unreachable_host() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.local_addr().expect("addr").port()
        };
        let result = fetcher().fetch(&format!("http://127.0.0.1:{port}/cover.png"));
        assert!(matches!(
            result,
            Err(FetchError::Transport { .. }) | Err(FetchError::Timeout { .. })
        ));
    }

    #[test]
    fn test_fetch_times_out_on_silent_server() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let holder = std::thread::spawn(move || {
            let accepted = listener.accept();
            std::thread::sleep(Duration::from_millis(1500));
            drop(accepted);
        });

        let quick = UreqImageFetcher::new(Duration::from_millis(300), 1024);
        let result = quick.fetch(&format!("http://{addr}/cover.png"));
        assert!(
            matches!(
                result,
                Err(FetchError::Timeout { .. }) | Err(FetchError::Transport { .. })
            ),
            "unexpected result {result:?}"
        );
        let _ = holder.join();
    }
}
