use std::path::{Path, PathBuf};

use url::Url;

/// Upper bound on items per job, applied to every request.
pub const MAX_ITEMS: usize = 200;
/// Item count used when a request does not name one.
pub const DEFAULT_ITEMS: usize = 50;
/// Extension used when the URL does not carry a recognizable one.
pub const DEFAULT_EXTENSION: &str = "jpg";

const KNOWN_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff", "svg", "avif", "heic",
];

/// Clamps a client-requested item count to `MAX_ITEMS`.
pub fn clamp_max_items(requested: u64) -> usize {
    usize::try_from(requested).unwrap_or(MAX_ITEMS).min(MAX_ITEMS)
}

/// A discovered image URL bound to its slot in the job's output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    pub index: usize,
    pub url: String,
    pub extension: String,
    pub path: PathBuf,
}

impl CandidateItem {
    pub fn new(index: usize, url: impl Into<String>, output_dir: &Path) -> Self {
        let url = url.into();
        let extension = infer_extension(&url);
        let path = output_dir.join(candidate_filename(index, &extension));
        Self {
            index,
            url,
            extension,
            path,
        }
    }
}

/// `{index:03}.{extension}`, so a directory listing sorts in discovery order.
pub fn candidate_filename(index: usize, extension: &str) -> String {
    format!("{index:03}.{extension}")
}

/// Extension of the URL's final path segment, lowercased, or `jpg`.
pub fn infer_extension(url: &str) -> String {
    let segment = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|segments| segments.last().map(str::to_owned))
            .unwrap_or_default(),
        Err(_) => {
            let without_query = url.split(['?', '#']).next().unwrap_or(url);
            without_query
                .rsplit('/')
                .next()
                .unwrap_or(without_query)
                .to_string()
        }
    };

    segment
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| KNOWN_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}
