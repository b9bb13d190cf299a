//! Content type by file extension, for the static file server.

use std::path::Path;

/// Content type for a file name, `application/octet-stream` when unknown.
///
/// ```
/// use std::path::Path;
/// use tsu_ext::mime::for_path;
///
/// assert_eq!(for_path(Path::new("index.HTML")), "text/html; charset=utf-8");
/// assert_eq!(for_path(Path::new("blob")), "application/octet-stream");
/// ```
pub fn for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    for_extension(ext.as_deref().unwrap_or(""))
}

/// Content type for a lowercase extension without the dot.
pub fn for_extension(ext: &str) -> &'static str {
    match ext {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "txt" | "md" => "text/plain; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "xml" => "text/xml; charset=utf-8",

        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "wasm" => "application/wasm",

        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "avif" => "image/avif",

        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "ogv" => "video/ogg",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",

        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",

        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",

        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_types() {
        assert_eq!(for_extension("css"), "text/css; charset=utf-8");
        assert_eq!(for_extension("js"), "text/javascript; charset=utf-8");
        assert_eq!(for_extension("svg"), "image/svg+xml");
        assert_eq!(for_path(Path::new("/srv/a.tar.gz")), "application/gzip");
    }

    #[test]
    fn unknown_extension() {
        assert_eq!(for_extension("xyz"), "application/octet-stream");
        assert_eq!(for_path(Path::new(".hidden")), "application/octet-stream");
    }
}
