//! Static file responder (C7).
//!
//! Resolves a filesystem path through the [`Filesystem`] collaborator,
//! preferring a pre-compressed `.gz` sibling when the client advertises
//! `Accept-Encoding: gzip` and it exists. The file is never loaded whole
//! into memory: [`BodySource::File`](crate::response::BodySource::File)
//! streams it through C3 in fixed-size chunks.

use crate::headers::Headers;
use crate::io::fs::Filesystem;
use crate::response::{synthesize, BodySource, Response};
use std::path::{Path, PathBuf};

/// Serves `path` from `fs`, choosing the gzip variant when both the file
/// and the client's acceptance of it are present. `content_type` is
/// supplied by the caller — this responder does not guess MIME types.
pub fn serve<F: Filesystem>(fs: &F, path: &Path, headers: &Headers, content_type: &str) -> Response
where
    F::Stream: 'static,
{
    let accepts_gzip = headers.contains_token("Accept-Encoding", "gzip");
    let gz_path = gzip_sibling(path);

    let (chosen, gzipped) = if accepts_gzip && fs.exists(&gz_path) {
        (gz_path, true)
    } else if fs.exists(path) {
        (path.to_path_buf(), false)
    } else {
        return synthesize(404, "Not Found");
    };

    let size = match fs.size(&chosen) {
        Ok(n) => n,
        Err(_) => return synthesize(404, "Not Found"),
    };
    let stream = match fs.open_read(&chosen) {
        Ok(s) => s,
        Err(_) => return synthesize(404, "Not Found"),
    };

    let mut response = Response::new(200, "OK").with_header("Content-Type", content_type);
    if gzipped {
        response = response.with_header("Content-Encoding", "gzip");
    }
    response.body = BodySource::File(Box::new(stream), size);
    response
}

fn gzip_sibling(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".gz");
    PathBuf::from(s)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::fs::FileStream;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io;
    use std::rc::Rc;

    #[derive(Default)]
    struct InMemoryFs {
        files: HashMap<PathBuf, Vec<u8>>,
    }

    struct InMemoryStream(Rc<RefCell<std::io::Cursor<Vec<u8>>>>);

    impl FileStream for InMemoryStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            std::io::Read::read(&mut *self.0.borrow_mut(), buf)
        }
    }

    impl Filesystem for InMemoryFs {
        type Stream = InMemoryStream;

        fn exists(&self, path: &Path) -> bool {
            self.files.contains_key(path)
        }

        fn size(&self, path: &Path) -> io::Result<u64> {
            self.files.get(path).map(|b| b.len() as u64).ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }

        fn open_read(&self, path: &Path) -> io::Result<InMemoryStream> {
            self.files
                .get(path)
                .map(|b| InMemoryStream(Rc::new(RefCell::new(std::io::Cursor::new(b.clone())))))
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }
    }

    fn headers_with(name: &str, value: &str) -> Headers {
        let mut h = Headers::new();
        h.insert_first_seen(name, value);
        h
    }

    #[test]
    fn prefers_gzip_variant_when_accepted_and_present() {
        let mut fs = InMemoryFs::default();
        fs.files.insert(PathBuf::from("jquery.js"), b"plain".to_vec());
        fs.files.insert(PathBuf::from("jquery.js.gz"), b"gz-bytes".to_vec());
        let headers = headers_with("Accept-Encoding", "gzip");
        let response = serve(&fs, Path::new("jquery.js"), &headers, "application/javascript");
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body.known_length(), Some(8));
        assert!(response.headers.iter().any(|(n, v)| n == "Content-Encoding" && v == "gzip"));
    }

    #[test]
    fn serves_uncompressed_when_header_absent() {
        let mut fs = InMemoryFs::default();
        fs.files.insert(PathBuf::from("jquery.js"), b"plain".to_vec());
        fs.files.insert(PathBuf::from("jquery.js.gz"), b"gz-bytes".to_vec());
        let response = serve(&fs, Path::new("jquery.js"), &Headers::new(), "application/javascript");
        assert_eq!(response.body.known_length(), Some(5));
        assert!(!response.headers.iter().any(|(n, _)| n == "Content-Encoding"));
    }

    #[test]
    fn missing_file_is_404() {
        let fs = InMemoryFs::default();
        let response = serve(&fs, Path::new("missing.js"), &Headers::new(), "application/javascript");
        assert_eq!(response.status_code, 404);
    }
}
