use std::{fmt::Debug, fs, path::Path};

use bytes::Bytes;
use http_body::Body as HttpBody;
use http_body_util::BodyExt;
use tempfile::TempDir;

pub(crate) async fn body_into_text<B>(body: B) -> String
where
    B: HttpBody<Data = Bytes>,
    B::Error: Debug,
{
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Projects directory laid out like a real checkout: every listed project gets
/// an `index.html` with a closing body tag.
pub(crate) fn workspace(projects: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for project in projects {
        write(
            &dir.path().join(project).join("index.html"),
            &format!("<html><body><h1>{project}</h1></body></html>"),
        );
    }
    dir
}

pub(crate) fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}
