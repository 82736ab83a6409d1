use std::{io, path::Path};

use tokio::fs;

use crate::markup::escape;

const STYLE: &str = "\
body{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;max-width:800px;margin:50px auto;padding:20px;background:#f5f5f5}
h1{color:#dc2626;font-weight:300;margin-bottom:30px}
.projects{display:grid;grid-template-columns:repeat(auto-fill,minmax(200px,1fr));gap:15px}
.project{background:white;padding:20px;border-radius:8px;box-shadow:0 2px 4px rgba(0,0,0,0.1);text-decoration:none;color:#333;transition:transform 0.2s,box-shadow 0.2s}
.project:hover{transform:translateY(-2px);box-shadow:0 4px 8px rgba(0,0,0,0.15)}
.project-name{font-weight:500;margin-bottom:5px}
.project-path{font-size:0.85em;color:#666}";

/// Root page with one card per project.
pub fn registry_listing(projects: &[String]) -> String {
    let mut html = format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n\
         <meta charset=\"UTF-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
         <title>NRD System - Projects</title>\n<style>\n{STYLE}\n</style>\n</head>\n<body>\n\
         <h1>NRD System - Available Projects</h1>\n<div class=\"projects\">\n"
    );
    for project in projects {
        let project = escape(project);
        html.push_str(&format!(
            "  <a href=\"/{project}/\" class=\"project\">\n    \
             <div class=\"project-name\">{project}</div>\n    \
             <div class=\"project-path\">/{project}/</div>\n  </a>\n"
        ));
    }
    html.push_str("</div>\n</body>\n</html>\n");
    html
}

/// Plain index of a directory, entries sorted, subdirectories suffixed with `/`.
pub async fn directory_listing(dir: &Path, request_path: &str) -> io::Result<String> {
    let mut read_dir = fs::read_dir(dir).await?;
    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
        entries.push(if is_dir { format!("{name}/") } else { name });
    }
    entries.sort_by_key(|name| name.to_lowercase());

    let title = escape(request_path);
    let mut html = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Directory listing for {title}</title>\n</head>\n<body>\n\
         <h1>Directory listing for {title}</h1>\n<hr>\n<ul>\n"
    );
    for name in &entries {
        let href = url_escape::encode_path(name);
        html.push_str(&format!("<li><a href=\"{href}\">{}</a></li>\n", escape(name)));
    }
    html.push_str("</ul>\n<hr>\n</body>\n</html>\n");
    Ok(html)
}
