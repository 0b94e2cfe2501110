//! HTML rendering for directory listings and download confirmations.

use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write;
use std::path::Path;

use crate::ftp::DirectoryEntry;
use crate::path::RemotePath;

const STYLE: &str = r#"
        body { font-family: Arial, sans-serif; margin: 20px; }
        .file-list { list-style: none; padding: 0; }
        .file-list li { margin: 10px 0; padding: 5px; border-bottom: 1px solid #eee; }
        .upload-form { margin: 20px 0; padding: 10px; background: #f5f5f5; }
        .meta { color: #777; }
"#;

/// Renders the listing of `current` in the order the server returned it.
pub fn render_listing(current: &RemotePath, entries: &[DirectoryEntry]) -> String {
    let path_text = encode_text(current.as_str());
    let path_attr = encode_double_quoted_attribute(current.as_str());
    let mut html = String::with_capacity(1024 + entries.len() * 160);

    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>/{path_text}</title>
    <style>{STYLE}</style>
</head>
<body>
<h1>Directory: /{path_text}</h1>
<div class="upload-form">
    <h3>Upload File</h3>
    <form action="/upload" method="post" enctype="multipart/form-data">
        <input type="hidden" name="path" value="{path_attr}">
        <input type="file" name="file" required>
        <input type="submit" value="Upload">
    </form>
</div>
<ul class="file-list">
"#
    );

    if !current.is_root() {
        let _ = writeln!(
            html,
            r#"<li><a href="{}">..</a></li>"#,
            encode_double_quoted_attribute(&current.parent().browse_href())
        );
    }

    for entry in entries {
        if entry.name == "." || entry.name == ".." {
            continue;
        }
        let target = current.join(&entry.name);
        let browse = encode_double_quoted_attribute(&target.browse_href()).into_owned();
        let name = encode_text(&entry.name);
        let modified = entry
            .modified
            .as_deref()
            .map(|value| format!(r#" <span class="meta">{}</span>"#, encode_text(value)))
            .unwrap_or_default();

        if entry.is_dir() {
            let _ = writeln!(
                html,
                r#"<li>📁 <a href="{browse}">{name}/</a> ({} bytes){modified}</li>"#,
                entry.size
            );
        } else {
            let download = encode_double_quoted_attribute(&target.download_href()).into_owned();
            let _ = writeln!(
                html,
                r#"<li>📄 <a href="{browse}">{name}</a> ({} bytes){modified}
    <a href="{download}" style="margin-left: 10px;">[Download]</a>
</li>"#,
                entry.size
            );
        }
    }

    html.push_str("</ul>\n</body>\n</html>\n");
    html
}

/// Confirmation page after a file was saved under `local_path`.
pub fn render_download_saved(local_path: &Path, back_to: &RemotePath) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Download complete</title></head>
<body>
<h2>File Downloaded Successfully!</h2>
<p>File saved to: {}</p>
<p><a href="{}">Back to directory</a></p>
</body>
</html>
"#,
        encode_text(&local_path.display().to_string()),
        encode_double_quoted_attribute(&back_to.browse_href())
    )
}
