//! Composite target path handling
//!
//! The cluster addresses a remote target bucket through a single path string:
//! an optional sub-path prefix joined with the bucket name, cleaned with
//! POSIX semantics. The final path segment is always the bucket name, which
//! is also how destination references are matched back to buckets on read.

/// Join a target bucket name with an optional sub-path prefix into the
/// composite path the cluster uses to address the target.
pub fn compose(bucket: &str, sub_path: &str) -> String {
    if sub_path.is_empty() {
        return bucket.to_string();
    }
    clean(&format!("./{}/{}", sub_path, bucket))
}

/// Split a composite path back into `(bucket, sub_path)`. The last segment is
/// the bucket; everything before it is the sub-path (empty when the path has
/// no separator).
pub fn decompose(path: &str) -> (String, String) {
    match path.rfind('/') {
        Some(idx) => (path[idx + 1..].to_string(), path[..idx].to_string()),
        None => (path.to_string(), String::new()),
    }
}

/// Lexical POSIX path cleaning: collapse duplicate separators, drop `.`
/// segments and resolve `..` against preceding segments.
fn clean(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if rooted => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (rooted, joined.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}
