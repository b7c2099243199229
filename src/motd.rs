//! MOTD file loading.
//!
//! Grounded on `original_source/pyircd/__init__.py`'s registration-time MOTD
//! read (opened once, read line by line), with one deliberate change: the
//! original raises and aborts registration if the file is missing, while
//! here a missing file just yields an empty body, so registration still
//! completes with only the start/end markers.

/// Loads the MOTD body as a sequence of lines with line endings stripped.
/// Each line is later rendered by [`crate::replies::Reply::Motd`], which
/// adds the `- ` prefix — this function returns the raw text.
pub fn load(path: &str) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => content.lines().map(str::to_owned).collect(),
        Err(err) => {
            log::warn!("motd file {path} not readable ({err}); serving an empty motd");
            Vec::new()
        }
    }
}
