use std::{
    fs::{File, OpenOptions},
    io,
    path::Path,
};

/// Opens `<log_dir>/<file_name>` for appending, creating the directory.
/// A blank `log_dir` disables file logging.
pub fn open_log_file(log_dir: &str, file_name: &str) -> io::Result<Option<File>> {
    if log_dir.trim().is_empty() {
        return Ok(None);
    }
    let dir = Path::new(log_dir);
    std::fs::create_dir_all(dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(file_name))?;
    Ok(Some(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn blank_dir_disables_file_logging() {
        assert!(open_log_file("  ", "rv-hub.log").expect("open").is_none());
    }

    #[test]
    fn creates_nested_directory_and_appends() {
        let root = std::env::temp_dir().join(format!("rv-logfile-{}", std::process::id()));
        let dir = root.join("nested").join("logs");
        let dir_str = dir.to_string_lossy().to_string();

        for line in ["first\n", "second\n"] {
            let mut file = open_log_file(&dir_str, "rv-test.log")
                .expect("open")
                .expect("file");
            file.write_all(line.as_bytes()).expect("write");
        }

        let written = std::fs::read_to_string(dir.join("rv-test.log")).expect("read");
        assert_eq!(written, "first\nsecond\n");
        let _ = std::fs::remove_dir_all(root);
    }
}
