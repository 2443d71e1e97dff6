use std::fs;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// The fixed reference text a session is typed against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exercise {
    name: String,
    text: String,
}

impl Exercise {
    /// Empty texts are rejected here so a session never has to handle them.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let text = text.into();
        if text.is_empty() {
            return Err(Error::EmptyExercise(name));
        }
        Ok(Self { name, text })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// 1-based, inclusive line selection. Unset bounds mean start/end of file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineRange {
    pub start: Option<usize>,
    pub end: Option<usize>,
}

impl LineRange {
    pub fn new(start: Option<usize>, end: Option<usize>) -> Self {
        Self { start, end }
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason| Error::InvalidLineRange {
            start: self.start,
            end: self.end,
            reason,
        };
        if self.start == Some(0) || self.end == Some(0) {
            return Err(invalid("line numbers start at 1"));
        }
        if let (Some(s), Some(e)) = (self.start, self.end) {
            if s > e {
                return Err(invalid("start is after end"));
            }
        }
        Ok(())
    }

    /// Cut `text` down to the selected lines
    pub fn slice(&self, text: &str) -> Result<String> {
        self.validate()?;
        let lines: Vec<&str> = text.split_inclusive('\n').collect();
        let start = self.start.unwrap_or(1) - 1;
        let end = self.end.unwrap_or(lines.len()).min(lines.len());
        if start >= end {
            return Ok(String::new());
        }
        Ok(lines[start..end].concat())
    }
}

/// Read a file and slice it into an exercise named after the file
pub fn load_exercise(path: &Path, range: LineRange) -> Result<Exercise> {
    let raw = fs::read_to_string(path)?;
    let text = range.slice(&raw.replace("\r\n", "\n"))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    debug!(path = %path.display(), chars = text.chars().count(), "loaded exercise");
    Exercise::new(name, text)
}

/// All regular files directly inside `dir`, sorted for stable selection
pub fn list_exercises(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

pub fn pick_random<R: Rng + ?Sized>(dir: &Path, rng: &mut R) -> Result<PathBuf> {
    let files = list_exercises(dir)?;
    let picked = files
        .choose(rng)
        .cloned()
        .ok_or_else(|| Error::NoExercises(dir.to_path_buf()))?;
    info!(path = %picked.display(), pool = files.len(), "picked random exercise");
    Ok(picked)
}

/// Language tag stored alongside each rep, derived from the file extension
pub fn language_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("rs") => "rust",
        Some("go") => "go",
        Some("py") => "python",
        Some("js" | "mjs" | "cjs") => "javascript",
        Some("ts" | "tsx") => "typescript",
        Some("c" | "h") => "c",
        Some("cc" | "cpp" | "cxx" | "hpp") => "cpp",
        Some("java") => "java",
        Some("rb") => "ruby",
        Some("sh" | "bash") => "shell",
        Some("hs") => "haskell",
        Some("ml" | "mli") => "ocaml",
        Some("lua") => "lua",
        Some("md") => "markdown",
        _ => "text",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::tempdir;

    const SOURCE: &str = "fn main() {\n    println!(\"hi\");\n}\n";

    #[test]
    fn test_exercise_rejects_empty_text() {
        assert_matches!(Exercise::new("empty.rs", ""), Err(Error::EmptyExercise(name)) if name == "empty.rs");
        let ex = Exercise::new("a.rs", "x").unwrap();
        assert_eq!(ex.name(), "a.rs");
        assert_eq!(ex.text(), "x");
    }

    #[test]
    fn test_slice_whole_text() {
        assert_eq!(LineRange::default().slice(SOURCE).unwrap(), SOURCE);
    }

    #[test]
    fn test_slice_middle_line_keeps_newline() {
        let range = LineRange::new(Some(2), Some(2));
        assert_eq!(range.slice(SOURCE).unwrap(), "    println!(\"hi\");\n");
    }

    #[test]
    fn test_slice_clamps_end() {
        let range = LineRange::new(Some(3), Some(99));
        assert_eq!(range.slice(SOURCE).unwrap(), "}\n");
    }

    #[test]
    fn test_slice_past_end_is_empty() {
        let range = LineRange::new(Some(10), None);
        assert_eq!(range.slice(SOURCE).unwrap(), "");
    }

    #[test]
    fn test_invalid_ranges() {
        assert_matches!(
            LineRange::new(Some(0), None).slice(SOURCE),
            Err(Error::InvalidLineRange { .. })
        );
        assert_matches!(
            LineRange::new(Some(3), Some(2)).slice(SOURCE),
            Err(Error::InvalidLineRange { .. })
        );
    }

    #[test]
    fn test_load_exercise_normalizes_crlf() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("main.rs");
        fs::write(&path, "a\r\nb\r\n").unwrap();

        let ex = load_exercise(&path, LineRange::default()).unwrap();
        assert_eq!(ex.name(), "main.rs");
        assert_eq!(ex.text(), "a\nb\n");
    }

    #[test]
    fn test_load_exercise_rejects_empty_slice() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.py");
        fs::write(&path, "x = 1\n").unwrap();

        let res = load_exercise(&path, LineRange::new(Some(5), None));
        assert_matches!(res, Err(Error::EmptyExercise(_)));
    }

    #[test]
    fn test_pick_random() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "a").unwrap();
        fs::write(dir.path().join("b.rs"), "b").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            let picked = pick_random(dir.path(), &mut rng).unwrap();
            assert!(picked.is_file());
        }
    }

    #[test]
    fn test_pick_random_empty_dir() {
        let dir = tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        assert_matches!(pick_random(dir.path(), &mut rng), Err(Error::NoExercises(_)));
    }

    #[test]
    fn test_language_for_path() {
        assert_eq!(language_for_path(Path::new("src/main.rs")), "rust");
        assert_eq!(language_for_path(Path::new("x.PY")), "python");
        assert_eq!(language_for_path(Path::new("Makefile")), "text");
    }
}
