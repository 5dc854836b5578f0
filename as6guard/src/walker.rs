//! Project tree discovery and file classification.
//!
//! The walker enumerates files under an Automation Studio project root and
//! classifies each by role. Unknown file types are skipped silently so that
//! newer project layouts do not break the scan. Symbolic links are never
//! followed; unreadable entries surface as walk events instead of aborting.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

/// Directories that never contain migratable sources.
const PRUNED_DIRS: &[&str] = &["Temp", "Binaries", "Diagnosis"];

/// How many bytes of an ambiguous file are inspected for a structural marker.
const SNIFF_LIMIT: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileRole {
    /// `*.apj` project descriptor.
    ProjectDescriptor,
    /// `*.pkg` package descriptor (object lists, library references).
    PackageDescriptor,
    /// `*.lby` library descriptor with dependency declarations.
    LibraryDescriptor,
    /// `*.hw` hardware configuration.
    HardwareConfig,
    /// `*.uad` OPC UA address model.
    OpcUaAddressModel,
    /// Structured Text / C-family source (`.st`, `.ab`, `.c`, `.cpp`,
    /// `.h`, `.hpp`).
    Source,
    /// IEC declaration files (`.typ`, `.var`, `.fun`).
    Declaration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Utf8,
    /// AS4 exports are ISO-8859-1; reads fall back to a byte-to-char decode.
    Latin1,
}

/// One file the walker recognized. Immutable; owned by the scan pass.
#[derive(Debug, Clone)]
pub struct ClassifiedFile {
    pub path: PathBuf,
    pub role: FileRole,
}

/// Result of visiting one directory entry.
#[derive(Debug)]
pub enum WalkEvent {
    File(ClassifiedFile),
    /// Entry could not be read (permissions, vanished mid-walk). Reported
    /// as a scan-error finding, never as a fatal failure.
    Unreadable { path: PathBuf, error: String },
}

pub struct ProjectWalker {
    root: PathBuf,
}

impl ProjectWalker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// First `*.apj` file directly inside the root, if any. The names are
    /// sorted so the choice is stable.
    pub fn find_project_descriptor(&self) -> std::io::Result<Option<PathBuf>> {
        let mut candidates: Vec<PathBuf> = std::fs::read_dir(&self.root)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case("apj"))
            })
            .collect();
        candidates.sort();
        Ok(candidates.into_iter().next())
    }

    /// Walk the tree and classify every recognized file. Each call re-walks
    /// from scratch; the sequence is finite and ordered by file name so
    /// repeated runs visit files in the same order.
    pub fn walk(&self) -> Vec<WalkEvent> {
        let mut events = Vec::new();
        let iter = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                // Depth 0 is the root itself and is never filtered; a
                // checkout directory may well carry a dot name.
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                let name = entry.file_name().to_str().unwrap_or("");
                !(name.starts_with('.') || PRUNED_DIRS.contains(&name))
            });

        for entry in iter {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone());
                    events.push(WalkEvent::Unreadable {
                        path,
                        error: err.to_string(),
                    });
                    continue;
                }
            };
            if entry.path_is_symlink() || !entry.file_type().is_file() {
                continue;
            }
            if let Some(file) = classify(entry.path()) {
                events.push(WalkEvent::File(file));
            }
        }
        events
    }
}

/// Classify a single path, sniffing ambiguous extensions.
pub fn classify(path: &Path) -> Option<ClassifiedFile> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let role = match ext.as_str() {
        "apj" => FileRole::ProjectDescriptor,
        "pkg" => FileRole::PackageDescriptor,
        "lby" => FileRole::LibraryDescriptor,
        "hw" => FileRole::HardwareConfig,
        "uad" => FileRole::OpcUaAddressModel,
        "st" | "ab" | "c" | "cpp" | "h" | "hpp" => FileRole::Source,
        "typ" | "var" | "fun" => FileRole::Declaration,
        "xml" => sniff_xml_role(path)?,
        _ => return None,
    };
    Some(ClassifiedFile {
        path: path.to_path_buf(),
        role,
    })
}

/// Look at a bounded prefix of an `.xml` file for a known root element.
fn sniff_xml_role(path: &Path) -> Option<FileRole> {
    let prefix = read_prefix(path, SNIFF_LIMIT).ok()?;
    let (text, _) = decode(&prefix);
    if text.contains("<Package") {
        Some(FileRole::PackageDescriptor)
    } else if text.contains("<Hardware") {
        Some(FileRole::HardwareConfig)
    } else {
        None
    }
}

fn read_prefix(path: &Path, limit: usize) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut buf = vec![0u8; limit];
    let mut read = 0;
    loop {
        let n = file.read(&mut buf[read..])?;
        if n == 0 {
            break;
        }
        read += n;
        if read == buf.len() {
            break;
        }
    }
    buf.truncate(read);
    Ok(buf)
}

/// Read a classified file: UTF-8 with a Latin-1 fallback, matching how AS4
/// writes its exports. The decode branch taken is returned with the content
/// so callers that write the file back can reproduce its bytes exactly.
pub fn read_classified(file: &ClassifiedFile) -> std::io::Result<(String, Encoding)> {
    let bytes = std::fs::read(&file.path)?;
    Ok(decode(&bytes))
}

/// Decode bytes as UTF-8 if valid, otherwise as Latin-1 (lossless).
pub fn decode(bytes: &[u8]) -> (String, Encoding) {
    match std::str::from_utf8(bytes) {
        Ok(s) => (s.to_string(), Encoding::Utf8),
        Err(_) => (
            bytes.iter().map(|&b| b as char).collect(),
            Encoding::Latin1,
        ),
    }
}

/// Encode text back in the encoding the file was read with. Characters
/// outside Latin-1 cannot come out of a Latin-1 decode plus ASCII-only
/// replacements; anything else becomes `?` rather than mojibake.
pub fn encode(text: &str, encoding: Encoding) -> Vec<u8> {
    match encoding {
        Encoding::Utf8 => text.as_bytes().to_vec(),
        Encoding::Latin1 => text
            .chars()
            .map(|c| if (c as u32) <= 0xFF { c as u8 } else { b'?' })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(
            classify(Path::new("proj/Main.apj")).map(|f| f.role),
            Some(FileRole::ProjectDescriptor)
        );
        assert_eq!(
            classify(Path::new("Logical/Package.pkg")).map(|f| f.role),
            Some(FileRole::PackageDescriptor)
        );
        assert_eq!(
            classify(Path::new("Physical/Cfg/Hardware.hw")).map(|f| f.role),
            Some(FileRole::HardwareConfig)
        );
        assert_eq!(
            classify(Path::new("prog/main.st")).map(|f| f.role),
            Some(FileRole::Source)
        );
        assert_eq!(
            classify(Path::new("MyLib/mylib.h")).map(|f| f.role),
            Some(FileRole::Source)
        );
        assert_eq!(
            classify(Path::new("prog/types.typ")).map(|f| f.role),
            Some(FileRole::Declaration)
        );
        assert!(classify(Path::new("readme.md")).is_none());
        assert!(classify(Path::new("no_extension")).is_none());
    }

    #[test]
    fn sniffs_ambiguous_xml() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("thing.xml");
        std::fs::write(&pkg, "<?xml version=\"1.0\"?>\n<Package>\n</Package>").unwrap();
        assert_eq!(classify(&pkg).map(|f| f.role), Some(FileRole::PackageDescriptor));

        let other = dir.path().join("other.xml");
        std::fs::write(&other, "<?xml version=\"1.0\"?>\n<Whatever/>").unwrap();
        assert!(classify(&other).is_none());
    }

    #[test]
    fn latin1_fallback_decodes_all_bytes() {
        let bytes: Vec<u8> = vec![b'a', 0xE4, b'b', 0xFF];
        let (text, encoding) = decode(&bytes);
        assert_eq!(text, "a\u{e4}b\u{ff}");
        assert_eq!(encoding, Encoding::Latin1);
        assert_eq!(encode(&text, Encoding::Latin1), bytes);
    }

    #[test]
    fn decode_branch_depends_on_the_whole_file() {
        // A lone Latin-1 byte far past any sniffable prefix still forces
        // the fallback, so write-back reproduces the original bytes.
        let mut bytes = vec![b'x'; 8 * 1024];
        bytes.extend_from_slice(b"(* L\xE4nge *)\n");
        let (text, encoding) = decode(&bytes);
        assert_eq!(encoding, Encoding::Latin1);
        assert_eq!(encode(&text, Encoding::Latin1), bytes);

        let (_, encoding) = decode(b"plain ascii only\n");
        assert_eq!(encoding, Encoding::Utf8);
    }

    #[test]
    fn walk_skips_pruned_dirs_and_unknown_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Logical")).unwrap();
        std::fs::create_dir_all(dir.path().join("Temp")).unwrap();
        std::fs::write(dir.path().join("Proj.apj"), "<Project/>").unwrap();
        std::fs::write(dir.path().join("Logical/main.st"), "x := 1;").unwrap();
        std::fs::write(dir.path().join("Logical/notes.txt"), "skip me").unwrap();
        std::fs::write(dir.path().join("Temp/cache.st"), "ignored").unwrap();

        let walker = ProjectWalker::new(dir.path());
        let events = walker.walk();
        let mut roles: Vec<FileRole> = events
            .iter()
            .filter_map(|e| match e {
                WalkEvent::File(f) => Some(f.role),
                _ => None,
            })
            .collect();
        roles.sort_by_key(|r| format!("{:?}", r));
        assert_eq!(roles, vec![FileRole::ProjectDescriptor, FileRole::Source]);
    }

    #[test]
    fn walks_a_dot_named_project_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join(".checkout");
        std::fs::create_dir_all(root.join("Logical")).unwrap();
        std::fs::write(root.join("Proj.apj"), "<Project/>").unwrap();
        std::fs::write(root.join("Logical/main.st"), "x := 1;").unwrap();

        let events = ProjectWalker::new(&root).walk();
        let files = events
            .iter()
            .filter(|e| matches!(e, WalkEvent::File(_)))
            .count();
        assert_eq!(files, 2);
    }

    #[test]
    fn finds_project_descriptor_deterministically() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Zeta.apj"), "").unwrap();
        std::fs::write(dir.path().join("Alpha.apj"), "").unwrap();
        let walker = ProjectWalker::new(dir.path());
        let found = walker.find_project_descriptor().unwrap().unwrap();
        assert_eq!(found.file_name().unwrap(), "Alpha.apj");
    }
}
