use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::reference::ChrReference;

/// Load one chromosome's sequence from a FASTA (or raw sequence) file.
///
/// A headerless file is treated as a single unnamed sequence. When headers
/// are present the record whose first word matches `name` is selected.
pub fn load_reference<P: AsRef<Path>>(path: P, name: &str) -> Result<ChrReference> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read reference from {}", path.display()))?;

    if !contents.contains('>') {
        let sequence: String = contents.split_whitespace().collect();
        return Ok(ChrReference::new(name, sequence.into_bytes()));
    }

    let mut selected = false;
    let mut sequence = String::new();
    for line in contents.lines() {
        if let Some(header) = line.strip_prefix('>') {
            if selected {
                break;
            }
            selected = header.split_whitespace().next() == Some(name);
            continue;
        }
        if selected {
            sequence.push_str(line.trim());
        }
    }

    if !selected {
        bail!("sequence '{}' not found in {}", name, path.display());
    }
    Ok(ChrReference::new(name, sequence.into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "moray-fasta-test-{}-{}.fa",
            std::process::id(),
            contents.len()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_named_record() {
        let path = write_temp(">chr1 test\nACGT\nacgt\n>chr2\nTTTT\n");
        let reference = load_reference(&path, "chr1").unwrap();
        assert_eq!(reference.len(), 8);
        assert_eq!(reference.base_at(5), Some(b'A'));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn loads_headerless_sequence() {
        let path = write_temp("ACG\nTAC\n");
        let reference = load_reference(&path, "chrX").unwrap();
        assert_eq!(reference.len(), 6);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_record_is_an_error() {
        let path = write_temp(">chr1\nACGT\n");
        assert!(load_reference(&path, "chr9").is_err());
        std::fs::remove_file(path).ok();
    }
}
