//! Adjacency-list ingest.
//!
//! One UTF-8 line per package: the package name followed by zero or more
//! tab-separated names of its direct dependencies. Empty lines and lines
//! starting with `#` are skipped; names that only ever appear as
//! dependencies are registered automatically. Files ending in `.gz` or
//! `.bz2` are decompressed transparently.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::graph::{GraphBuilder, PackageGraph};

/// Errors produced while reading an adjacency file.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),

    #[error("malformed input at line {line}: {reason}")]
    MalformedInput { line: usize, reason: String },
}

/// Reads an adjacency file into a [`PackageGraph`], decompressing by file
/// extension.
pub fn graph_from_adjacency_path(path: &Path) -> Result<PackageGraph, IngestError> {
    let file = File::open(path)?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let reader: Box<dyn Read> = match ext {
        "gz" => Box::new(flate2::read::GzDecoder::new(file)),
        "bz2" => Box::new(bzip2::read::BzDecoder::new(file)),
        _ => Box::new(file),
    };
    graph_from_adjacency_reader(BufReader::new(reader))
}

/// Reads adjacency lines from an arbitrary buffered reader.
pub fn graph_from_adjacency_reader<R: BufRead>(reader: R) -> Result<PackageGraph, IngestError> {
    let mut builder = GraphBuilder::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| {
            // Invalid UTF-8 surfaces as InvalidData from `lines()`; treat it
            // as a parse failure rather than an I/O failure.
            if e.kind() == io::ErrorKind::InvalidData {
                IngestError::MalformedInput {
                    line: line_no,
                    reason: "not valid UTF-8".to_string(),
                }
            } else {
                IngestError::Io(e)
            }
        })?;
        parse_line(&line, line_no, &mut builder)?;
    }
    let graph = builder.build();
    debug!(
        packages = graph.len(),
        arcs = graph.arc_count(),
        "adjacency ingest complete"
    );
    Ok(graph)
}

fn parse_line(line: &str, line_no: usize, builder: &mut GraphBuilder) -> Result<(), IngestError> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(());
    }
    let mut fields = trimmed.split('\t');
    let name = fields.next().unwrap_or_default();
    if name.is_empty() {
        return Err(IngestError::MalformedInput {
            line: line_no,
            reason: "empty package name".to_string(),
        });
    }
    builder.add_package(name);
    for dep in fields {
        if dep.is_empty() {
            return Err(IngestError::MalformedInput {
                line: line_no,
                reason: "empty dependency field".to_string(),
            });
        }
        builder.add_dependency(name, dep);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn parse(text: &str) -> Result<PackageGraph, IngestError> {
        graph_from_adjacency_reader(Cursor::new(text.to_string()))
    }

    #[test]
    fn parses_simple_adjacency() {
        let g = parse("app\tlib\tutil\nlib\tutil\n").unwrap();
        assert_eq!(g.len(), 3);
        // "app depends on lib" is stored as the propagation arc lib -> app.
        let lib = g.id_of("lib").unwrap();
        let app = g.id_of("app").unwrap();
        assert!(g.dependants_of(lib).contains(&app));
        assert_eq!(g.arc_count(), 3);
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let g = parse("# header\n\napp\tlib\n\n# trailer\n").unwrap();
        assert_eq!(g.len(), 2);
        assert_eq!(g.arc_count(), 1);
    }

    #[test]
    fn registers_dependency_only_names() {
        let g = parse("app\tghost\n").unwrap();
        assert!(g.contains("ghost"));
    }

    #[test]
    fn package_without_dependencies_is_registered() {
        let g = parse("loner\n").unwrap();
        assert!(g.contains("loner"));
        assert_eq!(g.arc_count(), 0);
    }

    #[test]
    fn empty_dependency_field_is_malformed() {
        let err = parse("app\t\tlib\n").unwrap_err();
        match err {
            IngestError::MalformedInput { line, .. } => assert_eq!(line, 1),
            other => panic!("expected MalformedInput, got {other}"),
        }
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let bytes = b"app\tlib\n\xff\xfe\n".to_vec();
        let err = graph_from_adjacency_reader(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, IngestError::MalformedInput { line: 2, .. }));
    }

    #[test]
    fn gzip_roundtrip_via_path() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.adj.gz");
        let file = File::create(&path).unwrap();
        let mut enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        enc.write_all(b"app\tlib\nlib\tcore\n").unwrap();
        enc.finish().unwrap();

        let g = graph_from_adjacency_path(&path).unwrap();
        assert_eq!(g.len(), 3);
        assert_eq!(g.arc_count(), 2);
    }

    #[test]
    fn bzip2_roundtrip_via_path() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.adj.bz2");
        let file = File::create(&path).unwrap();
        let mut enc = bzip2::write::BzEncoder::new(file, bzip2::Compression::default());
        enc.write_all(b"app\tlib\n").unwrap();
        enc.finish().unwrap();

        let g = graph_from_adjacency_path(&path).unwrap();
        assert_eq!(g.len(), 2);
        assert_eq!(g.arc_count(), 1);
    }
}
