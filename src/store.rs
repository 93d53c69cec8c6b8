use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use thiserror::Error;

use crate::model::Stable;

pub const ID_FILE: &str = "ids.txt";
pub const ERROR_FILE: &str = "errIds.txt";
pub const DATA_FILE: &str = "portalData.json";
pub const GEOCODED_FILE: &str = "geocoded.json";

/// One ID per line, blanks skipped.
pub fn read_ids(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("opening id list {}", path.display()))?;
    let mut ids = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        let id = line.trim();
        if !id.is_empty() {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}

pub fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Line-per-entry writer for ID and failure lists.
pub struct IdWriter<W: Write> {
    out: W,
    written: usize,
}

impl<W: Write> IdWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    pub fn write(&mut self, id: &str) -> std::io::Result<()> {
        writeln!(self.out, "{}", id)?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.out.flush()
    }

    #[cfg(test)]
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn finish(mut self) -> std::io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

#[derive(Debug, Error)]
pub enum RecordWriteError {
    #[error("serializing stable {id}: {source}")]
    Serialize {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Success list: one JSON object per line.
pub struct RecordWriter<W: Write> {
    out: W,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Serialization happens before anything is written, so a failed record
    /// leaves no partial line behind.
    pub fn write(&mut self, stable: &Stable) -> Result<(), RecordWriteError> {
        let line = serde_json::to_string(stable).map_err(|source| RecordWriteError::Serialize {
            id: stable.id.clone(),
            source,
        })?;
        writeln!(self.out, "{}", line)?;
        Ok(())
    }

    pub fn finish(mut self) -> std::io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Records from a success list, one decode result per non-blank line.
///
/// Lines may carry a trailing `,` (older crawls wrote `{...},` per line).
pub fn records<R: BufRead>(
    reader: R,
) -> impl Iterator<Item = Result<Stable>> {
    reader.lines().enumerate().filter_map(|(i, line)| {
        let line = match line {
            Ok(line) => line,
            Err(e) => return Some(Err(e.into())),
        };
        let entry = line.trim().trim_end_matches(',').trim_end();
        if entry.is_empty() {
            return None;
        }
        Some(
            serde_json::from_str::<Stable>(entry)
                .with_context(|| format!("line {}: not a stable record", i + 1)),
        )
    })
}

pub fn open_records(path: &Path) -> Result<impl Iterator<Item = Result<Stable>>> {
    let file =
        File::open(path).with_context(|| format!("opening record list {}", path.display()))?;
    Ok(records(BufReader::new(file)))
}

/// Enriched output is a single JSON array.
pub fn write_enriched(path: &Path, stables: &[Stable]) -> Result<()> {
    let mut out = create(path)?;
    serde_json::to_writer_pretty(&mut out, stables)
        .with_context(|| format!("writing {}", path.display()))?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn stable(id: &str, name: &str) -> Stable {
        Stable {
            id: id.into(),
            name: name.into(),
            address: "1 MAIN ST".into(),
            ..Default::default()
        }
    }

    #[test]
    fn read_ids_skips_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.txt");
        std::fs::write(&path, "a1\n\n  b2  \n\nc3").unwrap();
        assert_eq!(read_ids(&path).unwrap(), vec!["a1", "b2", "c3"]);
    }

    #[test]
    fn missing_id_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_ids(&dir.path().join("nope.txt")).unwrap_err();
        assert!(err.to_string().contains("nope.txt"));
    }

    #[test]
    fn id_writer_one_per_line() {
        let mut w = IdWriter::new(Vec::new());
        w.write("a").unwrap();
        w.write("b").unwrap();
        assert_eq!(w.written(), 2);
        assert_eq!(w.finish().unwrap(), b"a\nb\n");
    }

    #[test]
    fn record_lines_read_back() {
        let mut w = RecordWriter::new(Vec::new());
        w.write(&stable("1", "A")).unwrap();
        w.write(&stable("2", "B")).unwrap();
        let bytes = w.finish().unwrap();

        let back: Vec<Stable> = records(Cursor::new(bytes)).map(|r| r.unwrap()).collect();
        assert_eq!(back, vec![stable("1", "A"), stable("2", "B")]);
    }

    #[test]
    fn legacy_trailing_commas_and_bad_lines() {
        let input = concat!(
            r#"{"Name":"A","Address":"x","Phone":"","Website":"","ID":"1","Lat":0,"Lng":0},"#,
            "\n\n",
            "not json,\n",
            r#"{"Name":"B","Address":"y","Phone":"","Website":"","ID":"2"}"#,
            "\n",
        );
        let out: Vec<_> = records(Cursor::new(input)).collect();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].as_ref().unwrap().id, "1");
        assert!(out[1].as_ref().unwrap_err().to_string().contains("line 3"));
        assert_eq!(out[2].as_ref().unwrap().name, "B");
    }

    #[test]
    fn enriched_is_a_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geocoded.json");
        let mut s = stable("1", "A");
        s.lat = Some(39.0);
        s.lng = Some(-77.0);
        write_enriched(&path, &[s.clone()]).unwrap();

        let back: Vec<Stable> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, vec![s]);
    }
}
