// File: src/persistence.rs
use crate::core::lexicon::NormalizationModel;
use crate::core::types::{
    Message, PredictedMessage, PredictedRecord, Strategy, TaggedMessage, TokenRecord,
};
use crate::error::{NormError, Result};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Columns of a corpus file: original, gold normalization, gold POS.
pub const CORPUS_COLUMNS: usize = 3;
/// Columns of a normalization output: strategy, original, predicted, gold, POS.
pub const NORMALIZED_COLUMNS: usize = 5;
/// Normalization columns plus the lower, upper and baseline tags.
pub const TAGGED_COLUMNS: usize = 8;

/// A non-blank line with its 1-based line number.
type Line<'a> = (usize, &'a str);

fn read_source(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(NormError::MissingFile {
            path: path.to_path_buf(),
        });
    }
    fs::read_to_string(path).map_err(|e| NormError::io(path, e))
}

/// Blank lines around the messages of a block file: how many precede each
/// message and how many follow the last one. Writing a file back with its
/// layout keeps every row on the line number it was read from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    pub leading: Vec<usize>,
    pub trailing: usize,
}

impl Layout {
    /// One blank line between consecutive messages, none around them.
    pub fn single_spaced(messages: usize) -> Self {
        Self {
            leading: (0..messages).map(|i| usize::from(i > 0)).collect(),
            trailing: 0,
        }
    }

    fn before(&self, index: usize) -> usize {
        self.leading
            .get(index)
            .copied()
            .unwrap_or(usize::from(index > 0))
    }
}

/// Messages of a block file together with its blank-line layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document<M> {
    pub messages: Vec<M>,
    pub layout: Layout,
}

/// Splits text into blocks of non-blank lines. Only a line with no content
/// at all is blank; a line holding just tabs is a (malformed) row.
fn split_blocks(text: &str) -> (Vec<Vec<Line<'_>>>, Layout) {
    let mut blocks = Vec::new();
    let mut layout = Layout::default();
    let mut current = Vec::new();
    let mut blank_run = 0;
    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            blank_run += 1;
        } else {
            if current.is_empty() {
                layout.leading.push(blank_run);
                blank_run = 0;
            }
            current.push((i + 1, line));
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    layout.trailing = blank_run;
    (blocks, layout)
}

fn split_fields<'a>(source: &str, (number, line): Line<'a>, expected: usize) -> Result<Vec<&'a str>> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != expected {
        return Err(NormError::malformed(
            format!("{source}:{number}"),
            format!("expected {expected} tab-separated columns, found {}", fields.len()),
        ));
    }
    if let Some(empty) = fields.iter().position(|f| f.trim().is_empty()) {
        return Err(NormError::malformed(
            format!("{source}:{number}"),
            format!("column {} is empty", empty + 1),
        ));
    }
    Ok(fields)
}

fn parse_strategy(source: &str, number: usize, code: &str) -> Result<Strategy> {
    Strategy::parse(code).ok_or_else(|| {
        NormError::malformed(
            format!("{source}:{number}"),
            format!("unknown normalization strategy {code:?}"),
        )
    })
}

fn parse_predicted(source: &str, fields: &[&str], number: usize) -> Result<PredictedRecord> {
    Ok(PredictedRecord {
        strategy: parse_strategy(source, number, fields[0])?,
        record: TokenRecord::new(fields[1], fields[3], fields[4]),
        predicted_normalization: fields[2].to_string(),
    })
}

/// Parses a 3-column corpus. `source` names the text in error messages.
pub fn parse_corpus(source: &str, text: &str) -> Result<Document<Message>> {
    let (blocks, layout) = split_blocks(text);
    let messages = blocks
        .into_iter()
        .map(|block| {
            block
                .into_iter()
                .map(|line| -> Result<TokenRecord> {
                    let f = split_fields(source, line, CORPUS_COLUMNS)?;
                    Ok(TokenRecord::new(f[0], f[1], f[2]))
                })
                .collect::<Result<Message>>()
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Document { messages, layout })
}

/// Parses a 5-column normalization output.
pub fn parse_normalized(source: &str, text: &str) -> Result<Document<PredictedMessage>> {
    let (blocks, layout) = split_blocks(text);
    let messages = blocks
        .into_iter()
        .map(|block| {
            block
                .into_iter()
                .map(|line| -> Result<PredictedRecord> {
                    let fields = split_fields(source, line, NORMALIZED_COLUMNS)?;
                    parse_predicted(source, &fields, line.0)
                })
                .collect::<Result<PredictedMessage>>()
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Document { messages, layout })
}

/// Parses an 8-column tagging output.
pub fn parse_tagged(source: &str, text: &str) -> Result<Document<TaggedMessage>> {
    let (blocks, layout) = split_blocks(text);
    let mut messages = Vec::with_capacity(blocks.len());
    for block in blocks {
        let mut message = TaggedMessage::default();
        for line in block {
            let fields = split_fields(source, line, TAGGED_COLUMNS)?;
            message.records.push(parse_predicted(source, &fields, line.0)?);
            message.tags_lower.push(fields[5].to_string());
            message.tags_upper.push(fields[6].to_string());
            message.tags_baseline.push(fields[7].to_string());
        }
        messages.push(message);
    }
    Ok(Document { messages, layout })
}

fn source_name(path: &Path) -> String {
    path.display().to_string()
}

pub fn read_corpus(path: &Path) -> Result<Document<Message>> {
    let document = parse_corpus(&source_name(path), &read_source(path)?)?;
    debug!(
        path = %path.display(),
        messages = document.messages.len(),
        tokens = document.messages.iter().map(Vec::len).sum::<usize>(),
        "corpus read"
    );
    Ok(document)
}

pub fn read_normalized(path: &Path) -> Result<Document<PredictedMessage>> {
    parse_normalized(&source_name(path), &read_source(path)?)
}

pub fn read_tagged(path: &Path) -> Result<Document<TaggedMessage>> {
    parse_tagged(&source_name(path), &read_source(path)?)
}

fn normalized_line(record: &PredictedRecord) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}",
        record.strategy.code(),
        record.record.original,
        record.predicted_normalization,
        record.record.gold_normalization,
        record.record.gold_pos
    )
}

/// Renders messages as rows, with blank lines placed as `layout` says.
fn render_blocks<M, F>(messages: &[M], layout: &Layout, mut rows: F) -> String
where
    F: FnMut(&M) -> Vec<String>,
{
    let mut out = String::new();
    for (i, message) in messages.iter().enumerate() {
        out.push_str(&"\n".repeat(layout.before(i)));
        for row in rows(message) {
            out.push_str(&row);
            out.push('\n');
        }
    }
    out.push_str(&"\n".repeat(layout.trailing));
    out
}

pub fn format_normalized(messages: &[PredictedMessage], layout: &Layout) -> String {
    render_blocks(messages, layout, |message| message.iter().map(normalized_line).collect())
}

pub fn format_tagged(messages: &[TaggedMessage], layout: &Layout) -> String {
    render_blocks(messages, layout, |message| {
        message
            .rows()
            .map(|row| {
                format!(
                    "{}\t{}\t{}\t{}",
                    normalized_line(row.record),
                    row.tag_lower,
                    row.tag_upper,
                    row.tag_baseline
                )
            })
            .collect()
    })
}

/// Writes through a temp file in the target directory and renames it into
/// place, so a failed run never leaves a half-written output behind.
fn persist_with<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&NamedTempFile>) -> Result<()>,
{
    let parent_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent_dir).map_err(|e| NormError::io(parent_dir, e))?;

    let temp_file = NamedTempFile::new_in(parent_dir).map_err(|e| NormError::io(parent_dir, e))?;
    {
        let mut writer = BufWriter::new(&temp_file);
        fill(&mut writer)?;
        writer.flush().map_err(|e| NormError::io(path, e))?;
    }
    temp_file
        .persist(path)
        .map_err(|e| NormError::io(path, e.error))?;
    Ok(())
}

pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    persist_with(path, |writer| {
        writer
            .write_all(contents.as_bytes())
            .map_err(|e| NormError::io(path, e))
    })?;
    debug!(path = %path.display(), bytes = contents.len(), "written");
    Ok(())
}

pub fn write_normalized(path: &Path, messages: &[PredictedMessage], layout: &Layout) -> Result<()> {
    write_atomic(path, &format_normalized(messages, layout))
}

pub fn write_tagged(path: &Path, messages: &[TaggedMessage], layout: &Layout) -> Result<()> {
    for (index, message) in messages.iter().enumerate() {
        message.verify(index)?;
    }
    write_atomic(path, &format_tagged(messages, layout))
}

/// Output path for `input`: `trailing` is cut from the file name when
/// present (otherwise the extension is), then `suffix` is appended. The file
/// lands next to the input unless `out_dir` is given.
pub fn derive_output_path(input: &Path, trailing: &str, suffix: &str, out_dir: Option<&Path>) -> PathBuf {
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let base = match name.strip_suffix(trailing) {
        Some(base) if !base.is_empty() => base.to_string(),
        _ => input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output")
            .to_string(),
    };
    let dir = match out_dir {
        Some(dir) => dir.to_path_buf(),
        None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    dir.join(format!("{base}{suffix}"))
}

/// Saves a built model as a bincode snapshot, atomically.
pub fn save_model(model: &NormalizationModel, path: &Path) -> Result<()> {
    persist_with(path, |writer| {
        bincode::serialize_into(writer, model).map_err(|e| NormError::Snapshot(e.to_string()))
    })
}

pub fn load_model(path: &Path) -> Result<NormalizationModel> {
    if !path.exists() {
        return Err(NormError::MissingFile {
            path: path.to_path_buf(),
        });
    }
    let file = File::open(path).map_err(|e| NormError::io(path, e))?;
    let reader = BufReader::new(file);
    bincode::deserialize_from(reader).map_err(|e| NormError::Snapshot(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::ModelBuilder;
    use tempfile::tempdir;

    const CORPUS: &str = "i\tich\tPPER\nha\thabe\tVAFIN\n\n\ngohts\tgeht es\tVVFIN+PPER\r\n\n";

    #[test]
    fn test_parse_corpus_messages() {
        let document = parse_corpus("train.txt", CORPUS).unwrap();
        let messages = &document.messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].len(), 2);
        assert_eq!(messages[1][0], TokenRecord::new("gohts", "geht es", "VVFIN+PPER"));
    }

    #[test]
    fn test_parse_corpus_rejects_missing_column() {
        let err = parse_corpus("dev.txt", "i\tich\tPPER\n\nha\thabe\n").unwrap_err();
        match err {
            NormError::MalformedRecord { location, reason } => {
                assert_eq!(location, "dev.txt:3");
                assert!(reason.contains("found 2"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_parse_corpus_rejects_empty_field() {
        let err = parse_corpus("dev.txt", "i\t\tPPER\n").unwrap_err();
        assert!(matches!(err, NormError::MalformedRecord { ref reason, .. } if reason == "column 2 is empty"));
    }

    #[test]
    fn test_parse_corpus_rejects_tab_only_line() {
        let err = parse_corpus("dev.txt", "i\tich\tPPER\n\t\t\nha\thabe\tVAFIN\n").unwrap_err();
        match err {
            NormError::MalformedRecord { location, reason } => {
                assert_eq!(location, "dev.txt:2");
                assert_eq!(reason, "column 1 is empty");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_blank_line_runs_are_kept() {
        let document = parse_corpus("train.txt", CORPUS).unwrap();
        assert_eq!(document.layout.leading, vec![0, 2]);
        assert_eq!(document.layout.trailing, 1);

        let text = "\nU\ti\tich\tich\tPPER\n\n\nN\tha\tha\thabe\tVAFIN\n\n";
        let normalized = parse_normalized("dev_norm_out.txt", text).unwrap();
        assert_eq!(normalized.messages.len(), 2);
        assert_eq!(format_normalized(&normalized.messages, &normalized.layout), text);
    }

    #[test]
    fn test_normalized_file_layout() {
        let messages = vec![
            vec![PredictedRecord {
                record: TokenRecord::new("i", "ich", "PPER"),
                strategy: Strategy::Unique,
                predicted_normalization: "ich".into(),
            }],
            vec![
                PredictedRecord {
                    record: TokenRecord::new("sushi", "Sushi", "NN"),
                    strategy: Strategy::New,
                    predicted_normalization: "sushi".into(),
                },
                PredictedRecord {
                    record: TokenRecord::new("hett", "hätte", "VAFIN"),
                    strategy: Strategy::Ambiguous,
                    predicted_normalization: "hätte".into(),
                },
            ],
        ];
        let text = format_normalized(&messages, &Layout::single_spaced(messages.len()));
        assert_eq!(
            text,
            "U\ti\tich\tich\tPPER\n\nN\tsushi\tsushi\tSushi\tNN\nA\thett\thätte\thätte\tVAFIN\n"
        );
        assert_eq!(parse_normalized("dev_norm_out.txt", &text).unwrap().messages, messages);
    }

    #[test]
    fn test_unknown_strategy_code() {
        let err = parse_normalized("x", "Q\ti\tich\tich\tPPER\n").unwrap_err();
        assert!(matches!(err, NormError::MalformedRecord { .. }));
    }

    #[test]
    fn test_tagged_file_round_trip() {
        let text = "U\ti\tich\tich\tPPER\tNE\tPPER\tPPER\n\nN\tsushi\tsushi\tSushi\tNN\tNE\tNN\tNE\n";
        let document = parse_tagged("dev_norm_POS_out.txt", text).unwrap();
        let messages = &document.messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].tags_lower, vec!["NE"]);
        assert_eq!(messages[1].tags_baseline, vec!["NE"]);
        assert_eq!(format_tagged(messages, &document.layout), text);
    }

    #[test]
    fn test_missing_file() {
        let err = read_corpus(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, NormError::MissingFile { .. }));
    }

    #[test]
    fn test_write_atomic_creates_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("dev_norm_out.txt");
        write_atomic(&path, "U\ti\tich\tich\tPPER\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "U\ti\tich\tich\tPPER\n");
    }

    #[test]
    fn test_derive_output_path() {
        let norm = derive_output_path(Path::new("data/dev.txt"), ".txt", "_norm_out.txt", None);
        assert_eq!(norm, PathBuf::from("data/dev_norm_out.txt"));

        let pos = derive_output_path(&norm, "_out.txt", "_POS_out.txt", None);
        assert_eq!(pos, PathBuf::from("data/dev_norm_POS_out.txt"));

        let other = derive_output_path(Path::new("data/test.tsv"), ".txt", "_norm_out.txt", Some(Path::new("out")));
        assert_eq!(other, PathBuf::from("out/test_norm_out.txt"));
    }

    #[test]
    fn test_model_snapshot_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let training = parse_corpus("train.txt", CORPUS).unwrap();
        let model = ModelBuilder::build(&training.messages).unwrap();

        save_model(&model, &path).unwrap();
        assert_eq!(load_model(&path).unwrap(), model);
    }

    #[test]
    fn test_corrupt_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bin");
        fs::write(&path, b"\xff\xff").unwrap();
        assert!(matches!(load_model(&path), Err(NormError::Snapshot(_))));
    }
}
