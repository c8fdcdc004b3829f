use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};

use crate::model::Sequence;

#[derive(Debug, Clone)]
pub struct FastaRecord {
    pub id: String,
    pub desc: Option<String>,
    pub seq: Vec<u8>,
}

impl FastaRecord {
    pub fn into_sequence(self) -> Sequence {
        Sequence::new(self.id, &self.seq)
    }
}

pub struct FastaReader<R: BufRead> {
    reader: R,
    buf: String,
    done: bool,
    peek_header: Option<String>,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buf: String::new(), done: false, peek_header: None }
    }

    pub fn next_record(&mut self) -> Result<Option<FastaRecord>> {
        if self.done {
            return Ok(None);
        }

        let header = match self.peek_header.take() {
            Some(h) => h,
            None => loop {
                self.buf.clear();
                if self.reader.read_line(&mut self.buf)? == 0 {
                    self.done = true;
                    return Ok(None);
                }
                if let Some(h) = self.buf.strip_prefix('>') {
                    break h.trim().to_string();
                }
            },
        };

        let mut parts = header.splitn(2, char::is_whitespace);
        let id = parts.next().unwrap_or("").to_string();
        let desc = parts.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        // 序列行：去掉空白，大小写留给 Sequence 统一处理
        let mut seq: Vec<u8> = Vec::new();
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                self.done = true;
                break;
            }
            if let Some(h) = self.buf.strip_prefix('>') {
                self.peek_header = Some(h.trim().to_string());
                break;
            }
            seq.extend(self.buf.bytes().filter(|b| !b.is_ascii_whitespace()));
        }

        Ok(Some(FastaRecord { id, desc, seq }))
    }
}

impl<R: BufRead> Iterator for FastaReader<R> {
    type Item = Result<FastaRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// 读取 FASTA 中的全部序列
pub fn read_sequences<R: BufRead>(reader: R) -> Result<Vec<Sequence>> {
    FastaReader::new(reader).map(|r| r.map(FastaRecord::into_sequence)).collect()
}

pub fn read_sequences_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<Sequence>> {
    let path = path.as_ref();
    let fh = File::open(path).with_context(|| format!("cannot open FASTA '{}'", path.display()))?;
    let seqs = read_sequences(BufReader::new(fh)).with_context(|| format!("cannot parse FASTA '{}'", path.display()))?;
    if seqs.is_empty() {
        anyhow::bail!("FASTA file '{}' contains no sequences", path.display());
    }
    let mut names: Vec<&str> = seqs.iter().map(Sequence::name).collect();
    names.sort_unstable();
    if let Some(w) = names.windows(2).find(|w| w[0] == w[1]) {
        anyhow::bail!("FASTA file '{}' contains duplicate sequence name '{}'", path.display(), w[0]);
    }
    log::info!("read {} sequences ({} bp) from {}", seqs.len(), seqs.iter().map(Sequence::len).sum::<usize>(), path.display());
    Ok(seqs)
}
