//! Text record format for block sets.
//!
//! Every fragment is a record `>{sequence}_{begin}_{last}` followed by its
//! literal text (read along the fragment's orientation). Blocks are separated
//! by blank lines.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

use crate::model::{BlockSet, Fragment, Ori};

pub fn write_blocks<W: Write>(bs: &BlockSet, out: &mut W) -> Result<()> {
    for (i, block) in bs.block_ids().into_iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        for f in bs.block_fragments(block) {
            let seq = bs.seq(f.seq);
            writeln!(out, ">{}", f.id(seq))?;
            out.write_all(&f.text(seq))?;
            writeln!(out)?;
        }
    }
    Ok(())
}

pub fn write_blocks_to_file<P: AsRef<Path>>(bs: &BlockSet, path: P) -> Result<()> {
    let path = path.as_ref();
    let fh = File::create(path).with_context(|| format!("cannot create '{}'", path.display()))?;
    let mut w = BufWriter::new(fh);
    write_blocks(bs, &mut w).with_context(|| format!("cannot write blocks to '{}'", path.display()))?;
    w.flush()?;
    log::info!("wrote {} blocks to {}", bs.block_count(), path.display());
    Ok(())
}

/// 解析 `{sequence}_{begin}_{last}`；序列名本身可以含下划线
fn parse_fragment_id(bs: &BlockSet, id: &str) -> Result<Fragment> {
    let mut parts = id.rsplitn(3, '_');
    let (Some(last), Some(begin), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
        bail!("malformed fragment id '{}'", id);
    };
    let begin: usize = begin.parse().map_err(|_| anyhow!("bad begin position in '{}'", id))?;
    let last: usize = last.parse().map_err(|_| anyhow!("bad last position in '{}'", id))?;
    let seq = bs.seq_by_name(name).ok_or_else(|| anyhow!("unknown sequence '{}' in '{}'", name, id))?;
    let f = Fragment::from_begin_last(seq, begin, last);
    if !f.valid(bs.seq(seq).len()) {
        bail!("fragment '{}' lies outside sequence '{}' (length {})", id, name, bs.seq(seq).len());
    }
    Ok(f)
}

struct Record {
    id: String,
    line: usize,
    text: Vec<u8>,
}

impl Record {
    /// 校验文本；单个位置的片段无法从坐标判断方向，由文本决定
    fn into_fragment(self, bs: &BlockSet) -> Result<Fragment> {
        let mut f = parse_fragment_id(bs, &self.id).with_context(|| format!("line {}", self.line))?;
        let seq = bs.seq(f.seq);
        let text = self.text.to_ascii_lowercase();
        if f.length() == 1 && f.text(seq) != text {
            f.ori = Ori::Reverse;
        }
        if f.text(seq) != text {
            bail!("line {}: text of '{}' does not match the sequence", self.line, self.id);
        }
        Ok(f)
    }
}

/// 读入记录并作为新块加入 `bs`，序列名按 `bs` 中已有的序列解析。返回新增块数。
pub fn read_blocks<R: BufRead>(reader: R, bs: &mut BlockSet) -> Result<usize> {
    let mut blocks: Vec<Vec<Fragment>> = Vec::new();
    let mut current: Vec<Fragment> = Vec::new();
    let mut record: Option<Record> = None;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if let Some(header) = line.strip_prefix('>') {
            if let Some(r) = record.take() {
                current.push(r.into_fragment(bs)?);
            }
            let id = header.split_whitespace().next().unwrap_or("").to_string();
            record = Some(Record { id, line: i + 1, text: Vec::new() });
        } else if line.is_empty() {
            if let Some(r) = record.take() {
                current.push(r.into_fragment(bs)?);
            }
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            match record.as_mut() {
                Some(r) => r.text.extend_from_slice(line.as_bytes()),
                None => bail!("line {}: sequence text before any header", i + 1),
            }
        }
    }
    if let Some(r) = record.take() {
        current.push(r.into_fragment(bs)?);
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    for block in &blocks {
        for (i, f) in block.iter().enumerate() {
            if block[..i].contains(f) {
                bail!("fragment '{}' appears twice in one block", f.id(bs.seq(f.seq)));
            }
        }
    }
    let n = blocks.len();
    for block in blocks {
        bs.add_block_with(block);
    }
    bs.connect();
    Ok(n)
}

pub fn read_blocks_from_file<P: AsRef<Path>>(path: P, bs: &mut BlockSet) -> Result<usize> {
    let path = path.as_ref();
    let fh = File::open(path).with_context(|| format!("cannot open blocks file '{}'", path.display()))?;
    let n = read_blocks(BufReader::new(fh), bs).with_context(|| format!("cannot parse blocks file '{}'", path.display()))?;
    log::info!("read {} blocks from {}", n, path.display());
    Ok(n)
}
