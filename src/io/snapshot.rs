//! bincode 快照：序列、分块与生成时的元数据。

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::{BlockSet, Fragment, Sequence};

const MAGIC: &str = "pangenome-blocks";
const VERSION: u32 = 1;

/// 快照来源信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub source_file: Option<String>,
    pub args: Option<String>,
    pub timestamp: Option<String>,
}

impl SnapshotMeta {
    /// 以当前命令行和 UTC 时间生成
    pub fn now(source_file: Option<String>) -> Self {
        Self {
            source_file,
            args: Some(std::env::args().collect::<Vec<_>>().join(" ")),
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
        }
    }
}

/// 可序列化的 BlockSet 视图：块按句柄顺序，片段按块内顺序
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    magic: String,
    version: u32,
    pub meta: SnapshotMeta,
    pub sequences: Vec<Sequence>,
    pub blocks: Vec<Vec<Fragment>>,
}

impl Snapshot {
    pub fn capture(bs: &BlockSet, meta: SnapshotMeta) -> Self {
        Self {
            magic: MAGIC.to_string(),
            version: VERSION,
            meta,
            sequences: bs.sequences().iter().map(|s| Sequence::clone(s)).collect(),
            blocks: bs.block_ids().into_iter().map(|b| bs.block_fragments(b)).collect(),
        }
    }

    /// 重建 BlockSet，并检查片段引用的序列与坐标
    pub fn restore(self) -> Result<BlockSet> {
        let mut bs = BlockSet::with_sequences(self.sequences);
        for block in &self.blocks {
            for (i, f) in block.iter().enumerate() {
                if f.seq.0 >= bs.sequences().len() || !f.valid(bs.seq(f.seq).len()) {
                    bail!("snapshot contains invalid fragment {:?}", f);
                }
                if block[..i].contains(f) {
                    bail!("snapshot block contains fragment {:?} twice", f);
                }
            }
        }
        for block in self.blocks {
            bs.add_block_with(block);
        }
        bs.connect();
        Ok(bs)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let f = File::create(path).with_context(|| format!("cannot create snapshot '{}'", path.display()))?;
        bincode::serialize_into(BufWriter::new(f), self)
            .with_context(|| format!("cannot write snapshot '{}'", path.display()))?;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("cannot open snapshot '{}'", path.display()))?;
        let snap: Self = bincode::deserialize_from(BufReader::new(f))
            .with_context(|| format!("cannot read snapshot '{}'", path.display()))?;
        if snap.magic != MAGIC || snap.version != VERSION {
            bail!("'{}' is not a version {} snapshot", path.display(), VERSION);
        }
        Ok(snap)
    }
}

pub fn save_to_file<P: AsRef<Path>>(bs: &BlockSet, meta: SnapshotMeta, path: P) -> Result<()> {
    Snapshot::capture(bs, meta).save_to_file(path)
}

pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<(BlockSet, SnapshotMeta)> {
    let snap = Snapshot::load_from_file(path)?;
    let meta = snap.meta.clone();
    Ok((snap.restore()?, meta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Ori, SeqId};

    #[test]
    fn snapshot_round_trip() {
        let mut bs = BlockSet::with_sequences([Sequence::new("a", b"acgtacgtac"), Sequence::new("b", b"ttttgggg")]);
        bs.add_block_with([Fragment::new(SeqId(0), 0, 3, Ori::Forward), Fragment::new(SeqId(1), 2, 5, Ori::Reverse)]);
        bs.add_block_with([Fragment::new(SeqId(0), 6, 9, Ori::Forward)]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("set.snap");
        let meta = SnapshotMeta::now(Some("in.fa".to_string()));
        save_to_file(&bs, meta.clone(), &path).unwrap();

        let (back, back_meta) = load_from_file(&path).unwrap();
        assert_eq!(back_meta, meta);
        assert_eq!(back.sequences().len(), 2);
        assert_eq!(back.seq(SeqId(1)).as_bytes(), b"ttttgggg");
        for b in bs.block_ids() {
            assert_eq!(back.block_fragments(b), bs.block_fragments(b));
        }
    }

    #[test]
    fn foreign_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other");
        let other = ("other-tool".to_string(), VERSION, SnapshotMeta::default(), Vec::<Sequence>::new(), Vec::<Vec<Fragment>>::new());
        std::fs::write(&path, bincode::serialize(&other).unwrap()).unwrap();
        assert!(load_from_file(&path).is_err());
    }
}
