use super::FragmentId;

/// 一组被视为同源的片段句柄。
///
/// 顺序即插入顺序，第一个片段在扩展时作为参考片段。
#[derive(Debug, Clone, Default)]
pub struct Block {
    fragments: Vec<FragmentId>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn front(&self) -> Option<FragmentId> {
        self.fragments.first().copied()
    }

    pub fn contains(&self, id: FragmentId) -> bool {
        self.fragments.contains(&id)
    }

    pub fn fragments(&self) -> &[FragmentId] {
        &self.fragments
    }

    pub fn iter(&self) -> impl Iterator<Item = FragmentId> + '_ {
        self.fragments.iter().copied()
    }

    pub(super) fn push(&mut self, id: FragmentId) {
        self.fragments.push(id);
    }

    pub(super) fn remove(&mut self, id: FragmentId) -> bool {
        match self.fragments.iter().position(|&f| f == id) {
            Some(i) => {
                self.fragments.remove(i);
                true
            }
            None => false,
        }
    }
}
