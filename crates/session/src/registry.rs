use crate::error::{ErrorKind, Result};
use crate::record::{FileId, FileRecord, Status};
use std::collections::HashSet;

/// The ordered list of records.
///
/// Order matters: it is the page order of a merge and the delivery order of
/// everything else. Ids are unique, and every reordering is a permutation.
#[derive(Clone, Debug, Default)]
pub struct FileRegistry {
    records: Vec<FileRecord>,
}

impl FileRegistry {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.iter()
    }

    pub fn ids(&self) -> Vec<FileId> {
        self.records.iter().map(|record| record.id).collect()
    }

    pub fn get(&self, id: FileId) -> Option<&FileRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn get_mut(&mut self, id: FileId) -> Option<&mut FileRecord> {
        self.records.iter_mut().find(|record| record.id == id)
    }

    pub fn position(&self, id: FileId) -> Option<usize> {
        self.records.iter().position(|record| record.id == id)
    }

    /// Append to the end of the list.
    pub fn push(&mut self, record: FileRecord) {
        debug_assert!(self.get(record.id).is_none(), "duplicate record id {}", record.id);
        self.records.push(record);
    }

    /// `None` if no record has this id.
    pub fn remove(&mut self, id: FileId) -> Option<FileRecord> {
        let index = self.position(id)?;
        Some(self.records.remove(index))
    }

    pub fn clear(&mut self) -> Vec<FileRecord> {
        std::mem::take(&mut self.records)
    }

    /// Replace the order with `ids`, which must name every current record
    /// exactly once. Returns whether the order changed.
    pub fn reorder(&mut self, ids: &[FileId]) -> Result<bool> {
        if ids.len() != self.records.len() {
            exn::bail!(ErrorKind::NotAPermutation);
        }
        let mut seen = HashSet::with_capacity(ids.len());
        if !ids.iter().all(|id| seen.insert(*id) && self.get(*id).is_some()) {
            exn::bail!(ErrorKind::NotAPermutation);
        }
        if self.records.iter().map(|record| record.id).eq(ids.iter().copied()) {
            return Ok(false);
        }
        let mut remaining = std::mem::take(&mut self.records);
        for id in ids {
            if let Some(index) = remaining.iter().position(|record| record.id == *id) {
                self.records.push(remaining.swap_remove(index));
            }
        }
        Ok(true)
    }

    /// Move the record at `from` so that it ends up at `to`.
    ///
    /// # Panics
    ///
    /// If either index is out of range.
    pub fn move_file(&mut self, from: usize, to: usize) -> bool {
        let len = self.records.len();
        assert!(from < len && to < len, "move_file({from}, {to}) out of range for {len} files");
        if from == to {
            return false;
        }
        let record = self.records.remove(from);
        self.records.insert(to, record);
        true
    }

    /// `None` if no record has this id; otherwise whether anything moved.
    pub fn move_to_top(&mut self, id: FileId) -> Option<bool> {
        let from = self.position(id)?;
        Some(self.move_file(from, 0))
    }

    pub fn move_to_bottom(&mut self, id: FileId) -> Option<bool> {
        let from = self.position(id)?;
        Some(self.move_file(from, self.records.len() - 1))
    }

    pub fn any_with_status(&self, status: Status) -> bool {
        self.records.iter().any(|record| record.status == status)
    }

    pub fn snapshot(&self) -> Vec<FileRecord> {
        self.records.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use sheaf_engine::FileKind;

    fn registry(count: usize) -> (FileRegistry, Vec<FileId>) {
        let mut registry = FileRegistry::default();
        for index in 0..count {
            registry.push(FileRecord::new(format!("{index}.pdf"), 1, FileKind::Pdf));
        }
        let ids = registry.ids();
        (registry, ids)
    }

    #[test]
    fn removal_keeps_the_order_of_the_rest() {
        let (mut registry, ids) = registry(4);
        assert_eq!(registry.remove(ids[1]).map(|record| record.id), Some(ids[1]));
        assert!(registry.remove(ids[1]).is_none());
        assert_eq!(registry.ids(), [ids[0], ids[2], ids[3]]);
    }

    #[test]
    fn reorder_applies_a_permutation() {
        let (mut registry, ids) = registry(3);
        let order = [ids[2], ids[0], ids[1]];
        assert!(registry.reorder(&order).unwrap());
        assert_eq!(registry.ids(), order);
        assert_eq!(registry.get(ids[2]).unwrap().name, "2.pdf");
    }

    #[test]
    fn reorder_with_the_same_order_changes_nothing() {
        let (mut registry, ids) = registry(3);
        assert!(!registry.reorder(&ids).unwrap());
        assert_eq!(registry.ids(), ids);
    }

    #[rstest]
    #[case::too_short(|ids: &[FileId]| vec![ids[0], ids[1]])]
    #[case::too_long(|ids: &[FileId]| vec![ids[0], ids[1], ids[2], ids[2]])]
    #[case::duplicate(|ids: &[FileId]| vec![ids[0], ids[0], ids[1]])]
    #[case::stranger(|ids: &[FileId]| vec![ids[0], ids[1], FileId::new()])]
    fn test_reorder_rejects(#[case] order: fn(&[FileId]) -> Vec<FileId>) {
        let (mut registry, ids) = registry(3);
        let err = registry.reorder(&order(&ids)).unwrap_err();
        assert_eq!(*err, ErrorKind::NotAPermutation);
        assert_eq!(registry.ids(), ids);
    }

    #[rstest]
    #[case(0, 2, [1, 2, 0])]
    #[case(2, 0, [2, 0, 1])]
    #[case(1, 1, [0, 1, 2])]
    #[case(0, 1, [1, 0, 2])]
    fn test_move_file(#[case] from: usize, #[case] to: usize, #[case] expected: [usize; 3]) {
        let (mut registry, ids) = registry(3);
        assert_eq!(registry.move_file(from, to), from != to);
        assert_eq!(registry.ids(), expected.map(|index| ids[index]));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn move_file_out_of_range_panics() {
        let (mut registry, _) = registry(2);
        registry.move_file(0, 2);
    }

    #[test]
    fn move_to_either_end() {
        let (mut registry, ids) = registry(3);
        assert_eq!(registry.move_to_top(ids[2]), Some(true));
        assert_eq!(registry.ids(), [ids[2], ids[0], ids[1]]);
        assert_eq!(registry.move_to_bottom(ids[2]), Some(true));
        assert_eq!(registry.ids(), ids);
        assert_eq!(registry.move_to_bottom(ids[2]), Some(false));
        assert_eq!(registry.move_to_top(FileId::new()), None);
    }

    /// Any sequence of mutations keeps exactly the non-removed ids, each once.
    #[test]
    fn mutations_preserve_membership() {
        let (mut registry, ids) = registry(6);
        registry.move_file(5, 0);
        registry.remove(ids[3]);
        registry.move_to_bottom(ids[0]);
        let mut reversed = registry.ids();
        reversed.reverse();
        registry.reorder(&reversed).unwrap();
        registry.move_file(1, 3);

        let mut remaining = registry.ids();
        remaining.sort();
        let mut expected: Vec<_> = ids.iter().copied().filter(|id| *id != ids[3]).collect();
        expected.sort();
        assert_eq!(remaining, expected);
    }
}
