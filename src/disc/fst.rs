//! File system table (FST) types.

use std::{borrow::Cow, collections::HashMap, ffi::CStr, mem::size_of};

use encoding_rs::SHIFT_JIS;
use itertools::Itertools;
use zerocopy::{big_endian::*, FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::{
    util::{array_ref, static_assert},
    Error, Result,
};

/// File system node kind.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    /// Node is a file.
    File,
    /// Node is a directory.
    Directory,
    /// Invalid node kind. (Rejected when parsing an FST)
    Invalid,
}

/// An individual file system node.
#[derive(Copy, Clone, Debug, PartialEq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, align(4))]
pub struct Node {
    kind: u8,
    // u24 big-endian
    name_offset: [u8; 3],
    offset: U32,
    length: U32,
}

static_assert!(size_of::<Node>() == 12);

impl Node {
    /// Create a new node.
    #[inline]
    pub fn new(kind: NodeKind, name_offset: u32, offset: u64, length: u32, is_wii: bool) -> Self {
        let name_offset_bytes = name_offset.to_be_bytes();
        Self {
            kind: match kind {
                NodeKind::File => 0,
                NodeKind::Directory => 1,
                NodeKind::Invalid => u8::MAX,
            },
            name_offset: *array_ref![name_offset_bytes, 1, 3],
            offset: U32::new(match kind {
                NodeKind::File if is_wii => (offset / 4) as u32,
                _ => offset as u32,
            }),
            length: U32::new(length),
        }
    }

    /// File system node kind.
    #[inline]
    pub fn kind(&self) -> NodeKind {
        match self.kind {
            0 => NodeKind::File,
            1 => NodeKind::Directory,
            _ => NodeKind::Invalid,
        }
    }

    /// Whether the node is a file.
    #[inline]
    pub fn is_file(&self) -> bool { self.kind == 0 }

    /// Whether the node is a directory.
    #[inline]
    pub fn is_dir(&self) -> bool { self.kind == 1 }

    /// Offset in the string table to the filename.
    #[inline]
    pub fn name_offset(&self) -> u32 {
        u32::from_be_bytes([0, self.name_offset[0], self.name_offset[1], self.name_offset[2]])
    }

    /// For files, this is the partition offset of the file data. (Wii: >> 2)
    ///
    /// For directories, this is the parent node index in the FST.
    #[inline]
    pub fn offset(&self, is_wii: bool) -> u64 {
        if is_wii && self.is_file() {
            self.offset.get() as u64 * 4
        } else {
            self.offset.get() as u64
        }
    }

    /// For files, this is the byte size of the file.
    ///
    /// For directories, this is the index of the first node after the
    /// directory's subtree. The subtree spans all nodes in between.
    #[inline]
    pub fn length(&self) -> u32 { self.length.get() }

    /// Set the length of the node. See [`Node::length`] for details.
    #[inline]
    pub fn set_length(&mut self, length: u32) { self.length.set(length); }
}

/// A view into the file system table (FST).
#[derive(Clone)]
pub struct Fst<'a> {
    /// The nodes in the FST.
    pub nodes: &'a [Node],
    /// The string table containing all file and directory names.
    pub string_table: &'a [u8],
}

impl<'a> Fst<'a> {
    /// Create a new FST view from a buffer.
    ///
    /// Node kinds, parent indices and subtree ranges are validated up front,
    /// so traversal never has to re-check them.
    pub fn new(buf: &'a [u8]) -> Result<Self> {
        let Ok((root_node, _)) = Node::ref_from_prefix(buf) else {
            return Err(Error::CorruptFormat("FST root node not found".to_string()));
        };
        if !root_node.is_dir() {
            return Err(Error::CorruptFormat("FST root node is not a directory".to_string()));
        }
        let count = root_node.length() as usize;
        if count == 0 {
            return Err(Error::CorruptFormat("FST node count is zero".to_string()));
        }
        // String table starts after the last node
        let string_base = count * size_of::<Node>();
        if string_base > buf.len() {
            return Err(Error::CorruptFormat(format!(
                "FST string table out of bounds (node count {count}, buffer size {})",
                buf.len()
            )));
        }
        let (node_buf, string_table) = buf.split_at(string_base);
        let nodes = <[Node]>::ref_from_bytes(node_buf)
            .map_err(|_| Error::CorruptFormat("FST node region invalid".to_string()))?;
        for (idx, node) in nodes.iter().enumerate().skip(1) {
            match node.kind() {
                NodeKind::File => {}
                NodeKind::Directory => {
                    let end = node.length() as usize;
                    if end <= idx || end > count {
                        return Err(Error::CorruptFormat(format!(
                            "FST directory {idx} subtree end {end} out of range (node count {count})"
                        )));
                    }
                    let parent = node.offset(false) as usize;
                    if parent >= idx {
                        return Err(Error::CorruptFormat(format!(
                            "FST directory {idx} has invalid parent index {parent}"
                        )));
                    }
                }
                NodeKind::Invalid => {
                    return Err(Error::CorruptFormat(format!("FST node {idx} has invalid kind")));
                }
            }
        }
        Ok(Self { nodes, string_table })
    }

    /// Iterate over the nodes in the FST in on-disc order, skipping the root.
    #[inline]
    pub fn iter(&self) -> FstIter<'a> { FstIter { fst: self.clone(), idx: 1, segments: vec![] } }

    /// Get the name of a node.
    pub fn get_name(&self, node: Node) -> Result<Cow<'a, str>> {
        let name_buf = self.string_table.get(node.name_offset() as usize..).ok_or_else(|| {
            Error::CorruptFormat(format!(
                "FST name offset {} out of bounds (string table size {})",
                node.name_offset(),
                self.string_table.len()
            ))
        })?;
        let c_string = CStr::from_bytes_until_nul(name_buf).map_err(|_| {
            Error::CorruptFormat(format!(
                "FST name at offset {} not null-terminated",
                node.name_offset()
            ))
        })?;
        let (decoded, _, _) = SHIFT_JIS.decode(c_string.to_bytes());
        // Decoding errors yield U+FFFD; consumers can fetch the raw bytes from
        // the string table if they need them.
        Ok(decoded)
    }

    /// Finds a particular file or directory by path.
    ///
    /// Paths are `/`-separated and case-sensitive.
    pub fn find(&self, path: &str) -> Option<(usize, Node)> {
        let mut split = path.trim_matches('/').split('/');
        let mut current = next_non_empty(&mut split);
        if current.is_empty() {
            return Some((0, self.nodes[0]));
        }
        let mut idx = 1;
        let mut stop_at = None;
        while let Some(node) = self.nodes.get(idx).copied() {
            if self.get_name(node).is_ok_and(|name| name == current) {
                current = next_non_empty(&mut split);
                if current.is_empty() {
                    return Some((idx, node));
                }
                if !node.is_dir() {
                    break;
                }
                // Descend into directory
                stop_at = Some(node.length() as usize);
                idx += 1;
            } else if node.is_dir() {
                // Skip directory
                idx = node.length() as usize;
            } else {
                // Skip file
                idx += 1;
            }
            if let Some(stop) = stop_at {
                if idx >= stop {
                    break;
                }
            }
        }
        None
    }

    /// Count the number of files in the FST.
    pub fn num_files(&self) -> usize { self.nodes.iter().filter(|n| n.is_file()).count() }

    /// Builds a flattened `path -> (index, node)` map over every file and
    /// directory for constant-time lookups.
    ///
    /// Fails if any name is invalid or if two siblings share a name.
    pub fn path_map(&self) -> Result<HashMap<String, (usize, Node)>> {
        let mut map = HashMap::with_capacity(self.nodes.len());
        let mut segments: Vec<(String, usize)> = vec![];
        for (idx, node) in self.nodes.iter().copied().enumerate().skip(1) {
            while segments.last().is_some_and(|(_, end)| *end <= idx) {
                segments.pop();
            }
            let name = self.get_name(node)?;
            let path = segments.iter().map(|(name, _)| name.as_str()).chain([name.as_ref()]).join("/");
            if node.is_dir() {
                segments.push((name.into_owned(), node.length() as usize));
            }
            if map.insert(path.clone(), (idx, node)).is_some() {
                return Err(Error::CorruptFormat(format!("FST contains duplicate path {path}")));
            }
        }
        Ok(map)
    }
}

/// Iterator over the nodes in an FST.
///
/// For each node, the iterator yields the node index, the node itself,
/// and the full path to the node (separated by `/`).
pub struct FstIter<'a> {
    fst: Fst<'a>,
    idx: usize,
    segments: Vec<(Cow<'a, str>, usize)>,
}

impl Iterator for FstIter<'_> {
    type Item = (usize, Node, String);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.idx;
        let node = self.fst.nodes.get(idx).copied()?;
        self.idx += 1;

        // Remove ended path segments
        while self.segments.last().is_some_and(|(_, end)| *end <= idx) {
            self.segments.pop();
        }

        let name = self.fst.get_name(node).unwrap_or(Cow::Borrowed("<invalid>"));
        let mut path = String::new();
        for (segment, _) in &self.segments {
            path.push_str(segment);
            path.push('/');
        }
        path.push_str(&name);
        if node.is_dir() {
            self.segments.push((name, node.length() as usize));
        }
        Some((idx, node, path))
    }
}

#[inline]
fn next_non_empty<'a>(iter: &mut impl Iterator<Item = &'a str>) -> &'a str {
    loop {
        match iter.next() {
            Some("") => continue,
            Some(next) => break next,
            None => break "",
        }
    }
}

/// A builder for creating a file system table (FST).
///
/// Entries must be added in traversal order: all entries of a directory are
/// added consecutively, sorted the way they should appear on disc.
pub struct FstBuilder {
    nodes: Vec<Node>,
    string_table: Vec<u8>,
    stack: Vec<(String, u32)>,
    is_wii: bool,
}

impl FstBuilder {
    /// Create a new FST builder.
    pub fn new(is_wii: bool) -> Self {
        let mut builder = Self { nodes: vec![], string_table: vec![], stack: vec![], is_wii };
        // The root directory is unnamed
        builder.add_node(NodeKind::Directory, "", 0, 0);
        builder
    }

    /// Add a file to the FST, creating any missing parent directories.
    pub fn add_file(&mut self, path: &str, offset: u64, size: u32) {
        let components = path.split('/').collect::<Vec<_>>();
        let (name, dirs) = components.split_last().unwrap();
        self.align_stack(dirs);
        self.add_node(NodeKind::File, name, offset, size);
    }

    /// Add a directory to the FST, creating any missing parents. Required for
    /// empty directories; directories containing files are created implicitly.
    pub fn add_dir(&mut self, path: &str) {
        let components = path.split('/').collect::<Vec<_>>();
        self.align_stack(&components);
    }

    /// Get the byte size of the FST.
    pub fn byte_size(&self) -> usize {
        size_of_val(self.nodes.as_slice()) + self.string_table.len()
    }

    /// Finalize the FST and return the serialized data.
    pub fn finalize(mut self) -> Box<[u8]> {
        // Finalize directory lengths
        let node_count = self.nodes.len() as u32;
        while let Some((_, idx)) = self.stack.pop() {
            self.nodes[idx as usize].set_length(node_count);
        }
        self.nodes[0].set_length(node_count);

        // Serialize nodes and string table
        let nodes_data = self.nodes.as_bytes();
        let string_table_data = self.string_table.as_slice();
        let mut data =
            <[u8]>::new_box_zeroed_with_elems(nodes_data.len() + string_table_data.len()).unwrap();
        data[..nodes_data.len()].copy_from_slice(nodes_data);
        data[nodes_data.len()..].copy_from_slice(string_table_data);
        data
    }

    /// Pops and pushes directory nodes until the open directory chain matches
    /// `dirs`. Closed directories get their subtree end index assigned.
    fn align_stack(&mut self, dirs: &[&str]) {
        let mut common = 0;
        while common < self.stack.len()
            && dirs.get(common).is_some_and(|name| *name == self.stack[common].0)
        {
            common += 1;
        }
        while self.stack.len() > common {
            let (_, idx) = self.stack.pop().unwrap();
            let end = self.nodes.len() as u32;
            self.nodes[idx as usize].set_length(end);
        }
        for i in self.stack.len()..dirs.len() {
            let parent = if i == 0 { 0 } else { self.stack[i - 1].1 };
            let node_idx = self.add_node(NodeKind::Directory, dirs[i], parent as u64, 0);
            self.stack.push((dirs[i].to_string(), node_idx));
        }
    }

    fn add_node(&mut self, kind: NodeKind, name: &str, offset: u64, length: u32) -> u32 {
        let (bytes, _, _) = SHIFT_JIS.encode(name);
        // Reuse the name if it already exists in the string table
        let mut name_offset = 0;
        while name_offset < self.string_table.len() {
            let string_buf = &self.string_table[name_offset..];
            let existing = CStr::from_bytes_until_nul(string_buf).unwrap();
            if existing.to_bytes() == bytes.as_ref() {
                break;
            }
            name_offset += existing.to_bytes_with_nul().len();
        }
        if name_offset == self.string_table.len() {
            self.string_table.extend_from_slice(bytes.as_ref());
            self.string_table.push(0);
        }
        let idx = self.nodes.len() as u32;
        self.nodes.push(Node::new(kind, name_offset as u32, offset, length, self.is_wii));
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_sample() -> Box<[u8]> {
        let mut builder = FstBuilder::new(false);
        builder.add_file("a.txt", 0x8000, 5);
        builder.add_file("b.txt", 0x8020, 5);
        builder.add_dir("d");
        builder.add_file("d/nested.txt", 0x8040, 6);
        builder.finalize()
    }

    #[test]
    fn test_build_and_parse() {
        let data = build_sample();
        // root + 3 files + 1 directory
        assert_eq!(data.len(), 5 * size_of::<Node>() + (1 + 6 + 6 + 2 + 11));
        let fst = Fst::new(&data).expect("Failed to parse FST");
        assert_eq!(fst.nodes.len(), 5);
        assert_eq!(fst.num_files(), 3);

        let paths = fst
            .iter()
            .filter(|(_, node, _)| node.is_file())
            .map(|(_, _, path)| path)
            .collect::<Vec<_>>();
        assert_eq!(paths, ["a.txt", "b.txt", "d/nested.txt"]);

        let (_, node) = fst.find("d/nested.txt").expect("Node not found");
        assert!(node.is_file());
        assert_eq!(node.offset(false), 0x8040);
        assert_eq!(node.length(), 6);

        let (idx, dir) = fst.find("d").expect("Directory not found");
        assert!(dir.is_dir());
        assert_eq!(dir.length() as usize, idx + 2);
    }

    #[test]
    fn test_find_case_sensitive() {
        let data = build_sample();
        let fst = Fst::new(&data).unwrap();
        assert!(fst.find("a.txt").is_some());
        assert!(fst.find("A.TXT").is_none());
        assert!(fst.find("d/missing.txt").is_none());
        // Leading and duplicate slashes are tolerated
        assert!(fst.find("/d//nested.txt").is_some());
    }

    #[test]
    fn test_path_map() {
        let data = build_sample();
        let fst = Fst::new(&data).unwrap();
        let map = fst.path_map().expect("Failed to build path map");
        assert_eq!(map.len(), 4);
        let (_, node) = map["b.txt"];
        assert_eq!(node.offset(false), 0x8020);
        assert!(map["d"].1.is_dir());
        assert!(map.contains_key("d/nested.txt"));
    }

    #[test]
    fn test_empty_directories() {
        let mut builder = FstBuilder::new(false);
        builder.add_dir("empty");
        builder.add_file("z.txt", 0x8000, 1);
        let data = builder.finalize();
        let fst = Fst::new(&data).unwrap();
        let (idx, node) = fst.find("empty").expect("Directory not found");
        assert!(node.is_dir());
        assert_eq!(node.length() as usize, idx + 1);
        assert!(fst.find("z.txt").is_some());
    }

    #[test]
    fn test_corrupt_truncated() {
        let data = build_sample();
        assert!(matches!(Fst::new(&data[..8]), Err(Error::CorruptFormat(_))));
        // Node region extends past the buffer
        assert!(matches!(Fst::new(&data[..4 * size_of::<Node>()]), Err(Error::CorruptFormat(_))));
    }

    #[test]
    fn test_corrupt_subtree_range() {
        let nodes = [
            Node::new(NodeKind::Directory, 0, 0, 2, false),
            // Subtree end index past the node count
            Node::new(NodeKind::Directory, 0, 0, 5, false),
        ];
        let mut buf = nodes.as_slice().as_bytes().to_vec();
        buf.push(0);
        assert!(matches!(Fst::new(&buf), Err(Error::CorruptFormat(_))));
    }

    #[test]
    fn test_corrupt_name_offset() {
        let nodes = [
            Node::new(NodeKind::Directory, 0, 0, 2, false),
            // Name offset past the end of the string table
            Node::new(NodeKind::File, 0x100, 0, 0, false),
        ];
        let mut buf = nodes.as_slice().as_bytes().to_vec();
        buf.push(0);
        let fst = Fst::new(&buf).unwrap();
        assert!(matches!(fst.get_name(fst.nodes[1]), Err(Error::CorruptFormat(_))));
        assert!(matches!(fst.path_map(), Err(Error::CorruptFormat(_))));
    }

    #[test]
    fn test_wii_file_offsets() {
        let node = Node::new(NodeKind::File, 0, 0x8000, 16, true);
        assert_eq!(node.offset(true), 0x8000);
        assert_eq!(node.offset(false), 0x2000);
    }
}
