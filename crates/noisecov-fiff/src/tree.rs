//! Block tree built from the tag sequence of a file.

use crate::constants::*;
use crate::error::{FiffError, Result};
use crate::tag::{FileId, Tag, be_i32};
use std::path::Path;

/// A block and everything nested inside it.
///
/// The root node has block kind `0` and holds the top-level tags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    /// Block kind (e.g. [`FIFFB_MNE_COV`])
    pub block: i32,
    /// Tags directly inside this block, in file order
    pub tags: Vec<Tag>,
    /// Nested blocks, in file order
    pub children: Vec<Node>,
}

impl Node {
    /// Create an empty block.
    pub const fn new(block: i32) -> Self {
        Self {
            block,
            tags: Vec::new(),
            children: Vec::new(),
        }
    }

    /// First tag of the given kind directly inside this block.
    pub fn find_tag(&self, kind: i32) -> Option<&Tag> {
        self.tags.iter().find(|t| t.kind == kind)
    }

    /// All blocks of the given kind in this subtree, depth-first in file order.
    pub fn dir_tree_find(&self, block: i32) -> Vec<&Self> {
        let mut found = Vec::new();
        self.collect_blocks(block, &mut found);
        found
    }

    fn collect_blocks<'a>(&'a self, block: i32, found: &mut Vec<&'a Self>) {
        if self.block == block {
            found.push(self);
        }
        for child in &self.children {
            child.collect_blocks(block, found);
        }
    }
}

/// Read a whole file and build its block tree.
pub fn open(path: impl AsRef<Path>) -> Result<(FileId, Node)> {
    let bytes = std::fs::read(path.as_ref())?;
    log::debug!(
        "Read {} bytes from {}",
        bytes.len(),
        path.as_ref().display()
    );
    parse(&bytes)
}

fn read_tag(bytes: &[u8], offset: usize) -> Result<Tag> {
    let available = bytes.len() - offset;
    if available < TAG_HEADER_SIZE {
        return Err(FiffError::Truncated {
            offset,
            needed: TAG_HEADER_SIZE,
            available,
        });
    }
    let header = &bytes[offset..offset + TAG_HEADER_SIZE];
    let kind = be_i32(&header[0..4]);
    let ty = be_i32(&header[4..8]);
    let size = be_i32(&header[8..12]);
    let next = be_i32(&header[12..16]);

    let size = usize::try_from(size).map_err(|_| FiffError::Malformed {
        kind,
        reason: format!("negative size {size}"),
    })?;
    if available - TAG_HEADER_SIZE < size {
        return Err(FiffError::Truncated {
            offset,
            needed: TAG_HEADER_SIZE + size,
            available,
        });
    }
    let start = offset + TAG_HEADER_SIZE;
    Ok(Tag {
        kind,
        ty,
        next,
        data: bytes[start..start + size].to_vec(),
    })
}

/// Build the block tree from an in-memory file image.
pub fn parse(bytes: &[u8]) -> Result<(FileId, Node)> {
    if bytes.len() >= 4 {
        let kind = be_i32(&bytes[0..4]);
        if kind != FIFF_FILE_ID {
            return Err(FiffError::NotAFiffFile(kind));
        }
    }
    let first = read_tag(bytes, 0)?;
    let file_id = first.as_file_id()?;

    let mut stack = vec![Node::new(0)];
    let mut offset = TAG_HEADER_SIZE + first.data.len();

    while offset < bytes.len() {
        let tag = read_tag(bytes, offset)?;
        let this_offset = offset;
        offset += TAG_HEADER_SIZE + tag.data.len();

        match tag.kind {
            FIFF_BLOCK_START => stack.push(Node::new(tag.as_int()?)),
            FIFF_BLOCK_END => {
                let block = tag.as_int()?;
                if stack.len() < 2 {
                    return Err(FiffError::UnbalancedBlock(format!(
                        "end of block {block} without a start"
                    )));
                }
                let node = stack.pop().unwrap_or_default();
                if node.block != block {
                    return Err(FiffError::UnbalancedBlock(format!(
                        "block {} closed as {block}",
                        node.block
                    )));
                }
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                }
            }
            FIFF_NOP | FIFF_DIR_POINTER => {}
            _ => {
                if let Some(current) = stack.last_mut() {
                    current.tags.push(tag.clone());
                }
            }
        }

        if tag.next == FIFFV_NEXT_NONE {
            break;
        }
        if tag.next > 0 {
            let target = tag.next as usize;
            if target <= this_offset {
                return Err(FiffError::Malformed {
                    kind: tag.kind,
                    reason: format!("next pointer {target} does not move forward"),
                });
            }
            offset = target;
        }
    }

    if stack.len() != 1 {
        return Err(FiffError::UnbalancedBlock(format!(
            "{} block(s) left open at end of file",
            stack.len() - 1
        )));
    }
    Ok((file_id, stack.pop().unwrap_or_default()))
}
