//! The block tree and longest-chain consensus rule.
//!
//! Grounded in `original_source/consensus.py`'s `BlockNode`/
//! `ConsensusMechanism`, but stored as an arena (`Vec<BlockNode>` indexed by
//! integer handles) rather than parent/child object references, since there
//! is no owner for a node once it has two or more children. The
//! common-ancestor walk is generalized to equalize branch heights first
//! using each node's known height before climbing in lockstep — the
//! original's version climbs both branches one step at a time unconditionally
//! and can run past the root on branches of uneven depth.

use crate::block::MinedBlock;
use shared::Hash;

pub type NodeHandle = usize;

#[derive(Debug, Clone)]
struct BlockNode {
    parent: Option<NodeHandle>,
    children: Vec<NodeHandle>,
    height: u64,
    block: MinedBlock,
}

/// The set of blocks to undo (from the old tip down to the fork point) and
/// redo (from the fork point up to the new tip) after a reorg.
#[derive(Debug, Clone, Default)]
pub struct ReorgPlan {
    pub to_undo: Vec<MinedBlock>,
    pub to_redo: Vec<MinedBlock>,
}

impl ReorgPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_undo.is_empty() && self.to_redo.is_empty()
    }
}

/// The block tree: every known block, linked by arena handles, tracking the
/// current longest chain's tip and height.
#[derive(Debug)]
pub struct ConsensusEngine {
    nodes: Vec<BlockNode>,
    root: Option<NodeHandle>,
    orphan_threshold: u64,
    longest_chain_height: u64,
    second_longest_head_height: u64,
    longest_chain_head: Option<NodeHandle>,
}

impl ConsensusEngine {
    #[must_use]
    pub fn new(orphan_threshold: u64) -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            orphan_threshold,
            longest_chain_height: 0,
            second_longest_head_height: 0,
            longest_chain_head: None,
        }
    }

    #[must_use]
    pub fn longest_chain_head(&self) -> Option<&MinedBlock> {
        self.longest_chain_head.map(|idx| &self.nodes[idx].block)
    }

    #[must_use]
    pub fn longest_chain_height(&self) -> u64 {
        self.longest_chain_height
    }

    /// Adds `block` to the tree, attaching it under whichever node's hash
    /// matches `block.previous_hash`. Returns the empty plan unless
    /// attaching it extended the chain past the current tip from a
    /// different parent than the existing tip, in which case it returns the
    /// blocks to undo and redo to adopt the new longest chain.
    pub fn add_block(&mut self, block: MinedBlock) -> ReorgPlan {
        if block.previous_hash.is_null() {
            let idx = self.push_node(None, 0, block);
            self.root = Some(idx);
            self.longest_chain_head = Some(idx);
            self.longest_chain_height = 0;
            return ReorgPlan::default();
        }

        let Some(root) = self.root else {
            return ReorgPlan::default();
        };
        self.attach_under(root, block)
    }

    fn attach_under(&mut self, current: NodeHandle, block: MinedBlock) -> ReorgPlan {
        if self.nodes[current].block.block_hash == block.previous_hash {
            let height = self.nodes[current].height + 1;
            let new_idx = self.push_node(Some(current), height, block);
            self.nodes[current].children.push(new_idx);

            let mut plan = ReorgPlan::default();
            if height > self.longest_chain_height {
                self.longest_chain_height = height;

                if let Some(head) = self.longest_chain_head {
                    if head != current {
                        let common = self.find_common_ancestor(new_idx, head);
                        plan = ReorgPlan {
                            to_undo: self.path_blocks(common, head),
                            to_redo: self.path_blocks(common, new_idx),
                        };
                        self.second_longest_head_height = self.nodes[head].height;
                    }
                }
                self.longest_chain_head = Some(new_idx);
            }
            return plan;
        }

        let children = self.nodes[current].children.clone();
        for child in children {
            let plan = self.attach_under(child, block.clone());
            if !plan.is_empty() {
                return plan;
            }
        }
        ReorgPlan::default()
    }

    /// Finds where two branches diverge by equalizing their heights, then
    /// climbing both in lockstep until the handles coincide.
    fn find_common_ancestor(&self, a: NodeHandle, b: NodeHandle) -> NodeHandle {
        let mut ptr_a = a;
        let mut ptr_b = b;

        while self.nodes[ptr_a].height > self.nodes[ptr_b].height {
            ptr_a = self.nodes[ptr_a].parent.expect("non-root ancestor has a parent");
        }
        while self.nodes[ptr_b].height > self.nodes[ptr_a].height {
            ptr_b = self.nodes[ptr_b].parent.expect("non-root ancestor has a parent");
        }
        while ptr_a != ptr_b {
            ptr_a = self.nodes[ptr_a].parent.expect("non-root ancestor has a parent");
            ptr_b = self.nodes[ptr_b].parent.expect("non-root ancestor has a parent");
        }
        ptr_a
    }

    /// Blocks from `end` up to (but not including) `start`, tip-first.
    fn path_blocks(&self, start: NodeHandle, end: NodeHandle) -> Vec<MinedBlock> {
        let mut blocks = Vec::new();
        let mut current = end;
        while current != start {
            blocks.push(self.nodes[current].block.clone());
            current = self.nodes[current]
                .parent
                .expect("path never reaches past the fork point");
        }
        blocks
    }

    /// Prunes stale side chains once the main chain has pulled far enough
    /// ahead of the runner-up, returning the orphaned blocks so the caller
    /// can redistribute their still-valid transactions back into the
    /// mempool.
    ///
    /// At every ancestor level along the main chain, siblings of the node
    /// actually on the main chain are cut loose and their subtrees
    /// collected.
    pub fn identify_orphans(&mut self) -> Vec<MinedBlock> {
        let mut orphan_heads = Vec::new();

        if self.longest_chain_height.saturating_sub(self.second_longest_head_height)
            > self.orphan_threshold
        {
            let mut current = self.longest_chain_head;
            while let Some(cur_idx) = current {
                if self.nodes[cur_idx].height == 0 {
                    break;
                }
                let parent_idx = self.nodes[cur_idx]
                    .parent
                    .expect("non-root block has a parent");

                if self.nodes[parent_idx].children.len() > 1 {
                    for &sibling in &self.nodes[parent_idx].children.clone() {
                        if sibling != cur_idx {
                            orphan_heads.push(sibling);
                        }
                    }
                    self.nodes[parent_idx].children = vec![cur_idx];
                }
                current = Some(parent_idx);
            }
        }

        let mut blocks = Vec::new();
        for head in orphan_heads {
            self.collect_subtree(head, &mut blocks);
        }
        blocks
    }

    fn collect_subtree(&self, idx: NodeHandle, out: &mut Vec<MinedBlock>) {
        out.push(self.nodes[idx].block.clone());
        for &child in &self.nodes[idx].children {
            self.collect_subtree(child, out);
        }
    }

    fn push_node(&mut self, parent: Option<NodeHandle>, height: u64, block: MinedBlock) -> NodeHandle {
        self.nodes.push(BlockNode {
            parent,
            children: Vec::new(),
            height,
            block,
        });
        self.nodes.len() - 1
    }
}
