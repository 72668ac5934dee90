//! Merkle commitment over an ordered item sequence
//!
//! Items are fed through a bounded queue to a worker thread that pairs them
//! into leaves as they arrive. `MerkleBuilder::wait` closes the queue, joins
//! the worker and hands back the finished tree.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

use serde::Serialize;
use tracing::debug;

use crate::codec;
use crate::constants::MERKLE_QUEUE_CAPACITY;
use crate::error::{ChainError, Result};
use crate::hashing::hash256;
use crate::types::Hash;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleNode {
    pub left: Option<Hash>,
    pub right: Option<Hash>,
    pub data: Hash,
}

impl MerkleNode {
    /// Leaf over a pair of encoded items
    fn leaf(left: &[u8], right: &[u8]) -> Self {
        let mut pre_image = Vec::with_capacity(left.len() + right.len());
        pre_image.extend_from_slice(left);
        pre_image.extend_from_slice(right);
        MerkleNode { left: None, right: None, data: hash256(&pre_image) }
    }

    fn branch(left: &MerkleNode, right: &MerkleNode) -> Self {
        let mut pre_image = [0u8; 64];
        pre_image[..32].copy_from_slice(&left.data);
        pre_image[32..].copy_from_slice(&right.data);
        MerkleNode {
            left: Some(left.data),
            right: Some(right.data),
            data: hash256(&pre_image),
        }
    }
}

/// A finished tree: its root and the items it commits to, in order
#[derive(Debug, Clone)]
pub struct MerkleTree<T> {
    pub root: MerkleNode,
    pub items: Vec<T>,
}

impl<T> MerkleTree<T> {
    pub fn root_hash(&self) -> Hash {
        self.root.data
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

/// One-shot builder. Consumed by `wait`, so it cannot be reused.
pub struct MerkleBuilder<T> {
    sender: Option<SyncSender<T>>,
    worker: JoinHandle<Result<MerkleTree<T>>>,
}

impl<T> MerkleBuilder<T>
where
    T: Serialize + Send + 'static,
{
    pub fn spawn() -> Self {
        let (sender, receiver) = sync_channel(MERKLE_QUEUE_CAPACITY);
        let worker = thread::spawn(move || build_from_queue(receiver));
        MerkleBuilder { sender: Some(sender), worker }
    }

    /// Queue the next item. Blocks while the queue is full.
    pub fn submit(&self, item: T) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| ChainError::Internal("merkle queue already closed".into()))?;
        sender
            .send(item)
            .map_err(|_| ChainError::Internal("merkle worker stopped before the queue closed".into()))
    }

    /// Close the queue and block until the root is computed.
    pub fn wait(mut self) -> Result<MerkleTree<T>> {
        drop(self.sender.take());
        self.worker
            .join()
            .map_err(|_| ChainError::Internal("merkle worker panicked".into()))?
    }

    /// Submit every item in order and wait for the tree.
    pub fn build(items: impl IntoIterator<Item = T>) -> Result<MerkleTree<T>> {
        let builder = Self::spawn();
        for item in items {
            // the worker has failed; its error is reported by wait()
            if builder.submit(item).is_err() {
                break;
            }
        }
        builder.wait()
    }
}

fn build_from_queue<T: Serialize>(queue: Receiver<T>) -> Result<MerkleTree<T>> {
    let mut items = Vec::new();
    let mut leaves = Vec::new();

    while let Ok(left) = queue.recv() {
        let left_bytes = codec::serialize(&left)?;
        // queue closed with no partner: pair the item with itself
        match queue.recv() {
            Ok(right) => {
                leaves.push(MerkleNode::leaf(&left_bytes, &codec::serialize(&right)?));
                items.push(left);
                items.push(right);
            }
            Err(_) => {
                leaves.push(MerkleNode::leaf(&left_bytes, &left_bytes));
                items.push(left);
            }
        }
    }

    if items.is_empty() {
        return Err(ChainError::EmptyMerkleTree);
    }

    let leaf_count = leaves.len();
    let mut level = leaves;
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            if let Some(last) = level.last().cloned() {
                level.push(last);
            }
        }
        level = level
            .chunks(2)
            .map(|pair| MerkleNode::branch(&pair[0], &pair[1]))
            .collect();
    }

    if level.len() != 1 {
        return Err(ChainError::Internal(format!(
            "merkle fold ended with {} nodes",
            level.len()
        )));
    }
    let root = level.remove(0);

    debug!(items = items.len(), leaves = leaf_count, root = %hex::encode(root.data), "merkle tree built");
    Ok(MerkleTree { root, items })
}
