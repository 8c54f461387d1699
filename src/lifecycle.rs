//! Ownership bookkeeping for promise chains.
//!
//! Every promise owns a [`Node`]. A node keeps its `parent` alive through a strong link, keeps
//! itself alive through a `this` link while its body is outstanding, and is listed in the
//! [`Chain`] registry shared by every node descended from the same root. When a body finishes
//! the node drops its parent's `this` link and its own, and takes both out of the registry, so
//! an unobserved chain frees itself once it has run. An await releases the whole registry at once.

use std::{
    fmt, mem,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering},
        Arc, Mutex, Weak,
    },
};

use crate::{lock, Error, Spawner};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Running,
    Settled,
    Released,
}

impl Phase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Phase::Running,
            1 => Phase::Settled,
            _ => Phase::Released,
        }
    }
}

/// The registry of live nodes shared by one chain.
pub(crate) struct Chain {
    id: u64,
    spawner: Spawner,
    members: Mutex<Vec<Arc<Node>>>,
    released: AtomicBool,
}

impl Chain {
    fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.members).len()
    }

    fn remove(&self, ids: &[u64]) -> Vec<Arc<Node>> {
        let mut members = lock(&self.members);
        let (removed, kept): (Vec<_>, Vec<_>) = mem::take(&mut *members)
            .into_iter()
            .partition(|member| ids.contains(&member.id));
        *members = kept;
        removed
    }

    /// Drops every link held by the chain's nodes. Called once the chain's result was observed.
    fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        let members = mem::take(&mut *lock(&self.members));
        log::debug!("releasing chain #{} with {} live nodes", self.id, members.len());
        let links: Vec<_> = members.iter().map(|member| member.sever()).collect();
        drop(links);
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("id", &self.id)
            .field("members", &self.len())
            .field("released", &self.is_released())
            .finish()
    }
}

#[derive(Default)]
struct Links {
    parent: Option<Arc<Node>>,
    this: Option<Arc<Node>>,
}

/// The lifecycle node of one promise.
pub(crate) struct Node {
    id: u64,
    chain: Arc<Chain>,
    links: Mutex<Links>,
    phase: AtomicU8,
}

impl Node {
    /// A node starting a fresh chain.
    pub(crate) fn root(spawner: Spawner) -> Arc<Node> {
        let chain = Arc::new(Chain {
            id: next_id(),
            spawner,
            members: Mutex::new(Vec::new()),
            released: AtomicBool::new(false),
        });
        Self::attach(chain, None)
    }

    fn attach(chain: Arc<Chain>, parent: Option<Arc<Node>>) -> Arc<Node> {
        let node = Arc::new(Node {
            id: next_id(),
            chain: chain.clone(),
            links: Mutex::new(Links { parent, this: None }),
            phase: AtomicU8::new(Phase::Running as u8),
        });
        lock(&node.links).this = Some(node.clone());
        lock(&chain.members).push(node.clone());
        node
    }

    /// A node consuming this node's output, on the same chain.
    pub(crate) fn adopt(self: &Arc<Self>) -> Result<Arc<Node>, Error> {
        if self.chain.is_released() {
            return Err(Error::Released);
        }
        Ok(Self::attach(self.chain.clone(), Some(self.clone())))
    }

    /// Unwinds the bookkeeping once this node's body has settled.
    pub(crate) fn finish_process(&self) {
        let _ = self.phase.compare_exchange(
            Phase::Running as u8,
            Phase::Settled as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        let parent = lock(&self.links).parent.take();
        let mut ids = vec![self.id];
        ids.extend(parent.iter().map(|parent| parent.id));
        let removed = self.chain.remove(&ids);
        let parent_this = parent.as_ref().and_then(|parent| parent.drop_self());
        let this = lock(&self.links).this.take();
        log::trace!(
            "node #{} finished, chain #{} keeps {} nodes",
            self.id,
            self.chain.id,
            self.chain.len()
        );
        drop((removed, parent_this, parent, this));
    }

    fn drop_self(&self) -> Option<Arc<Node>> {
        lock(&self.links).this.take()
    }

    fn sever(&self) -> Links {
        self.phase.store(Phase::Released as u8, Ordering::Release);
        mem::take(&mut *lock(&self.links))
    }

    pub(crate) fn release_chain(&self) {
        self.chain.release();
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn spawner(&self) -> &Spawner {
        &self.chain.spawner
    }

    pub(crate) fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub(crate) fn tracker(self: &Arc<Self>) -> Tracker {
        Tracker {
            node: Arc::downgrade(self),
            chain: Arc::downgrade(&self.chain),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("chain", &self.chain.id)
            .field("phase", &self.phase())
            .finish()
    }
}

/// A weak observer of one promise's lifecycle node and of its chain.
///
/// Holding a tracker never keeps anything alive, which makes it a way to check that a chain
/// was reclaimed after its result was observed.
///
/// # Examples
///
/// ```
/// use promise_chain::resolve;
///
/// let root = resolve(1);
/// let tracker = root.tracker();
/// let tail = root.then(|x| x + 1);
/// assert_eq!(tail.await_promise().unwrap(), 2);
/// assert_eq!(tracker.chain_len(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct Tracker {
    node: Weak<Node>,
    chain: Weak<Chain>,
}

impl Tracker {
    /// `true` once nothing refers to the node any more.
    pub fn is_reclaimed(&self) -> bool {
        self.node.strong_count() == 0
    }

    /// `true` once every node of the chain, and the registry itself, is gone.
    pub fn is_chain_reclaimed(&self) -> bool {
        self.chain.strong_count() == 0
    }

    /// How many nodes the chain registry still lists.
    pub fn chain_len(&self) -> usize {
        self.chain.upgrade().map_or(0, |chain| chain.len())
    }
}
