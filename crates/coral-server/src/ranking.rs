//! Community-wide ranking by effective total.
//!
//! Entries live in an order-statistics treap: a binary search tree over
//! [`RankKey`] whose nodes carry subtree sizes and random heap priorities.
//! Upsert and rank lookups are O(log n) expected, top-k is O(k + log n).

use std::cmp::{Ordering, Reverse};
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use coral_shared::UserId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::error::ContributionError;

/// Sort key: higher totals first, then earlier first contribution, then id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RankKey {
    total: Reverse<u64>,
    first_contribution_at: DateTime<Utc>,
    user_id: UserId,
}

type Link = Option<Box<Node>>;

#[derive(Debug)]
struct Node {
    key: RankKey,
    priority: u64,
    size: usize,
    left: Link,
    right: Link,
}

impl Node {
    fn new(key: RankKey, priority: u64) -> Box<Self> {
        Box::new(Self {
            key,
            priority,
            size: 1,
            left: None,
            right: None,
        })
    }

    fn refresh(&mut self) {
        self.size = 1 + size(&self.left) + size(&self.right);
    }
}

fn size(link: &Link) -> usize {
    link.as_ref().map_or(0, |node| node.size)
}

/// Split into (keys where `goes_left` holds, the rest). `goes_left` must be
/// monotone over the key order.
fn split<F>(link: Link, goes_left: &F) -> (Link, Link)
where
    F: Fn(&RankKey) -> bool,
{
    match link {
        None => (None, None),
        Some(mut node) => {
            if goes_left(&node.key) {
                let (l, r) = split(node.right.take(), goes_left);
                node.right = l;
                node.refresh();
                (Some(node), r)
            } else {
                let (l, r) = split(node.left.take(), goes_left);
                node.left = r;
                node.refresh();
                (l, Some(node))
            }
        }
    }
}

/// Join two trees where every key of `a` sorts before every key of `b`.
fn merge(a: Link, b: Link) -> Link {
    match (a, b) {
        (None, b) => b,
        (a, None) => a,
        (Some(mut a), Some(mut b)) => {
            if a.priority >= b.priority {
                a.right = merge(a.right.take(), Some(b));
                a.refresh();
                Some(a)
            } else {
                b.left = merge(Some(a), b.left.take());
                b.refresh();
                Some(b)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedUser {
    pub rank: usize,
    pub user_id: UserId,
    pub total_points: u64,
}

/// Total order of users by effective total.
#[derive(Debug)]
pub struct RankingIndex {
    root: Link,
    keys: HashMap<UserId, RankKey>,
    rng: StdRng,
}

impl Default for RankingIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl RankingIndex {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Fixed priority seed; the ordering itself never depends on it.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            root: None,
            keys: HashMap::new(),
            rng,
        }
    }

    /// Insert a user or move them to their new position.
    pub fn upsert(&mut self, user_id: UserId, total: u64, first_contribution_at: DateTime<Utc>) {
        let key = RankKey {
            total: Reverse(total),
            first_contribution_at,
            user_id: user_id.clone(),
        };
        if let Some(old) = self.keys.get(&user_id) {
            if *old == key {
                return;
            }
            let old = old.clone();
            self.detach(&old);
        }
        let (left, right) = split(self.root.take(), &|k: &RankKey| *k < key);
        let node = Node::new(key.clone(), self.rng.gen());
        self.root = merge(merge(left, Some(node)), right);
        self.keys.insert(user_id, key);
    }

    fn detach(&mut self, key: &RankKey) {
        let (left, rest) = split(self.root.take(), &|k: &RankKey| k < key);
        let (_removed, right) = split(rest, &|k: &RankKey| k <= key);
        self.root = merge(left, right);
    }

    /// 1-based rank of a user.
    pub fn rank_of(&self, user_id: &UserId) -> Result<usize, ContributionError> {
        let key = self
            .keys
            .get(user_id)
            .ok_or_else(|| ContributionError::NotFound(user_id.clone()))?;

        let mut before = 0;
        let mut cursor = &self.root;
        while let Some(node) = cursor {
            match key.cmp(&node.key) {
                Ordering::Less => cursor = &node.left,
                Ordering::Equal => return Ok(before + size(&node.left) + 1),
                Ordering::Greater => {
                    before += size(&node.left) + 1;
                    cursor = &node.right;
                }
            }
        }
        Err(ContributionError::Integrity(format!(
            "user {user_id} has a ranking key but no ranking node"
        )))
    }

    /// The `k` highest-ranked users, best first.
    pub fn top(&self, k: usize) -> Vec<RankedUser> {
        let mut out = Vec::with_capacity(k.min(self.len()));
        let mut stack: Vec<&Node> = Vec::new();
        let mut cursor = self.root.as_deref();
        while out.len() < k {
            while let Some(node) = cursor {
                stack.push(node);
                cursor = node.left.as_deref();
            }
            let Some(node) = stack.pop() else {
                break;
            };
            out.push(RankedUser {
                rank: out.len() + 1,
                user_id: node.key.user_id.clone(),
                total_points: node.key.total.0,
            });
            cursor = node.right.as_deref();
        }
        out
    }

    pub fn len(&self) -> usize {
        size(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }
}
