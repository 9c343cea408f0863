//! Read-time projections: scores, the viewer's own vote, comment counts and
//! nested reply trees. Nothing here touches the database; callers load rows
//! and votes, then project. No derived value is ever persisted.

use serde::Serialize;
use std::collections::HashMap;

use crate::db::models::{CommentRecord, PostRecord, UserPublic, Vote};
use crate::votes::{Direction, VoteTarget};

/// Score and the viewer's own direction for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tally {
    pub score: i64,
    pub user_vote: Option<Direction>,
}

/// Votes grouped by target, built once per request.
#[derive(Debug, Default)]
pub struct VoteIndex {
    by_target: HashMap<VoteTarget, Vec<Vote>>,
}

impl VoteIndex {
    pub fn new(votes: impl IntoIterator<Item = Vote>) -> Self {
        let mut by_target: HashMap<VoteTarget, Vec<Vote>> = HashMap::new();
        for vote in votes {
            by_target.entry(vote.target).or_default().push(vote);
        }
        Self { by_target }
    }

    pub fn tally(&self, target: VoteTarget, viewer: Option<i64>) -> Tally {
        let votes = match self.by_target.get(&target) {
            Some(votes) => votes,
            None => return Tally::default(),
        };
        Tally {
            score: votes.iter().map(|v| v.direction.value()).sum(),
            user_vote: viewer.and_then(|uid| {
                votes
                    .iter()
                    .find(|v| v.user_id == uid)
                    .map(|v| v.direction)
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: i64,
    pub title: String,
    pub body: Option<String>,
    pub link_url: Option<String>,
    pub author: UserPublic,
    pub score: i64,
    pub comment_count: i64,
    pub user_vote: Option<Direction>,
    pub created_at: String,
    pub updated_at: String,
}

/// Project a post. `comment_count` is the number of live comments on it at
/// any depth.
pub fn enrich_post(
    record: &PostRecord,
    votes: &VoteIndex,
    comment_count: i64,
    viewer: Option<i64>,
) -> PostView {
    let post = &record.post;
    let tally = votes.tally(VoteTarget::Post(post.id), viewer);

    PostView {
        id: post.id,
        title: post.title.clone(),
        body: post.body.clone(),
        link_url: post.link_url.clone(),
        author: record.author.clone(),
        score: tally.score,
        comment_count,
        user_vote: tally.user_vote,
        created_at: post.created_at.clone(),
        updated_at: post.updated_at.clone(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: i64,
    pub body: String,
    pub author: UserPublic,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub score: i64,
    pub user_vote: Option<Direction>,
    pub replies: Vec<CommentView>,
    pub created_at: String,
    pub updated_at: String,
}

/// Comments of one post indexed by id, plus a parent → children adjacency
/// list ordered by creation.
#[derive(Debug, Default)]
pub struct CommentForest {
    nodes: HashMap<i64, CommentRecord>,
    children: HashMap<Option<i64>, Vec<i64>>,
}

impl CommentForest {
    pub fn new(records: Vec<CommentRecord>) -> Self {
        let mut children: HashMap<Option<i64>, Vec<i64>> = HashMap::new();
        let mut nodes = HashMap::with_capacity(records.len());

        for record in records {
            children
                .entry(record.comment.parent_id)
                .or_default()
                .push(record.comment.id);
            nodes.insert(record.comment.id, record);
        }

        for ids in children.values_mut() {
            ids.sort_by(|a, b| {
                let (ca, cb) = (&nodes[a].comment, &nodes[b].comment);
                ca.created_at.cmp(&cb.created_at).then(ca.id.cmp(&cb.id))
            });
        }

        Self { nodes, children }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Live top-level comments with their reply trees. Replies under a
    /// deleted comment are not reachable from here.
    pub fn top_level(&self, votes: &VoteIndex, viewer: Option<i64>) -> Vec<CommentView> {
        self.live_children(None)
            .map(|id| self.build(id, votes, viewer))
            .collect()
    }

    /// The subtree rooted at `id`, or `None` if it is missing or deleted.
    pub fn subtree(&self, id: i64, votes: &VoteIndex, viewer: Option<i64>) -> Option<CommentView> {
        let record = self.nodes.get(&id)?;
        if record.comment.is_deleted {
            return None;
        }
        Some(self.build(id, votes, viewer))
    }

    fn live_children(&self, parent: Option<i64>) -> impl Iterator<Item = i64> + '_ {
        self.children
            .get(&parent)
            .into_iter()
            .flatten()
            .copied()
            .filter(|id| !self.nodes[id].comment.is_deleted)
    }

    fn build(&self, id: i64, votes: &VoteIndex, viewer: Option<i64>) -> CommentView {
        let record = &self.nodes[&id];
        let comment = &record.comment;
        let tally = votes.tally(VoteTarget::Comment(id), viewer);
        let replies = self
            .live_children(Some(id))
            .map(|child| self.build(child, votes, viewer))
            .collect();

        CommentView {
            id,
            body: comment.body.clone(),
            author: record.author.clone(),
            post_id: comment.post_id,
            parent_id: comment.parent_id,
            score: tally.score,
            user_vote: tally.user_vote,
            replies,
            created_at: comment.created_at.clone(),
            updated_at: comment.updated_at.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Comment, Post};

    fn author(id: i64) -> UserPublic {
        UserPublic {
            id,
            username: format!("user{}", id),
            display_name: None,
            bio: None,
            avatar_url: None,
            created_at: "2024-01-01T00:00:00.000Z".into(),
        }
    }

    fn comment(id: i64, parent_id: Option<i64>, created_at: &str, deleted: bool) -> CommentRecord {
        CommentRecord {
            comment: Comment {
                id,
                body: format!("comment {}", id),
                author_id: 1,
                post_id: 1,
                parent_id,
                is_deleted: deleted,
                created_at: created_at.into(),
                updated_at: created_at.into(),
            },
            author: author(1),
        }
    }

    fn vote(id: i64, user_id: i64, target: VoteTarget, direction: Direction) -> Vote {
        Vote {
            id,
            user_id,
            target,
            direction,
        }
    }

    fn post_record() -> PostRecord {
        PostRecord {
            post: Post {
                id: 1,
                title: "hello".into(),
                body: Some("world".into()),
                link_url: None,
                author_id: 1,
                is_deleted: false,
                created_at: "2024-01-01T00:00:00.000Z".into(),
                updated_at: "2024-01-01T00:00:00.000Z".into(),
            },
            author: author(1),
        }
    }

    #[test]
    fn tally_sums_directions_and_finds_viewer_vote() {
        let post = VoteTarget::Post(1);
        let index = VoteIndex::new(vec![
            vote(1, 10, post, Direction::Up),
            vote(2, 11, post, Direction::Up),
            vote(3, 12, post, Direction::Down),
            vote(4, 10, VoteTarget::Comment(1), Direction::Down),
        ]);

        let anonymous = index.tally(post, None);
        assert_eq!(anonymous.score, 1);
        assert_eq!(anonymous.user_vote, None);

        assert_eq!(index.tally(post, Some(12)).user_vote, Some(Direction::Down));
        assert_eq!(index.tally(post, Some(99)).user_vote, None);
        assert_eq!(index.tally(VoteTarget::Post(2), Some(10)), Tally::default());
    }

    #[test]
    fn enrich_post_carries_count_score_and_viewer_vote() {
        let votes = VoteIndex::new(vec![vote(1, 7, VoteTarget::Post(1), Direction::Up)]);

        let view = enrich_post(&post_record(), &votes, 3, Some(7));
        assert_eq!(view.comment_count, 3);
        assert_eq!(view.score, 1);
        assert_eq!(view.user_vote, Some(Direction::Up));
    }

    #[test]
    fn replies_are_nested_in_creation_order() {
        let forest = CommentForest::new(vec![
            comment(3, Some(1), "2024-01-01T00:00:05.000Z", false),
            comment(1, None, "2024-01-01T00:00:01.000Z", false),
            comment(2, Some(1), "2024-01-01T00:00:02.000Z", false),
            comment(4, Some(2), "2024-01-01T00:00:06.000Z", false),
            comment(5, None, "2024-01-01T00:00:03.000Z", false),
        ]);
        let votes = VoteIndex::default();

        let tree = forest.top_level(&votes, None);
        let roots: Vec<i64> = tree.iter().map(|c| c.id).collect();
        assert_eq!(roots, vec![1, 5]);

        let replies: Vec<i64> = tree[0].replies.iter().map(|c| c.id).collect();
        assert_eq!(replies, vec![2, 3]);
        assert_eq!(tree[0].replies[0].replies[0].id, 4);
    }

    #[test]
    fn equal_timestamps_fall_back_to_id_order() {
        let forest = CommentForest::new(vec![
            comment(9, None, "2024-01-01T00:00:01.000Z", false),
            comment(8, None, "2024-01-01T00:00:01.000Z", false),
        ]);
        let ids: Vec<i64> = forest
            .top_level(&VoteIndex::default(), None)
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![8, 9]);
    }

    #[test]
    fn deleted_replies_are_dropped_not_tombstoned() {
        let forest = CommentForest::new(vec![
            comment(1, None, "2024-01-01T00:00:01.000Z", false),
            comment(2, Some(1), "2024-01-01T00:00:02.000Z", true),
            comment(3, Some(2), "2024-01-01T00:00:03.000Z", false),
            comment(4, Some(1), "2024-01-01T00:00:04.000Z", false),
        ]);
        let tree = forest.top_level(&VoteIndex::default(), None);

        assert_eq!(tree.len(), 1);
        let replies: Vec<i64> = tree[0].replies.iter().map(|c| c.id).collect();
        assert_eq!(replies, vec![4]);
    }

    #[test]
    fn deleted_top_level_comment_orphans_its_live_replies() {
        let forest = CommentForest::new(vec![
            comment(1, None, "2024-01-01T00:00:01.000Z", true),
            comment(2, Some(1), "2024-01-01T00:00:02.000Z", false),
        ]);
        let tree = forest.top_level(&VoteIndex::default(), None);

        assert!(tree.is_empty());
        // Still stored and addressable on its own
        assert_eq!(forest.len(), 2);
        assert!(forest.subtree(2, &VoteIndex::default(), None).is_some());
        assert!(forest.subtree(1, &VoteIndex::default(), None).is_none());
    }

    #[test]
    fn comment_scores_are_per_node() {
        let forest = CommentForest::new(vec![
            comment(1, None, "2024-01-01T00:00:01.000Z", false),
            comment(2, Some(1), "2024-01-01T00:00:02.000Z", false),
        ]);
        let votes = VoteIndex::new(vec![
            vote(1, 5, VoteTarget::Comment(1), Direction::Up),
            vote(2, 6, VoteTarget::Comment(1), Direction::Up),
            vote(3, 5, VoteTarget::Comment(2), Direction::Down),
        ]);

        let tree = forest.top_level(&votes, Some(5));
        assert_eq!(tree[0].score, 2);
        assert_eq!(tree[0].user_vote, Some(Direction::Up));
        assert_eq!(tree[0].replies[0].score, -1);
        assert_eq!(tree[0].replies[0].user_vote, Some(Direction::Down));
    }

    #[test]
    fn comment_view_serializes_camel_case() {
        let forest = CommentForest::new(vec![comment(1, None, "2024-01-01T00:00:01.000Z", false)]);
        let view = forest.subtree(1, &VoteIndex::default(), None).unwrap();
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["postId"], 1);
        assert!(json["parentId"].is_null());
        assert!(json["userVote"].is_null());
        assert_eq!(json["replies"].as_array().unwrap().len(), 0);
    }
}
