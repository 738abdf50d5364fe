//! Move history as a tree: the main line plus any number of variations.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. The first
//! child of every node is its main-line continuation.

use std::fmt::Write as _;

use serde::Serialize;

use crate::board::Board;
use crate::executor;
use crate::moves::Move;
use crate::types::PieceColor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct MoveNode {
    mv: Option<Move>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    comment: Option<String>,
}

impl MoveNode {
    fn root() -> Self {
        Self {
            mv: None,
            parent: None,
            children: Vec::new(),
            comment: None,
        }
    }

    /// The move leading to this node. `None` only for the root.
    pub fn mv(&self) -> Option<&Move> {
        self.mv.as_ref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Continuations; index 0 is the main line.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }
}

/// A branching point passed while navigating forward, and which continuation
/// was taken there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchRecord {
    pub node: NodeId,
    pub variation: usize,
}

#[derive(Debug, Clone)]
pub struct GameTree {
    nodes: Vec<MoveNode>,
    current: NodeId,
    branches: Vec<BranchRecord>,
    start: Board,
}

impl Default for GameTree {
    fn default() -> Self {
        Self::new()
    }
}

impl GameTree {
    /// A tree rooted at the standard starting position.
    pub fn new() -> Self {
        Self::from_position(Board::standard())
    }

    pub fn from_position(start: Board) -> Self {
        Self {
            nodes: vec![MoveNode::root()],
            current: NodeId::ROOT,
            branches: Vec::new(),
            start,
        }
    }

    /// Drop every recorded move and go back to the starting position.
    pub fn new_game(&mut self) {
        self.nodes.clear();
        self.nodes.push(MoveNode::root());
        self.current = NodeId::ROOT;
        self.branches.clear();
    }

    pub fn start_position(&self) -> &Board {
        &self.start
    }

    pub fn current(&self) -> NodeId {
        self.current
    }

    pub fn node(&self, id: NodeId) -> &MoveNode {
        &self.nodes[id.0]
    }

    pub fn branches(&self) -> &[BranchRecord] {
        &self.branches
    }

    pub fn is_at_root(&self) -> bool {
        self.current == NodeId::ROOT
    }

    pub fn current_move(&self) -> Option<&Move> {
        self.node(self.current).mv()
    }

    fn push_child(&mut self, parent: NodeId, mv: Move) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(MoveNode {
            mv: Some(mv),
            parent: Some(parent),
            children: Vec::new(),
            comment: None,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Append `mv` as a continuation of the current node and step into it.
    /// It becomes the main line only if the current node had no continuation.
    pub fn add_move(&mut self, mv: Move) -> NodeId {
        let id = self.push_child(self.current, mv);
        self.current = id;
        id
    }

    /// Record `mv` as an alternative to the current move and step into it.
    /// Nothing happens at the root.
    pub fn add_variation(&mut self, mv: Move) -> Option<NodeId> {
        let parent = self.node(self.current).parent?;
        let id = self.push_child(parent, mv);
        self.current = id;
        Some(id)
    }

    /// Make the current node the main-line continuation of its parent.
    ///
    /// Returns false when there is nothing to promote.
    pub fn promote_current(&mut self) -> bool {
        let Some(parent) = self.node(self.current).parent else {
            return false;
        };
        let current = self.current;
        let Some(index) = self.nodes[parent.0]
            .children
            .iter()
            .position(|c| *c == current)
        else {
            return false;
        };
        if index == 0 {
            return false;
        }

        self.nodes[parent.0].children.swap(0, index);
        for record in self.branches.iter_mut().filter(|r| r.node == parent) {
            if record.variation == index {
                record.variation = 0;
            } else if record.variation == 0 {
                record.variation = index;
            }
        }
        tracing::debug!("Promoted variation {} to main line", index);
        true
    }

    /// Step into continuation `variation` of the current node.
    pub fn advance(&mut self, variation: usize) -> bool {
        let children = &self.nodes[self.current.0].children;
        let Some(&next) = children.get(variation) else {
            return false;
        };
        if children.len() > 1 {
            self.branches.push(BranchRecord {
                node: self.current,
                variation,
            });
        }
        self.current = next;
        true
    }

    /// Step back to the parent of the current node.
    pub fn retreat(&mut self) -> bool {
        let Some(parent) = self.node(self.current).parent else {
            return false;
        };
        let leaving = self.current;
        if let Some(top) = self.branches.last() {
            let taken = self.nodes[top.node.0].children.get(top.variation);
            if top.node == parent && taken == Some(&leaving) {
                self.branches.pop();
            }
        }
        self.current = parent;
        true
    }

    /// Jump back to the most recent branching point that was passed.
    pub fn return_to_last_branch(&mut self) -> bool {
        match self.branches.pop() {
            Some(record) => {
                self.current = record.node;
                true
            }
            None => false,
        }
    }

    /// Position the cursor after `n` main-line moves.
    ///
    /// Fails without moving when the main line is shorter than `n`.
    pub fn goto_half_move(&mut self, n: usize) -> bool {
        if n > self.main_line_len() {
            return false;
        }
        self.current = NodeId::ROOT;
        self.branches.clear();
        for _ in 0..n {
            if !self.advance(0) {
                return false;
            }
        }
        true
    }

    pub fn set_comment(&mut self, text: impl Into<String>) {
        let text = text.into();
        let comment = &mut self.nodes[self.current.0].comment;
        *comment = if text.trim().is_empty() {
            None
        } else {
            Some(text)
        };
    }

    /// Number of moves on the main line.
    pub fn main_line_len(&self) -> usize {
        let mut len = 0;
        let mut node = NodeId::ROOT;
        while let Some(&next) = self.node(node).children.first() {
            len += 1;
            node = next;
        }
        len
    }

    pub fn main_line(&self) -> Vec<Move> {
        let mut moves = Vec::new();
        let mut node = NodeId::ROOT;
        while let Some(&next) = self.node(node).children.first() {
            moves.extend(self.node(next).mv);
            node = next;
        }
        moves
    }

    /// Node ids from the root down to the current node, root excluded.
    pub fn path(&self) -> Vec<NodeId> {
        self.path_to(self.current)
    }

    fn path_to(&self, target: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut node = target;
        while let Some(parent) = self.node(node).parent {
            path.push(node);
            node = parent;
        }
        path.reverse();
        path
    }

    /// Number of moves between the root and the current node.
    pub fn current_ply(&self) -> usize {
        self.path().len()
    }

    /// Replay every move from the root to the current node on a fresh copy
    /// of the starting position.
    pub fn current_position(&self) -> Board {
        self.position_at(self.current)
    }

    /// Board after the move of node `id`.
    pub fn position_at(&self, id: NodeId) -> Board {
        let mut board = self.start.clone_independent();
        for id in self.path_to(id) {
            if let Some(mv) = self.node(id).mv {
                executor::apply(&mut board, &mv);
            }
        }
        board
    }

    /// Render the whole tree as movetext: numbered moves, variations in
    /// parentheses and comments in braces.
    pub fn export_notation(&self) -> String {
        let mut tokens = Vec::new();
        if let Some(comment) = self.node(NodeId::ROOT).comment() {
            tokens.push(format!("{{{}}}", comment));
        }
        self.render_line(NodeId::ROOT, true, &mut tokens);
        tokens.join(" ")
    }

    fn render_line(&self, from: NodeId, mut force_number: bool, out: &mut Vec<String>) {
        let mut node = from;
        while let Some(&main) = self.node(node).children.first() {
            force_number = self.render_move(main, force_number, out);
            for &alternative in &self.node(node).children[1..] {
                let mut inner = Vec::new();
                let force = self.render_move(alternative, true, &mut inner);
                self.render_line(alternative, force, &mut inner);
                out.push(format!("({})", inner.join(" ")));
                force_number = true;
            }
            node = main;
        }
    }

    /// Push the tokens of a single move. Returns whether the next black move
    /// needs an explicit number.
    fn render_move(&self, id: NodeId, force_number: bool, out: &mut Vec<String>) -> bool {
        let node = self.node(id);
        let Some(mv) = node.mv else {
            return force_number;
        };
        let mut token = String::new();
        match mv.color {
            PieceColor::White => {
                let _ = write!(token, "{}. ", mv.full_move_number());
            }
            PieceColor::Black if force_number => {
                let _ = write!(token, "{}... ", mv.full_move_number());
            }
            PieceColor::Black => {}
        }
        token.push_str(&mv.notation());
        out.push(token);

        match node.comment() {
            Some(comment) => {
                out.push(format!("{{{}}}", comment));
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::Coord;
    use crate::types::PieceKind;

    /// Build the move for `from -> to` on the tree's current position.
    fn mv(tree: &GameTree, from: &str, to: &str) -> Move {
        let board = tree.current_position();
        Move::on_board(&board, from.parse().unwrap(), to.parse().unwrap()).unwrap()
    }

    fn play(tree: &mut GameTree, from: &str, to: &str) -> NodeId {
        let m = mv(tree, from, to);
        tree.add_move(m)
    }

    fn variation(tree: &mut GameTree, from: &str, to: &str) -> Option<NodeId> {
        let parent = tree.node(tree.current()).parent()?;
        let parent_board = tree.position_at(parent);
        let m = Move::on_board(&parent_board, from.parse().unwrap(), to.parse().unwrap()).unwrap();
        tree.add_variation(m)
    }

    #[test]
    fn test_e4_e5_position() {
        let mut tree = GameTree::new();
        play(&mut tree, "e2", "e4");
        play(&mut tree, "e7", "e5");

        let board = tree.current_position();
        assert!(board.get(Coord::new(4, 1)).is_none());
        assert!(board.get(Coord::new(4, 6)).is_none());
        assert_eq!(board.get(Coord::new(4, 3)).map(|p| p.kind), Some(PieceKind::Pawn));
        assert_eq!(board.get(Coord::new(4, 4)).map(|p| p.kind), Some(PieceKind::Pawn));
        assert_eq!(board.move_number(), 3);
        assert_eq!(board.side_to_move(), PieceColor::White);
    }

    #[test]
    fn test_replay_matches_direct_application() {
        let line = [("e2", "e4"), ("c7", "c5"), ("g1", "f3"), ("d7", "d6"), ("f1", "b5"), ("b8", "d7"), ("e1", "g1")];
        let mut tree = GameTree::new();
        let mut direct = Board::standard();
        for (from, to) in line {
            play(&mut tree, from, to);
            let m = Move::on_board(&direct, from.parse().unwrap(), to.parse().unwrap()).unwrap();
            executor::apply(&mut direct, &m);
        }
        assert!(tree.current_position().same_position(&direct));
        assert_eq!(tree.current_position(), direct);

        for n in 0..=line.len() {
            assert!(tree.goto_half_move(n));
            assert_eq!(tree.current_ply(), n);
        }
    }

    #[test]
    fn test_add_move_on_existing_node_creates_variation() {
        let mut tree = GameTree::new();
        let e4 = play(&mut tree, "e2", "e4");
        tree.retreat();
        let d4 = play(&mut tree, "d2", "d4");

        let root = tree.node(NodeId::ROOT);
        assert_eq!(root.children(), &[e4, d4]);
        assert_eq!(tree.main_line_len(), 1);
        assert_eq!(tree.main_line()[0].to, Coord::new(4, 3));
    }

    #[test]
    fn test_add_variation_is_sibling_and_noop_at_root() {
        let mut tree = GameTree::new();
        let duplicate = mv(&tree, "e2", "e4");
        assert!(tree.add_variation(duplicate).is_none());
        assert!(tree.is_at_root());

        let e4 = play(&mut tree, "e2", "e4");
        let d4 = variation(&mut tree, "d2", "d4").unwrap();
        assert_eq!(tree.node(NodeId::ROOT).children(), &[e4, d4]);
        assert_eq!(tree.current(), d4);
        assert_eq!(tree.node(d4).parent(), Some(NodeId::ROOT));
    }

    #[test]
    fn test_promote_current_changes_main_line() {
        let mut tree = GameTree::new();
        play(&mut tree, "e2", "e4");
        play(&mut tree, "e7", "e5");
        let c5 = variation(&mut tree, "c7", "c5").unwrap();
        play(&mut tree, "g1", "f3");

        tree.goto_half_move(2);
        assert_eq!(tree.current_move().map(|m| m.to), Some(Coord::new(4, 4)));

        tree.goto_half_move(1);
        assert!(tree.advance(1));
        assert_eq!(tree.current(), c5);
        assert!(tree.promote_current());
        assert!(!tree.promote_current());

        assert!(tree.goto_half_move(2));
        assert_eq!(tree.current(), c5);
        assert_eq!(tree.main_line_len(), 3);
    }

    #[test]
    fn test_promote_at_root_is_noop() {
        let mut tree = GameTree::new();
        assert!(!tree.promote_current());
    }

    #[test]
    fn test_promote_first_move_variation() {
        let mut tree = GameTree::new();
        let e4 = play(&mut tree, "e2", "e4");
        let d4 = variation(&mut tree, "d2", "d4").unwrap();
        assert!(tree.promote_current());
        assert_eq!(tree.node(NodeId::ROOT).children(), &[d4, e4]);

        assert!(tree.goto_half_move(1));
        assert_eq!(tree.current(), d4);
    }

    #[test]
    fn test_advance_records_branches_and_retreat_pops() {
        let mut tree = GameTree::new();
        play(&mut tree, "e2", "e4");
        variation(&mut tree, "d2", "d4");
        play(&mut tree, "d7", "d5");
        tree.goto_half_move(0);

        assert!(!tree.advance(2));
        assert!(tree.branches().is_empty());

        assert!(tree.advance(1));
        assert_eq!(
            tree.branches(),
            &[BranchRecord {
                node: NodeId::ROOT,
                variation: 1
            }]
        );
        assert!(tree.advance(0));
        assert_eq!(tree.branches().len(), 1);

        assert!(tree.retreat());
        assert_eq!(tree.branches().len(), 1);
        assert!(tree.retreat());
        assert!(tree.branches().is_empty());
        assert!(tree.is_at_root());
        assert!(!tree.retreat());
    }

    #[test]
    fn test_return_to_last_branch() {
        let mut tree = GameTree::new();
        play(&mut tree, "e2", "e4");
        let e5 = play(&mut tree, "e7", "e5");
        variation(&mut tree, "c7", "c5");
        tree.goto_half_move(0);

        assert!(tree.advance(0));
        let e4 = tree.current();
        assert!(tree.advance(1));
        assert!(tree.return_to_last_branch());
        assert_eq!(tree.current(), e4);
        assert!(tree.advance(0));
        assert_eq!(tree.current(), e5);
        assert!(tree.return_to_last_branch());
        assert!(!tree.return_to_last_branch());
    }

    #[test]
    fn test_goto_beyond_main_line_fails_without_moving() {
        let mut tree = GameTree::new();
        play(&mut tree, "e2", "e4");
        play(&mut tree, "e7", "e5");
        tree.goto_half_move(1);
        let before = tree.current();
        assert!(!tree.goto_half_move(3));
        assert_eq!(tree.current(), before);
    }

    #[test]
    fn test_new_game_resets() {
        let mut tree = GameTree::new();
        play(&mut tree, "e2", "e4");
        tree.new_game();
        assert!(tree.is_at_root());
        assert_eq!(tree.main_line_len(), 0);
        assert_eq!(tree.current_position(), Board::standard());
    }

    #[test]
    fn test_export_notation_with_variations_and_comments() {
        let mut tree = GameTree::new();
        play(&mut tree, "e2", "e4");
        play(&mut tree, "e7", "e5");
        variation(&mut tree, "c7", "c5");
        play(&mut tree, "g1", "f3");
        tree.goto_half_move(2);
        play(&mut tree, "g1", "f3");

        assert_eq!(
            tree.export_notation(),
            "1. e2e4 e7e5 (1... c7c5 2. g1f3) 2. g1f3"
        );

        tree.goto_half_move(1);
        tree.set_comment("best by test");
        play(&mut tree, "d7", "d5");
        assert_eq!(
            tree.export_notation(),
            "1. e2e4 {best by test} 1... e7e5 (1... c7c5 2. g1f3) (1... d7d5) 2. g1f3"
        );
    }

    #[test]
    fn test_export_empty_tree() {
        assert_eq!(GameTree::new().export_notation(), "");
    }
}
