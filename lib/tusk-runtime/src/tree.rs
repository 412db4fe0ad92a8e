//! Parse trees.

use crate::token::{escape_whitespace, Token};

/// Identifier of a rule node within a [`ParseTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeId(usize);

#[derive(Clone, Debug)]
pub(crate) enum Child {
    Rule(usize),
    Token(Token),
}

#[derive(Clone, Debug)]
pub(crate) struct RuleNode {
    pub(crate) rule_index: usize,
    pub(crate) children: Vec<Child>,
}

/// A concrete syntax tree produced by invoking a parser rule.
///
/// Nodes live in an arena, so arbitrarily deep trees can be built and rendered without recursion.
#[derive(Clone, Debug)]
pub struct ParseTree {
    pub(crate) nodes: Vec<RuleNode>,
    pub(crate) root: usize,
}

impl ParseTree {
    /// Creates a tree holding a single, childless rule node.
    pub fn new(root_rule_index: usize) -> Self {
        Self {
            nodes: vec![RuleNode {
                rule_index: root_rule_index,
                children: Vec::new(),
            }],
            root: 0,
        }
    }

    /// Returns the root node.
    pub fn root(&self) -> NodeId {
        NodeId(self.root)
    }

    /// Returns the rule index of the given node.
    pub fn rule_index(&self, node: NodeId) -> usize {
        self.nodes[node.0].rule_index
    }

    /// Appends a rule node as the last child of `parent`.
    pub fn add_rule(&mut self, parent: NodeId, rule_index: usize) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(RuleNode {
            rule_index,
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(Child::Rule(id));
        NodeId(id)
    }

    /// Appends a terminal as the last child of `parent`.
    pub fn add_token(&mut self, parent: NodeId, token: Token) {
        self.nodes[parent.0].children.push(Child::Token(token));
    }

    /// Renders the tree in LISP-style notation: `(rule child child ...)`.
    ///
    /// Rule nodes are labeled with their name from `rule_names`, terminals with their text. A rule node without
    /// children renders as its bare name. Newlines, carriage returns, and tabs in labels are escaped.
    pub fn to_string_tree(&self, rule_names: &[String]) -> String {
        enum Step<'a> {
            Node(&'a Child),
            Space,
            Close,
        }

        let rule_label = |rule_index: usize| match rule_names.get(rule_index) {
            Some(name) => escape_whitespace(name),
            None => rule_index.to_string(),
        };

        let root = Child::Rule(self.root);
        let mut rendered = String::new();
        let mut steps = vec![Step::Node(&root)];
        while let Some(step) = steps.pop() {
            match step {
                Step::Space => rendered.push(' '),
                Step::Close => rendered.push(')'),
                Step::Node(Child::Token(token)) => rendered.push_str(&escape_whitespace(&token.text)),
                Step::Node(Child::Rule(id)) => {
                    let node = &self.nodes[*id];
                    if node.children.is_empty() {
                        rendered.push_str(&rule_label(node.rule_index));
                        continue;
                    }

                    rendered.push('(');
                    rendered.push_str(&rule_label(node.rule_index));
                    rendered.push(' ');
                    steps.push(Step::Close);
                    for (i, child) in node.children.iter().enumerate().rev() {
                        steps.push(Step::Node(child));
                        if i > 0 {
                            steps.push(Step::Space);
                        }
                    }
                }
            }
        }
        rendered
    }
}
